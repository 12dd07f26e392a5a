//! rppal-backed collaborators for a Raspberry Pi.

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use tracer_traits::{HBridge, LineSensors, PwmChannel, SENSOR_COUNT, SensorFrame};

use crate::error::{HwError, Result};

/// Full-scale duty accepted by `GpioBridge::write`.
pub const PWM_RANGE: u16 = 255;

fn gpio_err(context: &str, e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(format!("{context}: {e}"))
}

fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| gpio_err("open gpio", e))
}

/// Five digital line sensors on GPIO inputs.
pub struct GpioLineSensors {
    pins: Vec<InputPin>,
    active_low: bool,
}

impl GpioLineSensors {
    pub fn new(pins: [u8; SENSOR_COUNT], active_low: bool) -> Result<Self> {
        let gpio = open_gpio()?;
        let pins = pins
            .iter()
            .map(|&p| {
                gpio.get(p)
                    .map(|pin| pin.into_input())
                    .map_err(|e| gpio_err(&format!("open sensor pin {p}"), e))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(active_low, "line sensors ready");
        Ok(Self { pins, active_low })
    }
}

impl LineSensors for GpioLineSensors {
    fn read(&mut self) -> std::result::Result<SensorFrame, Box<dyn std::error::Error + Send + Sync>> {
        let mut channels = [false; SENSOR_COUNT];
        for (slot, pin) in channels.iter_mut().zip(&self.pins) {
            *slot = pin.is_high() != self.active_low;
        }
        Ok(SensorFrame::from(channels))
    }
}

/// Dual H-bridge driven with rppal software PWM, one output per channel.
pub struct GpioBridge {
    pins: Vec<OutputPin>,
    frequency_hz: f64,
}

impl GpioBridge {
    /// Pins in `PwmChannel::ALL` order.
    pub fn new(pins: [u8; 4], frequency_hz: f64) -> Result<Self> {
        let gpio = open_gpio()?;
        let pins = pins
            .iter()
            .map(|&p| {
                gpio.get(p)
                    .map(|pin| {
                        let mut out = pin.into_output();
                        out.set_low();
                        out
                    })
                    .map_err(|e| gpio_err(&format!("open motor pin {p}"), e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pins, frequency_hz })
    }
}

impl HBridge for GpioBridge {
    fn write(
        &mut self,
        channel: PwmChannel,
        duty: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let pin = self
            .pins
            .get_mut(channel.index())
            .ok_or_else(|| HwError::Gpio(format!("no pin for {channel:?}")))?;
        if duty == 0 {
            pin.clear_pwm().map_err(|e| gpio_err("clear pwm", e))?;
            pin.set_low();
            return Ok(());
        }
        let cycle = f64::from(duty.min(PWM_RANGE)) / f64::from(PWM_RANGE);
        pin.set_pwm_frequency(self.frequency_hz, cycle)
            .map_err(|e| gpio_err("set pwm", e))?;
        Ok(())
    }
}

impl Drop for GpioBridge {
    fn drop(&mut self) {
        for pin in &mut self.pins {
            let _ = pin.clear_pwm();
            pin.set_low();
        }
    }
}

/// Register `on_edge` on every rising edge of `pin`.
///
/// The returned pin owns the interrupt; dropping it detaches the callback.
pub fn attach_edge(pin: u8, mut on_edge: impl FnMut() + Send + 'static) -> Result<InputPin> {
    let mut input = open_gpio()?
        .get(pin)
        .map_err(|e| gpio_err(&format!("open edge pin {pin}"), e))?
        .into_input_pullup();
    input
        .set_async_interrupt(Trigger::RisingEdge, move |_level: Level| on_edge())
        .map_err(|e| gpio_err("attach interrupt", e))?;
    Ok(input)
}

/// Register `on_level` on both edges of a button, reporting `true` while pressed.
pub fn attach_button(
    pin: u8,
    active_low: bool,
    mut on_level: impl FnMut(bool) + Send + 'static,
) -> Result<InputPin> {
    let gpio = open_gpio()?;
    let raw = gpio
        .get(pin)
        .map_err(|e| gpio_err(&format!("open button pin {pin}"), e))?;
    let mut input = if active_low {
        raw.into_input_pullup()
    } else {
        raw.into_input_pulldown()
    };
    input
        .set_async_interrupt(Trigger::Both, move |level: Level| {
            on_level((level == Level::High) != active_low);
        })
        .map_err(|e| gpio_err("attach interrupt", e))?;
    Ok(input)
}
