//! Paced control loop around a `Navigator`.
//!
//! The runner is the periodic context: it paces ticks on the navigator's clock,
//! drains operator commands between ticks and honors a shutdown flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracer_traits::{AudioSink, Clock, HBridge, LineSensors};

use crate::command::{Command, Reply};
use crate::error::Result;
use crate::navigator::Navigator;
use crate::state::RobotState;
use crate::util::period_ms;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tick_hz: u32,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Stop as soon as the navigator reports LOST.
    pub stop_on_lost: bool,
    /// Issue `start()` right after `begin()`.
    pub autostart: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tick_hz: 100,
            max_ticks: None,
            stop_on_lost: false,
            autostart: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxTicks,
    Lost,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub final_state: RobotState,
    pub reason: StopReason,
    pub elapsed_ms: u64,
}

/// Drive `nav` until a stop condition holds, then halt the drive.
///
/// Hardware errors end the run and are returned after a best-effort halt.
pub fn run<S, B, A>(
    nav: &mut Navigator<S, B, A>,
    opts: &RunOptions,
    commands: Option<&Receiver<Command>>,
    shutdown: &AtomicBool,
    mut on_reply: impl FnMut(Command, Reply),
) -> Result<RunSummary>
where
    S: LineSensors,
    B: HBridge,
    A: AudioSink,
{
    let clock = nav.clock().clone();
    let period = Duration::from_millis(period_ms(opts.tick_hz));
    let started = clock.now();

    nav.begin()?;
    if opts.autostart {
        nav.start();
    }
    tracing::info!(
        tick_hz = opts.tick_hz,
        max_ticks = ?opts.max_ticks,
        stop_on_lost = opts.stop_on_lost,
        "run start"
    );

    let mut ticks = 0u64;
    let mut next = clock.now();
    let reason = loop {
        if shutdown.load(Ordering::Acquire) {
            break StopReason::Shutdown;
        }
        if let Some(rx) = commands {
            for cmd in rx.try_iter() {
                let reply = nav.execute(cmd);
                tracing::debug!(command = ?cmd, %reply, "command");
                on_reply(cmd, reply);
            }
        }

        let state = match nav.tick() {
            Ok(s) => s,
            Err(e) => {
                let _ = nav.halt();
                return Err(e);
            }
        };
        ticks += 1;

        if opts.stop_on_lost && state == RobotState::Lost {
            break StopReason::Lost;
        }
        if opts.max_ticks.is_some_and(|m| ticks >= m) {
            break StopReason::MaxTicks;
        }

        next += period;
        let now = clock.now();
        if next > now {
            clock.sleep(next - now);
        } else {
            // overran; re-anchor instead of bursting to catch up
            next = now;
        }
    };

    if let Err(e) = nav.halt() {
        tracing::warn!(error = %e, "halt at end of run failed");
    }
    let summary = RunSummary {
        ticks,
        final_state: nav.state(),
        reason,
        elapsed_ms: clock.ms_since(started),
    };
    tracing::info!(
        ticks = summary.ticks,
        final_state = %summary.final_state,
        reason = ?summary.reason,
        elapsed_ms = summary.elapsed_ms,
        "run end"
    );
    Ok(summary)
}
