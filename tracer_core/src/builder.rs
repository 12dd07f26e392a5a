//! Type-state builder for `Navigator` and the generic `build_navigator` constructor.
//!
//! The builder enforces at compile time that sensors and a drive are provided
//! before `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use tracer_traits::{AudioSink, HBridge, LineSensors, MonotonicClock};

use crate::config::NavigatorCfg;
use crate::edge::{EdgeHandle, EdgeTable};
use crate::error::{BuildError, Result};
use crate::mocks::NoopAudio;
use crate::navigator::{Navigator, SharedClock};
use crate::odometry::Odometry;

/// Navigator over boxed collaborators, as produced by `NavigatorBuilder`.
pub type DynNavigator = Navigator<
    Box<dyn LineSensors + Send>,
    Box<dyn HBridge + Send>,
    Box<dyn AudioSink + Send>,
>;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `DynNavigator`. All fields are validated on `build()`.
pub struct NavigatorBuilder<S, D> {
    sensors: Option<Box<dyn LineSensors + Send>>,
    drive: Option<Box<dyn HBridge + Send>>,
    audio: Option<Box<dyn AudioSink + Send>>,
    cfg: Option<NavigatorCfg>,
    odometry: Option<Odometry>,
    button: Option<(Arc<EdgeTable>, EdgeHandle)>,
    clock: Option<SharedClock>,
    _s: PhantomData<S>,
    _d: PhantomData<D>,
}

impl Default for NavigatorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensors: None,
            drive: None,
            audio: None,
            cfg: None,
            odometry: None,
            button: None,
            clock: None,
            _s: PhantomData,
            _d: PhantomData,
        }
    }
}

impl DynNavigator {
    /// Start building a navigator over boxed collaborators.
    pub fn builder() -> NavigatorBuilder<Missing, Missing> {
        NavigatorBuilder::default()
    }
}

impl<S, D> NavigatorBuilder<S, D> {
    fn retype<S2, D2>(self) -> NavigatorBuilder<S2, D2> {
        NavigatorBuilder {
            sensors: self.sensors,
            drive: self.drive,
            audio: self.audio,
            cfg: self.cfg,
            odometry: self.odometry,
            button: self.button,
            clock: self.clock,
            _s: PhantomData,
            _d: PhantomData,
        }
    }

    pub fn with_audio(mut self, audio: impl AudioSink + Send + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    pub fn with_config(mut self, cfg: NavigatorCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn with_odometry(mut self, odometry: Odometry) -> Self {
        self.odometry = Some(odometry);
        self
    }

    /// One-shot edge input polled once per tick as the start/pause button.
    pub fn with_button(mut self, table: Arc<EdgeTable>, handle: EdgeHandle) -> Self {
        self.button = Some((table, handle));
        self
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and build, reporting missing collaborators as `BuildError`.
    pub fn try_build(self) -> Result<DynNavigator> {
        let sensors = self
            .sensors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensors))?;
        let drive = self
            .drive
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDrive))?;
        let audio: Box<dyn AudioSink + Send> = match self.audio {
            Some(a) => a,
            None => Box::new(NoopAudio),
        };
        build_navigator(
            sensors,
            drive,
            audio,
            self.cfg.unwrap_or_default(),
            self.odometry,
            self.button,
            self.clock,
        )
    }
}

impl<D> NavigatorBuilder<Missing, D> {
    pub fn sensors(mut self, sensors: impl LineSensors + Send + 'static) -> NavigatorBuilder<Set, D> {
        self.sensors = Some(Box::new(sensors));
        self.retype()
    }
}

impl<S> NavigatorBuilder<S, Missing> {
    pub fn drive(mut self, bridge: impl HBridge + Send + 'static) -> NavigatorBuilder<S, Set> {
        self.drive = Some(Box::new(bridge));
        self.retype()
    }
}

impl NavigatorBuilder<Set, Set> {
    pub fn build(self) -> Result<DynNavigator> {
        self.try_build()
    }
}

/// Validate configuration and construct a navigator over concrete collaborators.
///
/// This is the single place configuration is checked, used by both
/// `NavigatorBuilder::try_build()` and direct callers.
pub fn build_navigator<S, B, A>(
    sensors: S,
    bridge: B,
    audio: A,
    cfg: NavigatorCfg,
    odometry: Option<Odometry>,
    button: Option<(Arc<EdgeTable>, EdgeHandle)>,
    clock: Option<SharedClock>,
) -> Result<Navigator<S, B, A>>
where
    S: LineSensors,
    B: HBridge,
    A: AudioSink,
{
    validate(&cfg)?;
    if let Some((table, handle)) = &button {
        table.input(*handle).map_err(eyre::Report::new)?;
    }
    let clock: SharedClock = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };
    Ok(Navigator::from_parts(
        sensors, bridge, audio, cfg, odometry, button, clock,
    ))
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(cfg: &NavigatorCfg) -> Result<()> {
    let s = &cfg.speed;
    if s.max_speed <= 0 {
        return Err(invalid("max_speed must be > 0"));
    }
    if s.min_speed < 0 || s.min_speed > s.max_speed {
        return Err(invalid("min_speed must be in [0, max_speed]"));
    }
    if !(s.min_speed..=s.max_speed).contains(&s.base_speed) {
        return Err(invalid("base_speed must be in [min_speed, max_speed]"));
    }
    if s.speed_step <= 0 {
        return Err(invalid("speed_step must be > 0"));
    }
    if s.turn_speed <= 0 || s.turn_speed > s.max_speed {
        return Err(invalid("turn_speed must be in (0, max_speed]"));
    }
    if !(s.duty_scale > 0.0 && s.duty_scale <= 1.0) {
        return Err(invalid("duty_scale must be in (0, 1]"));
    }

    let t = &cfg.thresholds;
    if !(t.smooth > 0.0 && t.pivot > t.smooth) {
        return Err(invalid("thresholds must satisfy 0 < smooth < pivot"));
    }
    if t.center_tolerance.is_sign_negative() || t.overshoot <= 0.0 {
        return Err(invalid("center_tolerance must be >= 0 and overshoot > 0"));
    }

    let g = &cfg.pid.smooth;
    if [g.kp, g.ki, g.kd, cfg.pid.aggressive_kp, cfg.pid.aggressive_kd]
        .iter()
        .any(|v| !v.is_finite())
    {
        return Err(invalid("pid gains must be finite"));
    }

    if cfg.memory.timeout_ms == 0 {
        return Err(invalid("memory timeout_ms must be >= 1"));
    }
    if !(0.0..=1.0).contains(&cfg.memory.slowdown) {
        return Err(invalid("memory slowdown must be in [0, 1]"));
    }
    if cfg.search_timeout_ms < 2 {
        return Err(invalid("search_timeout_ms must be >= 2"));
    }
    if !(cfg.turn.degrees > 0.0) || !(cfg.turn.ms_per_degree > 0.0) {
        return Err(invalid("turn degrees and ms_per_degree must be > 0"));
    }

    let w = &cfg.weights;
    let n = w.len();
    if (0..n).any(|i| w[i] != -w[n - 1 - i]) || w.windows(2).any(|p| p[0] >= p[1]) {
        return Err(invalid("weights must be antisymmetric and strictly increasing"));
    }
    Ok(())
}
