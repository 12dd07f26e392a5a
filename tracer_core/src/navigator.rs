//! The navigation state machine.
//!
//! One `tick()` is one control decision: read the frame, consult the estimator
//! and (optionally) odometry, pick a drive command, issue it. Nothing else in
//! the process writes to the drive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use tracer_traits::{AudioCue, AudioSink, Clock, HBridge, LineSensors, SensorFrame};

use crate::command::{Command, Reply};
use crate::config::NavigatorCfg;
use crate::drive::{DifferentialDrive, WheelCommand};
use crate::edge::{EdgeHandle, EdgeTable};
use crate::error::Result;
use crate::estimator::{self, CalibrationReport, PositionEstimator};
use crate::hw_error;
use crate::odometry::Odometry;
use crate::pid::PidRegulator;
use crate::state::{RobotState, TurnDirection, TurnIntent};
use crate::util::elapsed_ms;

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

pub struct Navigator<S, B, A> {
    sensors: S,
    drive: DifferentialDrive<B>,
    audio: A,
    estimator: PositionEstimator,
    regulator: PidRegulator,
    odometry: Option<Odometry>,
    button: Option<(Arc<EdgeTable>, EdgeHandle)>,
    clock: SharedClock,
    epoch: Instant,
    cfg: NavigatorCfg,

    state: RobotState,
    state_since_ms: u64,
    base_speed: i32,
    turn: TurnIntent,
    turn_started_ms: u64,
    // start of a hard-offset pivot inside FOLLOWING (no odometry)
    pivot_started_ms: Option<u64>,
    search_started_ms: u64,
    search_initial: TurnDirection,
    calibration: Option<CalibrationReport>,
    last_frame: SensorFrame,
    last_position: Option<f32>,
    ticks: u64,
}

impl<S, B, A> core::fmt::Debug for Navigator<S, B, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Navigator")
            .field("state", &self.state)
            .field("base_speed", &self.base_speed)
            .field("turn", &self.turn)
            .field("last_position", &self.last_position)
            .field("odometry", &self.odometry.is_some())
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl<S: LineSensors, B: HBridge, A: AudioSink> Navigator<S, B, A> {
    pub(crate) fn from_parts(
        sensors: S,
        bridge: B,
        audio: A,
        cfg: NavigatorCfg,
        odometry: Option<Odometry>,
        button: Option<(Arc<EdgeTable>, EdgeHandle)>,
        clock: SharedClock,
    ) -> Self {
        let drive = DifferentialDrive::new(bridge, cfg.speed.max_speed, cfg.speed.duty_scale);
        let epoch = clock.now();
        Self {
            sensors,
            drive,
            audio,
            estimator: PositionEstimator::new(cfg.weights),
            regulator: PidRegulator::new(cfg.pid.smooth),
            odometry,
            button,
            clock,
            epoch,
            base_speed: cfg.speed.base_speed,
            cfg,
            state: RobotState::Idle,
            state_since_ms: 0,
            turn: TurnIntent::NONE,
            turn_started_ms: 0,
            pivot_started_ms: None,
            search_started_ms: 0,
            search_initial: TurnDirection::Left,
            calibration: None,
            last_frame: SensorFrame::BLANK,
            last_position: None,
            ticks: 0,
        }
    }

    /// Milliseconds since construction, on the injected clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Stop the drive, enter IDLE and announce readiness.
    pub fn begin(&mut self) -> Result<()> {
        self.drive.stop().wrap_err("stop drive on begin")?;
        let now = self.now_ms();
        self.state = RobotState::Idle;
        self.state_since_ms = now;
        self.turn = TurnIntent::NONE;
        self.audio.play(AudioCue::Ready);
        tracing::info!(
            odometry = self.odometry.is_some(),
            button = self.button.is_some(),
            base_speed = self.base_speed,
            "navigator ready"
        );
        Ok(())
    }

    /// Run one control decision.
    ///
    /// Hardware failures stop the drive best-effort, play the error cue and
    /// are returned; the state is left as it was.
    pub fn tick(&mut self) -> Result<RobotState> {
        let now = self.now_ms();
        self.poll_button();
        if let Some(odo) = self.odometry.as_mut() {
            odo.update(now);
        }

        let outcome = match self.state {
            RobotState::Idle | RobotState::Stopped | RobotState::Lost => self.drive.stop(),
            RobotState::Calibrating => self.run_calibration(),
            RobotState::Following => self.follow(now),
            RobotState::WaitingForTurn => self.wait_for_turn(now),
            RobotState::Turning => self.execute_turn(now),
            RobotState::SearchingLeft | RobotState::SearchingRight => self.search(now),
        };
        if let Err(e) = outcome {
            self.fault(&e);
            return Err(e);
        }
        self.ticks += 1;
        Ok(self.state)
    }

    fn fault(&mut self, e: &eyre::Report) {
        tracing::error!(state = %self.state, error = %e, "hardware failure");
        if let Err(stop_err) = self.drive.stop() {
            tracing::warn!(error = %stop_err, "drive stop after failure failed");
        }
        self.audio.play(AudioCue::Error);
    }

    fn poll_button(&mut self) {
        let fired = self
            .button
            .as_ref()
            .is_some_and(|(table, handle)| table.input(*handle).is_ok_and(|b| b.poll_and_reset()));
        if !fired {
            return;
        }
        tracing::info!(state = %self.state, "button pressed");
        if self.state.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    fn transition(&mut self, next: RobotState, now: u64) {
        if next == self.state {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::info!(from = %self.state, to = %next, at_ms = now, "state transition");
        self.state = next;
        self.state_since_ms = now;
        self.pivot_started_ms = None;
    }

    // ── Public operations ────────────────────────────────────────────────────

    /// Begin (or resume) line following. Resets the regulator and position memory.
    pub fn start(&mut self) -> bool {
        let now = self.now_ms();
        match self.state {
            RobotState::Idle | RobotState::Stopped => {}
            RobotState::Lost => self.transition(RobotState::Idle, now),
            other => {
                tracing::warn!(state = %other, "start rejected");
                return false;
            }
        }
        self.regulator.reset();
        self.estimator.reset_memory();
        self.turn = TurnIntent::NONE;
        self.transition(RobotState::Following, now);
        self.audio.play(AudioCue::Start);
        true
    }

    pub fn pause(&mut self) {
        self.enter_stopped("pause");
    }

    pub fn stop(&mut self) {
        self.enter_stopped("stop");
    }

    fn enter_stopped(&mut self, reason: &'static str) {
        if let Err(e) = self.drive.stop() {
            tracing::warn!(error = %e, reason, "drive stop failed");
            self.audio.play(AudioCue::Error);
        }
        let now = self.now_ms();
        self.turn = TurnIntent::NONE;
        tracing::info!(reason, state = %self.state, "stopping");
        self.transition(RobotState::Stopped, now);
        self.audio.play(AudioCue::Stop);
    }

    /// Schedule a calibration for the next tick. Only accepted from IDLE.
    pub fn calibrate(&mut self) -> bool {
        if self.state != RobotState::Idle {
            tracing::warn!(state = %self.state, "calibrate rejected; only allowed from IDLE");
            return false;
        }
        let now = self.now_ms();
        self.transition(RobotState::Calibrating, now);
        true
    }

    pub fn increase_speed(&mut self) -> i32 {
        self.adjust_speed(self.cfg.speed.speed_step)
    }

    pub fn decrease_speed(&mut self) -> i32 {
        self.adjust_speed(-self.cfg.speed.speed_step)
    }

    fn adjust_speed(&mut self, delta: i32) -> i32 {
        let s = &self.cfg.speed;
        self.base_speed = self
            .base_speed
            .saturating_add(delta)
            .clamp(s.min_speed, s.max_speed);
        tracing::info!(base_speed = self.base_speed, "base speed adjusted");
        self.audio.play(AudioCue::Beep);
        self.base_speed
    }

    pub fn execute(&mut self, cmd: Command) -> Reply {
        match cmd {
            Command::Start => {
                let ok = self.start();
                self.accepted(ok)
            }
            Command::Pause => {
                self.pause();
                Reply::Accepted
            }
            Command::Stop => {
                self.stop();
                Reply::Accepted
            }
            Command::Calibrate => {
                let ok = self.calibrate();
                self.accepted(ok)
            }
            Command::Faster => Reply::BaseSpeed(self.increase_speed()),
            Command::Slower => Reply::BaseSpeed(self.decrease_speed()),
            Command::QueryState => Reply::State(self.state),
            Command::QueryBaseSpeed => Reply::BaseSpeed(self.base_speed),
            Command::Help => Reply::Help,
        }
    }

    fn accepted(&self, ok: bool) -> Reply {
        if ok {
            Reply::Accepted
        } else {
            Reply::Rejected(self.state)
        }
    }

    /// Stop the drive without changing state.
    pub fn halt(&mut self) -> Result<()> {
        self.drive.stop()
    }

    // ── Per-state behavior ───────────────────────────────────────────────────

    fn read_frame(&mut self) -> Result<SensorFrame> {
        let frame = self
            .sensors
            .read()
            .map_err(|e| hw_error::report(&*e))
            .wrap_err("line sensor read")?;
        self.last_frame = frame;
        Ok(frame)
    }

    fn sample(&mut self, now: u64) -> Result<Option<f32>> {
        let frame = self.read_frame()?;
        let estimate = self.estimator.estimate(frame, now);
        self.last_position = estimate;
        Ok(estimate)
    }

    fn run_calibration(&mut self) -> Result<()> {
        self.drive.stop()?;
        let result = estimator::calibrate(
            &mut self.sensors,
            self.clock.as_ref(),
            &self.cfg.calibration,
        );
        let now = self.now_ms();
        self.estimator.reset_memory();
        self.transition(RobotState::Idle, now);
        self.calibration = Some(result?);
        Ok(())
    }

    fn follow(&mut self, now: u64) -> Result<()> {
        let Some(position) = self.sample(now)? else {
            self.pivot_started_ms = None;
            return self.follow_from_memory(now);
        };
        if position.abs() >= self.cfg.thresholds.pivot {
            let direction = TurnDirection::from_offset(position);
            if self.odometry.is_some() {
                return self.start_turn(direction, self.cfg.turn.degrees);
            }
            return self.timed_pivot(position, direction, now);
        }
        self.pivot_started_ms = None;
        let cmd = self.wheel_law(position, self.base_speed);
        self.drive.apply(cmd)
    }

    /// Hard-offset pivot without odometry. Gives up on the line side and searches
    /// the other way once the turn time gate passes without recentering.
    fn timed_pivot(&mut self, position: f32, direction: TurnDirection, now: u64) -> Result<()> {
        let started = *self.pivot_started_ms.get_or_insert(now);
        let elapsed = elapsed_ms(now, started);
        if elapsed >= self.cfg.turn.time_gate_ms(self.cfg.turn.degrees) {
            self.drive.stop()?;
            tracing::info!(position, ?direction, elapsed_ms = elapsed, "pivot time gate reached");
            return self.enter_search(direction.opposite(), now);
        }
        tracing::trace!(position, ?direction, elapsed_ms = elapsed, "hard offset, pivoting");
        self.drive.pivot(direction, self.cfg.speed.turn_speed)
    }

    /// Smooth PID below the smooth threshold, integral-free aggressive law above it.
    fn wheel_law(&mut self, error: f32, base: i32) -> WheelCommand {
        let speed = &self.cfg.speed;
        let base = base as f32;
        if error.abs() < self.cfg.thresholds.smooth {
            let correction = self.regulator.calculate(error);
            let left = ((base + correction) as i32).clamp(speed.min_speed, speed.max_speed);
            let right = ((base - correction) as i32).clamp(speed.min_speed, speed.max_speed);
            tracing::trace!(error, correction, left, right, "smooth correction");
            WheelCommand::new(left, right)
        } else {
            let derivative = error - self.regulator.previous_error();
            let correction =
                self.cfg.pid.aggressive_kp * error + self.cfg.pid.aggressive_kd * derivative;
            let max = speed.max_speed;
            let left = ((base + correction) as i32).clamp(-max, max);
            let right = ((base - correction) as i32).clamp(-max, max);
            tracing::trace!(error, correction, left, right, "aggressive correction");
            WheelCommand::new(left, right)
        }
    }

    fn follow_from_memory(&mut self, now: u64) -> Result<()> {
        let memory = self.cfg.memory.clone();
        let Some((position, age)) = self.estimator.recent(now, memory.timeout_ms) else {
            tracing::info!("line lost with no usable memory");
            self.drive.stop()?;
            return self.enter_search(TurnDirection::Left, now);
        };

        if position.abs() >= self.cfg.thresholds.overshoot && age >= memory.overshoot_confirm_ms {
            let direction = TurnDirection::from_offset(position);
            self.drive.stop()?;
            self.turn = TurnIntent {
                direction,
                degrees: self.cfg.turn.degrees,
            };
            tracing::info!(position, age_ms = age, ?direction, "overshoot confirmed");
            self.transition(RobotState::WaitingForTurn, now);
            return Ok(());
        }

        let fraction = if memory.timeout_ms == 0 {
            0.0
        } else {
            age as f32 / memory.timeout_ms as f32
        };
        let factor = (1.0 - memory.slowdown * fraction).clamp(0.0, 1.0);
        let base = (self.base_speed as f32 * factor) as i32;
        let mut cmd = self.wheel_law(position, base);
        match TurnDirection::from_offset(position) {
            TurnDirection::Right => cmd.right -= memory.reverse_bias,
            TurnDirection::Left => cmd.left -= memory.reverse_bias,
            TurnDirection::None => {}
        }
        tracing::trace!(position, age_ms = age, left = cmd.left, right = cmd.right, "steering from memory");
        self.drive.apply(cmd)
    }

    fn wait_for_turn(&mut self, now: u64) -> Result<()> {
        self.drive.stop()?;
        if elapsed_ms(now, self.state_since_ms) < self.cfg.turn.wait_ms {
            return Ok(());
        }
        if let Some(odo) = self.odometry.as_mut() {
            odo.reset_ticks();
        }
        let direction = self.turn.direction;
        self.turn = TurnIntent::NONE;
        self.enter_search(direction, now)
    }

    /// Stop, settle (blocking), zero odometry, then pivot toward `direction`.
    fn start_turn(&mut self, direction: TurnDirection, degrees: f32) -> Result<()> {
        self.drive.stop()?;
        self.clock
            .sleep(Duration::from_millis(self.cfg.turn.settle_ms));
        if let Some(odo) = self.odometry.as_mut() {
            odo.reset_ticks();
        }
        let now = self.now_ms();
        self.turn = TurnIntent { direction, degrees };
        self.turn_started_ms = now;
        tracing::info!(?direction, degrees, "turn started");
        self.transition(RobotState::Turning, now);
        self.drive.pivot(direction, self.cfg.speed.turn_speed)
    }

    fn execute_turn(&mut self, now: u64) -> Result<()> {
        let estimate = self.sample(now)?;
        if estimate.is_some_and(|p| p.abs() <= self.cfg.thresholds.center_tolerance) {
            self.drive.stop()?;
            self.regulator.reset();
            tracing::info!(position = ?estimate, "turn complete, line centered");
            self.turn = TurnIntent::NONE;
            self.transition(RobotState::Following, now);
            return Ok(());
        }

        let intent = self.turn;
        let timed_out =
            elapsed_ms(now, self.turn_started_ms) >= self.cfg.turn.time_gate_ms(intent.degrees);
        let done = match &self.odometry {
            Some(odo) => match odo.ticks() {
                // stalled or unplugged encoders; fall back to the time gate
                (0, 0) if timed_out => {
                    tracing::warn!(direction = ?intent.direction, "no encoder ticks during turn");
                    true
                }
                (l, r) => (l + r) / 2 >= odo.ticks_for_pivot(intent.degrees),
            },
            None => timed_out,
        };
        if done {
            self.drive.stop()?;
            tracing::info!(direction = ?intent.direction, "turn target reached without the line");
            self.turn = TurnIntent::NONE;
            return self.enter_search(intent.direction.opposite(), now);
        }
        self.drive.pivot(intent.direction, self.cfg.speed.turn_speed)
    }

    fn enter_search(&mut self, direction: TurnDirection, now: u64) -> Result<()> {
        let direction = match direction {
            TurnDirection::None => TurnDirection::Left,
            d => d,
        };
        self.search_initial = direction;
        self.search_started_ms = now;
        self.transition(direction.search_state(), now);
        self.drive.pivot(direction, self.cfg.speed.turn_speed)
    }

    fn search(&mut self, now: u64) -> Result<()> {
        if let Some(position) = self.sample(now)? {
            self.drive.stop()?;
            self.regulator.reset();
            tracing::info!(position, "line found");
            self.audio.play(AudioCue::LineFound);
            self.transition(RobotState::Following, now);
            return Ok(());
        }

        let elapsed = elapsed_ms(now, self.search_started_ms);
        let timeout = self.cfg.search_timeout_ms;
        if elapsed >= timeout {
            self.drive.stop()?;
            tracing::warn!(elapsed_ms = elapsed, "search timed out; line lost");
            self.audio.play(AudioCue::LineLost);
            self.transition(RobotState::Lost, now);
            return Ok(());
        }

        let direction = if elapsed >= timeout / 2 {
            self.search_initial.opposite()
        } else {
            self.search_initial
        };
        let sweep_state = direction.search_state();
        if sweep_state != self.state {
            tracing::info!(elapsed_ms = elapsed, ?direction, "search sweep reversing");
            self.drive.stop()?;
            self.clock
                .sleep(Duration::from_millis(self.cfg.turn.settle_ms));
            self.transition(sweep_state, now);
        }
        self.drive.pivot(direction, self.cfg.speed.turn_speed)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn state(&self) -> RobotState {
        self.state
    }

    pub fn base_speed(&self) -> i32 {
        self.base_speed
    }

    pub fn last_command(&self) -> WheelCommand {
        self.drive.last_command()
    }

    /// Valid only while TURNING or WAITING_FOR_TURN.
    pub fn turn_intent(&self) -> Option<TurnIntent> {
        matches!(self.state, RobotState::Turning | RobotState::WaitingForTurn).then_some(self.turn)
    }

    pub fn estimator(&self) -> &PositionEstimator {
        &self.estimator
    }

    pub fn regulator(&self) -> &PidRegulator {
        &self.regulator
    }

    pub fn odometry(&self) -> Option<&Odometry> {
        self.odometry.as_ref()
    }

    pub fn calibration(&self) -> Option<&CalibrationReport> {
        self.calibration.as_ref()
    }

    pub fn last_frame(&self) -> SensorFrame {
        self.last_frame
    }

    pub fn last_position(&self) -> Option<f32> {
        self.last_position
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &NavigatorCfg {
        &self.cfg
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}
