use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Arc, Mutex};

use rstest::rstest;
use tracer_core::config::OdometryCfg;
use tracer_core::odometry::register_encoders;
use tracer_core::{
    EdgeConfig, EdgeTable, NavError, Navigator, NavigatorCfg, Odometry, RobotState,
    TurnDirection, WheelCommand, build_navigator,
};
use tracer_traits::{AudioCue, AudioSink, HBridge, LineSensors, ManualClock, PwmChannel, SensorFrame};

/// Sensors fed from a queue; once drained, the last frame repeats.
#[derive(Clone, Default)]
struct Script(Arc<Mutex<(VecDeque<SensorFrame>, SensorFrame)>>);

impl Script {
    fn set(&self, bits: [u8; 5]) {
        let mut g = self.0.lock().unwrap();
        g.0.clear();
        g.1 = SensorFrame::from_bits(bits);
    }

    fn push(&self, bits: [u8; 5]) {
        self.0.lock().unwrap().0.push_back(SensorFrame::from_bits(bits));
    }
}

impl LineSensors for Script {
    fn read(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        let mut g = self.0.lock().unwrap();
        if let Some(f) = g.0.pop_front() {
            g.1 = f;
        }
        Ok(g.1)
    }
}

#[derive(Clone, Default)]
struct Bridge(Arc<Mutex<[u16; 4]>>);

impl HBridge for Bridge {
    fn write(&mut self, channel: PwmChannel, duty: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.0.lock().unwrap()[channel.index()] = duty;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Cues(Arc<Mutex<Vec<AudioCue>>>);

impl Cues {
    fn all(&self) -> Vec<AudioCue> {
        self.0.lock().unwrap().clone()
    }
}

impl AudioSink for Cues {
    fn play(&mut self, cue: AudioCue) {
        self.0.lock().unwrap().push(cue);
    }
}

struct Rig {
    nav: Navigator<Script, Bridge, Cues>,
    sensors: Script,
    bridge: Bridge,
    cues: Cues,
    clock: ManualClock,
}

impl Rig {
    fn new(cfg: NavigatorCfg) -> Self {
        Self::with_parts(cfg, None, None)
    }

    fn with_parts(
        cfg: NavigatorCfg,
        odometry: Option<Odometry>,
        button: Option<(Arc<EdgeTable>, tracer_core::EdgeHandle)>,
    ) -> Self {
        let sensors = Script::default();
        let bridge = Bridge::default();
        let cues = Cues::default();
        let clock = ManualClock::new();
        let mut nav = build_navigator(
            sensors.clone(),
            bridge.clone(),
            cues.clone(),
            cfg,
            odometry,
            button,
            Some(Arc::new(clock.clone())),
        )
        .expect("build navigator");
        nav.begin().expect("begin");
        Self {
            nav,
            sensors,
            bridge,
            cues,
            clock,
        }
    }

    fn step(&mut self, ms: u64) -> RobotState {
        self.clock.advance_ms(ms);
        self.nav.tick().expect("tick")
    }
}

fn odometry_rig() -> (Rig, Arc<EdgeTable>) {
    let mut table = EdgeTable::new();
    let cfg = OdometryCfg::default();
    let (l, r) = register_encoders(&mut table, &cfg).unwrap();
    let table = Arc::new(table);
    let odo = Odometry::new(Arc::clone(&table), l, r, cfg).unwrap();
    (
        Rig::with_parts(NavigatorCfg::default(), Some(odo), None),
        table,
    )
}

#[test]
fn blank_frame_without_memory_searches_left_in_one_tick() {
    let mut rig = Rig::new(NavigatorCfg::default());
    assert!(rig.nav.start());
    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::SearchingLeft);
    assert_eq!(rig.nav.last_command(), WheelCommand::new(-120, 120));
}

#[test]
fn centered_line_drives_both_wheels_at_base_speed() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 0, 1, 0, 0]);
    for _ in 0..20 {
        assert_eq!(rig.step(10), RobotState::Following);
        assert_eq!(rig.nav.last_command(), WheelCommand::new(150, 150));
    }
    assert_eq!(rig.nav.regulator().integral(), 0.0);
    // 150 * 0.8 duty on both forward channels, backward channels idle
    assert_eq!(*rig.bridge.0.lock().unwrap(), [120, 0, 120, 0]);
}

#[test]
fn small_offset_uses_the_smooth_pid_law() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 0, 1, 1, 0]);
    rig.step(10);
    // 25*0.5 + 0.5*0.5 + 15*0.5 = 20.25
    assert_eq!(rig.nav.last_command(), WheelCommand::new(170, 129));
}

#[test]
fn mid_offset_uses_the_aggressive_law_without_integral() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 1, 1]);
    rig.step(10);
    // 45*2 + 25*(2-0) = 140; left saturates at max
    assert_eq!(rig.nav.last_command(), WheelCommand::new(255, 10));
    assert_eq!(rig.nav.regulator().integral(), 0.0);
}

#[test]
fn hard_offset_without_odometry_pivots_in_place() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([1, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Following);
    assert_eq!(rig.nav.last_command(), WheelCommand::new(-120, 120));
}

#[test]
fn hard_offset_pivot_without_odometry_is_time_gated() {
    let mut cfg = NavigatorCfg::default();
    cfg.turn.ms_per_degree = 1.0;
    let mut rig = Rig::new(cfg);
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 1]);
    // gate is 90 ms from the first pivoting tick
    for _ in 0..9 {
        assert_eq!(rig.step(10), RobotState::Following);
        assert_eq!(rig.nav.last_command(), WheelCommand::new(120, -120));
    }
    assert_eq!(rig.step(10), RobotState::SearchingLeft);
    assert_eq!(rig.nav.last_command(), WheelCommand::new(-120, 120));

    // the line is still on the right, so the search reacquires it at once
    assert_eq!(rig.step(10), RobotState::Following);
    assert!(rig.cues.all().contains(&AudioCue::LineFound));
}

#[test]
fn recentering_restarts_the_pivot_time_gate() {
    let mut cfg = NavigatorCfg::default();
    cfg.turn.ms_per_degree = 1.0;
    let mut rig = Rig::new(cfg);
    rig.nav.start();
    rig.sensors.set([1, 0, 0, 0, 0]);
    for _ in 0..5 {
        rig.step(10);
    }
    rig.sensors.set([0, 0, 1, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Following);
    rig.sensors.set([1, 0, 0, 0, 0]);
    for _ in 0..8 {
        assert_eq!(rig.step(10), RobotState::Following);
    }
    assert_eq!(rig.nav.last_command(), WheelCommand::new(-120, 120));
}

#[rstest]
#[case::with_odometry(true)]
#[case::without_odometry(false)]
fn remembered_hard_offset_steers_instead_of_pivoting(#[case] odometry: bool) {
    let (mut rig, _table) = if odometry {
        let (rig, table) = odometry_rig();
        (rig, Some(table))
    } else {
        (Rig::new(NavigatorCfg::default()), None)
    };
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::SearchingLeft);
    rig.sensors.set([0, 0, 0, 0, 1]);
    assert_eq!(rig.step(10), RobotState::Following);

    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Following);
    assert_eq!(rig.nav.turn_intent(), None);
    // base 147 after 10 ms of loss, correction 45*3 + 25*3 = 210, right wheel biased back by 40
    assert_eq!(rig.nav.last_command(), WheelCommand::new(255, 147 - 210 - 40));
    assert_ne!(rig.nav.last_command(), WheelCommand::new(120, -120));
}

#[test]
fn memory_steers_with_reverse_bias_toward_last_side() {
    let mut cfg = NavigatorCfg::default();
    cfg.memory.slowdown = 0.0;
    let mut rig = Rig::new(cfg);
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 1, 0]);
    rig.step(10);
    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Following);
    // aggressive law on remembered 1.0: 45 + 25 = 70, right wheel biased back by 40
    assert_eq!(rig.nav.last_command(), WheelCommand::new(220, 40));
}

#[test]
fn memory_slows_down_linearly_with_loss_age() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 1, 0, 0, 0]);
    rig.step(10);
    rig.sensors.set([0, 0, 0, 0, 0]);
    rig.step(125);
    // base 150 * (1 - 0.5 * 125/250) = 112; correction -70; left biased back by 40
    assert_eq!(rig.nav.last_command(), WheelCommand::new(112 - 70 - 40, 112 + 70));
}

#[test]
fn sustained_overshoot_waits_for_turn_toward_last_side() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 1]);
    rig.step(10);
    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(30), RobotState::Following);
    assert_eq!(rig.step(30), RobotState::WaitingForTurn);
    let intent = rig.nav.turn_intent().expect("intent while waiting");
    assert_eq!(intent.direction, TurnDirection::Right);
    assert!(rig.nav.last_command().is_stop());

    assert_eq!(rig.step(100), RobotState::WaitingForTurn);
    assert_eq!(rig.step(100), RobotState::SearchingRight);
    assert_eq!(rig.nav.turn_intent(), None);
}

#[test]
fn left_edge_then_blank_ends_lost() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([1, 0, 0, 0, 0]);
    rig.step(10);
    rig.sensors.set([0, 0, 0, 0, 0]);

    let mut seen = Vec::new();
    for _ in 0..1000 {
        let s = rig.step(10);
        if seen.last() != Some(&s) {
            seen.push(s);
        }
        if s == RobotState::Lost {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            RobotState::Following,
            RobotState::WaitingForTurn,
            RobotState::SearchingLeft,
            RobotState::SearchingRight,
            RobotState::Lost,
        ]
    );
    assert!(rig.nav.last_command().is_stop());
    assert!(rig.cues.all().contains(&AudioCue::LineLost));

    // LOST is inert until an explicit start
    assert_eq!(rig.step(1000), RobotState::Lost);
}

#[test]
fn search_sweep_switches_direction_once_at_half_timeout() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(0), RobotState::SearchingLeft);
    let started = rig.nav.now_ms();

    let mut switches = Vec::new();
    let mut last_left = rig.nav.last_command().left;
    while rig.step(10) != RobotState::Lost {
        let left = rig.nav.last_command().left;
        if left.signum() != last_left.signum() {
            switches.push(rig.nav.now_ms() - started);
            last_left = left;
        }
    }
    assert_eq!(switches.len(), 1, "{switches:?}");
    // the switch happens on the first tick at or past 1500 ms, then settles 50 ms
    assert!((1500..1600).contains(&switches[0]), "{switches:?}");
}

#[test]
fn search_reacquires_line_and_resets_regulator() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 0]);
    rig.step(10);
    rig.sensors.set([0, 1, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Following);
    assert_eq!(rig.nav.regulator().integral(), 0.0);
    assert!(rig.cues.all().contains(&AudioCue::LineFound));
}

#[test]
fn odometry_turn_ends_in_opposite_search_when_target_reached() {
    let (mut rig, table) = odometry_rig();
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 1]);
    assert_eq!(rig.step(10), RobotState::Turning);
    let intent = rig.nav.turn_intent().unwrap();
    assert_eq!(intent.direction, TurnDirection::Right);
    assert_eq!(rig.nav.last_command(), WheelCommand::new(120, -120));

    rig.sensors.set([0, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Turning);

    let (l, r) = rig.nav.odometry().unwrap().handles();
    let target = rig.nav.odometry().unwrap().ticks_for_pivot(intent.degrees);
    assert_eq!(target, 10);
    for i in 0..9 {
        table.dispatch(l, i);
        table.dispatch(r, i);
    }
    assert_eq!(rig.step(10), RobotState::Turning);
    table.dispatch(l, 9);
    table.dispatch(r, 9);
    assert_eq!(rig.step(10), RobotState::SearchingLeft);
}

#[test]
fn odometry_turn_returns_to_following_when_line_recenters() {
    let (mut rig, _table) = odometry_rig();
    rig.nav.start();
    rig.sensors.set([1, 0, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Turning);
    rig.sensors.set([0, 1, 0, 0, 0]);
    assert_eq!(rig.step(10), RobotState::Following);
    assert!(rig.nav.turn_intent().is_none());
}

#[test]
fn stalled_encoders_end_the_turn_at_the_time_gate() {
    let (mut rig, _table) = odometry_rig();
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 1]);
    assert_eq!(rig.step(10), RobotState::Turning);
    rig.sensors.set([0, 0, 0, 0, 0]);
    // 4 ms/deg * 90 = 360 ms, counted after the 50 ms settle
    for _ in 0..35 {
        assert_eq!(rig.step(10), RobotState::Turning);
    }
    assert_eq!(rig.step(10), RobotState::SearchingLeft);
}

#[test]
fn arriving_encoder_ticks_keep_the_turn_past_the_time_gate() {
    let (mut rig, table) = odometry_rig();
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 1]);
    assert_eq!(rig.step(10), RobotState::Turning);
    rig.sensors.set([0, 0, 0, 0, 0]);
    let (l, _r) = rig.nav.odometry().unwrap().handles();
    table.dispatch(l, 70);
    assert_eq!(rig.step(400), RobotState::Turning);
    assert_eq!(rig.nav.last_command(), WheelCommand::new(120, -120));
}

#[test]
fn button_toggles_between_start_and_pause() {
    let mut table = EdgeTable::new();
    let h = table
        .register(EdgeConfig::one_shot(50))
        .unwrap();
    let table = Arc::new(table);
    let mut rig = Rig::with_parts(NavigatorCfg::default(), None, Some((Arc::clone(&table), h)));
    rig.sensors.set([0, 0, 1, 0, 0]);

    assert_eq!(rig.step(10), RobotState::Idle);
    table.dispatch(h, 0);
    assert_eq!(rig.step(10), RobotState::Following);
    // event consumed exactly once
    assert_eq!(rig.step(10), RobotState::Following);
    table.dispatch(h, 100);
    assert_eq!(rig.step(10), RobotState::Stopped);
    assert!(rig.nav.last_command().is_stop());
}

#[test]
fn start_from_lost_passes_through_idle() {
    let mut cfg = NavigatorCfg::default();
    cfg.search_timeout_ms = 100;
    let mut rig = Rig::new(cfg);
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 0]);
    while rig.step(10) != RobotState::Lost {}
    assert!(rig.nav.start());
    assert_eq!(rig.nav.state(), RobotState::Following);
    assert_eq!(rig.nav.estimator().last_known_position(), None);
}

#[rstest]
#[case(RobotState::WaitingForTurn)]
#[case(RobotState::Following)]
fn start_is_rejected_while_running(#[case] target: RobotState) {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    if target == RobotState::WaitingForTurn {
        rig.sensors.set([0, 0, 0, 0, 1]);
        rig.step(10);
        rig.sensors.set([0, 0, 0, 0, 0]);
        rig.step(100);
    }
    assert_eq!(rig.nav.state(), target);
    assert!(!rig.nav.start());
    assert_eq!(rig.nav.state(), target);
}

#[test]
fn pause_and_stop_work_from_any_state() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.pause();
    assert_eq!(rig.nav.state(), RobotState::Stopped);
    rig.nav.start();
    rig.sensors.set([0, 0, 0, 0, 0]);
    rig.step(10);
    assert!(rig.nav.state().is_searching());
    rig.nav.stop();
    assert_eq!(rig.nav.state(), RobotState::Stopped);
    assert!(rig.nav.last_command().is_stop());
    assert_eq!(rig.cues.all().last(), Some(&AudioCue::Stop));
}

#[test]
fn calibrate_runs_on_next_tick_and_returns_to_idle() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.sensors.push([1, 0, 0, 0, 0]);
    rig.sensors.push([0, 0, 1, 0, 1]);
    assert!(rig.nav.calibrate());
    assert_eq!(rig.nav.state(), RobotState::Calibrating);

    let before = rig.nav.now_ms();
    assert_eq!(rig.step(0), RobotState::Idle);
    // blocking for the whole window on the injected clock
    assert!(rig.nav.now_ms() - before >= 5000);

    let report = rig.nav.calibration().expect("report");
    assert_eq!(report.samples, 100);
    assert_eq!(report.min, [0, 0, 0, 0, 0]);
    assert_eq!(report.max, [1, 0, 1, 0, 1]);
}

#[test]
fn calibrate_is_rejected_outside_idle() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    assert!(!rig.nav.calibrate());
    assert_eq!(rig.nav.state(), RobotState::Following);
}

#[test]
fn speed_adjustment_saturates_and_beeps() {
    let mut rig = Rig::new(NavigatorCfg::default());
    for _ in 0..20 {
        rig.nav.increase_speed();
    }
    assert_eq!(rig.nav.base_speed(), 255);
    for _ in 0..40 {
        rig.nav.decrease_speed();
    }
    assert_eq!(rig.nav.base_speed(), 60);
    assert!(rig.cues.all().iter().filter(|c| **c == AudioCue::Beep).count() == 60);
}

#[test]
fn lifecycle_cues_are_played() {
    let mut rig = Rig::new(NavigatorCfg::default());
    rig.nav.start();
    rig.nav.pause();
    assert_eq!(
        rig.cues.all(),
        vec![AudioCue::Ready, AudioCue::Start, AudioCue::Stop]
    );
}

struct BrokenSensors;

impl LineSensors for BrokenSensors {
    fn read(&mut self) -> Result<SensorFrame, Box<dyn Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("i2c nack")))
    }
}

#[test]
fn sensor_failure_stops_drive_and_surfaces_typed_error() {
    let bridge = Bridge::default();
    let cues = Cues::default();
    let clock = ManualClock::new();
    let mut nav = build_navigator(
        BrokenSensors,
        bridge.clone(),
        cues.clone(),
        NavigatorCfg::default(),
        None,
        None,
        Some(Arc::new(clock.clone())),
    )
    .unwrap();
    nav.begin().unwrap();
    nav.start();
    let err = nav.tick().expect_err("sensor read fails");
    assert!(matches!(
        err.downcast_ref::<NavError>(),
        Some(NavError::Hardware(msg)) if msg.contains("i2c nack")
    ));
    assert_eq!(*bridge.0.lock().unwrap(), [0, 0, 0, 0]);
    assert_eq!(cues.all().last(), Some(&AudioCue::Error));
    assert_eq!(nav.state(), RobotState::Following);
}
