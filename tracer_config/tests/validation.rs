use rstest::rstest;
use tracer_config::load_toml;

const BASE: &str = r#"
[pins]
sensors = [17, 27, 22, 23, 24]
left_forward = 12
left_backward = 13
right_forward = 18
right_backward = 19

[runner]
tick_hz = 100
"#;

fn with(extra: &str) -> String {
    format!("{BASE}\n{extra}")
}

#[test]
fn minimal_config_fills_defaults_and_validates() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("defaults must be valid");
    assert_eq!(cfg.speed.base_speed, 150);
    assert_eq!(cfg.speed.max_speed, 255);
    assert_eq!(cfg.memory.timeout_ms, 250);
    assert_eq!(cfg.search.timeout_ms, 3000);
    assert_eq!(cfg.estimator.weights, [-3.0, -1.0, 0.0, 1.0, 3.0]);
    assert!(!cfg.odometry.enabled);
}

#[test]
fn missing_runner_section_is_a_parse_error() {
    let toml = r#"
[pins]
sensors = [17, 27, 22, 23, 24]
left_forward = 12
left_backward = 13
right_forward = 18
right_backward = 19
"#;
    assert!(load_toml(toml).is_err());
}

#[test]
fn rejects_zero_tick_hz() {
    let toml = BASE.replace("tick_hz = 100", "tick_hz = 0");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject tick_hz=0");
    assert!(format!("{err}").contains("runner.tick_hz must be > 0"));
}

#[rstest]
#[case("[speed]\nbase_speed = 300", "speed.base_speed")]
#[case("[speed]\nmin_speed = 300", "speed.min_speed")]
#[case("[speed]\nspeed_step = 0", "speed.speed_step")]
#[case("[speed]\nduty_scale = 1.5", "speed.duty_scale")]
#[case("[pid]\nkd = -1.0", "pid.kd")]
#[case("[thresholds]\nsmooth = 3.0\npivot = 2.5", "thresholds.pivot")]
#[case("[memory]\ntimeout_ms = 0", "memory.timeout_ms")]
#[case("[memory]\nslowdown = 1.2", "memory.slowdown")]
#[case("[turn]\ndegrees = 0.0", "turn.degrees")]
#[case("[search]\ntimeout_ms = 1", "search.timeout_ms")]
#[case("[calibration]\nsample_interval_ms = 0", "calibration.sample_interval_ms")]
#[case("[hardware]\npwm_frequency_hz = 0.0", "hardware.pwm_frequency_hz")]
fn rejects_out_of_range_values(#[case] extra: &str, #[case] needle: &str) {
    let cfg = load_toml(&with(extra)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected {needle:?} in {msg:?}");
}

#[rstest]
#[case("[-3.0, -1.0, 0.0, 1.0, 2.0]", "antisymmetric")]
#[case("[-1.0, -3.0, 0.0, 3.0, 1.0]", "strictly increasing")]
#[case("[-3.0, -1.0, 0.5, 1.0, 3.0]", "center weight")]
fn rejects_malformed_weights(#[case] weights: &str, #[case] needle: &str) {
    let cfg = load_toml(&with(&format!("[estimator]\nweights = {weights}"))).expect("parse TOML");
    let err = cfg.validate().expect_err("weights should be rejected");
    assert!(format!("{err}").contains(needle));
}

#[test]
fn accepts_alternate_symmetric_weights() {
    let cfg = load_toml(&with("[estimator]\nweights = [-2.0, -1.0, 0.0, 1.0, 2.0]"))
        .expect("parse TOML");
    cfg.validate().expect("symmetric increasing weights are fine");
}

#[test]
fn odometry_requires_encoder_pins() {
    let cfg = load_toml(&with("[odometry]\nenabled = true")).expect("parse TOML");
    let err = cfg.validate().expect_err("no encoder pins");
    assert!(format!("{err}").contains("pins.encoder_left"));

    let toml = BASE.replace(
        "right_backward = 19",
        "right_backward = 19\nencoder_left = 5\nencoder_right = 6",
    );
    let cfg = load_toml(&format!("{toml}\n[odometry]\nenabled = true")).expect("parse TOML");
    cfg.validate().expect("encoders present");
}

#[test]
fn logging_section_is_optional_and_parsed() {
    let cfg = load_toml(&with(
        "[logging]\nfile = \"logs/tracer.log\"\nlevel = \"debug\"\nrotation = \"daily\"",
    ))
    .expect("parse TOML");
    assert_eq!(cfg.logging.file.as_deref(), Some("logs/tracer.log"));
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[test]
fn shipped_sample_config_validates() {
    let cfg = load_toml(include_str!("../../etc/tracer.toml")).expect("parse sample");
    cfg.validate().expect("sample must be valid");
    assert_eq!(cfg.pins.sensors, [17, 27, 22, 23, 24]);
    assert_eq!(cfg.pins.button, None);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("never"));
}
