use rstest::rstest;
use sorter_config::{load_file, load_toml};
use sorter_traits::Fixed;

const VALID: &str = r#"
[line]
target_speed = "2.0"
loop_period_ms = 100
min_output = 0
max_output = "3.0"

[pid]
kp = "0.5"
ki = 0.1
kd = 0

[stability]
deadband = "0.05"
stable_hold_ms = 2000

[origin]
poll_ms = 10
"#;

#[test]
fn accepts_valid_config_and_parses_decimals_exactly() {
    let cfg = load_toml(VALID).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.line.target_speed, "2".parse::<Fixed>().unwrap());
    assert_eq!(cfg.line.max_output, "3".parse::<Fixed>().unwrap());
    assert_eq!(cfg.pid.kp, "0.5".parse::<Fixed>().unwrap());
    assert_eq!(cfg.pid.ki, "0.1".parse::<Fixed>().unwrap());
    assert_eq!(cfg.pid.kd, Fixed::ZERO);
    assert_eq!(cfg.stability.deadband, "0.05".parse::<Fixed>().unwrap());
    // Sections left out fall back to defaults
    assert_eq!(cfg.pid.integral_limit, Fixed::from_int(10));
    assert_eq!(cfg.simulation.cart_count, 60);
}

#[test]
fn rejects_malformed_decimal_literal() {
    let toml = VALID.replace("target_speed = \"2.0\"", "target_speed = \"fast\"");
    let err = load_toml(&toml).expect_err("should reject non-decimal");
    assert!(format!("{err}").contains("invalid decimal"));
}

#[rstest]
#[case("loop_period_ms = 100", "loop_period_ms = 0", "loop_period_ms must be >= 1")]
#[case("min_output = 0", "min_output = \"4\"", "min_output must be <= line.max_output")]
#[case("target_speed = \"2.0\"", "target_speed = \"3.5\"", "target_speed must lie within")]
#[case("kp = \"0.5\"", "kp = \"-0.5\"", "pid gains must be >= 0")]
#[case("deadband = \"0.05\"", "deadband = -1", "deadband must be >= 0")]
#[case("stable_hold_ms = 2000", "stable_hold_ms = 600000", "unreasonably large")]
#[case("poll_ms = 10", "poll_ms = 0", "origin.poll_ms must be >= 1")]
fn rejects_out_of_range_values(#[case] from: &str, #[case] to: &str, #[case] needle: &str) {
    let toml = VALID.replace(from, to);
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "unexpected error: {err}"
    );
}

#[test]
fn rejects_degenerate_simulation() {
    let toml = format!("{VALID}\n[simulation]\ncart_count = 1\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject single cart ring");
    assert!(format!("{err}").contains("cart_count must be >= 2"));
}

#[test]
fn rejects_shared_origin_pins() {
    let toml = VALID.replace(
        "poll_ms = 10",
        "poll_ms = 10\nfirst_sensor_pin = 17\nsecond_sensor_pin = 17",
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[test]
fn missing_line_section_is_a_parse_error() {
    assert!(load_toml("[pid]\nkp = 1\n").is_err());
}

#[test]
fn load_file_reports_path_on_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sorter.toml");
    std::fs::write(&path, VALID).expect("write");
    load_file(&path).expect("load valid file");

    let missing = dir.path().join("missing.toml");
    let err = load_file(&missing).expect_err("missing file");
    assert!(format!("{err}").contains("missing.toml"));
}
