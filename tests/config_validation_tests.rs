//! Config Validation Tests
//!
//! Typo detection, range validation and file loading of `ReflowConfig`,
//! exercised independently from the analysis pipeline.

use reflow_sentinel::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use reflow_sentinel::config::{ConfigError, ReflowConfig};
use reflow_sentinel::ZoneId;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_power_factor_threshold_warns_with_suggestion() {
    let toml_str = r#"
[thresholds.power_factor]
warnig_min = 0.92
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("thresholds.power_factor.warning_min"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_line_section_warns() {
    let toml_str = r#"
[line]
naem = "SMT-2"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("line.name"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[line]
name = "SMT-2"
site = "Plant East"
oven_model = "10-zone convection"
currency = "EUR"

[thresholds.power]
idle_power_max_kw = 14.0
critical_multiplier = 1.4

[thresholds.idle]
warning_minutes = 10.0
critical_minutes = 20.0

[cost]
energy_cost_per_kwh = 0.21

[recommendations]
low_pf_reading_fraction = 0.05

[analysis]
interval_minutes = 30

[zone_targets]
zone1 = 145.0
zone2 = 155.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
}

#[test]
fn garbage_key_warns_without_suggestion() {
    let warnings = validate_unknown_keys("totally_unrelated_setting = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
    assert!(suggest_correction("totally_unrelated_setting", &known_config_keys()).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn negative_standby_power_is_an_error() {
    let mut config = ReflowConfig::default();
    config.thresholds.power.standby_power_max_kw = -1.0;
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("standby_power_max_kw")));
}

#[test]
fn inverted_overshoot_tiers_fail_validation() {
    let mut config = ReflowConfig::default();
    config.thresholds.temperature.overshoot_critical_c = 5.0;
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("temperature.overshoot")), "got: {errors:?}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn zero_interval_fails_validation() {
    let mut config = ReflowConfig::default();
    config.analysis.interval_minutes = 0;
    assert!(config.validate().is_err());
}

#[test]
fn power_factor_above_one_fails_validation() {
    let mut config = ReflowConfig::default();
    config.thresholds.power_factor.target = 1.2;
    assert!(config.validate().is_err());
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reflow_config.toml");

    let mut config = ReflowConfig::default();
    config.line.name = "SMT-9".to_string();
    config.zone_targets.insert(ZoneId(11), 225.0);
    config.save_to_file(&path).unwrap();

    let loaded = ReflowConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.zone_target(ZoneId(11)), 225.0);
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reflow_config.toml");
    std::fs::write(
        &path,
        r#"
[thresholds.idle]
warning_minutes = 40.0
critical_minutes = 30.0
"#,
    )
    .unwrap();
    let err = ReflowConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "got: {err}");
}

#[test]
fn missing_file_is_io_error() {
    let err = ReflowConfig::load_from_file(std::path::Path::new("/nonexistent/reflow.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn bad_zone_key_fails_to_parse() {
    let err = ReflowConfig::from_toml_str("[zone_targets]\nzone_x = 150.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)), "got: {err}");
}
