//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Unknown keys are found in a first pass over the raw `toml::Value` tree,
//! before serde runs. They only produce warnings, so a config with a typo
//! still loads with the stock value for the misspelled field.

use std::collections::HashSet;

use crate::types::ZoneId;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `ReflowConfig`, except the open
/// `zone_targets.zoneN` entries which are checked by pattern.
///
/// Maintained by hand alongside reflow_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [line]
        "line",
        "line.name",
        "line.site",
        "line.oven_model",
        "line.currency",
        // [thresholds]
        "thresholds",
        "thresholds.power",
        "thresholds.power.idle_power_max_kw",
        "thresholds.power.critical_multiplier",
        "thresholds.power.standby_power_max_kw",
        "thresholds.power_factor",
        "thresholds.power_factor.warning_min",
        "thresholds.power_factor.critical_min",
        "thresholds.power_factor.target",
        "thresholds.temperature",
        "thresholds.temperature.overshoot_warning_c",
        "thresholds.temperature.overshoot_critical_c",
        "thresholds.temperature.undershoot_warning_c",
        "thresholds.temperature.undershoot_critical_c",
        "thresholds.temperature.zone_imbalance_c",
        "thresholds.temperature.default_target_c",
        "thresholds.temperature.ramp_rate_max_c_per_min",
        "thresholds.temperature.blower_deviation_max_c",
        "thresholds.idle",
        "thresholds.idle.min_duration_minutes",
        "thresholds.idle.warning_minutes",
        "thresholds.idle.critical_minutes",
        "thresholds.idle.recoverable_fraction",
        "thresholds.production",
        "thresholds.production.target_kwh_per_board",
        "thresholds.production.optimal_percent",
        "thresholds.production.acceptable_percent",
        // [cost]
        "cost",
        "cost.energy_cost_per_kwh",
        "cost.assumed_finding_hours",
        "cost.kw_per_degree_overshoot",
        // [recommendations]
        "recommendations",
        "recommendations.idle_waste_min_kwh",
        "recommendations.low_pf_reading_fraction",
        "recommendations.temperature_waste_min_kwh",
        // [analysis]
        "analysis",
        "analysis.interval_minutes",
        "analysis.efficiency_window_minutes",
        // [zone_targets]
        "zone_targets",
    ];
    keys.iter().copied().collect()
}

/// `zone_targets.<zone>` where `<zone>` parses as a zone identifier.
fn is_zone_target_key(key: &str) -> bool {
    key.strip_prefix("zone_targets.")
        .is_some_and(|zone| ZoneId::parse(zone).is_some())
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3, ties broken alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Syntax errors yield no warnings here; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()) && !is_zone_target_key(key))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed `ReflowConfig`.
///
/// Returns (errors, warnings): errors are impossible values that must
/// reject the config; warnings are suspicious but usable.
pub fn validate_physical_ranges(
    config: &super::ReflowConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let t = &config.thresholds;

    if t.power.idle_power_max_kw <= 0.0 {
        errors.push(format!(
            "power.idle_power_max_kw = {:.1} must be > 0",
            t.power.idle_power_max_kw
        ));
    }
    if t.power.standby_power_max_kw < 0.0 {
        errors.push(format!(
            "power.standby_power_max_kw = {:.1} cannot be negative",
            t.power.standby_power_max_kw
        ));
    }

    // SnPb and lead-free profiles both stay well inside 0-400 °C
    for (zone, target) in &config.zone_targets {
        if !(0.0..=400.0).contains(target) {
            errors.push(format!(
                "zone_targets.{zone} = {target:.1} is outside physical range (0-400 °C)"
            ));
        }
    }
    let fallback = t.temperature.default_target_c;
    if !(0.0..=400.0).contains(&fallback) {
        errors.push(format!(
            "temperature.default_target_c = {fallback:.1} is outside physical range (0-400 °C)"
        ));
    }

    if config.cost.assumed_finding_hours <= 0.0 {
        errors.push(format!(
            "cost.assumed_finding_hours = {:.2} must be > 0",
            config.cost.assumed_finding_hours
        ));
    }
    if config.cost.kw_per_degree_overshoot < 0.0 {
        errors.push(format!(
            "cost.kw_per_degree_overshoot = {:.3} cannot be negative",
            config.cost.kw_per_degree_overshoot
        ));
    }

    // Reflow oven idle draw is tens of kW; hundreds suggests W/kW confusion
    if t.power.idle_power_max_kw > 200.0 {
        warnings.push(ValidationWarning {
            field: "thresholds.power.idle_power_max_kw".to_string(),
            message: format!(
                "idle_power_max_kw = {:.1} is outside typical range (1-200 kW)",
                t.power.idle_power_max_kw
            ),
            suggestion: None,
        });
    }

    if t.temperature.zone_imbalance_c <= 0.0 || t.temperature.zone_imbalance_c > 100.0 {
        warnings.push(ValidationWarning {
            field: "thresholds.temperature.zone_imbalance_c".to_string(),
            message: format!(
                "zone_imbalance_c = {:.1} is outside typical range (0-100 °C)",
                t.temperature.zone_imbalance_c
            ),
            suggestion: None,
        });
    }

    let gate = config.recommendations.low_pf_reading_fraction;
    if !(0.0..=1.0).contains(&gate) {
        warnings.push(ValidationWarning {
            field: "recommendations.low_pf_reading_fraction".to_string(),
            message: format!(
                "low_pf_reading_fraction = {gate:.2} is a fraction; values outside 0-1 disable or always fire the gate"
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReflowConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("standby", "standby"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("imbalnce", "imbalance"), 1);
    }

    #[test]
    fn test_levenshtein_counts_chars_not_bytes() {
        assert_eq!(levenshtein("°C", "C"), 1);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [thresholds]
            [thresholds.power]
            idle_power_max_kw = 15.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"thresholds".to_string()));
        assert!(keys.contains(&"thresholds.power".to_string()));
        assert!(keys.contains(&"thresholds.power.idle_power_max_kw".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[thresholds.power]
idle_power_max_kv = 12.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("idle_power_max_kv"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("thresholds.power.idle_power_max_kw")
        );
    }

    #[test]
    fn test_zone_target_keys_are_accepted() {
        let toml_str = r#"
[zone_targets]
zone1 = 150.0
zone12 = 235.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_malformed_zone_target_key_warns() {
        let toml_str = r#"
[zone_targets]
zone_x = 150.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1, "got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let toml_str = r#"
[thresholds.conveyor]
speed_max = 2.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field.contains("conveyor")));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_physical_range_defaults_clean() {
        let (errors, warnings) = validate_physical_ranges(&ReflowConfig::default());
        assert!(errors.is_empty(), "Defaults should produce no errors: {:?}", errors);
        assert!(warnings.is_empty(), "Defaults should produce no warnings: {:?}", warnings);
    }

    #[test]
    fn test_physical_range_zone_target_out_of_range() {
        let mut config = ReflowConfig::default();
        config.zone_targets.insert(ZoneId(3), 900.0);
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("zone_targets.zone3")), "got: {:?}", errors);
    }

    #[test]
    fn test_physical_range_idle_power_suspicious() {
        let mut config = ReflowConfig::default();
        config.thresholds.power.idle_power_max_kw = 15_000.0;
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field.contains("idle_power_max_kw")));
    }
}
