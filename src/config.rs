//! TOML-based planner configuration.
//!
//! Every knob that a request does not carry lives here with a default, so an
//! empty TOML document (or no file at all) yields a working planner.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::ValidationError;

/// Top-level planner configuration parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Weather data acquisition and caching.
    #[serde(default)]
    pub resource: ResourceConfig,
    /// Dispatch model and search limits for capacity sizing.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Cooling-efficiency model parameters.
    #[serde(default)]
    pub pue: PueConfig,
    /// Discounting, emissions, and operating cost assumptions.
    #[serde(default)]
    pub finance: FinanceConfig,
    /// Monte Carlo defaults.
    #[serde(default)]
    pub sensitivity: SensitivitySettings,
    /// Environmental equivalence factors.
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

/// Weather data acquisition and caching.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceConfig {
    /// Base URL of the historical weather archive.
    pub api_base_url: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Cache entry lifetime in hours.
    pub cache_ttl_hours: u64,
    /// Calendar year used when a request carries no date range.
    pub reference_year: i32,
    /// Skip the external source and synthesize directly.
    pub offline: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            timeout_secs: 20,
            cache_ttl_hours: 6,
            reference_year: 2023,
            offline: false,
        }
    }
}

/// Dispatch model and search limits for capacity sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Battery energy-to-power ratio in hours.
    pub battery_duration_hours: f64,
    /// Battery charge efficiency (0..1].
    pub eta_charge: f64,
    /// Battery discharge efficiency (0..1].
    pub eta_discharge: f64,
    /// PV system performance ratio (0..1].
    pub solar_performance_ratio: f64,
    /// Turbine hub height in metres.
    pub hub_height_m: f64,
    /// Upper bound on local search rounds.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            battery_duration_hours: 4.0,
            eta_charge: 0.95,
            eta_discharge: 0.95,
            solar_performance_ratio: 0.80,
            hub_height_m: 80.0,
            max_iterations: 400,
        }
    }
}

/// Cooling-efficiency model parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PueConfig {
    /// PUE multiplier applied when any renewable generation is installed.
    pub renewable_cooling_factor: f64,
    /// Placeholder electricity rate for the provisional cooling-cost estimate.
    pub provisional_rate_usd_per_kwh: f64,
}

impl Default for PueConfig {
    fn default() -> Self {
        Self {
            renewable_cooling_factor: 0.95,
            provisional_rate_usd_per_kwh: 0.10,
        }
    }
}

/// Discounting, emissions, and operating cost assumptions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinanceConfig {
    /// Annual discount rate used when the request does not supply one.
    pub discount_rate: f64,
    /// Grid emission factor in tonnes CO2 per MWh.
    pub grid_emission_t_per_mwh: f64,
    /// Annual O&M cost as a fraction of total investment.
    pub opex_fraction: f64,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            discount_rate: 0.08,
            grid_emission_t_per_mwh: 0.4,
            opex_fraction: 0.015,
        }
    }
}

/// Monte Carlo defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensitivitySettings {
    /// Base seed when the request does not supply one.
    pub seed: u64,
    /// Payback above this many months counts as a risk event.
    pub payback_threshold_months: f64,
    /// Evaluate trials on the rayon thread pool.
    pub parallel: bool,
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            seed: 42,
            payback_threshold_months: 120.0,
            parallel: true,
        }
    }
}

/// Environmental equivalence factors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Annual tailpipe emissions of one passenger car, tonnes CO2.
    pub co2_tons_per_car: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            co2_tons_per_car: 4.6,
        }
    }
}

/// Configuration loading failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read \"{path}\": {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PlannerConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let r = &self.resource;
        if r.timeout_secs == 0 {
            errors.push(ValidationError::new("resource.timeout_secs", "must be > 0"));
        }
        if !(1900..=2100).contains(&r.reference_year) {
            errors.push(ValidationError::new(
                "resource.reference_year",
                "must be within [1900, 2100]",
            ));
        }

        let o = &self.optimizer;
        if !(o.battery_duration_hours > 0.0) {
            errors.push(ValidationError::new(
                "optimizer.battery_duration_hours",
                "must be > 0",
            ));
        }
        for (field, value) in [
            ("optimizer.eta_charge", o.eta_charge),
            ("optimizer.eta_discharge", o.eta_discharge),
            ("optimizer.solar_performance_ratio", o.solar_performance_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(ValidationError::new(field, "must be in (0.0, 1.0]"));
            }
        }
        if !(o.hub_height_m >= 10.0) {
            errors.push(ValidationError::new("optimizer.hub_height_m", "must be >= 10"));
        }
        if o.max_iterations == 0 {
            errors.push(ValidationError::new("optimizer.max_iterations", "must be > 0"));
        }

        let p = &self.pue;
        if !(p.renewable_cooling_factor > 0.0 && p.renewable_cooling_factor <= 1.0) {
            errors.push(ValidationError::new(
                "pue.renewable_cooling_factor",
                "must be in (0.0, 1.0]",
            ));
        }
        if !(p.provisional_rate_usd_per_kwh >= 0.0) {
            errors.push(ValidationError::new(
                "pue.provisional_rate_usd_per_kwh",
                "must be >= 0",
            ));
        }

        let f = &self.finance;
        if !(f.discount_rate > -1.0 && f.discount_rate.is_finite()) {
            errors.push(ValidationError::new("finance.discount_rate", "must be > -1"));
        }
        if !(f.grid_emission_t_per_mwh >= 0.0) {
            errors.push(ValidationError::new(
                "finance.grid_emission_t_per_mwh",
                "must be >= 0",
            ));
        }
        if !(f.opex_fraction >= 0.0) {
            errors.push(ValidationError::new("finance.opex_fraction", "must be >= 0"));
        }

        if !(self.sensitivity.payback_threshold_months > 0.0) {
            errors.push(ValidationError::new(
                "sensitivity.payback_threshold_months",
                "must be > 0",
            ));
        }
        if !(self.environment.co2_tons_per_car > 0.0) {
            errors.push(ValidationError::new(
                "environment.co2_tons_per_car",
                "must be > 0",
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let errors = PlannerConfig::default().validate();
        assert!(errors.is_empty(), "errors: {errors:?}");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = PlannerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.resource.cache_ttl_hours, 6);
        assert_eq!(cfg.finance.discount_rate, 0.08);
        assert_eq!(cfg.sensitivity.seed, 42);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = PlannerConfig::from_toml_str(
            r#"
            [finance]
            discount_rate = 0.05

            [resource]
            offline = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.finance.discount_rate, 0.05);
        assert_eq!(cfg.finance.opex_fraction, 0.015);
        assert!(cfg.resource.offline);
        assert_eq!(cfg.resource.timeout_secs, 20);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = PlannerConfig::from_toml_str("[finance]\nbogus = 1\n").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn validate_reports_every_bad_field() {
        let mut cfg = PlannerConfig::default();
        cfg.optimizer.eta_charge = 0.0;
        cfg.optimizer.max_iterations = 0;
        cfg.pue.renewable_cooling_factor = 1.5;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "optimizer.eta_charge",
                "optimizer.max_iterations",
                "pue.renewable_cooling_factor"
            ]
        );
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PlannerConfig::from_toml_file(Path::new("/nonexistent/planner.toml"));
        assert!(matches!(err, Err(ConfigError::Read { .. })));
    }
}
