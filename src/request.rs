//! Pipeline request model, JSON decoding, validation, and built-in presets.

use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::error::{RequestError, ValidationError};

/// Default Monte Carlo trial count.
pub const DEFAULT_ITERATIONS: usize = 300;
/// Default VPPA contract length in years.
pub const DEFAULT_CONTRACT_YEARS: u32 = 15;
/// Longest resource window accepted, in days.
pub const MAX_RANGE_DAYS: i64 = 3 * 366;

/// Site location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current IT load of the facility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadProfile {
    #[serde(rename = "averageKW")]
    pub average_kw: f64,
    #[serde(rename = "peakKW")]
    pub peak_kw: f64,
    #[serde(rename = "currentPUE")]
    pub current_pue: f64,
}

impl LoadProfile {
    /// IT load for a given hour of the day.
    ///
    /// A diurnal sinusoid peaking at 15:00 whose mean over a whole day is
    /// exactly `average_kw`. The swing is bounded so the load never goes
    /// negative.
    pub fn it_load_kw(&self, hour_of_day: u32) -> f64 {
        let amp = (self.peak_kw - self.average_kw).clamp(0.0, self.average_kw);
        let phase = 2.0 * std::f64::consts::PI * (f64::from(hour_of_day % 24) - 15.0) / 24.0;
        self.average_kw + amp * phase.cos()
    }

    /// Hourly IT load for a series of hours-of-day.
    pub fn hourly_it_load(&self, hours: impl IntoIterator<Item = u32>) -> Vec<f64> {
        hours.into_iter().map(|h| self.it_load_kw(h)).collect()
    }
}

/// Sizing constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Constraints {
    pub budget: f64,
    pub target_renewable_fraction: f64,
    #[serde(rename = "maxSolarKW", default, skip_serializing_if = "Option::is_none")]
    pub max_solar_kw: Option<f64>,
    #[serde(rename = "maxWindKW", default, skip_serializing_if = "Option::is_none")]
    pub max_wind_kw: Option<f64>,
    #[serde(rename = "maxBatteryKWh", default, skip_serializing_if = "Option::is_none")]
    pub max_battery_kwh: Option<f64>,
}

/// Energy prices and technology capital costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PricingConfig {
    #[serde(rename = "electricityUSDPerKWh")]
    pub electricity_usd_per_kwh: f64,
    #[serde(rename = "carbonUSDPerTon")]
    pub carbon_usd_per_ton: f64,
    #[serde(rename = "solarCapexUSDPerKW")]
    pub solar_capex_usd_per_kw: f64,
    #[serde(rename = "windCapexUSDPerKW")]
    pub wind_capex_usd_per_kw: f64,
    #[serde(rename = "batteryCapexUSDPerKWh")]
    pub battery_capex_usd_per_kwh: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<f64>,
}

/// Virtual power purchase agreement options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VppaConfig {
    #[serde(rename = "considerVPPA")]
    pub consider_vppa: bool,
    /// Strike price in USD/MWh.
    pub strike_price: f64,
    #[serde(default = "default_contract_years")]
    pub contract_duration: u32,
    /// Expected market price per contract year in USD/MWh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_curve: Option<Vec<f64>>,
    #[serde(rename = "contractedVolumeMWh", default, skip_serializing_if = "Option::is_none")]
    pub contracted_volume_mwh: Option<f64>,
}

fn default_contract_years() -> u32 {
    DEFAULT_CONTRACT_YEARS
}

/// Relative standard deviations applied during Monte Carlo trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VarianceFactors {
    pub price: f64,
    pub load: f64,
    pub renewable: f64,
}

impl Default for VarianceFactors {
    fn default() -> Self {
        Self {
            price: 0.15,
            load: 0.10,
            renewable: 0.12,
        }
    }
}

/// Monte Carlo options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SensitivityConfig {
    pub run_monte_carlo: bool,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub variance_factors: VarianceFactors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            run_monte_carlo: true,
            iterations: DEFAULT_ITERATIONS,
            variance_factors: VarianceFactors::default(),
            seed: None,
        }
    }
}

/// Inclusive window of calendar days for the resource series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    /// The full calendar year `year`.
    pub fn calendar_year(year: i32) -> Option<Self> {
        Some(Self {
            start_date: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end_date: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    /// Number of whole days in the range, both ends included.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Number of hourly records the range spans.
    pub fn hours(&self) -> usize {
        usize::try_from(self.days().max(0) * 24).unwrap_or(0)
    }
}

/// A complete planning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineRequest {
    pub coordinates: Coordinates,
    pub current_load: LoadProfile,
    pub constraints: Constraints,
    pub pricing: PricingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vppa: Option<VppaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl PipelineRequest {
    /// Available preset names.
    pub const PRESETS: &[&str] = &["bay_area", "vppa_hedge", "hot_climate"];

    /// San Francisco Bay Area colocation site with Monte Carlo enabled.
    pub fn bay_area() -> Self {
        Self {
            coordinates: Coordinates {
                latitude: 37.77,
                longitude: -122.42,
            },
            current_load: LoadProfile {
                average_kw: 1000.0,
                peak_kw: 1200.0,
                current_pue: 1.5,
            },
            constraints: Constraints {
                budget: 1_000_000.0,
                target_renewable_fraction: 0.8,
                max_solar_kw: None,
                max_wind_kw: None,
                max_battery_kwh: None,
            },
            pricing: PricingConfig {
                electricity_usd_per_kwh: 0.12,
                carbon_usd_per_ton: 50.0,
                solar_capex_usd_per_kw: 1000.0,
                wind_capex_usd_per_kw: 1500.0,
                battery_capex_usd_per_kwh: 400.0,
                discount_rate: None,
            },
            vppa: None,
            sensitivity: Some(SensitivityConfig::default()),
            date_range: None,
        }
    }

    /// Bay Area site evaluating a 10-year VPPA against a rising forward curve.
    pub fn vppa_hedge() -> Self {
        Self {
            vppa: Some(VppaConfig {
                consider_vppa: true,
                strike_price: 95.0,
                contract_duration: 10,
                forward_curve: Some(vec![90.0, 92.0, 95.0, 98.0, 100.0, 102.0, 105.0, 108.0]),
                contracted_volume_mwh: None,
            }),
            sensitivity: None,
            ..Self::bay_area()
        }
    }

    /// Phoenix-area site with a generous budget and per-technology caps.
    pub fn hot_climate() -> Self {
        Self {
            coordinates: Coordinates {
                latitude: 33.45,
                longitude: -112.07,
            },
            current_load: LoadProfile {
                average_kw: 2000.0,
                peak_kw: 2600.0,
                current_pue: 1.6,
            },
            constraints: Constraints {
                budget: 12_000_000.0,
                target_renewable_fraction: 0.5,
                max_solar_kw: Some(8000.0),
                max_wind_kw: Some(2000.0),
                max_battery_kwh: Some(10_000.0),
            },
            pricing: PricingConfig {
                electricity_usd_per_kwh: 0.10,
                carbon_usd_per_ton: 40.0,
                solar_capex_usd_per_kw: 900.0,
                wind_capex_usd_per_kw: 1400.0,
                battery_capex_usd_per_kwh: 350.0,
                discount_rate: Some(0.07),
            },
            vppa: None,
            sensitivity: Some(SensitivityConfig {
                iterations: 500,
                ..SensitivityConfig::default()
            }),
            date_range: None,
        }
    }

    /// Loads a request from a named preset.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::UnknownPreset` if the name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, RequestError> {
        match name {
            "bay_area" => Ok(Self::bay_area()),
            "vppa_hedge" => Ok(Self::vppa_hedge()),
            "hot_climate" => Ok(Self::hot_climate()),
            _ => Err(RequestError::UnknownPreset {
                name: name.to_string(),
                available: Self::PRESETS.join(", "),
            }),
        }
    }

    /// Parses a request from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a `RequestError` if the file cannot be read or the JSON is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self, RequestError> {
        let content = fs::read_to_string(path).map_err(|source| RequestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parses a request from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Json` on malformed input or unknown fields.
    pub fn from_json_str(s: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Resource window, falling back to the configured reference year.
    pub fn resolved_date_range(&self, config: &PlannerConfig) -> Option<DateRange> {
        self.date_range
            .or_else(|| DateRange::calendar_year(config.resource.reference_year))
    }

    /// Discount rate, falling back to the configured default.
    pub fn discount_rate(&self, config: &PlannerConfig) -> f64 {
        self.pricing
            .discount_rate
            .unwrap_or(config.finance.discount_rate)
    }

    /// Whether the Monte Carlo stage should run.
    pub fn wants_sensitivity(&self) -> bool {
        self.sensitivity.is_some_and(|s| s.run_monte_carlo)
    }

    /// VPPA settings, only when the analysis is requested.
    pub fn requested_vppa(&self) -> Option<&VppaConfig> {
        self.vppa.as_ref().filter(|v| v.consider_vppa)
    }

    /// Validates every numeric input and returns all problems found.
    ///
    /// Returns an empty vector if the request is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut check = |field: &str, ok: bool, message: &str| {
            if !ok {
                errors.push(ValidationError::new(field, message));
            }
        };

        let c = &self.coordinates;
        check(
            "coordinates.latitude",
            (-90.0..=90.0).contains(&c.latitude),
            "must be within [-90, 90]",
        );
        check(
            "coordinates.longitude",
            (-180.0..=180.0).contains(&c.longitude),
            "must be within [-180, 180]",
        );

        let l = &self.current_load;
        check(
            "currentLoad.averageKW",
            l.average_kw.is_finite() && l.average_kw > 0.0,
            "must be a finite value > 0",
        );
        check(
            "currentLoad.peakKW",
            l.peak_kw.is_finite() && l.peak_kw >= l.average_kw,
            "must be finite and >= averageKW",
        );
        check(
            "currentLoad.currentPUE",
            l.current_pue.is_finite() && l.current_pue >= 1.0,
            "must be a finite value >= 1.0",
        );

        let k = &self.constraints;
        check(
            "constraints.budget",
            k.budget.is_finite() && k.budget > 0.0,
            "must be a finite value > 0",
        );
        check(
            "constraints.targetRenewableFraction",
            (0.0..=1.0).contains(&k.target_renewable_fraction),
            "must be within [0, 1]",
        );
        for (field, cap) in [
            ("constraints.maxSolarKW", k.max_solar_kw),
            ("constraints.maxWindKW", k.max_wind_kw),
            ("constraints.maxBatteryKWh", k.max_battery_kwh),
        ] {
            if let Some(v) = cap {
                check(field, v.is_finite() && v >= 0.0, "must be a finite value >= 0");
            }
        }

        let p = &self.pricing;
        for (field, value) in [
            ("pricing.electricityUSDPerKWh", p.electricity_usd_per_kwh),
            ("pricing.solarCapexUSDPerKW", p.solar_capex_usd_per_kw),
            ("pricing.windCapexUSDPerKW", p.wind_capex_usd_per_kw),
            ("pricing.batteryCapexUSDPerKWh", p.battery_capex_usd_per_kwh),
        ] {
            check(field, value.is_finite() && value > 0.0, "must be a finite value > 0");
        }
        check(
            "pricing.carbonUSDPerTon",
            p.carbon_usd_per_ton.is_finite() && p.carbon_usd_per_ton >= 0.0,
            "must be a finite value >= 0",
        );
        if let Some(r) = p.discount_rate {
            check(
                "pricing.discountRate",
                r.is_finite() && r > -1.0 && r < 1.0,
                "must be within (-1, 1)",
            );
        }

        if let Some(v) = &self.vppa {
            check(
                "vppa.strikePrice",
                v.strike_price.is_finite() && v.strike_price >= 0.0,
                "must be a finite value >= 0",
            );
            check("vppa.contractDuration", v.contract_duration > 0, "must be > 0");
            if let Some(curve) = &v.forward_curve {
                check(
                    "vppa.forwardCurve",
                    curve.iter().all(|x| x.is_finite() && *x >= 0.0),
                    "every price must be a finite value >= 0",
                );
            }
            if let Some(volume) = v.contracted_volume_mwh {
                check(
                    "vppa.contractedVolumeMWh",
                    volume.is_finite() && volume >= 0.0,
                    "must be a finite value >= 0",
                );
            }
        }

        if let Some(s) = &self.sensitivity {
            if s.run_monte_carlo {
                check("sensitivity.iterations", s.iterations > 0, "must be > 0");
            }
            let vf = &s.variance_factors;
            for (field, value) in [
                ("sensitivity.varianceFactors.price", vf.price),
                ("sensitivity.varianceFactors.load", vf.load),
                ("sensitivity.varianceFactors.renewable", vf.renewable),
            ] {
                check(field, (0.0..=1.0).contains(&value), "must be within [0, 1]");
            }
        }

        if let Some(r) = &self.date_range {
            check(
                "dateRange.endDate",
                r.end_date >= r.start_date,
                "must not precede startDate",
            );
            check(
                "dateRange",
                r.days() <= MAX_RANGE_DAYS,
                "must span at most three years",
            );
            check(
                "dateRange.startDate",
                r.start_date.year() >= 1940,
                "must be in 1940 or later",
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A_JSON: &str = r#"{
        "coordinates": {"latitude": 37.77, "longitude": -122.42},
        "currentLoad": {"averageKW": 1000, "peakKW": 1200, "currentPUE": 1.5},
        "constraints": {"budget": 1000000, "targetRenewableFraction": 0.8},
        "pricing": {
            "electricityUSDPerKWh": 0.12,
            "carbonUSDPerTon": 50,
            "solarCapexUSDPerKW": 1000,
            "windCapexUSDPerKW": 1500,
            "batteryCapexUSDPerKWh": 400
        },
        "sensitivity": {"runMonteCarlo": true}
    }"#;

    #[test]
    fn parses_external_field_names() {
        let req = PipelineRequest::from_json_str(SCENARIO_A_JSON).unwrap();
        assert_eq!(req.current_load.average_kw, 1000.0);
        assert_eq!(req.current_load.current_pue, 1.5);
        assert_eq!(req.constraints.target_renewable_fraction, 0.8);
        assert_eq!(req.pricing.solar_capex_usd_per_kw, 1000.0);
        assert!(req.validate().is_empty());
    }

    #[test]
    fn omitted_sensitivity_knobs_take_defaults() {
        let req = PipelineRequest::from_json_str(SCENARIO_A_JSON).unwrap();
        let s = req.sensitivity.unwrap();
        assert_eq!(s.iterations, 300);
        assert_eq!(s.variance_factors.price, 0.15);
        assert_eq!(s.variance_factors.load, 0.10);
        assert_eq!(s.variance_factors.renewable, 0.12);
        assert!(req.wants_sensitivity());
    }

    #[test]
    fn vppa_contract_duration_defaults_to_fifteen() {
        let v: VppaConfig =
            serde_json::from_str(r#"{"considerVPPA": true, "strikePrice": 60}"#).unwrap();
        assert_eq!(v.contract_duration, 15);
        assert!(v.forward_curve.is_none());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let bad = SCENARIO_A_JSON.replace("\"budget\"", "\"budgetUSD\"");
        assert!(matches!(
            PipelineRequest::from_json_str(&bad),
            Err(RequestError::Json(_))
        ));
    }

    #[test]
    fn validate_flags_out_of_range_values() {
        let mut req = PipelineRequest::bay_area();
        req.coordinates.latitude = 91.0;
        req.constraints.target_renewable_fraction = 1.2;
        req.current_load.peak_kw = 500.0;
        req.pricing.electricity_usd_per_kwh = f64::NAN;
        let fields: Vec<String> = req.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "coordinates.latitude",
                "currentLoad.peakKW",
                "constraints.targetRenewableFraction",
                "pricing.electricityUSDPerKWh",
            ]
        );
    }

    #[test]
    fn it_load_averages_to_mean_over_a_day() {
        let load = PipelineRequest::bay_area().current_load;
        let day: Vec<f64> = load.hourly_it_load(0..24);
        let mean = day.iter().sum::<f64>() / 24.0;
        assert!((mean - 1000.0).abs() < 1e-9);
        let max = day.iter().copied().fold(f64::MIN, f64::max);
        assert!((max - 1200.0).abs() < 1e-9);
        assert!((load.it_load_kw(15) - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn default_range_is_reference_year() {
        let req = PipelineRequest::bay_area();
        let range = req.resolved_date_range(&PlannerConfig::default()).unwrap();
        assert_eq!(range.days(), 365);
        assert_eq!(range.hours(), 8760);
    }

    #[test]
    fn presets_are_valid() {
        for name in PipelineRequest::PRESETS {
            let req = PipelineRequest::from_preset(name).unwrap();
            assert!(req.validate().is_empty(), "preset {name} invalid");
        }
        assert!(matches!(
            PipelineRequest::from_preset("nope"),
            Err(RequestError::UnknownPreset { .. })
        ));
    }
}
