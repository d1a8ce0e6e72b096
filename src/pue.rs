//! Weather-driven power usage effectiveness (PUE) forecast.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PueConfig;
use crate::error::{StageError, ensure_finite};
use crate::optimizer::{CapacityPlan, HOURS_PER_YEAR};
use crate::request::LoadProfile;
use crate::resource::ResourceSeries;

/// PUE for an outdoor dry-bulb temperature, before any renewable adjustment.
///
/// Piecewise linear and continuous at 10, 25, and 35 °C; saturates at 1.80.
pub fn pue_for_temperature(temp_c: f64) -> f64 {
    if temp_c < 10.0 {
        1.20
    } else if temp_c < 25.0 {
        1.20 + (temp_c - 10.0) / 15.0 * 0.20
    } else if temp_c < 35.0 {
        1.40 + (temp_c - 25.0) / 10.0 * 0.20
    } else {
        1.60 + ((temp_c - 35.0) / 10.0).min(0.20)
    }
}

/// One hour of the PUE forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyPue {
    pub timestamp: NaiveDateTime,
    pub outdoor_temp_c: f64,
    pub pue_factor: f64,
    pub it_load_kw: f64,
    pub total_facility_load_kw: f64,
}

/// Hourly PUE forecast and its annual aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PueProfile {
    pub baseline_pue: f64,
    /// Mean of the hourly factors.
    pub adjusted_pue: f64,
    pub improvement_pct: f64,
    pub annual_energy_savings_kwh: f64,
    /// Mean of facility load minus IT load.
    pub avg_cooling_overhead_kw: f64,
    pub peak_facility_load_kw: f64,
    /// Annualized facility consumption at the adjusted PUE.
    pub annual_facility_energy_kwh: f64,
    /// Cooling savings at a placeholder rate; superseded by the financial stage.
    pub provisional_cost_savings_usd: f64,
    pub renewable_adjusted: bool,
    pub hourly: Vec<HourlyPue>,
}

impl PueProfile {
    /// Hourly facility load in kW.
    pub fn facility_load_kw(&self) -> Vec<f64> {
        self.hourly.iter().map(|h| h.total_facility_load_kw).collect()
    }
}

/// Predicts hourly PUE from outdoor temperature.
#[derive(Debug, Clone, Default)]
pub struct PuePredictor {
    config: PueConfig,
}

impl PuePredictor {
    pub fn new(config: PueConfig) -> Self {
        Self { config }
    }

    /// Builds the hourly PUE profile for a site's weather, load, and plan.
    ///
    /// A pure function of its inputs.
    ///
    /// # Errors
    ///
    /// Returns `StageError::MalformedData` for an empty series or a
    /// non-finite temperature, and `StageError::NumericDomain` if any
    /// aggregate is not finite.
    pub fn predict(
        &self,
        series: &ResourceSeries,
        load: &LoadProfile,
        plan: &CapacityPlan,
    ) -> Result<PueProfile, StageError> {
        if series.is_empty() {
            return Err(StageError::MalformedData(
                "no temperature readings to forecast PUE".to_string(),
            ));
        }
        if let Some(bad) = series.records.iter().find(|r| !r.temperature_c.is_finite()) {
            return Err(StageError::MalformedData(format!(
                "non-finite temperature at {}",
                bad.timestamp
            )));
        }

        let multiplier = if plan.has_generation() {
            self.config.renewable_cooling_factor
        } else {
            1.0
        };

        let hourly: Vec<HourlyPue> = series
            .records
            .iter()
            .zip(series.hours_of_day())
            .map(|(r, hour)| {
                let pue_factor = pue_for_temperature(r.temperature_c) * multiplier;
                let it_load_kw = load.it_load_kw(hour);
                HourlyPue {
                    timestamp: r.timestamp,
                    outdoor_temp_c: r.temperature_c,
                    pue_factor,
                    it_load_kw,
                    total_facility_load_kw: it_load_kw * pue_factor,
                }
            })
            .collect();

        let n = hourly.len() as f64;
        let adjusted_pue = hourly.iter().map(|h| h.pue_factor).sum::<f64>() / n;
        let avg_cooling_overhead_kw = hourly
            .iter()
            .map(|h| h.total_facility_load_kw - h.it_load_kw)
            .sum::<f64>()
            / n;
        let peak_facility_load_kw = hourly
            .iter()
            .map(|h| h.total_facility_load_kw)
            .fold(0.0, f64::max);
        let annual_facility_energy_kwh =
            hourly.iter().map(|h| h.total_facility_load_kw).sum::<f64>() * HOURS_PER_YEAR / n;

        let baseline_pue = load.current_pue;
        let improvement_pct = (baseline_pue - adjusted_pue) / baseline_pue * 100.0;
        let annual_energy_savings_kwh = ensure_finite(
            "annual_energy_savings_kwh",
            (baseline_pue - adjusted_pue) * load.average_kw * HOURS_PER_YEAR,
        )?;
        let provisional_cost_savings_usd =
            annual_energy_savings_kwh * self.config.provisional_rate_usd_per_kwh;

        info!(
            adjusted_pue,
            baseline_pue,
            improvement_pct,
            annual_energy_savings_kwh,
            "PUE forecast complete"
        );

        Ok(PueProfile {
            baseline_pue,
            adjusted_pue: ensure_finite("adjusted_pue", adjusted_pue)?,
            improvement_pct: ensure_finite("improvement_pct", improvement_pct)?,
            annual_energy_savings_kwh,
            avg_cooling_overhead_kw: ensure_finite("avg_cooling_overhead_kw", avg_cooling_overhead_kw)?,
            peak_facility_load_kw,
            annual_facility_energy_kwh: ensure_finite(
                "annual_facility_energy_kwh",
                annual_facility_energy_kwh,
            )?,
            provisional_cost_savings_usd,
            renewable_adjusted: multiplier < 1.0,
            hourly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::PlanStatus;
    use crate::request::{Coordinates, DateRange};
    use crate::resource::{ChannelProvenance, HourlyResource, Provenance};
    use chrono::NaiveDate;

    fn series_with_temps(temps: &[f64]) -> ResourceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ResourceSeries {
            coordinates: Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            },
            range: DateRange::calendar_year(2023).unwrap(),
            provenance: ChannelProvenance::all(Provenance::Synthetic),
            source: "test".into(),
            records: temps
                .iter()
                .enumerate()
                .map(|(i, t)| HourlyResource {
                    timestamp: start + chrono::Duration::hours(i as i64),
                    irradiance_w_m2: 0.0,
                    wind_speed_m_s: 0.0,
                    hydro_availability: 0.0,
                    temperature_c: *t,
                })
                .collect(),
        }
    }

    fn flat_load() -> LoadProfile {
        LoadProfile {
            average_kw: 1000.0,
            peak_kw: 1000.0,
            current_pue: 1.5,
        }
    }

    fn plan(solar_kw: f64) -> CapacityPlan {
        CapacityPlan {
            solar_kw,
            wind_kw: 0.0,
            battery_kwh: 0.0,
            renewable_fraction: 0.0,
            total_cost_usd: 0.0,
            status: PlanStatus::TargetMet,
        }
    }

    #[test]
    fn piecewise_values_at_anchor_points() {
        assert_eq!(pue_for_temperature(-5.0), 1.20);
        assert!((pue_for_temperature(17.5) - 1.30).abs() < 1e-12);
        assert!((pue_for_temperature(30.0) - 1.50).abs() < 1e-12);
        assert!((pue_for_temperature(36.0) - 1.70).abs() < 1e-12);
        assert!((pue_for_temperature(37.0) - 1.80).abs() < 1e-12);
        assert!((pue_for_temperature(40.0) - 1.80).abs() < 1e-12);
        assert!((pue_for_temperature(60.0) - 1.80).abs() < 1e-12);
    }

    #[test]
    fn continuous_at_breakpoints() {
        for edge in [10.0, 25.0, 35.0] {
            let below = pue_for_temperature(edge - 1e-9);
            let at = pue_for_temperature(edge);
            assert!((below - at).abs() < 1e-6, "jump at {edge}: {below} vs {at}");
        }
    }

    #[test]
    fn renewables_apply_cooling_factor() {
        let s = series_with_temps(&[5.0; 24]);
        let without = PuePredictor::default().predict(&s, &flat_load(), &plan(0.0)).unwrap();
        let with = PuePredictor::default().predict(&s, &flat_load(), &plan(100.0)).unwrap();
        assert!((without.adjusted_pue - 1.20).abs() < 1e-12);
        assert!((with.adjusted_pue - 1.14).abs() < 1e-12);
        assert!(with.renewable_adjusted);
        assert!(!without.renewable_adjusted);
    }

    #[test]
    fn aggregates_follow_definitions() {
        let s = series_with_temps(&[5.0; 24]);
        let p = PuePredictor::default().predict(&s, &flat_load(), &plan(0.0)).unwrap();
        assert!((p.improvement_pct - 20.0).abs() < 1e-9);
        assert!((p.annual_energy_savings_kwh - 0.3 * 1000.0 * 8760.0).abs() < 1e-6);
        assert!((p.avg_cooling_overhead_kw - 200.0).abs() < 1e-9);
        assert!((p.provisional_cost_savings_usd - 0.3 * 1000.0 * 8760.0 * 0.10).abs() < 1e-6);
        assert_eq!(p.hourly.len(), 24);
        assert!((p.hourly[3].total_facility_load_kw - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn prediction_is_pure() {
        let s = series_with_temps(&[3.0, 12.0, 27.0, 36.0, 44.0, 18.0]);
        let a = PuePredictor::default().predict(&s, &flat_load(), &plan(50.0)).unwrap();
        let b = PuePredictor::default().predict(&s, &flat_load(), &plan(50.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_inputs_are_fatal() {
        let empty = series_with_temps(&[]);
        let err = PuePredictor::default()
            .predict(&empty, &flat_load(), &plan(0.0))
            .unwrap_err();
        assert!(!err.is_recoverable());

        let nan = series_with_temps(&[10.0, f64::NAN]);
        assert!(matches!(
            PuePredictor::default().predict(&nan, &flat_load(), &plan(0.0)),
            Err(StageError::MalformedData(_))
        ));
    }
}
