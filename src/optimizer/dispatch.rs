//! Hourly dispatch of a candidate plan against facility load.

use serde::{Deserialize, Serialize};

use super::battery::Battery;
use crate::config::OptimizerConfig;
use crate::resource::ResourceSeries;

/// Hours in a non-leap year; used to annualize shorter or longer windows.
pub const HOURS_PER_YEAR: f64 = 8760.0;

const CUT_IN_M_S: f64 = 3.0;
const RATED_M_S: f64 = 12.0;
const CUT_OUT_M_S: f64 = 25.0;
const SHEAR_EXPONENT: f64 = 1.0 / 7.0;
const REFERENCE_HEIGHT_M: f64 = 10.0;

/// Per-kW PV output for a given irradiance.
pub fn solar_capacity_factor(irradiance_w_m2: f64, performance_ratio: f64) -> f64 {
    (irradiance_w_m2 / 1000.0 * performance_ratio).clamp(0.0, 1.0)
}

/// Per-kW turbine output for a 10 m wind speed, extrapolated to hub height.
pub fn wind_capacity_factor(wind_10m_m_s: f64, hub_height_m: f64) -> f64 {
    let v = wind_10m_m_s.max(0.0) * (hub_height_m / REFERENCE_HEIGHT_M).powf(SHEAR_EXPONENT);
    if !(CUT_IN_M_S..CUT_OUT_M_S).contains(&v) {
        0.0
    } else if v >= RATED_M_S {
        1.0
    } else {
        (v.powi(3) - CUT_IN_M_S.powi(3)) / (RATED_M_S.powi(3) - CUT_IN_M_S.powi(3))
    }
}

/// Hourly per-kW output profiles for solar and wind.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityFactors {
    pub solar: Vec<f64>,
    pub wind: Vec<f64>,
}

impl CapacityFactors {
    pub fn from_series(series: &ResourceSeries, config: &OptimizerConfig) -> Self {
        let solar = series
            .records
            .iter()
            .map(|r| solar_capacity_factor(r.irradiance_w_m2, config.solar_performance_ratio))
            .collect();
        let wind = series
            .records
            .iter()
            .map(|r| wind_capacity_factor(r.wind_speed_m_s, config.hub_height_m))
            .collect();
        Self { solar, wind }
    }

    pub fn len(&self) -> usize {
        self.solar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solar.is_empty()
    }

    pub fn mean_solar(&self) -> f64 {
        mean(&self.solar)
    }

    pub fn mean_wind(&self) -> f64 {
        mean(&self.wind)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Installed capacities of a candidate plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Capacities {
    pub solar_kw: f64,
    pub wind_kw: f64,
    pub battery_kwh: f64,
}

impl Capacities {
    pub fn has_generation(&self) -> bool {
        self.solar_kw + self.wind_kw > 0.0
    }
}

/// Battery operating parameters for dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchParams {
    pub battery_duration_hours: f64,
    pub eta_charge: f64,
    pub eta_discharge: f64,
}

impl From<&OptimizerConfig> for DispatchParams {
    fn from(c: &OptimizerConfig) -> Self {
        Self {
            battery_duration_hours: c.battery_duration_hours,
            eta_charge: c.eta_charge,
            eta_discharge: c.eta_discharge,
        }
    }
}

/// Energy totals from one dispatch run, in kWh over the simulated window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub hours: usize,
    pub load_kwh: f64,
    pub generation_kwh: f64,
    pub direct_kwh: f64,
    pub battery_discharge_kwh: f64,
    pub curtailed_kwh: f64,
    pub renewable_fraction: f64,
}

impl DispatchSummary {
    /// Load met by generation, directly or via storage.
    pub fn renewable_served_kwh(&self) -> f64 {
        self.direct_kwh + self.battery_discharge_kwh
    }

    /// Multiplier converting window totals to annual totals.
    pub fn annualization(&self) -> f64 {
        if self.hours == 0 {
            0.0
        } else {
            HOURS_PER_YEAR / self.hours as f64
        }
    }
}

/// Simulates hourly dispatch of `plan` against `load_kw`.
///
/// Generation serves load first; surplus charges the battery (the rest is
/// curtailed); deficits are met from the battery before the grid. The
/// battery starts empty.
pub fn simulate(
    factors: &CapacityFactors,
    load_kw: &[f64],
    plan: &Capacities,
    params: &DispatchParams,
) -> DispatchSummary {
    let mut battery = Battery::with_duration(
        plan.battery_kwh,
        0.0,
        params.battery_duration_hours,
        params.eta_charge,
        params.eta_discharge,
    );

    let hours = load_kw.len().min(factors.len());
    let mut s = DispatchSummary {
        hours,
        ..DispatchSummary::default()
    };

    for (t, &load) in load_kw.iter().enumerate().take(hours) {
        let generation = plan.solar_kw * factors.solar[t] + plan.wind_kw * factors.wind[t];
        let direct = generation.min(load);
        let surplus = generation - direct;
        let deficit = load - direct;

        let mut discharged = 0.0;
        let mut curtailed = surplus;
        if surplus > 0.0 {
            curtailed -= battery.dispatch_kw(surplus, 1.0);
        } else if deficit > 0.0 {
            discharged = -battery.dispatch_kw(-deficit, 1.0);
        }

        s.load_kwh += load;
        s.generation_kwh += generation;
        s.direct_kwh += direct;
        s.battery_discharge_kwh += discharged;
        s.curtailed_kwh += curtailed;
    }

    s.renewable_fraction = if s.load_kwh > 0.0 {
        (s.renewable_served_kwh() / s.load_kwh).clamp(0.0, 1.0)
    } else {
        0.0
    };
    s
}
