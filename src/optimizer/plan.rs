//! Capacity plan and solver diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::dispatch::{Capacities, DispatchSummary};
use crate::request::PricingConfig;

/// How the returned plan relates to the requested target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanStatus {
    /// Meets the renewable target within budget.
    TargetMet,
    /// Best achievable fraction within budget; target not reached.
    InfeasibleRelaxed,
    /// Target of zero; nothing is built.
    ZeroBuild,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TargetMet => "target-met",
            Self::InfeasibleRelaxed => "infeasible-relaxed",
            Self::ZeroBuild => "zero-build",
        };
        f.write_str(s)
    }
}

/// Sized generation and storage plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityPlan {
    pub solar_kw: f64,
    pub wind_kw: f64,
    pub battery_kwh: f64,
    /// Share of facility energy met by renewables in simulated dispatch.
    pub renewable_fraction: f64,
    pub total_cost_usd: f64,
    pub status: PlanStatus,
}

impl CapacityPlan {
    pub fn capacities(&self) -> Capacities {
        Capacities {
            solar_kw: self.solar_kw,
            wind_kw: self.wind_kw,
            battery_kwh: self.battery_kwh,
        }
    }

    pub fn has_generation(&self) -> bool {
        self.capacities().has_generation()
    }
}

/// Capital cost of a set of capacities.
pub fn capital_cost(c: &Capacities, pricing: &PricingConfig) -> f64 {
    c.solar_kw * pricing.solar_capex_usd_per_kw
        + c.wind_kw * pricing.wind_capex_usd_per_kw
        + c.battery_kwh * pricing.battery_capex_usd_per_kwh
}

/// How the search went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    pub strategy: String,
    pub solve_time_ms: f64,
    /// Dispatch simulations run.
    pub evaluations: usize,
    /// Greedy steps plus local search rounds.
    pub iterations: usize,
    pub mean_solar_capacity_factor: f64,
    pub mean_wind_capacity_factor: f64,
}

/// Output of the capacity optimization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub plan: CapacityPlan,
    /// Dispatch of the chosen plan over the resource window.
    pub dispatch: DispatchSummary,
    pub diagnostics: SolverDiagnostics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<String>,
}
