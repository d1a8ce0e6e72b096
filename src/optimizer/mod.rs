//! Capacity sizing for solar, wind, and battery storage.

pub mod battery;
pub mod dispatch;
pub mod plan;
pub mod search;

pub use battery::Battery;
pub use dispatch::{
    CapacityFactors, Capacities, DispatchParams, DispatchSummary, HOURS_PER_YEAR, simulate,
};
pub use plan::{CapacityPlan, OptimizationResult, PlanStatus, SolverDiagnostics, capital_cost};
pub use search::CapacityOptimizer;
