//! Aggregate pipeline result and its consolidated summary.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::stage::{ErrorRecord, StageOutcome};
use super::state::PipelineState;
use crate::config::PlannerConfig;
use crate::finance::{FinancialResult, FinancingOption};
use crate::optimizer::{CapacityPlan, OptimizationResult};
use crate::pue::PueProfile;
use crate::resource::ResourcePlan;
use crate::sensitivity::{Factor, SensitivityResult};

/// Every stage outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStages {
    pub planner: StageOutcome<ResourcePlan>,
    pub optimizer: StageOutcome<OptimizationResult>,
    pub pue: StageOutcome<PueProfile>,
    pub financial: StageOutcome<FinancialResult>,
    pub sensitivity: StageOutcome<SensitivityResult>,
}

/// The more favorable financing route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialBestCase {
    pub source: FinancingOption,
    pub npv_usd: f64,
    /// Ownership only.
    pub payback_months: Option<f64>,
    /// Ownership only.
    pub roi: Option<f64>,
    pub annual_savings_usd: Option<f64>,
    pub total_investment_usd: f64,
}

impl FinancialBestCase {
    pub fn from_result(f: &FinancialResult) -> Self {
        match (&f.vppa, f.preferred) {
            (Some(v), FinancingOption::Vppa) => Self {
                source: FinancingOption::Vppa,
                npv_usd: v.buyer_npv_usd,
                payback_months: None,
                roi: None,
                annual_savings_usd: None,
                total_investment_usd: 0.0,
            },
            _ => {
                let o = &f.ownership;
                Self {
                    source: FinancingOption::Ownership,
                    npv_usd: o.metrics.npv_usd,
                    payback_months: o.metrics.payback_months,
                    roi: Some(o.metrics.roi),
                    annual_savings_usd: Some(o.metrics.annual_savings_usd),
                    total_investment_usd: o.total_investment_usd,
                }
            }
        }
    }
}

/// Illustrative environmental figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalImpact {
    pub renewable_fraction: f64,
    pub co2_reduction_tons_per_year: f64,
    pub equivalent_cars_removed: f64,
    pub pue_improvement_pct: Option<f64>,
}

impl EnvironmentalImpact {
    /// Derives avoided emissions from whichever stages produced output.
    ///
    /// Uses the financial stage's re-dispatched renewable supply when
    /// available, else the optimizer's own dispatch.
    pub fn derive(
        optimizer: &OptimizationResult,
        pue: Option<&PueProfile>,
        financial: Option<&FinancialResult>,
        config: &PlannerConfig,
    ) -> Self {
        let renewable_kwh = match financial {
            Some(f) => f.ownership.model.renewable_served_kwh,
            None => {
                let d = &optimizer.dispatch;
                d.renewable_served_kwh() * d.annualization()
            }
        };
        let pue_kwh = pue.map_or(0.0, |p| p.annual_energy_savings_kwh.max(0.0));
        let co2 = (renewable_kwh + pue_kwh) * config.finance.grid_emission_t_per_mwh / 1000.0;
        let per_car = config.environment.co2_tons_per_car;

        Self {
            renewable_fraction: optimizer.plan.renewable_fraction,
            co2_reduction_tons_per_year: co2,
            equivalent_cars_removed: if per_car > 0.0 { co2 / per_car } else { 0.0 },
            pue_improvement_pct: pue.map(|p| p.improvement_pct),
        }
    }
}

/// Headline risk figures from the Monte Carlo stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub payback_ci_lower_months: Option<f64>,
    pub payback_ci_upper_months: Option<f64>,
    pub prob_payback_exceeds_threshold: f64,
    pub prob_negative_npv: f64,
    pub npv_value_at_risk_95_usd: f64,
    pub dominant_factor: Option<Factor>,
    pub recommendations: Vec<String>,
}

impl From<&SensitivityResult> for RiskProfile {
    fn from(s: &SensitivityResult) -> Self {
        Self {
            payback_ci_lower_months: s.payback.ci_lower_months,
            payback_ci_upper_months: s.payback.ci_upper_months,
            prob_payback_exceeds_threshold: s.risk.prob_payback_exceeds_threshold,
            prob_negative_npv: s.risk.prob_negative_npv,
            npv_value_at_risk_95_usd: s.risk.npv_value_at_risk_95_usd,
            dominant_factor: s.tornado.first().map(|t| t.factor),
            recommendations: s.recommendations.clone(),
        }
    }
}

/// Consolidated view across stages; fields are absent when their stage
/// produced no output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub optimal_plan: Option<CapacityPlan>,
    pub financial_best_case: Option<FinancialBestCase>,
    pub environmental: Option<EnvironmentalImpact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_profile: Option<RiskProfile>,
}

impl PipelineSummary {
    pub fn from_stages(stages: &PipelineStages, config: &PlannerConfig) -> Self {
        let optimizer = stages.optimizer.payload();
        let pue = stages.pue.payload();
        let financial = stages.financial.payload();
        Self {
            optimal_plan: optimizer.map(|o| o.plan),
            financial_best_case: financial.map(FinancialBestCase::from_result),
            environmental: optimizer
                .map(|o| EnvironmentalImpact::derive(o, pue, financial, config)),
            risk_profile: stages.sensitivity.payload().map(RiskProfile::from),
        }
    }
}

/// Complete, persistable record of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// True when the run reached `Completed`.
    pub success: bool,
    #[serde(rename = "executionTimeMs")]
    pub execution_time_ms: f64,
    pub state: PipelineState,
    pub stages: PipelineStages,
    pub summary: PipelineSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorRecord>,
}

impl PipelineResult {
    /// Whether any recorded error was fatal.
    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| !e.recoverable)
    }
}

fn opt(v: Option<f64>, precision: usize, unit: &str) -> String {
    match v {
        Some(x) => format!("{x:.precision$}{unit}"),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Renewable Transition Plan ---")?;
        writeln!(
            f,
            "Status:                {} ({}, {:.0} ms)",
            if self.success { "ok" } else { "FAILED" },
            self.state,
            self.execution_time_ms
        )?;
        writeln!(
            f,
            "Stages:                planner={} optimizer={} pue={} financial={} sensitivity={}",
            self.stages.planner.status(),
            self.stages.optimizer.status(),
            self.stages.pue.status(),
            self.stages.financial.status(),
            self.stages.sensitivity.status()
        )?;

        if let Some(p) = &self.summary.optimal_plan {
            writeln!(
                f,
                "Plan:                  {:.0} kW solar, {:.0} kW wind, {:.0} kWh battery ({})",
                p.solar_kw, p.wind_kw, p.battery_kwh, p.status
            )?;
            writeln!(f, "Capital cost:          ${:.0}", p.total_cost_usd)?;
        }
        if let Some(e) = &self.summary.environmental {
            writeln!(
                f,
                "Renewable fraction:    {:.1}%",
                e.renewable_fraction * 100.0
            )?;
            writeln!(
                f,
                "CO2 reduction:         {:.1} t/yr (~{:.0} cars)",
                e.co2_reduction_tons_per_year, e.equivalent_cars_removed
            )?;
            writeln!(
                f,
                "PUE improvement:       {}",
                opt(e.pue_improvement_pct, 1, "%")
            )?;
        }
        if let Some(b) = &self.summary.financial_best_case {
            writeln!(f, "Best case:             {:?}", b.source)?;
            writeln!(f, "  NPV:                 ${:.0}", b.npv_usd)?;
            writeln!(f, "  Payback:             {}", opt(b.payback_months, 1, " months"))?;
            writeln!(f, "  ROI:                 {}", opt(b.roi.map(|r| r * 100.0), 1, "%"))?;
        }
        if let Some(r) = &self.summary.risk_profile {
            writeln!(
                f,
                "Payback 95% CI:        {} - {}",
                opt(r.payback_ci_lower_months, 1, ""),
                opt(r.payback_ci_upper_months, 1, " months")
            )?;
            writeln!(
                f,
                "P(negative NPV):       {:.1}%",
                r.prob_negative_npv * 100.0
            )?;
            for rec in &r.recommendations {
                writeln!(f, "  * {rec}")?;
            }
        }
        for e in &self.errors {
            writeln!(f, "Error: {e}")?;
        }
        Ok(())
    }
}
