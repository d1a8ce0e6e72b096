//! Financial modeling: ownership economics and VPPA hedge analysis.

pub mod market;
pub mod ownership;
pub mod vppa;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use market::{PriceCurve, Region};
pub use ownership::{HORIZON_YEARS, OwnershipMetrics, SavingsModel, discounted_sum, ownership_lcoe};
pub use vppa::{VppaAnalysis, VppaCashFlow};

use crate::config::{FinanceConfig, OptimizerConfig};
use crate::error::{StageError, ensure_finite};
use crate::optimizer::{CapacityFactors, CapacityPlan, DispatchParams, capital_cost, simulate};
use crate::pue::PueProfile;
use crate::request::PipelineRequest;
use crate::resource::ResourceSeries;

/// Which financing route looks better on NPV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancingOption {
    Ownership,
    Vppa,
}

/// Ownership branch of the financial result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipResult {
    pub total_investment_usd: f64,
    /// Informational; not netted from savings.
    pub annual_opex_usd: f64,
    pub discount_rate: f64,
    pub horizon_years: u32,
    #[serde(flatten)]
    pub metrics: OwnershipMetrics,
    pub lcoe_usd_per_mwh: Option<f64>,
    /// Inputs behind `metrics`, reused by the Monte Carlo stage.
    pub model: SavingsModel,
}

/// Output of the financial stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialResult {
    pub ownership: OwnershipResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vppa: Option<VppaAnalysis>,
    pub preferred: FinancingOption,
}

/// Financial result plus recoverable problems met along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialOutcome {
    pub result: FinancialResult,
    pub warnings: Vec<StageError>,
}

/// Computes ownership economics and, when requested, VPPA economics.
#[derive(Debug, Clone, Default)]
pub struct FinancialEngine {
    dispatch: OptimizerConfig,
    finance: FinanceConfig,
}

impl FinancialEngine {
    pub fn new(dispatch: OptimizerConfig, finance: FinanceConfig) -> Self {
        Self { dispatch, finance }
    }

    /// Evaluates the plan against the PUE-adjusted load and request pricing.
    ///
    /// Renewable supply is re-dispatched against the hourly facility load
    /// from the PUE forecast, so it reflects the improved cooling.
    ///
    /// # Errors
    ///
    /// Returns `StageError::MalformedData` if the PUE profile and resource
    /// series disagree in length, and `StageError::NumericDomain` if any
    /// ownership figure is not finite. A failed VPPA analysis is reported
    /// in `FinancialOutcome::warnings` instead.
    pub fn evaluate(
        &self,
        request: &PipelineRequest,
        plan: &CapacityPlan,
        pue: &PueProfile,
        series: &ResourceSeries,
        discount_rate: f64,
    ) -> Result<FinancialOutcome, StageError> {
        if pue.hourly.len() != series.len() || series.is_empty() {
            return Err(StageError::MalformedData(format!(
                "PUE profile has {} hours but resource series has {}",
                pue.hourly.len(),
                series.len()
            )));
        }

        let pricing = &request.pricing;
        let total_investment_usd = ensure_finite(
            "total_investment_usd",
            capital_cost(&plan.capacities(), pricing),
        )?;

        let factors = CapacityFactors::from_series(series, &self.dispatch);
        let dispatch = simulate(
            &factors,
            &pue.facility_load_kw(),
            &plan.capacities(),
            &DispatchParams::from(&self.dispatch),
        );
        let renewable_served_kwh = dispatch.renewable_served_kwh() * dispatch.annualization();

        let model = SavingsModel {
            total_investment_usd,
            pue_savings_kwh: pue.annual_energy_savings_kwh,
            renewable_served_kwh,
            facility_energy_kwh: pue.annual_facility_energy_kwh,
            electricity_usd_per_kwh: pricing.electricity_usd_per_kwh,
            carbon_usd_per_ton: pricing.carbon_usd_per_ton,
            emission_t_per_kwh: self.finance.grid_emission_t_per_mwh / 1000.0,
            discount_rate,
        };
        let metrics = model.base();
        ensure_finite("annual_savings_usd", metrics.annual_savings_usd)?;
        ensure_finite("npv_usd", metrics.npv_usd)?;
        ensure_finite("roi", metrics.roi)?;
        if let Some(p) = metrics.payback_months {
            ensure_finite("payback_months", p)?;
        }

        let annual_opex_usd = total_investment_usd * self.finance.opex_fraction;
        let ownership = OwnershipResult {
            total_investment_usd,
            annual_opex_usd,
            discount_rate,
            horizon_years: HORIZON_YEARS,
            metrics,
            lcoe_usd_per_mwh: ownership_lcoe(
                total_investment_usd,
                annual_opex_usd,
                renewable_served_kwh,
                discount_rate,
            ),
            model,
        };

        let mut warnings = Vec::new();
        let vppa = match request.requested_vppa() {
            Some(terms) => {
                let volume_mwh = terms.contracted_volume_mwh.unwrap_or(
                    pue.annual_facility_energy_kwh / 1000.0
                        * request.constraints.target_renewable_fraction,
                );
                match vppa::analyze(terms, volume_mwh, &request.coordinates, discount_rate) {
                    Ok(a) => Some(a),
                    Err(e) => {
                        warn!(error = %e, "VPPA analysis failed, keeping ownership result");
                        warnings.push(e);
                        None
                    }
                }
            }
            None => None,
        };

        let preferred = match &vppa {
            Some(v) if v.buyer_npv_usd > ownership.metrics.npv_usd => FinancingOption::Vppa,
            _ => FinancingOption::Ownership,
        };

        info!(
            investment = total_investment_usd,
            annual_savings = metrics.annual_savings_usd,
            npv = metrics.npv_usd,
            vppa = vppa.is_some(),
            ?preferred,
            "financial evaluation complete"
        );

        Ok(FinancialOutcome {
            result: FinancialResult {
                ownership,
                vppa,
                preferred,
            },
            warnings,
        })
    }
}
