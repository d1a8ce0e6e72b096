//! One-at-a-time factor ranking for the tornado chart.

use serde::{Deserialize, Serialize};

use crate::finance::SavingsModel;
use crate::request::VarianceFactors;

/// z-score of the 5th/95th percentile of a standard normal.
pub const TORNADO_Z: f64 = 1.645;

/// An uncertain input perturbed by the Monte Carlo stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    ElectricityPrice,
    ItLoad,
    RenewableOutput,
}

impl Factor {
    pub const ALL: [Factor; 3] = [Self::ElectricityPrice, Self::ItLoad, Self::RenewableOutput];

    pub fn label(self) -> &'static str {
        match self {
            Self::ElectricityPrice => "electricity price",
            Self::ItLoad => "IT load",
            Self::RenewableOutput => "renewable output",
        }
    }

    fn sigma(self, v: &VarianceFactors) -> f64 {
        match self {
            Self::ElectricityPrice => v.price,
            Self::ItLoad => v.load,
            Self::RenewableOutput => v.renewable,
        }
    }

    /// Evaluates `model` with only this factor scaled by `mult`.
    fn npv_at(self, model: &SavingsModel, mult: f64) -> (f64, f64) {
        let m = match self {
            Self::ElectricityPrice => model.evaluate(mult, 1.0, 1.0),
            Self::ItLoad => model.evaluate(1.0, mult, 1.0),
            Self::RenewableOutput => model.evaluate(1.0, 1.0, mult),
        };
        (m.npv_usd, m.annual_savings_usd)
    }
}

/// One bar of the tornado chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorSensitivity {
    pub factor: Factor,
    /// 1 for the factor with the widest swing.
    pub rank: usize,
    pub low_multiplier: f64,
    pub high_multiplier: f64,
    pub npv_low_usd: f64,
    pub npv_high_usd: f64,
    /// `|npv_high - npv_low|`.
    pub swing_usd: f64,
    /// Relative change in annual savings per relative change in the factor.
    pub elasticity: f64,
}

/// Ranks factors by NPV swing at `1 ± 1.645σ`, widest first.
pub fn rank_factors(model: &SavingsModel, variance: &VarianceFactors) -> Vec<FactorSensitivity> {
    let base_savings = model.base().annual_savings_usd;

    let mut bars: Vec<FactorSensitivity> = Factor::ALL
        .iter()
        .map(|&factor| {
            let sigma = factor.sigma(variance);
            let low_multiplier = (1.0 - TORNADO_Z * sigma).max(0.0);
            let high_multiplier = 1.0 + TORNADO_Z * sigma;
            let (npv_low_usd, savings_low) = factor.npv_at(model, low_multiplier);
            let (npv_high_usd, savings_high) = factor.npv_at(model, high_multiplier);

            let spread = high_multiplier - low_multiplier;
            let elasticity = if base_savings > 0.0 && spread > 0.0 {
                (savings_high - savings_low) / base_savings / spread
            } else {
                0.0
            };

            FactorSensitivity {
                factor,
                rank: 0,
                low_multiplier,
                high_multiplier,
                npv_low_usd,
                npv_high_usd,
                swing_usd: (npv_high_usd - npv_low_usd).abs(),
                elasticity,
            }
        })
        .collect();

    bars.sort_by(|a, b| b.swing_usd.total_cmp(&a.swing_usd));
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.rank = i + 1;
    }
    bars
}
