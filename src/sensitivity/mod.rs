//! Monte Carlo sensitivity analysis of the ownership economics.
//!
//! Each trial draws its own seed from the base seed and its index, so the
//! aggregate does not depend on which worker evaluated which trial.

pub mod stats;
pub mod tornado;

use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use stats::{DistributionSummary, value_sorted};
pub use tornado::{Factor, FactorSensitivity, TORNADO_Z, rank_factors};

use crate::config::SensitivitySettings;
use crate::error::StageError;
use crate::finance::{OwnershipMetrics, SavingsModel};
use crate::request::{SensitivityConfig, VarianceFactors};

/// Golden-ratio increment separating per-trial seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;
/// Share of trials with negative NPV above which an advisory is raised.
const NEGATIVE_NPV_ALERT: f64 = 0.20;
/// Payback CI width, relative to the median, flagged as wide.
const WIDE_INTERVAL_RATIO: f64 = 0.5;

/// Seed for trial `index`.
pub fn trial_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(SEED_STRIDE))
}

/// Multipliers and outcome of one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    pub price_mult: f64,
    pub load_mult: f64,
    pub renewable_mult: f64,
    pub metrics: OwnershipMetrics,
}

impl Trial {
    /// Samples and evaluates trial `index`.
    pub fn run(model: &SavingsModel, variance: &VarianceFactors, base_seed: u64, index: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(trial_seed(base_seed, index));
        let mut draw = |sigma: f64| {
            let z: f64 = StandardNormal.sample(&mut rng);
            (1.0 + sigma * z).max(0.0)
        };
        let price_mult = draw(variance.price);
        let load_mult = draw(variance.load);
        let renewable_mult = draw(variance.renewable);
        Self {
            price_mult,
            load_mult,
            renewable_mult,
            metrics: model.evaluate(price_mult, load_mult, renewable_mult),
        }
    }

    fn is_finite(&self) -> bool {
        self.metrics.npv_usd.is_finite()
            && self.metrics.roi.is_finite()
            && self.metrics.payback_months.is_none_or(f64::is_finite)
    }
}

/// Payback distribution. Trials that never pay back are excluded from the
/// percentiles and counted in `never_recovered_share`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaybackSummary {
    /// 2.5th percentile.
    pub ci_lower_months: Option<f64>,
    /// 97.5th percentile.
    pub ci_upper_months: Option<f64>,
    pub best_case_months: Option<f64>,
    pub worst_case_months: Option<f64>,
    pub median_months: Option<f64>,
    pub never_recovered_share: f64,
}

impl PaybackSummary {
    fn from_trials(trials: &[Trial]) -> Self {
        let paybacks: Vec<f64> = trials.iter().filter_map(|t| t.metrics.payback_months).collect();
        let s = stats::sorted(&paybacks);
        let never = trials.len() - s.len();
        Self {
            ci_lower_months: value_sorted(&s, 2.5),
            ci_upper_months: value_sorted(&s, 97.5),
            best_case_months: s.first().copied(),
            worst_case_months: s.last().copied(),
            median_months: value_sorted(&s, 50.0),
            never_recovered_share: never as f64 / trials.len().max(1) as f64,
        }
    }

    /// Width of the 95 % interval in months.
    pub fn ci_width_months(&self) -> Option<f64> {
        Some(self.ci_upper_months? - self.ci_lower_months?)
    }
}

/// Named downside measures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub payback_threshold_months: f64,
    /// Trials that miss the threshold, counting those that never pay back.
    pub prob_payback_exceeds_threshold: f64,
    pub prob_negative_npv: f64,
    /// 5th-percentile NPV: outcomes are at least this good in 95 % of trials.
    pub npv_value_at_risk_95_usd: f64,
    /// Mean NPV of trials at or below the 95 % value at risk.
    pub npv_expected_shortfall_95_usd: f64,
}

impl RiskMetrics {
    fn from_trials(trials: &[Trial], threshold_months: f64) -> Self {
        let n = trials.len().max(1) as f64;
        let exceeds = trials
            .iter()
            .filter(|t| t.metrics.payback_months.is_none_or(|p| p > threshold_months))
            .count();
        let negative = trials.iter().filter(|t| t.metrics.npv_usd < 0.0).count();

        let npv = stats::sorted(&trials.iter().map(|t| t.metrics.npv_usd).collect::<Vec<_>>());
        let var = value_sorted(&npv, 5.0).unwrap_or(0.0);
        let tail: Vec<f64> = npv.iter().copied().take_while(|v| *v <= var).collect();

        Self {
            payback_threshold_months: threshold_months,
            prob_payback_exceeds_threshold: exceeds as f64 / n,
            prob_negative_npv: negative as f64 / n,
            npv_value_at_risk_95_usd: var,
            npv_expected_shortfall_95_usd: if tail.is_empty() {
                var
            } else {
                stats::mean(&tail)
            },
        }
    }
}

/// Output of the sensitivity stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub iterations: usize,
    pub seed: u64,
    /// Trials that produced finite outcomes and entered the aggregates.
    pub finite_trials: usize,
    pub variance_factors: VarianceFactors,
    pub payback: PaybackSummary,
    pub npv: DistributionSummary,
    pub roi: DistributionSummary,
    pub risk: RiskMetrics,
    pub tornado: Vec<FactorSensitivity>,
    pub recommendations: Vec<String>,
}

/// Runs Monte Carlo trials over a [`SavingsModel`].
#[derive(Debug, Clone, Default)]
pub struct SensitivityEngine {
    settings: SensitivitySettings,
}

impl SensitivityEngine {
    pub fn new(settings: SensitivitySettings) -> Self {
        Self { settings }
    }

    /// Runs `config.iterations` trials and aggregates them.
    ///
    /// The seed is `config.seed` if set, else the configured default.
    /// Identical inputs and seed give identical results whether trials run
    /// in parallel or not.
    ///
    /// # Errors
    ///
    /// Returns `StageError::NoFiniteTrials` if no trial yields finite
    /// payback, ROI, and NPV.
    pub fn run(
        &self,
        model: &SavingsModel,
        config: &SensitivityConfig,
    ) -> Result<SensitivityResult, StageError> {
        let seed = config.seed.unwrap_or(self.settings.seed);
        let variance = config.variance_factors;
        let n = config.iterations;

        let trials: Vec<Trial> = if self.settings.parallel {
            (0..n)
                .into_par_iter()
                .map(|i| Trial::run(model, &variance, seed, i))
                .collect()
        } else {
            (0..n).map(|i| Trial::run(model, &variance, seed, i)).collect()
        };
        let finite: Vec<Trial> = trials.into_iter().filter(Trial::is_finite).collect();
        debug!(iterations = n, finite = finite.len(), seed, "trials evaluated");

        let npv_values: Vec<f64> = finite.iter().map(|t| t.metrics.npv_usd).collect();
        let roi_values: Vec<f64> = finite.iter().map(|t| t.metrics.roi).collect();
        let (Some(npv), Some(roi)) = (
            DistributionSummary::from_values(&npv_values),
            DistributionSummary::from_values(&roi_values),
        ) else {
            return Err(StageError::NoFiniteTrials);
        };

        let payback = PaybackSummary::from_trials(&finite);
        let risk = RiskMetrics::from_trials(&finite, self.settings.payback_threshold_months);
        let tornado = rank_factors(model, &variance);
        let recommendations = recommendations(&payback, &risk, &tornado);

        info!(
            iterations = n,
            npv_mean = npv.mean,
            prob_negative_npv = risk.prob_negative_npv,
            "sensitivity analysis complete"
        );

        Ok(SensitivityResult {
            iterations: n,
            seed,
            finite_trials: finite.len(),
            variance_factors: variance,
            payback,
            npv,
            roi,
            risk,
            tornado,
            recommendations,
        })
    }
}

/// Advisory text from threshold rules on the aggregates.
pub fn recommendations(
    payback: &PaybackSummary,
    risk: &RiskMetrics,
    tornado: &[FactorSensitivity],
) -> Vec<String> {
    let threshold = risk.payback_threshold_months;
    let mut out = Vec::new();

    match payback.worst_case_months {
        Some(worst) if worst > threshold => out.push(format!(
            "Worst-case payback of {worst:.0} months exceeds the {threshold:.0}-month threshold; \
             consider de-risking via a VPPA."
        )),
        None => out.push(
            "No simulated scenario recovers the investment; revisit sizing or pricing assumptions."
                .to_string(),
        ),
        _ => {}
    }
    if payback.never_recovered_share > 0.0 && payback.worst_case_months.is_some() {
        out.push(format!(
            "{:.0}% of scenarios never recover the investment.",
            payback.never_recovered_share * 100.0
        ));
    }
    if risk.prob_negative_npv > NEGATIVE_NPV_ALERT {
        out.push(format!(
            "NPV is negative in {:.0}% of scenarios; phase the build-out or negotiate lower capex.",
            risk.prob_negative_npv * 100.0
        ));
    }
    if let (Some(width), Some(median)) = (payback.ci_width_months(), payback.median_months) {
        if median > 0.0 && width / median > WIDE_INTERVAL_RATIO {
            out.push(format!(
                "The 95% payback interval spans {width:.0} months; treat the base-case payback as indicative."
            ));
        }
    }
    let clean = out.is_empty() && risk.prob_payback_exceeds_threshold == 0.0;
    if let Some(top) = tornado.first().filter(|t| t.swing_usd > 0.0) {
        let hint = match top.factor {
            Factor::ElectricityPrice => "a fixed-price contract would narrow the outcome range",
            Factor::ItLoad => "validate load growth forecasts before committing",
            Factor::RenewableOutput => "battery storage or site diversity would firm output",
        };
        out.push(format!(
            "{} drives the widest NPV swing (${:.0}); {hint}.",
            capitalize(top.factor.label()),
            top.swing_usd
        ));
    }
    if clean {
        out.insert(0, "Risk profile is within thresholds across all scenarios.".to_string());
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SavingsModel {
        SavingsModel {
            total_investment_usd: 1_000_000.0,
            pue_savings_kwh: 500_000.0,
            renewable_served_kwh: 1_500_000.0,
            facility_energy_kwh: 10_000_000.0,
            electricity_usd_per_kwh: 0.10,
            carbon_usd_per_ton: 50.0,
            emission_t_per_kwh: 0.0004,
            discount_rate: 0.08,
        }
    }

    fn config(iterations: usize, seed: u64) -> SensitivityConfig {
        SensitivityConfig {
            run_monte_carlo: true,
            iterations,
            variance_factors: VarianceFactors::default(),
            seed: Some(seed),
        }
    }

    #[test]
    fn same_seed_same_result() {
        let engine = SensitivityEngine::default();
        let a = engine.run(&model(), &config(300, 7)).unwrap();
        let b = engine.run(&model(), &config(300, 7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parallel_matches_sequential() {
        let par = SensitivityEngine::default().run(&model(), &config(200, 11)).unwrap();
        let seq = SensitivityEngine::new(SensitivitySettings {
            parallel: false,
            ..SensitivitySettings::default()
        })
        .run(&model(), &config(200, 11))
        .unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn different_seeds_differ() {
        let engine = SensitivityEngine::default();
        let a = engine.run(&model(), &config(100, 1)).unwrap();
        let b = engine.run(&model(), &config(100, 2)).unwrap();
        assert_ne!(a.npv.mean, b.npv.mean);
    }

    #[test]
    fn more_iterations_tighten_standard_error() {
        let engine = SensitivityEngine::default();
        let small = engine.run(&model(), &config(50, 3)).unwrap();
        let large = engine.run(&model(), &config(2000, 3)).unwrap();
        assert!(large.npv.standard_error < small.npv.standard_error);
        assert!(large.roi.standard_error < small.roi.standard_error);
    }

    #[test]
    fn aggregates_are_ordered() {
        let r = SensitivityEngine::default().run(&model(), &config(300, 42)).unwrap();
        assert_eq!(r.iterations, 300);
        assert_eq!(r.finite_trials, 300);
        let p = r.payback;
        assert!(p.best_case_months.unwrap() <= p.ci_lower_months.unwrap());
        assert!(p.ci_lower_months.unwrap() <= p.median_months.unwrap());
        assert!(p.median_months.unwrap() <= p.ci_upper_months.unwrap());
        assert!(p.ci_upper_months.unwrap() <= p.worst_case_months.unwrap());
        assert!(r.npv.p5 <= r.npv.p50 && r.npv.p50 <= r.npv.p95);
        assert!(r.risk.npv_expected_shortfall_95_usd <= r.risk.npv_value_at_risk_95_usd);
        assert!((0.0..=1.0).contains(&r.risk.prob_negative_npv));
        assert_eq!(r.tornado.len(), 3);
        assert!(!r.recommendations.is_empty());
    }

    #[test]
    fn default_seed_from_settings() {
        let mut cfg = config(20, 0);
        cfg.seed = None;
        let r = SensitivityEngine::default().run(&model(), &cfg).unwrap();
        assert_eq!(r.seed, 42);
    }

    #[test]
    fn trial_multipliers_are_non_negative() {
        let v = VarianceFactors {
            price: 1.0,
            load: 1.0,
            renewable: 1.0,
        };
        for i in 0..500 {
            let t = Trial::run(&model(), &v, 9, i);
            assert!(t.price_mult >= 0.0 && t.load_mult >= 0.0 && t.renewable_mult >= 0.0);
        }
    }

    #[test]
    fn no_finite_trials_is_recoverable() {
        let m = SavingsModel {
            electricity_usd_per_kwh: f64::MAX,
            ..model()
        };
        let err = SensitivityEngine::default().run(&m, &config(10, 1)).unwrap_err();
        assert_eq!(err, StageError::NoFiniteTrials);
        assert!(err.is_recoverable());
    }

    #[test]
    fn zero_iterations_have_no_outcome() {
        let err = SensitivityEngine::default().run(&model(), &config(0, 1)).unwrap_err();
        assert_eq!(err, StageError::NoFiniteTrials);
    }

    #[test]
    fn losing_plan_gets_de_risking_advice() {
        let m = SavingsModel {
            total_investment_usd: 20_000_000.0,
            ..model()
        };
        let r = SensitivityEngine::default().run(&m, &config(200, 5)).unwrap();
        assert!(r.risk.prob_payback_exceeds_threshold > 0.9);
        assert!(r.risk.prob_negative_npv > 0.9);
        assert!(r.recommendations.iter().any(|s| s.contains("VPPA")));
        assert!(r.recommendations.iter().any(|s| s.contains("negative")));
    }
}
