//! Virtual power purchase agreement (VPPA) hedge analysis.
//!
//! Cash flows use the settlement convention `(strike - market) * volume`:
//! positive when the buyer pays the generator, negative when the buyer
//! receives. The buyer still purchases physical power at market, so the
//! hedged cost of energy each year is `strike * volume`.

use serde::{Deserialize, Serialize};

use super::market::PriceCurve;
use super::ownership::discounted_sum;
use crate::error::StageError;
use crate::request::{Coordinates, VppaConfig};

const DEVIATION_TOLERANCE: f64 = 1e-9;

/// One contract year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VppaCashFlow {
    /// Contract year, starting at 1.
    pub year: u32,
    pub market_price: f64,
    pub strike_price: f64,
    pub volume_mwh: f64,
    pub cash_flow_usd: f64,
    pub discounted_cash_flow_usd: f64,
    pub unhedged_cost_usd: f64,
    pub hedged_cost_usd: f64,
}

/// Result of the VPPA analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VppaAnalysis {
    pub contract_years: u32,
    pub volume_mwh: f64,
    pub price_curve: PriceCurve,
    pub annual_cash_flows: Vec<VppaCashFlow>,
    /// Discounted sum of settlement cash flows.
    pub contract_value_usd: f64,
    /// Value to the buyer: the negated contract value.
    pub buyer_npv_usd: f64,
    /// Fraction of years in which hedging narrows cost deviation.
    pub hedge_effectiveness: f64,
    /// Discounted hedged cost over discounted energy, USD/MWh.
    pub lcoe_usd_per_mwh: Option<f64>,
}

/// Evaluates a VPPA over its contract term.
///
/// # Arguments
///
/// * `config` - Contract terms
/// * `volume_mwh` - Contracted annual volume
/// * `coordinates` - Site, used for the regional price default
/// * `rate` - Annual discount rate
///
/// # Errors
///
/// Returns `StageError::Vppa` if any computed value is not finite.
pub fn analyze(
    config: &VppaConfig,
    volume_mwh: f64,
    coordinates: &Coordinates,
    rate: f64,
) -> Result<VppaAnalysis, StageError> {
    let curve = PriceCurve::resolve(config.forward_curve.as_deref(), coordinates);
    let strike = config.strike_price;
    let years = config.contract_duration;

    let mut discount = 1.0;
    let annual_cash_flows: Vec<VppaCashFlow> = (0..years)
        .map(|y| {
            discount *= 1.0 + rate;
            let market = curve.price(y as usize);
            let cash_flow = (strike - market) * volume_mwh;
            let unhedged = market * volume_mwh;
            VppaCashFlow {
                year: y + 1,
                market_price: market,
                strike_price: strike,
                volume_mwh,
                cash_flow_usd: cash_flow,
                discounted_cash_flow_usd: cash_flow / discount,
                unhedged_cost_usd: unhedged,
                hedged_cost_usd: unhedged + cash_flow,
            }
        })
        .collect();

    let contract_value_usd: f64 = annual_cash_flows
        .iter()
        .map(|c| c.discounted_cash_flow_usd)
        .sum();
    let hedge_effectiveness = hedge_effectiveness(&annual_cash_flows);

    let energy = discounted_sum(rate, annual_cash_flows.iter().map(|c| c.volume_mwh));
    let cost = discounted_sum(rate, annual_cash_flows.iter().map(|c| c.hedged_cost_usd));
    let lcoe_usd_per_mwh = (energy > 0.0).then(|| cost / energy);

    if !contract_value_usd.is_finite()
        || lcoe_usd_per_mwh.is_some_and(|v| !v.is_finite())
        || annual_cash_flows.iter().any(|c| !c.cash_flow_usd.is_finite())
    {
        return Err(StageError::Vppa(format!(
            "non-finite settlement for strike {strike} and volume {volume_mwh} MWh"
        )));
    }

    Ok(VppaAnalysis {
        contract_years: years,
        volume_mwh,
        price_curve: curve,
        annual_cash_flows,
        contract_value_usd,
        buyer_npv_usd: -contract_value_usd,
        hedge_effectiveness,
        lcoe_usd_per_mwh,
    })
}

/// Share of years where the hedged cost sits closer to its mean than the
/// unhedged cost does to its own.
fn hedge_effectiveness(flows: &[VppaCashFlow]) -> f64 {
    if flows.is_empty() {
        return 0.0;
    }
    let n = flows.len() as f64;
    let mean_unhedged = flows.iter().map(|c| c.unhedged_cost_usd).sum::<f64>() / n;
    let mean_hedged = flows.iter().map(|c| c.hedged_cost_usd).sum::<f64>() / n;
    let reduced = flows
        .iter()
        .filter(|c| {
            (c.hedged_cost_usd - mean_hedged).abs() + DEVIATION_TOLERANCE
                < (c.unhedged_cost_usd - mean_unhedged).abs()
        })
        .count();
    reduced as f64 / n
}
