//! Ownership economics: savings, payback, ROI, NPV, LCOE.

use serde::{Deserialize, Serialize};

/// Analysis horizon for ownership metrics, in years.
pub const HORIZON_YEARS: u32 = 20;

/// Present value of `cash_flows`, where element `t` falls at the end of year `t + 1`.
///
/// Discount factors are built up iteratively rather than with `powi`.
pub fn discounted_sum(rate: f64, cash_flows: impl IntoIterator<Item = f64>) -> f64 {
    let one_plus_r = 1.0 + rate;
    let mut discount = 1.0;
    let mut pv = 0.0;
    for cf in cash_flows {
        discount *= one_plus_r;
        pv += cf / discount;
    }
    pv
}

/// Everything needed to recompute ownership outcomes under perturbation.
///
/// Energy quantities are annual. The Monte Carlo stage scales them with
/// its sampled multipliers; the base case is `evaluate(1.0, 1.0, 1.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsModel {
    pub total_investment_usd: f64,
    /// Facility energy avoided through lower PUE.
    pub pue_savings_kwh: f64,
    /// Facility energy served by renewables.
    pub renewable_served_kwh: f64,
    /// Annual facility consumption at the adjusted PUE.
    pub facility_energy_kwh: f64,
    pub electricity_usd_per_kwh: f64,
    pub carbon_usd_per_ton: f64,
    pub emission_t_per_kwh: f64,
    pub discount_rate: f64,
}

/// Ownership outcomes for one set of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OwnershipMetrics {
    pub avoided_energy_kwh: f64,
    pub avoided_electricity_usd: f64,
    pub avoided_carbon_usd: f64,
    pub annual_savings_usd: f64,
    /// `None` when savings never recover a positive investment.
    pub payback_months: Option<f64>,
    pub roi: f64,
    pub npv_usd: f64,
}

impl SavingsModel {
    /// Recomputes outcomes with multipliers on price, IT load, and renewable output.
    ///
    /// Renewable supply cannot exceed the (scaled) facility consumption.
    pub fn evaluate(&self, price_mult: f64, load_mult: f64, renewable_mult: f64) -> OwnershipMetrics {
        let pue_kwh = self.pue_savings_kwh * load_mult;
        let renewable_kwh =
            (self.renewable_served_kwh * renewable_mult).min(self.facility_energy_kwh * load_mult);
        let avoided_energy_kwh = pue_kwh + renewable_kwh;

        let avoided_electricity_usd = avoided_energy_kwh * self.electricity_usd_per_kwh * price_mult;
        let avoided_carbon_usd = avoided_energy_kwh * self.emission_t_per_kwh * self.carbon_usd_per_ton;
        let annual_savings_usd = avoided_electricity_usd + avoided_carbon_usd;

        let investment = self.total_investment_usd;
        let payback_months = if investment <= 0.0 {
            Some(0.0)
        } else if annual_savings_usd > 0.0 {
            Some(investment / (annual_savings_usd / 12.0))
        } else {
            None
        };
        let roi = if investment > 0.0 {
            annual_savings_usd * f64::from(HORIZON_YEARS) / investment
        } else {
            0.0
        };
        let npv_usd = -investment
            + discounted_sum(
                self.discount_rate,
                (0..HORIZON_YEARS).map(|_| annual_savings_usd),
            );

        OwnershipMetrics {
            avoided_energy_kwh,
            avoided_electricity_usd,
            avoided_carbon_usd,
            annual_savings_usd,
            payback_months,
            roi,
            npv_usd,
        }
    }

    /// Base case with no perturbation.
    pub fn base(&self) -> OwnershipMetrics {
        self.evaluate(1.0, 1.0, 1.0)
    }
}

/// Levelized cost of renewable energy for the owned plant, USD/MWh.
///
/// `None` when the plant delivers no energy.
pub fn ownership_lcoe(
    investment_usd: f64,
    annual_opex_usd: f64,
    annual_energy_kwh: f64,
    rate: f64,
) -> Option<f64> {
    let years = 0..HORIZON_YEARS;
    let cost = investment_usd + discounted_sum(rate, years.clone().map(|_| annual_opex_usd));
    let energy_mwh = discounted_sum(rate, years.map(|_| annual_energy_kwh / 1000.0));
    (energy_mwh > 0.0).then(|| cost / energy_mwh)
}
