//! Wholesale market price projections for VPPA settlement.

use serde::{Deserialize, Serialize};

use crate::request::Coordinates;

/// Broad power-market region, derived from site coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    NorthAmerica,
    SouthAmerica,
    Europe,
    MiddleEast,
    Africa,
    AsiaPacific,
    Oceania,
}

impl Region {
    /// Coarse bounding-box lookup.
    pub fn from_coordinates(c: &Coordinates) -> Self {
        let (lat, lon) = (c.latitude, c.longitude);
        if lon < -30.0 {
            if lat >= 12.0 {
                Self::NorthAmerica
            } else {
                Self::SouthAmerica
            }
        } else if lon < 60.0 {
            if lat >= 35.0 && lon < 45.0 {
                Self::Europe
            } else if lat >= 12.0 && lon >= 34.0 {
                Self::MiddleEast
            } else if lat >= 35.0 {
                Self::Europe
            } else {
                Self::Africa
            }
        } else if lat < -10.0 && lon >= 110.0 {
            Self::Oceania
        } else {
            Self::AsiaPacific
        }
    }

    /// Base-year wholesale price (USD/MWh) and annual escalation.
    pub fn price_assumptions(self) -> (f64, f64) {
        match self {
            Self::NorthAmerica => (55.0, 0.020),
            Self::SouthAmerica => (65.0, 0.030),
            Self::Europe => (85.0, 0.015),
            Self::MiddleEast => (50.0, 0.020),
            Self::Africa => (70.0, 0.030),
            Self::AsiaPacific => (75.0, 0.020),
            Self::Oceania => (80.0, 0.020),
        }
    }
}

/// Market price assumption for each contract year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceCurve {
    /// Caller-supplied forward curve; the last value holds for later years.
    Forward { prices: Vec<f64> },
    /// Escalating regional default.
    Regional {
        region: Region,
        base_usd_per_mwh: f64,
        escalation: f64,
    },
}

impl PriceCurve {
    /// Uses `forward` when it has at least one value, else the regional default.
    pub fn resolve(forward: Option<&[f64]>, coordinates: &Coordinates) -> Self {
        match forward {
            Some(prices) if !prices.is_empty() => Self::Forward {
                prices: prices.to_vec(),
            },
            _ => {
                let region = Region::from_coordinates(coordinates);
                let (base_usd_per_mwh, escalation) = region.price_assumptions();
                Self::Regional {
                    region,
                    base_usd_per_mwh,
                    escalation,
                }
            }
        }
    }

    /// Price in USD/MWh for zero-based contract year `year`.
    pub fn price(&self, year: usize) -> f64 {
        match self {
            Self::Forward { prices } => prices
                .get(year)
                .or_else(|| prices.last())
                .copied()
                .unwrap_or(0.0),
            Self::Regional {
                base_usd_per_mwh,
                escalation,
                ..
            } => base_usd_per_mwh * (1.0 + escalation).powi(year as i32),
        }
    }
}
