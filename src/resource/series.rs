//! Hourly renewable-resource and weather series.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::request::{Coordinates, DateRange};

/// Where a channel's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Api,
    Synthetic,
}

/// Provenance for each channel of a [`ResourceSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProvenance {
    pub solar: Provenance,
    pub wind: Provenance,
    pub hydro: Provenance,
    pub temperature: Provenance,
}

impl ChannelProvenance {
    pub fn all(p: Provenance) -> Self {
        Self {
            solar: p,
            wind: p,
            hydro: p,
            temperature: p,
        }
    }

    /// True if any channel came from the external source.
    pub fn any_api(&self) -> bool {
        [self.solar, self.wind, self.hydro, self.temperature].contains(&Provenance::Api)
    }
}

/// One hour of resource and weather data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyResource {
    pub timestamp: NaiveDateTime,
    /// Global horizontal irradiance (W/m²).
    pub irradiance_w_m2: f64,
    /// Wind speed at 10 m (m/s).
    pub wind_speed_m_s: f64,
    /// Hydro availability as a fraction of nameplate (0..1).
    pub hydro_availability: f64,
    /// Outdoor dry-bulb temperature (°C).
    pub temperature_c: f64,
}

/// Ordered hourly series for one site and date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSeries {
    pub coordinates: Coordinates,
    pub range: DateRange,
    pub provenance: ChannelProvenance,
    /// Label of the source that produced the series.
    pub source: String,
    pub records: Vec<HourlyResource>,
}

impl ResourceSeries {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hour-of-day for every record.
    pub fn hours_of_day(&self) -> impl Iterator<Item = u32> + '_ {
        self.records.iter().map(|r| r.timestamp.hour())
    }

    /// Summary statistics over every channel.
    pub fn stats(&self) -> SeriesStats {
        SeriesStats::from_records(&self.records)
    }
}

/// Channel means and extremes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub hours: usize,
    pub mean_irradiance_w_m2: f64,
    pub mean_wind_speed_m_s: f64,
    pub mean_hydro_availability: f64,
    pub mean_temperature_c: f64,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
}

impl SeriesStats {
    pub fn from_records(records: &[HourlyResource]) -> Self {
        if records.is_empty() {
            return Self {
                hours: 0,
                mean_irradiance_w_m2: 0.0,
                mean_wind_speed_m_s: 0.0,
                mean_hydro_availability: 0.0,
                mean_temperature_c: 0.0,
                min_temperature_c: 0.0,
                max_temperature_c: 0.0,
            };
        }

        let n = records.len() as f64;
        let mut irr = 0.0;
        let mut wind = 0.0;
        let mut hydro = 0.0;
        let mut temp = 0.0;
        let mut t_min = f64::INFINITY;
        let mut t_max = f64::NEG_INFINITY;
        for r in records {
            irr += r.irradiance_w_m2;
            wind += r.wind_speed_m_s;
            hydro += r.hydro_availability;
            temp += r.temperature_c;
            t_min = t_min.min(r.temperature_c);
            t_max = t_max.max(r.temperature_c);
        }

        Self {
            hours: records.len(),
            mean_irradiance_w_m2: irr / n,
            mean_wind_speed_m_s: wind / n,
            mean_hydro_availability: hydro / n,
            mean_temperature_c: temp / n,
            min_temperature_c: t_min,
            max_temperature_c: t_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(hour: u32, temp: f64) -> HourlyResource {
        HourlyResource {
            timestamp: NaiveDate::from_ymd_opt(2023, 6, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            irradiance_w_m2: 100.0,
            wind_speed_m_s: 4.0,
            hydro_availability: 0.5,
            temperature_c: temp,
        }
    }

    #[test]
    fn stats_of_empty_series_are_zero() {
        let s = SeriesStats::from_records(&[]);
        assert_eq!(s.hours, 0);
        assert_eq!(s.mean_temperature_c, 0.0);
    }

    #[test]
    fn stats_track_mean_and_extremes() {
        let s = SeriesStats::from_records(&[record(0, 10.0), record(1, 20.0), record(2, 30.0)]);
        assert_eq!(s.hours, 3);
        assert!((s.mean_temperature_c - 20.0).abs() < 1e-12);
        assert_eq!(s.min_temperature_c, 10.0);
        assert_eq!(s.max_temperature_c, 30.0);
        assert!((s.mean_wind_speed_m_s - 4.0).abs() < 1e-12);
    }

    #[test]
    fn any_api_detects_mixed_provenance() {
        let mut p = ChannelProvenance::all(Provenance::Synthetic);
        assert!(!p.any_api());
        p.temperature = Provenance::Api;
        assert!(p.any_api());
    }
}
