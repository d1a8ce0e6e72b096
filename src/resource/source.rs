//! External weather sources.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use crate::error::ResourceError;
use crate::request::{Coordinates, DateRange};

/// What the planner asks a source for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceQuery {
    pub coordinates: Coordinates,
    pub range: DateRange,
}

/// Raw hourly channels as returned by a source.
///
/// A channel is `None` when the source did not provide it at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResourceData {
    pub timestamps: Vec<NaiveDateTime>,
    pub irradiance_w_m2: Option<Vec<f64>>,
    pub wind_speed_m_s: Option<Vec<f64>>,
    pub temperature_c: Option<Vec<f64>>,
}

/// Describes an interface for retrieving hourly weather for a site.
pub trait ResourceSource: Send + Sync {
    /// Short label recorded in the series provenance.
    fn name(&self) -> &str;

    /// Fetches hourly channels for the query window.
    ///
    /// # Errors
    ///
    /// Returns a `ResourceError` on transport, status, or decoding failures.
    fn fetch(&self, query: &ResourceQuery) -> Result<RawResourceData, ResourceError>;
}

/// Open-Meteo historical archive client.
pub struct OpenMeteoSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<ArchiveHourly>,
}

#[derive(Debug, Deserialize)]
struct ArchiveHourly {
    time: Vec<String>,
    #[serde(default)]
    shortwave_radiation: Option<Vec<Option<f64>>>,
    #[serde(default)]
    wind_speed_10m: Option<Vec<Option<f64>>>,
    #[serde(default)]
    temperature_2m: Option<Vec<Option<f64>>>,
}

impl OpenMeteoSource {
    /// Creates a client with the given base URL and request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Connection` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ResourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResourceError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn query_params(query: &ResourceQuery) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", query.coordinates.latitude.to_string()),
            ("longitude", query.coordinates.longitude.to_string()),
            ("start_date", query.range.start_date.to_string()),
            ("end_date", query.range.end_date.to_string()),
            (
                "hourly",
                "shortwave_radiation,wind_speed_10m,temperature_2m".to_string(),
            ),
            ("wind_speed_unit", "ms".to_string()),
            ("timezone", "auto".to_string()),
        ]
    }
}

impl ResourceSource for OpenMeteoSource {
    fn name(&self) -> &str {
        "open-meteo"
    }

    fn fetch(&self, query: &ResourceQuery) -> Result<RawResourceData, ResourceError> {
        debug!(url = %self.base_url, "fetching hourly weather");
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query_params(query))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::Status(status.as_u16()));
        }

        let body: ArchiveResponse = response.json()?;
        parse_archive(body)
    }
}

fn parse_archive(body: ArchiveResponse) -> Result<RawResourceData, ResourceError> {
    let hourly = body
        .hourly
        .ok_or_else(|| ResourceError::Malformed("missing \"hourly\" block".to_string()))?;

    let timestamps = hourly
        .time
        .iter()
        .map(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ResourceError::Parse(e.to_string()))?;

    Ok(RawResourceData {
        irradiance_w_m2: hourly.shortwave_radiation.and_then(fill_gaps),
        wind_speed_m_s: hourly.wind_speed_10m.and_then(fill_gaps),
        temperature_c: hourly.temperature_2m.and_then(fill_gaps),
        timestamps,
    })
}

/// Carries the last valid reading across null gaps.
///
/// A channel that is mostly null is treated as absent.
fn fill_gaps(values: Vec<Option<f64>>) -> Option<Vec<f64>> {
    let valid = values.iter().filter(|v| v.is_some_and(f64::is_finite)).count();
    if valid * 2 < values.len() || valid == 0 {
        return None;
    }
    let first = values.iter().flatten().copied().find(|v| v.is_finite())?;
    let mut last = first;
    Some(
        values
            .into_iter()
            .map(|v| match v {
                Some(x) if x.is_finite() => {
                    last = x;
                    x
                }
                _ => last,
            })
            .collect(),
    )
}
