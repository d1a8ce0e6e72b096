//! Resource planning stage: fetch, validate, fall back, cache.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::{NoopCache, ResourceCache, cache_key};
use super::series::{ChannelProvenance, HourlyResource, Provenance, ResourceSeries, SeriesStats};
use super::source::{OpenMeteoSource, RawResourceData, ResourceQuery, ResourceSource};
use super::synthetic;
use crate::config::ResourceConfig;
use crate::error::{CacheError, ResourceError};

/// Output of the resource planning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub series: ResourceSeries,
    pub stats: SeriesStats,
    pub cache_hit: bool,
    /// Why synthetic data replaced the external source, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl ResourcePlan {
    fn new(series: ResourceSeries, cache_hit: bool, fallback_reason: Option<String>) -> Self {
        Self {
            stats: series.stats(),
            series,
            cache_hit,
            fallback_reason,
        }
    }
}

/// Obtains hourly resource data for a site, never failing.
pub struct ResourcePlanner {
    source: Option<Box<dyn ResourceSource>>,
    cache: Arc<dyn ResourceCache>,
    cache_ttl: Duration,
}

impl ResourcePlanner {
    /// Creates a planner over an explicit source and cache.
    pub fn new(
        source: Option<Box<dyn ResourceSource>>,
        cache: Arc<dyn ResourceCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            cache_ttl,
        }
    }

    /// A planner that always synthesizes and never caches.
    pub fn offline() -> Self {
        Self::new(None, Arc::new(NoopCache), Duration::ZERO)
    }

    /// Builds the production planner from configuration.
    ///
    /// Uses the Open-Meteo archive unless `offline` is set.
    ///
    /// # Errors
    ///
    /// Returns a `ResourceError` if the HTTP client cannot be constructed.
    pub fn from_config(
        config: &ResourceConfig,
        cache: Arc<dyn ResourceCache>,
    ) -> Result<Self, ResourceError> {
        let source: Option<Box<dyn ResourceSource>> = if config.offline {
            None
        } else {
            Some(Box::new(OpenMeteoSource::new(
                config.api_base_url.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        };
        Ok(Self::new(
            source,
            cache,
            Duration::from_secs(config.cache_ttl_hours * 3600),
        ))
    }

    /// Plans resources for `query`.
    ///
    /// Cached series are returned as-is. Otherwise the external source is
    /// tried and any failure falls back to a deterministic synthetic series.
    pub fn plan(&self, query: &ResourceQuery) -> ResourcePlan {
        let key = cache_key(&query.coordinates, &query.range);

        match self.cached(&key) {
            Ok(Some(series)) => {
                info!(%key, "resource series served from cache");
                return ResourcePlan::new(series, true, None);
            }
            Ok(None) => debug!(%key, "resource cache miss"),
            Err(e) => debug!(%key, error = %e, "resource cache unavailable"),
        }

        let fetched = match &self.source {
            Some(source) => source
                .fetch(query)
                .and_then(|raw| assemble(raw, query, source.name())),
            None => Err(ResourceError::Offline),
        };

        match fetched {
            Ok(series) => {
                info!(
                    hours = series.len(),
                    source = %series.source,
                    "resource series fetched"
                );
                if series.provenance.any_api() {
                    if let Err(e) = self.store(&key, &series) {
                        debug!(%key, error = %e, "resource cache write failed");
                    }
                }
                ResourcePlan::new(series, false, None)
            }
            Err(e) => {
                warn!(error = %e, "resource fetch failed, synthesizing series");
                let series = ResourceSeries {
                    coordinates: query.coordinates,
                    range: query.range,
                    provenance: ChannelProvenance::all(Provenance::Synthetic),
                    source: "synthetic".to_string(),
                    records: synthetic::synthesize(&query.coordinates, &query.range),
                };
                ResourcePlan::new(series, false, Some(e.to_string()))
            }
        }
    }

    fn cached(&self, key: &str) -> Result<Option<ResourceSeries>, CacheError> {
        match self.cache.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, series: &ResourceSeries) -> Result<(), CacheError> {
        let raw = serde_json::to_string(series)?;
        self.cache.set(key, &raw, self.cache_ttl)
    }
}

fn is_empty_channel(channel: &Option<Vec<f64>>) -> bool {
    channel
        .as_ref()
        .is_none_or(|values| values.iter().all(|v| *v <= 0.0))
}

/// Merges fetched channels with synthetic ones into a full series.
///
/// Fails when the window does not line up or when neither solar nor wind
/// carries any signal.
fn assemble(
    raw: RawResourceData,
    query: &ResourceQuery,
    source_name: &str,
) -> Result<ResourceSeries, ResourceError> {
    let expected = query.range.hours();
    if raw.timestamps.len() != expected {
        return Err(ResourceError::Malformed(format!(
            "expected {expected} hourly records, got {}",
            raw.timestamps.len()
        )));
    }
    for (name, channel) in [
        ("irradiance", &raw.irradiance_w_m2),
        ("wind speed", &raw.wind_speed_m_s),
        ("temperature", &raw.temperature_c),
    ] {
        if let Some(values) = channel
            && values.len() != expected
        {
            return Err(ResourceError::Malformed(format!(
                "{name} channel has {} values for {expected} hours",
                values.len()
            )));
        }
    }
    if is_empty_channel(&raw.irradiance_w_m2) && is_empty_channel(&raw.wind_speed_m_s) {
        return Err(ResourceError::EmptyChannels);
    }

    let fallback = synthetic::synthesize(&query.coordinates, &query.range);
    let pick = |channel: &Option<Vec<f64>>| match channel {
        Some(_) => Provenance::Api,
        None => Provenance::Synthetic,
    };
    let provenance = ChannelProvenance {
        solar: pick(&raw.irradiance_w_m2),
        wind: pick(&raw.wind_speed_m_s),
        hydro: Provenance::Synthetic,
        temperature: pick(&raw.temperature_c),
    };

    let records = raw
        .timestamps
        .iter()
        .zip(&fallback)
        .enumerate()
        .map(|(i, (timestamp, synth))| HourlyResource {
            timestamp: *timestamp,
            irradiance_w_m2: raw
                .irradiance_w_m2
                .as_ref()
                .map_or(synth.irradiance_w_m2, |v| v[i].max(0.0)),
            wind_speed_m_s: raw
                .wind_speed_m_s
                .as_ref()
                .map_or(synth.wind_speed_m_s, |v| v[i].max(0.0)),
            hydro_availability: synth.hydro_availability,
            temperature_c: raw
                .temperature_c
                .as_ref()
                .map_or(synth.temperature_c, |v| v[i]),
        })
        .collect();

    Ok(ResourceSeries {
        coordinates: query.coordinates,
        range: query.range,
        provenance,
        source: source_name.to_string(),
        records,
    })
}
