//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use renewable_planner::config::PlannerConfig;
use renewable_planner::error::{CacheError, ResourceError};
use renewable_planner::pipeline::Orchestrator;
use renewable_planner::request::{DateRange, PipelineRequest};
use renewable_planner::resource::{
    InMemoryCache, NoopCache, RawResourceData, ResourceCache, ResourcePlanner, ResourceQuery,
    ResourceSource, synthetic,
};

/// Two summer weeks; keeps end-to-end runs fast.
pub fn short_range() -> DateRange {
    DateRange {
        start_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 6, 14).unwrap(),
    }
}

/// Bay Area site: 1000 kW average, 1200 kW peak, PUE 1.5, $1M budget,
/// 80 % target, $0.12/kWh.
pub fn scenario_a() -> PipelineRequest {
    PipelineRequest {
        date_range: Some(short_range()),
        ..PipelineRequest::bay_area()
    }
}

/// Orchestrator that never touches the network.
pub fn offline_orchestrator() -> Orchestrator {
    Orchestrator::new(PlannerConfig::default(), ResourcePlanner::offline())
}

/// Orchestrator over an explicit source with a fresh in-memory cache.
pub fn orchestrator_with(source: impl ResourceSource + 'static) -> Orchestrator {
    let planner = ResourcePlanner::new(
        Some(Box::new(source)),
        Arc::new(InMemoryCache::new()),
        Duration::from_secs(3600),
    );
    Orchestrator::new(PlannerConfig::default(), planner)
}

/// Orchestrator whose source always times out and which has no cache.
pub fn unreachable_orchestrator() -> Orchestrator {
    let planner = ResourcePlanner::new(
        Some(Box::new(TimeoutSource)),
        Arc::new(NoopCache),
        Duration::ZERO,
    );
    Orchestrator::new(PlannerConfig::default(), planner)
}

/// Orchestrator over `source` whose cache backend is down.
pub fn cache_down_orchestrator(source: impl ResourceSource + 'static) -> Orchestrator {
    let planner = ResourcePlanner::new(
        Some(Box::new(source)),
        Arc::new(DownCache),
        Duration::from_secs(3600),
    );
    Orchestrator::new(PlannerConfig::default(), planner)
}

/// Returns all-zero solar and wind with plausible temperatures.
pub struct ZeroSource;

impl ResourceSource for ZeroSource {
    fn name(&self) -> &str {
        "zero"
    }

    fn fetch(&self, query: &ResourceQuery) -> Result<RawResourceData, ResourceError> {
        let timestamps = synthetic::hourly_timestamps(&query.range);
        let n = timestamps.len();
        Ok(RawResourceData {
            timestamps,
            irradiance_w_m2: Some(vec![0.0; n]),
            wind_speed_m_s: Some(vec![0.0; n]),
            temperature_c: Some(vec![20.0; n]),
        })
    }
}

/// Always fails with a timeout.
pub struct TimeoutSource;

impl ResourceSource for TimeoutSource {
    fn name(&self) -> &str {
        "timeout"
    }

    fn fetch(&self, _query: &ResourceQuery) -> Result<RawResourceData, ResourceError> {
        Err(ResourceError::Timeout)
    }
}

/// Serves the synthetic weather for the query as if it came from an API.
pub struct SteadySource;

impl ResourceSource for SteadySource {
    fn name(&self) -> &str {
        "steady"
    }

    fn fetch(&self, query: &ResourceQuery) -> Result<RawResourceData, ResourceError> {
        let records = synthetic::synthesize(&query.coordinates, &query.range);
        Ok(RawResourceData {
            timestamps: records.iter().map(|r| r.timestamp).collect(),
            irradiance_w_m2: Some(records.iter().map(|r| r.irradiance_w_m2).collect()),
            wind_speed_m_s: Some(records.iter().map(|r| r.wind_speed_m_s).collect()),
            temperature_c: Some(records.iter().map(|r| r.temperature_c).collect()),
        })
    }
}

/// Cache whose backend rejects every call.
pub struct DownCache;

impl ResourceCache for DownCache {
    fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}
