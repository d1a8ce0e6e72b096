//! Hourly solar, wind, hydro, and temperature data for a site.

pub mod cache;
pub mod planner;
pub mod series;
pub mod source;
pub mod synthetic;

pub use cache::{InMemoryCache, NoopCache, ResourceCache, cache_key};
pub use planner::{ResourcePlan, ResourcePlanner};
pub use series::{ChannelProvenance, HourlyResource, Provenance, ResourceSeries, SeriesStats};
pub use source::{OpenMeteoSource, RawResourceData, ResourceQuery, ResourceSource};
