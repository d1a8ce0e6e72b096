//! Data-center renewable transition planner.
//!
//! Sizes on-site solar, wind, and storage for a facility, forecasts its
//! weather-driven PUE, compares ownership with a virtual PPA, and
//! quantifies risk with a Monte Carlo sensitivity analysis.

pub mod cli;
pub mod config;
pub mod error;
pub mod finance;
pub mod io;
pub mod optimizer;
/// Stage orchestration and the aggregate result.
pub mod pipeline;
pub mod pue;
pub mod request;
pub mod resource;
pub mod sensitivity;
