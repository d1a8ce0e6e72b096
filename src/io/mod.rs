//! File output for pipeline results.

pub mod export;
