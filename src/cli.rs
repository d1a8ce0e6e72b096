//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::request::PipelineRequest;

/// Plan a data center's transition to renewable energy.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Request JSON file
    #[arg(short, long, conflicts_with = "preset")]
    pub request: Option<PathBuf>,
    /// Built-in request preset (bay_area, vppa_hedge, hot_climate)
    #[arg(short, long)]
    pub preset: Option<String>,
    /// Planner configuration TOML
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the Monte Carlo seed
    #[arg(long)]
    pub seed: Option<u64>,
    /// Skip the weather API and use synthetic resource data
    #[arg(long)]
    pub offline: bool,
    /// Write the full result as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Write the hourly PUE forecast as CSV
    #[arg(long)]
    pub profile_out: Option<PathBuf>,
    /// Write the hourly resource series as CSV
    #[arg(long)]
    pub resource_out: Option<PathBuf>,
}

impl CliArgs {
    /// Name of the preset used when neither a request nor a preset is given.
    pub const DEFAULT_PRESET: &'static str = "bay_area";

    /// Resolves the request source: file, named preset, or the default preset.
    ///
    /// # Errors
    ///
    /// Returns a `RequestError` if the file cannot be read or parsed, or the
    /// preset is unknown.
    pub fn load_request(&self) -> Result<PipelineRequest, crate::error::RequestError> {
        match (&self.request, &self.preset) {
            (Some(path), _) => PipelineRequest::from_json_file(path),
            (None, Some(name)) => PipelineRequest::from_preset(name),
            (None, None) => PipelineRequest::from_preset(Self::DEFAULT_PRESET),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = CliArgs::try_parse_from([
            "renewable-planner",
            "--preset",
            "vppa_hedge",
            "--seed",
            "7",
            "--offline",
            "--output",
            "out.json",
            "--profile-out",
            "pue.csv",
        ])
        .unwrap();
        assert_eq!(args.preset.as_deref(), Some("vppa_hedge"));
        assert_eq!(args.seed, Some(7));
        assert!(args.offline);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.profile_out, Some(PathBuf::from("pue.csv")));
        assert!(args.resource_out.is_none());
    }

    #[test]
    fn request_and_preset_conflict() {
        let r = CliArgs::try_parse_from([
            "renewable-planner",
            "--request",
            "r.json",
            "--preset",
            "bay_area",
        ]);
        assert!(r.is_err());
    }

    #[test]
    fn default_preset_is_used() {
        let args = CliArgs::try_parse_from(["renewable-planner"]).unwrap();
        assert_eq!(args.load_request().unwrap(), PipelineRequest::bay_area());
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let args = CliArgs::try_parse_from(["renewable-planner", "--preset", "mars"]).unwrap();
        assert!(args.load_request().is_err());
    }
}
