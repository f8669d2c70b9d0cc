/*!
This module defines the `Config` struct, which is used to configure a run of [`analyze`](crate::analyze). Every field is optional. [`AnalysisOptions::from_config`] fills in the defaults and rejects values that cannot be run.
*/

use crate::score::CandidatePolicy;
use anyhow::{format_err, Context, Result};
use std::path::Path;

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// Keep only the first `max_depth` splits of each scored rule.
	pub max_depth: Option<usize>,
	/// The number of rules in one batch of a job array.
	pub batch_size: Option<usize>,
	pub n_threads: Option<usize>,
	pub candidates: Option<CandidatePolicy>,
	/// Score on the calling thread instead of a pool.
	pub sequential: Option<bool>,
	pub write_artifacts: Option<bool>,
	pub write_overview: Option<bool>,
}

impl Config {
	pub fn from_path(config_path: &Path) -> Result<Config> {
		let config = std::fs::read_to_string(config_path)
			.with_context(|| format!("failed to read config file {}", config_path.display()))?;
		let config = serde_yaml::from_str(&config)
			.with_context(|| format!("failed to parse config file {}", config_path.display()))?;
		Ok(config)
	}
}

/// Load the config from `config_path`, or use the defaults when no path is given.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
	match config_path {
		Some(config_path) => Config::from_path(config_path),
		None => Ok(Config::default()),
	}
}

/// The resolved settings of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisOptions {
	pub max_depth: Option<usize>,
	pub batch_size: usize,
	/// The size of the pool. `None` sizes it to the available cores.
	pub n_threads: Option<usize>,
	pub candidates: CandidatePolicy,
	pub sequential: bool,
	pub write_artifacts: bool,
	pub write_overview: bool,
}

pub const DEFAULT_BATCH_SIZE: usize = 100;

impl Default for AnalysisOptions {
	fn default() -> AnalysisOptions {
		AnalysisOptions {
			max_depth: None,
			batch_size: DEFAULT_BATCH_SIZE,
			n_threads: None,
			candidates: CandidatePolicy::default(),
			sequential: false,
			write_artifacts: true,
			write_overview: true,
		}
	}
}

impl AnalysisOptions {
	pub fn from_config(config: &Config) -> Result<AnalysisOptions> {
		let defaults = AnalysisOptions::default();
		let batch_size = config.batch_size.unwrap_or(defaults.batch_size);
		if batch_size == 0 {
			return Err(format_err!("batch_size must be greater than zero"));
		}
		if config.n_threads == Some(0) {
			return Err(format_err!("n_threads must be greater than zero"));
		}
		Ok(AnalysisOptions {
			max_depth: config.max_depth,
			batch_size,
			n_threads: config.n_threads,
			candidates: config.candidates.unwrap_or(defaults.candidates),
			sequential: config.sequential.unwrap_or(defaults.sequential),
			write_artifacts: config.write_artifacts.unwrap_or(defaults.write_artifacts),
			write_overview: config.write_overview.unwrap_or(defaults.write_overview),
		})
	}
}

#[test]
fn test_options_from_yaml() {
	let config: Config = serde_yaml::from_str(
		r#"
max_depth: 3
batch_size: 250
candidates: all_others
write_overview: false
"#,
	)
	.unwrap();
	let options = AnalysisOptions::from_config(&config).unwrap();
	assert_eq!(
		options,
		AnalysisOptions {
			max_depth: Some(3),
			batch_size: 250,
			candidates: CandidatePolicy::AllOthers,
			write_overview: false,
			..AnalysisOptions::default()
		}
	);
}

#[test]
fn test_zero_batch_size_is_rejected() {
	let config = Config {
		batch_size: Some(0),
		..Config::default()
	};
	let error = AnalysisOptions::from_config(&config).unwrap_err();
	insta::assert_snapshot!(error.to_string(), @"batch_size must be greater than zero");
}

#[test]
fn test_unknown_fields_are_rejected() {
	let result: Result<Config, _> = serde_yaml::from_str("batch_sise: 10\n");
	assert!(result.is_err());
}
