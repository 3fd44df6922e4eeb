use audiometa::OpenOptions;
use audiometa_util::logging::LoggingPreset;
use serde::Deserialize;

/// Settings read from `AUDIOMETA_*` environment variables.
/// Command-line flags override these.
///
/// Envy is case-insensitive, and expects Rust fields to be snake_case.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CliConfig {
	/// The logging level to run with
	#[serde(default)]
	pub loglevel: LoggingPreset,

	/// Fail on any decode warning
	#[serde(default)]
	pub strict: bool,

	/// Read whole files into memory before decoding
	#[serde(default)]
	pub preload: bool,

	/// How many files to open at once.
	/// Defaults to the number of cores.
	#[serde(default)]
	pub threads: Option<usize>,
}

impl CliConfig {
	pub fn open_options(&self) -> OpenOptions {
		OpenOptions {
			strict: self.strict,
			preload: self.preload,
		}
	}

	pub fn threads(&self) -> usize {
		self.threads
			.filter(|x| *x > 0)
			.unwrap_or_else(audiometa::default_threads)
	}
}
