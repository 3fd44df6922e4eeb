use std::{fmt::Display, str::FromStr};

use serde::Deserialize;
use tracing_subscriber::{filter::ParseError, EnvFilter};

#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
	Trace,
	Debug,
	#[default]
	Info,
	Warn,
	Error,
}

impl Display for LogLevel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Trace => write!(f, "trace"),
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warn => write!(f, "warn"),
			Self::Error => write!(f, "error"),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum LoggingPreset {
	#[default]
	Default,
	Verbose,
	Develop,
	Trace,
}

impl LoggingPreset {
	pub fn get_config(&self) -> LoggingConfig {
		match self {
			Self::Default => LoggingConfig {
				other: LogLevel::Warn,
				cli: LogLevel::Info,
				engine: LogLevel::Warn,
				batch: LogLevel::Info,
				decoders: LogLevel::Warn,
			},

			Self::Verbose => LoggingConfig {
				other: LogLevel::Warn,
				cli: LogLevel::Debug,
				engine: LogLevel::Info,
				batch: LogLevel::Debug,
				decoders: LogLevel::Info,
			},

			Self::Develop => LoggingConfig {
				other: LogLevel::Debug,
				cli: LogLevel::Trace,
				engine: LogLevel::Debug,
				batch: LogLevel::Debug,
				decoders: LogLevel::Debug,
			},

			Self::Trace => LoggingConfig {
				other: LogLevel::Trace,
				cli: LogLevel::Trace,
				engine: LogLevel::Trace,
				batch: LogLevel::Trace,
				decoders: LogLevel::Trace,
			},
		}
	}
}

pub struct LoggingConfig {
	other: LogLevel,
	cli: LogLevel,

	engine: LogLevel,
	batch: LogLevel,
	decoders: LogLevel,
}

impl LoggingConfig {
	/// Build a tracing filter from this config.
	/// More specific targets must come before less specific ones.
	pub fn to_filter(&self) -> Result<EnvFilter, ParseError> {
		EnvFilter::from_str(
			&[
				format!("audiometa::batch={}", self.batch),
				format!("audiometa::mp3={}", self.decoders),
				format!("audiometa::flac={}", self.decoders),
				format!("audiometa::ogg={}", self.decoders),
				format!("audiometa::mp4={}", self.decoders),
				format!("audiometa::common={}", self.decoders),
				format!("audiometa={}", self.engine),
				format!("audiometa_util={}", self.engine),
				format!("audiometa_cli={}", self.cli),
				self.other.to_string(),
			]
			.join(","),
		)
	}
}
