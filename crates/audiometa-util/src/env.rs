use serde::de::DeserializeOwned;
use smartstring::{LazyCompact, SmartString};
use std::{
	env::VarError,
	io::ErrorKind,
	path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum EnvLoadError {
	#[error("could not read .env")]
	DotEnvIo(#[from] std::io::Error),

	#[error("bad variable in .env")]
	DotEnvVar(#[from] VarError),

	#[error("could not parse .env line `{line}` at char {at_char}")]
	DotEnvLine { line: String, at_char: usize },

	#[error("error while loading .env")]
	DotEnvOther(#[source] dotenvy::Error),

	#[error("missing config value `{0}`")]
	MissingValue(SmartString<LazyCompact>),

	#[error("invalid config: {0}")]
	Invalid(String),
}

impl From<envy::Error> for EnvLoadError {
	fn from(value: envy::Error) -> Self {
		match value {
			envy::Error::MissingValue(x) => Self::MissingValue(x.into()),
			envy::Error::Custom(x) => Self::Invalid(x),
		}
	}
}

/// A config we loaded, and where it came from
pub enum LoadedEnv<T> {
	/// We loaded config from `.env` and env vars
	FoundFile { config: T, path: PathBuf },

	/// There is no `.env`, we only read env vars
	OnlyVars(T),
}

impl<T> LoadedEnv<T> {
	pub fn get_config(&self) -> &T {
		match self {
			Self::FoundFile { config, .. } | Self::OnlyVars(config) => config,
		}
	}

	pub fn into_config(self) -> T {
		match self {
			Self::FoundFile { config, .. } | Self::OnlyVars(config) => config,
		}
	}

	/// The `.env` file we read, if any
	pub fn env_file(&self) -> Option<&Path> {
		match self {
			Self::FoundFile { path, .. } => Some(path),
			Self::OnlyVars(_) => None,
		}
	}
}

/// Read `T` from `vars`.
///
/// Only variables starting with `prefix` are used.
/// The prefix is stripped, and names are matched case-insensitively.
pub fn config_from_vars<T, I>(prefix: &str, vars: I) -> Result<T, EnvLoadError>
where
	T: DeserializeOwned,
	I: IntoIterator<Item = (String, String)>,
{
	return Ok(envy::prefixed(prefix).from_iter(vars)?);
}

/// Load `T` from the environment of this process.
/// Variables in `./.env` (if it exists) are added first.
///
/// See [`config_from_vars`].
pub fn load_env<T: DeserializeOwned>(prefix: &str) -> Result<LoadedEnv<T>, EnvLoadError> {
	let env_file = match dotenvy::dotenv() {
		Ok(path) => Some(path),

		Err(dotenvy::Error::Io(err)) if err.kind() == ErrorKind::NotFound => None,
		Err(dotenvy::Error::Io(err)) => return Err(err.into()),
		Err(dotenvy::Error::EnvVar(err)) => return Err(err.into()),
		Err(dotenvy::Error::LineParse(line, at_char)) => {
			return Err(EnvLoadError::DotEnvLine { line, at_char })
		}
		Err(err) => return Err(EnvLoadError::DotEnvOther(err)),
	};

	trace!(message = "Reading config from environment", prefix, ?env_file);
	let config = config_from_vars(prefix, std::env::vars())?;

	return Ok(match env_file {
		Some(path) => LoadedEnv::FoundFile { config, path },
		None => LoadedEnv::OnlyVars(config),
	});
}
