use std::path::PathBuf;
use thiserror::Error;

use crate::{format::Format, model::Warning, reader::ReadError};

/// A fatal error that aborts a whole decode
#[derive(Debug, Error)]
pub enum DecodeError {
	/// This isn't a file we support.
	/// Wrong magic, an unknown version, or an unknown codec.
	#[error("unsupported format: {0}")]
	UnsupportedFormat(String),

	/// This file claims to be a format we support,
	/// but its structure can't be navigated.
	#[error("malformed file at offset {offset}: {message}")]
	Malformed { offset: u64, message: String },

	/// A required read failed
	#[error("read error")]
	Read(#[from] ReadError),

	/// We decoded this file, but strict mode is on
	/// and we recorded a warning.
	#[error("strict mode: {0}")]
	Strict(Warning),
}

impl DecodeError {
	pub(crate) fn malformed(offset: u64, message: impl Into<String>) -> Self {
		Self::Malformed {
			offset,
			message: message.into(),
		}
	}
}

/// An error we encountered while opening a file
#[derive(Debug, Error)]
pub enum OpenError {
	#[error("i/o error")]
	Io(#[from] std::io::Error),

	/// We recognized this file, but have no decoder for it
	#[error("no decoder registered for {0}")]
	Unsupported(Format),

	#[error("could not decode `{path}`")]
	Decode {
		path: PathBuf,
		#[source]
		source: DecodeError,
	},
}

/// An error we encountered while writing metadata
#[derive(Debug, Error)]
pub enum WriteError {
	#[error("no writer registered for {0}")]
	NoWriter(Format),

	#[error("i/o error")]
	Io(#[from] std::io::Error),
}

/// An error we encountered while opening many files at once
#[derive(Debug, Error)]
pub enum BatchError {
	/// The batch was cancelled before every file was opened
	#[error("batch open was cancelled")]
	Cancelled,

	#[error("could not open file {index}")]
	Open {
		/// The index of the failed file in the input list
		index: usize,
		#[source]
		source: OpenError,
	},
}
