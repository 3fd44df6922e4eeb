use serde::Serialize;
use std::fmt::Display;
use tracing::debug;

/// The decoding stage a warning was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
	Metadata,
	Technical,
	Chapters,
	Artwork,
}

impl Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Metadata => write!(f, "metadata"),
			Self::Technical => write!(f, "technical"),
			Self::Chapters => write!(f, "chapters"),
			Self::Artwork => write!(f, "artwork"),
		}
	}
}

/// A non-fatal problem we found while decoding.
///
/// Warnings never stop a decode. They tell the caller that
/// some of the metadata may be missing or wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
	pub stage: Stage,
	pub message: String,

	/// Where in the file we found this problem.
	/// Zero if not applicable.
	pub offset: u64,
}

impl Display for Warning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.offset == 0 {
			write!(f, "[{}] {}", self.stage, self.message)
		} else {
			write!(f, "[{}] {} (at offset {})", self.stage, self.message, self.offset)
		}
	}
}

/// Something we can record warnings into
pub(crate) trait WarningSink {
	fn warn(&mut self, stage: Stage, offset: u64, message: impl Into<String>);
}

impl WarningSink for Vec<Warning> {
	fn warn(&mut self, stage: Stage, offset: u64, message: impl Into<String>) {
		let message = message.into();
		debug!(message = "Recorded warning", %stage, offset, warning = %message);
		self.push(Warning {
			stage,
			message,
			offset,
		});
	}
}
