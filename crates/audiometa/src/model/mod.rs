//! The format-independent metadata model.
//! Every decoder produces a [`Metadata`].

use serde::Serialize;

use crate::format::Format;

mod artwork;
mod chapter;
mod info;
mod tags;
mod tagtype;
mod warning;

pub use artwork::{Artwork, PictureType};
pub use chapter::Chapter;
pub use info::{AudioInfo, ReplayGain};
pub use tags::{RawTags, Tags};
pub use tagtype::TagType;
pub use warning::{Stage, Warning};

pub(crate) use chapter::finalize_chapters;
pub(crate) use info::{estimate_bitrate, samples_to_duration};
pub(crate) use tags::{parse_number, parse_number_pair};
pub(crate) use warning::WarningSink;

/// Everything a decoder found in one file
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
	pub format: Format,
	pub tags: Tags,
	pub info: AudioInfo,

	/// Always sorted by start time, indexed from 1.
	pub chapters: Vec<Chapter>,

	/// Problems we found, in the order we found them
	pub warnings: Vec<Warning>,
}

impl Metadata {
	pub fn new(format: Format, info: AudioInfo) -> Self {
		Self {
			format,
			tags: Tags::new(),
			info,
			chapters: Vec::new(),
			warnings: Vec::new(),
		}
	}

	/// Record a warning
	pub(crate) fn warn(&mut self, stage: Stage, offset: u64, message: impl Into<String>) {
		self.warnings.warn(stage, offset, message);
	}

	/// Set this file's chapters, bringing them into canonical order
	pub(crate) fn set_chapters(&mut self, mut chapters: Vec<Chapter>) {
		finalize_chapters(&mut chapters, self.info.duration);
		self.chapters = chapters;
	}
}
