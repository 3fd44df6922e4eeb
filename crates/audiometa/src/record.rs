use std::{
	fmt::Debug,
	path::{Path, PathBuf},
	sync::{Arc, OnceLock},
};
use tracing::debug;

use crate::{
	errors::DecodeError,
	format::Format,
	model::{Artwork, AudioInfo, Chapter, Metadata, Tags, Warning},
	reader::{BoundedReader, ByteSource},
	registry::{Decoder, ExtractedArtwork},
};

/// An open audio file and everything we decoded from it.
///
/// The only thing that changes after construction is the artwork slot,
/// which is filled the first time [`MetadataRecord::artwork`] succeeds.
pub struct MetadataRecord {
	path: PathBuf,
	size: u64,
	metadata: Metadata,

	source: Box<dyn ByteSource>,
	decoder: Arc<dyn Decoder>,
	artwork: OnceLock<ExtractedArtwork>,
}

impl Debug for MetadataRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MetadataRecord")
			.field("path", &self.path)
			.field("size", &self.size)
			.field("metadata", &self.metadata)
			.field("decoder", &self.decoder.name())
			.field("artwork_loaded", &self.artwork.get().is_some())
			.finish()
	}
}

impl MetadataRecord {
	pub(crate) fn new(
		path: PathBuf,
		size: u64,
		metadata: Metadata,
		source: Box<dyn ByteSource>,
		decoder: Arc<dyn Decoder>,
	) -> Self {
		Self {
			path,
			size,
			metadata,
			source,
			decoder,
			artwork: OnceLock::new(),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn format(&self) -> Format {
		self.metadata.format
	}

	/// The size of this file, in bytes
	pub fn size(&self) -> u64 {
		self.size
	}

	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	pub fn tags(&self) -> &Tags {
		&self.metadata.tags
	}

	pub fn info(&self) -> &AudioInfo {
		&self.metadata.info
	}

	pub fn chapters(&self) -> &[Chapter] {
		&self.metadata.chapters
	}

	/// Warnings from the initial decode
	pub fn warnings(&self) -> &[Warning] {
		&self.metadata.warnings
	}

	/// A bounded reader over this file's bytes
	pub fn reader(&self) -> BoundedReader<'_> {
		BoundedReader::new(&*self.source, self.size)
	}

	/// Get this file's embedded pictures.
	///
	/// The first successful call decodes them, later calls return the
	/// cached list. A failure is returned to the caller and not cached.
	/// Files whose decoder can't extract artwork have no pictures.
	pub fn artwork(&self) -> Result<&[Artwork], DecodeError> {
		return Ok(&self.load_artwork()?.artwork);
	}

	/// Warnings from artwork extraction.
	/// Empty until [`MetadataRecord::artwork`] succeeds.
	pub fn artwork_warnings(&self) -> &[Warning] {
		match self.artwork.get() {
			Some(x) => &x.warnings,
			None => &[],
		}
	}

	fn load_artwork(&self) -> Result<&ExtractedArtwork, DecodeError> {
		if let Some(x) = self.artwork.get() {
			return Ok(x);
		}

		let extracted = match self.decoder.artwork() {
			Some(extractor) => extractor.extract_artwork(self.reader(), &self.path)?,
			None => ExtractedArtwork::default(),
		};

		debug!(
			message = "Extracted artwork",
			path = ?self.path,
			count = extracted.artwork.len(),
			warnings = extracted.warnings.len()
		);

		return Ok(self.artwork.get_or_init(|| extracted));
	}

	/// Release this file
	pub fn close(self) {
		debug!(message = "Closing file", path = ?self.path);
		drop(self);
	}
}
