//! Decoder and writer registration

use std::{collections::HashMap, fmt::Debug, path::Path, sync::Arc};
use tracing::debug;

use crate::{
	errors::{DecodeError, WriteError},
	format::Format,
	model::{Artwork, Metadata, Warning},
	reader::BoundedReader,
	record::MetadataRecord,
};

/// Something that can decode one or more formats
pub trait Decoder: Send + Sync {
	/// A short name for this decoder, used in logs
	fn name(&self) -> &'static str;

	/// Decode `reader`, which holds the entire file at `path`.
	///
	/// A decoder must not fail on damage it can skip over.
	/// Skippable damage is reported as a warning in the result.
	fn parse(&self, reader: BoundedReader<'_>, path: &Path) -> Result<Metadata, DecodeError>;

	/// If this decoder can also extract embedded pictures, return it.
	fn artwork(&self) -> Option<&dyn ArtworkExtractor> {
		None
	}
}

/// The result of an artwork extraction
#[derive(Debug, Clone, Default)]
pub struct ExtractedArtwork {
	pub artwork: Vec<Artwork>,

	/// Problems we found while extracting.
	/// These never affect the primary decode.
	pub warnings: Vec<Warning>,
}

/// Something that can extract embedded pictures
pub trait ArtworkExtractor: Send + Sync {
	fn extract_artwork(
		&self,
		reader: BoundedReader<'_>,
		path: &Path,
	) -> Result<ExtractedArtwork, DecodeError>;
}

/// Something that can write metadata back into a file
pub trait Writer: Send + Sync {
	/// Write `record`'s metadata into a new file at `target`.
	fn write(&self, target: &Path, record: &MetadataRecord) -> Result<(), WriteError>;
}

/// A map from formats to the decoders (and writers) that own them.
///
/// Build one of these once, before decoding anything.
/// It is read-only afterwards.
#[derive(Default, Clone)]
pub struct Registry {
	decoders: HashMap<Format, Arc<dyn Decoder>>,
	writers: HashMap<Format, Arc<dyn Writer>>,
}

impl Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry")
			.field("decoders", &self.decoders.keys().collect::<Vec<_>>())
			.field("writers", &self.writers.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Registry {
	/// Make an empty registry
	pub fn new() -> Self {
		Self::default()
	}

	/// Make a registry with every decoder in this crate
	pub fn with_default_decoders() -> Self {
		let mut r = Self::new();
		crate::mp3::register(&mut r);
		crate::flac::register(&mut r);
		crate::ogg::register(&mut r);
		crate::mp4::register(&mut r);
		return r;
	}

	/// Use `decoder` for `format`, replacing any previous decoder.
	pub fn register(&mut self, format: Format, decoder: Arc<dyn Decoder>) {
		debug!(
			message = "Registered decoder",
			%format,
			decoder = decoder.name()
		);
		self.decoders.insert(format, decoder);
	}

	/// Get the decoder for `format`, if there is one
	pub fn get(&self, format: Format) -> Option<Arc<dyn Decoder>> {
		self.decoders.get(&format).cloned()
	}

	/// Use `writer` for `format`, replacing any previous writer.
	pub fn register_writer(&mut self, format: Format, writer: Arc<dyn Writer>) {
		debug!(message = "Registered writer", %format);
		self.writers.insert(format, writer);
	}

	/// Get the writer for `format`, if there is one
	pub fn get_writer(&self, format: Format) -> Option<Arc<dyn Writer>> {
		self.writers.get(&format).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::AudioInfo;

	struct NullDecoder;

	impl Decoder for NullDecoder {
		fn name(&self) -> &'static str {
			"null"
		}

		fn parse(&self, _reader: BoundedReader<'_>, _path: &Path) -> Result<Metadata, DecodeError> {
			Ok(Metadata::new(Format::Wav, AudioInfo::new("pcm", "wav")))
		}
	}

	#[test]
	fn lookups() {
		let mut r = Registry::new();
		assert!(r.get(Format::Wav).is_none());

		r.register(Format::Wav, Arc::new(NullDecoder));
		let d = r.get(Format::Wav).unwrap();
		assert_eq!(d.name(), "null");
		assert!(d.artwork().is_none());
		assert!(r.get(Format::Aiff).is_none());
	}

	#[test]
	fn defaults() {
		let r = Registry::with_default_decoders();
		for f in [
			Format::Mp3,
			Format::Flac,
			Format::OggVorbis,
			Format::Opus,
			Format::M4a,
			Format::M4b,
		] {
			let d = r.get(f).unwrap();
			assert!(d.artwork().is_some(), "{f} should extract artwork");
		}

		assert!(r.get(Format::Wav).is_none());
		assert!(r.get_writer(Format::Mp3).is_none());
	}
}
