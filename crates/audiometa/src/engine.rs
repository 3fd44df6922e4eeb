use std::{fs::File, path::Path};
use tracing::{debug, trace};

use crate::{
	config::OpenOptions,
	errors::{DecodeError, OpenError, WriteError},
	format::detect,
	reader::{BoundedReader, ByteSource},
	record::MetadataRecord,
	registry::Registry,
};

/// Opens files and hands them to the right decoder
#[derive(Debug, Clone)]
pub struct Engine {
	registry: Registry,
	options: OpenOptions,
}

impl Default for Engine {
	fn default() -> Self {
		Self::new(Registry::with_default_decoders(), OpenOptions::default())
	}
}

impl Engine {
	pub fn new(registry: Registry, options: OpenOptions) -> Self {
		Self { registry, options }
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn options(&self) -> &OpenOptions {
		&self.options
	}

	/// Open and decode the file at `path`
	pub fn open(&self, path: impl AsRef<Path>) -> Result<MetadataRecord, OpenError> {
		let path = path.as_ref();

		let (source, size): (Box<dyn ByteSource>, u64) = if self.options.preload {
			let data = std::fs::read(path)?;
			let size = data.len() as u64;
			(Box::new(data), size)
		} else {
			let file = File::open(path)?;
			let size = file.metadata()?.len();
			(Box::new(file), size)
		};

		trace!(
			message = "Opened file",
			?path,
			size,
			preload = self.options.preload
		);

		return self.open_source(source, size, path);
	}

	/// Decode a file we already have a source for.
	/// `path` is used for format hints and error messages.
	pub fn open_source(
		&self,
		source: Box<dyn ByteSource>,
		size: u64,
		path: impl AsRef<Path>,
	) -> Result<MetadataRecord, OpenError> {
		let path = path.as_ref();
		let decode_err = |source: DecodeError| OpenError::Decode {
			path: path.to_path_buf(),
			source,
		};

		let reader = BoundedReader::new(&*source, size);
		let format = detect(reader, path).map_err(decode_err)?;

		let decoder = self
			.registry
			.get(format)
			.ok_or(OpenError::Unsupported(format))?;

		debug!(
			message = "Decoding file",
			?path,
			%format,
			decoder = decoder.name()
		);

		let metadata = decoder.parse(reader, path).map_err(decode_err)?;

		if self.options.strict {
			if let Some(w) = metadata.warnings.first() {
				return Err(decode_err(DecodeError::Strict(w.clone())));
			}
		}

		debug!(
			message = "Decoded file",
			?path,
			warnings = metadata.warnings.len(),
			chapters = metadata.chapters.len(),
			tags = metadata.tags.raw.len()
		);

		return Ok(MetadataRecord::new(
			path.to_path_buf(),
			size,
			metadata,
			source,
			decoder,
		));
	}

	/// Write `record`'s metadata into `target`.
	pub fn save(&self, record: &MetadataRecord, target: impl AsRef<Path>) -> Result<(), WriteError> {
		let format = record.format();
		match self.registry.get_writer(format) {
			Some(writer) => writer.write(target.as_ref(), record),
			None => Err(WriteError::NoWriter(format)),
		}
	}
}
