//! Bounds-checked random access over a byte source.
//!
//! Every read is checked against the source's declared size *before*
//! the source is touched. Reading past the end produces
//! [`ReadError::OutOfBounds`], never garbage and never a panic.

use std::fs::File;
use thiserror::Error;

mod chain;
mod cursor;

pub use chain::ChainedReader;
pub use cursor::ReadCursor;

/// Something we can read bytes from at arbitrary offsets.
///
/// Implementors are not assumed to be buffered in memory.
pub trait ByteSource: Send + Sync {
	/// Fill `buf` with the bytes starting at `offset`.
	fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()>;
}

impl ByteSource for [u8] {
	fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
		read_from_slice(self, offset, buf)
	}
}

impl ByteSource for Vec<u8> {
	fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
		read_from_slice(self, offset, buf)
	}
}

impl ByteSource for Box<[u8]> {
	fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
		read_from_slice(self, offset, buf)
	}
}

impl ByteSource for File {
	#[cfg(unix)]
	fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
		std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
	}

	#[cfg(windows)]
	fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
		use std::os::windows::fs::FileExt;

		let mut done = 0;
		while done < buf.len() {
			let n = self.seek_read(&mut buf[done..], offset + done as u64)?;
			if n == 0 {
				return Err(std::io::ErrorKind::UnexpectedEof.into());
			}
			done += n;
		}
		return Ok(());
	}
}

fn read_from_slice(data: &[u8], offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
	let start = usize::try_from(offset).map_err(|_| std::io::ErrorKind::UnexpectedEof)?;
	let end = start
		.checked_add(buf.len())
		.ok_or(std::io::ErrorKind::UnexpectedEof)?;

	match data.get(start..end) {
		Some(x) => {
			buf.copy_from_slice(x);
			Ok(())
		}
		None => Err(std::io::ErrorKind::UnexpectedEof.into()),
	}
}

/// An error we encountered while reading from a [`BoundedReader`]
#[derive(Debug, Error)]
pub enum ReadError {
	/// We tried to read past the end of the source.
	/// The underlying source was not touched.
	#[error("cannot read {length} bytes at offset {offset} from {size} byte source ({label})")]
	OutOfBounds {
		offset: u64,
		length: u64,
		size: u64,
		label: &'static str,
	},

	/// The underlying source failed
	#[error("i/o error while reading {label}")]
	Io {
		label: &'static str,
		#[source]
		source: std::io::Error,
	},
}

impl ReadError {
	/// The offset this error happened at
	pub fn offset(&self) -> Option<u64> {
		match self {
			Self::OutOfBounds { offset, .. } => Some(*offset),
			Self::Io { .. } => None,
		}
	}
}

#[derive(Clone, Copy)]
enum Source<'a> {
	Slice(&'a [u8]),
	Dyn(&'a dyn ByteSource),
}

/// A byte source and its total length.
#[derive(Clone, Copy)]
pub struct BoundedReader<'a> {
	source: Source<'a>,
	size: u64,
}

impl<'a> BoundedReader<'a> {
	/// Wrap `source`, which has exactly `size` readable bytes.
	pub fn new(source: &'a dyn ByteSource, size: u64) -> Self {
		Self {
			source: Source::Dyn(source),
			size,
		}
	}

	/// Wrap an in-memory buffer
	pub fn from_slice(data: &'a [u8]) -> Self {
		Self {
			source: Source::Slice(data),
			size: data.len() as u64,
		}
	}

	/// The total number of bytes in this source
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Make sure `length` bytes at `offset` are inside this source.
	pub fn check(&self, offset: u64, length: u64, label: &'static str) -> Result<(), ReadError> {
		match offset.checked_add(length) {
			Some(end) if end <= self.size => Ok(()),
			_ => Err(ReadError::OutOfBounds {
				offset,
				length,
				size: self.size,
				label,
			}),
		}
	}

	/// Fill `buf` with bytes starting at `offset`
	pub fn read_into(
		&self,
		offset: u64,
		buf: &mut [u8],
		label: &'static str,
	) -> Result<(), ReadError> {
		self.check(offset, buf.len() as u64, label)?;

		match self.source {
			Source::Slice(data) => read_from_slice(data, offset, buf),
			Source::Dyn(source) => source.read_exact_at(offset, buf),
		}
		.map_err(|source| ReadError::Io { label, source })
	}

	/// Read `length` bytes starting at `offset`
	pub fn read(&self, offset: u64, length: u64, label: &'static str) -> Result<Vec<u8>, ReadError> {
		self.check(offset, length, label)?;

		// `check` guarantees that `length` fits inside the source,
		// but the source may still be larger than our address space.
		let len = usize::try_from(length).map_err(|_| ReadError::OutOfBounds {
			offset,
			length,
			size: self.size,
			label,
		})?;

		let mut buf = vec![0u8; len];
		self.read_into(offset, &mut buf, label)?;
		return Ok(buf);
	}

	/// Read exactly `N` bytes starting at `offset`
	pub fn read_array<const N: usize>(
		&self,
		offset: u64,
		label: &'static str,
	) -> Result<[u8; N], ReadError> {
		let mut buf = [0u8; N];
		self.read_into(offset, &mut buf, label)?;
		return Ok(buf);
	}

	pub fn read_u8(&self, offset: u64, label: &'static str) -> Result<u8, ReadError> {
		Ok(self.read_array::<1>(offset, label)?[0])
	}

	pub fn read_u16_be(&self, offset: u64, label: &'static str) -> Result<u16, ReadError> {
		Ok(u16::from_be_bytes(self.read_array(offset, label)?))
	}

	pub fn read_u16_le(&self, offset: u64, label: &'static str) -> Result<u16, ReadError> {
		Ok(u16::from_le_bytes(self.read_array(offset, label)?))
	}

	pub fn read_u32_be(&self, offset: u64, label: &'static str) -> Result<u32, ReadError> {
		Ok(u32::from_be_bytes(self.read_array(offset, label)?))
	}

	pub fn read_u32_le(&self, offset: u64, label: &'static str) -> Result<u32, ReadError> {
		Ok(u32::from_le_bytes(self.read_array(offset, label)?))
	}

	pub fn read_u64_be(&self, offset: u64, label: &'static str) -> Result<u64, ReadError> {
		Ok(u64::from_be_bytes(self.read_array(offset, label)?))
	}

	pub fn read_u64_le(&self, offset: u64, label: &'static str) -> Result<u64, ReadError> {
		Ok(u64::from_le_bytes(self.read_array(offset, label)?))
	}

	/// Start a sequential cursor at `offset`
	pub fn cursor(&self, offset: u64) -> ReadCursor<'a> {
		ReadCursor::new(*self, offset)
	}

	/// Start an error-accumulating reader at `offset`
	pub fn chain(&self, offset: u64) -> ChainedReader<'a> {
		ChainedReader::new(self.cursor(offset))
	}
}
