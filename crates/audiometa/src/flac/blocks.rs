//! FLAC metablock headers, and a walker over the metablock chain.

use tracing::trace;

use super::errors::FlacBlockError;
use crate::reader::BoundedReader;

/// A type of flac metadata block
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FlacMetablockType {
	Streaminfo,
	Padding,
	Application,
	Seektable,
	VorbisComment,
	Cuesheet,
	Picture,

	/// A block type reserved for future use.
	/// We skip these.
	Reserved(u8),
}

impl FlacMetablockType {
	/// Decode a block type from the low seven bits of `id`.
	pub(crate) fn from_id(id: u8) -> Result<Self, FlacBlockError> {
		return Ok(match id & 0b0111_1111 {
			0 => FlacMetablockType::Streaminfo,
			1 => FlacMetablockType::Padding,
			2 => FlacMetablockType::Application,
			3 => FlacMetablockType::Seektable,
			4 => FlacMetablockType::VorbisComment,
			5 => FlacMetablockType::Cuesheet,
			6 => FlacMetablockType::Picture,
			127 => return Err(FlacBlockError::BadMetablockType(127)),
			x => FlacMetablockType::Reserved(x),
		});
	}
}

/// The header of a flac metadata block
#[derive(Debug, Clone, Copy)]
pub struct FlacMetablockHeader {
	/// The type of block this is
	pub block_type: FlacMetablockType,

	/// The length of this block, in bytes
	/// (not including this header)
	pub length: u32,

	/// If true, this is the last metadata block
	pub is_last: bool,
}

impl FlacMetablockHeader {
	/// Try to decode the given bytes as a flac metablock header
	pub fn decode(header: [u8; 4]) -> Result<Self, FlacBlockError> {
		return Ok(Self {
			block_type: FlacMetablockType::from_id(header[0])?,
			length: u32::from_be_bytes([0, header[1], header[2], header[3]]),
			is_last: header[0] & 0b1000_0000 == 0b1000_0000,
		});
	}
}

/// A metadata block we found while walking a file
#[derive(Debug, Clone, Copy)]
pub struct FlacBlockRef {
	pub header: FlacMetablockHeader,

	/// The offset of this block's header
	pub offset: u64,
}

impl FlacBlockRef {
	/// The offset of this block's data
	pub fn data_offset(&self) -> u64 {
		self.offset + 4
	}

	/// Read this block's data
	pub fn read(&self, reader: BoundedReader<'_>) -> Result<Vec<u8>, FlacBlockError> {
		Ok(reader.read(
			self.data_offset(),
			self.header.length.into(),
			"flac block data",
		)?)
	}
}

/// Walks the metablock chain of a flac file.
///
/// Every step moves by the declared block length,
/// so a damaged block never desynchronizes the walk.
/// The walk ends after the last block or on the first error.
pub struct FlacBlockWalker<'a> {
	reader: BoundedReader<'a>,
	offset: u64,
	done: bool,
}

impl<'a> FlacBlockWalker<'a> {
	/// Start walking at the first block, just after the magic bytes
	pub fn new(reader: BoundedReader<'a>) -> Self {
		Self {
			reader,
			offset: 4,
			done: false,
		}
	}

	/// The offset just past the last block we returned.
	/// Once the walk is done, this is where the audio frames start.
	pub fn offset(&self) -> u64 {
		self.offset
	}
}

impl Iterator for FlacBlockWalker<'_> {
	type Item = Result<FlacBlockRef, FlacBlockError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}

		let offset = self.offset;
		let header = match self
			.reader
			.read_array::<4>(offset, "flac block header")
			.map_err(FlacBlockError::from)
			.and_then(FlacMetablockHeader::decode)
		{
			Ok(x) => x,
			Err(e) => {
				self.done = true;
				return Some(Err(e));
			}
		};

		let end = offset + 4 + u64::from(header.length);
		if end > self.reader.size() {
			self.done = true;
			return Some(Err(FlacBlockError::PastEnd {
				offset,
				length: header.length,
				size: self.reader.size(),
			}));
		}

		trace!(
			message = "Found flac block",
			offset,
			block_type = ?header.block_type,
			length = header.length,
			is_last = header.is_last
		);

		self.offset = end;
		self.done = header.is_last;
		return Some(Ok(FlacBlockRef { header, offset }));
	}
}
