//! Ogg pages, and the packets they carry

use thiserror::Error;
use tracing::trace;

use crate::reader::{BoundedReader, ReadError};

pub const OGG_MAGIC: &[u8; 4] = b"OggS";

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum PageError {
	#[error("could not read ogg page")]
	Read(#[from] ReadError),

	#[error("missing ogg page signature at offset {0}")]
	BadMagic(u64),

	#[error("unsupported ogg version {version} at offset {offset}")]
	BadVersion { offset: u64, version: u8 },
}

/// An Ogg page header.
/// Payloads are read separately, see [`OggPage::payload`].
#[derive(Debug, Clone)]
pub struct OggPage {
	/// The position of this page's header
	pub offset: u64,

	pub header_type: u8,

	/// For vorbis and opus, the number of samples
	/// decoded at the end of this page.
	/// `u64::MAX` if no packet ends on this page.
	pub granule: u64,

	pub serial: u32,
	pub sequence: u32,

	/// Lacing values. A value under 255 ends a packet.
	pub segments: Vec<u8>,
}

impl OggPage {
	pub const HEADER_LENGTH: u64 = 27;

	pub const FLAG_CONTINUATION: u8 = 0x01;
	pub const FLAG_BOS: u8 = 0x02;
	pub const FLAG_EOS: u8 = 0x04;

	/// Read the page header at `offset`
	pub fn read(reader: BoundedReader<'_>, offset: u64) -> Result<Self, PageError> {
		let h = reader.read_array::<27>(offset, "ogg page header")?;

		if &h[0..4] != OGG_MAGIC {
			return Err(PageError::BadMagic(offset));
		}

		if h[4] != 0 {
			return Err(PageError::BadVersion {
				offset,
				version: h[4],
			});
		}

		let n_segments = h[26];
		let segments = reader.read(
			offset + Self::HEADER_LENGTH,
			n_segments.into(),
			"ogg segment table",
		)?;

		let page = Self {
			offset,
			header_type: h[5],
			granule: u64::from_le_bytes([h[6], h[7], h[8], h[9], h[10], h[11], h[12], h[13]]),
			serial: u32::from_le_bytes([h[14], h[15], h[16], h[17]]),
			sequence: u32::from_le_bytes([h[18], h[19], h[20], h[21]]),
			segments,
		};

		trace!(
			message = "Read ogg page",
			offset,
			serial = page.serial,
			sequence = page.sequence,
			granule = page.granule
		);

		return Ok(page);
	}

	pub fn is_continuation(&self) -> bool {
		self.header_type & Self::FLAG_CONTINUATION != 0
	}

	pub fn payload_offset(&self) -> u64 {
		self.offset + Self::HEADER_LENGTH + self.segments.len() as u64
	}

	pub fn payload_len(&self) -> u64 {
		self.segments.iter().map(|x| u64::from(*x)).sum()
	}

	/// The offset of the next page
	pub fn end(&self) -> u64 {
		self.payload_offset() + self.payload_len()
	}

	pub fn payload(&self, reader: BoundedReader<'_>) -> Result<Vec<u8>, PageError> {
		Ok(reader.read(self.payload_offset(), self.payload_len(), "ogg page payload")?)
	}
}

/// Reassembles packets from the pages of one logical stream
#[derive(Debug, Default)]
pub struct PacketAssembler {
	packets: Vec<Vec<u8>>,

	/// A packet that continues on the next page
	partial: Option<Vec<u8>>,

	/// Bytes we threw away because they didn't belong to a packet
	dropped: u64,
}

impl PacketAssembler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a page's payload
	pub fn push(&mut self, page: &OggPage, payload: &[u8]) {
		// A page with no segments carries no data,
		// and a packet in progress continues on the next page.
		if page.segments.is_empty() {
			return;
		}

		let mut current = match (page.is_continuation(), self.partial.take()) {
			(true, Some(p)) => Some(p),

			// Continuation of a packet we never saw the start of.
			// Drop bytes until that packet ends.
			(true, None) => None,

			(false, Some(p)) => {
				self.dropped += p.len() as u64;
				Some(Vec::new())
			}

			(false, None) => Some(Vec::new()),
		};

		let mut pos = 0usize;
		for lace in &page.segments {
			let lace = usize::from(*lace);
			let end = (pos + lace).min(payload.len());
			let seg = &payload[pos..end];
			pos = end;

			match &mut current {
				Some(c) => c.extend_from_slice(seg),
				None => self.dropped += seg.len() as u64,
			}

			if lace < 255 {
				if let Some(c) = current.take() {
					self.packets.push(c);
				}
				current = Some(Vec::new());
			}
		}

		// A packet that doesn't end on this page
		if let Some(c) = current {
			if page.segments.last().is_some_and(|x| *x == 255) {
				self.partial = Some(c);
			}
		}
	}

	/// Complete packets, in stream order
	pub fn packets(&self) -> &[Vec<u8>] {
		&self.packets
	}

	pub fn into_packets(self) -> Vec<Vec<u8>> {
		self.packets
	}

	/// Is a packet waiting for the next page?
	pub fn has_partial(&self) -> bool {
		self.partial.is_some()
	}

	pub fn dropped(&self) -> u64 {
		self.dropped
	}
}

/// Find the granule position of the last page of `serial`,
/// searching at most `window` bytes from the end of the file.
pub fn last_granule(reader: BoundedReader<'_>, serial: u32, window: u64) -> Option<u64> {
	let len = reader.size().min(window);
	let start = reader.size() - len;
	let tail = reader.read(start, len, "ogg tail").ok()?;

	let mut end = tail.len();
	while let Some(i) = tail[..end].windows(4).rposition(|w| w == OGG_MAGIC) {
		end = i;
		let Ok(page) = OggPage::read(reader, start + i as u64) else {
			continue;
		};

		if page.serial == serial && page.granule != u64::MAX {
			return Some(page.granule);
		}
	}

	return None;
}
