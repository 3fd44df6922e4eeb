//! The ID3v2 tag header

use crate::{errors::DecodeError, reader::BoundedReader};

/// Decode a synchsafe integer.
/// Each byte holds 7 bits; the top bit of every byte must be clear.
/// Returns `None` if a top bit is set.
pub fn decode_synchsafe(bytes: [u8; 4]) -> Option<u32> {
	if bytes.iter().any(|b| b & 0x80 != 0) {
		return None;
	}

	return Some(
		(u32::from(bytes[0]) << 21)
			| (u32::from(bytes[1]) << 14)
			| (u32::from(bytes[2]) << 7)
			| u32::from(bytes[3]),
	);
}

/// Encode a 28-bit integer as a synchsafe integer.
/// Returns `None` if `x` doesn't fit in 28 bits.
pub fn encode_synchsafe(x: u32) -> Option<[u8; 4]> {
	if x > 0x0FFF_FFFF {
		return None;
	}

	return Some([
		((x >> 21) & 0x7F) as u8,
		((x >> 14) & 0x7F) as u8,
		((x >> 7) & 0x7F) as u8,
		(x & 0x7F) as u8,
	]);
}

/// Undo ID3 unsynchronisation: every `FF 00` becomes `FF`.
pub fn remove_unsync(data: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(data.len());
	let mut last_ff = false;
	for b in data {
		if last_ff && *b == 0x00 {
			last_ff = false;
			continue;
		}
		out.push(*b);
		last_ff = *b == 0xFF;
	}
	return out;
}

/// A decoded ID3v2 tag header
#[derive(Debug, Clone, Copy)]
pub struct Id3Header {
	/// 3 or 4
	pub major_version: u8,
	pub revision: u8,

	pub unsync: bool,
	pub extended_header: bool,
	pub experimental: bool,
	pub footer: bool,

	/// The size of the tag after the header,
	/// not including the footer.
	pub size: u32,
}

impl Id3Header {
	pub const LENGTH: u64 = 10;

	/// Read the tag header at the start of a file
	pub fn read(reader: BoundedReader<'_>) -> Result<Self, DecodeError> {
		let h = reader.read_array::<10>(0, "id3 header")?;

		if &h[0..3] != b"ID3" {
			return Err(DecodeError::UnsupportedFormat("missing ID3 header".into()));
		}

		let major_version = h[3];
		if major_version != 3 && major_version != 4 {
			return Err(DecodeError::UnsupportedFormat(format!(
				"ID3v2.{major_version} is not supported"
			)));
		}

		let flags = h[5];
		let size = decode_synchsafe([h[6], h[7], h[8], h[9]])
			.ok_or_else(|| DecodeError::malformed(6, "ID3 tag size is not synchsafe"))?;

		Ok(Self {
			major_version,
			revision: h[4],
			unsync: flags & 0b1000_0000 != 0,
			extended_header: flags & 0b0100_0000 != 0,
			experimental: flags & 0b0010_0000 != 0,
			footer: major_version == 4 && flags & 0b0001_0000 != 0,
			size,
		})
	}

	/// The total number of bytes this tag occupies,
	/// including the header and footer
	pub fn total_size(&self) -> u64 {
		let footer = if self.footer { 10 } else { 0 };
		Self::LENGTH + u64::from(self.size) + footer
	}

	/// The offset just past the last frame byte
	pub fn frames_end(&self) -> u64 {
		Self::LENGTH + u64::from(self.size)
	}
}

/// Read the size of an extended header that starts at `offset`
/// in `reader`. Returns the number of bytes to skip.
pub fn extended_header_len(
	reader: BoundedReader<'_>,
	offset: u64,
	major_version: u8,
) -> Result<u64, DecodeError> {
	let raw = reader.read_array::<4>(offset, "extended header size")?;

	if major_version == 4 {
		// Synchsafe, and includes the size field itself
		let size = decode_synchsafe(raw).ok_or_else(|| {
			DecodeError::malformed(offset, "extended header size is not synchsafe")
		})?;
		if size < 6 {
			return Err(DecodeError::malformed(
				offset,
				format!("extended header is too small ({size} bytes)"),
			));
		}
		return Ok(size.into());
	} else {
		// Plain, and excludes the size field
		return Ok(4 + u64::from(u32::from_be_bytes(raw)));
	}
}
