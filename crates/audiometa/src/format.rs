//! Container format detection

use audiometa_util::MimeType;
use serde::Serialize;
use std::{fmt::Display, path::Path};
use tracing::{debug, trace};

use crate::{errors::DecodeError, reader::BoundedReader};

/// A container format we know how to recognize.
///
/// Recognizing a format doesn't mean we can decode it:
/// see [`crate::Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
	/// MPEG layer III, usually with an ID3v2 tag
	Mp3,
	Flac,
	/// Vorbis in an Ogg container
	OggVorbis,
	/// Opus in an Ogg container
	Opus,
	M4a,
	/// An MP4 audiobook
	M4b,
	Wav,
	Aiff,
}

impl Display for Format {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Mp3 => write!(f, "mp3"),
			Self::Flac => write!(f, "flac"),
			Self::OggVorbis => write!(f, "ogg"),
			Self::Opus => write!(f, "opus"),
			Self::M4a => write!(f, "m4a"),
			Self::M4b => write!(f, "m4b"),
			Self::Wav => write!(f, "wav"),
			Self::Aiff => write!(f, "aiff"),
		}
	}
}

impl Format {
	/// The media type of files in this format
	pub fn mime_type(&self) -> MimeType {
		match self {
			Self::Mp3 => MimeType::Mp3,
			Self::Flac => MimeType::Flac,
			Self::OggVorbis => MimeType::Ogg,
			Self::Opus => MimeType::Opus,
			Self::M4a | Self::M4b => MimeType::Mp4Audio,
			Self::Wav => MimeType::Wav,
			Self::Aiff => MimeType::Aiff,
		}
	}
}

/// How many bytes of a file's head we look at
const HEAD_LEN: u64 = 64;

/// How far we search for an MPEG frame sync in files
/// that have an `.mp3` extension but no recognizable header
const MP3_SYNC_SEARCH: u64 = 4096;

/// Is this the start of an MPEG layer III frame?
pub(crate) fn is_mp3_sync(a: u8, b: u8) -> bool {
	// 11 sync bits, a valid version (not 0b01), layer III (0b01)
	a == 0xFF && (b & 0xE0) == 0xE0 && (b & 0x18) != 0x08 && (b & 0x06) == 0x02
}

/// Classify a file by its magic bytes.
///
/// `path` is only consulted as a last resort for raw MPEG streams
/// that don't start with a frame.
pub fn detect(reader: BoundedReader<'_>, path: &Path) -> Result<Format, DecodeError> {
	let size = reader.size();
	if size < 4 {
		return Err(DecodeError::UnsupportedFormat(format!(
			"file is too short to identify ({size} bytes)"
		)));
	}

	let head = reader.read(0, size.min(HEAD_LEN), "magic")?;
	trace!(message = "Identifying format", ?path, head_len = head.len());

	let format = if head.starts_with(b"fLaC") {
		Some(Format::Flac)
	} else if head.starts_with(b"ID3") || is_mp3_sync(head[0], head[1]) {
		Some(Format::Mp3)
	} else if head.starts_with(b"OggS") {
		Some(detect_ogg(reader)?)
	} else if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WAVE" {
		Some(Format::Wav)
	} else if head.len() >= 12
		&& &head[0..4] == b"FORM"
		&& (&head[8..12] == b"AIFF" || &head[8..12] == b"AIFC")
	{
		Some(Format::Aiff)
	} else if head.len() >= 12 && &head[4..8] == b"ftyp" {
		Some(detect_mp4(reader)?)
	} else {
		None
	};

	let format = match format {
		Some(x) => x,
		None => {
			if has_mp3_extension(path) && find_mp3_sync(reader)? {
				Format::Mp3
			} else {
				return Err(DecodeError::UnsupportedFormat(
					"no known signature at start of file".into(),
				));
			}
		}
	};

	debug!(message = "Detected format", ?path, %format);
	return Ok(format);
}

fn has_mp3_extension(path: &Path) -> bool {
	path.extension()
		.and_then(|x| x.to_str())
		.is_some_and(|x| x.eq_ignore_ascii_case("mp3"))
}

fn find_mp3_sync(reader: BoundedReader<'_>) -> Result<bool, DecodeError> {
	let len = reader.size().min(MP3_SYNC_SEARCH);
	let buf = reader.read(0, len, "mp3 sync search")?;
	return Ok(buf.windows(2).any(|w| is_mp3_sync(w[0], w[1])));
}

/// Look inside the first Ogg page to find the codec
fn detect_ogg(reader: BoundedReader<'_>) -> Result<Format, DecodeError> {
	if reader.size() < 27 {
		return Err(DecodeError::UnsupportedFormat(format!(
			"ogg stream is too short for a page header ({} bytes)",
			reader.size()
		)));
	}

	let n_segments = reader.read_u8(26, "ogg segment count")?;
	let payload = 27 + u64::from(n_segments);
	let avail = reader.size().saturating_sub(payload).min(8);
	let magic = reader.read(payload, avail, "ogg codec magic")?;

	if magic.starts_with(b"OpusHead") {
		return Ok(Format::Opus);
	}

	if magic.len() >= 7 && magic[0] == 0x01 && &magic[1..7] == b"vorbis" {
		return Ok(Format::OggVorbis);
	}

	return Err(DecodeError::UnsupportedFormat(
		"ogg stream with an unknown codec".into(),
	));
}

/// Read the `ftyp` brands to tell audiobooks apart from music
pub(crate) fn detect_mp4(reader: BoundedReader<'_>) -> Result<Format, DecodeError> {
	let ftyp_size = u64::from(reader.read_u32_be(0, "ftyp size")?);
	let major = reader.read_array::<4>(8, "ftyp major brand")?;
	if &major == b"M4B " {
		return Ok(Format::M4b);
	}

	// Compatible brands follow the minor version
	let end = ftyp_size.min(reader.size());
	let mut offset = 16;
	while offset + 4 <= end {
		let brand = reader.read_array::<4>(offset, "ftyp compatible brand")?;
		if &brand == b"M4B " {
			return Ok(Format::M4b);
		}
		offset += 4;
	}

	return Ok(Format::M4a);
}

#[cfg(test)]
mod tests {
	use super::*;
	use paste::paste;

	fn detect_bytes(data: &[u8]) -> Result<Format, DecodeError> {
		detect(BoundedReader::from_slice(data), Path::new("test.bin"))
	}

	fn ogg_page(payload: &[u8]) -> Vec<u8> {
		let mut out = b"OggS".to_vec();
		out.push(0); // version
		out.push(0x02); // bos
		out.extend(0u64.to_le_bytes()); // granule
		out.extend(1u32.to_le_bytes()); // serial
		out.extend(0u32.to_le_bytes()); // sequence
		out.extend(0u32.to_le_bytes()); // crc
		out.push(1);
		out.push(payload.len() as u8);
		out.extend(payload);
		out
	}

	fn ftyp(major: &[u8; 4], compat: &[&[u8; 4]]) -> Vec<u8> {
		let size = 16 + 4 * compat.len() as u32;
		let mut out = size.to_be_bytes().to_vec();
		out.extend(b"ftyp");
		out.extend(major);
		out.extend(0u32.to_be_bytes());
		for c in compat {
			out.extend(*c);
		}
		out
	}

	macro_rules! detect_test {
		($name:ident, $data:expr, $expected:expr) => {
			paste! {
				#[test]
				fn [<detect_ $name>]() {
					assert_eq!(detect_bytes(&$data).unwrap(), $expected);
				}
			}
		};
	}

	detect_test!(flac, *b"fLaC\0\0\0\x22", Format::Flac);
	detect_test!(id3, *b"ID3\x03\0\0\0\0\0\0", Format::Mp3);
	detect_test!(mpeg_sync, [0xFF, 0xFB, 0x90, 0x00], Format::Mp3);
	detect_test!(wav, *b"RIFF\0\0\0\0WAVEfmt ", Format::Wav);
	detect_test!(aiff, *b"FORM\0\0\0\0AIFFCOMM", Format::Aiff);
	detect_test!(opus, ogg_page(b"OpusHead\x01\x02"), Format::Opus);
	detect_test!(vorbis, ogg_page(b"\x01vorbis\0\0\0\0"), Format::OggVorbis);
	detect_test!(m4a, ftyp(b"M4A ", &[b"M4A ", b"mp42"]), Format::M4a);
	detect_test!(m4b_major, ftyp(b"M4B ", &[]), Format::M4b);
	detect_test!(m4b_compatible, ftyp(b"mp42", &[b"isom", b"M4B "]), Format::M4b);

	#[test]
	fn rejects_unknown() {
		assert!(matches!(
			detect_bytes(b"abc"),
			Err(DecodeError::UnsupportedFormat(_))
		));
		assert!(matches!(
			detect_bytes(b"nothing to see here"),
			Err(DecodeError::UnsupportedFormat(_))
		));
		assert!(matches!(
			detect_bytes(&ogg_page(b"\x7fFLAC\x01\x00")),
			Err(DecodeError::UnsupportedFormat(_))
		));
	}

	#[test]
	fn truncated_ogg() {
		let data = ogg_page(b"OpusHead");
		for len in [4, 10, 26] {
			assert!(matches!(
				detect_bytes(&data[..len]),
				Err(DecodeError::UnsupportedFormat(_))
			));
		}
	}

	#[test]
	fn mp3_extension_fallback() {
		let mut data = vec![0u8; 100];
		data.extend([0xFF, 0xFB, 0x90, 0x00]);
		let r = BoundedReader::from_slice(&data);
		assert_eq!(detect(r, Path::new("x.MP3")).unwrap(), Format::Mp3);
		assert!(detect(r, Path::new("x.wav")).is_err());
	}

	#[test]
	fn mime_types() {
		assert_eq!(Format::M4b.mime_type(), MimeType::Mp4Audio);
		assert_eq!(Format::Opus.mime_type().to_string(), "audio/opus");
		assert_eq!(Format::Wav.mime_type().extension(), ".wav");
	}
}
