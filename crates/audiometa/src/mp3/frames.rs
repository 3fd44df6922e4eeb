//! ID3v2 frames, and a walker over the frames of a tag

use smartstring::{LazyCompact, SmartString};
use thiserror::Error;
use tracing::trace;

use super::header::{decode_synchsafe, remove_unsync};
use crate::reader::{BoundedReader, ReadError};

/// A problem with one frame.
/// These become warnings; they never fail a decode.
#[derive(Debug, Error)]
pub enum Id3FrameError {
	#[error("could not read frame")]
	Read(#[from] ReadError),

	#[error("invalid frame id {0:?}")]
	BadFrameId([u8; 4]),

	#[error("frame {id} claims {size} bytes, but only {available} remain in the tag")]
	PastEnd {
		id: SmartString<LazyCompact>,
		size: u32,
		available: u64,
	},

	#[error("frame {0} is compressed")]
	Compressed(SmartString<LazyCompact>),

	#[error("frame {0} is encrypted")]
	Encrypted(SmartString<LazyCompact>),

	#[error("frame {id} has unknown text encoding {encoding}")]
	BadEncoding {
		id: SmartString<LazyCompact>,
		encoding: u8,
	},

	#[error("frame {id} is malformed: {reason}")]
	Malformed {
		id: SmartString<LazyCompact>,
		reason: &'static str,
	},
}

/// A frame we found while walking a tag
#[derive(Debug, Clone)]
pub struct Id3Frame {
	pub id: SmartString<LazyCompact>,

	/// The offset of this frame's header
	pub offset: u64,

	/// The size of this frame's body, as declared
	pub size: u32,

	pub format_flags: u8,
	major_version: u8,
}

impl Id3Frame {
	pub const HEADER_LENGTH: u64 = 10;

	pub fn body_offset(&self) -> u64 {
		self.offset + Self::HEADER_LENGTH
	}

	/// Read this frame's body, undoing per-frame encodings.
	///
	/// `force_unsync` applies unsynchronisation to every frame,
	/// which ID3v2.4 tags request with the tag-level unsync flag.
	pub fn body(
		&self,
		reader: BoundedReader<'_>,
		force_unsync: bool,
	) -> Result<Vec<u8>, Id3FrameError> {
		let mut data = reader.read(self.body_offset(), self.size.into(), "id3 frame body")?;
		let f = self.format_flags;

		let (grouping, compressed, encrypted, unsync, data_length) = if self.major_version == 4 {
			(
				f & 0b0100_0000 != 0,
				f & 0b0000_1000 != 0,
				f & 0b0000_0100 != 0,
				f & 0b0000_0010 != 0 || force_unsync,
				f & 0b0000_0001 != 0,
			)
		} else {
			(
				f & 0b0010_0000 != 0,
				f & 0b1000_0000 != 0,
				f & 0b0100_0000 != 0,
				false,
				false,
			)
		};

		if compressed {
			return Err(Id3FrameError::Compressed(self.id.clone()));
		}

		if encrypted {
			return Err(Id3FrameError::Encrypted(self.id.clone()));
		}

		let mut skip = 0;
		if grouping {
			skip += 1;
		}
		if data_length {
			skip += 4;
		}

		if skip > data.len() {
			return Err(Id3FrameError::Malformed {
				id: self.id.clone(),
				reason: "frame flags need more bytes than the frame has",
			});
		}
		data.drain(..skip);

		if unsync {
			data = remove_unsync(&data);
		}

		return Ok(data);
	}
}

fn is_frame_id(id: &[u8; 4]) -> bool {
	id.iter().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Walks the frames of a tag.
///
/// The walk ends at the end of the tag, at padding, or at the
/// first frame whose header we can't trust.
pub struct Id3FrameWalker<'a> {
	reader: BoundedReader<'a>,
	offset: u64,
	end: u64,
	major_version: u8,
	done: bool,
}

impl<'a> Id3FrameWalker<'a> {
	/// Walk the frames in `start..end` of `reader`
	pub fn new(reader: BoundedReader<'a>, start: u64, end: u64, major_version: u8) -> Self {
		Self {
			reader,
			offset: start,
			end: end.min(reader.size()),
			major_version,
			done: false,
		}
	}

	/// The position of the next frame header
	pub fn offset(&self) -> u64 {
		self.offset
	}
}

impl Iterator for Id3FrameWalker<'_> {
	type Item = Result<Id3Frame, Id3FrameError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done || self.offset + Id3Frame::HEADER_LENGTH > self.end {
			return None;
		}

		let offset = self.offset;
		let h = match self.reader.read_array::<10>(offset, "id3 frame header") {
			Ok(x) => x,
			Err(e) => {
				self.done = true;
				return Some(Err(e.into()));
			}
		};

		// Padding
		if h[0] == 0 {
			trace!(message = "Found id3 padding", offset);
			self.done = true;
			return None;
		}

		let raw_id = [h[0], h[1], h[2], h[3]];
		if !is_frame_id(&raw_id) {
			self.done = true;
			return Some(Err(Id3FrameError::BadFrameId(raw_id)));
		}
		let id: SmartString<LazyCompact> = String::from_utf8_lossy(&raw_id).as_ref().into();

		let raw_size = [h[4], h[5], h[6], h[7]];
		let size = if self.major_version == 4 {
			// Some writers put plain sizes in v2.4 tags
			decode_synchsafe(raw_size).unwrap_or(u32::from_be_bytes(raw_size))
		} else {
			u32::from_be_bytes(raw_size)
		};

		let available = self.end - offset - Id3Frame::HEADER_LENGTH;
		if u64::from(size) > available {
			self.done = true;
			return Some(Err(Id3FrameError::PastEnd {
				id,
				size,
				available,
			}));
		}

		trace!(message = "Found id3 frame", offset, id = id.as_str(), size);
		self.offset = offset + Id3Frame::HEADER_LENGTH + u64::from(size);
		return Some(Ok(Id3Frame {
			id,
			offset,
			size,
			format_flags: h[9],
			major_version: self.major_version,
		}));
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::mp3::header::encode_synchsafe;

	/// Build a frame with the given id and body
	pub(crate) fn frame(version: u8, id: &[u8; 4], flags: u8, body: &[u8]) -> Vec<u8> {
		let mut out = id.to_vec();
		if version == 4 {
			out.extend(encode_synchsafe(body.len() as u32).unwrap());
		} else {
			out.extend((body.len() as u32).to_be_bytes());
		}
		out.push(0);
		out.push(flags);
		out.extend(body);
		out
	}

	#[test]
	fn walks_until_padding() {
		let mut tag = frame(3, b"TIT2", 0, b"\0Title");
		tag.extend(frame(3, b"TALB", 0, b"\0Album"));
		tag.extend([0u8; 20]);

		let r = BoundedReader::from_slice(&tag);
		let frames = Id3FrameWalker::new(r, 0, tag.len() as u64, 3)
			.map(|f| f.unwrap())
			.collect::<Vec<_>>();

		assert_eq!(frames.len(), 2);
		assert_eq!(frames[0].id.as_str(), "TIT2");
		assert_eq!(frames[1].offset, 16);
		assert_eq!(frames[1].body(r, false).unwrap(), b"\0Album");
	}

	#[test]
	fn stops_on_bad_frames() {
		let mut tag = frame(3, b"TIT2", 0, b"\0Title");
		tag.extend(b"ti\xff2\0\0\0\x01\0\0x");
		let r = BoundedReader::from_slice(&tag);
		let frames = Id3FrameWalker::new(r, 0, tag.len() as u64, 3).collect::<Vec<_>>();
		assert_eq!(frames.len(), 2);
		assert!(matches!(frames[1], Err(Id3FrameError::BadFrameId(_))));

		let mut tag = frame(3, b"TIT2", 0, b"\0Title");
		tag.truncate(tag.len() - 2);
		let r = BoundedReader::from_slice(&tag);
		let frames = Id3FrameWalker::new(r, 0, tag.len() as u64, 3).collect::<Vec<_>>();
		assert!(matches!(frames[..], [Err(Id3FrameError::PastEnd { size: 6, .. })]));
	}

	#[test]
	fn v4_frame_flags() {
		// Data length indicator and unsync
		let mut body = vec![0, 0, 0, 4];
		body.extend([0x00, 0xFF, 0x00, 0xE0, 0x41]);
		let tag = frame(4, b"TIT2", 0b0000_0011, &body);
		let r = BoundedReader::from_slice(&tag);
		let f = Id3FrameWalker::new(r, 0, tag.len() as u64, 4)
			.next()
			.unwrap()
			.unwrap();
		assert_eq!(f.body(r, false).unwrap(), vec![0x00, 0xFF, 0xE0, 0x41]);

		// Compressed frames are skipped
		let tag = frame(4, b"TIT2", 0b0000_1000, b"\0abc");
		let r = BoundedReader::from_slice(&tag);
		let f = Id3FrameWalker::new(r, 0, tag.len() as u64, 4)
			.next()
			.unwrap()
			.unwrap();
		assert!(matches!(f.body(r, false), Err(Id3FrameError::Compressed(_))));
	}
}
