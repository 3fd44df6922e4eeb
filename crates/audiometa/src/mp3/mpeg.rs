//! MPEG audio frame headers, and the VBR headers that may follow them

use std::time::Duration;
use tracing::trace;

use crate::{
	format::is_mp3_sync,
	model::{estimate_bitrate, samples_to_duration},
	reader::{BoundedReader, ReadError},
};

/// How far past the tag we look for the first frame
const SYNC_SEARCH: u64 = 64 * 1024;

const BITRATES_V1: [u32; 16] = [
	0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];

const BITRATES_V2: [u32; 16] = [
	0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
	V1,
	V2,
	V2_5,
}

/// A decoded layer III frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegFrameHeader {
	pub version: MpegVersion,

	/// In bits per second
	pub bitrate: u32,
	pub sample_rate: u32,
	pub channels: u8,
	pub padding: bool,
}

impl MpegFrameHeader {
	/// Decode a frame header. Returns `None` if this isn't a
	/// valid layer III header.
	pub fn decode(h: [u8; 4]) -> Option<Self> {
		if !is_mp3_sync(h[0], h[1]) {
			return None;
		}

		let version = match (h[1] >> 3) & 0b11 {
			0b00 => MpegVersion::V2_5,
			0b10 => MpegVersion::V2,
			0b11 => MpegVersion::V1,
			_ => return None,
		};

		let bitrate_idx = usize::from(h[2] >> 4);
		let rate_idx = usize::from((h[2] >> 2) & 0b11);
		if rate_idx == 3 {
			return None;
		}

		let bitrate = match version {
			MpegVersion::V1 => BITRATES_V1[bitrate_idx],
			_ => BITRATES_V2[bitrate_idx],
		};
		// Free-format and bad bitrates
		if bitrate == 0 {
			return None;
		}

		let sample_rate = match version {
			MpegVersion::V1 => [44100, 48000, 32000][rate_idx],
			MpegVersion::V2 => [22050, 24000, 16000][rate_idx],
			MpegVersion::V2_5 => [11025, 12000, 8000][rate_idx],
		};

		Some(Self {
			version,
			bitrate: bitrate * 1000,
			sample_rate,
			channels: if h[3] >> 6 == 0b11 { 1 } else { 2 },
			padding: h[2] & 0b10 != 0,
		})
	}

	pub fn samples_per_frame(&self) -> u32 {
		match self.version {
			MpegVersion::V1 => 1152,
			_ => 576,
		}
	}

	/// The length of this frame in bytes, including its header
	pub fn frame_len(&self) -> u64 {
		let slots = u64::from(self.samples_per_frame() / 8);
		let padding = if self.padding { 1 } else { 0 };
		slots * u64::from(self.bitrate) / u64::from(self.sample_rate) + padding
	}

	/// Where a Xing or Info header would start, relative to the frame
	fn xing_offset(&self) -> u64 {
		let side_info = match (self.version, self.channels) {
			(MpegVersion::V1, 1) => 17,
			(MpegVersion::V1, _) => 32,
			(_, 1) => 9,
			(_, _) => 17,
		};
		4 + side_info
	}
}

/// The kind of VBR header we found in the first frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbrHeader {
	/// Written by LAME and friends for VBR streams
	Xing,
	/// A Xing header in a CBR stream
	Info,
	/// Written by Fraunhofer encoders
	Vbri,
}

/// The first frame of an MPEG stream, and what we learned from it
#[derive(Debug, Clone, Copy)]
pub struct MpegStream {
	/// The position of the first frame
	pub offset: u64,
	pub header: MpegFrameHeader,

	pub vbr_header: Option<VbrHeader>,
	pub frames: Option<u32>,
	pub bytes: Option<u32>,
}

impl MpegStream {
	/// Find the first frame at or after `start`
	pub fn find(reader: BoundedReader<'_>, start: u64) -> Result<Option<Self>, ReadError> {
		if start >= reader.size() {
			return Ok(None);
		}

		let len = (reader.size() - start).min(SYNC_SEARCH);
		let window = reader.read(start, len, "mpeg sync search")?;

		for i in 0..window.len().saturating_sub(3) {
			let h = [window[i], window[i + 1], window[i + 2], window[i + 3]];
			let Some(header) = MpegFrameHeader::decode(h) else {
				continue;
			};
			let offset = start + i as u64;

			// A real frame is followed by another frame, or by the end of the file
			let next = offset + header.frame_len();
			if next + 4 <= reader.size() {
				let n = reader.read_array::<4>(next, "next mpeg frame")?;
				if MpegFrameHeader::decode(n).is_none() {
					continue;
				}
			}

			trace!(message = "Found mpeg frame", offset, ?header);
			return Ok(Some(Self::read_vbr_header(reader, offset, header)));
		}

		return Ok(None);
	}

	fn read_vbr_header(reader: BoundedReader<'_>, offset: u64, header: MpegFrameHeader) -> Self {
		let mut out = Self {
			offset,
			header,
			vbr_header: None,
			frames: None,
			bytes: None,
		};

		let xing = offset + header.xing_offset();
		if let Ok(magic) = reader.read_array::<4>(xing, "xing magic") {
			let kind = match &magic {
				b"Xing" => Some(VbrHeader::Xing),
				b"Info" => Some(VbrHeader::Info),
				_ => None,
			};

			if let Some(kind) = kind {
				let mut d = reader.chain(xing + 4);
				let flags = d.u32_be("xing flags");
				let frames = (flags & 0b01 != 0).then(|| d.u32_be("xing frames"));
				let bytes = (flags & 0b10 != 0).then(|| d.u32_be("xing bytes"));
				if d.is_ok() {
					out.vbr_header = Some(kind);
					out.frames = frames;
					out.bytes = bytes;
				}
				return out;
			}
		}

		// VBRI is always 32 bytes past the header
		let vbri = offset + 4 + 32;
		if let Ok(magic) = reader.read_array::<4>(vbri, "vbri magic") {
			if &magic == b"VBRI" {
				let mut d = reader.chain(vbri + 4);
				d.skip(6, "vbri version, delay, quality");
				let bytes = d.u32_be("vbri bytes");
				let frames = d.u32_be("vbri frames");
				if d.is_ok() {
					out.vbr_header = Some(VbrHeader::Vbri);
					out.frames = Some(frames);
					out.bytes = Some(bytes);
				}
			}
		}

		return out;
	}

	pub fn is_vbr(&self) -> bool {
		matches!(self.vbr_header, Some(VbrHeader::Xing | VbrHeader::Vbri))
	}

	/// Compute this stream's duration and average bitrate.
	/// `audio_bytes` is the file size minus the tag size.
	pub fn duration_and_bitrate(&self, audio_bytes: u64) -> (Duration, u32) {
		match self.frames {
			Some(frames) if frames > 0 => {
				let samples = u64::from(frames) * u64::from(self.header.samples_per_frame());
				let duration = samples_to_duration(samples, self.header.sample_rate);
				let bytes = self.bytes.map(u64::from).unwrap_or(audio_bytes);
				let bitrate = if self.is_vbr() {
					estimate_bitrate(bytes, duration)
				} else {
					self.header.bitrate
				};
				(duration, bitrate)
			}

			// No frame count, assume a constant bitrate
			_ => {
				let bitrate = u64::from(self.header.bitrate);
				let millis = audio_bytes * 8 * 1000 / bitrate;
				(Duration::from_millis(millis), self.header.bitrate)
			}
		}
	}
}
