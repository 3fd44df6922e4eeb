//! Codec identification headers

use crate::{errors::DecodeError, reader::BoundedReader};

pub const VORBIS_IDENT_MAGIC: &[u8; 7] = b"\x01vorbis";
pub const VORBIS_COMMENT_MAGIC: &[u8; 7] = b"\x03vorbis";
pub const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS_MAGIC: &[u8; 8] = b"OpusTags";

/// Opus always decodes at this rate
pub const OPUS_SAMPLE_RATE: u32 = 48000;

/// The vorbis identification header
#[derive(Debug, Clone, Copy)]
pub struct VorbisIdent {
	pub channels: u8,
	pub sample_rate: u32,
	pub bitrate_max: i32,
	pub bitrate_nominal: i32,
	pub bitrate_min: i32,
}

impl VorbisIdent {
	/// Decode the first packet of a vorbis stream.
	/// `offset` is only used in errors.
	pub fn decode(packet: &[u8], offset: u64) -> Result<Self, DecodeError> {
		if !packet.starts_with(VORBIS_IDENT_MAGIC) {
			return Err(DecodeError::UnsupportedFormat(
				"first packet is not a vorbis identification header".into(),
			));
		}

		let mut d = BoundedReader::from_slice(packet).chain(7);
		let version = d.u32_le("vorbis version");
		let channels = d.u8("channels");
		let sample_rate = d.u32_le("sample rate");
		let bitrate_max = d.u32_le("maximum bitrate") as i32;
		let bitrate_nominal = d.u32_le("nominal bitrate") as i32;
		let bitrate_min = d.u32_le("minimum bitrate") as i32;
		d.skip(2, "blocksizes and framing");

		d.finish()
			.map_err(|e| DecodeError::malformed(offset, format!("bad vorbis header: {e}")))?;

		if version != 0 {
			return Err(DecodeError::UnsupportedFormat(format!(
				"vorbis version {version} is not supported"
			)));
		}

		if sample_rate == 0 {
			return Err(DecodeError::malformed(offset, "vorbis sample rate is zero"));
		}

		return Ok(Self {
			channels,
			sample_rate,
			bitrate_max,
			bitrate_nominal,
			bitrate_min,
		});
	}
}

/// The opus identification header
#[derive(Debug, Clone, Copy)]
pub struct OpusHead {
	pub version: u8,
	pub channels: u8,

	/// Samples to discard from the start of the stream, at 48kHz
	pub pre_skip: u16,

	/// The sample rate of the original input.
	/// Informational only.
	pub input_sample_rate: u32,

	/// In Q7.8 dB
	pub output_gain: i16,
	pub mapping_family: u8,
}

impl OpusHead {
	pub fn decode(packet: &[u8], offset: u64) -> Result<Self, DecodeError> {
		if !packet.starts_with(OPUS_HEAD_MAGIC) {
			return Err(DecodeError::UnsupportedFormat(
				"first packet is not an opus header".into(),
			));
		}

		let mut d = BoundedReader::from_slice(packet).chain(8);
		let version = d.u8("opus version");
		let channels = d.u8("channels");
		let pre_skip = d.u16_le("pre-skip");
		let input_sample_rate = d.u32_le("input sample rate");
		let output_gain = d.u16_le("output gain") as i16;
		let mapping_family = d.u8("channel mapping family");

		d.finish()
			.map_err(|e| DecodeError::malformed(offset, format!("bad opus header: {e}")))?;

		if version != 1 {
			return Err(DecodeError::UnsupportedFormat(format!(
				"opus version {version} is not supported"
			)));
		}

		return Ok(Self {
			version,
			channels,
			pre_skip,
			input_sample_rate,
			output_gain,
			mapping_family,
		});
	}

	/// The output gain in dB
	pub fn output_gain_db(&self) -> f64 {
		f64::from(self.output_gain) / 256.0
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn vorbis_ident(channels: u8, rate: u32, nominal: u32) -> Vec<u8> {
		let mut out = VORBIS_IDENT_MAGIC.to_vec();
		out.extend(0u32.to_le_bytes());
		out.push(channels);
		out.extend(rate.to_le_bytes());
		out.extend(0u32.to_le_bytes());
		out.extend(nominal.to_le_bytes());
		out.extend(0u32.to_le_bytes());
		out.extend([0xB8, 0x01]);
		out
	}

	pub(crate) fn opus_head(channels: u8, pre_skip: u16, input_rate: u32, gain: i16) -> Vec<u8> {
		let mut out = OPUS_HEAD_MAGIC.to_vec();
		out.push(1);
		out.push(channels);
		out.extend(pre_skip.to_le_bytes());
		out.extend(input_rate.to_le_bytes());
		out.extend(gain.to_le_bytes());
		out.push(0);
		out
	}

	#[test]
	fn vorbis() {
		let v = VorbisIdent::decode(&vorbis_ident(2, 44100, 160_000), 0).unwrap();
		assert_eq!(v.channels, 2);
		assert_eq!(v.sample_rate, 44100);
		assert_eq!(v.bitrate_nominal, 160_000);

		let mut bad = vorbis_ident(2, 44100, 0);
		bad[7] = 1;
		assert!(matches!(
			VorbisIdent::decode(&bad, 0),
			Err(DecodeError::UnsupportedFormat(_))
		));

		assert!(matches!(
			VorbisIdent::decode(&vorbis_ident(2, 44100, 0)[..20], 58),
			Err(DecodeError::Malformed { offset: 58, .. })
		));
	}

	#[test]
	fn opus() {
		let o = OpusHead::decode(&opus_head(2, 312, 44100, -256), 0).unwrap();
		assert_eq!(o.channels, 2);
		assert_eq!(o.pre_skip, 312);
		assert_eq!(o.input_sample_rate, 44100);
		assert_eq!(o.output_gain_db(), -1.0);

		let mut bad = opus_head(2, 312, 48000, 0);
		bad[8] = 2;
		assert!(OpusHead::decode(&bad, 0).is_err());
		assert!(OpusHead::decode(&opus_head(2, 0, 48000, 0)[..15], 0).is_err());
	}
}
