use super::errors::FlacBlockError;

/// A streaminfo block in a flac file
#[derive(Debug, Clone, Copy)]
pub struct FlacStreaminfo {
	/// The minimum block size (in samples) used in the stream.
	pub min_block_size: u32,

	/// The maximum block size (in samples) used in the stream.
	/// (Minimum blocksize == maximum blocksize) implies a fixed-blocksize stream.
	pub max_block_size: u32,

	/// The minimum frame size (in bytes) used in the stream.
	/// May be 0 to imply the value is not known.
	pub min_frame_size: u32,

	/// The maximum frame size (in bytes) used in the stream.
	/// May be 0 to imply the value is not known.
	pub max_frame_size: u32,

	/// Sample rate in Hz. A value of 0 is invalid.
	pub sample_rate: u32,

	/// Number of channels, 1 to 8
	pub channels: u8,

	/// Bits per sample, 4 to 32
	pub bits_per_sample: u8,

	/// Total samples in stream. 'Samples' means inter-channel sample,
	/// i.e. one second of 44.1Khz audio will have 44100 samples regardless of the number of channels.
	/// A value of zero here means the number of total samples is unknown.
	pub total_samples: u64,

	/// MD5 signature of the unencoded audio data.
	pub md5_signature: [u8; 16],
}

impl FlacStreaminfo {
	pub const LENGTH: u32 = 34;

	pub fn decode(data: &[u8]) -> Result<Self, FlacBlockError> {
		let block: &[u8; 34] = data
			.try_into()
			.map_err(|_| FlacBlockError::BadStreaminfoLength(data.len() as u32))?;

		let min_block_size = u32::from_be_bytes([0, 0, block[0], block[1]]);
		let max_block_size = u32::from_be_bytes([0, 0, block[2], block[3]]);
		let min_frame_size = u32::from_be_bytes([0, block[4], block[5], block[6]]);
		let max_frame_size = u32::from_be_bytes([0, block[7], block[8], block[9]]);

		let packed = &block[10..18];

		// 20 bits: sample rate in hz
		let sample_rate = u32::from_be_bytes([0, packed[0], packed[1], packed[2]]) >> 4;

		// 3 bits: number of channels - 1.
		let channels = ((packed[2] & 0b0000_1110) >> 1) + 1;

		// 5 bits: bits per sample - 1.
		let bits_per_sample =
			((packed[2] & 0b0000_0001) << 4) + ((packed[3] & 0b1111_0000) >> 4) + 1;

		// 36 bits: total "cross-channel" samples in the stream.
		let total_samples = u64::from_be_bytes([
			0,
			0,
			0,
			packed[3] & 0b0000_1111,
			packed[4],
			packed[5],
			packed[6],
			packed[7],
		]);

		let mut md5_signature = [0u8; 16];
		md5_signature.copy_from_slice(&block[18..34]);

		if sample_rate == 0 {
			return Err(FlacBlockError::BadSampleRate(sample_rate));
		}

		Ok(Self {
			min_block_size,
			max_block_size,
			min_frame_size,
			max_frame_size,
			sample_rate,
			channels,
			bits_per_sample,
			total_samples,
			md5_signature,
		})
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::model::samples_to_duration;
	use rand::Rng;
	use std::time::Duration;

	/// Pack a streaminfo block
	pub(crate) fn build_streaminfo(sample_rate: u32, channels: u8, bits: u8, total: u64) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend(4096u16.to_be_bytes());
		out.extend(4096u16.to_be_bytes());
		out.extend([0, 0, 0, 0, 0, 0]);

		let packed: u64 = (u64::from(sample_rate) << 44)
			| (u64::from(channels - 1) << 41)
			| (u64::from(bits - 1) << 36)
			| (total & 0xF_FFFF_FFFF);
		out.extend(packed.to_be_bytes());
		out.extend([0u8; 16]);
		out
	}

	#[test]
	fn cd_quality() {
		let si = FlacStreaminfo::decode(&build_streaminfo(44100, 2, 16, 44100)).unwrap();
		assert_eq!(si.sample_rate, 44100);
		assert_eq!(si.channels, 2);
		assert_eq!(si.bits_per_sample, 16);
		assert_eq!(si.total_samples, 44100);
		assert_eq!(si.max_block_size, 4096);

		let d = samples_to_duration(si.total_samples, si.sample_rate);
		assert!(d >= Duration::from_millis(900) && d <= Duration::from_millis(1100));
	}

	#[test]
	fn random_round_trip() {
		let mut rng = rand::thread_rng();
		for _ in 0..200 {
			let rate = rng.gen_range(1..(1 << 20));
			let channels = rng.gen_range(1..=8);
			let bits = rng.gen_range(4..=32);
			let total = rng.gen_range(0..(1u64 << 36));

			let si = FlacStreaminfo::decode(&build_streaminfo(rate, channels, bits, total)).unwrap();
			assert_eq!(
				(si.sample_rate, si.channels, si.bits_per_sample, si.total_samples),
				(rate, channels, bits, total)
			);
		}
	}

	#[test]
	fn bad_blocks() {
		assert!(matches!(
			FlacStreaminfo::decode(&[0u8; 33]),
			Err(FlacBlockError::BadStreaminfoLength(33))
		));
		assert!(matches!(
			FlacStreaminfo::decode(&build_streaminfo(0, 2, 16, 0)),
			Err(FlacBlockError::BadSampleRate(0))
		));
	}
}
