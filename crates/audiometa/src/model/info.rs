use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use smartstring::{LazyCompact, SmartString};
use std::time::Duration;

/// ReplayGain values, as found in tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReplayGain {
	/// Track gain, in dB
	pub track_gain: Option<f64>,
	/// Track peak amplitude. 1.0 is full scale.
	pub track_peak: Option<f64>,
	/// Album gain, in dB
	pub album_gain: Option<f64>,
	/// Album peak amplitude. 1.0 is full scale.
	pub album_peak: Option<f64>,
}

impl ReplayGain {
	pub fn is_empty(&self) -> bool {
		self.track_gain.is_none()
			&& self.track_peak.is_none()
			&& self.album_gain.is_none()
			&& self.album_peak.is_none()
	}
}

/// Technical properties of an audio stream.
/// Zero means "unknown" for every numeric field.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioInfo {
	pub codec: SmartString<LazyCompact>,
	pub container: SmartString<LazyCompact>,

	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub duration: Duration,

	/// In Hz
	pub sample_rate: u32,
	pub bit_depth: u8,
	pub channels: u8,

	/// In bits per second
	pub bitrate: u32,

	pub lossless: bool,
	pub vbr: bool,

	pub replay_gain: Option<ReplayGain>,
}

impl AudioInfo {
	pub fn new(codec: &str, container: &str) -> Self {
		Self {
			codec: codec.into(),
			container: container.into(),
			..Default::default()
		}
	}

	/// Get a mutable reference to this stream's replaygain block,
	/// creating it if it doesn't exist.
	pub(crate) fn replay_gain_mut(&mut self) -> &mut ReplayGain {
		self.replay_gain.get_or_insert_with(ReplayGain::default)
	}
}

/// Convert a sample count to a duration.
/// Returns zero if `sample_rate` is zero.
pub(crate) fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
	if sample_rate == 0 {
		return Duration::ZERO;
	}

	let rate = u64::from(sample_rate);
	let secs = samples / rate;
	let rem = samples % rate;
	let nanos = rem * 1_000_000_000 / rate;
	return Duration::new(secs, nanos as u32);
}

/// Estimate a bitrate (in bits per second) from a byte count and a duration.
/// Returns zero if `duration` is zero.
pub(crate) fn estimate_bitrate(bytes: u64, duration: Duration) -> u32 {
	let secs = duration.as_secs_f64();
	if secs <= 0.0 {
		return 0;
	}

	let bps = (bytes as f64) * 8.0 / secs;
	if bps >= f64::from(u32::MAX) {
		return u32::MAX;
	}
	return bps.round() as u32;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sample_durations() {
		assert_eq!(samples_to_duration(44100, 44100), Duration::from_secs(1));
		assert_eq!(
			samples_to_duration(66150, 44100),
			Duration::from_millis(1500)
		);
		assert_eq!(samples_to_duration(1000, 0), Duration::ZERO);

		// 36-bit sample counts don't overflow
		let d = samples_to_duration((1u64 << 36) - 1, 192_000);
		assert_eq!(d.as_secs(), ((1u64 << 36) - 1) / 192_000);
	}

	#[test]
	fn bitrates() {
		assert_eq!(estimate_bitrate(16_000, Duration::from_secs(1)), 128_000);
		assert_eq!(estimate_bitrate(16_000, Duration::ZERO), 0);
	}
}
