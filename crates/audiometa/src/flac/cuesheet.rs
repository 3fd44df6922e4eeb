use smartstring::{LazyCompact, SmartString};

use super::errors::FlacBlockError;
use crate::{
	model::{samples_to_duration, Chapter},
	reader::BoundedReader,
};

/// The lead-out track number on CD-DA cuesheets
pub const CD_LEAD_OUT: u8 = 170;

/// The lead-out track number on other cuesheets
pub const LEAD_OUT: u8 = 255;

#[derive(Debug, Clone)]
pub struct FlacCuesheetTrack {
	/// Offset of this track, in samples from the start of the stream
	pub offset: u64,
	pub number: u8,
	pub isrc: SmartString<LazyCompact>,
	pub is_audio: bool,
	pub pre_emphasis: bool,

	/// (offset in samples relative to `offset`, index number)
	pub indices: Vec<(u64, u8)>,
}

impl FlacCuesheetTrack {
	pub fn is_lead_out(&self, is_cd: bool) -> bool {
		if is_cd {
			self.number == CD_LEAD_OUT
		} else {
			self.number == LEAD_OUT
		}
	}
}

/// A cuesheet block in a flac file
#[derive(Debug, Clone)]
pub struct FlacCuesheet {
	pub catalog_number: SmartString<LazyCompact>,
	pub lead_in_samples: u64,
	pub is_cd: bool,

	/// Always ends with the lead-out track
	pub tracks: Vec<FlacCuesheetTrack>,
}

fn ascii_field(data: &[u8]) -> SmartString<LazyCompact> {
	let end = data.iter().position(|x| *x == 0).unwrap_or(data.len());
	String::from_utf8_lossy(&data[..end]).trim().into()
}

impl FlacCuesheet {
	pub fn decode(data: &[u8]) -> Result<Self, FlacBlockError> {
		let r = BoundedReader::from_slice(data);
		let mut d = r.chain(0);

		let catalog_number = ascii_field(&d.bytes(128, "catalog number"));
		let lead_in_samples = d.u64_be("lead-in samples");
		let is_cd = d.u8("cd flag") & 0b1000_0000 != 0;
		d.skip(258, "reserved");

		let n_tracks = d.u8("track count");
		let mut tracks = Vec::with_capacity(n_tracks.into());
		for _ in 0..n_tracks {
			let offset = d.u64_be("track offset");
			let number = d.u8("track number");
			let isrc = ascii_field(&d.array::<12>("track isrc"));
			let flags = d.u8("track flags");
			d.skip(13, "track reserved");

			let n_indices = d.u8("index count");
			let mut indices = Vec::with_capacity(n_indices.into());
			for _ in 0..n_indices {
				let offset = d.u64_be("index offset");
				let number = d.u8("index number");
				d.skip(3, "index reserved");
				indices.push((offset, number));
			}

			tracks.push(FlacCuesheetTrack {
				offset,
				number,
				isrc,
				is_audio: flags & 0b1000_0000 == 0,
				pre_emphasis: flags & 0b0100_0000 != 0,
				indices,
			});
		}

		d.finish()?;

		Ok(Self {
			catalog_number,
			lead_in_samples,
			is_cd,
			tracks,
		})
	}

	/// Make chapters from this cuesheet's audio tracks.
	///
	/// Every chapter ends where the next track (or the lead-out) starts.
	pub fn chapters(&self, sample_rate: u32) -> Vec<Chapter> {
		let mut out = Vec::new();

		for (i, t) in self.tracks.iter().enumerate() {
			if !t.is_audio || t.is_lead_out(self.is_cd) {
				continue;
			}

			let start = samples_to_duration(t.offset, sample_rate);
			let end = match self.tracks.get(i + 1) {
				Some(next) => samples_to_duration(next.offset, sample_rate),
				None => start,
			};

			out.push(Chapter::with_end(
				format!("Track {:02}", t.number),
				start,
				end,
			));
		}

		return out;
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::model::finalize_chapters;
	use std::time::Duration;

	/// (offset, number, is_audio)
	pub(crate) fn build_cuesheet(is_cd: bool, tracks: &[(u64, u8, bool)]) -> Vec<u8> {
		let mut out = vec![0u8; 128];
		out.extend(88200u64.to_be_bytes());
		out.push(if is_cd { 0x80 } else { 0 });
		out.extend([0u8; 258]);
		out.push(tracks.len() as u8);
		for (offset, number, is_audio) in tracks {
			out.extend(offset.to_be_bytes());
			out.push(*number);
			out.extend(b"USABC1234567");
			out.push(if *is_audio { 0 } else { 0x80 });
			out.extend([0u8; 13]);

			// One index point, except for the lead-out
			if *number == CD_LEAD_OUT || *number == LEAD_OUT {
				out.push(0);
			} else {
				out.push(1);
				out.extend(0u64.to_be_bytes());
				out.push(1);
				out.extend([0u8; 3]);
			}
		}
		out
	}

	#[test]
	fn two_tracks_and_lead_out() {
		let data = build_cuesheet(true, &[(0, 1, true), (441_000, 2, true), (882_000, 170, true)]);
		let c = FlacCuesheet::decode(&data).unwrap();
		assert!(c.is_cd);
		assert_eq!(c.tracks.len(), 3);
		assert_eq!(c.tracks[0].isrc.as_str(), "USABC1234567");
		assert_eq!(c.tracks[0].indices, vec![(0, 1)]);

		let mut chapters = c.chapters(44100);
		finalize_chapters(&mut chapters, Duration::ZERO);
		assert_eq!(chapters.len(), 2);
		assert_eq!(chapters[0].start, Duration::ZERO);
		assert_eq!(chapters[0].end, Duration::from_secs(10));
		assert_eq!(chapters[1].start, Duration::from_secs(10));
		assert_eq!(chapters[1].end, Duration::from_secs(20));
		assert_eq!(chapters[1].title, "Track 02");
	}

	#[test]
	fn skips_data_tracks() {
		let data = build_cuesheet(
			false,
			&[(0, 1, true), (44_100, 2, false), (88_200, 3, true), (132_300, 255, true)],
		);
		let c = FlacCuesheet::decode(&data).unwrap();
		let chapters = c.chapters(44100);
		assert_eq!(chapters.len(), 2);
		assert_eq!(chapters[0].end, Duration::from_secs(1));
		assert_eq!(chapters[1].end, Duration::from_secs(3));
	}

	#[test]
	fn truncated() {
		let data = build_cuesheet(true, &[(0, 1, true), (441_000, 170, true)]);
		assert!(FlacCuesheet::decode(&data[..data.len() - 5]).is_err());
	}
}
