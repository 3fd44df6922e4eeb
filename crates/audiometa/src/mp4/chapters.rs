//! Nero and QuickTime chapter lists

use std::time::Duration;
use tracing::trace;

use super::{
	atoms::{Atom, AtomError},
	track::Track,
};
use crate::{model::Chapter, mp3::text::TextEncoding, reader::BoundedReader};

/// Nero chapter times are in units of 100ns
const CHPL_UNITS_PER_SEC: u64 = 10_000_000;

/// Read a Nero `chpl` atom
pub fn read_chpl(reader: BoundedReader<'_>, chpl: &Atom) -> Result<Vec<Chapter>, AtomError> {
	let mut d = reader.chain(chpl.data_offset());
	let version = d.u8("chpl version");
	d.skip(3, "chpl flags");
	if version != 0 {
		d.skip(4, "chpl reserved");
	}
	let count = d.u8("chapter count");
	let mut pos = d.finish()?;

	let mut out = Vec::with_capacity(count.into());
	for _ in 0..count {
		let mut d = reader.chain(pos);
		let start = d.u64_be("chapter start");
		let len = d.u8("chapter title length");
		let title = d.bytes(len.into(), "chapter title");
		pos = d.finish()?;

		if pos > chpl.end() {
			return Err(AtomError::Malformed {
				name: chpl.name(),
				offset: chpl.offset,
				reason: "chapter list runs past the end of its atom",
			});
		}

		let secs = start / CHPL_UNITS_PER_SEC;
		let nanos = (start % CHPL_UNITS_PER_SEC) * 100;
		out.push(Chapter::new(
			String::from_utf8_lossy(&title).into_owned(),
			Duration::new(secs, nanos as u32),
		));
	}

	trace!(message = "Read chpl", offset = chpl.offset, count);
	return Ok(out);
}

/// Read chapters from a QuickTime text track.
/// Each sample is one chapter title.
pub fn read_text_track(reader: BoundedReader<'_>, track: &Track) -> Result<Vec<Chapter>, AtomError> {
	let mut out = Vec::new();
	for s in track.samples(reader)? {
		let len = reader.read_u16_be(s.offset, "chapter text length")?;
		let len = u64::from(len).min(u64::from(s.size).saturating_sub(2));
		let text = reader.read(s.offset + 2, len, "chapter text")?;

		// Text samples are UTF-8, or UTF-16 with a byte order mark
		let title = if text.starts_with(&[0xFE, 0xFF]) || text.starts_with(&[0xFF, 0xFE]) {
			TextEncoding::Utf16.decode(&text)
		} else {
			TextEncoding::Utf8.decode(&text)
		};

		let start = track.media_time.units_to_duration(s.start);
		let end = track.media_time.units_to_duration(s.start + s.duration);
		out.push(Chapter::with_end(title, start, end));
	}

	trace!(message = "Read chapter track", id = track.id, count = out.len());
	return Ok(out);
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::mp4::{atoms::tests::atom, track::tests::trak};

	pub(crate) fn chpl(chapters: &[(u64, &str)]) -> Vec<u8> {
		let mut payload = vec![1, 0, 0, 0, 0, 0, 0, 0];
		payload.push(chapters.len() as u8);
		for (start, title) in chapters {
			payload.extend(start.to_be_bytes());
			payload.push(title.len() as u8);
			payload.extend(title.as_bytes());
		}
		atom(b"chpl", &payload)
	}

	pub(crate) fn text_sample(title: &str) -> Vec<u8> {
		let mut out = (title.len() as u16).to_be_bytes().to_vec();
		out.extend(title.as_bytes());
		out
	}

	#[test]
	fn nero() {
		let data = chpl(&[(0, "One"), (15_000_000, "Two")]);
		let r = BoundedReader::from_slice(&data);
		let c = read_chpl(r, &Atom::read(r, 0, r.size()).unwrap()).unwrap();
		assert_eq!(c.len(), 2);
		assert_eq!(c[1].title, "Two");
		assert_eq!(c[1].start, Duration::from_millis(1500));

		// Count says three, but only two are present
		let mut data = data;
		data[16] = 3;
		let r = BoundedReader::from_slice(&data);
		assert!(read_chpl(r, &Atom::read(r, 0, r.size()).unwrap()).is_err());
	}

	#[test]
	fn text_track() {
		// Samples first, then the track that points at them
		let mut data = text_sample("Intro");
		let second = data.len() as u32;
		let mut utf16 = vec![0, 6, 0xFE, 0xFF, 0, b'H', 0, b'i'];
		data.append(&mut utf16);
		let track_start = data.len();

		data.extend(trak(
			2,
			b"text",
			600,
			None,
			None,
			&[(0, second, 600 * 4), (second, 8, 600 * 6)],
		));

		let r = BoundedReader::from_slice(&data);
		let track = Track::read(r, &Atom::read(r, track_start as u64, r.size()).unwrap()).unwrap();
		let c = read_text_track(r, &track).unwrap();

		assert_eq!(c.len(), 2);
		assert_eq!(c[0].title, "Intro");
		assert_eq!(c[0].end, Duration::from_secs(4));
		assert_eq!(c[1].title, "Hi");
		assert_eq!(c[1].start, Duration::from_secs(4));
		assert_eq!(c[1].end, Duration::from_secs(10));
	}
}
