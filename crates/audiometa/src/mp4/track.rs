//! Movie headers, tracks and sample tables

use std::time::Duration;
use tracing::trace;

use super::atoms::{Atom, AtomError};
use crate::{model::samples_to_duration, reader::BoundedReader};

/// Never read more than this many entries from one sample table.
/// Chapter tracks are small, anything bigger is damage.
const MAX_TABLE_ENTRIES: u32 = 100_000;

fn malformed(atom: &Atom, reason: &'static str) -> AtomError {
	AtomError::Malformed {
		name: atom.name(),
		offset: atom.offset,
		reason,
	}
}

/// A `mvhd`, `mdhd`-style timescale and duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeInfo {
	/// Units per second
	pub timescale: u32,
	pub duration: u64,
}

impl TimeInfo {
	/// Read a `mvhd` or `mdhd` atom.
	/// Both start with the same fields.
	pub fn read(reader: BoundedReader<'_>, atom: &Atom) -> Result<Self, AtomError> {
		let mut d = reader.chain(atom.data_offset());
		let version = d.u8("version");
		d.skip(3, "flags");

		let (timescale, duration) = if version == 1 {
			d.skip(16, "creation and modification time");
			let t = d.u32_be("timescale");
			(t, d.u64_be("duration"))
		} else {
			d.skip(8, "creation and modification time");
			let t = d.u32_be("timescale");
			(t, u64::from(d.u32_be("duration")))
		};
		d.finish()?;

		// All ones means "unknown"
		let duration = match (version, duration) {
			(1, u64::MAX) | (0, 0xFFFF_FFFF) => 0,
			_ => duration,
		};

		return Ok(Self {
			timescale,
			duration,
		});
	}

	pub fn to_duration(&self) -> Duration {
		self.units_to_duration(self.duration)
	}

	pub fn units_to_duration(&self, units: u64) -> Duration {
		samples_to_duration(units, self.timescale)
	}
}

/// The first entry of a track's `stsd`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
	pub format: [u8; 4],
	pub channels: u16,
	pub sample_size: u16,

	/// Integer part of the 16.16 sample rate
	pub sample_rate: u32,
}

impl SampleEntry {
	/// Read the first audio sample entry in a `stsd` atom
	pub fn read(reader: BoundedReader<'_>, stsd: &Atom) -> Result<Option<Self>, AtomError> {
		let mut d = reader.chain(stsd.data_offset());
		d.skip(4, "version and flags");
		let count = d.u32_be("entry count");
		let _size = d.u32_be("sample entry size");
		let format = d.array::<4>("sample entry format");
		d.skip(6, "reserved");
		d.skip(2, "data reference index");
		d.skip(8, "sound version, revision and vendor");
		let channels = d.u16_be("channel count");
		let sample_size = d.u16_be("sample size");
		d.skip(4, "compression id and packet size");
		let rate = d.u32_be("sample rate");

		if count == 0 {
			return Ok(None);
		}
		d.finish()?;

		return Ok(Some(Self {
			format,
			channels,
			sample_size,
			sample_rate: rate >> 16,
		}));
	}
}

/// The parts of a `trak` we care about
#[derive(Debug, Clone)]
pub struct Track {
	pub id: u32,

	/// The media handler, `soun` for audio and `text` for chapters
	pub handler: [u8; 4],
	pub media_time: TimeInfo,

	/// Ids of this track's chapter tracks, from `tref/chap`
	pub chapter_tracks: Vec<u32>,

	pub sample_entry: Option<SampleEntry>,
	pub stbl: Option<Atom>,
}

impl Track {
	pub fn read(reader: BoundedReader<'_>, trak: &Atom) -> Result<Self, AtomError> {
		let tkhd = trak
			.child(reader, b"tkhd")?
			.ok_or_else(|| malformed(trak, "track has no tkhd"))?;
		let version = reader.read_u8(tkhd.data_offset(), "tkhd version")?;
		let id_offset = if version == 1 { 20 } else { 12 };
		let id = reader.read_u32_be(tkhd.data_offset() + id_offset, "track id")?;

		let mut chapter_tracks = Vec::new();
		if let Some(chap) = trak.find(reader, &[b"tref", b"chap"])? {
			let data = chap.data(reader)?;
			chapter_tracks = data
				.chunks_exact(4)
				.map(|x| u32::from_be_bytes([x[0], x[1], x[2], x[3]]))
				.collect();
		}

		let mdia = trak
			.child(reader, b"mdia")?
			.ok_or_else(|| malformed(trak, "track has no mdia"))?;

		let media_time = match mdia.child(reader, b"mdhd")? {
			Some(x) => TimeInfo::read(reader, &x)?,
			None => TimeInfo::default(),
		};

		let handler = match mdia.child(reader, b"hdlr")? {
			// Version and flags, then a predefined zero
			Some(x) => reader.read_array::<4>(x.data_offset() + 8, "handler type")?,
			None => [0; 4],
		};

		let stbl = mdia.find(reader, &[b"minf", b"stbl"])?;
		let sample_entry = match &stbl {
			Some(stbl) => match stbl.child(reader, b"stsd")? {
				Some(stsd) if &handler == b"soun" => SampleEntry::read(reader, &stsd)?,
				_ => None,
			},
			None => None,
		};

		trace!(
			message = "Read track",
			id,
			handler = super::atoms::fourcc_name(&handler).as_str(),
			timescale = media_time.timescale,
			duration = media_time.duration,
			?chapter_tracks
		);

		return Ok(Self {
			id,
			handler,
			media_time,
			chapter_tracks,
			sample_entry,
			stbl,
		});
	}

	/// Read this track's sample table:
	/// (file offset, size, start time, duration) for every sample,
	/// times in media units.
	pub fn samples(&self, reader: BoundedReader<'_>) -> Result<Vec<Sample>, AtomError> {
		let Some(stbl) = &self.stbl else {
			return Ok(Vec::new());
		};

		let get = |kind: &[u8; 4]| -> Result<Option<Vec<u8>>, AtomError> {
			match stbl.child(reader, kind)? {
				Some(a) => Ok(Some(a.data(reader)?)),
				None => Ok(None),
			}
		};

		let stts = get(b"stts")?.ok_or_else(|| malformed(stbl, "missing stts"))?;
		let stsz = get(b"stsz")?.ok_or_else(|| malformed(stbl, "missing stsz"))?;
		let stsc = get(b"stsc")?.ok_or_else(|| malformed(stbl, "missing stsc"))?;

		let offsets: Vec<u64> = match (get(b"stco")?, get(b"co64")?) {
			(Some(x), _) => table(&x, 4)?.into_iter().map(|e| u64::from(be32(e, 0))).collect(),
			(None, Some(x)) => table(&x, 8)?.into_iter().map(|e| be64(e, 0)).collect(),
			(None, None) => return Err(malformed(stbl, "missing chunk offsets")),
		};

		// Sample sizes
		let fixed_size = be32(&stsz, 4);
		let sizes: Vec<u32> = if fixed_size != 0 {
			let count = be32(&stsz, 8).min(MAX_TABLE_ENTRIES);
			vec![fixed_size; count as usize]
		} else {
			// Entries follow the count, like any other table
			table(stsz.get(4..).unwrap_or_default(), 4)?
				.into_iter()
				.map(|e| be32(e, 0))
				.collect()
		};

		// Sample times
		let mut times = Vec::with_capacity(sizes.len());
		let mut t = 0u64;
		'outer: for e in table(&stts, 8)? {
			let (count, delta) = (be32(e, 0), be32(e, 4));
			for _ in 0..count {
				if times.len() >= sizes.len() {
					break 'outer;
				}
				times.push((t, delta));
				t += u64::from(delta);
			}
		}

		// Sample-to-chunk runs: (first chunk, samples per chunk)
		let runs = table(&stsc, 12)?
			.into_iter()
			.map(|e| (be32(e, 0), be32(e, 4)))
			.collect::<Vec<_>>();

		let mut out = Vec::with_capacity(sizes.len());
		let mut sample = 0usize;
		for (chunk_idx, chunk_offset) in offsets.iter().enumerate() {
			let chunk_number = chunk_idx as u32 + 1;
			let per_chunk = runs
				.iter()
				.rev()
				.find(|(first, _)| *first <= chunk_number)
				.map(|(_, n)| *n)
				.unwrap_or(0);

			let mut offset = *chunk_offset;
			for _ in 0..per_chunk {
				let (Some(size), Some((start, delta))) = (sizes.get(sample), times.get(sample)) else {
					return Ok(out);
				};

				out.push(Sample {
					offset,
					size: *size,
					start: *start,
					duration: u64::from(*delta),
				});
				offset += u64::from(*size);
				sample += 1;
			}
		}

		return Ok(out);
	}
}

/// One sample of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
	pub offset: u64,
	pub size: u32,

	/// In media units
	pub start: u64,
	pub duration: u64,
}

fn be32(data: &[u8], at: usize) -> u32 {
	match data.get(at..at + 4) {
		Some(x) => u32::from_be_bytes([x[0], x[1], x[2], x[3]]),
		None => 0,
	}
}

fn be64(data: &[u8], at: usize) -> u64 {
	(u64::from(be32(data, at)) << 32) | u64::from(be32(data, at + 4))
}

/// Split a full-atom table (version, flags, count, entries)
/// into entries of `width` bytes.
fn table(data: &[u8], width: usize) -> Result<Vec<&[u8]>, AtomError> {
	let count = be32(data, 4).min(MAX_TABLE_ENTRIES) as usize;
	let entries = data.get(8..).unwrap_or_default();
	if entries.len() < count * width {
		return Err(AtomError::Malformed {
			name: "table".into(),
			offset: 0,
			reason: "sample table is truncated",
		});
	}

	return Ok(entries.chunks_exact(width).take(count).collect());
}
