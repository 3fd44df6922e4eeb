//! Read metadata from MP4 audio files (m4a and m4b)

use std::{path::Path, sync::Arc, time::Duration};
use tracing::debug;

use crate::{
	errors::DecodeError,
	format::{detect_mp4, Format},
	model::{estimate_bitrate, AudioInfo, Chapter, Metadata, Stage, Warning, WarningSink},
	reader::BoundedReader,
	registry::{ArtworkExtractor, Decoder, ExtractedArtwork, Registry},
};

pub mod atoms;
pub mod chapters;
pub mod ilst;
pub mod track;

use atoms::{Atom, AtomError, AtomWalker};
use chapters::{read_chpl, read_text_track};
use ilst::IlstItem;
use track::{SampleEntry, TimeInfo, Track};

/// Add the mp4 decoder to `registry`
pub fn register(registry: &mut Registry) {
	let decoder = Arc::new(Mp4Decoder);
	registry.register(Format::M4a, decoder.clone());
	registry.register(Format::M4b, decoder);
}

/// The top-level atoms we need
#[derive(Debug)]
struct TopLevel {
	moov: Atom,

	/// Total payload of every `mdat`
	mdat_bytes: u64,
}

impl TopLevel {
	fn read(
		reader: BoundedReader<'_>,
		stage: Stage,
		warnings: &mut Vec<Warning>,
	) -> Result<Self, DecodeError> {
		let mut moov = None;
		let mut mdat_bytes = 0;

		for atom in AtomWalker::new(reader, 0, reader.size()) {
			match atom {
				Ok(a) => match &a.kind {
					b"moov" if moov.is_none() => moov = Some(a),
					b"mdat" => mdat_bytes += a.data_len(),
					_ => {}
				},

				// Damage after `moov` is survivable
				Err(e) if moov.is_some() => {
					warnings.warn(stage, e.offset(), e.to_string());
					break;
				}

				Err(e) => return Err(DecodeError::malformed(e.offset(), e.to_string())),
			}
		}

		let moov = moov.ok_or_else(|| DecodeError::malformed(0, "file has no moov atom"))?;
		return Ok(Self { moov, mdat_bytes });
	}
}

/// Find `moov/udta/meta/ilst`
fn find_ilst(reader: BoundedReader<'_>, moov: &Atom) -> Result<Option<Atom>, AtomError> {
	moov.find(reader, &[b"udta", b"meta", b"ilst"])
}

fn codec_name(entry: &SampleEntry) -> (String, bool) {
	match &entry.format {
		b"mp4a" => ("aac".into(), false),
		b"alac" => ("alac".into(), true),
		b"fLaC" => ("flac".into(), true),
		b"Opus" => ("opus".into(), false),
		b"ac-3" => ("ac3".into(), false),
		b"ec-3" => ("eac3".into(), false),
		x => (atoms::fourcc_name(x).trim().to_lowercase(), false),
	}
}

/// Reads m4a and m4b files
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4Decoder;

impl Mp4Decoder {
	fn read_tracks(reader: BoundedReader<'_>, moov: &Atom, meta: &mut Metadata) -> Vec<Track> {
		let mut tracks = Vec::new();
		for a in moov.children(reader, 0) {
			let a = match a {
				Ok(x) => x,
				Err(e) => {
					meta.warn(Stage::Technical, e.offset(), e.to_string());
					break;
				}
			};

			if &a.kind != b"trak" {
				continue;
			}

			match Track::read(reader, &a) {
				Ok(t) => tracks.push(t),
				Err(e) => meta.warn(Stage::Technical, e.offset(), e.to_string()),
			}
		}
		return tracks;
	}

	fn read_tags(reader: BoundedReader<'_>, moov: &Atom, meta: &mut Metadata) {
		let ilst = match find_ilst(reader, moov) {
			Ok(Some(x)) => x,
			Ok(None) => return,
			Err(e) => {
				meta.warn(Stage::Metadata, e.offset(), e.to_string());
				return;
			}
		};

		for a in ilst.children(reader, 0) {
			let a = match a {
				Ok(x) => x,
				Err(e) => {
					meta.warn(Stage::Metadata, e.offset(), e.to_string());
					break;
				}
			};

			// Artwork is read separately
			if &a.kind == b"covr" {
				continue;
			}

			let item = match IlstItem::read(reader, a) {
				Ok(x) => x,
				Err(e) => {
					meta.warn(Stage::Metadata, e.offset(), e.to_string());
					continue;
				}
			};

			let key = item.key();
			let tag_type = item.tag_type();
			for value in item.strings() {
				meta.tags.add(&key, &value, &tag_type);
			}
		}
	}

	/// Nero chapters if there are any, otherwise the audio track's chapter track
	fn read_chapters(
		reader: BoundedReader<'_>,
		moov: &Atom,
		tracks: &[Track],
		audio: Option<&Track>,
		meta: &mut Metadata,
	) -> Vec<Chapter> {
		match moov.find(reader, &[b"udta", b"chpl"]) {
			Ok(Some(chpl)) => match read_chpl(reader, &chpl) {
				Ok(c) if !c.is_empty() => return c,
				Ok(_) => {}
				Err(e) => meta.warn(Stage::Chapters, e.offset(), e.to_string()),
			},
			Ok(None) => {}
			Err(e) => meta.warn(Stage::Chapters, e.offset(), e.to_string()),
		}

		let Some(audio) = audio else {
			return Vec::new();
		};

		for id in &audio.chapter_tracks {
			let Some(track) = tracks.iter().find(|t| t.id == *id) else {
				meta.warn(
					Stage::Chapters,
					moov.offset,
					format!("chapter track {id} does not exist"),
				);
				continue;
			};

			match read_text_track(reader, track) {
				Ok(c) => return c,
				Err(e) => meta.warn(Stage::Chapters, e.offset(), e.to_string()),
			}
		}

		return Vec::new();
	}
}

impl Decoder for Mp4Decoder {
	fn name(&self) -> &'static str {
		"mp4"
	}

	fn parse(&self, reader: BoundedReader<'_>, path: &Path) -> Result<Metadata, DecodeError> {
		let format = detect_mp4(reader)?;
		let mut warnings = Vec::new();
		let top = TopLevel::read(reader, Stage::Technical, &mut warnings)?;
		let moov = top.moov;

		let mut meta = Metadata::new(format, AudioInfo::new("", "mp4"));
		meta.warnings = warnings;

		let movie_time = match moov.child(reader, b"mvhd") {
			Ok(Some(a)) => match TimeInfo::read(reader, &a) {
				Ok(x) => Some(x),
				Err(e) => {
					meta.warn(Stage::Technical, e.offset(), e.to_string());
					None
				}
			},
			Ok(None) => None,
			Err(e) => {
				meta.warn(Stage::Technical, e.offset(), e.to_string());
				None
			}
		};

		let tracks = Self::read_tracks(reader, &moov, &mut meta);
		let audio = tracks.iter().find(|t| &t.handler == b"soun");

		match audio {
			Some(t) => {
				if let Some(entry) = &t.sample_entry {
					let (codec, lossless) = codec_name(entry);
					meta.info.codec = codec.into();
					meta.info.lossless = lossless;
					meta.info.channels = u8::try_from(entry.channels).unwrap_or(u8::MAX);
					meta.info.sample_rate = entry.sample_rate;
					if lossless {
						meta.info.bit_depth = u8::try_from(entry.sample_size).unwrap_or(0);
					}
				}

				if meta.info.sample_rate == 0 {
					meta.info.sample_rate = t.media_time.timescale;
				}
			}
			None => meta.warn(Stage::Technical, moov.offset, "file has no audio track"),
		}

		meta.info.duration = match (movie_time, audio) {
			(Some(m), _) if m.duration != 0 && m.timescale != 0 => m.to_duration(),
			(_, Some(t)) => t.media_time.to_duration(),
			_ => Duration::ZERO,
		};
		meta.info.bitrate = estimate_bitrate(top.mdat_bytes, meta.info.duration);

		Self::read_tags(reader, &moov, &mut meta);
		let chapters = Self::read_chapters(reader, &moov, &tracks, audio, &mut meta);
		meta.set_chapters(chapters);

		debug!(
			message = "Decoded mp4",
			?path,
			%format,
			codec = meta.info.codec.as_str(),
			tracks = tracks.len(),
			chapters = meta.chapters.len()
		);

		return Ok(meta);
	}

	fn artwork(&self) -> Option<&dyn ArtworkExtractor> {
		Some(self)
	}
}

impl ArtworkExtractor for Mp4Decoder {
	fn extract_artwork(
		&self,
		reader: BoundedReader<'_>,
		path: &Path,
	) -> Result<ExtractedArtwork, DecodeError> {
		let mut out = ExtractedArtwork::default();
		let top = TopLevel::read(reader, Stage::Artwork, &mut out.warnings)?;

		let ilst = match find_ilst(reader, &top.moov) {
			Ok(Some(x)) => x,
			Ok(None) => return Ok(out),
			Err(e) => {
				out.warnings.warn(Stage::Artwork, e.offset(), e.to_string());
				return Ok(out);
			}
		};

		for a in ilst.children(reader, 0) {
			let a = match a {
				Ok(x) => x,
				Err(e) => {
					out.warnings.warn(Stage::Artwork, e.offset(), e.to_string());
					break;
				}
			};

			if &a.kind != b"covr" {
				continue;
			}

			match IlstItem::read(reader, a) {
				Ok(item) => out.artwork.extend(item.artwork()),
				Err(e) => out.warnings.warn(Stage::Artwork, e.offset(), e.to_string()),
			}
		}

		debug!(message = "Extracted mp4 artwork", ?path, count = out.artwork.len());
		return Ok(out);
	}
}
