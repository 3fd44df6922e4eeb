//! Read metadata from MP3 files with ID3v2 tags

use audiometa_util::MimeType;
use std::{path::Path, sync::Arc, time::Duration};
use tracing::{debug, trace};

use crate::{
	common::{picture::artwork_from_image, vorbiscomment::apply_replaygain},
	errors::DecodeError,
	format::Format,
	model::{Artwork, AudioInfo, Chapter, Metadata, PictureType, Stage, TagType, Warning, WarningSink},
	reader::BoundedReader,
	registry::{ArtworkExtractor, Decoder, ExtractedArtwork, Registry},
};

pub mod frames;
pub mod header;
pub mod mpeg;
pub mod text;

use frames::{Id3Frame, Id3FrameError, Id3FrameWalker};
use header::{extended_header_len, remove_unsync, Id3Header};
use mpeg::MpegStream;
use text::TextEncoding;

/// Add the mp3 decoder to `registry`
pub fn register(registry: &mut Registry) {
	registry.register(Format::Mp3, Arc::new(Mp3Decoder));
}

fn has_id3(reader: BoundedReader<'_>) -> Result<bool, DecodeError> {
	return Ok(&reader.read_array::<3>(0, "id3 magic")? == b"ID3");
}

/// Walk the frames of the tag at the start of `reader`,
/// returning the bodies of the frames `wanted` accepts.
///
/// Frames we can't read become warnings in `stage`.
fn read_frames(
	reader: BoundedReader<'_>,
	header: &Id3Header,
	stage: Stage,
	warnings: &mut Vec<Warning>,
	wanted: impl Fn(&str) -> bool,
) -> Result<Vec<(Id3Frame, Vec<u8>)>, DecodeError> {
	// ID3v2.3 unsynchronises the whole tag at once.
	// Frame sizes count decoded bytes, so we must decode before walking.
	let decoded: Vec<u8>;
	let tag = if header.unsync && header.major_version == 3 {
		let raw = reader.read(0, header.frames_end().min(reader.size()), "id3 tag")?;
		decoded = [&raw[..10], &remove_unsync(&raw[10..])[..]].concat();
		BoundedReader::from_slice(&decoded)
	} else {
		reader
	};

	// ID3v2.4 may unsynchronise every frame
	let force_unsync = header.unsync && header.major_version == 4;

	let mut start = Id3Header::LENGTH;
	if header.extended_header {
		start += extended_header_len(tag, start, header.major_version)?;
	}

	let mut out = Vec::new();
	let mut walker = Id3FrameWalker::new(tag, start, header.frames_end(), header.major_version);
	while let Some(frame) = walker.next() {
		let frame = match frame {
			Ok(x) => x,
			Err(e) => {
				warnings.warn(stage, walker.offset(), e.to_string());
				break;
			}
		};

		if !wanted(frame.id.as_str()) {
			continue;
		}

		match frame.body(tag, force_unsync) {
			Ok(body) => out.push((frame, body)),
			Err(e) => warnings.warn(stage, frame.offset, e.to_string()),
		}
	}

	return Ok(out);
}

/// Split the text encoding byte off a frame body
fn split_encoding<'a>(
	frame: &Id3Frame,
	body: &'a [u8],
) -> Result<(TextEncoding, &'a [u8]), Id3FrameError> {
	let (&enc, rest) = body.split_first().ok_or_else(|| Id3FrameError::Malformed {
		id: frame.id.clone(),
		reason: "frame is empty",
	})?;

	let enc = TextEncoding::from_byte(enc).ok_or_else(|| Id3FrameError::BadEncoding {
		id: frame.id.clone(),
		encoding: enc,
	})?;

	return Ok((enc, rest));
}

/// The canonical field of a text frame
fn text_tag_type(id: &str) -> TagType {
	match id {
		"TIT2" => TagType::TrackTitle,
		"TPE1" => TagType::TrackArtist,
		"TPE2" => TagType::AlbumArtist,
		"TALB" => TagType::Album,
		"TCOM" => TagType::Composer,
		"TCON" => TagType::Genre,
		"TYER" | "TDRC" => TagType::ReleaseDate,
		"TRCK" => TagType::TrackNumber,
		"TPOS" => TagType::DiskNumber,
		"TCOP" => TagType::Copyright,
		"TSSE" | "TENC" => TagType::Encoder,
		"TSRC" => TagType::Isrc,
		"TPUB" => TagType::Publisher,
		"TLAN" => TagType::Language,
		_ => TagType::Other(id.into()),
	}
}

const MUSICBRAINZ_UFID_OWNER: &str = "http://musicbrainz.org";

/// Store one tag frame in `meta`
fn apply_frame(meta: &mut Metadata, frame: &Id3Frame, body: &[u8]) -> Result<(), Id3FrameError> {
	let id = frame.id.as_str();
	match id {
		"TXXX" => {
			let (enc, rest) = split_encoding(frame, body)?;
			let (desc, value) = enc.split_terminated(rest);
			let desc = enc.decode(desc);
			let key = format!("TXXX:{desc}");
			let tag = TagType::from_description(&desc);
			let rg_key = desc.to_ascii_uppercase();

			for v in enc.split_all(value) {
				apply_replaygain(meta, &rg_key, &v, frame.offset);
				meta.tags.add(&key, &v, &tag);
			}
		}

		"COMM" | "USLT" => {
			let (enc, rest) = split_encoding(frame, body)?;
			// Skip the language code
			let rest = rest.get(3..).ok_or_else(|| Id3FrameError::Malformed {
				id: frame.id.clone(),
				reason: "frame ends inside its language code",
			})?;

			let (desc, value) = enc.split_terminated(rest);
			let desc = enc.decode(desc);
			let value = enc.decode(value);

			let tag = match (id, desc.is_empty()) {
				("USLT", _) => TagType::Lyrics,
				(_, true) => TagType::Comment,
				(_, false) => TagType::from_description(&desc),
			};

			if desc.is_empty() {
				meta.tags.add(id, &value, &tag);
			} else {
				meta.tags.add(&format!("{id}:{desc}"), &value, &tag);
			}
		}

		"WXXX" => {
			let (enc, rest) = split_encoding(frame, body)?;
			let (desc, url) = enc.split_terminated(rest);
			let desc = enc.decode(desc);
			let key = if desc.is_empty() {
				id.into()
			} else {
				format!("{id}:{desc}")
			};

			// The url is always latin-1
			let url = TextEncoding::Latin1.decode(url);
			meta.tags.add(&key, &url, &TagType::Other(key.as_str().into()));
		}

		"UFID" => {
			let (owner, ident) = TextEncoding::Latin1.split_terminated(body);
			let owner = TextEncoding::Latin1.decode(owner);
			let key = format!("{id}:{owner}");
			let tag = if owner == MUSICBRAINZ_UFID_OWNER {
				TagType::MusicBrainzTrackId
			} else {
				TagType::Other(key.as_str().into())
			};
			meta.tags.add(&key, &String::from_utf8_lossy(ident), &tag);
		}

		_ if id.starts_with('T') => {
			let (enc, rest) = split_encoding(frame, body)?;
			let tag = text_tag_type(id);

			// ID3v2.4 separates multiple values with nulls
			for v in enc.split_all(rest) {
				meta.tags.add(id, &v, &tag);
			}
		}

		_ if id.starts_with('W') => {
			let url = TextEncoding::Latin1.decode(body);
			meta.tags.add(id, &url, &TagType::Other(id.into()));
		}

		_ => trace!(message = "Skipping id3 frame", id, offset = frame.offset),
	}

	return Ok(());
}

/// Decode a `CHAP` frame
fn decode_chapter(
	frame: &Id3Frame,
	body: &[u8],
	major_version: u8,
) -> Result<Chapter, Id3FrameError> {
	let (element_id, rest) = TextEncoding::Latin1.split_terminated(body);
	let element_id = TextEncoding::Latin1.decode(element_id);

	let r = BoundedReader::from_slice(rest);
	let mut d = r.chain(0);
	let start = d.u32_be("chapter start");
	let end = d.u32_be("chapter end");
	d.skip(8, "chapter byte offsets");
	let subframes_start = d.finish()?;

	// The title lives in an embedded TIT2
	let mut title = None;
	for sub in Id3FrameWalker::new(r, subframes_start, r.size(), major_version) {
		let Ok(sub) = sub else {
			break;
		};

		if sub.id.as_str() != "TIT2" {
			continue;
		}

		let sub_body = sub.body(r, false)?;
		let (enc, text) = split_encoding(&sub, &sub_body)?;
		title = enc.split_all(text).into_iter().next();
		break;
	}

	trace!(
		message = "Decoded chapter frame",
		offset = frame.offset,
		element_id = element_id.as_str(),
		start,
		end,
		?title
	);

	let title = title.filter(|x| !x.is_empty()).unwrap_or(element_id);
	return Ok(Chapter::with_end(
		title,
		Duration::from_millis(start.into()),
		Duration::from_millis(end.into()),
	));
}

/// Decode an `APIC` frame
fn decode_picture(frame: &Id3Frame, body: &[u8]) -> Result<Artwork, Id3FrameError> {
	let malformed = |reason| Id3FrameError::Malformed {
		id: frame.id.clone(),
		reason,
	};

	let (enc, rest) = split_encoding(frame, body)?;
	let (mime, rest) = TextEncoding::Latin1.split_terminated(rest);
	let (&kind, rest) = rest
		.split_first()
		.ok_or_else(|| malformed("frame ends before its picture type"))?;
	let (desc, data) = enc.split_terminated(rest);

	let mime = TextEncoding::Latin1.decode(mime);
	if mime == "-->" {
		return Err(malformed("linked pictures are not supported"));
	}

	if data.is_empty() {
		return Err(malformed("frame has no image data"));
	}

	// ID3 doesn't declare dimensions, and its mime types are often wrong
	let declared = (!mime.is_empty()).then(|| MimeType::from(mime.as_str()));
	let mime = MimeType::sniff_image(data).or(declared);

	return Ok(artwork_from_image(
		PictureType::from_idx(kind.into()),
		mime,
		enc.decode(desc),
		data.to_vec(),
	));
}

/// Reads ID3v2.3 and ID3v2.4 tags, and MPEG layer III stream info
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp3Decoder;

impl Decoder for Mp3Decoder {
	fn name(&self) -> &'static str {
		"mp3"
	}

	fn parse(&self, reader: BoundedReader<'_>, path: &Path) -> Result<Metadata, DecodeError> {
		let mut meta = Metadata::new(Format::Mp3, AudioInfo::new("mp3", "mpeg"));
		let has_tag = has_id3(reader)?;

		let mut tag_size = 0;
		let mut chapters = Vec::new();
		if has_tag {
			let header = Id3Header::read(reader)?;
			tag_size = header.total_size();
			trace!(message = "Found id3 tag", ?header);

			if tag_size > reader.size() {
				meta.warn(
					Stage::Metadata,
					6,
					format!("id3 tag claims {tag_size} bytes, but the file is shorter"),
				);
			}

			let frames = read_frames(
				reader,
				&header,
				Stage::Metadata,
				&mut meta.warnings,
				|id| id != "APIC",
			)?;

			// Chapters are decoded after everything else
			let mut chap_frames = Vec::new();
			for (frame, body) in frames {
				if frame.id.as_str() == "CHAP" {
					chap_frames.push((frame, body));
					continue;
				}

				if let Err(e) = apply_frame(&mut meta, &frame, &body) {
					meta.warn(Stage::Metadata, frame.offset, e.to_string());
				}
			}

			for (frame, body) in chap_frames {
				match decode_chapter(&frame, &body, header.major_version) {
					Ok(c) => chapters.push(c),
					Err(e) => meta.warn(Stage::Chapters, frame.offset, e.to_string()),
				}
			}
		}

		match MpegStream::find(reader, tag_size) {
			Ok(Some(stream)) => {
				let audio_bytes = reader.size().saturating_sub(tag_size);
				let (duration, bitrate) = stream.duration_and_bitrate(audio_bytes);
				meta.info.duration = duration;
				meta.info.bitrate = bitrate;
				meta.info.sample_rate = stream.header.sample_rate;
				meta.info.channels = stream.header.channels;
				meta.info.vbr = stream.is_vbr();

				debug!(
					message = "Found mpeg stream",
					offset = stream.offset,
					vbr_header = ?stream.vbr_header,
					frames = ?stream.frames
				);
			}

			Ok(None) if !has_tag => {
				return Err(DecodeError::UnsupportedFormat(
					"file has no id3 tag and no mpeg frames".into(),
				));
			}

			Ok(None) => meta.warn(Stage::Technical, tag_size, "could not find an mpeg frame"),
			Err(e) => meta.warn(Stage::Technical, tag_size, e.to_string()),
		}

		meta.set_chapters(chapters);

		debug!(
			message = "Decoded mp3",
			?path,
			has_tag,
			tag_size,
			n_chapters = meta.chapters.len()
		);

		return Ok(meta);
	}

	fn artwork(&self) -> Option<&dyn ArtworkExtractor> {
		Some(self)
	}
}

impl ArtworkExtractor for Mp3Decoder {
	fn extract_artwork(
		&self,
		reader: BoundedReader<'_>,
		path: &Path,
	) -> Result<ExtractedArtwork, DecodeError> {
		let mut out = ExtractedArtwork::default();
		if !has_id3(reader)? {
			return Ok(out);
		}

		let header = Id3Header::read(reader)?;
		let frames = read_frames(
			reader,
			&header,
			Stage::Artwork,
			&mut out.warnings,
			|id| id == "APIC",
		)?;

		for (frame, body) in frames {
			match decode_picture(&frame, &body) {
				Ok(a) => out.artwork.push(a),
				Err(e) => out.warnings.warn(Stage::Artwork, frame.offset, e.to_string()),
			}
		}

		debug!(message = "Extracted mp3 artwork", ?path, count = out.artwork.len());
		return Ok(out);
	}
}
