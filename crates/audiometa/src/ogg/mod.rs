//! Read metadata from Ogg Vorbis and Ogg Opus files

use audiometa_util::MimeType;
use base64::{prelude::BASE64_STANDARD, Engine};
use std::{path::Path, sync::Arc};
use tracing::{debug, trace};

use crate::{
	common::{
		chapters::chapters_from_comments,
		picture::{artwork_from_image, FlacPicture},
		vorbiscomment::{apply_comments, VorbisComment},
	},
	errors::DecodeError,
	format::Format,
	model::{
		estimate_bitrate, samples_to_duration, AudioInfo, Metadata, PictureType, Stage, Warning,
		WarningSink,
	},
	reader::BoundedReader,
	registry::{ArtworkExtractor, Decoder, ExtractedArtwork, Registry},
};

pub mod headers;
pub mod page;

use headers::{
	OpusHead, VorbisIdent, OPUS_HEAD_MAGIC, OPUS_SAMPLE_RATE, OPUS_TAGS_MAGIC,
	VORBIS_COMMENT_MAGIC, VORBIS_IDENT_MAGIC,
};
use page::{last_granule, OggPage, PacketAssembler};

/// Stop looking for header packets after this many pages
const MAX_HEADER_PAGES: usize = 512;

/// How far from the end of the file we look for the last page
const TAIL_SEARCH: u64 = 64 * 1024;

/// Roughly how many bytes of an opus file aren't audio
const OPUS_OVERHEAD: u64 = 5 * 1024;

/// Add the ogg decoder to `registry`
pub fn register(registry: &mut Registry) {
	let decoder = Arc::new(OggDecoder);
	registry.register(Format::OggVorbis, decoder.clone());
	registry.register(Format::Opus, decoder);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OggCodec {
	Vorbis,
	Opus,
}

/// The header packets of the first logical stream in a file
#[derive(Debug)]
struct OggHeaders {
	serial: u32,
	codec: OggCodec,

	/// The identification packet
	ident: Vec<u8>,

	/// The comment packet, and the offset of the page it ends on
	comment: Vec<u8>,
	comment_offset: u64,
}

impl OggHeaders {
	/// Read header packets from the start of `reader`.
	/// Problems that aren't fatal become warnings in `stage`.
	fn read(
		reader: BoundedReader<'_>,
		stage: Stage,
		warnings: &mut Vec<Warning>,
	) -> Result<Self, DecodeError> {
		let first = OggPage::read(reader, 0).map_err(|e| DecodeError::malformed(0, e.to_string()))?;
		let first_payload = first
			.payload(reader)
			.map_err(|e| DecodeError::malformed(0, e.to_string()))?;

		let serial = first.serial;
		let mut assembler = PacketAssembler::new();
		assembler.push(&first, &first_payload);

		// Pages of other logical streams are skipped.
		// A comment packet with large artwork may span many pages.
		let mut comment_offset = 0;
		let mut offset = first.end();
		let mut n_pages = 1;
		while assembler.packets().len() < 2 && n_pages < MAX_HEADER_PAGES && offset < reader.size() {
			let page = match OggPage::read(reader, offset) {
				Ok(x) => x,
				Err(e) => {
					warnings.warn(stage, offset, e.to_string());
					break;
				}
			};
			offset = page.end();
			n_pages += 1;

			if page.serial != serial {
				continue;
			}

			match page.payload(reader) {
				Ok(payload) => assembler.push(&page, &payload),
				Err(e) => {
					warnings.warn(stage, page.offset, e.to_string());
					break;
				}
			}
			comment_offset = page.offset;
		}

		if assembler.dropped() != 0 {
			warnings.warn(
				stage,
				0,
				format!("dropped {} bytes of incomplete packets", assembler.dropped()),
			);
		}

		let mut packets = assembler.into_packets().into_iter();
		let ident = packets
			.next()
			.ok_or_else(|| DecodeError::malformed(0, "first ogg page holds no complete packet"))?;

		let codec = if ident.starts_with(OPUS_HEAD_MAGIC) {
			OggCodec::Opus
		} else if ident.starts_with(VORBIS_IDENT_MAGIC) {
			OggCodec::Vorbis
		} else {
			return Err(DecodeError::UnsupportedFormat(
				"ogg stream with an unknown codec".into(),
			));
		};

		let comment = packets.next().ok_or_else(|| {
			DecodeError::malformed(offset, "ogg stream ends before its comment header")
		})?;

		debug!(message = "Read ogg headers", serial, ?codec, n_pages, comment_len = comment.len());

		return Ok(Self {
			serial,
			codec,
			ident,
			comment,
			comment_offset,
		});
	}

	/// Decode the comment packet.
	/// Failures become warnings in `stage`.
	fn comments(&self, stage: Stage, warnings: &mut Vec<Warning>) -> Option<VorbisComment> {
		let magic: &[u8] = match self.codec {
			OggCodec::Vorbis => VORBIS_COMMENT_MAGIC,
			OggCodec::Opus => OPUS_TAGS_MAGIC,
		};

		let Some(body) = self.comment.strip_prefix(magic) else {
			warnings.warn(
				stage,
				self.comment_offset,
				"second ogg packet is not a comment header",
			);
			return None;
		};

		match VorbisComment::decode(body) {
			Ok(x) => Some(x),
			Err(e) => {
				warnings.warn(stage, self.comment_offset, e.to_string());
				None
			}
		}
	}
}

/// Reads vorbis and opus streams in ogg containers
#[derive(Debug, Default, Clone, Copy)]
pub struct OggDecoder;

impl Decoder for OggDecoder {
	fn name(&self) -> &'static str {
		"ogg"
	}

	fn parse(&self, reader: BoundedReader<'_>, path: &Path) -> Result<Metadata, DecodeError> {
		let mut warnings = Vec::new();
		let headers = OggHeaders::read(reader, Stage::Metadata, &mut warnings)?;
		let granule = last_granule(reader, headers.serial, TAIL_SEARCH);

		let mut meta = match headers.codec {
			OggCodec::Vorbis => {
				let ident = VorbisIdent::decode(&headers.ident, 0)?;
				let mut meta = Metadata::new(Format::OggVorbis, AudioInfo::new("vorbis", "ogg"));
				meta.info.sample_rate = ident.sample_rate;
				meta.info.channels = ident.channels;

				if let Some(g) = granule {
					meta.info.duration = samples_to_duration(g, ident.sample_rate);
				}

				meta.info.bitrate = match u32::try_from(ident.bitrate_nominal) {
					Ok(x) if x > 0 => x,
					_ => estimate_bitrate(reader.size(), meta.info.duration),
				};
				meta
			}

			OggCodec::Opus => {
				let head = OpusHead::decode(&headers.ident, 0)?;
				let mut meta = Metadata::new(Format::Opus, AudioInfo::new("opus", "ogg"));
				meta.info.sample_rate = OPUS_SAMPLE_RATE;
				meta.info.channels = head.channels;

				if head.input_sample_rate != 0 && head.input_sample_rate != OPUS_SAMPLE_RATE {
					meta.warn(
						Stage::Technical,
						0,
						format!(
							"input sample rate was {} Hz, opus always decodes at {OPUS_SAMPLE_RATE} Hz",
							head.input_sample_rate
						),
					);
				}

				if head.output_gain != 0 {
					meta.warn(
						Stage::Technical,
						0,
						format!("opus header sets an output gain of {} dB", head.output_gain_db()),
					);
				}

				// The granule counts pre-skip samples too
				trace!(message = "Read opus head", pre_skip = head.pre_skip, ?granule);
				if let Some(g) = granule {
					meta.info.duration = samples_to_duration(g, OPUS_SAMPLE_RATE);
				}

				meta.info.bitrate = estimate_bitrate(
					reader.size().saturating_sub(OPUS_OVERHEAD),
					meta.info.duration,
				);
				meta
			}
		};

		meta.info.vbr = true;
		warnings.append(&mut meta.warnings);
		meta.warnings = warnings;

		if granule.is_none() {
			meta.warn(
				Stage::Technical,
				reader.size().saturating_sub(TAIL_SEARCH),
				"could not find the last ogg page, duration is unknown",
			);
		}

		let mut chapters = Vec::new();
		if let Some(comment) = headers.comments(Stage::Metadata, &mut meta.warnings) {
			apply_comments(&mut meta, &comment, headers.comment_offset);
			let pairs = comment.comments.iter().map(|(k, v)| (k.as_str(), v.as_str()));
			chapters = chapters_from_comments(pairs, headers.comment_offset, &mut meta.warnings);
		}
		meta.set_chapters(chapters);

		debug!(
			message = "Decoded ogg",
			?path,
			codec = ?headers.codec,
			granule = ?granule
		);

		return Ok(meta);
	}

	fn artwork(&self) -> Option<&dyn ArtworkExtractor> {
		Some(self)
	}
}

impl ArtworkExtractor for OggDecoder {
	fn extract_artwork(
		&self,
		reader: BoundedReader<'_>,
		path: &Path,
	) -> Result<ExtractedArtwork, DecodeError> {
		let mut out = ExtractedArtwork::default();
		let headers = OggHeaders::read(reader, Stage::Artwork, &mut out.warnings)?;
		let Some(comment) = headers.comments(Stage::Artwork, &mut out.warnings) else {
			return Ok(out);
		};
		let offset = headers.comment_offset;

		for value in comment.get("METADATA_BLOCK_PICTURE") {
			match FlacPicture::decode_base64(value) {
				Ok(p) => out.artwork.push(p.into_artwork()),
				Err(e) => out.warnings.warn(Stage::Artwork, offset, e.to_string()),
			}
		}

		// Legacy cover art: a bare base64 image, with an optional mime type
		let mimes = comment.get("COVERARTMIME").collect::<Vec<_>>();
		for (i, value) in comment.get("COVERART").enumerate() {
			match BASE64_STANDARD.decode(value.trim()) {
				Ok(data) => {
					let mime = mimes.get(i).map(|x| MimeType::from(*x));
					out.artwork.push(artwork_from_image(
						PictureType::Other,
						mime,
						String::new(),
						data,
					));
				}
				Err(e) => out.warnings.warn(
					Stage::Artwork,
					offset,
					format!("could not decode COVERART: {e}"),
				),
			}
		}

		debug!(message = "Extracted ogg artwork", ?path, count = out.artwork.len());
		return Ok(out);
	}
}
