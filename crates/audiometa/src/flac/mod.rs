//! Read metadata from FLAC files

use std::{path::Path, sync::Arc};
use tracing::{debug, trace};

use crate::{
	common::{
		chapters::chapters_from_comments,
		picture::FlacPicture,
		vorbiscomment::{apply_comments, VorbisComment},
	},
	errors::DecodeError,
	format::Format,
	model::{estimate_bitrate, samples_to_duration, AudioInfo, Chapter, Metadata, Stage, WarningSink},
	reader::BoundedReader,
	registry::{ArtworkExtractor, Decoder, ExtractedArtwork, Registry},
};

pub mod blocks;
pub mod cuesheet;
pub mod errors;
pub mod streaminfo;

use blocks::{FlacBlockWalker, FlacMetablockType};
use cuesheet::FlacCuesheet;
use errors::FlacBlockError;
use streaminfo::FlacStreaminfo;

/// Add the flac decoder to `registry`
pub fn register(registry: &mut Registry) {
	registry.register(Format::Flac, Arc::new(FlacDecoder));
}

fn check_magic(reader: BoundedReader<'_>) -> Result<(), DecodeError> {
	let magic = reader.read_array::<4>(0, "flac magic")?;
	if &magic != b"fLaC" {
		return Err(DecodeError::UnsupportedFormat(
			"flac signature is missing or malformed".into(),
		));
	}
	return Ok(());
}

/// Reads metadata blocks from flac files
#[derive(Debug, Default, Clone, Copy)]
pub struct FlacDecoder;

impl Decoder for FlacDecoder {
	fn name(&self) -> &'static str {
		"flac"
	}

	fn parse(&self, reader: BoundedReader<'_>, path: &Path) -> Result<Metadata, DecodeError> {
		check_magic(reader)?;

		let mut meta = Metadata::new(Format::Flac, AudioInfo::new("flac", "flac"));
		meta.info.lossless = true;

		let mut streaminfo: Option<FlacStreaminfo> = None;
		let mut cuesheet: Option<(u64, Vec<u8>)> = None;
		let mut comments: Vec<(u64, VorbisComment)> = Vec::new();
		let mut n_pictures = 0usize;

		let mut walker = FlacBlockWalker::new(reader);
		let mut is_first = true;
		while let Some(block) = walker.next() {
			let block = match block {
				Ok(x) => x,
				Err(e) => {
					if is_first {
						return Err(DecodeError::malformed(4, e.to_string()));
					}
					meta.warn(Stage::Metadata, walker.offset(), e.to_string());
					break;
				}
			};

			if is_first && block.header.block_type != FlacMetablockType::Streaminfo {
				meta.warn(
					Stage::Technical,
					block.offset,
					"first metablock isn't streaminfo",
				);
			}
			is_first = false;

			match block.header.block_type {
				FlacMetablockType::Streaminfo => {
					if streaminfo.is_some() {
						meta.warn(Stage::Technical, block.offset, "duplicate streaminfo block");
						continue;
					}

					match block.read(reader).and_then(|x| FlacStreaminfo::decode(&x)) {
						Ok(x) => streaminfo = Some(x),
						Err(e) => meta.warn(Stage::Technical, block.offset, e.to_string()),
					}
				}

				FlacMetablockType::VorbisComment => {
					let decoded = block
						.read(reader)
						.and_then(|x| Ok(VorbisComment::decode(&x)?));

					match decoded {
						Ok(x) => comments.push((block.offset, x)),
						Err(e) => meta.warn(Stage::Metadata, block.offset, e.to_string()),
					}
				}

				FlacMetablockType::Cuesheet => match block.read(reader) {
					Ok(x) => cuesheet = Some((block.offset, x)),
					Err(e) => meta.warn(Stage::Chapters, block.offset, e.to_string()),
				},

				// Pictures are only decoded when artwork is requested
				FlacMetablockType::Picture => n_pictures += 1,

				FlacMetablockType::Padding
				| FlacMetablockType::Application
				| FlacMetablockType::Seektable
				| FlacMetablockType::Reserved(_) => {}
			}
		}

		if comments.len() > 1 {
			meta.warn(
				Stage::Metadata,
				comments[1].0,
				"file has more than one vorbis comment block",
			);
		}

		for (offset, c) in &comments {
			apply_comments(&mut meta, c, *offset);
		}

		match streaminfo {
			Some(si) => {
				meta.info.sample_rate = si.sample_rate;
				meta.info.channels = si.channels;
				meta.info.bit_depth = si.bits_per_sample;
				meta.info.duration = samples_to_duration(si.total_samples, si.sample_rate);
				meta.info.bitrate = estimate_bitrate(reader.size(), meta.info.duration);
			}
			None => meta.warn(Stage::Technical, 0, "file has no valid streaminfo block"),
		}

		let mut chapters: Vec<Chapter> = Vec::new();
		if let Some((offset, data)) = cuesheet {
			match (FlacCuesheet::decode(&data), streaminfo) {
				(Ok(c), Some(si)) => chapters = c.chapters(si.sample_rate),
				(Ok(_), None) => meta.warn(
					Stage::Chapters,
					offset,
					"cannot place cuesheet tracks without a sample rate",
				),
				(Err(e), _) => meta.warn(Stage::Chapters, offset, e.to_string()),
			}
		}

		if chapters.is_empty() {
			for (offset, c) in &comments {
				let pairs = c.comments.iter().map(|(k, v)| (k.as_str(), v.as_str()));
				chapters = chapters_from_comments(pairs, *offset, &mut meta.warnings);
				if !chapters.is_empty() {
					break;
				}
			}
		}

		meta.set_chapters(chapters);

		debug!(
			message = "Decoded flac",
			?path,
			audio_offset = walker.offset(),
			n_pictures,
			n_comment_blocks = comments.len()
		);

		return Ok(meta);
	}

	fn artwork(&self) -> Option<&dyn ArtworkExtractor> {
		Some(self)
	}
}

impl ArtworkExtractor for FlacDecoder {
	fn extract_artwork(
		&self,
		reader: BoundedReader<'_>,
		path: &Path,
	) -> Result<ExtractedArtwork, DecodeError> {
		check_magic(reader)?;

		let mut out = ExtractedArtwork::default();
		for block in FlacBlockWalker::new(reader) {
			let block = match block {
				Ok(x) => x,
				Err(e) => {
					out.warnings.warn(Stage::Artwork, 0, e.to_string());
					break;
				}
			};

			match block.header.block_type {
				FlacMetablockType::Picture => {
					let picture = block
						.read(reader)
						.and_then(|x| Ok(FlacPicture::decode(&x)?));

					match picture {
						Ok(p) => {
							trace!(message = "Found picture block", offset = block.offset, picture = ?p);
							out.artwork.push(p.into_artwork());
						}
						Err(e) => out.warnings.warn(Stage::Artwork, block.offset, e.to_string()),
					}
				}

				FlacMetablockType::VorbisComment => {
					let Ok(data) = block.read(reader) else {
						continue;
					};
					let Ok(comment) = VorbisComment::decode(&data) else {
						continue;
					};

					for value in comment.get("METADATA_BLOCK_PICTURE") {
						match FlacPicture::decode_base64(value).map_err(FlacBlockError::from) {
							Ok(p) => out.artwork.push(p.into_artwork()),
							Err(e) => out.warnings.warn(Stage::Artwork, block.offset, e.to_string()),
						}
					}
				}

				_ => {}
			}
		}

		debug!(message = "Extracted flac artwork", ?path, count = out.artwork.len());
		return Ok(out);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::common::{
		imagesniff::tests::png, picture::tests::build_picture,
		vorbiscomment::tests::build_comment,
	};
	use base64::Engine;
	use cuesheet::tests::build_cuesheet;
	use std::time::Duration;
	use streaminfo::tests::build_streaminfo;

	fn block(kind: u8, last: bool, data: &[u8]) -> Vec<u8> {
		let len = (data.len() as u32).to_be_bytes();
		let mut out = vec![if last { kind | 0x80 } else { kind }, len[1], len[2], len[3]];
		out.extend(data);
		out
	}

	fn flac(blocks: &[(u8, Vec<u8>)]) -> Vec<u8> {
		let mut out = b"fLaC".to_vec();
		for (i, (kind, data)) in blocks.iter().enumerate() {
			out.extend(block(*kind, i + 1 == blocks.len(), data));
		}
		out.extend([0xFF, 0xF8, 0x00, 0x00]);
		out
	}

	fn parse(data: &[u8]) -> Metadata {
		FlacDecoder
			.parse(BoundedReader::from_slice(data), Path::new("test.flac"))
			.unwrap()
	}

	#[test]
	fn streaminfo_and_tags() {
		let data = flac(&[
			(0, build_streaminfo(44100, 2, 16, 44100 * 60)),
			(4, build_comment("ref", &["TITLE=Song", "ARTIST=Band"])),
			(1, vec![0; 100]),
		]);
		let m = parse(&data);

		assert_eq!(m.info.sample_rate, 44100);
		assert_eq!(m.info.channels, 2);
		assert_eq!(m.info.bit_depth, 16);
		assert_eq!(m.info.duration, Duration::from_secs(60));
		assert!(m.info.lossless);
		assert!(m.info.bitrate > 0);
		assert_eq!(m.tags.title.as_deref(), Some("Song"));
		assert_eq!(m.tags.artist.as_deref(), Some("Band"));
		assert!(m.warnings.is_empty(), "{:?}", m.warnings);
	}

	#[test]
	fn bad_magic_is_fatal() {
		let r = FlacDecoder.parse(BoundedReader::from_slice(b"fLaX\0\0\0\0"), Path::new("x"));
		assert!(matches!(r, Err(DecodeError::UnsupportedFormat(_))));
	}

	#[test]
	fn damaged_block_is_skipped() {
		// A cuesheet that is too short to decode
		let data = flac(&[
			(0, build_streaminfo(44100, 2, 16, 44100)),
			(5, vec![0; 20]),
			(4, build_comment("ref", &["TITLE=After"])),
		]);
		let m = parse(&data);
		assert_eq!(m.tags.title.as_deref(), Some("After"));
		assert_eq!(m.warnings.len(), 1);
		assert_eq!(m.warnings[0].stage, Stage::Chapters);
		assert!(m.chapters.is_empty());
	}

	#[test]
	fn cuesheet_chapters() {
		let data = flac(&[
			(0, build_streaminfo(44100, 2, 16, 44100 * 30)),
			(
				5,
				build_cuesheet(true, &[(0, 1, true), (441_000, 2, true), (882_000, 170, true)]),
			),
			// Ignored, because the cuesheet has chapters
			(4, build_comment("ref", &["CHAPTER001=00:00:05.000"])),
		]);
		let m = parse(&data);

		assert_eq!(m.chapters.len(), 2);
		assert_eq!(m.chapters[0].index, 1);
		assert_eq!(m.chapters[0].end, Duration::from_secs(10));
		assert_eq!(m.chapters[1].start, Duration::from_secs(10));
		assert_eq!(m.chapters[1].end, Duration::from_secs(20));
	}

	#[test]
	fn comment_chapters() {
		let data = flac(&[
			(0, build_streaminfo(44100, 2, 16, 44100 * 30)),
			(
				4,
				build_comment(
					"ref",
					&[
						"CHAPTER001=00:00:00.000",
						"CHAPTER001NAME=One",
						"CHAPTER002=00:00:12.500",
						"CHAPTER002NAME=Two",
					],
				),
			),
		]);
		let m = parse(&data);
		assert_eq!(m.chapters.len(), 2);
		assert_eq!(m.chapters[0].end, Duration::from_millis(12_500));
		assert_eq!(m.chapters[1].end, Duration::from_secs(30));
		assert_eq!(m.chapters[1].title, "Two");
	}

	#[test]
	fn block_past_end_is_a_warning() {
		let mut data = flac(&[
			(0, build_streaminfo(44100, 2, 16, 44100)),
			(1, vec![0; 4]),
		]);
		// Make the padding block non-final and claim it is huge
		let at = 4 + 4 + 34;
		data[at] = 0x01;
		data[at + 1] = 0x7F;

		let m = parse(&data);
		assert_eq!(m.info.sample_rate, 44100);
		assert_eq!(m.warnings.len(), 1);
	}

	#[test]
	fn artwork() {
		let pic = build_picture(3, "image/png", "front", 0, 0, &png(32, 16));
		let b64 = base64::prelude::BASE64_STANDARD.encode(build_picture(4, "", "", 0, 0, &png(8, 8)));
		let comment = format!("METADATA_BLOCK_PICTURE={b64}");

		let data = flac(&[
			(0, build_streaminfo(44100, 2, 16, 44100)),
			(6, pic),
			(6, vec![0, 0, 0, 3, 0, 0]),
			(4, build_comment("ref", &[&comment])),
		]);

		let r = BoundedReader::from_slice(&data);
		let m = FlacDecoder.parse(r, Path::new("x.flac")).unwrap();
		assert!(m.warnings.is_empty());
		assert!(!m.tags.raw.contains_key("METADATA_BLOCK_PICTURE"));

		let a = FlacDecoder.extract_artwork(r, Path::new("x.flac")).unwrap();
		assert_eq!(a.artwork.len(), 2);
		assert_eq!(a.artwork[0].picture_type, crate::model::PictureType::FrontCover);
		assert_eq!((a.artwork[0].width, a.artwork[0].height), (32, 16));
		assert_eq!(a.artwork[1].picture_type, crate::model::PictureType::BackCover);
		assert_eq!(a.warnings.len(), 1);
		assert_eq!(a.warnings[0].stage, Stage::Artwork);
	}
}
