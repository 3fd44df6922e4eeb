//! Decode Vorbis comment blocks.
//! FLAC, Ogg Vorbis and Opus all use this layout.

use smartstring::{LazyCompact, SmartString};
use thiserror::Error;
use tracing::trace;

use crate::{
	model::{Metadata, Stage, TagType},
	reader::{BoundedReader, ReadError},
};

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum VorbisCommentDecodeError {
	/// We couldn't read the vendor string or the comment count
	#[error("malformed comment header")]
	MalformedHeader(#[source] ReadError),

	/// The given comment string isn't within spec
	#[error("malformed comment string `{0}`")]
	MalformedCommentString(String),

	/// The comment list ended early.
	#[error("comment list truncated after {read} of {declared} comments")]
	Truncated { read: u32, declared: u32 },
}

/// A decoded vorbis comment block
#[derive(Debug)]
pub struct VorbisComment {
	/// This comment's vendor string
	pub vendor: SmartString<LazyCompact>,

	/// List of (key, value), in file order.
	/// Repeated keys are allowed!
	pub comments: Vec<(SmartString<LazyCompact>, String)>,

	/// Problems we skipped over.
	/// If this contains [`VorbisCommentDecodeError::Truncated`],
	/// `comments` holds everything before the damage.
	pub errors: Vec<VorbisCommentDecodeError>,
}

impl VorbisComment {
	/// Try to decode the given data as a vorbis comment block.
	///
	/// Only a damaged header is fatal. A damaged comment is skipped,
	/// and a truncated comment list stops the read.
	pub fn decode(data: &[u8]) -> Result<Self, VorbisCommentDecodeError> {
		let r = BoundedReader::from_slice(data);
		let mut d = r.cursor(0);

		let vendor = {
			let length = d
				.read_u32_le("vendor length")
				.map_err(VorbisCommentDecodeError::MalformedHeader)?;
			d.read_string(length.into(), "vendor string")
				.map_err(VorbisCommentDecodeError::MalformedHeader)?
		};

		let n_comments = d
			.read_u32_le("comment count")
			.map_err(VorbisCommentDecodeError::MalformedHeader)?;

		let mut comments = Vec::new();
		let mut errors = Vec::new();
		for i in 0..n_comments {
			let comment = d
				.read_u32_le("comment length")
				.and_then(|length| d.read_bytes(length.into(), "comment"));

			let comment = match comment {
				Ok(x) => x,
				Err(_) => {
					errors.push(VorbisCommentDecodeError::Truncated {
						read: i,
						declared: n_comments,
					});
					break;
				}
			};

			let comment = String::from_utf8_lossy(&comment);
			match comment.split_once('=') {
				Some((var, val)) if !var.is_empty() => {
					comments.push((var.to_ascii_uppercase().into(), val.into()))
				}
				_ => errors.push(VorbisCommentDecodeError::MalformedCommentString(
					comment.into_owned(),
				)),
			}
		}

		trace!(
			message = "Decoded vorbis comment",
			vendor = vendor.as_str(),
			n_comments = comments.len(),
			n_errors = errors.len()
		);

		Ok(Self {
			vendor: vendor.into(),
			comments,
			errors,
		})
	}

	/// Get all values for `key`, which must be uppercase
	pub fn get<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.comments
			.iter()
			.filter(move |(k, _)| k.as_str() == key)
			.map(|(_, v)| v.as_str())
	}
}

/// Comments that hold pictures.
/// These are decoded as artwork and never stored as tags.
pub(crate) fn is_picture_key(key: &str) -> bool {
	matches!(key, "METADATA_BLOCK_PICTURE" | "COVERART" | "COVERARTMIME")
}

/// Map an uppercase vorbis comment key to a canonical tag
pub(crate) fn comment_tag_type(key: &str) -> TagType {
	match key {
		"TITLE" => TagType::TrackTitle,
		"ARTIST" => TagType::TrackArtist,
		"ALBUM" => TagType::Album,
		"ALBUMARTIST" | "ALBUM ARTIST" | "ALBUM_ARTIST" => TagType::AlbumArtist,
		"COMPOSER" => TagType::Composer,
		"GENRE" => TagType::Genre,
		"DATE" | "YEAR" | "ORIGINALDATE" => TagType::ReleaseDate,
		"TRACKNUMBER" => TagType::TrackNumber,
		"TRACKTOTAL" | "TOTALTRACKS" => TagType::TrackTotal,
		"DISCNUMBER" | "DISKNUMBER" => TagType::DiskNumber,
		"DISCTOTAL" | "TOTALDISCS" | "DISKTOTAL" => TagType::DiskTotal,
		"COMMENT" => TagType::Comment,
		"DESCRIPTION" => TagType::Description,
		"LYRICS" | "UNSYNCEDLYRICS" => TagType::Lyrics,
		"COPYRIGHT" => TagType::Copyright,
		"ENCODER" | "ENCODED_BY" | "ENCODEDBY" => TagType::Encoder,
		"ISRC" => TagType::Isrc,

		// Audiobook and musicbrainz keys share
		// their synonyms with ID3 and MP4 free-form tags.
		x => TagType::from_description(x),
	}
}

/// Parse a replaygain gain, like `-6.5 dB`
fn parse_gain(s: &str) -> Option<f64> {
	let s = s.trim();
	let s = s
		.strip_suffix("dB")
		.or_else(|| s.strip_suffix("db"))
		.or_else(|| s.strip_suffix("DB"))
		.unwrap_or(s);
	s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Parse a replaygain peak, which is a bare non-negative amplitude
fn parse_peak(s: &str) -> Option<f64> {
	s.trim()
		.parse::<f64>()
		.ok()
		.filter(|x| x.is_finite() && *x >= 0.0)
}

/// Store one comment in `meta`.
///
/// The raw key and value are always stored, except for pictures.
/// `offset` is the position of the comment block, used in warnings.
pub(crate) fn apply_comment(meta: &mut Metadata, key: &str, value: &str, offset: u64) {
	if is_picture_key(key) {
		return;
	}

	apply_replaygain(meta, key, value, offset);
	meta.tags.add(key, value, &comment_tag_type(key));
}

/// If `key` is an uppercase replaygain key, parse `value` into `meta.info`.
/// ID3 `TXXX` frames use the same keys.
pub(crate) fn apply_replaygain(meta: &mut Metadata, key: &str, value: &str, offset: u64) {
	let replaygain = match key {
		"REPLAYGAIN_TRACK_GAIN" | "REPLAYGAIN_ALBUM_GAIN" => Some(parse_gain(value)),
		"REPLAYGAIN_TRACK_PEAK" | "REPLAYGAIN_ALBUM_PEAK" => Some(parse_peak(value)),
		_ => None,
	};

	match replaygain {
		Some(None) => meta.warn(
			Stage::Metadata,
			offset,
			format!("could not parse {key} value `{value}`"),
		),
		Some(Some(x)) => {
			let rg = meta.info.replay_gain_mut();
			match key {
				"REPLAYGAIN_TRACK_GAIN" => rg.track_gain = Some(x),
				"REPLAYGAIN_ALBUM_GAIN" => rg.album_gain = Some(x),
				"REPLAYGAIN_TRACK_PEAK" => rg.track_peak = Some(x),
				_ => rg.album_peak = Some(x),
			}
		}
		None => {}
	}
}

/// Store every comment in `comment`, and turn its errors into warnings.
pub(crate) fn apply_comments(meta: &mut Metadata, comment: &VorbisComment, offset: u64) {
	for (k, v) in &comment.comments {
		apply_comment(meta, k, v, offset);
	}

	for e in &comment.errors {
		meta.warn(Stage::Metadata, offset, e.to_string());
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::{format::Format, model::AudioInfo};

	/// Build a vorbis comment block
	pub(crate) fn build_comment(vendor: &str, comments: &[&str]) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend((vendor.len() as u32).to_le_bytes());
		out.extend(vendor.as_bytes());
		out.extend((comments.len() as u32).to_le_bytes());
		for c in comments {
			out.extend((c.len() as u32).to_le_bytes());
			out.extend(c.as_bytes());
		}
		out
	}

	#[test]
	fn decode_basic() {
		let data = build_comment(
			"test vendor",
			&["TITLE=Song", "artist=Someone", "ARTIST=Other", "empty="],
		);
		let c = VorbisComment::decode(&data).unwrap();
		assert_eq!(c.vendor.as_str(), "test vendor");
		assert_eq!(c.comments.len(), 4);
		assert_eq!(c.get("ARTIST").collect::<Vec<_>>(), vec!["Someone", "Other"]);
		assert!(c.errors.is_empty());
	}

	#[test]
	fn truncated_list() {
		let mut data = build_comment("v", &["TITLE=Song", "ALBUM=Record"]);
		// Claim there are three comments, then cut the second one short
		data[5..9].copy_from_slice(&3u32.to_le_bytes());
		data.truncate(data.len() - 3);

		let c = VorbisComment::decode(&data).unwrap();
		assert_eq!(c.comments.len(), 1);
		assert!(matches!(
			c.errors[..],
			[VorbisCommentDecodeError::Truncated {
				read: 1,
				declared: 3
			}]
		));
	}

	#[test]
	fn bad_header() {
		assert!(matches!(
			VorbisComment::decode(&[0xFF, 0, 0, 0, b'x']),
			Err(VorbisCommentDecodeError::MalformedHeader(_))
		));
	}

	#[test]
	fn malformed_comment_is_skipped() {
		let data = build_comment("v", &["NOEQUALS", "=novalue", "TITLE=ok"]);
		let c = VorbisComment::decode(&data).unwrap();
		assert_eq!(c.comments.len(), 1);
		assert_eq!(c.errors.len(), 2);
	}

	#[test]
	fn apply_maps_keys() {
		let data = build_comment(
			"v",
			&[
				"TITLE=Song",
				"TRACKNUMBER=3/12",
				"NARRATOR=Reader",
				"MUSICBRAINZ_ALBUMID=abc",
				"REPLAYGAIN_TRACK_GAIN=-6.50 dB",
				"REPLAYGAIN_TRACK_PEAK=0.98",
				"REPLAYGAIN_ALBUM_GAIN=garbage",
				"METADATA_BLOCK_PICTURE=AAAA",
				"MOOD=calm",
			],
		);
		let c = VorbisComment::decode(&data).unwrap();
		let mut m = Metadata::new(Format::Flac, AudioInfo::new("flac", "flac"));
		apply_comments(&mut m, &c, 42);

		assert_eq!(m.tags.title.as_deref(), Some("Song"));
		assert_eq!(m.tags.track_number, Some(3));
		assert_eq!(m.tags.track_total, Some(12));
		assert_eq!(m.tags.narrator.as_deref(), Some("Reader"));
		assert_eq!(m.tags.musicbrainz_album_id.as_deref(), Some("abc"));
		assert_eq!(m.tags.raw.first("MOOD"), Some("calm"));
		assert!(!m.tags.raw.contains_key("METADATA_BLOCK_PICTURE"));

		// Everything canonical is also raw
		assert_eq!(m.tags.raw.first("TITLE"), Some("Song"));
		assert_eq!(m.tags.raw.first("REPLAYGAIN_TRACK_GAIN"), Some("-6.50 dB"));

		let rg = m.info.replay_gain.unwrap();
		assert_eq!(rg.track_gain, Some(-6.5));
		assert_eq!(rg.track_peak, Some(0.98));
		assert_eq!(rg.album_gain, None);

		assert_eq!(m.warnings.len(), 1);
		assert_eq!(m.warnings[0].offset, 42);
	}
}
