//! iTunes-style metadata items (`moov/udta/meta/ilst`)

use audiometa_util::MimeType;
use smartstring::{LazyCompact, SmartString};

use super::atoms::{Atom, AtomError};
use crate::{
	common::picture::artwork_from_image,
	model::{Artwork, PictureType, TagType},
	mp3::text::TextEncoding,
	reader::BoundedReader,
};

// Well-known data types
pub const DATA_IMPLICIT: u32 = 0;
pub const DATA_UTF8: u32 = 1;
pub const DATA_UTF16: u32 = 2;
pub const DATA_JPEG: u32 = 13;
pub const DATA_PNG: u32 = 14;
pub const DATA_SIGNED: u32 = 21;
pub const DATA_UNSIGNED: u32 = 22;
pub const DATA_BMP: u32 = 27;

/// One `data` atom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValue {
	pub data_type: u32,
	pub value: Vec<u8>,
}

/// An `ilst` item and its values
#[derive(Debug, Clone)]
pub struct IlstItem {
	pub atom: Atom,

	/// `mean` and `name`, for `----` items
	pub freeform: Option<(String, String)>,
	pub values: Vec<DataValue>,
}

impl IlstItem {
	pub fn read(reader: BoundedReader<'_>, atom: Atom) -> Result<Self, AtomError> {
		let malformed = |a: &Atom, reason| AtomError::Malformed {
			name: a.name(),
			offset: a.offset,
			reason,
		};

		let mut mean = None;
		let mut name = None;
		let mut values = Vec::new();

		for child in atom.children(reader, 0) {
			let child = child?;
			let data = child.data(reader)?;
			match &child.kind {
				b"data" => {
					if data.len() < 8 {
						return Err(malformed(&child, "data atom is too short"));
					}
					// The first byte is a version
					let data_type = u32::from_be_bytes([0, data[1], data[2], data[3]]);
					values.push(DataValue {
						data_type,
						value: data[8..].to_vec(),
					});
				}

				b"mean" | b"name" => {
					// Skip version and flags
					let s = String::from_utf8_lossy(data.get(4..).unwrap_or_default()).into_owned();
					if &child.kind == b"mean" {
						mean = Some(s);
					} else {
						name = Some(s);
					}
				}

				_ => {}
			}
		}

		let freeform = if &atom.kind == b"----" {
			match (mean, name) {
				(Some(m), Some(n)) => Some((m, n)),
				_ => return Err(malformed(&atom, "freeform item without mean and name")),
			}
		} else {
			None
		};

		return Ok(Self {
			atom,
			freeform,
			values,
		});
	}

	/// The key we store this item under
	pub fn key(&self) -> SmartString<LazyCompact> {
		match &self.freeform {
			Some((mean, name)) => format!("----:{mean}:{name}").into(),
			None => self.atom.name(),
		}
	}

	pub fn tag_type(&self) -> TagType {
		if let Some((_, name)) = &self.freeform {
			return TagType::from_description(name);
		}

		match &self.atom.kind {
			b"\xa9nam" => TagType::TrackTitle,
			b"\xa9ART" => TagType::TrackArtist,
			b"aART" => TagType::AlbumArtist,
			b"\xa9alb" => TagType::Album,
			b"\xa9wrt" => TagType::Composer,
			b"\xa9gen" => TagType::Genre,
			b"\xa9day" => TagType::ReleaseDate,
			b"trkn" => TagType::TrackNumber,
			b"disk" => TagType::DiskNumber,
			b"\xa9cmt" => TagType::Comment,
			b"desc" | b"ldes" => TagType::Description,
			b"\xa9lyr" => TagType::Lyrics,
			b"\xa9too" => TagType::Encoder,
			b"cprt" => TagType::Copyright,
			b"\xa9nrt" => TagType::Narrator,
			b"tvsh" => TagType::Series,
			b"tves" => TagType::SeriesPart,
			b"\xa9pub" => TagType::Publisher,
			_ => TagType::Other(self.key()),
		}
	}

	/// This item's values as text.
	/// Images and values we can't read are skipped.
	pub fn strings(&self) -> Vec<String> {
		self.values
			.iter()
			.filter_map(|v| self.value_string(v))
			.collect()
	}

	fn value_string(&self, v: &DataValue) -> Option<String> {
		// Track and disk numbers are binary: pad, number, total
		if matches!(&self.atom.kind, b"trkn" | b"disk") && v.data_type == DATA_IMPLICIT {
			let n = u16::from_be_bytes([*v.value.get(2)?, *v.value.get(3)?]);
			let total = match (v.value.get(4), v.value.get(5)) {
				(Some(a), Some(b)) => u16::from_be_bytes([*a, *b]),
				_ => 0,
			};

			if total == 0 {
				return Some(n.to_string());
			} else {
				return Some(format!("{n}/{total}"));
			}
		}

		match v.data_type {
			DATA_UTF8 => Some(String::from_utf8_lossy(&v.value).into_owned()),
			DATA_UTF16 => Some(TextEncoding::Utf16Be.decode(&v.value)),
			DATA_SIGNED => be_int(&v.value, true),
			DATA_UNSIGNED => be_int(&v.value, false),
			DATA_IMPLICIT => be_int(&v.value, false)
				.or_else(|| Some(String::from_utf8_lossy(&v.value).into_owned())),
			_ => None,
		}
	}

	/// Decode a `covr` item
	pub fn artwork(&self) -> Vec<Artwork> {
		self.values
			.iter()
			.filter(|v| !v.value.is_empty())
			.map(|v| {
				let mime = match v.data_type {
					DATA_JPEG => Some(MimeType::Jpg),
					DATA_PNG => Some(MimeType::Png),
					DATA_BMP => Some(MimeType::Bmp),
					_ => None,
				};
				artwork_from_image(PictureType::FrontCover, mime, String::new(), v.value.clone())
			})
			.collect()
	}
}

/// Read a big-endian integer of 1, 2, 4 or 8 bytes
fn be_int(data: &[u8], signed: bool) -> Option<String> {
	let s = match (data, signed) {
		([a], false) => a.to_string(),
		([a], true) => (*a as i8).to_string(),
		([a, b], false) => u16::from_be_bytes([*a, *b]).to_string(),
		([a, b], true) => i16::from_be_bytes([*a, *b]).to_string(),
		([a, b, c, d], false) => u32::from_be_bytes([*a, *b, *c, *d]).to_string(),
		([a, b, c, d], true) => i32::from_be_bytes([*a, *b, *c, *d]).to_string(),
		(x, false) if x.len() == 8 => {
			u64::from_be_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]]).to_string()
		}
		(x, true) if x.len() == 8 => {
			i64::from_be_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]]).to_string()
		}
		_ => return None,
	};
	return Some(s);
}
