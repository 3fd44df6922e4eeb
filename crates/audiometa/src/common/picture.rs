//! The FLAC picture layout.
//!
//! This is used by FLAC `PICTURE` blocks, and base64-encoded
//! in `METADATA_BLOCK_PICTURE` vorbis comments.

use audiometa_util::MimeType;
use base64::Engine;
use std::fmt::Debug;
use thiserror::Error;

use super::imagesniff::image_dimensions;
use crate::{
	model::{Artwork, PictureType},
	reader::{BoundedReader, ReadError},
};

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum PictureDecodeError {
	/// A field ran past the end of the picture
	#[error("picture data is truncated")]
	Truncated(#[from] ReadError),

	/// The picture's data is a URL, not an image
	#[error("linked pictures are not supported")]
	Linked,

	#[error("picture has no image data")]
	Empty,

	#[error("could not decode base64 picture")]
	Base64(#[from] base64::DecodeError),
}

/// A decoded picture block
pub struct FlacPicture {
	/// The type of this picture
	pub picture_type: PictureType,

	/// The format of this picture, as declared
	pub mime: MimeType,

	/// The description of this picture
	pub description: String,

	/// The width of this picture, in px
	pub width: u32,

	/// The height of this picture, in px
	pub height: u32,

	/// The bit depth of this picture
	pub bit_depth: u32,

	/// The color count of this picture (if indexed)
	pub color_count: u32,

	/// The image data
	pub img_data: Vec<u8>,
}

impl Debug for FlacPicture {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlacPicture")
			.field("type", &self.picture_type)
			.field("mime", &self.mime)
			.field("width", &self.width)
			.field("height", &self.height)
			.field("len", &self.img_data.len())
			.finish()
	}
}

impl FlacPicture {
	/// Try to decode the given data as a picture block
	pub fn decode(data: &[u8]) -> Result<Self, PictureDecodeError> {
		let r = BoundedReader::from_slice(data);
		let mut d = r.chain(0);

		let picture_type = PictureType::from_idx(d.u32_be("picture type"));

		let mime_len = d.u32_be("mime length");
		let mime = d.bytes(mime_len.into(), "mime type");

		let desc_len = d.u32_be("description length");
		let description = d.bytes(desc_len.into(), "description");

		let width = d.u32_be("width");
		let height = d.u32_be("height");
		let bit_depth = d.u32_be("bit depth");
		let color_count = d.u32_be("color count");

		let data_len = d.u32_be("image length");
		let img_data = d.bytes(data_len.into(), "image data");
		d.finish()?;

		let mime = String::from_utf8_lossy(&mime);
		if mime == "-->" {
			return Err(PictureDecodeError::Linked);
		}

		if img_data.is_empty() {
			return Err(PictureDecodeError::Empty);
		}

		Ok(Self {
			picture_type,
			mime: MimeType::from(mime.as_ref()),
			description: String::from_utf8_lossy(&description).into_owned(),
			width,
			height,
			bit_depth,
			color_count,
			img_data,
		})
	}

	/// Decode a base64 picture, as found in a `METADATA_BLOCK_PICTURE` comment
	pub fn decode_base64(value: &str) -> Result<Self, PictureDecodeError> {
		let data = base64::prelude::BASE64_STANDARD.decode(value.trim())?;
		return Self::decode(&data);
	}

	/// Convert this block to an [`Artwork`].
	/// Missing MIME types and dimensions are sniffed from the image.
	pub fn into_artwork(self) -> Artwork {
		let mut art = Artwork {
			picture_type: self.picture_type,
			mime: self.mime,
			description: self.description,
			width: self.width,
			height: self.height,
			data: self.img_data,
		};
		fill_from_image(&mut art);
		return art;
	}
}

/// Fill in an artwork's MIME type and size from its image data,
/// if they aren't already known.
pub(crate) fn fill_from_image(art: &mut Artwork) {
	if !art.mime.is_image() {
		if let Some(m) = MimeType::sniff_image(&art.data) {
			art.mime = m;
		}
	}

	if art.width == 0 || art.height == 0 {
		if let Some((w, h)) = image_dimensions(&art.data) {
			art.width = w;
			art.height = h;
		}
	}
}

/// Make an artwork from a bare image
pub(crate) fn artwork_from_image(
	picture_type: PictureType,
	mime: Option<MimeType>,
	description: String,
	data: Vec<u8>,
) -> Artwork {
	let mut art = Artwork {
		picture_type,
		mime: mime.unwrap_or(MimeType::Blob),
		description,
		width: 0,
		height: 0,
		data,
	};
	fill_from_image(&mut art);
	return art;
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::common::imagesniff::tests::png;

	/// Build a picture block
	pub(crate) fn build_picture(kind: u32, mime: &str, desc: &str, w: u32, h: u32, img: &[u8]) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend(kind.to_be_bytes());
		out.extend((mime.len() as u32).to_be_bytes());
		out.extend(mime.as_bytes());
		out.extend((desc.len() as u32).to_be_bytes());
		out.extend(desc.as_bytes());
		out.extend(w.to_be_bytes());
		out.extend(h.to_be_bytes());
		out.extend(24u32.to_be_bytes());
		out.extend(0u32.to_be_bytes());
		out.extend((img.len() as u32).to_be_bytes());
		out.extend(img);
		out
	}

	#[test]
	fn decode_declared() {
		let data = build_picture(3, "image/png", "cover", 500, 500, &png(16, 16));
		let p = FlacPicture::decode(&data).unwrap();
		assert_eq!(p.picture_type, PictureType::FrontCover);
		assert_eq!(p.mime, MimeType::Png);
		assert_eq!(p.description, "cover");

		// Declared size wins
		let a = p.into_artwork();
		assert_eq!((a.width, a.height), (500, 500));
	}

	#[test]
	fn sniff_missing_fields() {
		let data = build_picture(4, "", "", 0, 0, &png(16, 9));
		let a = FlacPicture::decode(&data).unwrap().into_artwork();
		assert_eq!(a.picture_type, PictureType::BackCover);
		assert_eq!(a.mime, MimeType::Png);
		assert_eq!((a.width, a.height), (16, 9));
	}

	#[test]
	fn truncated() {
		let data = build_picture(3, "image/png", "", 0, 0, &png(16, 16));
		assert!(matches!(
			FlacPicture::decode(&data[..data.len() - 1]),
			Err(PictureDecodeError::Truncated(_))
		));
	}

	#[test]
	fn linked_and_base64() {
		let data = build_picture(3, "-->", "", 0, 0, b"http://example.com/a.png");
		assert!(matches!(
			FlacPicture::decode(&data),
			Err(PictureDecodeError::Linked)
		));

		let data = build_picture(0, "image/png", "", 0, 0, &png(2, 3));
		let encoded = base64::prelude::BASE64_STANDARD.encode(&data);
		let p = FlacPicture::decode_base64(&encoded).unwrap();
		assert_eq!(p.picture_type, PictureType::Other);

		assert!(matches!(
			FlacPicture::decode_base64("not base64!"),
			Err(PictureDecodeError::Base64(_))
		));
	}
}
