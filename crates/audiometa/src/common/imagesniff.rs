//! Find image dimensions without decoding the image

use audiometa_util::MimeType;

/// Find the width and height of an image, in pixels.
/// Returns `None` if we don't know this format or the header is damaged.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
	match MimeType::sniff_image(data)? {
		MimeType::Jpg => jpeg_dimensions(data),
		MimeType::Png => png_dimensions(data),
		MimeType::Gif => gif_dimensions(data),
		_ => None,
	}
}

/// Read the IHDR chunk, which must come first
fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
	// 8 byte signature, 4 byte length, "IHDR", then width and height
	if data.get(12..16)? != b"IHDR" {
		return None;
	}

	let w = u32::from_be_bytes(data.get(16..20)?.try_into().ok()?);
	let h = u32::from_be_bytes(data.get(20..24)?.try_into().ok()?);
	return Some((w, h));
}

fn gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
	let w = u16::from_le_bytes(data.get(6..8)?.try_into().ok()?);
	let h = u16::from_le_bytes(data.get(8..10)?.try_into().ok()?);
	return Some((w.into(), h.into()));
}

/// Walk JPEG segments until we find a start-of-frame marker
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
	// Skip SOI
	let mut i = 2;

	loop {
		// Markers may be preceded by any number of fill bytes
		while *data.get(i)? == 0xFF && *data.get(i + 1)? == 0xFF {
			i += 1;
		}

		if *data.get(i)? != 0xFF {
			return None;
		}
		let marker = *data.get(i + 1)?;
		i += 2;

		match marker {
			// Standalone markers have no length
			0x01 | 0xD0..=0xD7 => continue,

			// End of image, start of scan: no frame header found
			0xD9 | 0xDA => return None,

			// SOF0-SOF15, except DHT (C4), JPG (C8) and DAC (CC)
			0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
				// length (2), precision (1), height (2), width (2)
				let h = u16::from_be_bytes(data.get(i + 3..i + 5)?.try_into().ok()?);
				let w = u16::from_be_bytes(data.get(i + 5..i + 7)?.try_into().ok()?);
				return Some((w.into(), h.into()));
			}

			_ => {
				let len = u16::from_be_bytes(data.get(i..i + 2)?.try_into().ok()?);
				if len < 2 {
					return None;
				}
				i += usize::from(len);
			}
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// A PNG header with the given size
	pub(crate) fn png(w: u32, h: u32) -> Vec<u8> {
		let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
		out.extend(13u32.to_be_bytes());
		out.extend(b"IHDR");
		out.extend(w.to_be_bytes());
		out.extend(h.to_be_bytes());
		out.extend([8, 6, 0, 0, 0]);
		out.extend([0, 0, 0, 0]); // crc
		out
	}

	/// A JPEG with an APP0 segment, then SOF0 with the given size
	pub(crate) fn jpeg(w: u16, h: u16) -> Vec<u8> {
		let mut out = vec![0xFF, 0xD8];
		out.extend([0xFF, 0xE0, 0x00, 0x10]);
		out.extend(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
		out.extend([0xFF, 0xC0, 0x00, 0x11, 0x08]);
		out.extend(h.to_be_bytes());
		out.extend(w.to_be_bytes());
		out.extend([0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
		out.extend([0xFF, 0xD9]);
		out
	}

	#[test]
	fn sniff_png() {
		assert_eq!(image_dimensions(&png(640, 480)), Some((640, 480)));
		assert_eq!(image_dimensions(&png(640, 480)[..20]), None);
	}

	#[test]
	fn sniff_jpeg() {
		assert_eq!(image_dimensions(&jpeg(1200, 800)), Some((1200, 800)));

		// Truncated before the frame header
		assert_eq!(image_dimensions(&jpeg(1200, 800)[..10]), None);

		// No frame header at all
		assert_eq!(image_dimensions(&[0xFF, 0xD8, 0xFF, 0xD9]), None);
	}

	#[test]
	fn sniff_gif() {
		let mut g = b"GIF89a".to_vec();
		g.extend(320u16.to_le_bytes());
		g.extend(200u16.to_le_bytes());
		assert_eq!(image_dimensions(&g), Some((320, 200)));
	}

	#[test]
	fn unknown() {
		assert_eq!(image_dimensions(b"not an image"), None);
	}
}
