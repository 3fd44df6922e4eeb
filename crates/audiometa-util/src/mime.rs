use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use tracing::trace;

/// A media type, conveniently parsed
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, Clone, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum MimeType {
	/// A mimetype we didn't recognize
	Other(String),

	/// An unstructured binary blob
	/// Use this whenever a mime type is unknown
	Blob,

	// Images
	Png,
	Jpg,
	Gif,
	Bmp,
	Webp,

	// Audio
	Flac,
	Mp3,
	Ogg,
	Opus,
	Mp4Audio,
	Wav,
	Aiff,
}

impl FromStr for MimeType {
	// Must match `display` below, but may provide other alternatives.

	type Err = std::convert::Infallible;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match &s.trim().to_ascii_lowercase()[..] {
			"application/octet-stream" => Self::Blob,
			"image/png" | "png" => Self::Png,
			"image/jpg" | "image/jpeg" | "jpg" | "jpeg" => Self::Jpg,
			"image/gif" => Self::Gif,
			"image/bmp" => Self::Bmp,
			"image/webp" => Self::Webp,
			"audio/flac" => Self::Flac,
			"audio/mpeg" | "audio/mp3" => Self::Mp3,
			"audio/ogg" => Self::Ogg,
			"audio/opus" => Self::Opus,
			"audio/mp4" | "audio/x-m4a" | "audio/x-m4b" => Self::Mp4Audio,
			"audio/wav" | "audio/x-wav" | "audio/vnd.wave" => Self::Wav,
			"audio/aiff" | "audio/x-aiff" => Self::Aiff,
			_ => {
				trace!(message = "Encountered unknown mimetype", mime_string = s);
				Self::Other(s.into())
			}
		})
	}
}

impl Display for MimeType {
	/// Get a string representation of this mimetype.
	///
	/// The following always holds
	/// ```notrust
	/// // x: MimeType
	/// MimeType::from(x.to_string()) == x
	/// ```
	///
	/// The following might not hold:
	/// ```notrust
	/// // y: &str
	/// MimeType::from(y).to_string() == y
	/// ```
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Blob => write!(f, "application/octet-stream"),

			Self::Png => write!(f, "image/png"),
			Self::Jpg => write!(f, "image/jpeg"),
			Self::Gif => write!(f, "image/gif"),
			Self::Bmp => write!(f, "image/bmp"),
			Self::Webp => write!(f, "image/webp"),

			Self::Flac => write!(f, "audio/flac"),
			Self::Mp3 => write!(f, "audio/mpeg"),
			Self::Ogg => write!(f, "audio/ogg"),
			Self::Opus => write!(f, "audio/opus"),
			Self::Mp4Audio => write!(f, "audio/mp4"),
			Self::Wav => write!(f, "audio/wav"),
			Self::Aiff => write!(f, "audio/aiff"),
			Self::Other(x) => write!(f, "{}", x),
		}
	}
}

impl From<String> for MimeType {
	fn from(value: String) -> Self {
		match Self::from_str(&value) {
			Ok(x) => x,
			Err(never) => match never {},
		}
	}
}

impl From<&str> for MimeType {
	fn from(value: &str) -> Self {
		match Self::from_str(value) {
			Ok(x) => x,
			Err(never) => match never {},
		}
	}
}

impl MimeType {
	/// Guess an image's type from its leading bytes.
	/// Returns `None` if we don't recognize the signature.
	pub fn sniff_image(data: &[u8]) -> Option<Self> {
		if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
			return Some(Self::Jpg);
		}

		if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
			return Some(Self::Png);
		}

		if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
			return Some(Self::Gif);
		}

		if data.starts_with(b"BM") && data.len() > 14 {
			return Some(Self::Bmp);
		}

		if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
			return Some(Self::Webp);
		}

		return None;
	}

	/// Get the extension we use for files with this type.
	/// Includes a dot. Might be the empty string.
	pub fn extension(&self) -> &str {
		match self {
			Self::Blob => "",
			Self::Other(_) => "",

			Self::Flac => ".flac",
			Self::Mp3 => ".mp3",
			Self::Ogg => ".ogg",
			Self::Opus => ".opus",
			Self::Mp4Audio => ".m4a",
			Self::Wav => ".wav",
			Self::Aiff => ".aiff",
			Self::Jpg => ".jpg",
			Self::Png => ".png",
			Self::Gif => ".gif",
			Self::Bmp => ".bmp",
			Self::Webp => ".webp",
		}
	}

	/// Is this an image type?
	pub fn is_image(&self) -> bool {
		matches!(
			self,
			Self::Png | Self::Jpg | Self::Gif | Self::Bmp | Self::Webp
		)
	}
}
