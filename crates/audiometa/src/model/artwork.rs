//! Embedded pictures

use audiometa_util::MimeType;
use serde::{Serialize, Serializer};
use std::fmt::Display;

/// What a picture is for, as defined by the ID3v2 APIC frame.
/// FLAC and Ogg `METADATA_BLOCK_PICTURE` use the same table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PictureType {
	Other = 0,
	PngFileIcon,
	OtherFileIcon,
	FrontCover,
	BackCover,
	LeafletPage,
	Media,
	LeadArtist,
	Artist,
	Conductor,
	BandOrchestra,
	Composer,
	Lyricist,
	RecLocation,
	DuringRecording,
	DuringPerformance,
	VideoScreenCapture,
	ABrightColoredFish,
	Illustration,
	ArtistLogotype,
	PublisherLogotype,
}

impl PictureType {
	/// Every picture type, indexed by its number
	const ALL: [Self; 21] = [
		Self::Other,
		Self::PngFileIcon,
		Self::OtherFileIcon,
		Self::FrontCover,
		Self::BackCover,
		Self::LeafletPage,
		Self::Media,
		Self::LeadArtist,
		Self::Artist,
		Self::Conductor,
		Self::BandOrchestra,
		Self::Composer,
		Self::Lyricist,
		Self::RecLocation,
		Self::DuringRecording,
		Self::DuringPerformance,
		Self::VideoScreenCapture,
		Self::ABrightColoredFish,
		Self::Illustration,
		Self::ArtistLogotype,
		Self::PublisherLogotype,
	];

	/// Decode a picture type from the given integer.
	/// Indices outside the table are [`PictureType::Other`].
	pub fn from_idx(idx: u32) -> Self {
		usize::try_from(idx)
			.ok()
			.and_then(|i| Self::ALL.get(i))
			.copied()
			.unwrap_or(Self::Other)
	}

	/// Return the index of this picture type
	pub fn to_idx(&self) -> u32 {
		*self as u32
	}

	/// A short, filename-safe name for this picture type
	pub fn name(&self) -> &'static str {
		match self {
			Self::Other => "other",
			Self::PngFileIcon => "icon",
			Self::OtherFileIcon => "other-icon",
			Self::FrontCover => "front-cover",
			Self::BackCover => "back-cover",
			Self::LeafletPage => "leaflet",
			Self::Media => "media",
			Self::LeadArtist => "lead-artist",
			Self::Artist => "artist",
			Self::Conductor => "conductor",
			Self::BandOrchestra => "band",
			Self::Composer => "composer",
			Self::Lyricist => "lyricist",
			Self::RecLocation => "recording-location",
			Self::DuringRecording => "during-recording",
			Self::DuringPerformance => "during-performance",
			Self::VideoScreenCapture => "screen-capture",
			Self::ABrightColoredFish => "fish",
			Self::Illustration => "illustration",
			Self::ArtistLogotype => "artist-logo",
			Self::PublisherLogotype => "publisher-logo",
		}
	}
}

impl Display for PictureType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.name())
	}
}

impl Serialize for PictureType {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.name())
	}
}

/// An embedded picture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artwork {
	pub picture_type: PictureType,

	pub mime: MimeType,

	pub description: String,

	/// In pixels. Zero if unknown.
	pub width: u32,
	/// In pixels. Zero if unknown.
	pub height: u32,

	#[serde(skip)]
	pub data: Vec<u8>,
}

impl Artwork {
	/// The number of image bytes
	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idx_round_trip() {
		for i in 0..=20 {
			assert_eq!(PictureType::from_idx(i).to_idx(), i);
		}
		assert_eq!(PictureType::from_idx(3), PictureType::FrontCover);
		assert_eq!(PictureType::from_idx(4), PictureType::BackCover);
		assert_eq!(PictureType::from_idx(21), PictureType::Other);
		assert_eq!(PictureType::from_idx(u32::MAX), PictureType::Other);
	}
}
