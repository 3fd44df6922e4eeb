//! Cross-format normalized tag types

use serde_with::{DeserializeFromStr, SerializeDisplay};
use smartstring::{LazyCompact, SmartString};
use std::{fmt::Display, str::FromStr};

/// A canonical tag field.
///
/// Every format maps its own keys onto these.
/// Keys we don't recognize become [`TagType::Other`].
#[derive(Debug, Hash, PartialEq, Eq, Clone, DeserializeFromStr, SerializeDisplay)]
pub enum TagType {
	/// A tag we didn't recognize
	Other(SmartString<LazyCompact>),

	/// The title of this track
	TrackTitle,
	/// This track's artist (the usual `Artist`,
	/// compare to `AlbumArtist`)
	TrackArtist,
	/// Album name
	Album,
	/// Album artist
	AlbumArtist,
	Composer,
	Genre,
	/// Release date. Also sets `Year` if it starts with a plausible year.
	ReleaseDate,
	/// This track's number in its album.
	/// May be `N` or `N/Total`.
	TrackNumber,
	/// The total number of tracks in this track's album
	TrackTotal,
	/// May be `N` or `N/Total`.
	DiskNumber,
	/// Total disks in album
	DiskTotal,
	Comment,
	Description,
	/// Track lyrics, possibly time-coded
	Lyrics,

	// Audiobooks
	Narrator,
	Series,
	SeriesPart,
	Publisher,
	Isbn,
	Asin,
	Language,

	Copyright,
	Encoder,
	/// International standard recording code
	Isrc,

	MusicBrainzTrackId,
	MusicBrainzAlbumId,
	MusicBrainzArtistId,
	MusicBrainzAlbumArtistId,
	MusicBrainzReleaseGroupId,
}

impl Display for TagType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", Into::<&str>::into(self))
	}
}

// This is a "user-facing" string.
// File format code should use format-specific strings.
impl<'b, 'a: 'b> From<&'a TagType> for &'b str {
	fn from(value: &'a TagType) -> Self {
		match value {
			// This must match `From<&str>` below
			TagType::TrackTitle => "Title",
			TagType::TrackArtist => "Artist",
			TagType::Album => "Album",
			TagType::AlbumArtist => "AlbumArtist",
			TagType::Composer => "Composer",
			TagType::Genre => "Genre",
			TagType::ReleaseDate => "ReleaseDate",
			TagType::TrackNumber => "TrackNumber",
			TagType::TrackTotal => "TrackTotal",
			TagType::DiskNumber => "DiskNumber",
			TagType::DiskTotal => "DiskTotal",
			TagType::Comment => "Comment",
			TagType::Description => "Description",
			TagType::Lyrics => "Lyrics",
			TagType::Narrator => "Narrator",
			TagType::Series => "Series",
			TagType::SeriesPart => "SeriesPart",
			TagType::Publisher => "Publisher",
			TagType::Isbn => "ISBN",
			TagType::Asin => "ASIN",
			TagType::Language => "Language",
			TagType::Copyright => "Copyright",
			TagType::Encoder => "Encoder",
			TagType::Isrc => "ISRC",
			TagType::MusicBrainzTrackId => "MusicBrainzTrackId",
			TagType::MusicBrainzAlbumId => "MusicBrainzAlbumId",
			TagType::MusicBrainzArtistId => "MusicBrainzArtistId",
			TagType::MusicBrainzAlbumArtistId => "MusicBrainzAlbumArtistId",
			TagType::MusicBrainzReleaseGroupId => "MusicBrainzReleaseGroupId",
			TagType::Other(x) => x,
		}
	}
}

impl From<&str> for TagType {
	fn from(s: &str) -> Self {
		// This must match `From<&_>` above
		match s {
			"Title" => Self::TrackTitle,
			"Artist" => Self::TrackArtist,
			"Album" => Self::Album,
			"AlbumArtist" => Self::AlbumArtist,
			"Composer" => Self::Composer,
			"Genre" => Self::Genre,
			"ReleaseDate" => Self::ReleaseDate,
			"TrackNumber" => Self::TrackNumber,
			"TrackTotal" => Self::TrackTotal,
			"DiskNumber" => Self::DiskNumber,
			"DiskTotal" => Self::DiskTotal,
			"Comment" => Self::Comment,
			"Description" => Self::Description,
			"Lyrics" => Self::Lyrics,
			"Narrator" => Self::Narrator,
			"Series" => Self::Series,
			"SeriesPart" => Self::SeriesPart,
			"Publisher" => Self::Publisher,
			"ISBN" => Self::Isbn,
			"ASIN" => Self::Asin,
			"Language" => Self::Language,
			"Copyright" => Self::Copyright,
			"Encoder" => Self::Encoder,
			"ISRC" => Self::Isrc,
			"MusicBrainzTrackId" => Self::MusicBrainzTrackId,
			"MusicBrainzAlbumId" => Self::MusicBrainzAlbumId,
			"MusicBrainzArtistId" => Self::MusicBrainzArtistId,
			"MusicBrainzAlbumArtistId" => Self::MusicBrainzAlbumArtistId,
			"MusicBrainzReleaseGroupId" => Self::MusicBrainzReleaseGroupId,
			x => Self::Other(x.into()),
		}
	}
}

impl FromStr for TagType {
	type Err = std::convert::Infallible;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::from(s))
	}
}

impl TagType {
	/// Map a free-form description (an ID3 `TXXX` description or an MP4
	/// freeform name) onto a canonical field. Matching ignores case,
	/// spaces, dashes and underscores.
	pub fn from_description(desc: &str) -> Self {
		let norm: String = desc
			.chars()
			.filter(|c| !matches!(c, ' ' | '-' | '_' | '.'))
			.map(|c| c.to_ascii_uppercase())
			.collect();

		match &norm[..] {
			"NARRATOR" | "NARRATEDBY" | "READER" | "READBY" => Self::Narrator,
			"SERIES" | "SERIESNAME" | "SERIESTITLE" => Self::Series,
			"SERIESPART" | "SERIESPOSITION" | "SERIESINDEX" | "SERIESNUMBER" | "PART" => {
				Self::SeriesPart
			}
			"PUBLISHER" | "LABEL" | "ORGANIZATION" => Self::Publisher,
			"ISBN" => Self::Isbn,
			"ASIN" | "AUDIBLEASIN" => Self::Asin,
			"LANGUAGE" | "LANG" => Self::Language,
			"MUSICBRAINZTRACKID" | "MUSICBRAINZRELEASETRACKID" => Self::MusicBrainzTrackId,
			"MUSICBRAINZALBUMID" => Self::MusicBrainzAlbumId,
			"MUSICBRAINZARTISTID" => Self::MusicBrainzArtistId,
			"MUSICBRAINZALBUMARTISTID" => Self::MusicBrainzAlbumArtistId,
			"MUSICBRAINZRELEASEGROUPID" => Self::MusicBrainzReleaseGroupId,
			_ => Self::Other(desc.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_round_trips() {
		for t in [
			TagType::TrackTitle,
			TagType::Narrator,
			TagType::Isbn,
			TagType::MusicBrainzReleaseGroupId,
			TagType::Other("CUSTOM".into()),
		] {
			assert_eq!(TagType::from(t.to_string().as_str()), t);
		}
	}

	#[test]
	fn description_synonyms() {
		assert_eq!(TagType::from_description("narrator"), TagType::Narrator);
		assert_eq!(TagType::from_description("Narrated By"), TagType::Narrator);
		assert_eq!(TagType::from_description("series-part"), TagType::SeriesPart);
		assert_eq!(TagType::from_description("SERIES_POSITION"), TagType::SeriesPart);
		assert_eq!(TagType::from_description("Audible_ASIN"), TagType::Asin);
		assert_eq!(
			TagType::from_description("MusicBrainz Album Id"),
			TagType::MusicBrainzAlbumId
		);
		assert_eq!(
			TagType::from_description("Mood"),
			TagType::Other("Mood".into())
		);
	}
}
