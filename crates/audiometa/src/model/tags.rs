use itertools::Itertools;
use serde::{ser::SerializeMap, Serialize, Serializer};
use smartstring::{LazyCompact, SmartString};

use super::tagtype::TagType;

/// Every tag we found, keyed by the format's own key.
///
/// Keys keep the order we first saw them in.
/// Values under one key keep the order they appeared in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
	entries: Vec<(SmartString<LazyCompact>, Vec<String>)>,
}

impl RawTags {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a value under `key`
	pub fn push(&mut self, key: &str, value: impl Into<String>) {
		let value = value.into();
		match self.entries.iter_mut().find(|(k, _)| k.as_str() == key) {
			Some((_, values)) => values.push(value),
			None => self.entries.push((key.into(), vec![value])),
		}
	}

	/// All values stored under `key`
	pub fn get(&self, key: &str) -> Option<&[String]> {
		self.entries
			.iter()
			.find(|(k, _)| k.as_str() == key)
			.map(|(_, v)| &v[..])
	}

	/// The first value stored under `key`
	pub fn first(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(|v| v.first()).map(|x| x.as_str())
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Iterate over (key, values), in insertion order
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.entries.iter().map(|(k, v)| (k.as_str(), &v[..]))
	}

	/// The number of distinct keys
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl Serialize for RawTags {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;
		for (k, v) in &self.entries {
			map.serialize_entry(k.as_str(), v)?;
		}
		map.end()
	}
}

/// Format-independent tags.
///
/// The canonical fields hold the first value we saw for each field.
/// Everything we read, recognized or not, is also kept in `raw`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tags {
	pub title: Option<String>,
	pub artist: Option<String>,
	pub album: Option<String>,
	pub album_artist: Option<String>,
	pub composer: Option<String>,
	pub genre: Option<String>,

	/// The full release date, as written in the file
	pub date: Option<String>,
	/// A four-digit year between 1900 and 2100
	pub year: Option<u32>,

	pub track_number: Option<u32>,
	pub track_total: Option<u32>,
	pub disc_number: Option<u32>,
	pub disc_total: Option<u32>,

	pub comment: Option<String>,
	pub description: Option<String>,
	pub lyrics: Option<String>,

	pub narrator: Option<String>,
	pub series: Option<String>,
	pub series_part: Option<String>,
	pub publisher: Option<String>,
	pub isbn: Option<String>,
	pub asin: Option<String>,
	pub language: Option<String>,

	pub copyright: Option<String>,
	pub encoder: Option<String>,
	pub isrc: Option<String>,

	pub musicbrainz_track_id: Option<String>,
	pub musicbrainz_album_id: Option<String>,
	pub musicbrainz_artist_id: Option<String>,
	pub musicbrainz_album_artist_id: Option<String>,
	pub musicbrainz_release_group_id: Option<String>,

	pub raw: RawTags,
}

fn set_once(field: &mut Option<String>, value: &str) {
	if field.is_none() && !value.is_empty() {
		*field = Some(value.into());
	}
}

fn set_once_num(field: &mut Option<u32>, value: Option<u32>) {
	if field.is_none() {
		*field = value;
	}
}

impl Tags {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a tag.
	///
	/// `raw_key` is the format's own key, and is always stored.
	/// If `tag` is a canonical field that isn't set yet, it is set too.
	pub fn add(&mut self, raw_key: &str, value: &str, tag: &TagType) {
		self.raw.push(raw_key, value);
		self.set(tag, value);
	}

	/// Set a canonical field without touching `raw`.
	/// Fields that are already set are not overwritten.
	pub(crate) fn set(&mut self, tag: &TagType, value: &str) {
		let value = value.trim_matches(char::from(0)).trim();

		match tag {
			TagType::Other(_) => {}
			TagType::TrackTitle => set_once(&mut self.title, value),
			TagType::TrackArtist => set_once(&mut self.artist, value),
			TagType::Album => set_once(&mut self.album, value),
			TagType::AlbumArtist => set_once(&mut self.album_artist, value),
			TagType::Composer => set_once(&mut self.composer, value),
			TagType::Genre => set_once(&mut self.genre, value),
			TagType::ReleaseDate => {
				set_once(&mut self.date, value);
				set_once_num(&mut self.year, parse_year(value));
			}
			TagType::TrackNumber => {
				let (n, total) = parse_number_pair(value);
				set_once_num(&mut self.track_number, n);
				set_once_num(&mut self.track_total, total);
			}
			TagType::TrackTotal => set_once_num(&mut self.track_total, parse_number(value)),
			TagType::DiskNumber => {
				let (n, total) = parse_number_pair(value);
				set_once_num(&mut self.disc_number, n);
				set_once_num(&mut self.disc_total, total);
			}
			TagType::DiskTotal => set_once_num(&mut self.disc_total, parse_number(value)),
			TagType::Comment => set_once(&mut self.comment, value),
			TagType::Description => set_once(&mut self.description, value),
			TagType::Lyrics => set_once(&mut self.lyrics, value),
			TagType::Narrator => set_once(&mut self.narrator, value),
			TagType::Series => set_once(&mut self.series, value),
			TagType::SeriesPart => set_once(&mut self.series_part, value),
			TagType::Publisher => set_once(&mut self.publisher, value),
			TagType::Isbn => set_once(&mut self.isbn, value),
			TagType::Asin => set_once(&mut self.asin, value),
			TagType::Language => set_once(&mut self.language, value),
			TagType::Copyright => set_once(&mut self.copyright, value),
			TagType::Encoder => set_once(&mut self.encoder, value),
			TagType::Isrc => set_once(&mut self.isrc, value),
			TagType::MusicBrainzTrackId => set_once(&mut self.musicbrainz_track_id, value),
			TagType::MusicBrainzAlbumId => set_once(&mut self.musicbrainz_album_id, value),
			TagType::MusicBrainzArtistId => set_once(&mut self.musicbrainz_artist_id, value),
			TagType::MusicBrainzAlbumArtistId => {
				set_once(&mut self.musicbrainz_album_artist_id, value)
			}
			TagType::MusicBrainzReleaseGroupId => {
				set_once(&mut self.musicbrainz_release_group_id, value)
			}
		}
	}

	/// All values stored under `raw_key`, joined with `; `
	pub fn joined(&self, raw_key: &str) -> Option<String> {
		self.raw.get(raw_key).map(|v| v.iter().join("; "))
	}
}

/// Parse a plain positive number, ignoring surrounding whitespace
pub(crate) fn parse_number(s: &str) -> Option<u32> {
	s.trim().parse::<u32>().ok()
}

/// Parse `N` or `N/Total`.
/// Either half may be missing or malformed.
pub(crate) fn parse_number_pair(s: &str) -> (Option<u32>, Option<u32>) {
	match s.split_once('/') {
		Some((n, total)) => (parse_number(n), parse_number(total)),
		None => (parse_number(s), None),
	}
}

/// Find a four-digit year between 1900 and 2100 at the start of `s`.
/// Accepts `2004`, `2004-05-01`, `2004-05-01T10:00:00`, etc.
pub(crate) fn parse_year(s: &str) -> Option<u32> {
	let s = s.trim();
	let head = s.get(0..4)?;
	if !head.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}

	// "20041" is not a year
	if s.as_bytes().get(4).is_some_and(|b| b.is_ascii_digit()) {
		return None;
	}

	let year: u32 = head.parse().ok()?;
	if (1900..=2100).contains(&year) {
		return Some(year);
	} else {
		return None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use paste::paste;

	macro_rules! year_test {
		($name:ident, $input:expr, $expected:expr) => {
			paste! {
				#[test]
				fn [<year_ $name>]() {
					assert_eq!(parse_year($input), $expected);
				}
			}
		};
	}

	year_test!(plain, "2004", Some(2004));
	year_test!(full_date, "1999-12-31", Some(1999));
	year_test!(timestamp, "2010-01-01T00:00:00Z", Some(2010));
	year_test!(too_old, "1899", None);
	year_test!(too_new, "2101", None);
	year_test!(five_digits, "20041", None);
	year_test!(short, "204", None);
	year_test!(words, "circa 2004", None);

	#[test]
	fn number_pairs() {
		assert_eq!(parse_number_pair("3"), (Some(3), None));
		assert_eq!(parse_number_pair("3/12"), (Some(3), Some(12)));
		assert_eq!(parse_number_pair(" 3 / 12 "), (Some(3), Some(12)));
		assert_eq!(parse_number_pair("/12"), (None, Some(12)));
		assert_eq!(parse_number_pair("x"), (None, None));
	}

	#[test]
	fn canonical_fields_are_also_raw() {
		let mut t = Tags::new();
		t.add("TITLE", "First", &TagType::TrackTitle);
		t.add("TITLE", "Second", &TagType::TrackTitle);
		t.add("TRACKNUMBER", "4/10", &TagType::TrackNumber);
		t.add("DATE", "2001-02-03", &TagType::ReleaseDate);
		t.add("MOOD", "calm", &TagType::Other("MOOD".into()));

		assert_eq!(t.title.as_deref(), Some("First"));
		assert_eq!(t.track_number, Some(4));
		assert_eq!(t.track_total, Some(10));
		assert_eq!(t.year, Some(2001));
		assert_eq!(t.date.as_deref(), Some("2001-02-03"));

		assert_eq!(t.raw.get("TITLE").unwrap(), &["First", "Second"]);
		assert_eq!(t.raw.first("MOOD"), Some("calm"));
		assert_eq!(t.joined("TITLE").unwrap(), "First; Second");
		assert_eq!(
			t.raw.iter().map(|(k, _)| k).collect::<Vec<_>>(),
			vec!["TITLE", "TRACKNUMBER", "DATE", "MOOD"]
		);
	}

	#[test]
	fn explicit_total_does_not_override_pair() {
		let mut t = Tags::new();
		t.add("TRCK", "2/9", &TagType::TrackNumber);
		t.add("TRACKTOTAL", "11", &TagType::TrackTotal);
		assert_eq!(t.track_total, Some(9));
	}
}
