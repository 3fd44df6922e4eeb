//! Chapters stored in vorbis comments, as
//! `CHAPTER001=00:00:00.000` and `CHAPTER001NAME=Intro`.

use std::{collections::BTreeMap, time::Duration};

use crate::model::{Chapter, Stage, Warning, WarningSink};

/// Parse `HH:MM:SS.mmm`, `MM:SS.mmm` or `SS.mmm`.
/// The fraction is optional.
pub(crate) fn parse_timestamp(s: &str) -> Option<Duration> {
	let s = s.trim();
	let (whole, frac) = match s.split_once('.') {
		Some((w, f)) => (w, Some(f)),
		None => (s, None),
	};

	let parts = whole.split(':').collect::<Vec<_>>();
	if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
		return None;
	}

	let mut nums = Vec::with_capacity(parts.len());
	for p in &parts {
		if !p.bytes().all(|b| b.is_ascii_digit()) {
			return None;
		}
		nums.push(p.parse::<u64>().ok()?);
	}

	let secs = match nums[..] {
		[s] => s,
		[m, s] if s < 60 => m * 60 + s,
		[h, m, s] if m < 60 && s < 60 => h * 3600 + m * 60 + s,
		_ => return None,
	};

	let nanos = match frac {
		None => 0,
		Some(f) => {
			if f.is_empty() || f.len() > 9 || !f.bytes().all(|b| b.is_ascii_digit()) {
				return None;
			}
			// Right-pad to nanoseconds: `5` is 500ms
			let padded = format!("{f:0<9}");
			padded.parse::<u32>().ok()?
		}
	};

	return Some(Duration::new(secs, nanos));
}

/// Split `CHAPTER012NAME` into (`012`, true)
fn split_chapter_key(key: &str) -> Option<(&str, bool)> {
	let rest = key.strip_prefix("CHAPTER")?;
	let (idx, is_name) = match rest.strip_suffix("NAME") {
		Some(idx) => (idx, true),
		None => (rest, false),
	};

	if idx.is_empty() || !idx.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	return Some((idx, is_name));
}

/// Build chapters from `CHAPTERnnn` comments.
///
/// `comments` are (uppercase key, value) pairs.
/// Chapters without a valid timestamp are dropped with a warning.
/// The result is not finalized: see [`crate::model::Metadata::set_chapters`].
pub(crate) fn chapters_from_comments<'a>(
	comments: impl IntoIterator<Item = (&'a str, &'a str)>,
	offset: u64,
	warnings: &mut Vec<Warning>,
) -> Vec<Chapter> {
	// index -> (start, name)
	let mut found: BTreeMap<u32, (Option<&str>, Option<&str>)> = BTreeMap::new();

	for (key, value) in comments {
		let Some((idx, is_name)) = split_chapter_key(key) else {
			continue;
		};
		let Ok(n) = idx.parse::<u32>() else {
			continue;
		};

		let e = found.entry(n).or_default();
		if is_name {
			e.1.get_or_insert(value);
		} else {
			e.0.get_or_insert(value);
		}
	}

	let mut out = Vec::new();
	for (n, (start, name)) in found {
		let Some(start) = start else {
			warnings.warn(
				Stage::Chapters,
				offset,
				format!("chapter {n} has a name but no start time"),
			);
			continue;
		};

		let Some(start) = parse_timestamp(start) else {
			warnings.warn(
				Stage::Chapters,
				offset,
				format!("chapter {n} has an invalid start time `{start}`"),
			);
			continue;
		};

		let title = match name {
			Some(x) if !x.trim().is_empty() => x.trim().into(),
			_ => format!("Chapter {n}"),
		};

		out.push(Chapter::new(title, start));
	}

	return out;
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::finalize_chapters;
	use paste::paste;

	macro_rules! ts_test {
		($name:ident, $input:expr, $expected:expr) => {
			paste! {
				#[test]
				fn [<timestamp_ $name>]() {
					assert_eq!(parse_timestamp($input), $expected);
				}
			}
		};
	}

	ts_test!(hms, "01:02:03.500", Some(Duration::from_millis(3_723_500)));
	ts_test!(ms, "02:03.250", Some(Duration::from_millis(123_250)));
	ts_test!(s, "75.5", Some(Duration::from_millis(75_500)));
	ts_test!(no_fraction, "00:01:00", Some(Duration::from_secs(60)));
	ts_test!(bad_minutes, "00:60:00.000", None);
	ts_test!(bad_seconds, "01:61.000", None);
	ts_test!(too_many_parts, "1:2:3:4", None);
	ts_test!(letters, "aa:bb", None);
	ts_test!(empty, "", None);
	ts_test!(empty_fraction, "10.", None);

	#[test]
	fn pairs_by_index() {
		let comments = [
			("TITLE", "x"),
			("CHAPTER002", "00:01:00.000"),
			("CHAPTER002NAME", "Second"),
			("CHAPTER001", "00:00:00.000"),
			("CHAPTER001NAME", "First"),
			("CHAPTER003NAME", "No start"),
			("CHAPTER004", "garbage"),
			("CHAPTER005", "00:02:00"),
		];

		let mut warnings = Vec::new();
		let mut c = chapters_from_comments(comments, 7, &mut warnings);
		finalize_chapters(&mut c, Duration::from_secs(300));

		assert_eq!(c.len(), 3);
		assert_eq!(c[0].title, "First");
		assert_eq!(c[1].title, "Second");
		assert_eq!(c[2].title, "Chapter 5");
		assert_eq!(c[0].end, Duration::from_secs(60));
		assert_eq!(c[1].end, Duration::from_secs(120));
		assert_eq!(c[2].end, Duration::from_secs(300));
		assert_eq!(c[2].index, 3);

		assert_eq!(warnings.len(), 2);
		assert!(warnings.iter().all(|w| w.stage == Stage::Chapters && w.offset == 7));
	}
}
