use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::time::Duration;

/// A chapter marker
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
	/// 1-based position in the chapter list
	pub index: usize,
	pub title: String,

	/// Offset from the start of the file
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub start: Duration,

	/// Offset from the start of the file
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub end: Duration,
}

impl Chapter {
	/// Make a chapter with no known end.
	/// [`finalize_chapters`] fills in the index and the end.
	pub(crate) fn new(title: impl Into<String>, start: Duration) -> Self {
		Self {
			index: 0,
			title: title.into(),
			start,
			end: Duration::ZERO,
		}
	}

	/// Make a chapter with a known end
	pub(crate) fn with_end(title: impl Into<String>, start: Duration, end: Duration) -> Self {
		Self {
			index: 0,
			title: title.into(),
			start,
			end,
		}
	}

	pub fn length(&self) -> Duration {
		self.end.saturating_sub(self.start)
	}
}

/// Bring a list of chapters into canonical form:
/// - sort by start time (stable, so equal starts keep their order)
/// - re-index from 1
/// - every chapter but the last ends where the next one starts
/// - the last chapter keeps an explicit end if it has one,
///   otherwise ends at `total` (which is zero if unknown).
pub(crate) fn finalize_chapters(chapters: &mut [Chapter], total: Duration) {
	chapters.sort_by_key(|c| c.start);

	let n = chapters.len();
	for i in 0..n {
		chapters[i].index = i + 1;

		if i + 1 < n {
			chapters[i].end = chapters[i + 1].start;
		} else if chapters[i].end <= chapters[i].start {
			chapters[i].end = total.max(chapters[i].start);
			if total.is_zero() {
				chapters[i].end = Duration::ZERO;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::{seq::SliceRandom, Rng};

	fn secs(x: u64) -> Duration {
		Duration::from_secs(x)
	}

	#[test]
	fn sorted_and_contiguous() {
		let mut rng = rand::thread_rng();

		for _ in 0..50 {
			let n = rng.gen_range(1..20);
			let mut chapters: Vec<Chapter> = (0..n)
				.map(|i| Chapter::new(format!("c{i}"), secs(rng.gen_range(0..10_000))))
				.collect();
			chapters.shuffle(&mut rng);

			finalize_chapters(&mut chapters, secs(20_000));

			for (i, c) in chapters.iter().enumerate() {
				assert_eq!(c.index, i + 1);
			}

			for w in chapters.windows(2) {
				assert!(w[0].start <= w[1].start);
				assert_eq!(w[0].end, w[1].start);
			}

			assert_eq!(chapters.last().unwrap().end, secs(20_000));
		}
	}

	#[test]
	fn last_chapter_end() {
		// Unknown duration
		let mut c = vec![Chapter::new("a", secs(0)), Chapter::new("b", secs(5))];
		finalize_chapters(&mut c, Duration::ZERO);
		assert_eq!(c[0].end, secs(5));
		assert_eq!(c[1].end, Duration::ZERO);

		// Explicit end wins over total
		let mut c = vec![Chapter::with_end("a", secs(0), secs(7))];
		finalize_chapters(&mut c, secs(100));
		assert_eq!(c[0].end, secs(7));

		// Empty list is fine
		let mut c: Vec<Chapter> = Vec::new();
		finalize_chapters(&mut c, secs(10));
	}
}
