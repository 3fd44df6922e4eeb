//! Open many files at once

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::{
	path::PathBuf,
	sync::atomic::{AtomicBool, Ordering},
	thread,
};
use tracing::{debug, trace, warn};

use crate::{
	engine::Engine,
	errors::{BatchError, OpenError},
	record::MetadataRecord,
};

/// The number of workers to use if the caller doesn't care
pub fn default_threads() -> usize {
	thread::available_parallelism()
		.map(|x| x.get())
		.unwrap_or(1)
}

enum Outcome {
	Opened(usize, MetadataRecord),
	Failed(usize, OpenError),
	Skipped(usize),
}

/// Open every file in `paths` using `threads` workers.
///
/// Results are in the same order as `paths`.
/// This is all-or-nothing: if any file fails, or if `cancel` is set
/// before every file has been started, every file we did open is closed
/// and an error is returned. Tasks that are already running when
/// `cancel` is set are allowed to finish.
pub fn open_many(
	engine: &Engine,
	paths: &[PathBuf],
	threads: usize,
	cancel: &AtomicBool,
) -> Result<Vec<MetadataRecord>, BatchError> {
	let threads = threads.max(1).min(paths.len().max(1));
	debug!(message = "Starting batch open", files = paths.len(), threads);

	// Set when any task fails, so that workers stop picking up new ones
	let failed = AtomicBool::new(false);

	let (send_task, receive_task): (Sender<usize>, Receiver<usize>) = unbounded();
	let (send_outcome, receive_outcome): (Sender<Outcome>, Receiver<Outcome>) = unbounded();

	for i in 0..paths.len() {
		// Receivers are alive until the scope below ends
		let _ = send_task.send(i);
	}
	drop(send_task);

	thread::scope(|s| {
		for _ in 0..threads {
			let receive_task = receive_task.clone();
			let send_outcome = send_outcome.clone();
			let failed = &failed;

			s.spawn(move || {
				for i in receive_task.iter() {
					if cancel.load(Ordering::Relaxed) || failed.load(Ordering::Relaxed) {
						let _ = send_outcome.send(Outcome::Skipped(i));
						continue;
					}

					trace!(message = "Opening file", index = i, path = ?paths[i]);
					let outcome = match engine.open(&paths[i]) {
						Ok(r) => Outcome::Opened(i, r),
						Err(e) => {
							failed.store(true, Ordering::Relaxed);
							Outcome::Failed(i, e)
						}
					};
					let _ = send_outcome.send(outcome);
				}
			});
		}
	});
	drop(send_outcome);

	let mut records: Vec<Option<MetadataRecord>> = (0..paths.len()).map(|_| None).collect();
	let mut first_error: Option<(usize, OpenError)> = None;
	let mut skipped = false;

	for outcome in receive_outcome.iter() {
		match outcome {
			Outcome::Opened(i, r) => records[i] = Some(r),
			Outcome::Skipped(_) => skipped = true,
			Outcome::Failed(i, e) => {
				warn!(message = "Could not open file", index = i, path = ?paths[i], error = %e);
				if first_error.as_ref().map_or(true, |(j, _)| i < *j) {
					first_error = Some((i, e));
				}
			}
		}
	}

	let error = match first_error {
		Some((index, source)) => Some(BatchError::Open { index, source }),
		None if skipped => Some(BatchError::Cancelled),
		None => None,
	};

	if let Some(error) = error {
		let n_open = records.iter().filter(|x| x.is_some()).count();
		debug!(message = "Batch open failed, closing files", n_open, %error);
		for r in records.into_iter().flatten() {
			r.close();
		}
		return Err(error);
	}

	let out: Vec<MetadataRecord> = records.into_iter().flatten().collect();
	debug!(message = "Batch open finished", files = out.len());
	return Ok(out);
}
