use anyhow::{bail, Context, Result};
use audiometa::{open_many, Engine, Metadata, MetadataRecord, Registry};
use audiometa_util::{load_env, LoadedEnv, MimeType};
use clap::{Parser, Subcommand};
use config::CliConfig;
use serde::Serialize;
use std::{
	path::{Path, PathBuf},
	sync::atomic::AtomicBool,
	time::Duration,
};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

mod config;

/// Extensions `scan` picks up
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "oga", "opus", "m4a", "m4b", "mp4"];

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
	#[command(subcommand)]
	command: Commands,

	/// Fail on any decode warning
	#[arg(long, global = true)]
	strict: bool,

	/// Read whole files into memory before decoding
	#[arg(long, global = true)]
	preload: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Print the metadata of one or more files
	Show {
		files: Vec<PathBuf>,

		/// Print json instead of text
		#[arg(long)]
		json: bool,
	},

	/// Open every audio file under a directory
	Scan {
		dir: PathBuf,

		/// How many files to open at once
		#[arg(long)]
		threads: Option<usize>,
	},

	/// Save a file's embedded pictures
	Artwork {
		file: PathBuf,

		/// Where to put the pictures
		#[arg(long)]
		out: PathBuf,
	},
}

#[derive(Serialize)]
struct ShowOutput<'a> {
	path: &'a Path,
	size: u64,
	mime: MimeType,

	#[serde(flatten)]
	metadata: &'a Metadata,
}

fn fmt_duration(d: Duration) -> String {
	let ms = d.as_millis();
	let (h, m, s) = (ms / 3_600_000, (ms / 60_000) % 60, (ms / 1000) % 60);
	format!("{h}:{m:02}:{s:02}.{:03}", ms % 1000)
}

fn print_record(r: &MetadataRecord) {
	let info = r.info();
	println!("{} ({})", r.path().display(), r.format().mime_type());
	println!(
		"  {} ({} in {}), {}, {} Hz, {} ch, {} kbps{}",
		r.format(),
		info.codec,
		info.container,
		fmt_duration(info.duration),
		info.sample_rate,
		info.channels,
		info.bitrate / 1000,
		if info.lossless { ", lossless" } else { "" }
	);

	for (key, values) in r.tags().raw.iter() {
		println!("  {key}: {}", values.join("; "));
	}

	for c in r.chapters() {
		println!(
			"  chapter {}: {} [{} - {}]",
			c.index,
			c.title,
			fmt_duration(c.start),
			fmt_duration(c.end)
		);
	}

	for w in r.warnings() {
		println!("  warning: {w}");
	}
}

fn show(engine: &Engine, files: &[PathBuf], json: bool) -> Result<()> {
	let mut failed = 0usize;
	for path in files {
		let r = match engine.open(path) {
			Ok(x) => x,
			Err(e) => {
				let e = anyhow::Error::from(e);
				error!(message = "Could not open file", ?path, error = format!("{e:#}"));
				failed += 1;
				continue;
			}
		};

		if json {
			let out = ShowOutput {
				path: r.path(),
				size: r.size(),
				mime: r.format().mime_type(),
				metadata: r.metadata(),
			};
			println!("{}", serde_json::to_string_pretty(&out)?);
		} else {
			print_record(&r);
		}
	}

	if failed != 0 {
		bail!("could not open {failed} of {} files", files.len());
	}
	return Ok(());
}

fn is_audio(path: &Path) -> bool {
	path.extension()
		.and_then(|x| x.to_str())
		.is_some_and(|x| AUDIO_EXTENSIONS.iter().any(|e| x.eq_ignore_ascii_case(e)))
}

fn scan(engine: &Engine, dir: &Path, threads: usize) -> Result<()> {
	let mut paths = Vec::new();
	for entry in WalkDir::new(dir) {
		let entry = match entry {
			Ok(x) => x,
			Err(e) => {
				warn!(message = "Could not read directory entry", error = %e);
				continue;
			}
		};

		if entry.file_type().is_file() && is_audio(entry.path()) {
			paths.push(entry.into_path());
		}
	}
	paths.sort();
	info!(message = "Found audio files", ?dir, count = paths.len(), threads);

	let cancel = AtomicBool::new(false);
	let records = open_many(engine, &paths, threads, &cancel)
		.with_context(|| format!("while scanning {}", dir.display()))?;

	for r in &records {
		println!(
			"{}\t{}\t{}\t{}\t{}",
			r.path().display(),
			r.format(),
			fmt_duration(r.info().duration),
			r.tags().title.as_deref().unwrap_or(""),
			r.warnings().len()
		);
	}

	return Ok(());
}

fn artwork(engine: &Engine, file: &Path, out: &Path) -> Result<()> {
	let r = engine
		.open(file)
		.with_context(|| format!("could not open {}", file.display()))?;
	let pictures = r.artwork()?;

	for w in r.artwork_warnings() {
		warn!(message = "Artwork warning", path = ?file, warning = %w);
	}

	if pictures.is_empty() {
		info!(message = "File has no artwork", path = ?file);
		return Ok(());
	}

	std::fs::create_dir_all(out)?;
	let stem = file
		.file_stem()
		.map(|x| x.to_string_lossy().into_owned())
		.unwrap_or_else(|| "artwork".into());

	for (i, a) in pictures.iter().enumerate() {
		let name = format!("{stem}-{i}-{}{}", a.picture_type, a.mime.extension());
		let target = out.join(name);
		std::fs::write(&target, &a.data)
			.with_context(|| format!("could not write {}", target.display()))?;
		println!(
			"{} ({}, {}x{}, {} bytes)",
			target.display(),
			a.mime,
			a.width,
			a.height,
			a.len()
		);
	}

	return Ok(());
}

fn main() -> Result<()> {
	let args = Args::parse();

	let config_res = match load_env::<CliConfig>("AUDIOMETA_") {
		Ok(x) => x,
		Err(err) => {
			println!("Error while loading .env: {err}");
			std::process::exit(1);
		}
	};

	let mut config = config_res.get_config().clone();

	tracing_subscriber::fmt()
		.with_env_filter(config.loglevel.get_config().to_filter()?)
		.without_time()
		.with_ansi(true)
		.with_writer(std::io::stderr)
		.init();

	// Do this now, logging wasn't available earlier
	match &config_res {
		LoadedEnv::FoundFile { path, .. } => {
			debug!(message = "Loaded config from .env", ?path, ?config);
		}
		LoadedEnv::OnlyVars(_) => {
			debug!(message = "No `.env` found, loaded config from environment", ?config);
		}
	};

	// Flags override the environment
	config.strict |= args.strict;
	config.preload |= args.preload;

	let engine = Engine::new(Registry::with_default_decoders(), config.open_options());

	match args.command {
		Commands::Show { files, json } => show(&engine, &files, json),
		Commands::Scan { dir, threads } => {
			if threads.is_some() {
				config.threads = threads;
			}
			scan(&engine, &dir, config.threads())
		}
		Commands::Artwork { file, out } => artwork(&engine, &file, &out),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn durations() {
		assert_eq!(fmt_duration(Duration::ZERO), "0:00:00.000");
		assert_eq!(fmt_duration(Duration::from_millis(3_723_045)), "1:02:03.045");
	}

	#[test]
	fn audio_extensions() {
		assert!(is_audio(Path::new("a/b.FLAC")));
		assert!(is_audio(Path::new("book.m4b")));
		assert!(!is_audio(Path::new("cover.jpg")));
		assert!(!is_audio(Path::new("README")));
	}

	#[test]
	fn args_parse() {
		let a = Args::parse_from(["audiometa", "show", "--json", "a.mp3", "b.flac", "--strict"]);
		assert!(a.strict);
		match a.command {
			Commands::Show { files, json } => {
				assert!(json);
				assert_eq!(files.len(), 2);
			}
			x => panic!("parsed the wrong command: {x:?}"),
		}
	}
}
