use std::{
	path::{Path, PathBuf},
	sync::atomic::AtomicBool,
	time::Duration,
};

use audiometa::{
	open_many, BatchError, DecodeError, Engine, Format, OpenError, OpenOptions, PictureType,
	Registry, Stage, WriteError,
};
use tempfile::TempDir;

fn block(kind: u8, last: bool, data: &[u8]) -> Vec<u8> {
	let mut out = vec![kind | if last { 0x80 } else { 0 }];
	out.extend(&(data.len() as u32).to_be_bytes()[1..]);
	out.extend(data);
	out
}

fn streaminfo(rate: u32, channels: u8, bps: u8, total: u64) -> Vec<u8> {
	let mut out = 4096u16.to_be_bytes().to_vec();
	out.extend(4096u16.to_be_bytes());
	out.extend([0u8; 6]);
	let packed = (u64::from(rate) << 44)
		| (u64::from(channels - 1) << 41)
		| (u64::from(bps - 1) << 36)
		| total;
	out.extend(packed.to_be_bytes());
	out.extend([0u8; 16]);
	out
}

fn comment(tags: &[&str]) -> Vec<u8> {
	let vendor = b"test";
	let mut out = (vendor.len() as u32).to_le_bytes().to_vec();
	out.extend(vendor);
	out.extend((tags.len() as u32).to_le_bytes());
	for t in tags {
		out.extend((t.len() as u32).to_le_bytes());
		out.extend(t.as_bytes());
	}
	out
}

fn png(w: u32, h: u32) -> Vec<u8> {
	let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
	out.extend(13u32.to_be_bytes());
	out.extend(b"IHDR");
	out.extend(w.to_be_bytes());
	out.extend(h.to_be_bytes());
	out.extend([8, 6, 0, 0, 0]);
	out.extend([0u8; 4]);
	out
}

fn picture(img: &[u8]) -> Vec<u8> {
	let mime = b"image/png";
	let mut out = 3u32.to_be_bytes().to_vec();
	out.extend((mime.len() as u32).to_be_bytes());
	out.extend(mime);
	out.extend(0u32.to_be_bytes());
	out.extend([0u8; 16]);
	out.extend((img.len() as u32).to_be_bytes());
	out.extend(img);
	out
}

/// A one-minute flac file with a title and a cover
fn flac(title: &str) -> Vec<u8> {
	let mut out = b"fLaC".to_vec();
	out.extend(block(0, false, &streaminfo(44100, 2, 16, 44100 * 60)));
	out.extend(block(4, false, &comment(&[&format!("TITLE={title}"), "ARTIST=Band"])));
	out.extend(block(6, true, &picture(&png(16, 9))));
	out.extend([0xFF, 0xF8, 0x00, 0x00]);
	out
}

fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
	let path = dir.path().join(name);
	std::fs::write(&path, data).unwrap();
	path
}

fn engine(strict: bool, preload: bool) -> Engine {
	Engine::new(
		Registry::with_default_decoders(),
		OpenOptions { strict, preload },
	)
}

#[test]
fn open_flac() {
	let dir = TempDir::new().unwrap();
	let path = write(&dir, "song.flac", &flac("Song"));

	for preload in [false, true] {
		let r = engine(false, preload).open(&path).unwrap();
		assert_eq!(r.format(), Format::Flac);
		assert_eq!(r.path(), path.as_path());
		assert_eq!(r.tags().title.as_deref(), Some("Song"));
		assert_eq!(r.info().duration, Duration::from_secs(60));
		assert!(r.warnings().is_empty(), "{:?}", r.warnings());

		// Artwork is decoded once, on request
		assert!(r.artwork_warnings().is_empty());
		let first = r.artwork().unwrap();
		assert_eq!(first.len(), 1);
		assert_eq!(first[0].picture_type, PictureType::FrontCover);
		assert_eq!((first[0].width, first[0].height), (16, 9));
		let second = r.artwork().unwrap();
		assert!(std::ptr::eq(first, second));

		r.close();
	}
}

#[test]
fn strict_mode() {
	let dir = TempDir::new().unwrap();

	// Comment block, but no streaminfo
	let mut data = b"fLaC".to_vec();
	data.extend(block(4, true, &comment(&["TITLE=x"])));
	let path = write(&dir, "broken.flac", &data);

	let r = engine(false, false).open(&path).unwrap();
	assert!(!r.warnings().is_empty());
	assert!(r.warnings().iter().all(|w| w.stage == Stage::Technical));
	assert_eq!(r.tags().title.as_deref(), Some("x"));

	match engine(true, false).open(&path) {
		Err(OpenError::Decode {
			source: DecodeError::Strict(w),
			..
		}) => assert_eq!(&w, &r.warnings()[0]),
		x => panic!("expected a strict mode error, got {x:?}"),
	}
}

#[test]
fn open_errors() {
	let dir = TempDir::new().unwrap();
	let e = Engine::default();

	let wav = write(&dir, "a.wav", b"RIFF\0\0\0\0WAVEfmt ");
	assert!(matches!(e.open(&wav), Err(OpenError::Unsupported(Format::Wav))));

	let junk = write(&dir, "a.bin", b"definitely not audio");
	assert!(matches!(
		e.open(&junk),
		Err(OpenError::Decode {
			source: DecodeError::UnsupportedFormat(_),
			..
		})
	));

	assert!(matches!(
		e.open(dir.path().join("missing.flac")),
		Err(OpenError::Io(_))
	));
}

#[test]
fn save_without_writer() {
	let dir = TempDir::new().unwrap();
	let path = write(&dir, "song.flac", &flac("Song"));
	let e = Engine::default();
	let r = e.open(&path).unwrap();

	let target = dir.path().join("out.flac");
	assert!(matches!(
		e.save(&r, &target),
		Err(WriteError::NoWriter(Format::Flac))
	));
	assert!(!Path::new(&target).exists());
}

#[test]
fn batch_keeps_order() {
	let dir = TempDir::new().unwrap();
	let paths = (0..12)
		.map(|i| write(&dir, &format!("{i}.flac"), &flac(&format!("Track {i}"))))
		.collect::<Vec<_>>();

	let cancel = AtomicBool::new(false);
	let records = open_many(&Engine::default(), &paths, 4, &cancel).unwrap();
	assert_eq!(records.len(), 12);
	for (i, r) in records.iter().enumerate() {
		assert_eq!(r.path(), paths[i].as_path());
		assert_eq!(r.tags().title.as_deref(), Some(format!("Track {i}").as_str()));
	}

	let empty = open_many(&Engine::default(), &[], 4, &cancel).unwrap();
	assert!(empty.is_empty());
}

#[test]
fn batch_failure() {
	let dir = TempDir::new().unwrap();
	let paths = vec![
		write(&dir, "0.flac", &flac("Zero")),
		write(&dir, "1.flac", b"fLaC"),
		write(&dir, "2.flac", &flac("Two")),
	];

	let cancel = AtomicBool::new(false);
	match open_many(&Engine::default(), &paths, 2, &cancel) {
		Err(BatchError::Open { index, .. }) => assert_eq!(index, 1),
		x => panic!("expected a failed batch, got {x:?}"),
	}
}

#[test]
fn batch_cancelled() {
	let dir = TempDir::new().unwrap();
	let paths = vec![write(&dir, "0.flac", &flac("Zero"))];

	let cancel = AtomicBool::new(true);
	assert!(matches!(
		open_many(&Engine::default(), &paths, 1, &cancel),
		Err(BatchError::Cancelled)
	));
}
