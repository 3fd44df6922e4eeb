//! Read tags, stream properties, chapters and artwork from audio files.
//!
//! Supported formats are mp3 (ID3v2), flac, ogg vorbis, ogg opus,
//! and mp4 (m4a and m4b). Start with [`Engine::open`], or
//! [`open_many`] for many files at once.
//!
//! Decoders tolerate damage they can skip over: what they can't read
//! becomes a [`Warning`] on the result instead of an error.

mod batch;
mod config;
mod engine;
mod errors;
mod format;
mod record;
mod registry;

pub mod common;
pub mod flac;
pub mod model;
pub mod mp3;
pub mod mp4;
pub mod ogg;
pub mod reader;

pub use batch::{default_threads, open_many};
pub use config::OpenOptions;
pub use engine::Engine;
pub use errors::{BatchError, DecodeError, OpenError, WriteError};
pub use format::{detect, Format};
pub use model::{
	Artwork, AudioInfo, Chapter, Metadata, PictureType, RawTags, ReplayGain, Stage, TagType,
	Tags, Warning,
};
pub use record::MetadataRecord;
pub use registry::{ArtworkExtractor, Decoder, ExtractedArtwork, Registry, Writer};
