//! FLAC parsing errors

use thiserror::Error;

use crate::{
	common::{picture::PictureDecodeError, vorbiscomment::VorbisCommentDecodeError},
	reader::ReadError,
};

/// A problem with one metadata block.
/// These become warnings; they never fail a decode.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum FlacBlockError {
	/// We got an invalid metadata block type
	#[error("invalid flac metablock type {0}")]
	BadMetablockType(u8),

	#[error("block at offset {offset} claims {length} bytes, but the file is only {size} bytes long")]
	PastEnd { offset: u64, length: u32, size: u64 },

	/// We encountered a read error while processing a block
	#[error("could not read block")]
	Read(#[from] ReadError),

	#[error("streaminfo block has length {0}, expected 34")]
	BadStreaminfoLength(u32),

	#[error("streaminfo has invalid sample rate {0}")]
	BadSampleRate(u32),

	/// We could not parse a vorbis comment
	#[error("error while decoding vorbis comment")]
	VorbisComment(#[from] VorbisCommentDecodeError),

	#[error("error while decoding picture")]
	Picture(#[from] PictureDecodeError),
}
