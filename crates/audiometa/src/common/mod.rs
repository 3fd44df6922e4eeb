//! Structures shared by more than one format

pub(crate) mod chapters;
pub mod imagesniff;
pub mod picture;
pub mod vorbiscomment;
