use serde::Deserialize;

/// Options that control how files are opened
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OpenOptions {
	/// Fail if decoding records any warning
	#[serde(default)]
	pub strict: bool,

	/// Read the whole file into memory before decoding
	#[serde(default)]
	pub preload: bool,
}
