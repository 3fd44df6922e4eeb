//! ID3v2 text encodings

/// A text encoding, selected by the first byte of most text frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
	Latin1,
	/// UTF-16 with a byte order mark
	Utf16,
	Utf16Be,
	Utf8,
}

impl TextEncoding {
	pub fn from_byte(b: u8) -> Option<Self> {
		match b {
			0 => Some(Self::Latin1),
			1 => Some(Self::Utf16),
			2 => Some(Self::Utf16Be),
			3 => Some(Self::Utf8),
			_ => None,
		}
	}

	/// The width of this encoding's null terminator
	pub fn terminator_len(&self) -> usize {
		match self {
			Self::Latin1 | Self::Utf8 => 1,
			Self::Utf16 | Self::Utf16Be => 2,
		}
	}

	/// Decode `data`, which must not include the encoding byte.
	/// Invalid sequences are replaced, trailing nulls are removed.
	pub fn decode(&self, data: &[u8]) -> String {
		let s = match self {
			Self::Latin1 => data.iter().map(|b| char::from(*b)).collect(),
			Self::Utf8 => String::from_utf8_lossy(data).into_owned(),
			Self::Utf16Be => decode_utf16(data, true),
			Self::Utf16 => match data {
				[0xFF, 0xFE, rest @ ..] => decode_utf16(rest, false),
				[0xFE, 0xFF, rest @ ..] => decode_utf16(rest, true),
				// No BOM. The standard says this is an error,
				// but big-endian is the most common guess.
				_ => decode_utf16(data, true),
			},
		};

		return s.trim_end_matches('\0').into();
	}

	/// Find the first null terminator in `data`.
	/// Returns (text before the terminator, data after it).
	/// If there is no terminator, all of `data` is text.
	pub fn split_terminated<'a>(&self, data: &'a [u8]) -> (&'a [u8], &'a [u8]) {
		let pos = match self.terminator_len() {
			1 => data.iter().position(|b| *b == 0),
			_ => data
				.chunks_exact(2)
				.position(|c| c == [0u8, 0])
				.map(|i| i * 2),
		};

		match pos {
			Some(i) => (&data[..i], &data[i + self.terminator_len()..]),
			None => (data, &[]),
		}
	}

	/// Split `data` on every null terminator.
	/// Empty trailing pieces are dropped.
	pub fn split_all(&self, data: &[u8]) -> Vec<String> {
		let mut out = Vec::new();
		let mut rest = data;

		// UTF-16 values after the first may carry their own BOM,
		// so we decode each piece on its own.
		while !rest.is_empty() {
			let (piece, next) = self.split_terminated(rest);
			out.push(self.decode(piece));
			rest = next;
		}

		while out.last().is_some_and(|x| x.is_empty()) {
			out.pop();
		}

		return out;
	}
}

fn decode_utf16(data: &[u8], big_endian: bool) -> String {
	let units = data.chunks_exact(2).map(|c| {
		if big_endian {
			u16::from_be_bytes([c[0], c[1]])
		} else {
			u16::from_le_bytes([c[0], c[1]])
		}
	});

	char::decode_utf16(units)
		.map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn utf16le_bom(s: &str) -> Vec<u8> {
		let mut out = vec![0xFF, 0xFE];
		for u in s.encode_utf16() {
			out.extend(u.to_le_bytes());
		}
		out
	}

	#[test]
	fn decodes() {
		assert_eq!(TextEncoding::Latin1.decode(b"caf\xe9\0"), "café");
		assert_eq!(TextEncoding::Utf8.decode("café".as_bytes()), "café");
		assert_eq!(TextEncoding::Utf16.decode(&utf16le_bom("héllo")), "héllo");
		assert_eq!(
			TextEncoding::Utf16Be.decode(&[0x00, 0x68, 0x00, 0x69]),
			"hi"
		);
		assert_eq!(
			TextEncoding::Utf16.decode(&[0xFE, 0xFF, 0x00, 0x68, 0x00, 0x69]),
			"hi"
		);
		assert_eq!(TextEncoding::from_byte(4), None);
	}

	#[test]
	fn splits() {
		let (a, b) = TextEncoding::Latin1.split_terminated(b"desc\0value");
		assert_eq!((a, b), (&b"desc"[..], &b"value"[..]));

		// A UTF-16 terminator must be aligned
		let data = [0x68, 0x00, 0x00, 0x69, 0x00, 0x00, 0x41, 0x00];
		let (a, b) = TextEncoding::Utf16.split_terminated(&data);
		assert_eq!(a, &[0x68u8, 0x00, 0x00, 0x69][..]);
		assert_eq!(b, &[0x41u8, 0x00][..]);

		let mut multi = utf16le_bom("one");
		multi.extend([0, 0]);
		multi.extend(utf16le_bom("two"));
		multi.extend([0, 0]);
		assert_eq!(TextEncoding::Utf16.split_all(&multi), vec!["one", "two"]);

		assert_eq!(
			TextEncoding::Latin1.split_all(b"Rock\0Pop\0"),
			vec!["Rock", "Pop"]
		);
	}
}
