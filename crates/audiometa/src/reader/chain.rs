use super::{ReadCursor, ReadError};

/// A cursor that remembers its first failure.
///
/// Once a read fails, every later read is skipped and returns
/// a zero value. Call [`ChainedReader::finish`] to get the first error.
/// This lets a decoder write a flat list of field reads:
///
/// ```
/// # use audiometa::reader::BoundedReader;
/// let data = [0u8, 0, 0, 1, 0xff];
/// let r = BoundedReader::from_slice(&data);
/// let mut c = r.chain(0);
/// let a = c.u32_be("a");
/// let b = c.u32_be("b"); // fails, only one byte left
/// let d = c.u8("d"); // skipped
/// assert_eq!((a, b, d), (1, 0, 0));
/// assert!(c.finish().is_err());
/// ```
pub struct ChainedReader<'a> {
	cursor: ReadCursor<'a>,
	error: Option<ReadError>,
}

macro_rules! chained {
	($name:ident, $inner:ident, $t:ty) => {
		pub fn $name(&mut self, label: &'static str) -> $t {
			if self.error.is_some() {
				return Default::default();
			}

			match self.cursor.$inner(label) {
				Ok(x) => x,
				Err(e) => {
					self.error = Some(e);
					Default::default()
				}
			}
		}
	};
}

impl<'a> ChainedReader<'a> {
	pub(super) fn new(cursor: ReadCursor<'a>) -> Self {
		Self {
			cursor,
			error: None,
		}
	}

	chained!(u8, read_u8, u8);
	chained!(u16_be, read_u16_be, u16);
	chained!(u16_le, read_u16_le, u16);
	chained!(u24_be, read_u24_be, u32);
	chained!(u32_be, read_u32_be, u32);
	chained!(u32_le, read_u32_le, u32);
	chained!(u64_be, read_u64_be, u64);
	chained!(u64_le, read_u64_le, u64);

	/// Read `n` bytes. Returns an empty vector after a failure.
	pub fn bytes(&mut self, n: u64, label: &'static str) -> Vec<u8> {
		if self.error.is_some() {
			return Vec::new();
		}

		match self.cursor.read_bytes(n, label) {
			Ok(x) => x,
			Err(e) => {
				self.error = Some(e);
				Vec::new()
			}
		}
	}

	/// Read exactly `N` bytes
	pub fn array<const N: usize>(&mut self, label: &'static str) -> [u8; N] {
		if self.error.is_some() {
			return [0u8; N];
		}

		match self.cursor.read_array::<N>(label) {
			Ok(x) => x,
			Err(e) => {
				self.error = Some(e);
				[0u8; N]
			}
		}
	}

	pub fn skip(&mut self, n: u64, label: &'static str) {
		if self.error.is_some() {
			return;
		}

		if let Err(e) = self.cursor.skip(n, label) {
			self.error = Some(e);
		}
	}

	/// Has every read so far succeeded?
	pub fn is_ok(&self) -> bool {
		self.error.is_none()
	}

	pub fn position(&self) -> u64 {
		self.cursor.position()
	}

	pub fn remaining(&self) -> u64 {
		self.cursor.remaining()
	}

	/// Stop reading.
	/// Returns the final cursor position, or the first error we hit.
	pub fn finish(self) -> Result<u64, ReadError> {
		match self.error {
			None => Ok(self.cursor.position()),
			Some(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::reader::BoundedReader;

	#[test]
	fn keeps_first_error() {
		let data = [0x12u8, 0x34, 0x56];
		let r = BoundedReader::from_slice(&data);
		let mut c = r.chain(0);

		assert_eq!(c.u16_be("first"), 0x1234);
		assert_eq!(c.u32_le("second"), 0);
		assert!(!c.is_ok());

		// Would succeed on its own, but the chain is already broken
		assert_eq!(c.u8("third"), 0);
		assert_eq!(c.position(), 2);

		match c.finish() {
			Err(crate::reader::ReadError::OutOfBounds { label, offset, .. }) => {
				assert_eq!(label, "second");
				assert_eq!(offset, 2);
			}
			x => panic!("unexpected result {x:?}"),
		}
	}

	#[test]
	fn finish_reports_position() {
		let data = [1u8, 2, 3, 4, 5, 6];
		let r = BoundedReader::from_slice(&data);
		let mut c = r.chain(1);
		let x = c.array::<2>("pair");
		c.skip(1, "gap");
		let rest = c.bytes(2, "rest");
		assert_eq!(x, [2, 3]);
		assert_eq!(rest, vec![5, 6]);
		assert_eq!(c.finish().unwrap(), 6);
	}
}
