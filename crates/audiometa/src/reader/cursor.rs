use super::{BoundedReader, ReadError};

/// A sequential reader over a [`BoundedReader`].
///
/// Every successful read advances the cursor.
/// A failed read leaves the cursor where it was.
#[derive(Clone, Copy)]
pub struct ReadCursor<'a> {
	reader: BoundedReader<'a>,
	offset: u64,
}

impl<'a> ReadCursor<'a> {
	pub(super) fn new(reader: BoundedReader<'a>, offset: u64) -> Self {
		Self { reader, offset }
	}

	/// The absolute offset of the next byte we'll read
	pub fn position(&self) -> u64 {
		self.offset
	}

	/// Jump to an absolute offset.
	/// Bounds are checked on the next read.
	pub fn seek(&mut self, offset: u64) {
		self.offset = offset;
	}

	/// How many bytes are left in the source
	pub fn remaining(&self) -> u64 {
		self.reader.size().saturating_sub(self.offset)
	}

	/// The reader this cursor walks over
	pub fn reader(&self) -> BoundedReader<'a> {
		self.reader
	}

	/// Skip `n` bytes.
	/// Fails if that would move us past the end of the source.
	pub fn skip(&mut self, n: u64, label: &'static str) -> Result<(), ReadError> {
		self.reader.check(self.offset, n, label)?;
		self.offset += n;
		return Ok(());
	}

	/// Read `n` bytes
	pub fn read_bytes(&mut self, n: u64, label: &'static str) -> Result<Vec<u8>, ReadError> {
		let out = self.reader.read(self.offset, n, label)?;
		self.offset += n;
		return Ok(out);
	}

	/// Read `n` bytes as a string, replacing invalid UTF-8.
	pub fn read_string(&mut self, n: u64, label: &'static str) -> Result<String, ReadError> {
		let bytes = self.read_bytes(n, label)?;
		return Ok(String::from_utf8_lossy(&bytes).into_owned());
	}

	pub fn read_array<const N: usize>(&mut self, label: &'static str) -> Result<[u8; N], ReadError> {
		let out = self.reader.read_array::<N>(self.offset, label)?;
		self.offset += N as u64;
		return Ok(out);
	}

	pub fn read_u8(&mut self, label: &'static str) -> Result<u8, ReadError> {
		Ok(self.read_array::<1>(label)?[0])
	}

	pub fn read_u16_be(&mut self, label: &'static str) -> Result<u16, ReadError> {
		Ok(u16::from_be_bytes(self.read_array(label)?))
	}

	pub fn read_u16_le(&mut self, label: &'static str) -> Result<u16, ReadError> {
		Ok(u16::from_le_bytes(self.read_array(label)?))
	}

	pub fn read_u24_be(&mut self, label: &'static str) -> Result<u32, ReadError> {
		let [a, b, c] = self.read_array(label)?;
		Ok(u32::from_be_bytes([0, a, b, c]))
	}

	pub fn read_u32_be(&mut self, label: &'static str) -> Result<u32, ReadError> {
		Ok(u32::from_be_bytes(self.read_array(label)?))
	}

	pub fn read_u32_le(&mut self, label: &'static str) -> Result<u32, ReadError> {
		Ok(u32::from_le_bytes(self.read_array(label)?))
	}

	pub fn read_u64_be(&mut self, label: &'static str) -> Result<u64, ReadError> {
		Ok(u64::from_be_bytes(self.read_array(label)?))
	}

	pub fn read_u64_le(&mut self, label: &'static str) -> Result<u64, ReadError> {
		Ok(u64::from_le_bytes(self.read_array(label)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn advances_on_success_only() {
		let data = b"\x00\x00\x00\x05helloXYZ";
		let r = BoundedReader::from_slice(data);
		let mut c = r.cursor(0);

		let len = c.read_u32_be("len").unwrap();
		assert_eq!(c.read_string(len.into(), "text").unwrap(), "hello");
		assert_eq!(c.position(), 9);
		assert_eq!(c.remaining(), 3);

		assert!(c.read_u32_be("too long").is_err());
		assert_eq!(c.position(), 9);

		assert!(c.skip(4, "too far").is_err());
		c.skip(3, "rest").unwrap();
		assert_eq!(c.remaining(), 0);
	}

	#[test]
	fn u24() {
		let r = BoundedReader::from_slice(&[0x01, 0x02, 0x03]);
		assert_eq!(r.cursor(0).read_u24_be("x").unwrap(), 0x010203);
	}
}
