//! MP4 atoms (also called boxes)

use smartstring::{LazyCompact, SmartString};
use thiserror::Error;
use tracing::trace;

use crate::reader::{BoundedReader, ReadError};

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum AtomError {
	#[error("could not read atom")]
	Read(#[from] ReadError),

	#[error("atom at offset {offset} has impossible size {size}")]
	TooSmall { offset: u64, size: u64 },

	#[error("atom {name} at offset {offset} ends past its parent ({size} bytes, parent ends at {parent_end})")]
	PastEnd {
		name: SmartString<LazyCompact>,
		offset: u64,
		size: u64,
		parent_end: u64,
	},

	#[error("{name} atom at offset {offset} is malformed: {reason}")]
	Malformed {
		name: SmartString<LazyCompact>,
		offset: u64,
		reason: &'static str,
	},
}

impl AtomError {
	/// Where in the file this error happened, if we know
	pub fn offset(&self) -> u64 {
		match self {
			Self::Read(e) => e.offset().unwrap_or(0),
			Self::TooSmall { offset, .. }
			| Self::PastEnd { offset, .. }
			| Self::Malformed { offset, .. } => *offset,
		}
	}
}

/// Turn a fourcc into a printable name.
/// Apple's keys start with 0xA9, which is `©` in latin-1.
pub fn fourcc_name(kind: &[u8; 4]) -> SmartString<LazyCompact> {
	kind.iter().map(|b| char::from(*b)).collect()
}

/// An atom header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
	pub kind: [u8; 4],

	/// The position of this atom's header
	pub offset: u64,

	/// 8, or 16 for atoms with a 64-bit size
	pub header_len: u64,

	/// The size of this atom, including its header
	pub size: u64,
}

impl Atom {
	/// Read the atom header at `offset`.
	/// The atom must end at or before `parent_end`.
	pub fn read(reader: BoundedReader<'_>, offset: u64, parent_end: u64) -> Result<Self, AtomError> {
		let mut d = reader.chain(offset);
		let size32 = d.u32_be("atom size");
		let kind = d.array::<4>("atom type");
		d.finish()?;

		let (size, header_len) = match size32 {
			// Extends to the end of the parent
			0 => (parent_end.saturating_sub(offset), 8),
			1 => (reader.read_u64_be(offset + 8, "atom 64-bit size")?, 16),
			x => (u64::from(x), 8),
		};

		if size < header_len {
			return Err(AtomError::TooSmall { offset, size });
		}

		if offset.checked_add(size).map_or(true, |end| end > parent_end) {
			return Err(AtomError::PastEnd {
				name: fourcc_name(&kind),
				offset,
				size,
				parent_end,
			});
		}

		return Ok(Self {
			kind,
			offset,
			header_len,
			size,
		});
	}

	pub fn name(&self) -> SmartString<LazyCompact> {
		fourcc_name(&self.kind)
	}

	pub fn data_offset(&self) -> u64 {
		self.offset + self.header_len
	}

	pub fn data_len(&self) -> u64 {
		self.size - self.header_len
	}

	pub fn end(&self) -> u64 {
		self.offset + self.size
	}

	/// Read this atom's payload
	pub fn data(&self, reader: BoundedReader<'_>) -> Result<Vec<u8>, AtomError> {
		Ok(reader.read(self.data_offset(), self.data_len(), "atom data")?)
	}

	/// Iterate over the atoms inside this one,
	/// starting `skip` bytes into its payload.
	pub fn children<'a>(&self, reader: BoundedReader<'a>, skip: u64) -> AtomWalker<'a> {
		AtomWalker::new(reader, self.data_offset() + skip, self.end())
	}

	/// Find the first child of the given kind
	pub fn child(
		&self,
		reader: BoundedReader<'_>,
		kind: &[u8; 4],
	) -> Result<Option<Self>, AtomError> {
		for a in self.children(reader, 0) {
			let a = a?;
			if &a.kind == kind {
				return Ok(Some(a));
			}
		}
		return Ok(None);
	}

	/// Follow a path of child kinds from this atom.
	/// `meta` atoms are handled like [`Atom::meta_children`].
	pub fn find(
		&self,
		reader: BoundedReader<'_>,
		path: &[&[u8; 4]],
	) -> Result<Option<Self>, AtomError> {
		let mut current = *self;
		for kind in path {
			let walker = if &current.kind == b"meta" {
				current.meta_children(reader)?
			} else {
				current.children(reader, 0)
			};

			let mut found = None;
			for a in walker {
				let a = a?;
				if &a.kind == *kind {
					found = Some(a);
					break;
				}
			}

			match found {
				Some(a) => current = a,
				None => return Ok(None),
			}
		}
		return Ok(Some(current));
	}

	/// The children of a `meta` atom.
	///
	/// ISO files make `meta` a full atom with a version and flags,
	/// QuickTime files don't. We tell them apart by looking for `hdlr`.
	pub fn meta_children<'a>(&self, reader: BoundedReader<'a>) -> Result<AtomWalker<'a>, AtomError> {
		let child = reader.read_array::<4>(self.data_offset() + 4, "meta child type")?;
		if &child == b"hdlr" {
			return Ok(self.children(reader, 0));
		} else {
			return Ok(self.children(reader, 4));
		}
	}
}

/// Walks a sequence of sibling atoms
pub struct AtomWalker<'a> {
	reader: BoundedReader<'a>,
	offset: u64,
	end: u64,
	done: bool,
}

impl<'a> AtomWalker<'a> {
	/// Walk the atoms in `start..end`
	pub fn new(reader: BoundedReader<'a>, start: u64, end: u64) -> Self {
		Self {
			reader,
			offset: start,
			end: end.min(reader.size()),
			done: false,
		}
	}
}

impl Iterator for AtomWalker<'_> {
	type Item = Result<Atom, AtomError>;

	fn next(&mut self) -> Option<Self::Item> {
		// Some writers leave a few zero bytes after the last child
		if self.done || self.offset + 8 > self.end {
			return None;
		}

		match Atom::read(self.reader, self.offset, self.end) {
			Ok(a) => {
				trace!(message = "Found atom", name = a.name().as_str(), offset = a.offset, size = a.size);
				self.offset = a.end();
				return Some(Ok(a));
			}
			Err(e) => {
				self.done = true;
				return Some(Err(e));
			}
		}
	}
}

/// Split the version and flags off a full atom's payload
pub fn full_atom(atom: &Atom, data: &[u8]) -> Result<(u8, u32), AtomError> {
	if data.len() < 4 {
		return Err(AtomError::Malformed {
			name: atom.name(),
			offset: atom.offset,
			reason: "missing version and flags",
		});
	}

	let flags = u32::from_be_bytes([0, data[1], data[2], data[3]]);
	return Ok((data[0], flags));
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
		let mut out = (8 + payload.len() as u32).to_be_bytes().to_vec();
		out.extend(kind);
		out.extend(payload);
		out
	}

	pub(crate) fn container(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
		atom(kind, &children.concat())
	}

	#[test]
	fn walk() {
		let mut data = atom(b"ftyp", b"M4A \0\0\0\0");
		data.extend(container(
			b"moov",
			&[atom(b"mvhd", &[0; 4]), container(b"udta", &[atom(b"\xa9nam", b"x")])],
		));
		// Trailing zeros
		data.extend([0u8; 4]);

		let r = BoundedReader::from_slice(&data);
		let top = AtomWalker::new(r, 0, r.size())
			.map(|x| x.unwrap())
			.collect::<Vec<_>>();
		assert_eq!(top.len(), 2);
		assert_eq!(&top[1].kind, b"moov");

		let nam = top[1].find(r, &[b"udta", b"\xa9nam"]).unwrap().unwrap();
		assert_eq!(nam.name().as_str(), "©nam");
		assert_eq!(nam.data(r).unwrap(), b"x");

		assert_eq!(top[1].find(r, &[b"trak"]).unwrap(), None);
		assert!(top[1].child(r, b"mvhd").unwrap().is_some());
	}

	#[test]
	fn sizes() {
		// 64-bit size
		let mut data = 1u32.to_be_bytes().to_vec();
		data.extend(b"mdat");
		data.extend(20u64.to_be_bytes());
		data.extend([7u8; 4]);
		let r = BoundedReader::from_slice(&data);
		let a = Atom::read(r, 0, r.size()).unwrap();
		assert_eq!(a.header_len, 16);
		assert_eq!(a.data_len(), 4);

		// Size zero runs to the end
		let mut data = 0u32.to_be_bytes().to_vec();
		data.extend(b"mdat");
		data.extend([0u8; 10]);
		let r = BoundedReader::from_slice(&data);
		assert_eq!(Atom::read(r, 0, r.size()).unwrap().size, 18);

		// Too small, and too big
		let data = atom(b"free", b"");
		let mut small = data.clone();
		small[3] = 4;
		let r = BoundedReader::from_slice(&small);
		assert!(matches!(Atom::read(r, 0, r.size()), Err(AtomError::TooSmall { size: 4, .. })));

		let mut big = data;
		big[3] = 9;
		let r = BoundedReader::from_slice(&big);
		assert!(matches!(Atom::read(r, 0, r.size()), Err(AtomError::PastEnd { .. })));
	}

	#[test]
	fn huge_64bit_size() {
		let mut data = atom(b"ftyp", b"M4A \0\0\0\0");
		let offset = data.len() as u64;
		data.extend(1u32.to_be_bytes());
		data.extend(b"mdat");
		data.extend((u64::MAX - 4).to_be_bytes());
		data.extend([0u8; 8]);

		let r = BoundedReader::from_slice(&data);
		assert!(matches!(
			Atom::read(r, offset, r.size()),
			Err(AtomError::PastEnd { offset: o, .. }) if o == offset
		));

		// The walker stops at the broken atom
		let walked = AtomWalker::new(r, 0, r.size()).collect::<Vec<_>>();
		assert_eq!(walked.len(), 2);
		assert!(walked[0].is_ok());
		assert!(walked[1].is_err());
	}

	#[test]
	fn meta_styles() {
		let ilst = container(b"ilst", &[]);
		let hdlr = atom(b"hdlr", &[0; 20]);

		// ISO style, with version and flags
		let mut iso_payload = vec![0u8; 4];
		iso_payload.extend(&hdlr);
		iso_payload.extend(&ilst);
		let iso = atom(b"meta", &iso_payload);

		// QuickTime style
		let qt = container(b"meta", &[hdlr, ilst]);

		for data in [iso, qt] {
			let r = BoundedReader::from_slice(&data);
			let meta = Atom::read(r, 0, r.size()).unwrap();
			let kinds = meta
				.meta_children(r)
				.unwrap()
				.map(|x| x.unwrap().kind)
				.collect::<Vec<_>>();
			assert_eq!(kinds, vec![*b"hdlr", *b"ilst"]);
		}
	}
}
