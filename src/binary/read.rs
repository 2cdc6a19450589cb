//! Input abstraction for compiled decode routines
//!
//! Routines read from a `&mut dyn ByteRead`, so one compiled routine serves
//! both slice and buffered-reader inputs. The reader tracks how many bytes it
//! has handed out so that decode errors can report a byte offset.

use crate::error::DeError;

/// What a compiled binary decode routine reads from
pub trait ByteRead: std::io::Read {
	/// Number of bytes consumed so far
	fn position(&self) -> u64;
}

/// Reads from an in-memory byte slice
pub struct SliceRead<'de> {
	slice: &'de [u8],
	consumed: u64,
}

impl<'de> SliceRead<'de> {
	pub fn new(slice: &'de [u8]) -> Self {
		Self { slice, consumed: 0 }
	}

	/// Whatever the routine did not consume
	pub fn remaining(&self) -> &'de [u8] {
		self.slice
	}
}

impl std::io::Read for SliceRead<'_> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = self.slice.len().min(buf.len());
		buf[..n].copy_from_slice(&self.slice[..n]);
		self.slice = &self.slice[n..];
		self.consumed += n as u64;
		Ok(n)
	}
}

impl ByteRead for SliceRead<'_> {
	fn position(&self) -> u64 {
		self.consumed
	}
}

/// Reads from any [`BufRead`](std::io::BufRead)
pub struct ReaderRead<R> {
	reader: R,
	consumed: u64,
}

impl<R: std::io::BufRead> ReaderRead<R> {
	pub fn new(reader: R) -> Self {
		Self {
			reader,
			consumed: 0,
		}
	}

	pub fn into_inner(self) -> R {
		self.reader
	}
}

impl<R: std::io::BufRead> std::io::Read for ReaderRead<R> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = self.reader.read(buf)?;
		self.consumed += n as u64;
		Ok(n)
	}
}

impl<R: std::io::BufRead> ByteRead for ReaderRead<R> {
	fn position(&self) -> u64 {
		self.consumed
	}
}

pub(crate) fn read_byte(reader: &mut dyn ByteRead) -> Result<u8, DeError> {
	let mut buf = [0u8; 1];
	reader.read_exact(&mut buf)?;
	Ok(buf[0])
}

pub(crate) fn read_exact_vec(reader: &mut dyn ByteRead, len: usize) -> Result<Vec<u8>, DeError> {
	let mut buf = vec![0u8; len];
	reader.read_exact(&mut buf)?;
	Ok(buf)
}

/// Decode a zigzag varint `long`
///
/// Bounded at 10 bytes, and the 10th byte may only carry the final bit; any
/// extra set bit means the encoding does not fit in 64 bits.
pub(crate) fn read_long(reader: &mut dyn ByteRead) -> Result<i64, DeError> {
	let start = reader.position();
	let mut acc: u64 = 0;
	let mut shift: u32 = 0;
	loop {
		let byte = read_byte(reader)?;
		if shift == 63 && byte & !0x01 != 0 {
			return Err(DeError::overflow(
				start,
				"varint does not fit in a 64-bit integer",
			));
		}
		acc |= u64::from(byte & 0x7F) << shift;
		if byte & 0x80 == 0 {
			break;
		}
		shift += 7;
		if shift > 63 {
			return Err(DeError::overflow(start, "varint is longer than 10 bytes"));
		}
	}
	Ok(((acc >> 1) as i64) ^ -((acc & 1) as i64))
}

/// Decode a zigzag varint `int`
pub(crate) fn read_int(reader: &mut dyn ByteRead) -> Result<i32, DeError> {
	let start = reader.position();
	let n = read_long(reader)?;
	i32::try_from(n).map_err(|_| DeError::overflow(start, "decoded int does not fit in 32 bits"))
}

/// Decode a non-negative length prefix
pub(crate) fn read_len(reader: &mut dyn ByteRead) -> Result<usize, DeError> {
	let start = reader.position();
	let n = read_long(reader)?;
	usize::try_from(n).map_err(|_| DeError::invalid(start, "negative length prefix"))
}

/// Decode the item count of an array/map block
///
/// A negative count means the writer also provided the block's size in bytes
/// (which we read and ignore), and the actual count is the absolute value.
/// `0` terminates the sequence.
pub(crate) fn read_block_len(reader: &mut dyn ByteRead) -> Result<usize, DeError> {
	let start = reader.position();
	let mut len = read_long(reader)?;
	if len < 0 {
		read_long(reader)?;
		len = len
			.checked_neg()
			.ok_or_else(|| DeError::invalid(start, "block count of i64::MIN"))?;
	}
	usize::try_from(len).map_err(|_| DeError::invalid(start, "block count does not fit in usize"))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn long_of(bytes: &[u8]) -> Result<i64, DeError> {
		read_long(&mut SliceRead::new(bytes))
	}

	#[test]
	fn decodes_zigzag_varints() {
		assert_eq!(long_of(&[0x00]).unwrap(), 0);
		assert_eq!(long_of(&[0x01]).unwrap(), -1);
		assert_eq!(long_of(&[0x02]).unwrap(), 1);
		assert_eq!(long_of(&[0x80, 0x01]).unwrap(), 64);
		assert_eq!(
			long_of(&[0xFE, 0xFF, 0xFF, 0xFF, 0x0F]).unwrap(),
			i64::from(i32::MAX)
		);
		assert_eq!(
			long_of(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]).unwrap(),
			i64::from(i32::MIN)
		);
		assert_eq!(
			long_of(&[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]).unwrap(),
			i64::MAX
		);
		assert_eq!(
			long_of(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]).unwrap(),
			i64::MIN
		);
	}

	#[test]
	fn rejects_oversized_varints() {
		assert!(matches!(
			long_of(&[0xFF; 10]),
			Err(DeError::Overflow { .. })
		));
		assert!(matches!(
			long_of(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
			Err(DeError::Overflow { .. })
		));
	}

	#[test]
	fn int_rejects_values_beyond_32_bits() {
		let encoded = [0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
		assert!(matches!(
			read_int(&mut SliceRead::new(&encoded)),
			Err(DeError::Overflow { .. })
		));
	}

	#[test]
	fn tracks_position() {
		let mut reader = SliceRead::new(&[0x80, 0x01, 0x02]);
		read_long(&mut reader).unwrap();
		assert_eq!(reader.position(), 2);
		read_long(&mut reader).unwrap();
		assert_eq!(reader.position(), 3);
		assert!(matches!(read_byte(&mut reader), Err(DeError::Io(_))));
	}
}
