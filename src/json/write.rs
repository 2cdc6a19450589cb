//! Streaming JSON output for compiled encode routines
//!
//! A thin state machine over a `Write`: frames track whether a comma is due,
//! string escaping and number formatting are delegated to `serde_json`.

use {crate::error::SerError, std::io::Write};

pub(crate) struct JsonWriter<'w> {
	out: &'w mut dyn Write,
	frames: Vec<Frame>,
}

enum Frame {
	Object { first: bool },
	Array { first: bool },
}

impl<'w> JsonWriter<'w> {
	pub(crate) fn new(out: &'w mut dyn Write) -> Self {
		Self {
			out,
			frames: Vec::new(),
		}
	}

	/// Comma bookkeeping before an array element or a top-level value
	///
	/// Values inside objects are prefixed by [`key`](Self::key) instead, which
	/// does its own bookkeeping.
	fn prefix_value(&mut self) -> Result<(), SerError> {
		if let Some(Frame::Array { first }) = self.frames.last_mut() {
			if !*first {
				self.out.write_all(b",")?;
			}
			*first = false;
		}
		Ok(())
	}

	pub(crate) fn key(&mut self, key: &str) -> Result<(), SerError> {
		if let Some(Frame::Object { first }) = self.frames.last_mut() {
			if !*first {
				self.out.write_all(b",")?;
			}
			*first = false;
		}
		serde_json::to_writer(&mut *self.out, key).map_err(|e| SerError::Io(e.into()))?;
		self.out.write_all(b":")?;
		Ok(())
	}

	pub(crate) fn null(&mut self) -> Result<(), SerError> {
		self.prefix_value()?;
		self.out.write_all(b"null")?;
		Ok(())
	}

	pub(crate) fn boolean(&mut self, b: bool) -> Result<(), SerError> {
		self.prefix_value()?;
		self.out.write_all(if b { b"true" } else { b"false" })?;
		Ok(())
	}

	pub(crate) fn long(&mut self, n: i64) -> Result<(), SerError> {
		self.prefix_value()?;
		serde_json::to_writer(&mut *self.out, &n).map_err(|e| SerError::Io(e.into()))?;
		Ok(())
	}

	pub(crate) fn float(&mut self, x: f32) -> Result<(), SerError> {
		if !x.is_finite() {
			return Err(SerError::overflow(
				"non-finite floats have no JSON representation",
			));
		}
		self.prefix_value()?;
		serde_json::to_writer(&mut *self.out, &x).map_err(|e| SerError::Io(e.into()))?;
		Ok(())
	}

	pub(crate) fn double(&mut self, x: f64) -> Result<(), SerError> {
		if !x.is_finite() {
			return Err(SerError::overflow(
				"non-finite floats have no JSON representation",
			));
		}
		self.prefix_value()?;
		serde_json::to_writer(&mut *self.out, &x).map_err(|e| SerError::Io(e.into()))?;
		Ok(())
	}

	pub(crate) fn string(&mut self, s: &str) -> Result<(), SerError> {
		self.prefix_value()?;
		serde_json::to_writer(&mut *self.out, s).map_err(|e| SerError::Io(e.into()))?;
		Ok(())
	}

	/// Bytes written as a string with one code point per byte
	pub(crate) fn byte_string(&mut self, bytes: &[u8]) -> Result<(), SerError> {
		let s: String = bytes.iter().map(|&b| b as char).collect();
		self.string(&s)
	}

	pub(crate) fn begin_object(&mut self) -> Result<(), SerError> {
		self.prefix_value()?;
		self.out.write_all(b"{")?;
		self.frames.push(Frame::Object { first: true });
		Ok(())
	}

	pub(crate) fn end_object(&mut self) -> Result<(), SerError> {
		debug_assert!(matches!(self.frames.last(), Some(Frame::Object { .. })));
		self.frames.pop();
		self.out.write_all(b"}")?;
		Ok(())
	}

	pub(crate) fn begin_array(&mut self) -> Result<(), SerError> {
		self.prefix_value()?;
		self.out.write_all(b"[")?;
		self.frames.push(Frame::Array { first: true });
		Ok(())
	}

	pub(crate) fn end_array(&mut self) -> Result<(), SerError> {
		debug_assert!(matches!(self.frames.last(), Some(Frame::Array { .. })));
		self.frames.pop();
		self.out.write_all(b"]")?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn writes_nested_structures() {
		let mut out = Vec::new();
		let mut w = JsonWriter::new(&mut out);
		w.begin_object().unwrap();
		w.key("a").unwrap();
		w.begin_array().unwrap();
		w.long(1).unwrap();
		w.string("x\"y").unwrap();
		w.null().unwrap();
		w.end_array().unwrap();
		w.key("b").unwrap();
		w.boolean(true).unwrap();
		w.end_object().unwrap();
		assert_eq!(
			String::from_utf8(out).unwrap(),
			r#"{"a":[1,"x\"y",null],"b":true}"#
		);
	}

	#[test]
	fn byte_strings_use_one_code_point_per_byte() {
		let mut out = Vec::new();
		let mut w = JsonWriter::new(&mut out);
		w.byte_string(&[0x00, 0x41, 0xFF]).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "\"\\u0000A\u{ff}\"");
	}

	#[test]
	fn rejects_non_finite_floats() {
		let mut out = Vec::new();
		let mut w = JsonWriter::new(&mut out);
		assert!(matches!(w.double(f64::NAN), Err(SerError::Overflow(_))));
	}
}
