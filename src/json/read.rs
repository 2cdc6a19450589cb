//! Minimal JSON lexer for compiled decode routines
//!
//! Routines drive the lexer token by token; nesting is tracked by the
//! routines themselves, so the lexer only has to classify the next token.
//! Separators (`,` and `:`) are treated as whitespace. Errors carry the byte
//! offset at which the offending token starts.

use crate::error::DeError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
	ObjectStart,
	ObjectEnd,
	ArrayStart,
	ArrayEnd,
	String(String),
	/// Raw number text, parsed by the routine that knows the expected width
	Number(String),
	Boolean(bool),
	Null,
}

pub(crate) struct JsonReader<'de> {
	input: &'de [u8],
	pos: usize,
	peeked: Option<Token>,
}

impl<'de> JsonReader<'de> {
	pub(crate) fn new(input: &'de [u8]) -> Self {
		Self {
			input,
			pos: 0,
			peeked: None,
		}
	}

	/// Byte offset of the lexer, for error reporting
	pub(crate) fn position(&self) -> u64 {
		self.pos as u64
	}

	pub(crate) fn next(&mut self) -> Result<Token, DeError> {
		if let Some(token) = self.peeked.take() {
			return Ok(token);
		}
		self.lex()
	}

	pub(crate) fn peek(&mut self) -> Result<&Token, DeError> {
		if self.peeked.is_none() {
			self.peeked = Some(self.lex()?);
		}
		Ok(self.peeked.as_ref().expect("just populated"))
	}

	/// Consume one complete value, whatever its shape
	pub(crate) fn skip_value(&mut self) -> Result<(), DeError> {
		let mut depth = 0usize;
		loop {
			let start = self.position();
			match self.next()? {
				Token::ObjectStart | Token::ArrayStart => depth += 1,
				Token::ObjectEnd | Token::ArrayEnd => {
					depth = depth
						.checked_sub(1)
						.ok_or_else(|| DeError::invalid(start, "unbalanced closing bracket"))?;
				}
				Token::String(_) | Token::Number(_) | Token::Boolean(_) | Token::Null => {}
			}
			if depth == 0 {
				return Ok(());
			}
		}
	}

	/// Check that nothing but whitespace remains
	pub(crate) fn end(&mut self) -> Result<(), DeError> {
		if self.peeked.is_some() {
			return Err(DeError::invalid(self.position(), "trailing data"));
		}
		self.skip_filler();
		if self.pos != self.input.len() {
			return Err(DeError::invalid(self.position(), "trailing data"));
		}
		Ok(())
	}

	fn skip_filler(&mut self) {
		while let Some(&b) = self.input.get(self.pos) {
			match b {
				b' ' | b'\t' | b'\n' | b'\r' | b',' | b':' => self.pos += 1,
				_ => break,
			}
		}
	}

	fn lex(&mut self) -> Result<Token, DeError> {
		self.skip_filler();
		let start = self.position();
		let Some(&b) = self.input.get(self.pos) else {
			return Err(DeError::invalid(start, "unexpected end of input"));
		};
		match b {
			b'{' => {
				self.pos += 1;
				Ok(Token::ObjectStart)
			}
			b'}' => {
				self.pos += 1;
				Ok(Token::ObjectEnd)
			}
			b'[' => {
				self.pos += 1;
				Ok(Token::ArrayStart)
			}
			b']' => {
				self.pos += 1;
				Ok(Token::ArrayEnd)
			}
			b'"' => Ok(Token::String(self.lex_string()?)),
			b't' => {
				self.expect_word(b"true")?;
				Ok(Token::Boolean(true))
			}
			b'f' => {
				self.expect_word(b"false")?;
				Ok(Token::Boolean(false))
			}
			b'n' => {
				self.expect_word(b"null")?;
				Ok(Token::Null)
			}
			b'-' | b'0'..=b'9' => Ok(Token::Number(self.lex_number())),
			_ => Err(DeError::invalid(start, "unexpected character")),
		}
	}

	fn expect_word(&mut self, word: &'static [u8]) -> Result<(), DeError> {
		if self.input[self.pos..].starts_with(word) {
			self.pos += word.len();
			Ok(())
		} else {
			Err(DeError::invalid(self.position(), "unexpected character"))
		}
	}

	fn lex_number(&mut self) -> String {
		let start = self.pos;
		while let Some(&b) = self.input.get(self.pos) {
			match b {
				b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E' => self.pos += 1,
				_ => break,
			}
		}
		// the span only holds ascii
		String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
	}

	fn lex_string(&mut self) -> Result<String, DeError> {
		let start = self.position();
		self.pos += 1;
		let mut s = String::new();
		loop {
			let rest = &self.input[self.pos..];
			let stop = rest
				.iter()
				.position(|&b| b == b'"' || b == b'\\')
				.ok_or_else(|| DeError::invalid(start, "unterminated string"))?;
			let chunk = std::str::from_utf8(&rest[..stop])
				.map_err(|_| DeError::invalid(start, "string is not valid utf-8"))?;
			s.push_str(chunk);
			self.pos += stop;
			match self.input[self.pos] {
				b'"' => {
					self.pos += 1;
					return Ok(s);
				}
				_ => {
					self.pos += 1;
					s.push(self.lex_escape()?);
				}
			}
		}
	}

	fn lex_escape(&mut self) -> Result<char, DeError> {
		let start = self.position();
		let Some(&esc) = self.input.get(self.pos) else {
			return Err(DeError::invalid(start, "truncated escape sequence"));
		};
		self.pos += 1;
		Ok(match esc {
			b'"' => '"',
			b'\\' => '\\',
			b'/' => '/',
			b'b' => '\u{8}',
			b'f' => '\u{c}',
			b'n' => '\n',
			b'r' => '\r',
			b't' => '\t',
			b'u' => {
				let hi = self.hex4()?;
				if (0xD800..0xDC00).contains(&hi) {
					// high surrogate: a low surrogate escape must follow
					if self.input.get(self.pos) == Some(&b'\\')
						&& self.input.get(self.pos + 1) == Some(&b'u')
					{
						self.pos += 2;
						let lo = self.hex4()?;
						if !(0xDC00..0xE000).contains(&lo) {
							return Err(DeError::invalid(start, "unpaired surrogate"));
						}
						let c = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
						char::from_u32(c)
							.ok_or_else(|| DeError::invalid(start, "invalid surrogate pair"))?
					} else {
						return Err(DeError::invalid(start, "unpaired surrogate"));
					}
				} else if (0xDC00..0xE000).contains(&hi) {
					return Err(DeError::invalid(start, "unpaired surrogate"));
				} else {
					char::from_u32(hi)
						.ok_or_else(|| DeError::invalid(start, "invalid \\u escape"))?
				}
			}
			_ => return Err(DeError::invalid(start, "invalid escape sequence")),
		})
	}

	fn hex4(&mut self) -> Result<u32, DeError> {
		let start = self.position();
		let chunk = self
			.input
			.get(self.pos..self.pos + 4)
			.ok_or_else(|| DeError::invalid(start, "truncated \\u escape"))?;
		self.pos += 4;
		let s = std::str::from_utf8(chunk)
			.map_err(|_| DeError::invalid(start, "invalid \\u escape"))?;
		u32::from_str_radix(s, 16).map_err(|_| DeError::invalid(start, "invalid \\u escape"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tokens(input: &str) -> Vec<Token> {
		let mut reader = JsonReader::new(input.as_bytes());
		let mut out = Vec::new();
		loop {
			match reader.peek() {
				Ok(_) => out.push(reader.next().unwrap()),
				Err(_) => break,
			}
		}
		out
	}

	#[test]
	fn lexes_structures() {
		assert_eq!(
			tokens(r#"{"a": [1, -2.5e3, true, null]}"#),
			vec![
				Token::ObjectStart,
				Token::String("a".to_owned()),
				Token::ArrayStart,
				Token::Number("1".to_owned()),
				Token::Number("-2.5e3".to_owned()),
				Token::Boolean(true),
				Token::Null,
				Token::ArrayEnd,
				Token::ObjectEnd,
			]
		);
	}

	#[test]
	fn unescapes_strings() {
		assert_eq!(
			tokens(r#""a\n\"Aÿ""#),
			vec![Token::String("a\n\"A\u{ff}".to_owned())]
		);
	}

	#[test]
	fn unescapes_surrogate_pairs() {
		assert_eq!(
			tokens("\"\\ud83d\\ude00\""),
			vec![Token::String("\u{1F600}".to_owned())]
		);
	}

	#[test]
	fn rejects_unpaired_surrogates() {
		let mut reader = JsonReader::new(br#""\ud83d""#);
		assert!(matches!(
			reader.next(),
			Err(DeError::InvalidEncoding { .. })
		));
	}

	#[test]
	fn skips_whole_values() {
		let mut reader = JsonReader::new(br#"{"a": [1, {"b": 2}]} true"#);
		reader.skip_value().unwrap();
		assert_eq!(reader.next().unwrap(), Token::Boolean(true));
		reader.end().unwrap();
	}
}
