//! Scaled big-integer <-> two's-complement byte layout of the `decimal`
//! logical type
//!
//! Encoding rescales the value to the schema's scale (digits beyond the scale
//! are dropped, not rounded), then lays out `value * 10^scale` as big-endian
//! two's-complement bytes: minimal for the `bytes` representation,
//! sign-extended (or minimally truncated) to the declared size for the
//! `fixed` representation.

use {
	crate::error::{DeError, SerError},
	rust_decimal::Decimal,
};

fn rescaled(mut value: Decimal, scale: u32) -> Result<Decimal, SerError> {
	if value.scale() > scale {
		// truncate, never round up
		value = value.trunc_with_scale(scale);
	}
	if value.scale() < scale {
		value.rescale(scale);
		if value.scale() != scale {
			return Err(SerError::overflow(format!(
				"decimal cannot be scaled to schema scale {scale} within a 96-bit mantissa"
			)));
		}
	}
	Ok(value)
}

/// How many leading bytes can be dropped without altering the number
///
/// For a positive number these are 0x00 bytes followed by a byte with its MSB
/// unset, for a negative number 0xFF bytes followed by a byte with its MSB
/// set. Zero is still serialized as a single 0x00 byte in case other
/// implementations choke on empty bytes.
fn minimal_start(buf: &[u8; 16]) -> usize {
	let mut start = 0;
	if buf[0] & 0x80 == 0 {
		while buf.get(start).map_or(false, |&v| v == 0x00) {
			start += 1;
		}
		if start != 0 && buf.get(start).map_or(true, |&v| v & 0x80 != 0) {
			start -= 1;
		}
	} else {
		while buf.get(start).map_or(false, |&v| v == 0xFF) {
			start += 1;
		}
		if start != 0 && buf.get(start).map_or(true, |&v| v & 0x80 == 0) {
			start -= 1;
		}
	}
	start
}

/// Minimal big-endian two's-complement representation, for the `bytes`
/// underlying schema
pub(crate) fn to_scaled_bytes(value: Decimal, scale: u32) -> Result<Vec<u8>, SerError> {
	let value = rescaled(value, scale)?;
	let buf: [u8; 16] = value.mantissa().to_be_bytes();
	let start = minimal_start(&buf);
	Ok(buf[start..].to_vec())
}

/// Exactly `size` big-endian two's-complement bytes, for the `fixed`
/// underlying schema
pub(crate) fn to_scaled_bytes_fixed(
	value: Decimal,
	scale: u32,
	size: usize,
) -> Result<Vec<u8>, SerError> {
	let value = rescaled(value, scale)?;
	if size == 0 {
		// zero is the only number representable in zero bytes
		return if value.is_zero() {
			Ok(Vec::new())
		} else {
			Err(SerError::overflow(
				"non-zero decimal cannot be serialized as a fixed of size 0",
			))
		};
	}
	let buf: [u8; 16] = value.mantissa().to_be_bytes();
	let sign_fill = if buf[0] & 0x80 == 0 { 0x00 } else { 0xFF };
	let minimal_len = 16 - minimal_start(&buf);
	if minimal_len > size {
		return Err(SerError::overflow(format!(
			"decimal number does not fit in fixed size {size} (requires {minimal_len} bytes)"
		)));
	}
	let mut out = vec![sign_fill; size];
	if size >= 16 {
		out[size - 16..].copy_from_slice(&buf);
	} else {
		// everything dropped on the left is sign fill, as checked above
		out.copy_from_slice(&buf[16 - size..]);
	}
	Ok(out)
}

/// Interpret big-endian two's-complement bytes as a decimal with the schema's
/// scale
pub(crate) fn from_scaled_bytes(
	bytes: &[u8],
	scale: u32,
	position: u64,
) -> Result<Decimal, DeError> {
	if bytes.len() > 16 {
		return Err(DeError::overflow(
			position,
			format!(
				"decimals larger than 16 bytes are not supported (got {} bytes)",
				bytes.len()
			),
		));
	}
	let mut buf = [0u8; 16];
	let start = 16 - bytes.len();
	buf[start..].copy_from_slice(bytes);
	if bytes.first().map_or(false, |&v| v & 0x80 != 0) {
		// negative number: extend the sign over the full width
		for v in &mut buf[..start] {
			*v = 0xFF;
		}
	}
	let unscaled = i128::from_be_bytes(buf);
	Decimal::try_from_i128_with_scale(unscaled, scale).map_err(|e| {
		DeError::overflow(
			position,
			format!("decoded decimal does not fit in the target representation: {e}"),
		)
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	#[test]
	fn truncates_digits_beyond_scale() {
		let bytes = to_scaled_bytes(dec("1.23456"), 2).unwrap();
		assert_eq!(bytes, [123]);
		assert_eq!(from_scaled_bytes(&bytes, 2, 0).unwrap(), dec("1.23"));
	}

	#[test]
	fn negative_numbers_use_twos_complement() {
		let bytes = to_scaled_bytes(dec("-1"), 0).unwrap();
		assert_eq!(bytes, [0xFF]);
		assert_eq!(from_scaled_bytes(&bytes, 0, 0).unwrap(), dec("-1"));

		let bytes = to_scaled_bytes(dec("-256"), 0).unwrap();
		assert_eq!(bytes, [0xFF, 0x00]);
		assert_eq!(from_scaled_bytes(&bytes, 0, 0).unwrap(), dec("-256"));
	}

	#[test]
	fn zero_keeps_one_byte() {
		assert_eq!(to_scaled_bytes(dec("0"), 0).unwrap(), [0x00]);
	}

	#[test]
	fn positive_number_with_high_bit_keeps_a_leading_zero() {
		let bytes = to_scaled_bytes(dec("255"), 0).unwrap();
		assert_eq!(bytes, [0x00, 0xFF]);
		assert_eq!(from_scaled_bytes(&bytes, 0, 0).unwrap(), dec("255"));
	}

	#[test]
	fn fixed_representation_sign_extends() {
		let bytes = to_scaled_bytes_fixed(dec("-2"), 0, 4).unwrap();
		assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0xFE]);
		assert_eq!(from_scaled_bytes(&bytes, 0, 0).unwrap(), dec("-2"));
	}

	#[test]
	fn fixed_representation_rejects_overflow() {
		assert!(to_scaled_bytes_fixed(dec("70000"), 0, 2).is_err());
	}
}
