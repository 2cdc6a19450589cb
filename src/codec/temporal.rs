//! Unit conversions between the nanosecond-based native representation and
//! the milli/microsecond wire granularities
//!
//! Narrowing (encode) divides and silently drops sub-granularity precision;
//! widening (decode) multiplies with an overflow check.

use crate::error::{DeError, SerError};

pub(crate) const NANOS_PER_MILLI: i64 = 1_000_000;
pub(crate) const NANOS_PER_MICRO: i64 = 1_000;

pub(crate) fn nanos_to_millis(nanos: i64) -> i64 {
	nanos / NANOS_PER_MILLI
}

pub(crate) fn nanos_to_micros(nanos: i64) -> i64 {
	nanos / NANOS_PER_MICRO
}

/// `time-millis` is an `int` on the wire
pub(crate) fn time_millis_i32(nanos: i64) -> Result<i32, SerError> {
	i32::try_from(nanos / NANOS_PER_MILLI)
		.map_err(|_| SerError::overflow("time of day in milliseconds does not fit in an int"))
}

pub(crate) fn millis_to_nanos(millis: i64, position: u64) -> Result<i64, DeError> {
	millis.checked_mul(NANOS_PER_MILLI).ok_or_else(|| {
		DeError::overflow(
			position,
			"value in milliseconds does not fit in the nanosecond representation",
		)
	})
}

pub(crate) fn micros_to_nanos(micros: i64, position: u64) -> Result<i64, DeError> {
	micros.checked_mul(NANOS_PER_MICRO).ok_or_else(|| {
		DeError::overflow(
			position,
			"value in microseconds does not fit in the nanosecond representation",
		)
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn narrowing_drops_sub_granularity_precision() {
		assert_eq!(nanos_to_millis(1_999_999), 1);
		assert_eq!(nanos_to_micros(1_999), 1);
		assert_eq!(nanos_to_millis(-1_999_999), -1);
	}

	#[test]
	fn widening_checks_for_overflow() {
		assert_eq!(millis_to_nanos(1, 0).unwrap(), 1_000_000);
		assert_eq!(micros_to_nanos(1, 0).unwrap(), 1_000);
		assert!(matches!(
			millis_to_nanos(i64::MAX, 0),
			Err(DeError::Overflow { .. })
		));
	}
}
