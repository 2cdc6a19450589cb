//! 12-byte months/days/milliseconds layout of the `duration` logical type

use crate::{error::DeError, value::Duration};

pub(crate) fn pack(duration: Duration) -> [u8; 12] {
	let mut buf = [0u8; 12];
	buf[0..4].copy_from_slice(&duration.months.to_le_bytes());
	buf[4..8].copy_from_slice(&duration.days.to_le_bytes());
	buf[8..12].copy_from_slice(&duration.millis.to_le_bytes());
	buf
}

pub(crate) fn unpack(buf: &[u8; 12]) -> Duration {
	let u32_at = |range: std::ops::Range<usize>| {
		u32::from_le_bytes(buf[range].try_into().expect("range is 4 bytes long"))
	};
	Duration {
		months: u32_at(0..4),
		days: u32_at(4..8),
		millis: u32_at(8..12),
	}
}

/// Targets that map the duration onto a plain time span cannot carry a
/// calendar months component
pub(crate) fn check_months_supported(
	duration: Duration,
	supports_months: bool,
	position: u64,
) -> Result<(), DeError> {
	if !supports_months && duration.months != 0 {
		return Err(DeError::overflow(
			position,
			format!(
				"duration has a months component ({}) which the target type cannot represent",
				duration.months
			),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_the_fixed_layout() {
		let duration = Duration::new(0x04030201, 0x08070605, 0x0C0B0A09);
		let packed = pack(duration);
		assert_eq!(packed, (1..13).collect::<Vec<u8>>().as_slice());
		assert_eq!(unpack(&packed), duration);
	}
}
