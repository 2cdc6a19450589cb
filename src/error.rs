//! Error taxonomy: build-time ([`BuildError`]), encode-time ([`SerError`])
//! and decode-time ([`DeError`])
//!
//! Building happens once and fails loudly and early; nothing build-time is
//! retried once a case has committed to a (type, schema) pair. Errors from
//! running a compiled routine propagate to its caller as-is, with no
//! automatic recovery.

use {crate::value::Value, std::borrow::Cow};

/// The reason for which one builder case declined a (type, schema) pair
#[derive(Clone, Debug)]
pub struct CaseRejection {
	/// Name of the case that declined
	pub case: &'static str,
	pub reason: String,
}

impl std::fmt::Display for CaseRejection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.case, self.reason)
	}
}

/// Any error that may abort compiling a routine
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
	/// No case could map the type to the schema. Carries every case's
	/// rejection reason, not just the last one.
	#[error("no builder case matched the (type, schema) pair:{}", format_attempts(.attempts))]
	UnsupportedType { attempts: Vec<CaseRejection> },
	/// A case matched the type shape but the schema is structurally wrong for
	/// that case
	#[error("unsupported schema: {0}")]
	UnsupportedSchema(Cow<'static, str>),
	/// More than one native member matches the same schema name under fuzzy
	/// matching
	#[error("ambiguous mapping for {schema_name:?}: members {candidates:?} all match")]
	AmbiguousMapping {
		schema_name: String,
		candidates: Vec<String>,
	},
}

impl BuildError {
	/// Hard failure raised from within a case that already committed to the
	/// schema kind
	pub(crate) fn unsupported(case: &'static str, reason: impl Into<String>) -> Self {
		BuildError::UnsupportedType {
			attempts: vec![CaseRejection {
				case,
				reason: reason.into(),
			}],
		}
	}
}

fn format_attempts(attempts: &[CaseRejection]) -> String {
	let mut out = String::new();
	for attempt in attempts {
		out.push_str("\n\t");
		out.push_str(&attempt.to_string());
	}
	out
}

/// Any error that may happen when running a compiled encode routine
#[derive(Debug, thiserror::Error)]
pub enum SerError {
	/// The value handed to the routine does not have the shape the routine
	/// was compiled for
	#[error("value does not match the compiled type: expected {expected}, got {got}")]
	UnexpectedValue {
		expected: &'static str,
		got: &'static str,
	},
	/// A `fixed` schema requires exactly its declared size
	#[error("fixed value size mismatch: schema size {expected}, value size {actual}")]
	FixedSizeMismatch { expected: usize, actual: usize },
	/// The value cannot be represented within the schema's numeric bounds
	#[error("value out of range: {0}")]
	Overflow(Cow<'static, str>),
	/// No member of the union schema can represent the value
	#[error("no union member matches value of kind {0}")]
	NoUnionMember(&'static str),
	#[error("io error while writing: {0}")]
	Io(#[from] std::io::Error),
}

impl SerError {
	pub(crate) fn mismatch(expected: &'static str, got: &Value) -> Self {
		SerError::UnexpectedValue {
			expected,
			got: got.kind_name(),
		}
	}

	pub(crate) fn overflow(message: impl Into<Cow<'static, str>>) -> Self {
		SerError::Overflow(message.into())
	}
}

/// Any error that may happen when running a compiled decode routine
#[derive(Debug, thiserror::Error)]
pub enum DeError {
	/// The input stream violates the expected shape. `position` is the byte
	/// offset at which this was detected.
	#[error("invalid encoding at byte {position}: {message}")]
	InvalidEncoding {
		position: u64,
		message: Cow<'static, str>,
	},
	/// A decoded value does not fit the target representation
	#[error("value out of range at byte {position}: {message}")]
	Overflow {
		position: u64,
		message: Cow<'static, str>,
	},
	#[error("io error while reading: {0}")]
	Io(#[from] std::io::Error),
}

impl DeError {
	pub(crate) fn invalid(position: u64, message: impl Into<Cow<'static, str>>) -> Self {
		DeError::InvalidEncoding {
			position,
			message: message.into(),
		}
	}

	pub(crate) fn overflow(position: u64, message: impl Into<Cow<'static, str>>) -> Self {
		DeError::Overflow {
			position,
			message: message.into(),
		}
	}
}
