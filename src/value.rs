//! The dynamic value model that compiled routines read and produce

/// A dynamically-shaped value
///
/// Encode routines read these; decode routines produce them. A value is
/// expected to conform to the [`TypeResolution`](crate::types::TypeResolution)
/// the routine was compiled for; a routine that receives a value of another
/// shape fails with [`SerError::UnexpectedValue`](crate::SerError).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Null,
	Boolean(bool),
	Int(i32),
	Long(i64),
	Float(f32),
	Double(f64),
	Bytes(Vec<u8>),
	String(String),
	Decimal(rust_decimal::Decimal),
	/// Days since the unix epoch
	Date(i32),
	/// Nanoseconds since midnight
	Time(i64),
	/// Nanoseconds since the unix epoch
	Timestamp(i64),
	Duration(Duration),
	/// An enum symbol, by name
	Enum(String),
	Array(Vec<Value>),
	/// String-keyed entries, in insertion order
	Map(Vec<(String, Value)>),
	/// Fields in the order of the record's
	/// [`TypeResolution`](crate::types::TypeResolution) (schema field order
	/// for values produced against a dynamic target)
	Record(Vec<(String, Value)>),
}

impl Value {
	/// Short description of the value's shape, for diagnostics
	pub fn kind_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Boolean(_) => "boolean",
			Value::Int(_) => "int",
			Value::Long(_) => "long",
			Value::Float(_) => "float",
			Value::Double(_) => "double",
			Value::Bytes(_) => "bytes",
			Value::String(_) => "string",
			Value::Decimal(_) => "decimal",
			Value::Date(_) => "date",
			Value::Time(_) => "time",
			Value::Timestamp(_) => "timestamp",
			Value::Duration(_) => "duration",
			Value::Enum(_) => "enum",
			Value::Array(_) => "array",
			Value::Map(_) => "map",
			Value::Record(_) => "record",
		}
	}
}

/// An amount of time defined by a number of months, days and milliseconds,
/// mapping to the avro `duration` logical type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Duration {
	pub months: u32,
	pub days: u32,
	pub millis: u32,
}

impl Duration {
	pub fn new(months: u32, days: u32, millis: u32) -> Self {
		Self {
			months,
			days,
			millis,
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Boolean(v)
	}
}
impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v)
	}
}
impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Long(v)
	}
}
impl From<f32> for Value {
	fn from(v: f32) -> Self {
		Value::Float(v)
	}
}
impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Double(v)
	}
}
impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_owned())
	}
}
impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}
impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value::Bytes(v)
	}
}
impl From<rust_decimal::Decimal> for Value {
	fn from(v: rust_decimal::Decimal) -> Self {
		Value::Decimal(v)
	}
}
impl From<Duration> for Value {
	fn from(v: Duration) -> Self {
		Value::Duration(v)
	}
}
