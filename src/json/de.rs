//! Builder cases for the JSON decode direction
//!
//! Mirrors the JSON encode case list. Record fields may arrive in any order;
//! a field missing from the text falls back to its schema default, and an
//! unknown key is an error.

use {
	super::{union_key, JsonDeFn, JsonReader},
	crate::{
		build::{dispatch, matching, BuildRequest, BuilderCase, BuilderContext, CaseOutcome},
		codec,
		error::{BuildError, DeError},
		json::read::Token,
		schema::{LogicalType, SchemaType},
		types::TypeResolution,
		value::Value,
	},
	std::{
		collections::HashMap,
		sync::{Arc, OnceLock},
	},
};

const CASES: &[&dyn BuilderCase<JsonDeFn>] = &[
	&DecimalCase,
	&DurationCase,
	&DateCase,
	&TimeCase,
	&TimestampCase,
	&NullCase,
	&BooleanCase,
	&IntCase,
	&LongCase,
	&FloatCase,
	&DoubleCase,
	&BytesCase,
	&StringCase,
	&FixedCase,
	&ArrayCase,
	&MapCase,
	&EnumCase,
	&RecordCase,
	&UnionCase,
];

pub(crate) fn build_node(
	req: BuildRequest<'_>,
	ctx: &mut BuilderContext<JsonDeFn>,
) -> Result<JsonDeFn, BuildError> {
	dispatch(CASES, req, ctx)
}

fn logical_rejection(req: &BuildRequest<'_>) -> Option<String> {
	req.node()
		.logical_type
		.as_ref()
		.map(|logical| format!("schema carries the {} logical type", logical.as_str()))
}

fn deferred(cell: Arc<OnceLock<JsonDeFn>>) -> JsonDeFn {
	Arc::new(move |reader| {
		cell.get()
			.expect("forward reference called before the routine graph was finalized")(reader)
	})
}

fn next_i64(reader: &mut JsonReader<'_>) -> Result<i64, DeError> {
	let start = reader.position();
	match reader.next()? {
		Token::Number(raw) => raw
			.parse()
			.map_err(|_| DeError::invalid(start, format!("expected an integer, got {raw:?}"))),
		other => Err(DeError::invalid(
			start,
			format!("expected a number, got {other:?}"),
		)),
	}
}

fn next_f64(reader: &mut JsonReader<'_>) -> Result<f64, DeError> {
	let start = reader.position();
	match reader.next()? {
		Token::Number(raw) => raw
			.parse()
			.map_err(|_| DeError::invalid(start, format!("expected a number, got {raw:?}"))),
		other => Err(DeError::invalid(
			start,
			format!("expected a number, got {other:?}"),
		)),
	}
}

fn next_string(reader: &mut JsonReader<'_>) -> Result<String, DeError> {
	let start = reader.position();
	match reader.next()? {
		Token::String(s) => Ok(s),
		other => Err(DeError::invalid(
			start,
			format!("expected a string, got {other:?}"),
		)),
	}
}

/// A byte string uses one code point per byte
fn next_byte_string(reader: &mut JsonReader<'_>) -> Result<Vec<u8>, DeError> {
	let start = reader.position();
	next_string(reader)?
		.chars()
		.map(|c| {
			u8::try_from(u32::from(c)).map_err(|_| {
				DeError::invalid(start, "byte string contains a code point above U+00FF")
			})
		})
		.collect()
}

struct DecimalCase;
impl BuilderCase<JsonDeFn> for DecimalCase {
	fn name(&self) -> &'static str {
		"decimal"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		let Some(LogicalType::Decimal(decimal)) = &req.node().logical_type else {
			return Ok(CaseOutcome::rejected(
				"schema does not carry the decimal logical type",
			));
		};
		match req.resolution() {
			TypeResolution::Decimal | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a decimal",
					other.kind_name()
				)))
			}
		}
		let scale = decimal.scale;
		let size = match &req.node().ty {
			SchemaType::Bytes => None,
			SchemaType::Fixed(fixed) => Some(fixed.size),
			_ => {
				return Err(BuildError::UnsupportedSchema(
					"decimal logical type must annotate bytes or fixed".into(),
				))
			}
		};
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let bytes = next_byte_string(reader)?;
			if let Some(size) = size {
				if bytes.len() != size {
					return Err(DeError::invalid(
						start,
						format!("fixed decimal of {} bytes where {size} expected", bytes.len()),
					));
				}
			}
			Ok(Value::Decimal(codec::decimal::from_scaled_bytes(
				&bytes, scale, start,
			)?))
		})))
	}
}

struct DurationCase;
impl BuilderCase<JsonDeFn> for DurationCase {
	fn name(&self) -> &'static str {
		"duration"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if !matches!(req.node().logical_type, Some(LogicalType::Duration)) {
			return Ok(CaseOutcome::rejected(
				"schema does not carry the duration logical type",
			));
		}
		let supports_months = match req.resolution() {
			TypeResolution::Duration { supports_months } => *supports_months,
			TypeResolution::Dynamic => true,
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a duration",
					other.kind_name()
				)))
			}
		};
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let bytes = next_byte_string(reader)?;
			let buf: &[u8; 12] = bytes.as_slice().try_into().map_err(|_| {
				DeError::invalid(
					start,
					format!("duration of {} bytes where 12 expected", bytes.len()),
				)
			})?;
			let duration = codec::duration::unpack(buf);
			codec::duration::check_months_supported(duration, supports_months, start)?;
			Ok(Value::Duration(duration))
		})))
	}
}

struct DateCase;
impl BuilderCase<JsonDeFn> for DateCase {
	fn name(&self) -> &'static str {
		"date"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if !matches!(req.node().logical_type, Some(LogicalType::Date)) {
			return Ok(CaseOutcome::rejected(
				"schema does not carry the date logical type",
			));
		}
		match req.resolution() {
			TypeResolution::Date | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a date",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			let start = reader.position();
			let days = next_i64(reader)?;
			Ok(Value::Date(i32::try_from(days).map_err(|_| {
				DeError::overflow(start, "date does not fit in 32 bits")
			})?))
		})))
	}
}

struct TimeCase;
impl BuilderCase<JsonDeFn> for TimeCase {
	fn name(&self) -> &'static str {
		"time"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		let millis = match req.node().logical_type {
			Some(LogicalType::TimeMillis) => true,
			Some(LogicalType::TimeMicros) => false,
			_ => {
				return Ok(CaseOutcome::rejected(
					"schema does not carry a time logical type",
				))
			}
		};
		match req.resolution() {
			TypeResolution::Time | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a time of day",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let n = next_i64(reader)?;
			Ok(Value::Time(if millis {
				codec::temporal::millis_to_nanos(n, start)?
			} else {
				codec::temporal::micros_to_nanos(n, start)?
			}))
		})))
	}
}

struct TimestampCase;
impl BuilderCase<JsonDeFn> for TimestampCase {
	fn name(&self) -> &'static str {
		"timestamp"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		let millis = match req.node().logical_type {
			Some(LogicalType::TimestampMillis) => true,
			Some(LogicalType::TimestampMicros) => false,
			_ => {
				return Ok(CaseOutcome::rejected(
					"schema does not carry a timestamp logical type",
				))
			}
		};
		match req.resolution() {
			TypeResolution::Timestamp | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a timestamp",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let n = next_i64(reader)?;
			Ok(Value::Timestamp(if millis {
				codec::temporal::millis_to_nanos(n, start)?
			} else {
				codec::temporal::micros_to_nanos(n, start)?
			}))
		})))
	}
}

struct NullCase;
impl BuilderCase<JsonDeFn> for NullCase {
	fn name(&self) -> &'static str {
		"null"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Null) {
			return Ok(CaseOutcome::rejected("schema is not null"));
		}
		match req.resolution() {
			TypeResolution::Optional(_) | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} cannot represent null",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			let start = reader.position();
			match reader.next()? {
				Token::Null => Ok(Value::Null),
				other => Err(DeError::invalid(
					start,
					format!("expected null, got {other:?}"),
				)),
			}
		})))
	}
}

struct BooleanCase;
impl BuilderCase<JsonDeFn> for BooleanCase {
	fn name(&self) -> &'static str {
		"boolean"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Boolean) {
			return Ok(CaseOutcome::rejected("schema is not boolean"));
		}
		match req.resolution() {
			TypeResolution::Boolean | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a boolean",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			let start = reader.position();
			match reader.next()? {
				Token::Boolean(b) => Ok(Value::Boolean(b)),
				other => Err(DeError::invalid(
					start,
					format!("expected a boolean, got {other:?}"),
				)),
			}
		})))
	}
}

struct IntCase;
impl BuilderCase<JsonDeFn> for IntCase {
	fn name(&self) -> &'static str {
		"int"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Int) {
			return Ok(CaseOutcome::rejected("schema is not int"));
		}
		let widen = match req.resolution() {
			TypeResolution::Int | TypeResolution::Dynamic => false,
			TypeResolution::Long => true,
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} cannot hold an int",
					other.kind_name()
				)))
			}
		};
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let n = next_i64(reader)?;
			let n = i32::try_from(n)
				.map_err(|_| DeError::overflow(start, "decoded int does not fit in 32 bits"))?;
			Ok(if widen {
				Value::Long(n.into())
			} else {
				Value::Int(n)
			})
		})))
	}
}

struct LongCase;
impl BuilderCase<JsonDeFn> for LongCase {
	fn name(&self) -> &'static str {
		"long"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Long) {
			return Ok(CaseOutcome::rejected("schema is not long"));
		}
		match req.resolution() {
			TypeResolution::Long | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} cannot hold a long",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			Ok(Value::Long(next_i64(reader)?))
		})))
	}
}

struct FloatCase;
impl BuilderCase<JsonDeFn> for FloatCase {
	fn name(&self) -> &'static str {
		"float"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Float) {
			return Ok(CaseOutcome::rejected("schema is not float"));
		}
		let widen = match req.resolution() {
			TypeResolution::Float | TypeResolution::Dynamic => false,
			TypeResolution::Double => true,
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} cannot hold a float",
					other.kind_name()
				)))
			}
		};
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let x = next_f64(reader)?;
			Ok(if widen {
				Value::Double(x)
			} else {
				Value::Float(x as f32)
			})
		})))
	}
}

struct DoubleCase;
impl BuilderCase<JsonDeFn> for DoubleCase {
	fn name(&self) -> &'static str {
		"double"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Double) {
			return Ok(CaseOutcome::rejected("schema is not double"));
		}
		match req.resolution() {
			TypeResolution::Double | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} cannot hold a double",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			Ok(Value::Double(next_f64(reader)?))
		})))
	}
}

struct BytesCase;
impl BuilderCase<JsonDeFn> for BytesCase {
	fn name(&self) -> &'static str {
		"bytes"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Bytes) {
			return Ok(CaseOutcome::rejected("schema is not bytes"));
		}
		match req.resolution() {
			TypeResolution::Bytes | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not bytes",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			Ok(Value::Bytes(next_byte_string(reader)?))
		})))
	}
}

struct StringCase;
impl BuilderCase<JsonDeFn> for StringCase {
	fn name(&self) -> &'static str {
		"string"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::String) {
			return Ok(CaseOutcome::rejected("schema is not string"));
		}
		match req.resolution() {
			TypeResolution::String | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a string",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			Ok(Value::String(next_string(reader)?))
		})))
	}
}

struct FixedCase;
impl BuilderCase<JsonDeFn> for FixedCase {
	fn name(&self) -> &'static str {
		"fixed"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		let SchemaType::Fixed(fixed) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not fixed"));
		};
		match req.resolution() {
			TypeResolution::Bytes | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not bytes",
					other.kind_name()
				)))
			}
		}
		let size = fixed.size;
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let bytes = next_byte_string(reader)?;
			if bytes.len() != size {
				return Err(DeError::invalid(
					start,
					format!("fixed of {} bytes where {size} expected", bytes.len()),
				));
			}
			Ok(Value::Bytes(bytes))
		})))
	}
}

struct ArrayCase;
impl BuilderCase<JsonDeFn> for ArrayCase {
	fn name(&self) -> &'static str {
		"array"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		let items_key = match &req.node().ty {
			SchemaType::Array(items) => *items,
			_ => return Ok(CaseOutcome::rejected("schema is not an array")),
		};
		let elem_type = match req.resolution() {
			TypeResolution::Array(elem) => *elem,
			TypeResolution::Dynamic => req.type_key,
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not an array",
					other.kind_name()
				)))
			}
		};
		let elem = build_node(req.at(elem_type, items_key), ctx)?;
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			match reader.next()? {
				Token::ArrayStart => {}
				other => {
					return Err(DeError::invalid(
						start,
						format!("expected an array, got {other:?}"),
					))
				}
			}
			let mut items = Vec::new();
			loop {
				if matches!(reader.peek()?, Token::ArrayEnd) {
					reader.next()?;
					break;
				}
				items.push(elem(reader)?);
			}
			Ok(Value::Array(items))
		})))
	}
}

struct MapCase;
impl BuilderCase<JsonDeFn> for MapCase {
	fn name(&self) -> &'static str {
		"map"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		let values_key = match &req.node().ty {
			SchemaType::Map(values) => *values,
			_ => return Ok(CaseOutcome::rejected("schema is not a map")),
		};
		let value_type = match req.resolution() {
			TypeResolution::Map(v) => *v,
			TypeResolution::Dynamic => req.type_key,
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a map",
					other.kind_name()
				)))
			}
		};
		let value_routine = build_node(req.at(value_type, values_key), ctx)?;
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			match reader.next()? {
				Token::ObjectStart => {}
				other => {
					return Err(DeError::invalid(
						start,
						format!("expected an object, got {other:?}"),
					))
				}
			}
			let mut entries = Vec::new();
			loop {
				let start = reader.position();
				match reader.next()? {
					Token::ObjectEnd => break,
					Token::String(key) => entries.push((key, value_routine(reader)?)),
					other => {
						return Err(DeError::invalid(
							start,
							format!("expected an object key, got {other:?}"),
						))
					}
				}
			}
			Ok(Value::Map(entries))
		})))
	}
}

struct EnumCase;
impl BuilderCase<JsonDeFn> for EnumCase {
	fn name(&self) -> &'static str {
		"enum"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		let SchemaType::Enum(enum_) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not an enum"));
		};
		// table from schema symbol (as written in the text) to native symbol
		let table: HashMap<String, String> = match req.resolution() {
			TypeResolution::Enum(resolution) => {
				let mut table = HashMap::with_capacity(enum_.symbols.len());
				for symbol in &enum_.symbols {
					let matched = matching::match_member(
						symbol,
						resolution
							.symbols
							.iter()
							.enumerate()
							.map(|(i, s)| (i, s.name.as_str(), s.explicit_name.as_deref())),
					)?;
					match matched {
						Some(si) => {
							table.insert(symbol.clone(), resolution.symbols[si].name.clone());
						}
						None => {
							return Err(BuildError::unsupported(
								"enum",
								format!(
									"schema symbol {:?} of enum {:?} matches no native symbol",
									symbol,
									enum_.name.fully_qualified_name()
								),
							))
						}
					}
				}
				table
			}
			TypeResolution::Dynamic => enum_
				.symbols
				.iter()
				.map(|s| (s.clone(), s.clone()))
				.collect(),
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not an enum",
					other.kind_name()
				)))
			}
		};
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let symbol = next_string(reader)?;
			match table.get(&symbol) {
				Some(native) => Ok(Value::Enum(native.clone())),
				None => Err(DeError::invalid(
					start,
					format!("unknown enum symbol {symbol:?}"),
				)),
			}
		})))
	}
}

struct RecordCase;
impl BuilderCase<JsonDeFn> for RecordCase {
	fn name(&self) -> &'static str {
		"record"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Record(_)) {
			return Ok(CaseOutcome::rejected("schema is not a record"));
		}
		match req.resolution() {
			TypeResolution::Record(_) | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a record",
					other.kind_name()
				)))
			}
		}

		if let Some(cell) = ctx.forward_ref(req.schema_key, req.type_key) {
			return Ok(CaseOutcome::Built(deferred(cell)));
		}
		let handle = ctx
			.is_recursive(req.schema, req.schema_key)
			.then(|| ctx.register(req.schema_key, req.type_key));

		match build_record(req, ctx) {
			Ok(routine) => {
				if let Some(cell) = &handle {
					ctx.finalize(cell, routine.clone());
				}
				Ok(CaseOutcome::Built(routine))
			}
			Err(e) => {
				if handle.is_some() {
					ctx.unregister(req.schema_key, req.type_key);
				}
				Err(e)
			}
		}
	}
}

/// What decoding one schema field does to the member slots
enum FieldAction {
	Decode { member: usize, routine: JsonDeFn },
	/// The target has no member for this field
	Skip,
}

fn expect_object_start(reader: &mut JsonReader<'_>) -> Result<(), DeError> {
	let start = reader.position();
	match reader.next()? {
		Token::ObjectStart => Ok(()),
		other => Err(DeError::invalid(
			start,
			format!("expected an object, got {other:?}"),
		)),
	}
}

fn build_record(
	req: BuildRequest<'_>,
	ctx: &mut BuilderContext<JsonDeFn>,
) -> Result<JsonDeFn, BuildError> {
	let SchemaType::Record(record) = &req.node().ty else {
		unreachable!("checked by the record case");
	};
	match req.resolution() {
		TypeResolution::Record(resolution) => {
			let mut index = HashMap::with_capacity(record.fields.len());
			let mut actions = Vec::with_capacity(record.fields.len());
			// per-member value when its field is missing from the text
			let mut fallbacks: Vec<Option<Value>> = resolution
				.members
				.iter()
				.map(|m| {
					matches!(req.types[m.ty], TypeResolution::Optional(_)).then_some(Value::Null)
				})
				.collect();
			let mut bound = vec![false; resolution.members.len()];
			for (fi, field) in record.fields.iter().enumerate() {
				index.insert(field.name.clone(), fi);
				let matched = matching::match_member(
					&field.name,
					resolution
						.members
						.iter()
						.enumerate()
						.map(|(i, m)| (i, m.name.as_str(), m.explicit_name.as_deref())),
				)?;
				match matched {
					Some(mi) => {
						if bound[mi] {
							return Err(BuildError::AmbiguousMapping {
								schema_name: field.name.clone(),
								candidates: vec![resolution.members[mi].name.clone()],
							});
						}
						bound[mi] = true;
						let routine =
							build_node(req.at(resolution.members[mi].ty, field.schema), ctx)?;
						if let Some(default) = &field.default {
							fallbacks[mi] = Some(super::realize_default_as(
								req.types,
								resolution.members[mi].ty,
								req.schema,
								field.schema,
								default,
							)?);
						}
						actions.push(FieldAction::Decode {
							member: mi,
							routine,
						});
					}
					None => actions.push(FieldAction::Skip),
				}
			}
			for (mi, bound) in bound.iter().enumerate() {
				let member = &resolution.members[mi];
				if !bound && !matches!(req.types[member.ty], TypeResolution::Optional(_)) {
					return Err(BuildError::unsupported(
						"record",
						format!(
							"member {:?} matches no field of record {:?} and is not optional",
							member.name,
							record.name.fully_qualified_name()
						),
					));
				}
			}
			let member_names: Vec<String> = resolution
				.members
				.iter()
				.map(|m| m.name.clone())
				.collect();
			Ok(Arc::new(move |reader| {
				expect_object_start(reader)?;
				let mut slots: Vec<Option<Value>> = vec![None; member_names.len()];
				loop {
					let start = reader.position();
					match reader.next()? {
						Token::ObjectEnd => break,
						Token::String(key) => {
							let Some(&fi) = index.get(&key) else {
								return Err(DeError::invalid(
									start,
									format!("unknown record field {key:?}"),
								));
							};
							match &actions[fi] {
								FieldAction::Decode { member, routine } => {
									slots[*member] = Some(routine(reader)?)
								}
								FieldAction::Skip => reader.skip_value()?,
							}
						}
						other => {
							return Err(DeError::invalid(
								start,
								format!("expected an object key, got {other:?}"),
							))
						}
					}
				}
				let end = reader.position();
				let mut fields = Vec::with_capacity(member_names.len());
				for ((name, slot), fallback) in
					member_names.iter().zip(slots).zip(fallbacks.iter())
				{
					let value = match slot {
						Some(value) => value,
						None => fallback.clone().ok_or_else(|| {
							DeError::invalid(end, format!("missing record field for {name:?}"))
						})?,
					};
					fields.push((name.clone(), value));
				}
				Ok(Value::Record(fields))
			}))
		}
		TypeResolution::Dynamic => {
			let mut index = HashMap::with_capacity(record.fields.len());
			let mut routines = Vec::with_capacity(record.fields.len());
			let mut fallbacks = Vec::with_capacity(record.fields.len());
			let mut names = Vec::with_capacity(record.fields.len());
			for (fi, field) in record.fields.iter().enumerate() {
				index.insert(field.name.clone(), fi);
				names.push(field.name.clone());
				routines.push(build_node(req.at(req.type_key, field.schema), ctx)?);
				fallbacks.push(
					field
						.default
						.as_ref()
						.map(|d| super::realize_default(req.schema, field.schema, d))
						.transpose()?,
				);
			}
			Ok(Arc::new(move |reader| {
				expect_object_start(reader)?;
				let mut slots: Vec<Option<Value>> = vec![None; names.len()];
				loop {
					let start = reader.position();
					match reader.next()? {
						Token::ObjectEnd => break,
						Token::String(key) => {
							let Some(&fi) = index.get(&key) else {
								return Err(DeError::invalid(
									start,
									format!("unknown record field {key:?}"),
								));
							};
							slots[fi] = Some(routines[fi](reader)?);
						}
						other => {
							return Err(DeError::invalid(
								start,
								format!("expected an object key, got {other:?}"),
							))
						}
					}
				}
				let end = reader.position();
				let mut fields = Vec::with_capacity(names.len());
				for ((name, slot), fallback) in names.iter().zip(slots).zip(fallbacks.iter()) {
					let value = match slot {
						Some(value) => value,
						None => fallback.clone().ok_or_else(|| {
							DeError::invalid(end, format!("missing record field {name:?}"))
						})?,
					};
					fields.push((name.clone(), value));
				}
				Ok(Value::Record(fields))
			}))
		}
		_ => unreachable!("checked by the record case"),
	}
}

struct UnionCase;
impl BuilderCase<JsonDeFn> for UnionCase {
	fn name(&self) -> &'static str {
		"union"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonDeFn>,
	) -> Result<CaseOutcome<JsonDeFn>, BuildError> {
		let SchemaType::Union(members) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not a union"));
		};
		let mut map: HashMap<String, JsonDeFn> = HashMap::with_capacity(members.len());
		let mut null_member = false;
		match req.resolution() {
			TypeResolution::Optional(inner) => {
				let inner = *inner;
				for &member in members {
					let node = &req.schema[member];
					if matches!(node.ty, SchemaType::Null) {
						null_member = true;
					} else {
						map.entry(union_key(node))
							.or_insert(build_node(req.at(inner, member), ctx)?);
					}
				}
			}
			TypeResolution::Dynamic => {
				for &member in members {
					let node = &req.schema[member];
					if matches!(node.ty, SchemaType::Null) {
						null_member = true;
					} else {
						map.entry(union_key(node))
							.or_insert(build_node(req.at(req.type_key, member), ctx)?);
					}
				}
			}
			other => {
				if members
					.iter()
					.any(|&k| matches!(req.schema[k].ty, SchemaType::Null))
				{
					return Ok(CaseOutcome::rejected(format!(
						"union has a null member but type {} cannot represent null",
						other.kind_name()
					)));
				}
				for &member in members {
					map.entry(union_key(&req.schema[member]))
						.or_insert(build_node(req.at(req.type_key, member), ctx)?);
				}
			}
		}
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			match reader.peek()? {
				Token::Null => {
					if !null_member {
						return Err(DeError::invalid(start, "union has no null member"));
					}
					reader.next()?;
					Ok(Value::Null)
				}
				Token::ObjectStart => {
					reader.next()?;
					let key_start = reader.position();
					let key = next_string(reader)?;
					let routine = map.get(&key).ok_or_else(|| {
						DeError::invalid(key_start, format!("unknown union key {key:?}"))
					})?;
					let value = routine(reader)?;
					let end = reader.position();
					match reader.next()? {
						Token::ObjectEnd => Ok(value),
						other => Err(DeError::invalid(
							end,
							format!("expected the end of the union object, got {other:?}"),
						)),
					}
				}
				_ => Err(DeError::invalid(
					start,
					"expected a tagged union object or null",
				)),
			}
		})))
	}
}
