//! Builder cases for the binary encode direction

use {
	super::SerFn,
	crate::{
		build::{
			dispatch, matching, shape, BuildRequest, BuilderCase, BuilderContext, CaseOutcome,
		},
		codec,
		error::{BuildError, SerError},
		schema::{LogicalType, Schema, SchemaKey, SchemaType},
		types::{TypeGraph, TypeResolution},
		value::Value,
	},
	integer_encoding::VarInt,
	std::{
		collections::HashMap,
		io::Write,
		sync::{Arc, OnceLock},
	},
};

// Logical-type cases go first so that an annotated schema is never claimed by
// the case for its underlying type; the union case closes the list.
const CASES: &[&dyn BuilderCase<SerFn>] = &[
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
	ctx: &mut BuilderContext<SerFn>,
) -> Result<SerFn, BuildError> {
	dispatch(CASES, req, ctx)
}

/// Routine for a schema node reached outside the main build (default-value
/// constants): always compiled against a dynamic target, in a context of its
/// own
fn build_detached(schema: &Schema, schema_key: SchemaKey) -> Result<SerFn, BuildError> {
	let (types, type_key) = TypeGraph::of(TypeResolution::Dynamic);
	let mut ctx = BuilderContext::new();
	build_node(
		BuildRequest {
			types: &types,
			type_key,
			schema,
			schema_key,
		},
		&mut ctx,
	)
}

pub(crate) fn write_long(n: i64, out: &mut dyn Write) -> Result<(), SerError> {
	let mut buf = [0u8; 10];
	let len = n.encode_var(&mut buf);
	out.write_all(&buf[..len])?;
	Ok(())
}

fn write_int(n: i32, out: &mut dyn Write) -> Result<(), SerError> {
	let mut buf = [0u8; 5];
	let len = n.encode_var(&mut buf);
	out.write_all(&buf[..len])?;
	Ok(())
}

fn write_len(len: usize, out: &mut dyn Write) -> Result<(), SerError> {
	let len = i64::try_from(len).map_err(|_| SerError::overflow("length does not fit in a long"))?;
	write_long(len, out)
}

fn write_str(s: &str, out: &mut dyn Write) -> Result<(), SerError> {
	write_len(s.len(), out)?;
	out.write_all(s.as_bytes())?;
	Ok(())
}

/// Cases for plain types decline any logically-annotated schema
fn logical_rejection(req: &BuildRequest<'_>) -> Option<String> {
	req.node()
		.logical_type
		.as_ref()
		.map(|logical| format!("schema carries the {} logical type", logical.as_str()))
}

fn deferred(cell: Arc<OnceLock<SerFn>>) -> SerFn {
	Arc::new(move |value, out| {
		cell.get()
			.expect("forward reference called before the routine graph was finalized")(
			value, out,
		)
	})
}

struct DecimalCase;
impl BuilderCase<SerFn> for DecimalCase {
	fn name(&self) -> &'static str {
		"decimal"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(match &req.node().ty {
			SchemaType::Bytes => Arc::new(move |value, out| {
				let &Value::Decimal(d) = value else {
					return Err(SerError::mismatch("decimal", value));
				};
				let bytes = codec::decimal::to_scaled_bytes(d, scale)?;
				write_len(bytes.len(), out)?;
				out.write_all(&bytes)?;
				Ok(())
			}),
			SchemaType::Fixed(fixed) => {
				let size = fixed.size;
				Arc::new(move |value, out| {
					let &Value::Decimal(d) = value else {
						return Err(SerError::mismatch("decimal", value));
					};
					out.write_all(&codec::decimal::to_scaled_bytes_fixed(d, scale, size)?)?;
					Ok(())
				})
			}
			// schema validation only lets decimal annotate bytes or fixed
			_ => {
				return Err(BuildError::UnsupportedSchema(
					"decimal logical type must annotate bytes or fixed".into(),
				))
			}
		}))
	}
}

struct DurationCase;
impl BuilderCase<SerFn> for DurationCase {
	fn name(&self) -> &'static str {
		"duration"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if !matches!(req.node().logical_type, Some(LogicalType::Duration)) {
			return Ok(CaseOutcome::rejected(
				"schema does not carry the duration logical type",
			));
		}
		match req.resolution() {
			TypeResolution::Duration { .. } | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not a duration",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let &Value::Duration(duration) = value else {
				return Err(SerError::mismatch("duration", value));
			};
			out.write_all(&codec::duration::pack(duration))?;
			Ok(())
		})))
	}
}

struct DateCase;
impl BuilderCase<SerFn> for DateCase {
	fn name(&self) -> &'static str {
		"date"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let &Value::Date(days) = value else {
				return Err(SerError::mismatch("date", value));
			};
			write_int(days, out)
		})))
	}
}

struct TimeCase;
impl BuilderCase<SerFn> for TimeCase {
	fn name(&self) -> &'static str {
		"time"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(if millis {
			Arc::new(|value, out| {
				let &Value::Time(nanos) = value else {
					return Err(SerError::mismatch("time", value));
				};
				write_int(codec::temporal::time_millis_i32(nanos)?, out)
			})
		} else {
			Arc::new(|value, out| {
				let &Value::Time(nanos) = value else {
					return Err(SerError::mismatch("time", value));
				};
				write_long(codec::temporal::nanos_to_micros(nanos), out)
			})
		}))
	}
}

struct TimestampCase;
impl BuilderCase<SerFn> for TimestampCase {
	fn name(&self) -> &'static str {
		"timestamp"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(if millis {
			Arc::new(|value, out| {
				let &Value::Timestamp(nanos) = value else {
					return Err(SerError::mismatch("timestamp", value));
				};
				write_long(codec::temporal::nanos_to_millis(nanos), out)
			})
		} else {
			Arc::new(|value, out| {
				let &Value::Timestamp(nanos) = value else {
					return Err(SerError::mismatch("timestamp", value));
				};
				write_long(codec::temporal::nanos_to_micros(nanos), out)
			})
		}))
	}
}

struct NullCase;
impl BuilderCase<SerFn> for NullCase {
	fn name(&self) -> &'static str {
		"null"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Null) {
			return Ok(CaseOutcome::rejected("schema is not null"));
		}
		// any value collapses to nothing on the wire
		Ok(CaseOutcome::Built(Arc::new(|_, _| Ok(()))))
	}
}

struct BooleanCase;
impl BuilderCase<SerFn> for BooleanCase {
	fn name(&self) -> &'static str {
		"boolean"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let &Value::Boolean(b) = value else {
				return Err(SerError::mismatch("boolean", value));
			};
			out.write_all(&[b as u8])?;
			Ok(())
		})))
	}
}

struct IntCase;
impl BuilderCase<SerFn> for IntCase {
	fn name(&self) -> &'static str {
		"int"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Int) {
			return Ok(CaseOutcome::rejected("schema is not int"));
		}
		match req.resolution() {
			TypeResolution::Int | TypeResolution::Long | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not an integer",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|value, out| match *value {
			Value::Int(n) => write_int(n, out),
			Value::Long(n) => write_int(
				i32::try_from(n)
					.map_err(|_| SerError::overflow("long value does not fit in an int schema"))?,
				out,
			),
			ref other => Err(SerError::mismatch("int", other)),
		})))
	}
}

struct LongCase;
impl BuilderCase<SerFn> for LongCase {
	fn name(&self) -> &'static str {
		"long"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Long) {
			return Ok(CaseOutcome::rejected("schema is not long"));
		}
		match req.resolution() {
			TypeResolution::Int | TypeResolution::Long | TypeResolution::Dynamic => {}
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not an integer",
					other.kind_name()
				)))
			}
		}
		Ok(CaseOutcome::Built(Arc::new(|value, out| match *value {
			Value::Long(n) => write_long(n, out),
			Value::Int(n) => write_long(n.into(), out),
			ref other => Err(SerError::mismatch("long", other)),
		})))
	}
}

fn is_numeric(resolution: &TypeResolution) -> bool {
	matches!(
		resolution,
		TypeResolution::Int
			| TypeResolution::Long
			| TypeResolution::Float
			| TypeResolution::Double
			| TypeResolution::Dynamic
	)
}

struct FloatCase;
impl BuilderCase<SerFn> for FloatCase {
	fn name(&self) -> &'static str {
		"float"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Float) {
			return Ok(CaseOutcome::rejected("schema is not float"));
		}
		if !is_numeric(req.resolution()) {
			return Ok(CaseOutcome::rejected(format!(
				"type {} is not numeric",
				req.resolution().kind_name()
			)));
		}
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let x = match *value {
				Value::Float(x) => x,
				Value::Double(x) => x as f32,
				Value::Int(n) => n as f32,
				Value::Long(n) => n as f32,
				ref other => return Err(SerError::mismatch("float", other)),
			};
			out.write_all(&x.to_le_bytes())?;
			Ok(())
		})))
	}
}

struct DoubleCase;
impl BuilderCase<SerFn> for DoubleCase {
	fn name(&self) -> &'static str {
		"double"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Double) {
			return Ok(CaseOutcome::rejected("schema is not double"));
		}
		if !is_numeric(req.resolution()) {
			return Ok(CaseOutcome::rejected(format!(
				"type {} is not numeric",
				req.resolution().kind_name()
			)));
		}
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let x = match *value {
				Value::Double(x) => x,
				Value::Float(x) => x.into(),
				Value::Int(n) => n.into(),
				Value::Long(n) => n as f64,
				ref other => return Err(SerError::mismatch("double", other)),
			};
			out.write_all(&x.to_le_bytes())?;
			Ok(())
		})))
	}
}

struct BytesCase;
impl BuilderCase<SerFn> for BytesCase {
	fn name(&self) -> &'static str {
		"bytes"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let Value::Bytes(bytes) = value else {
				return Err(SerError::mismatch("bytes", value));
			};
			write_len(bytes.len(), out)?;
			out.write_all(bytes)?;
			Ok(())
		})))
	}
}

struct StringCase;
impl BuilderCase<SerFn> for StringCase {
	fn name(&self) -> &'static str {
		"string"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(|value, out| {
			let Value::String(s) = value else {
				return Err(SerError::mismatch("string", value));
			};
			write_str(s, out)
		})))
	}
}

struct FixedCase;
impl BuilderCase<SerFn> for FixedCase {
	fn name(&self) -> &'static str {
		"fixed"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(move |value, out| {
			let Value::Bytes(bytes) = value else {
				return Err(SerError::mismatch("bytes", value));
			};
			if bytes.len() != size {
				return Err(SerError::FixedSizeMismatch {
					expected: size,
					actual: bytes.len(),
				});
			}
			out.write_all(bytes)?;
			Ok(())
		})))
	}
}

struct ArrayCase;
impl BuilderCase<SerFn> for ArrayCase {
	fn name(&self) -> &'static str {
		"array"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(move |value, out| {
			let Value::Array(items) = value else {
				return Err(SerError::mismatch("array", value));
			};
			if !items.is_empty() {
				write_len(items.len(), out)?;
				for item in items {
					elem(item, out)?;
				}
			}
			write_long(0, out)
		})))
	}
}

struct MapCase;
impl BuilderCase<SerFn> for MapCase {
	fn name(&self) -> &'static str {
		"map"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(move |value, out| {
			let Value::Map(entries) = value else {
				return Err(SerError::mismatch("map", value));
			};
			if !entries.is_empty() {
				write_len(entries.len(), out)?;
				for (key, item) in entries {
					write_str(key, out)?;
					value_routine(item, out)?;
				}
			}
			write_long(0, out)
		})))
	}
}

fn enum_routine(table: HashMap<String, i64>) -> SerFn {
	Arc::new(move |value, out| {
		let Value::Enum(symbol) = value else {
			return Err(SerError::mismatch("enum", value));
		};
		let &idx = table
			.get(symbol.as_str())
			.ok_or(SerError::UnexpectedValue {
				expected: "a compiled enum symbol",
				got: "enum",
			})?;
		write_long(idx, out)
	})
}

struct EnumCase;
impl BuilderCase<SerFn> for EnumCase {
	fn name(&self) -> &'static str {
		"enum"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		let SchemaType::Enum(enum_) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not an enum"));
		};
		let table = match req.resolution() {
			TypeResolution::Enum(resolution) => {
				let mut table = HashMap::with_capacity(resolution.symbols.len());
				for binding in &resolution.symbols {
					let idx = match matching::bind_symbol(binding, &enum_.symbols)? {
						Some(idx) => idx,
						None => match &enum_.default {
							Some(default) => enum_
								.symbols
								.iter()
								.position(|s| s == default)
								.expect("validated default is a known symbol"),
							None => {
								return Err(BuildError::unsupported(
									"enum",
									format!(
										"native symbol {:?} matches no symbol of enum {:?} and \
										 the enum declares no default",
										binding.name,
										enum_.name.fully_qualified_name()
									),
								))
							}
						},
					};
					table.insert(binding.name.clone(), idx as i64);
				}
				table
			}
			TypeResolution::Dynamic => enum_
				.symbols
				.iter()
				.enumerate()
				.map(|(i, s)| (s.clone(), i as i64))
				.collect(),
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not an enum",
					other.kind_name()
				)))
			}
		};
		Ok(CaseOutcome::Built(enum_routine(table)))
	}
}

enum FieldStep {
	/// Encode the member at this index of the value's field list
	Member(usize, SerFn),
	/// No matching member: encode the field's default
	Constant(Value, SerFn),
}

struct RecordCase;
impl BuilderCase<SerFn> for RecordCase {
	fn name(&self) -> &'static str {
		"record"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
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

		// Recursion: reuse the handle if this pair is already being compiled
		// higher up the stack, otherwise register one when the schema node is
		// on a cycle.
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

fn build_record(
	req: BuildRequest<'_>,
	ctx: &mut BuilderContext<SerFn>,
) -> Result<SerFn, BuildError> {
	let SchemaType::Record(record) = &req.node().ty else {
		unreachable!("checked by the record case");
	};
	match req.resolution() {
		TypeResolution::Record(resolution) => {
			let mut steps = Vec::with_capacity(record.fields.len());
			for field in &record.fields {
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
						let routine = build_node(req.at(resolution.members[mi].ty, field.schema), ctx)?;
						steps.push(FieldStep::Member(mi, routine));
					}
					None => match &field.default {
						Some(default) => {
							let value =
								crate::json::realize_default(req.schema, field.schema, default)?;
							let routine = build_detached(req.schema, field.schema)?;
							steps.push(FieldStep::Constant(value, routine));
						}
						None => {
							return Err(BuildError::unsupported(
								"record",
								format!(
									"no member of the native record matches field {:?} of record \
									 {:?}, and the field declares no default",
									field.name,
									record.name.fully_qualified_name()
								),
							))
						}
					},
				}
			}
			let member_count = resolution.members.len();
			Ok(Arc::new(move |value, out| {
				let Value::Record(fields) = value else {
					return Err(SerError::mismatch("record", value));
				};
				if fields.len() != member_count {
					return Err(SerError::UnexpectedValue {
						expected: "record with as many fields as the compiled type",
						got: "record",
					});
				}
				for step in &steps {
					match step {
						FieldStep::Member(mi, routine) => routine(&fields[*mi].1, out)?,
						FieldStep::Constant(constant, routine) => routine(constant, out)?,
					}
				}
				Ok(())
			}))
		}
		TypeResolution::Dynamic => {
			// fields looked up by name at routine run time
			let mut plan = Vec::with_capacity(record.fields.len());
			for field in &record.fields {
				let routine = build_node(req.at(req.type_key, field.schema), ctx)?;
				let fallback = field
					.default
					.as_ref()
					.map(|d| crate::json::realize_default(req.schema, field.schema, d))
					.transpose()?;
				plan.push((field.name.clone(), routine, fallback));
			}
			Ok(Arc::new(move |value, out| {
				let Value::Record(entries) = value else {
					return Err(SerError::mismatch("record", value));
				};
				for (name, routine, fallback) in &plan {
					match entries.iter().find(|(n, _)| n == name) {
						Some((_, v)) => routine(v, out)?,
						None => match fallback {
							Some(v) => routine(v, out)?,
							None => {
								return Err(SerError::UnexpectedValue {
									expected: "record carrying every schema field",
									got: "record",
								})
							}
						},
					}
				}
				Ok(())
			}))
		}
		_ => unreachable!("checked by the record case"),
	}
}

struct UnionCase;
impl BuilderCase<SerFn> for UnionCase {
	fn name(&self) -> &'static str {
		"union"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<SerFn>,
	) -> Result<CaseOutcome<SerFn>, BuildError> {
		let SchemaType::Union(members) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not a union"));
		};
		match req.resolution() {
			TypeResolution::Optional(inner) => {
				let inner = *inner;
				let null_idx = members
					.iter()
					.position(|&k| matches!(req.schema[k].ty, SchemaType::Null));
				let Some(null_idx) = null_idx else {
					return Ok(CaseOutcome::rejected(
						"optional type requires a union with a null member",
					));
				};
				// the non-null side binds to the first member the inner type
				// builds against
				let mut bound = None;
				for (idx, &member) in members.iter().enumerate() {
					if idx == null_idx {
						continue;
					}
					match build_node(req.at(inner, member), ctx) {
						Ok(routine) => {
							bound = Some((idx as i64, routine));
							break;
						}
						Err(BuildError::UnsupportedType { .. }) => continue,
						Err(e) => return Err(e),
					}
				}
				let Some((some_idx, some_routine)) = bound else {
					return Err(BuildError::unsupported(
						"union",
						"no union member can represent the optional's inner type",
					));
				};
				let null_idx = null_idx as i64;
				Ok(CaseOutcome::Built(Arc::new(move |value, out| match value {
					Value::Null => write_long(null_idx, out),
					other => {
						write_long(some_idx, out)?;
						some_routine(other, out)
					}
				})))
			}
			TypeResolution::Dynamic => {
				// member picked at run time by the value's shape
				let mut branches = Vec::with_capacity(members.len());
				for (idx, &member) in members.iter().enumerate() {
					let routine = build_node(req.at(req.type_key, member), ctx)?;
					branches.push((shape::shape_of(&req.schema[member]), idx as i64, routine));
				}
				Ok(CaseOutcome::Built(Arc::new(move |value, out| {
					let Some((_, idx, routine)) = branches
						.iter()
						.find(|(shape, _, _)| shape::matches(*shape, value))
					else {
						return Err(SerError::NoUnionMember(value.kind_name()));
					};
					write_long(*idx, out)?;
					routine(value, out)
				})))
			}
			_ => {
				// a non-optional type binds to the first non-null member it
				// builds against
				for (idx, &member) in members.iter().enumerate() {
					if matches!(req.schema[member].ty, SchemaType::Null) {
						continue;
					}
					match build_node(req.at(req.type_key, member), ctx) {
						Ok(routine) => {
							let idx = idx as i64;
							return Ok(CaseOutcome::Built(Arc::new(move |value, out| {
								write_long(idx, out)?;
								routine(value, out)
							})));
						}
						Err(BuildError::UnsupportedType { .. }) => continue,
						Err(e) => return Err(e),
					}
				}
				Ok(CaseOutcome::rejected(format!(
					"no union member can represent type {}",
					req.resolution().kind_name()
				)))
			}
		}
	}
}
