//! Builder cases for the JSON encode direction

use {
	super::{union_key, JsonSerFn},
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
	std::{
		collections::HashMap,
		sync::{Arc, OnceLock},
	},
};

const CASES: &[&dyn BuilderCase<JsonSerFn>] = &[
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
	ctx: &mut BuilderContext<JsonSerFn>,
) -> Result<JsonSerFn, BuildError> {
	dispatch(CASES, req, ctx)
}

fn build_detached(schema: &Schema, schema_key: SchemaKey) -> Result<JsonSerFn, BuildError> {
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

fn logical_rejection(req: &BuildRequest<'_>) -> Option<String> {
	req.node()
		.logical_type
		.as_ref()
		.map(|logical| format!("schema carries the {} logical type", logical.as_str()))
}

fn deferred(cell: Arc<OnceLock<JsonSerFn>>) -> JsonSerFn {
	Arc::new(move |value, out| {
		cell.get()
			.expect("forward reference called before the routine graph was finalized")(
			value, out,
		)
	})
}

struct DecimalCase;
impl BuilderCase<JsonSerFn> for DecimalCase {
	fn name(&self) -> &'static str {
		"decimal"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
				out.byte_string(&codec::decimal::to_scaled_bytes(d, scale)?)
			}),
			SchemaType::Fixed(fixed) => {
				let size = fixed.size;
				Arc::new(move |value, out| {
					let &Value::Decimal(d) = value else {
						return Err(SerError::mismatch("decimal", value));
					};
					out.byte_string(&codec::decimal::to_scaled_bytes_fixed(d, scale, size)?)
				})
			}
			_ => {
				return Err(BuildError::UnsupportedSchema(
					"decimal logical type must annotate bytes or fixed".into(),
				))
			}
		}))
	}
}

struct DurationCase;
impl BuilderCase<JsonSerFn> for DurationCase {
	fn name(&self) -> &'static str {
		"duration"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.byte_string(&codec::duration::pack(duration))
		})))
	}
}

struct DateCase;
impl BuilderCase<JsonSerFn> for DateCase {
	fn name(&self) -> &'static str {
		"date"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.long(days.into())
		})))
	}
}

struct TimeCase;
impl BuilderCase<JsonSerFn> for TimeCase {
	fn name(&self) -> &'static str {
		"time"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(move |value, out| {
			let &Value::Time(nanos) = value else {
				return Err(SerError::mismatch("time", value));
			};
			if millis {
				out.long(codec::temporal::time_millis_i32(nanos)?.into())
			} else {
				out.long(codec::temporal::nanos_to_micros(nanos))
			}
		})))
	}
}

struct TimestampCase;
impl BuilderCase<JsonSerFn> for TimestampCase {
	fn name(&self) -> &'static str {
		"timestamp"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(move |value, out| {
			let &Value::Timestamp(nanos) = value else {
				return Err(SerError::mismatch("timestamp", value));
			};
			if millis {
				out.long(codec::temporal::nanos_to_millis(nanos))
			} else {
				out.long(codec::temporal::nanos_to_micros(nanos))
			}
		})))
	}
}

struct NullCase;
impl BuilderCase<JsonSerFn> for NullCase {
	fn name(&self) -> &'static str {
		"null"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		if !matches!(req.node().ty, SchemaType::Null) {
			return Ok(CaseOutcome::rejected("schema is not null"));
		}
		Ok(CaseOutcome::Built(Arc::new(|_, out| out.null())))
	}
}

struct BooleanCase;
impl BuilderCase<JsonSerFn> for BooleanCase {
	fn name(&self) -> &'static str {
		"boolean"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.boolean(b)
		})))
	}
}

struct IntCase;
impl BuilderCase<JsonSerFn> for IntCase {
	fn name(&self) -> &'static str {
		"int"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			Value::Int(n) => out.long(n.into()),
			Value::Long(n) => {
				i32::try_from(n)
					.map_err(|_| SerError::overflow("long value does not fit in an int schema"))?;
				out.long(n)
			}
			ref other => Err(SerError::mismatch("int", other)),
		})))
	}
}

struct LongCase;
impl BuilderCase<JsonSerFn> for LongCase {
	fn name(&self) -> &'static str {
		"long"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			Value::Long(n) => out.long(n),
			Value::Int(n) => out.long(n.into()),
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
impl BuilderCase<JsonSerFn> for FloatCase {
	fn name(&self) -> &'static str {
		"float"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.float(x)
		})))
	}
}

struct DoubleCase;
impl BuilderCase<JsonSerFn> for DoubleCase {
	fn name(&self) -> &'static str {
		"double"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.double(x)
		})))
	}
}

struct BytesCase;
impl BuilderCase<JsonSerFn> for BytesCase {
	fn name(&self) -> &'static str {
		"bytes"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.byte_string(bytes)
		})))
	}
}

struct StringCase;
impl BuilderCase<JsonSerFn> for StringCase {
	fn name(&self) -> &'static str {
		"string"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.string(s)
		})))
	}
}

struct FixedCase;
impl BuilderCase<JsonSerFn> for FixedCase {
	fn name(&self) -> &'static str {
		"fixed"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.byte_string(bytes)
		})))
	}
}

struct ArrayCase;
impl BuilderCase<JsonSerFn> for ArrayCase {
	fn name(&self) -> &'static str {
		"array"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.begin_array()?;
			for item in items {
				elem(item, out)?;
			}
			out.end_array()
		})))
	}
}

struct MapCase;
impl BuilderCase<JsonSerFn> for MapCase {
	fn name(&self) -> &'static str {
		"map"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
			out.begin_object()?;
			for (key, item) in entries {
				out.key(key)?;
				value_routine(item, out)?;
			}
			out.end_object()
		})))
	}
}

fn enum_routine(table: HashMap<String, String>) -> JsonSerFn {
	Arc::new(move |value, out| {
		let Value::Enum(symbol) = value else {
			return Err(SerError::mismatch("enum", value));
		};
		let schema_symbol = table
			.get(symbol.as_str())
			.ok_or(SerError::UnexpectedValue {
				expected: "a compiled enum symbol",
				got: "enum",
			})?;
		out.string(schema_symbol)
	})
}

struct EnumCase;
impl BuilderCase<JsonSerFn> for EnumCase {
	fn name(&self) -> &'static str {
		"enum"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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
					table.insert(binding.name.clone(), enum_.symbols[idx].clone());
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
		Ok(CaseOutcome::Built(enum_routine(table)))
	}
}

enum FieldStep {
	Member(String, usize, JsonSerFn),
	Constant(String, Value, JsonSerFn),
}

struct RecordCase;
impl BuilderCase<JsonSerFn> for RecordCase {
	fn name(&self) -> &'static str {
		"record"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
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

fn build_record(
	req: BuildRequest<'_>,
	ctx: &mut BuilderContext<JsonSerFn>,
) -> Result<JsonSerFn, BuildError> {
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
						let routine =
							build_node(req.at(resolution.members[mi].ty, field.schema), ctx)?;
						steps.push(FieldStep::Member(field.name.clone(), mi, routine));
					}
					None => match &field.default {
						Some(default) => {
							let value =
								super::realize_default(req.schema, field.schema, default)?;
							let routine = build_detached(req.schema, field.schema)?;
							steps.push(FieldStep::Constant(field.name.clone(), value, routine));
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
				out.begin_object()?;
				for step in &steps {
					match step {
						FieldStep::Member(name, mi, routine) => {
							out.key(name)?;
							routine(&fields[*mi].1, out)?;
						}
						FieldStep::Constant(name, constant, routine) => {
							out.key(name)?;
							routine(constant, out)?;
						}
					}
				}
				out.end_object()
			}))
		}
		TypeResolution::Dynamic => {
			let mut plan = Vec::with_capacity(record.fields.len());
			for field in &record.fields {
				let routine = build_node(req.at(req.type_key, field.schema), ctx)?;
				let fallback = field
					.default
					.as_ref()
					.map(|d| super::realize_default(req.schema, field.schema, d))
					.transpose()?;
				plan.push((field.name.clone(), routine, fallback));
			}
			Ok(Arc::new(move |value, out| {
				let Value::Record(entries) = value else {
					return Err(SerError::mismatch("record", value));
				};
				out.begin_object()?;
				for (name, routine, fallback) in &plan {
					out.key(name)?;
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
				out.end_object()
			}))
		}
		_ => unreachable!("checked by the record case"),
	}
}

struct UnionCase;
impl BuilderCase<JsonSerFn> for UnionCase {
	fn name(&self) -> &'static str {
		"union"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<JsonSerFn>,
	) -> Result<CaseOutcome<JsonSerFn>, BuildError> {
		let SchemaType::Union(members) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not a union"));
		};
		match req.resolution() {
			TypeResolution::Optional(inner) => {
				let inner = *inner;
				let null_idx = members
					.iter()
					.position(|&k| matches!(req.schema[k].ty, SchemaType::Null));
				if null_idx.is_none() {
					return Ok(CaseOutcome::rejected(
						"optional type requires a union with a null member",
					));
				}
				let mut bound = None;
				for (idx, &member) in members.iter().enumerate() {
					if Some(idx) == null_idx {
						continue;
					}
					match build_node(req.at(inner, member), ctx) {
						Ok(routine) => {
							bound = Some((union_key(&req.schema[member]), routine));
							break;
						}
						Err(BuildError::UnsupportedType { .. }) => continue,
						Err(e) => return Err(e),
					}
				}
				let Some((key, some_routine)) = bound else {
					return Err(BuildError::unsupported(
						"union",
						"no union member can represent the optional's inner type",
					));
				};
				Ok(CaseOutcome::Built(Arc::new(move |value, out| match value {
					Value::Null => out.null(),
					other => {
						out.begin_object()?;
						out.key(&key)?;
						some_routine(other, out)?;
						out.end_object()
					}
				})))
			}
			TypeResolution::Dynamic => {
				let mut branches = Vec::with_capacity(members.len());
				for &member in members {
					let node = &req.schema[member];
					let routine = build_node(req.at(req.type_key, member), ctx)?;
					let key = if matches!(node.ty, SchemaType::Null) {
						// the null member is encoded untagged
						None
					} else {
						Some(union_key(node))
					};
					branches.push((shape::shape_of(node), key, routine));
				}
				Ok(CaseOutcome::Built(Arc::new(move |value, out| {
					let Some((_, key, routine)) = branches
						.iter()
						.find(|(shape, _, _)| shape::matches(*shape, value))
					else {
						return Err(SerError::NoUnionMember(value.kind_name()));
					};
					match key {
						None => out.null(),
						Some(key) => {
							out.begin_object()?;
							out.key(key)?;
							routine(value, out)?;
							out.end_object()
						}
					}
				})))
			}
			_ => {
				for &member in members {
					if matches!(req.schema[member].ty, SchemaType::Null) {
						continue;
					}
					match build_node(req.at(req.type_key, member), ctx) {
						Ok(routine) => {
							let key = union_key(&req.schema[member]);
							return Ok(CaseOutcome::Built(Arc::new(move |value, out| {
								out.begin_object()?;
								out.key(&key)?;
								routine(value, out)?;
								out.end_object()
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
