//! Builder cases for the binary decode direction
//!
//! Mirrors the encode case list. Decode routines are stricter at build time
//! (every reachable schema node must be decodable into the target type, since
//! which branch runs depends on the data) and lenient about redundant wire
//! representations (multi-block sequences, negative block counts, non-0/1
//! boolean bytes).

use {
	super::{
		read::{read_block_len, read_byte, read_exact_vec, read_int, read_len, read_long},
		ByteRead, DeFn,
	},
	crate::{
		build::{dispatch, matching, BuildRequest, BuilderCase, BuilderContext, CaseOutcome},
		codec,
		error::{BuildError, DeError},
		schema::{LogicalType, Schema, SchemaKey, SchemaType},
		types::{TypeGraph, TypeResolution},
		value::Value,
	},
	std::sync::{Arc, OnceLock},
};

const CASES: &[&dyn BuilderCase<DeFn>] = &[
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
	ctx: &mut BuilderContext<DeFn>,
) -> Result<DeFn, BuildError> {
	dispatch(CASES, req, ctx)
}

/// Dynamically-typed routine for a schema node, in a context of its own: used
/// to skip over schema fields the target record has no member for, and to
/// realize default literals
pub(crate) fn build_detached(schema: &Schema, schema_key: SchemaKey) -> Result<DeFn, BuildError> {
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

fn read_str(reader: &mut dyn ByteRead) -> Result<String, DeError> {
	let start = reader.position();
	let len = read_len(reader)?;
	let bytes = read_exact_vec(reader, len)?;
	String::from_utf8(bytes).map_err(|_| DeError::invalid(start, "string is not valid utf-8"))
}

fn logical_rejection(req: &BuildRequest<'_>) -> Option<String> {
	req.node()
		.logical_type
		.as_ref()
		.map(|logical| format!("schema carries the {} logical type", logical.as_str()))
}

fn deferred(cell: Arc<OnceLock<DeFn>>) -> DeFn {
	Arc::new(move |reader| {
		cell.get()
			.expect("forward reference called before the routine graph was finalized")(reader)
	})
}

struct DecimalCase;
impl BuilderCase<DeFn> for DecimalCase {
	fn name(&self) -> &'static str {
		"decimal"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			SchemaType::Bytes => Arc::new(move |reader| {
				let start = reader.position();
				let len = read_len(reader)?;
				let bytes = read_exact_vec(reader, len)?;
				Ok(Value::Decimal(codec::decimal::from_scaled_bytes(
					&bytes, scale, start,
				)?))
			}),
			SchemaType::Fixed(fixed) => {
				let size = fixed.size;
				Arc::new(move |reader| {
					let start = reader.position();
					let bytes = read_exact_vec(reader, size)?;
					Ok(Value::Decimal(codec::decimal::from_scaled_bytes(
						&bytes, scale, start,
					)?))
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
impl BuilderCase<DeFn> for DurationCase {
	fn name(&self) -> &'static str {
		"duration"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			let mut buf = [0u8; 12];
			reader.read_exact(&mut buf)?;
			let duration = codec::duration::unpack(&buf);
			codec::duration::check_months_supported(duration, supports_months, start)?;
			Ok(Value::Duration(duration))
		})))
	}
}

struct DateCase;
impl BuilderCase<DeFn> for DateCase {
	fn name(&self) -> &'static str {
		"date"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			Ok(Value::Date(read_int(reader)?))
		})))
	}
}

struct TimeCase;
impl BuilderCase<DeFn> for TimeCase {
	fn name(&self) -> &'static str {
		"time"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			Arc::new(|reader| {
				let start = reader.position();
				let millis = i64::from(read_int(reader)?);
				Ok(Value::Time(codec::temporal::millis_to_nanos(millis, start)?))
			})
		} else {
			Arc::new(|reader| {
				let start = reader.position();
				let micros = read_long(reader)?;
				Ok(Value::Time(codec::temporal::micros_to_nanos(micros, start)?))
			})
		}))
	}
}

struct TimestampCase;
impl BuilderCase<DeFn> for TimestampCase {
	fn name(&self) -> &'static str {
		"timestamp"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			Arc::new(|reader| {
				let start = reader.position();
				let millis = read_long(reader)?;
				Ok(Value::Timestamp(codec::temporal::millis_to_nanos(
					millis, start,
				)?))
			})
		} else {
			Arc::new(|reader| {
				let start = reader.position();
				let micros = read_long(reader)?;
				Ok(Value::Timestamp(codec::temporal::micros_to_nanos(
					micros, start,
				)?))
			})
		}))
	}
}

struct NullCase;
impl BuilderCase<DeFn> for NullCase {
	fn name(&self) -> &'static str {
		"null"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
		Ok(CaseOutcome::Built(Arc::new(|_| Ok(Value::Null))))
	}
}

struct BooleanCase;
impl BuilderCase<DeFn> for BooleanCase {
	fn name(&self) -> &'static str {
		"boolean"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
		// any non-zero byte reads as true
		Ok(CaseOutcome::Built(Arc::new(|reader| {
			Ok(Value::Boolean(read_byte(reader)? != 0))
		})))
	}
}

struct IntCase;
impl BuilderCase<DeFn> for IntCase {
	fn name(&self) -> &'static str {
		"int"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
		Ok(CaseOutcome::Built(if widen {
			Arc::new(|reader| Ok(Value::Long(read_int(reader)?.into())))
		} else {
			Arc::new(|reader| Ok(Value::Int(read_int(reader)?)))
		}))
	}
}

struct LongCase;
impl BuilderCase<DeFn> for LongCase {
	fn name(&self) -> &'static str {
		"long"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			Ok(Value::Long(read_long(reader)?))
		})))
	}
}

struct FloatCase;
impl BuilderCase<DeFn> for FloatCase {
	fn name(&self) -> &'static str {
		"float"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			let mut buf = [0u8; 4];
			reader.read_exact(&mut buf)?;
			let x = f32::from_le_bytes(buf);
			Ok(if widen {
				Value::Double(x.into())
			} else {
				Value::Float(x)
			})
		})))
	}
}

struct DoubleCase;
impl BuilderCase<DeFn> for DoubleCase {
	fn name(&self) -> &'static str {
		"double"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			let mut buf = [0u8; 8];
			reader.read_exact(&mut buf)?;
			Ok(Value::Double(f64::from_le_bytes(buf)))
		})))
	}
}

struct BytesCase;
impl BuilderCase<DeFn> for BytesCase {
	fn name(&self) -> &'static str {
		"bytes"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			let len = read_len(reader)?;
			Ok(Value::Bytes(read_exact_vec(reader, len)?))
		})))
	}
}

struct StringCase;
impl BuilderCase<DeFn> for StringCase {
	fn name(&self) -> &'static str {
		"string"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			Ok(Value::String(read_str(reader)?))
		})))
	}
}

struct FixedCase;
impl BuilderCase<DeFn> for FixedCase {
	fn name(&self) -> &'static str {
		"fixed"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			Ok(Value::Bytes(read_exact_vec(reader, size)?))
		})))
	}
}

struct ArrayCase;
impl BuilderCase<DeFn> for ArrayCase {
	fn name(&self) -> &'static str {
		"array"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			let mut items = Vec::new();
			loop {
				let count = read_block_len(reader)?;
				if count == 0 {
					break;
				}
				for _ in 0..count {
					items.push(elem(reader)?);
				}
			}
			Ok(Value::Array(items))
		})))
	}
}

struct MapCase;
impl BuilderCase<DeFn> for MapCase {
	fn name(&self) -> &'static str {
		"map"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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
			let mut entries = Vec::new();
			loop {
				let count = read_block_len(reader)?;
				if count == 0 {
					break;
				}
				for _ in 0..count {
					let key = read_str(reader)?;
					entries.push((key, value_routine(reader)?));
				}
			}
			Ok(Value::Map(entries))
		})))
	}
}

struct EnumCase;
impl BuilderCase<DeFn> for EnumCase {
	fn name(&self) -> &'static str {
		"enum"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		_ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
		if let Some(reason) = logical_rejection(&req) {
			return Ok(CaseOutcome::Rejected(reason));
		}
		let SchemaType::Enum(enum_) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not an enum"));
		};
		// table from wire discriminant to native symbol name
		let table: Vec<String> = match req.resolution() {
			TypeResolution::Enum(resolution) => {
				let mut table = Vec::with_capacity(enum_.symbols.len());
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
						Some(si) => table.push(resolution.symbols[si].name.clone()),
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
			TypeResolution::Dynamic => enum_.symbols.clone(),
			other => {
				return Ok(CaseOutcome::rejected(format!(
					"type {} is not an enum",
					other.kind_name()
				)))
			}
		};
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let idx = read_long(reader)?;
			let symbol = usize::try_from(idx)
				.ok()
				.and_then(|i| table.get(i))
				.ok_or_else(|| {
					DeError::invalid(start, format!("enum discriminant {idx} out of range"))
				})?;
			Ok(Value::Enum(symbol.clone()))
		})))
	}
}

enum DecodeStep {
	/// Decode the wire field into this member slot
	Decode { member: usize, routine: DeFn },
	/// The target has no member for this field: decode and drop
	Discard(DeFn),
}

struct RecordCase;
impl BuilderCase<DeFn> for RecordCase {
	fn name(&self) -> &'static str {
		"record"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
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

fn build_record(req: BuildRequest<'_>, ctx: &mut BuilderContext<DeFn>) -> Result<DeFn, BuildError> {
	let SchemaType::Record(record) = &req.node().ty else {
		unreachable!("checked by the record case");
	};
	match req.resolution() {
		TypeResolution::Record(resolution) => {
			let mut steps = Vec::with_capacity(record.fields.len());
			let mut bound = vec![false; resolution.members.len()];
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
						if bound[mi] {
							return Err(BuildError::AmbiguousMapping {
								schema_name: field.name.clone(),
								candidates: vec![resolution.members[mi].name.clone()],
							});
						}
						bound[mi] = true;
						let routine =
							build_node(req.at(resolution.members[mi].ty, field.schema), ctx)?;
						steps.push(DecodeStep::Decode {
							member: mi,
							routine,
						});
					}
					None => steps.push(DecodeStep::Discard(build_detached(
						req.schema,
						field.schema,
					)?)),
				}
			}
			// members no wire field feeds must be nullable
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
				let mut slots: Vec<Option<Value>> = vec![None; member_names.len()];
				for step in &steps {
					match step {
						DecodeStep::Decode { member, routine } => {
							slots[*member] = Some(routine(reader)?)
						}
						DecodeStep::Discard(routine) => {
							routine(reader)?;
						}
					}
				}
				Ok(Value::Record(
					member_names
						.iter()
						.cloned()
						.zip(slots.into_iter().map(|s| s.unwrap_or(Value::Null)))
						.collect(),
				))
			}))
		}
		TypeResolution::Dynamic => {
			let mut plan = Vec::with_capacity(record.fields.len());
			for field in &record.fields {
				plan.push((
					field.name.clone(),
					build_node(req.at(req.type_key, field.schema), ctx)?,
				));
			}
			Ok(Arc::new(move |reader| {
				let mut fields = Vec::with_capacity(plan.len());
				for (name, routine) in &plan {
					fields.push((name.clone(), routine(reader)?));
				}
				Ok(Value::Record(fields))
			}))
		}
		_ => unreachable!("checked by the record case"),
	}
}

struct UnionCase;
impl BuilderCase<DeFn> for UnionCase {
	fn name(&self) -> &'static str {
		"union"
	}

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<DeFn>,
	) -> Result<CaseOutcome<DeFn>, BuildError> {
		let SchemaType::Union(members) = &req.node().ty else {
			return Ok(CaseOutcome::rejected("schema is not a union"));
		};
		// which member the data carries is only known at run time, so every
		// member must be decodable into the target
		let mut routines: Vec<DeFn> = Vec::with_capacity(members.len());
		match req.resolution() {
			TypeResolution::Optional(inner) => {
				let inner = *inner;
				for &member in members {
					if matches!(req.schema[member].ty, SchemaType::Null) {
						routines.push(Arc::new(|_| Ok(Value::Null)));
					} else {
						routines.push(build_node(req.at(inner, member), ctx)?);
					}
				}
			}
			TypeResolution::Dynamic => {
				for &member in members {
					routines.push(build_node(req.at(req.type_key, member), ctx)?);
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
					routines.push(build_node(req.at(req.type_key, member), ctx)?);
				}
			}
		}
		Ok(CaseOutcome::Built(Arc::new(move |reader| {
			let start = reader.position();
			let idx = read_long(reader)?;
			let routine = usize::try_from(idx)
				.ok()
				.and_then(|i| routines.get(i))
				.ok_or_else(|| {
					DeError::invalid(start, format!("union discriminant {idx} out of range"))
				})?;
			routine(reader)
		})))
	}
}
