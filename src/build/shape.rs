//! Runtime value-shape tests for dynamically-typed union dispatch
//!
//! When a union is serialized against a dynamic target, the member is picked
//! at routine run time by matching the value's shape against each member
//! schema. The relevant part of each member schema is summarized into a
//! [`Shape`] at build time so the routine does not hold onto the graph.

use crate::{
	schema::{LogicalType, SchemaNode, SchemaType},
	value::Value,
};

/// What kind of value a schema node encodes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Shape {
	Null,
	Boolean,
	Int,
	Long,
	Float,
	Double,
	Bytes,
	String,
	Enum,
	Array,
	Map,
	Record,
	Decimal,
	Date,
	Time,
	Timestamp,
	Duration,
}

pub(crate) fn shape_of(node: &SchemaNode) -> Shape {
	match &node.logical_type {
		Some(LogicalType::Decimal(_)) => Shape::Decimal,
		Some(LogicalType::Date) => Shape::Date,
		Some(LogicalType::TimeMillis | LogicalType::TimeMicros) => Shape::Time,
		Some(LogicalType::TimestampMillis | LogicalType::TimestampMicros) => Shape::Timestamp,
		Some(LogicalType::Duration) => Shape::Duration,
		None => match &node.ty {
			SchemaType::Null => Shape::Null,
			SchemaType::Boolean => Shape::Boolean,
			SchemaType::Int => Shape::Int,
			SchemaType::Long => Shape::Long,
			SchemaType::Float => Shape::Float,
			SchemaType::Double => Shape::Double,
			SchemaType::Bytes | SchemaType::Fixed(_) => Shape::Bytes,
			SchemaType::String => Shape::String,
			SchemaType::Enum(_) => Shape::Enum,
			SchemaType::Array(_) => Shape::Array,
			SchemaType::Map(_) => Shape::Map,
			SchemaType::Record(_) => Shape::Record,
			// direct union nesting is rejected at schema validation
			SchemaType::Union(_) => Shape::Null,
		},
	}
}

/// Does this value fit a member of the given shape?
pub(crate) fn matches(shape: Shape, value: &Value) -> bool {
	match (shape, value) {
		(Shape::Null, Value::Null) => true,
		(Shape::Boolean, Value::Boolean(_)) => true,
		(Shape::Int, Value::Int(_)) => true,
		// ints widen losslessly into a long member
		(Shape::Long, Value::Long(_) | Value::Int(_)) => true,
		(Shape::Float, Value::Float(_)) => true,
		(Shape::Double, Value::Double(_) | Value::Float(_)) => true,
		(Shape::Bytes, Value::Bytes(_)) => true,
		(Shape::String, Value::String(_)) => true,
		(Shape::Enum, Value::Enum(_)) => true,
		(Shape::Array, Value::Array(_)) => true,
		(Shape::Map, Value::Map(_)) => true,
		(Shape::Record, Value::Record(_)) => true,
		(Shape::Decimal, Value::Decimal(_)) => true,
		(Shape::Date, Value::Date(_)) => true,
		(Shape::Time, Value::Time(_)) => true,
		(Shape::Timestamp, Value::Timestamp(_)) => true,
		(Shape::Duration, Value::Duration(_)) => true,
		_ => false,
	}
}
