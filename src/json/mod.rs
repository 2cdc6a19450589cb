//! Compile and run routines for the Avro JSON encoding
//!
//! Same dispatch machinery and (type, schema) semantics as
//! [`binary`](crate::binary), with the JSON wire rules: unions are tagged
//! objects (bare `null` for the null member), `bytes`/`fixed` and the logical
//! types built on them are strings with one code point per byte, and records
//! accept their fields in any order.

mod de;
mod read;
mod ser;
mod write;

pub(crate) use {read::JsonReader, write::JsonWriter};

use {
	crate::{
		build::{BuildRequest, BuilderContext},
		error::{BuildError, DeError, SerError},
		schema::{DefaultValue, Schema, SchemaKey, SchemaNode, SchemaType},
		types::{TypeGraph, TypeKey, TypeResolution},
		value::Value,
	},
	std::sync::Arc,
};

pub(crate) type JsonSerFn =
	Arc<dyn Fn(&Value, &mut JsonWriter<'_>) -> Result<(), SerError> + Send + Sync>;
pub(crate) type JsonDeFn = Arc<dyn Fn(&mut JsonReader<'_>) -> Result<Value, DeError> + Send + Sync>;

/// Compile a JSON encode routine for the given (type, schema) pair
pub fn serializer(
	types: &TypeGraph,
	type_key: TypeKey,
	schema: &Schema,
) -> Result<JsonSerializer, BuildError> {
	let mut ctx = BuilderContext::new();
	let routine = ser::build_node(
		BuildRequest {
			types,
			type_key,
			schema,
			schema_key: SchemaKey::root(),
		},
		&mut ctx,
	)?;
	Ok(JsonSerializer { routine })
}

/// Compile a JSON decode routine for the given (type, schema) pair
pub fn deserializer(
	types: &TypeGraph,
	type_key: TypeKey,
	schema: &Schema,
) -> Result<JsonDeserializer, BuildError> {
	let mut ctx = BuilderContext::new();
	let routine = de::build_node(
		BuildRequest {
			types,
			type_key,
			schema,
			schema_key: SchemaKey::root(),
		},
		&mut ctx,
	)?;
	Ok(JsonDeserializer { routine })
}

/// A compiled JSON encode routine
#[derive(Clone)]
pub struct JsonSerializer {
	routine: JsonSerFn,
}

impl JsonSerializer {
	pub fn serialize(
		&self,
		value: &Value,
		writer: &mut dyn std::io::Write,
	) -> Result<(), SerError> {
		let mut json = JsonWriter::new(writer);
		(self.routine)(value, &mut json)
	}

	pub fn serialize_to_string(&self, value: &Value) -> Result<String, SerError> {
		let mut out = Vec::new();
		self.serialize(value, &mut out)?;
		Ok(String::from_utf8(out).expect("the writer only emits utf-8"))
	}
}

/// A compiled JSON decode routine
#[derive(Clone)]
pub struct JsonDeserializer {
	routine: JsonDeFn,
}

impl JsonDeserializer {
	/// Decode one value; trailing non-whitespace input is an error
	pub fn deserialize_str(&self, input: &str) -> Result<Value, DeError> {
		self.deserialize_slice(input.as_bytes())
	}

	pub fn deserialize_slice(&self, input: &[u8]) -> Result<Value, DeError> {
		let mut reader = JsonReader::new(input);
		let value = (self.routine)(&mut reader)?;
		reader.end()?;
		Ok(value)
	}
}

/// The key tagging a union member in the JSON encoding
///
/// Named schemas are keyed by their fully qualified name, unnamed ones by
/// their type token. Logical annotations do not change the key.
pub(crate) fn union_key(node: &SchemaNode) -> String {
	match &node.ty {
		SchemaType::Fixed(fixed) => fixed.name.fully_qualified_name().to_owned(),
		SchemaType::Enum(enum_) => enum_.name.fully_qualified_name().to_owned(),
		SchemaType::Record(record) => record.name.fully_qualified_name().to_owned(),
		other => other.kind_name().to_owned(),
	}
}

/// Turn a field's default literal into a [`Value`] of the given
/// representation
///
/// Defaults are held as JSON, so realizing one is just running a small decode
/// routine over the literal. For union schemas the literal is written against
/// the first member, untagged.
pub(crate) fn realize_default_as(
	types: &TypeGraph,
	type_key: TypeKey,
	schema: &Schema,
	schema_key: SchemaKey,
	default: &DefaultValue,
) -> Result<Value, BuildError> {
	let schema_key = match &schema[schema_key].ty {
		SchemaType::Union(members) => members[0],
		_ => schema_key,
	};
	let type_key = match &types[type_key] {
		TypeResolution::Optional(inner) if !matches!(schema[schema_key].ty, SchemaType::Null) => {
			*inner
		}
		_ => type_key,
	};
	let mut ctx = BuilderContext::new();
	let routine = de::build_node(
		BuildRequest {
			types,
			type_key,
			schema,
			schema_key,
		},
		&mut ctx,
	)?;
	let text = default.literal().to_string();
	let mut reader = JsonReader::new(text.as_bytes());
	let value = routine(&mut reader).map_err(|e| {
		BuildError::unsupported(
			"default",
			format!("default literal does not match the field schema: {e}"),
		)
	})?;
	reader.end().map_err(|e| {
		BuildError::unsupported("default", format!("trailing data after default literal: {e}"))
	})?;
	Ok(value)
}

/// [`realize_default_as`] against a dynamic target: the shape the literal
/// itself dictates
pub(crate) fn realize_default(
	schema: &Schema,
	schema_key: SchemaKey,
	default: &DefaultValue,
) -> Result<Value, BuildError> {
	let (types, type_key) = TypeGraph::of(TypeResolution::Dynamic);
	realize_default_as(&types, type_key, schema, schema_key, default)
}
