//! Compile specialized Avro (de)serialization routines for dynamic values
//!
//! Instead of interpreting a schema on every value, this crate walks a
//! (native type description, schema) pair once at setup time and emits a
//! routine specialized for exactly that pair. The native side is described
//! structurally by a [`TypeGraph`]; the compiled routines then read and
//! produce dynamic [`Value`]s that conform to it. Both the
//! [binary](mod@binary) and the [JSON](mod@json) Avro encodings are
//! supported, sharing one case dispatch engine and one set of
//! type-to-schema mapping rules.
//!
//! All structural work (field name matching, union member selection, logical
//! type handling, recursion) happens at build time and fails there; the
//! routines themselves only check what cannot be known before a value is
//! seen.
//!
//! # Example
//!
//! ```
//! use dynavro::{
//! 	schema::{Name, Record, RecordField, Schema, SchemaKey, SchemaType},
//! 	types::{MemberBinding, RecordResolution, TypeGraph, TypeResolution},
//! 	Value,
//! };
//!
//! // {"type": "record", "name": "Point", "fields": [
//! //   {"name": "x", "type": "long"}, {"name": "y", "type": "long"}]}
//! let schema = Schema::from_nodes(vec![
//! 	SchemaType::Record(Record::new(
//! 		Name::from_fully_qualified_name("Point"),
//! 		vec![
//! 			RecordField::new("x", SchemaKey::from_idx(1)),
//! 			RecordField::new("y", SchemaKey::from_idx(1)),
//! 		],
//! 	))
//! 	.into(),
//! 	SchemaType::Long.into(),
//! ])?;
//!
//! // A native struct with two i64 members
//! let mut types = TypeGraph::new();
//! let long = types.push(TypeResolution::Long);
//! let point = types.push(TypeResolution::Record(RecordResolution::new(vec![
//! 	MemberBinding::new("x", long),
//! 	MemberBinding::new("y", long),
//! ])));
//!
//! let serializer = dynavro::binary::serializer(&types, point, &schema)?;
//! let deserializer = dynavro::binary::deserializer(&types, point, &schema)?;
//!
//! let value = Value::Record(vec![
//! 	("x".to_owned(), Value::Long(3)),
//! 	("y".to_owned(), Value::Long(-4)),
//! ]);
//! let encoded = serializer.serialize_to_vec(&value)?;
//! assert_eq!(encoded, [6, 7]); // two zigzag varints
//! assert_eq!(deserializer.deserialize_slice(&encoded)?, value);
//! # Ok::<_, anyhow::Error>(())
//! ```

pub mod binary;
mod build;
mod codec;
pub mod error;
pub mod json;
pub mod schema;
pub mod types;
mod value;

pub use {
	error::{BuildError, DeError, SerError},
	schema::Schema,
	types::{TypeGraph, TypeKey, TypeResolution},
	value::{Duration, Value},
};
