//! Compile and run routines for the Avro binary encoding
//!
//! [`serializer`] and [`deserializer`] walk a (type graph, schema) pair once
//! through the case dispatch engine and hand back a routine specialized for
//! that pair. The routines are plain `Arc`ed closures: cheap to clone, safe to
//! share across threads, and reusable for any number of values.

mod de;
pub mod read;
mod ser;

pub use read::{ByteRead, ReaderRead, SliceRead};

use {
	crate::{
		build::{BuildRequest, BuilderContext},
		error::{BuildError, DeError, SerError},
		schema::{Schema, SchemaKey},
		types::{TypeGraph, TypeKey},
		value::Value,
	},
	std::sync::Arc,
};

pub(crate) type SerFn =
	Arc<dyn Fn(&Value, &mut dyn std::io::Write) -> Result<(), SerError> + Send + Sync>;
pub(crate) type DeFn = Arc<dyn Fn(&mut dyn ByteRead) -> Result<Value, DeError> + Send + Sync>;

/// Compile a binary encode routine for the given (type, schema) pair
pub fn serializer(
	types: &TypeGraph,
	type_key: TypeKey,
	schema: &Schema,
) -> Result<BinarySerializer, BuildError> {
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
	Ok(BinarySerializer { routine })
}

/// Compile a binary decode routine for the given (type, schema) pair
pub fn deserializer(
	types: &TypeGraph,
	type_key: TypeKey,
	schema: &Schema,
) -> Result<BinaryDeserializer, BuildError> {
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
	Ok(BinaryDeserializer { routine })
}

/// A compiled binary encode routine
///
/// Holds no reference to the [`Schema`] or [`TypeGraph`] it was compiled
/// from; both may be dropped once the routine exists.
#[derive(Clone)]
pub struct BinarySerializer {
	routine: SerFn,
}

impl std::fmt::Debug for BinarySerializer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BinarySerializer").finish_non_exhaustive()
	}
}

impl BinarySerializer {
	pub fn serialize(
		&self,
		value: &Value,
		writer: &mut dyn std::io::Write,
	) -> Result<(), SerError> {
		(self.routine)(value, writer)
	}

	pub fn serialize_to_vec(&self, value: &Value) -> Result<Vec<u8>, SerError> {
		let mut out = Vec::new();
		self.serialize(value, &mut out)?;
		Ok(out)
	}
}

/// A compiled binary decode routine
#[derive(Clone)]
pub struct BinaryDeserializer {
	routine: DeFn,
}

impl BinaryDeserializer {
	pub fn deserialize(&self, reader: &mut dyn ByteRead) -> Result<Value, DeError> {
		(self.routine)(reader)
	}

	pub fn deserialize_slice(&self, slice: &[u8]) -> Result<Value, DeError> {
		self.deserialize(&mut SliceRead::new(slice))
	}
}
