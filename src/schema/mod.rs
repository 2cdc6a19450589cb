//! Build and navigate the [`Schema`] graph
//!
//! Schemas are constructed programmatically: push [`SchemaNode`]s into a
//! `Vec`, reference other nodes through [`SchemaKey`]s (indexes into that
//! `Vec`), then validate the whole set with [`Schema::from_nodes`]. Due to how
//! referencing via names works in Avro, a schema is not a tree but a
//! possibly-cyclic directed graph, and the index-based storage is what makes
//! self-referential and mutually-recursive schemas representable.

mod error;
mod name;
mod validate;

pub use {
	error::SchemaError,
	name::{Aliases, Name},
};

/// A validated Avro schema graph
///
/// The first node is the root. Invalid references, malformed named nodes and
/// cycles that could never be serialized are rejected at construction, so the
/// builders can navigate the graph without re-checking.
#[derive(Clone, Debug)]
pub struct Schema {
	nodes: Vec<SchemaNode>,
}

impl Schema {
	/// Validate a set of nodes into a `Schema`
	///
	/// The first node (index `0`) is the root of the schema.
	pub fn from_nodes(nodes: Vec<SchemaNode>) -> Result<Self, SchemaError> {
		validate::validate(&nodes)?;
		Ok(Self { nodes })
	}

	/// Single-node schema, e.g. a bare primitive
	pub fn of(node: SchemaNode) -> Result<Self, SchemaError> {
		Self::from_nodes(vec![node])
	}

	/// The underlying graph storage
	///
	/// [`SchemaKey`]s can be converted to indexes of this slice.
	pub fn nodes(&self) -> &[SchemaNode] {
		&self.nodes
	}

	/// The root of the schema (always the first node)
	pub fn root(&self) -> &SchemaNode {
		// `from_nodes` guarantees at least one node
		&self.nodes[0]
	}

	/// Try to get the node at the given [`SchemaKey`]
	///
	/// (or return `None` if the key is invalid)
	pub fn get(&self, key: SchemaKey) -> Option<&SchemaNode> {
		self.nodes.get(key.idx)
	}
}

impl std::ops::Index<SchemaKey> for Schema {
	type Output = SchemaNode;
	fn index(&self, key: SchemaKey) -> &Self::Output {
		&self.nodes[key.idx]
	}
}

/// The location of a node in a [`Schema`]
///
/// This can be used to [`Index`](std::ops::Index) into the [`Schema`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaKey {
	idx: usize,
}

impl SchemaKey {
	/// Construct a new SchemaKey
	///
	/// This is expected to be an index in the node `Vec` of a [`Schema`].
	pub const fn from_idx(idx: usize) -> Self {
		Self { idx }
	}

	/// The index in the node `Vec` of a [`Schema`] that this key points to
	pub const fn idx(self) -> usize {
		self.idx
	}

	/// The key of the root of the schema (always index `0`)
	pub const fn root() -> Self {
		Self { idx: 0 }
	}
}

impl std::fmt::Debug for SchemaKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// A node of an avro schema, stored in a [`Schema`]
///
/// The optional logical type tag further constrains interpretation of the
/// underlying type but never changes its wire shape.
#[derive(Clone, Debug)]
pub struct SchemaNode {
	pub ty: SchemaType,
	pub logical_type: Option<LogicalType>,
}

impl SchemaNode {
	pub fn new(ty: SchemaType) -> Self {
		Self {
			ty,
			logical_type: None,
		}
	}

	pub fn with_logical_type(ty: SchemaType, logical_type: LogicalType) -> Self {
		Self {
			ty,
			logical_type: Some(logical_type),
		}
	}
}

impl From<SchemaType> for SchemaNode {
	fn from(ty: SchemaType) -> Self {
		Self::new(ty)
	}
}

/// A primitive or complex type of an avro schema, stored in a [`SchemaNode`]
///
/// References to other nodes are represented as [`SchemaKey`]s, which allow to
/// index into the [`Schema`].
#[derive(Clone, Debug)]
pub enum SchemaType {
	/// A `null` Avro schema.
	Null,
	/// A `boolean` Avro schema.
	Boolean,
	/// An `int` Avro schema.
	Int,
	/// A `long` Avro schema.
	Long,
	/// A `float` Avro schema.
	Float,
	/// A `double` Avro schema.
	Double,
	/// A `bytes` Avro schema, a sequence of 8-bit unsigned bytes.
	Bytes,
	/// A `string` Avro schema, a unicode character sequence.
	String,
	/// A `fixed` Avro schema: exactly `size` raw bytes on the wire.
	Fixed(Fixed),
	/// An `enum` Avro schema, encoded as the index of the symbol.
	Enum(Enum),
	/// An `array` Avro schema. The key points to the schema of every element.
	Array(SchemaKey),
	/// A `map` Avro schema. Keys are assumed to be strings; the key points to
	/// the schema of every value.
	Map(SchemaKey),
	/// A `record` Avro schema.
	Record(Record),
	/// A `union` Avro schema: the ordered list of member schemas.
	Union(Vec<SchemaKey>),
}

impl SchemaType {
	/// The token Avro uses to refer to this kind of schema, for diagnostics
	/// and for JSON union keys of unnamed types
	pub fn kind_name(&self) -> &'static str {
		match self {
			SchemaType::Null => "null",
			SchemaType::Boolean => "boolean",
			SchemaType::Int => "int",
			SchemaType::Long => "long",
			SchemaType::Float => "float",
			SchemaType::Double => "double",
			SchemaType::Bytes => "bytes",
			SchemaType::String => "string",
			SchemaType::Fixed(_) => "fixed",
			SchemaType::Enum(_) => "enum",
			SchemaType::Array(_) => "array",
			SchemaType::Map(_) => "map",
			SchemaType::Record(_) => "record",
			SchemaType::Union(_) => "union",
		}
	}
}

/// Component of a [`Schema`]
#[derive(Clone, Debug)]
pub struct Fixed {
	/// The size in bytes of the *fixed* type
	pub size: usize,
	/// The name of the *fixed* type, including the namespace
	pub name: Name,
	/// Alternate names for this *fixed* type
	pub aliases: Aliases,
}

impl Fixed {
	pub fn new(name: Name, size: usize) -> Self {
		Self {
			size,
			name,
			aliases: Aliases::new(),
		}
	}
}

/// Component of a [`Schema`]
///
/// The ~equivalent of a Rust `enum` where none of the variants hold any inner
/// value.
#[derive(Clone, Debug)]
pub struct Enum {
	/// All the symbols of the enum (e.g. `["Bar", "Baz"]`), unique
	pub symbols: Vec<String>,
	/// Symbol to fall back to when a writer-side symbol has no match
	pub default: Option<String>,
	/// The name of the enum (including namespace)
	pub name: Name,
	/// Alternate names for this enum
	pub aliases: Aliases,
}

impl Enum {
	pub fn new(name: Name, symbols: Vec<String>) -> Self {
		Self {
			symbols,
			default: None,
			name,
			aliases: Aliases::new(),
		}
	}

	pub fn with_default(mut self, default: impl Into<String>) -> Self {
		self.default = Some(default.into());
		self
	}
}

/// Component of a [`Schema`]
///
/// An avro `record` is ~equivalent to a Rust struct.
#[derive(Clone, Debug)]
pub struct Record {
	/// The list of fields in this *record*, serialized in declaration order
	pub fields: Vec<RecordField>,
	/// The name of the record (including namespace)
	pub name: Name,
	/// Alternate names for this record
	pub aliases: Aliases,
}

impl Record {
	pub fn new(name: Name, fields: Vec<RecordField>) -> Self {
		Self {
			fields,
			name,
			aliases: Aliases::new(),
		}
	}
}

/// Component of a [`Schema`]
#[derive(Clone, Debug)]
pub struct RecordField {
	/// Name of the field
	pub name: String,
	/// The key of the schema of the type of this field
	pub schema: SchemaKey,
	/// Value to use when the serialized type has no member for this field
	pub default: Option<DefaultValue>,
}

impl RecordField {
	pub fn new(name: impl Into<String>, schema: SchemaKey) -> Self {
		Self {
			name: name.into(),
			schema,
			default: None,
		}
	}

	pub fn with_default(mut self, default: DefaultValue) -> Self {
		self.default = Some(default);
		self
	}
}

/// A schema-bound default literal, realized lazily
///
/// The literal is held in its JSON form and only converted to a native
/// [`Value`](crate::Value) on demand (through the JSON deserializer builder),
/// in the representation actually needed. For union schemas the literal is
/// interpreted against the first union member, per the Avro specification.
#[derive(Clone, Debug)]
pub struct DefaultValue {
	literal: serde_json::Value,
}

impl DefaultValue {
	pub fn new(literal: serde_json::Value) -> Self {
		Self { literal }
	}

	pub fn literal(&self) -> &serde_json::Value {
		&self.literal
	}
}

/// Logical type
///
/// <https://avro.apache.org/docs/current/specification/#logical-types>
#[derive(Clone, Debug)]
pub enum LogicalType {
	/// Arbitrary-precision scaled decimal number. Annotates
	/// [`Bytes`](SchemaType::Bytes) or [`Fixed`](SchemaType::Fixed).
	Decimal(Decimal),
	/// Number of days since the unix epoch. Annotates
	/// [`Int`](SchemaType::Int).
	Date,
	/// Time of day in milliseconds after midnight. Annotates
	/// [`Int`](SchemaType::Int).
	TimeMillis,
	/// Time of day in microseconds after midnight. Annotates
	/// [`Long`](SchemaType::Long).
	TimeMicros,
	/// Instant in milliseconds since the unix epoch. Annotates
	/// [`Long`](SchemaType::Long).
	TimestampMillis,
	/// Instant in microseconds since the unix epoch. Annotates
	/// [`Long`](SchemaType::Long).
	TimestampMicros,
	/// An amount of time defined by months, days and milliseconds. Annotates a
	/// [`Fixed`](SchemaType::Fixed) of size 12.
	Duration,
}

impl LogicalType {
	/// The name of the logical type, as Avro spells it
	pub fn as_str(&self) -> &str {
		match self {
			LogicalType::Decimal(_) => "decimal",
			LogicalType::Date => "date",
			LogicalType::TimeMillis => "time-millis",
			LogicalType::TimeMicros => "time-micros",
			LogicalType::TimestampMillis => "timestamp-millis",
			LogicalType::TimestampMicros => "timestamp-micros",
			LogicalType::Duration => "duration",
		}
	}
}

/// Component of a [`LogicalType`]
#[derive(Clone, Debug)]
pub struct Decimal {
	/// Number of significant digits in the number
	pub precision: usize,
	/// Number of digits to the right of the decimal point
	pub scale: u32,
}

impl Decimal {
	pub fn new(precision: usize, scale: u32) -> Self {
		Self { precision, scale }
	}
}
