//! Structural descriptions of native data shapes
//!
//! The builders never reflect over actual Rust types. Instead, an external
//! resolver (a derive, a registry, or simply the caller) describes the shape
//! of the data to serialize as a [`TypeGraph`] of [`TypeResolution`] nodes,
//! and the compiled routines then operate on [`Value`](crate::Value)s that
//! conform to that shape.
//!
//! Like the [`Schema`](crate::Schema), the graph is index-based
//! ([`TypeKey`]s) so that recursive native types (e.g. a tree node holding an
//! optional pointer to another tree node) are representable.

/// Arena of [`TypeResolution`] nodes describing one native type
#[derive(Clone, Debug, Default)]
pub struct TypeGraph {
	nodes: Vec<TypeResolution>,
}

impl TypeGraph {
	pub fn new() -> Self {
		Self { nodes: Vec::new() }
	}

	/// Single-node graph, e.g. for a primitive or a fully dynamic target
	pub fn of(node: TypeResolution) -> (Self, TypeKey) {
		let mut graph = Self::new();
		let key = graph.push(node);
		(graph, key)
	}

	/// Append a node, returning its key
	///
	/// Keys of nodes that have not been pushed yet may be referenced (e.g.
	/// for recursive types) as long as they exist by the time the graph is
	/// handed to a builder.
	pub fn push(&mut self, node: TypeResolution) -> TypeKey {
		self.nodes.push(node);
		TypeKey {
			idx: self.nodes.len() - 1,
		}
	}

	pub fn nodes(&self) -> &[TypeResolution] {
		&self.nodes
	}

	pub fn get(&self, key: TypeKey) -> Option<&TypeResolution> {
		self.nodes.get(key.idx)
	}
}

impl std::ops::Index<TypeKey> for TypeGraph {
	type Output = TypeResolution;
	fn index(&self, key: TypeKey) -> &Self::Output {
		&self.nodes[key.idx]
	}
}

/// The location of a node in a [`TypeGraph`]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey {
	idx: usize,
}

impl TypeKey {
	pub const fn from_idx(idx: usize) -> Self {
		Self { idx }
	}

	pub const fn idx(self) -> usize {
		self.idx
	}
}

impl std::fmt::Debug for TypeKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// Structural resolution of a native type's shape
///
/// Produced by a type resolver, consumed read-only by the builder cases.
#[derive(Clone, Debug)]
pub enum TypeResolution {
	Boolean,
	/// 32-bit signed integer
	Int,
	/// 64-bit signed integer
	Long,
	Float,
	Double,
	String,
	Bytes,
	/// Arbitrary-precision scaled decimal
	Decimal,
	/// Calendar date, represented as days since the unix epoch
	Date,
	/// Time of day, represented as nanoseconds since midnight
	Time,
	/// Instant, represented as nanoseconds since the unix epoch
	Timestamp,
	/// Months/days/milliseconds triple
	Duration {
		/// `false` for span-like native types that cannot carry a calendar
		/// months component; decoding a non-zero months value into such a
		/// target is then a fatal error
		supports_months: bool,
	},
	/// Nullable wrapper, mapping to avro unions with a `null` member
	Optional(TypeKey),
	Array(TypeKey),
	/// String-keyed map
	Map(TypeKey),
	Record(RecordResolution),
	Enum(EnumResolution),
	/// Duck-typed fallback: matches any schema, with the value shape checked
	/// at routine run time instead of build time
	Dynamic,
}

impl TypeResolution {
	/// Short description of the shape, for diagnostics
	pub fn kind_name(&self) -> &'static str {
		match self {
			TypeResolution::Boolean => "boolean",
			TypeResolution::Int => "int",
			TypeResolution::Long => "long",
			TypeResolution::Float => "float",
			TypeResolution::Double => "double",
			TypeResolution::String => "string",
			TypeResolution::Bytes => "bytes",
			TypeResolution::Decimal => "decimal",
			TypeResolution::Date => "date",
			TypeResolution::Time => "time",
			TypeResolution::Timestamp => "timestamp",
			TypeResolution::Duration { .. } => "duration",
			TypeResolution::Optional(_) => "optional",
			TypeResolution::Array(_) => "array",
			TypeResolution::Map(_) => "map",
			TypeResolution::Record(_) => "record",
			TypeResolution::Enum(_) => "enum",
			TypeResolution::Dynamic => "dynamic",
		}
	}
}

/// Component of a [`TypeResolution`]
#[derive(Clone, Debug)]
pub struct RecordResolution {
	pub name: Option<String>,
	/// Members in the order the corresponding [`Value::Record`](crate::Value)
	/// lists its fields
	pub members: Vec<MemberBinding>,
}

impl RecordResolution {
	pub fn new(members: Vec<MemberBinding>) -> Self {
		Self {
			name: None,
			members,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}
}

/// A member of a native record shape
#[derive(Clone, Debug)]
pub struct MemberBinding {
	/// Declared member name, candidate for fuzzy matching against schema
	/// field names
	pub name: String,
	/// Data-contract style override: when set, this member only binds to the
	/// schema field whose name matches it exactly, bypassing fuzzy matching
	pub explicit_name: Option<String>,
	pub ty: TypeKey,
}

impl MemberBinding {
	pub fn new(name: impl Into<String>, ty: TypeKey) -> Self {
		Self {
			name: name.into(),
			explicit_name: None,
			ty,
		}
	}

	pub fn with_explicit_name(mut self, explicit_name: impl Into<String>) -> Self {
		self.explicit_name = Some(explicit_name.into());
		self
	}
}

/// Component of a [`TypeResolution`]
#[derive(Clone, Debug)]
pub struct EnumResolution {
	pub name: Option<String>,
	pub symbols: Vec<SymbolBinding>,
}

impl EnumResolution {
	pub fn new(symbols: Vec<SymbolBinding>) -> Self {
		Self {
			name: None,
			symbols,
		}
	}
}

/// A symbol of a native enum shape
#[derive(Clone, Debug)]
pub struct SymbolBinding {
	pub name: String,
	/// Exact-match override, like [`MemberBinding::explicit_name`]
	pub explicit_name: Option<String>,
}

impl SymbolBinding {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			explicit_name: None,
		}
	}

	pub fn with_explicit_name(mut self, explicit_name: impl Into<String>) -> Self {
		self.explicit_name = Some(explicit_name.into());
		self
	}
}
