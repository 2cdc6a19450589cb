//! The case dispatch engine shared by the binary and JSON builders
//!
//! Each builder is an ordered list of cases: a predicate + handler pair
//! responsible for one schema/type shape combination. The engine tries cases
//! in registration order: a case either declines the (type, schema) pair
//! (soft, the next case is tried), emits a routine (short-circuit), or
//! aborts the whole build (hard error, e.g. an ambiguous member match). If
//! every case declines, the engine reports every case's rejection reason at
//! once.
//!
//! Ordering matters: logical-type cases are registered before the cases for
//! their underlying primitive schemas (a decimal-annotated `bytes` schema
//! must be claimed by the decimal case, not the generic bytes case), records
//! after collections, unions last.

pub(crate) mod matching;
pub(crate) mod shape;

use crate::{
	error::{BuildError, CaseRejection},
	schema::{Schema, SchemaKey, SchemaNode, SchemaType},
	types::{TypeGraph, TypeKey, TypeResolution},
};

use std::{
	collections::HashMap,
	sync::{Arc, OnceLock},
};

/// Everything a case looks at to decide applicability
#[derive(Copy, Clone)]
pub(crate) struct BuildRequest<'a> {
	pub(crate) types: &'a TypeGraph,
	pub(crate) type_key: TypeKey,
	pub(crate) schema: &'a Schema,
	pub(crate) schema_key: SchemaKey,
}

impl<'a> BuildRequest<'a> {
	pub(crate) fn node(&self) -> &'a SchemaNode {
		&self.schema[self.schema_key]
	}

	pub(crate) fn resolution(&self) -> &'a TypeResolution {
		&self.types[self.type_key]
	}

	/// Same graphs, different position: used when recursing into child
	/// schemas/types
	pub(crate) fn at(&self, type_key: TypeKey, schema_key: SchemaKey) -> Self {
		Self {
			type_key,
			schema_key,
			..*self
		}
	}
}

/// What one case had to say about a request
pub(crate) enum CaseOutcome<F> {
	Built(F),
	/// Wrong schema or type shape for this case; the reason ends up in the
	/// aggregate error if no other case matches either
	Rejected(String),
}

impl<F> CaseOutcome<F> {
	pub(crate) fn rejected(reason: impl Into<String>) -> Self {
		CaseOutcome::Rejected(reason.into())
	}
}

/// A predicate + handler unit of the dispatch engine
pub(crate) trait BuilderCase<F> {
	fn name(&self) -> &'static str;

	fn try_build(
		&self,
		req: BuildRequest<'_>,
		ctx: &mut BuilderContext<F>,
	) -> Result<CaseOutcome<F>, BuildError>;
}

/// Try cases in order, short-circuiting on the first success and aggregating
/// every rejection otherwise
pub(crate) fn dispatch<F>(
	cases: &[&dyn BuilderCase<F>],
	req: BuildRequest<'_>,
	ctx: &mut BuilderContext<F>,
) -> Result<F, BuildError> {
	let mut attempts = Vec::new();
	for case in cases {
		match case.try_build(req, ctx)? {
			CaseOutcome::Built(routine) => return Ok(routine),
			CaseOutcome::Rejected(reason) => attempts.push(CaseRejection {
				case: case.name(),
				reason,
			}),
		}
	}
	Err(BuildError::UnsupportedType { attempts })
}

/// Per-top-level-build mutable state
///
/// Holds the forward-reference handles for (schema, type) pairs that are
/// currently being compiled (so that recursive references reuse the handle
/// instead of recursing forever), and the lazily computed recursion cache.
/// One context lives for exactly one top-level build call.
pub(crate) struct BuilderContext<F> {
	forward: HashMap<(SchemaKey, TypeKey), Arc<OnceLock<F>>>,
	recursion: HashMap<SchemaKey, bool>,
}

impl<F> BuilderContext<F> {
	pub(crate) fn new() -> Self {
		Self {
			forward: HashMap::new(),
			recursion: HashMap::new(),
		}
	}

	/// The handle registered for this pair, if it is being compiled higher up
	/// the stack
	pub(crate) fn forward_ref(
		&self,
		schema_key: SchemaKey,
		type_key: TypeKey,
	) -> Option<Arc<OnceLock<F>>> {
		self.forward.get(&(schema_key, type_key)).cloned()
	}

	/// Register a fresh forward-reference handle for this pair
	pub(crate) fn register(&mut self, schema_key: SchemaKey, type_key: TypeKey) -> Arc<OnceLock<F>> {
		let cell = Arc::new(OnceLock::new());
		self.forward.insert((schema_key, type_key), cell.clone());
		cell
	}

	/// Assign the finalized routine to a handle; emitted exactly once per
	/// handle, after all child routines are ready
	pub(crate) fn finalize(&self, cell: &Arc<OnceLock<F>>, routine: F) {
		if cell.set(routine).is_err() {
			unreachable!("forward reference finalized twice");
		}
	}

	/// Drop a handle whose build failed, so that a later build attempt for the
	/// same pair (e.g. another union member candidate) does not pick up a cell
	/// that will never be finalized
	pub(crate) fn unregister(&mut self, schema_key: SchemaKey, type_key: TypeKey) {
		self.forward.remove(&(schema_key, type_key));
	}

	/// Is this schema node on any cyclic path of the schema graph?
	///
	/// Computed by graph search the first time a given schema node is
	/// encountered, then memoized for the rest of the build.
	pub(crate) fn is_recursive(&mut self, schema: &Schema, key: SchemaKey) -> bool {
		if let Some(&cached) = self.recursion.get(&key) {
			return cached;
		}
		let mut visited = vec![false; schema.nodes().len()];
		let recursive = reaches(schema, key, key, &mut visited);
		self.recursion.insert(key, recursive);
		recursive
	}
}

/// DFS: can `target` be reached again starting from `from`'s children?
fn reaches(schema: &Schema, from: SchemaKey, target: SchemaKey, visited: &mut [bool]) -> bool {
	for child in child_keys(&schema[from]) {
		if child == target {
			return true;
		}
		if !visited[child.idx()] {
			visited[child.idx()] = true;
			if reaches(schema, child, target, visited) {
				return true;
			}
		}
	}
	false
}

fn child_keys(node: &SchemaNode) -> Vec<SchemaKey> {
	match &node.ty {
		SchemaType::Array(items) => vec![*items],
		SchemaType::Map(values) => vec![*values],
		SchemaType::Union(members) => members.clone(),
		SchemaType::Record(record) => record.fields.iter().map(|f| f.schema).collect(),
		_ => Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::schema::{Name, Record, RecordField},
	};

	fn self_referential_schema() -> Schema {
		Schema::from_nodes(vec![
			SchemaType::Record(Record::new(
				Name::from_fully_qualified_name("Node"),
				vec![RecordField::new("next", SchemaKey::from_idx(1))],
			))
			.into(),
			SchemaType::Union(vec![SchemaKey::from_idx(2), SchemaKey::root()]).into(),
			SchemaType::Null.into(),
		])
		.unwrap()
	}

	#[test]
	fn detects_recursion() {
		let schema = self_referential_schema();
		let mut ctx = BuilderContext::<()>::new();
		assert!(ctx.is_recursive(&schema, SchemaKey::root()));
		assert!(ctx.is_recursive(&schema, SchemaKey::from_idx(1)));
		assert!(!ctx.is_recursive(&schema, SchemaKey::from_idx(2)));
	}

	#[test]
	fn acyclic_schema_is_not_recursive() {
		let schema = Schema::from_nodes(vec![
			SchemaType::Array(SchemaKey::from_idx(1)).into(),
			SchemaType::Int.into(),
		])
		.unwrap();
		let mut ctx = BuilderContext::<()>::new();
		assert!(!ctx.is_recursive(&schema, SchemaKey::root()));
	}
}
