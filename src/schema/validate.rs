//! Invariant checks run once when freezing a node set into a [`Schema`]

use super::{LogicalType, Name, SchemaError, SchemaKey, SchemaNode, SchemaType};

pub(super) fn validate(nodes: &[SchemaNode]) -> Result<(), SchemaError> {
	if nodes.is_empty() {
		return Err(SchemaError::new(
			"Schema must have at least one node (the root)",
		));
	}
	for node in nodes {
		validate_node(node, nodes)?;
	}
	check_cycles(nodes)?;
	Ok(())
}

fn check_key(key: SchemaKey, nodes: &[SchemaNode]) -> Result<(), SchemaError> {
	if key.idx() >= nodes.len() {
		return Err(SchemaError::msg(format_args!(
			"SchemaKey index {} is out of bounds (len: {})",
			key.idx(),
			nodes.len()
		)));
	}
	Ok(())
}

fn check_name(name: &Name, aliases: &super::Aliases) -> Result<(), SchemaError> {
	if name.name().is_empty() {
		return Err(SchemaError::new("Named schema node has an empty name"));
	}
	if aliases.contains(name.name()) || aliases.contains(name.fully_qualified_name()) {
		return Err(SchemaError::msg(format_args!(
			"Aliases of {:?} are not disjoint from its name",
			name.fully_qualified_name()
		)));
	}
	Ok(())
}

fn validate_node(node: &SchemaNode, nodes: &[SchemaNode]) -> Result<(), SchemaError> {
	match &node.ty {
		SchemaType::Null
		| SchemaType::Boolean
		| SchemaType::Int
		| SchemaType::Long
		| SchemaType::Float
		| SchemaType::Double
		| SchemaType::Bytes
		| SchemaType::String => {}
		SchemaType::Fixed(fixed) => check_name(&fixed.name, &fixed.aliases)?,
		SchemaType::Enum(enum_) => {
			check_name(&enum_.name, &enum_.aliases)?;
			for (i, symbol) in enum_.symbols.iter().enumerate() {
				if enum_.symbols[..i].contains(symbol) {
					return Err(SchemaError::msg(format_args!(
						"Duplicate symbol {symbol:?} in enum {:?}",
						enum_.name.fully_qualified_name()
					)));
				}
			}
			if let Some(default) = &enum_.default {
				if !enum_.symbols.contains(default) {
					return Err(SchemaError::msg(format_args!(
						"Default symbol {default:?} of enum {:?} is not one of its symbols",
						enum_.name.fully_qualified_name()
					)));
				}
			}
		}
		SchemaType::Array(items) => check_key(*items, nodes)?,
		SchemaType::Map(values) => check_key(*values, nodes)?,
		SchemaType::Record(record) => {
			check_name(&record.name, &record.aliases)?;
			for (i, field) in record.fields.iter().enumerate() {
				check_key(field.schema, nodes)?;
				if record.fields[..i].iter().any(|f| f.name == field.name) {
					return Err(SchemaError::msg(format_args!(
						"Duplicate field {:?} in record {:?}",
						field.name,
						record.name.fully_qualified_name()
					)));
				}
			}
		}
		SchemaType::Union(members) => {
			if members.is_empty() {
				return Err(SchemaError::new("Union schema has no members"));
			}
			for &member in members {
				check_key(member, nodes)?;
				if matches!(nodes[member.idx()].ty, SchemaType::Union(_)) {
					return Err(SchemaError::new(
						"Union schema directly nests another union",
					));
				}
			}
		}
	}
	if let Some(logical_type) = &node.logical_type {
		let underlying_ok = match (logical_type, &node.ty) {
			(LogicalType::Decimal(_), SchemaType::Bytes | SchemaType::Fixed(_)) => true,
			(LogicalType::Date | LogicalType::TimeMillis, SchemaType::Int) => true,
			(
				LogicalType::TimeMicros
				| LogicalType::TimestampMillis
				| LogicalType::TimestampMicros,
				SchemaType::Long,
			) => true,
			(LogicalType::Duration, SchemaType::Fixed(fixed)) => fixed.size == 12,
			_ => false,
		};
		if !underlying_ok {
			return Err(SchemaError::msg(format_args!(
				"Logical type {:?} cannot annotate a {} schema",
				logical_type.as_str(),
				node.ty.kind_name()
			)));
		}
	}
	Ok(())
}

/// Reject the two kinds of cycles the compiled routines could never process:
/// - cycles that never pass through a record (not expressible in avro anyway,
///   since only named types can be referenced)
/// - cycles made of records only, which would decode zero bytes per level and
///   therefore recurse forever on any input
///
/// Conditional self-reference (e.g. `Self { next: union { null, Self } }`)
/// stays legal: every level consumes at least one byte.
fn check_cycles(nodes: &[SchemaNode]) -> Result<(), SchemaError> {
	let mut visited = vec![false; nodes.len()];
	let mut checked = vec![false; nodes.len()];
	for idx in 0..nodes.len() {
		if matches!(nodes[idx].ty, SchemaType::Record(_)) && !checked[idx] {
			check_no_record_only_cycle(nodes, idx, &mut visited, &mut checked)?;
		}
	}

	let mut state = vec![VisitState::White; nodes.len()];
	for idx in 0..nodes.len() {
		if state[idx] == VisitState::White {
			check_no_recordless_cycle(nodes, idx, &mut state)?;
		}
	}
	Ok(())
}

fn check_no_record_only_cycle(
	nodes: &[SchemaNode],
	node_idx: usize,
	visited: &mut Vec<bool>,
	checked: &mut Vec<bool>,
) -> Result<(), SchemaError> {
	visited[node_idx] = true;
	let fields = match &nodes[node_idx].ty {
		SchemaType::Record(record) => &record.fields,
		_ => unreachable!(),
	};
	for field in fields {
		if let SchemaType::Record(_) = nodes[field.schema.idx()].ty {
			if visited[field.schema.idx()] {
				return Err(SchemaError::new(
					"The schema contains a record that ends up always containing itself",
				));
			}
			check_no_record_only_cycle(nodes, field.schema.idx(), visited, checked)?;
		}
	}
	visited[node_idx] = false;
	// If we have visited a node and it was ok as part of another record, no need
	// to re-visit it individually.
	checked[node_idx] = true;
	Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
	White,
	Grey,
	Black,
}

/// DFS over the graph with record out-edges removed: any remaining cycle
/// cannot be broken by a forward-referenceable routine
fn check_no_recordless_cycle(
	nodes: &[SchemaNode],
	node_idx: usize,
	state: &mut Vec<VisitState>,
) -> Result<(), SchemaError> {
	state[node_idx] = VisitState::Grey;
	let children: Vec<SchemaKey> = match &nodes[node_idx].ty {
		SchemaType::Array(items) => vec![*items],
		SchemaType::Map(values) => vec![*values],
		SchemaType::Union(members) => members.clone(),
		// Record out-edges cut: a cycle through a record is handled through
		// the builder's forward references
		_ => Vec::new(),
	};
	for child in children {
		match state[child.idx()] {
			VisitState::Grey => {
				return Err(SchemaError::new(
					"The schema contains a cycle that never passes through a record",
				));
			}
			VisitState::White => check_no_recordless_cycle(nodes, child.idx(), state)?,
			VisitState::Black => {}
		}
	}
	state[node_idx] = VisitState::Black;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::super::*;

	fn name(s: &str) -> Name {
		Name::from_fully_qualified_name(s)
	}

	#[test]
	fn rejects_duplicate_enum_symbols() {
		let enum_ = Enum::new(name("E"), vec!["A".to_owned(), "A".to_owned()]);
		assert!(Schema::of(SchemaType::Enum(enum_).into()).is_err());
	}

	#[test]
	fn rejects_directly_nested_unions() {
		let nodes = vec![
			SchemaType::Union(vec![SchemaKey::from_idx(1)]).into(),
			SchemaType::Union(vec![SchemaKey::from_idx(2)]).into(),
			SchemaType::Int.into(),
		];
		assert!(Schema::from_nodes(nodes).is_err());
	}

	#[test]
	fn rejects_empty_union() {
		assert!(Schema::of(SchemaType::Union(Vec::new()).into()).is_err());
	}

	#[test]
	fn rejects_logical_type_on_wrong_underlying_type() {
		let node = SchemaNode::with_logical_type(
			SchemaType::String,
			LogicalType::Decimal(Decimal::new(10, 2)),
		);
		assert!(Schema::of(node).is_err());
	}

	#[test]
	fn rejects_alias_equal_to_name() {
		let mut fixed = Fixed::new(name("F"), 4);
		fixed.aliases.try_insert("F").unwrap();
		assert!(Schema::of(SchemaType::Fixed(fixed).into()).is_err());
	}

	#[test]
	fn rejects_record_always_containing_itself() {
		let record = Record::new(
			name("Ouroboros"),
			vec![RecordField::new("tail", SchemaKey::root())],
		);
		assert!(Schema::of(SchemaType::Record(record).into()).is_err());
	}

	#[test]
	fn rejects_recordless_cycle() {
		let nodes = vec![SchemaType::Array(SchemaKey::root()).into()];
		assert!(Schema::from_nodes(nodes).is_err());
	}

	#[test]
	fn accepts_conditional_self_reference() {
		let nodes = vec![
			SchemaType::Record(Record::new(
				name("Node"),
				vec![RecordField::new("next", SchemaKey::from_idx(1))],
			))
			.into(),
			SchemaType::Union(vec![SchemaKey::from_idx(2), SchemaKey::root()]).into(),
			SchemaType::Null.into(),
		];
		assert!(Schema::from_nodes(nodes).is_ok());
	}
}
