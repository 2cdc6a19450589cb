//! Union member selection policies, self-referential schemas and the lenient
//! wire forms the decoder accepts

use {
	dynavro::{
		schema::{
			Fixed, LogicalType, Name, Record, RecordField, Schema, SchemaKey, SchemaNode,
			SchemaType,
		},
		types::{MemberBinding, RecordResolution, TypeGraph, TypeKey, TypeResolution},
		BuildError, DeError, Duration, Value,
	},
	pretty_assertions::assert_eq,
};

fn name(s: &str) -> Name {
	Name::from_fully_qualified_name(s)
}

#[test]
fn optional_type_binds_to_a_union_with_a_null_member() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Union(vec![SchemaKey::from_idx(1), SchemaKey::from_idx(2)]).into(),
		SchemaType::Null.into(),
		SchemaType::String.into(),
	])
	.unwrap();
	let mut types = TypeGraph::new();
	let string = types.push(TypeResolution::String);
	let optional = types.push(TypeResolution::Optional(string));

	let serializer = dynavro::binary::serializer(&types, optional, &schema).unwrap();
	let deserializer = dynavro::binary::deserializer(&types, optional, &schema).unwrap();

	assert_eq!(serializer.serialize_to_vec(&Value::Null).unwrap(), [0]);
	let some = Value::String("hi".to_owned());
	let encoded = serializer.serialize_to_vec(&some).unwrap();
	assert_eq!(encoded, [2, 4, b'h', b'i']);
	assert_eq!(deserializer.deserialize_slice(&[0]).unwrap(), Value::Null);
	assert_eq!(deserializer.deserialize_slice(&encoded).unwrap(), some);
}

#[test]
fn optional_type_requires_a_null_member() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Union(vec![SchemaKey::from_idx(1)]).into(),
		SchemaType::String.into(),
	])
	.unwrap();
	let mut types = TypeGraph::new();
	let string = types.push(TypeResolution::String);
	let optional = types.push(TypeResolution::Optional(string));
	assert!(matches!(
		dynavro::binary::serializer(&types, optional, &schema),
		Err(BuildError::UnsupportedType { .. })
	));
}

#[test]
fn plain_type_binds_to_the_first_compatible_member() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Union(vec![SchemaKey::from_idx(1), SchemaKey::from_idx(2)]).into(),
		SchemaType::Int.into(),
		SchemaType::String.into(),
	])
	.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::String);

	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	assert_eq!(
		serializer
			.serialize_to_vec(&Value::String("x".to_owned()))
			.unwrap(),
		[2, 2, b'x']
	);

	// decoding requires every member to fit the target, and the int member
	// cannot decode into a string
	assert!(matches!(
		dynavro::binary::deserializer(&types, root, &schema),
		Err(BuildError::UnsupportedType { .. })
	));
}

#[test]
fn dynamic_union_picks_the_member_by_value_shape() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Union(vec![
			SchemaKey::from_idx(1),
			SchemaKey::from_idx(2),
			SchemaKey::from_idx(3),
		])
		.into(),
		SchemaType::Null.into(),
		SchemaType::Long.into(),
		SchemaType::String.into(),
	])
	.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);

	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();

	assert_eq!(serializer.serialize_to_vec(&Value::Null).unwrap(), [0]);
	assert_eq!(serializer.serialize_to_vec(&Value::Long(7)).unwrap(), [2, 14]);
	// ints are accepted by the long member
	assert_eq!(serializer.serialize_to_vec(&Value::Int(7)).unwrap(), [2, 14]);
	assert_eq!(
		serializer
			.serialize_to_vec(&Value::String("y".to_owned()))
			.unwrap(),
		[4, 2, b'y']
	);

	assert_eq!(
		deserializer.deserialize_slice(&[2, 14]).unwrap(),
		Value::Long(7)
	);
	assert!(matches!(
		// discriminant 4 is out of range for a three-member union
		deserializer.deserialize_slice(&[8]),
		Err(DeError::InvalidEncoding { .. })
	));
}

fn linked_list_schema() -> Schema {
	Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("Node"),
			vec![RecordField::new("next", SchemaKey::from_idx(1))],
		))
		.into(),
		SchemaType::Union(vec![SchemaKey::from_idx(2), SchemaKey::from_idx(0)]).into(),
		SchemaType::Null.into(),
	])
	.unwrap()
}

fn chain(depth: usize) -> Value {
	let mut value = Value::Null;
	for _ in 0..depth {
		value = Value::Record(vec![("next".to_owned(), value)]);
	}
	value
}

#[test]
fn recursive_schema_round_trips_against_a_dynamic_target() {
	let schema = linked_list_schema();
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);
	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();

	let value = chain(100);
	let encoded = serializer.serialize_to_vec(&value).unwrap();
	// 99 links to a further node, then the null terminator
	let mut expected = vec![2u8; 99];
	expected.push(0);
	assert_eq!(encoded, expected);
	assert_eq!(deserializer.deserialize_slice(&encoded).unwrap(), value);
}

fn linked_list_types() -> (TypeGraph, TypeKey) {
	let mut types = TypeGraph::new();
	// the record references the optional, which points back at the record
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("next", TypeKey::from_idx(1)),
	])));
	types.push(TypeResolution::Optional(record));
	(types, record)
}

#[test]
fn recursive_schema_round_trips_against_a_typed_target() {
	let schema = linked_list_schema();
	let (types, root) = linked_list_types();
	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();

	let value = chain(100);
	let encoded = serializer.serialize_to_vec(&value).unwrap();
	assert_eq!(deserializer.deserialize_slice(&encoded).unwrap(), value);
}

#[test]
fn boolean_decoding_accepts_any_non_zero_byte() {
	let schema = Schema::of(SchemaType::Boolean.into()).unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Boolean);
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_slice(&[5]).unwrap(),
		Value::Boolean(true)
	);
	assert_eq!(
		deserializer.deserialize_slice(&[0]).unwrap(),
		Value::Boolean(false)
	);
}

#[test]
fn negative_block_counts_are_understood() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Array(SchemaKey::from_idx(1)).into(),
		SchemaType::Long.into(),
	])
	.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();
	// block count -3 followed by the block's byte size
	assert_eq!(
		deserializer.deserialize_slice(&[5, 6, 2, 4, 6, 0]).unwrap(),
		Value::Array(vec![Value::Long(1), Value::Long(2), Value::Long(3)])
	);
}

#[test]
fn duration_months_are_rejected_for_span_only_targets() {
	let schema = Schema::of(SchemaNode::with_logical_type(
		SchemaType::Fixed(Fixed::new(name("Dur"), 12)),
		LogicalType::Duration,
	))
	.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Duration {
		supports_months: false,
	});
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();

	let with_months = dynavro::binary::serializer(
		&TypeGraph::of(TypeResolution::Dynamic).0,
		TypeKey::from_idx(0),
		&schema,
	)
	.unwrap()
	.serialize_to_vec(&Value::Duration(Duration::new(1, 0, 0)))
	.unwrap();
	assert!(matches!(
		deserializer.deserialize_slice(&with_months),
		Err(DeError::Overflow { .. })
	));

	let span_only = [0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0];
	assert_eq!(
		deserializer.deserialize_slice(&span_only).unwrap(),
		Value::Duration(Duration::new(0, 2, 0))
	);
}
