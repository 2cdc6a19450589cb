//! Encode-then-decode over a table of schemas against a fully dynamic target,
//! with the binary wire bytes pinned down

use {
	dynavro::{
		schema::{
			Decimal, Enum, Fixed, LogicalType, Name, Record, RecordField, Schema, SchemaKey,
			SchemaNode, SchemaType,
		},
		types::{TypeGraph, TypeResolution},
		Duration, Value,
	},
	lazy_static::lazy_static,
	pretty_assertions::assert_eq,
};

fn name(s: &str) -> Name {
	Name::from_fully_qualified_name(s)
}

lazy_static! {
	static ref ROUND_TRIP_CASES: Vec<(Schema, Value, Vec<u8>)> = vec![
		(
			Schema::of(SchemaType::Null.into()).unwrap(),
			Value::Null,
			vec![],
		),
		(
			Schema::of(SchemaType::Boolean.into()).unwrap(),
			Value::Boolean(true),
			vec![1],
		),
		(
			Schema::of(SchemaType::Int.into()).unwrap(),
			Value::Int(1234),
			vec![0xA4, 0x13],
		),
		(
			Schema::of(SchemaType::Long.into()).unwrap(),
			Value::Long(-3),
			vec![5],
		),
		(
			Schema::of(SchemaType::Float.into()).unwrap(),
			Value::Float(1234.0),
			1234.0f32.to_le_bytes().to_vec(),
		),
		(
			Schema::of(SchemaType::Double.into()).unwrap(),
			Value::Double(-2.5),
			(-2.5f64).to_le_bytes().to_vec(),
		),
		(
			Schema::of(SchemaType::String.into()).unwrap(),
			Value::String("foo".to_owned()),
			vec![6, b'f', b'o', b'o'],
		),
		(
			Schema::of(SchemaType::Bytes.into()).unwrap(),
			Value::Bytes(vec![0xDE, 0xAD]),
			vec![4, 0xDE, 0xAD],
		),
		(
			Schema::of(SchemaType::Fixed(Fixed::new(name("Test"), 1)).into()).unwrap(),
			Value::Bytes(vec![b'B']),
			vec![b'B'],
		),
		(
			Schema::of(
				SchemaType::Enum(Enum::new(name("Test"), vec!["A".to_owned(), "B".to_owned()]))
					.into(),
			)
			.unwrap(),
			Value::Enum("B".to_owned()),
			vec![2],
		),
		(
			Schema::from_nodes(vec![
				SchemaType::Array(SchemaKey::from_idx(1)).into(),
				SchemaType::Long.into(),
			])
			.unwrap(),
			Value::Array(vec![Value::Long(1), Value::Long(3), Value::Long(2)]),
			vec![6, 2, 6, 4, 0],
		),
		(
			Schema::from_nodes(vec![
				SchemaType::Map(SchemaKey::from_idx(1)).into(),
				SchemaType::Long.into(),
			])
			.unwrap(),
			Value::Map(vec![("a".to_owned(), Value::Long(1))]),
			vec![2, 2, b'a', 2, 0],
		),
		(
			Schema::from_nodes(vec![
				SchemaType::Record(Record::new(
					name("Test"),
					vec![RecordField::new("f", SchemaKey::from_idx(1))],
				))
				.into(),
				SchemaType::Long.into(),
			])
			.unwrap(),
			Value::Record(vec![("f".to_owned(), Value::Long(1))]),
			vec![2],
		),
		(
			Schema::of(SchemaNode::with_logical_type(
				SchemaType::Bytes,
				LogicalType::Decimal(Decimal::new(10, 2)),
			))
			.unwrap(),
			Value::Decimal("1.23".parse().unwrap()),
			vec![2, 123],
		),
		(
			Schema::of(SchemaNode::with_logical_type(
				SchemaType::Int,
				LogicalType::Date,
			))
			.unwrap(),
			Value::Date(100),
			vec![0xC8, 0x01],
		),
		(
			Schema::of(SchemaNode::with_logical_type(
				SchemaType::Long,
				LogicalType::TimestampMicros,
			))
			.unwrap(),
			Value::Timestamp(2_000),
			vec![4],
		),
		(
			Schema::of(SchemaNode::with_logical_type(
				SchemaType::Fixed(Fixed::new(name("Dur"), 12)),
				LogicalType::Duration,
			))
			.unwrap(),
			Value::Duration(Duration::new(1, 2, 3)),
			vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0],
		),
	];
}

#[test]
fn binary_round_trips_against_a_dynamic_target() {
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);
	for (schema, value, expected) in ROUND_TRIP_CASES.iter() {
		let serializer = dynavro::binary::serializer(&types, root, schema).unwrap();
		let deserializer = dynavro::binary::deserializer(&types, root, schema).unwrap();
		let encoded = serializer.serialize_to_vec(value).unwrap();
		assert_eq!(&encoded, expected, "schema: {schema:?}");
		assert_eq!(
			&deserializer.deserialize_slice(&encoded).unwrap(),
			value,
			"schema: {schema:?}"
		);
	}
}

#[test]
fn json_round_trips_against_a_dynamic_target() {
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);
	for (schema, value, _) in ROUND_TRIP_CASES.iter() {
		let serializer = dynavro::json::serializer(&types, root, schema).unwrap();
		let deserializer = dynavro::json::deserializer(&types, root, schema).unwrap();
		let text = serializer.serialize_to_string(value).unwrap();
		assert_eq!(
			&deserializer.deserialize_str(&text).unwrap(),
			value,
			"schema: {schema:?}, text: {text}"
		);
	}
}

#[test]
fn routines_outlive_the_graphs_they_were_compiled_from() {
	let serializer;
	let deserializer;
	{
		let schema = Schema::of(SchemaType::Long.into()).unwrap();
		let (types, root) = TypeGraph::of(TypeResolution::Long);
		serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
		deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();
	}
	let encoded = serializer.serialize_to_vec(&Value::Long(17)).unwrap();
	assert_eq!(encoded, [34]);
	assert_eq!(
		deserializer.deserialize_slice(&encoded).unwrap(),
		Value::Long(17)
	);
}
