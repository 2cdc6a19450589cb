//! Rules specific to the Avro JSON encoding: tagged unions, byte strings and
//! order-independent record fields

use {
	dynavro::{
		schema::{
			DefaultValue, Enum, Name, Record, RecordField, Schema, SchemaKey, SchemaType,
		},
		types::{
			EnumResolution, MemberBinding, RecordResolution, SymbolBinding, TypeGraph,
			TypeResolution,
		},
		DeError, Value,
	},
	pretty_assertions::assert_eq,
};

fn name(s: &str) -> Name {
	Name::from_fully_qualified_name(s)
}

fn pair_schema(b_default: Option<DefaultValue>) -> Schema {
	let mut b = RecordField::new("b", SchemaKey::from_idx(2));
	if let Some(default) = b_default {
		b = b.with_default(default);
	}
	Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("Pair"),
			vec![RecordField::new("a", SchemaKey::from_idx(1)), b],
		))
		.into(),
		SchemaType::Long.into(),
		SchemaType::String.into(),
	])
	.unwrap()
}

fn pair_types() -> (TypeGraph, dynavro::TypeKey) {
	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let string = types.push(TypeResolution::String);
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("a", long),
		MemberBinding::new("b", string),
	])));
	(types, record)
}

#[test]
fn records_encode_in_schema_order_and_decode_in_any_order() {
	let schema = pair_schema(None);
	let (types, record) = pair_types();
	let serializer = dynavro::json::serializer(&types, record, &schema).unwrap();
	let deserializer = dynavro::json::deserializer(&types, record, &schema).unwrap();

	let value = Value::Record(vec![
		("a".to_owned(), Value::Long(1)),
		("b".to_owned(), Value::String("x".to_owned())),
	]);
	assert_eq!(
		serializer.serialize_to_string(&value).unwrap(),
		r#"{"a":1,"b":"x"}"#
	);
	assert_eq!(
		deserializer.deserialize_str(r#"{"b": "x", "a": 1}"#).unwrap(),
		value
	);
}

#[test]
fn unknown_record_key_is_an_error() {
	let schema = pair_schema(None);
	let (types, record) = pair_types();
	let deserializer = dynavro::json::deserializer(&types, record, &schema).unwrap();
	assert!(matches!(
		deserializer.deserialize_str(r#"{"a": 1, "b": "x", "zzz": 2}"#),
		Err(DeError::InvalidEncoding { .. })
	));
}

#[test]
fn missing_field_falls_back_to_the_schema_default() {
	let schema = pair_schema(Some(DefaultValue::new(serde_json::json!("d"))));
	let (types, record) = pair_types();
	let deserializer = dynavro::json::deserializer(&types, record, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_str(r#"{"a": 1}"#).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::Long(1)),
			("b".to_owned(), Value::String("d".to_owned())),
		])
	);
}

#[test]
fn missing_field_without_default_is_an_error() {
	let schema = pair_schema(None);
	let (types, record) = pair_types();
	let deserializer = dynavro::json::deserializer(&types, record, &schema).unwrap();
	assert!(matches!(
		deserializer.deserialize_str(r#"{"a": 1}"#),
		Err(DeError::InvalidEncoding { .. })
	));
}

#[test]
fn schema_fields_without_a_member_are_skipped() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("R"),
			vec![
				RecordField::new("a", SchemaKey::from_idx(1)),
				RecordField::new("extra", SchemaKey::from_idx(2)),
			],
		))
		.into(),
		SchemaType::Long.into(),
		SchemaType::Array(SchemaKey::from_idx(1)).into(),
	])
	.unwrap();
	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("a", long),
	])));
	let deserializer = dynavro::json::deserializer(&types, record, &schema).unwrap();
	assert_eq!(
		deserializer
			.deserialize_str(r#"{"a": 1, "extra": [1, 2, 3]}"#)
			.unwrap(),
		Value::Record(vec![("a".to_owned(), Value::Long(1))])
	);
}

#[test]
fn unions_are_tagged_objects_with_a_bare_null() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Union(vec![
			SchemaKey::from_idx(1),
			SchemaKey::from_idx(2),
			SchemaKey::from_idx(3),
		])
		.into(),
		SchemaType::Null.into(),
		SchemaType::Int.into(),
		SchemaType::String.into(),
	])
	.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);
	let serializer = dynavro::json::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::json::deserializer(&types, root, &schema).unwrap();

	assert_eq!(serializer.serialize_to_string(&Value::Null).unwrap(), "null");
	assert_eq!(
		serializer.serialize_to_string(&Value::Int(42)).unwrap(),
		r#"{"int":42}"#
	);
	assert_eq!(
		serializer
			.serialize_to_string(&Value::String("hi".to_owned()))
			.unwrap(),
		r#"{"string":"hi"}"#
	);

	assert_eq!(deserializer.deserialize_str("null").unwrap(), Value::Null);
	assert_eq!(
		deserializer.deserialize_str(r#"{"int": 42}"#).unwrap(),
		Value::Int(42)
	);
	assert!(matches!(
		deserializer.deserialize_str(r#"{"boolean": true}"#),
		Err(DeError::InvalidEncoding { .. })
	));
}

#[test]
fn named_union_members_are_keyed_by_their_full_name() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Union(vec![SchemaKey::from_idx(1), SchemaKey::from_idx(2)]).into(),
		SchemaType::Null.into(),
		SchemaType::Record(Record::new(
			name("org.example.Rec"),
			vec![RecordField::new("f", SchemaKey::from_idx(3))],
		))
		.into(),
		SchemaType::Long.into(),
	])
	.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Dynamic);
	let serializer = dynavro::json::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::json::deserializer(&types, root, &schema).unwrap();

	let value = Value::Record(vec![("f".to_owned(), Value::Long(1))]);
	let text = serializer.serialize_to_string(&value).unwrap();
	assert_eq!(text, r#"{"org.example.Rec":{"f":1}}"#);
	assert_eq!(deserializer.deserialize_str(&text).unwrap(), value);
}

#[test]
fn byte_strings_use_one_code_point_per_byte() {
	let schema = Schema::of(SchemaType::Bytes.into()).unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Bytes);
	let serializer = dynavro::json::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::json::deserializer(&types, root, &schema).unwrap();

	let value = Value::Bytes(vec![0x00, 0x41, 0xFF]);
	let text = serializer.serialize_to_string(&value).unwrap();
	assert_eq!(text, "\"\\u0000A\u{ff}\"");
	assert_eq!(deserializer.deserialize_str(&text).unwrap(), value);

	// code points above U+00FF cannot be bytes
	assert!(matches!(
		deserializer.deserialize_str("\"\u{100}\""),
		Err(DeError::InvalidEncoding { .. })
	));
}

#[test]
fn enum_values_are_written_as_schema_symbols() {
	let schema = Schema::of(
		SchemaType::Enum(Enum::new(name("E"), vec!["A".to_owned(), "B".to_owned()])).into(),
	)
	.unwrap();
	let mut types = TypeGraph::new();
	let root = types.push(TypeResolution::Enum(EnumResolution::new(vec![
		SymbolBinding::new("a"),
		SymbolBinding::new("b"),
	])));
	let serializer = dynavro::json::serializer(&types, root, &schema).unwrap();
	let deserializer = dynavro::json::deserializer(&types, root, &schema).unwrap();

	assert_eq!(
		serializer
			.serialize_to_string(&Value::Enum("b".to_owned()))
			.unwrap(),
		"\"B\""
	);
	assert_eq!(
		deserializer.deserialize_str("\"B\"").unwrap(),
		Value::Enum("b".to_owned())
	);
	assert!(matches!(
		deserializer.deserialize_str("\"C\""),
		Err(DeError::InvalidEncoding { .. })
	));
}

#[test]
fn trailing_data_is_rejected() {
	let schema = Schema::of(SchemaType::Long.into()).unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Long);
	let deserializer = dynavro::json::deserializer(&types, root, &schema).unwrap();
	assert_eq!(deserializer.deserialize_str(" 7 ").unwrap(), Value::Long(7));
	assert!(matches!(
		deserializer.deserialize_str("7 8"),
		Err(DeError::InvalidEncoding { .. })
	));
}
