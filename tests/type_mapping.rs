//! Binding native type descriptions to schemas: fuzzy field matching,
//! explicit overrides, defaults and the numeric widening rules

use {
	dynavro::{
		schema::{
			DefaultValue, Enum, Fixed, LogicalType, Name, Record, RecordField, Schema, SchemaKey,
			SchemaNode, SchemaType,
		},
		types::{
			EnumResolution, MemberBinding, RecordResolution, SymbolBinding, TypeGraph, TypeKey,
			TypeResolution,
		},
		BuildError, SerError, Value,
	},
	pretty_assertions::assert_eq,
};

fn name(s: &str) -> Name {
	Name::from_fully_qualified_name(s)
}

fn person_schema() -> Schema {
	Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("Person"),
			vec![
				RecordField::new("full_name", SchemaKey::from_idx(1)),
				RecordField::new("AGE", SchemaKey::from_idx(2)),
			],
		))
		.into(),
		SchemaType::String.into(),
		SchemaType::Long.into(),
	])
	.unwrap()
}

#[test]
fn fuzzy_matching_binds_schema_fields_to_members() {
	let schema = person_schema();
	let mut types = TypeGraph::new();
	let string = types.push(TypeResolution::String);
	let long = types.push(TypeResolution::Long);
	let person = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("fullName", string),
		MemberBinding::new("age", long),
	])));

	let value = Value::Record(vec![
		("fullName".to_owned(), Value::String("Ada".to_owned())),
		("age".to_owned(), Value::Long(36)),
	]);
	let serializer = dynavro::binary::serializer(&types, person, &schema).unwrap();
	let encoded = serializer.serialize_to_vec(&value).unwrap();
	assert_eq!(encoded, [6, b'A', b'd', b'a', 72]);

	let deserializer = dynavro::binary::deserializer(&types, person, &schema).unwrap();
	assert_eq!(deserializer.deserialize_slice(&encoded).unwrap(), value);
}

#[test]
fn explicit_name_overrides_fuzzy_matching() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("R"),
			vec![RecordField::new("fullName", SchemaKey::from_idx(1))],
		))
		.into(),
		SchemaType::Long.into(),
	])
	.unwrap();
	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		// would fuzzy-match, but the next member claims the field exactly
		MemberBinding::new("full_name", long),
		MemberBinding::new("other", long).with_explicit_name("fullName"),
	])));

	let serializer = dynavro::binary::serializer(&types, record, &schema).unwrap();
	let value = Value::Record(vec![
		("full_name".to_owned(), Value::Long(1)),
		("other".to_owned(), Value::Long(2)),
	]);
	// one schema field, bound to the second member
	assert_eq!(serializer.serialize_to_vec(&value).unwrap(), [4]);
}

#[test]
fn ambiguous_fuzzy_tie_is_a_build_error() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("R"),
			vec![RecordField::new("fullName", SchemaKey::from_idx(1))],
		))
		.into(),
		SchemaType::Long.into(),
	])
	.unwrap();
	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("full_name", long),
		MemberBinding::new("FULLNAME", long),
	])));

	assert!(matches!(
		dynavro::binary::serializer(&types, record, &schema),
		Err(BuildError::AmbiguousMapping { .. })
	));
}

fn versioned_schema(default: Option<DefaultValue>) -> Schema {
	let mut version = RecordField::new("version", SchemaKey::from_idx(1));
	if let Some(default) = default {
		version = version.with_default(default);
	}
	Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("R"),
			vec![RecordField::new("a", SchemaKey::from_idx(1)), version],
		))
		.into(),
		SchemaType::Long.into(),
	])
	.unwrap()
}

fn long_only_record() -> (TypeGraph, TypeKey) {
	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("a", long),
	])));
	(types, record)
}

#[test]
fn unmatched_field_encodes_its_default() {
	let schema = versioned_schema(Some(DefaultValue::new(serde_json::json!(3))));
	let (types, record) = long_only_record();
	let serializer = dynavro::binary::serializer(&types, record, &schema).unwrap();
	let value = Value::Record(vec![("a".to_owned(), Value::Long(1))]);
	assert_eq!(serializer.serialize_to_vec(&value).unwrap(), [2, 6]);
}

#[test]
fn unmatched_field_without_default_is_a_build_error() {
	let schema = versioned_schema(None);
	let (types, record) = long_only_record();
	assert!(matches!(
		dynavro::binary::serializer(&types, record, &schema),
		Err(BuildError::UnsupportedType { .. })
	));
}

#[test]
fn unmatched_wire_field_is_decoded_and_dropped() {
	let schema = versioned_schema(None);
	let (types, record) = long_only_record();
	let deserializer = dynavro::binary::deserializer(&types, record, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_slice(&[2, 6]).unwrap(),
		Value::Record(vec![("a".to_owned(), Value::Long(1))])
	);
}

#[test]
fn unmatched_member_must_be_optional_when_decoding() {
	let schema = Schema::from_nodes(vec![
		SchemaType::Record(Record::new(
			name("R"),
			vec![RecordField::new("a", SchemaKey::from_idx(1))],
		))
		.into(),
		SchemaType::Long.into(),
	])
	.unwrap();

	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("a", long),
		MemberBinding::new("extra", long),
	])));
	assert!(matches!(
		dynavro::binary::deserializer(&types, record, &schema),
		Err(BuildError::UnsupportedType { .. })
	));

	let mut types = TypeGraph::new();
	let long = types.push(TypeResolution::Long);
	let optional = types.push(TypeResolution::Optional(long));
	let record = types.push(TypeResolution::Record(RecordResolution::new(vec![
		MemberBinding::new("a", long),
		MemberBinding::new("extra", optional),
	])));
	let deserializer = dynavro::binary::deserializer(&types, record, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_slice(&[2]).unwrap(),
		Value::Record(vec![
			("a".to_owned(), Value::Long(1)),
			("extra".to_owned(), Value::Null),
		])
	);
}

#[test]
fn long_values_narrow_into_an_int_schema_with_a_range_check() {
	let schema = Schema::of(SchemaType::Int.into()).unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Long);
	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	assert_eq!(serializer.serialize_to_vec(&Value::Long(5)).unwrap(), [10]);
	assert!(matches!(
		serializer.serialize_to_vec(&Value::Long(i64::MAX)),
		Err(SerError::Overflow(_))
	));

	// decoding the other way widens
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_slice(&[10]).unwrap(),
		Value::Long(5)
	);
}

#[test]
fn fixed_schema_requires_exactly_its_size() {
	let schema = Schema::of(SchemaType::Fixed(Fixed::new(name("F"), 4)).into()).unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Bytes);
	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	assert!(matches!(
		serializer.serialize_to_vec(&Value::Bytes(vec![1, 2, 3])),
		Err(SerError::FixedSizeMismatch {
			expected: 4,
			actual: 3
		})
	));
}

#[test]
fn enum_symbols_bind_fuzzily_with_default_fallback() {
	let schema = Schema::of(
		SchemaType::Enum(
			Enum::new(name("Suit"), vec!["CLUBS".to_owned(), "DIAMONDS".to_owned()])
				.with_default("CLUBS"),
		)
		.into(),
	)
	.unwrap();
	let mut types = TypeGraph::new();
	let root = types.push(TypeResolution::Enum(EnumResolution::new(vec![
		SymbolBinding::new("clubs"),
		SymbolBinding::new("diamonds"),
		SymbolBinding::new("jokers"),
	])));

	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	assert_eq!(
		serializer
			.serialize_to_vec(&Value::Enum("diamonds".to_owned()))
			.unwrap(),
		[2]
	);
	// no schema symbol matches, so the enum default applies
	assert_eq!(
		serializer
			.serialize_to_vec(&Value::Enum("jokers".to_owned()))
			.unwrap(),
		[0]
	);

	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_slice(&[2]).unwrap(),
		Value::Enum("diamonds".to_owned())
	);
}

#[test]
fn unmatched_native_symbol_without_enum_default_is_a_build_error() {
	let schema = Schema::of(
		SchemaType::Enum(Enum::new(name("Suit"), vec!["CLUBS".to_owned()])).into(),
	)
	.unwrap();
	let mut types = TypeGraph::new();
	let root = types.push(TypeResolution::Enum(EnumResolution::new(vec![
		SymbolBinding::new("clubs"),
		SymbolBinding::new("jokers"),
	])));
	assert!(matches!(
		dynavro::binary::serializer(&types, root, &schema),
		Err(BuildError::UnsupportedType { .. })
	));
}

#[test]
fn unsupported_pair_reports_every_case_rejection() {
	let schema = Schema::of(SchemaType::Boolean.into()).unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::String);
	let err = dynavro::binary::serializer(&types, root, &schema).unwrap_err();
	let BuildError::UnsupportedType { attempts } = &err else {
		panic!("expected an aggregate rejection, got {err}");
	};
	assert_eq!(attempts.len(), 19);
	let message = err.to_string();
	assert!(message.contains("boolean"));
	assert!(message.contains("union"));
}

#[test]
fn time_millis_narrows_on_encode_and_widens_on_decode() {
	let schema =
		Schema::of(SchemaNode::with_logical_type(SchemaType::Int, LogicalType::TimeMillis))
			.unwrap();
	let (types, root) = TypeGraph::of(TypeResolution::Time);
	let serializer = dynavro::binary::serializer(&types, root, &schema).unwrap();
	// sub-millisecond precision is dropped
	assert_eq!(
		serializer
			.serialize_to_vec(&Value::Time(1_999_999))
			.unwrap(),
		[2]
	);
	let deserializer = dynavro::binary::deserializer(&types, root, &schema).unwrap();
	assert_eq!(
		deserializer.deserialize_slice(&[2]).unwrap(),
		Value::Time(1_000_000)
	);
}
