use super::SchemaError;

/// Schema component for named nodes of a [`Schema`](super::Schema)
///
/// This holds both the "name" and the "namespace".
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
	fully_qualified_name: String,
	namespace_delimiter_idx: Option<usize>,
}

impl std::fmt::Debug for Name {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.fully_qualified_name, f)
	}
}

impl Name {
	/// The rightmost component of the fully qualified name
	///
	/// e.g. in `a.b.c` it's `c`
	pub fn name(&self) -> &str {
		match self.namespace_delimiter_idx {
			None => &self.fully_qualified_name,
			Some(delimiter_idx) => &self.fully_qualified_name[delimiter_idx + 1..],
		}
	}

	/// The namespace component of the fully qualified name
	///
	/// e.g. in `a.b.c` it's `a.b`
	pub fn namespace(&self) -> Option<&str> {
		self.namespace_delimiter_idx
			.map(|idx| &self.fully_qualified_name[..idx])
	}

	/// The fully qualified name
	///
	/// e.g. in `a.b.c` it's `a.b.c`
	pub fn fully_qualified_name(&self) -> &str {
		&self.fully_qualified_name
	}

	/// Build a [`Name`] from a fully qualified name
	///
	/// Side note if doing weird stuff: If the only `.` in the fully qualified
	/// name is at the beginning of the string, it will be stripped, that is, we
	/// will parse `namespace: None, name: "anything_behind_the_dot"`.
	pub fn from_fully_qualified_name(fully_qualified_name: impl Into<String>) -> Self {
		fn non_generic_inner(mut fully_qualified_name: String) -> Name {
			Name {
				namespace_delimiter_idx: match fully_qualified_name.rfind('.') {
					Some(0) => {
						// Let's parse ".x" as {namespace: None, name: "x"}
						fully_qualified_name.remove(0);
						None
					}
					other => other,
				},
				fully_qualified_name,
			}
		}
		non_generic_inner(fully_qualified_name.into())
	}
}

/// Insertion-ordered set of alternate names for a named schema node
///
/// Inserting enforces the uniqueness constraint of the set: an alias may only
/// appear once. Disjointness with the node's own name is checked when the node
/// set is validated into a [`Schema`](super::Schema), once the name is known.
#[derive(Clone, Debug, Default)]
pub struct Aliases {
	items: Vec<String>,
}

impl Aliases {
	/// An empty alias set
	pub fn new() -> Self {
		Self { items: Vec::new() }
	}

	/// Insert an alias at the end of the set, erroring on duplicates
	pub fn try_insert(&mut self, alias: impl Into<String>) -> Result<(), SchemaError> {
		let alias = alias.into();
		if self.items.iter().any(|a| *a == alias) {
			return Err(SchemaError::msg(format_args!("Duplicate alias: {alias:?}")));
		}
		self.items.push(alias);
		Ok(())
	}

	/// Build an alias set from names, erroring on duplicates
	pub fn try_from_iter<I: IntoIterator<Item = S>, S: Into<String>>(
		iter: I,
	) -> Result<Self, SchemaError> {
		let mut aliases = Self::new();
		for alias in iter {
			aliases.try_insert(alias)?;
		}
		Ok(aliases)
	}

	/// Iterate the aliases in insertion order
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.items.iter().map(|s| s.as_str())
	}

	pub fn contains(&self, alias: &str) -> bool {
		self.items.iter().any(|a| a == alias)
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_components() {
		let name = Name::from_fully_qualified_name("a.b.c");
		assert_eq!(name.name(), "c");
		assert_eq!(name.namespace(), Some("a.b"));
		assert_eq!(name.fully_qualified_name(), "a.b.c");

		let name = Name::from_fully_qualified_name("c");
		assert_eq!(name.name(), "c");
		assert_eq!(name.namespace(), None);
	}

	#[test]
	fn aliases_preserve_insertion_order_and_reject_duplicates() {
		let mut aliases = Aliases::new();
		aliases.try_insert("b").unwrap();
		aliases.try_insert("a").unwrap();
		assert!(aliases.try_insert("b").is_err());
		assert_eq!(aliases.iter().collect::<Vec<_>>(), ["b", "a"]);
	}
}
