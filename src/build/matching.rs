//! Structural name matching between schema names and native member names
//!
//! Matching is two-tier: exact data-contract overrides
//! ([`explicit_name`](crate::types::MemberBinding::explicit_name)) take
//! precedence and bypass fuzzy matching entirely; remaining members are then
//! compared fuzzily (non-alphanumeric characters stripped, case ignored). A
//! fuzzy tie between several members is ambiguous and fatal.

use crate::{error::BuildError, types::SymbolBinding};

/// Compare identifiers ignoring case and non-alphanumeric characters
///
/// e.g. `full_name` matches `FullName`, `fullname` and `full-name`.
pub(crate) fn fuzzy_eq(a: &str, b: &str) -> bool {
	let mut a = a.chars().filter(|c| c.is_alphanumeric());
	let mut b = b.chars().filter(|c| c.is_alphanumeric());
	loop {
		match (a.next(), b.next()) {
			(None, None) => return true,
			(Some(x), Some(y)) => {
				if !x.to_lowercase().eq(y.to_lowercase()) {
					return false;
				}
			}
			_ => return false,
		}
	}
}

/// A candidate for matching: `(index, declared name, explicit override)`
pub(crate) type Candidate<'a> = (usize, &'a str, Option<&'a str>);

/// Resolve which member a schema name binds to
///
/// Returns `Ok(None)` when nothing matches (the caller decides whether a
/// default applies), and [`BuildError::AmbiguousMapping`] when several
/// members tie.
pub(crate) fn match_member<'a>(
	schema_name: &str,
	candidates: impl Iterator<Item = Candidate<'a>> + Clone,
) -> Result<Option<usize>, BuildError> {
	// Tier 1: exact explicit overrides
	let mut exact = candidates
		.clone()
		.filter(|&(_, _, explicit)| explicit == Some(schema_name));
	if let Some((idx, name, _)) = exact.next() {
		if let Some((_, other, _)) = exact.next() {
			return Err(BuildError::AmbiguousMapping {
				schema_name: schema_name.to_owned(),
				candidates: vec![name.to_owned(), other.to_owned()],
			});
		}
		return Ok(Some(idx));
	}

	// Tier 2: fuzzy matching on declared names; members carrying an explicit
	// override only ever bind through it
	let matches: Vec<(usize, &str)> = candidates
		.filter(|&(_, _, explicit)| explicit.is_none())
		.filter(|&(_, name, _)| fuzzy_eq(name, schema_name))
		.map(|(idx, name, _)| (idx, name))
		.collect();
	match matches.as_slice() {
		[] => Ok(None),
		[(idx, _)] => Ok(Some(*idx)),
		several => Err(BuildError::AmbiguousMapping {
			schema_name: schema_name.to_owned(),
			candidates: several.iter().map(|&(_, name)| name.to_owned()).collect(),
		}),
	}
}

/// Resolve which schema enum symbol a native symbol binds to
///
/// Same two tiers as [`match_member`], in the other direction: an explicit
/// override must match a schema symbol exactly, otherwise the native symbol
/// name is compared fuzzily against all schema symbols.
pub(crate) fn bind_symbol(
	binding: &SymbolBinding,
	symbols: &[String],
) -> Result<Option<usize>, BuildError> {
	if let Some(explicit) = &binding.explicit_name {
		return Ok(symbols.iter().position(|s| s == explicit));
	}
	let matches: Vec<usize> = symbols
		.iter()
		.enumerate()
		.filter(|(_, s)| fuzzy_eq(s, &binding.name))
		.map(|(i, _)| i)
		.collect();
	match matches.as_slice() {
		[] => Ok(None),
		[i] => Ok(Some(*i)),
		several => Err(BuildError::AmbiguousMapping {
			schema_name: binding.name.clone(),
			candidates: several.iter().map(|&i| symbols[i].clone()).collect(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fuzzy_matching_strips_punctuation_and_case() {
		assert!(fuzzy_eq("full_name", "FullName"));
		assert!(fuzzy_eq("full-name", "fullname"));
		assert!(!fuzzy_eq("full_name", "fullname2"));
		assert!(!fuzzy_eq("abc", "ab"));
	}

	#[test]
	fn explicit_override_beats_fuzzy() {
		// member 0 fuzzy-matches, but member 1 claims the name exactly
		let candidates = [(0usize, "full_name", None), (1usize, "other", Some("fullName"))];
		assert_eq!(
			match_member("fullName", candidates.iter().copied()).unwrap(),
			Some(1)
		);
	}

	#[test]
	fn fuzzy_tie_is_ambiguous() {
		let candidates = [(0usize, "full_name", None), (1usize, "FULLNAME", None)];
		assert!(matches!(
			match_member("fullName", candidates.iter().copied()),
			Err(BuildError::AmbiguousMapping { .. })
		));
	}

	#[test]
	fn no_match_is_not_an_error() {
		let candidates = [(0usize, "a", None)];
		assert_eq!(match_member("b", candidates.iter().copied()).unwrap(), None);
	}
}
