use std::borrow::Cow;

/// Any error that may happen when constructing or validating a
/// [`Schema`](super::Schema)
#[derive(thiserror::Error)]
#[error("{}", inner.value)]
pub struct SchemaError {
	inner: Box<ErrorInner>,
}

struct ErrorInner {
	value: Cow<'static, str>,
}

impl SchemaError {
	/// If you need a dynamic string use `SchemaError::msg(format_args!(...))`
	pub(crate) fn new(s: &'static str) -> Self {
		Self {
			inner: Box::new(ErrorInner {
				value: Cow::Borrowed(s),
			}),
		}
	}

	pub(crate) fn msg(s: std::fmt::Arguments<'_>) -> Self {
		Self {
			inner: Box::new(ErrorInner {
				value: Cow::Owned(s.to_string()),
			}),
		}
	}
}

impl std::fmt::Debug for SchemaError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&*self.inner.value, f)
	}
}
