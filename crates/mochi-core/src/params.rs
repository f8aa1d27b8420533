//! Path parameters captured from a matched route.
//!
//! Values are always strings; handlers coerce them with [`PathParams::parse`].

use crate::error::MochiError;
use smallvec::SmallVec;
use std::str::FromStr;

/// Parameters stored inline before spilling to the heap.
const INLINE_PARAMS: usize = 4;

/// Named dynamic segments captured from a request path.
///
/// Parameters keep the order in which their segments appear in the route
/// template. Lookup is by name.
///
/// # Example
///
/// ```rust
/// use mochi_core::PathParams;
///
/// let mut params = PathParams::new();
/// params.push("userId", "42");
/// params.push("postId", "7");
///
/// assert_eq!(params.get("userId"), Some("42"));
/// assert_eq!(params.parse::<u64>("postId").unwrap(), 7);
/// assert_eq!(params.get("unknown"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParams {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl PathParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parameter set with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    /// Adds a parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the raw value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the raw value of a parameter or a bad request error.
    pub fn require(&self, name: &str) -> Result<&str, MochiError> {
        self.get(name)
            .ok_or_else(|| MochiError::bad_request(format!("missing path parameter `{name}`")))
    }

    /// Parses a parameter into `T`.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, MochiError> {
        let raw = self.require(name)?;
        raw.parse().map_err(|_| {
            MochiError::bad_request(format!(
                "path parameter `{name}` has invalid value `{raw}`"
            ))
        })
    }

    /// Returns the parameter values in template order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(_, v)| v.as_str())
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns an iterator over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a PathParams {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }
}
