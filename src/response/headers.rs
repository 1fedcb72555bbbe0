//! Set of response headers exposed to cross-origin callers

use indexmap::IndexMap;

/// Header names for `Access-Control-Expose-Headers`.
///
/// Insertion ordered and de-duplicated case-insensitively; the first
/// spelling registered for a name is the one emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposedHeaderSet {
    headers: IndexMap<String, String>,
}

impl ExposedHeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header name
    pub fn add(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.headers.entry(name.to_ascii_lowercase()).or_insert(name);
        self
    }

    /// Remove a header name
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.headers.shift_remove(&name.to_ascii_lowercase());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.headers.values().map(String::as_str)
    }

    /// The joined header value, e.g. `ETag, X-RateLimit-Remaining`
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl<S: Into<String>> FromIterator<S> for ExposedHeaderSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.add(name);
        }
        set
    }
}
