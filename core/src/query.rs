//! Request URL construction and query parameters.
//!
//! Query parameters follow PostgREST's conventions (`id=eq.5`,
//! `select=id,name`, `limit`/`offset`) but are never interpreted here; they
//! are percent-encoded and forwarded as-is.

use std::collections::BTreeMap;

use url::Url;

use crate::error::{Error, Result};

/// Query parameters for a request, keyed in sorted order so that encoding is
/// deterministic. A key may carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: BTreeMap<String, Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), vec![value.into()]);
        self
    }

    /// Adds `value` to the values already held for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.entry(key.into()).or_default().push(value.into());
        self
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.values().all(Vec::is_empty)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    /// `application/x-www-form-urlencoded` form of the parameters.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.append(key, value);
        }
        query
    }
}

/// Replaces the path and query of `base` with `path` and `query`.
///
/// Any query already present on `base` is discarded, and an absent or empty
/// `query` leaves the URL without a query string.
pub fn build_url(base: &str, path: &str, query: Option<&Query>) -> Result<Url> {
    if path.is_empty() {
        return Err(Error::MissingPath);
    }
    let mut url = Url::parse(base).map_err(|source| Error::MalformedBase {
        base: base.to_string(),
        source,
    })?;
    url.set_path(path);
    url.set_query(None);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.query_pairs_mut().extend_pairs(query.pairs());
    }
    Ok(url)
}
