//! Ambient per-call metadata (auth, trace headers, ...).

use serde::{Deserialize, Serialize};

/// One metadata key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

/// Ordered multimap of metadata entries attached to a call.
///
/// Keys are compared case-insensitively, duplicates are allowed and keep
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: Vec<MetadataEntry>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push(MetadataEntry {
            key: key.into().to_ascii_lowercase(),
            value: value.into(),
        });
        self
    }

    /// Builder form of [`Metadata::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value.as_str())
    }

    /// All values recorded for `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let md = Metadata::new().with("TestKey", "testvalue");
        assert_eq!(md.get("testkey"), Some("testvalue"));
        assert_eq!(md.get("TESTKEY"), Some("testvalue"));
        assert_eq!(md.get("other"), None);
    }

    #[test]
    fn test_duplicate_keys_keep_order() {
        let md: Metadata = [("trace", "a"), ("auth", "x"), ("trace", "b")].into_iter().collect();
        assert_eq!(md.len(), 3);
        assert_eq!(md.get("trace"), Some("a"));
        assert_eq!(md.get_all("trace").collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
