//! Key/value pairs and the sources they are listed from.
//!
//! Decoding only ever sees an ordered slice of [`KvPair`]s. Where those pairs come from
//! (a consul agent, etcd, a snapshot file) is up to the caller: implement [`KvSource`]
//! for the store, or build the slice by hand.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Bound;

/// One entry of a path-keyed store: a `/`-separated key and its raw value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KvPair {
    /// Full key, for example `service/web/limits/max-conns`.
    pub key: String,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl KvPair {
    /// Create a pair from anything string-like and anything byte-like.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns `true` for folder placeholders: keys ending in `/` that carry no leaf.
    pub fn is_directory(&self) -> bool {
        self.key.ends_with('/')
    }
}

impl<K, V> From<(K, V)> for KvPair
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Trait for abstracting over key/value stores.
///
/// This allows decoding straight from a store, and testing without one.
pub trait KvSource {
    /// List every pair whose key starts with `prefix`, in the order the store reports them.
    fn list(&self, prefix: &str) -> Vec<KvPair>;
}

impl KvSource for [KvPair] {
    fn list(&self, prefix: &str) -> Vec<KvPair> {
        self.iter()
            .filter(|pair| pair.key.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl KvSource for Vec<KvPair> {
    fn list(&self, prefix: &str) -> Vec<KvPair> {
        self.as_slice().list(prefix)
    }
}

/// Key/value store backed by an ordered map (for testing and snapshots).
///
/// Listing returns keys in lexicographic order, which is what consul-style stores do.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from an iterator of key/value pairs.
    pub fn from_pairs<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set a key, replacing any previous value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Get the raw value of a key.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Remove a key, returning its value.
    pub fn delete(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvSource for MemoryStore {
    fn list(&self, prefix: &str) -> Vec<KvPair> {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KvPair::new(key.as_str(), value.as_slice()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_lists_in_key_order_under_prefix() {
        let store = MemoryStore::from_pairs([
            ("app/b", "2"),
            ("other/x", "0"),
            ("app/a", "1"),
            ("app/", ""),
        ]);

        let keys: Vec<String> = store.list("app/").into_iter().map(|p| p.key).collect();
        assert_eq!(keys, ["app/", "app/a", "app/b"]);
    }

    #[test]
    fn slice_source_preserves_order() {
        let pairs = vec![
            KvPair::new("app/b", "2"),
            KvPair::new("app/a", "1"),
            KvPair::new("zzz", "9"),
        ];
        let keys: Vec<String> = pairs.list("app").into_iter().map(|p| p.key).collect();
        assert_eq!(keys, ["app/b", "app/a"]);
    }

    #[test]
    fn directory_markers() {
        assert!(KvPair::new("app/", "").is_directory());
        assert!(!KvPair::new("app/a", "").is_directory());
    }
}
