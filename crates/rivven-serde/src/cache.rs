//! In-process schema cache
//!
//! Three indices over the same set of [`SchemaEntry`] values, all behind one
//! lock so a registration is published to every index at once:
//!
//! - subject -> entry (encode side, `with_schema`)
//! - schema id -> entry (decode side, schema text resolution)
//! - schema id -> decode hook (decode side, value reconstruction)
//!
//! Rebinding a subject never evicts the previous id: messages written under
//! an older schema stay decodable.
//!
//! Critical sections only touch the maps. Callers must not hold a guard
//! across a remote registry call; none of the methods here hand one out.

use crate::hook::DecodeHook;
use crate::types::{SchemaEntry, SchemaId, Subject};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared decode hook
pub type SharedHook<T> = Arc<dyn DecodeHook<T>>;

struct Indices<T> {
    by_subject: HashMap<Subject, Arc<SchemaEntry>>,
    by_id: HashMap<SchemaId, Arc<SchemaEntry>>,
    hooks: HashMap<SchemaId, SharedHook<T>>,
    /// Schema text resolved by id from the remote registry, with no subject binding
    fetched: HashMap<SchemaId, Arc<str>>,
}

impl<T> Default for Indices<T> {
    fn default() -> Self {
        Self {
            by_subject: HashMap::new(),
            by_id: HashMap::new(),
            hooks: HashMap::new(),
            fetched: HashMap::new(),
        }
    }
}

impl<T> Indices<T> {
    fn insert(&mut self, entry: Arc<SchemaEntry>, hook: SharedHook<T>) -> Option<Arc<SchemaEntry>> {
        self.by_id.insert(entry.id, entry.clone());
        self.hooks.insert(entry.id, hook);
        self.fetched.remove(&entry.id);
        self.by_subject.insert(entry.subject.clone(), entry)
    }
}

/// Thread-safe subject/id/hook cache
pub struct SchemaCache<T> {
    inner: RwLock<Indices<T>>,
}

impl<T> Default for SchemaCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SchemaCache<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indices::default()),
        }
    }

    /// Bind `entry` and `hook` in all indices; last write wins per subject.
    ///
    /// Returns the subject's previous binding, if there was one.
    pub fn put(&self, entry: Arc<SchemaEntry>, hook: SharedHook<T>) -> Option<Arc<SchemaEntry>> {
        self.inner.write().insert(entry, hook)
    }

    /// Bind `entry` only if its subject is not bound yet.
    ///
    /// On conflict nothing is written and the existing binding is returned.
    pub fn put_if_absent(
        &self,
        entry: Arc<SchemaEntry>,
        hook: SharedHook<T>,
    ) -> Result<(), Arc<SchemaEntry>> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_subject.get(&entry.subject) {
            return Err(existing.clone());
        }
        inner.insert(entry, hook);
        Ok(())
    }

    pub fn get_by_subject(&self, subject: &Subject) -> Option<Arc<SchemaEntry>> {
        self.inner.read().by_subject.get(subject).cloned()
    }

    pub fn get_by_id(&self, id: SchemaId) -> Option<Arc<SchemaEntry>> {
        self.inner.read().by_id.get(&id).cloned()
    }

    pub fn get_hook(&self, id: SchemaId) -> Option<SharedHook<T>> {
        self.inner.read().hooks.get(&id).cloned()
    }

    /// Schema text for `id`, from registered entries first, then fetched text
    pub fn schema_text(&self, id: SchemaId) -> Option<Arc<str>> {
        let inner = self.inner.read();
        inner
            .by_id
            .get(&id)
            .map(|entry| entry.schema.clone())
            .or_else(|| inner.fetched.get(&id).cloned())
    }

    /// Remember schema text fetched by id; registered entries take precedence
    pub fn insert_fetched(&self, id: SchemaId, schema: Arc<str>) {
        let mut inner = self.inner.write();
        if !inner.by_id.contains_key(&id) {
            inner.fetched.insert(id, schema);
        }
    }

    pub fn contains_subject(&self, subject: &Subject) -> bool {
        self.inner.read().by_subject.contains_key(subject)
    }

    /// Registered subjects, sorted
    pub fn subjects(&self) -> Vec<Subject> {
        let mut subjects: Vec<_> = self.inner.read().by_subject.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    /// Number of schema ids with a registered binding
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compiled codecs by schema id
pub struct CodecCache<C> {
    codecs: DashMap<SchemaId, Arc<C>>,
}

impl<C> Default for CodecCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CodecCache<C> {
    pub fn new() -> Self {
        Self {
            codecs: DashMap::new(),
        }
    }

    pub fn get(&self, id: SchemaId) -> Option<Arc<C>> {
        self.codecs.get(&id).map(|c| c.clone())
    }

    /// Insert unless another caller won the race; returns the cached codec
    pub fn insert(&self, id: SchemaId, codec: Arc<C>) -> Arc<C> {
        self.codecs.entry(id).or_insert(codec).clone()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subject: &str, id: u32, version: u32) -> Arc<SchemaEntry> {
        Arc::new(SchemaEntry::new(
            Subject::new(subject),
            format!(r#"{{"type": "record", "name": "R{}", "fields": []}}"#, id),
            SchemaId::new(id),
            version,
        ))
    }

    fn hook(tag: &'static str) -> SharedHook<String> {
        Arc::new(move |_: &[u8]| -> anyhow::Result<String> { Ok(tag.to_string()) })
    }

    #[test]
    fn test_put_populates_all_indices() {
        let cache = SchemaCache::new();
        assert!(cache.put(entry("users-value", 1, 1), hook("v1")).is_none());

        let subject = Subject::new("users-value");
        assert_eq!(cache.get_by_subject(&subject).unwrap().id, SchemaId(1));
        assert_eq!(cache.get_by_id(SchemaId(1)).unwrap().subject, subject);
        assert_eq!(cache.get_hook(SchemaId(1)).unwrap().decode(b"").unwrap(), "v1");
        assert!(cache.get_by_id(SchemaId(2)).is_none());
        assert!(cache.get_hook(SchemaId(2)).is_none());
    }

    #[test]
    fn test_rebind_keeps_old_id() {
        let cache = SchemaCache::new();
        cache.put(entry("users-value", 1, 1), hook("v1"));
        let previous = cache.put(entry("users-value", 2, 2), hook("v2"));

        assert_eq!(previous.unwrap().id, SchemaId(1));
        let subject = Subject::new("users-value");
        assert_eq!(cache.get_by_subject(&subject).unwrap().id, SchemaId(2));
        assert!(cache.get_by_id(SchemaId(1)).is_some());
        assert_eq!(cache.get_hook(SchemaId(1)).unwrap().decode(b"").unwrap(), "v1");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_put_if_absent_refuses_bound_subject() {
        let cache = SchemaCache::new();
        assert!(cache.put_if_absent(entry("orders-value", 5, 1), hook("a")).is_ok());

        let existing = cache
            .put_if_absent(entry("orders-value", 6, 2), hook("b"))
            .unwrap_err();
        assert_eq!(existing.id, SchemaId(5));
        assert!(cache.get_by_id(SchemaId(6)).is_none());
    }

    #[test]
    fn test_fetched_text_lookup() {
        let cache: SchemaCache<String> = SchemaCache::new();
        cache.insert_fetched(SchemaId(9), Arc::from(r#""string""#));
        assert_eq!(cache.schema_text(SchemaId(9)).as_deref(), Some(r#""string""#));
        assert!(cache.get_by_id(SchemaId(9)).is_none());

        // registration supersedes fetched text
        cache.put(entry("s", 9, 1), hook("x"));
        assert!(cache.schema_text(SchemaId(9)).unwrap().contains("R9"));
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_put() {
        let cache = Arc::new(SchemaCache::<String>::new());
        let subject = Subject::new("events-value");

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let subject = subject.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        if let Some(entry) = cache.get_by_subject(&subject) {
                            assert!(cache.get_by_id(entry.id).is_some());
                            assert!(cache.get_hook(entry.id).is_some());
                        }
                    }
                })
            })
            .collect();

        for id in 1..=500 {
            cache.put(entry("events-value", id, id), hook("e"));
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(cache.len(), 500);
        assert_eq!(cache.subjects(), vec![subject]);
    }

    #[test]
    fn test_codec_cache_first_insert_wins() {
        let cache = CodecCache::new();
        let first = cache.insert(SchemaId(1), Arc::new("first"));
        let second = cache.insert(SchemaId(1), Arc::new("second"));
        assert_eq!(*first, "first");
        assert_eq!(*second, "first");
        assert_eq!(cache.len(), 1);
    }
}
