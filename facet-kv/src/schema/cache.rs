//! Process-wide and injectable caches of compiled record types.
//!
//! Compiled tables are cached by (record `ConstTypeId`, option set), since the
//! name resolver, case folding and attribute namespace all change the result.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::collections::HashMap;
use std::sync::OnceLock;

use facet_core::{ConstTypeId, Facet, Shape};
use parking_lot::RwLock;

use super::{TypeMeta, compile};
use crate::builder::{DecoderOptions, OptionsKey};
use crate::error::DecodeError;

/// Cache key: (record type's ConstTypeId, option set)
pub(crate) type CacheKey = (ConstTypeId, OptionsKey);

pub(crate) type CacheMap = HashMap<CacheKey, Arc<TypeMeta>>;

/// Memoized [`TypeMeta`]s.
///
/// Lookups share a read lock. A miss takes the write lock, checks again, and
/// compiles the record together with every record nested in it before
/// releasing the lock. Entries are never evicted.
///
/// Most callers use [`TypeCache::global`]. Tests and embedders that want
/// isolation can create their own and hand it to
/// [`DecoderBuilder::cache`](crate::DecoderBuilder::cache).
#[derive(Default)]
pub struct TypeCache {
    entries: RwLock<CacheMap>,
}

static GLOBAL: OnceLock<Arc<TypeCache>> = OnceLock::new();

impl TypeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by default decoders.
    pub fn global() -> Arc<TypeCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TypeCache::new())))
    }

    /// Number of compiled entries, nested records included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns `true` if `T` has been compiled under any option set.
    pub fn contains<T: Facet<'static>>(&self) -> bool {
        let id = T::SHAPE.id;
        self.entries.read().keys().any(|(shape_id, _)| *shape_id == id)
    }

    pub(crate) fn get_or_compile(
        &self,
        shape: &'static Shape,
        options: &DecoderOptions,
    ) -> Result<Arc<TypeMeta>, DecodeError> {
        let key = (shape.id, options.key());

        if let Some(meta) = self.entries.read().get(&key) {
            tracing::debug!(shape = shape.type_identifier, "type cache hit");
            return Ok(Arc::clone(meta));
        }

        let mut entries = self.entries.write();
        // Another thread may have compiled it between the two locks.
        if let Some(meta) = entries.get(&key) {
            return Ok(Arc::clone(meta));
        }

        tracing::debug!(shape = shape.type_identifier, "type cache miss");
        compile(shape, options, &mut entries, &mut Vec::new())
    }
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("entries", &self.len())
            .finish()
    }
}
