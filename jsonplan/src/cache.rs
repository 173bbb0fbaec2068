//! Process-wide schema cache with read-copy-update publication.
//!
//! Readers do one atomic load and a hash lookup in an immutable snapshot.
//! A writer copies the snapshot, adds its schema, and swaps the copy in
//! with a compare-and-swap; a writer that loses the race throws its copy
//! away and tries again against the newer snapshot. Replaced snapshots are
//! never freed, as a reader may still be looking at one.

use alloc::boxed::Box;
use core::any::TypeId;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use std::collections::HashMap;

use jsonplan_core::Shape;

use crate::error::Result;
use crate::schema::{Schema, build_root};

type Snapshot = HashMap<TypeId, &'static Schema>;

/// Map from type identity to compiled schema.
pub struct SchemaCache {
    current: AtomicPtr<Snapshot>,
}

static GLOBAL: SchemaCache = SchemaCache::new();

impl SchemaCache {
    /// An empty cache.
    pub const fn new() -> Self {
        Self {
            current: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static SchemaCache {
        &GLOBAL
    }

    /// Cached schema for `id`, if any. Lock-free.
    #[inline]
    pub fn get(&self, id: TypeId) -> Option<&'static Schema> {
        // SAFETY: published snapshots are never freed or mutated
        let snapshot = unsafe { self.current.load(Ordering::Acquire).as_ref() }?;
        snapshot.get(&id).copied()
    }

    /// Cached schema for `shape`, building and publishing it on first use.
    /// Build errors are returned and not cached.
    pub fn get_or_build(&self, shape: &'static Shape) -> Result<&'static Schema> {
        let id = shape.type_id();
        if let Some(schema) = self.get(id) {
            return Ok(schema);
        }

        let built: &'static Schema = Box::leak(Box::new(build_root(shape)?));
        loop {
            let seen = self.current.load(Ordering::Acquire);
            // SAFETY: as in `get`
            let snapshot = unsafe { seen.as_ref() };
            if let Some(&existing) = snapshot.and_then(|s| s.get(&id)) {
                trace!(ty = shape.type_identifier, "schema published concurrently");
                return Ok(existing);
            }

            let mut next = snapshot.cloned().unwrap_or_default();
            next.insert(id, built);
            let next = Box::into_raw(Box::new(next));
            match self
                .current
                .compare_exchange(seen, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    debug!(ty = shape.type_identifier, "schema published");
                    return Ok(built);
                }
                Err(_) => {
                    // SAFETY: `next` was never published
                    drop(unsafe { Box::from_raw(next) });
                    trace!(ty = shape.type_identifier, "schema cache race lost, retrying");
                }
            }
        }
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        // SAFETY: as in `get`
        unsafe { self.current.load(Ordering::Acquire).as_ref() }.map_or(0, HashMap::len)
    }

    /// Returns true when nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
