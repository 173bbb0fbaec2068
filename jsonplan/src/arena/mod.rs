//! Per-call scratch memory.
//!
//! An [`Arena`] is owned by exactly one decode call at a time. It bundles
//! the regions the parser borrows while it walks the input:
//!
//! - `slots`: pointer slots, where the value of an `Option`/`Box` field is
//!   built before it is moved into place,
//! - `elems`: slice and map-value elements, collected in frames and then
//!   installed into an exact-capacity collection,
//! - `key`: the unescape buffer for object keys that contain escapes,
//! - `keys` and `values`: stacks for map keys and dynamic values.
//!
//! Regions are borrowed by plain `&mut` access for the duration of the call
//! and keep their capacity when the arena goes back to the [`pool`].

mod batch;
mod scratch;

pub mod pool;

pub use batch::{BATCH_LEN, Batch, BatchObj};
pub use scratch::{Frame, MIN_SEGMENT, Scratch};

use alloc::string::String;
use alloc::vec::Vec;

use jsonplan_core::Value;

use crate::schema::Schema;

/// Scratch regions for one decode call.
#[derive(Default)]
pub struct Arena {
    pub(crate) slots: Scratch,
    pub(crate) elems: Scratch,
    pub(crate) key: Vec<u8>,
    pub(crate) keys: Vec<String>,
    pub(crate) values: Vec<Value>,
}

impl Arena {
    /// An empty arena; regions grow on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure the slot region can hold everything `schema` plans for
    /// without growing, borrowing the schema's pre-sized slot block if the
    /// region is smaller.
    pub fn prepare(&mut self, schema: &Schema) {
        let plan = schema.pool_plan();
        if plan.slot_bytes == 0 || self.slots.capacity() >= plan.slot_bytes {
            return;
        }
        if let Some(block) = schema.slot_block() {
            trace!(bytes = plan.slot_bytes, "arena adopted slot block");
            self.slots.adopt(block, plan.slot_bytes);
        }
    }

    /// Returns true when no region holds anything from a call in flight.
    pub fn is_idle(&self) -> bool {
        self.slots.is_idle() && self.elems.is_idle() && self.keys.is_empty() && self.values.is_empty()
    }

    /// A fresh arena that keeps only the slot blocks adopted from schemas.
    /// Everything else a failed call left behind is dropped with `self`.
    pub(crate) fn salvage(mut self) -> Arena {
        Arena {
            slots: self.slots.take_adopted(),
            ..Arena::default()
        }
    }

    /// Forgets per-call contents, keeping capacity.
    pub(crate) fn reset(&mut self) {
        self.key.clear();
        self.keys.clear();
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonplan_testhelpers::test;

    #[test]
    fn fresh_arena_is_idle() {
        let mut arena = Arena::new();
        assert!(arena.is_idle());
        arena.keys.push("k".into());
        assert!(!arena.is_idle());
        arena.reset();
        assert!(arena.is_idle());
    }
}
