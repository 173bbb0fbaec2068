//! Lock-free bump batches for allocations that live as long as the process.
//!
//! A batch hands out slots from a pre-sized chunk with one atomic add. When a
//! chunk runs out, the first caller to notice takes a mutex scoped to that
//! batch, installs the pre-warmed backup chunk (or a fresh one) and warms a
//! new backup, so the next exhaustion does not stall on the allocator.
//! Chunks are never freed: everything handed out is `'static`.

use alloc::alloc::{Layout, alloc, handle_alloc_error};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Slots per chunk unless a batch says otherwise.
pub const BATCH_LEN: usize = 1 << 12;

struct Chunk {
    base: NonNull<u8>,
    cap: usize,
    cursor: AtomicUsize,
}

impl Chunk {
    /// Allocates room for `cap` elements of `layout` and leaks it.
    fn leak(layout: Layout, cap: usize) -> &'static Chunk {
        let Some(bytes) = layout.size().checked_mul(cap) else {
            panic!("batch capacity overflow");
        };
        let base = if bytes == 0 {
            NonNull::new(ptr::without_provenance_mut(layout.align())).unwrap_or(NonNull::dangling())
        } else {
            let Ok(chunk_layout) = Layout::from_size_align(bytes, layout.align()) else {
                panic!("batch capacity overflow");
            };
            // SAFETY: chunk_layout has non-zero size
            let p = unsafe { alloc(chunk_layout) };
            NonNull::new(p).unwrap_or_else(|| handle_alloc_error(chunk_layout))
        };
        Box::leak(Box::new(Chunk {
            base,
            cap,
            cursor: AtomicUsize::new(0),
        }))
    }

    /// Reserves `n` consecutive slots, returning the index of the first.
    #[inline]
    fn reserve(&self, n: usize) -> Option<usize> {
        let i = self.cursor.fetch_add(n, Ordering::Relaxed);
        (i.checked_add(n)? <= self.cap).then_some(i)
    }
}

// SAFETY: a chunk's slots are handed out exactly once, to a single caller.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

/// The bump state shared by [`Batch`] and [`BatchObj`].
struct Bump {
    layout: Layout,
    chunk_len: usize,
    current: AtomicPtr<Chunk>,
    backup: Mutex<Option<&'static Chunk>>,
}

impl Bump {
    const fn new(layout: Layout, chunk_len: usize) -> Self {
        Self {
            layout,
            chunk_len,
            current: AtomicPtr::new(ptr::null_mut()),
            backup: Mutex::new(None),
        }
    }

    /// Pointer to `n` consecutive uninitialized elements.
    fn get(&self, n: usize) -> NonNull<u8> {
        if n > self.chunk_len {
            // larger than any chunk: allocate it on its own
            return Chunk::leak(self.layout, n).base;
        }
        loop {
            let seen = self.current.load(Ordering::Acquire);
            // SAFETY: chunks are leaked, a non-null pointer stays valid forever
            if let Some(chunk) = unsafe { seen.as_ref() }
                && let Some(i) = chunk.reserve(n)
            {
                // SAFETY: i + n <= cap
                return unsafe { chunk.base.add(i * self.layout.size()) };
            }
            self.refill(seen);
        }
    }

    #[cold]
    fn refill(&self, seen: *mut Chunk) {
        let mut backup = self.backup.lock();
        if self.current.load(Ordering::Acquire) != seen {
            // another thread already swapped in a fresh chunk
            return;
        }
        let next = backup
            .take()
            .unwrap_or_else(|| Chunk::leak(self.layout, self.chunk_len));
        self.current
            .store(ptr::from_ref(next).cast_mut(), Ordering::Release);
        *backup = Some(Chunk::leak(self.layout, self.chunk_len));
        trace!(
            size = self.layout.size(),
            len = self.chunk_len,
            "batch refilled"
        );
    }
}

/// A typed batch: hands out `&'static mut T` without per-object locking.
pub struct Batch<T> {
    bump: Bump,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Batch<T> {
    /// A batch with [`BATCH_LEN`] slots per chunk. Nothing is allocated
    /// until the first request.
    pub const fn new() -> Self {
        Self::with_chunk_len(BATCH_LEN)
    }

    /// A batch with `chunk_len` slots per chunk.
    pub const fn with_chunk_len(chunk_len: usize) -> Self {
        Self {
            bump: Bump::new(Layout::new::<T>(), chunk_len),
            _marker: PhantomData,
        }
    }

    /// Moves `value` into the batch.
    pub fn alloc(&self, value: T) -> &'static mut T {
        let slot = self.bump.get(1).cast::<MaybeUninit<T>>();
        // SAFETY: the slot was reserved for us alone and is never freed
        unsafe { (*slot.as_ptr()).write(value) }
    }

    /// Moves every element of `values` into consecutive slots. Requests
    /// longer than a chunk are served by a dedicated allocation.
    pub fn alloc_slice(&self, values: Vec<T>) -> &'static mut [T] {
        let n = values.len();
        if n == 0 {
            return &mut [];
        }
        let base = self.bump.get(n).cast::<T>();
        for (i, v) in values.into_iter().enumerate() {
            // SAFETY: n slots were reserved for us alone
            unsafe { base.add(i).write(v) };
        }
        // SAFETY: all n slots are initialized now
        unsafe { core::slice::from_raw_parts_mut(base.as_ptr(), n) }
    }
}

impl<T: Send + Sync + 'static> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An untyped batch for elements whose layout is only known at run time.
///
/// Used for the pointer-slot blocks described by a schema's pool plan.
pub struct BatchObj {
    bump: Bump,
}

impl BatchObj {
    /// A batch of `chunk_len` elements of `layout` per chunk.
    pub const fn new(layout: Layout, chunk_len: usize) -> Self {
        Self {
            bump: Bump::new(layout, chunk_len),
        }
    }

    /// Layout of one element.
    pub fn layout(&self) -> Layout {
        self.bump.layout
    }

    /// One uninitialized element, aligned to the batch layout. Never freed.
    pub fn alloc(&self) -> NonNull<u8> {
        self.bump.get(1)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use jsonplan_testhelpers::test;

    #[test]
    fn alloc_crosses_chunks() {
        let batch = Batch::<u64>::with_chunk_len(4);
        let refs: Vec<&'static mut u64> = (0..10).map(|i| batch.alloc(i)).collect();
        for (i, r) in refs.iter().enumerate() {
            assert_eq!(**r, i as u64);
        }
    }

    #[test]
    fn alloc_slice_handles_oversized_requests() {
        let batch = Batch::<String>::with_chunk_len(2);
        let small = batch.alloc_slice(vec!["a".into(), "b".into()]);
        let big = batch.alloc_slice((0..5).map(|i| i.to_string()).collect());
        assert_eq!(small, ["a", "b"]);
        assert_eq!(big.len(), 5);
        assert_eq!(big[4], "4");
        assert!(batch.alloc_slice(Vec::new()).is_empty());
    }

    #[test]
    fn concurrent_allocations_never_alias() {
        let batch = Arc::new(Batch::<usize>::with_chunk_len(16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let batch = Arc::clone(&batch);
                std::thread::spawn(move || {
                    (0..500)
                        .map(|i| {
                            let r = batch.alloc(t * 1000 + i);
                            (ptr::from_mut(r) as usize, *r)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut addrs = HashSet::new();
        let mut values = HashSet::new();
        for h in handles {
            for (addr, value) in h.join().unwrap() {
                assert!(addrs.insert(addr));
                assert!(values.insert(value));
            }
        }
        assert_eq!(addrs.len(), 4000);
    }

    #[test]
    fn obj_batch_respects_layout() {
        let layout = Layout::from_size_align(24, 8).unwrap();
        let batch = BatchObj::new(layout, 3);
        let blocks: Vec<_> = (0..7).map(|_| batch.alloc()).collect();
        for b in &blocks {
            assert_eq!(b.as_ptr() as usize % 8, 0);
        }
        let distinct: HashSet<_> = blocks.iter().map(|b| b.as_ptr() as usize).collect();
        assert_eq!(distinct.len(), 7);
    }
}
