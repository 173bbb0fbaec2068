//! Recycling of arenas between calls.
//!
//! Each thread keeps one arena in a thread-local slot; extra arenas (a call
//! nested inside another on the same thread, or more threads than slots)
//! go to a bounded process-wide list. An arena used by a failed call is
//! not recycled as is: only the slot blocks it adopted from schemas carry
//! over into a fresh arena.

use alloc::vec::Vec;
use core::cell::RefCell;

use parking_lot::Mutex;

use super::Arena;

/// Most idle arenas kept in the shared list.
pub const MAX_IDLE: usize = 64;

/// A bounded list of idle arenas.
pub struct ArenaPool {
    idle: Mutex<Vec<Arena>>,
    max_idle: usize,
}

static SHARED: ArenaPool = ArenaPool::new(MAX_IDLE);

thread_local! {
    static LOCAL: RefCell<Option<Arena>> = const { RefCell::new(None) };
}

impl ArenaPool {
    /// An empty pool keeping at most `max_idle` arenas.
    pub const fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// The process-wide pool.
    pub fn shared() -> &'static ArenaPool {
        &SHARED
    }

    /// Takes an idle arena, or makes a new one.
    pub fn acquire(&self) -> Arena {
        self.idle.lock().pop().unwrap_or_default()
    }

    /// Returns an arena from a successful call.
    pub fn release(&self, mut arena: Arena) {
        debug_assert!(arena.is_idle());
        arena.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(arena);
        } else {
            debug!("arena pool full, dropping arena");
        }
    }

    /// Number of idle arenas.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Runs `f` with an arena and recycles it afterwards.
///
/// After a failed call only the arena's adopted slot blocks survive; the
/// rest of what the call left behind is dropped.
pub fn with_arena<T, E>(f: impl FnOnce(&mut Arena) -> Result<T, E>) -> Result<T, E> {
    let local = LOCAL.try_with(|slot| slot.borrow_mut().take()).ok().flatten();
    let mut arena = local.unwrap_or_else(|| SHARED.acquire());
    let result = f(&mut arena);
    let arena = if result.is_ok() {
        arena.reset();
        arena
    } else {
        arena.salvage()
    };
    let leftover = LOCAL
        .try_with(|slot| {
            let mut slot = slot.borrow_mut();
            match slot.as_mut() {
                None => {
                    *slot = Some(arena);
                    None
                }
                Some(_) => Some(arena),
            }
        })
        .unwrap_or(None);
    if let Some(arena) = leftover {
        SHARED.release(arena);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonplan_testhelpers::test;

    #[test]
    fn pool_is_bounded() {
        let pool = ArenaPool::new(2);
        for _ in 0..3 {
            pool.release(Arena::new());
        }
        assert_eq!(pool.idle_count(), 2);
        let _a = pool.acquire();
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn failed_calls_leave_nothing_behind() {
        let r: Result<(), ()> = with_arena(|outer| {
            outer.keys.push("partial".into());
            outer.values.push(jsonplan_core::Value::Bool(true));
            // a nested call on the same thread gets its own arena
            with_arena(|inner| {
                assert!(inner.is_idle());
                Err(())
            })
        });
        assert!(r.is_err());
        let clean = LOCAL.with(|slot| slot.borrow().as_ref().is_none_or(Arena::is_idle));
        assert!(clean);

        let ok: Result<u8, ()> = with_arena(|arena| {
            assert!(arena.is_idle());
            Ok(1)
        });
        assert_eq!(ok, Ok(1));
    }
}
