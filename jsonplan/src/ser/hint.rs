//! Remembered output size, per type.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Capacity the first encode of a type starts with.
pub const INITIAL_HINT: usize = 128;

/// Consecutive outputs below half the hint before the hint shrinks.
pub const SHRINK_STREAK: usize = 2;

/// Output size estimate shared by every encode of one type.
///
/// Grows as soon as an output exceeds it; shrinks only after
/// [`SHRINK_STREAK`] outputs in a row used less than half of it. Updates
/// are racy by nature: concurrent encoders may overwrite each other's
/// observations, which only costs a reallocation.
#[derive(Debug)]
pub struct SizeHint {
    hint: AtomicUsize,
    streak: AtomicUsize,
}

impl SizeHint {
    /// A hint of [`INITIAL_HINT`] bytes.
    pub const fn new() -> Self {
        Self {
            hint: AtomicUsize::new(INITIAL_HINT),
            streak: AtomicUsize::new(0),
        }
    }

    /// Current estimate.
    #[inline]
    pub fn get(&self) -> usize {
        self.hint.load(Ordering::Relaxed)
    }

    /// Records that an encode produced `len` bytes.
    pub fn observe(&self, len: usize) {
        let hint = self.get();
        let padded = len.saturating_add(len / 8);
        if len > hint {
            self.hint.store(padded, Ordering::Relaxed);
            self.streak.store(0, Ordering::Relaxed);
        } else if len < hint / 2 {
            if self.streak.fetch_add(1, Ordering::Relaxed) + 1 >= SHRINK_STREAK {
                self.hint.store(padded.max(16), Ordering::Relaxed);
                self.streak.store(0, Ordering::Relaxed);
            }
        } else {
            self.streak.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for SizeHint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonplan_testhelpers::test;

    #[test]
    fn grows_immediately() {
        let hint = SizeHint::new();
        hint.observe(1000);
        assert_eq!(hint.get(), 1125);
    }

    #[test]
    fn shrinks_after_a_streak() {
        let hint = SizeHint::new();
        hint.observe(800);
        let big = hint.get();

        hint.observe(10);
        assert_eq!(hint.get(), big);
        // a normal-sized output breaks the streak
        hint.observe(big - 1);
        hint.observe(10);
        assert_eq!(hint.get(), big);
        hint.observe(40);
        assert_eq!(hint.get(), 45);
    }
}
