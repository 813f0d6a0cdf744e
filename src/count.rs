use std::mem;
use std::process::abort;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::Backoff;
use static_assertions::const_assert;

/// A count past this limit means handles are being leaked faster than any
/// real workload produces them; abort before the counter can wrap.
const MAX_REFCOUNT: usize = usize::MAX / 2;

// Counter operations must be plain word-sized atomics.
const_assert!(mem::size_of::<AtomicUsize>() == mem::size_of::<usize>());

/// An atomic counter that supports increment and decrement, such that a
/// *conditional* increment from zero fails and does not perform the
/// increment.
///
/// Zero is the point of no return for the strong count: the managed value is
/// destroyed on the transition to zero, so racing threads must never be able
/// to revive the count through [`RefCount::try_increment`].
pub(crate) struct RefCount {
    count: AtomicUsize,
}

impl RefCount {
    #[inline]
    pub(crate) const fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
        }
    }

    /// Current value. A snapshot only; it may be stale by the time the
    /// caller looks at it.
    #[inline]
    pub(crate) fn load(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Unconditional increment. Only valid while the caller already owns a
    /// unit of this count, so the count is known to be nonzero.
    #[inline]
    pub(crate) fn increment(&self) {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        if prev > MAX_REFCOUNT {
            abort();
        }
    }

    /// Increments the count iff it is currently nonzero, as a single
    /// compare-and-increment. Returns whether the increment happened.
    #[inline]
    pub(crate) fn try_increment(&self) -> bool {
        let backoff = Backoff::new();
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            if current > MAX_REFCOUNT {
                abort();
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
            backoff.spin();
        }
    }

    /// First increment of a count born at zero. Release-ordered so that the
    /// value written before it is visible to whoever wins a subsequent
    /// [`RefCount::try_increment`].
    #[inline]
    pub(crate) fn activate(&self) {
        let prev = self.count.fetch_add(1, Ordering::Release);
        debug_assert_eq!(prev, 0, "activated a count that was already live");
    }

    /// Decrement, reporting whether this call drove the count to zero. The
    /// caller must own a unit of the count.
    ///
    /// A release decrement; the thread that hits zero pairs it with an
    /// acquire fence before touching the guarded storage.
    #[inline]
    pub(crate) fn decrement(&self) -> bool {
        self.count.fetch_sub(1, Ordering::Release) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::RefCount;

    #[test]
    fn try_increment_fails_at_zero() {
        let count = RefCount::new(0);
        assert!(!count.try_increment());
        assert_eq!(count.load(), 0);
    }

    #[test]
    fn try_increment_succeeds_when_live() {
        let count = RefCount::new(1);
        assert!(count.try_increment());
        assert_eq!(count.load(), 2);
    }

    #[test]
    fn decrement_reports_the_zero_transition() {
        let count = RefCount::new(2);
        assert!(!count.decrement());
        assert!(count.decrement());
        assert_eq!(count.load(), 0);
        assert!(!count.try_increment());
    }

    #[test]
    fn activate_revives_a_zero_count() {
        let count = RefCount::new(0);
        count.activate();
        assert_eq!(count.load(), 1);
        assert!(count.try_increment());
    }
}
