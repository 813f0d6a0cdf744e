use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};

use crate::count::RefCount;

/// Destruction capability stored alongside the managed value. Invoked at
/// most once, in place of the plain drop.
pub(crate) type Deleter<T> = Box<dyn FnOnce(T) + Send>;

/// What the caller must do with the block after releasing a strong unit.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EjectAction {
    /// Other strong handles remain; nothing happened.
    Nothing,
    /// The value was destroyed, but weak observers keep the block alive.
    Dispose,
    /// The value was destroyed and the block itself must be freed.
    Destroy,
}

/// Shared bookkeeping for one managed value: both reference counts, the
/// value's storage, and its deleter.
///
/// The weak count carries one extra unit on behalf of all strong handles
/// collectively, so the block is freed exactly when the weak count hits
/// zero. The storage holds a live value iff the strong count is nonzero;
/// `new_uninit` blocks additionally hold no value until `set_value` runs.
pub(crate) struct ControlBlock<T> {
    strong: RefCount,
    weak: RefCount,
    storage: UnsafeCell<MaybeUninit<T>>,
    deleter: UnsafeCell<Option<Deleter<T>>>,
}

impl<T> ControlBlock<T> {
    pub(crate) fn new(value: T, deleter: Option<Deleter<T>>) -> Self {
        Self {
            strong: RefCount::new(1),
            weak: RefCount::new(1),
            storage: UnsafeCell::new(MaybeUninit::new(value)),
            deleter: UnsafeCell::new(deleter),
        }
    }

    /// A block whose value does not exist yet: strong count zero, one weak
    /// unit for the handle that will finish construction.
    pub(crate) fn new_uninit() -> Self {
        Self {
            strong: RefCount::new(0),
            weak: RefCount::new(1),
            storage: UnsafeCell::new(MaybeUninit::uninit()),
            deleter: UnsafeCell::new(None),
        }
    }

    /// Moves the block onto the heap and leaks it; released through
    /// [`ControlBlock::deallocate`] when the weak count hits zero.
    pub(crate) fn allocate(self) -> NonNull<Self> {
        NonNull::from(Box::leak(Box::new(self)))
    }

    /// Frees a block previously produced by [`ControlBlock::allocate`].
    ///
    /// # Safety
    /// The caller must have observed the weak count's transition to zero,
    /// and the value must already be disposed (or never initialized).
    pub(crate) unsafe fn deallocate(ptr: NonNull<Self>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }

    /// # Safety
    /// The caller must own a strong unit.
    pub(crate) unsafe fn value(&self) -> &T {
        (*self.storage.get()).assume_init_ref()
    }

    /// # Safety
    /// The caller must own the *only* strong unit, with no weak observers
    /// that could promote concurrently.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn value_mut(&self) -> &mut T {
        (*self.storage.get()).assume_init_mut()
    }

    /// Writes the value of a `new_uninit` block.
    ///
    /// # Safety
    /// The strong count must still be zero and no other thread may be
    /// touching the storage.
    pub(crate) unsafe fn set_value(&self, value: T) {
        (*self.storage.get()).write(value);
    }

    /// Publishes the value written by `set_value`: the strong count's first
    /// transition away from zero.
    pub(crate) fn activate_strong(&self) {
        self.strong.activate();
    }

    pub(crate) fn use_count(&self) -> usize {
        self.strong.load()
    }

    /// Number of weak observers, excluding the unit the strong handles hold
    /// collectively. A snapshot.
    pub(crate) fn weak_count(&self) -> usize {
        let weak = self.weak.load();
        if self.strong.load() > 0 {
            weak - 1
        } else {
            weak
        }
    }

    pub(crate) fn add_strong(&self) {
        self.strong.increment();
    }

    /// The promotion primitive: increments the strong count unless it is
    /// zero. Never revives a dead value.
    pub(crate) fn try_add_strong(&self) -> bool {
        self.strong.try_increment()
    }

    pub(crate) fn add_weak(&self) {
        self.weak.increment();
    }

    /// Releases one strong unit. On the transition to zero the value is
    /// destroyed here, exactly once, and the strong handles' collective
    /// weak unit is given up.
    ///
    /// The caller must own the strong unit being released.
    pub(crate) fn release_strong(&self) -> EjectAction {
        // A release decrement paired with an acquire fence on the zero
        // transition, so every access to the value happens-before its
        // destruction (the Boost atomic usage examples protocol).
        if self.strong.decrement() {
            fence(Ordering::Acquire);
            // We drove the count to zero: no strong handle remains and
            // try_add_strong can no longer succeed, so the storage is ours.
            unsafe { self.dispose() };
            if self.release_weak() {
                EjectAction::Destroy
            } else {
                EjectAction::Dispose
            }
        } else {
            EjectAction::Nothing
        }
    }

    /// Releases one weak unit, reporting whether the caller must free the
    /// block. The caller must own the weak unit being released.
    pub(crate) fn release_weak(&self) -> bool {
        if self.weak.decrement() {
            fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    /// Destroys the managed value, keeping the counts intact: through the
    /// stored deleter if one was installed, by plain drop otherwise.
    ///
    /// # Safety
    /// The storage must hold a live value and the caller must be the only
    /// thread able to reach it.
    unsafe fn dispose(&self) {
        let value = (*self.storage.get()).assume_init_read();
        match (*self.deleter.get()).take() {
            Some(deleter) => deleter(value),
            None => drop(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlBlock, EjectAction};

    #[test]
    fn lone_strong_release_destroys_everything() {
        let block = ControlBlock::new(7u32, None);
        assert_eq!(block.use_count(), 1);
        assert_eq!(block.weak_count(), 0);
        assert_eq!(block.release_strong(), EjectAction::Destroy);
    }

    #[test]
    fn weak_unit_keeps_the_block() {
        let block = ControlBlock::new(7u32, None);
        block.add_weak();
        assert_eq!(block.weak_count(), 1);
        assert_eq!(block.release_strong(), EjectAction::Dispose);
        // The value is gone; promotion must fail.
        assert!(!block.try_add_strong());
        assert!(block.release_weak());
    }

    #[test]
    fn strong_units_share_one_weak_unit() {
        let block = ControlBlock::new(7u32, None);
        block.add_strong();
        assert_eq!(block.release_strong(), EjectAction::Nothing);
        assert_eq!(block.release_strong(), EjectAction::Destroy);
    }
}
