use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::block::ControlBlock;
use crate::strongs::SharedOwner;

/// Non-owning observer of a control block: tracks whether the value is
/// still alive without keeping it so.
///
/// Created through [`SharedOwner::downgrade`]. An observer may outlive every
/// strong handle; it then reports itself [`expired`](WeakObserver::expired)
/// and keeps only the block's bookkeeping alive until it is dropped.
pub struct WeakObserver<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<ControlBlock<T>>,
}

unsafe impl<T: Send + Sync> Send for WeakObserver<T> {}
unsafe impl<T: Send + Sync> Sync for WeakObserver<T> {}

impl<T> WeakObserver<T> {
    /// An observer of nothing: always expired, never promotable.
    pub fn new() -> Self {
        Self::from_raw(None)
    }

    /// Adopts one weak unit of `block`; does not increment.
    pub(crate) fn from_raw(block: Option<NonNull<ControlBlock<T>>>) -> Self {
        Self {
            block,
            _marker: PhantomData,
        }
    }

    /// True iff the observed value has been destroyed (or never existed).
    pub fn expired(&self) -> bool {
        self.block
            .map_or(true, |b| unsafe { b.as_ref() }.use_count() == 0)
    }

    /// Attempts to promote into a strong handle.
    ///
    /// The check-and-increment is a single atomic compare-and-increment:
    /// promotion either succeeds and keeps the value alive, or fails with
    /// `None` because the strong count already reached zero. A promotion can
    /// never observe a value whose destruction has begun.
    pub fn promote(&self) -> Option<SharedOwner<T>> {
        let block = self.block?;
        if unsafe { block.as_ref() }.try_add_strong() {
            Some(SharedOwner::from_raw(Some(block)))
        } else {
            None
        }
    }

    /// Strong count of the observed block, or zero. A snapshot.
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, |b| unsafe { b.as_ref() }.use_count())
    }
}

impl<T> Clone for WeakObserver<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            unsafe { block.as_ref() }.add_weak();
        }
        Self::from_raw(self.block)
    }
}

impl<T> Drop for WeakObserver<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            if unsafe { block.as_ref() }.release_weak() {
                unsafe { ControlBlock::deallocate(block) };
            }
        }
    }
}

impl<T> Default for WeakObserver<T> {
    fn default() -> Self {
        Self::new()
    }
}
