use std::marker::PhantomData;
use std::mem::forget;
use std::ptr::NonNull;

use crate::block::{ControlBlock, EjectAction};
use crate::error::EmptyAccess;
use crate::exclusive::ExclusiveOwner;
use crate::weaks::WeakObserver;

/// Reference-counted owner: any number of `SharedOwner`s may co-own one
/// value through a shared control block. The value is destroyed exactly
/// once, when the last strong handle is released, deterministically.
///
/// Strong-reference cycles are never collected; a cycle of `SharedOwner`s
/// leaks. Break cycles with [`WeakObserver`].
pub struct SharedOwner<T> {
    block: Option<NonNull<ControlBlock<T>>>,
    _marker: PhantomData<ControlBlock<T>>,
}

unsafe impl<T: Send + Sync> Send for SharedOwner<T> {}
unsafe impl<T: Send + Sync> Sync for SharedOwner<T> {}

impl<T> SharedOwner<T> {
    /// Allocates a fresh control block owning `value`, with a strong count
    /// of one.
    pub fn new(value: T) -> Self {
        Self::from_raw(Some(ControlBlock::new(value, None).allocate()))
    }

    /// Like [`SharedOwner::new`], but the value is destroyed through
    /// `deleter` instead of the plain drop. The deleter runs exactly once,
    /// on whichever thread releases the last strong handle.
    pub fn with_deleter(value: T, deleter: impl FnOnce(T) + Send + 'static) -> Self {
        Self::from_raw(Some(
            ControlBlock::new(value, Some(Box::new(deleter))).allocate(),
        ))
    }

    /// A handle owning nothing. [`SharedOwner::get`] fails on it.
    pub fn empty() -> Self {
        Self::from_raw(None)
    }

    /// Builds a value that holds a [`WeakObserver`] of itself.
    ///
    /// The observer passed to `data_fn` refers to the value under
    /// construction: it is expired and cannot be promoted until `new_cyclic`
    /// returns, but clones of it stored inside the value work normally
    /// afterwards.
    pub fn new_cyclic(data_fn: impl FnOnce(&WeakObserver<T>) -> T) -> Self {
        let block = ControlBlock::new_uninit().allocate();
        // The observer adopts the block's initial weak unit. If `data_fn`
        // panics, dropping it frees the block with no value ever written.
        let observer = WeakObserver::from_raw(Some(block));
        let value = data_fn(&observer);
        unsafe {
            block.as_ref().set_value(value);
            block.as_ref().activate_strong();
        }
        // The observer's weak unit becomes the one the strong handles hold
        // collectively, so its destructor must not run.
        forget(observer);
        Self::from_raw(Some(block))
    }

    /// Adopts one strong unit of `block`; does not increment.
    pub(crate) fn from_raw(block: Option<NonNull<ControlBlock<T>>>) -> Self {
        Self {
            block,
            _marker: PhantomData,
        }
    }

    /// Detaches from the current block per the release protocol, then takes
    /// ownership of `value` in a fresh one.
    pub fn reset(&mut self, value: T) {
        *self = Self::new(value);
    }

    /// Detaches from the current block, leaving the handle empty.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Current strong count, or zero for an empty handle. A snapshot; it
    /// may be stale by the time the caller looks at it.
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, |b| unsafe { b.as_ref() }.use_count())
    }

    /// Current number of weak observers. A snapshot, like
    /// [`SharedOwner::use_count`].
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, |b| unsafe { b.as_ref() }.weak_count())
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// A reference to the owned value, or [`EmptyAccess`] on an empty
    /// handle. Never dangles: the value outlives every strong handle.
    pub fn get(&self) -> Result<&T, EmptyAccess> {
        match self.block {
            Some(block) => Ok(unsafe { block.as_ref().value() }),
            None => Err(EmptyAccess),
        }
    }

    /// Mutable access, only when this is provably the sole handle: one
    /// strong unit and no weak observers. Returns `None` otherwise.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let block = self.block?;
        let counts = unsafe { block.as_ref() };
        // Holding `&mut self` over the only strong unit with no observers
        // means no other handle exists to race a clone or a promotion.
        if counts.use_count() == 1 && counts.weak_count() == 0 {
            Some(unsafe { counts.value_mut() })
        } else {
            None
        }
    }

    /// Whether both handles refer to the same control block.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.block.map(NonNull::as_ptr) == other.block.map(NonNull::as_ptr)
    }

    /// A non-owning observer of the same block. Does not touch the strong
    /// count.
    pub fn downgrade(&self) -> WeakObserver<T> {
        match self.block {
            Some(block) => {
                unsafe { block.as_ref() }.add_weak();
                WeakObserver::from_raw(Some(block))
            }
            None => WeakObserver::new(),
        }
    }
}

impl<T> Clone for SharedOwner<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            unsafe { block.as_ref() }.add_strong();
        }
        Self::from_raw(self.block)
    }
}

impl<T> Drop for SharedOwner<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            match unsafe { block.as_ref() }.release_strong() {
                EjectAction::Nothing | EjectAction::Dispose => {}
                EjectAction::Destroy => unsafe { ControlBlock::deallocate(block) },
            }
        }
    }
}

impl<T> Default for SharedOwner<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<ExclusiveOwner<T>> for SharedOwner<T> {
    /// Converts exclusive ownership into shared ownership, carrying the
    /// value and its deleter into a fresh control block. An empty exclusive
    /// owner yields an empty shared owner.
    fn from(owner: ExclusiveOwner<T>) -> Self {
        match owner.into_parts() {
            (Some(value), deleter) => {
                Self::from_raw(Some(ControlBlock::new(value, deleter).allocate()))
            }
            (None, _) => Self::empty(),
        }
    }
}

impl<T> From<Box<T>> for SharedOwner<T> {
    /// Adopts a boxed value, moving it into the control block.
    fn from(boxed: Box<T>) -> Self {
        Self::new(*boxed)
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::SharedOwner;

    assert_impl_all!(SharedOwner<u64>: Send, Sync);

    #[test]
    fn empty_handles_compare_equal_by_block() {
        let a = SharedOwner::<u32>::empty();
        let b = SharedOwner::<u32>::empty();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.use_count(), 0);
    }

    #[test]
    fn clones_share_one_block() {
        let a = SharedOwner::new(5u32);
        let b = a.clone();
        let c = SharedOwner::new(5u32);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.use_count(), 2);
    }
}
