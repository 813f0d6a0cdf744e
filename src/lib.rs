//! Ownership-tracking smart pointers: an exclusive owner, an atomically
//! reference-counted shared owner, and a weak observer, coordinated through
//! a single control block per managed value.
//!
//! Destruction is deterministic: the value dies with the last strong handle,
//! the block dies with the last handle of any kind, and a weak observer can
//! [`promote`](WeakObserver::promote) back to a strong handle only while the
//! value is still alive. All counter traffic is lock-free atomics, so
//! handles may be cloned and dropped freely across threads; the library
//! guarantees lifetime safety only, not synchronization of the value's
//! contents.
//!
//! ```
//! use rcown::{make_shared, make_exclusive};
//!
//! let shared = make_shared(String::from("alive"));
//! let observer = shared.downgrade();
//!
//! let other = shared.clone();
//! assert_eq!(shared.use_count(), 2);
//! assert_eq!(observer.promote().unwrap().get().unwrap(), "alive");
//!
//! drop(shared);
//! drop(other);
//! assert!(observer.expired());
//! assert!(observer.promote().is_none());
//!
//! let mut sole = make_exclusive(vec![1, 2, 3]);
//! let taken = sole.release().unwrap();
//! assert!(sole.is_empty());
//! assert_eq!(taken, vec![1, 2, 3]);
//! ```
//!
//! Known limitation of the counting model: cycles of strong handles leak.

mod block;
mod count;
mod error;
mod exclusive;
mod strongs;
mod weaks;

pub use error::*;
pub use exclusive::*;
pub use strongs::*;
pub use weaks::*;

/// Creates an [`ExclusiveOwner`] owning `value`.
#[inline]
pub fn make_exclusive<T>(value: T) -> ExclusiveOwner<T> {
    ExclusiveOwner::new(value)
}

/// Creates a [`SharedOwner`] owning `value` in a fresh control block.
#[inline]
pub fn make_shared<T>(value: T) -> SharedOwner<T> {
    SharedOwner::new(value)
}
