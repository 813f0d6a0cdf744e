use crate::block::Deleter;
use crate::error::EmptyAccess;

/// Sole-owner wrapper: owns at most one value, stored inline, with no
/// control block and no allocation.
///
/// Exclusive ownership can never be duplicated: the type has no [`Clone`]
/// impl, and native moves leave the source statically inaccessible. For the
/// cases where a source must be drained through a `&mut` reference instead,
/// [`ExclusiveOwner::take`] moves the contents out and leaves it empty.
pub struct ExclusiveOwner<T> {
    value: Option<T>,
    deleter: Option<Deleter<T>>,
}

impl<T> ExclusiveOwner<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            deleter: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            value: None,
            deleter: None,
        }
    }

    /// Owns `value`, destroying it through `deleter` instead of the plain
    /// drop. The deleter is tied to this value; it travels with the value
    /// into [`SharedOwner`](crate::SharedOwner) on conversion and is
    /// discarded by [`ExclusiveOwner::release`].
    pub fn with_deleter(value: T, deleter: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            value: Some(value),
            deleter: Some(Box::new(deleter)),
        }
    }

    /// Destroys the currently owned value, if any, and takes ownership of
    /// `value`.
    pub fn reset(&mut self, value: T) {
        self.dispose_current();
        self.value = Some(value);
    }

    /// Destroys the currently owned value, if any, leaving the owner empty.
    pub fn clear(&mut self) {
        self.dispose_current();
    }

    /// Relinquishes ownership: hands the value back without destroying it.
    /// The installed deleter, if any, is discarded with it; the caller now
    /// owns a plain `T`.
    pub fn release(&mut self) -> Option<T> {
        self.deleter = None;
        self.value.take()
    }

    /// Moves the contents (value and deleter) out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        Self {
            value: self.value.take(),
            deleter: self.deleter.take(),
        }
    }

    pub fn get(&self) -> Result<&T, EmptyAccess> {
        self.value.as_ref().ok_or(EmptyAccess)
    }

    pub fn get_mut(&mut self) -> Result<&mut T, EmptyAccess> {
        self.value.as_mut().ok_or(EmptyAccess)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Converts into a [`SharedOwner`](crate::SharedOwner), carrying the
    /// value and its deleter into a fresh control block.
    pub fn into_shared(self) -> crate::SharedOwner<T> {
        self.into()
    }

    pub(crate) fn into_parts(mut self) -> (Option<T>, Option<Deleter<T>>) {
        (self.value.take(), self.deleter.take())
    }

    fn dispose_current(&mut self) {
        if let Some(value) = self.value.take() {
            match self.deleter.take() {
                Some(deleter) => deleter(value),
                None => drop(value),
            }
        }
    }
}

impl<T> Default for ExclusiveOwner<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Drop for ExclusiveOwner<T> {
    fn drop(&mut self) {
        self.dispose_current();
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::ExclusiveOwner;
    use crate::error::EmptyAccess;

    // Duplicating exclusive ownership must not compile.
    assert_not_impl_any!(ExclusiveOwner<String>: Clone, Copy);

    #[test]
    fn empty_access_is_an_error() {
        let mut owner = ExclusiveOwner::<u32>::empty();
        assert!(owner.is_empty());
        assert_eq!(owner.get(), Err(EmptyAccess));
        assert_eq!(owner.get_mut(), Err(EmptyAccess));
    }

    #[test]
    fn reset_replaces_the_value() {
        let mut owner = ExclusiveOwner::new(String::from("old"));
        owner.reset(String::from("new"));
        assert_eq!(owner.get().unwrap(), "new");
        owner.clear();
        assert!(owner.is_empty());
    }
}
