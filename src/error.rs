use std::error::Error;
use std::fmt;

/// The error returned when accessing an owner or observer handle that
/// currently holds no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyAccess;

impl fmt::Display for EmptyAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("accessed a handle that owns no value")
    }
}

impl Error for EmptyAccess {}
