//! Typed references to finished objects inside a builder.

use std::fmt;
use std::marker::PhantomData;

use crate::{Table, Vector};

/// Location of a finished object, measured from the end of the builder's buffer.
///
/// Only the builder's finishing calls (`end_table`, `create_string`,
/// `create_vector`, ...) hand these out, so a parent can never reference a
/// child that is still under construction. The type parameter records what
/// the offset points to.
pub struct Offset<T> {
    value: u32,
    _kind: PhantomData<fn() -> T>,
}

/// Offset of a finished string.
pub type StringOffset = Offset<&'static str>;

/// Offset of a finished table.
pub type TableOffset = Offset<Table<'static>>;

/// Offset of a finished vector with elements of type `T`.
pub type VectorOffset<T> = Offset<Vector<'static, T>>;

impl<T> Offset<T> {
    /// Wrap a raw distance from the buffer end.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    /// The raw distance from the buffer end.
    #[inline]
    pub fn value(self) -> u32 {
        self.value
    }

    /// Reinterpret as an offset to another kind, e.g. a typed table.
    #[inline]
    pub fn cast<U>(self) -> Offset<U> {
        Offset::new(self.value)
    }
}

impl<T> Clone for Offset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Offset<T> {}

impl<T> PartialEq for Offset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Offset<T> {}

impl<T> fmt::Debug for Offset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset({})", self.value)
    }
}
