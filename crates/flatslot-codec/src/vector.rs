//! Length-prefixed vectors.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use flatslot_common::BinaryReader;

use crate::follow::SIZE_UOFFSET;
use crate::{Error, Follow, Result};

/// A borrowed view of a vector: a `u32` count followed by fixed-stride elements.
///
/// The stride is `T::SIZE`: the element's own size for scalars and structs,
/// 4 for strings and tables, whose elements are `uoffset`s.
pub struct Vector<'a, T> {
    buf: &'a [u8],
    loc: usize,
    len: usize,
    _element: PhantomData<fn() -> T>,
}

impl<'a, T> Clone for Vector<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Vector<'a, T> {}

impl<'a, T> fmt::Debug for Vector<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector")
            .field("loc", &self.loc)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a, T: Follow<'a>> Vector<'a, T> {
    /// Create a vector view over the length prefix at `loc`.
    ///
    /// The whole element region is checked against the buffer here, so a
    /// corrupt count is caught before any element is touched.
    pub fn at(buf: &'a [u8], loc: usize) -> Result<Self> {
        let reader = BinaryReader::new(buf);
        let len = reader.u32_at(loc)? as usize;
        let byte_len = len
            .checked_mul(T::SIZE)
            .ok_or(flatslot_common::Error::OutOfBounds {
                position: loc,
                needed: usize::MAX,
                len: buf.len(),
            })?;
        reader.check_range(loc + SIZE_UOFFSET, byte_len)?;
        Ok(Self {
            buf,
            loc,
            len,
            _element: PhantomData,
        })
    }

    /// Position of the length prefix.
    #[inline]
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read one element.
    pub fn get(&self, index: usize) -> Result<T::Inner> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        T::follow(self.buf, self.data_loc() + index * T::SIZE)
    }

    /// Iterate over the elements.
    #[inline]
    pub fn iter(&self) -> VectorIter<'a, T> {
        VectorIter {
            vector: *self,
            front: 0,
            back: self.len,
        }
    }

    /// Read every element into a `Vec`, stopping at the first error.
    pub fn to_vec(&self) -> Result<Vec<T::Inner>> {
        self.iter().collect()
    }

    #[inline]
    fn data_loc(&self) -> usize {
        self.loc + SIZE_UOFFSET
    }
}

impl<'a> Vector<'a, u8> {
    /// The elements as a borrowed byte slice.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        let start = self.loc + SIZE_UOFFSET;
        &self.buf[start..start + self.len]
    }
}

/// Iterator over a [`Vector`].
pub struct VectorIter<'a, T> {
    vector: Vector<'a, T>,
    front: usize,
    back: usize,
}

impl<'a, T: Follow<'a>> Iterator for VectorIter<'a, T> {
    type Item = Result<T::Inner>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.vector.get(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'a, T: Follow<'a>> DoubleEndedIterator for VectorIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.vector.get(self.back))
    }
}

impl<'a, T: Follow<'a>> ExactSizeIterator for VectorIter<'a, T> {}

impl<'a, T: Follow<'a>> FusedIterator for VectorIter<'a, T> {}

impl<'a, T: Follow<'a>> IntoIterator for Vector<'a, T> {
    type Item = Result<T::Inner>;
    type IntoIter = VectorIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_vector(values: &[u16]) -> Vec<u8> {
        let mut buf = (values.len() as u32).to_le_bytes().to_vec();
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_get_and_iterate() {
        let buf = u16_vector(&[3, 1, 4]);
        let vector = Vector::<u16>::at(&buf, 0).unwrap();
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.get(2).unwrap(), 4);
        assert_eq!(vector.to_vec().unwrap(), vec![3, 1, 4]);
        assert_eq!(
            vector.iter().rev().collect::<Result<Vec<_>>>().unwrap(),
            vec![4, 1, 3]
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let buf = u16_vector(&[3, 1, 4]);
        let vector = Vector::<u16>::at(&buf, 0).unwrap();
        assert_eq!(vector.get(3), Err(Error::IndexOutOfRange { index: 3, len: 3 }));
    }

    #[test]
    fn test_count_past_end_is_malformed() {
        let mut buf = u16_vector(&[3, 1, 4]);
        buf[0] = 200;
        assert!(Vector::<u16>::at(&buf, 0).unwrap_err().is_malformed());

        buf[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(Vector::<u64>::at(&buf, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn test_bytes() {
        let buf = [2, 0, 0, 0, 0xAB, 0xCD, 0xEF];
        let vector = Vector::<u8>::at(&buf, 0).unwrap();
        assert_eq!(vector.bytes(), &[0xAB, 0xCD]);
        assert!(vector.iter().next().is_some());
    }
}
