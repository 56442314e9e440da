//! Bounds-checked binary reader over borrowed byte slices.
//!
//! This module provides [`BinaryReader`], which reads little-endian values
//! either at absolute positions or from a moving cursor. Every read checks
//! the requested range against the slice first; nothing here can panic on
//! hostile input.

use byteorder::{ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::{Error, Result};

/// A binary reader that provides zero-copy, bounds-checked reads from a byte slice.
///
/// Absolute accessors (`u32_at`, `bytes_at`, ...) never move the cursor;
/// cursor accessors (`read_u32`, `read_bytes`, ...) advance it.
///
/// # Example
///
/// ```
/// use flatslot_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.u32_at(4).unwrap(), 0x08070605);
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.position(), 4);
/// assert!(reader.u32_at(6).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// The underlying slice.
    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Get the current cursor position.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the underlying buffer is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining after the cursor.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check that `count` bytes starting at `position` lie inside the buffer.
    #[inline]
    pub fn check_range(&self, position: usize, count: usize) -> Result<()> {
        match position.checked_add(count) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(Error::OutOfBounds {
                position,
                needed: count,
                len: self.data.len(),
            }),
        }
    }

    /// Apply a signed displacement to a position, failing on overflow or
    /// negative results.
    #[inline]
    pub fn displace(base: usize, delta: i64) -> Result<usize> {
        let target = (base as i64).checked_add(delta);
        match target {
            Some(t) if t >= 0 => Ok(t as usize),
            _ => Err(Error::PositionOverflow { base, delta }),
        }
    }

    /// Borrow `count` bytes at an absolute position.
    #[inline]
    pub fn bytes_at(&self, position: usize, count: usize) -> Result<&'a [u8]> {
        self.check_range(position, count)?;
        Ok(&self.data[position..position + count])
    }

    /// Read a byte at an absolute position.
    #[inline]
    pub fn u8_at(&self, position: usize) -> Result<u8> {
        self.bytes_at(position, 1).map(|b| b[0])
    }

    /// Read a little-endian u16 at an absolute position.
    #[inline]
    pub fn u16_at(&self, position: usize) -> Result<u16> {
        self.bytes_at(position, 2).map(LittleEndian::read_u16)
    }

    /// Read a little-endian u32 at an absolute position.
    #[inline]
    pub fn u32_at(&self, position: usize) -> Result<u32> {
        self.bytes_at(position, 4).map(LittleEndian::read_u32)
    }

    /// Read a little-endian i32 at an absolute position.
    #[inline]
    pub fn i32_at(&self, position: usize) -> Result<i32> {
        self.bytes_at(position, 4).map(LittleEndian::read_i32)
    }

    /// Read a UTF-8 string of `count` bytes at an absolute position.
    pub fn str_at(&self, position: usize, count: usize) -> Result<&'a str> {
        let bytes = self.bytes_at(position, count)?;
        std::str::from_utf8(bytes).map_err(Error::Utf8)
    }

    /// Copy a struct out of the buffer at an absolute position using zerocopy.
    #[inline]
    pub fn struct_at<T: FromBytes>(&self, position: usize) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.bytes_at(position, size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::OutOfBounds {
            position,
            needed: size,
            len: self.data.len(),
        })
    }

    /// Read bytes at the cursor and advance.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.bytes_at(self.position, count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a little-endian u16 at the cursor.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_bytes(2).map(LittleEndian::read_u16)
    }

    /// Read a little-endian u32 at the cursor.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFE, // u16: 0xFEFF
            0xAA,
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u16().unwrap(), 0xFEFF);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_bytes(1).unwrap(), &[0xAA]);
        assert!(reader.read_bytes(1).is_err());
    }

    #[test]
    fn test_absolute_reads_do_not_advance() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let reader = BinaryReader::new(&data);

        assert_eq!(reader.u16_at(2).unwrap(), 0x0403);
        assert_eq!(reader.u8_at(3).unwrap(), 0x04);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_out_of_bounds() {
        let data = [0x01, 0x02];
        let reader = BinaryReader::new(&data);

        assert_eq!(
            reader.u32_at(0),
            Err(Error::OutOfBounds {
                position: 0,
                needed: 4,
                len: 2
            })
        );
        assert!(reader.bytes_at(usize::MAX, 2).is_err());
        assert!(reader.bytes_at(2, 0).is_ok());
    }

    #[test]
    fn test_displace() {
        assert_eq!(BinaryReader::displace(10, -4).unwrap(), 6);
        assert_eq!(BinaryReader::displace(10, 5).unwrap(), 15);
        assert!(BinaryReader::displace(3, -4).is_err());
    }

    #[test]
    fn test_str_at() {
        let data = b"\x05\x00\x00\x00hello\x00";
        let reader = BinaryReader::new(data);

        assert_eq!(reader.str_at(4, 5).unwrap(), "hello");
        assert!(matches!(
            BinaryReader::new(&[0xFF, 0xFE]).str_at(0, 2),
            Err(Error::Utf8(_))
        ));
    }
}
