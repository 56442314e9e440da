//! Little-endian scalar encoding.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

/// A fixed-width value stored inline in tables, structs and vectors.
///
/// Scalars are aligned to their own size.
pub trait Scalar: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decode from the first `SIZE` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into the first `SIZE` bytes of `out`.
    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($ty:ty, $size:expr, $read:ident, $write:ident) => {
        impl Scalar for $ty {
            const SIZE: usize = $size;

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                LittleEndian::$read(bytes)
            }

            #[inline]
            fn write_le(self, out: &mut [u8]) {
                LittleEndian::$write(out, self)
            }
        }
    };
}

impl_scalar!(u16, 2, read_u16, write_u16);
impl_scalar!(i16, 2, read_i16, write_i16);
impl_scalar!(u32, 4, read_u32, write_u32);
impl_scalar!(i32, 4, read_i32, write_i32);
impl_scalar!(u64, 8, read_u64, write_u64);
impl_scalar!(i64, 8, read_i64, write_i64);
impl_scalar!(f32, 4, read_f32, write_f32);
impl_scalar!(f64, 8, read_f64, write_f64);

impl Scalar for u8 {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl Scalar for i8 {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

/// Booleans are one byte; any non-zero value reads as `true`.
impl Scalar for bool {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Scalar>(value: T) -> Vec<u8> {
        let mut out = vec![0u8; T::SIZE];
        value.write_le(&mut out);
        out
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(encode(0x0403_0201u32), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(encode(-2i16), [0xFE, 0xFF]);
        assert_eq!(encode(1.0f32), [0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn test_bool_reads_any_nonzero_as_true() {
        assert!(bool::read_le(&[0x02]));
        assert!(!bool::read_le(&[0x00]));
        assert_eq!(encode(true), [1]);
    }

    #[test]
    fn test_reads_only_prefix() {
        assert_eq!(u16::read_le(&[0x34, 0x12, 0xFF, 0xFF]), 0x1234);
        assert_eq!(i8::read_le(&[0x80]), -128);
    }
}
