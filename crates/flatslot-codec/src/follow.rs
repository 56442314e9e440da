//! How a value stored at a buffer position is turned into a Rust value.
//!
//! Inline values (scalars, structs) are decoded where they sit. Reference
//! values (strings, tables, vectors) sit behind one `uoffset`: a `u32` stored
//! at position `p` whose target is `p + value`.

use flatslot_common::BinaryReader;

use crate::{Malformed, Result, Scalar, Table, Vector};

/// Size of a `uoffset` reference.
pub const SIZE_UOFFSET: usize = 4;

/// A type that can be read from a position in a buffer.
///
/// `SIZE` and `ALIGNMENT` describe how one element is laid out when stored
/// inline, which is also its stride inside a vector.
pub trait Follow<'a> {
    /// The value produced by following.
    type Inner;

    /// Bytes occupied inline.
    const SIZE: usize;

    /// Alignment of the inline bytes.
    const ALIGNMENT: usize;

    /// Read the value stored at `loc`.
    fn follow(buf: &'a [u8], loc: usize) -> Result<Self::Inner>;
}

/// Resolve the `uoffset` stored at `loc`.
#[inline]
pub fn deref_uoffset(buf: &[u8], loc: usize) -> Result<usize> {
    let reader = BinaryReader::new(buf);
    let relative = reader.u32_at(loc)?;
    let target = BinaryReader::displace(loc, relative as i64)?;
    reader.check_range(target, 0)?;
    Ok(target)
}

/// Read the length-prefixed string starting at `loc`.
pub fn read_str(buf: &[u8], loc: usize) -> Result<&str> {
    let reader = BinaryReader::new(buf);
    let len = reader.u32_at(loc)? as usize;
    reader
        .str_at(loc + SIZE_UOFFSET, len)
        .map_err(|err| match err {
            flatslot_common::Error::Utf8(_) => Malformed::InvalidUtf8 { position: loc }.into(),
            other => other.into(),
        })
}

macro_rules! impl_follow_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'a> Follow<'a> for $ty {
                type Inner = $ty;
                const SIZE: usize = <$ty as Scalar>::SIZE;
                const ALIGNMENT: usize = <$ty as Scalar>::SIZE;

                #[inline]
                fn follow(buf: &'a [u8], loc: usize) -> Result<$ty> {
                    let bytes = BinaryReader::new(buf).bytes_at(loc, <$ty as Scalar>::SIZE)?;
                    Ok(<$ty as Scalar>::read_le(bytes))
                }
            }
        )*
    };
}

impl_follow_scalar!(u8, i8, bool, u16, i16, u32, i32, u64, i64, f32, f64);

impl<'a> Follow<'a> for &'a str {
    type Inner = &'a str;
    const SIZE: usize = SIZE_UOFFSET;
    const ALIGNMENT: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'a [u8], loc: usize) -> Result<&'a str> {
        read_str(buf, deref_uoffset(buf, loc)?)
    }
}

impl<'a> Follow<'a> for Table<'a> {
    type Inner = Table<'a>;
    const SIZE: usize = SIZE_UOFFSET;
    const ALIGNMENT: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'a [u8], loc: usize) -> Result<Table<'a>> {
        Table::at(buf, deref_uoffset(buf, loc)?)
    }
}

impl<'a, T: Follow<'a>> Follow<'a> for Vector<'a, T> {
    type Inner = Vector<'a, T>;
    const SIZE: usize = SIZE_UOFFSET;
    const ALIGNMENT: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'a [u8], loc: usize) -> Result<Vector<'a, T>> {
        Vector::at(buf, deref_uoffset(buf, loc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_deref_uoffset_is_relative_to_its_position() {
        // uoffset at 4 with value 4 -> 8
        let buf = [0, 0, 0, 0, 4, 0, 0, 0, 0xAA];
        assert_eq!(deref_uoffset(&buf, 4).unwrap(), 8);
    }

    #[test]
    fn test_deref_uoffset_out_of_bounds() {
        let buf = [0xFF, 0xFF, 0xFF, 0x7F];
        assert!(deref_uoffset(&buf, 0).unwrap_err().is_malformed());
        assert!(deref_uoffset(&buf, 2).unwrap_err().is_malformed());
    }

    #[test]
    fn test_read_str() {
        let buf = b"\x03\x00\x00\x00abc\x00";
        assert_eq!(read_str(buf, 0).unwrap(), "abc");

        let truncated = b"\x09\x00\x00\x00abc\x00";
        assert!(read_str(truncated, 0).unwrap_err().is_malformed());

        let invalid = b"\x02\x00\x00\x00\xC3\x28\x00";
        assert_eq!(
            read_str(invalid, 0),
            Err(Error::MalformedBuffer(Malformed::InvalidUtf8 { position: 0 }))
        );
    }

    #[test]
    fn test_follow_scalar() {
        let buf = [0x00, 0x2A, 0x00, 0x00, 0x00];
        assert_eq!(<u32 as Follow>::follow(&buf, 1).unwrap(), 42);
        assert!(<u32 as Follow>::follow(&buf, 2).is_err());

        let wide = 1.5f64.to_le_bytes();
        assert_eq!(<f64 as Follow>::follow(&wide, 0).unwrap(), 1.5);
        assert!(<f64 as Follow>::follow(&wide, 1).is_err());
    }
}
