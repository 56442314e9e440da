//! Fixed-layout structs stored inline.
//!
//! A struct's byte layout is its Rust layout: declare it `#[repr(C)]`, derive
//! the zerocopy traits, use the little-endian field types from
//! [`zerocopy::byteorder::little_endian`] and spell padding out as explicit
//! `[u8; N]` fields. Then register it with [`flat_struct!`](crate::flat_struct).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use flatslot_common::BinaryReader;

use crate::Result;

/// A fixed-size aggregate with no field-offset table.
pub trait FlatStruct: FromBytes + IntoBytes + Immutable + KnownLayout + Copy + 'static {
    /// Alignment the struct is placed at inside a buffer.
    const ALIGNMENT: usize;
}

/// Copy a struct out of `buf` at `loc`.
#[inline]
pub fn read_struct<S: FlatStruct>(buf: &[u8], loc: usize) -> Result<S> {
    Ok(BinaryReader::new(buf).struct_at::<S>(loc)?)
}

/// Implement [`FlatStruct`] and [`Follow`](crate::Follow) for a struct type.
///
/// ```
/// use flatslot_codec::flat_struct;
/// use zerocopy::byteorder::little_endian::U32;
/// use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
///
/// #[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
/// #[repr(C)]
/// pub struct Range {
///     pub start: U32,
///     pub end: U32,
/// }
///
/// flat_struct!(Range, align = 4);
/// ```
#[macro_export]
macro_rules! flat_struct {
    ($ty:ty, align = $align:expr) => {
        const _: () = {
            assert!(($align as usize).is_power_of_two());
            assert!(::core::mem::size_of::<$ty>() % ($align as usize) == 0);
        };

        impl $crate::FlatStruct for $ty {
            const ALIGNMENT: usize = $align;
        }

        impl<'a> $crate::Follow<'a> for $ty {
            type Inner = $ty;
            const SIZE: usize = ::core::mem::size_of::<$ty>();
            const ALIGNMENT: usize = $align;

            #[inline]
            fn follow(buf: &'a [u8], loc: usize) -> $crate::Result<$ty> {
                $crate::read_struct::<$ty>(buf, loc)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use zerocopy::byteorder::little_endian::{I16, U32};
    use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

    use crate::Follow;

    #[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
    #[repr(C)]
    struct Sample {
        id: U32,
        delta: I16,
        flags: u8,
        _padding: u8,
    }

    flat_struct!(Sample, align = 4);

    #[test]
    fn test_struct_layout_is_little_endian() {
        let sample = Sample {
            id: U32::new(0x0102_0304),
            delta: I16::new(-1),
            flags: 7,
            _padding: 0,
        };
        assert_eq!(
            zerocopy::IntoBytes::as_bytes(&sample),
            &[0x04, 0x03, 0x02, 0x01, 0xFF, 0xFF, 7, 0]
        );
    }

    #[test]
    fn test_follow_struct() {
        let buf = [0, 0, 0, 0, 0x2A, 0, 0, 0, 0x02, 0, 1, 0];
        let sample = <Sample as Follow>::follow(&buf, 4).unwrap();
        assert_eq!(sample.id.get(), 42);
        assert_eq!(sample.delta.get(), 2);
        assert_eq!(sample.flags, 1);
        assert!(<Sample as Follow>::follow(&buf, 8).is_err());
    }
}
