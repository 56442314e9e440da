//! Zero-copy table access.
//!
//! A table at position `t` starts with an `i32` soffset; its vtable sits at
//! `t - soffset`:
//!
//! ```text
//! vtable:  u16 vtable_len | u16 table_len | u16 slot0 | u16 slot1 | ...
//! table:   i32 soffset | field data ...
//! ```
//!
//! A slot entry of 0 means the field is absent and reads return the default.
//! Slots past `vtable_len` are absent too, which is what lets a reader built
//! against a newer schema consume older buffers.

use flatslot_common::BinaryReader;

use crate::follow::SIZE_UOFFSET;
use crate::{deref_uoffset, Error, FlatStruct, Follow, Malformed, Result, Scalar, Vector};

/// Size of a file identifier.
pub const FILE_IDENTIFIER_LENGTH: usize = 4;

/// Size of the length prefix of size-prefixed buffers.
pub const SIZE_PREFIX_LENGTH: usize = 4;

/// Size of the vtable header (`vtable_len`, `table_len`).
pub const VTABLE_HEADER_SIZE: usize = 4;

/// Byte position of a slot's entry inside a vtable.
#[inline]
pub const fn slot_entry_position(slot: u16) -> usize {
    VTABLE_HEADER_SIZE + 2 * slot as usize
}

/// A borrowed view of a table inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table<'a> {
    buf: &'a [u8],
    loc: usize,
}

/// A resolved field-offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VTable<'a> {
    buf: &'a [u8],
    loc: usize,
    len: usize,
    table_len: usize,
}

impl<'a> VTable<'a> {
    /// Resolve the vtable of the table at `table_loc`.
    pub fn of(buf: &'a [u8], table_loc: usize) -> Result<Self> {
        let reader = BinaryReader::new(buf);
        let soffset = reader.i32_at(table_loc)?;
        let loc = BinaryReader::displace(table_loc, -(soffset as i64))?;

        let mut header = BinaryReader::new_at(buf, loc);
        let len = header.read_u16()? as usize;
        let table_len = header.read_u16()? as usize;

        if len < VTABLE_HEADER_SIZE || len % 2 != 0 {
            return Err(Malformed::InvalidVTable {
                position: loc,
                reason: "vtable length must be even and at least 4",
            }
            .into());
        }
        if reader.check_range(loc, len).is_err() {
            return Err(Malformed::InvalidVTable {
                position: loc,
                reason: "vtable extends past the end of the buffer",
            }
            .into());
        }
        if table_len < SIZE_UOFFSET {
            return Err(Malformed::InvalidVTable {
                position: loc,
                reason: "table is smaller than its soffset",
            }
            .into());
        }

        Ok(Self {
            buf,
            loc,
            len,
            table_len,
        })
    }

    /// Position of the vtable in the buffer.
    #[inline]
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// Vtable size in bytes, header included.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vtable declares no slots at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_slots() == 0
    }

    /// Inline size of the table in bytes, soffset included.
    #[inline]
    pub fn table_len(&self) -> usize {
        self.table_len
    }

    /// Number of slots the vtable declares.
    #[inline]
    pub fn num_slots(&self) -> u16 {
        ((self.len - VTABLE_HEADER_SIZE) / 2) as u16
    }

    /// Offset of a slot's field relative to the table start; 0 when absent.
    #[inline]
    pub fn slot_offset(&self, slot: u16) -> Result<u16> {
        let entry = slot_entry_position(slot);
        if entry >= self.len {
            return Ok(0);
        }
        Ok(BinaryReader::new(self.buf).u16_at(self.loc + entry)?)
    }

    /// Iterate over `(slot, offset)` pairs of present fields.
    pub fn present_slots(&self) -> impl Iterator<Item = (u16, u16)> + 'a {
        let vtable = *self;
        (0..self.num_slots()).filter_map(move |slot| match vtable.slot_offset(slot) {
            Ok(0) | Err(_) => None,
            Ok(offset) => Some((slot, offset)),
        })
    }
}

impl<'a> Table<'a> {
    /// Create a table view at `loc`.
    ///
    /// Only the soffset is checked here; the vtable is resolved lazily by
    /// each field access.
    pub fn at(buf: &'a [u8], loc: usize) -> Result<Self> {
        BinaryReader::new(buf).check_range(loc, SIZE_UOFFSET)?;
        Ok(Self { buf, loc })
    }

    /// The buffer this table lives in.
    #[inline]
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Position of the table in the buffer.
    #[inline]
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// Resolve the table's vtable.
    #[inline]
    pub fn vtable(&self) -> Result<VTable<'a>> {
        VTable::of(self.buf, self.loc)
    }

    /// Absolute position of a slot's value, or `None` when absent.
    pub fn field_position(&self, slot: u16) -> Result<Option<usize>> {
        match self.vtable()?.slot_offset(slot)? {
            0 => Ok(None),
            offset => Ok(Some(self.loc + offset as usize)),
        }
    }

    /// Whether a slot holds a value.
    pub fn is_present(&self, slot: u16) -> Result<bool> {
        Ok(self.field_position(slot)?.is_some())
    }

    /// Read any followable field; `None` when absent.
    pub fn get_field<F: Follow<'a>>(&self, slot: u16) -> Result<Option<F::Inner>> {
        match self.field_position(slot)? {
            Some(pos) => F::follow(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    /// Read a scalar field, falling back to `default` when absent.
    #[inline]
    pub fn get<T>(&self, slot: u16, default: T) -> Result<T>
    where
        T: Scalar + Follow<'a, Inner = T>,
    {
        Ok(self.get_field::<T>(slot)?.unwrap_or(default))
    }

    /// Read a scalar field, distinguishing "absent" from any stored value.
    #[inline]
    pub fn get_optional<T>(&self, slot: u16) -> Result<Option<T>>
    where
        T: Scalar + Follow<'a, Inner = T>,
    {
        self.get_field::<T>(slot)
    }

    /// Read a string field.
    #[inline]
    pub fn get_str(&self, slot: u16) -> Result<Option<&'a str>> {
        self.get_field::<&'a str>(slot)
    }

    /// Read a byte vector field as a borrowed slice.
    #[inline]
    pub fn get_bytes(&self, slot: u16) -> Result<Option<&'a [u8]>> {
        Ok(self.get_vector::<u8>(slot)?.map(|v| v.bytes()))
    }

    /// Read a child table field.
    #[inline]
    pub fn get_table(&self, slot: u16) -> Result<Option<Table<'a>>> {
        self.get_field::<Table<'a>>(slot)
    }

    /// Read a vector field.
    #[inline]
    pub fn get_vector<T: Follow<'a>>(&self, slot: u16) -> Result<Option<Vector<'a, T>>> {
        self.get_field::<Vector<'a, T>>(slot)
    }

    /// Read an inline struct field.
    #[inline]
    pub fn get_struct<S: FlatStruct>(&self, slot: u16) -> Result<Option<S>> {
        match self.field_position(slot)? {
            Some(pos) => crate::read_struct::<S>(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    /// Length of a vector field; 0 when absent.
    pub fn vector_len<T: Follow<'a>>(&self, slot: u16) -> Result<usize> {
        Ok(self.get_vector::<T>(slot)?.map_or(0, |v| v.len()))
    }

    /// One element of a vector field.
    ///
    /// An absent vector behaves as an empty one, so every index is out of range.
    pub fn vector_element<T: Follow<'a>>(&self, slot: u16, index: usize) -> Result<T::Inner> {
        match self.get_vector::<T>(slot)? {
            Some(vector) => vector.get(index),
            None => Err(Error::IndexOutOfRange { index, len: 0 }),
        }
    }
}

/// A typed accessor over a [`Table`].
pub trait FlatTable<'a>: Sized {
    /// Wrap a table view.
    fn from_table(table: Table<'a>) -> Self;

    /// The underlying table view.
    fn table(&self) -> Table<'a>;
}

/// Read the root table of a buffer.
///
/// The first four bytes hold a `uoffset` to the root table.
pub fn root_table(buf: &[u8]) -> Result<Table<'_>> {
    if buf.len() < SIZE_UOFFSET {
        return Err(Malformed::TooShort {
            len: buf.len(),
            needed: SIZE_UOFFSET,
        }
        .into());
    }
    Table::at(buf, deref_uoffset(buf, 0)?)
}

/// Check the file identifier stored after the root offset.
pub fn buffer_has_identifier(buf: &[u8], identifier: &[u8; FILE_IDENTIFIER_LENGTH]) -> bool {
    buf.get(SIZE_UOFFSET..SIZE_UOFFSET + FILE_IDENTIFIER_LENGTH) == Some(&identifier[..])
}

/// Read the root table of a buffer that must carry `identifier`.
pub fn root_table_with_identifier<'a>(
    buf: &'a [u8],
    identifier: &[u8; FILE_IDENTIFIER_LENGTH],
) -> Result<Table<'a>> {
    let needed = SIZE_UOFFSET + FILE_IDENTIFIER_LENGTH;
    let actual = buf
        .get(SIZE_UOFFSET..needed)
        .ok_or(Malformed::TooShort {
            len: buf.len(),
            needed,
        })?;
    if actual != identifier {
        let mut found = [0u8; FILE_IDENTIFIER_LENGTH];
        found.copy_from_slice(actual);
        return Err(Error::IdentifierMismatch {
            expected: *identifier,
            actual: found,
        });
    }
    root_table(buf)
}

/// Strip the length prefix of a size-prefixed buffer.
pub fn strip_size_prefix(buf: &[u8]) -> Result<&[u8]> {
    let reader = BinaryReader::new(buf);
    if buf.len() < SIZE_PREFIX_LENGTH {
        return Err(Malformed::TooShort {
            len: buf.len(),
            needed: SIZE_PREFIX_LENGTH,
        }
        .into());
    }
    let prefix = reader.u32_at(0)? as usize;
    let available = buf.len() - SIZE_PREFIX_LENGTH;
    if prefix > available {
        return Err(Malformed::SizePrefix { prefix, available }.into());
    }
    Ok(&buf[SIZE_PREFIX_LENGTH..SIZE_PREFIX_LENGTH + prefix])
}

/// Read the root table of a size-prefixed buffer.
pub fn size_prefixed_root_table(buf: &[u8]) -> Result<Table<'_>> {
    root_table(strip_size_prefix(buf)?)
}

/// Read the root of a buffer as a typed table.
pub fn root_as<'a, T: FlatTable<'a>>(buf: &'a [u8]) -> Result<T> {
    root_table(buf).map(T::from_table)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled buffer: root -> table with slot 0 = u32 7, slot 1 absent,
    /// slot 2 = u16 9.
    fn sample() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&16u32.to_le_bytes()); // root uoffset -> 16
        // vtable at 4: len 10, table_len 12, slots [4, 0, 8]
        for v in [10u16, 12, 4, 0, 8] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&[0, 0]); // pad to 16
        buf.extend_from_slice(&12i32.to_le_bytes()); // soffset: 16 - 12 = 4
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&9u16.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    #[test]
    fn test_root_and_fields() {
        let buf = sample();
        let table = root_table(&buf).unwrap();
        assert_eq!(table.loc(), 16);
        assert_eq!(table.get::<u32>(0, 0).unwrap(), 7);
        assert_eq!(table.get::<u32>(1, 55).unwrap(), 55);
        assert_eq!(table.get::<u16>(2, 0).unwrap(), 9);
        assert_eq!(table.get_optional::<u32>(1).unwrap(), None);
    }

    #[test]
    fn test_slot_beyond_vtable_is_absent() {
        let buf = sample();
        let table = root_table(&buf).unwrap();
        assert_eq!(table.get::<i64>(3, -1).unwrap(), -1);
        assert_eq!(table.get::<u8>(400, 3).unwrap(), 3);
        assert!(!table.is_present(u16::MAX).unwrap());
    }

    #[test]
    fn test_vtable_metadata() {
        let buf = sample();
        let vtable = root_table(&buf).unwrap().vtable().unwrap();
        assert_eq!(vtable.loc(), 4);
        assert_eq!(vtable.num_slots(), 3);
        assert_eq!(vtable.table_len(), 12);
        assert_eq!(vtable.present_slots().collect::<Vec<_>>(), vec![(0, 4), (2, 8)]);
    }

    #[test]
    fn test_short_buffer() {
        assert_eq!(
            root_table(&[1, 2, 3]),
            Err(Error::MalformedBuffer(Malformed::TooShort { len: 3, needed: 4 }))
        );
    }

    #[test]
    fn test_corrupt_soffset_is_malformed() {
        let mut buf = sample();
        buf[16..20].copy_from_slice(&(-4000i32).to_le_bytes());
        let table = root_table(&buf).unwrap();
        assert!(table.get::<u32>(0, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn test_odd_vtable_len_is_malformed() {
        let mut buf = sample();
        buf[4..6].copy_from_slice(&7u16.to_le_bytes());
        let err = root_table(&buf).unwrap().vtable().unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedBuffer(Malformed::InvalidVTable { position: 4, .. })
        ));
    }

    #[test]
    fn test_identifier() {
        let mut buf = vec![8, 0, 0, 0];
        buf.extend_from_slice(b"OBJD");
        assert!(buffer_has_identifier(&buf, b"OBJD"));
        assert!(!buffer_has_identifier(&buf, b"NOPE"));
        assert_eq!(
            root_table_with_identifier(&buf, b"NOPE"),
            Err(Error::IdentifierMismatch {
                expected: *b"NOPE",
                actual: *b"OBJD"
            })
        );
    }

    #[test]
    fn test_size_prefix_larger_than_buffer() {
        let buf = [100, 0, 0, 0, 4, 0, 0, 0];
        assert!(matches!(
            size_prefixed_root_table(&buf),
            Err(Error::MalformedBuffer(Malformed::SizePrefix {
                prefix: 100,
                available: 4
            }))
        ));
    }
}
