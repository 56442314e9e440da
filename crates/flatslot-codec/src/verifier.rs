//! Up-front structural verification of untrusted buffers.
//!
//! Reading is already bounds-checked field by field. The verifier walks a
//! whole buffer once so that malformed input is rejected before any accessor
//! is handed out. Schema knowledge comes from [`Verify`] impls, which describe
//! each table's fields in terms of the `verify_*_field` calls below.

use tracing::debug;

use flatslot_common::align::is_aligned;
use flatslot_common::BinaryReader;

use crate::follow::SIZE_UOFFSET;
use crate::table::{strip_size_prefix, FILE_IDENTIFIER_LENGTH, SIZE_PREFIX_LENGTH};
use crate::{
    deref_uoffset, Error, FlatStruct, FlatTable, Follow, Malformed, Result, Scalar, Table,
    VTable, VerifierOptions,
};

/// A table type whose layout can be verified.
pub trait Verify {
    /// Verify the table at `pos`, including everything it references.
    fn run_verifier(verifier: &mut Verifier<'_>, pos: usize) -> Result<()>;
}

/// Walks a buffer checking offsets, sizes and limits.
#[derive(Debug)]
pub struct Verifier<'a> {
    buf: &'a [u8],
    reader: BinaryReader<'a>,
    options: VerifierOptions,
    base: usize,
    depth: usize,
    num_tables: usize,
}

impl<'a> Verifier<'a> {
    pub fn new(buf: &'a [u8], options: VerifierOptions) -> Self {
        Self::with_base(buf, 0, options)
    }

    /// A verifier for `buf` sitting `base` bytes into the buffer it was
    /// built in, such as the body of a size-prefixed buffer.
    ///
    /// Alignment is checked against `base + position`.
    pub fn with_base(buf: &'a [u8], base: usize, options: VerifierOptions) -> Self {
        Self {
            buf,
            reader: BinaryReader::new(buf),
            options,
            base,
            depth: 0,
            num_tables: 0,
        }
    }

    /// The buffer being verified.
    #[inline]
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Number of tables visited so far.
    #[inline]
    pub fn num_tables(&self) -> usize {
        self.num_tables
    }

    fn check_alignment(&self, what: &'static str, position: usize, alignment: usize) -> Result<()> {
        if self.options.check_alignment && !is_aligned(self.base + position, alignment) {
            return Err(Malformed::Unaligned {
                what,
                position,
                alignment,
            }
            .into());
        }
        Ok(())
    }

    fn check_range(&self, position: usize, len: usize) -> Result<()> {
        Ok(self.reader.check_range(position, len)?)
    }

    fn follow_uoffset(&self, pos: usize) -> Result<usize> {
        self.check_alignment("uoffset", pos, SIZE_UOFFSET)?;
        deref_uoffset(self.buf, pos)
    }

    /// Enter the table at `pos`: check limits, the vtable and the inline
    /// extent, and that every slot entry stays inside the table.
    ///
    /// Must be paired with [`end_table`](Self::end_table).
    pub fn verify_table_start(&mut self, pos: usize) -> Result<Table<'a>> {
        self.depth += 1;
        self.num_tables += 1;
        if self.depth > self.options.max_depth {
            return Err(Malformed::DepthLimit(self.options.max_depth).into());
        }
        if self.num_tables > self.options.max_tables {
            return Err(Malformed::TableLimit(self.options.max_tables).into());
        }

        self.check_alignment("table", pos, SIZE_UOFFSET)?;
        let table = Table::at(self.buf, pos)?;
        let vtable = table.vtable()?;
        self.check_alignment("vtable", vtable.loc(), 2)?;
        self.check_range(pos, vtable.table_len())?;

        for slot in 0..vtable.num_slots() {
            let offset = vtable.slot_offset(slot)? as usize;
            if offset != 0 && offset >= vtable.table_len() {
                return Err(Malformed::FieldOutOfTable {
                    slot,
                    offset,
                    table_len: vtable.table_len(),
                }
                .into());
            }
        }
        Ok(table)
    }

    /// Leave the table entered last.
    #[inline]
    pub fn end_table(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn field_extent(table: &Table<'a>, vtable: &VTable<'a>, slot: u16, size: usize) -> Result<Option<usize>> {
        let offset = vtable.slot_offset(slot)? as usize;
        if offset == 0 {
            return Ok(None);
        }
        if offset + size > vtable.table_len() {
            return Err(Malformed::FieldOutOfTable {
                slot,
                offset,
                table_len: vtable.table_len(),
            }
            .into());
        }
        Ok(Some(table.loc() + offset))
    }

    fn inline_field(&self, table: &Table<'a>, slot: u16, size: usize, alignment: usize) -> Result<Option<usize>> {
        let vtable = table.vtable()?;
        let pos = Self::field_extent(table, &vtable, slot, size)?;
        if let Some(pos) = pos {
            self.check_alignment("field", pos, alignment)?;
        }
        Ok(pos)
    }

    /// Check a scalar field lies inside its table.
    pub fn verify_field<T: Scalar>(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        self.inline_field(table, slot, T::SIZE, T::SIZE).map(drop)
    }

    /// Check an inline struct field lies inside its table.
    pub fn verify_struct_field<S: FlatStruct>(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        self.inline_field(table, slot, std::mem::size_of::<S>(), S::ALIGNMENT)
            .map(drop)
    }

    /// Check a field the schema marks as required is present.
    pub fn verify_required(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        if table.is_present(slot)? {
            Ok(())
        } else {
            Err(Error::MissingRequiredField { slot })
        }
    }

    fn reference_field(&self, table: &Table<'a>, slot: u16) -> Result<Option<usize>> {
        match self.inline_field(table, slot, SIZE_UOFFSET, SIZE_UOFFSET)? {
            Some(pos) => self.follow_uoffset(pos).map(Some),
            None => Ok(None),
        }
    }

    /// Check the string whose length prefix sits at `pos`.
    pub fn verify_string(&mut self, pos: usize) -> Result<()> {
        self.check_alignment("string", pos, SIZE_UOFFSET)?;
        let mut cursor = BinaryReader::new_at(self.buf, pos);
        let len = cursor.read_u32()? as usize;
        let bytes = cursor.read_bytes(len)?;
        match cursor.u8_at(cursor.position()) {
            Ok(0) => {}
            _ => return Err(Malformed::MissingTerminator { position: pos }.into()),
        }
        if std::str::from_utf8(bytes).is_err() {
            return Err(Malformed::InvalidUtf8 { position: pos }.into());
        }
        Ok(())
    }

    /// Check a string field.
    pub fn verify_string_field(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        match self.reference_field(table, slot)? {
            Some(pos) => self.verify_string(pos),
            None => Ok(()),
        }
    }

    /// Check the vector whose length prefix sits at `pos`, with elements of
    /// `elem_size` bytes. Returns the element count.
    pub fn verify_vector(&mut self, pos: usize, elem_size: usize, alignment: usize) -> Result<usize> {
        self.check_alignment("vector", pos, SIZE_UOFFSET)?;
        let mut cursor = BinaryReader::new_at(self.buf, pos);
        let len = cursor.read_u32()? as usize;
        let data = cursor.position();
        self.check_alignment("vector elements", data, alignment)?;
        let byte_len = len.checked_mul(elem_size).ok_or(flatslot_common::Error::OutOfBounds {
            position: data,
            needed: usize::MAX,
            len: self.buf.len(),
        })?;
        self.check_range(data, byte_len)?;
        Ok(len)
    }

    /// Check a vector field of scalars or structs.
    pub fn verify_vector_field<T: Follow<'a>>(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        match self.reference_field(table, slot)? {
            Some(pos) => self.verify_vector(pos, T::SIZE, T::ALIGNMENT).map(drop),
            None => Ok(()),
        }
    }

    /// Check a vector-of-strings field, including every string.
    pub fn verify_vector_of_strings_field(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        let Some(pos) = self.reference_field(table, slot)? else {
            return Ok(());
        };
        let len = self.verify_vector(pos, SIZE_UOFFSET, SIZE_UOFFSET)?;
        for index in 0..len {
            let element = pos + SIZE_UOFFSET + index * SIZE_UOFFSET;
            let string = self.follow_uoffset(element)?;
            self.verify_string(string)?;
        }
        Ok(())
    }

    /// Check a vector-of-tables field, verifying every table.
    pub fn verify_vector_of_tables_field<T: Verify>(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        let Some(pos) = self.reference_field(table, slot)? else {
            return Ok(());
        };
        let len = self.verify_vector(pos, SIZE_UOFFSET, SIZE_UOFFSET)?;
        for index in 0..len {
            let element = pos + SIZE_UOFFSET + index * SIZE_UOFFSET;
            let child = self.follow_uoffset(element)?;
            T::run_verifier(self, child)?;
        }
        Ok(())
    }

    /// Check a child table field.
    pub fn verify_table_field<T: Verify>(&mut self, table: &Table<'a>, slot: u16) -> Result<()> {
        match self.reference_field(table, slot)? {
            Some(pos) => T::run_verifier(self, pos),
            None => Ok(()),
        }
    }

    /// Verify a whole buffer whose root is a `T`.
    pub fn verify_buffer<T: Verify>(
        &mut self,
        identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    ) -> Result<()> {
        let header = SIZE_UOFFSET + identifier.map_or(0, |_| FILE_IDENTIFIER_LENGTH);
        if self.buf.len() < header {
            return Err(Malformed::TooShort {
                len: self.buf.len(),
                needed: header,
            }
            .into());
        }
        if let Some(expected) = identifier {
            let mut actual = [0u8; FILE_IDENTIFIER_LENGTH];
            actual.copy_from_slice(&self.buf[SIZE_UOFFSET..header]);
            if &actual != expected {
                return Err(Error::IdentifierMismatch {
                    expected: *expected,
                    actual,
                });
            }
        }
        let root = self.follow_uoffset(0)?;
        T::run_verifier(self, root)
    }
}

/// Schema-less check: the table's vtable and inline extent are sound.
///
/// Referenced objects are not followed, since without a schema there is no
/// way to tell a reference from a scalar.
impl Verify for Table<'_> {
    fn run_verifier(verifier: &mut Verifier<'_>, pos: usize) -> Result<()> {
        verifier.verify_table_start(pos)?;
        verifier.end_table();
        Ok(())
    }
}

/// Verify a buffer, then read its root as `T`.
pub fn verify_root_as<'a, T>(buf: &'a [u8], options: VerifierOptions) -> Result<T>
where
    T: FlatTable<'a> + Verify,
{
    verify_root_with(Verifier::new(buf, options), None)
}

/// Verify a buffer carrying `identifier`, then read its root as `T`.
pub fn verify_root_as_with_identifier<'a, T>(
    buf: &'a [u8],
    identifier: &[u8; FILE_IDENTIFIER_LENGTH],
    options: VerifierOptions,
) -> Result<T>
where
    T: FlatTable<'a> + Verify,
{
    verify_root_with(Verifier::new(buf, options), Some(identifier))
}

/// Verify a size-prefixed buffer, then read its root as `T`.
pub fn verify_size_prefixed_root_as<'a, T>(buf: &'a [u8], options: VerifierOptions) -> Result<T>
where
    T: FlatTable<'a> + Verify,
{
    let body = strip_size_prefix(buf)?;
    verify_root_with(Verifier::with_base(body, SIZE_PREFIX_LENGTH, options), None)
}

fn verify_root_with<'a, T>(
    mut verifier: Verifier<'a>,
    identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
) -> Result<T>
where
    T: FlatTable<'a> + Verify,
{
    let buf = verifier.buf();
    if let Err(err) = verifier.verify_buffer::<T>(identifier) {
        debug!(len = buf.len(), error = %err, "buffer failed verification");
        return Err(err);
    }
    let root = deref_uoffset(buf, 0)?;
    Ok(T::from_table(Table::at(buf, root)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::slot_entry_position;
    use crate::{Builder, StringOffset};

    /// `{ 0: u32 id, 1: string name, 2: [u16] values, 3: [Node] children }`
    #[derive(Debug, Clone, Copy)]
    struct Node<'a>(Table<'a>);

    impl<'a> FlatTable<'a> for Node<'a> {
        fn from_table(table: Table<'a>) -> Self {
            Node(table)
        }

        fn table(&self) -> Table<'a> {
            self.0
        }
    }

    impl Verify for Node<'_> {
        fn run_verifier(v: &mut Verifier<'_>, pos: usize) -> Result<()> {
            let table = v.verify_table_start(pos)?;
            v.verify_field::<u32>(&table, 0)?;
            v.verify_string_field(&table, 1)?;
            v.verify_vector_field::<u16>(&table, 2)?;
            v.verify_vector_of_tables_field::<Node>(&table, 3)?;
            v.end_table();
            Ok(())
        }
    }

    fn node(builder: &mut Builder, id: u32, name: &str, children: &[crate::TableOffset]) -> crate::TableOffset {
        let name: StringOffset = builder.create_string(name);
        let values = builder.create_vector(&[1u16, 2, 3]);
        let children = builder.create_vector_of_offsets(children);
        builder.start_table();
        builder.push_slot(0, id, 0);
        builder.push_offset_slot(1, name);
        builder.push_offset_slot(2, values);
        builder.push_offset_slot(3, children);
        builder.end_table()
    }

    fn tree(depth: usize) -> Vec<u8> {
        let mut builder = Builder::new();
        let mut current = node(&mut builder, 0, "leaf", &[]);
        for i in 1..depth {
            current = node(&mut builder, i as u32, "inner", &[current]);
        }
        builder.finish_with_identifier(current, b"NODE");
        builder.into_vec()
    }

    #[test]
    fn test_valid_buffer_passes() {
        let buf = tree(3);
        let root: Node = verify_root_as(&buf, VerifierOptions::default()).unwrap();
        assert_eq!(root.table().get::<u32>(0, 0).unwrap(), 2);

        let root: Node =
            verify_root_as_with_identifier(&buf, b"NODE", VerifierOptions::default()).unwrap();
        assert_eq!(root.table().get_str(1).unwrap(), Some("inner"));
    }

    #[test]
    fn test_identifier_mismatch() {
        let buf = tree(1);
        let err = verify_root_as_with_identifier::<Node>(&buf, b"LEAF", VerifierOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::IdentifierMismatch { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let buf = tree(10);
        let options = VerifierOptions {
            max_depth: 5,
            ..VerifierOptions::default()
        };
        assert_eq!(
            verify_root_as::<Node>(&buf, options).unwrap_err(),
            Error::MalformedBuffer(Malformed::DepthLimit(5))
        );
        assert!(verify_root_as::<Node>(&buf, VerifierOptions::default()).is_ok());
    }

    #[test]
    fn test_table_limit() {
        let buf = tree(4);
        let options = VerifierOptions {
            max_tables: 3,
            ..VerifierOptions::default()
        };
        assert_eq!(
            verify_root_as::<Node>(&buf, options).unwrap_err(),
            Error::MalformedBuffer(Malformed::TableLimit(3))
        );
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let buf = tree(2);
        // the leaf name is written first, so it ends the buffer followed by
        // three padding bytes
        for len in 0..buf.len() - 3 {
            let result = verify_root_as::<Node>(&buf[..len], VerifierOptions::default());
            assert!(result.is_err(), "truncated to {len} bytes was accepted");
        }
    }

    #[test]
    fn test_missing_terminator() {
        let mut builder = Builder::new();
        let name = builder.create_string("abc");
        builder.start_table();
        builder.push_offset_slot(1, name);
        let root = builder.end_table();
        builder.finish(root);
        let mut buf = builder.into_vec();

        let table = crate::root_table(&buf).unwrap();
        let string = deref_uoffset(&buf, table.field_position(1).unwrap().unwrap()).unwrap();
        buf[string + SIZE_UOFFSET + 3] = b'!';

        assert!(matches!(
            verify_root_as::<Node>(&buf, VerifierOptions::default()),
            Err(Error::MalformedBuffer(Malformed::MissingTerminator { .. }))
        ));
    }

    #[test]
    fn test_field_outside_table() {
        let buf = tree(1);
        let table = crate::root_table(&buf).unwrap();
        let vtable = table.vtable().unwrap();
        let mut corrupt = buf.clone();
        let entry = vtable.loc() + slot_entry_position(0);
        corrupt[entry..entry + 2].copy_from_slice(&0x4000u16.to_le_bytes());

        assert!(matches!(
            verify_root_as::<Node>(&corrupt, VerifierOptions::default()),
            Err(Error::MalformedBuffer(Malformed::FieldOutOfTable { slot: 0, .. }))
        ));
    }

    #[test]
    fn test_required_field() {
        let buf = tree(1);
        let table = crate::root_table(&buf).unwrap();
        let mut verifier = Verifier::new(&buf, VerifierOptions::default());
        assert!(verifier.verify_required(&table, 1).is_ok());
        assert_eq!(
            verifier.verify_required(&table, 7),
            Err(Error::MissingRequiredField { slot: 7 })
        );
    }

    #[test]
    fn test_schemaless_table_check() {
        let buf = tree(2);
        let mut verifier = Verifier::new(&buf, VerifierOptions::default());
        assert!(verifier.verify_buffer::<Table>(Some(b"NODE")).is_ok());
        assert_eq!(verifier.num_tables(), 1);
    }

    /// `{ 0: f64 weight }`
    #[derive(Debug, Clone, Copy)]
    struct Weight<'a>(Table<'a>);

    impl<'a> FlatTable<'a> for Weight<'a> {
        fn from_table(table: Table<'a>) -> Self {
            Weight(table)
        }

        fn table(&self) -> Table<'a> {
            self.0
        }
    }

    impl Verify for Weight<'_> {
        fn run_verifier(v: &mut Verifier<'_>, pos: usize) -> Result<()> {
            let table = v.verify_table_start(pos)?;
            v.verify_field::<f64>(&table, 0)?;
            v.end_table();
            Ok(())
        }
    }

    #[test]
    fn test_size_prefixed_wide_field() {
        let mut builder = Builder::new();
        builder.start_table();
        builder.push_slot::<f64>(0, 1.5, 0.0);
        let root = builder.end_table();
        builder.finish_size_prefixed(root, None);
        let buf = builder.into_vec();

        let weight: Weight = verify_size_prefixed_root_as(&buf, VerifierOptions::default()).unwrap();
        assert_eq!(weight.table().get::<f64>(0, 0.0).unwrap(), 1.5);

        // the body alone is misaligned when checked from offset zero
        let body = strip_size_prefix(&buf).unwrap();
        assert!(matches!(
            verify_root_as::<Weight>(body, VerifierOptions::default()),
            Err(Error::MalformedBuffer(Malformed::Unaligned { alignment: 8, .. }))
        ));
    }
}
