//! Back-to-front buffer builder.
//!
//! Objects are written from the end of the buffer towards the front, so a
//! parent is always written after (in front of) the children it references.
//! Positions handed out as [`Offset`]s are distances from the buffer end,
//! which stay valid when the buffer grows.
//!
//! # Example
//!
//! ```
//! use flatslot_codec::{root_table, Builder};
//!
//! let mut builder = Builder::new();
//! let name = builder.create_string("sky");
//!
//! builder.start_table();
//! builder.push_slot::<i32>(0, 255, 0);
//! builder.push_offset_slot(1, name);
//! let root = builder.end_table();
//! builder.finish(root);
//!
//! let table = root_table(builder.finished_data())?;
//! assert_eq!(table.get::<i32>(0, 0)?, 255);
//! assert_eq!(table.get_str(1)?, Some("sky"));
//! # Ok::<(), flatslot_codec::Error>(())
//! ```
//!
//! Misuse of the construction order (starting a table inside another,
//! ending a table twice, finishing twice) is a bug in the caller and panics.

use std::hash::BuildHasherDefault;

use byteorder::{ByteOrder, LittleEndian};
use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use tracing::{debug, trace};

use flatslot_common::align::padding_for;

use crate::follow::SIZE_UOFFSET;
use crate::table::{slot_entry_position, FILE_IDENTIFIER_LENGTH, VTABLE_HEADER_SIZE};
use crate::{
    BuilderOptions, FlatStruct, Offset, Scalar, StringOffset, TableOffset, VectorOffset,
};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Largest buffer the 32-bit offsets can address.
pub const MAX_BUFFER_SIZE: usize = (1 << 31) - 1;

/// Where a field of the open table was written.
#[derive(Debug, Clone, Copy)]
struct FieldLoc {
    slot: u16,
    offset: usize,
}

/// Builder for flat buffers.
#[derive(Debug)]
pub struct Builder {
    buf: Vec<u8>,
    head: usize,
    min_align: usize,
    options: BuilderOptions,

    // Open table state
    field_locs: Vec<FieldLoc>,
    table_start: Option<usize>,
    num_fields: Option<u16>,
    vector_open: bool,

    // Dedup pools, keyed by encoded bytes
    vtables: FxHashMap<Vec<u8>, u32>,
    shared_strings: FxHashMap<String, u32>,

    finished: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    /// Create a builder with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_options(BuilderOptions {
            initial_capacity: capacity,
            ..BuilderOptions::default()
        })
    }

    /// Create a builder with explicit options.
    pub fn with_options(options: BuilderOptions) -> Self {
        let capacity = options.initial_capacity.min(MAX_BUFFER_SIZE);
        Self {
            buf: vec![0; capacity],
            head: capacity,
            min_align: 1,
            options,
            field_locs: Vec::new(),
            table_start: None,
            num_fields: None,
            vector_open: false,
            vtables: FxHashMap::default(),
            shared_strings: FxHashMap::default(),
            finished: false,
        }
    }

    /// The options this builder was created with.
    #[inline]
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Forget everything written so far, keeping the allocation.
    pub fn reset(&mut self) {
        self.head = self.buf.len();
        self.min_align = 1;
        self.field_locs.clear();
        self.table_start = None;
        self.num_fields = None;
        self.vector_open = false;
        self.vtables.clear();
        self.shared_strings.clear();
        self.finished = false;
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn used_space(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Whether [`finish`](Self::finish) has been called.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ---- raw buffer management ----

    fn grow(&mut self, additional: usize) {
        let used = self.used_space();
        let needed = used
            .checked_add(additional)
            .filter(|&n| n <= MAX_BUFFER_SIZE)
            .unwrap_or_else(|| panic!("flat buffer cannot exceed {MAX_BUFFER_SIZE} bytes"));

        let mut new_len = self.buf.len().max(64);
        while new_len < needed {
            new_len *= 2;
        }
        let new_len = new_len.min(MAX_BUFFER_SIZE);

        let mut new_buf = vec![0u8; new_len];
        new_buf[new_len - used..].copy_from_slice(&self.buf[self.head..]);
        trace!(from = self.buf.len(), to = new_len, "growing builder buffer");
        self.buf = new_buf;
        self.head = new_len - used;
    }

    #[inline]
    fn ensure_capacity(&mut self, additional: usize) {
        if self.head < additional {
            self.grow(additional);
        }
    }

    #[inline]
    fn pad(&mut self, count: usize) {
        self.ensure_capacity(count);
        self.head -= count;
        self.buf[self.head..self.head + count].fill(0);
    }

    /// Pad so that, once `len` more bytes are written, the used space is a
    /// multiple of `alignment`.
    #[inline]
    fn align(&mut self, len: usize, alignment: usize) {
        self.min_align = self.min_align.max(alignment);
        let padding = padding_for(self.used_space() + len, alignment);
        self.ensure_capacity(padding + len);
        self.pad(padding);
    }

    #[inline]
    fn push_bytes_unaligned(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.head -= bytes.len();
        self.buf[self.head..self.head + bytes.len()].copy_from_slice(bytes);
    }

    fn push_scalar<T: Scalar>(&mut self, value: T) -> usize {
        self.align(T::SIZE, T::SIZE);
        self.ensure_capacity(T::SIZE);
        self.head -= T::SIZE;
        value.write_le(&mut self.buf[self.head..self.head + T::SIZE]);
        self.used_space()
    }

    fn push_uoffset(&mut self, target: u32) -> usize {
        self.align(SIZE_UOFFSET, SIZE_UOFFSET);
        let target = target as usize;
        assert!(
            target <= self.used_space(),
            "offset {target} does not refer to a finished object in this buffer"
        );
        let relative = self.used_space() + SIZE_UOFFSET - target;
        self.push_scalar(relative as u32)
    }

    fn push_struct<S: FlatStruct>(&mut self, value: &S) -> usize {
        let bytes = value.as_bytes();
        self.align(bytes.len(), S::ALIGNMENT);
        self.push_bytes_unaligned(bytes);
        self.used_space()
    }

    fn assert_not_nested(&self, operation: &str) {
        assert!(
            self.table_start.is_none(),
            "{operation} called while a table is under construction"
        );
        assert!(
            !self.vector_open,
            "{operation} called while a vector is under construction"
        );
    }

    fn assert_not_finished(&self, operation: &str) {
        assert!(
            !self.finished,
            "{operation} called on a finished buffer; call reset() first"
        );
    }

    fn assert_in_table(&self, operation: &str) {
        assert!(
            self.table_start.is_some(),
            "{operation} called outside of start_table/end_table"
        );
    }

    // ---- tables ----

    /// Begin a table.
    ///
    /// The slot count is implied by the highest slot written, so any slot
    /// that fits the 16-bit vtable is accepted. Use
    /// [`start_table_with`](Self::start_table_with) to bound it.
    ///
    /// # Panics
    ///
    /// If a table or vector is already open, or the buffer is finished.
    pub fn start_table(&mut self) {
        self.open_table("start_table", None);
    }

    /// Begin a table declaring `num_fields` slots.
    ///
    /// # Panics
    ///
    /// As [`start_table`](Self::start_table), and later when a field is
    /// added at a slot `>= num_fields`.
    pub fn start_table_with(&mut self, num_fields: u16) {
        self.open_table("start_table_with", Some(num_fields));
    }

    fn open_table(&mut self, operation: &str, num_fields: Option<u16>) {
        self.assert_not_finished(operation);
        self.assert_not_nested(operation);
        self.field_locs.clear();
        self.num_fields = num_fields;
        self.table_start = Some(self.used_space());
    }

    fn track_field(&mut self, slot: u16, offset: usize) {
        if let Some(num_fields) = self.num_fields {
            assert!(
                slot < num_fields,
                "slot {slot} is outside a table declared with {num_fields} fields"
            );
        }
        self.field_locs.push(FieldLoc { slot, offset });
    }

    /// Add a scalar field, eliding it when it equals `default`.
    ///
    /// An elided field reads back as `default`, and the buffer is identical
    /// to one where the field was never added.
    pub fn push_slot<T: Scalar>(&mut self, slot: u16, value: T, default: T) {
        self.assert_in_table("push_slot");
        if value == default && !self.options.force_defaults {
            return;
        }
        self.push_slot_always(slot, value);
    }

    /// Add a scalar field even if it equals the schema default.
    pub fn push_slot_always<T: Scalar>(&mut self, slot: u16, value: T) {
        self.assert_in_table("push_slot_always");
        let offset = self.push_scalar(value);
        self.track_field(slot, offset);
    }

    /// Add a reference to a finished string, vector or table.
    pub fn push_offset_slot<T>(&mut self, slot: u16, target: Offset<T>) {
        self.assert_in_table("push_offset_slot");
        let offset = self.push_uoffset(target.value());
        self.track_field(slot, offset);
    }

    /// Add an inline struct field.
    pub fn push_struct_slot<S: FlatStruct>(&mut self, slot: u16, value: &S) {
        self.assert_in_table("push_struct_slot");
        let offset = self.push_struct(value);
        self.track_field(slot, offset);
    }

    /// Finish the open table and return its offset.
    ///
    /// Trailing absent slots are dropped from the vtable, and an identical
    /// vtable written earlier is reused when `dedup_vtables` is set.
    ///
    /// # Panics
    ///
    /// If no table is open.
    pub fn end_table(&mut self) -> TableOffset {
        let Some(table_start) = self.table_start else {
            panic!("end_table called without a matching start_table");
        };

        // soffset placeholder, patched once the vtable position is known
        let object_offset = self.push_scalar::<i32>(0);
        let table_len = object_offset - table_start;
        assert!(
            table_len <= u16::MAX as usize,
            "table inline data of {table_len} bytes exceeds the 16-bit vtable range"
        );

        let num_slots = self
            .field_locs
            .iter()
            .map(|field| field.slot as usize + 1)
            .max()
            .unwrap_or(0);
        let vtable_len = VTABLE_HEADER_SIZE + 2 * num_slots;
        assert!(
            vtable_len <= u16::MAX as usize,
            "vtable with {num_slots} slots exceeds the 16-bit vtable range"
        );

        let mut vtable = vec![0u8; vtable_len];
        LittleEndian::write_u16(&mut vtable[0..2], vtable_len as u16);
        LittleEndian::write_u16(&mut vtable[2..4], table_len as u16);
        for field in &self.field_locs {
            let entry = slot_entry_position(field.slot);
            let relative = object_offset - field.offset;
            LittleEndian::write_u16(&mut vtable[entry..entry + 2], relative as u16);
        }

        let existing = if self.options.dedup_vtables {
            self.vtables.get(&vtable).copied()
        } else {
            None
        };
        let vtable_offset = match existing {
            Some(offset) => {
                trace!(offset, len = vtable_len, "reusing vtable");
                offset as usize
            }
            None => {
                self.align(vtable_len, 2);
                self.push_bytes_unaligned(&vtable);
                let offset = self.used_space();
                if self.options.dedup_vtables {
                    self.vtables.insert(vtable, offset as u32);
                }
                offset
            }
        };

        // vtable = table - soffset
        let table_pos = self.buf.len() - object_offset;
        let soffset = vtable_offset as i64 - object_offset as i64;
        LittleEndian::write_i32(&mut self.buf[table_pos..table_pos + 4], soffset as i32);

        self.table_start = None;
        self.num_fields = None;
        self.field_locs.clear();
        Offset::new(object_offset as u32)
    }

    /// Assert that a finished table has a value in `slot`.
    ///
    /// # Panics
    ///
    /// If the field is absent.
    pub fn required<T>(&self, table: Offset<T>, slot: u16) {
        let table_pos = self.buf.len() - table.value() as usize;
        let soffset = LittleEndian::read_i32(&self.buf[table_pos..table_pos + 4]);
        let vtable_pos = (table_pos as i64 - soffset as i64) as usize;
        let vtable_len = LittleEndian::read_u16(&self.buf[vtable_pos..vtable_pos + 2]) as usize;
        let entry = slot_entry_position(slot);
        let present = entry < vtable_len
            && LittleEndian::read_u16(&self.buf[vtable_pos + entry..vtable_pos + entry + 2]) != 0;
        assert!(present, "required field in slot {slot} was not set");
    }

    // ---- vectors ----

    /// Begin a vector of `num_elems` elements of `elem_size` bytes each.
    ///
    /// Elements must then be pushed in reverse order, followed by
    /// [`end_vector`](Self::end_vector).
    pub fn start_vector(&mut self, elem_size: usize, num_elems: usize, alignment: usize) {
        self.assert_not_finished("start_vector");
        self.assert_not_nested("start_vector");
        self.vector_open = true;
        let len = elem_size
            .checked_mul(num_elems)
            .unwrap_or_else(|| panic!("vector of {num_elems} elements overflows"));
        self.align(len, SIZE_UOFFSET.max(alignment));
    }

    /// Push one scalar, e.g. a vector element.
    pub fn push<T: Scalar>(&mut self, value: T) {
        self.push_scalar(value);
    }

    /// Push one reference, e.g. an element of a vector of tables.
    pub fn push_offset<T>(&mut self, target: Offset<T>) {
        self.push_uoffset(target.value());
    }

    /// Finish the open vector by writing its element count.
    ///
    /// # Panics
    ///
    /// If no vector is open.
    pub fn end_vector<T>(&mut self, num_elems: usize) -> VectorOffset<T> {
        assert!(
            self.vector_open,
            "end_vector called without a matching start_vector"
        );
        self.vector_open = false;
        let offset = self.push_scalar(num_elems as u32);
        Offset::new(offset as u32)
    }

    /// Write a vector of scalars.
    pub fn create_vector<T: Scalar>(&mut self, items: &[T]) -> VectorOffset<T> {
        self.start_vector(T::SIZE, items.len(), T::SIZE);
        for &item in items.iter().rev() {
            self.push_scalar(item);
        }
        self.end_vector(items.len())
    }

    /// Write a vector of bytes.
    pub fn create_byte_vector(&mut self, bytes: &[u8]) -> VectorOffset<u8> {
        self.start_vector(1, bytes.len(), 1);
        self.push_bytes_unaligned(bytes);
        self.end_vector(bytes.len())
    }

    /// Write a vector of inline structs.
    pub fn create_vector_of_structs<S: FlatStruct>(&mut self, items: &[S]) -> VectorOffset<S> {
        self.start_vector(std::mem::size_of::<S>(), items.len(), S::ALIGNMENT);
        for item in items.iter().rev() {
            self.push_bytes_unaligned(item.as_bytes());
        }
        self.end_vector(items.len())
    }

    /// Write a vector of references to finished strings or tables.
    pub fn create_vector_of_offsets<T: 'static>(&mut self, items: &[Offset<T>]) -> VectorOffset<T> {
        self.start_vector(SIZE_UOFFSET, items.len(), SIZE_UOFFSET);
        for &item in items.iter().rev() {
            self.push_uoffset(item.value());
        }
        self.end_vector(items.len())
    }

    /// Write a vector of strings.
    pub fn create_vector_of_strings(&mut self, items: &[&str]) -> VectorOffset<&'static str> {
        let offsets: Vec<StringOffset> = items.iter().map(|s| self.create_string(s)).collect();
        self.create_vector_of_offsets(&offsets)
    }

    // ---- strings ----

    /// Write a NUL-terminated, length-prefixed string.
    ///
    /// # Panics
    ///
    /// If a table or vector is open.
    pub fn create_string(&mut self, value: &str) -> StringOffset {
        self.assert_not_finished("create_string");
        self.assert_not_nested("create_string");
        self.push_string_bytes(value.as_bytes())
    }

    /// Write raw bytes in string layout, without requiring UTF-8.
    pub fn create_byte_string(&mut self, bytes: &[u8]) -> VectorOffset<u8> {
        self.assert_not_finished("create_byte_string");
        self.assert_not_nested("create_byte_string");
        self.push_string_bytes(bytes).cast()
    }

    fn push_string_bytes(&mut self, bytes: &[u8]) -> StringOffset {
        self.align(bytes.len() + 1, SIZE_UOFFSET);
        self.push_bytes_unaligned(&[0]);
        self.push_bytes_unaligned(bytes);
        let offset = self.push_scalar(bytes.len() as u32);
        Offset::new(offset as u32)
    }

    /// Write a string, reusing an identical one written earlier.
    pub fn create_shared_string(&mut self, value: &str) -> StringOffset {
        self.assert_not_finished("create_shared_string");
        self.assert_not_nested("create_shared_string");
        if let Some(&offset) = self.shared_strings.get(value) {
            return Offset::new(offset);
        }
        let offset = self.create_string(value);
        self.shared_strings.insert(value.to_owned(), offset.value());
        offset
    }

    // ---- finishing ----

    /// Write the root reference and seal the buffer.
    ///
    /// # Panics
    ///
    /// If the buffer is already finished or a table/vector is open.
    pub fn finish<T>(&mut self, root: Offset<T>) {
        self.finish_with(root.value(), None, false);
    }

    /// Like [`finish`](Self::finish), also storing a file identifier after
    /// the root reference.
    pub fn finish_with_identifier<T>(
        &mut self,
        root: Offset<T>,
        identifier: &[u8; FILE_IDENTIFIER_LENGTH],
    ) {
        self.finish_with(root.value(), Some(identifier), false);
    }

    /// Like [`finish`](Self::finish), prefixing the buffer with its length.
    pub fn finish_size_prefixed<T>(
        &mut self,
        root: Offset<T>,
        identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    ) {
        self.finish_with(root.value(), identifier, true);
    }

    fn finish_with(
        &mut self,
        root: u32,
        identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
        size_prefixed: bool,
    ) {
        self.assert_not_finished("finish");
        self.assert_not_nested("finish");

        let identifier_len = identifier.map_or(0, |_| FILE_IDENTIFIER_LENGTH);
        let prefix_len = if size_prefixed { SIZE_UOFFSET } else { 0 };
        let alignment = self.min_align.max(SIZE_UOFFSET);
        self.align(SIZE_UOFFSET + identifier_len + prefix_len, alignment);

        if let Some(identifier) = identifier {
            self.push_bytes_unaligned(identifier);
        }
        self.push_uoffset(root);
        if size_prefixed {
            let size = self.used_space() as u32;
            self.push_scalar(size);
        }

        self.finished = true;
        debug!(
            size = self.used_space(),
            vtables = self.vtables.len(),
            shared_strings = self.shared_strings.len(),
            "finished flat buffer"
        );
    }

    /// The finished buffer.
    ///
    /// # Panics
    ///
    /// If [`finish`](Self::finish) has not been called.
    pub fn finished_data(&self) -> &[u8] {
        assert!(self.finished, "finished_data called before finish");
        &self.buf[self.head..]
    }

    /// Take the finished buffer out of the builder.
    ///
    /// # Panics
    ///
    /// If [`finish`](Self::finish) has not been called.
    pub fn into_vec(self) -> Vec<u8> {
        assert!(self.finished, "into_vec called before finish");
        let head = self.head;
        let mut buf = self.buf;
        buf.drain(..head);
        buf
    }
}
