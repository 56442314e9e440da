//! Flat binary table codec.
//!
//! Buffers are little-endian and built from four kinds of objects:
//!
//! - **Tables**: records whose fields are located through a shared
//!   field-offset table (vtable); absent fields cost no space and read back
//!   as their default.
//! - **Structs**: fixed-layout aggregates stored inline.
//! - **Strings**: length-prefixed, NUL-terminated UTF-8.
//! - **Vectors**: length-prefixed runs of fixed-stride elements.
//!
//! A buffer starts with a `u32` offset to its root table, optionally followed
//! by a 4-byte file identifier.
//!
//! # Quick Start
//!
//! ```
//! use flatslot_codec::{root_table, Builder};
//!
//! let mut builder = Builder::new();
//! let numbers = builder.create_vector(&[1u16, 2, 3]);
//! builder.start_table();
//! builder.push_slot::<u32>(0, 42, 0);
//! builder.push_offset_slot(1, numbers);
//! let root = builder.end_table();
//! builder.finish(root);
//!
//! let table = root_table(builder.finished_data())?;
//! assert_eq!(table.get::<u32>(0, 0)?, 42);
//! assert_eq!(table.vector_element::<u16>(1, 2)?, 3);
//! # Ok::<(), flatslot_codec::Error>(())
//! ```
//!
//! # Untrusted Input
//!
//! Every accessor is bounds-checked and returns
//! [`Error::MalformedBuffer`] instead of panicking. For input from outside
//! the process, run the [`Verifier`] first (see [`verify_root_as`]) so the
//! whole buffer is checked once up front.

mod builder;
mod error;
mod flat_struct;
mod follow;
mod offset;
mod options;
mod scalar;
mod table;
mod vector;
mod verifier;

pub use builder::{Builder, MAX_BUFFER_SIZE};
pub use error::{Error, Malformed, Result};
pub use flat_struct::{read_struct, FlatStruct};
pub use follow::{deref_uoffset, read_str, Follow, SIZE_UOFFSET};
pub use offset::{Offset, StringOffset, TableOffset, VectorOffset};
pub use options::{BuilderOptions, VerifierOptions};
pub use scalar::Scalar;
pub use table::{
    buffer_has_identifier, root_as, root_table, root_table_with_identifier,
    size_prefixed_root_table, slot_entry_position, strip_size_prefix, FlatTable, Table, VTable,
    FILE_IDENTIFIER_LENGTH, SIZE_PREFIX_LENGTH, VTABLE_HEADER_SIZE,
};
pub use vector::{Vector, VectorIter};
pub use verifier::{
    verify_root_as, verify_root_as_with_identifier, verify_size_prefixed_root_as, Verifier, Verify,
};
