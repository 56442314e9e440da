//! Common utilities for flatslot.
//!
//! This crate provides the foundational pieces shared by the flatslot crates:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reads from byte slices
//! - [`align`] - Padding and alignment arithmetic shared by writer and verifier

mod error;
mod reader;

pub mod align;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};
