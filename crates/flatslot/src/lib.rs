//! Flatslot - flat binary tables with zero-copy field access.
//!
//! This crate provides a unified interface to the flatslot crates.
//!
//! # Crates
//!
//! - [`flatslot_common`] - Common utilities (bounds-checked reads, alignment)
//! - [`flatslot_codec`] - Buffer builder, zero-copy reader and verifier
//! - [`flatslot_convert`] - Type-name keyed conversion registry and `ObjectData` envelope
//!
//! # Example
//!
//! ```
//! use flatslot::prelude::*;
//!
//! let mut builder = Builder::new();
//! let name = builder.create_string("sky");
//! builder.start_table();
//! builder.push_slot::<i32>(0, 255, 0);
//! builder.push_offset_slot(1, name);
//! let root = builder.end_table();
//! builder.finish(root);
//!
//! let table = root_table(builder.finished_data())?;
//! assert_eq!(table.get::<i32>(0, 0)?, 255);
//! assert_eq!(table.get_str(1)?, Some("sky"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use flatslot_codec as codec;
pub use flatslot_common as common;
pub use flatslot_convert as convert;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use flatslot_codec::{
        root_as, root_table, verify_root_as, Builder, BuilderOptions, FlatStruct, FlatTable,
        Follow, Offset, Table, Vector, Verifier, VerifierOptions, Verify,
    };
    pub use flatslot_common::BinaryReader;
    pub use flatslot_convert::{ConvertContext, ObjectData};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use serde_json::json;

    #[test]
    fn test_prelude_round_trip() {
        let ctx = ConvertContext::with_builtins();
        let buf = ctx
            .convert_to_buffer("VertexFormat", &json!({"instanced": true}))
            .unwrap();
        let object: ObjectData = verify_root_as(&buf, VerifierOptions::default()).unwrap();
        let payload = object.nested_root().unwrap().unwrap();
        assert!(payload.get::<bool>(1, false).unwrap());
    }

    #[test]
    fn test_convert_many_keeps_order() {
        let ctx = ConvertContext::with_builtins();
        let items = vec![
            ("ClearColorInt", json!({"red": 1})),
            ("Missing", json!({})),
            ("VertexFormat", json!({})),
        ];
        let results = ctx.convert_many(&items);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(flatslot_convert::Error::UnknownType(_))
        ));
        assert!(results[2].is_ok());
    }
}
