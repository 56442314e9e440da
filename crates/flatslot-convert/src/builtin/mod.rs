//! Converters for the record types every registry starts with.

pub mod clear_color;
pub mod vertex_format;

use crate::{ConvertContext, Result};

type Builtin = (
    &'static str,
    fn(&ConvertContext, &serde_json::Value) -> Result<Vec<u8>>,
);

/// Registered by [`ConvertContext::with_builtins`].
pub(crate) const BUILTINS: &[Builtin] = &[
    (clear_color::TYPE_NAME, clear_color::convert),
    (vertex_format::TYPE_NAME, vertex_format::convert),
];
