//! Conversion registry for flatslot buffers.
//!
//! A [`ConvertContext`] maps type names to converter functions. Each
//! converter turns a JSON description into a finished flat buffer; the
//! context can then wrap that buffer in an [`ObjectData`] envelope so
//! heterogeneous objects can be stored side by side and dispatched on their
//! type name when read back.
//!
//! # Example
//!
//! ```
//! use flatslot_codec::{verify_root_as, VerifierOptions};
//! use flatslot_convert::{ConvertContext, ObjectData};
//! use serde_json::json;
//!
//! let mut ctx = ConvertContext::with_builtins();
//! ctx.register("Raw", |_: &ConvertContext, input: &serde_json::Value| {
//!     Ok(serde_json::to_vec(input)?)
//! })?;
//!
//! let buf = ctx.convert_to_buffer("Raw", &json!({"x": 1}))?;
//! let object: ObjectData = verify_root_as(&buf, VerifierOptions::default())?;
//! assert_eq!(object.type_name()?, Some("Raw"));
//! # Ok::<(), flatslot_convert::Error>(())
//! ```

mod context;
mod error;
mod object_data;

pub mod builtin;

pub use context::{ConvertContext, ConvertFn};
pub use error::{Error, Result};
pub use object_data::{create_object_data, ObjectData, SLOT_DATA, SLOT_TYPE};
