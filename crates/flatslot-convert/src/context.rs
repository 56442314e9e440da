//! Type-name keyed converter registry.

use std::fmt;
use std::hash::BuildHasherDefault;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use tracing::{debug, trace};

use flatslot_codec::{Builder, BuilderOptions, Offset};

use crate::object_data::{create_object_data, ObjectData};
use crate::{builtin, Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// A converter: turns JSON input into a finished flat buffer.
pub type ConvertFn = dyn Fn(&ConvertContext, &serde_json::Value) -> Result<Vec<u8>> + Send + Sync;

/// Registry mapping type names to converters.
///
/// Converters receive the context itself, so they can dispatch nested
/// objects back through [`convert_object`](Self::convert_object).
///
/// # Example
///
/// ```
/// use flatslot_convert::ConvertContext;
/// use serde_json::json;
///
/// let ctx = ConvertContext::with_builtins();
/// let buf = ctx.convert_to_buffer("ClearColorInt", &json!({"red": 255, "alpha": 255}))?;
/// assert!(!buf.is_empty());
/// # Ok::<(), flatslot_convert::Error>(())
/// ```
pub struct ConvertContext {
    converters: FxHashMap<String, Box<ConvertFn>>,
    builder_options: BuilderOptions,
}

impl Default for ConvertContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConvertContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertContext")
            .field("types", &self.type_names())
            .field("builder_options", &self.builder_options)
            .finish()
    }
}

impl ConvertContext {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            converters: FxHashMap::default(),
            builder_options: BuilderOptions::default(),
        }
    }

    /// A registry with the builtin record types registered.
    pub fn with_builtins() -> Self {
        let mut ctx = Self::new();
        for &(name, convert) in builtin::BUILTINS {
            // distinct names into an empty registry
            let _ = ctx.register(name, convert);
        }
        ctx
    }

    /// Options used by converters for the builders they create.
    #[inline]
    pub fn builder_options(&self) -> &BuilderOptions {
        &self.builder_options
    }

    /// Replace the builder options handed to converters.
    pub fn set_builder_options(&mut self, options: BuilderOptions) {
        self.builder_options = options;
    }

    /// Register a converter under `type_name`.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the name is taken; the
    /// existing converter is kept.
    pub fn register<F>(&mut self, type_name: &str, convert: F) -> Result<()>
    where
        F: Fn(&ConvertContext, &serde_json::Value) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        if self.converters.contains_key(type_name) {
            return Err(Error::DuplicateRegistration(type_name.to_owned()));
        }
        debug!(type_name, "registered converter");
        self.converters
            .insert(type_name.to_owned(), Box::new(convert));
        Ok(())
    }

    /// Whether a converter is registered under `type_name`.
    #[inline]
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.converters.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.converters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the converter registered under `type_name`.
    pub fn convert(&self, type_name: &str, input: &serde_json::Value) -> Result<Vec<u8>> {
        let convert = self
            .converters
            .get(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_owned()))?;
        let bytes = convert(self, input)?;
        trace!(type_name, len = bytes.len(), "converted");
        Ok(bytes)
    }

    /// Convert `input` and wrap the result in an `ObjectData` table inside
    /// `builder`.
    ///
    /// Nothing is written to `builder` when the conversion fails.
    pub fn convert_object(
        &self,
        builder: &mut Builder,
        type_name: &str,
        input: &serde_json::Value,
    ) -> Result<Offset<ObjectData<'static>>> {
        let bytes = self.convert(type_name, input)?;
        Ok(create_object_data(builder, type_name, &bytes))
    }

    /// Convert `input` into a finished buffer whose root is an `ObjectData`.
    pub fn convert_to_buffer(&self, type_name: &str, input: &serde_json::Value) -> Result<Vec<u8>> {
        let mut builder = Builder::with_options(self.builder_options);
        let object = self.convert_object(&mut builder, type_name, input)?;
        builder.finish(object);
        Ok(builder.into_vec())
    }

    /// Convert many `(type_name, input)` pairs in parallel.
    ///
    /// Results come back in input order.
    #[cfg(feature = "parallel")]
    pub fn convert_many<S>(&self, items: &[(S, serde_json::Value)]) -> Vec<Result<Vec<u8>>>
    where
        S: AsRef<str> + Sync,
    {
        use rayon::prelude::*;

        items
            .par_iter()
            .map(|(type_name, input)| self.convert_to_buffer(type_name.as_ref(), input))
            .collect()
    }
}
