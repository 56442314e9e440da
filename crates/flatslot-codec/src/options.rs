//! Builder and verifier configuration.

/// Options controlling how a [`Builder`](crate::Builder) lays out buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BuilderOptions {
    /// Bytes reserved up front.
    pub initial_capacity: usize,
    /// Write scalar fields even when they equal their default.
    pub force_defaults: bool,
    /// Share identical vtables between tables.
    pub dedup_vtables: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            force_defaults: false,
            dedup_vtables: true,
        }
    }
}

/// Limits applied by the [`Verifier`](crate::Verifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VerifierOptions {
    /// Maximum table nesting depth.
    pub max_depth: usize,
    /// Maximum number of tables visited.
    pub max_tables: usize,
    /// Reject values that are not naturally aligned.
    pub check_alignment: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_tables: 1_000_000,
            check_alignment: true,
        }
    }
}
