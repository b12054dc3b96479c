// src/blocks/mod.rs

// ============================================================================
// Submodules
// ============================================================================
// The header is the only fixed-size record. Parameter and group records are
// variable length and sized by their own `binary_size()`.

pub(crate) mod common;
mod group;
mod header;
mod parameter;

// Re-export common constants
pub use common::{BLOCK_SIZE, C3D_MAGIC, HEADER_SIZE, PROCESSOR_INTEL};

// Re-export record types
pub use group::Group;
pub use header::{Header, LONG_EVENT_LABELS_MAGIC};
pub use parameter::{
    ElementKind, MAX_DESC_LEN, MAX_NAME_LEN, ParamArray, ParamValue, Parameter,
};
