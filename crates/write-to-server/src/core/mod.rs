//! Value types shared by the mapping, buffer and driver layers.
//!
//! - [`value`]: SQL values produced by entity accessors, with type hints for NULL

pub mod value;

pub use value::{SqlType, SqlValue};
