#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can name the identity type's traits
// via `quill_tonic_core::ferroid`
pub use ferroid;
