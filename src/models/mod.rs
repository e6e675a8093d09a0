//! Data models for the roster service.
//!
//! Field names serialize in camelCase to match the view layer's JSON contract.

mod draft;
mod member;

pub use draft::*;
pub use member::*;
