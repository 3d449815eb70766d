//! Utilities
//!
//! Small types used throughout the crate.

mod span;

pub use span::Span;
