//! CSS style resolution for SVG documents.
//!
//! Parses stylesheets from `<style>`, `<link>` and `<?xml-stylesheet?>`
//! sources, runs the cascade against an [`Environment`] snapshot and
//! produces inherited and computed values per element.

pub mod dom;
pub mod error;
pub mod loader;
pub mod parser;
pub mod style;
pub mod svgstyle_generate;

pub use dom::dom_tree::{Document, NodeRef};
pub use error::{Result, StyleError};
pub use loader::{DefaultLoader, MemoryLoader, ResourceLoader};
pub use style::media::{Environment, MediaType};
pub use style::resolver::{ComputedStyle, StyleContext};
pub use style::values::StyleValue;
