//! Error types for style resolution.
//!
//! Data-quality problems (unreachable stylesheets, malformed CSS, selectors we
//! cannot match) are logged and degraded locally. Only contract violations
//! and the unimplemented `marker` shorthand surface as `StyleError`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StyleError>;

#[derive(Error, Debug)]
pub enum StyleError {
    /// A stylesheet resource could not be fetched.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Stylesheet bytes could not be decoded into text.
    #[error("cannot decode stylesheet {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("invalid URL {0:?}")]
    InvalidUrl(String),

    /// An `@import` chain revisits a URL it is already loading.
    #[error("import cycle through {0}")]
    ImportCycle(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("index {index} is out of range for {len} rules")]
    IndexSize { index: usize, len: usize },

    /// Inserting here would put an `@import` after another rule, or a rule before an `@import`.
    #[error("rule cannot be inserted at index {index}")]
    MisplacedRule { index: usize },

    #[error("rule is not a grouping rule")]
    NotGroupingRule,

    /// Priorities are either `""` or `"important"`.
    #[error("invalid priority {0:?}")]
    InvalidPriority(String),

    #[error("invalid property name {0:?}")]
    InvalidPropertyName(String),

    #[error("node is not a child of the given parent")]
    NotAChild,

    #[error("node is not an element")]
    NotAnElement,

    /// The shorthand is recognized but has no expansion yet.
    #[error("shorthand property {0:?} is not supported")]
    UnsupportedShorthand(String),
}
