//! Error types for the wafgen crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WafError>;

/// Errors raised while compiling an allow-list document.
///
/// Every variant is fatal: compilation aborts before any directive is
/// produced, so callers never see a partial configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WafError {
    /// The pattern expansion depth ceiling was reached, which means a
    /// common pattern refers to itself through one or more `{name}`
    /// placeholders.
    #[error("cyclic pattern reference detected while expanding `{{{pattern}}}`")]
    CyclicPattern { pattern: String },

    /// A bare name was used where an object is expected, but nothing is
    /// registered under that name in the `common` section.
    #[error("unresolved {category} reference: `{name}`")]
    UnresolvedReference {
        category: &'static str,
        name: String,
    },

    /// The input document could not be deserialized.
    #[error("malformed configuration document: {0}")]
    Document(String),
}

impl From<serde_yaml::Error> for WafError {
    fn from(err: serde_yaml::Error) -> Self {
        WafError::Document(err.to_string())
    }
}

impl From<serde_json::Error> for WafError {
    fn from(err: serde_json::Error) -> Self {
        WafError::Document(err.to_string())
    }
}
