//! Reference resolution against the common registry.
//!
//! Everywhere the document format expects an object, a bare string may stand
//! in for it; the string names an item registered in the `common` section
//! under the category implied by context. [`Reference`] models that choice as
//! a tagged union and resolution is a single exact-name lookup.
//!
//! Resolution is deliberately single-hop: whatever is stored under the name
//! is returned as-is, never chased further. The only recursion in the whole
//! system lives in the pattern expander, which re-enters resolution once per
//! `{placeholder}` it substitutes.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, WafError};

/// An inline object or the name of a common registry entry.
///
/// Deserialization is driven by shape alone: a string becomes [`Name`],
/// anything structured becomes [`Inline`].
///
/// [`Name`]: Reference::Name
/// [`Inline`]: Reference::Inline
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Name(String),
    Inline(T),
}

impl<T> Reference<T> {
    /// Resolves against `registry`, returning `None` for an unknown name.
    ///
    /// Callers decide whether absence is an error; the policy compiler
    /// treats a named-but-missing reference as fatal.
    pub fn resolve<'a>(&'a self, registry: &'a HashMap<String, T>) -> Option<&'a T> {
        match self {
            Reference::Inline(value) => Some(value),
            Reference::Name(name) => registry.get(name.as_str()),
        }
    }

    /// Resolves against `registry`, turning an unknown name into an
    /// [`UnresolvedReference`](WafError::UnresolvedReference) error carrying
    /// `category`.
    pub fn resolve_required<'a>(
        &'a self,
        registry: &'a HashMap<String, T>,
        category: &'static str,
    ) -> Result<&'a T> {
        self.resolve(registry)
            .ok_or_else(|| WafError::UnresolvedReference {
                category,
                name: match self {
                    Reference::Name(name) => name.clone(),
                    // Unreachable: an inline value always resolves.
                    Reference::Inline(_) => String::new(),
                },
            })
    }
}
