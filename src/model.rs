//! Data model for the allow-list document.
//!
//! Everything here is an immutable view of one parsed configuration tree.
//! The compiler never mutates these values; resolution and expansion read
//! from the [`CommonRegistry`] built once at load time.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::GlobalOptions;
use crate::error::Result;
use crate::resolver::Reference;

/// A regex fragment that may still contain `{name}` placeholders, or an
/// ordered list of literal strings to be alternated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PatternFragment {
    Regex(String),
    Literals(Vec<String>),
}

/// One allowed argument, header, or cookie.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemDescriptor {
    pub name: String,
    pub pattern: PatternFragment,
    /// When true, absence of the item is itself a rejection condition.
    #[serde(default)]
    pub mandatory: bool,
    /// Overrides the global rejection status for this item's checks.
    #[serde(default)]
    pub status: Option<u16>,
}

/// Ordered set of descriptors; order becomes emission order.
pub type ItemSet = Vec<Reference<ItemDescriptor>>;

/// A common `method` entry: one method token or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MethodList {
    One(String),
    Many(Vec<String>),
}

/// The checks attached to a URI entry.
///
/// An absent key means "do not check this dimension"; an explicitly empty
/// sequence means "this dimension must be empty" (for `arg`, the query
/// string is rewritten to nothing).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub method: Option<Vec<String>>,
    pub arg: Option<Reference<ItemSet>>,
    pub header: Option<Reference<ItemSet>>,
    pub cookie: Option<Reference<ItemSet>>,
}

/// One allowed URI pattern with its policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UriEntry {
    pub pattern: PatternFragment,
    #[serde(default)]
    pub policy: Option<Reference<Policy>>,
}

/// The kind of request item a descriptor describes.
///
/// Arguments, headers, and cookies share descriptor shape and check logic;
/// this enum parameterizes the shared code over the category, including
/// which registry maps a bare name resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Arg,
    Header,
    Cookie,
}

impl ItemKind {
    /// Registry category for a single descriptor of this kind.
    pub fn category(self) -> &'static str {
        match self {
            ItemKind::Arg => "arg",
            ItemKind::Header => "header",
            ItemKind::Cookie => "cookie",
        }
    }

    /// Registry category for a set of descriptors of this kind.
    pub fn set_category(self) -> &'static str {
        match self {
            ItemKind::Arg => "argset",
            ItemKind::Header => "headerset",
            ItemKind::Cookie => "cookieset",
        }
    }
}

/// The `common` section: independent name-to-item maps, one per category.
///
/// Categories are separate namespaces; a pattern named `id` and a cookie
/// named `id` do not collide.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommonRegistry {
    pub pattern: HashMap<String, PatternFragment>,
    pub policy: HashMap<String, Policy>,
    pub method: HashMap<String, MethodList>,
    pub arg: HashMap<String, ItemDescriptor>,
    pub argset: HashMap<String, ItemSet>,
    pub header: HashMap<String, ItemDescriptor>,
    pub headerset: HashMap<String, ItemSet>,
    pub cookie: HashMap<String, ItemDescriptor>,
    pub cookieset: HashMap<String, ItemSet>,
}

impl CommonRegistry {
    /// Descriptor registry for `kind`.
    pub fn descriptors(&self, kind: ItemKind) -> &HashMap<String, ItemDescriptor> {
        match kind {
            ItemKind::Arg => &self.arg,
            ItemKind::Header => &self.header,
            ItemKind::Cookie => &self.cookie,
        }
    }

    /// Descriptor-set registry for `kind`.
    pub fn descriptor_sets(&self, kind: ItemKind) -> &HashMap<String, ItemSet> {
        match kind {
            ItemKind::Arg => &self.argset,
            ItemKind::Header => &self.headerset,
            ItemKind::Cookie => &self.cookieset,
        }
    }
}

/// A fully parsed allow-list document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    /// Allowed URI entries, in declaration order. Order is significant for
    /// entries that compile to pattern-match rules.
    #[serde(default)]
    pub uri: Vec<UriEntry>,
    #[serde(default)]
    pub common: CommonRegistry,
    #[serde(flatten)]
    pub options: GlobalOptions,
}

impl Document {
    /// Parses a document from YAML text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wafgen::Document;
    ///
    /// let doc = Document::from_yaml_str("uri:\n  - pattern: /status\n")?;
    /// assert_eq!(doc.uri.len(), 1);
    /// assert_eq!(doc.options.prefix, "/waf");
    /// # Ok::<(), wafgen::WafError>(())
    /// ```
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parses a document from JSON text. The two formats describe the same
    /// object tree; JSON is accepted for callers that already have one.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
