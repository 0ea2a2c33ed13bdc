//! # wafgen
//!
//! A positive-security allow-list compiler for HTTP reverse proxies.
//!
//! wafgen takes a declarative YAML (or JSON) description of the request
//! surface an application accepts — allowed URI patterns, methods, query
//! arguments, headers, and cookies — and compiles it into a sequence of
//! rewrite-module directives that enforce the allow-list at the edge:
//! everything not explicitly declared is rejected before it reaches the
//! application.
//!
//! The interesting part is the pattern language: regex fragments may embed
//! `{name}` placeholders referencing reusable common patterns, which are
//! expanded recursively with cycle protection and precedence-preserving
//! grouping. Descriptors, descriptor sets, and whole policies can likewise
//! be registered under a name and composed by reference.
//!
//! ## Quick Start
//!
//! ```rust
//! use wafgen::Document;
//!
//! let doc = Document::from_yaml_str(r#"
//! common:
//!   pattern:
//!     id: "[0-9]+"
//! uri:
//!   - pattern: /index.html
//!     policy: {}
//!   - pattern: "/articles/{id}"
//!     policy:
//!       method: [GET]
//! "#)?;
//!
//! let lines = wafgen::compile(&doc)?;
//! assert!(lines.contains(&"location = /waf/index.html {".to_string()));
//! assert!(lines.contains(&"location ~ \"^/waf/articles/(?:[0-9]+)$\" {".to_string()));
//! # Ok::<(), wafgen::WafError>(())
//! ```
//!
//! The compiler is a pure, synchronous transform: one document in, one
//! ordered sequence of directive lines out. Reading the document and
//! writing the output belong to the caller.

pub mod classify;
pub mod compiler;
pub mod config;
pub mod error;
pub mod expand;
pub mod model;
pub mod resolver;

pub use compiler::{compile, Compiler};
pub use config::GlobalOptions;
pub use error::{Result, WafError};
pub use expand::{PatternExpander, MAX_EXPANSION_DEPTH};
pub use model::{
    CommonRegistry, Document, ItemDescriptor, ItemKind, ItemSet, MethodList, PatternFragment,
    Policy, UriEntry,
};
pub use resolver::Reference;
