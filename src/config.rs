//! Global compilation options.
//!
//! These are the handful of root-level keys of the allow-list document that
//! tune the generated configuration as a whole. They are read once when the
//! document is deserialized and stay constant for the rest of the run.

use serde::Deserialize;

/// Root-level options controlling the generated directive sequence.
///
/// Every field has a default, so an empty document compiles with the
/// conventional `$waf` variable and `/waf` routing prefix.
///
/// # Examples
///
/// ```rust
/// use wafgen::GlobalOptions;
///
/// let options = GlobalOptions::default();
/// assert_eq!(options.variable, "waf");
/// assert_eq!(options.prefix, "/waf");
/// assert_eq!(options.status, 405);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalOptions {
    /// Name of the routing variable set once a request matches an entry.
    pub variable: String,
    /// Internal routing prefix injected in front of unrouted requests and
    /// stripped again once all checks pass.
    pub prefix: String,
    /// External prefix prepended to every URI pattern before expansion,
    /// for applications mounted below the server root.
    pub uri_prefix: String,
    /// Status returned for anything the allow-list does not match, and the
    /// default status for failed argument/header/cookie checks.
    pub status: u16,
    /// Emit a response header exposing the routing variable.
    pub debug: bool,
    /// When false, emit a directive silencing proxy warnings about the
    /// routing variable being read before its first assignment.
    pub warn_uninitialized_variables: bool,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            variable: "waf".to_string(),
            prefix: "/waf".to_string(),
            uri_prefix: String::new(),
            status: 405,
            debug: false,
            warn_uninitialized_variables: true,
        }
    }
}
