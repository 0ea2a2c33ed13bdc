//! Recursive expansion of `{name}` placeholders inside pattern fragments.
//!
//! A pattern fragment may reference common patterns by name; expansion
//! substitutes each placeholder with the (recursively expanded) referenced
//! fragment, wrapped in a non-capturing group so quantifiers and
//! concatenation in the referencing fragment bind to the whole substitution.
//! List-valued fragments become alternations of escaped literals before the
//! placeholder scan.
//!
//! Depth is tracked across the whole call tree of one top-level `expand`
//! call, never per branch, so mutually recursive patterns hit the ceiling
//! instead of hanging.

use std::sync::OnceLock;

use regex::Regex;

use crate::classify::escape_literal;
use crate::error::{Result, WafError};
use crate::model::{CommonRegistry, PatternFragment};

/// Hard ceiling on substitutions per top-level expansion. Exceeding it is a
/// cyclic pattern reference.
pub const MAX_EXPANSION_DEPTH: u32 = 100;

/// Matches either a regex escape form whose braces must be left alone
/// (`\x{41}`, `\p{L}`, `\P{C}`, `\g{1}`, `\k{name}`) or a `{identifier}`
/// placeholder, captured in group 1.
fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\[xpPgk]\{[^}]*\}|\{([A-Za-z][A-Za-z0-9_+-]*)\}")
            .expect("placeholder grammar is a valid regex")
    })
}

/// Expands pattern fragments against one common registry.
///
/// The expander carries the recursion counter for a single top-level
/// invocation; compiling several documents in one process must use one
/// expander (or at least one [`expand`](Self::expand) call) per document so
/// the counters cannot interfere.
pub struct PatternExpander<'c> {
    common: &'c CommonRegistry,
    depth: u32,
}

impl<'c> PatternExpander<'c> {
    pub fn new(common: &'c CommonRegistry) -> Self {
        Self { common, depth: 0 }
    }

    /// Fully expands `fragment`.
    ///
    /// With `group`, the result is wrapped in a non-capturing group when it
    /// contains a top-level alternation and is not already a single balanced
    /// group. With `anchor`, `^` and `$` are inserted when not already
    /// present. Grouping is idempotent and never double-wraps.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wafgen::{CommonRegistry, PatternExpander, PatternFragment};
    ///
    /// let common = CommonRegistry::default();
    /// let mut expander = PatternExpander::new(&common);
    /// let fragment = PatternFragment::Regex("a|b".to_string());
    /// assert_eq!(expander.expand(&fragment, true, true)?, "^(?:a|b)$");
    /// # Ok::<(), wafgen::WafError>(())
    /// ```
    pub fn expand(
        &mut self,
        fragment: &PatternFragment,
        group: bool,
        anchor: bool,
    ) -> Result<String> {
        self.depth = 0;
        self.expand_fragment(fragment, group, anchor)
    }

    fn expand_fragment(
        &mut self,
        fragment: &PatternFragment,
        group: bool,
        anchor: bool,
    ) -> Result<String> {
        let raw = match fragment {
            PatternFragment::Regex(text) => text.clone(),
            PatternFragment::Literals(items) => {
                let alternation = items
                    .iter()
                    .map(|literal| escape_literal(literal))
                    .collect::<Vec<_>>()
                    .join("|");
                group_alternation(alternation)
            }
        };
        let mut expanded = self.substitute(&raw)?;
        if group {
            expanded = group_alternation(expanded);
        }
        if anchor {
            expanded = anchor_pattern(expanded);
        }
        Ok(expanded)
    }

    /// Replaces every placeholder in `input` with the forced-group expansion
    /// of the referenced common pattern. Escape forms are copied verbatim.
    fn substitute(&mut self, input: &str) -> Result<String> {
        if !input.contains('{') {
            return Ok(input.to_string());
        }
        let common = self.common;
        let mut out = String::with_capacity(input.len());
        let mut cursor = 0;
        for caps in placeholder_regex().captures_iter(input) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            out.push_str(&input[cursor..whole.start()]);
            cursor = whole.end();
            match caps.get(1) {
                Some(identifier) => {
                    let name = identifier.as_str();
                    let referenced = common.pattern.get(name).ok_or_else(|| {
                        WafError::UnresolvedReference {
                            category: "pattern",
                            name: name.to_string(),
                        }
                    })?;
                    self.depth += 1;
                    if self.depth > MAX_EXPANSION_DEPTH {
                        return Err(WafError::CyclicPattern {
                            pattern: name.to_string(),
                        });
                    }
                    let inner = self.expand_fragment(referenced, false, false)?;
                    out.push_str(&force_group(&inner));
                }
                None => out.push_str(whole.as_str()),
            }
        }
        out.push_str(&input[cursor..]);
        Ok(out)
    }
}

/// Wraps `s` in a non-capturing group unless it already is one.
pub(crate) fn force_group(s: &str) -> String {
    if is_single_group(s) {
        s.to_string()
    } else {
        format!("(?:{s})")
    }
}

/// Wraps `s` when it contains a top-level alternation and is not already a
/// single balanced group spanning the whole string.
fn group_alternation(s: String) -> String {
    if has_top_level_alternation(&s) && !is_single_group(&s) {
        format!("(?:{s})")
    } else {
        s
    }
}

/// True when `s` is one syntactically balanced group spanning the entire
/// string. A fragment whose nesting never returns to zero, or returns below
/// zero, is simply "not a single group"; the caller falls back to wrapping.
fn is_single_group(s: &str) -> bool {
    if !s.starts_with('(') {
        return false;
    }
    let last_index = s.len() - 1;
    let mut depth: u32 = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
                if depth == 0 {
                    return i == last_index;
                }
            }
            _ => {}
        }
    }
    false
}

/// True when `s` contains an unescaped `|` outside all parentheses.
fn has_top_level_alternation(s: &str) -> bool {
    let mut depth: i32 = 0;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            '|' if depth <= 0 => return true,
            _ => {}
        }
    }
    false
}

/// Ensures `s` starts with `^` and ends with an unescaped `$`, inserting
/// the anchors only when absent.
fn anchor_pattern(s: String) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    if !s.starts_with('^') {
        out.push('^');
    }
    out.push_str(&s);
    if !ends_with_unescaped_dollar(&out) {
        out.push('$');
    }
    out
}

/// True when `s` ends with a `$` that is a real anchor, not an escaped
/// literal dollar.
pub(crate) fn ends_with_unescaped_dollar(s: &str) -> bool {
    if !s.ends_with('$') {
        return false;
    }
    let body = &s[..s.len() - 1];
    let trailing_backslashes = body.chars().rev().take_while(|&c| c == '\\').count();
    trailing_backslashes % 2 == 0
}
