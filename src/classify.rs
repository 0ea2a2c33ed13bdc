//! Literal-versus-regex classification and literal escaping.
//!
//! The allow-list format lets users write URI patterns and value patterns as
//! either plain strings or regular-expression fragments without declaring
//! which is which. Classification is a heuristic over the characters that
//! only occur in regexes; it decides whether an entry compiles to an
//! exact-match rule or a pattern-match rule.

/// Characters whose presence marks a string as a regular expression.
///
/// The bare dot is deliberately absent: it appears in nearly every literal
/// path (`/index.html`) and would make the signal useless.
const REGEX_SIGNALS: &[char] = &[
    '\\', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|',
];

/// Returns true when `s` must be treated as a regular expression.
///
/// # Examples
///
/// ```rust
/// use wafgen::classify::looks_like_regex;
///
/// assert!(!looks_like_regex("/index.html"));
/// assert!(looks_like_regex("/(?:a|b)"));
/// ```
pub fn looks_like_regex(s: &str) -> bool {
    s.chars().any(|c| REGEX_SIGNALS.contains(&c))
}

/// Backslash-escapes `s` for inclusion inside a generated regex.
///
/// Escapes every classification signal plus the dot, so a literal survives
/// alternation and concatenation unchanged.
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '.' || REGEX_SIGNALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Prefixes inline option markers a fully expanded pattern needs.
///
/// Unicode property escapes require the subject to be treated as UTF-8;
/// patterns that span multiple lines after expansion need free-spacing mode
/// so the line breaks do not become part of the match. When both apply the
/// UTF-8 marker comes first.
pub fn add_inline_options(pattern: &str) -> String {
    let mut prefix = String::new();
    if pattern.contains("\\p{") || pattern.contains("\\P{") {
        prefix.push_str("(*UTF8)");
    }
    if pattern.contains('\n') {
        prefix.push_str("(?x)");
    }
    if prefix.is_empty() {
        pattern.to_string()
    } else {
        format!("{prefix}{pattern}")
    }
}
