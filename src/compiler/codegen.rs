//! Directive text emission.
//!
//! The target grammar is the nginx rewrite module: one directive per line,
//! blocks opened with `{` and closed with `}`, four-space indentation. The
//! compiler decides *what* to emit; this module only turns it into text.

use crate::model::ItemKind;

const INDENT: &str = "    ";

/// Accumulates directive lines with block-scoped indentation.
pub(crate) struct Emitter {
    lines: Vec<String>,
    depth: usize,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self {
            lines: Vec::new(),
            depth: 0,
        }
    }

    /// Appends one directive at the current depth.
    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let mut out = String::new();
        for _ in 0..self.depth {
            out.push_str(INDENT);
        }
        out.push_str(text.as_ref());
        self.lines.push(out);
    }

    /// Opens a block: emits `head {` and indents.
    pub(crate) fn open(&mut self, head: impl AsRef<str>) {
        let text = format!("{} {{", head.as_ref());
        self.line(text);
        self.depth += 1;
    }

    /// Closes the innermost block.
    pub(crate) fn close(&mut self) {
        self.depth -= 1;
        self.line("}");
    }

    /// Appends an already rendered block verbatim.
    pub(crate) fn append_block(&mut self, block: Vec<String>) {
        self.lines.extend(block);
    }

    pub(crate) fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// The request variable carrying the value of one argument, header, or
/// cookie. Names are lowercased and dashes mapped to underscores, matching
/// the proxy's variable naming.
pub(crate) fn item_variable(kind: ItemKind, name: &str) -> String {
    let sanitized = name.to_ascii_lowercase().replace('-', "_");
    let prefix = match kind {
        ItemKind::Arg => "arg",
        ItemKind::Header => "http",
        ItemKind::Cookie => "cookie",
    };
    format!("${prefix}_{sanitized}")
}
