//! The policy compiler.
//!
//! Walks every URI entry of a document in input order, resolves its policy
//! and descriptor references, expands every pattern it encounters, and emits
//! the directive sequence enforcing the allow-list at the edge.
//!
//! Per request, the generated directives realize this state machine: an
//! unrouted request is rewritten into the internal prefix; the compiled URI
//! set routes it (exact rules at fixed priority ahead of pattern rules,
//! pattern rules first-match in input order); the matched block checks
//! method, then arguments, then headers, then cookies, rejecting with the
//! check's status on the first failure; finally the prefix is stripped and
//! ordinary processing resumes. Anything unmatched dies in the catch-all
//! with the default status.
//!
//! Exact-match rules are routed by the proxy at a fixed priority independent
//! of declaration order, so they are collected in a separate bucket and
//! emitted ahead of the pattern-match bucket; the pattern bucket preserves
//! input order, which the proxy's first-match evaluation makes significant.

mod codegen;

use crate::classify::{add_inline_options, escape_literal, looks_like_regex};
use crate::config::GlobalOptions;
use crate::error::Result;
use crate::expand::{ends_with_unescaped_dollar, force_group, PatternExpander};
use crate::model::{
    CommonRegistry, Document, ItemDescriptor, ItemKind, ItemSet, MethodList, PatternFragment,
    Policy, UriEntry,
};
use crate::resolver::Reference;

use codegen::{item_variable, Emitter};

/// Status for requests whose method is outside the declared set. Fixed by
/// the protocol, never the configurable mismatch status.
const METHOD_NOT_ALLOWED: u16 = 405;

/// Compiles a parsed document into its directive sequence.
///
/// This is the single entry point of the crate: one pure call, one ordered
/// sequence of output lines, no I/O.
///
/// # Examples
///
/// ```rust
/// use wafgen::Document;
///
/// let doc = Document::from_yaml_str(
///     "uri:\n  - pattern: /index.html\n    policy: {}\n",
/// )?;
/// let lines = wafgen::compile(&doc)?;
/// assert!(lines.contains(&"location = /waf/index.html {".to_string()));
/// # Ok::<(), wafgen::WafError>(())
/// ```
pub fn compile(document: &Document) -> Result<Vec<String>> {
    Compiler::new(document).compile()
}

enum CompiledEntry {
    Exact(Vec<String>),
    Pattern(Vec<String>),
}

/// Compiles one document. Borrows the document for the duration of the run;
/// nothing is mutated.
pub struct Compiler<'c> {
    entries: &'c [UriEntry],
    common: &'c CommonRegistry,
    options: &'c GlobalOptions,
}

impl<'c> Compiler<'c> {
    pub fn new(document: &'c Document) -> Self {
        Self {
            entries: &document.uri,
            common: &document.common,
            options: &document.options,
        }
    }

    /// Produces the full directive sequence: preamble, routing gate,
    /// catch-all, then one block per URI entry.
    pub fn compile(&self) -> Result<Vec<String>> {
        let mut exact_blocks = Vec::new();
        let mut pattern_blocks = Vec::new();
        for entry in self.entries {
            match self.compile_entry(entry)? {
                CompiledEntry::Exact(lines) => exact_blocks.push(lines),
                CompiledEntry::Pattern(lines) => pattern_blocks.push(lines),
            }
        }

        let mut out = Emitter::new();
        if !self.options.warn_uninitialized_variables {
            out.line("uninitialized_variable_warn off;");
        }
        if self.options.debug {
            out.line(format!(
                "add_header X-Waf-Status ${} always;",
                self.options.variable
            ));
        }
        out.open(format!("if (${} != 1)", self.options.variable));
        out.line(format!("rewrite \"^(.*)$\" {}$1 last;", self.options.prefix));
        out.close();
        out.open(format!("location {}", self.options.prefix));
        out.line("internal;");
        out.line(format!("return {};", self.options.status));
        out.close();
        for block in exact_blocks.into_iter().chain(pattern_blocks) {
            out.append_block(block);
        }
        Ok(out.into_lines())
    }

    fn compile_entry(&self, entry: &UriEntry) -> Result<CompiledEntry> {
        let default_policy = Policy::default();
        let policy = match &entry.policy {
            Some(reference) => reference.resolve_required(&self.common.policy, "policy")?,
            None => &default_policy,
        };

        let mut expander = PatternExpander::new(self.common);
        let expanded = self.expand_uri(&mut expander, &entry.pattern)?;

        let mut block = Emitter::new();
        let exact = !looks_like_regex(&expanded);
        if exact {
            block.open(format!("location = {}{}", self.options.prefix, expanded));
        } else {
            block.open(format!("location ~ \"{}\"", self.uri_regex(&expanded)));
        }
        self.emit_policy(&mut block, policy, &mut expander)?;
        block.close();

        Ok(if exact {
            CompiledEntry::Exact(block.into_lines())
        } else {
            CompiledEntry::Pattern(block.into_lines())
        })
    }

    /// Full URI pattern: the external `uriPrefix` concatenated with the
    /// entry pattern, fully expanded, with neither grouping nor anchoring;
    /// classification happens on this string.
    fn expand_uri(
        &self,
        expander: &mut PatternExpander,
        fragment: &PatternFragment,
    ) -> Result<String> {
        match fragment {
            PatternFragment::Regex(text) => expander.expand(
                &PatternFragment::Regex(format!("{}{}", self.options.uri_prefix, text)),
                false,
                false,
            ),
            PatternFragment::Literals(_) => {
                let inner = expander.expand(fragment, false, false)?;
                Ok(format!("{}{}", self.options.uri_prefix, inner))
            }
        }
    }

    /// Routing regex for a pattern-match rule: the expanded body behind the
    /// escaped internal prefix, anchored on both sides. Anchors the user
    /// already wrote are absorbed so the prefix sits inside them.
    fn uri_regex(&self, expanded: &str) -> String {
        let body = expanded.strip_prefix('^').unwrap_or(expanded);
        let body = if ends_with_unescaped_dollar(body) {
            &body[..body.len() - 1]
        } else {
            body
        };
        add_inline_options(&format!(
            "^{}{}$",
            escape_literal(&self.options.prefix),
            body
        ))
    }

    /// Emits a matched entry's body: route marker, checks in fixed order
    /// (method, arguments, headers, cookies), then the prefix-stripping
    /// rewrite that resumes normal processing.
    fn emit_policy(
        &self,
        out: &mut Emitter,
        policy: &Policy,
        expander: &mut PatternExpander,
    ) -> Result<()> {
        out.line(format!("set ${} 1;", self.options.variable));
        if let Some(methods) = &policy.method {
            self.emit_method_check(out, methods);
        }
        if let Some(set) = &policy.arg {
            let descriptors = self.resolve_items(set, ItemKind::Arg)?;
            self.emit_item_checks(out, &descriptors, ItemKind::Arg, expander)?;
            self.emit_args_rewrite(out, &descriptors);
        }
        if let Some(set) = &policy.header {
            let descriptors = self.resolve_items(set, ItemKind::Header)?;
            self.emit_item_checks(out, &descriptors, ItemKind::Header, expander)?;
        }
        if let Some(set) = &policy.cookie {
            let descriptors = self.resolve_items(set, ItemKind::Cookie)?;
            self.emit_item_checks(out, &descriptors, ItemKind::Cookie, expander)?;
        }
        out.line(format!(
            "rewrite \"^{}(.*)$\" $1 last;",
            escape_literal(&self.options.prefix)
        ));
        Ok(())
    }

    /// Rejects methods outside the declared set. An element naming a common
    /// `method` entry splices that entry in (single hop, spliced elements
    /// taken literally); anything else is a literal method token.
    fn emit_method_check(&self, out: &mut Emitter, methods: &[String]) {
        let mut allowed: Vec<String> = Vec::with_capacity(methods.len());
        for method in methods {
            match self.common.method.get(method) {
                Some(MethodList::One(name)) => allowed.push(name.clone()),
                Some(MethodList::Many(names)) => allowed.extend(names.iter().cloned()),
                None => allowed.push(method.clone()),
            }
        }
        out.open(format!(
            "if ($request_method !~ \"^(?:{})$\")",
            allowed.join("|")
        ));
        out.line(format!("return {METHOD_NOT_ALLOWED};"));
        out.close();
    }

    /// Resolves a descriptor set reference and then every descriptor inside
    /// it. A named-but-missing reference at either level is fatal.
    fn resolve_items<'p>(
        &'p self,
        set: &'p Reference<ItemSet>,
        kind: ItemKind,
    ) -> Result<Vec<&'p ItemDescriptor>> {
        let set = set.resolve_required(self.common.descriptor_sets(kind), kind.set_category())?;
        set.iter()
            .map(|reference| {
                reference.resolve_required(self.common.descriptors(kind), kind.category())
            })
            .collect()
    }

    /// Emits the per-descriptor checks, in declared order.
    ///
    /// Mandatory: an independent presence check, then an independent value
    /// check, each rejecting with the descriptor's effective status.
    /// Optional: one combined check that only rejects a present-but-
    /// mismatched value; the variable is empty when the item is absent, and
    /// empty always passes.
    fn emit_item_checks(
        &self,
        out: &mut Emitter,
        descriptors: &[&ItemDescriptor],
        kind: ItemKind,
        expander: &mut PatternExpander,
    ) -> Result<()> {
        for descriptor in descriptors {
            let variable = item_variable(kind, &descriptor.name);
            let status = descriptor.status.unwrap_or(self.options.status);
            if descriptor.mandatory {
                out.open(format!("if ({variable} = \"\")"));
                out.line(format!("return {status};"));
                out.close();
                let value = expander.expand(&descriptor.pattern, true, true)?;
                out.open(format!("if ({variable} !~ \"{value}\")"));
                out.line(format!("return {status};"));
                out.close();
            } else {
                let value = force_group(&expander.expand(&descriptor.pattern, false, false)?);
                out.open(format!("if ({variable} !~ \"^{value}?$\")"));
                out.line(format!("return {status};"));
                out.close();
            }
        }
        Ok(())
    }

    /// Rewrites the outgoing query string to exactly the declared argument
    /// values; undeclared arguments are dropped, not merely unvalidated. An
    /// empty declared set empties the query string.
    fn emit_args_rewrite(&self, out: &mut Emitter, descriptors: &[&ItemDescriptor]) {
        let query = descriptors
            .iter()
            .map(|descriptor| {
                format!(
                    "{}={}",
                    descriptor.name,
                    item_variable(ItemKind::Arg, &descriptor.name)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        out.line(format!("set $args \"{query}\";"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WafError;

    fn compile_yaml(yaml: &str) -> Result<Vec<String>> {
        let document = Document::from_yaml_str(yaml)?;
        compile(&document)
    }

    #[test]
    fn test_empty_document_compiles_gate_and_catch_all() {
        let lines = compile_yaml("{}").unwrap();
        assert_eq!(
            lines,
            vec![
                "if ($waf != 1) {",
                "    rewrite \"^(.*)$\" /waf$1 last;",
                "}",
                "location /waf {",
                "    internal;",
                "    return 405;",
                "}",
            ]
        );
    }

    #[test]
    fn test_preamble_directives_are_optional() {
        let lines = compile_yaml("warnUninitializedVariables: false\ndebug: true\n").unwrap();
        assert_eq!(lines[0], "uninitialized_variable_warn off;");
        assert_eq!(lines[1], "add_header X-Waf-Status $waf always;");
    }

    #[test]
    fn test_literal_entry_is_exact_match() {
        let lines = compile_yaml("uri:\n  - pattern: /index.html\n").unwrap();
        assert!(lines.contains(&"location = /waf/index.html {".to_string()));
        assert!(lines.contains(&"    set $waf 1;".to_string()));
        assert!(lines.contains(&"    rewrite \"^/waf(.*)$\" $1 last;".to_string()));
    }

    #[test]
    fn test_regex_entry_is_anchored_behind_prefix() {
        let lines = compile_yaml("uri:\n  - pattern: \"/files/[0-9]+\"\n").unwrap();
        assert!(lines.contains(&"location ~ \"^/waf/files/[0-9]+$\" {".to_string()));
    }

    #[test]
    fn test_user_anchors_are_absorbed() {
        let lines = compile_yaml("uri:\n  - pattern: \"^/files/[0-9]+$\"\n").unwrap();
        assert!(lines.contains(&"location ~ \"^/waf/files/[0-9]+$\" {".to_string()));
    }

    #[test]
    fn test_uri_prefix_is_prepended_before_expansion() {
        let lines =
            compile_yaml("uriPrefix: /app\nuri:\n  - pattern: \"/x/[a-z]+\"\n").unwrap();
        assert!(lines.contains(&"location ~ \"^/waf/app/x/[a-z]+$\" {".to_string()));
    }

    #[test]
    fn test_method_check_uses_fixed_status() {
        let yaml = r#"
status: 400
uri:
  - pattern: /foo
    policy:
      method: [GET, HEAD]
"#;
        let lines = compile_yaml(yaml).unwrap();
        let position = lines
            .iter()
            .position(|l| l == "    if ($request_method !~ \"^(?:GET|HEAD)$\") {")
            .unwrap();
        // 405 even though the configurable status is 400.
        assert_eq!(lines[position + 1], "        return 405;");
    }

    #[test]
    fn test_method_reference_splices_common_entry() {
        let yaml = r#"
common:
  method:
    read: [GET, HEAD]
uri:
  - pattern: /foo
    policy:
      method: [read, POST]
"#;
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines
            .contains(&"    if ($request_method !~ \"^(?:GET|HEAD|POST)$\") {".to_string()));
    }

    #[test]
    fn test_named_policy_resolves_from_common() {
        let yaml = r#"
common:
  policy:
    readonly:
      method: [GET]
uri:
  - pattern: /foo
    policy: readonly
"#;
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines.contains(&"    if ($request_method !~ \"^(?:GET)$\") {".to_string()));
    }

    #[test]
    fn test_missing_named_policy_is_fatal() {
        let err = compile_yaml("uri:\n  - pattern: /foo\n    policy: nope\n").unwrap_err();
        assert_eq!(
            err,
            WafError::UnresolvedReference {
                category: "policy",
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_missing_named_argset_is_fatal() {
        let yaml = "uri:\n  - pattern: /foo\n    policy:\n      arg: nope\n";
        let err = compile_yaml(yaml).unwrap_err();
        assert_eq!(
            err,
            WafError::UnresolvedReference {
                category: "argset",
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_empty_arg_set_strips_query_string() {
        let yaml = "uri:\n  - pattern: /foo\n    policy:\n      arg: []\n";
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines.contains(&"    set $args \"\";".to_string()));
    }

    #[test]
    fn test_mandatory_argument_two_checks_and_rewrite() {
        let yaml = r#"
status: 400
uri:
  - pattern: /foo
    policy:
      arg:
        - name: count
          pattern: "[0-9]+"
          mandatory: true
"#;
        let lines = compile_yaml(yaml).unwrap();
        let presence = lines
            .iter()
            .position(|l| l == "    if ($arg_count = \"\") {")
            .unwrap();
        assert_eq!(lines[presence + 1], "        return 400;");
        let value = lines
            .iter()
            .position(|l| l == "    if ($arg_count !~ \"^[0-9]+$\") {")
            .unwrap();
        assert_eq!(lines[value + 1], "        return 400;");
        assert!(presence < value);
        assert!(lines.contains(&"    set $args \"count=$arg_count\";".to_string()));
    }

    #[test]
    fn test_descriptor_status_overrides_global() {
        let yaml = r#"
status: 400
uri:
  - pattern: /foo
    policy:
      arg:
        - name: id
          pattern: "[0-9]+"
          mandatory: true
          status: 422
"#;
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines.contains(&"        return 422;".to_string()));
        assert!(!lines.contains(&"        return 400;".to_string()));
    }

    #[test]
    fn test_optional_item_single_combined_check() {
        let yaml = r#"
uri:
  - pattern: /foo
    policy:
      header:
        - name: X-Trace
          pattern: "[a-f0-9]+"
"#;
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines
            .contains(&"    if ($http_x_trace !~ \"^(?:[a-f0-9]+)?$\") {".to_string()));
        // Headers are validated only, never rewritten.
        assert!(!lines.iter().any(|l| l.contains("set $args")));
    }

    #[test]
    fn test_cookie_checks_follow_headers() {
        let yaml = r#"
uri:
  - pattern: /foo
    policy:
      header:
        - name: X-A
          pattern: "a+"
      cookie:
        - name: session
          pattern: "[a-f0-9]+"
          mandatory: true
"#;
        let lines = compile_yaml(yaml).unwrap();
        let header = lines
            .iter()
            .position(|l| l.contains("$http_x_a"))
            .unwrap();
        let cookie = lines
            .iter()
            .position(|l| l.contains("$cookie_session"))
            .unwrap();
        assert!(header < cookie);
    }

    #[test]
    fn test_exact_bucket_precedes_pattern_bucket() {
        let yaml = r#"
uri:
  - pattern: "/a/[0-9]+"
  - pattern: /plain
  - pattern: "/b/[0-9]+"
"#;
        let lines = compile_yaml(yaml).unwrap();
        let plain = lines
            .iter()
            .position(|l| l.starts_with("location = /waf/plain"))
            .unwrap();
        let a = lines
            .iter()
            .position(|l| l.contains("^/waf/a/[0-9]+$"))
            .unwrap();
        let b = lines
            .iter()
            .position(|l| l.contains("^/waf/b/[0-9]+$"))
            .unwrap();
        assert!(plain < a);
        assert!(a < b);
    }

    #[test]
    fn test_unicode_property_pattern_gets_inline_option() {
        let yaml = "uri:\n  - pattern: \"/name/\\\\p{L}+\"\n";
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines
            .contains(&"location ~ \"(*UTF8)^/waf/name/\\p{L}+$\" {".to_string()));
    }

    #[test]
    fn test_list_valued_uri_pattern() {
        let yaml = "uri:\n  - pattern: [\"/cat\", \"/dog\"]\n";
        let lines = compile_yaml(yaml).unwrap();
        assert!(lines.contains(&"location ~ \"^/waf(?:/cat|/dog)$\" {".to_string()));
    }
}
