//! PAF rendering
//!
//! Output always parses back into an equal tree: strings are quoted so they
//! never read back as numbers or booleans, doubles keep a decimal point or
//! exponent, and policy arrays become repeated blocks.

use std::fmt::Write as _;
use std::io;

use policy_store::{Policy, Values};

/// Renders a [`Policy`] as PAF text
#[derive(Debug, Clone)]
pub struct PafWriter {
    indent: usize,
    header: bool,
}

impl Default for PafWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PafWriter {
    /// Create writer with 4-space indentation and a format declaration line
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            indent: 4,
            header: true,
        }
    }

    /// Set spaces per nesting level
    #[inline]
    #[must_use]
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Enable or disable the leading `# <?cfg PAF policy ?>` line
    #[inline]
    #[must_use]
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Render `policy` to a string
    #[must_use]
    pub fn render(&self, policy: &Policy) -> String {
        let mut out = String::new();
        if self.header {
            out.push_str("#<?cfg paf policy ?>\n");
        }
        self.render_body(policy, 0, &mut out);
        out
    }

    /// Render `policy` into an I/O sink
    ///
    /// # Errors
    /// Propagates write failures
    pub fn write(&self, policy: &Policy, sink: &mut dyn io::Write) -> io::Result<()> {
        sink.write_all(self.render(policy).as_bytes())
    }

    fn render_body(&self, policy: &Policy, level: usize, out: &mut String) {
        let pad = " ".repeat(self.indent * level);
        for (name, values) in policy.entries() {
            if let Values::Policy(children) = values {
                for child in children {
                    let _ = writeln!(out, "{pad}{name}: {{");
                    self.render_body(&child.read(), level + 1, out);
                    let _ = writeln!(out, "{pad}}}");
                }
                continue;
            }

            let rendered = scalars(values);
            if !rendered.is_empty() {
                let _ = writeln!(out, "{pad}{name}: {}", rendered.join(" "));
            }
        }
    }
}

fn scalars(values: &Values) -> Vec<String> {
    match values {
        Values::Bool(list) => list.iter().map(ToString::to_string).collect(),
        Values::Int(list) => list.iter().map(ToString::to_string).collect(),
        Values::Double(list) => list.iter().map(|d| double(*d)).collect(),
        Values::String(list) => list.iter().map(|s| quote(s)).collect(),
        Values::File(list) => list.iter().map(|f| format!("@{}", quote(f.path()))).collect(),
        Values::Policy(_) => Vec::new(),
    }
}

fn double(d: f64) -> String {
    if d.is_nan() {
        "nan".to_string()
    } else if d == f64::INFINITY {
        "inf".to_string()
    } else if d == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        // Debug output is the shortest round-tripping form and keeps ".0"
        format!("{d:?}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render `policy` with the default [`PafWriter`]
#[must_use]
pub fn to_paf_string(policy: &Policy) -> String {
    PafWriter::new().render(policy)
}
