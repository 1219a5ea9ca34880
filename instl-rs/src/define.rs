//! Define documents: the source of variable definitions.
//!
//! Anything that can list `(name, value)` pairs in order implements
//! [`DefineSource`] and can seed a [`ConfigVarStack`].  [`DefineDoc`] reads
//! the small YAML subset used by instl define files:
//!
//! | Line                          | Effect                                  |
//! |-------------------------------|-----------------------------------------|
//! | `NAME: value`                 | one value (surrounding quotes dropped)  |
//! | `NAME: [a, b]`                | several values                          |
//! | `NAME:` + indented `- item`s  | several values                          |
//! | `NAME: ~` / `NAME: null`      | a single empty slot                     |
//! | `NAME:` with no items         | a single empty slot                     |
//! | `# ...`, `--- !define`, `...` | ignored                                 |
//!
//! Lines that fit none of these are reported as [`DefineError`]s and skipped.

use std::path::Path;

use log::{debug, warn};

use crate::error::{DefineError, Result, VarError};
use crate::stack::ConfigVarStack;
use crate::var::RawValue;

// ── DefineSource ──────────────────────────────────────────────────────────────

/// Ordered `(name, value)` pairs.
pub trait DefineSource {
    fn defines(&self) -> Box<dyn Iterator<Item = (&str, &RawValue)> + '_>;
}

impl DefineSource for [(String, RawValue)] {
    fn defines(&self) -> Box<dyn Iterator<Item = (&str, &RawValue)> + '_> {
        Box::new(self.iter().map(|(name, value)| (name.as_str(), value)))
    }
}

impl DefineSource for Vec<(String, RawValue)> {
    fn defines(&self) -> Box<dyn Iterator<Item = (&str, &RawValue)> + '_> {
        self.as_slice().defines()
    }
}

impl ConfigVarStack {
    /// `set` every define from `source`, in order.  Returns how many.
    pub fn read_defines<S: DefineSource + ?Sized>(&mut self, source: &S) -> Result<usize> {
        let mut count = 0;
        for (name, value) in source.defines() {
            self.set(name, value.clone())?;
            count += 1;
        }
        debug!("read {count} defines");
        Ok(count)
    }

    /// Load a define file into the innermost scope.
    ///
    /// Malformed lines are skipped; they are logged and returned.
    pub fn read_defines_file(&mut self, path: &Path) -> Result<Vec<DefineError>> {
        let (doc, errors) = DefineDoc::load_file(path)?;
        for e in &errors {
            warn!("{}: {e}", path.display());
        }
        self.read_defines(&doc)?;
        Ok(errors)
    }
}

// ── DefineDoc ─────────────────────────────────────────────────────────────────

/// Parsed define document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DefineDoc {
    entries: Vec<(String, RawValue)>,
}

/// A `NAME:` line waiting for its `- item` lines.
struct Block {
    name: String,
    items: Vec<RawValue>,
}

impl Block {
    fn finish(self) -> (String, RawValue) {
        let value = if self.items.is_empty() {
            RawValue::Null
        } else {
            RawValue::Seq(self.items)
        };
        (self.name, value)
    }
}

impl DefineDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(String, RawValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a define document.
    ///
    /// Returns the document and a list of any lines that could not be read.
    pub fn load_str(s: &str) -> (Self, Vec<DefineError>) {
        let mut doc = DefineDoc::new();
        let mut errors = Vec::new();
        let mut block: Option<Block> = None;

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = strip_comment(raw).trim_end();
            let trimmed = line.trim_start();

            if trimmed.is_empty() {
                continue;
            }

            // document markers close any open block
            if trimmed.starts_with("---") || trimmed == "..." {
                doc.entries.extend(block.take().map(Block::finish));
                continue;
            }

            if let Some(item) = list_item(trimmed) {
                match block.as_mut() {
                    Some(b) => b.items.push(scalar(item)),
                    None => errors.push(DefineError {
                        line: lineno,
                        message: "list item outside of a definition".into(),
                    }),
                }
                continue;
            }

            if line.starts_with(char::is_whitespace) {
                errors.push(DefineError {
                    line: lineno,
                    message: "unexpected indentation".into(),
                });
                continue;
            }

            doc.entries.extend(block.take().map(Block::finish));

            let Some((name, rest)) = trimmed.split_once(':') else {
                errors.push(DefineError {
                    line: lineno,
                    message: "expected 'NAME: value'".into(),
                });
                continue;
            };
            let name = name.trim();
            if !is_valid_name(name) {
                errors.push(DefineError {
                    line: lineno,
                    message: format!("invalid variable name '{name}'"),
                });
                continue;
            }

            let rest = rest.trim();
            if rest.is_empty() {
                block = Some(Block { name: name.to_owned(), items: Vec::new() });
            } else if let Some(inner) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                doc.entries.push((name.to_owned(), flow_sequence(inner)));
            } else {
                doc.entries.push((name.to_owned(), scalar(rest)));
            }
        }
        doc.entries.extend(block.take().map(Block::finish));

        (doc, errors)
    }

    /// Read and parse a define file from disk.
    pub fn load_file(path: &Path) -> Result<(Self, Vec<DefineError>)> {
        let s = std::fs::read_to_string(path).map_err(|source| VarError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::load_str(&s))
    }
}

impl DefineSource for DefineDoc {
    fn defines(&self) -> Box<dyn Iterator<Item = (&str, &RawValue)> + '_> {
        self.entries.defines()
    }
}

// ── Line helpers ──────────────────────────────────────────────────────────────

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '(' | ')'))
}

/// `- item` (or a bare `-`) → the item text.
fn list_item(trimmed: &str) -> Option<&str> {
    if trimmed == "-" {
        return Some("");
    }
    trimmed.strip_prefix("- ").map(str::trim)
}

/// Cut a `#` comment that starts the line or follows whitespace, outside
/// quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev_space = true;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') if prev_space => return &line[..i],
            _ => {}
        }
        prev_space = c.is_whitespace();
    }
    line
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn scalar(s: &str) -> RawValue {
    match s.trim() {
        "" | "~" | "null" => RawValue::Null,
        other => RawValue::Str(unquote(other).to_owned()),
    }
}

/// Split `a, "b, c", d` on commas outside quotes.
fn flow_sequence(inner: &str) -> RawValue {
    if inner.trim().is_empty() {
        return RawValue::Seq(Vec::new());
    }
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                items.push(scalar(&inner[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(scalar(&inner[start..]));
    RawValue::Seq(items)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(s: &str) -> DefineDoc {
        let (doc, errors) = DefineDoc::load_str(s);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        doc
    }

    fn s(v: &str) -> RawValue {
        RawValue::Str(v.into())
    }

    #[test]
    fn scalars_and_quotes() {
        let doc = load("A: one\nB: \"two words\"\nC: 'x: y'\nD: $(A)/sub\n");
        assert_eq!(
            doc.entries(),
            &[
                ("A".to_owned(), s("one")),
                ("B".to_owned(), s("two words")),
                ("C".to_owned(), s("x: y")),
                ("D".to_owned(), s("$(A)/sub")),
            ]
        );
    }

    #[test]
    fn sequences() {
        let doc = load("L: [a, \"b, c\", ~]\nM:\n  - x\n  - y\n-\nN: []\n");
        assert_eq!(doc.entries()[0].1, RawValue::Seq(vec![s("a"), s("b, c"), RawValue::Null]));
        assert_eq!(doc.entries()[1].1, RawValue::Seq(vec![s("x"), s("y"), RawValue::Null]));
        assert_eq!(doc.entries()[2].1, RawValue::Seq(Vec::new()));
    }

    #[test]
    fn empty_definitions() {
        let doc = load("A: ~\nB: null\nC:\nD: d\n");
        let values: Vec<_> = doc.entries().iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(values, vec![RawValue::Null, RawValue::Null, RawValue::Null, s("d")]);
    }

    #[test]
    fn comments_and_markers() {
        let src = "--- !define\n# comment\nA: a # trailing\nB: \"not # a comment\"\n...\n";
        let doc = load(src);
        assert_eq!(doc.entries()[0].1, s("a"));
        assert_eq!(doc.entries()[1].1, s("not # a comment"));
        assert_eq!(load("URL: http://host/#frag").entries()[0].1, s("http://host/#frag"));
    }

    #[test]
    fn errors_are_collected_and_skipped() {
        let (doc, errors) = DefineDoc::load_str("- orphan\nno colon here\nbad name!: x\n  stray\nOK: 1\n");
        assert_eq!(doc.len(), 1);
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn seeds_a_stack() {
        let doc = load("BASE: /opt\nLIB_DIR: $(BASE)/lib\nLIST: [a, b]\nNONE: ~\n");
        let mut vars = ConfigVarStack::new();
        assert_eq!(vars.read_defines(&doc).unwrap(), 4);
        assert_eq!(vars.resolve_str("$(LIB_DIR)").unwrap(), "/opt/lib");
        assert_eq!(vars.resolve_str_to_list("$(LIST)").unwrap(), vec!["a", "b"]);
        assert!(vars.get("NONE").unwrap().is_single_none());
    }

    #[test]
    fn vec_is_a_source() {
        let defs = vec![("X".to_owned(), RawValue::from(vec!["1", "2"]))];
        let mut vars = ConfigVarStack::new();
        vars.read_defines(&defs).unwrap();
        assert_eq!(vars.get("X").unwrap().len(), 2);
    }

    #[test]
    fn file_roundtrip_through_stack() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "GREETING: hello\nbroken line").unwrap();
        let mut vars = ConfigVarStack::new();
        let errors = vars.read_defines_file(f.path()).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(vars.resolve_var("GREETING", None).unwrap(), "hello");
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut vars = ConfigVarStack::new();
        let err = vars.read_defines_file(Path::new("/no/such/instl/defines.yaml")).unwrap_err();
        assert!(matches!(err, VarError::Io { .. }));
    }
}
