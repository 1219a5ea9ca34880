//! `$(...)` reference tokenizer.
//!
//! Splits a string into [`Segment`]s: literal text, each optionally followed
//! by one variable reference.
//!
//! | Form                        | Meaning                                   |
//! |-----------------------------|-------------------------------------------|
//! | `$(NAME)`                   | all values of `NAME`                      |
//! | `$(NAME[i])`                | value `i` of `NAME`; negative counts back |
//! | `$(NAME<a,k=v>)`            | expand `NAME` with bound parameters       |
//! | `$(NAME<a>[i])`             | both, in either order                     |
//!
//! Names are letters, digits, `_` and `-`; balanced `(`/`)` pairs are also
//! accepted inside a name (`$(Program Files(x86))` style paths are not legal,
//! but `$(FOLDER(x86))` is).
//!
//! The scanner never fails on user input.  Anything that stops looking like a
//! reference part-way through is handed back as literal text, so joining every
//! segment's `literal` and `original` reproduces the input exactly.

use std::str::Chars;

use indexmap::IndexMap;

// ── Segment ───────────────────────────────────────────────────────────────────

/// Parameters captured from `<...>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    /// Bare pieces, in order; bound as `__NAME_1__`, `__NAME_2__`, ...
    pub positional: Vec<String>,
    /// `key=value` pieces with a non-empty key and value.
    pub keyword: IndexMap<String, String>,
}

impl Params {
    /// Split raw parameter text on top-level commas.
    ///
    /// A piece with text on both sides of its first `=` is a keyword
    /// parameter; anything else (`x`, `=x`, `x=`, `=`) is positional.
    pub fn parse(raw: &str) -> Self {
        let mut params = Params::default();
        if raw.trim().is_empty() {
            return params;
        }
        for piece in split_top_level(raw) {
            let piece = piece.trim();
            match piece.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() => {
                    params.keyword.insert(k.trim().to_owned(), v.trim().to_owned());
                }
                _ => params.positional.push(piece.to_owned()),
            }
        }
        params
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// Commas nested inside `()`, `<>` or `[]` do not split.
fn split_top_level(raw: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&raw[start..]);
    pieces
}

/// One unit of parser output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    /// Literal text preceding the reference (possibly empty).
    pub literal: String,
    /// Verbatim reference text, e.g. `$(A [1])`; empty for a literal-only tail.
    pub original: String,
    pub name: Option<String>,
    pub index: Option<i64>,
    pub params: Option<Params>,
}

impl Segment {
    pub fn is_reference(&self) -> bool {
        self.name.is_some()
    }
}

// ── State machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Literal,
    /// Saw `$`.
    RefStarted,
    InName,
    /// Whitespace after the name.
    NameEnded,
    InParams,
    ParamsEnded,
    InIndex,
    IndexEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Dollar,
    Open,
    Close,
    LAngle,
    RAngle,
    LBracket,
    RBracket,
    Space,
    NameChar,
    Other,
}

fn classify(c: char) -> Class {
    match c {
        '$' => Class::Dollar,
        '(' => Class::Open,
        ')' => Class::Close,
        '<' => Class::LAngle,
        '>' => Class::RAngle,
        '[' => Class::LBracket,
        ']' => Class::RBracket,
        c if c.is_whitespace() => Class::Space,
        c if c.is_alphanumeric() || c == '_' || c == '-' => Class::NameChar,
        _ => Class::Other,
    }
}

fn is_index_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+') || c.is_whitespace()
}

/// Accumulated text for the segment currently being scanned.
#[derive(Debug, Default)]
struct Pending {
    literal: String,
    original: String,
    name: String,
    name_parens: usize,
    params_raw: Option<String>,
    params_depth: usize,
    index_raw: Option<String>,
    index: Option<i64>,
}

impl Pending {
    fn clear_reference(&mut self) {
        self.original.clear();
        self.name.clear();
        self.name_parens = 0;
        self.params_raw = None;
        self.params_depth = 0;
        self.index_raw = None;
        self.index = None;
    }

    fn name_complete(&self) -> bool {
        !self.name.is_empty() && self.name_parens == 0
    }
}

/// Lazy segment iterator over one input string.
pub struct RefParser<'a> {
    chars: Chars<'a>,
    state: State,
    pending: Pending,
    done: bool,
}

/// Tokenize `text`.  See the module docs for the accepted syntax.
pub fn parse(text: &str) -> RefParser<'_> {
    RefParser::new(text)
}

/// `true` if `text` could contain a reference at all.
#[inline]
pub fn has_reference_marker(text: &str) -> bool {
    text.contains('$')
}

impl<'a> RefParser<'a> {
    pub fn new(text: &'a str) -> Self {
        RefParser {
            chars: text.chars(),
            state: State::Literal,
            pending: Pending::default(),
            done: false,
        }
    }

    fn begin(&mut self) {
        self.pending.original.push('$');
        self.state = State::RefStarted;
    }

    fn accept(&mut self, c: char, next: State) {
        self.pending.original.push(c);
        self.state = next;
    }

    fn start_params(&mut self, c: char) {
        self.pending.params_raw = Some(String::new());
        self.accept(c, State::InParams);
    }

    fn start_index(&mut self, c: char) {
        self.pending.index_raw = Some(String::new());
        self.accept(c, State::InIndex);
    }

    /// Give up on the reference in progress: its text so far becomes literal.
    fn discard(&mut self, c: char) {
        let original = std::mem::take(&mut self.pending.original);
        self.pending.literal.push_str(&original);
        self.pending.clear_reference();
        if c == '$' {
            self.begin();
        } else {
            self.pending.literal.push(c);
            self.state = State::Literal;
        }
    }

    fn close(&mut self, c: char) -> Segment {
        self.pending.original.push(c);
        let p = &mut self.pending;
        let segment = Segment {
            literal: std::mem::take(&mut p.literal),
            original: std::mem::take(&mut p.original),
            name: Some(std::mem::take(&mut p.name)),
            index: p.index.take(),
            params: p.params_raw.take().map(|raw| Params::parse(&raw)),
        };
        p.clear_reference();
        self.state = State::Literal;
        segment
    }

    fn step(&mut self, c: char) -> Option<Segment> {
        use Class::*;
        use State::*;

        match (self.state, classify(c)) {
            (Literal, Dollar) => self.begin(),
            (Literal, _) => self.pending.literal.push(c),

            (RefStarted, Open) => self.accept(c, InName),

            (InName, NameChar) => {
                self.pending.name.push(c);
                self.accept(c, InName);
            }
            (InName, Open) if !self.pending.name.is_empty() => {
                self.pending.name_parens += 1;
                self.pending.name.push(c);
                self.accept(c, InName);
            }
            (InName, Close) if self.pending.name_parens > 0 => {
                self.pending.name_parens -= 1;
                self.pending.name.push(c);
                self.accept(c, InName);
            }
            (InName, Close) if !self.pending.name.is_empty() => return Some(self.close(c)),
            (InName, Space) if self.pending.name_complete() => self.accept(c, NameEnded),
            (InName, LAngle) if self.pending.name_complete() => self.start_params(c),
            (InName, LBracket) if self.pending.name_complete() => self.start_index(c),

            (NameEnded, Space) => self.accept(c, NameEnded),
            (NameEnded, LAngle) => self.start_params(c),
            (NameEnded, LBracket) => self.start_index(c),
            (NameEnded | ParamsEnded | IndexEnded, Close) => return Some(self.close(c)),

            (InParams, LAngle) => {
                self.pending.params_depth += 1;
                self.push_param_char(c);
            }
            (InParams, RAngle) if self.pending.params_depth > 0 => {
                self.pending.params_depth -= 1;
                self.push_param_char(c);
            }
            (InParams, RAngle) => self.accept(c, ParamsEnded),
            (InParams, _) => self.push_param_char(c),

            (ParamsEnded, Space) => self.accept(c, ParamsEnded),
            (ParamsEnded, LBracket) if self.pending.index_raw.is_none() => self.start_index(c),

            (InIndex, RBracket) => {
                let parsed = self
                    .pending
                    .index_raw
                    .as_deref()
                    .and_then(|raw| raw.trim().parse::<i64>().ok());
                match parsed {
                    Some(i) => {
                        self.pending.index = Some(i);
                        self.accept(c, IndexEnded);
                    }
                    None => self.discard(c),
                }
            }
            (InIndex, _) if is_index_char(c) => {
                if let Some(raw) = self.pending.index_raw.as_mut() {
                    raw.push(c);
                }
                self.accept(c, InIndex);
            }

            (IndexEnded, Space) => self.accept(c, IndexEnded),
            (IndexEnded, LAngle) if self.pending.params_raw.is_none() => self.start_params(c),

            _ => self.discard(c),
        }
        None
    }

    fn push_param_char(&mut self, c: char) {
        if let Some(raw) = self.pending.params_raw.as_mut() {
            raw.push(c);
        }
        self.accept(c, State::InParams);
    }
}

impl Iterator for RefParser<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.done {
            return None;
        }
        while let Some(c) = self.chars.next() {
            if let Some(segment) = self.step(c) {
                return Some(segment);
            }
        }
        self.done = true;
        // Unterminated reference: keep its text as literal.
        if self.state != State::Literal {
            let original = std::mem::take(&mut self.pending.original);
            self.pending.literal.push_str(&original);
            self.pending.clear_reference();
            self.state = State::Literal;
        }
        if self.pending.literal.is_empty() {
            None
        } else {
            Some(Segment {
                literal: std::mem::take(&mut self.pending.literal),
                ..Segment::default()
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
