//! Recursive-descent parser for PAF declarations
//!
//! ```text
//! document    := item*
//! item        := NAME ('=' | ':') value+ EOL
//!              | NAME ('=' | ':')? '{' item* '}'
//! value       := STRING | WORD | '@' PATH
//! ```
//!
//! Every declaration appends to the target. A block reuses the newest
//! sub-policy under its name unless that sub-policy was itself opened by a
//! block earlier in the same parse, in which case a new element is added.

use std::collections::HashSet;
use std::io::BufRead;
use std::sync::Arc;

use once_cell::sync::Lazy;
use policy_store::{share, Policy, PolicyError, PolicyFile, PolicyPath, PolicyPtr, Value, ValueType};
use regex::Regex;
use tracing::{debug, warn};

use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{ParseError, ParseResult};
use crate::parsers::PolicyParser;

/// Deepest block nesting accepted
pub const MAX_BLOCK_DEPTH: usize = 64;

static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("invalid integer pattern"));

static DOUBLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").expect("invalid double pattern")
});

/// Words that start like a number must parse as one
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\.?\d").expect("invalid numeric pattern"));

/// Parser for the PAF text format
///
/// Created by [`PafParserFactory`](super::PafParserFactory); writes into a
/// borrowed target policy.
#[derive(Debug)]
pub struct PafParser<'a> {
    target: &'a mut Policy,
    strict: bool,
}

impl<'a> PafParser<'a> {
    /// Create parser writing into `target`
    #[must_use]
    pub fn new(target: &'a mut Policy, strict: bool) -> Self {
        Self { target, strict }
    }

    /// Parse a complete document held in memory
    ///
    /// # Errors
    /// Same as [`PolicyParser::parse`]
    pub fn parse_str(self, source: &str) -> ParseResult<usize> {
        let tokens = tokenize(source)?;
        let mut state = ParseState {
            tokens,
            pos: 0,
            strict: self.strict,
            opened_by_block: HashSet::new(),
            applied: 0,
        };
        state.items(self.target, None)?;
        debug!(declarations = state.applied, strict = self.strict, "parsed PAF document");
        Ok(state.applied)
    }
}

impl PolicyParser for PafParser<'_> {
    fn parse(self: Box<Self>, input: &mut dyn BufRead) -> ParseResult<usize> {
        let mut source = String::new();
        input
            .read_to_string(&mut source)
            .map_err(|e| ParseError::io_error("<stream>", e))?;
        (*self).parse_str(&source)
    }
}

/// Position of the `{` that opened the enclosing block, and its depth
#[derive(Debug, Clone, Copy)]
struct Block {
    line: usize,
    column: usize,
    depth: usize,
}

struct ParseState {
    tokens: Vec<Token>,
    pos: usize,
    strict: bool,
    /// Addresses of sub-policies created by `{ }` blocks in this parse
    opened_by_block: HashSet<usize>,
    applied: usize,
}

fn address(ptr: &PolicyPtr) -> usize {
    Arc::as_ptr(ptr) as usize
}

impl ParseState {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn current(&self) -> Token {
        self.tokens.get(self.pos).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            line: self.tokens.last().map_or(1, |t| t.line),
            column: self.tokens.last().map_or(1, |t| t.column),
        })
    }

    fn advance(&mut self) -> Token {
        let token = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Fail in strict mode; otherwise log and skip the rest of the line
    fn reject(&mut self, at: &Token, message: String, block: Option<Block>) -> ParseResult<()> {
        if self.strict {
            return Err(ParseError::syntax(at.line, at.column, message));
        }
        warn!(line = at.line, column = at.column, %message, "skipping unrecognized PAF construct");
        loop {
            match self.peek() {
                TokenKind::Eof => return Ok(()),
                TokenKind::Newline => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::RBrace if block.is_some() => return Ok(()),
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Parse items until end of input or the `}` closing `block`
    fn items(&mut self, target: &mut Policy, block: Option<Block>) -> ParseResult<()> {
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Newline => {}
                TokenKind::Eof => {
                    return match block {
                        Some(open) => Err(ParseError::syntax(open.line, open.column, "unterminated block")),
                        None => Ok(()),
                    };
                }
                TokenKind::RBrace if block.is_some() => return Ok(()),
                TokenKind::Word(ref name) => {
                    let name = name.clone();
                    self.declaration(target, &name, &token, block)?;
                }
                ref other => {
                    let message = format!("expected a parameter name, found {}", other.describe());
                    self.reject(&token, message, block)?;
                }
            }
        }
    }

    fn declaration(&mut self, target: &mut Policy, name: &str, at: &Token, block: Option<Block>) -> ParseResult<()> {
        if name.parse::<PolicyPath>().is_err() {
            return self.reject(at, format!("invalid parameter name '{name}'"), block);
        }

        let separated = matches!(self.peek(), TokenKind::Equals | TokenKind::Colon);
        if separated {
            self.advance();
        }

        match self.peek() {
            TokenKind::LBrace => {
                let open = self.advance();
                self.block(target, name, &open, block)
            }
            _ if !separated => {
                let found = self.current();
                let message = format!("expected '=', ':' or '{{' after '{name}', found {}", found.kind.describe());
                self.reject(&found, message, block)
            }
            TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace => {
                let found = self.current();
                self.reject(&found, format!("missing value for '{name}'"), block)
            }
            _ => self.assignment(target, name, at, block),
        }
    }

    fn block(&mut self, target: &mut Policy, name: &str, open: &Token, outer: Option<Block>) -> ParseResult<()> {
        let depth = outer.map_or(1, |b| b.depth + 1);
        if depth > MAX_BLOCK_DEPTH {
            return Err(ParseError::syntax(
                open.line,
                open.column,
                format!("blocks nested deeper than {MAX_BLOCK_DEPTH}"),
            ));
        }

        let child = self.block_target(target, name, open.line)?;
        self.applied += 1;
        let mut guard = child.write();
        self.items(
            &mut guard,
            Some(Block {
                line: open.line,
                column: open.column,
                depth,
            }),
        )
    }

    /// Policy a block for `name` writes into
    fn block_target(&mut self, target: &mut Policy, name: &str, line: usize) -> ParseResult<PolicyPtr> {
        match target.get_policy(name) {
            Ok(ptr) if !self.opened_by_block.contains(&address(&ptr)) => return Ok(ptr),
            Ok(_) | Err(PolicyError::NameNotFound(_)) => {}
            Err(source) => return Err(ParseError::Store { line, source }),
        }
        let ptr = share(Policy::new());
        target
            .add(name, ptr.clone())
            .map_err(|source| ParseError::Store { line, source })?;
        self.opened_by_block.insert(address(&ptr));
        Ok(ptr)
    }

    fn assignment(&mut self, target: &mut Policy, name: &str, at: &Token, block: Option<Block>) -> ParseResult<()> {
        let mut values = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Newline | TokenKind::Eof | TokenKind::RBrace => break,
                TokenKind::Equals | TokenKind::Colon | TokenKind::LBrace => {
                    let found = self.current();
                    let message = format!("unexpected {} in value list of '{name}'", found.kind.describe());
                    return self.reject(&found, message, block);
                }
                _ => {
                    let token = self.advance();
                    values.push((literal(&token)?, token));
                }
            }
        }

        let values = unify(values)?;
        for value in values {
            target
                .add(name, value)
                .map_err(|source| ParseError::Store { line: at.line, source })?;
        }
        self.applied += 1;
        Ok(())
    }
}

/// Interpret a single value token
fn literal(token: &Token) -> ParseResult<Value> {
    match &token.kind {
        TokenKind::Quoted(s) => Ok(Value::String(s.clone())),
        TokenKind::FileRef(path) => Ok(Value::from(PolicyFile::new(path.clone()))),
        TokenKind::Word(word) => word_literal(word, token),
        other => Err(ParseError::syntax(
            token.line,
            token.column,
            format!("expected a value, found {}", other.describe()),
        )),
    }
}

fn word_literal(word: &str, token: &Token) -> ParseResult<Value> {
    if word.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if word.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }
    match word.to_ascii_lowercase().as_str() {
        "nan" => return Ok(Value::Double(f64::NAN)),
        "inf" | "+inf" => return Ok(Value::Double(f64::INFINITY)),
        "-inf" => return Ok(Value::Double(f64::NEG_INFINITY)),
        _ => {}
    }
    if INT_RE.is_match(word) {
        return word.parse::<i64>().map(Value::Int).map_err(|_| {
            ParseError::syntax(token.line, token.column, format!("integer out of range: {word}"))
        });
    }
    if DOUBLE_RE.is_match(word) {
        return word.parse::<f64>().map(Value::Double).map_err(|_| {
            ParseError::syntax(token.line, token.column, format!("malformed number: {word}"))
        });
    }
    if NUMERIC_RE.is_match(word) {
        return Err(ParseError::syntax(token.line, token.column, format!("malformed number: {word}")));
    }
    Ok(Value::String(word.to_string()))
}

/// Check that a value list holds one tag, promoting an Int/Double mix to Double
fn unify(values: Vec<(Value, Token)>) -> ParseResult<Vec<Value>> {
    let has_double = values.iter().any(|(v, _)| v.value_type() == ValueType::Double);
    let mut unified = Vec::with_capacity(values.len());
    let mut expected: Option<ValueType> = None;

    for (value, token) in values {
        #[allow(clippy::cast_precision_loss)]
        let value = match value {
            Value::Int(i) if has_double => Value::Double(i as f64),
            other => other,
        };
        let actual = value.value_type();
        match expected {
            None => expected = Some(actual),
            Some(t) if t == actual => {}
            Some(t) => {
                return Err(ParseError::syntax(
                    token.line,
                    token.column,
                    format!("cannot mix {t} and {actual} values in one declaration"),
                ));
            }
        }
        unified.push(value);
    }
    Ok(unified)
}
