//! Format detection and parser dispatch
//!
//! A [`ParserRegistry`] holds [`ParserFactory`] implementations in
//! registration order. Detection looks at the leading lines of a stream
//! (comments plus the first content line):
//!
//! 1. Any factory that finds its explicit content-type declaration wins.
//! 2. Otherwise the first factory, in registration order, whose weak
//!    heuristic accepts the leaders is used.
//!
//! An explicit declaration is therefore never shadowed by another format's
//! heuristic, and the fallback format is chosen by registering it first.

use crate::error::{ParseError, ParseResult};
use policy_store::Policy;
use std::io::{self, BufRead, Cursor, Read};
use std::sync::Arc;
use tracing::debug;

pub mod paf;

pub use paf::{to_paf_string, PafParser, PafParserFactory, PafWriter};

/// Default cap on the bytes buffered for format detection
pub const DEFAULT_MAX_LEADER_BYTES: usize = 4096;

/// Parses one stream into one target policy
///
/// Parsers are single-use: `parse` consumes the parser.
pub trait PolicyParser {
    /// Parse the whole stream, returning the number of parameter
    /// declarations applied
    ///
    /// # Errors
    /// Returns [`ParseError::Syntax`] on malformed input (and, in strict
    /// mode, on unrecognized constructs) or [`ParseError::Store`] when the
    /// target rejects a declaration
    fn parse(self: Box<Self>, input: &mut dyn BufRead) -> ParseResult<usize>;
}

/// Capability bundle for one text format
///
/// Implement this trait to add support for new formats.
pub trait ParserFactory: Send + Sync + 'static {
    /// Short format name (`"PAF"`)
    fn format_name(&self) -> &str;

    /// True if `leaders` carry this format's explicit content-type declaration
    fn declares(&self, leaders: &str) -> bool;

    /// True if `leaders` look like this format, by declaration or by
    /// heuristic
    fn recognize(&self, leaders: &str) -> bool {
        self.declares(leaders)
    }

    /// Create a parser that writes into `target`
    fn create_parser<'a>(&self, target: &'a mut Policy, strict: bool) -> Box<dyn PolicyParser + 'a>;
}

/// Ordered set of format factories
#[derive(Clone)]
pub struct ParserRegistry {
    factories: Vec<Arc<dyn ParserFactory>>,
    max_leader_bytes: usize,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.format_names())
            .field("max_leader_bytes", &self.max_leader_bytes)
            .finish()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            max_leader_bytes: DEFAULT_MAX_LEADER_BYTES,
        }
    }

    /// Cap the bytes buffered for detection
    #[inline]
    #[must_use]
    pub fn with_max_leader_bytes(mut self, max: usize) -> Self {
        self.max_leader_bytes = max;
        self
    }

    /// Register a factory after all existing ones
    pub fn register<F: ParserFactory>(&mut self, factory: F) {
        self.factories.push(Arc::new(factory));
    }

    /// Registered format names, in registration order
    #[must_use]
    pub fn format_names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.format_name()).collect()
    }

    /// Look up a factory by format name (case-insensitive)
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&dyn ParserFactory> {
        self.factories
            .iter()
            .find(|f| f.format_name().eq_ignore_ascii_case(name))
            .map(|f| &**f)
    }

    /// Choose the factory for the given leading lines
    #[must_use]
    pub fn detect(&self, leaders: &str) -> Option<&dyn ParserFactory> {
        self.factories
            .iter()
            .find(|f| f.declares(leaders))
            .or_else(|| self.factories.iter().find(|f| f.recognize(leaders)))
            .map(|f| &**f)
    }

    /// Detect the stream's format and parse it into `target`
    ///
    /// # Errors
    /// [`ParseError::FormatUnrecognized`] if no factory claims the stream,
    /// otherwise whatever the chosen parser reports
    pub fn parse(&self, input: &mut dyn BufRead, target: &mut Policy, strict: bool) -> ParseResult<usize> {
        let leaders = read_leaders(input, self.max_leader_bytes)
            .map_err(|e| ParseError::io_error("<stream>", e))?;
        let factory = self.detect(&leaders).ok_or(ParseError::FormatUnrecognized)?;
        debug!(format = factory.format_name(), strict, "detected policy format");

        let mut stream = Cursor::new(leaders.into_bytes()).chain(input);
        factory.create_parser(target, strict).parse(&mut stream)
    }

    /// Parse `input` with the named format, skipping detection
    ///
    /// # Errors
    /// [`ParseError::UnknownFormat`] if `format` is not registered
    pub fn parse_as(
        &self,
        format: &str,
        input: &mut dyn BufRead,
        target: &mut Policy,
        strict: bool,
    ) -> ParseResult<usize> {
        let factory = self
            .find_by_name(format)
            .ok_or_else(|| ParseError::UnknownFormat(format.to_string()))?;
        factory.create_parser(target, strict).parse(input)
    }
}

/// Read lines until the first non-blank, non-comment line has been
/// consumed, or `max_bytes` have been read
///
/// The cap applies inside a line too, so one long first line is cut short.
/// A cut that lands inside a multi-byte character extends to its end.
///
/// # Errors
/// Propagates read failures, including invalid UTF-8
pub fn read_leaders(input: &mut dyn BufRead, max_bytes: usize) -> io::Result<String> {
    let mut bytes = Vec::new();
    while bytes.len() < max_bytes {
        let start = bytes.len();
        let budget = (max_bytes - start) as u64;
        if (&mut *input).take(budget).read_until(b'\n', &mut bytes)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&bytes[start..]);
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            break;
        }
    }
    finish_char(input, &mut bytes)?;
    String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn finish_char(input: &mut dyn BufRead, bytes: &mut Vec<u8>) -> io::Result<()> {
    // error_len() is None only for a sequence truncated at the end
    while let Err(err) = std::str::from_utf8(bytes) {
        if err.error_len().is_some() {
            break;
        }
        let mut byte = [0u8; 1];
        if input.read(&mut byte)? == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(())
}

/// Create default parser registry with built-in formats
#[inline]
#[must_use]
pub fn default_registry() -> ParserRegistry {
    let mut registry = ParserRegistry::new();

    // PAF is registered first: its heuristic is the fallback
    registry.register(PafParserFactory);

    registry
}
