//! PAF: the native policy text format
//!
//! ```text
//! # <?cfg PAF policy ?>
//! name = "value"
//! sizes: 1 2 3
//! Dictionary.definition.standalone.minOccurs = 1
//! database: {
//!     host: localhost
//!     include = @"conf/extra.paf"
//! }
//! ```

mod lexer;
mod parser;
mod writer;

use once_cell::sync::Lazy;
use policy_store::Policy;
use regex::Regex;

use super::{ParserFactory, PolicyParser};

pub use parser::{PafParser, MAX_BLOCK_DEPTH};
pub use writer::{to_paf_string, PafWriter};

static DECLARATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^\s*#\s*<\?cfg\s+PAF(\s+\w+)*\s*\?>").expect("invalid declaration pattern")
});

/// A content line starting with a word character
static HEURISTIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*\w").expect("invalid heuristic pattern"));

/// Factory for [`PafParser`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PafParserFactory;

impl PafParserFactory {
    /// Name reported by [`ParserFactory::format_name`]
    pub const FORMAT_NAME: &'static str = "PAF";
}

impl ParserFactory for PafParserFactory {
    fn format_name(&self) -> &str {
        Self::FORMAT_NAME
    }

    fn declares(&self, leaders: &str) -> bool {
        DECLARATION_RE.is_match(leaders)
    }

    fn recognize(&self, leaders: &str) -> bool {
        self.declares(leaders) || HEURISTIC_RE.is_match(leaders)
    }

    fn create_parser<'a>(&self, target: &'a mut Policy, strict: bool) -> Box<dyn PolicyParser + 'a> {
        Box::new(PafParser::new(target, strict))
    }
}
