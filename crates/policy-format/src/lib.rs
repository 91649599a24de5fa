//! Policy Formats
//!
//! Turns configuration text into [`Policy`](policy_store::Policy) trees.
//!
//! # Core Operations
//!
//! - **Detect**: buffer the leading lines of a stream and pick a
//!   [`ParserFactory`] (explicit `# <?cfg FORMAT ?>` declarations first,
//!   then heuristics in registration order)
//! - **Parse**: run the chosen [`PolicyParser`] over the whole stream
//! - **Load**: open files, parse them and expand `@file` references
//!   through [`FileLoader`]
//! - **Render**: write a policy back out as PAF with [`PafWriter`]
//!
//! # Architecture
//!
//! ```text
//! bytes → read_leaders → ParserRegistry::detect → ParserFactory
//!                                                      ↓
//!                     Policy ← PolicyParser::parse ← leaders + rest of stream
//! ```
//!
//! # Example
//!
//! ```rust
//! use policy_format::parse_str;
//!
//! # fn main() -> Result<(), policy_format::ParseError> {
//! let policy = parse_str(
//!     "# <?cfg PAF policy ?>\n\
//!      doall = \"true\"\n\
//!      a.b.c = 1\n\
//!      a: { b: { d = 2 } }\n",
//!     true,
//! )?;
//!
//! assert_eq!(policy.get_string("doall")?, "true");
//! assert!(policy.get_int("doall").is_err());
//! assert_eq!(policy.get_int("a.b.c")?, 1);
//! assert_eq!(policy.get_int("a.b.d")?, 2);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod error;
pub mod loader;
pub mod parsers;

// Re-exports for convenience
pub use error::{ParseError, ParseResult};
pub use loader::{load_policy, parse_into, parse_str, FileLoader, LoaderConfig};
pub use parsers::{
    default_registry, read_leaders, to_paf_string, PafParser, PafParserFactory, PafWriter, ParserFactory,
    ParserRegistry, PolicyParser,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for reading and writing policies
    pub use crate::error::{ParseError, ParseResult};
    pub use crate::loader::{load_policy, parse_str, FileLoader, LoaderConfig};
    pub use crate::parsers::{default_registry, PafParserFactory, PafWriter, ParserFactory, ParserRegistry};
    pub use policy_store::{Policy, PolicyError, PolicyFile, PolicyLoader, Value, ValueType};
}
