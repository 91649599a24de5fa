//! Policy Store
//!
//! Hierarchical, multi-valued, tag-checked configuration store.
//!
//! # Core Concepts
//!
//! - [`Policy`]: ordered mapping from names to value sequences
//! - [`Value`] / [`ValueType`]: closed set of value kinds; a name never mixes them
//! - [`PolicyPtr`]: shared handle to a nested policy (no copy on access)
//! - [`PolicyFile`]: lazy reference to an external policy, resolved through a [`PolicyLoader`]
//! - [`PolicyPath`]: dotted names addressing nested policies
//!
//! # Example
//!
//! ```rust
//! use policy_store::Policy;
//!
//! # fn main() -> Result<(), policy_store::PolicyError> {
//! let mut policy = Policy::new();
//! policy.set("Dictionary.definition.standalone.minOccurs", 1)?;
//!
//! // Handles share the stored sub-tree
//! let standalone = policy.get_policy("Dictionary.definition.standalone")?;
//! standalone.write().set("type", "int")?;
//! assert_eq!(policy.get_string("Dictionary.definition.standalone.type")?, "int");
//!
//! // Repeated adds accumulate; scalar reads return the newest value
//! policy.add("score", 3.4)?;
//! policy.add("score", 1.355)?;
//! assert_eq!(policy.get_double("score")?, 1.355);
//! assert_eq!(policy.get_double_array("score")?, vec![3.4, 1.355]);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod error;
mod file;
mod path;
mod policy;
mod value;

// Re-exports
pub use error::{BoxError, PolicyError, PolicyResult};
pub use file::{PolicyFile, PolicyLoader};
pub use path::{PathError, PolicyPath};
pub use policy::Policy;
pub use value::{share, FilePtr, PolicyPtr, Value, ValueType, Values};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
