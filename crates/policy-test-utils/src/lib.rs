//! Testing utilities for the policy workspace
//!
//! Shared fixtures, sample trees and an in-memory loader.

#![allow(missing_docs)]

use policy_store::{Policy, PolicyError, PolicyFile, PolicyLoader, PolicyResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Dotted names and nested blocks describing the same tree
pub const DICTIONARY_PAF: &str = "\
# <?cfg PAF dictionary ?>
target: Dictionary

Dictionary.definition.standalone.minOccurs = 1
Dictionary: {
    definition: {
        standalone: {
            type = \"int\"
            score: 3.4 1.355
        }
    }
}
";

/// Every literal kind once
pub const SCALARS_PAF: &str = "\
# <?cfg PAF policy ?>
doall = \"true\"
verbose = false
count = 12
ratio = 0.25
label = plain
include = @\"inner.paf\"
";

/// A document without a declaration line
pub const UNDECLARED_PAF: &str = "\
# comments only, no declaration
name: value
";

/// Lines a lenient parse skips and a strict parse rejects
pub const SLOPPY_PAF: &str = "\
good = 1
= stray
9bad = 2
also.good = 3
";

/// `doall = "true"`, `Dictionary.definition.standalone.{minOccurs,score}`
/// and a `runs` policy array of two elements
pub fn sample_policy() -> Policy {
    let mut p = Policy::new();
    p.set("doall", "true").unwrap();
    p.set("Dictionary.definition.standalone.minOccurs", 1).unwrap();
    p.add("Dictionary.definition.standalone.score", 3.4).unwrap();
    for id in 0..2 {
        let mut run = Policy::new();
        run.set("id", id).unwrap();
        p.add("runs", run).unwrap();
    }
    p
}

/// In-memory [`PolicyLoader`] keyed by path, counting loads
#[derive(Debug, Default)]
pub struct MemoryLoader {
    policies: HashMap<String, Policy>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` under `path`
    pub fn with(mut self, path: &str, policy: Policy) -> Self {
        self.policies.insert(path.to_string(), policy);
        self
    }

    /// Number of successful and failed `load` calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl PolicyLoader for MemoryLoader {
    fn load(&self, path: &str) -> PolicyResult<Policy> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.policies
            .get(path)
            .map(Policy::deep_copy)
            .ok_or_else(|| PolicyError::load_error(path, format!("no fixture named {path}")))
    }
}

/// Loader whose `outer.paf` includes `inner.paf`
pub fn nested_loader() -> MemoryLoader {
    let mut outer = Policy::new();
    outer.set("level", "outer").unwrap();
    outer.set("inner", PolicyFile::new("inner.paf")).unwrap();

    let mut inner = Policy::new();
    inner.set("level", "inner").unwrap();

    MemoryLoader::new().with("outer.paf", outer).with("inner.paf", inner)
}
