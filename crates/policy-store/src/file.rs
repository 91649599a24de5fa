//! Lazy references to externally stored policies
//!
//! A [`PolicyFile`] holds only an identifier until someone asks for its
//! content. Resolution goes through a [`PolicyLoader`], which is the seam
//! where format detection and parsing plug in.

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};
use crate::policy::Policy;
use crate::value::{share, PolicyPtr};

/// Turns a policy file identifier into a populated policy
///
/// Implementations decide what the identifier means (filesystem path,
/// in-memory fixture name, ...).
pub trait PolicyLoader {
    /// Load and parse the policy named by `path`
    ///
    /// # Errors
    /// Returns [`PolicyError::LoadError`] if the source cannot be read or parsed
    fn load(&self, path: &str) -> PolicyResult<Policy>;
}

impl<L: PolicyLoader + ?Sized> PolicyLoader for &L {
    fn load(&self, path: &str) -> PolicyResult<Policy> {
        (**self).load(path)
    }
}

/// Deferred reference to an external policy
///
/// The first successful [`resolve`](Self::resolve) caches the loaded tree;
/// later calls hand back the same shared handle without loading again. A
/// failed resolution caches nothing.
#[derive(Debug, Default)]
pub struct PolicyFile {
    path: String,
    resolved: OnceCell<PolicyPtr>,
}

impl PolicyFile {
    /// Create an unresolved reference
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            resolved: OnceCell::new(),
        }
    }

    /// The external identifier; never triggers resolution
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether content has been loaded
    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Cached content, if already resolved
    #[inline]
    #[must_use]
    pub fn resolved(&self) -> Option<PolicyPtr> {
        self.resolved.get().cloned()
    }

    /// Load the referenced policy, or return the cached one
    ///
    /// # Errors
    /// Returns [`PolicyError::LoadError`] if the loader fails; errors of any
    /// other kind coming out of the loader are wrapped into one
    pub fn resolve(&self, loader: &dyn PolicyLoader) -> PolicyResult<PolicyPtr> {
        self.resolved
            .get_or_try_init(|| {
                debug!(path = %self.path, "resolving policy file");
                match loader.load(&self.path) {
                    Ok(policy) => Ok(share(policy)),
                    Err(err @ PolicyError::LoadError { .. }) => Err(err),
                    Err(other) => Err(PolicyError::load_error(self.path.clone(), other)),
                }
            })
            .cloned()
    }

    pub(crate) fn deep_copy(&self) -> Self {
        let copy = Self::new(self.path.clone());
        if let Some(content) = self.resolved.get() {
            let _ = copy.resolved.set(share(content.read().deep_copy()));
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;

    struct CountingLoader {
        calls: Cell<usize>,
        fail: bool,
    }

    impl CountingLoader {
        fn new(fail: bool) -> Self {
            Self {
                calls: Cell::new(0),
                fail,
            }
        }
    }

    impl PolicyLoader for CountingLoader {
        fn load(&self, path: &str) -> PolicyResult<Policy> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(PolicyError::NameNotFound(path.to_string()));
            }
            let mut policy = Policy::new();
            policy.set("source", path)?;
            Ok(policy)
        }
    }

    #[test]
    fn path_does_not_resolve() {
        let file = PolicyFile::new("test.paf");
        assert_eq!(file.path(), "test.paf");
        assert!(!file.is_resolved());
        assert!(file.resolved().is_none());
    }

    #[test]
    fn resolve_caches_content() {
        let loader = CountingLoader::new(false);
        let file = PolicyFile::new("sub.paf");

        let first = file.resolve(&loader).unwrap();
        let second = file.resolve(&loader).unwrap();

        assert_eq!(loader.calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.read().get_string("source").unwrap(), "sub.paf");
        assert!(file.is_resolved());
    }

    #[test]
    fn failed_resolve_is_load_error_and_retries() {
        let loader = CountingLoader::new(true);
        let file = PolicyFile::new("missing.paf");

        let err = file.resolve(&loader).unwrap_err();
        assert!(err.is_load_error());
        assert!(!file.is_resolved());

        let _ = file.resolve(&loader);
        assert_eq!(loader.calls.get(), 2);
    }

    #[test]
    fn deep_copy_snapshots_resolved_content() {
        let loader = CountingLoader::new(false);
        let file = PolicyFile::new("sub.paf");
        let original = file.resolve(&loader).unwrap();

        let copy = file.deep_copy();
        original.write().set("late", true).unwrap();

        let copied = copy.resolved().unwrap();
        assert!(!Arc::ptr_eq(&copied, &original));
        assert!(!copied.read().exists("late"));
        assert_eq!(copy.path(), "sub.paf");
    }
}
