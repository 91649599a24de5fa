//! Loading policies from files
//!
//! [`FileLoader`] is the filesystem [`PolicyLoader`]: it opens the named
//! file, detects its format through a [`ParserRegistry`] and parses it.
//! Relative file references resolve against [`LoaderConfig::base_dir`]
//! (or the process working directory when unset).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use policy_store::{Policy, PolicyError, PolicyLoader, PolicyResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ParseError, ParseResult};
use crate::parsers::{default_registry, ParserRegistry, DEFAULT_MAX_LEADER_BYTES};

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Fail on unrecognized syntax instead of skipping it
    pub strict: bool,
    /// Bytes buffered for format detection
    pub max_leader_bytes: usize,
    /// Directory relative file references resolve against
    pub base_dir: Option<PathBuf>,
    /// Longest chain of nested file references expanded
    pub max_include_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strict: true,
            max_leader_bytes: DEFAULT_MAX_LEADER_BYTES,
            base_dir: None,
            max_include_depth: 16,
        }
    }
}

impl LoaderConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With strict or lenient parsing
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// With detection buffer size
    #[inline]
    #[must_use]
    pub fn with_max_leader_bytes(mut self, max: usize) -> Self {
        self.max_leader_bytes = max;
        self
    }

    /// With base directory for relative references
    #[inline]
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// With include depth limit
    #[inline]
    #[must_use]
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Read configuration from TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// [`ParseError::Config`] on malformed TOML or mistyped keys
    pub fn from_toml_str(text: &str) -> ParseResult<Self> {
        toml::from_str(text).map_err(|e| ParseError::Config(e.to_string()))
    }
}

/// Filesystem-backed [`PolicyLoader`]
#[derive(Debug, Clone)]
pub struct FileLoader {
    config: LoaderConfig,
    registry: ParserRegistry,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl FileLoader {
    /// Create loader using the built-in formats
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        let registry = default_registry().with_max_leader_bytes(config.max_leader_bytes);
        Self { config, registry }
    }

    /// Use a custom registry (the configured leader cap still applies)
    #[must_use]
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry.with_max_leader_bytes(self.config.max_leader_bytes);
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Apply the base directory to a relative path
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.config.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Parse one file; file references inside stay unresolved
    ///
    /// # Errors
    /// [`ParseError::Io`] if the file cannot be opened, otherwise the parse
    /// failure wrapped in [`ParseError::File`]
    pub fn load_file(&self, path: impl AsRef<Path>) -> ParseResult<Policy> {
        let resolved = self.resolve_path(path.as_ref());
        debug!(path = %resolved.display(), strict = self.config.strict, "loading policy file");

        let file = File::open(&resolved).map_err(|e| ParseError::io_error(&resolved, e))?;
        let mut reader = BufReader::new(file);
        let mut policy = Policy::new();
        self.registry
            .parse(&mut reader, &mut policy, self.config.strict)
            .map_err(|e| e.in_file(&resolved))?;
        Ok(policy)
    }

    /// Parse one file and replace every file reference in it, recursively,
    /// by the policy it names
    ///
    /// # Errors
    /// As [`load_file`](Self::load_file); include failures and chains deeper
    /// than [`LoaderConfig::max_include_depth`] surface as
    /// [`ParseError::Policy`] wrapping [`PolicyError::LoadError`]
    pub fn load_file_expanded(&self, path: impl AsRef<Path>) -> ParseResult<Policy> {
        let mut policy = self.load_file(path)?;
        let expanded = policy.load_policy_files(self, self.config.max_include_depth)?;
        debug!(expanded, "expanded policy file references");
        Ok(policy)
    }
}

impl PolicyLoader for FileLoader {
    fn load(&self, path: &str) -> PolicyResult<Policy> {
        self.load_file(path).map_err(|e| match e {
            ParseError::Policy(inner @ PolicyError::LoadError { .. }) => inner,
            other => PolicyError::load_error(path, other),
        })
    }
}

/// Load `path` with all file references expanded
///
/// # Errors
/// See [`FileLoader::load_file_expanded`]
pub fn load_policy(path: impl AsRef<Path>, config: &LoaderConfig) -> ParseResult<Policy> {
    FileLoader::new(config.clone()).load_file_expanded(path)
}

/// Parse in-memory text with format detection
///
/// # Errors
/// Detection and parse failures from [`ParserRegistry::parse`]
pub fn parse_str(text: &str, strict: bool) -> ParseResult<Policy> {
    let mut policy = Policy::new();
    parse_into(text, &mut policy, strict)?;
    Ok(policy)
}

/// Parse in-memory text into an existing policy, returning the number of
/// declarations applied
///
/// # Errors
/// Detection and parse failures from [`ParserRegistry::parse`]
pub fn parse_into(text: &str, target: &mut Policy, strict: bool) -> ParseResult<usize> {
    let mut input = text.as_bytes();
    default_registry().parse(&mut input, target, strict)
}
