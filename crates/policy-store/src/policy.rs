//! The hierarchical parameter store
//!
//! # Addressing
//!
//! Names are dotted paths. Resolving `a.b.c` walks `a` then `b`, each of
//! which must hold a sub-policy (the most recently added one is used), and
//! applies the operation to `c` inside the innermost policy. Walking never
//! holds more than one lock at a time: the handle of each step is cloned
//! out before the next is locked.
//!
//! # Sharing
//!
//! Sub-policies are held as [`PolicyPtr`] handles. `Clone` (and
//! [`Policy::shallow_copy`]) duplicates the name map but shares every nested
//! policy and file reference; [`Policy::deep_copy`] snapshots nested
//! policies recursively.

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{PolicyError, PolicyResult};
use crate::file::PolicyLoader;
use crate::path::PolicyPath;
use crate::value::{share, FilePtr, PolicyPtr, Value, ValueType, Values};

/// How a write treats an existing sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Replace the whole sequence with the new value
    Set,
    /// Append to the end of the sequence
    Add,
}

/// Ordered, multi-valued, tag-checked configuration store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Policy {
    entries: IndexMap<String, Values>,
}

impl Policy {
    /// Create empty policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level names
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no name has been written
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Values)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ------------------------------------------------------------------
    // Copies
    // ------------------------------------------------------------------

    /// Copy the name map, sharing nested policies and files with `self`
    #[inline]
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// Copy the whole tree; later changes to `self`'s sub-policies are not
    /// visible through the copy
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Sub-policy handle stored under a top-level `segment`
    fn child_policy(&self, segment: &str, path: &PolicyPath, depth: usize) -> PolicyResult<PolicyPtr> {
        match self.entries.get(segment) {
            None => Err(PolicyError::NameNotFound(path.to_string())),
            Some(Values::Policy(list)) => list
                .last()
                .cloned()
                .ok_or_else(|| PolicyError::NameNotFound(path.to_string())),
            Some(other) => Err(PolicyError::type_error(
                path.prefix(depth + 1),
                ValueType::Policy,
                other.value_type(),
            )),
        }
    }

    /// Walk the non-final segments; `None` means the parent is `self`
    fn resolve_parent(&self, path: &PolicyPath) -> PolicyResult<Option<PolicyPtr>> {
        let (_, parents) = path.split_last();
        let mut current: Option<PolicyPtr> = None;
        for (depth, segment) in parents.iter().enumerate() {
            let next = match &current {
                None => self.child_policy(segment, path, depth)?,
                Some(ptr) => ptr.read().child_policy(segment, path, depth)?,
            };
            current = Some(next);
        }
        Ok(current)
    }

    /// Like [`resolve_parent`](Self::resolve_parent), but creates missing
    /// intermediate policies
    fn materialize_parent(&mut self, path: &PolicyPath) -> PolicyResult<Option<PolicyPtr>> {
        let (_, parents) = path.split_last();
        let mut current: Option<PolicyPtr> = None;
        for (depth, segment) in parents.iter().enumerate() {
            let next = match &current {
                None => self.child_or_insert(segment, path, depth)?,
                Some(ptr) => ptr.write().child_or_insert(segment, path, depth)?,
            };
            current = Some(next);
        }
        Ok(current)
    }

    fn child_or_insert(&mut self, segment: &str, path: &PolicyPath, depth: usize) -> PolicyResult<PolicyPtr> {
        if !self.entries.contains_key(segment) {
            trace!(name = %path.prefix(depth + 1), "materializing sub-policy");
            let ptr = share(Policy::new());
            self.entries
                .insert(segment.to_string(), Values::Policy(vec![ptr.clone()]));
            return Ok(ptr);
        }
        self.child_policy(segment, path, depth)
    }

    /// Run `f` against the values stored under `name`
    ///
    /// Missing intermediates and malformed names report `NameNotFound`.
    fn lookup<R>(&self, name: &str, f: impl FnOnce(Option<&Values>) -> R) -> PolicyResult<R> {
        let path: PolicyPath = name
            .parse()
            .map_err(|_| PolicyError::NameNotFound(name.to_string()))?;
        let last = path.last();
        match self.resolve_parent(&path)? {
            None => Ok(f(self.entries.get(last))),
            Some(ptr) => {
                let guard = ptr.read();
                Ok(f(guard.entries.get(last)))
            }
        }
    }

    /// Fetch a typed projection of the values under `name`
    fn get_typed<T>(
        &self,
        name: &str,
        expected: ValueType,
        pick: impl FnOnce(&Values) -> Option<T>,
    ) -> PolicyResult<T> {
        self.lookup(name, |values| match values {
            None => Err(PolicyError::NameNotFound(name.to_string())),
            Some(values) => {
                let actual = values.value_type();
                pick(values).ok_or_else(|| PolicyError::type_error(name, expected, actual))
            }
        })?
    }

    /// Like [`get_typed`](Self::get_typed), but absence yields `default`
    fn get_typed_or<T>(
        &self,
        name: &str,
        expected: ValueType,
        default: T,
        pick: impl FnOnce(&Values) -> Option<T>,
    ) -> PolicyResult<T> {
        match self.get_typed(name, expected, pick) {
            Err(PolicyError::NameNotFound(_)) => Ok(default),
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // Probes (never fail)
    // ------------------------------------------------------------------

    /// True if `name` resolves to at least one value
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name, |v| v.is_some()).unwrap_or(false)
    }

    /// Number of values under `name`; 0 if absent
    #[must_use]
    pub fn value_count(&self, name: &str) -> usize {
        self.lookup(name, |v| v.map_or(0, Values::len)).unwrap_or(0)
    }

    /// Tag of `name`, or [`ValueType::Undefined`] if absent
    #[must_use]
    pub fn get_value_type(&self, name: &str) -> ValueType {
        self.lookup(name, |v| v.map_or(ValueType::Undefined, Values::value_type))
            .unwrap_or(ValueType::Undefined)
    }

    #[must_use]
    pub fn is_bool(&self, name: &str) -> bool {
        self.get_value_type(name) == ValueType::Bool
    }

    #[must_use]
    pub fn is_int(&self, name: &str) -> bool {
        self.get_value_type(name) == ValueType::Int
    }

    #[must_use]
    pub fn is_double(&self, name: &str) -> bool {
        self.get_value_type(name) == ValueType::Double
    }

    #[must_use]
    pub fn is_string(&self, name: &str) -> bool {
        self.get_value_type(name) == ValueType::String
    }

    #[must_use]
    pub fn is_policy(&self, name: &str) -> bool {
        self.get_value_type(name) == ValueType::Policy
    }

    #[must_use]
    pub fn is_file(&self, name: &str) -> bool {
        self.get_value_type(name) == ValueType::File
    }

    // ------------------------------------------------------------------
    // Type information
    // ------------------------------------------------------------------

    /// Tag of `name`
    ///
    /// # Errors
    /// [`PolicyError::NameNotFound`] if `name` does not resolve
    pub fn get_type_info(&self, name: &str) -> PolicyResult<ValueType> {
        self.lookup(name, |v| v.map(Values::value_type))?
            .ok_or_else(|| PolicyError::NameNotFound(name.to_string()))
    }

    /// Tag name of `name` (`"int"`, `"Policy"`, ...)
    ///
    /// # Errors
    /// [`PolicyError::NameNotFound`] if `name` does not resolve
    pub fn get_type_name(&self, name: &str) -> PolicyResult<&'static str> {
        self.get_type_info(name).map(ValueType::name)
    }

    // ------------------------------------------------------------------
    // Scalar accessors: the most recently added value wins
    // ------------------------------------------------------------------

    /// Most recently added value of any tag
    pub fn get(&self, name: &str) -> PolicyResult<Value> {
        self.lookup(name, |v| v.and_then(Values::back))?
            .ok_or_else(|| PolicyError::NameNotFound(name.to_string()))
    }

    pub fn get_bool(&self, name: &str) -> PolicyResult<bool> {
        self.get_typed(name, ValueType::Bool, |v| v.as_bools()?.last().copied())
    }

    pub fn get_int(&self, name: &str) -> PolicyResult<i64> {
        self.get_typed(name, ValueType::Int, |v| v.as_ints()?.last().copied())
    }

    pub fn get_double(&self, name: &str) -> PolicyResult<f64> {
        self.get_typed(name, ValueType::Double, |v| v.as_doubles()?.last().copied())
    }

    pub fn get_string(&self, name: &str) -> PolicyResult<String> {
        self.get_typed(name, ValueType::String, |v| v.as_strings()?.last().cloned())
    }

    /// Shared handle to the sub-policy under `name`
    ///
    /// Fails with `NameNotFound` when absent; see
    /// [`get_or_create_policy`](Self::get_or_create_policy) for the
    /// materializing variant.
    pub fn get_policy(&self, name: &str) -> PolicyResult<PolicyPtr> {
        self.get_typed(name, ValueType::Policy, |v| v.as_policies()?.last().cloned())
    }

    /// Shared handle to the file reference under `name`
    pub fn get_file(&self, name: &str) -> PolicyResult<FilePtr> {
        self.get_typed(name, ValueType::File, |v| v.as_files()?.last().cloned())
    }

    // Defaults apply to absence only; a present name of another tag still fails.

    pub fn get_bool_or(&self, name: &str, default: bool) -> PolicyResult<bool> {
        self.get_typed_or(name, ValueType::Bool, default, |v| v.as_bools()?.last().copied())
    }

    pub fn get_int_or(&self, name: &str, default: i64) -> PolicyResult<i64> {
        self.get_typed_or(name, ValueType::Int, default, |v| v.as_ints()?.last().copied())
    }

    pub fn get_double_or(&self, name: &str, default: f64) -> PolicyResult<f64> {
        self.get_typed_or(name, ValueType::Double, default, |v| {
            v.as_doubles()?.last().copied()
        })
    }

    pub fn get_string_or(&self, name: &str, default: impl Into<String>) -> PolicyResult<String> {
        self.get_typed_or(name, ValueType::String, default.into(), |v| {
            v.as_strings()?.last().cloned()
        })
    }

    // ------------------------------------------------------------------
    // Array accessors: every value, oldest first
    // ------------------------------------------------------------------

    /// Every value of any tag
    pub fn get_values(&self, name: &str) -> PolicyResult<Vec<Value>> {
        self.lookup(name, |v| v.map(Values::to_vec))?
            .ok_or_else(|| PolicyError::NameNotFound(name.to_string()))
    }

    pub fn get_bool_array(&self, name: &str) -> PolicyResult<Vec<bool>> {
        self.get_typed(name, ValueType::Bool, |v| v.as_bools().map(<[bool]>::to_vec))
    }

    pub fn get_int_array(&self, name: &str) -> PolicyResult<Vec<i64>> {
        self.get_typed(name, ValueType::Int, |v| v.as_ints().map(<[i64]>::to_vec))
    }

    pub fn get_double_array(&self, name: &str) -> PolicyResult<Vec<f64>> {
        self.get_typed(name, ValueType::Double, |v| v.as_doubles().map(<[f64]>::to_vec))
    }

    pub fn get_string_array(&self, name: &str) -> PolicyResult<Vec<String>> {
        self.get_typed(name, ValueType::String, |v| v.as_strings().map(<[String]>::to_vec))
    }

    /// Every sub-policy handle under `name`; handles are shared
    pub fn get_policy_array(&self, name: &str) -> PolicyResult<Vec<PolicyPtr>> {
        self.get_typed(name, ValueType::Policy, |v| v.as_policies().map(<[PolicyPtr]>::to_vec))
    }

    /// Every file handle under `name`; handles are shared
    pub fn get_file_array(&self, name: &str) -> PolicyResult<Vec<FilePtr>> {
        self.get_typed(name, ValueType::File, |v| v.as_files().map(<[FilePtr]>::to_vec))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Replace every value under `name` with `value`
    ///
    /// Missing intermediate policies are created.
    ///
    /// # Errors
    /// - [`PolicyError::TypeError`] if `name` already holds another tag, or
    ///   an intermediate segment is not a sub-policy
    /// - [`PolicyError::CyclicReference`] if a policy would contain itself
    /// - [`PolicyError::InvalidName`] for a malformed name
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> PolicyResult<()> {
        self.write(name, value.into(), WriteMode::Set)
    }

    /// Append `value` to the values under `name`
    ///
    /// On a new name this behaves like [`set`](Self::set).
    ///
    /// # Errors
    /// Same as [`set`](Self::set)
    pub fn add(&mut self, name: &str, value: impl Into<Value>) -> PolicyResult<()> {
        self.write(name, value.into(), WriteMode::Add)
    }

    fn write(&mut self, name: &str, value: Value, mode: WriteMode) -> PolicyResult<()> {
        let path: PolicyPath = name.parse().map_err(|source| PolicyError::InvalidName {
            name: name.to_string(),
            source,
        })?;
        match self.materialize_parent(&path)? {
            None => self.write_entry(&path, value, mode),
            Some(ptr) => ptr.write().write_entry(&path, value, mode),
        }
    }

    fn write_entry(&mut self, path: &PolicyPath, value: Value, mode: WriteMode) -> PolicyResult<()> {
        let installed = match &value {
            Value::Policy(ptr) => Some(ptr.clone()),
            Value::File(file) => file.resolved(),
            _ => None,
        };
        if installed.is_some_and(|ptr| contains_self(&ptr, self)) {
            return Err(PolicyError::CyclicReference(path.to_string()));
        }

        let last = path.last();
        trace!(name = %path, ?mode, value_type = %value.value_type(), "writing parameter");
        match self.entries.get_mut(last) {
            None => {
                self.entries.insert(last.to_string(), Values::single(value));
                Ok(())
            }
            Some(existing) => {
                let expected = existing.value_type();
                if expected != value.value_type() {
                    return Err(PolicyError::type_error(
                        path.to_string(),
                        expected,
                        value.value_type(),
                    ));
                }
                match mode {
                    WriteMode::Set => *existing = Values::single(value),
                    WriteMode::Add => existing
                        .push(value)
                        .map_err(|v| PolicyError::type_error(path.to_string(), expected, v.value_type()))?,
                }
                Ok(())
            }
        }
    }

    /// Sub-policy under `name`, creating an empty one (and any missing
    /// intermediates) if the name does not exist yet
    ///
    /// # Errors
    /// [`PolicyError::TypeError`] if `name` or an intermediate holds another tag
    pub fn get_or_create_policy(&mut self, name: &str) -> PolicyResult<PolicyPtr> {
        match self.get_policy(name) {
            Err(PolicyError::NameNotFound(_)) => {
                let ptr = share(Policy::new());
                self.set(name, ptr.clone())?;
                Ok(ptr)
            }
            other => other,
        }
    }

    /// Delete `name` and all of its values
    ///
    /// Returns false if nothing was stored there.
    pub fn remove(&mut self, name: &str) -> bool {
        let Ok(path) = name.parse::<PolicyPath>() else {
            return false;
        };
        let last = path.last();
        match self.resolve_parent(&path) {
            Ok(None) => self.entries.shift_remove(last).is_some(),
            Ok(Some(ptr)) => ptr.write().entries.shift_remove(last).is_some(),
            Err(_) => false,
        }
    }

    /// Fill in every name of `defaults` that `self` lacks
    ///
    /// Sub-policies present on both sides are merged recursively; copied
    /// values are deep copies, so `defaults` stays independent. Names present
    /// in `self` are never overwritten, whatever their tag.
    pub fn merge_defaults(&mut self, defaults: &Policy) {
        for (name, values) in &defaults.entries {
            match (self.entries.get(name), values) {
                (None, _) => {
                    self.entries.insert(name.clone(), values.deep_copy());
                }
                (Some(Values::Policy(mine)), Values::Policy(theirs)) => {
                    if let (Some(mine), Some(theirs)) = (mine.last(), theirs.last()) {
                        if !std::sync::Arc::ptr_eq(mine, theirs) {
                            mine.write().merge_defaults(&theirs.read());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Replace every file reference in the tree with the policy it names
    ///
    /// Files pulled in this way are expanded in turn, up to `max_depth`
    /// levels of nesting. Returns the number of references replaced.
    ///
    /// # Errors
    /// [`PolicyError::LoadError`] for the first reference that fails to
    /// load, when the include chain is deeper than `max_depth`, or when a
    /// file's content is already being expanded further up the chain.
    /// [`PolicyError::CyclicReference`] if a sub-policy is reached again
    /// while it is being expanded.
    pub fn load_policy_files(&mut self, loader: &dyn PolicyLoader, max_depth: usize) -> PolicyResult<usize> {
        let mut replaced = 0;
        for (name, values) in &mut self.entries {
            match values {
                Values::File(files) => {
                    if max_depth == 0 {
                        let path = files.first().map(|f| f.path().to_string()).unwrap_or_default();
                        return Err(PolicyError::load_error(
                            path,
                            "policy file nesting exceeds the configured include depth",
                        ));
                    }
                    let mut resolved = Vec::with_capacity(files.len());
                    for file in files.iter() {
                        let ptr = file.resolve(loader)?;
                        let Some(mut content) = ptr.try_write() else {
                            return Err(PolicyError::load_error(
                                file.path().to_string(),
                                "policy file includes itself",
                            ));
                        };
                        replaced += 1 + content.load_policy_files(loader, max_depth - 1)?;
                        drop(content);
                        resolved.push(ptr);
                    }
                    *values = Values::Policy(resolved);
                }
                Values::Policy(children) => {
                    for child in children.iter() {
                        let Some(mut child) = child.try_write() else {
                            return Err(PolicyError::CyclicReference(name.clone()));
                        };
                        replaced += child.load_policy_files(loader, max_depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(replaced)
    }

    // ------------------------------------------------------------------
    // Name listings (top level only)
    // ------------------------------------------------------------------

    fn names_where(&self, keep: impl Fn(ValueType) -> bool) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, v)| keep(v.value_type()))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Every top-level name, in insertion order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Top-level names holding sub-policies
    #[must_use]
    pub fn policy_names(&self) -> Vec<String> {
        self.names_where(|t| t == ValueType::Policy)
    }

    /// Top-level names holding plain parameters (bool, int, double, string)
    #[must_use]
    pub fn param_names(&self) -> Vec<String> {
        self.names_where(ValueType::is_scalar)
    }

    /// Top-level names holding file references
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.names_where(|t| t == ValueType::File)
    }
}

/// True if installing `candidate` into `target` would create a cycle
///
/// A handle that cannot be read-locked is being written somewhere up the
/// current call chain, which in single-threaded use means it is an ancestor
/// of `target`; it is treated as a cycle.
fn contains_self(candidate: &PolicyPtr, target: &Policy) -> bool {
    let Some(guard) = candidate.try_read() else {
        return true;
    };
    if std::ptr::eq(&*guard, target) {
        return true;
    }
    guard.entries.values().any(|values| match values {
        Values::Policy(children) => children.iter().any(|c| contains_self(c, target)),
        Values::File(files) => files
            .iter()
            .filter_map(|file| file.resolved())
            .any(|content| contains_self(&content, target)),
        _ => false,
    })
}
