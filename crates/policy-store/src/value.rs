//! Parameter values
//!
//! A name in a [`Policy`] holds a non-empty, ordered sequence of values that
//! all share one [`ValueType`]. [`Values`] stores one `Vec` per tag so that a
//! mixed sequence cannot be represented at all.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::file::PolicyFile;
use crate::policy::Policy;

/// Shared handle to a nested policy
///
/// Returned by accessors without copying: mutations through the handle are
/// visible through every other holder.
pub type PolicyPtr = Arc<RwLock<Policy>>;

/// Shared handle to a lazily resolved policy file
pub type FilePtr = Arc<PolicyFile>;

/// Wrap a policy in a fresh shared handle
#[inline]
#[must_use]
pub fn share(policy: Policy) -> PolicyPtr {
    Arc::new(RwLock::new(policy))
}

/// The tag of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// The name does not exist
    Undefined,
    Bool,
    Int,
    Double,
    String,
    /// Nested sub-policy
    Policy,
    /// Reference to an external policy file
    File,
}

impl ValueType {
    /// Human-readable tag name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
            Self::Policy => "Policy",
            Self::File => "PolicyFile",
        }
    }

    /// True for the plain parameter kinds (bool, int, double, string)
    #[inline]
    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Double | Self::String)
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Policy(PolicyPtr),
    File(FilePtr),
}

impl Value {
    /// The tag of this value
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Policy(_) => ValueType::Policy,
            Self::File(_) => ValueType::File,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Policy(a), Self::Policy(b)) => policy_ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => a.path() == b.path(),
            _ => false,
        }
    }
}

fn policy_ptr_eq(a: &PolicyPtr, b: &PolicyPtr) -> bool {
    Arc::ptr_eq(a, b) || *a.read() == *b.read()
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Policy> for Value {
    fn from(v: Policy) -> Self {
        Self::Policy(share(v))
    }
}

impl From<PolicyPtr> for Value {
    fn from(v: PolicyPtr) -> Self {
        Self::Policy(v)
    }
}

impl From<PolicyFile> for Value {
    fn from(v: PolicyFile) -> Self {
        Self::File(Arc::new(v))
    }
}

impl From<FilePtr> for Value {
    fn from(v: FilePtr) -> Self {
        Self::File(v)
    }
}

/// The ordered value sequence held by one name
///
/// Never empty once stored in a policy.
#[derive(Debug, Clone)]
pub enum Values {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Double(Vec<f64>),
    String(Vec<String>),
    Policy(Vec<PolicyPtr>),
    File(Vec<FilePtr>),
}

impl Values {
    /// Start a new sequence holding one value
    #[must_use]
    pub fn single(value: Value) -> Self {
        match value {
            Value::Bool(v) => Self::Bool(vec![v]),
            Value::Int(v) => Self::Int(vec![v]),
            Value::Double(v) => Self::Double(vec![v]),
            Value::String(v) => Self::String(vec![v]),
            Value::Policy(v) => Self::Policy(vec![v]),
            Value::File(v) => Self::File(vec![v]),
        }
    }

    /// The tag shared by every element
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Policy(_) => ValueType::Policy,
            Self::File(_) => ValueType::File,
        }
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Policy(v) => v.len(),
            Self::File(v) => v.len(),
        }
    }

    /// True when no element is held (never the case inside a policy)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value of the same tag
    ///
    /// Hands the value back unchanged when its tag differs.
    pub fn push(&mut self, value: Value) -> Result<(), Value> {
        match (self, value) {
            (Self::Bool(v), Value::Bool(x)) => v.push(x),
            (Self::Int(v), Value::Int(x)) => v.push(x),
            (Self::Double(v), Value::Double(x)) => v.push(x),
            (Self::String(v), Value::String(x)) => v.push(x),
            (Self::Policy(v), Value::Policy(x)) => v.push(x),
            (Self::File(v), Value::File(x)) => v.push(x),
            (_, other) => return Err(other),
        }
        Ok(())
    }

    /// The most recently appended element
    #[must_use]
    pub fn back(&self) -> Option<Value> {
        match self {
            Self::Bool(v) => v.last().copied().map(Value::Bool),
            Self::Int(v) => v.last().copied().map(Value::Int),
            Self::Double(v) => v.last().copied().map(Value::Double),
            Self::String(v) => v.last().cloned().map(Value::String),
            Self::Policy(v) => v.last().cloned().map(Value::Policy),
            Self::File(v) => v.last().cloned().map(Value::File),
        }
    }

    /// Every element, oldest first; handles are shared, not copied
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        match self {
            Self::Bool(v) => v.iter().copied().map(Value::Bool).collect(),
            Self::Int(v) => v.iter().copied().map(Value::Int).collect(),
            Self::Double(v) => v.iter().copied().map(Value::Double).collect(),
            Self::String(v) => v.iter().cloned().map(Value::String).collect(),
            Self::Policy(v) => v.iter().cloned().map(Value::Policy).collect(),
            Self::File(v) => v.iter().cloned().map(Value::File).collect(),
        }
    }

    #[must_use]
    pub fn as_bools(&self) -> Option<&[bool]> {
        match self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_policies(&self) -> Option<&[PolicyPtr]> {
        match self {
            Self::Policy(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_files(&self) -> Option<&[FilePtr]> {
        match self {
            Self::File(v) => Some(v),
            _ => None,
        }
    }

    /// Copy with every nested policy snapshotted recursively
    pub(crate) fn deep_copy(&self) -> Self {
        match self {
            Self::Policy(v) => Self::Policy(v.iter().map(|p| share(p.read().deep_copy())).collect()),
            Self::File(v) => Self::File(v.iter().map(|f| Arc::new(f.deep_copy())).collect()),
            scalars => scalars.clone(),
        }
    }
}

impl PartialEq for Values {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Policy(a), Self::Policy(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| policy_ptr_eq(x, y))
            }
            (Self::File(a), Self::File(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.path() == y.path())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_type_names() {
        assert_eq!(ValueType::Int.name(), "int");
        assert_eq!(ValueType::Policy.to_string(), "Policy");
        assert_eq!(ValueType::File.to_string(), "PolicyFile");
        assert!(ValueType::Double.is_scalar());
        assert!(!ValueType::Policy.is_scalar());
        assert!(!ValueType::Undefined.is_scalar());
    }

    #[test]
    fn value_from_conversions() {
        assert_eq!(Value::from(3_i32).value_type(), ValueType::Int);
        assert_eq!(Value::from(3_u8), Value::Int(3));
        assert_eq!(Value::from(1.5_f32), Value::Double(1.5));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(false).value_type(), ValueType::Bool);
        assert_eq!(Value::from(Policy::new()).value_type(), ValueType::Policy);
        assert_eq!(Value::from(PolicyFile::new("a.paf")).value_type(), ValueType::File);
    }

    #[test]
    fn values_push_same_tag() {
        let mut values = Values::single(Value::Int(1));
        values.push(Value::Int(2)).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.as_ints(), Some(&[1, 2][..]));
        assert_eq!(values.back(), Some(Value::Int(2)));
    }

    #[test]
    fn values_push_rejects_other_tag() {
        let mut values = Values::single(Value::Int(1));
        let rejected = values.push(Value::Double(2.0)).unwrap_err();
        assert_eq!(rejected, Value::Double(2.0));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn values_to_vec_shares_policies() {
        let ptr = share(Policy::new());
        let values = Values::single(Value::Policy(ptr.clone()));
        match &values.to_vec()[0] {
            Value::Policy(p) => assert!(Arc::ptr_eq(p, &ptr)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn values_deep_copy_detaches_policies() {
        let ptr = share(Policy::new());
        let values = Values::single(Value::Policy(ptr.clone()));
        let copy = values.deep_copy();
        ptr.write().set("late", 1).unwrap();

        let copied = copy.as_policies().unwrap()[0].clone();
        assert!(!Arc::ptr_eq(&copied, &ptr));
        assert!(!copied.read().exists("late"));
    }
}
