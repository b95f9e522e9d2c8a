//! The dynamic value domain generator bodies compute over.
//!
//! Values are cheap to clone: compound data is behind `Arc`/`Rc`, and
//! iterator handles are shared by identity. The engine is strictly
//! single-threaded, so callables use `Rc` rather than `Arc`.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{CoilError, CoilResult};
use crate::protocol::IterHandle;

// ============================================================================
// Native Functions
// ============================================================================

/// A host-provided callable.
///
/// Ordinary nested calls inside a body go through values of this type:
/// from the compiler's point of view a `NativeFn` is completely opaque,
/// which is what keeps suspension markers out of ordinary callables.
#[derive(Clone)]
pub struct NativeFn(Rc<dyn Fn(&[Value]) -> CoilResult<Value>>);

impl NativeFn {
    /// Wraps a host closure as a callable value.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> CoilResult<Value> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Applies the callable to the given arguments.
    #[inline]
    pub fn call(&self, args: &[Value]) -> CoilResult<Value> {
        (self.0)(args)
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        // Callables compare by identity.
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native fn>")
    }
}

// ============================================================================
// Value
// ============================================================================

/// A coil runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The unit value; also what effect-only expressions evaluate to.
    Unit,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Immutable string.
    Str(Arc<str>),
    /// Immutable ordered sequence.
    List(Arc<[Value]>),
    /// Host callable.
    Func(NativeFn),
    /// A shared iterator handle (upstream stage of an adapter chain).
    Iter(IterHandle),
}

impl Value {
    /// Creates a string value.
    pub fn str<S: AsRef<str>>(s: S) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    /// Creates a list value.
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Creates a list of consecutive integers `start..stop`, a convenient
    /// bounded loop source.
    pub fn int_range(start: i64, stop: i64) -> Self {
        Self::List((start..stop).map(Value::Int).collect())
    }

    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Func(_) => "function",
            Self::Iter(_) => "iterator",
        }
    }

    /// Truthiness, as used by conditional jumps.
    ///
    /// `Unit` is falsy; numbers are falsy at zero; strings and lists are
    /// falsy when empty; callables and iterators are always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Unit => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Func(_) | Self::Iter(_) => true,
        }
    }

    /// Extracts an integer, if this is one.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extracts a string slice, if this is a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the callable, if this is one.
    #[inline]
    pub fn as_func(&self) -> Option<&NativeFn> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Extracts the iterator handle, if this is one.
    #[inline]
    pub fn as_iter(&self) -> Option<&IterHandle> {
        match self {
            Self::Iter(h) => Some(h),
            _ => None,
        }
    }

    /// Extracts an integer or reports a type error.
    pub fn expect_int(&self, what: &str) -> CoilResult<i64> {
        self.as_int().ok_or_else(|| {
            CoilError::type_error(format!("{what} must be int, got {}", self.type_name()))
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Func(_) => f.write_str("<function>"),
            Self::Iter(_) => f.write_str("<iterator>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

// ============================================================================
// Tests
// ============================================================================
