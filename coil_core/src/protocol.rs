//! The invoke/sentinel protocol.
//!
//! Everything a consumer can do with a suspended computation is captured
//! by one narrow capability: invoke it and look at the [`Step`] that comes
//! back. Compiled generators, adapter chains, and hand-written sources all
//! satisfy the same [`Iterate`] trait and are driven identically.
//!
//! # Sentinel
//!
//! Exhaustion is a dedicated enum variant, not a distinguished value. A
//! body can legitimately produce *any* [`Value`], so the terminal signal
//! must live outside the value domain; [`Step::is_exhausted`] is the
//! predicate, and there is no way to confuse the sentinel with data.
//!
//! # Thread Safety
//!
//! The engine is strictly single-threaded and cooperative. Handles use
//! `Rc<RefCell<_>>`; a reentrant borrow (a body driving its own handle)
//! surfaces as [`CoilError::ReentrantInvoke`], never as a panic.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{CoilError, CoilResult};
use crate::value::Value;

// ============================================================================
// Step
// ============================================================================

/// Result of driving an iterator one step forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The iterator produced a value.
    Produced(Value),
    /// The iterator is exhausted. Terminal and sticky: once observed,
    /// every future invocation reports it again.
    Exhausted,
}

impl Step {
    /// Returns true if a value was produced.
    #[inline]
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Produced(_))
    }

    /// Returns true if this is the exhaustion sentinel.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Extracts the produced value, if any.
    #[inline]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Produced(v) => Some(v),
            Self::Exhausted => None,
        }
    }
}

// ============================================================================
// Iterate
// ============================================================================

/// The protocol every iterator satisfies.
///
/// `invoke` runs the computation forward until it either produces a value
/// or exhausts; it never returns early and never blocks. Errors surface
/// exactly once, at the invocation that raised them; a correct impl
/// reports [`Step::Exhausted`] on every invocation after that.
pub trait Iterate {
    /// Drives the iterator one step.
    fn invoke(&mut self) -> CoilResult<Step>;
}

// ============================================================================
// Iterator Handles
// ============================================================================

/// A shared, clonable handle to an iterator.
///
/// Handles are how iterators travel through the value domain: an adapter
/// body receives its upstream stage as a `Value::Iter(handle)` and drives
/// it from inside its own loop. Cloning shares the underlying iterator;
/// equality is handle identity.
#[derive(Clone)]
pub struct IterHandle(Rc<RefCell<dyn Iterate>>);

impl IterHandle {
    /// Wraps an iterator in a shared handle.
    pub fn new<I: Iterate + 'static>(it: I) -> Self {
        Self(Rc::new(RefCell::new(it)))
    }

    /// Drives the underlying iterator one step.
    ///
    /// Fails with [`CoilError::ReentrantInvoke`] if the handle is already
    /// being driven higher up the call stack.
    pub fn invoke(&self) -> CoilResult<Step> {
        let mut it = self
            .0
            .try_borrow_mut()
            .map_err(|_| CoilError::ReentrantInvoke)?;
        it.invoke()
    }

    /// Returns true if two handles refer to the same iterator.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Iterate for IterHandle {
    fn invoke(&mut self) -> CoilResult<Step> {
        IterHandle::invoke(self)
    }
}

impl PartialEq for IterHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for IterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IterHandle(..)")
    }
}

// ============================================================================
// Hand-Written Sources
// ============================================================================

/// An iterator backed by a closure. See [`from_fn`].
pub struct FromFn<F>(F);

impl<F> Iterate for FromFn<F>
where
    F: FnMut() -> CoilResult<Step>,
{
    fn invoke(&mut self) -> CoilResult<Step> {
        (self.0)()
    }
}

/// Builds an iterator straight from a closure.
///
/// This is the escape hatch for raw iterators written against the
/// protocol without the compiler. The closure is responsible for keeping
/// the sentinel sticky.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut() -> CoilResult<Step>,
{
    FromFn(f)
}

/// A finite iterator over a fixed sequence of values.
pub struct ValuesIter {
    items: Vec<Value>,
    pos: usize,
}

impl Iterate for ValuesIter {
    fn invoke(&mut self) -> CoilResult<Step> {
        match self.items.get(self.pos) {
            Some(v) => {
                let v = v.clone();
                self.pos += 1;
                Ok(Step::Produced(v))
            }
            None => Ok(Step::Exhausted),
        }
    }
}

/// Builds a finite, sticky iterator over the given values.
pub fn iter_values<I: IntoIterator<Item = Value>>(items: I) -> ValuesIter {
    ValuesIter {
        items: items.into_iter().collect(),
        pos: 0,
    }
}

// ============================================================================
// Tests
// ============================================================================
