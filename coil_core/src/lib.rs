//! Core types for the coil generator engine.
//!
//! This crate defines the pieces every other layer agrees on:
//!
//! - [`Value`] — the dynamic value domain generator bodies compute over
//! - [`Step`] — the result of driving an iterator one step forward
//! - [`Iterate`] — the invoke/sentinel protocol itself
//! - [`IterHandle`] — a shared, single-threaded handle to any iterator
//! - [`CoilError`] — the unified error type
//!
//! The protocol is deliberately narrow: anything that can be invoked and
//! can signal exhaustion is an iterator, whether it came out of the
//! compiler, an adapter chain, or a hand-written [`Iterate`] impl.

pub mod error;
pub mod protocol;
pub mod value;

pub use error::{CoilError, CoilResult};
pub use protocol::{from_fn, iter_values, FromFn, IterHandle, Iterate, Step, ValuesIter};
pub use value::{NativeFn, Value};
