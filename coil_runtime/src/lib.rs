//! Coil runtime: generator instances, the step machine, and the
//! consumption layer.
//!
//! # Architecture
//!
//! The runtime executes programs produced by `coil_compiler`:
//!
//! - [`machine`] — the step function. Runs a program forward from an
//!   entry point until it produces a value at a suspension point or
//!   completes.
//! - [`state`] — the packed lifecycle header (created / running /
//!   suspended / exhausted plus the resume index).
//! - [`frame`] — per-instance storage: local slots and loop cursors.
//! - [`generator`] — the iterator runtime binding program + frame +
//!   header into an instance that speaks the invoke/sentinel protocol.
//! - [`factory`] — compile once, bind fresh instances on every call.
//! - [`adapt`] — mapping adapters expressed as generator bodies.
//! - [`consume`] — loop and bounded-collect drivers.
//!
//! A single shared program never holds per-instance state; everything
//! mutable lives in the [`Frame`] and [`GenHeader`] owned by each
//! [`Generator`].

pub mod adapt;
pub mod consume;
pub mod factory;
pub mod frame;
pub mod generator;
pub mod machine;
pub mod state;

pub use adapt::{map, map_with};
pub use consume::{collect, iterate};
pub use factory::{gen, generator, Factory};
pub use frame::{Cursor, Frame};
pub use generator::Generator;
pub use machine::{eval, run_procedure, step, Outcome};
pub use state::{GenHeader, GenState};

// The value and protocol layers are re-exported so downstream users
// rarely need a direct coil_core dependency.
pub use coil_core::{
    from_fn, iter_values, CoilError, CoilResult, IterHandle, Iterate, NativeFn, Step, Value,
};
pub use coil_compiler::{
    compile_generator, compile_procedure, BinOp, Body, Expr, Program, Stmt, UnaryOp,
};
