//! Suspension state machine compiler.
//!
//! Turns a [`Body`] — ordinary sequential statements containing
//! suspension markers — into an executable [`Program`]: a flat
//! instruction sequence plus a resume table mapping each suspension
//! point to the location execution continues from.
//!
//! The compile pipeline is two-phase:
//!
//! 1. **Validation** ([`validate`]): structural checks. A generator body
//!    must contain a reachable suspension marker; an ordinary procedure
//!    body must contain none; `break`/`continue` must sit inside a loop.
//! 2. **Lowering** ([`compile`]): names become slots, structured control
//!    flow becomes jumps with label patching, loops over sequences or
//!    upstream iterators become cursor instructions, and every `yield`
//!    records its resume point.
//!
//! The compiled [`Program`] is immutable and shared (`Arc`); many
//! independent machine instances can run it at once.

pub mod body;
pub mod compile;
pub mod program;
pub mod validate;

pub use body::{BinOp, Body, Expr, Stmt, UnaryOp};
pub use compile::{compile, compile_generator, compile_procedure};
pub use program::{CursorId, Instr, Mode, Program, ResumeTable, SlotId};
pub use validate::validate;
