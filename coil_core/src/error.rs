//! Error types and result definitions for coil.
//!
//! One unified enum covers every phase:
//! - Structural errors caught while compiling a body (before any iterator
//!   exists)
//! - Runtime errors raised while a machine executes forward
//! - Protocol-misuse errors (reentrant invocation)

use thiserror::Error;

/// The unified result type used throughout coil.
pub type CoilResult<T> = Result<T, CoilError>;

/// Comprehensive error type covering all coil error conditions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoilError {
    /// Structural error detected while compiling a body.
    ///
    /// Reported at factory-construction time, never later.
    #[error("CompileError: {message}")]
    Compile {
        /// Error description.
        message: String,
    },

    /// Dynamic type mismatch during forward execution.
    #[error("TypeError: {message}")]
    Type {
        /// Error description.
        message: String,
    },

    /// A local was read before anything was stored into it.
    #[error("NameError: local '{name}' is not defined")]
    UndefinedLocal {
        /// The undefined local's name.
        name: String,
    },

    /// A callable was applied with the wrong number of arguments.
    #[error("ArityError: expected {expected} argument(s), got {got}")]
    Arity {
        /// Number of declared parameters.
        expected: usize,
        /// Number of supplied arguments.
        got: usize,
    },

    /// Runtime failure during forward execution.
    #[error("RuntimeError: {message}")]
    Runtime {
        /// Error description.
        message: String,
    },

    /// An iterator was invoked while already executing.
    ///
    /// The runtime is not reentrant; a body that drives its own handle
    /// before the prior invocation returns is a usage error.
    #[error("iterator already executing")]
    ReentrantInvoke,
}

impl CoilError {
    /// Creates a compile-time structural error.
    pub fn compile<S: Into<String>>(message: S) -> Self {
        Self::Compile {
            message: message.into(),
        }
    }

    /// Creates a dynamic type error.
    pub fn type_error<S: Into<String>>(message: S) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    /// Creates a runtime error.
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Returns true if this error was reported at compile time.
    #[inline]
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Self::Compile { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
