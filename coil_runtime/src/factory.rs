//! The generator factory: compile once, bind fresh instances forever.
//!
//! [`generator`] runs the full compile pipeline over a body exactly
//! once and returns a [`Factory`] holding the shared immutable
//! program. Each [`Factory::call`] binds a brand-new [`Generator`]
//! with its own frame and lifecycle header. [`gen`] is the one-shot
//! convenience for zero-parameter bodies.

use std::sync::Arc;

use coil_core::{CoilResult, IterHandle, Value};
use coil_compiler::{compile_generator, Body, Program};

use crate::generator::Generator;

// ============================================================================
// Factory
// ============================================================================

/// A compiled generator definition. Cheap to clone and to call.
#[derive(Clone)]
pub struct Factory {
    program: Arc<Program>,
}

impl Factory {
    /// Name of the compiled body.
    #[inline]
    pub fn name(&self) -> &str {
        self.program.name()
    }

    /// Number of arguments each instantiation expects.
    #[inline]
    pub fn arity(&self) -> usize {
        self.program.arity()
    }

    /// Shared compiled program backing every instance.
    #[inline]
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Binds a fresh instance. Fails only on an argument-count
    /// mismatch; compilation already happened.
    pub fn call(&self, args: &[Value]) -> CoilResult<Generator> {
        Generator::instantiate(Arc::clone(&self.program), args)
    }

    /// Binds a fresh instance and wraps it as a shareable handle.
    pub fn call_handle(&self, args: &[Value]) -> CoilResult<IterHandle> {
        Ok(self.call(args)?.into_handle())
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .finish()
    }
}

/// Compiles a generator body into a reusable factory.
pub fn generator(body: &Body) -> CoilResult<Factory> {
    Ok(Factory {
        program: compile_generator(body)?,
    })
}

/// Compiles a zero-parameter body and immediately binds one instance.
pub fn gen(body: &Body) -> CoilResult<Generator> {
    generator(body)?.call(&[])
}

// ============================================================================
// Tests
// ============================================================================
