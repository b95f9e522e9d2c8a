//! Generator instances: one machine per instantiation.
//!
//! A [`Generator`] binds a compiled [`Program`] to a fresh [`Frame`]
//! and a lifecycle [`GenHeader`]. Every instance advances
//! independently; the shared program is immutable and never carries
//! per-instance state.
//!
//! The iterator protocol is terminal-sticky: once a generator reports
//! exhaustion it reports exhaustion forever, and a runtime error during
//! a step is surfaced exactly once before the instance settles into the
//! exhausted state.

use std::sync::Arc;

use coil_core::{CoilError, CoilResult, IterHandle, Iterate, Step, Value};
use coil_compiler::{Mode, Program, SlotId};

use crate::frame::Frame;
use crate::machine::{self, Outcome};
use crate::state::{GenHeader, GenState};

// ============================================================================
// Generator
// ============================================================================

/// A single independent generator instance.
pub struct Generator {
    program: Arc<Program>,
    header: GenHeader,
    frame: Frame,
}

impl Generator {
    /// Binds a compiled generator program to a fresh frame with the
    /// given arguments stored into the leading parameter slots.
    pub fn instantiate(program: Arc<Program>, args: &[Value]) -> CoilResult<Self> {
        debug_assert_eq!(program.mode(), Mode::Generator);
        if args.len() != program.arity() {
            return Err(CoilError::Arity {
                expected: program.arity(),
                got: args.len(),
            });
        }
        let mut frame = Frame::new(&program);
        for (i, arg) in args.iter().enumerate() {
            frame.store(SlotId(i as u32), arg.clone());
        }
        Ok(Self {
            program,
            header: GenHeader::new(),
            frame,
        })
    }

    /// Name of the underlying program.
    #[inline]
    pub fn name(&self) -> &str {
        self.program.name()
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> GenState {
        self.header.state()
    }

    /// True once the instance has settled into the terminal state.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.header.is_exhausted()
    }

    /// Wraps the instance in a shared handle for the value layer.
    pub fn into_handle(self) -> IterHandle {
        IterHandle::new(self)
    }
}

impl Iterate for Generator {
    fn invoke(&mut self) -> CoilResult<Step> {
        let (state, resume_index) = self.header.state_and_index();
        match state {
            // Sticky sentinel: exhausted stays exhausted.
            GenState::Exhausted => return Ok(Step::Exhausted),
            GenState::Running => return Err(CoilError::ReentrantInvoke),
            GenState::Created | GenState::Suspended => {}
        }

        let entry = if state == GenState::Created {
            0
        } else {
            match self.program.resume_pc(resume_index) {
                Some(pc) => pc,
                None => {
                    self.header.exhaust();
                    return Err(CoilError::runtime(format!(
                        "generator '{}' has a corrupt suspension record",
                        self.name()
                    )));
                }
            }
        };

        self.header.try_start();
        match machine::step(&self.program, &mut self.frame, entry) {
            Ok(Outcome::Produced { value, resume }) => {
                self.header.suspend(resume);
                Ok(Step::Produced(value))
            }
            Ok(Outcome::Completed { .. }) => {
                self.header.exhaust();
                Ok(Step::Exhausted)
            }
            // Surface the error once, then the instance is terminal.
            Err(err) => {
                self.header.exhaust();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
