//! Execution frames: the per-instance resumable snapshot.
//!
//! A [`Frame`] owns everything one machine instance needs to resume —
//! its local slots and its loop cursors. Frames are never shared and
//! never copied between instances; the program they execute is the only
//! shared artifact.

use std::sync::Arc;

use coil_core::{CoilError, CoilResult, IterHandle, Step, Value};
use coil_compiler::{CursorId, Program, SlotId};

// ============================================================================
// Cursors
// ============================================================================

/// A loop cursor: the position inside one `ForEach` source.
///
/// Cursors live in the frame, so a suspension inside the loop body
/// resumes with the iteration context intact.
#[derive(Debug, Clone)]
pub enum Cursor {
    /// Position in a bounded sequence.
    Seq { items: Arc<[Value]>, pos: usize },
    /// An upstream iterator of unknown length. Its exhaustion ends the
    /// loop; the handle is never invoked again afterwards.
    Handle(IterHandle),
}

impl Cursor {
    /// Builds a cursor for an iterable value.
    pub fn from_value(value: Value) -> CoilResult<Self> {
        match value {
            Value::List(items) => Ok(Self::Seq { items, pos: 0 }),
            Value::Iter(handle) => Ok(Self::Handle(handle)),
            other => Err(CoilError::type_error(format!(
                "cannot iterate over {}",
                other.type_name()
            ))),
        }
    }

    /// Advances the cursor one step.
    pub fn advance(&mut self) -> CoilResult<Step> {
        match self {
            Self::Seq { items, pos } => match items.get(*pos) {
                Some(v) => {
                    let v = v.clone();
                    *pos += 1;
                    Ok(Step::Produced(v))
                }
                None => Ok(Step::Exhausted),
            },
            Self::Handle(handle) => handle.invoke(),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// The mutable per-instance state of one machine.
#[derive(Debug)]
pub struct Frame {
    slots: Vec<Option<Value>>,
    cursors: Vec<Option<Cursor>>,
}

impl Frame {
    /// Allocates an empty frame sized for `program`.
    pub fn new(program: &Program) -> Self {
        Self {
            slots: vec![None; program.slot_count()],
            cursors: vec![None; program.cursor_count()],
        }
    }

    /// Stores a value into a local slot.
    #[inline]
    pub fn store(&mut self, slot: SlotId, value: Value) {
        self.slots[slot.index()] = Some(value);
    }

    /// Loads a local, failing on a read-before-write.
    pub fn load(&self, slot: SlotId, program: &Program) -> CoilResult<Value> {
        match &self.slots[slot.index()] {
            Some(v) => Ok(v.clone()),
            None => Err(CoilError::UndefinedLocal {
                name: program.slot_name(slot).to_string(),
            }),
        }
    }

    /// Installs a fresh cursor, replacing any previous iteration of the
    /// same loop.
    #[inline]
    pub fn set_cursor(&mut self, cursor: CursorId, state: Cursor) {
        self.cursors[cursor.index()] = Some(state);
    }

    /// The active cursor for a loop. Absence is a compiler invariant
    /// violation: `IterNext` only ever runs after `IterInit`.
    pub fn cursor_mut(&mut self, cursor: CursorId) -> CoilResult<&mut Cursor> {
        self.cursors[cursor.index()]
            .as_mut()
            .ok_or_else(|| CoilError::runtime("loop cursor used before initialization"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coil_core::iter_values;
    use coil_compiler::{compile_generator, Body, Expr, Stmt};

    fn program_with_locals() -> Arc<Program> {
        let body = Body::new("slots")
            .param("a")
            .stmt(Stmt::assign("b", Expr::local("a")))
            .stmt(Stmt::yield_value(Expr::local("b")));
        compile_generator(&body).unwrap()
    }

    #[test]
    fn test_store_and_load() {
        let program = program_with_locals();
        let mut frame = Frame::new(&program);
        frame.store(SlotId(0), Value::Int(7));
        assert_eq!(frame.load(SlotId(0), &program).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_read_before_write_is_undefined_local() {
        let program = program_with_locals();
        let frame = Frame::new(&program);
        let err = frame.load(SlotId(1), &program).unwrap_err();
        assert_eq!(err, CoilError::UndefinedLocal { name: "b".into() });
    }

    #[test]
    fn test_seq_cursor_drains_and_stays_drained() {
        let mut cursor = Cursor::from_value(Value::int_range(0, 2)).unwrap();
        assert_eq!(cursor.advance().unwrap(), Step::Produced(Value::Int(0)));
        assert_eq!(cursor.advance().unwrap(), Step::Produced(Value::Int(1)));
        assert!(cursor.advance().unwrap().is_exhausted());
        assert!(cursor.advance().unwrap().is_exhausted());
    }

    #[test]
    fn test_handle_cursor_drives_upstream() {
        let handle = IterHandle::new(iter_values([Value::str("x")]));
        let mut cursor = Cursor::from_value(Value::Iter(handle)).unwrap();
        assert_eq!(cursor.advance().unwrap(), Step::Produced(Value::str("x")));
        assert!(cursor.advance().unwrap().is_exhausted());
    }

    #[test]
    fn test_non_iterable_rejected() {
        let err = Cursor::from_value(Value::Int(3)).unwrap_err();
        assert!(err.to_string().contains("cannot iterate over int"));
    }

    #[test]
    fn test_missing_cursor_is_invariant_violation() {
        let program = {
            let body = Body::new("each").stmt(Stmt::for_each(
                "x",
                Expr::constant(Value::int_range(0, 1)),
                vec![Stmt::yield_value(Expr::local("x"))],
            ));
            compile_generator(&body).unwrap()
        };
        let mut frame = Frame::new(&program);
        assert!(frame.cursor_mut(CursorId(0)).is_err());
    }
}
