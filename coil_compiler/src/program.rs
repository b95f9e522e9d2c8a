//! Compiled program representation.
//!
//! A [`Program`] is the immutable artifact the compiler produces: a flat
//! instruction sequence, a [`ResumeTable`] mapping suspension-point ids
//! to the pc execution continues from, and the slot/cursor layout of the
//! frame. One program is shared (`Arc`) by every machine instance built
//! from it; all per-run state lives in the frame.
//!
//! Suspension-point ids are resume-table indices: unique within one
//! program, deterministic for the same input body, and internal — they
//! carry no meaning across compiler versions.

use std::fmt;
use std::sync::Arc;

use crate::body::Expr;

/// A resolved local slot in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

impl SlotId {
    /// Returns the slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A loop cursor slot in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(pub u32);

impl CursorId {
    /// Returns the cursor index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of unit a body compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A generator: must contain a reachable suspension marker.
    Generator,
    /// An ordinary procedure: must contain none.
    Procedure,
}

impl Mode {
    /// Human-readable unit kind for diagnostics.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Procedure => "procedure",
        }
    }
}

// ============================================================================
// Instructions
// ============================================================================

/// A lowered instruction.
///
/// Jump targets are absolute instruction indices, resolved by the
/// compiler's label patching pass.
#[derive(Debug, Clone)]
pub enum Instr {
    /// Evaluate and store into a local slot.
    Store { slot: SlotId, expr: Expr },
    /// Evaluate for effect, discard the result.
    Effect { expr: Expr },
    /// Suspend, producing the expression's value. `resume` is the
    /// suspension-point id; the resume table maps it back to the pc
    /// immediately after this instruction.
    Yield { expr: Expr, resume: u32 },
    /// Unconditional jump.
    Jump { target: u32 },
    /// Jump when the condition is falsy.
    JumpIfFalse { cond: Expr, target: u32 },
    /// Evaluate an iterable source into a fresh cursor.
    IterInit { cursor: CursorId, source: Expr },
    /// Advance the cursor: store the next value into `slot`, or jump to
    /// `done` when the source is drained. A drained source is never
    /// advanced again.
    IterNext {
        cursor: CursorId,
        slot: SlotId,
        done: u32,
    },
    /// Bind a compiled nested procedure as a callable local.
    Define { slot: SlotId, program: Arc<Program> },
    /// Complete the machine. The value is only meaningful for
    /// procedures; generators complete bare.
    Return { value: Option<Expr> },
}

// ============================================================================
// Resume Table
// ============================================================================

/// Maps suspension-point ids to resume pcs.
///
/// Built once during compilation and shared by all instances of the
/// program. Locals persist in the frame across suspensions, so an entry
/// is nothing more than the pc to continue from.
#[derive(Debug, Clone, Default)]
pub struct ResumeTable {
    pcs: Vec<u32>,
}

impl ResumeTable {
    /// Creates an empty table.
    #[inline]
    pub const fn new() -> Self {
        Self { pcs: Vec::new() }
    }

    /// Records a suspension point resuming at `pc`. Returns its id.
    #[inline]
    pub fn add(&mut self, pc: u32) -> u32 {
        let id = self.pcs.len() as u32;
        self.pcs.push(pc);
        id
    }

    /// Looks up the resume pc for a suspension-point id.
    #[inline]
    pub fn pc(&self, id: u32) -> Option<u32> {
        self.pcs.get(id as usize).copied()
    }

    /// Number of suspension points.
    #[inline]
    pub fn len(&self) -> usize {
        self.pcs.len()
    }

    /// Returns true if the program has no suspension points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pcs.is_empty()
    }
}

// ============================================================================
// Program
// ============================================================================

/// An immutable compiled unit.
#[derive(Clone)]
pub struct Program {
    name: Arc<str>,
    mode: Mode,
    instrs: Box<[Instr]>,
    resume: ResumeTable,
    params: Box<[Arc<str>]>,
    slot_names: Box<[Arc<str>]>,
    cursor_count: u32,
}

impl Program {
    /// Assembles a program. Called by the compiler only.
    pub(crate) fn new(
        name: Arc<str>,
        mode: Mode,
        instrs: Vec<Instr>,
        resume: ResumeTable,
        params: Vec<Arc<str>>,
        slot_names: Vec<Arc<str>>,
        cursor_count: u32,
    ) -> Self {
        Self {
            name,
            mode,
            instrs: instrs.into_boxed_slice(),
            resume,
            params: params.into_boxed_slice(),
            slot_names: slot_names.into_boxed_slice(),
            cursor_count,
        }
    }

    /// Diagnostic name of the unit.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this unit is a generator or an ordinary procedure.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of declared parameters. Parameters occupy slots `0..arity`.
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Parameter names in declaration order.
    #[inline]
    pub fn params(&self) -> &[Arc<str>] {
        &self.params
    }

    /// Total number of local slots in a frame.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_names.len()
    }

    /// The diagnostic name of a slot.
    #[inline]
    pub fn slot_name(&self, slot: SlotId) -> &str {
        &self.slot_names[slot.index()]
    }

    /// Number of loop cursors in a frame.
    #[inline]
    pub fn cursor_count(&self) -> usize {
        self.cursor_count as usize
    }

    /// Fetches the instruction at `pc`, or `None` past the end.
    #[inline]
    pub fn instr(&self, pc: u32) -> Option<&Instr> {
        self.instrs.get(pc as usize)
    }

    /// Number of instructions.
    #[inline]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// True for a degenerate, instruction-free program.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// The resume table.
    #[inline]
    pub fn resume(&self) -> &ResumeTable {
        &self.resume
    }

    /// Resolves a suspension-point id to its resume pc.
    #[inline]
    pub fn resume_pc(&self, id: u32) -> Option<u32> {
        self.resume.pc(id)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("instrs", &self.instrs.len())
            .field("suspension_points", &self.resume.len())
            .field("slots", &self.slot_names.len())
            .field("cursors", &self.cursor_count)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
