//! Generator state management.
//!
//! [`GenHeader`] packs the machine state and the suspension-point id into
//! one tagged `u32`, so a single load answers both "can this be resumed"
//! and "where does it resume".
//!
//! # Encoding
//!
//! ```text
//! Bits 0-1:  State (Created=0, Running=1, Suspended=2, Exhausted=3)
//! Bits 2-31: Suspension-point id (max 2^30 points per program)
//! ```
//!
//! The engine is strictly single-threaded, so the header is a plain
//! `Cell` rather than an atomic.

use std::cell::Cell;
use std::fmt;

// ============================================================================
// Generator State
// ============================================================================

/// Execution state of one iterator runtime instance.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenState {
    /// Created but never invoked.
    Created = 0,
    /// Currently executing forward (reentry check).
    Running = 1,
    /// Suspended at a suspension point.
    Suspended = 2,
    /// Completed, failed, or otherwise terminal. Sticky.
    Exhausted = 3,
}

impl GenState {
    /// Number of bits used to encode the state.
    pub const BITS: u32 = 2;

    /// Mask for extracting the state from a header.
    pub const MASK: u32 = (1 << Self::BITS) - 1;

    /// Decodes a state from its 2-bit tag.
    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & Self::MASK {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Suspended,
            _ => Self::Exhausted,
        }
    }

    /// Returns true if invoking is allowed from this state.
    #[inline(always)]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::Created | Self::Suspended)
    }

    /// Returns true when terminal.
    #[inline(always)]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// The display name of this state.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for GenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for GenState {
    #[inline]
    fn default() -> Self {
        Self::Created
    }
}

// ============================================================================
// Generator Header
// ============================================================================

/// Tagged header combining state and suspension-point id.
#[derive(Clone)]
pub struct GenHeader {
    bits: Cell<u32>,
}

impl GenHeader {
    /// Maximum encodable suspension-point id.
    pub const MAX_RESUME_INDEX: u32 = (1 << 30) - 1;

    const RESUME_SHIFT: u32 = GenState::BITS;

    /// A fresh header: Created, suspension point 0.
    #[inline]
    pub fn new() -> Self {
        Self {
            bits: Cell::new(GenState::Created as u32),
        }
    }

    /// Current state.
    #[inline(always)]
    pub fn state(&self) -> GenState {
        GenState::from_bits(self.bits.get())
    }

    /// Saved suspension-point id.
    #[inline(always)]
    pub fn resume_index(&self) -> u32 {
        self.bits.get() >> Self::RESUME_SHIFT
    }

    /// Both state and suspension-point id from one load.
    #[inline(always)]
    pub fn state_and_index(&self) -> (GenState, u32) {
        let bits = self.bits.get();
        (GenState::from_bits(bits), bits >> Self::RESUME_SHIFT)
    }

    /// Transitions to Running if currently resumable.
    ///
    /// Returns the previous state on success, `None` when Running or
    /// Exhausted.
    #[inline]
    pub fn try_start(&self) -> Option<GenState> {
        let old = self.bits.get();
        let old_state = GenState::from_bits(old);
        if !old_state.is_resumable() {
            return None;
        }
        self.bits
            .set((old & !GenState::MASK) | (GenState::Running as u32));
        Some(old_state)
    }

    /// Transitions Running → Suspended at the given suspension point.
    #[inline]
    pub fn suspend(&self, resume_index: u32) {
        debug_assert_eq!(self.state(), GenState::Running);
        debug_assert!(resume_index <= Self::MAX_RESUME_INDEX);
        self.bits
            .set((resume_index << Self::RESUME_SHIFT) | (GenState::Suspended as u32));
    }

    /// Transitions to Exhausted, keeping the last suspension-point id
    /// around for diagnostics.
    #[inline]
    pub fn exhaust(&self) {
        let old = self.bits.get();
        self.bits
            .set((old & !GenState::MASK) | (GenState::Exhausted as u32));
    }

    /// Returns true while executing forward.
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.state() == GenState::Running
    }

    /// Returns true when terminal.
    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.state().is_finished()
    }
}

impl Default for GenHeader {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GenHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, index) = self.state_and_index();
        f.debug_struct("GenHeader")
            .field("state", &state)
            .field("resume_index", &index)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
