//! # Header Rollback
//!
//! A section header or matrix banner is drawn before anyone knows whether a
//! visible field will follow it. Each kind keeps one armed snapshot; at the
//! next checkpoint the snapshot is either dropped (something was shown) or
//! restored (nothing was), which erases the header from the page.

use super::cursor::{Canvas, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Section,
    Matrix,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RollbackSlot {
    #[default]
    Empty,
    Armed(Snapshot),
}

/// Outcome of a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Nothing was armed.
    Idle,
    /// The header stays.
    Committed,
    /// The header was erased.
    RolledBack,
}

#[derive(Debug, Clone, Default)]
pub struct RollbackCache {
    section: RollbackSlot,
    matrix: RollbackSlot,
}

impl RollbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, kind: HeaderKind) -> &mut RollbackSlot {
        match kind {
            HeaderKind::Section => &mut self.section,
            HeaderKind::Matrix => &mut self.matrix,
        }
    }

    pub fn is_armed(&self, kind: HeaderKind) -> bool {
        let slot = match kind {
            HeaderKind::Section => &self.section,
            HeaderKind::Matrix => &self.matrix,
        };
        matches!(slot, RollbackSlot::Armed(_))
    }

    /// Arm `kind` with `snapshot`, replacing any earlier one.
    pub fn arm(&mut self, kind: HeaderKind, snapshot: Snapshot) {
        *self.slot_mut(kind) = RollbackSlot::Armed(snapshot);
    }

    /// Resolve the armed snapshot of `kind`.
    pub fn checkpoint(&mut self, kind: HeaderKind, displayed: usize, canvas: &mut Canvas) -> Checkpoint {
        let RollbackSlot::Armed(snapshot) = std::mem::take(self.slot_mut(kind)) else {
            return Checkpoint::Idle;
        };
        if displayed > 0 {
            return Checkpoint::Committed;
        }

        log::debug!(
            "rolling back {:?} header: page {} -> {}, {} commands erased",
            kind,
            canvas.page(),
            snapshot.state().page,
            canvas.commands().len() - snapshot.log_len()
        );
        canvas.restore(&snapshot);
        Checkpoint::RolledBack
    }
}
