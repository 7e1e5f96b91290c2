//! Defines events for communication between the sequencer and the presentation layer.

use crate::frame::FrameRecord;
use serde::Serialize;

/// Events sent from a running sequencer to its subscribers.
///
/// Every event carries snapshots; subscribers never see the live records.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A run was accepted. All frames are Pending and no remote call has started.
    RunStarted { frames: Vec<FrameRecord> },

    /// One frame changed status.
    FrameUpdated { frame: FrameRecord },

    /// Cancellation was observed; these frames moved to Skipped together.
    FramesSkipped { frames: Vec<FrameRecord> },

    /// Every frame is terminal and the sequencer is idle again.
    RunFinished { summary: RunSummary },
}

/// Outcome counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Cancellation was observed at a checkpoint
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.completed == self.total
    }
}
