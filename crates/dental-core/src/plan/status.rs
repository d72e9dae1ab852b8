//! Status derivation for stages and plans.
//!
//! Statuses are never set by hand. Every mutation ends by recomputing them
//! from procedure progress with these functions.

use crate::models::{PlanStatus, StageStatus};

/// Procedure progress of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageProgress {
    pub total: usize,
    pub completed: usize,
    /// A doctor explicitly started the stage
    pub started: bool,
    /// The stage was explicitly closed (finish, complete on an empty stage)
    pub closed: bool,
}

pub fn derive_stage_status(progress: StageProgress) -> StageStatus {
    if progress.total == 0 {
        return if progress.closed {
            StageStatus::Completed
        } else if progress.started {
            StageStatus::InProgress
        } else {
            StageStatus::Pending
        };
    }

    if progress.completed >= progress.total {
        StageStatus::Completed
    } else if progress.completed > 0 || progress.started {
        StageStatus::InProgress
    } else {
        StageStatus::Pending
    }
}

/// Plan status from its stages. The all-completed check runs first.
pub fn derive_plan_status(current: PlanStatus, stages: &[StageStatus]) -> PlanStatus {
    if current == PlanStatus::Cancelled {
        return PlanStatus::Cancelled;
    }

    if !stages.is_empty() && stages.iter().all(|s| *s == StageStatus::Completed) {
        PlanStatus::Completed
    } else if stages
        .iter()
        .any(|s| matches!(s, StageStatus::InProgress | StageStatus::Completed))
    {
        PlanStatus::Ongoing
    } else {
        PlanStatus::Draft
    }
}
