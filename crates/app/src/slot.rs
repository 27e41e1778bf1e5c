//! Slot reservation: keep the last free slot for incremental work.

use tracker_indexer_domain::{ProjectKey, RunKind};

/// Outcome of offering one queued project to the free slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    /// Start the run now.
    Dispatch,
    /// Put the project back at the tail and look for incremental work.
    Defer,
    /// Every queued project was offered once without finding incremental
    /// work; start this full run in the last slot anyway.
    DispatchAfterFullPass,
}

impl SlotDecision {
    /// Returns true when the run should be started.
    #[must_use]
    pub const fn dispatches(self) -> bool {
        !matches!(self, Self::Defer)
    }
}

/// Decide what to do with `candidate` given the current occupancy.
///
/// `first_deferred` is the first project deferred during the current
/// dispatch pass; seeing it again means a full pass found no alternative.
#[must_use]
pub fn decide_slot(
    candidate: &ProjectKey,
    run_kind: RunKind,
    in_flight: usize,
    max_concurrency: usize,
    first_deferred: Option<&ProjectKey>,
) -> SlotDecision {
    let takes_last_slot = max_concurrency > 1 && in_flight + 1 == max_concurrency;
    if !(run_kind.is_full() && takes_last_slot) {
        return SlotDecision::Dispatch;
    }
    if first_deferred == Some(candidate) {
        SlotDecision::DispatchAfterFullPass
    } else {
        SlotDecision::Defer
    }
}
