/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Bookkeeping that bounds which part of the tangle history is kept.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{MilestoneIndex, VertexID};

/// Persisted triple that governs pruning progress.
///
/// ## Invariant
///
/// `pruning_index <= entry_point_index <= snapshot_index`.
///
/// This is the only durable record of how far pruning got. A node that restarts after a crash or
/// an aborted run resumes from `pruning_index + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RetentionState {
    /// Index of the most recent full snapshot. Upper bound for pruning.
    pub snapshot_index: MilestoneIndex,
    /// Index through which the persisted solid entry point set is valid.
    pub entry_point_index: MilestoneIndex,
    /// Index through which deletion has completed.
    pub pruning_index: MilestoneIndex,
}

impl RetentionState {
    pub fn new(
        snapshot_index: MilestoneIndex,
        entry_point_index: MilestoneIndex,
        pruning_index: MilestoneIndex,
    ) -> Self {
        Self {
            snapshot_index,
            entry_point_index,
            pruning_index,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.pruning_index <= self.entry_point_index
            && self.entry_point_index <= self.snapshot_index
    }
}

/// A vertex kept as a boundary after pruning, together with the milestone that confirmed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SolidEntryPoint {
    pub vertex: VertexID,
    pub index: MilestoneIndex,
}
