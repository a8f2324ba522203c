/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Milestones and the ledger state changes they cause.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{MilestoneIndex, OutputID, VertexID};

/// A checkpoint that confirms the cone of vertices reachable from its tail vertex.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Milestone {
    pub index: MilestoneIndex,
    /// The vertex that carries the milestone payload. The milestone's confirmation cone is walked
    /// starting from here.
    pub vertex: VertexID,
    pub timestamp: u64,
}

impl Milestone {
    pub fn new(index: MilestoneIndex, vertex: VertexID, timestamp: u64) -> Self {
        Self {
            index,
            vertex,
            timestamp,
        }
    }
}

/// The outputs a milestone created and consumed when its cone was applied to the ledger state.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LedgerDiff {
    pub created: Vec<OutputID>,
    pub consumed: Vec<OutputID>,
}

impl LedgerDiff {
    pub fn new(created: Vec<OutputID>, consumed: Vec<OutputID>) -> Self {
        Self { created, consumed }
    }
}
