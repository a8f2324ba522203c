/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'vertex' type, its payload, and its confirmation metadata.

use borsh::{BorshDeserialize, BorshSerialize};
pub use sha2::Sha256 as CryptoHasher;
use sha2::Digest;

use crate::types::data_types::{IndexationKey, MilestoneIndex, VertexID};

/// The (up to two) vertices a vertex directly references.
///
/// A vertex that references the same parent twice stores it once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Parents {
    first: VertexID,
    second: Option<VertexID>,
}

impl Parents {
    pub fn one(parent: VertexID) -> Self {
        Self {
            first: parent,
            second: None,
        }
    }

    pub fn two(first: VertexID, second: VertexID) -> Self {
        if first == second {
            Self::one(first)
        } else {
            Self {
                first,
                second: Some(second),
            }
        }
    }

    /// Iterate through the distinct parents.
    pub fn iter(&self) -> impl Iterator<Item = VertexID> + '_ {
        std::iter::once(self.first).chain(self.second)
    }
}

/// Indexation payload: arbitrary data made retrievable through a secondary key.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Indexation {
    pub key: IndexationKey,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Payload {
    Indexation(Indexation),
    Milestone(MilestoneIndex),
    Data(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vertex {
    pub id: VertexID,
    pub parents: Parents,
    pub payload: Option<Payload>,
}

impl Vertex {
    pub fn new(parents: Parents, payload: Option<Payload>) -> Vertex {
        Vertex {
            id: Vertex::hash(&parents, &payload),
            parents,
            payload,
        }
    }

    pub fn hash(parents: &Parents, payload: &Option<Payload>) -> VertexID {
        let mut hasher = CryptoHasher::new();
        for parent in parents.iter() {
            hasher.update(parent.bytes());
        }
        // Serializing into a Vec<u8> cannot fail.
        hasher.update(payload.try_to_vec().unwrap());
        VertexID::new(hasher.finalize().into())
    }

    /// The secondary index key, if this vertex carries an indexation payload.
    pub fn indexation_key(&self) -> Option<&IndexationKey> {
        match &self.payload {
            Some(Payload::Indexation(indexation)) => Some(&indexation.key),
            _ => None,
        }
    }
}

/// Confirmation state of a vertex, stored separately from the vertex so that the confirmation
/// cone can be walked without loading payloads.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct VertexMetadata {
    pub vertex: VertexID,
    pub parents: Parents,
    confirmed: Option<MilestoneIndex>,
}

impl VertexMetadata {
    pub fn new(vertex: &Vertex) -> Self {
        Self {
            vertex: vertex.id,
            parents: vertex.parents,
            confirmed: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.is_some()
    }

    /// The index of the milestone that confirmed this vertex, if any.
    pub fn confirmed_at(&self) -> Option<MilestoneIndex> {
        self.confirmed
    }

    pub fn set_confirmed(&mut self, milestone: MilestoneIndex) {
        self.confirmed = Some(milestone)
    }
}
