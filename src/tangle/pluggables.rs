/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable tangle persistence.
//!
//! The pruner does not care how the tangle is stored, only that whatever the library user provides
//! behaves like a key-value store with atomic, batched writes. Implement [`KVStore`] (and its
//! [`WriteBatch`]) for the storage engine of choice and pass it to
//! [`PrunerSpec`](crate::pruning::PrunerSpec).

use std::fmt::{self, Display};

use borsh::BorshDeserialize;

use crate::types::{
    data_types::{IndexationKey, MilestoneIndex, OutputID, VertexID, VertexIDList},
    milestone::{LedgerDiff, Milestone},
    retention::{RetentionState, SolidEntryPoint},
    vertex::{Vertex, VertexMetadata},
};

use super::variables::{self, concat};

/// A key-value store that the tangle is persisted in.
///
/// Clones of a `KVStore` must share the same underlying storage, and every method must be safe to
/// call while other clones are being read from on other threads.
pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;

    /// Atomically apply every change in `wb`.
    fn write(&mut self, wb: Self::WriteBatch);

    /// Ask the storage engine to reclaim the space freed by deletions, e.g., by compacting.
    ///
    /// Called once at the end of every completed pruning run. The default does nothing.
    fn run_garbage_collection(&mut self) {}
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Get and deserialize the value at `raw_key`, naming it `key` in errors.
    fn get_deserialized<T: BorshDeserialize>(
        &self,
        raw_key: &[u8],
        key: Key,
    ) -> Result<Option<T>, KVGetError> {
        match self.get(raw_key) {
            None => Ok(None),
            Some(bytes) => T::deserialize(&mut bytes.as_slice())
                .map(Some)
                .map_err(|err| KVGetError::DeserializeValueError { key, source: err }),
        }
    }

    /* ↓↓↓ Vertices ↓↓↓ */

    fn vertex(&self, vertex: &VertexID) -> Result<Option<Vertex>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::VERTICES, &vertex.bytes()),
            Key::Vertex { vertex: *vertex },
        )
    }

    fn vertex_metadata(&self, vertex: &VertexID) -> Result<Option<VertexMetadata>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::VERTEX_METADATA, &vertex.bytes()),
            Key::VertexMetadata { vertex: *vertex },
        )
    }

    /// Get the children of `vertex`. A vertex without children has an empty list.
    fn children(&self, vertex: &VertexID) -> Result<VertexIDList, KVGetError> {
        Ok(self
            .get_deserialized(
                &concat(&variables::CHILDREN, &vertex.bytes()),
                Key::Children { vertex: *vertex },
            )?
            .unwrap_or_default())
    }

    fn indexation(&self, key: &IndexationKey) -> Result<VertexIDList, KVGetError> {
        Ok(self
            .get_deserialized(
                &concat(&variables::INDEXATIONS, key.bytes()),
                Key::Indexation { key: key.clone() },
            )?
            .unwrap_or_default())
    }

    fn unconfirmed_vertices(&self, index: MilestoneIndex) -> Result<VertexIDList, KVGetError> {
        Ok(self
            .get_deserialized(
                &concat(&variables::UNCONFIRMED_VERTICES, &index.to_le_bytes()),
                Key::UnconfirmedVertices { index },
            )?
            .unwrap_or_default())
    }

    /* ↓↓↓ Milestones and ledger ↓↓↓ */

    fn milestone(&self, index: MilestoneIndex) -> Result<Option<Milestone>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::MILESTONES, &index.to_le_bytes()),
            Key::Milestone { index },
        )
    }

    fn ledger_diff(&self, index: MilestoneIndex) -> Result<Option<LedgerDiff>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::LEDGER_DIFFS, &index.to_le_bytes()),
            Key::LedgerDiff { index },
        )
    }

    fn spent_output(&self, output: &OutputID) -> Result<Option<MilestoneIndex>, KVGetError> {
        self.get_deserialized(&spent_output_key(output), Key::SpentOutput { output: *output })
    }

    /* ↓↓↓ Retention ↓↓↓ */

    fn retention_state(&self) -> Result<Option<RetentionState>, KVGetError> {
        self.get_deserialized(&variables::RETENTION_STATE, Key::RetentionState)
    }

    fn solid_entry_points(&self) -> Result<Vec<SolidEntryPoint>, KVGetError> {
        Ok(self
            .get_deserialized(&variables::SOLID_ENTRY_POINTS, Key::SolidEntryPoints)?
            .unwrap_or_default())
    }
}

pub(crate) fn spent_output_key(output: &OutputID) -> Vec<u8> {
    concat(
        &variables::SPENT_OUTPUTS,
        &concat(&output.vertex.bytes(), &output.index.to_le_bytes()),
    )
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. The value corresponding to a given key cannot be found, even though it is expected to exist.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
}

impl Display for KVGetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVGetError::DeserializeValueError { key, source } => {
                write!(f, "cannot deserialize {}: {}", key, source)
            }
            KVGetError::ValueExpectedButNotFound { key } => {
                write!(f, "{} expected but not found", key)
            }
        }
    }
}

/// Error when trying to serialize a value before setting it into the [key value store][KVStore].
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

impl Display for KVSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVSetError::SerializeValueError { key, source } => {
                write!(f, "cannot serialize {}: {}", key, source)
            }
        }
    }
}

#[derive(Debug)]
pub enum Key {
    Vertex { vertex: VertexID },
    VertexMetadata { vertex: VertexID },
    Children { vertex: VertexID },
    Indexation { key: IndexationKey },
    UnconfirmedVertices { index: MilestoneIndex },
    Milestone { index: MilestoneIndex },
    LedgerDiff { index: MilestoneIndex },
    SpentOutput { output: OutputID },
    RetentionState,
    SolidEntryPoints,
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            &Key::Vertex { vertex } => write!(f, "Vertex {}", vertex),
            &Key::VertexMetadata { vertex } => write!(f, "Vertex Metadata for vertex {}", vertex),
            &Key::Children { vertex } => write!(f, "Children of vertex {}", vertex),
            &Key::Indexation { key } => write!(f, "Indexation for key {:?}", key),
            &Key::UnconfirmedVertices { index } => {
                write!(f, "Unconfirmed Vertices at milestone {}", index)
            }
            &Key::Milestone { index } => write!(f, "Milestone {}", index),
            &Key::LedgerDiff { index } => write!(f, "Ledger Diff of milestone {}", index),
            &Key::SpentOutput { output } => {
                write!(f, "Spent Output {}:{}", output.vertex, output.index)
            }
            &Key::RetentionState => write!(f, "Retention State"),
            &Key::SolidEntryPoints => write!(f, "Solid Entry Points"),
        }
    }
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}
