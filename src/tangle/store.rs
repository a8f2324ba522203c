/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Read-and-write handle into the tangle.
//!
//! # Categories of methods
//!
//! [`Tangle`] groups its methods into four `impl` blocks:
//! 1. [Lifecycle methods](#impl-Tangle<K>): construction, writing batches, garbage collection.
//! 2. [Insertion methods](#impl-Tangle<K>-1): used by the ingestion and confirmation paths of the
//!    node to add vertices and milestones, and to mark vertices confirmed.
//! 3. [Deletion methods](#impl-Tangle<K>-2): the primitive deletions that pruning is built from.
//!    Every one of them is idempotent: deleting something that is already gone is a no-op.
//! 4. [Getters](#impl-Tangle<K>-3): plain and [cached](super::cache) lookups.
//!
//! Each mutating method builds its own [`TangleWriteBatch`] and writes it atomically before
//! returning. Nothing is batched across calls.

use std::sync::Arc;

use borsh::BorshSerialize;

use crate::types::{
    data_types::{IndexationKey, MilestoneIndex, OutputID, VertexID, VertexIDList},
    milestone::{LedgerDiff, Milestone},
    retention::{RetentionState, SolidEntryPoint},
    vertex::{Vertex, VertexMetadata},
};

use super::{
    cache::{CachedObject, ObjectCache},
    pluggables::{spent_output_key, KVGetError, KVSetError, KVStore, Key, WriteBatch},
    variables::{self, concat},
};

pub type CachedVertex = CachedObject<VertexID, Vertex>;
pub type CachedVertexMetadata = CachedObject<VertexID, VertexMetadata>;
pub type CachedMilestone = CachedObject<MilestoneIndex, Milestone>;

#[derive(Default)]
struct TangleCaches {
    vertices: ObjectCache<VertexID, Vertex>,
    metadata: ObjectCache<VertexID, VertexMetadata>,
    milestones: ObjectCache<MilestoneIndex, Milestone>,
}

/// Handle to the tangle stored in a [`KVStore`].
///
/// Clones share both the underlying key-value store and the object caches, so a clone can be
/// handed to another thread.
#[derive(Clone)]
pub struct Tangle<K: KVStore> {
    kv_store: K,
    caches: Arc<TangleCaches>,
}

/// Lifecycle methods.
impl<K: KVStore> Tangle<K> {
    pub fn new(kv_store: K) -> Self {
        Tangle {
            kv_store,
            caches: Arc::new(TangleCaches::default()),
        }
    }

    /// Atomically write the changes in `write_batch` into the key-value store.
    pub fn write(&mut self, write_batch: TangleWriteBatch<K::WriteBatch>) {
        self.kv_store.write(write_batch.0)
    }

    pub fn kv_store(&self) -> &K {
        &self.kv_store
    }

    pub fn run_garbage_collection(&mut self) {
        self.kv_store.run_garbage_collection()
    }

    /// The number of cached handles (vertices, metadata, and milestones) that are currently alive.
    pub fn outstanding_handles(&self) -> usize {
        self.caches.vertices.outstanding_handles()
            + self.caches.metadata.outstanding_handles()
            + self.caches.milestones.outstanding_handles()
    }
}

/// Insertion methods.
impl<K: KVStore> Tangle<K> {
    /// Insert `vertex` as an unconfirmed vertex that arrived while `received_at` was the latest
    /// milestone.
    ///
    /// Besides the vertex itself, this sets its metadata, adds it to the children lists of its
    /// parents, adds it to its indexation entry (if any), and records it in the unconfirmed
    /// vertices of `received_at`.
    pub fn insert_vertex(
        &mut self,
        vertex: &Vertex,
        received_at: MilestoneIndex,
    ) -> Result<(), TangleError> {
        let mut wb = TangleWriteBatch::new();

        wb.set_vertex(vertex)?;
        wb.set_vertex_metadata(&VertexMetadata::new(vertex))?;

        for parent in vertex.parents.iter() {
            let mut siblings = self.children(&parent)?;
            siblings.insert(vertex.id);
            wb.set_children(&parent, &siblings)?;
        }

        if let Some(key) = vertex.indexation_key() {
            let mut indexed = self.indexation(key)?;
            indexed.insert(vertex.id);
            wb.set_indexation(key, &indexed)?;
        }

        let mut unconfirmed = self.unconfirmed_vertex_ids(received_at)?;
        unconfirmed.insert(vertex.id);
        wb.set_unconfirmed_vertices(received_at, &unconfirmed)?;

        self.write(wb);
        Ok(())
    }

    /// Mark `vertex` as confirmed by the milestone at `milestone`.
    pub fn confirm_vertex(
        &mut self,
        vertex: &VertexID,
        milestone: MilestoneIndex,
    ) -> Result<(), TangleError> {
        let mut metadata = self
            .vertex_metadata(vertex)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::VertexMetadata { vertex: *vertex },
            })?;
        metadata.set_confirmed(milestone);

        let mut wb = TangleWriteBatch::new();
        wb.set_vertex_metadata(&metadata)?;
        self.write(wb);
        self.caches.metadata.evict(vertex);
        Ok(())
    }

    pub fn insert_milestone(
        &mut self,
        milestone: &Milestone,
        ledger_diff: &LedgerDiff,
    ) -> Result<(), TangleError> {
        let mut wb = TangleWriteBatch::new();
        wb.set_milestone(milestone)?;
        wb.set_ledger_diff(milestone.index, ledger_diff)?;
        for output in &ledger_diff.consumed {
            wb.set_spent_output(output, milestone.index)?;
        }
        self.write(wb);
        Ok(())
    }

    pub fn set_retention_state(&mut self, state: &RetentionState) -> Result<(), TangleError> {
        let mut wb = TangleWriteBatch::new();
        wb.set_retention_state(state)?;
        self.write(wb);
        Ok(())
    }

    /// Read the retention state, apply `update` to it, and write it back.
    ///
    /// Returns the updated state, or `None` (without writing) if no retention state is stored.
    pub fn update_retention_state(
        &mut self,
        update: impl FnOnce(&mut RetentionState),
    ) -> Result<Option<RetentionState>, TangleError> {
        let Some(mut state) = self.retention_state()? else {
            return Ok(None);
        };
        update(&mut state);
        self.set_retention_state(&state)?;
        Ok(Some(state))
    }
}

/// Deletion methods.
impl<K: KVStore> Tangle<K> {
    /// Remove `child` from the children list of `parent`.
    pub fn delete_child(&mut self, parent: &VertexID, child: &VertexID) -> Result<(), TangleError> {
        let mut children = self.children(parent)?;
        if !children.remove(child) {
            return Ok(());
        }

        let mut wb = TangleWriteBatch::new();
        if children.is_empty() {
            wb.delete_children(parent);
        } else {
            wb.set_children(parent, &children)?;
        }
        self.write(wb);
        Ok(())
    }

    /// Remove the whole children list of `vertex`.
    pub fn delete_children(&mut self, vertex: &VertexID) {
        let mut wb = TangleWriteBatch::new();
        wb.delete_children(vertex);
        self.write(wb);
    }

    /// Remove `vertex` from the vertices indexed under `key`.
    pub fn delete_indexation(
        &mut self,
        key: &IndexationKey,
        vertex: &VertexID,
    ) -> Result<(), TangleError> {
        let mut indexed = self.indexation(key)?;
        if !indexed.remove(vertex) {
            return Ok(());
        }

        let mut wb = TangleWriteBatch::new();
        if indexed.is_empty() {
            wb.delete_indexation(key);
        } else {
            wb.set_indexation(key, &indexed)?;
        }
        self.write(wb);
        Ok(())
    }

    /// Delete the vertex record and its metadata.
    pub fn delete_vertex(&mut self, vertex: &VertexID) {
        let mut wb = TangleWriteBatch::new();
        wb.delete_vertex(vertex);
        wb.delete_vertex_metadata(vertex);
        self.write(wb);

        self.caches.vertices.evict(vertex);
        self.caches.metadata.evict(vertex);
    }

    /// Delete the unconfirmed vertices entry of `index`. The vertices themselves are untouched.
    pub fn delete_unconfirmed_vertices(&mut self, index: MilestoneIndex) {
        let mut wb = TangleWriteBatch::new();
        wb.delete_unconfirmed_vertices(index);
        self.write(wb);
    }

    pub fn delete_milestone(&mut self, index: MilestoneIndex) {
        let mut wb = TangleWriteBatch::new();
        wb.delete_milestone(index);
        self.write(wb);
        self.caches.milestones.evict(&index);
    }

    /// Delete the ledger diff of the milestone at `index`, together with the spent-output records
    /// of the outputs the diff consumed.
    pub fn prune_ledger_diff(&mut self, index: MilestoneIndex) -> Result<(), TangleError> {
        let Some(diff) = self.ledger_diff(index)? else {
            return Ok(());
        };

        let mut wb = TangleWriteBatch::new();
        for output in &diff.consumed {
            wb.delete_spent_output(output);
        }
        wb.delete_ledger_diff(index);
        self.write(wb);
        Ok(())
    }
}

/// Getters.
///
/// The `cached_*` getters return shared [handles](super::cache::CachedObject). Hold them only as
/// long as needed: a handle is released when it is dropped.
impl<K: KVStore> Tangle<K> {
    pub fn vertex(&self, vertex: &VertexID) -> Result<Option<Vertex>, TangleError> {
        Ok(self.kv_store.vertex(vertex)?)
    }

    pub fn contains_vertex(&self, vertex: &VertexID) -> bool {
        self.kv_store
            .get(&concat(&variables::VERTICES, &vertex.bytes()))
            .is_some()
    }

    pub fn vertex_metadata(&self, vertex: &VertexID) -> Result<Option<VertexMetadata>, TangleError> {
        Ok(self.kv_store.vertex_metadata(vertex)?)
    }

    pub fn children(&self, vertex: &VertexID) -> Result<VertexIDList, TangleError> {
        Ok(self.kv_store.children(vertex)?)
    }

    pub fn indexation(&self, key: &IndexationKey) -> Result<VertexIDList, TangleError> {
        Ok(self.kv_store.indexation(key)?)
    }

    pub fn unconfirmed_vertex_ids(&self, index: MilestoneIndex) -> Result<VertexIDList, TangleError> {
        Ok(self.kv_store.unconfirmed_vertices(index)?)
    }

    pub fn milestone(&self, index: MilestoneIndex) -> Result<Option<Milestone>, TangleError> {
        Ok(self.kv_store.milestone(index)?)
    }

    pub fn ledger_diff(&self, index: MilestoneIndex) -> Result<Option<LedgerDiff>, TangleError> {
        Ok(self.kv_store.ledger_diff(index)?)
    }

    pub fn spent_output(&self, output: &OutputID) -> Result<Option<MilestoneIndex>, TangleError> {
        Ok(self.kv_store.spent_output(output)?)
    }

    pub fn retention_state(&self) -> Result<Option<RetentionState>, TangleError> {
        Ok(self.kv_store.retention_state()?)
    }

    pub fn solid_entry_points(&self) -> Result<Vec<SolidEntryPoint>, TangleError> {
        Ok(self.kv_store.solid_entry_points()?)
    }

    pub fn cached_vertex(&self, vertex: &VertexID) -> Result<Option<CachedVertex>, TangleError> {
        self.caches
            .vertices
            .get_or_load(vertex, || self.vertex(vertex))
    }

    pub fn cached_vertex_metadata(
        &self,
        vertex: &VertexID,
    ) -> Result<Option<CachedVertexMetadata>, TangleError> {
        self.caches
            .metadata
            .get_or_load(vertex, || self.vertex_metadata(vertex))
    }

    pub fn cached_milestone(
        &self,
        index: MilestoneIndex,
    ) -> Result<Option<CachedMilestone>, TangleError> {
        self.caches
            .milestones
            .get_or_load(&index, || self.milestone(index))
    }
}

#[derive(Debug)]
pub enum TangleError {
    /// Error when trying to get a value from the tangle's underlying [key value store][KVStore].
    KVGetError(KVGetError),

    /// Error when trying to set a value into the tangle's underlying key value store.
    KVSetError(KVSetError),
}

impl From<KVGetError> for TangleError {
    fn from(value: KVGetError) -> Self {
        TangleError::KVGetError(value)
    }
}

impl From<KVSetError> for TangleError {
    fn from(value: KVSetError) -> Self {
        TangleError::KVSetError(value)
    }
}

impl std::fmt::Display for TangleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TangleError::KVGetError(err) => write!(f, "tangle read failed: {}", err),
            TangleError::KVSetError(err) => write!(f, "tangle write failed: {}", err),
        }
    }
}

impl std::error::Error for TangleError {}

/// A batch of tangle changes that forms the keys of every variable from its
/// [prefix](super::variables) and Borsh-serializes its values.
pub struct TangleWriteBatch<W: WriteBatch>(pub(super) W);

impl<W: WriteBatch> TangleWriteBatch<W> {
    pub fn new() -> TangleWriteBatch<W> {
        TangleWriteBatch(W::new())
    }

    fn set_serialized<T: BorshSerialize>(
        &mut self,
        raw_key: &[u8],
        value: &T,
        key: impl FnOnce() -> Key,
    ) -> Result<(), KVSetError> {
        let bytes = value
            .try_to_vec()
            .map_err(|err| KVSetError::SerializeValueError {
                key: key(),
                source: err,
            })?;
        self.0.set(raw_key, &bytes);
        Ok(())
    }

    /* ↓↓↓ Vertices ↓↓↓ */

    pub fn set_vertex(&mut self, vertex: &Vertex) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::VERTICES, &vertex.id.bytes()),
            vertex,
            || Key::Vertex { vertex: vertex.id },
        )
    }

    pub fn delete_vertex(&mut self, vertex: &VertexID) {
        self.0.delete(&concat(&variables::VERTICES, &vertex.bytes()));
    }

    pub fn set_vertex_metadata(&mut self, metadata: &VertexMetadata) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::VERTEX_METADATA, &metadata.vertex.bytes()),
            metadata,
            || Key::VertexMetadata {
                vertex: metadata.vertex,
            },
        )
    }

    pub fn delete_vertex_metadata(&mut self, vertex: &VertexID) {
        self.0
            .delete(&concat(&variables::VERTEX_METADATA, &vertex.bytes()));
    }

    /* ↓↓↓ Children ↓↓↓ */

    pub fn set_children(
        &mut self,
        vertex: &VertexID,
        children: &VertexIDList,
    ) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::CHILDREN, &vertex.bytes()),
            children,
            || Key::Children { vertex: *vertex },
        )
    }

    pub fn delete_children(&mut self, vertex: &VertexID) {
        self.0.delete(&concat(&variables::CHILDREN, &vertex.bytes()));
    }

    /* ↓↓↓ Indexations ↓↓↓ */

    pub fn set_indexation(
        &mut self,
        key: &IndexationKey,
        vertices: &VertexIDList,
    ) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::INDEXATIONS, key.bytes()),
            vertices,
            || Key::Indexation { key: key.clone() },
        )
    }

    pub fn delete_indexation(&mut self, key: &IndexationKey) {
        self.0.delete(&concat(&variables::INDEXATIONS, key.bytes()));
    }

    /* ↓↓↓ Unconfirmed Vertices ↓↓↓ */

    pub fn set_unconfirmed_vertices(
        &mut self,
        index: MilestoneIndex,
        vertices: &VertexIDList,
    ) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::UNCONFIRMED_VERTICES, &index.to_le_bytes()),
            vertices,
            || Key::UnconfirmedVertices { index },
        )
    }

    pub fn delete_unconfirmed_vertices(&mut self, index: MilestoneIndex) {
        self.0
            .delete(&concat(&variables::UNCONFIRMED_VERTICES, &index.to_le_bytes()));
    }

    /* ↓↓↓ Milestones and ledger ↓↓↓ */

    pub fn set_milestone(&mut self, milestone: &Milestone) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::MILESTONES, &milestone.index.to_le_bytes()),
            milestone,
            || Key::Milestone {
                index: milestone.index,
            },
        )
    }

    pub fn delete_milestone(&mut self, index: MilestoneIndex) {
        self.0
            .delete(&concat(&variables::MILESTONES, &index.to_le_bytes()));
    }

    pub fn set_ledger_diff(
        &mut self,
        index: MilestoneIndex,
        diff: &LedgerDiff,
    ) -> Result<(), KVSetError> {
        self.set_serialized(
            &concat(&variables::LEDGER_DIFFS, &index.to_le_bytes()),
            diff,
            || Key::LedgerDiff { index },
        )
    }

    pub fn delete_ledger_diff(&mut self, index: MilestoneIndex) {
        self.0
            .delete(&concat(&variables::LEDGER_DIFFS, &index.to_le_bytes()));
    }

    pub fn set_spent_output(
        &mut self,
        output: &OutputID,
        spent_at: MilestoneIndex,
    ) -> Result<(), KVSetError> {
        self.set_serialized(&spent_output_key(output), &spent_at, || Key::SpentOutput {
            output: *output,
        })
    }

    pub fn delete_spent_output(&mut self, output: &OutputID) {
        self.0.delete(&spent_output_key(output));
    }

    /* ↓↓↓ Retention ↓↓↓ */

    pub fn set_retention_state(&mut self, state: &RetentionState) -> Result<(), KVSetError> {
        self.set_serialized(&variables::RETENTION_STATE, state, || Key::RetentionState)
    }

    pub fn set_solid_entry_points(
        &mut self,
        solid_entry_points: &Vec<SolidEntryPoint>,
    ) -> Result<(), KVSetError> {
        self.set_serialized(
            &variables::SOLID_ENTRY_POINTS,
            solid_entry_points,
            || Key::SolidEntryPoints,
        )
    }
}

impl<W: WriteBatch> Default for TangleWriteBatch<W> {
    fn default() -> Self {
        Self::new()
    }
}
