/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The boundary of the pruned tangle.
//!
//! Once a vertex is pruned, a vertex that references it can no longer be walked back to genesis,
//! so a solidity check would fail on it. Solid entry points are the vertices that are kept (or
//! remembered) as anchors instead: a walk that reaches a solid entry point treats it as solid.
//!
//! # Manager
//!
//! A [`SolidEntryPointManager`] owns the in-memory set and is shared between the pruner, which
//! replaces the set, and readers elsewhere in the node, which query it. Readers take a shared lock.
//! Replacing the set happens under a [`SolidEntryPointsWriteGuard`], which holds the exclusive lock
//! from clearing the set until the new set is persisted:
//!
//! ```ignore
//! let mut guard = manager.write();
//! guard.clear();
//! guard.add(vertex, index);
//! guard.store(&mut tangle)?;
//! // Dropping the guard ends the exclusive write.
//! ```
//!
//! # Calculation
//!
//! Which vertices qualify is decided by a [`SolidEntryPointCalculator`]. The default,
//! [`ConeSolidEntryPoints`], walks the confirmation cones of the milestones just below the target.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    pruning::{retention_state_missing, AbortSignal, PruningError},
    tangle::{
        pluggables::KVStore, store::TangleWriteBatch, traverser::ParentsTraverser, Tangle,
        TangleError,
    },
    types::{
        data_types::{MilestoneIndex, VertexID},
        retention::SolidEntryPoint,
    },
};

/// A set of solid entry points. Membership is decided by vertex identifier only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolidEntryPoints(HashMap<VertexID, MilestoneIndex>);

impl SolidEntryPoints {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn contains(&self, vertex: &VertexID) -> bool {
        self.0.contains_key(vertex)
    }

    /// The index of the milestone at which `vertex` became a solid entry point.
    pub fn index_of(&self, vertex: &VertexID) -> Option<MilestoneIndex> {
        self.0.get(vertex).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SolidEntryPoint> + '_ {
        self.0.iter().map(|(vertex, index)| SolidEntryPoint {
            vertex: *vertex,
            index: *index,
        })
    }

    /// The members of this set, ordered by index and then by identifier.
    pub fn to_vec(&self) -> Vec<SolidEntryPoint> {
        let mut solid_entry_points: Vec<SolidEntryPoint> = self.iter().collect();
        solid_entry_points.sort_by_key(|sep| (sep.index, sep.vertex));
        solid_entry_points
    }

    fn insert(&mut self, vertex: VertexID, index: MilestoneIndex) {
        self.0.insert(vertex, index);
    }

    fn clear(&mut self) {
        self.0.clear()
    }
}

impl FromIterator<SolidEntryPoint> for SolidEntryPoints {
    fn from_iter<T: IntoIterator<Item = SolidEntryPoint>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|sep| (sep.vertex, sep.index))
                .collect(),
        )
    }
}

/// Owner of the in-memory solid entry point set.
#[derive(Debug, Default)]
pub struct SolidEntryPointManager {
    solid_entry_points: RwLock<SolidEntryPoints>,
}

impl SolidEntryPointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager holding the set persisted in `tangle`.
    pub fn load<K: KVStore>(tangle: &Tangle<K>) -> Result<Self, TangleError> {
        Ok(Self {
            solid_entry_points: RwLock::new(tangle.solid_entry_points()?.into_iter().collect()),
        })
    }

    pub fn contains(&self, vertex: &VertexID) -> bool {
        self.read().contains(vertex)
    }

    pub fn index_of(&self, vertex: &VertexID) -> Option<MilestoneIndex> {
        self.read().index_of(vertex)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Take a shared lock on the set. Blocks while the set is being replaced.
    pub fn read(&self) -> RwLockReadGuard<'_, SolidEntryPoints> {
        self.solid_entry_points
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the exclusive lock on the set.
    pub fn write(&self) -> SolidEntryPointsWriteGuard<'_> {
        SolidEntryPointsWriteGuard(
            self.solid_entry_points
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Replace the solid entry points with the ones `calculator` finds for `target`, persist them,
    /// and advance the entry point index to `target`. Returns the size of the new set.
    ///
    /// Everything happens under one exclusive lock. If the calculation fails, nothing is
    /// persisted: the stored set and entry point index keep their old values, but the in-memory
    /// set is left empty until the next successful recomputation.
    pub fn recompute<K: KVStore>(
        &self,
        tangle: &mut Tangle<K>,
        calculator: &dyn SolidEntryPointCalculator<K>,
        target: MilestoneIndex,
        abort: &AbortSignal,
    ) -> Result<usize, PruningError> {
        let mut guard = self.write();
        guard.clear();

        calculator.for_each_solid_entry_point(
            tangle,
            target,
            abort,
            &mut |vertex: VertexID, index: MilestoneIndex| guard.add(vertex, index),
        )?;

        guard.store(tangle)?;
        tangle
            .update_retention_state(|state| state.entry_point_index = target)?
            .unwrap_or_else(|| retention_state_missing());

        Ok(guard.len())
    }
}

/// Exclusive access to the solid entry points, held from [`clear`](Self::clear) until
/// [`store`](Self::store). Dropping the guard releases the lock.
pub struct SolidEntryPointsWriteGuard<'a>(RwLockWriteGuard<'a, SolidEntryPoints>);

impl SolidEntryPointsWriteGuard<'_> {
    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn add(&mut self, vertex: VertexID, index: MilestoneIndex) {
        self.0.insert(vertex, index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, vertex: &VertexID) -> bool {
        self.0.contains(vertex)
    }

    /// Atomically replace the persisted set with the in-memory one.
    pub fn store<K: KVStore>(&self, tangle: &mut Tangle<K>) -> Result<(), TangleError> {
        let mut wb = TangleWriteBatch::new();
        wb.set_solid_entry_points(&self.0.to_vec())?;
        tangle.write(wb);
        Ok(())
    }
}

/// Decides which vertices must be kept as solid entry points when pruning up to a target
/// milestone.
///
/// Implementations call `add` once per solid entry point, with the index of the milestone at which
/// it becomes a boundary. They should check `abort` regularly and fail with
/// [`PruningError::PruningAborted`] once it is raised.
pub trait SolidEntryPointCalculator<K: KVStore>: Send + Sync {
    fn for_each_solid_entry_point(
        &self,
        tangle: &Tangle<K>,
        target: MilestoneIndex,
        abort: &AbortSignal,
        add: &mut dyn FnMut(VertexID, MilestoneIndex),
    ) -> Result<(), PruningError>;
}

/// The default [`SolidEntryPointCalculator`].
///
/// For every milestone `m` from `target - past_threshold` (but at least 1) up to `target`, walks the
/// vertices confirmed by `m` and keeps those that still have a child which is unconfirmed or was
/// confirmed after `target`. The tail vertex of the target milestone is always kept.
///
/// Fails with [`PruningError::MilestoneNotFound`] if a milestone in the range is missing, and with
/// [`PruningError::DisallowedState`] if a cone holds a vertex that is unconfirmed or confirmed by
/// a later milestone.
#[derive(Clone, Copy, Debug)]
pub struct ConeSolidEntryPoints {
    pub past_threshold: u32,
}

impl ConeSolidEntryPoints {
    pub fn new(past_threshold: u32) -> Self {
        Self { past_threshold }
    }
}

impl<K: KVStore> SolidEntryPointCalculator<K> for ConeSolidEntryPoints {
    fn for_each_solid_entry_point(
        &self,
        tangle: &Tangle<K>,
        target: MilestoneIndex,
        abort: &AbortSignal,
        add: &mut dyn FnMut(VertexID, MilestoneIndex),
    ) -> Result<(), PruningError> {
        let first = target
            .saturating_sub(self.past_threshold)
            .max(MilestoneIndex::new(1));

        let mut target_tail = None;
        for index in first.int()..=target.int() {
            if abort.is_raised() {
                return Err(PruningError::PruningAborted);
            }

            let index = MilestoneIndex::new(index);
            let tail = tangle
                .cached_milestone(index)?
                .ok_or(PruningError::MilestoneNotFound { index })?
                .vertex;

            ParentsTraverser::new(tangle).traverse::<PruningError>(
                tail,
                |metadata| match metadata.confirmed_at() {
                    Some(confirmed) if confirmed == index => Ok(true),
                    Some(confirmed) if confirmed < index => Ok(false),
                    confirmed => Err(PruningError::DisallowedState {
                        vertex: metadata.vertex,
                        milestone: index,
                        confirmed,
                    }),
                },
                |metadata| {
                    if has_child_confirmed_after(tangle, &metadata.vertex, target)? {
                        add(metadata.vertex, index);
                    }
                    Ok(())
                },
                |_| Ok(()),
            )?;

            if index == target {
                target_tail = Some(tail);
            }
        }

        if let Some(tail) = target_tail {
            add(tail, target);
        }
        Ok(())
    }
}

/// Whether any child of `vertex` is unconfirmed or was confirmed by a milestone after `target`.
fn has_child_confirmed_after<K: KVStore>(
    tangle: &Tangle<K>,
    vertex: &VertexID,
    target: MilestoneIndex,
) -> Result<bool, TangleError> {
    for child in tangle.children(vertex)?.iter() {
        let Some(metadata) = tangle.cached_vertex_metadata(child)? else {
            continue;
        };
        match metadata.confirmed_at() {
            Some(confirmed) if confirmed <= target => (),
            _ => return Ok(true),
        }
    }
    Ok(false)
}
