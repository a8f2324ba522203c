/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Backward walks over the parent edges of the tangle.
//!
//! A [`ParentsTraverser`] starts at a vertex and follows parent references depth-first. Callers
//! decide through a `condition` callback which vertices are consumed (and have their own parents
//! walked), and receive every consumed vertex in a `consumer` callback.
//!
//! The order in which vertices are handed to the consumer is an implementation detail. Callers
//! must not rely on it, e.g., by assuming that a vertex is consumed before its parents.

use std::collections::HashSet;

use crate::{
    solid_entry_points::SolidEntryPoints,
    types::{data_types::VertexID, vertex::VertexMetadata},
};

use super::{
    pluggables::KVStore,
    store::{Tangle, TangleError},
};

pub struct ParentsTraverser<'a, K: KVStore> {
    tangle: &'a Tangle<K>,
    solid_entry_points: Option<&'a SolidEntryPoints>,
    walk_past_solid_entry_points: bool,
}

impl<'a, K: KVStore> ParentsTraverser<'a, K> {
    pub fn new(tangle: &'a Tangle<K>) -> Self {
        Self {
            tangle,
            solid_entry_points: None,
            walk_past_solid_entry_points: false,
        }
    }

    /// Treat the members of `solid_entry_points` as the boundary of the walk.
    ///
    /// Boundary vertices are never passed to the condition or the consumer. If `walk_past` is
    /// true, the parents of a boundary vertex that is still stored are walked anyway.
    pub fn solid_entry_points(
        mut self,
        solid_entry_points: &'a SolidEntryPoints,
        walk_past: bool,
    ) -> Self {
        self.solid_entry_points = Some(solid_entry_points);
        self.walk_past_solid_entry_points = walk_past;
        self
    }

    /// Walk the parents of `start`, and `start` itself.
    ///
    /// For every vertex reached for the first time:
    /// 1. If it is not stored, `on_missing_parent` is called with its identifier.
    /// 2. If it is a boundary vertex, it is skipped (see [`solid_entry_points`](Self::solid_entry_points)).
    /// 3. Otherwise, if `condition` returns true, the vertex is passed to `consumer` and its parents
    ///    are walked. If `condition` returns false, the walk does not continue past it.
    ///
    /// The first error returned by a callback (or by the tangle) stops the walk and is returned.
    pub fn traverse<E: From<TangleError>>(
        &self,
        start: VertexID,
        mut condition: impl FnMut(&VertexMetadata) -> Result<bool, E>,
        mut consumer: impl FnMut(&VertexMetadata) -> Result<(), E>,
        mut on_missing_parent: impl FnMut(&VertexID) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut stack = vec![start];
        let mut discovered = HashSet::new();

        while let Some(current) = stack.pop() {
            if !discovered.insert(current) {
                continue;
            }

            // The handle is released at the end of every iteration.
            let Some(metadata) = self.tangle.cached_vertex_metadata(&current)? else {
                on_missing_parent(&current)?;
                continue;
            };

            if self.is_boundary(&current) {
                if self.walk_past_solid_entry_points {
                    stack.extend(metadata.parents.iter());
                }
                continue;
            }

            if !condition(&metadata)? {
                continue;
            }

            consumer(&metadata)?;
            stack.extend(metadata.parents.iter());
        }

        Ok(())
    }

    fn is_boundary(&self, vertex: &VertexID) -> bool {
        self.solid_entry_points
            .is_some_and(|solid_entry_points| solid_entry_points.contains(vertex))
    }
}
