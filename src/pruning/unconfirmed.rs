/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cleanup of vertices that never got confirmed.
//!
//! When a milestone is reached, the vertices that arrived before it and are still unconfirmed are
//! recorded under its index. Any of them that is still unconfirmed once pruning gets to that index
//! is an orphan: no future milestone will reference it from inside the kept part of the tangle.

use std::collections::HashSet;

use crate::{
    tangle::{pluggables::KVStore, Tangle, TangleError},
    types::data_types::MilestoneIndex,
};

use super::vertices::delete_vertices;

/// Outcome of [`prune_unconfirmed_vertices`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnconfirmedPruned {
    /// Vertices deleted.
    pub deleted: usize,
    /// Candidates listed under the index, including ones skipped.
    pub checked: usize,
}

/// Delete the vertices recorded as unconfirmed at `index` that are still unconfirmed, then clear
/// the record.
///
/// Candidates that are already gone, that have been confirmed since, or whose metadata cannot be
/// read are skipped. The record is cleared either way.
pub fn prune_unconfirmed_vertices<K: KVStore>(
    tangle: &mut Tangle<K>,
    index: MilestoneIndex,
) -> Result<UnconfirmedPruned, TangleError> {
    let candidates = tangle.unconfirmed_vertex_ids(index)?;
    let checked = candidates.len();

    let mut to_delete = HashSet::new();
    for id in candidates {
        let metadata = match tangle.cached_vertex_metadata(&id) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => continue,
            Err(err) => {
                log::warn!("keeping unconfirmed vertex {}: {}", id, err);
                continue;
            }
        };
        if !metadata.is_confirmed() {
            to_delete.insert(id);
        }
    }

    let deleted = delete_vertices(tangle, to_delete)?;
    tangle.delete_unconfirmed_vertices(index);

    Ok(UnconfirmedPruned { deleted, checked })
}
