/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deletion of individual vertices together with every reference the tangle keeps to them.

use crate::{
    logging::first_seven_base64_chars,
    tangle::{pluggables::KVStore, Tangle, TangleError},
    types::data_types::VertexID,
};

/// Delete every vertex in `vertices` and return how many were actually deleted.
///
/// For each vertex, in order: its identifier is removed from the children lists of its parents,
/// its own children list is removed, its indexation entry (if any) is removed, and finally the
/// vertex and its metadata are deleted. Vertices that are already gone are skipped, so calling
/// this again with the same identifiers is a no-op.
///
/// Each vertex is deleted with its own writes. A crash halfway leaves the remaining vertices
/// intact, and deleting them again later finishes the job.
pub fn delete_vertices<K: KVStore>(
    tangle: &mut Tangle<K>,
    vertices: impl IntoIterator<Item = VertexID>,
) -> Result<usize, TangleError> {
    let mut deleted = 0;
    for id in vertices {
        let Some(vertex) = tangle.cached_vertex(&id)? else {
            log::debug!("vertex {} already deleted", first_seven_base64_chars(&id.bytes()));
            continue;
        };

        for parent in vertex.parents.iter() {
            tangle.delete_child(&parent, &id)?;
        }
        tangle.delete_children(&id);
        if let Some(key) = vertex.indexation_key() {
            tangle.delete_indexation(key, &id)?;
        }
        drop(vertex);

        tangle.delete_vertex(&id);
        deleted += 1;
    }

    Ok(deleted)
}
