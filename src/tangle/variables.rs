/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each tangle variable is stored in the user-provided key-value
//! store.
//!
//! # List of State Variables
//!
//! ## Vertices
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Vertices|[`VertexID`](crate::types::data_types::VertexID) -> [`Vertex`](crate::types::vertex::Vertex)|Every vertex that has been inserted and not yet pruned.|
//! |Vertex Metadata|[`VertexID`](crate::types::data_types::VertexID) -> [`VertexMetadata`](crate::types::vertex::VertexMetadata)|Parents and confirmation state of every stored vertex.|
//! |Children|[`VertexID`](crate::types::data_types::VertexID) -> [`VertexIDList`](crate::types::data_types::VertexIDList)|The vertices that directly reference a vertex. A parent may already be pruned while its children list still exists.|
//! |Indexations|[`IndexationKey`](crate::types::data_types::IndexationKey) -> [`VertexIDList`](crate::types::data_types::VertexIDList)|Secondary index over vertices with an indexation payload.|
//! |Unconfirmed Vertices|[`MilestoneIndex`](crate::types::data_types::MilestoneIndex) -> [`VertexIDList`](crate::types::data_types::VertexIDList)|Vertices that arrived while the given milestone was the latest one. Entries go stale once the vertices get confirmed.|
//!
//! ## Milestones and ledger
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Milestones|[`MilestoneIndex`](crate::types::data_types::MilestoneIndex) -> [`Milestone`](crate::types::milestone::Milestone)||
//! |Ledger Diffs|[`MilestoneIndex`](crate::types::data_types::MilestoneIndex) -> [`LedgerDiff`](crate::types::milestone::LedgerDiff)|Outputs created and consumed by the milestone's cone.|
//! |Spent Outputs|[`OutputID`](crate::types::data_types::OutputID) -> [`MilestoneIndex`](crate::types::data_types::MilestoneIndex)|The milestone that spent an output.|
//!
//! ## Retention
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Retention State|[`RetentionState`](crate::types::retention::RetentionState)|Snapshot, entry point, and pruning indices.|
//! |Solid Entry Points|`Vec<`[`SolidEntryPoint`](crate::types::retention::SolidEntryPoint)`>`|The boundary set valid through the entry point index.|
//!
//! # Persistence of state variables
//!
//! Every variable is stored as a **Borsh-serialized value**. Single values sit at their one-byte
//! constant key. Mappings of the form "`A` -> `B`" are stored at the concatenation of the
//! variable's one-byte prefix and the bytes of `A`. Milestone indices are encoded little-endian,
//! identifiers by their raw bytes.

// Vertices
pub const VERTICES: [u8; 1] = [0];
pub const VERTEX_METADATA: [u8; 1] = [1];
pub const CHILDREN: [u8; 1] = [2];
pub const INDEXATIONS: [u8; 1] = [3];
pub const UNCONFIRMED_VERTICES: [u8; 1] = [4];

// Milestones and ledger
pub const MILESTONES: [u8; 1] = [5];
pub const LEDGER_DIFFS: [u8; 1] = [6];
pub const SPENT_OUTPUTS: [u8; 1] = [7];

// Retention
pub const RETENTION_STATE: [u8; 1] = [8];
pub const SOLID_ENTRY_POINTS: [u8; 1] = [9];

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
