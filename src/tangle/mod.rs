/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent state that the pruner reads and deletes from.
//!
//! # The Tangle
//!
//! The tangle is a directed acyclic graph of [vertices](crate::types::vertex::Vertex), each of which
//! references up to two earlier vertices as its parents. Vertices arrive continuously, and
//! periodically a [milestone](crate::types::milestone::Milestone) confirms every not-yet-confirmed
//! vertex reachable from its tail vertex. Milestone indices form a total order, so every confirmed
//! vertex belongs to exactly one milestone's "confirmation cone".
//!
//! Besides vertices, the tangle keeps everything pruning has to clean up after: parent-to-child
//! adjacency, the indexation secondary index, the per-milestone lists of vertices that were still
//! unconfirmed, milestone records, ledger diffs, and spent-output records. The [`variables`]
//! submodule lists all of them.
//!
//! # Pluggable persistence
//!
//! - The tangle is kept in persistent storage chosen by the library user.
//! - The library only requires a key-value store with atomic, batched writes, described by the
//!   traits in [`pluggables`].
//! - The user's store gets wrapped in a [`Tangle`](store::Tangle), which puts every variable in
//!   the right place and shares decoded records through the reference-counted [`cache`].
//!
//! # Walking the tangle
//!
//! Confirmation cones are enumerated by the [`traverser`], which walks parent edges backwards from
//! a milestone's tail vertex.

pub mod cache;

pub mod pluggables;

pub mod store;
pub use store::{Tangle, TangleError};

pub mod traverser;

pub mod variables;
