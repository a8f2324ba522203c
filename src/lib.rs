//! A resumable, cancelable pruning engine for milestone-checkpointed DAG ledgers.
//!
//! A DAG ledger (a "tangle") grows without bound: every vertex references up to two earlier
//! vertices, and periodic milestones confirm everything reachable from them. This crate decides
//! which part of that history can be dropped without breaking the node's ability to validate new
//! vertices, and deletes it one milestone at a time, so that a run can be stopped at any milestone
//! and resumed later.
//!
//! # Getting started
//!
//! 1. Implement the [pluggable persistence traits](tangle::pluggables) for the key-value store
//!    the tangle lives in.
//! 2. Build a [`PrunerSpec`](pruning::PrunerSpec) with the store and a
//!    [`PruningConfiguration`](config::PruningConfiguration), and [start](pruning::PrunerSpec::start)
//!    it.
//! 3. Whenever the node decides to prune, call
//!    [`request_prune`](pruning::Pruner::request_prune) with a target milestone and an
//!    [`AbortSignal`](pruning::AbortSignal).
//!
//! # Modules
//!
//! - [`tangle`]: the stored tangle, its key layout, the reference-counted object cache, and the
//!   backward cone walker.
//! - [`solid_entry_points`]: the boundary vertices kept after pruning.
//! - [`pruning`]: the pruner and its building blocks.
//! - [`events`] and [`logging`]: observing pruning progress.

pub mod config;

pub mod events;

pub(crate) mod event_bus;

pub mod logging;

pub mod pruning;

pub mod solid_entry_points;

pub mod tangle;

pub mod types;
