//! Types that are used across the tangle store, the solid entry point manager, and the pruner.

pub mod data_types;

pub mod vertex;

pub mod milestone;

pub mod retention;
