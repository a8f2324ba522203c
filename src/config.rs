/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters that bound how much history a pruning run may delete.

use typed_builder::TypedBuilder;

/// Stores the user-defined parameters of the [pruner](crate::pruning::Pruner), that is:
/// 1. The past threshold: how many milestones below the latest snapshot are never pruned.
/// 2. The pruning lookahead: a run must move the solid entry points more than this many
///    milestones past the persisted entry point index, or it is rejected.
/// 3. The "Log Events" flag. If set to "true", every [event](crate::events) is logged.
///
/// Both thresholds default to 50.
///
/// ## Choosing the thresholds
///
/// A run only ever targets milestones at or below
/// `snapshot_index - past_threshold - pruning_lookahead - 1`, and is rejected if the persisted
/// entry point index plus `pruning_lookahead` does not reach below the target. Larger values keep
/// more history around and make each run move the boundary further at once.
///
/// ## Log Events
///
/// The pruner logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [PruningConfiguration]. On the builder call the following
    methods to construct a valid [PruningConfiguration].

    Optional:
    - `.past_threshold(...)`
    - `.pruning_lookahead(...)`
    - `.log_events(...)`
"))]
pub struct PruningConfiguration {
    #[builder(
        default = DEFAULT_PAST_THRESHOLD,
        setter(doc = "Set how many milestones below the snapshot index are kept. Optional.")
    )]
    pub past_threshold: u32,
    #[builder(
        default = DEFAULT_PRUNING_LOOKAHEAD,
        setter(doc = "Set the pruning lookahead. Optional.")
    )]
    pub pruning_lookahead: u32,
    #[builder(default, setter(doc = "Enable logging of events? Optional."))]
    pub log_events: bool,
}

pub const DEFAULT_PAST_THRESHOLD: u32 = 50;
pub const DEFAULT_PRUNING_LOOKAHEAD: u32 = 50;

impl PruningConfiguration {
    /// The number of milestones a run keeps below the snapshot index, plus one.
    pub(crate) fn minimum_depth(&self) -> u32 {
        self.past_threshold
            .saturating_add(self.pruning_lookahead)
            .saturating_add(1)
    }
}

impl Default for PruningConfiguration {
    fn default() -> Self {
        PruningConfiguration::builder().build()
    }
}
