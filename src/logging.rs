/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the pruner's
//! [configuration](crate::config::PruningConfiguration).
//!
//! The pruner logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [PruneMilestone](crate::events::PruneMilestoneEvent) is printed:
//!
//! ```text
//! PruneMilestone, 1701329264, 120, 37, 4, 12
//! ```
//!
//! In the snippet:
//! - The third value is the index of the pruned milestone.
//! - The fourth value is the number of vertices deleted.
//! - The fifth value is the number of unconfirmed vertices checked.
//! - The sixth value is how long pruning the milestone took, in milliseconds.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const START_PRUNING: &str = "StartPruning";
pub const UPDATE_SOLID_ENTRY_POINTS: &str = "UpdateSolidEntryPoints";
pub const PRUNE_MILESTONE: &str = "PruneMilestone";
pub const END_PRUNING: &str = "EndPruning";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StartPruningEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_pruning_event: &StartPruningEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_PRUNING,
                secs_since_unix_epoch(start_pruning_event.timestamp),
                start_pruning_event.pruning_index,
                start_pruning_event.target_index
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateSolidEntryPointsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_solid_entry_points_event: &UpdateSolidEntryPointsEvent| {
            log::info!(
                "{}, {}, {}, {}",
                UPDATE_SOLID_ENTRY_POINTS,
                secs_since_unix_epoch(update_solid_entry_points_event.timestamp),
                update_solid_entry_points_event.entry_point_index,
                update_solid_entry_points_event.solid_entry_points
            )
        };
        Box::new(logger)
    }
}

impl Logger for PruneMilestoneEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prune_milestone_event: &PruneMilestoneEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                PRUNE_MILESTONE,
                secs_since_unix_epoch(prune_milestone_event.timestamp),
                prune_milestone_event.milestone,
                prune_milestone_event.vertices_deleted,
                prune_milestone_event.unconfirmed_checked,
                prune_milestone_event.duration.as_millis()
            )
        };
        Box::new(logger)
    }
}

impl Logger for EndPruningEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |end_pruning_event: &EndPruningEvent| {
            log::info!(
                "{}, {}, {}, {}",
                END_PRUNING,
                secs_since_unix_epoch(end_pruning_event.timestamp),
                end_pruning_event.pruning_index,
                if end_pruning_event.aborted { "aborted" } else { "completed" }
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
