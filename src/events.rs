/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of pruning events for event handling and logging.
//!
//! Note: an event for a given action indicates that the action has been completed.

use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};

use crate::types::data_types::MilestoneIndex;

pub enum Event {
    StartPruning(StartPruningEvent),
    UpdateSolidEntryPoints(UpdateSolidEntryPointsEvent),
    PruneMilestone(PruneMilestoneEvent),
    EndPruning(EndPruningEvent),
}

impl Event {
    /// Publish `event` if there is a publisher. Publishing never blocks, and an event bus that
    /// has already shut down is ignored.
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(event);
        }
    }
}

/// A pruning run passed its preconditions and is about to recompute the solid entry points.
pub struct StartPruningEvent {
    pub timestamp: SystemTime,
    /// The pruning index the run resumes from.
    pub pruning_index: MilestoneIndex,
    /// The target index after clamping.
    pub target_index: MilestoneIndex,
}

/// The solid entry points were recomputed and persisted.
pub struct UpdateSolidEntryPointsEvent {
    pub timestamp: SystemTime,
    pub entry_point_index: MilestoneIndex,
    pub solid_entry_points: usize,
}

/// Every vertex confirmed by a milestone was deleted, and the pruning index now points at it.
pub struct PruneMilestoneEvent {
    pub timestamp: SystemTime,
    pub milestone: MilestoneIndex,
    /// Confirmed and unconfirmed vertices deleted while pruning this milestone.
    pub vertices_deleted: usize,
    /// Unconfirmed candidates looked at while pruning this milestone.
    pub unconfirmed_checked: usize,
    pub duration: Duration,
}

pub struct EndPruningEvent {
    pub timestamp: SystemTime,
    pub pruning_index: MilestoneIndex,
    pub aborted: bool,
}
