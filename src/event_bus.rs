/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that hands published [events](crate::events) to their handlers.
//!
//! Handlers run on the event bus thread, never on the pruning thread, so a slow handler delays
//! later handlers but not pruning.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct EventHandlers {
    pub(crate) start_pruning_handlers: Vec<HandlerPtr<StartPruningEvent>>,
    pub(crate) update_solid_entry_points_handlers: Vec<HandlerPtr<UpdateSolidEntryPointsEvent>>,
    pub(crate) prune_milestone_handlers: Vec<HandlerPtr<PruneMilestoneEvent>>,
    pub(crate) end_pruning_handlers: Vec<HandlerPtr<EndPruningEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, plus the logging handler of every event type if
    /// `log_events` is set.
    pub(crate) fn new(
        log_events: bool,
        start_pruning_handler: Option<HandlerPtr<StartPruningEvent>>,
        update_solid_entry_points_handler: Option<HandlerPtr<UpdateSolidEntryPointsEvent>>,
        prune_milestone_handler: Option<HandlerPtr<PruneMilestoneEvent>>,
        end_pruning_handler: Option<HandlerPtr<EndPruningEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            start_pruning_handlers: handlers(log_events, start_pruning_handler),
            update_solid_entry_points_handlers: handlers(
                log_events,
                update_solid_entry_points_handler,
            ),
            prune_milestone_handlers: handlers(log_events, prune_milestone_handler),
            end_pruning_handlers: handlers(log_events, end_pruning_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.start_pruning_handlers.is_empty()
            && self.update_solid_entry_points_handlers.is_empty()
            && self.prune_milestone_handlers.is_empty()
            && self.end_pruning_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::StartPruning(start_pruning_event) => self
                .start_pruning_handlers
                .iter()
                .for_each(|handler| handler(&start_pruning_event)),

            Event::UpdateSolidEntryPoints(update_solid_entry_points_event) => self
                .update_solid_entry_points_handlers
                .iter()
                .for_each(|handler| handler(&update_solid_entry_points_event)),

            Event::PruneMilestone(prune_milestone_event) => self
                .prune_milestone_handlers
                .iter()
                .for_each(|handler| handler(&prune_milestone_event)),

            Event::EndPruning(end_pruning_event) => self
                .end_pruning_handlers
                .iter()
                .for_each(|handler| handler(&end_pruning_event)),
        }
    }
}

fn handlers<T: Logger>(log_events: bool, user_handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    handlers.extend(user_handler);
    handlers
}

/// Start the event bus thread. It runs until `shutdown_signal` fires (or its sender is dropped),
/// then fires the handlers of every event that was published before that and returns.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                event_subscriber
                    .try_iter()
                    .for_each(|event| event_handlers.fire_handlers(event));
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
