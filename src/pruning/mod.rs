/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and start a [`Pruner`], and the pruning run itself.
//!
//! ## Starting a pruner
//!
//! ```ignore
//! let pruner =
//!     PrunerSpec::builder()
//!     .kv_store(kv_store)
//!     .configuration(configuration)
//!     .on_prune_milestone(prune_milestone_handler)
//!     .build()
//!     .start()?;
//! ```
//!
//! ### Required setters
//! - `.kv_store(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//! - `.solid_entry_point_calculator(...)`: defaults to [`ConeSolidEntryPoints`] with the configured
//!   past threshold.
//! - `.on_start_pruning(...)`
//! - `.on_update_solid_entry_points(...)`
//! - `.on_prune_milestone(...)`
//! - `.on_end_pruning(...)`
//!
//! ## Pruning runs
//!
//! The pruner does not decide when to prune. Whoever does calls [`Pruner::request_prune`] with a
//! target milestone index and an [`AbortSignal`]. A run:
//! 1. Checks its preconditions against the persisted [retention state](RetentionState), clamping
//!    the target to `snapshot_index - past_threshold - pruning_lookahead - 1`. A rejected request
//!    changes nothing.
//! 2. Recomputes the [solid entry points](crate::solid_entry_points) for the target, persists them,
//!    and sets the entry point index to the target.
//! 3. Deletes the vertices left unconfirmed at the current pruning index.
//! 4. For every milestone from `pruning_index + 1` up to the target: deletes the vertices left
//!    unconfirmed at it, its confirmation cone (except solid entry points), the milestone and its
//!    ledger diff, then sets the pruning index to it.
//! 5. Asks the key-value store to collect garbage.
//!
//! The abort signal is checked before each milestone. Progress up to the last completed milestone
//! is durable, so an aborted (or crashed) run is resumed by simply requesting again.

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt::{self, Display};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime};

use typed_builder::TypedBuilder;

use crate::{
    config::PruningConfiguration,
    event_bus::{start_event_bus, EventHandlers, HandlerPtr},
    events::*,
    logging::first_seven_base64_chars,
    solid_entry_points::{ConeSolidEntryPoints, SolidEntryPointCalculator, SolidEntryPointManager},
    tangle::{pluggables::KVStore, traverser::ParentsTraverser, Tangle, TangleError},
    types::{
        data_types::{MilestoneIndex, VertexID},
        retention::RetentionState,
    },
};

use self::{
    milestones::prune_milestone,
    unconfirmed::{prune_unconfirmed_vertices, UnconfirmedPruned},
    vertices::delete_vertices,
};

pub mod milestones;

pub mod unconfirmed;

pub mod vertices;

/// Stores the trait implementations and parameters required to start a [`Pruner`].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [PrunerSpec]. On the builder call the following methods to
    construct a valid [PrunerSpec].

    Required:
    - `.kv_store(...)`
    - `.configuration(...)`

    Optional:
    - `.solid_entry_point_calculator(...)`
    - `.on_start_pruning(...)`
    - `.on_update_solid_entry_points(...)`
    - `.on_prune_milestone(...)`
    - `.on_end_pruning(...)`
"))]
pub struct PrunerSpec<K: KVStore> {
    // Required parameters
    #[builder(setter(doc = "Set the implementation of the tangle's Key-Value store. The argument must implement the [KVStore](crate::tangle::pluggables::KVStore) trait. Required."))]
    kv_store: K,
    #[builder(setter(doc = "Set the [configuration](PruningConfiguration). Required."))]
    configuration: PruningConfiguration,
    // Optional parameters
    #[builder(default, setter(transform = |calculator: impl SolidEntryPointCalculator<K> + 'static| Some(Box::new(calculator) as Box<dyn SolidEntryPointCalculator<K>>),
    doc = "Set how solid entry points are calculated. Optional."))]
    solid_entry_point_calculator: Option<Box<dyn SolidEntryPointCalculator<K>>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartPruningEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartPruningEvent>),
    doc = "Register a handler closure to be invoked after a pruning run passes its preconditions. Optional."))]
    on_start_pruning: Option<HandlerPtr<StartPruningEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateSolidEntryPointsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateSolidEntryPointsEvent>),
    doc = "Register a handler closure to be invoked after the solid entry points are recomputed and persisted. Optional."))]
    on_update_solid_entry_points: Option<HandlerPtr<UpdateSolidEntryPointsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PruneMilestoneEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PruneMilestoneEvent>),
    doc = "Register a handler closure to be invoked after a milestone is pruned. Optional."))]
    on_prune_milestone: Option<HandlerPtr<PruneMilestoneEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EndPruningEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EndPruningEvent>),
    doc = "Register a handler closure to be invoked after a pruning run completes or is aborted. Optional."))]
    on_end_pruning: Option<HandlerPtr<EndPruningEvent>>,
}

impl<K: KVStore> PrunerSpec<K> {
    /// Load the persisted solid entry points, start the event bus thread if any handler is
    /// registered, and return the resulting [`Pruner`].
    pub fn start(self) -> Result<Pruner<K>, TangleError> {
        let tangle = Tangle::new(self.kv_store);
        let solid_entry_points = Arc::new(SolidEntryPointManager::load(&tangle)?);

        let calculator = self.solid_entry_point_calculator.unwrap_or_else(|| {
            Box::new(ConeSolidEntryPoints::new(self.configuration.past_threshold))
                as Box<dyn SolidEntryPointCalculator<K>>
        });

        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_start_pruning,
            self.on_update_solid_entry_points,
            self.on_prune_milestone,
            self.on_end_pruning,
        );

        let (event_publisher, event_bus, event_bus_shutdown) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus = start_event_bus(
                event_handlers,
                event_subscriber,
                event_bus_shutdown_receiver,
            );
            (Some(event_publisher), Some(event_bus), Some(event_bus_shutdown))
        } else {
            (None, None, None)
        };

        Ok(Pruner {
            tangle,
            configuration: self.configuration,
            calculator,
            solid_entry_points,
            run_lock: Mutex::new(()),
            is_pruning: Mutex::new(false),
            event_publisher,
            event_bus,
            event_bus_shutdown,
        })
    }
}

/// Orchestrates pruning runs over a tangle. When this value is dropped, the event bus thread (if
/// any) fires the handlers of the remaining events and shuts down.
pub struct Pruner<K: KVStore> {
    tangle: Tangle<K>,
    configuration: PruningConfiguration,
    calculator: Box<dyn SolidEntryPointCalculator<K>>,
    solid_entry_points: Arc<SolidEntryPointManager>,
    run_lock: Mutex<()>,
    is_pruning: Mutex<bool>,
    event_publisher: Option<Sender<Event>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<K: KVStore> Pruner<K> {
    /// Prune the tangle up to `target_index` (after clamping), checking `abort` before every
    /// milestone.
    ///
    /// Only one run happens at a time. A request made while another run is in progress fails with
    /// [`PruningError::AlreadyPruning`] instead of waiting.
    ///
    /// # Panics
    ///
    /// Panics if the tangle has no retention state.
    pub fn request_prune(
        &self,
        target_index: MilestoneIndex,
        abort: &AbortSignal,
    ) -> Result<(), PruningError> {
        let _run = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(PruningError::AlreadyPruning),
        };

        let mut tangle = self.tangle.clone();
        let state = tangle
            .retention_state()?
            .unwrap_or_else(|| retention_state_missing());
        let target_index = check_preconditions(&self.configuration, &state, target_index)?;

        let _pruning = PruningFlag::set(&self.is_pruning);
        Event::publish(
            &self.event_publisher,
            Event::StartPruning(StartPruningEvent {
                timestamp: SystemTime::now(),
                pruning_index: state.pruning_index,
                target_index,
            }),
        );

        let result = self.prune(&mut tangle, state, target_index, abort);

        let aborted = match &result {
            Ok(()) => false,
            Err(PruningError::PruningAborted) => true,
            Err(_) => return result,
        };
        let pruning_index = tangle
            .retention_state()?
            .map_or(state.pruning_index, |state| state.pruning_index);
        Event::publish(
            &self.event_publisher,
            Event::EndPruning(EndPruningEvent {
                timestamp: SystemTime::now(),
                pruning_index,
                aborted,
            }),
        );
        result
    }

    /// Whether a pruning run is in progress.
    pub fn is_pruning(&self) -> bool {
        *self.is_pruning.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The solid entry points this pruner maintains, to be shared with the rest of the node.
    pub fn solid_entry_points(&self) -> Arc<SolidEntryPointManager> {
        Arc::clone(&self.solid_entry_points)
    }

    /// The tangle this pruner deletes from.
    pub fn tangle(&self) -> &Tangle<K> {
        &self.tangle
    }

    /// The configuration this pruner was started with.
    pub fn configuration(&self) -> &PruningConfiguration {
        &self.configuration
    }

    fn prune(
        &self,
        tangle: &mut Tangle<K>,
        state: RetentionState,
        target_index: MilestoneIndex,
        abort: &AbortSignal,
    ) -> Result<(), PruningError> {
        let solid_entry_points =
            self.solid_entry_points
                .recompute(tangle, self.calculator.as_ref(), target_index, abort)?;
        log::info!(
            "solid entry points valid through milestone {}: {} entry points",
            target_index,
            solid_entry_points
        );
        Event::publish(
            &self.event_publisher,
            Event::UpdateSolidEntryPoints(UpdateSolidEntryPointsEvent {
                timestamp: SystemTime::now(),
                entry_point_index: target_index,
                solid_entry_points,
            }),
        );

        // Walks below use this copy, even if the shared manager is written to meanwhile.
        let boundary = self.solid_entry_points.read().clone();

        prune_unconfirmed_or_warn(tangle, state.pruning_index);

        for index in (state.pruning_index + 1).int()..=target_index.int() {
            let index = MilestoneIndex::new(index);
            if abort.is_raised() {
                log::info!("pruning aborted before milestone {}", index);
                return Err(PruningError::PruningAborted);
            }

            let started = Instant::now();
            let unconfirmed = prune_unconfirmed_or_warn(tangle, index);

            let tail = match tangle.cached_milestone(index) {
                Ok(Some(milestone)) => milestone.vertex,
                Ok(None) => {
                    log::warn!("milestone {} not found, skipping it", index);
                    continue;
                }
                Err(err) => {
                    log::warn!("failed to load milestone {}, skipping it: {}", index, err);
                    continue;
                }
            };

            let mut cone = HashSet::new();
            let walked = ParentsTraverser::new(tangle)
                .solid_entry_points(&boundary, true)
                .traverse::<TangleError>(
                    tail,
                    |_| Ok(true),
                    |metadata| {
                        cone.insert(metadata.vertex);
                        Ok(())
                    },
                    |_| Ok(()),
                );
            if let Err(err) = walked {
                log::warn!("failed to walk the cone of milestone {}, skipping it: {}", index, err);
                continue;
            }

            if let Err(err) = prune_milestone(tangle, index) {
                log::warn!("failed to prune milestone {}: {}", index, err);
            }

            let confirmed_deleted = delete_vertices(tangle, cone)?;

            tangle
                .update_retention_state(|state| state.pruning_index = index)?
                .unwrap_or_else(|| retention_state_missing());

            let duration = started.elapsed();
            log::info!(
                "pruned milestone {} (tail {}) in {:?}: deleted {} confirmed and {}/{} unconfirmed vertices",
                index,
                first_seven_base64_chars(&tail.bytes()),
                duration,
                confirmed_deleted,
                unconfirmed.deleted,
                unconfirmed.checked
            );
            Event::publish(
                &self.event_publisher,
                Event::PruneMilestone(PruneMilestoneEvent {
                    timestamp: SystemTime::now(),
                    milestone: index,
                    vertices_deleted: confirmed_deleted + unconfirmed.deleted,
                    unconfirmed_checked: unconfirmed.checked,
                    duration,
                }),
            );
        }

        tangle.run_garbage_collection();
        Ok(())
    }
}

impl<K: KVStore> Drop for Pruner<K> {
    fn drop(&mut self) {
        if let Some(shutdown) = self.event_bus_shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
    }
}

/// Prune the vertices left unconfirmed at `index`. A failure is logged and counts as nothing pruned.
fn prune_unconfirmed_or_warn<K: KVStore>(
    tangle: &mut Tangle<K>,
    index: MilestoneIndex,
) -> UnconfirmedPruned {
    prune_unconfirmed_vertices(tangle, index).unwrap_or_else(|err| {
        log::warn!("failed to prune unconfirmed vertices at milestone {}: {}", index, err);
        UnconfirmedPruned::default()
    })
}

/// Check the preconditions of a run against the retention state, and return the clamped target.
pub(crate) fn check_preconditions(
    configuration: &PruningConfiguration,
    state: &RetentionState,
    target_index: MilestoneIndex,
) -> Result<MilestoneIndex, PruningError> {
    let minimum_depth = configuration.minimum_depth();
    if state.snapshot_index.int() < minimum_depth {
        return Err(PruningError::NotEnoughHistory {
            required: MilestoneIndex::new(minimum_depth),
            available: state.snapshot_index,
        });
    }

    let target_index =
        target_index.min(MilestoneIndex::new(state.snapshot_index.int() - minimum_depth));

    if state.pruning_index >= target_index {
        return Err(PruningError::NoPruningNeeded {
            pruning_index: state.pruning_index,
            target_index,
        });
    }

    let required = MilestoneIndex::new(
        state
            .entry_point_index
            .int()
            .saturating_add(configuration.pruning_lookahead)
            .saturating_add(1),
    );
    if required > target_index {
        return Err(PruningError::NotEnoughHistory {
            required,
            available: target_index,
        });
    }

    Ok(target_index)
}

/// Fault raised when the retention state is missing. Pruning without it would corrupt the
/// retention bookkeeping, so there is nothing to recover to.
pub(crate) fn retention_state_missing() -> ! {
    panic!("retention state missing from the tangle")
}

/// Sets the "pruning in progress" flag for as long as it lives.
struct PruningFlag<'a>(&'a Mutex<bool>);

impl<'a> PruningFlag<'a> {
    fn set(flag: &'a Mutex<bool>) -> Self {
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        PruningFlag(flag)
    }
}

impl Drop for PruningFlag<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// One-shot cancellation of a pruning run.
///
/// The signal is raised when `()` is sent through the sender returned by [`AbortSignal::new`], or
/// when that sender is dropped. Once raised, it stays raised.
pub struct AbortSignal {
    receiver: Option<Receiver<()>>,
    raised: Cell<bool>,
}

impl AbortSignal {
    pub fn new() -> (Sender<()>, AbortSignal) {
        let (sender, receiver) = mpsc::channel();
        (
            sender,
            AbortSignal {
                receiver: Some(receiver),
                raised: Cell::new(false),
            },
        )
    }

    /// A signal that is never raised.
    pub fn never() -> AbortSignal {
        AbortSignal {
            receiver: None,
            raised: Cell::new(false),
        }
    }

    pub fn is_raised(&self) -> bool {
        if self.raised.get() {
            return true;
        }
        let Some(receiver) = &self.receiver else {
            return false;
        };
        match receiver.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                self.raised.set(true);
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }
}

#[derive(Debug)]
pub enum PruningError {
    /// Not enough milestones are kept to prune (that far) yet.
    NotEnoughHistory {
        required: MilestoneIndex,
        available: MilestoneIndex,
    },

    /// Everything up to the target is already pruned.
    NoPruningNeeded {
        pruning_index: MilestoneIndex,
        target_index: MilestoneIndex,
    },

    /// The abort signal was raised. Milestones pruned before that stay pruned.
    PruningAborted,

    /// Another run is in progress.
    AlreadyPruning,

    /// A milestone needed to recompute the solid entry points is missing.
    MilestoneNotFound { index: MilestoneIndex },

    /// A vertex in the confirmation cone of `milestone` is unconfirmed, or confirmed by a later
    /// milestone.
    DisallowedState {
        vertex: VertexID,
        milestone: MilestoneIndex,
        confirmed: Option<MilestoneIndex>,
    },

    TangleError(TangleError),
}

impl From<TangleError> for PruningError {
    fn from(value: TangleError) -> Self {
        PruningError::TangleError(value)
    }
}

impl Display for PruningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruningError::NotEnoughHistory {
                required,
                available,
            } => write!(
                f,
                "not enough history to prune: milestone {} required, {} available",
                required, available
            ),
            PruningError::NoPruningNeeded {
                pruning_index,
                target_index,
            } => write!(
                f,
                "no pruning needed: pruned through {}, target {}",
                pruning_index, target_index
            ),
            PruningError::PruningAborted => write!(f, "pruning aborted"),
            PruningError::AlreadyPruning => write!(f, "pruning already in progress"),
            PruningError::MilestoneNotFound { index } => {
                write!(f, "milestone {} not found", index)
            }
            PruningError::DisallowedState {
                vertex,
                milestone,
                confirmed,
            } => match confirmed {
                Some(confirmed) => write!(
                    f,
                    "vertex {} in the cone of milestone {} is confirmed by milestone {}",
                    vertex, milestone, confirmed
                ),
                None => write!(
                    f,
                    "vertex {} in the cone of milestone {} is not confirmed",
                    vertex, milestone
                ),
            },
            PruningError::TangleError(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for PruningError {}
