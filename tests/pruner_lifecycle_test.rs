//! Tests for the pruner as a long-lived object: one run at a time, pluggable solid entry point
//! calculation, and starting without event handlers.

use std::{
    sync::{
        mpsc::{self, Receiver, Sender},
        Mutex,
    },
    thread,
};

use dag_pruning::{
    config::PruningConfiguration,
    pruning::{AbortSignal, PrunerSpec, PruningError},
    solid_entry_points::{ConeSolidEntryPoints, SolidEntryPointCalculator},
    tangle::Tangle,
    types::{
        data_types::{MilestoneIndex, VertexID},
        retention::RetentionState,
    },
};
use log::LevelFilter;

mod common;

use crate::common::{
    logging::setup_logger,
    mem_db::MemDB,
    tangle_builder::{Shape, TestTangle},
};

/// Calculates like [`ConeSolidEntryPoints`], but first reports that it was entered and waits to be
/// released.
struct BlockingCalculator {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    inner: ConeSolidEntryPoints,
}

impl SolidEntryPointCalculator<MemDB> for BlockingCalculator {
    fn for_each_solid_entry_point(
        &self,
        tangle: &Tangle<MemDB>,
        target: MilestoneIndex,
        abort: &AbortSignal,
        add: &mut dyn FnMut(VertexID, MilestoneIndex),
    ) -> Result<(), PruningError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.inner
            .for_each_solid_entry_point(tangle, target, abort, add)
    }
}

/// Keeps nothing as a boundary.
struct NoSolidEntryPoints;

impl SolidEntryPointCalculator<MemDB> for NoSolidEntryPoints {
    fn for_each_solid_entry_point(
        &self,
        _: &Tangle<MemDB>,
        _: MilestoneIndex,
        _: &AbortSignal,
        _: &mut dyn FnMut(VertexID, MilestoneIndex),
    ) -> Result<(), PruningError> {
        Ok(())
    }
}

fn small_thresholds() -> PruningConfiguration {
    PruningConfiguration::builder()
        .past_threshold(3)
        .pruning_lookahead(3)
        .build()
}

/// A request made while another run is in progress fails immediately instead of waiting.
#[test]
fn concurrent_requests_are_rejected() {
    setup_logger(LevelFilter::Info);

    // 1. Start a pruner whose calculator blocks until released.
    let test_tangle = TestTangle::with_milestones(Shape::tails_only(), 0, 20);
    let (entered_sender, entered) = mpsc::channel();
    let (release, release_receiver) = mpsc::channel();
    let pruner = PrunerSpec::builder()
        .kv_store(test_tangle.kv_store.clone())
        .configuration(small_thresholds())
        .solid_entry_point_calculator(BlockingCalculator {
            entered: Mutex::new(entered_sender),
            release: Mutex::new(release_receiver),
            inner: ConeSolidEntryPoints::new(3),
        })
        .build()
        .start()
        .unwrap();
    assert!(!pruner.is_pruning());

    thread::scope(|s| {
        // 2. Start a run on another thread, and wait until it is recomputing.
        let run = s.spawn(|| pruner.request_prune(MilestoneIndex::new(13), &AbortSignal::never()));
        entered.recv().unwrap();
        assert!(pruner.is_pruning());

        // 3. A second request is turned away without touching anything.
        let before = test_tangle.kv_store.dump();
        assert!(matches!(
            pruner.request_prune(MilestoneIndex::new(13), &AbortSignal::never()),
            Err(PruningError::AlreadyPruning)
        ));
        assert_eq!(test_tangle.kv_store.dump(), before);
        assert!(pruner.is_pruning());

        // 4. Release the first run and let it finish.
        release.send(()).unwrap();
        run.join().unwrap().unwrap();
    });

    assert!(!pruner.is_pruning());
    assert_eq!(
        test_tangle.retention_state(),
        RetentionState::new(
            MilestoneIndex::new(20),
            MilestoneIndex::new(13),
            MilestoneIndex::new(13)
        )
    );
}

/// The boundary is whatever the configured calculator decides. Without any boundary, everything
/// up to the target goes, including the target's own tail.
#[test]
fn custom_calculator_decides_the_boundary() {
    let test_tangle = TestTangle::with_milestones(Shape::tails_only(), 0, 20);
    let pruner = PrunerSpec::builder()
        .kv_store(test_tangle.kv_store.clone())
        .configuration(small_thresholds())
        .solid_entry_point_calculator(NoSolidEntryPoints)
        .build()
        .start()
        .unwrap();

    pruner
        .request_prune(MilestoneIndex::new(13), &AbortSignal::never())
        .unwrap();

    assert!(pruner.solid_entry_points().is_empty());
    assert!(test_tangle.tangle.solid_entry_points().unwrap().is_empty());
    for record in test_tangle.milestones() {
        assert_eq!(
            test_tangle.tangle.contains_vertex(&record.tail),
            record.index.int() > 13
        );
    }
    assert_eq!(test_tangle.kv_store.garbage_collections(), 1);
}

/// A pruner without handlers starts no event bus, and a pruner started over a store that already
/// has solid entry points picks them up.
#[test]
fn restarted_pruner_loads_the_persisted_boundary() {
    let test_tangle = TestTangle::with_milestones(Shape::tails_only(), 0, 20);
    let configuration = small_thresholds();
    assert_eq!(configuration.past_threshold, 3);
    assert!(!configuration.log_events);

    let pruner = PrunerSpec::builder()
        .kv_store(test_tangle.kv_store.clone())
        .configuration(configuration.clone())
        .build()
        .start()
        .unwrap();
    pruner
        .request_prune(MilestoneIndex::new(13), &AbortSignal::never())
        .unwrap();
    let boundary = pruner.solid_entry_points().read().to_vec();
    drop(pruner);

    let restarted = PrunerSpec::builder()
        .kv_store(test_tangle.kv_store.clone())
        .configuration(configuration)
        .build()
        .start()
        .unwrap();
    assert_eq!(restarted.solid_entry_points().read().to_vec(), boundary);
    assert_eq!(restarted.configuration().pruning_lookahead, 3);
    assert!(restarted
        .solid_entry_points()
        .contains(&test_tangle.milestone(13).tail));
}

#[test]
fn default_configuration() {
    let configuration = PruningConfiguration::default();
    assert_eq!(configuration.past_threshold, 50);
    assert_eq!(configuration.pruning_lookahead, 50);
    assert!(!configuration.log_events);
}
