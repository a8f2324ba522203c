//! Tests for calculating, holding, and persisting solid entry points, including failed
//! recomputations.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use dag_pruning::{
    config::PruningConfiguration,
    pruning::{AbortSignal, PrunerSpec, PruningError},
    solid_entry_points::{
        ConeSolidEntryPoints, SolidEntryPointCalculator, SolidEntryPointManager, SolidEntryPoints,
    },
    tangle::store::TangleWriteBatch,
    types::{
        data_types::{MilestoneIndex, VertexID},
        retention::{RetentionState, SolidEntryPoint},
        vertex::VertexMetadata,
    },
};
use log::LevelFilter;

mod common;

use crate::common::{
    logging::setup_logger,
    tangle_builder::{Shape, TestTangle},
};

fn index(int: u32) -> MilestoneIndex {
    MilestoneIndex::new(int)
}

/// Run `ConeSolidEntryPoints` directly and collect what it finds, sorted by index and identifier.
fn calculate(
    test_tangle: &TestTangle,
    past_threshold: u32,
    target: u32,
) -> Result<Vec<SolidEntryPoint>, PruningError> {
    let mut found = Vec::new();
    ConeSolidEntryPoints::new(past_threshold).for_each_solid_entry_point(
        &test_tangle.tangle,
        index(target),
        &AbortSignal::never(),
        &mut |vertex: VertexID, index: MilestoneIndex| {
            found.push(SolidEntryPoint { vertex, index })
        },
    )?;
    Ok(found.into_iter().collect::<SolidEntryPoints>().to_vec())
}

fn sorted(mut solid_entry_points: Vec<SolidEntryPoint>) -> Vec<SolidEntryPoint> {
    solid_entry_points.sort_by_key(|sep| (sep.index, sep.vertex));
    solid_entry_points
}

/// With nothing but milestone tails, only the target's tail is referenced from above the target.
#[test]
fn tails_only_tangle_keeps_the_target_tail() {
    let test_tangle = TestTangle::with_milestones(Shape::tails_only(), 0, 20);

    assert_eq!(
        calculate(&test_tangle, 3, 13).unwrap(),
        vec![SolidEntryPoint {
            vertex: test_tangle.milestone(13).tail,
            index: index(13),
        }]
    );

    // The range never starts below milestone 1.
    assert_eq!(
        calculate(&test_tangle, 3, 2).unwrap(),
        vec![SolidEntryPoint {
            vertex: test_tangle.milestone(2).tail,
            index: index(2),
        }]
    );
}

/// Vertices with unconfirmed children are kept, but only within the past threshold.
#[test]
fn unconfirmed_children_make_solid_entry_points() {
    let shape = Shape {
        vertices_per_milestone: 0,
        orphans_per_milestone: 1,
        parent_window: 0,
    };
    let test_tangle = TestTangle::with_milestones(shape, 0, 20);

    let expected = (10..=13)
        .map(|i| SolidEntryPoint {
            vertex: test_tangle.milestone(i).tail,
            index: index(i),
        })
        .collect::<Vec<_>>();
    assert_eq!(calculate(&test_tangle, 3, 13).unwrap(), expected);
}

/// In a tangle with overlapping cones, a vertex confirmed within the past threshold is kept
/// exactly when one of its children is unconfirmed or confirmed after the target.
#[test]
fn overlapping_cones_keep_vertices_referenced_from_above() {
    let shape = Shape {
        vertices_per_milestone: 5,
        orphans_per_milestone: 1,
        parent_window: 3,
    };
    let test_tangle = TestTangle::with_milestones(shape, 42, 30);
    let (past_threshold, target) = (4, 20);

    let mut expected = BTreeMap::new();
    for record in &test_tangle.milestones()[(target - past_threshold) as usize - 1..target as usize] {
        for vertex in &record.confirmed {
            let referenced_from_above =
                test_tangle
                    .tangle
                    .children(vertex)
                    .unwrap()
                    .iter()
                    .any(|child| {
                        match test_tangle
                            .tangle
                            .vertex_metadata(child)
                            .unwrap()
                            .unwrap()
                            .confirmed_at()
                        {
                            Some(confirmed) => confirmed > index(target),
                            None => true,
                        }
                    });
            if referenced_from_above {
                expected.insert(*vertex, record.index);
            }
        }
    }
    expected.insert(test_tangle.milestone(target).tail, index(target));
    let expected = sorted(
        expected
            .into_iter()
            .map(|(vertex, index)| SolidEntryPoint { vertex, index })
            .collect(),
    );

    let found = calculate(&test_tangle, past_threshold, target).unwrap();
    assert!(found.len() > 1);
    assert_eq!(found, expected);
}

/// The write guard replaces the set and persists it, and a new manager loads it back.
#[test]
fn manager_persists_and_loads_the_set() {
    let mut test_tangle = TestTangle::with_milestones(Shape::tails_only(), 0, 5);
    let manager = SolidEntryPointManager::new();
    assert!(manager.is_empty());

    let (first, second) = (test_tangle.milestone(1).tail, test_tangle.milestone(2).tail);
    {
        let mut guard = manager.write();
        guard.add(first, index(1));
        guard.clear();
        guard.add(second, index(2));
        guard.add(first, index(3));
        assert_eq!(guard.len(), 2);
        assert!(guard.contains(&second));
        guard.store(&mut test_tangle.tangle).unwrap();
    }

    assert_eq!(manager.index_of(&first), Some(index(3)));
    assert!(manager.contains(&second));
    assert!(!manager.contains(&VertexID::null()));
    assert_eq!(
        test_tangle.tangle.solid_entry_points().unwrap(),
        vec![
            SolidEntryPoint {
                vertex: second,
                index: index(2),
            },
            SolidEntryPoint {
                vertex: first,
                index: index(3),
            },
        ]
    );

    let loaded = SolidEntryPointManager::load(&test_tangle.tangle).unwrap();
    assert_eq!(*loaded.read(), *manager.read());
}

/// Readers wait while the set is being replaced, then see the new set.
#[test]
fn readers_wait_for_the_writer() {
    let manager = SolidEntryPointManager::new();
    let vertex = TestTangle::with_milestones(Shape::tails_only(), 0, 1)
        .milestone(1)
        .tail;
    let read_done = AtomicBool::new(false);

    thread::scope(|s| {
        let mut guard = manager.write();
        let reader = s.spawn(|| {
            let len = manager.len();
            read_done.store(true, Ordering::SeqCst);
            len
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!read_done.load(Ordering::SeqCst));
        guard.add(vertex, index(1));
        drop(guard);

        assert_eq!(reader.join().unwrap(), 1);
    });
}

/// Recomputing advances the entry point index and persists exactly the in-memory set.
#[test]
fn recompute_persists_the_set_and_the_entry_point() {
    let shape = Shape {
        vertices_per_milestone: 3,
        orphans_per_milestone: 1,
        parent_window: 2,
    };
    let mut test_tangle = TestTangle::with_milestones(shape, 5, 20);
    let manager = SolidEntryPointManager::new();

    let count = manager
        .recompute(
            &mut test_tangle.tangle,
            &ConeSolidEntryPoints::new(3),
            index(13),
            &AbortSignal::never(),
        )
        .unwrap();

    assert_eq!(count, manager.len());
    assert_eq!(
        test_tangle.tangle.solid_entry_points().unwrap(),
        manager.read().to_vec()
    );
    assert_eq!(manager.read().to_vec(), calculate(&test_tangle, 3, 13).unwrap());
    assert_eq!(
        test_tangle.retention_state(),
        RetentionState::new(index(20), index(13), index(0))
    );
    assert_eq!(test_tangle.tangle.outstanding_handles(), 0);
}

/// Start a pruner over a tangle broken by `corrupt`, request a run, and check that the failed
/// recomputation persisted nothing.
fn failed_recompute(corrupt: impl FnOnce(&mut TestTangle)) -> PruningError {
    setup_logger(LevelFilter::Info);

    let shape = Shape {
        vertices_per_milestone: 4,
        orphans_per_milestone: 0,
        parent_window: 2,
    };
    let mut test_tangle = TestTangle::with_milestones(shape, 11, 20);
    let previous = vec![SolidEntryPoint {
        vertex: test_tangle.milestone(1).tail,
        index: index(1),
    }];
    let mut wb = TangleWriteBatch::new();
    wb.set_solid_entry_points(&previous).unwrap();
    test_tangle.tangle.write(wb);
    corrupt(&mut test_tangle);

    let pruner = PrunerSpec::builder()
        .kv_store(test_tangle.kv_store.clone())
        .configuration(
            PruningConfiguration::builder()
                .past_threshold(3)
                .pruning_lookahead(3)
                .build(),
        )
        .build()
        .start()
        .unwrap();
    assert_eq!(pruner.solid_entry_points().len(), 1);
    let before = test_tangle.kv_store.dump();

    let err = pruner
        .request_prune(index(13), &AbortSignal::never())
        .unwrap_err();

    assert_eq!(test_tangle.kv_store.dump(), before);
    assert_eq!(test_tangle.tangle.solid_entry_points().unwrap(), previous);
    assert_eq!(
        test_tangle.retention_state(),
        RetentionState::new(index(20), index(0), index(0))
    );
    // The in-memory set stays cleared until a recomputation succeeds.
    assert!(pruner.solid_entry_points().is_empty());
    assert!(!pruner.is_pruning());
    assert_eq!(pruner.tangle().outstanding_handles(), 0);
    assert_eq!(test_tangle.kv_store.garbage_collections(), 0);
    err
}

/// The last vertex of milestone 12's chain, which its tail references directly.
fn last_chain_vertex(test_tangle: &TestTangle) -> VertexID {
    let confirmed = &test_tangle.milestone(12).confirmed;
    confirmed[confirmed.len() - 2]
}

#[test]
fn unconfirmed_vertex_in_a_cone_fails_the_recomputation() {
    let mut corrupted = VertexID::null();
    let err = failed_recompute(|test_tangle| {
        corrupted = last_chain_vertex(test_tangle);
        let vertex = test_tangle.tangle.vertex(&corrupted).unwrap().unwrap();
        let mut wb = TangleWriteBatch::new();
        wb.set_vertex_metadata(&VertexMetadata::new(&vertex)).unwrap();
        test_tangle.tangle.write(wb);
    });

    match err {
        PruningError::DisallowedState {
            vertex,
            milestone,
            confirmed,
        } => {
            assert_eq!(vertex, corrupted);
            assert_eq!(milestone, index(12));
            assert_eq!(confirmed, None);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn vertex_confirmed_by_a_later_milestone_fails_the_recomputation() {
    let mut corrupted = VertexID::null();
    let err = failed_recompute(|test_tangle| {
        corrupted = last_chain_vertex(test_tangle);
        test_tangle
            .tangle
            .confirm_vertex(&corrupted, index(14))
            .unwrap();
    });

    match err {
        PruningError::DisallowedState {
            vertex,
            milestone,
            confirmed,
        } => {
            assert_eq!(vertex, corrupted);
            assert_eq!(milestone, index(12));
            assert_eq!(confirmed, Some(index(14)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn missing_milestone_fails_the_recomputation() {
    let err = failed_recompute(|test_tangle| test_tangle.tangle.delete_milestone(index(11)));

    match err {
        PruningError::MilestoneNotFound { index: missing } => assert_eq!(missing, index(11)),
        other => panic!("unexpected error: {:?}", other),
    }
}
