//! Fabrication of tangles with a known shape.
//!
//! Every milestone `m` confirms a chain of vertices that starts at the tail of milestone `m - 1`
//! and ends at its own tail. Each chain vertex also references a second parent picked at random
//! from the vertices confirmed by the previous few milestones, so cones overlap the way they do in
//! a live tangle. Vertices that belong to milestone `m` are recorded as unconfirmed at `m - 1`,
//! the index that was the latest when they arrived.
//!
//! Optionally, every milestone also gets "orphans": vertices that reference its tail, are recorded
//! as unconfirmed at its index, and never get confirmed.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use dag_pruning::{
    tangle::Tangle,
    types::{
        data_types::{IndexationKey, MilestoneIndex, OutputID, VertexID},
        milestone::{LedgerDiff, Milestone},
        retention::RetentionState,
        vertex::{Indexation, Parents, Payload, Vertex},
    },
};

use super::mem_db::MemDB;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Shape {
    /// Chain vertices per milestone, not counting the tail.
    pub(crate) vertices_per_milestone: usize,
    pub(crate) orphans_per_milestone: usize,
    /// How many earlier milestones second parents are picked from.
    pub(crate) parent_window: usize,
}

impl Shape {
    /// Only milestone tails, each referencing the previous one.
    pub(crate) fn tails_only() -> Shape {
        Shape {
            vertices_per_milestone: 0,
            orphans_per_milestone: 0,
            parent_window: 0,
        }
    }
}

pub(crate) struct MilestoneRecord {
    pub(crate) index: MilestoneIndex,
    pub(crate) tail: VertexID,
    /// Every vertex confirmed by the milestone, tail included.
    pub(crate) confirmed: Vec<VertexID>,
    pub(crate) orphans: Vec<VertexID>,
    pub(crate) indexation_keys: Vec<IndexationKey>,
}

pub(crate) struct TestTangle {
    pub(crate) kv_store: MemDB,
    pub(crate) tangle: Tangle<MemDB>,
    milestones: Vec<MilestoneRecord>,
    shape: Shape,
    rng: StdRng,
}

impl TestTangle {
    pub(crate) fn new(shape: Shape, seed: u64) -> TestTangle {
        let kv_store = MemDB::new();
        TestTangle {
            tangle: Tangle::new(kv_store.clone()),
            kv_store,
            milestones: Vec::new(),
            shape,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a tangle with milestones `1..=last` and a retention state of
    /// `(snapshot_index: last, entry_point_index: 0, pruning_index: 0)`.
    pub(crate) fn with_milestones(shape: Shape, seed: u64, last: u32) -> TestTangle {
        let mut test_tangle = TestTangle::new(shape, seed);
        test_tangle.extend_to(last);
        test_tangle.set_retention_state(last, 0, 0);
        test_tangle
    }

    pub(crate) fn milestone(&self, index: u32) -> &MilestoneRecord {
        &self.milestones[index as usize - 1]
    }

    pub(crate) fn milestones(&self) -> &[MilestoneRecord] {
        &self.milestones
    }

    pub(crate) fn latest_index(&self) -> u32 {
        self.milestones.len() as u32
    }

    pub(crate) fn set_retention_state(&mut self, snapshot: u32, entry_point: u32, pruning: u32) {
        self.tangle
            .set_retention_state(&RetentionState::new(
                MilestoneIndex::new(snapshot),
                MilestoneIndex::new(entry_point),
                MilestoneIndex::new(pruning),
            ))
            .unwrap();
    }

    pub(crate) fn retention_state(&self) -> RetentionState {
        self.tangle.retention_state().unwrap().unwrap()
    }

    /// Add milestones until the latest one is `last`. Also moves the snapshot index to `last` if a
    /// retention state exists.
    pub(crate) fn extend_to(&mut self, last: u32) {
        for index in self.latest_index() + 1..=last {
            self.push_milestone(MilestoneIndex::new(index));
        }
        self.tangle
            .update_retention_state(|state| state.snapshot_index = MilestoneIndex::new(last))
            .unwrap();
    }

    fn push_milestone(&mut self, index: MilestoneIndex) {
        let received_at = index.saturating_sub(1);
        let previous_tail = self
            .milestones
            .last()
            .map_or(VertexID::null(), |milestone| milestone.tail);
        let window: Vec<VertexID> = self
            .milestones
            .iter()
            .rev()
            .take(self.shape.parent_window)
            .flat_map(|milestone| milestone.confirmed.iter().copied())
            .collect();

        let mut confirmed = Vec::new();
        let mut indexation_keys = Vec::new();
        let mut previous = previous_tail;
        for i in 0..self.shape.vertices_per_milestone {
            let second = window
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(previous_tail);
            let data = format!("{}-{}", index, i).into_bytes();
            let payload = if self.rng.gen_bool(0.3) {
                let key = IndexationKey::new(
                    format!("tag-{}", self.rng.gen_range(0, 3)).into_bytes(),
                );
                indexation_keys.push(key.clone());
                Payload::Indexation(Indexation { key, data })
            } else {
                Payload::Data(data)
            };

            let vertex = Vertex::new(Parents::two(previous, second), Some(payload));
            self.tangle.insert_vertex(&vertex, received_at).unwrap();
            confirmed.push(vertex.id);
            previous = vertex.id;
        }

        let tail = Vertex::new(
            Parents::two(previous, previous_tail),
            Some(Payload::Milestone(index)),
        );
        self.tangle.insert_vertex(&tail, received_at).unwrap();
        confirmed.push(tail.id);

        for vertex in &confirmed {
            self.tangle.confirm_vertex(vertex, index).unwrap();
        }

        let consumed = if previous_tail.is_null() {
            Vec::new()
        } else {
            vec![OutputID::new(previous_tail, 0)]
        };
        self.tangle
            .insert_milestone(
                &Milestone::new(index, tail.id, index.int() as u64),
                &LedgerDiff::new(vec![OutputID::new(tail.id, 0)], consumed),
            )
            .unwrap();

        let orphans = (0..self.shape.orphans_per_milestone)
            .map(|i| {
                let orphan = Vertex::new(
                    Parents::one(tail.id),
                    Some(Payload::Data(format!("orphan-{}-{}", index, i).into_bytes())),
                );
                self.tangle.insert_vertex(&orphan, index).unwrap();
                orphan.id
            })
            .collect();

        self.milestones.push(MilestoneRecord {
            index,
            tail: tail.id,
            confirmed,
            orphans,
            indexation_keys,
        });
    }
}
