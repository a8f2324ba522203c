/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    ops::{Add, AddAssign, Sub},
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};

/// 32-byte identifier of a vertex ("message") in the tangle.
///
/// Vertex identifiers are content hashes, so two vertices with the same identifier are the same
/// vertex. The tangle never inspects the bytes, it only uses them as keys.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize, Default,
)]
pub struct VertexID([u8; 32]);

impl VertexID {
    /// Create a new `VertexID` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `VertexID`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// The all-zero identifier. Vertices that reference the genesis of the tangle use this as
    /// their parent.
    pub const fn null() -> Self {
        Self([0u8; 32])
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl Display for VertexID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for VertexID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Index of a milestone.
///
/// Milestones are issued in a total order starting at 1, and every index below the latest
/// milestone is expected to be taken. Index 0 is used to mean "before the first milestone".
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Default,
)]
pub struct MilestoneIndex(u32);

impl MilestoneIndex {
    /// Create a new `MilestoneIndex` with an `int` inner value.
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    /// Get the inner `u32` value of this `MilestoneIndex`.
    pub const fn int(&self) -> u32 {
        self.0
    }

    /// Get the little-endian representation of the inner `u32` value of this `MilestoneIndex`.
    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Subtract `rhs`, stopping at index 0.
    pub fn saturating_sub(self, rhs: u32) -> Self {
        Self(self.0.saturating_sub(rhs))
    }
}

impl Display for MilestoneIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl AddAssign<u32> for MilestoneIndex {
    fn add_assign(&mut self, rhs: u32) {
        self.0.add_assign(rhs)
    }
}

impl Add<u32> for MilestoneIndex {
    type Output = MilestoneIndex;
    fn add(self, rhs: u32) -> Self::Output {
        MilestoneIndex::new(self.0.add(rhs))
    }
}

impl Sub<MilestoneIndex> for MilestoneIndex {
    type Output = u32;
    fn sub(self, rhs: MilestoneIndex) -> Self::Output {
        self.0 - rhs.0
    }
}

/// Secondary lookup key carried by vertices with an indexation payload.
#[derive(Clone, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct IndexationKey(Vec<u8>);

impl IndexationKey {
    /// Create a new `IndexationKey` wrapping `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get a reference to the inner bytes of this `IndexationKey`.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for IndexationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// List of vertex identifiers stored under a single key.
///
/// Used for three variables: the children of a vertex, the vertices sharing an indexation key,
/// and the vertices that were still unconfirmed when a milestone was reached.
///
/// # Uniqueness
///
/// Unlike a plain vector, [`insert`](Self::insert)-ing an identifier that is already present is a
/// no-op, so each identifier appears at most once.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize, Default)]
pub struct VertexIDList(Vec<VertexID>);

impl VertexIDList {
    /// Create a new `VertexIDList` wrapping around `vertices`.
    pub fn new(vertices: Vec<VertexID>) -> Self {
        Self(vertices)
    }

    /// Get a reference to the inner `Vec<VertexID>` value of this `VertexIDList`.
    pub const fn vec(&self) -> &Vec<VertexID> {
        &self.0
    }

    /// Iterate through the identifiers in this `VertexIDList`.
    pub fn iter(&self) -> std::slice::Iter<'_, VertexID> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, vertex: &VertexID) -> bool {
        self.0.contains(vertex)
    }

    /// Add `vertex` to this `VertexIDList` if it is not already in it.
    pub fn insert(&mut self, vertex: VertexID) {
        if !self.0.contains(&vertex) {
            self.0.push(vertex)
        }
    }

    /// Remove `vertex` from this `VertexIDList`. Returns whether it was present.
    pub fn remove(&mut self, vertex: &VertexID) -> bool {
        let len_before = self.0.len();
        self.0.retain(|v| v != vertex);
        self.0.len() != len_before
    }
}

impl IntoIterator for VertexIDList {
    type Item = VertexID;
    type IntoIter = std::vec::IntoIter<VertexID>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Identifier of an output in the ledger state: the vertex that created it and its position
/// among that vertex's outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct OutputID {
    pub vertex: VertexID,
    pub index: u16,
}

impl OutputID {
    pub const fn new(vertex: VertexID, index: u16) -> Self {
        Self { vertex, index }
    }
}
