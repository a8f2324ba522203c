/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::{
    tangle::{pluggables::KVStore, Tangle, TangleError},
    types::data_types::MilestoneIndex,
};

/// Delete the ledger diff of the milestone at `index` (and the spent-output records it owns), then
/// the milestone record itself.
///
/// The two deletions are separate writes. If the process stops between them, the milestone is
/// left without a ledger diff, which a later call cleans up the same way.
pub fn prune_milestone<K: KVStore>(
    tangle: &mut Tangle<K>,
    index: MilestoneIndex,
) -> Result<(), TangleError> {
    tangle.prune_ledger_diff(index)?;
    tangle.delete_milestone(index);
    Ok(())
}
