//! Ownership diff engine.
//!
//! Owners are grouped by type and compared as sets: the result says which ids to
//! add and which to delete per type. Order is irrelevant and duplicates collapse.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Owner, OwnerType};

/// `OwnerType -> set<OwnerID>`
pub type GroupedOwners = BTreeMap<OwnerType, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerDiff {
    pub to_add: GroupedOwners,
    pub to_delete: GroupedOwners,
}

impl OwnerDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }

    /// Every owner type touched by either side of the diff.
    pub fn owner_types(&self) -> BTreeSet<OwnerType> {
        self.to_add
            .keys()
            .chain(self.to_delete.keys())
            .cloned()
            .collect()
    }

    /// Total number of individual associations changed.
    pub fn len(&self) -> usize {
        self.to_add.values().map(BTreeSet::len).sum::<usize>()
            + self.to_delete.values().map(BTreeSet::len).sum::<usize>()
    }

    /// Diff that removes every owner in `owners` (target set is empty).
    pub fn remove_all<'a>(owners: impl IntoIterator<Item = &'a Owner>) -> Self {
        diff_owners(&group_owners(owners), &GroupedOwners::new())
    }
}

pub fn group_owners<'a>(owners: impl IntoIterator<Item = &'a Owner>) -> GroupedOwners {
    let mut grouped = GroupedOwners::new();
    for owner in owners {
        grouped
            .entry(owner.owner_type.clone())
            .or_default()
            .insert(owner.owner_id.clone());
    }
    grouped
}

/// Symmetric set difference per owner type between `old` and `new`.
pub fn diff_owners(old: &GroupedOwners, new: &GroupedOwners) -> OwnerDiff {
    let empty = BTreeSet::new();
    let mut diff = OwnerDiff::default();

    for (owner_type, new_ids) in new {
        let old_ids = old.get(owner_type).unwrap_or(&empty);
        let added: BTreeSet<String> = new_ids.difference(old_ids).cloned().collect();
        if !added.is_empty() {
            diff.to_add.insert(owner_type.clone(), added);
        }
    }

    for (owner_type, old_ids) in old {
        let new_ids = new.get(owner_type).unwrap_or(&empty);
        let removed: BTreeSet<String> = old_ids.difference(new_ids).cloned().collect();
        if !removed.is_empty() {
            diff.to_delete.insert(owner_type.clone(), removed);
        }
    }

    diff
}

/// `apply(old, to_add) \ to_delete`, used to check diffs and to replay them.
pub fn apply_diff(old: &GroupedOwners, diff: &OwnerDiff) -> GroupedOwners {
    let mut result = old.clone();
    for (owner_type, ids) in &diff.to_add {
        result
            .entry(owner_type.clone())
            .or_default()
            .extend(ids.iter().cloned());
    }
    for (owner_type, ids) in &diff.to_delete {
        if let Some(existing) = result.get_mut(owner_type) {
            for id in ids {
                existing.remove(id);
            }
        }
    }
    result.retain(|_, ids| !ids.is_empty());
    result
}
