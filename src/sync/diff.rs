use std::collections::HashSet;

use crate::db::models::Match;

/// Identifiers that appeared and disappeared between two snapshots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: HashSet<String>,
    pub removed: HashSet<String>,
}

impl SnapshotDiff {
    pub fn between(prev: &HashSet<String>, curr: &HashSet<String>) -> Self {
        SnapshotDiff {
            added: curr.difference(prev).cloned().collect(),
            removed: prev.difference(curr).cloned().collect(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn id_set(matches: &[Match]) -> HashSet<String> {
    matches.iter().map(|m| m.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> HashSet<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn added_and_removed_are_set_differences() {
        let diff = SnapshotDiff::between(&ids(&["1", "2", "3"]), &ids(&["2", "3", "4"]));
        assert_eq!(diff.added, ids(&["4"]));
        assert_eq!(diff.removed, ids(&["1"]));
    }

    #[test]
    fn partitions_the_union() {
        let prev = ids(&["a", "b", "c", "d"]);
        let curr = ids(&["c", "d", "e"]);
        let diff = SnapshotDiff::between(&prev, &curr);
        assert!(diff.added.is_disjoint(&diff.removed));

        let unchanged: HashSet<String> = prev.intersection(&curr).cloned().collect();
        let mut all = unchanged;
        all.extend(diff.added.iter().cloned());
        all.extend(diff.removed.iter().cloned());
        let union: HashSet<String> = prev.union(&curr).cloned().collect();
        assert_eq!(all, union);
    }

    #[test]
    fn identical_snapshots_have_empty_diff() {
        let s = ids(&["1", "2"]);
        assert!(SnapshotDiff::between(&s, &s).is_empty());
    }

    #[test]
    fn first_snapshot_adds_everything() {
        let diff = SnapshotDiff::between(&HashSet::new(), &ids(&["1", "2"]));
        assert_eq!(diff.added, ids(&["1", "2"]));
        assert!(diff.removed.is_empty());
    }
}
