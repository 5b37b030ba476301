//! Favourites addressed by composite key, persisted as one JSON record.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::models::{CompositeKey, Match};
use crate::db::{KeyValueStore, StorageError};

/// Record key the favourites array is stored under.
pub const FAVOURITES_RECORD: &str = "__FAV_MATCH_IDS__";

pub struct FavouritesStore {
    keys: BTreeSet<CompositeKey>,
    backend: Arc<dyn KeyValueStore>,
}

impl FavouritesStore {
    /// Load the stored set. A missing or unreadable record starts empty.
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        let keys = match read_record(backend.as_ref()) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Ignoring unreadable favourites record: {}", e);
                BTreeSet::new()
            }
        };
        FavouritesStore { keys, backend }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_favourite(&self, m: &Match) -> bool {
        self.keys.contains(&m.composite_key())
    }

    /// Flip membership of `key`; returns whether it is now a favourite.
    ///
    /// The in-memory flip stands even if persisting it fails.
    pub fn toggle_key(&mut self, key: CompositeKey) -> (bool, Result<(), StorageError>) {
        let now_favourite = if self.keys.remove(&key) {
            false
        } else {
            self.keys.insert(key);
            true
        };
        (now_favourite, self.persist())
    }

    /// Stored keys whose match is present in `snapshot`.
    pub fn visible(&self, snapshot: &[Match]) -> BTreeSet<CompositeKey> {
        let live: BTreeSet<CompositeKey> = snapshot.iter().map(Match::composite_key).collect();
        self.keys.intersection(&live).cloned().collect()
    }

    /// Drop favourites that are no longer live. Writes only when something
    /// was actually removed; returns the number of pruned keys.
    pub fn prune(&mut self, snapshot: &[Match]) -> Result<usize, StorageError> {
        let visible = self.visible(snapshot);
        if visible.len() == self.keys.len() {
            return Ok(0);
        }
        let pruned = self.keys.len() - visible.len();
        self.keys = visible;
        info!("Pruned {} favourite(s) no longer in the feed", pruned);
        self.persist()?;
        Ok(pruned)
    }

    fn persist(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&self.keys)?;
        self.backend.put(FAVOURITES_RECORD, &raw)
    }
}

fn read_record(backend: &dyn KeyValueStore) -> Result<BTreeSet<CompositeKey>, StorageError> {
    match backend.get(FAVOURITES_RECORD)? {
        Some(raw) => Ok(serde_json::from_str::<Vec<CompositeKey>>(&raw)?
            .into_iter()
            .collect()),
        None => Ok(BTreeSet::new()),
    }
}
