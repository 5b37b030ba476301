//! Engine state: the displayed snapshot, transient arrival/departure markers,
//! favourites and the user's view inputs.
//!
//! All mutation happens through `apply_fetch`, `run_deferred` and the
//! setters. Timed effects are not scheduled here; `apply_fetch` returns them
//! as `Deferred` values and the polling loop decides when to run them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

use super::diff::{id_set, SnapshotDiff};
use super::favourites::FavouritesStore;
use crate::db::models::{CompositeKey, Match};
use crate::feed::FetchError;
use crate::view::phase::{self, MatchPhase};
use crate::view::sport::is_primary_sport;
use crate::view::{self, LeagueSummary, SortOption, SportSummary, ViewQuery};

pub const EMPTY_FEED_WARNING: &str = "feed returned no matches, showing last known data";

/// Timed follow-up to a fetch. Each one carries exactly the ids it owns, so
/// overlapping windows never clear each other's markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    ClearArrived(HashSet<String>),
    CommitDeparture {
        generation: u64,
        departing: HashSet<String>,
    },
}

struct PendingCommit {
    generation: u64,
    matches: Vec<Match>,
}

pub struct SyncState {
    /// What presentation shows; lags behind the feed while matches depart
    snapshot: Vec<Match>,
    prev_ids: HashSet<String>,
    arrived: HashSet<String>,
    departing: HashSet<String>,
    pending: Option<PendingCommit>,
    generation: u64,
    favourites: FavouritesStore,
    query: ViewQuery,
    auto_selected: bool,
    loading: bool,
    last_error: Option<String>,
}

impl SyncState {
    pub fn new(favourites: FavouritesStore, search_min_chars: usize) -> Self {
        SyncState {
            snapshot: Vec::new(),
            prev_ids: HashSet::new(),
            arrived: HashSet::new(),
            departing: HashSet::new(),
            pending: None,
            generation: 0,
            favourites,
            query: ViewQuery {
                search_min_chars,
                ..ViewQuery::default()
            },
            auto_selected: false,
            loading: true,
            last_error: None,
        }
    }

    /// Fold one fetch outcome into the state.
    pub fn apply_fetch(&mut self, result: Result<Vec<Match>, FetchError>) -> Vec<Deferred> {
        self.loading = false;

        let incoming = match result {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Feed fetch failed, keeping last snapshot: {}", e);
                self.last_error = Some(e.to_string());
                return vec![];
            }
        };

        if incoming.is_empty() {
            warn!("Feed returned no matches, keeping last snapshot");
            self.last_error = Some(EMPTY_FEED_WARNING.to_string());
            return vec![];
        }

        self.last_error = None;
        self.generation += 1;

        let curr_ids = id_set(&incoming);
        let diff = SnapshotDiff::between(&self.prev_ids, &curr_ids);
        self.prev_ids = curr_ids;
        debug!(
            "Snapshot #{}: {} match(es), {} added, {} removed",
            self.generation,
            incoming.len(),
            diff.added.len(),
            diff.removed.len()
        );

        let mut deferred = Vec::new();
        if !diff.added.is_empty() {
            self.arrived.extend(diff.added.iter().cloned());
            deferred.push(Deferred::ClearArrived(diff.added));
        }

        self.auto_select_sport(&incoming);
        let mut sorted = incoming;
        sorted.sort_by(view::cmp_alpha);

        if diff.removed.is_empty() {
            self.pending = None;
            self.commit(sorted);
        } else {
            self.departing.extend(diff.removed.iter().cloned());
            self.pending = Some(PendingCommit {
                generation: self.generation,
                matches: sorted,
            });
            deferred.push(Deferred::CommitDeparture {
                generation: self.generation,
                departing: diff.removed,
            });
        }
        deferred
    }

    pub fn run_deferred(&mut self, deferred: Deferred) {
        match deferred {
            Deferred::ClearArrived(ids) => self.arrived.retain(|id| !ids.contains(id)),
            Deferred::CommitDeparture {
                generation,
                departing,
            } => {
                self.departing.retain(|id| !departing.contains(id));
                match self.pending.take() {
                    Some(pending) if pending.generation == generation => {
                        self.commit(pending.matches)
                    }
                    other => self.pending = other,
                }
            }
        }
    }

    /// Settle every outstanding timed effect at once: markers are cleared and
    /// a pending departure snapshot is committed. Used when the timers that
    /// would have done this are dropped.
    pub fn flush_deferred(&mut self) {
        self.arrived.clear();
        self.departing.clear();
        if let Some(pending) = self.pending.take() {
            self.commit(pending.matches);
        }
    }

    fn commit(&mut self, matches: Vec<Match>) {
        self.snapshot = matches;
        if let Err(e) = self.favourites.prune(&self.snapshot) {
            warn!("Failed to persist pruned favourites: {}", e);
            self.last_error = Some(format!("favourites not saved: {}", e));
        }
    }

    fn auto_select_sport(&mut self, incoming: &[Match]) {
        if self.auto_selected || self.query.sport.is_some() {
            return;
        }
        let pick = incoming
            .iter()
            .find(|m| is_primary_sport(&m.sport))
            .or_else(|| incoming.first())
            .map(|m| m.sport.clone());
        if let Some(sport) = pick {
            info!("Auto-selected sport '{}'", sport);
            self.query.sport = Some(sport);
            self.auto_selected = true;
        }
    }

    // ── Presentation mutators ────────────────────────────────────────────────

    /// Selecting a sport always resets the league filter.
    pub fn set_sport(&mut self, sport: Option<String>) {
        self.query.sport = sport;
        self.query.league = None;
        self.auto_selected = true;
    }

    pub fn set_league(&mut self, league: Option<String>) {
        self.query.league = league;
    }

    pub fn set_search(&mut self, search: String) {
        self.query.search = search;
    }

    pub fn set_sort(&mut self, sort: SortOption) {
        self.query.sort = sort;
    }

    /// Flip a favourite; returns whether the key is now a favourite. A failed
    /// write is recorded as a warning but the toggle still takes effect.
    pub fn toggle_favourite(&mut self, key: CompositeKey) -> bool {
        let (now_favourite, persisted) = self.favourites.toggle_key(key);
        if let Err(e) = persisted {
            warn!("Failed to persist favourites: {}", e);
            self.last_error = Some(format!("favourites not saved: {}", e));
        }
        now_favourite
    }

    // ── Read side ────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &[Match] {
        &self.snapshot
    }

    pub fn arrived(&self) -> &HashSet<String> {
        &self.arrived
    }

    pub fn departing(&self) -> &HashSet<String> {
        &self.departing
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn visible_favourites(&self) -> BTreeSet<CompositeKey> {
        self.favourites.visible(&self.snapshot)
    }

    /// Full derived view as consumed by presentation.
    pub fn view(&self, now: DateTime<Utc>) -> EngineView {
        let favourites = self.visible_favourites();
        let matches = view::visible_matches(&self.snapshot, &self.query, &favourites)
            .into_iter()
            .map(|m| {
                let key = m.composite_key();
                MatchRow {
                    favourite: self.favourites.is_favourite(&m),
                    arrived: self.arrived.contains(&m.id),
                    departing: self.departing.contains(&m.id),
                    phase: phase::classify(&m, now),
                    elapsed_minutes: phase::elapsed_minutes(&m, now),
                    key,
                    inner: m,
                }
            })
            .collect();

        EngineView {
            matches,
            loading: self.loading,
            error: self.last_error.clone(),
            selected_sport: self.query.sport.clone(),
            selected_league: self.query.league.clone(),
            search: self.query.search.clone(),
            sort: self.query.sort,
            arrived: sorted_ids(&self.arrived),
            departing: sorted_ids(&self.departing),
            favourite_count: favourites.len(),
            favourites: favourites.into_iter().collect(),
            sports: view::sport_summaries(&self.snapshot, now),
            leagues: view::league_summaries(&self.snapshot, self.query.sport.as_deref()),
        }
    }
}

fn sorted_ids(ids: &HashSet<String>) -> Vec<String> {
    let mut out: Vec<String> = ids.iter().cloned().collect();
    out.sort();
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRow {
    #[serde(flatten)]
    pub inner: Match,
    pub key: CompositeKey,
    pub favourite: bool,
    pub arrived: bool,
    pub departing: bool,
    pub phase: MatchPhase,
    pub elapsed_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineView {
    pub matches: Vec<MatchRow>,
    pub loading: bool,
    pub error: Option<String>,
    pub selected_sport: Option<String>,
    pub selected_league: Option<String>,
    pub search: String,
    pub sort: SortOption,
    pub arrived: Vec<String>,
    pub departing: Vec<String>,
    pub favourites: Vec<CompositeKey>,
    pub favourite_count: usize,
    pub sports: Vec<SportSummary>,
    pub leagues: Vec<LeagueSummary>,
}
