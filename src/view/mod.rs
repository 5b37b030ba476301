//! Derived view: the filtered, searched and sorted projection of the current
//! snapshot, plus the sport and league summaries used for navigation.
//!
//! Everything here is a pure function of its arguments. The current time is
//! passed in so that live detection does not make the output drift between
//! two calls with the same inputs.

pub mod phase;
pub mod sport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::db::models::{CompositeKey, Match};
use phase::MatchPhase;
use sport::{icon_for_sport, is_primary_sport, SportIcon};

/// Sport filter value selecting the favourites pseudo-category.
pub const FAVOURITES_CATEGORY: &str = "__FAV__";
/// League filter value (and summary key) meaning "every league".
pub const ALL_LEAGUES: &str = "__ALL__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOption {
    TimeAsc,
    TimeDesc,
    #[default]
    Alpha,
    AlphaDesc,
    Status,
}

/// User-controlled inputs of the derived view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub sport: Option<String>,
    pub league: Option<String>,
    pub search: String,
    pub sort: SortOption,
    /// Trimmed queries shorter than this do not filter
    pub search_min_chars: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        ViewQuery {
            sport: None,
            league: None,
            search: String::new(),
            sort: SortOption::default(),
            search_min_chars: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SportSummary {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub any_live: bool,
    pub icon: SportIcon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeagueSummary {
    pub key: String,
    pub label: String,
    pub count: usize,
}

/// One summary per sport in first-seen order, with the primary sport moved
/// to the front.
pub fn sport_summaries(snapshot: &[Match], now: DateTime<Utc>) -> Vec<SportSummary> {
    let mut list: Vec<SportSummary> = Vec::new();
    for m in snapshot {
        let live = phase::classify(m, now) == MatchPhase::Live;
        match list.iter_mut().find(|s| s.key == m.sport) {
            Some(found) => {
                found.count += 1;
                found.any_live |= live;
            }
            None => list.push(SportSummary {
                key: m.sport.clone(),
                label: m.sport.clone(),
                count: 1,
                any_live: live,
                icon: icon_for_sport(&m.sport),
            }),
        }
    }

    if let Some(idx) = list.iter().position(|s| is_primary_sport(&s.key)) {
        if idx > 0 {
            let primary = list.remove(idx);
            list.insert(0, primary);
        }
    }
    list
}

/// Leagues of the selected sport, alphabetically, behind a synthetic "All"
/// entry. Empty when no sport or the favourites category is selected.
pub fn league_summaries(snapshot: &[Match], selected_sport: Option<&str>) -> Vec<LeagueSummary> {
    let sport = match selected_sport {
        Some(s) if s != FAVOURITES_CATEGORY => s,
        _ => return vec![],
    };

    let mut total = 0;
    let mut leagues: Vec<LeagueSummary> = Vec::new();
    for m in snapshot.iter().filter(|m| m.sport == sport) {
        total += 1;
        match leagues.iter_mut().find(|l| l.key == m.league) {
            Some(found) => found.count += 1,
            None => leagues.push(LeagueSummary {
                key: m.league.clone(),
                label: m.league.clone(),
                count: 1,
            }),
        }
    }
    leagues.sort_by(|a, b| locale_cmp(&a.label, &b.label));

    let mut out = Vec::with_capacity(leagues.len() + 1);
    out.push(LeagueSummary {
        key: ALL_LEAGUES.to_string(),
        label: "All".to_string(),
        count: total,
    });
    out.extend(leagues);
    out
}

/// Category filter, then search, then sort.
pub fn visible_matches(
    snapshot: &[Match],
    query: &ViewQuery,
    favourites: &BTreeSet<CompositeKey>,
) -> Vec<Match> {
    let mut base: Vec<&Match> = match query.sport.as_deref() {
        Some(FAVOURITES_CATEGORY) => snapshot
            .iter()
            .filter(|m| favourites.contains(&m.composite_key()))
            .collect(),
        sport => {
            let league = query.league.as_deref().filter(|l| *l != ALL_LEAGUES);
            snapshot
                .iter()
                .filter(|m| sport.map_or(true, |s| m.sport == s))
                .filter(|m| league.map_or(true, |l| m.league == l))
                .collect()
        }
    };

    let needle = query.search.trim().to_lowercase();
    if !needle.is_empty() && needle.chars().count() >= query.search_min_chars {
        base.retain(|m| {
            m.home_team.to_lowercase().contains(&needle)
                || m.away_team.to_lowercase().contains(&needle)
                || m.league.to_lowercase().contains(&needle)
        });
    }

    // sort_by is stable, which keeps equal keys in snapshot order.
    base.sort_by(|a, b| compare(query.sort, a, b));
    base.into_iter().cloned().collect()
}

pub fn compare(sort: SortOption, a: &Match, b: &Match) -> Ordering {
    match sort {
        SortOption::TimeAsc => cmp_time(a, b, false),
        SortOption::TimeDesc => cmp_time(a, b, true),
        SortOption::Alpha => cmp_alpha(a, b),
        SortOption::AlphaDesc => cmp_alpha(a, b).reverse(),
        SortOption::Status => locale_cmp(&a.status, &b.status),
    }
}

/// Home team, then away team, then league, then id.
pub fn cmp_alpha(a: &Match, b: &Match) -> Ordering {
    locale_cmp(&a.home_team, &b.home_team)
        .then_with(|| locale_cmp(&a.away_team, &b.away_team))
        .then_with(|| locale_cmp(&a.league, &b.league))
        .then_with(|| locale_cmp(&a.id, &b.id))
}

/// Kickoffs that cannot be parsed sort after every valid one, in either
/// direction, so they sink to the bottom of the list.
fn cmp_time(a: &Match, b: &Match, descending: bool) -> Ordering {
    match (a.kickoff(), b.kickoff()) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Root-collation style ordering in three levels: base letters (accents and
/// case ignored), then accents (unaccented first), then case (lowercase first).
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(&base_letters(b))
        .then_with(|| accented(a).cmp(&accented(b)))
        .then_with(|| b.cmp(a))
}

fn base_letters(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(fold_stroked)
        .flat_map(char::to_lowercase)
        .collect()
}

fn accented(s: &str) -> String {
    s.nfd().flat_map(char::to_lowercase).collect()
}

// Letters with a stroke have no canonical decomposition.
fn fold_stroked(c: char) -> char {
    match c {
        'Đ' | 'đ' => 'd',
        'Ł' | 'ł' => 'l',
        'Ø' | 'ø' => 'o',
        'Ħ' | 'ħ' => 'h',
        _ => c,
    }
}
