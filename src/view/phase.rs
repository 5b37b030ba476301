//! Live detection.
//!
//! The kickoff time is authoritative: a match is upcoming before kickoff,
//! live for a sport-dependent window after it, and finished afterwards. The
//! feed's status text is only consulted when the kickoff cannot be parsed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::sport::is_basketball;
use crate::db::models::Match;

/// Minutes a non-basketball match counts as live after kickoff.
const GENERIC_LIVE_WINDOW_MIN: i64 = 150;
/// Quarter breaks plus half time.
const BASKETBALL_BREAKS_MIN: i64 = 19;
/// Timeouts, reviews and overtime.
const BASKETBALL_BUFFER_MIN: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    Upcoming,
    Live,
    Finished,
}

pub fn live_window_minutes(sport: &str, league: &str) -> i64 {
    if is_basketball(sport) {
        let play = if league.to_lowercase().contains("nba") { 48 } else { 40 };
        play + BASKETBALL_BREAKS_MIN + BASKETBALL_BUFFER_MIN
    } else {
        GENERIC_LIVE_WINDOW_MIN
    }
}

pub fn classify(m: &Match, now: DateTime<Utc>) -> MatchPhase {
    match m.kickoff() {
        Some(kickoff) if kickoff > now => MatchPhase::Upcoming,
        Some(kickoff) => {
            let elapsed = (now - kickoff).num_minutes();
            if elapsed <= live_window_minutes(&m.sport, &m.league) {
                MatchPhase::Live
            } else {
                MatchPhase::Finished
            }
        }
        None => classify_status(&m.status),
    }
}

/// Whole minutes since kickoff for a match that is live by the clock.
pub fn elapsed_minutes(m: &Match, now: DateTime<Utc>) -> Option<i64> {
    let kickoff = m.kickoff()?;
    if kickoff > now {
        return None;
    }
    let elapsed = (now - kickoff).num_minutes();
    let window = live_window_minutes(&m.sport, &m.league);
    (elapsed <= window).then_some(elapsed)
}

fn classify_status(status: &str) -> MatchPhase {
    let st = status.to_lowercase();
    if st.contains("live") {
        return MatchPhase::Live;
    }
    let finished = st
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| matches!(w, "ft" | "finished" | "final" | "ended" | "full"));
    if finished {
        MatchPhase::Finished
    } else {
        MatchPhase::Upcoming
    }
}
