//! Decoding of feed response bodies.
//!
//! The feed answers with one of three shapes: a bare array of matches, an
//! object carrying a `matches` array, or an object carrying a `data` array.
//! Anything else is treated as an empty snapshot.

use serde_json::Value;
use tracing::debug;

use super::FetchError;
use crate::db::models::Match;

/// Recognised top-level body shapes.
#[derive(Debug, PartialEq)]
pub enum FeedPayload {
    Bare(Vec<Value>),
    Matches(Vec<Value>),
    Data(Vec<Value>),
    Unrecognized,
}

impl FeedPayload {
    pub fn from_value(raw: Value) -> Self {
        match raw {
            Value::Array(items) => FeedPayload::Bare(items),
            Value::Object(mut obj) => {
                if let Some(Value::Array(items)) = obj.remove("matches") {
                    FeedPayload::Matches(items)
                } else if let Some(Value::Array(items)) = obj.remove("data") {
                    FeedPayload::Data(items)
                } else {
                    FeedPayload::Unrecognized
                }
            }
            _ => FeedPayload::Unrecognized,
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            FeedPayload::Bare(items) | FeedPayload::Matches(items) | FeedPayload::Data(items) => {
                items
            }
            FeedPayload::Unrecognized => vec![],
        }
    }
}

/// Decode a raw response body into matches.
///
/// A body that is not JSON at all is `Malformed`; a JSON body of an unknown
/// shape yields an empty snapshot.
pub fn decode_body(body: &str) -> Result<Vec<Match>, FetchError> {
    let raw: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let payload = FeedPayload::from_value(raw);
    if payload == FeedPayload::Unrecognized {
        debug!("Feed body has no recognised match array, treating as empty");
    }
    Ok(payload
        .into_records()
        .iter()
        .filter_map(|record| {
            let parsed = parse_match(record);
            if parsed.is_none() {
                debug!("Skipping feed record without an id: {}", record);
            }
            parsed
        })
        .collect())
}

fn parse_match(ev: &Value) -> Option<Match> {
    let id = match &ev["id"] {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_id(n),
        _ => return None,
    };

    Some(Match {
        id,
        sport: text(ev, "sport").unwrap_or_default(),
        league: text(ev, "league").unwrap_or_default(),
        venue: text(ev, "venue"),
        home_team: text(ev, "homeTeam").unwrap_or_default(),
        away_team: text(ev, "awayTeam").unwrap_or_default(),
        home_score: score(&ev["homeScore"]),
        away_score: score(&ev["awayScore"]),
        status: text(ev, "status").unwrap_or_default(),
        match_time: text(ev, "matchTime").unwrap_or_default(),
        last_updated: text(ev, "lastUpdated"),
        source: text(ev, "source"),
    })
}

/// Integral floats render without a fractional part (`1.0` is id `1`).
fn number_id(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn text(ev: &Value, field: &str) -> Option<String> {
    ev[field].as_str().map(str::to_string)
}

fn score(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
