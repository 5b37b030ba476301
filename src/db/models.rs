use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One live, scheduled or finished match as delivered by the feed.
///
/// Matches are replaced wholesale on every poll; nothing mutates a field in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Feed-assigned identifier. The feed may reuse it for a later event.
    pub id: String,
    pub sport: String,
    pub league: String,
    pub venue: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    /// Free-text status string exactly as the feed sent it
    pub status: String,
    /// Scheduled kickoff, raw ISO-8601 text
    pub match_time: String,
    pub last_updated: Option<String>,
    pub source: Option<String>,
}

impl Match {
    /// Parsed kickoff instant, `None` when `match_time` is missing or garbage.
    pub fn kickoff(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.match_time)
    }

    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(&self.id, &self.match_time)
    }
}

/// Favourites address: `<id>_<ISO kickoff>`.
///
/// Two events sharing a raw id but scheduled at different times always get
/// different keys. The kickoff part is empty when the time cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(id: &str, match_time: &str) -> Self {
        let iso = parse_instant(match_time)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default();
        CompositeKey(format!("{}_{}", id, iso))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CompositeKey {
    fn from(raw: String) -> Self {
        CompositeKey(raw)
    }
}

/// Parse a feed timestamp.
///
/// Accepts RFC 3339, a naive date-time (taken as UTC) or a bare date (UTC
/// midnight).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
pub(crate) fn sample(id: &str, match_time: &str) -> Match {
    Match {
        id: id.into(),
        sport: "Football".into(),
        league: "Premier League".into(),
        venue: None,
        home_team: "Arsenal".into(),
        away_team: "Chelsea".into(),
        home_score: Some(0),
        away_score: Some(0),
        status: "live".into(),
        match_time: match_time.into(),
        last_updated: None,
        source: None,
    }
}
