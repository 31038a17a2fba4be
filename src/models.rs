//! Extracted entities and the persisted snapshot shape.

use chrono::{DateTime, NaiveDateTime, Utc};
use custom_debug_derive::Debug as CustomDebug;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::parse::normalize_position;

/// Login identifier and secret. The secret never appears in `Debug` output.
#[derive(Clone, CustomDebug)]
pub struct Credential {
    pub identifier: String,
    #[debug(skip)]
    secret: String,
}

impl Credential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Canonical playing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "POR")]
    Goalkeeper,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "MED")]
    Midfielder,
    #[serde(rename = "DEL")]
    Forward,
}

impl Position {
    /// Resolve any recognized code or synonym; `None` for anything else.
    pub fn from_code(code: &str) -> Option<Self> {
        match normalize_position(code).as_str() {
            "POR" => Some(Self::Goalkeeper),
            "DEF" => Some(Self::Defender),
            "MED" => Some(Self::Midfielder),
            "DEL" => Some(Self::Forward),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Goalkeeper => "POR",
            Self::Defender => "DEF",
            Self::Midfielder => "MED",
            Self::Forward => "DEL",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which view a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(rename = "team")]
    Roster,
    Market,
}

/// A view the navigator can bring the session to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewTarget {
    Roster,
    Market,
}

impl ViewTarget {
    pub const ALL: [ViewTarget; 2] = [ViewTarget::Roster, ViewTarget::Market];

    /// Route segment used by the app's hash router.
    pub fn route_segment(self) -> &'static str {
        match self {
            ViewTarget::Roster => "team",
            ViewTarget::Market => "market",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewTarget::Roster => "roster",
            ViewTarget::Market => "market",
        }
    }
}

/// One extracted player.
///
/// `name` and `position` are always present: the extraction engine drops
/// candidates it cannot resolve them for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    pub position: Position,
    pub team: Option<String>,
    pub price: Option<i64>,
    pub listed_price: Option<i64>,
    pub status: Option<String>,
    pub trend: Option<String>,
    pub detail_url: Option<String>,
    pub expires_in: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
    pub clause: Option<i64>,
    pub clause_deposited: Option<i64>,
    pub owner: Option<String>,
    pub owner_url: Option<String>,
    pub clause_unlock_in: Option<String>,
    pub source: Source,
}

impl Record {
    pub fn new(name: impl Into<String>, position: Position, source: Source) -> Self {
        Self {
            name: name.into(),
            position,
            team: None,
            price: None,
            listed_price: None,
            status: None,
            trend: None,
            detail_url: None,
            expires_in: None,
            expires_at: None,
            clause: None,
            clause_deposited: None,
            owner: None,
            owner_url: None,
            clause_unlock_in: None,
            source,
        }
    }
}

/// One complete extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub scraped_at: DateTime<Utc>,
    pub league_id: String,
    pub balance: Option<i64>,
    pub team: Vec<Record>,
    pub market: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_hides_secret() {
        let credential = Credential::new("user@example.com", "hunter2");
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("user@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn position_from_synonyms() {
        assert_eq!(Position::from_code("gk"), Some(Position::Goalkeeper));
        assert_eq!(Position::from_code("DL"), Some(Position::Forward));
        assert_eq!(Position::from_code("lateral"), None);
    }

    #[test]
    fn record_serializes_every_field() {
        let mut record = Record::new("Pedri", Position::Midfielder, Source::Roster);
        record.price = Some(23_400_000);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["position"], "MED");
        assert_eq!(value["source"], "team");
        assert_eq!(value["price"], 23_400_000);
        assert!(value["listedPrice"].is_null());
        assert!(value["clauseUnlockIn"].is_null());
        assert!(value.as_object().unwrap().contains_key("ownerUrl"));
    }

    #[test]
    fn market_source_tag() {
        let record = Record::new("Isco", Position::Midfielder, Source::Market);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["source"], "market");
    }
}
