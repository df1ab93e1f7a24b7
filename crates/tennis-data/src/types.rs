//! Type definitions for tennis match and prediction records.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Normalized player name.
///
/// Normalization only trims surrounding whitespace. It is not injective:
/// "Nadal R." and "Rafael Nadal" stay two different ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Trims `raw`; returns `None` when nothing is left.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PlayerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One historical match result that survived date and name parsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Player who won the match.
    pub winner: PlayerId,
    /// Player who lost the match.
    pub loser: PlayerId,
    /// Match (or tournament start) date.
    pub date: NaiveDate,
    /// Court surface, e.g. `Clay`.
    pub surface: String,
    /// Tournament level, e.g. `Grand Slam`.
    pub level: String,
}

/// Closing odds for one historical match, keyed by its winner and loser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    /// Player who won the match.
    pub winner: PlayerId,
    /// Player who lost the match.
    pub loser: PlayerId,
    /// Decimal odds quoted on the winner (`PSW`).
    pub winner_odds: Option<f64>,
    /// Decimal odds quoted on the loser (`PSL`).
    pub loser_odds: Option<f64>,
}

/// A realized outcome for one prediction row, ready for a loop query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredictionQuery {
    /// First listed player.
    pub a: PlayerId,
    /// Second listed player.
    pub b: PlayerId,
    /// Player who actually won.
    pub actual_winner: PlayerId,
    /// Player who actually lost.
    pub actual_loser: PlayerId,
}

/// Typed view of one prediction CSV row.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionRow {
    /// Zero-based row position in the source table.
    pub index: usize,
    /// `A` column as written in the file.
    pub a_raw: String,
    /// `B` column as written in the file.
    pub b_raw: String,
    /// Normalized `A`, `None` when blank.
    pub a: Option<PlayerId>,
    /// Normalized `B`, `None` when blank.
    pub b: Option<PlayerId>,
    /// `Awin` outcome; `None` when missing or unparsable.
    pub a_won: Option<bool>,
    /// Decimal odds on A (`PSA`).
    pub odds_a: Option<f64>,
    /// Decimal odds on B (`PSB`).
    pub odds_b: Option<f64>,
    /// Every `*_prob` column holding a number, keyed by column name.
    pub probabilities: BTreeMap<String, f64>,
}

impl PredictionRow {
    /// Probability that A wins according to `source`.
    pub fn prob(&self, source: &str) -> Option<f64> {
        self.probabilities.get(source).copied()
    }

    /// Winner/loser view of the row; `None` when a name or the outcome is missing.
    pub fn query(&self) -> Option<PredictionQuery> {
        let a = self.a.clone()?;
        let b = self.b.clone()?;
        let a_won = self.a_won?;
        let (actual_winner, actual_loser) = if a_won {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        Some(PredictionQuery {
            a,
            b,
            actual_winner,
            actual_loser,
        })
    }
}

/// Dominant hand of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Right,
    Left,
}

/// Physical attributes of a player from the player directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Name as listed in the directory ("Lastname Firstname").
    pub name: String,
    /// Height in centimetres.
    pub height_cm: Option<f64>,
    /// Dominant hand.
    pub handedness: Option<Handedness>,
}

impl PlayerProfile {
    /// Both height and handedness are known.
    pub fn is_complete(&self) -> bool {
        self.height_cm.is_some() && self.handedness.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(PlayerId::normalize("  Nadal R. ").unwrap().as_str(), "Nadal R.");
        assert!(PlayerId::normalize("   ").is_none());
        assert!(PlayerId::normalize("").is_none());
    }

    #[test]
    fn query_orients_winner_and_loser() {
        let mut row = PredictionRow {
            index: 0,
            a_raw: "Alice".into(),
            b_raw: "Bob".into(),
            a: PlayerId::normalize("Alice"),
            b: PlayerId::normalize("Bob"),
            a_won: Some(false),
            odds_a: None,
            odds_b: None,
            probabilities: BTreeMap::new(),
        };

        let query = row.query().expect("complete row");
        assert_eq!(query.actual_winner.as_str(), "Bob");
        assert_eq!(query.actual_loser.as_str(), "Alice");

        row.a_won = None;
        assert!(row.query().is_none());
    }

    #[test]
    fn match_record_serializes_iso_date() {
        let record = MatchRecord {
            winner: PlayerId::normalize("Alcaraz C.").unwrap(),
            loser: PlayerId::normalize("Musetti L.").unwrap(),
            date: NaiveDate::from_ymd_opt(2023, 5, 29).unwrap(),
            surface: "Clay".into(),
            level: "Grand Slam".into(),
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("Alcaraz C.,Musetti L.,2023-05-29,Clay,Grand Slam"));

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let back: MatchRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(back, record);
    }
}
