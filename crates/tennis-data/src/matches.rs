//! Historical match results: CSV ingestion and analysis-window filtering.
//!
//! The source file is a results export with at least `winner_name`,
//! `loser_name`, `Date`, `Surface` and `tourney_level` columns; closing odds
//! (`PSW`, `PSL`) are read when present. Rows are kept even when some fields
//! are unusable so that the odds merge and the win graph can each decide what
//! they need.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use tracing::{debug, info};

use crate::dates::parse_match_date;
use crate::types::{MatchOdds, MatchRecord, PlayerId};

/// Surface used by the default analysis window.
pub const DEFAULT_SURFACE: &str = "Clay";

/// Tournament levels used by the default analysis window.
pub const DEFAULT_LEVELS: [&str; 2] = ["Grand Slam", "Masters 1000"];

#[derive(Debug, Deserialize)]
struct RawMatchRow {
    #[serde(default)]
    winner_name: Option<String>,
    #[serde(default)]
    loser_name: Option<String>,
    #[serde(default, rename = "Date")]
    date: Option<String>,
    #[serde(default, rename = "Surface")]
    surface: Option<String>,
    #[serde(default)]
    tourney_level: Option<String>,
    #[serde(default, rename = "PSW", deserialize_with = "csv::invalid_option")]
    winner_odds: Option<f64>,
    #[serde(default, rename = "PSL", deserialize_with = "csv::invalid_option")]
    loser_odds: Option<f64>,
}

/// One row of the historical results file after field-level parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalMatch {
    /// Normalized winner name.
    pub winner: Option<PlayerId>,
    /// Normalized loser name.
    pub loser: Option<PlayerId>,
    /// Parsed match date.
    pub date: Option<NaiveDate>,
    /// Court surface, empty when missing.
    pub surface: String,
    /// Tournament level, empty when missing.
    pub level: String,
    /// Closing odds on the winner.
    pub winner_odds: Option<f64>,
    /// Closing odds on the loser.
    pub loser_odds: Option<f64>,
}

impl HistoricalMatch {
    /// Graph-ready record; `None` when a name or the date is unusable.
    pub fn record(&self) -> Option<MatchRecord> {
        Some(MatchRecord {
            winner: self.winner.clone()?,
            loser: self.loser.clone()?,
            date: self.date?,
            surface: self.surface.clone(),
            level: self.level.clone(),
        })
    }

    /// Odds view used by the prediction merge; needs both names only.
    pub fn odds(&self) -> Option<MatchOdds> {
        Some(MatchOdds {
            winner: self.winner.clone()?,
            loser: self.loser.clone()?,
            winner_odds: self.winner_odds,
            loser_odds: self.loser_odds,
        })
    }
}

impl From<RawMatchRow> for HistoricalMatch {
    fn from(raw: RawMatchRow) -> Self {
        Self {
            winner: raw.winner_name.as_deref().and_then(PlayerId::normalize),
            loser: raw.loser_name.as_deref().and_then(PlayerId::normalize),
            date: raw.date.as_deref().and_then(parse_match_date),
            surface: raw.surface.unwrap_or_default().trim().to_string(),
            level: raw.tourney_level.unwrap_or_default().trim().to_string(),
            winner_odds: raw.winner_odds.filter(|odds| odds.is_finite()),
            loser_odds: raw.loser_odds.filter(|odds| odds.is_finite()),
        }
    }
}

/// Loads the historical results file.
///
/// # Errors
/// Returns error if the file cannot be opened or its header cannot be read.
/// Malformed rows are skipped and logged at debug level.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_matches(path: &Path) -> Result<Vec<HistoricalMatch>> {
    let file = File::open(path)
        .wrap_err_with(|| format!("failed to open match history {}", path.display()))?;
    read_matches(file)
}

/// Reads historical results from any CSV source.
///
/// # Errors
/// Returns error if the CSV header cannot be read.
pub fn read_matches<R: Read>(reader: R) -> Result<Vec<HistoricalMatch>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .wrap_err("failed to read match history header")?
        .clone();
    if !headers.iter().any(|h| h == "winner_name") || !headers.iter().any(|h| h == "loser_name") {
        return Err(eyre!(
            "match history is missing winner_name/loser_name columns"
        ));
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (line, result) in csv_reader.deserialize::<RawMatchRow>().enumerate() {
        match result {
            Ok(raw) => rows.push(HistoricalMatch::from(raw)),
            Err(err) => {
                skipped += 1;
                debug!(line = line + 2, error = %err, "skipping malformed match row");
            }
        }
    }

    info!(rows = rows.len(), skipped, "match history loaded");
    Ok(rows)
}

/// Analysis window applied to historical results before graph construction.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchFilter {
    /// First included date.
    pub start: NaiveDate,
    /// Last included date (inclusive).
    pub end: NaiveDate,
    /// Required surface; `None` accepts every surface.
    pub surface: Option<String>,
    /// Accepted tournament levels; empty accepts every level.
    pub levels: BTreeSet<String>,
}

impl Default for MatchFilter {
    /// Clay Grand Slams and Masters 1000s, 2022-01-01 through 2025-03-31.
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap_or(NaiveDate::MAX),
            surface: Some(DEFAULT_SURFACE.to_string()),
            levels: DEFAULT_LEVELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl MatchFilter {
    /// Builds a filter, rejecting inverted date ranges.
    ///
    /// # Errors
    /// Returns error if `start` is after `end`.
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        surface: Option<String>,
        levels: BTreeSet<String>,
    ) -> Result<Self> {
        if start > end {
            return Err(eyre!("invalid window: start {start} is after end {end}"));
        }
        Ok(Self {
            start,
            end,
            surface,
            levels,
        })
    }

    /// Whether `record` falls inside the window.
    pub fn contains(&self, record: &MatchRecord) -> bool {
        record.date >= self.start
            && record.date <= self.end
            && self
                .surface
                .as_deref()
                .map_or(true, |surface| record.surface == surface)
            && (self.levels.is_empty() || self.levels.contains(&record.level))
    }
}

/// Counts from turning historical rows into filtered match records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Rows offered.
    pub rows: usize,
    /// Rows dropped for a missing name or unparsable date.
    pub unusable: usize,
    /// Usable rows outside the window.
    pub outside_window: usize,
    /// Rows kept.
    pub kept: usize,
}

/// Converts historical rows to records and keeps those inside `filter`.
pub fn filter_records(
    rows: &[HistoricalMatch],
    filter: &MatchFilter,
) -> (Vec<MatchRecord>, FilterStats) {
    let mut stats = FilterStats {
        rows: rows.len(),
        ..FilterStats::default()
    };

    let mut kept = Vec::new();
    for row in rows {
        let Some(record) = row.record() else {
            stats.unusable += 1;
            continue;
        };
        if filter.contains(&record) {
            kept.push(record);
        } else {
            stats.outside_window += 1;
        }
    }
    stats.kept = kept.len();

    info!(
        rows = stats.rows,
        unusable = stats.unusable,
        outside_window = stats.outside_window,
        kept = stats.kept,
        "historical matches filtered"
    );
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
tourney_level,Date,Surface,winner_name,loser_name,PSW,PSL
Grand Slam,29/05/2023,Clay,Alcaraz C.,Musetti L.,1.10,7.50
Masters 1000,2023-04-14,Clay, Sinner J. ,Rune H.,n/a,2.10
Grand Slam,not-a-date,Clay,Ruud C.,Zverev A.,1.90,1.95
Grand Slam,30/05/2023,Clay,,Zverev A.,1.90,1.95
ATP250,2023-04-20,Clay,Ruud C.,Fritz T.,1.50,2.60
";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reads_rows_and_tolerates_bad_fields() {
        let rows = read_matches(SAMPLE.as_bytes()).expect("sample parses");
        assert_eq!(rows.len(), 5);

        assert_eq!(rows[0].winner.as_ref().unwrap().as_str(), "Alcaraz C.");
        assert_eq!(rows[0].date, Some(ymd(2023, 5, 29)));
        assert_eq!(rows[0].winner_odds, Some(1.10));

        assert_eq!(rows[1].winner.as_ref().unwrap().as_str(), "Sinner J.");
        assert_eq!(rows[1].winner_odds, None);
        assert_eq!(rows[1].loser_odds, Some(2.10));

        assert!(rows[2].date.is_none());
        assert!(rows[2].record().is_none());
        assert!(rows[2].odds().is_some());

        assert!(rows[3].winner.is_none());
        assert!(rows[3].odds().is_none());
    }

    #[test]
    fn missing_name_columns_is_an_error() {
        let err = read_matches("Date,Surface\n2023-01-01,Clay\n".as_bytes());
        assert!(err.is_err());
    }

    #[test]
    fn default_filter_keeps_clay_slams_and_masters() {
        let rows = read_matches(SAMPLE.as_bytes()).unwrap();
        let (records, stats) = filter_records(&rows, &MatchFilter::default());

        assert_eq!(records.len(), 2);
        assert_eq!(stats.unusable, 2);
        assert_eq!(stats.outside_window, 1);
        assert_eq!(stats.kept, 2);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let filter = MatchFilter::new(
            ymd(2023, 4, 14),
            ymd(2023, 5, 29),
            None,
            BTreeSet::new(),
        )
        .unwrap();
        let rows = read_matches(SAMPLE.as_bytes()).unwrap();
        let (records, _) = filter_records(&rows, &filter);

        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        assert!(dates.contains(&ymd(2023, 4, 14)));
        assert!(dates.contains(&ymd(2023, 5, 29)));
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn inverted_window_rejected() {
        assert!(MatchFilter::new(ymd(2024, 1, 2), ymd(2024, 1, 1), None, BTreeSet::new()).is_err());
    }
}
