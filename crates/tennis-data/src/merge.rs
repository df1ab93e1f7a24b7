//! Attaches realized outcomes and closing odds to prediction rows.
//!
//! A prediction row (A, B) is matched against historical results by exact
//! normalized name pair in both orientations. The first historical row per
//! orientation is used; when a pair met in both orientations the B-won match
//! is applied last and therefore wins.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::table::{PredictionTable, COL_A, COL_AWIN, COL_B, COL_MARKET_PROB, COL_ODDS_A, COL_ODDS_B};
use crate::types::{MatchOdds, PlayerId};

/// Summary of a merge pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    /// Rows matched to a result where A won.
    pub a_won: usize,
    /// Rows matched to a result where B won.
    pub b_won: usize,
    /// Rows still without an outcome, as `(A, B)` text.
    pub unmatched: Vec<(String, String)>,
}

impl MergeReport {
    /// Rows that received an outcome.
    pub fn matched(&self) -> usize {
        self.a_won + self.b_won
    }
}

fn format_odds(odds: Option<f64>) -> String {
    odds.map(|o| o.to_string()).unwrap_or_default()
}

/// Fills `Awin`, `PSA` and `PSB` from `history` and moves those columns (plus
/// `ps_prob`, when present) to the end of the table.
pub fn merge_match_odds(table: &mut PredictionTable, history: &[MatchOdds]) -> MergeReport {
    merge_match_odds_with(table, history, |_| {})
}

/// [`merge_match_odds`], calling `on_row` with each prediction row index once
/// that row has been looked up.
pub fn merge_match_odds_with<F>(
    table: &mut PredictionTable,
    history: &[MatchOdds],
    mut on_row: F,
) -> MergeReport
where
    F: FnMut(usize),
{
    let mut first_by_pair: HashMap<(&PlayerId, &PlayerId), &MatchOdds> = HashMap::new();
    for odds in history {
        first_by_pair
            .entry((&odds.winner, &odds.loser))
            .or_insert(odds);
    }

    for col in [COL_ODDS_A, COL_ODDS_B, COL_AWIN] {
        table.ensure_column(col);
    }

    let mut report = MergeReport::default();
    for row in 0..table.len() {
        let a = table.get(row, COL_A).and_then(PlayerId::normalize);
        let b = table.get(row, COL_B).and_then(PlayerId::normalize);
        let (Some(a), Some(b)) = (a, b) else {
            debug!(row, "prediction row without both player names");
            on_row(row);
            continue;
        };

        let a_won_match = first_by_pair.get(&(&a, &b)).copied();
        let b_won_match = first_by_pair.get(&(&b, &a)).copied();

        if let Some(found) = a_won_match {
            table.set(row, COL_AWIN, "1");
            table.set(row, COL_ODDS_A, format_odds(found.winner_odds));
            table.set(row, COL_ODDS_B, format_odds(found.loser_odds));
        }
        if let Some(found) = b_won_match {
            table.set(row, COL_AWIN, "0");
            table.set(row, COL_ODDS_A, format_odds(found.loser_odds));
            table.set(row, COL_ODDS_B, format_odds(found.winner_odds));
        }

        match (a_won_match, b_won_match) {
            (_, Some(_)) => report.b_won += 1,
            (Some(_), None) => report.a_won += 1,
            (None, None) => {}
        }
        on_row(row);
    }

    for row in 0..table.len() {
        if table.get(row, COL_AWIN).map_or(true, |v| v.trim().is_empty()) {
            report.unmatched.push((
                table.get(row, COL_A).unwrap_or_default().to_string(),
                table.get(row, COL_B).unwrap_or_default().to_string(),
            ));
        }
    }

    table.move_to_end(&[COL_ODDS_A, COL_ODDS_B, COL_AWIN, COL_MARKET_PROB]);

    info!(
        a_won = report.a_won,
        b_won = report.b_won,
        unmatched = report.unmatched.len(),
        "prediction rows merged with match odds"
    );
    report
}
