//! Players who keep showing up where the model alone got it wrong.

use std::collections::HashMap;

use serde::Serialize;
use tennis_data::types::PredictionRow;
use tracing::info;

use crate::metrics::calls_outcome;

/// Report size used when none is given.
pub const DEFAULT_TOP_PLAYERS: usize = 10;

/// Appearances of one player in missed rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerCount {
    pub player: String,
    pub count: usize,
}

/// Rows where every baseline is correct and the model is wrong, judged by
/// [`calls_outcome`] so that a 0.5 tie counts as calling B.
///
/// Rows missing the outcome, the model or any baseline probability are
/// ignored.
pub fn model_misses<'a>(
    rows: &'a [PredictionRow],
    model: &str,
    baselines: &[String],
) -> Vec<&'a PredictionRow> {
    rows.iter()
        .filter(|row| {
            let Some(a_won) = row.a_won else {
                return false;
            };
            let Some(p) = row.prob(model) else {
                return false;
            };
            !calls_outcome(p, a_won)
                && baselines
                    .iter()
                    .all(|b| row.prob(b).is_some_and(|q| calls_outcome(q, a_won)))
        })
        .collect()
}

/// The `top` most frequent players across `A` and `B` of the missed rows,
/// by count descending then name.
pub fn frequent_players_in_misses(
    rows: &[PredictionRow],
    model: &str,
    baselines: &[String],
    top: usize,
) -> Vec<PlayerCount> {
    let misses = model_misses(rows, model, baselines);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in &misses {
        for player in [&row.a, &row.b].into_iter().flatten() {
            *counts.entry(player.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<PlayerCount> = counts
        .into_iter()
        .map(|(player, count)| PlayerCount {
            player: player.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|x, y| y.count.cmp(&x.count).then_with(|| x.player.cmp(&y.player)));
    ranked.truncate(top);

    info!(misses = misses.len(), players = ranked.len(), "frequent players in model misses");
    ranked
}
