//! Shin's method: bookmaker odds to fair win probabilities.
//!
//! Shin models the overround as the bookmaker's protection against a share
//! `z` of insider money. With inverse odds `π_i` and booksum `Π = Σ π_i`,
//! the fair probability of outcome `i` is
//!
//! ```text
//! p_i = (sqrt(z² + 4(1 − z) π_i² / Π) − z) / (2(1 − z))
//! ```
//!
//! Two outcomes have a closed form for `z`; more outcomes solve for `z` by
//! fixed-point iteration.

use eyre::{eyre, Result};
use serde::Serialize;
use tennis_data::table::{PredictionTable, COL_MARKET_PROB, COL_ODDS_A, COL_ODDS_B};
use tennis_data::predictions::parse_number;
use tracing::{info, warn};

const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: f64 = 1e-12;

/// Fair probabilities and the fitted insider share.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShinFit {
    pub probabilities: Vec<f64>,
    pub z: f64,
}

fn shin_probability(z: f64, inverse: f64, booksum: f64) -> f64 {
    ((z * z + 4.0 * (1.0 - z) * inverse * inverse / booksum).sqrt() - z) / (2.0 * (1.0 - z))
}

/// Fits Shin's model to decimal odds.
///
/// # Errors
/// Returns error for fewer than two odds or any odds that are not finite and
/// above 1.0.
pub fn shin_fit(odds: &[f64]) -> Result<ShinFit> {
    if odds.len() < 2 {
        return Err(eyre!("shin needs at least two odds, got {}", odds.len()));
    }
    if let Some(bad) = odds.iter().find(|o| !o.is_finite() || **o <= 1.0) {
        return Err(eyre!("decimal odds must be above 1.0, got {bad}"));
    }

    let inverse: Vec<f64> = odds.iter().map(|o| 1.0 / o).collect();
    let booksum: f64 = inverse.iter().sum();
    let n = inverse.len();

    let z = if n == 2 {
        let diff = inverse[0] - inverse[1];
        let diff_sq = diff * diff;
        ((booksum - 1.0) * (diff_sq - booksum)) / (booksum * (diff_sq - 1.0))
    } else {
        let mut z = 0.0;
        for _ in 0..MAX_ITERATIONS {
            let previous = z;
            let total: f64 = inverse
                .iter()
                .map(|pi| (z * z + 4.0 * (1.0 - z) * pi * pi / booksum).sqrt())
                .sum();
            z = (total - 2.0) / (n as f64 - 2.0);
            if (z - previous).abs() < TOLERANCE {
                break;
            }
        }
        z
    };

    if !z.is_finite() || z >= 1.0 {
        return Err(eyre!("shin fit diverged (z = {z})"));
    }

    Ok(ShinFit {
        probabilities: inverse
            .iter()
            .map(|&pi| shin_probability(z, pi, booksum))
            .collect(),
        z,
    })
}

/// Fair probabilities for `odds`.
///
/// # Errors
/// See [`shin_fit`].
pub fn shin_probabilities(odds: &[f64]) -> Result<Vec<f64>> {
    Ok(shin_fit(odds)?.probabilities)
}

/// Rows written by [`devig_table`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DevigReport {
    pub filled: usize,
    /// Rows left blank because odds were missing or rejected.
    pub blank: usize,
}

/// Writes the Shin probability for A from `PSA`/`PSB` into `ps_prob`.
pub fn devig_table(table: &mut PredictionTable) -> DevigReport {
    table.ensure_column(COL_MARKET_PROB);
    let mut report = DevigReport::default();

    for row in 0..table.len() {
        let odds_a = table.get(row, COL_ODDS_A).and_then(parse_number);
        let odds_b = table.get(row, COL_ODDS_B).and_then(parse_number);

        let value = match (odds_a, odds_b) {
            (Some(a), Some(b)) => match shin_probabilities(&[a, b]) {
                Ok(probs) => Some(probs[0]),
                Err(err) => {
                    warn!(row, error = %err, "odds rejected by shin fit");
                    None
                }
            },
            _ => None,
        };

        match value {
            Some(p) => {
                table.set(row, COL_MARKET_PROB, p.to_string());
                report.filled += 1;
            }
            None => {
                table.set(row, COL_MARKET_PROB, "");
                report.blank += 1;
            }
        }
    }

    info!(filled = report.filled, blank = report.blank, "market probabilities written");
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_way_market_sums_to_one() {
        let probs = shin_probabilities(&[1.5, 2.8]).unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((probs[0] - 0.6547619047619048).abs() < 1e-9);
        // Shin shifts margin towards the longshot less than proportional scaling.
        let proportional = (1.0 / 1.5) / (1.0 / 1.5 + 1.0 / 2.8);
        assert!(probs[0] > proportional);
    }

    #[test]
    fn equal_odds_split_evenly() {
        let probs = shin_probabilities(&[1.9, 1.9]).unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!((probs[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn three_way_market_converges() {
        let fit = shin_fit(&[2.1, 3.4, 3.6]).unwrap();
        assert!(fit.z > 0.0 && fit.z < 1.0);
        assert!((fit.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(fit.probabilities[0] > fit.probabilities[1]);
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(shin_probabilities(&[2.0]).is_err());
        assert!(shin_probabilities(&[1.0, 3.0]).is_err());
        assert!(shin_probabilities(&[0.5, 3.0]).is_err());
        assert!(shin_probabilities(&[f64::NAN, 3.0]).is_err());
    }

    #[test]
    fn devig_fills_market_column() {
        let mut table =
            PredictionTable::read("A,B,PSA,PSB\nAlice,Bob,1.9,1.9\nCarol,Dave,,2.0\nErin,Finn,1.0,9\n".as_bytes())
                .unwrap();

        let report = devig_table(&mut table);
        assert_eq!(report.filled, 1);
        assert_eq!(report.blank, 2);
        assert_eq!(table.get(0, "ps_prob"), Some("0.5"));
        assert_eq!(table.get(1, "ps_prob"), Some(""));
        assert_eq!(table.get(2, "ps_prob"), Some(""));
    }
}
