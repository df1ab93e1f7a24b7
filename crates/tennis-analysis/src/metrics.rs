//! Probability-source scoring: accuracy, Brier score, flat and Kelly ROI,
//! Jensen–Shannon divergence to a reference source and cumulative PnL.
//!
//! Every source is scored on the same aligned sample set: rows with an
//! outcome, odds on both sides, the reference probability and a probability
//! from every evaluated source.
//!
//! ## Staking
//!
//! Each row places one bet on the side the source favours: A with `p` and
//! `PSA` when `p > 0.5`, otherwise B with `1 - p` and `PSB`. A flat bet risks
//! one unit; a Kelly bet risks `kelly_stake(p_side, odds) * fraction`. The
//! bankroll is reset to 1 before every bet, so ROI is the mean per-bet return.

use eyre::{eyre, Result};
use serde::Serialize;
use tennis_data::types::PredictionRow;
use tracing::{debug, info};

use crate::stats::mean;

/// Full Kelly.
pub const DEFAULT_KELLY_FRACTION: f64 = 1.0;

/// Kelly fraction `clip((p·b − (1−p)) / b, 0, 1)` with `b = odds − 1`.
///
/// Returns 0 when `b <= 0`, i.e. decimal odds of 1.0 or less pay nothing.
pub fn kelly_stake(p: f64, odds: f64) -> f64 {
    let b = odds - 1.0;
    if b <= 0.0 {
        return 0.0;
    }
    ((p * b - (1.0 - p)) / b).clamp(0.0, 1.0)
}

/// Mean squared error between probabilities and 0/1 outcomes.
pub fn brier_score(probs: &[f64], outcomes: &[bool]) -> f64 {
    let errors: Vec<f64> = probs
        .iter()
        .zip(outcomes)
        .map(|(p, &won)| {
            let y = if won { 1.0 } else { 0.0 };
            (y - p).powi(2)
        })
        .collect();
    mean(&errors)
}

/// Whether `p > 0.5` agrees with the outcome; a 0.5 tie calls B.
pub fn calls_outcome(p: f64, a_won: bool) -> bool {
    (p > 0.5) == a_won
}

/// Share of rows where [`calls_outcome`] holds.
pub fn accuracy(probs: &[f64], outcomes: &[bool]) -> f64 {
    let hits: Vec<f64> = probs
        .iter()
        .zip(outcomes)
        .map(|(&p, &won)| if calls_outcome(p, won) { 1.0 } else { 0.0 })
        .collect();
    mean(&hits)
}

fn kl_term(x: f64, m: f64) -> f64 {
    if x > 0.0 {
        x * (x / m).log2()
    } else {
        0.0
    }
}

/// Base-2 Jensen–Shannon divergence between `[p, 1-p]` and `[q, 1-q]`.
pub fn binary_js_divergence(p: f64, q: f64) -> f64 {
    let (p1, q1) = (p.clamp(0.0, 1.0), q.clamp(0.0, 1.0));
    let (p0, q0) = (1.0 - p1, 1.0 - q1);
    let (m1, m0) = ((p1 + q1) / 2.0, (p0 + q0) / 2.0);
    let kl_p = kl_term(p1, m1) + kl_term(p0, m0);
    let kl_q = kl_term(q1, m1) + kl_term(q0, m0);
    (0.5 * kl_p + 0.5 * kl_q).max(0.0)
}

/// Mean per-row divergence between two aligned probability series.
pub fn js_divergence(p: &[f64], q: &[f64]) -> f64 {
    let per_row: Vec<f64> = p
        .iter()
        .zip(q)
        .map(|(&a, &b)| binary_js_divergence(a, b))
        .collect();
    mean(&per_row)
}

/// How much is risked on each bet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Staking {
    /// One unit per bet.
    Flat,
    /// Kelly stake scaled by the fraction.
    Kelly { fraction: f64 },
}

/// Validates a fractional Kelly multiplier.
///
/// # Errors
/// Returns error unless `0 < fraction <= 1`.
pub fn validate_kelly_fraction(fraction: f64) -> Result<f64> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(fraction)
    } else {
        Err(eyre!("kelly fraction must be in (0, 1], got {fraction}"))
    }
}

/// One aligned row used for scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalSample {
    pub a_won: bool,
    pub odds_a: f64,
    pub odds_b: f64,
    /// Source probability that A wins.
    pub p: f64,
    /// Reference probability that A wins.
    pub reference: f64,
}

impl EvalSample {
    /// Return of one bet on the favoured side.
    pub fn pnl(&self, staking: Staking) -> f64 {
        let (side_prob, odds, won) = if self.p > 0.5 {
            (self.p, self.odds_a, self.a_won)
        } else {
            (1.0 - self.p, self.odds_b, !self.a_won)
        };
        if !odds.is_finite() {
            return 0.0;
        }
        let stake = match staking {
            Staking::Flat => 1.0,
            Staking::Kelly { fraction } => kelly_stake(side_prob, odds) * fraction,
        };
        if won {
            stake * (odds - 1.0)
        } else {
            -stake
        }
    }
}

/// Scores for one probability source.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceMetrics {
    pub source: String,
    pub samples: usize,
    pub accuracy: f64,
    pub brier: f64,
    pub roi_unit: f64,
    pub roi_kelly: f64,
    /// Mean divergence to the reference source.
    pub js_divergence: f64,
}

/// Scores one source over its aligned samples.
pub fn evaluate_source(source: &str, samples: &[EvalSample], kelly_fraction: f64) -> SourceMetrics {
    let probs: Vec<f64> = samples.iter().map(|s| s.p).collect();
    let reference: Vec<f64> = samples.iter().map(|s| s.reference).collect();
    let outcomes: Vec<bool> = samples.iter().map(|s| s.a_won).collect();
    let unit: Vec<f64> = samples.iter().map(|s| s.pnl(Staking::Flat)).collect();
    let kelly: Vec<f64> = samples
        .iter()
        .map(|s| s.pnl(Staking::Kelly { fraction: kelly_fraction }))
        .collect();

    SourceMetrics {
        source: source.to_string(),
        samples: samples.len(),
        accuracy: accuracy(&probs, &outcomes),
        brier: brier_score(&probs, &outcomes),
        roi_unit: mean(&unit),
        roi_kelly: mean(&kelly),
        js_divergence: js_divergence(&probs, &reference),
    }
}

/// Rows usable for scoring `sources` against `reference`.
pub fn aligned_rows<'a>(
    rows: &'a [PredictionRow],
    sources: &[String],
    reference: &str,
) -> Vec<&'a PredictionRow> {
    let aligned: Vec<&PredictionRow> = rows
        .iter()
        .filter(|row| {
            row.a_won.is_some()
                && row.odds_a.is_some()
                && row.odds_b.is_some()
                && row.prob(reference).is_some()
                && sources.iter().all(|s| row.prob(s).is_some())
        })
        .collect();
    debug!(rows = rows.len(), aligned = aligned.len(), "evaluation rows aligned");
    aligned
}

/// Samples for one source from already aligned rows.
pub fn samples_for(rows: &[&PredictionRow], source: &str, reference: &str) -> Vec<EvalSample> {
    rows.iter()
        .filter_map(|row| {
            Some(EvalSample {
                a_won: row.a_won?,
                odds_a: row.odds_a?,
                odds_b: row.odds_b?,
                p: row.prob(source)?,
                reference: row.prob(reference)?,
            })
        })
        .collect()
}

/// Scores every source on the shared sample set.
///
/// # Errors
/// Returns error for an invalid Kelly fraction or an empty source list.
pub fn evaluate_sources(
    rows: &[PredictionRow],
    sources: &[String],
    reference: &str,
    kelly_fraction: f64,
) -> Result<Vec<SourceMetrics>> {
    evaluate_sources_with(rows, sources, reference, kelly_fraction, |_| {})
}

/// [`evaluate_sources`], calling `on_source` as each source is scored.
///
/// # Errors
/// Same as [`evaluate_sources`].
pub fn evaluate_sources_with<F>(
    rows: &[PredictionRow],
    sources: &[String],
    reference: &str,
    kelly_fraction: f64,
    mut on_source: F,
) -> Result<Vec<SourceMetrics>>
where
    F: FnMut(&SourceMetrics),
{
    let fraction = validate_kelly_fraction(kelly_fraction)?;
    if sources.is_empty() {
        return Err(eyre!("no probability sources to evaluate"));
    }

    let aligned = aligned_rows(rows, sources, reference);
    let metrics: Vec<SourceMetrics> = sources
        .iter()
        .map(|source| {
            let scored = evaluate_source(source, &samples_for(&aligned, source, reference), fraction);
            on_source(&scored);
            scored
        })
        .collect();

    info!(
        sources = metrics.len(),
        samples = aligned.len(),
        reference,
        "probability sources evaluated"
    );
    Ok(metrics)
}

/// Running totals after each bet.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PnlPoint {
    /// 0 before the first bet.
    pub bet: usize,
    pub unit: f64,
    pub kelly: f64,
}

/// Cumulative flat and Kelly PnL, starting with a zero point.
pub fn cumulative_pnl(samples: &[EvalSample], kelly_fraction: f64) -> Vec<PnlPoint> {
    let mut points = Vec::with_capacity(samples.len() + 1);
    let (mut unit, mut kelly) = (0.0, 0.0);
    points.push(PnlPoint {
        bet: 0,
        unit,
        kelly,
    });
    for (i, sample) in samples.iter().enumerate() {
        unit += sample.pnl(Staking::Flat);
        kelly += sample.pnl(Staking::Kelly {
            fraction: kelly_fraction,
        });
        points.push(PnlPoint {
            bet: i + 1,
            unit,
            kelly,
        });
    }
    points
}
