//! Scenario partitioning and loop-involvement reporting.
//!
//! Every resolved prediction row is labelled by which of two probability
//! sources (a model and a baseline) called the winner, then checked against
//! the win graph. The two discrepancy partitions, model-only-correct and
//! baseline-only-correct, are compared by how often their matches sit on an
//! intransitive loop.

use std::fmt;

use serde::Serialize;
use tennis_data::types::{PredictionQuery, PredictionRow};
use tracing::{debug, info};

use crate::stats::BoxStats;
use crate::win_graph::{LoopEvidence, WinGraph};

/// Model probability column used when none is given.
pub const DEFAULT_MODEL_SOURCE: &str = "model_prob";

/// Baseline probability column used when none is given.
pub const DEFAULT_BASELINE_SOURCE: &str = "welo_prob";

/// A prediction is correct when it leans towards the actual winner.
/// `p == 0.5` leans nowhere and is never correct.
pub fn is_correct(p: f64, a_won: bool) -> bool {
    (p > 0.5 && a_won) || (p < 0.5 && !a_won)
}

/// Probability a source gave to the actual winner.
pub fn winner_probability(p: f64, a_won: bool) -> f64 {
    if a_won {
        p
    } else {
        1.0 - p
    }
}

/// Which of the two sources predicted the winner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScenarioCase {
    BothCorrect,
    ModelOnlyCorrect,
    BaselineOnlyCorrect,
    BothIncorrect,
}

impl ScenarioCase {
    /// All cases in report order.
    pub const ALL: [ScenarioCase; 4] = [
        ScenarioCase::BothCorrect,
        ScenarioCase::ModelOnlyCorrect,
        ScenarioCase::BaselineOnlyCorrect,
        ScenarioCase::BothIncorrect,
    ];

    pub fn classify(model_correct: bool, baseline_correct: bool) -> Self {
        match (model_correct, baseline_correct) {
            (true, true) => Self::BothCorrect,
            (true, false) => Self::ModelOnlyCorrect,
            (false, true) => Self::BaselineOnlyCorrect,
            (false, false) => Self::BothIncorrect,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BothCorrect => "Both Correct",
            Self::ModelOnlyCorrect => "Model Only Correct",
            Self::BaselineOnlyCorrect => "Baseline Only Correct",
            Self::BothIncorrect => "Both Incorrect",
        }
    }
}

impl fmt::Display for ScenarioCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Column names of the two compared sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioSources {
    pub model: String,
    pub baseline: String,
}

impl Default for ScenarioSources {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_SOURCE.to_string(),
            baseline: DEFAULT_BASELINE_SOURCE.to_string(),
        }
    }
}

/// Scenario of a row; `None` when the outcome or either probability is missing.
pub fn classify_row(row: &PredictionRow, sources: &ScenarioSources) -> Option<ScenarioCase> {
    let a_won = row.a_won?;
    let model = row.prob(&sources.model)?;
    let baseline = row.prob(&sources.baseline)?;
    Some(ScenarioCase::classify(
        is_correct(model, a_won),
        is_correct(baseline, a_won),
    ))
}

/// One analysed prediction row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioRow {
    /// Row position in the prediction file.
    pub index: usize,
    /// `A` as written in the file.
    pub a: String,
    /// `B` as written in the file.
    pub b: String,
    pub model_prob: f64,
    pub baseline_prob: f64,
    pub a_won: bool,
    pub case: ScenarioCase,
    pub evidence: LoopEvidence,
}

impl ScenarioRow {
    /// Winner-probability margin of the source that was right.
    ///
    /// Model minus baseline for model-only-correct rows, baseline minus model
    /// for baseline-only-correct rows, 0 otherwise.
    pub fn probability_advantage(&self) -> f64 {
        let model_w = winner_probability(self.model_prob, self.a_won);
        let baseline_w = winner_probability(self.baseline_prob, self.a_won);
        match self.case {
            ScenarioCase::ModelOnlyCorrect => model_w - baseline_w,
            ScenarioCase::BaselineOnlyCorrect => baseline_w - model_w,
            ScenarioCase::BothCorrect | ScenarioCase::BothIncorrect => 0.0,
        }
    }

    /// Shorthand for `evidence.involved`.
    pub fn involved(&self) -> bool {
        self.evidence.involved
    }
}

/// Rows analysed plus the count of rows that could not be.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScenarioAnalysis {
    pub rows: Vec<ScenarioRow>,
    /// Rows missing a name, the outcome or either probability.
    pub skipped: usize,
}

impl ScenarioAnalysis {
    /// Rows of one scenario, in file order.
    pub fn case_rows(&self, case: ScenarioCase) -> impl Iterator<Item = &ScenarioRow> {
        self.rows.iter().filter(move |row| row.case == case)
    }
}

/// Labels every usable row and runs its loop query against `graph`.
pub fn analyze_scenarios(
    graph: &WinGraph,
    rows: &[PredictionRow],
    sources: &ScenarioSources,
) -> ScenarioAnalysis {
    let mut usable: Vec<(&PredictionRow, PredictionQuery, f64, f64)> = Vec::new();
    let mut skipped = 0usize;

    for row in rows {
        let query = row.query();
        let model = row.prob(&sources.model);
        let baseline = row.prob(&sources.baseline);
        match (query, model, baseline) {
            (Some(query), Some(model), Some(baseline)) => {
                usable.push((row, query, model, baseline));
            }
            _ => {
                skipped += 1;
                debug!(row = row.index, "prediction row not usable for scenario analysis");
            }
        }
    }

    let queries: Vec<PredictionQuery> = usable.iter().map(|(_, q, _, _)| q.clone()).collect();
    let evidence = graph.query_all(&queries);

    let analysed: Vec<ScenarioRow> = usable
        .into_iter()
        .zip(evidence)
        .map(|((row, _, model, baseline), evidence)| {
            let a_won = row.a_won == Some(true);
            ScenarioRow {
                index: row.index,
                a: row.a_raw.clone(),
                b: row.b_raw.clone(),
                model_prob: model,
                baseline_prob: baseline,
                a_won,
                case: ScenarioCase::classify(is_correct(model, a_won), is_correct(baseline, a_won)),
                evidence,
            }
        })
        .collect();

    info!(
        analysed = analysed.len(),
        skipped,
        involved = analysed.iter().filter(|r| r.involved()).count(),
        "scenario analysis complete"
    );
    ScenarioAnalysis {
        rows: analysed,
        skipped,
    }
}

/// Loop involvement within one partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PartitionSummary {
    pub involved: usize,
    pub total: usize,
    /// `involved / total * 100`, 0 for an empty partition.
    pub percent: f64,
}

impl PartitionSummary {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a ScenarioRow>,
    {
        let (mut involved, mut total) = (0usize, 0usize);
        for row in rows {
            total += 1;
            if row.involved() {
                involved += 1;
            }
        }
        let percent = if total > 0 {
            involved as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            involved,
            total,
            percent,
        }
    }
}

/// Categorical outcome of the partition comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LoopVerdict {
    /// Model-only-correct matches involve loops more often.
    ModelHigher,
    Equal,
    /// Baseline-only-correct matches involve loops more often.
    BaselineHigher,
    OnlyModelData,
    OnlyBaselineData,
    Insufficient,
}

impl LoopVerdict {
    pub fn describe(self) -> &'static str {
        match self {
            Self::ModelHigher => {
                "matches the model alone called correctly involve intransitive loops more often"
            }
            Self::Equal => "both discrepancy partitions involve intransitive loops equally often",
            Self::BaselineHigher => {
                "matches the baseline alone called correctly involve intransitive loops more often"
            }
            Self::OnlyModelData => "only model-only-correct matches are available",
            Self::OnlyBaselineData => "only baseline-only-correct matches are available",
            Self::Insufficient => "no discrepancy matches to compare",
        }
    }
}

/// Both discrepancy partitions and the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoopComparison {
    pub model_only: PartitionSummary,
    pub baseline_only: PartitionSummary,
    pub verdict: LoopVerdict,
}

/// Compares loop involvement between the two discrepancy partitions.
pub fn summarize_partitions(analysis: &ScenarioAnalysis) -> LoopComparison {
    let model_only = PartitionSummary::from_rows(analysis.case_rows(ScenarioCase::ModelOnlyCorrect));
    let baseline_only =
        PartitionSummary::from_rows(analysis.case_rows(ScenarioCase::BaselineOnlyCorrect));

    let verdict = match (model_only.total > 0, baseline_only.total > 0) {
        (true, true) => {
            if model_only.percent > baseline_only.percent {
                LoopVerdict::ModelHigher
            } else if model_only.percent < baseline_only.percent {
                LoopVerdict::BaselineHigher
            } else {
                LoopVerdict::Equal
            }
        }
        (true, false) => LoopVerdict::OnlyModelData,
        (false, true) => LoopVerdict::OnlyBaselineData,
        (false, false) => LoopVerdict::Insufficient,
    };

    LoopComparison {
        model_only,
        baseline_only,
        verdict,
    }
}

/// Which probability a box summarizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProbabilityKind {
    Model,
    Baseline,
}

/// Box statistics of one source's probabilities for one
/// (loop involvement, scenario) group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbabilityBox {
    pub involved: bool,
    pub case: ScenarioCase,
    pub kind: ProbabilityKind,
    pub stats: BoxStats,
}

/// Probability distributions grouped by involvement, scenario and source.
/// Empty groups are omitted.
pub fn probability_boxes(analysis: &ScenarioAnalysis) -> Vec<ProbabilityBox> {
    let mut boxes = Vec::new();
    for involved in [false, true] {
        for case in ScenarioCase::ALL {
            let group: Vec<&ScenarioRow> = analysis
                .case_rows(case)
                .filter(|row| row.involved() == involved)
                .collect();
            for kind in [ProbabilityKind::Model, ProbabilityKind::Baseline] {
                let values: Vec<f64> = group
                    .iter()
                    .map(|row| match kind {
                        ProbabilityKind::Model => row.model_prob,
                        ProbabilityKind::Baseline => row.baseline_prob,
                    })
                    .collect();
                if let Some(stats) = BoxStats::from_values(&values) {
                    boxes.push(ProbabilityBox {
                        involved,
                        case,
                        kind,
                        stats,
                    });
                }
            }
        }
    }
    boxes
}

/// Model advantage within model-only-correct rows, split by involvement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdvantageBox {
    pub involved: bool,
    pub stats: BoxStats,
}

pub fn advantage_boxes(analysis: &ScenarioAnalysis) -> Vec<AdvantageBox> {
    [false, true]
        .into_iter()
        .filter_map(|involved| {
            let values: Vec<f64> = analysis
                .case_rows(ScenarioCase::ModelOnlyCorrect)
                .filter(|row| row.involved() == involved)
                .map(ScenarioRow::probability_advantage)
                .collect();
            BoxStats::from_values(&values).map(|stats| AdvantageBox { involved, stats })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tennis_data::types::PlayerId;

    fn id(name: &str) -> PlayerId {
        PlayerId::normalize(name).unwrap()
    }

    fn row(index: usize, a: &str, b: &str, a_won: bool, model: f64, baseline: f64) -> PredictionRow {
        let mut probabilities = BTreeMap::new();
        probabilities.insert("model_prob".to_string(), model);
        probabilities.insert("welo_prob".to_string(), baseline);
        PredictionRow {
            index,
            a_raw: a.to_string(),
            b_raw: b.to_string(),
            a: Some(id(a)),
            b: Some(id(b)),
            a_won: Some(a_won),
            odds_a: None,
            odds_b: None,
            probabilities,
        }
    }

    /// Bob beat Alice, Carol beat Bob, Alice beat Carol.
    fn graph() -> WinGraph {
        WinGraph::from_edges(
            [("Bob", "Alice"), ("Carol", "Bob"), ("Alice", "Carol")]
                .into_iter()
                .map(|(w, l)| (id(w), id(l))),
        )
    }

    #[test]
    fn correctness_excludes_coin_flips() {
        assert!(is_correct(0.6, true));
        assert!(is_correct(0.4, false));
        assert!(!is_correct(0.4, true));
        assert!(!is_correct(0.5, true));
        assert!(!is_correct(0.5, false));
    }

    #[test]
    fn classify_covers_all_cases() {
        assert_eq!(ScenarioCase::classify(true, true), ScenarioCase::BothCorrect);
        assert_eq!(ScenarioCase::classify(true, false), ScenarioCase::ModelOnlyCorrect);
        assert_eq!(ScenarioCase::classify(false, true), ScenarioCase::BaselineOnlyCorrect);
        assert_eq!(ScenarioCase::classify(false, false), ScenarioCase::BothIncorrect);
        assert_eq!(ScenarioCase::ModelOnlyCorrect.to_string(), "Model Only Correct");
    }

    #[test]
    fn advantage_uses_winner_probability() {
        let analysis = analyze_scenarios(
            &graph(),
            &[
                // Carol won (Awin = 0): model gave Carol 0.7, baseline 0.45.
                row(0, "Alice", "Carol", false, 0.3, 0.55),
                // Alice won: baseline right, model wrong.
                row(1, "Alice", "Bob", true, 0.4, 0.65),
            ],
            &ScenarioSources::default(),
        );

        let model_row = &analysis.rows[0];
        assert_eq!(model_row.case, ScenarioCase::ModelOnlyCorrect);
        assert!((model_row.probability_advantage() - 0.25).abs() < 1e-12);

        let baseline_row = &analysis.rows[1];
        assert_eq!(baseline_row.case, ScenarioCase::BaselineOnlyCorrect);
        assert!((baseline_row.probability_advantage() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn skips_rows_without_probabilities_or_outcome() {
        let mut missing_prob = row(0, "Alice", "Bob", true, 0.6, 0.6);
        missing_prob.probabilities.remove("welo_prob");
        let mut missing_outcome = row(1, "Alice", "Bob", true, 0.6, 0.6);
        missing_outcome.a_won = None;
        let ok = row(2, "Alice", "Bob", true, 0.6, 0.6);

        let analysis = analyze_scenarios(
            &graph(),
            &[missing_prob, missing_outcome, ok],
            &ScenarioSources::default(),
        );
        assert_eq!(analysis.skipped, 2);
        assert_eq!(analysis.rows.len(), 1);
        assert_eq!(analysis.rows[0].index, 2);
    }

    #[test]
    fn partitions_and_verdict() {
        let analysis = analyze_scenarios(
            &graph(),
            &[
                // Carol lost to Alice: Carol > Bob > Alice, involved.
                row(0, "Alice", "Carol", true, 0.7, 0.4),
                // Alice lost to Bob: Alice > Carol > Bob, involved.
                row(1, "Bob", "Alice", true, 0.8, 0.3),
                // Dave has no wins in the graph.
                row(2, "Bob", "Dave", true, 0.6, 0.45),
                row(3, "Erin", "Dave", true, 0.3, 0.7),
            ],
            &ScenarioSources::default(),
        );

        let comparison = summarize_partitions(&analysis);
        assert_eq!(comparison.model_only.total, 3);
        assert_eq!(comparison.model_only.involved, 2);
        assert!((comparison.model_only.percent - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(comparison.baseline_only.total, 1);
        assert_eq!(comparison.baseline_only.involved, 0);
        assert_eq!(comparison.verdict, LoopVerdict::ModelHigher);
    }

    #[test]
    fn verdict_without_both_partitions() {
        let only_model = analyze_scenarios(
            &graph(),
            &[row(0, "Alice", "Carol", true, 0.7, 0.4)],
            &ScenarioSources::default(),
        );
        assert_eq!(summarize_partitions(&only_model).verdict, LoopVerdict::OnlyModelData);

        let only_baseline = analyze_scenarios(
            &graph(),
            &[row(0, "Alice", "Carol", true, 0.4, 0.7)],
            &ScenarioSources::default(),
        );
        assert_eq!(
            summarize_partitions(&only_baseline).verdict,
            LoopVerdict::OnlyBaselineData
        );

        let empty = ScenarioAnalysis::default();
        let comparison = summarize_partitions(&empty);
        assert_eq!(comparison.verdict, LoopVerdict::Insufficient);
        assert_eq!(comparison.model_only.percent, 0.0);
    }

    #[test]
    fn equal_percentages() {
        let analysis = analyze_scenarios(
            &graph(),
            &[
                row(0, "Alice", "Carol", true, 0.7, 0.4),
                row(1, "Alice", "Carol", true, 0.4, 0.7),
            ],
            &ScenarioSources::default(),
        );
        assert_eq!(summarize_partitions(&analysis).verdict, LoopVerdict::Equal);
    }

    #[test]
    fn boxes_group_by_involvement() {
        let analysis = analyze_scenarios(
            &graph(),
            &[
                row(0, "Alice", "Carol", true, 0.7, 0.4),
                row(1, "Bob", "Dave", true, 0.6, 0.45),
                row(2, "Bob", "Dave", true, 0.8, 0.2),
            ],
            &ScenarioSources::default(),
        );

        let advantage = advantage_boxes(&analysis);
        assert_eq!(advantage.len(), 2);
        let not_involved = advantage.iter().find(|b| !b.involved).unwrap();
        assert_eq!(not_involved.stats.count, 2);
        assert!((not_involved.stats.max - 0.6).abs() < 1e-12);

        let probs = probability_boxes(&analysis);
        // Two model-only groups (involved / not), each with model and baseline boxes.
        assert_eq!(probs.len(), 4);
        assert!(probs
            .iter()
            .all(|b| b.case == ScenarioCase::ModelOnlyCorrect));
    }
}
