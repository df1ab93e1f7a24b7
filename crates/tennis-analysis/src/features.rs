//! Player characteristics behind discrepancy cases.
//!
//! For each discrepancy partition the players of every row are resolved
//! against the player directory, then the partition is described by the
//! height difference (A minus B) and the handedness matchup.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tennis_data::players::{PlayerDirectory, PlayerResolver, Resolution};
use tennis_data::types::{Handedness, PlayerProfile, PredictionRow};
use tracing::{debug, info};

use crate::scenarios::{classify_row, ScenarioCase, ScenarioSources};
use crate::stats::{describe, Description};

/// Handedness of A against B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HandednessMatchup {
    RightVsLeft,
    RightVsRight,
    LeftVsLeft,
    LeftVsRight,
    Unknown,
}

impl HandednessMatchup {
    pub const ALL: [HandednessMatchup; 5] = [
        HandednessMatchup::RightVsLeft,
        HandednessMatchup::RightVsRight,
        HandednessMatchup::LeftVsLeft,
        HandednessMatchup::LeftVsRight,
        HandednessMatchup::Unknown,
    ];

    pub fn of(a: Option<Handedness>, b: Option<Handedness>) -> Self {
        use Handedness::{Left, Right};
        match (a, b) {
            (Some(Right), Some(Left)) => Self::RightVsLeft,
            (Some(Right), Some(Right)) => Self::RightVsRight,
            (Some(Left), Some(Left)) => Self::LeftVsLeft,
            (Some(Left), Some(Right)) => Self::LeftVsRight,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RightVsLeft => "R_vs_L",
            Self::RightVsRight => "R_vs_R",
            Self::LeftVsLeft => "L_vs_L",
            Self::LeftVsRight => "L_vs_R",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HandednessMatchup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Characteristics summary for one discrepancy partition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureReport {
    pub case: ScenarioCase,
    pub rows: usize,
    /// Over rows where both heights are known.
    pub height_diff: Option<Description>,
    /// Count per matchup, every matchup listed.
    pub matchups: BTreeMap<HandednessMatchup, usize>,
    /// Names without a complete profile, sorted.
    pub unresolved: Vec<String>,
    /// Subset of `unresolved` that matched several directory entries.
    pub ambiguous: Vec<String>,
}

struct Lookup<'a> {
    directory: &'a PlayerDirectory,
    resolver: &'a dyn PlayerResolver,
    unresolved: BTreeSet<String>,
    ambiguous: BTreeSet<String>,
}

impl<'a> Lookup<'a> {
    fn profile(&mut self, name: &str) -> Option<&'a PlayerProfile> {
        match self.resolver.resolve(self.directory, name) {
            Resolution::Found(profile) if profile.is_complete() => Some(profile),
            Resolution::Found(_) | Resolution::NotFound => {
                self.unresolved.insert(name.trim().to_string());
                None
            }
            Resolution::Ambiguous(candidates) => {
                debug!(name, candidates = candidates.len(), "ambiguous player name");
                self.unresolved.insert(name.trim().to_string());
                self.ambiguous.insert(name.trim().to_string());
                None
            }
        }
    }
}

/// Summarizes the model-only-correct and baseline-only-correct partitions.
pub fn feature_reports(
    rows: &[PredictionRow],
    sources: &ScenarioSources,
    directory: &PlayerDirectory,
    resolver: &dyn PlayerResolver,
) -> Vec<FeatureReport> {
    [ScenarioCase::ModelOnlyCorrect, ScenarioCase::BaselineOnlyCorrect]
        .into_iter()
        .map(|case| {
            let partition: Vec<&PredictionRow> = rows
                .iter()
                .filter(|row| classify_row(row, sources) == Some(case))
                .collect();
            feature_report(case, &partition, directory, resolver)
        })
        .collect()
}

/// Summarizes one partition of rows.
pub fn feature_report(
    case: ScenarioCase,
    rows: &[&PredictionRow],
    directory: &PlayerDirectory,
    resolver: &dyn PlayerResolver,
) -> FeatureReport {
    let mut lookup = Lookup {
        directory,
        resolver,
        unresolved: BTreeSet::new(),
        ambiguous: BTreeSet::new(),
    };
    let mut matchups: BTreeMap<HandednessMatchup, usize> =
        HandednessMatchup::ALL.iter().map(|&m| (m, 0)).collect();
    let mut diffs = Vec::new();

    for row in rows {
        let a = lookup.profile(&row.a_raw);
        let b = lookup.profile(&row.b_raw);

        if let (Some(ha), Some(hb)) = (
            a.and_then(|p| p.height_cm),
            b.and_then(|p| p.height_cm),
        ) {
            diffs.push(ha - hb);
        }
        let matchup = HandednessMatchup::of(
            a.and_then(|p| p.handedness),
            b.and_then(|p| p.handedness),
        );
        *matchups.entry(matchup).or_default() += 1;
    }

    info!(
        case = %case,
        rows = rows.len(),
        unresolved = lookup.unresolved.len(),
        "player features summarized"
    );
    FeatureReport {
        case,
        rows: rows.len(),
        height_diff: describe(&diffs),
        matchups,
        unresolved: lookup.unresolved.into_iter().collect(),
        ambiguous: lookup.ambiguous.into_iter().collect(),
    }
}
