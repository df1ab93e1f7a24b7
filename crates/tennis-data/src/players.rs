//! Player directory and name resolution.
//!
//! Prediction files abbreviate names ("Auger-Aliassime F.") while the
//! directory lists full names ("Auger-Aliassime Felix"). No canonical player
//! identity exists, so resolution is a pluggable capability with explicit
//! `NotFound` and `Ambiguous` outcomes. Resolvers never pick between several
//! plausible candidates.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use eyre::{Result, WrapErr};
use serde::Deserialize;
use tracing::{debug, info};

use crate::predictions::parse_number;
use crate::types::{Handedness, PlayerProfile};

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    player_name: String,
    #[serde(default)]
    height: Option<String>,
    #[serde(default)]
    righthanded: Option<String>,
}

fn parse_handedness(raw: &str) -> Option<Handedness> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "r" => Some(Handedness::Right),
        "false" | "l" => Some(Handedness::Left),
        other => match parse_number(other)? {
            v if v == 1.0 => Some(Handedness::Right),
            v if v == 0.0 => Some(Handedness::Left),
            _ => None,
        },
    }
}

/// In-memory player directory.
#[derive(Clone, Debug, Default)]
pub struct PlayerDirectory {
    profiles: Vec<PlayerProfile>,
    by_name: HashMap<String, usize>,
}

impl PlayerDirectory {
    /// Builds a directory; the first profile wins for duplicate names.
    pub fn new(profiles: Vec<PlayerProfile>) -> Self {
        let mut by_name = HashMap::new();
        for (i, profile) in profiles.iter().enumerate() {
            by_name.entry(profile.name.clone()).or_insert(i);
        }
        Self { profiles, by_name }
    }

    /// Loads a directory CSV with `player_name`, `height`, `righthanded`.
    ///
    /// # Errors
    /// Returns error if the file is missing or its header cannot be read.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open player directory {}", path.display()))?;
        Self::read(file)
    }

    /// Reads a directory CSV from any source.
    ///
    /// # Errors
    /// Returns error if the header cannot be read.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        csv_reader
            .headers()
            .wrap_err("failed to read player directory header")?;

        let mut profiles = Vec::new();
        for (line, result) in csv_reader.deserialize::<RawPlayerRow>().enumerate() {
            match result {
                Ok(raw) => {
                    let name = raw.player_name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    profiles.push(PlayerProfile {
                        name: name.to_string(),
                        height_cm: raw.height.as_deref().and_then(parse_number),
                        handedness: raw.righthanded.as_deref().and_then(parse_handedness),
                    });
                }
                Err(err) => debug!(line = line + 2, error = %err, "skipping malformed player row"),
            }
        }

        info!(players = profiles.len(), "player directory loaded");
        Ok(Self::new(profiles))
    }

    /// Profile listed under exactly `name`.
    pub fn get(&self, name: &str) -> Option<&PlayerProfile> {
        self.by_name.get(name).map(|&i| &self.profiles[i])
    }

    /// All profiles in file order.
    pub fn profiles(&self) -> &[PlayerProfile] {
        &self.profiles
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True when the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Outcome of resolving a name against the directory.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<'a> {
    /// Exactly one profile matched.
    Found(&'a PlayerProfile),
    /// Several distinct profiles matched; the name cannot be linked safely.
    Ambiguous(Vec<&'a PlayerProfile>),
    /// Nothing matched.
    NotFound,
}

/// Strategy for linking a name as written in a prediction file to a profile.
pub trait PlayerResolver {
    /// Resolves `name` against `directory`.
    fn resolve<'a>(&self, directory: &'a PlayerDirectory, name: &str) -> Resolution<'a>;
}

/// Exact match on the trimmed name.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactResolver;

impl PlayerResolver for ExactResolver {
    fn resolve<'a>(&self, directory: &'a PlayerDirectory, name: &str) -> Resolution<'a> {
        directory
            .get(name.trim())
            .map_or(Resolution::NotFound, Resolution::Found)
    }
}

/// Matches "Surname F." / "Surname F" against "Surname Firstname".
///
/// The last whitespace-separated token is the initials; everything before it
/// is the surname, so multi-word surnames ("De Minaur A.") work.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbbreviatedResolver;

impl AbbreviatedResolver {
    fn split(name: &str) -> Option<(String, char)> {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        let (initials, surname) = tokens.split_last()?;
        if surname.is_empty() {
            return None;
        }
        let initial = initials.chars().find(|c| c.is_alphabetic())?;
        Some((surname.join(" "), initial))
    }
}

impl PlayerResolver for AbbreviatedResolver {
    fn resolve<'a>(&self, directory: &'a PlayerDirectory, name: &str) -> Resolution<'a> {
        let Some((surname, initial)) = Self::split(name) else {
            return Resolution::NotFound;
        };
        let prefix = format!("{surname} ");

        let mut candidates: Vec<&PlayerProfile> = directory
            .profiles()
            .iter()
            .filter(|p| {
                p.name
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|first| first == initial)
            })
            .collect();
        let mut seen = HashSet::new();
        candidates.retain(|p| seen.insert(p.name.clone()));

        match candidates.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(candidates[0]),
            _ => Resolution::Ambiguous(candidates),
        }
    }
}

/// Tries resolvers in order and returns the first outcome that is not `NotFound`.
pub struct ChainResolver {
    resolvers: Vec<Box<dyn PlayerResolver + Send + Sync>>,
}

impl ChainResolver {
    /// Chain over the given resolvers.
    pub fn new(resolvers: Vec<Box<dyn PlayerResolver + Send + Sync>>) -> Self {
        Self { resolvers }
    }
}

impl Default for ChainResolver {
    /// Exact match first, then the abbreviated-name heuristic.
    fn default() -> Self {
        Self::new(vec![Box::new(ExactResolver), Box::new(AbbreviatedResolver)])
    }
}

impl PlayerResolver for ChainResolver {
    fn resolve<'a>(&self, directory: &'a PlayerDirectory, name: &str) -> Resolution<'a> {
        for resolver in &self.resolvers {
            match resolver.resolve(directory, name) {
                Resolution::NotFound => continue,
                other => return other,
            }
        }
        Resolution::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = "\
player_name,height,righthanded
Alcaraz Carlos,183,1
Zverev Alexander,198,1
Zverev Mischa,190,0
De Minaur Alex,183,1
Nadal Rafael,185,0
Ruud Casper,,1
";

    fn directory() -> PlayerDirectory {
        PlayerDirectory::read(DIRECTORY.as_bytes()).unwrap()
    }

    #[test]
    fn loads_profiles() {
        let dir = directory();
        assert_eq!(dir.len(), 6);
        let nadal = dir.get("Nadal Rafael").unwrap();
        assert_eq!(nadal.height_cm, Some(185.0));
        assert_eq!(nadal.handedness, Some(Handedness::Left));
        assert!(!dir.get("Ruud Casper").unwrap().is_complete());
    }

    #[test]
    fn exact_resolution() {
        let dir = directory();
        assert!(matches!(
            ExactResolver.resolve(&dir, " Alcaraz Carlos "),
            Resolution::Found(p) if p.name == "Alcaraz Carlos"
        ));
        assert_eq!(ExactResolver.resolve(&dir, "Alcaraz C."), Resolution::NotFound);
    }

    #[test]
    fn abbreviated_resolution() {
        let dir = directory();
        assert!(matches!(
            AbbreviatedResolver.resolve(&dir, "Alcaraz C."),
            Resolution::Found(p) if p.name == "Alcaraz Carlos"
        ));
        assert!(matches!(
            AbbreviatedResolver.resolve(&dir, "De Minaur A."),
            Resolution::Found(p) if p.name == "De Minaur Alex"
        ));
        assert!(matches!(
            AbbreviatedResolver.resolve(&dir, "Nadal R"),
            Resolution::Found(p) if p.name == "Nadal Rafael"
        ));
        assert_eq!(AbbreviatedResolver.resolve(&dir, "Sinner J."), Resolution::NotFound);
        assert_eq!(AbbreviatedResolver.resolve(&dir, "Sinner"), Resolution::NotFound);
    }

    #[test]
    fn abbreviated_flags_ambiguity() {
        let dir = PlayerDirectory::read(
            "player_name,height,righthanded\nZverev Alexander,198,1\nZverev Andrei,180,1\n"
                .as_bytes(),
        )
        .unwrap();

        match AbbreviatedResolver.resolve(&dir, "Zverev A.") {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(matches!(
            AbbreviatedResolver.resolve(&directory(), "Zverev M."),
            Resolution::Found(p) if p.name == "Zverev Mischa"
        ));
    }

    #[test]
    fn chain_prefers_exact() {
        let dir = directory();
        let chain = ChainResolver::default();
        assert!(matches!(
            chain.resolve(&dir, "Zverev Alexander"),
            Resolution::Found(p) if p.name == "Zverev Alexander"
        ));
        assert!(matches!(
            chain.resolve(&dir, "Zverev A."),
            Resolution::Found(p) if p.name == "Zverev Alexander"
        ));
        assert_eq!(chain.resolve(&dir, "Unknown X."), Resolution::NotFound);
    }
}
