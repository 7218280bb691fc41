// StatContext: the explicit, immutable anchor for every derived record.
//
// Season, league, provider and the park-neutral flag travel together in one
// value so formulas never check optional fields ad hoc.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, Result};

/// Season value used for multi-year / career contexts.
pub const CAREER_SEASON: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum League {
    #[serde(rename = "AL")]
    American,
    #[serde(rename = "NL")]
    National,
}

impl League {
    /// Parse the usual two-letter abbreviations ("AL", "NL").
    pub fn from_abbrev(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AL" => Some(League::American),
            "NL" => Some(League::National),
            _ => None,
        }
    }

    pub fn abbrev(&self) -> &'static str {
        match self {
            League::American => "AL",
            League::National => "NL",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// Named formula provider. Selects between competing methodologies
/// (notably the pitcher WAR branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatProvider {
    /// FIP-based pitching value, wOBA-based batting value.
    FanGraphs,
    /// Runs-allowed (RA9) based pitching value.
    BaseballReference,
    /// Raw, park-specific numbers with no neutralization.
    Unadjusted,
}

impl StatProvider {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fangraphs" | "fg" => Some(StatProvider::FanGraphs),
            "baseball_reference" | "bbref" | "br" => Some(StatProvider::BaseballReference),
            "unadjusted" | "raw" => Some(StatProvider::Unadjusted),
            _ => None,
        }
    }

    /// Whether the provider reports park-specific (unneutralized) values.
    pub fn is_park_specific(&self) -> bool {
        matches!(self, StatProvider::Unadjusted)
    }
}

/// Context every derived record is keyed by. Two contexts are equal iff all
/// fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatContext {
    season: u16,
    league: Option<League>,
    provider: StatProvider,
    park_neutral: bool,
    regular_season: bool,
}

impl StatContext {
    /// Build a validated context.
    ///
    /// Fails with `InvalidContext` when the park-neutral flag is combined
    /// with a park-specific provider.
    pub fn new(
        season: u16,
        league: Option<League>,
        provider: StatProvider,
        park_neutral: bool,
        regular_season: bool,
    ) -> Result<Self> {
        if park_neutral && provider.is_park_specific() {
            return Err(EngineError::InvalidContext(format!(
                "park-neutral context cannot use park-specific provider {provider:?}"
            )));
        }
        Ok(Self {
            season,
            league,
            provider,
            park_neutral,
            regular_season,
        })
    }

    /// Regular-season, non-neutralized FanGraphs context for a season.
    pub fn season(season: u16) -> Self {
        Self {
            season,
            league: None,
            provider: StatProvider::FanGraphs,
            park_neutral: false,
            regular_season: true,
        }
    }

    pub fn with_league(self, league: League) -> Self {
        Self {
            league: Some(league),
            ..self
        }
    }

    pub fn with_provider(self, provider: StatProvider) -> Result<Self> {
        Self::new(
            self.season,
            self.league,
            provider,
            self.park_neutral,
            self.regular_season,
        )
    }

    pub fn park_neutralized(self) -> Result<Self> {
        Self::new(self.season, self.league, self.provider, true, self.regular_season)
    }

    pub fn season_value(&self) -> u16 {
        self.season
    }

    pub fn is_career(&self) -> bool {
        self.season == CAREER_SEASON
    }

    pub fn league(&self) -> Option<League> {
        self.league
    }

    pub fn provider(&self) -> StatProvider {
        self.provider
    }

    pub fn park_neutral(&self) -> bool {
        self.park_neutral
    }

    pub fn regular_season(&self) -> bool {
        self.regular_season
    }
}
