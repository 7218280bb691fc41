// Season and league constants: linear weights, league run environment and
// the FIP constant. Pure lookup over externally supplied tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::context::League;
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Season-wide wOBA weights and run environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WobaConstant {
    pub season: u16,
    /// League-average wOBA.
    pub woba: f64,
    pub woba_scale: f64,
    pub w_bb: f64,
    pub w_hbp: f64,
    pub w_1b: f64,
    pub w_2b: f64,
    pub w_3b: f64,
    pub w_hr: f64,
    pub run_sb: f64,
    pub run_cs: f64,
    /// League runs per plate appearance.
    pub r_pa: f64,
    /// Runs per win.
    pub r_w: f64,
    pub cfip: f64,
    pub lg_era: f64,
    pub lg_ra9: f64,
    /// League home runs per fly ball, used by xFIP.
    pub lg_hr_fb: f64,
}

/// League-specific overrides for one season.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeagueConstant {
    pub season: u16,
    pub league: League,
    pub woba: f64,
    pub r_pa: f64,
    pub era: f64,
    pub fip: f64,
    pub ra9: f64,
    pub hr_fb: f64,
}

/// Result of a lookup: the season weights plus the league row when one exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonConstants {
    pub woba: WobaConstant,
    pub league: Option<LeagueConstant>,
}

impl SeasonConstants {
    pub fn season(&self) -> u16 {
        self.woba.season
    }

    pub fn league_woba(&self) -> f64 {
        self.league.map_or(self.woba.woba, |l| l.woba)
    }

    pub fn league_r_pa(&self) -> f64 {
        self.league.map_or(self.woba.r_pa, |l| l.r_pa)
    }

    pub fn league_era(&self) -> f64 {
        self.league.map_or(self.woba.lg_era, |l| l.era)
    }

    /// League FIP. cFIP scales FIP onto ERA, so the season-wide fallback is
    /// league ERA.
    pub fn league_fip(&self) -> f64 {
        self.league.map_or(self.woba.lg_era, |l| l.fip)
    }

    pub fn league_ra9(&self) -> f64 {
        self.league.map_or(self.woba.lg_ra9, |l| l.ra9)
    }

    pub fn league_hr_fb(&self) -> f64 {
        self.league.map_or(self.woba.lg_hr_fb, |l| l.hr_fb)
    }

    pub fn runs_per_win(&self) -> f64 {
        self.woba.r_w
    }
}

/// How to resolve a season with no constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fail with `ConstantsUnavailable`.
    #[default]
    Exact,
    /// Use the closest earlier season that has constants.
    NearestPrior,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Read-only lookup over season and league constant tables. One active
/// version per key: later rows replace earlier ones at construction.
#[derive(Debug, Clone, Default)]
pub struct ConstantsProvider {
    seasons: BTreeMap<u16, WobaConstant>,
    leagues: BTreeMap<(u16, League), LeagueConstant>,
}

impl ConstantsProvider {
    pub fn new(
        woba_rows: impl IntoIterator<Item = WobaConstant>,
        league_rows: impl IntoIterator<Item = LeagueConstant>,
    ) -> Self {
        let seasons = woba_rows.into_iter().map(|w| (w.season, w)).collect();
        let leagues = league_rows
            .into_iter()
            .map(|l| ((l.season, l.league), l))
            .collect();
        Self { seasons, leagues }
    }

    pub fn seasons(&self) -> impl Iterator<Item = u16> + '_ {
        self.seasons.keys().copied()
    }

    /// Exact lookup. A missing league row is not an error.
    pub fn lookup(&self, season: u16, league: Option<League>) -> Result<SeasonConstants> {
        let woba = self
            .seasons
            .get(&season)
            .copied()
            .ok_or(EngineError::ConstantsUnavailable { season, league })?;
        let league_row = league.and_then(|l| self.leagues.get(&(season, l)).copied());
        if league.is_some() && league_row.is_none() {
            debug!(season, ?league, "no league constants, using season-wide values");
        }
        Ok(SeasonConstants {
            woba,
            league: league_row,
        })
    }

    /// Lookup with a caller-selected fallback policy.
    pub fn lookup_with_fallback(
        &self,
        season: u16,
        league: Option<League>,
        policy: FallbackPolicy,
    ) -> Result<SeasonConstants> {
        match self.lookup(season, league) {
            Ok(found) => Ok(found),
            Err(err) => match policy {
                FallbackPolicy::Exact => Err(err),
                FallbackPolicy::NearestPrior => {
                    let (&prior, _) = self
                        .seasons
                        .range(..season)
                        .next_back()
                        .ok_or(err)?;
                    warn!(season, prior, "constants missing, falling back to prior season");
                    self.lookup(prior, league)
                }
            },
        }
    }
}
