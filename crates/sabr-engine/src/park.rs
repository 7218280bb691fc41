// Park factors: single-season component factors against the rest of the
// league, games-weighted multi-year blends, and shrinkage toward neutral.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::ids::ParkId;

/// League-neutral park factor.
pub const NEUTRAL: f64 = 100.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Raw run-environment totals for all games played at one park in one season
/// (both teams combined).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkSeasonAggregate {
    pub park_id: ParkId,
    pub season: u16,
    pub games: u32,
    pub runs: u32,
    pub hr: u32,
    pub bb: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkFactorConfig {
    /// Games of league-average ballast added during shrinkage. Larger values
    /// regress low-sample parks harder.
    pub regression_games: f64,
    /// Seasons with fewer games than this are treated as unsampled.
    pub min_games: u32,
}

impl Default for ParkFactorConfig {
    fn default() -> Self {
        Self {
            regression_games: 162.0,
            min_games: 1,
        }
    }
}

/// Factors for runs, home runs, walks and hits (100 = neutral).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentFactors {
    pub runs: f64,
    pub hr: f64,
    pub bb: f64,
    pub h: f64,
}

impl Default for ComponentFactors {
    fn default() -> Self {
        Self {
            runs: NEUTRAL,
            hr: NEUTRAL,
            bb: NEUTRAL,
            h: NEUTRAL,
        }
    }
}

impl ComponentFactors {
    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            runs: f(self.runs),
            hr: f(self.hr),
            bb: f(self.bb),
            h: f(self.h),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkFactor {
    pub park_id: ParkId,
    /// Season the factor is keyed by (the last season of a multi-year span).
    pub season: u16,
    pub from_season: u16,
    pub to_season: u16,
    pub games_sampled: u32,
    /// Regressed component factors for the span.
    pub components: ComponentFactors,
    /// Regressed overall factor for the single season `season`.
    pub one_year: f64,
    /// Regressed overall factor over the trailing three seasons, if sampled.
    pub three_year: Option<f64>,
    /// Regressed overall factor over the trailing five seasons, if sampled.
    pub five_year: Option<f64>,
}

impl ParkFactor {
    /// Overall factor (the runs component).
    pub fn overall(&self) -> f64 {
        self.components.runs
    }

    /// Overall factor as a multiplier around 1.0.
    pub fn multiplier(&self) -> f64 {
        self.overall() / NEUTRAL
    }

    /// League-default factor (100 everywhere) for a park with no usable sample.
    pub fn neutral(park_id: ParkId, season: u16) -> Self {
        Self {
            park_id,
            season,
            from_season: season,
            to_season: season,
            games_sampled: 0,
            components: ComponentFactors::default(),
            one_year: NEUTRAL,
            three_year: None,
            five_year: None,
        }
    }

    /// The factor for a line of which only `share` (0..=1) was played at this
    /// park; the rest counts as neutral.
    pub fn home_share(&self, share: f64) -> Self {
        let share = if share.is_finite() { share.clamp(0.0, 1.0) } else { 0.0 };
        let scale = |f: f64| NEUTRAL + (f - NEUTRAL) * share;
        Self {
            components: self.components.map(scale),
            one_year: scale(self.one_year),
            three_year: self.three_year.map(scale),
            five_year: self.five_year.map(scale),
            ..self.clone()
        }
    }
}

/// Unregressed single-season factors and the games behind them.
#[derive(Debug, Clone, Copy)]
struct RawSeason {
    games: u32,
    factors: ComponentFactors,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ParkFactorEngine {
    aggregates: Vec<ParkSeasonAggregate>,
    config: ParkFactorConfig,
}

impl ParkFactorEngine {
    pub fn new(aggregates: Vec<ParkSeasonAggregate>, config: ParkFactorConfig) -> Self {
        Self { aggregates, config }
    }

    pub fn config(&self) -> &ParkFactorConfig {
        &self.config
    }

    /// Single-season factor for `park` with 3- and 5-year trailing blends.
    pub fn compute(&self, park: &ParkId, season: u16) -> Result<ParkFactor> {
        let raw = self.raw_season(park, season)?;
        let components = self.shrink(raw.factors, raw.games);
        let three_year = self.trailing_overall(park, season, 3);
        let five_year = self.trailing_overall(park, season, 5);
        debug!(
            park = %park,
            season,
            games = raw.games,
            raw_runs = raw.factors.runs,
            regressed_runs = components.runs,
            "computed single-season park factor"
        );
        Ok(ParkFactor {
            park_id: park.clone(),
            season,
            from_season: season,
            to_season: season,
            games_sampled: raw.games,
            components,
            one_year: components.runs,
            three_year,
            five_year,
        })
    }

    /// Games-weighted blend of `from..=to`, shrunk toward neutral by the
    /// total games sampled. Unsampled seasons are skipped.
    pub fn compute_multi_year(&self, park: &ParkId, from: u16, to: u16) -> Result<ParkFactor> {
        if from > to {
            return Err(EngineError::InvalidContext(format!(
                "park factor span {from}..={to} is reversed"
            )));
        }
        let seasons = self.sampled_seasons(park, from, to);
        let (factors, games) = blend(&seasons).ok_or_else(|| {
            EngineError::insufficient(format!("park {park} has no sampled games in {from}..={to}"))
        })?;
        let components = self.shrink(factors, games);
        let one_year = self
            .raw_season(park, to)
            .map(|r| self.shrink(r.factors, r.games).runs)
            .unwrap_or(components.runs);
        Ok(ParkFactor {
            park_id: park.clone(),
            season: to,
            from_season: from,
            to_season: to,
            games_sampled: games,
            components,
            one_year,
            three_year: self.trailing_overall(park, to, 3),
            five_year: self.trailing_overall(park, to, 5),
        })
    }

    fn raw_season(&self, park: &ParkId, season: u16) -> Result<RawSeason> {
        let row = self
            .aggregates
            .iter()
            .find(|a| &a.park_id == park && a.season == season)
            .ok_or_else(|| {
                EngineError::insufficient(format!("no games sampled at park {park} in {season}"))
            })?;
        if row.games == 0 || row.games < self.config.min_games {
            return Err(EngineError::insufficient(format!(
                "park {park} sampled {} games in {season}",
                row.games
            )));
        }

        let (mut games, mut runs, mut hr, mut bb, mut h) = (0u64, 0u64, 0u64, 0u64, 0u64);
        for other in self
            .aggregates
            .iter()
            .filter(|a| a.season == season && &a.park_id != park)
        {
            games += other.games as u64;
            runs += other.runs as u64;
            hr += other.hr as u64;
            bb += other.bb as u64;
            h += other.h as u64;
        }
        if games == 0 {
            return Err(EngineError::insufficient(format!(
                "no league games outside park {park} in {season}"
            )));
        }

        let park_games = row.games as f64;
        let league_games = games as f64;
        let factor = |park_total: u32, league_total: u64| {
            let league_rate = league_total as f64 / league_games;
            if league_rate == 0.0 {
                NEUTRAL
            } else {
                NEUTRAL * (park_total as f64 / park_games) / league_rate
            }
        };
        Ok(RawSeason {
            games: row.games,
            factors: ComponentFactors {
                runs: factor(row.runs, runs),
                hr: factor(row.hr, hr),
                bb: factor(row.bb, bb),
                h: factor(row.h, h),
            },
        })
    }

    fn sampled_seasons(&self, park: &ParkId, from: u16, to: u16) -> Vec<RawSeason> {
        (from..=to)
            .filter_map(|season| self.raw_season(park, season).ok())
            .collect()
    }

    fn trailing_overall(&self, park: &ParkId, season: u16, years: u16) -> Option<f64> {
        let from = season.saturating_sub(years - 1);
        let seasons = self.sampled_seasons(park, from, season);
        blend(&seasons).map(|(factors, games)| self.shrink(factors, games).runs)
    }

    /// Regress toward 100 with weight `G / (G + k)`.
    fn shrink(&self, factors: ComponentFactors, games: u32) -> ComponentFactors {
        let g = games as f64;
        let k = self.config.regression_games.max(0.0);
        let weight = if g + k == 0.0 { 0.0 } else { g / (g + k) };
        factors.map(|f| NEUTRAL + (f - NEUTRAL) * weight)
    }
}

/// Games-weighted average of single-season factors.
fn blend(seasons: &[RawSeason]) -> Option<(ComponentFactors, u32)> {
    let games: u32 = seasons.iter().map(|s| s.games).sum();
    if games == 0 {
        return None;
    }
    let total = games as f64;
    let mut acc = ComponentFactors {
        runs: 0.0,
        hr: 0.0,
        bb: 0.0,
        h: 0.0,
    };
    for s in seasons {
        let w = s.games as f64 / total;
        acc.runs += s.factors.runs * w;
        acc.hr += s.factors.hr * w;
        acc.bb += s.factors.bb * w;
        acc.h += s.factors.h * w;
    }
    Some((acc, games))
}
