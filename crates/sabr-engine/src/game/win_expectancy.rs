// Win expectancy: state -> home-win probability lookup over era tables.
//
// Eras form a small interval map kept as a sorted list. For a season the
// narrowest containing era wins; a season outside every era falls back to
// the nearest earlier era and the answer is flagged approximate.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::game::state::{Bases, GameState, Half, Resolved};

// ---------------------------------------------------------------------------
// Bucketing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinExpectancyConfig {
    /// Score differentials beyond this magnitude collapse into the boundary
    /// bucket.
    pub score_diff_cap: i32,
    /// First inning folded into the shared extras bucket.
    pub extras_from_inning: u8,
}

impl Default for WinExpectancyConfig {
    fn default() -> Self {
        Self {
            score_diff_cap: 10,
            extras_from_inning: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InningBucket {
    Regulation(u8),
    Extras,
}

/// Table key: a `GameState` after capping and extras folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeKey {
    pub inning: InningBucket,
    pub half: Half,
    pub outs: u8,
    pub bases: u8,
    pub score_diff: i32,
}

impl WinExpectancyConfig {
    pub fn key(&self, state: &GameState) -> WeKey {
        let inning = if state.inning >= self.extras_from_inning {
            InningBucket::Extras
        } else {
            InningBucket::Regulation(state.inning)
        };
        WeKey {
            inning,
            half: state.half,
            outs: state.outs,
            bases: state.bases.mask(),
            score_diff: state.score_diff.clamp(-self.score_diff_cap, self.score_diff_cap),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One row of an externally supplied win-expectancy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinExpectancyRow {
    pub start_year: u16,
    pub end_year: u16,
    pub inning: u8,
    pub half: Half,
    pub outs: u8,
    pub bases: u8,
    pub score_diff: i32,
    pub home_win_prob: f64,
}

#[derive(Debug, Clone)]
pub struct EraTable {
    pub start_year: u16,
    pub end_year: u16,
    entries: HashMap<WeKey, f64>,
}

impl EraTable {
    pub fn contains_year(&self, year: u16) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    pub fn width(&self) -> u16 {
        self.end_year - self.start_year
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lookup result. `key` is `None` for decided games.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinExpectancy {
    pub key: Option<WeKey>,
    pub home_win_prob: f64,
    pub era_start: u16,
    pub era_end: u16,
    /// True when no era contained the requested season.
    pub approximate: bool,
}

impl WinExpectancy {
    pub fn away_win_prob(&self) -> f64 {
        1.0 - self.home_win_prob
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WinExpectancyModel {
    config: WinExpectancyConfig,
    eras: Vec<EraTable>,
}

impl WinExpectancyModel {
    /// Group rows into era tables. Rows are re-keyed through the model's own
    /// bucketing, so a table may be supplied at finer granularity than the
    /// cap; later rows for the same bucket replace earlier ones.
    pub fn new(config: WinExpectancyConfig, rows: Vec<WinExpectancyRow>) -> Result<Self> {
        if config.score_diff_cap < 1 {
            return Err(EngineError::InvalidContext(format!(
                "score_diff_cap must be >= 1, got {}",
                config.score_diff_cap
            )));
        }
        if config.extras_from_inning < 2 {
            return Err(EngineError::InvalidContext(format!(
                "extras_from_inning must be >= 2, got {}",
                config.extras_from_inning
            )));
        }

        let mut eras: Vec<EraTable> = Vec::new();
        for row in rows {
            if !(0.0..=1.0).contains(&row.home_win_prob) {
                return Err(EngineError::InvalidContext(format!(
                    "win probability {} outside [0, 1]",
                    row.home_win_prob
                )));
            }
            if row.start_year > row.end_year || row.outs > 2 || row.bases > 7 || row.inning == 0 {
                return Err(EngineError::InvalidContext(format!(
                    "invalid win expectancy row {row:?}"
                )));
            }
            let state = GameState {
                inning: row.inning,
                half: row.half,
                outs: row.outs,
                bases: Bases::from_mask(row.bases),
                score_diff: row.score_diff,
            };
            let key = config.key(&state);
            let idx = match eras
                .iter()
                .position(|e| e.start_year == row.start_year && e.end_year == row.end_year)
            {
                Some(idx) => idx,
                None => {
                    eras.push(EraTable {
                        start_year: row.start_year,
                        end_year: row.end_year,
                        entries: HashMap::new(),
                    });
                    eras.len() - 1
                }
            };
            eras[idx].entries.insert(key, row.home_win_prob);
        }
        eras.sort_by_key(|e| (e.start_year, e.end_year));
        Ok(Self { config, eras })
    }

    pub fn config(&self) -> &WinExpectancyConfig {
        &self.config
    }

    pub fn eras(&self) -> &[EraTable] {
        &self.eras
    }

    /// Look up against the most recent era.
    pub fn get(&self, state: &GameState) -> Result<WinExpectancy> {
        let era = self
            .eras
            .iter()
            .max_by_key(|e| (e.end_year, std::cmp::Reverse(e.width())))
            .ok_or_else(|| EngineError::StateNotFound {
                detail: "no win expectancy eras loaded".into(),
            })?;
        self.lookup_in(era, false, state)
    }

    /// Look up against the era that best matches `year`.
    pub fn get_for_season(&self, state: &GameState, year: u16) -> Result<WinExpectancy> {
        let (era, approximate) = self.resolve_year(year)?;
        self.lookup_in(era, approximate, state)
    }

    /// Look up against the narrowest era covering all of `start..=end`;
    /// otherwise resolve by `end` and flag the result approximate.
    pub fn get_for_era(&self, state: &GameState, start: u16, end: u16) -> Result<WinExpectancy> {
        if start > end {
            return Err(EngineError::InvalidContext(format!(
                "era span {start}..={end} is reversed"
            )));
        }
        let covering = self
            .eras
            .iter()
            .filter(|e| e.start_year <= start && end <= e.end_year)
            .min_by_key(|e| (e.width(), std::cmp::Reverse(e.start_year)));
        match covering {
            Some(era) => self.lookup_in(era, false, state),
            None => {
                let (era, _) = self.resolve_year(end)?;
                self.lookup_in(era, true, state)
            }
        }
    }

    /// Order-preserving batch form of `get`.
    pub fn batch_get(&self, states: &[GameState]) -> Result<Vec<WinExpectancy>> {
        states.par_iter().map(|s| self.get(s)).collect()
    }

    /// Order-preserving batch form of `get_for_season`.
    pub fn batch_get_for_season(&self, states: &[GameState], year: u16) -> Result<Vec<WinExpectancy>> {
        let (era, approximate) = self.resolve_year(year)?;
        states
            .par_iter()
            .map(|s| self.lookup_in(era, approximate, s))
            .collect()
    }

    /// Home-win probability only.
    pub fn home_win_prob(&self, state: &GameState, year: u16) -> Result<f64> {
        self.get_for_season(state, year).map(|we| we.home_win_prob)
    }

    fn resolve_year(&self, year: u16) -> Result<(&EraTable, bool)> {
        let containing = self
            .eras
            .iter()
            .filter(|e| e.contains_year(year))
            .min_by_key(|e| (e.width(), std::cmp::Reverse(e.start_year)));
        if let Some(era) = containing {
            return Ok((era, false));
        }
        let earlier = self
            .eras
            .iter()
            .filter(|e| e.end_year < year)
            .max_by_key(|e| (e.end_year, std::cmp::Reverse(e.width())));
        match earlier {
            Some(era) => {
                warn!(
                    year,
                    era_start = era.start_year,
                    era_end = era.end_year,
                    "no win expectancy era contains season, using nearest earlier era"
                );
                Ok((era, true))
            }
            None => Err(EngineError::StateNotFound {
                detail: format!("no win expectancy era at or before {year}"),
            }),
        }
    }

    fn lookup_in(&self, era: &EraTable, approximate: bool, state: &GameState) -> Result<WinExpectancy> {
        let (key, home_win_prob) = match state.resolve() {
            Resolved::Final { home_won } => (None, if home_won { 1.0 } else { 0.0 }),
            Resolved::Live(live) => {
                let key = self.config.key(&live);
                let p = era.entries.get(&key).copied().ok_or_else(|| {
                    EngineError::StateNotFound {
                        detail: format!(
                            "{live} in era {}-{}",
                            era.start_year, era.end_year
                        ),
                    }
                })?;
                (Some(key), p)
            }
        };
        Ok(WinExpectancy {
            key,
            home_win_prob,
            era_start: era.start_year,
            era_end: era.end_year,
            approximate,
        })
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// A complete synthetic table: logistic in the score differential, sharper
/// as the game progresses, with a small bonus for runners on base for the
/// batting side. Used by tests across the workspace.
#[doc(hidden)]
pub fn synthetic_rows(start_year: u16, end_year: u16, config: &WinExpectancyConfig) -> Vec<WinExpectancyRow> {
    let mut rows = Vec::new();
    for inning in 1..=config.extras_from_inning {
        for half in [Half::Top, Half::Bottom] {
            for outs in 0..=2u8 {
                for bases in 0..=7u8 {
                    for diff in -config.score_diff_cap..=config.score_diff_cap {
                        let progress = (inning.min(9) as f64 - 1.0) / 8.0;
                        let runners = Bases::from_mask(bases).runners() as f64;
                        let threat = (0.15 * runners - 0.05 * outs as f64) * if half == Half::Bottom { 1.0 } else { -1.0 };
                        let x = (diff as f64 + threat) * (0.35 + 0.9 * progress) + 0.08;
                        rows.push(WinExpectancyRow {
                            start_year,
                            end_year,
                            inning,
                            half,
                            outs,
                            bases,
                            score_diff: diff,
                            home_win_prob: 1.0 / (1.0 + (-x).exp()),
                        });
                    }
                }
            }
        }
    }
    rows
}
