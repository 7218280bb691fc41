// Cumulative and trailing-window run differential for one team's season.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ids::GameId;
use crate::sequence::check_chronology;

/// Pythagenpat exponent power.
const PYTHAGENPAT_POWER: f64 = 0.287;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamGame {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub runs_scored: u32,
    pub runs_allowed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDiffPoint {
    /// 1-based position in the feed.
    pub game_number: u32,
    pub game_id: GameId,
    pub date: NaiveDate,
    pub differential: i64,
    pub cumulative: i64,
}

/// Trailing-window sums ending at `game_number`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingPoint {
    pub game_number: u32,
    pub game_id: GameId,
    pub date: NaiveDate,
    pub runs_scored: u64,
    pub runs_allowed: u64,
    pub differential: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingWindow {
    pub size: usize,
    pub points: Vec<RollingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDiffSummary {
    pub games: u32,
    pub runs_scored: u64,
    pub runs_allowed: u64,
    pub differential: i64,
    pub pythagorean_win_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDifferentialSeries {
    pub games: Vec<RunDiffPoint>,
    pub windows: Vec<RollingWindow>,
    pub summary: RunDiffSummary,
}

/// Build the series. Windows only produce points once `size` games have been
/// played; a zero-size window is rejected.
pub fn aggregate(games: &[TeamGame], windows: &[usize]) -> Result<RunDifferentialSeries> {
    if windows.contains(&0) {
        return Err(EngineError::InvalidContext(
            "rolling window size must be at least 1".into(),
        ));
    }
    check_chronology(games.iter().map(|g| &g.date))?;

    let mut cumulative = 0i64;
    let points: Vec<RunDiffPoint> = games
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let differential = g.runs_scored as i64 - g.runs_allowed as i64;
            cumulative += differential;
            RunDiffPoint {
                game_number: i as u32 + 1,
                game_id: g.game_id.clone(),
                date: g.date,
                differential,
                cumulative,
            }
        })
        .collect();

    let windows = windows.iter().map(|&size| rolling(games, size)).collect();

    let runs_scored: u64 = games.iter().map(|g| g.runs_scored as u64).sum();
    let runs_allowed: u64 = games.iter().map(|g| g.runs_allowed as u64).sum();
    let summary = RunDiffSummary {
        games: games.len() as u32,
        runs_scored,
        runs_allowed,
        differential: runs_scored as i64 - runs_allowed as i64,
        pythagorean_win_pct: pythagorean_win_pct(runs_scored, runs_allowed, games.len() as u32),
    };

    Ok(RunDifferentialSeries {
        games: points,
        windows,
        summary,
    })
}

fn rolling(games: &[TeamGame], size: usize) -> RollingWindow {
    let mut points = Vec::with_capacity(games.len().saturating_sub(size - 1));
    let (mut scored, mut allowed) = (0u64, 0u64);
    for (i, g) in games.iter().enumerate() {
        scored += g.runs_scored as u64;
        allowed += g.runs_allowed as u64;
        if i >= size {
            scored -= games[i - size].runs_scored as u64;
            allowed -= games[i - size].runs_allowed as u64;
        }
        if i + 1 >= size {
            points.push(RollingPoint {
                game_number: i as u32 + 1,
                game_id: g.game_id.clone(),
                date: g.date,
                runs_scored: scored,
                runs_allowed: allowed,
                differential: scored as i64 - allowed as i64,
            });
        }
    }
    RollingWindow { size, points }
}

/// Expected winning percentage with exponent ((RS+RA)/G)^0.287.
pub fn pythagorean_win_pct(runs_scored: u64, runs_allowed: u64, games: u32) -> Option<f64> {
    if games == 0 || runs_scored + runs_allowed == 0 {
        return None;
    }
    let rs = runs_scored as f64;
    let ra = runs_allowed as f64;
    let exponent = ((rs + ra) / games as f64).powf(PYTHAGENPAT_POWER);
    let num = rs.powf(exponent);
    Some(num / (num + ra.powf(exponent)))
}
