// Streak detection over a chronologically ordered per-game log.
//
// Hitting streaks count games with at least one hit. Scoreless streaks count
// outs recorded without a run scoring, carrying partial games across the
// boundaries through `outs_before_first_run` / `outs_after_last_run`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::counting::format_innings;
use crate::error::{EngineError, Result};
use crate::ids::GameId;
use crate::sequence::check_chronology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakKind {
    Hitting,
    ScorelessInnings,
}

/// One player's game. Batting fields drive hitting streaks, pitching fields
/// drive scoreless streaks; the unused half may be left zeroed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLogEntry {
    pub game_id: GameId,
    pub date: NaiveDate,
    #[serde(default)]
    pub pa: u32,
    #[serde(default)]
    pub ab: u32,
    #[serde(default)]
    pub h: u32,
    #[serde(default)]
    pub sf: u32,
    #[serde(default)]
    pub outs: u32,
    #[serde(default)]
    pub runs_allowed: u32,
    /// Outs recorded before the first run scored, for games with runs.
    #[serde(default)]
    pub outs_before_first_run: Option<u32>,
    /// Outs recorded after the last run scored, for games with runs.
    #[serde(default)]
    pub outs_after_last_run: Option<u32>,
}

/// A game's contribution to a streak: hits for hitting streaks, outs for
/// scoreless streaks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakGame {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub contribution: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Streak {
    pub kind: StreakKind,
    pub start_game_id: GameId,
    pub end_game_id: GameId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Games for hitting streaks, outs for scoreless streaks.
    pub length: u32,
    pub timeline: Vec<StreakGame>,
    /// Still running at the end of the feed.
    pub active: bool,
}

impl Streak {
    /// Scoreless length in innings (outs / 3); `None` for hitting streaks.
    pub fn innings(&self) -> Option<f64> {
        match self.kind {
            StreakKind::ScorelessInnings => Some(self.length as f64 / 3.0),
            StreakKind::Hitting => None,
        }
    }

    pub fn innings_display(&self) -> Option<String> {
        match self.kind {
            StreakKind::ScorelessInnings => Some(format_innings(self.length)),
            StreakKind::Hitting => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Open streak plus the feed position of its last game, used for the
/// recency tie-break.
struct Run {
    timeline: Vec<StreakGame>,
    length: u32,
    last_pos: usize,
}

struct Scanner {
    kind: StreakKind,
    min_length: u32,
    current: Option<Run>,
    done: Vec<(usize, Streak)>,
}

impl Scanner {
    fn new(kind: StreakKind, min_length: u32) -> Self {
        Self {
            kind,
            min_length: min_length.max(1),
            current: None,
            done: Vec::new(),
        }
    }

    fn extend(&mut self, pos: usize, entry: &GameLogEntry, amount: u32) {
        if amount == 0 {
            return;
        }
        let run = self.current.get_or_insert_with(|| Run {
            timeline: Vec::new(),
            length: 0,
            last_pos: pos,
        });
        run.length += amount;
        run.last_pos = pos;
        run.timeline.push(StreakGame {
            game_id: entry.game_id.clone(),
            date: entry.date,
            contribution: amount,
        });
    }

    fn close(&mut self, active: bool) {
        let Some(run) = self.current.take() else {
            return;
        };
        if run.length < self.min_length {
            return;
        }
        let (Some(first), Some(last)) = (run.timeline.first(), run.timeline.last()) else {
            return;
        };
        let streak = Streak {
            kind: self.kind,
            start_game_id: first.game_id.clone(),
            end_game_id: last.game_id.clone(),
            start_date: first.date,
            end_date: last.date,
            length: run.length,
            active,
            timeline: run.timeline,
        };
        self.done.push((run.last_pos, streak));
    }

    /// Longest first; equal lengths put the most recent first.
    fn finish(mut self) -> Vec<Streak> {
        self.close(true);
        self.done
            .sort_by(|a, b| b.1.length.cmp(&a.1.length).then(b.0.cmp(&a.0)));
        self.done.into_iter().map(|(_, s)| s).collect()
    }
}

/// Every hitting streak of at least `min_length` games.
///
/// Games without a plate appearance are skipped. Games with no official at-bat
/// and no sacrifice fly neither extend nor break a streak.
pub fn hitting_streaks(log: &[GameLogEntry], min_length: u32) -> Result<Vec<Streak>> {
    check_chronology(log.iter().map(|g| &g.date))?;
    let mut scanner = Scanner::new(StreakKind::Hitting, min_length);
    for (pos, game) in log.iter().enumerate() {
        if game.h > game.ab {
            return Err(EngineError::malformed(
                pos as u32,
                format!("{}: {} hits in {} at-bats", game.game_id, game.h, game.ab),
            ));
        }
        if game.pa == 0 {
            continue;
        }
        if game.h > 0 {
            scanner.extend(pos, game, 1);
        } else if game.ab > 0 || game.sf > 0 {
            scanner.close(false);
        }
    }
    Ok(scanner.finish())
}

/// Every scoreless stretch of at least `min_outs` outs.
pub fn scoreless_streaks(log: &[GameLogEntry], min_outs: u32) -> Result<Vec<Streak>> {
    check_chronology(log.iter().map(|g| &g.date))?;
    let mut scanner = Scanner::new(StreakKind::ScorelessInnings, min_outs);
    for (pos, game) in log.iter().enumerate() {
        if game.runs_allowed == 0 {
            scanner.extend(pos, game, game.outs);
            continue;
        }
        let before = game.outs_before_first_run.unwrap_or(0);
        let after = game.outs_after_last_run.unwrap_or(0);
        if before + after > game.outs {
            return Err(EngineError::malformed(
                pos as u32,
                format!(
                    "{}: {before} outs before and {after} after runs exceed {} recorded",
                    game.game_id, game.outs
                ),
            ));
        }
        scanner.extend(pos, game, before);
        scanner.close(false);
        scanner.extend(pos, game, after);
    }
    Ok(scanner.finish())
}

pub fn longest_hitting_streak(log: &[GameLogEntry], min_length: u32) -> Result<Option<Streak>> {
    Ok(hitting_streaks(log, min_length)?.into_iter().next())
}

pub fn longest_scoreless_streak(log: &[GameLogEntry], min_outs: u32) -> Result<Option<Streak>> {
    Ok(scoreless_streaks(log, min_outs)?.into_iter().next())
}
