// Game state: inning, half, outs, base occupancy and score differential,
// plus the half-inning rollover and game-end rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Last scheduled inning of a regulation game.
pub const REGULATION_INNINGS: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    Top,
    Bottom,
}

impl Half {
    pub fn is_top(&self) -> bool {
        matches!(self, Half::Top)
    }
}

/// Base occupancy as three independent flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bases {
    pub first: bool,
    pub second: bool,
    pub third: bool,
}

impl Bases {
    pub const EMPTY: Bases = Bases {
        first: false,
        second: false,
        third: false,
    };
    pub const LOADED: Bases = Bases {
        first: true,
        second: true,
        third: true,
    };

    /// Bit mask: first = 1, second = 2, third = 4.
    pub fn mask(&self) -> u8 {
        (self.first as u8) | (self.second as u8) << 1 | (self.third as u8) << 2
    }

    pub fn from_mask(mask: u8) -> Self {
        Self {
            first: mask & 1 != 0,
            second: mask & 2 != 0,
            third: mask & 4 != 0,
        }
    }

    pub fn runners(&self) -> u8 {
        self.first as u8 + self.second as u8 + self.third as u8
    }
}

impl fmt::Display for Bases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = |on: bool, label: char| if on { label } else { '_' };
        write!(f, "{}{}{}", c(self.first, '1'), c(self.second, '2'), c(self.third, '3'))
    }
}

/// A moment in a game, from the home team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    pub inning: u8,
    pub half: Half,
    /// 0..=3; three outs marks the end of a half-inning.
    pub outs: u8,
    pub bases: Bases,
    /// Home runs minus away runs.
    pub score_diff: i32,
}

/// A state after rollover: either still being played or decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Live(GameState),
    Final { home_won: bool },
}

impl GameState {
    /// Top of the first, nobody on, nobody out, tied.
    pub fn first_pitch() -> Self {
        Self {
            inning: 1,
            half: Half::Top,
            outs: 0,
            bases: Bases::EMPTY,
            score_diff: 0,
        }
    }

    /// Start of the half-inning following this one.
    pub fn next_half(&self) -> Self {
        let (inning, half) = match self.half {
            Half::Top => (self.inning, Half::Bottom),
            Half::Bottom => (self.inning.saturating_add(1), Half::Top),
        };
        Self {
            inning,
            half,
            outs: 0,
            bases: Bases::EMPTY,
            score_diff: self.score_diff,
        }
    }

    /// Roll a three-out state into the next half-inning and apply the
    /// game-end rules.
    pub fn resolve(&self) -> Resolved {
        let late = self.inning >= REGULATION_INNINGS;
        if self.outs >= 3 {
            match self.half {
                // Home team does not bat in the bottom half when already ahead.
                Half::Top if late && self.score_diff > 0 => {
                    return Resolved::Final { home_won: true };
                }
                Half::Bottom if late && self.score_diff != 0 => {
                    return Resolved::Final {
                        home_won: self.score_diff > 0,
                    };
                }
                _ => return Resolved::Live(self.next_half()),
            }
        }
        if self.half == Half::Bottom && late && self.score_diff > 0 {
            // Walk-off.
            return Resolved::Final { home_won: true };
        }
        Resolved::Live(*self)
    }

    /// Whether the side at bat is the home team.
    pub fn home_batting(&self) -> bool {
        self.half == Half::Bottom
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let half = if self.half.is_top() { "T" } else { "B" };
        write!(
            f,
            "{half}{} {} out, bases {}, diff {:+}",
            self.inning, self.outs, self.bases, self.score_diff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(inning: u8, half: Half, outs: u8, diff: i32) -> GameState {
        GameState {
            inning,
            half,
            outs,
            bases: Bases::EMPTY,
            score_diff: diff,
        }
    }

    #[test]
    fn base_mask_round_trip_for_loaded() {
        assert_eq!(Bases::LOADED.mask(), 7);
        assert_eq!(Bases::from_mask(5), Bases { first: true, second: false, third: true });
        assert_eq!(Bases::from_mask(5).runners(), 2);
    }

    #[test]
    fn three_outs_in_top_rolls_to_bottom() {
        let s = GameState {
            bases: Bases::LOADED,
            ..state(4, Half::Top, 3, -2)
        };
        assert_eq!(s.resolve(), Resolved::Live(state(4, Half::Bottom, 0, -2)));
    }

    #[test]
    fn three_outs_in_bottom_rolls_to_next_inning() {
        let s = state(6, Half::Bottom, 3, 1);
        assert_eq!(s.resolve(), Resolved::Live(state(7, Half::Top, 0, 1)));
    }

    #[test]
    fn home_lead_after_top_ninth_ends_game() {
        let s = state(9, Half::Top, 3, 2);
        assert_eq!(s.resolve(), Resolved::Final { home_won: true });
    }

    #[test]
    fn away_lead_after_bottom_ninth_ends_game() {
        let s = state(9, Half::Bottom, 3, -1);
        assert_eq!(s.resolve(), Resolved::Final { home_won: false });
    }

    #[test]
    fn tie_after_ninth_goes_to_extras() {
        let s = state(9, Half::Bottom, 3, 0);
        assert_eq!(s.resolve(), Resolved::Live(state(10, Half::Top, 0, 0)));
    }

    #[test]
    fn walk_off_in_extras() {
        let s = state(11, Half::Bottom, 1, 1);
        assert_eq!(s.resolve(), Resolved::Final { home_won: true });
    }

    #[test]
    fn home_lead_mid_game_is_live() {
        let s = state(5, Half::Bottom, 1, 4);
        assert_eq!(s.resolve(), Resolved::Live(s));
    }

    #[test]
    fn display_is_compact() {
        let s = GameState {
            bases: Bases::from_mask(3),
            ..state(7, Half::Bottom, 2, -1)
        };
        assert_eq!(s.to_string(), "B7 2 out, bases 12_, diff -1");
    }
}
