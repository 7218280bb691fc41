// Split grouping: bucket per-game rows by one context dimension, sum the
// counting lines, and rederive each bucket with the regular formulas.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::constants::SeasonConstants;
use crate::context::StatContext;
use crate::counting::{BattingLine, PitchingLine};
use crate::derive::batting::{derive_batting, AdvancedBattingStats};
use crate::derive::pitching::{derive_pitching, AdvancedPitchingStats};
use crate::error::Result;
use crate::ids::{GameId, PlayerId, TeamId};
use crate::park::ParkFactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
    Switch,
}

impl Hand {
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "L" => Some(Hand::Left),
            "R" => Some(Hand::Right),
            "S" | "B" => Some(Hand::Switch),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Hand::Left => "L",
            Hand::Right => "R",
            Hand::Switch => "S",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDimension {
    HomeAway,
    BatterHand,
    PitcherHand,
    Month,
    LineupSlot,
}

impl SplitDimension {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "home_away" => Some(SplitDimension::HomeAway),
            "batter_hand" => Some(SplitDimension::BatterHand),
            "pitcher_hand" => Some(SplitDimension::PitcherHand),
            "month" => Some(SplitDimension::Month),
            "lineup_slot" => Some(SplitDimension::LineupSlot),
            _ => None,
        }
    }
}

/// Bucket label. `Unknown` collects rows missing the dimension's value so
/// bucket totals always add up to the full line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKey {
    Home,
    Away,
    BatterHand(Hand),
    PitcherHand(Hand),
    Month(u32),
    LineupSlot(u8),
    Unknown,
}

impl fmt::Display for SplitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitKey::Home => f.write_str("home"),
            SplitKey::Away => f.write_str("away"),
            SplitKey::BatterHand(h) => write!(f, "vs {}HB", h.code()),
            SplitKey::PitcherHand(h) => write!(f, "vs {}HP", h.code()),
            SplitKey::Month(m) => write!(f, "month {m}"),
            SplitKey::LineupSlot(s) => write!(f, "batting {s}"),
            SplitKey::Unknown => f.write_str("unknown"),
        }
    }
}

/// One player's batting in one game (or one PA), with its split facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRow {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub is_home: bool,
    pub batter_hand: Option<Hand>,
    pub pitcher_hand: Option<Hand>,
    pub lineup_slot: Option<u8>,
    pub line: BattingLine,
}

/// Pitching counterpart; `batter_hand` is the hand of the batters faced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingSplitRow {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub is_home: bool,
    pub batter_hand: Option<Hand>,
    pub pitcher_hand: Option<Hand>,
    pub lineup_slot: Option<u8>,
    pub line: PitchingLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split<T> {
    pub dimension: SplitDimension,
    pub key: SplitKey,
    /// Distinct games contributing to the bucket.
    pub games: u32,
    pub stats: T,
}

pub type BattingSplit = Split<AdvancedBattingStats>;
pub type PitchingSplit = Split<AdvancedPitchingStats>;

fn split_key(
    dimension: SplitDimension,
    is_home: bool,
    date: NaiveDate,
    batter_hand: Option<Hand>,
    pitcher_hand: Option<Hand>,
    lineup_slot: Option<u8>,
) -> SplitKey {
    match dimension {
        SplitDimension::HomeAway if is_home => SplitKey::Home,
        SplitDimension::HomeAway => SplitKey::Away,
        SplitDimension::BatterHand => batter_hand.map_or(SplitKey::Unknown, SplitKey::BatterHand),
        SplitDimension::PitcherHand => pitcher_hand.map_or(SplitKey::Unknown, SplitKey::PitcherHand),
        SplitDimension::Month => SplitKey::Month(date.month()),
        SplitDimension::LineupSlot => lineup_slot
            .filter(|s| (1..=9).contains(s))
            .map_or(SplitKey::Unknown, SplitKey::LineupSlot),
    }
}

struct Bucket<L> {
    line: L,
    games: BTreeSet<GameId>,
    /// PA (batting) or outs (pitching), in total and at home.
    weight: u64,
    home_weight: u64,
}

impl<L> Bucket<L> {
    fn new(line: L) -> Self {
        Self {
            line,
            games: BTreeSet::new(),
            weight: 0,
            home_weight: 0,
        }
    }

    fn add_weight(&mut self, weight: u32, is_home: bool) {
        self.weight += weight as u64;
        if is_home {
            self.home_weight += weight as u64;
        }
    }

    /// The home park factor applies only to the share played at home.
    fn park_factor(&self, park: Option<&ParkFactor>) -> Option<ParkFactor> {
        park.map(|pf| {
            let share = if self.weight == 0 {
                0.0
            } else {
                self.home_weight as f64 / self.weight as f64
            };
            pf.home_share(share)
        })
    }
}

pub fn split_batting(
    player_id: &PlayerId,
    team_id: Option<&TeamId>,
    rows: &[SplitRow],
    dimension: SplitDimension,
    context: &StatContext,
    constants: &SeasonConstants,
    park: Option<&ParkFactor>,
) -> Result<Vec<BattingSplit>> {
    let mut buckets: BTreeMap<SplitKey, Bucket<BattingLine>> = BTreeMap::new();
    for row in rows {
        row.line.validate()?;
        let key = split_key(
            dimension,
            row.is_home,
            row.date,
            row.batter_hand,
            row.pitcher_hand,
            row.lineup_slot,
        );
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(BattingLine::default()));
        bucket.line += row.line;
        bucket.games.insert(row.game_id.clone());
        bucket.add_weight(row.line.pa, row.is_home);
    }

    buckets
        .into_iter()
        .map(|(key, bucket)| {
            let pf = bucket.park_factor(park);
            let stats = derive_batting(
                player_id.clone(),
                team_id.cloned(),
                &bucket.line,
                context,
                constants,
                pf.as_ref(),
            )?;
            Ok(Split {
                dimension,
                key,
                games: bucket.games.len() as u32,
                stats,
            })
        })
        .collect()
}

pub fn split_pitching(
    player_id: &PlayerId,
    team_id: Option<&TeamId>,
    rows: &[PitchingSplitRow],
    dimension: SplitDimension,
    context: &StatContext,
    constants: &SeasonConstants,
    park: Option<&ParkFactor>,
) -> Result<Vec<PitchingSplit>> {
    let mut buckets: BTreeMap<SplitKey, Bucket<PitchingLine>> = BTreeMap::new();
    for row in rows {
        row.line.validate()?;
        let key = split_key(
            dimension,
            row.is_home,
            row.date,
            row.batter_hand,
            row.pitcher_hand,
            row.lineup_slot,
        );
        // Fly balls stay tracked only while every row in the bucket has them.
        let bucket = buckets.entry(key).or_insert_with(|| {
            Bucket::new(PitchingLine {
                fb: Some(0),
                ..Default::default()
            })
        });
        bucket.line += row.line;
        bucket.games.insert(row.game_id.clone());
        bucket.add_weight(row.line.outs, row.is_home);
    }

    buckets
        .into_iter()
        .map(|(key, bucket)| {
            let pf = bucket.park_factor(park);
            let stats = derive_pitching(
                player_id.clone(),
                team_id.cloned(),
                &bucket.line,
                context,
                constants,
                pf.as_ref(),
            )?;
            Ok(Split {
                dimension,
                key,
                games: bucket.games.len() as u32,
                stats,
            })
        })
        .collect()
}
