// CSV loading for the externally supplied tables and feeds.
//
// Reference tables (constants, win expectancy, park aggregates) and stat lines
// are lenient: a malformed or impossible row is skipped with a warning.
// Ordered feeds (play-by-play, game logs, team games) are strict, since
// dropping a row would silently change every later state.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use sabr_engine::game::leverage::PlayEvent;
use sabr_engine::game::state::{Bases, Half};
use sabr_engine::game::win_expectancy::WinExpectancyRow;
use sabr_engine::park::ParkSeasonAggregate;
use sabr_engine::sequence::run_diff::TeamGame;
use sabr_engine::sequence::splits::{Hand, PitchingSplitRow, SplitRow};
use sabr_engine::sequence::streaks::GameLogEntry;
use sabr_engine::{
    BattingLine, GameId, League, LeagueConstant, ParkId, PitchingLine, PlayerId, TeamId,
    WobaConstant,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} row {row}: {message}")]
    Row {
        path: String,
        row: usize,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Public record types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BattingRecord {
    pub player_id: PlayerId,
    pub team_id: Option<TeamId>,
    pub park_id: Option<ParkId>,
    pub line: BattingLine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitchingRecord {
    pub player_id: PlayerId,
    pub team_id: Option<TeamId>,
    pub park_id: Option<ParkId>,
    pub line: PitchingLine,
}

/// Play-by-play for one game, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvents {
    pub game_id: GameId,
    pub events: Vec<PlayEvent>,
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Season constants in FanGraphs "Guts" column naming, plus the league
/// pitching environment columns.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawWoba {
    Season: u16,
    wOBA: f64,
    wOBAScale: f64,
    wBB: f64,
    wHBP: f64,
    w1B: f64,
    w2B: f64,
    w3B: f64,
    wHR: f64,
    runSB: f64,
    runCS: f64,
    #[serde(rename = "R/PA")]
    r_pa: f64,
    #[serde(rename = "R/W")]
    r_w: f64,
    cFIP: f64,
    lgERA: f64,
    lgRA9: f64,
    #[serde(rename = "lgHR/FB")]
    lg_hr_fb: f64,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawLeague {
    Season: u16,
    League: String,
    wOBA: f64,
    #[serde(rename = "R/PA")]
    r_pa: f64,
    ERA: f64,
    FIP: f64,
    RA9: f64,
    #[serde(rename = "HR/FB")]
    hr_fb: f64,
}

#[derive(Debug, Deserialize)]
struct RawWinExpectancy {
    start_year: u16,
    end_year: u16,
    inning: u8,
    half: String,
    outs: u8,
    bases: u8,
    score_diff: i32,
    home_win_prob: f64,
}

#[derive(Debug, Deserialize)]
struct RawParkAggregate {
    park_id: String,
    season: u16,
    games: u32,
    runs: u32,
    hr: u32,
    bb: u32,
    h: u32,
}

/// Batting line row. The trailing split columns are only read by the split
/// loader.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawBatting {
    player_id: String,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    park_id: Option<String>,
    PA: u32,
    AB: u32,
    H: u32,
    #[serde(rename = "2B")]
    doubles: u32,
    #[serde(rename = "3B")]
    triples: u32,
    HR: u32,
    BB: u32,
    #[serde(default)]
    IBB: u32,
    #[serde(default)]
    HBP: u32,
    #[serde(default)]
    SF: u32,
    #[serde(default)]
    SH: u32,
    SO: u32,
    #[serde(default)]
    SB: u32,
    #[serde(default)]
    CS: u32,
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    bat_hand: Option<String>,
    #[serde(default)]
    pit_hand: Option<String>,
    #[serde(default)]
    slot: Option<String>,
}

/// Pitching line row; IP is in box-score notation ("6.2").
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawPitching {
    player_id: String,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    park_id: Option<String>,
    IP: String,
    #[serde(default)]
    BF: u32,
    H: u32,
    R: u32,
    ER: u32,
    HR: u32,
    BB: u32,
    #[serde(default)]
    IBB: u32,
    #[serde(default)]
    HBP: u32,
    SO: u32,
    #[serde(default)]
    FB: Option<u32>,
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    bat_hand: Option<String>,
    #[serde(default)]
    pit_hand: Option<String>,
    #[serde(default)]
    slot: Option<String>,
}

/// Split columns lifted out of a batting or pitching row.
struct RawSplitColumns {
    game_id: Option<String>,
    date: Option<String>,
    venue: Option<String>,
    bat_hand: Option<String>,
    pit_hand: Option<String>,
    slot: Option<String>,
}

macro_rules! split_columns {
    ($raw:expr) => {
        RawSplitColumns {
            game_id: $raw.game_id,
            date: $raw.date,
            venue: $raw.venue,
            bat_hand: $raw.bat_hand,
            pit_hand: $raw.pit_hand,
            slot: $raw.slot,
        }
    };
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    game_id: String,
    event_index: u32,
    inning: u8,
    half: String,
    home_score: u32,
    away_score: u32,
    outs: u8,
    bases: u8,
    #[serde(default)]
    batter: Option<String>,
    #[serde(default)]
    pitcher: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawGameLog {
    game_id: String,
    date: NaiveDate,
    #[serde(default)]
    PA: u32,
    #[serde(default)]
    AB: u32,
    #[serde(default)]
    H: u32,
    #[serde(default)]
    SF: u32,
    #[serde(default)]
    outs: u32,
    #[serde(default, rename = "R")]
    runs_allowed: u32,
    #[serde(default)]
    outs_before_first_run: Option<u32>,
    #[serde(default)]
    outs_after_last_run: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawTeamGame {
    game_id: String,
    date: NaiveDate,
    runs_scored: u32,
    runs_allowed: u32,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Box-score innings ("6.2") to outs. The fractional digit must be 0, 1 or 2.
pub fn parse_innings(s: &str) -> Option<u32> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, "0"),
    };
    let whole: u32 = whole.parse().ok()?;
    let thirds: u32 = match frac {
        "" | "0" => 0,
        "1" => 1,
        "2" => 2,
        _ => return None,
    };
    Some(whole * 3 + thirds)
}

fn parse_half(s: &str) -> Option<Half> {
    match s.trim().to_lowercase().as_str() {
        "top" | "t" => Some(Half::Top),
        "bottom" | "bot" | "b" => Some(Half::Bottom),
        _ => None,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

/// Deserialize every row, skipping malformed ones with a warning.
fn lenient_rows<T: DeserializeOwned, R: Read>(rdr: R, what: &str) -> Vec<T> {
    let mut rows = Vec::new();
    for result in reader(rdr).deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!("skipping malformed {} row: {}", what, e),
        }
    }
    rows
}

/// Deserialize every row; the first malformed row fails the load.
fn strict_rows<T: DeserializeOwned, R: Read>(rdr: R, source: &str) -> Result<Vec<T>, LoadError> {
    reader(rdr)
        .deserialize::<T>()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(|e| LoadError::Csv {
            path: source.to_string(),
            source: e,
        })
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

fn woba_from_reader<R: Read>(rdr: R) -> Vec<WobaConstant> {
    lenient_rows::<RawWoba, _>(rdr, "constants")
        .into_iter()
        .filter_map(|raw| {
            let values = [
                raw.wOBA, raw.wOBAScale, raw.wBB, raw.wHBP, raw.w1B, raw.w2B, raw.w3B, raw.wHR,
                raw.runSB, raw.runCS, raw.r_pa, raw.r_w, raw.cFIP, raw.lgERA, raw.lgRA9,
                raw.lg_hr_fb,
            ];
            if !all_finite(&values) || raw.wOBAScale <= 0.0 || raw.r_w <= 0.0 {
                warn!("skipping constants for {}: non-finite or non-positive value", raw.Season);
                return None;
            }
            Some(WobaConstant {
                season: raw.Season,
                woba: raw.wOBA,
                woba_scale: raw.wOBAScale,
                w_bb: raw.wBB,
                w_hbp: raw.wHBP,
                w_1b: raw.w1B,
                w_2b: raw.w2B,
                w_3b: raw.w3B,
                w_hr: raw.wHR,
                run_sb: raw.runSB,
                run_cs: raw.runCS,
                r_pa: raw.r_pa,
                r_w: raw.r_w,
                cfip: raw.cFIP,
                lg_era: raw.lgERA,
                lg_ra9: raw.lgRA9,
                lg_hr_fb: raw.lg_hr_fb,
            })
        })
        .collect()
}

fn league_from_reader<R: Read>(rdr: R) -> Vec<LeagueConstant> {
    lenient_rows::<RawLeague, _>(rdr, "league constants")
        .into_iter()
        .filter_map(|raw| {
            let Some(league) = League::from_abbrev(&raw.League) else {
                warn!("skipping league constants for {}: unknown league '{}'", raw.Season, raw.League);
                return None;
            };
            if !all_finite(&[raw.wOBA, raw.r_pa, raw.ERA, raw.FIP, raw.RA9, raw.hr_fb]) {
                warn!("skipping {} {} league constants: non-finite value", raw.Season, league);
                return None;
            }
            Some(LeagueConstant {
                season: raw.Season,
                league,
                woba: raw.wOBA,
                r_pa: raw.r_pa,
                era: raw.ERA,
                fip: raw.FIP,
                ra9: raw.RA9,
                hr_fb: raw.hr_fb,
            })
        })
        .collect()
}

fn win_expectancy_from_reader<R: Read>(rdr: R) -> Vec<WinExpectancyRow> {
    lenient_rows::<RawWinExpectancy, _>(rdr, "win expectancy")
        .into_iter()
        .filter_map(|raw| {
            let Some(half) = parse_half(&raw.half) else {
                warn!("skipping win expectancy row: unknown half '{}'", raw.half);
                return None;
            };
            if !(0.0..=1.0).contains(&raw.home_win_prob) || raw.outs > 2 || raw.bases > 7 {
                warn!(
                    "skipping win expectancy row {}-{} inning {}: out of range",
                    raw.start_year, raw.end_year, raw.inning
                );
                return None;
            }
            Some(WinExpectancyRow {
                start_year: raw.start_year,
                end_year: raw.end_year,
                inning: raw.inning,
                half,
                outs: raw.outs,
                bases: raw.bases,
                score_diff: raw.score_diff,
                home_win_prob: raw.home_win_prob,
            })
        })
        .collect()
}

fn park_aggregates_from_reader<R: Read>(rdr: R) -> Vec<ParkSeasonAggregate> {
    lenient_rows::<RawParkAggregate, _>(rdr, "park aggregate")
        .into_iter()
        .map(|raw| ParkSeasonAggregate {
            park_id: ParkId::new(raw.park_id),
            season: raw.season,
            games: raw.games,
            runs: raw.runs,
            hr: raw.hr,
            bb: raw.bb,
            h: raw.h,
        })
        .collect()
}

fn batting_line(raw: &RawBatting) -> BattingLine {
    BattingLine {
        pa: raw.PA,
        ab: raw.AB,
        h: raw.H,
        doubles: raw.doubles,
        triples: raw.triples,
        hr: raw.HR,
        bb: raw.BB,
        ibb: raw.IBB,
        hbp: raw.HBP,
        sf: raw.SF,
        sh: raw.SH,
        so: raw.SO,
        sb: raw.SB,
        cs: raw.CS,
    }
}

fn batting_from_reader<R: Read>(rdr: R) -> Vec<BattingRecord> {
    lenient_rows::<RawBatting, _>(rdr, "batting")
        .into_iter()
        .filter_map(|raw| {
            let line = batting_line(&raw);
            if let Err(e) = line.validate() {
                warn!("skipping batting line for '{}': {}", raw.player_id, e);
                return None;
            }
            Some(BattingRecord {
                player_id: PlayerId::new(raw.player_id.trim()),
                team_id: non_empty(raw.team_id).map(TeamId::new),
                park_id: non_empty(raw.park_id).map(ParkId::new),
                line,
            })
        })
        .collect()
}

fn pitching_line(raw: &RawPitching) -> Option<PitchingLine> {
    Some(PitchingLine {
        outs: parse_innings(&raw.IP)?,
        bf: raw.BF,
        h: raw.H,
        r: raw.R,
        er: raw.ER,
        hr: raw.HR,
        bb: raw.BB,
        ibb: raw.IBB,
        hbp: raw.HBP,
        so: raw.SO,
        fb: raw.FB,
    })
}

fn pitching_from_reader<R: Read>(rdr: R) -> Vec<PitchingRecord> {
    lenient_rows::<RawPitching, _>(rdr, "pitching")
        .into_iter()
        .filter_map(|raw| {
            let Some(line) = pitching_line(&raw) else {
                warn!("skipping pitching line for '{}': bad IP '{}'", raw.player_id, raw.IP);
                return None;
            };
            if let Err(e) = line.validate() {
                warn!("skipping pitching line for '{}': {}", raw.player_id, e);
                return None;
            }
            Some(PitchingRecord {
                player_id: PlayerId::new(raw.player_id.trim()),
                team_id: non_empty(raw.team_id).map(TeamId::new),
                park_id: non_empty(raw.park_id).map(ParkId::new),
                line,
            })
        })
        .collect()
}

/// Split facts shared by batting and pitching split rows.
struct SplitFacts {
    game_id: GameId,
    date: NaiveDate,
    is_home: bool,
    batter_hand: Option<Hand>,
    pitcher_hand: Option<Hand>,
    lineup_slot: Option<u8>,
}

fn split_facts(player: &str, cols: RawSplitColumns) -> Option<SplitFacts> {
    let game_id = non_empty(cols.game_id)?;
    let date = match non_empty(cols.date).map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d")) {
        Some(Ok(d)) => d,
        _ => {
            warn!("skipping split row for '{}' in {}: missing or bad date", player, game_id);
            return None;
        }
    };
    let is_home = match non_empty(cols.venue).as_deref().map(str::to_lowercase).as_deref() {
        Some("h") | Some("home") => true,
        Some("a") | Some("away") | Some("@") => false,
        _ => {
            warn!("skipping split row for '{}' in {}: venue must be H or A", player, game_id);
            return None;
        }
    };
    Some(SplitFacts {
        game_id: GameId::new(game_id),
        date,
        is_home,
        batter_hand: non_empty(cols.bat_hand).and_then(|h| Hand::from_code(&h)),
        pitcher_hand: non_empty(cols.pit_hand).and_then(|h| Hand::from_code(&h)),
        lineup_slot: non_empty(cols.slot).and_then(|s| s.parse().ok()),
    })
}

fn batting_splits_from_reader<R: Read>(rdr: R) -> Vec<(PlayerId, SplitRow)> {
    lenient_rows::<RawBatting, _>(rdr, "batting split")
        .into_iter()
        .filter_map(|raw| {
            let line = batting_line(&raw);
            if let Err(e) = line.validate() {
                warn!("skipping batting split for '{}': {}", raw.player_id, e);
                return None;
            }
            let facts = split_facts(&raw.player_id, split_columns!(raw))?;
            Some((
                PlayerId::new(raw.player_id.trim()),
                SplitRow {
                    game_id: facts.game_id,
                    date: facts.date,
                    is_home: facts.is_home,
                    batter_hand: facts.batter_hand,
                    pitcher_hand: facts.pitcher_hand,
                    lineup_slot: facts.lineup_slot,
                    line,
                },
            ))
        })
        .collect()
}

fn pitching_splits_from_reader<R: Read>(rdr: R) -> Vec<(PlayerId, PitchingSplitRow)> {
    lenient_rows::<RawPitching, _>(rdr, "pitching split")
        .into_iter()
        .filter_map(|raw| {
            let Some(line) = pitching_line(&raw) else {
                warn!("skipping pitching split for '{}': bad IP '{}'", raw.player_id, raw.IP);
                return None;
            };
            if let Err(e) = line.validate() {
                warn!("skipping pitching split for '{}': {}", raw.player_id, e);
                return None;
            }
            let facts = split_facts(&raw.player_id, split_columns!(raw))?;
            Some((
                PlayerId::new(raw.player_id.trim()),
                PitchingSplitRow {
                    game_id: facts.game_id,
                    date: facts.date,
                    is_home: facts.is_home,
                    batter_hand: facts.batter_hand,
                    pitcher_hand: facts.pitcher_hand,
                    lineup_slot: facts.lineup_slot,
                    line,
                },
            ))
        })
        .collect()
}

fn events_from_reader<R: Read>(rdr: R, source: &str) -> Result<Vec<GameEvents>, LoadError> {
    let raws: Vec<RawEvent> = strict_rows(rdr, source)?;
    let mut games: Vec<GameEvents> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for (i, raw) in raws.into_iter().enumerate() {
        let row_error = |message: String| LoadError::Row {
            path: source.to_string(),
            row: i + 1,
            message,
        };
        let half = parse_half(&raw.half)
            .ok_or_else(|| row_error(format!("unknown half '{}'", raw.half)))?;
        if raw.bases > 7 {
            return Err(row_error(format!("bases mask {} out of range", raw.bases)));
        }
        let event = PlayEvent {
            event_index: raw.event_index,
            inning: raw.inning,
            half,
            home_score: raw.home_score,
            away_score: raw.away_score,
            outs: raw.outs,
            bases: Bases::from_mask(raw.bases),
            batter: non_empty(raw.batter).map(PlayerId::new),
            pitcher: non_empty(raw.pitcher).map(PlayerId::new),
            description: raw.description.unwrap_or_default(),
        };
        let idx = *by_id.entry(raw.game_id.clone()).or_insert_with(|| {
            games.push(GameEvents {
                game_id: GameId::new(raw.game_id.as_str()),
                events: Vec::new(),
            });
            games.len() - 1
        });
        games[idx].events.push(event);
    }
    Ok(games)
}

fn game_log_from_reader<R: Read>(rdr: R, source: &str) -> Result<Vec<GameLogEntry>, LoadError> {
    let raws: Vec<RawGameLog> = strict_rows(rdr, source)?;
    Ok(raws
        .into_iter()
        .map(|raw| GameLogEntry {
            game_id: GameId::new(raw.game_id),
            date: raw.date,
            pa: raw.PA,
            ab: raw.AB,
            h: raw.H,
            sf: raw.SF,
            outs: raw.outs,
            runs_allowed: raw.runs_allowed,
            outs_before_first_run: raw.outs_before_first_run,
            outs_after_last_run: raw.outs_after_last_run,
        })
        .collect())
}

fn team_games_from_reader<R: Read>(rdr: R, source: &str) -> Result<Vec<TeamGame>, LoadError> {
    let raws: Vec<RawTeamGame> = strict_rows(rdr, source)?;
    Ok(raws
        .into_iter()
        .map(|raw| TeamGame {
            game_id: GameId::new(raw.game_id),
            date: raw.date,
            runs_scored: raw.runs_scored,
            runs_allowed: raw.runs_allowed,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

pub fn load_woba_constants(path: &Path) -> Result<Vec<WobaConstant>, LoadError> {
    Ok(woba_from_reader(open(path)?))
}

pub fn load_league_constants(path: &Path) -> Result<Vec<LeagueConstant>, LoadError> {
    Ok(league_from_reader(open(path)?))
}

pub fn load_win_expectancy(path: &Path) -> Result<Vec<WinExpectancyRow>, LoadError> {
    Ok(win_expectancy_from_reader(open(path)?))
}

pub fn load_park_aggregates(path: &Path) -> Result<Vec<ParkSeasonAggregate>, LoadError> {
    Ok(park_aggregates_from_reader(open(path)?))
}

pub fn load_batting(path: &Path) -> Result<Vec<BattingRecord>, LoadError> {
    Ok(batting_from_reader(open(path)?))
}

pub fn load_pitching(path: &Path) -> Result<Vec<PitchingRecord>, LoadError> {
    Ok(pitching_from_reader(open(path)?))
}

pub fn load_batting_splits(path: &Path) -> Result<Vec<(PlayerId, SplitRow)>, LoadError> {
    Ok(batting_splits_from_reader(open(path)?))
}

pub fn load_pitching_splits(path: &Path) -> Result<Vec<(PlayerId, PitchingSplitRow)>, LoadError> {
    Ok(pitching_splits_from_reader(open(path)?))
}

pub fn load_events(path: &Path) -> Result<Vec<GameEvents>, LoadError> {
    events_from_reader(open(path)?, &path.display().to_string())
}

pub fn load_game_log(path: &Path) -> Result<Vec<GameLogEntry>, LoadError> {
    game_log_from_reader(open(path)?, &path.display().to_string())
}

pub fn load_team_games(path: &Path) -> Result<Vec<TeamGame>, LoadError> {
    team_games_from_reader(open(path)?, &path.display().to_string())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
