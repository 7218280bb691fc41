// Integration tests for the sabr command layer.
//
// Each test lays out a temporary base directory (config/engine.toml plus the
// CSV tables) and drives `commands::run` with parsed arguments, checking the
// JSON it would print.

use std::fs;
use std::path::Path;

use clap::Parser;
use serde_json::Value;
use tempfile::TempDir;

use sabr_cli::commands::{run, Cli};
use sabr_engine::game::state::Half;
use sabr_engine::game::win_expectancy::{synthetic_rows, WinExpectancyConfig};

// ===========================================================================
// Fixtures
// ===========================================================================

const ENGINE_TOML: &str = r#"
[park_factors]
regression_games = 81.0

[data]
constants = "data/woba_constants.csv"
league_constants = "data/league_constants.csv"
win_expectancy = "data/win_expectancy.csv"
park_aggregates = "data/park_aggregates.csv"
"#;

const WOBA_CSV: &str = "\
Season,wOBA,wOBAScale,wBB,wHBP,w1B,w2B,w3B,wHR,runSB,runCS,R/PA,R/W,cFIP,lgERA,lgRA9,lgHR/FB
2023,0.318,1.204,0.696,0.726,0.883,1.244,1.569,2.004,0.2,-0.422,0.122,9.876,3.255,4.33,4.62,0.127
";

const LEAGUE_CSV: &str = "\
Season,League,wOBA,R/PA,ERA,FIP,RA9,HR/FB
2023,AL,0.317,0.121,4.30,4.31,4.60,0.126
2023,NL,0.319,0.123,4.36,4.35,4.64,0.128
";

const PARKS_CSV: &str = "\
park_id,season,games,runs,hr,bb,h
COL,2023,81,960,190,640,1620
SDP,2023,81,640,150,560,1240
NYY,2023,81,700,210,600,1300
";

const BATTING_CSV: &str = "\
player_id,team_id,park_id,PA,AB,H,2B,3B,HR,BB,IBB,HBP,SF,SH,SO,SB,CS
slugger1,COL,COL,650,570,170,35,4,35,70,5,5,5,0,140,8,2
contact1,SDP,SDP,600,540,162,28,2,8,50,1,4,6,0,70,20,5
";

const PITCHING_CSV: &str = "\
player_id,team_id,park_id,IP,BF,H,R,ER,HR,BB,HBP,SO,FB
ace00001,NYY,NYY,200.0,800,160,65,60,18,45,5,230,180
";

fn write(dir: &Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn win_expectancy_csv() -> String {
    let mut out = String::from("start_year,end_year,inning,half,outs,bases,score_diff,home_win_prob\n");
    for r in synthetic_rows(2000, 2030, &WinExpectancyConfig::default()) {
        let half = if r.half == Half::Top { "top" } else { "bottom" };
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            r.start_year, r.end_year, r.inning, half, r.outs, r.bases, r.score_diff, r.home_win_prob
        ));
    }
    out
}

fn fixture() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    write(dir, "config/engine.toml", ENGINE_TOML);
    write(dir, "data/woba_constants.csv", WOBA_CSV);
    write(dir, "data/league_constants.csv", LEAGUE_CSV);
    write(dir, "data/park_aggregates.csv", PARKS_CSV);
    write(dir, "data/win_expectancy.csv", &win_expectancy_csv());
    write(dir, "batting.csv", BATTING_CSV);
    write(dir, "pitching.csv", PITCHING_CSV);
    tmp
}

fn run_args(dir: &Path, args: &[&str]) -> anyhow::Result<Value> {
    let root = dir.display().to_string();
    let mut argv = vec!["sabr", "--root", root.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;
    run(&cli)
}

fn path_arg(dir: &Path, rel: &str) -> String {
    dir.join(rel).display().to_string()
}

// ===========================================================================
// Derivations
// ===========================================================================

#[test]
fn batting_reports_stats_and_war() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "batting.csv");
    let out = run_args(tmp.path(), &["batting", "--input", &input, "--season", "2023"]).unwrap();
    let rows = out.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["stats"]["player_id"], "slugger1");
    assert!(rows[0]["stats"]["woba"].as_f64().unwrap() > 0.318);
    assert!(rows[0]["war"]["war"].as_f64().is_some());
    // Counting line carried through for auditing.
    assert_eq!(rows[1]["stats"]["line"]["sb"], 20);
}

#[test]
fn park_neutral_batting_discounts_coors() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "batting.csv");
    let raw = run_args(tmp.path(), &["batting", "--input", &input, "--season", "2023"]).unwrap();
    let neutral = run_args(
        tmp.path(),
        &["batting", "--input", &input, "--season", "2023", "--park-neutral"],
    )
    .unwrap();
    let raw_plus = raw[0]["stats"]["wrc_plus"].as_f64().unwrap();
    let neutral_plus = neutral[0]["stats"]["wrc_plus"].as_f64().unwrap();
    assert!(neutral_plus < raw_plus);
    // Pitcher's park helps the contact hitter.
    assert!(neutral[1]["stats"]["wrc_plus"].as_f64().unwrap() > raw[1]["stats"]["wrc_plus"].as_f64().unwrap());
}

#[test]
fn league_constants_are_selected_by_flag() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "batting.csv");
    let out = run_args(
        tmp.path(),
        &["batting", "--input", &input, "--season", "2023", "--league", "NL"],
    )
    .unwrap();
    assert_eq!(out[0]["stats"]["context"]["league"], "NL");
}

#[test]
fn unsampled_parks_fall_back_instead_of_failing() {
    let tmp = fixture();
    let parks = format!("{PARKS_CSV}OAK,2022,81,600,120,500,1200\nSDP,2022,81,650,140,540,1250\n");
    write(tmp.path(), "data/park_aggregates.csv", &parks);
    write(
        tmp.path(),
        "batting.csv",
        "player_id,team_id,park_id,PA,AB,H,2B,3B,HR,BB,IBB,HBP,SF,SH,SO,SB,CS\n\
         slugger1,COL,COL,650,570,170,35,4,35,70,5,5,5,0,140,8,2\n\
         movedA01,OAK,OAK,600,540,150,30,1,20,50,2,4,6,0,120,3,1\n\
         newpark1,LVA,LVA,600,540,150,30,1,20,50,2,4,6,0,120,3,1\n",
    );
    let input = path_arg(tmp.path(), "batting.csv");
    let out = run_args(
        tmp.path(),
        &["batting", "--input", &input, "--season", "2023", "--park-neutral"],
    )
    .unwrap();
    let rows = out.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    // OAK has no 2023 row; its 2022 season stands in.
    let oak = rows[1]["stats"]["park_multiplier"].as_f64().unwrap();
    assert!(oak < 1.0);
    // LVA was never sampled and gets a neutral factor.
    assert_eq!(rows[2]["stats"]["park_multiplier"], 1.0);
}

#[test]
fn career_lines_need_a_constants_season() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "batting.csv");
    let err = run_args(tmp.path(), &["batting", "--input", &input, "--season", "0"]).unwrap_err();
    assert!(format!("{err:#}").contains("--constants-season"));

    let out = run_args(
        tmp.path(),
        &["batting", "--input", &input, "--season", "0", "--constants-season", "2023"],
    )
    .unwrap();
    assert_eq!(out.as_array().unwrap().len(), 2);
    assert!(out[0]["stats"]["wrc_plus"].as_f64().is_some());
}

#[test]
fn pitching_war_depends_on_provider() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "pitching.csv");
    let fg = run_args(tmp.path(), &["pitching", "--input", &input, "--season", "2023"]).unwrap();
    let br = run_args(
        tmp.path(),
        &["pitching", "--input", &input, "--season", "2023", "--provider", "bbref"],
    )
    .unwrap();
    let raw = run_args(
        tmp.path(),
        &["pitching", "--input", &input, "--season", "2023", "--provider", "unadjusted"],
    )
    .unwrap();
    assert_eq!(fg[0]["stats"]["ip"], 200.0);
    assert_ne!(fg[0]["war"]["war"], br[0]["war"]["war"]);
    assert!(raw[0]["war"].is_null());
}

#[test]
fn unadjusted_park_neutral_is_rejected() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "pitching.csv");
    let err = run_args(
        tmp.path(),
        &["pitching", "--input", &input, "--season", "2023", "--provider", "raw", "--park-neutral"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("park"));
}

#[test]
fn missing_season_constants_fail() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "batting.csv");
    assert!(run_args(tmp.path(), &["batting", "--input", &input, "--season", "1990"]).is_err());
}

#[test]
fn park_command_reports_factor() {
    let tmp = fixture();
    let out = run_args(tmp.path(), &["park", "--park", "COL", "--season", "2023"]).unwrap();
    assert_eq!(out["park_id"], "COL");
    assert!(out["one_year"].as_f64().unwrap() > 100.0);
}

// ===========================================================================
// Play-by-play
// ===========================================================================

const EVENTS_CSV: &str = "\
game_id,event_index,inning,half,home_score,away_score,outs,bases,batter,pitcher,description
G1,1,1,top,0,0,1,0,a1,h1,Strikeout
G1,2,1,top,0,0,1,1,a2,h1,Single
G1,3,1,top,0,2,1,0,a3,h1,Home run
G1,4,1,top,0,2,3,0,a4,h1,Double play
G1,5,1,bottom,1,2,0,0,h9,a9,Home run
G2,1,1,top,0,0,1,0,x1,y1,Groundout
G2,2,1,top,0,0,2,0,x2,y1,Flyout
G2,3,1,top,0,0,3,0,x3,y1,Lineout
";

#[test]
fn curve_per_game() {
    let tmp = fixture();
    write(tmp.path(), "events.csv", EVENTS_CSV);
    let events = path_arg(tmp.path(), "events.csv");
    let out = run_args(tmp.path(), &["curve", "--events", &events, "--season", "2023"]).unwrap();
    let games = out.as_array().unwrap();
    assert_eq!(games.len(), 2);
    assert_eq!(games[0]["curve"]["points"].as_array().unwrap().len(), 5);

    let one = run_args(
        tmp.path(),
        &["curve", "--events", &events, "--season", "2023", "--game", "G2"],
    )
    .unwrap();
    assert_eq!(one.as_array().unwrap().len(), 1);
    assert_eq!(one[0]["game_id"], "G2");
}

#[test]
fn leverage_reports_reference_and_wpa() {
    let tmp = fixture();
    write(tmp.path(), "events.csv", EVENTS_CSV);
    let events = path_arg(tmp.path(), "events.csv");
    let out = run_args(tmp.path(), &["leverage", "--events", &events, "--season", "2023"]).unwrap();
    assert!(out["reference"]["mean_abs_swing"].as_f64().unwrap() > 0.0);
    let g1 = &out["games"][0];
    assert_eq!(g1["leverages"].as_array().unwrap().len(), 5);
    assert!(!g1["wpa"].as_array().unwrap().is_empty());
}

#[test]
fn malformed_feed_fails_the_game() {
    let tmp = fixture();
    write(
        tmp.path(),
        "events.csv",
        "game_id,event_index,inning,half,home_score,away_score,outs,bases\nG1,2,1,top,0,0,1,0\nG1,1,1,top,0,0,2,0\n",
    );
    let events = path_arg(tmp.path(), "events.csv");
    assert!(run_args(tmp.path(), &["curve", "--events", &events, "--season", "2023"]).is_err());
}

// ===========================================================================
// Per-game feeds
// ===========================================================================

#[test]
fn hitting_streaks_from_log() {
    let tmp = fixture();
    write(
        tmp.path(),
        "log.csv",
        "game_id,date,PA,AB,H\ng1,2023-04-01,4,4,1\ng2,2023-04-02,4,4,2\ng3,2023-04-03,4,4,0\ng4,2023-04-04,4,4,1\ng5,2023-04-05,4,4,1\n",
    );
    let log = path_arg(tmp.path(), "log.csv");
    let out = run_args(tmp.path(), &["streaks", "--log", &log, "--min", "2"]).unwrap();
    let streaks = out.as_array().unwrap();
    assert_eq!(streaks[0]["streak"]["end_game_id"], "g5");
    assert_eq!(streaks[0]["streak"]["length"], 2);
    assert!(streaks[0]["innings"].is_null());
}

#[test]
fn longest_flag_returns_the_single_most_recent_tie() {
    let tmp = fixture();
    write(
        tmp.path(),
        "log.csv",
        "game_id,date,PA,AB,H\ng1,2023-04-01,4,4,1\ng2,2023-04-02,4,4,2\ng3,2023-04-03,4,4,0\ng4,2023-04-04,4,4,1\ng5,2023-04-05,4,4,1\n",
    );
    let log = path_arg(tmp.path(), "log.csv");
    let out = run_args(tmp.path(), &["streaks", "--log", &log, "--min", "2", "--longest"]).unwrap();
    let streaks = out.as_array().unwrap();
    assert_eq!(streaks.len(), 1);
    assert_eq!(streaks[0]["streak"]["start_game_id"], "g4");
    assert_eq!(streaks[0]["streak"]["end_game_id"], "g5");
    assert_eq!(streaks[0]["streak"]["length"], 2);

    let all = run_args(tmp.path(), &["streaks", "--log", &log, "--min", "2"]).unwrap();
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[test]
fn scoreless_streak_reports_innings() {
    let tmp = fixture();
    write(
        tmp.path(),
        "log.csv",
        "game_id,date,outs,R,outs_before_first_run,outs_after_last_run\np1,2023-04-01,21,0,,\np2,2023-04-06,20,0,,\n",
    );
    let log = path_arg(tmp.path(), "log.csv");
    let out = run_args(tmp.path(), &["streaks", "--log", &log, "--kind", "scoreless"]).unwrap();
    assert_eq!(out[0]["streak"]["length"], 41);
    assert_eq!(out[0]["innings"], "13.2");
    assert_eq!(out[0]["streak"]["active"], true);
}

#[test]
fn run_diff_windows() {
    let tmp = fixture();
    let mut csv = String::from("game_id,date,runs_scored,runs_allowed\n");
    for i in 1..=12 {
        csv.push_str(&format!("g{i},2023-04-{i:02},{},{}\n", i % 6, 3));
    }
    write(tmp.path(), "games.csv", &csv);
    let games = path_arg(tmp.path(), "games.csv");
    let out = run_args(
        tmp.path(),
        &["run-diff", "--games", &games, "--window", "10", "--window", "3"],
    )
    .unwrap();
    assert_eq!(out["windows"][0]["points"].as_array().unwrap().len(), 3);
    assert_eq!(out["windows"][1]["points"].as_array().unwrap().len(), 10);
    assert_eq!(out["games"].as_array().unwrap().len(), 12);
    assert_eq!(out["games"][0]["game_number"], 1);
}

#[test]
fn zero_window_is_rejected() {
    let tmp = fixture();
    write(tmp.path(), "games.csv", "game_id,date,runs_scored,runs_allowed\ng1,2023-04-01,3,2\n");
    let games = path_arg(tmp.path(), "games.csv");
    assert!(run_args(tmp.path(), &["run-diff", "--games", &games, "--window", "0"]).is_err());
}

#[test]
fn splits_by_home_away() {
    let tmp = fixture();
    write(
        tmp.path(),
        "splits.csv",
        "player_id,PA,AB,H,2B,3B,HR,BB,SO,game_id,date,venue,bat_hand,pit_hand,slot\n\
         p1,4,4,2,1,0,0,0,1,g1,2023-04-01,H,L,R,3\n\
         p1,4,3,1,0,0,1,1,0,g2,2023-04-02,A,L,L,3\n\
         p2,4,4,4,0,0,0,0,0,g2,2023-04-02,A,R,L,1\n",
    );
    let input = path_arg(tmp.path(), "splits.csv");
    let out = run_args(
        tmp.path(),
        &["splits", "--input", &input, "--player", "p1", "--by", "home-away", "--season", "2023"],
    )
    .unwrap();
    let splits = out.as_array().unwrap();
    assert_eq!(splits.len(), 2);
    assert_eq!(splits[0]["key"], "home");
    assert_eq!(splits[0]["stats"]["avg"], 0.5);
    assert_eq!(splits[1]["games"], 1);
}

#[test]
fn park_neutral_splits_leave_away_games_alone() {
    let tmp = fixture();
    write(
        tmp.path(),
        "splits.csv",
        "player_id,PA,AB,H,2B,3B,HR,BB,SO,game_id,date,venue,bat_hand,pit_hand,slot\n\
         p1,4,4,2,1,0,0,0,1,g1,2023-04-01,H,L,R,3\n\
         p1,4,3,1,0,0,1,1,0,g2,2023-04-02,A,L,L,3\n",
    );
    let input = path_arg(tmp.path(), "splits.csv");
    let base: [&str; 9] = ["splits", "--input", &input, "--player", "p1", "--by", "home-away", "--season", "2023"];
    let raw = run_args(tmp.path(), &base).unwrap();
    let mut args = base.to_vec();
    args.extend_from_slice(&["--park-neutral", "--park", "COL"]);
    let neutral = run_args(tmp.path(), &args).unwrap();

    assert_eq!(neutral[0]["key"], "home");
    assert!(neutral[0]["stats"]["park_multiplier"].as_f64().unwrap() > 1.0);
    assert!(neutral[0]["stats"]["wrc_plus"].as_f64().unwrap() < raw[0]["stats"]["wrc_plus"].as_f64().unwrap());

    assert_eq!(neutral[1]["key"], "away");
    assert_eq!(neutral[1]["stats"]["park_multiplier"], 1.0);
    assert_eq!(neutral[1]["stats"]["wrc_plus"], raw[1]["stats"]["wrc_plus"]);
}

// ===========================================================================
// Argument and config errors
// ===========================================================================

#[test]
fn missing_config_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "batting.csv", BATTING_CSV);
    let input = path_arg(tmp.path(), "batting.csv");
    let err = run_args(tmp.path(), &["batting", "--input", &input, "--season", "2023"]).unwrap_err();
    assert!(format!("{err:#}").contains("engine.toml"));
}

#[test]
fn unknown_provider_is_reported() {
    let tmp = fixture();
    let input = path_arg(tmp.path(), "batting.csv");
    let err = run_args(
        tmp.path(),
        &["batting", "--input", &input, "--season", "2023", "--provider", "statcast"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("statcast"));
}
