// Subcommand definitions and dispatch. Each command loads what it needs,
// calls the engine, and returns a JSON value for the caller to print.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use sabr_engine::derive::batting::{derive_batting_batch, BattingInput};
use sabr_engine::derive::pitching::{derive_pitching_batch, PitchingInput};
use sabr_engine::derive::war::{hitter_war, pitcher_war, HitterExtras};
use sabr_engine::game::leverage::{win_probability_added, LeverageCurveBuilder, PlayEvent};
use sabr_engine::game::win_expectancy::WinExpectancyModel;
use sabr_engine::park::{ParkFactor, ParkFactorEngine};
use sabr_engine::sequence::run_diff;
use sabr_engine::sequence::splits::{split_batting, split_pitching, SplitDimension};
use sabr_engine::sequence::streaks::{
    hitting_streaks, longest_hitting_streak, longest_scoreless_streak, scoreless_streaks, Streak,
};
use sabr_engine::{
    ConstantsProvider, EngineError, League, ParkId, PlayerId, SeasonConstants, StatContext,
    StatProvider,
};

use crate::config::{self, Config};
use crate::loader::{self, GameEvents};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "sabr")]
#[command(about = "Derive context-normalized baseball metrics from counting stats and play-by-play", long_about = None)]
pub struct Cli {
    /// Base directory holding config/engine.toml and the data tables
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Explicit config file (defaults to <root>/config/engine.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags that make up a `StatContext`.
#[derive(Debug, Clone, Args)]
pub struct ContextArgs {
    /// Season (0 for multi-year/career lines)
    #[arg(long)]
    pub season: u16,

    /// Season whose constants scale a career line (required with --season 0)
    #[arg(long)]
    pub constants_season: Option<u16>,

    /// League abbreviation (AL or NL) for league-specific constants
    #[arg(long)]
    pub league: Option<String>,

    /// Formula provider: fangraphs, bbref or unadjusted
    #[arg(long, default_value = "fangraphs")]
    pub provider: String,

    /// Neutralize for the home park
    #[arg(long)]
    pub park_neutral: bool,

    /// Lines are postseason rather than regular season
    #[arg(long)]
    pub postseason: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreakArg {
    Hitting,
    Scoreless,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Derive batting stats and WAR for every line in a CSV
    Batting {
        /// Batting lines CSV
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Derive pitching stats and WAR for every line in a CSV
    Pitching {
        /// Pitching lines CSV
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Compute a park factor for one season or a span of seasons
    Park {
        #[arg(long)]
        park: String,

        /// Final (or only) season
        #[arg(long)]
        season: u16,

        /// First season of a multi-year blend
        #[arg(long)]
        from: Option<u16>,
    },

    /// Build win-probability curves from play-by-play
    Curve {
        /// Play-by-play CSV
        #[arg(long)]
        events: PathBuf,

        #[arg(long)]
        season: u16,

        /// Only this game
        #[arg(long)]
        game: Option<String>,
    },

    /// Per-event leverage index and win probability added
    Leverage {
        /// Play-by-play CSV; every game in it feeds the reference swing
        #[arg(long)]
        events: PathBuf,

        #[arg(long)]
        season: u16,

        /// Only report this game
        #[arg(long)]
        game: Option<String>,
    },

    /// Detect hitting or scoreless-innings streaks in a game log
    Streaks {
        /// Per-game log CSV in date order
        #[arg(long)]
        log: PathBuf,

        #[arg(long, value_enum, default_value = "hitting")]
        kind: StreakArg,

        /// Minimum length (games for hitting, outs for scoreless)
        #[arg(long, default_value_t = 1)]
        min: u32,

        /// Only the longest streak (ties go to the most recent)
        #[arg(long)]
        longest: bool,
    },

    /// Cumulative and rolling run differential for a team
    RunDiff {
        /// Team game results CSV in date order
        #[arg(long)]
        games: PathBuf,

        /// Trailing window size; repeat for several
        #[arg(long = "window")]
        windows: Vec<usize>,
    },

    /// Split one player's lines by a context dimension
    Splits {
        /// Per-game lines with split columns
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        player: String,

        /// home-away, batter-hand, pitcher-hand, month or lineup-slot
        #[arg(long)]
        by: String,

        /// Treat the input as pitching lines
        #[arg(long)]
        pitching: bool,

        /// Park to neutralize against when --park-neutral is set
        #[arg(long)]
        park: Option<String>,

        #[command(flatten)]
        context: ContextArgs,
    },
}

impl ContextArgs {
    pub fn to_context(&self) -> Result<StatContext> {
        let league = match &self.league {
            Some(abbrev) => Some(
                League::from_abbrev(abbrev)
                    .with_context(|| format!("unknown league '{abbrev}'"))?,
            ),
            None => None,
        };
        let provider = StatProvider::from_name(&self.provider)
            .with_context(|| format!("unknown provider '{}'", self.provider))?;
        Ok(StatContext::new(
            self.season,
            league,
            provider,
            self.park_neutral,
            !self.postseason,
        )?)
    }
}

// ---------------------------------------------------------------------------
// Shared loading
// ---------------------------------------------------------------------------

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => config::load_config_file(path, &cli.root),
        None => config::load_config_from(&cli.root),
    }
    .context("failed to load configuration")?;
    Ok(config)
}

fn load_constants(
    config: &Config,
    context: &StatContext,
    constants_season: Option<u16>,
) -> Result<SeasonConstants> {
    let woba_path = config.data_path(&config.data.constants);
    let woba = loader::load_woba_constants(&woba_path)
        .with_context(|| format!("failed to load constants from {}", woba_path.display()))?;
    let leagues = match &config.data.league_constants {
        Some(p) => loader::load_league_constants(&config.data_path(p))
            .context("failed to load league constants")?,
        None => Vec::new(),
    };
    let provider = ConstantsProvider::new(woba, leagues);
    let season = if context.is_career() {
        constants_season.context("career lines (--season 0) need --constants-season")?
    } else {
        context.season_value()
    };
    Ok(provider.lookup(season, context.league())?)
}

fn load_park_engine(config: &Config) -> Result<ParkFactorEngine> {
    let Some(path) = &config.data.park_aggregates else {
        bail!("park factors need data.park_aggregates in the config");
    };
    let aggregates = loader::load_park_aggregates(&config.data_path(path))
        .context("failed to load park aggregates")?;
    info!("Loaded {} park-season aggregates", aggregates.len());
    Ok(ParkFactorEngine::new(aggregates, config.park_factors))
}

fn load_model(config: &Config) -> Result<WinExpectancyModel> {
    let path = config.data_path(&config.data.win_expectancy);
    let rows = loader::load_win_expectancy(&path)
        .with_context(|| format!("failed to load win expectancy from {}", path.display()))?;
    info!("Loaded {} win expectancy rows", rows.len());
    Ok(WinExpectancyModel::new(config.win_expectancy, rows)?)
}

/// Park factors for each distinct park, only when neutralizing.
fn park_factors_for<'a>(
    config: &Config,
    context: &StatContext,
    parks: impl Iterator<Item = &'a ParkId>,
) -> Result<HashMap<ParkId, ParkFactor>> {
    let mut factors = HashMap::new();
    if !context.park_neutral() {
        return Ok(factors);
    }
    let engine = load_park_engine(config)?;
    for park in parks {
        if !factors.contains_key(park) {
            let pf = park_factor_with_fallback(&engine, park, context.season_value())?;
            factors.insert(park.clone(), pf);
        }
    }
    Ok(factors)
}

/// Single-season factor; an unsampled season falls back to the trailing
/// five-year blend, then to a neutral factor.
fn park_factor_with_fallback(engine: &ParkFactorEngine, park: &ParkId, season: u16) -> Result<ParkFactor> {
    match engine.compute(park, season) {
        Ok(pf) => Ok(pf),
        Err(EngineError::InsufficientSample { what }) => {
            match engine.compute_multi_year(park, season.saturating_sub(4), season) {
                Ok(pf) => {
                    warn!(park = %park, season, "{what}; using {}-{season} blend", pf.from_season);
                    Ok(pf)
                }
                Err(EngineError::InsufficientSample { .. }) => {
                    warn!(park = %park, season, "{what}; using a neutral park factor");
                    Ok(ParkFactor::neutral(park.clone(), season))
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn select_games(games: Vec<GameEvents>, only: Option<&str>) -> Result<Vec<GameEvents>> {
    match only {
        None => Ok(games),
        Some(id) => {
            let picked: Vec<GameEvents> = games
                .into_iter()
                .filter(|g| g.game_id.as_str() == id)
                .collect();
            if picked.is_empty() {
                bail!("game '{id}' not found in event feed");
            }
            Ok(picked)
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(cli: &Cli) -> Result<Value> {
    match &cli.command {
        Command::Batting { input, context } => run_batting(cli, input, context),
        Command::Pitching { input, context } => run_pitching(cli, input, context),
        Command::Park { park, season, from } => {
            let config = load_config(cli)?;
            let engine = load_park_engine(&config)?;
            let park = ParkId::new(park.as_str());
            let pf = match from {
                Some(from) => engine.compute_multi_year(&park, *from, *season)?,
                None => engine.compute(&park, *season)?,
            };
            Ok(serde_json::to_value(pf)?)
        }
        Command::Curve { events, season, game } => {
            let config = load_config(cli)?;
            let model = load_model(&config)?;
            let games = select_games(loader::load_events(events)?, game.as_deref())?;
            let builder = LeverageCurveBuilder::new(&model, *season, config.leverage)?;
            let mut out = Vec::with_capacity(games.len());
            for g in &games {
                let curve = builder
                    .build_curve(&g.events)
                    .with_context(|| format!("game {}", g.game_id))?;
                out.push(json!({ "game_id": g.game_id, "curve": curve }));
            }
            Ok(Value::Array(out))
        }
        Command::Leverage { events, season, game } => {
            let config = load_config(cli)?;
            let model = load_model(&config)?;
            let all = loader::load_events(events)?;
            let builder = LeverageCurveBuilder::new(&model, *season, config.leverage)?;
            let feeds: Vec<Vec<PlayEvent>> = all.iter().map(|g| g.events.clone()).collect();
            let reference = builder.reference_swing_from_games(&feeds)?;
            let builder = builder.with_reference(reference)?;
            let mut out = Vec::new();
            for g in select_games(all, game.as_deref())? {
                let leverages = builder
                    .build_leverages(&g.events)
                    .with_context(|| format!("game {}", g.game_id))?;
                let wpa = win_probability_added(&leverages);
                out.push(json!({
                    "game_id": g.game_id,
                    "leverages": leverages,
                    "wpa": wpa,
                }));
            }
            Ok(json!({ "reference": reference, "games": out }))
        }
        Command::Streaks {
            log,
            kind,
            min,
            longest,
        } => {
            let entries = loader::load_game_log(log)?;
            let streaks: Vec<Streak> = match (kind, longest) {
                (StreakArg::Hitting, false) => hitting_streaks(&entries, *min)?,
                (StreakArg::Scoreless, false) => scoreless_streaks(&entries, *min)?,
                (StreakArg::Hitting, true) => longest_hitting_streak(&entries, *min)?.into_iter().collect(),
                (StreakArg::Scoreless, true) => longest_scoreless_streak(&entries, *min)?.into_iter().collect(),
            };
            let out: Vec<Value> = streaks
                .iter()
                .map(|s| {
                    json!({
                        "streak": s,
                        "innings": s.innings_display(),
                    })
                })
                .collect();
            Ok(Value::Array(out))
        }
        Command::RunDiff { games, windows } => {
            let games = loader::load_team_games(games)?;
            let series = run_diff::aggregate(&games, windows)?;
            Ok(serde_json::to_value(series)?)
        }
        Command::Splits {
            input,
            player,
            by,
            pitching,
            park,
            context,
        } => run_splits(cli, input, player, by, *pitching, park.as_deref(), context),
    }
}

fn run_batting(cli: &Cli, input: &Path, args: &ContextArgs) -> Result<Value> {
    let config = load_config(cli)?;
    let context = args.to_context()?;
    let constants = load_constants(&config, &context, args.constants_season)?;
    let records = loader::load_batting(input)?;
    info!("Loaded {} batting lines", records.len());

    let parks = park_factors_for(&config, &context, records.iter().filter_map(|r| r.park_id.as_ref()))?;
    let inputs: Vec<BattingInput> = records
        .into_iter()
        .map(|r| BattingInput {
            park: r.park_id.as_ref().and_then(|p| parks.get(p).cloned()),
            player_id: r.player_id,
            team_id: r.team_id,
            line: r.line,
        })
        .collect();
    let stats = derive_batting_batch(&inputs, &context, &constants)?;

    let mut out = Vec::with_capacity(stats.len());
    for s in &stats {
        let war = hitter_war(s, &constants, HitterExtras::default(), &config.replacement)?;
        out.push(json!({ "stats": s, "war": war }));
    }
    Ok(Value::Array(out))
}

fn run_pitching(cli: &Cli, input: &Path, args: &ContextArgs) -> Result<Value> {
    let config = load_config(cli)?;
    let context = args.to_context()?;
    let constants = load_constants(&config, &context, args.constants_season)?;
    let records = loader::load_pitching(input)?;
    info!("Loaded {} pitching lines", records.len());

    let parks = park_factors_for(&config, &context, records.iter().filter_map(|r| r.park_id.as_ref()))?;
    let inputs: Vec<PitchingInput> = records
        .into_iter()
        .map(|r| PitchingInput {
            park: r.park_id.as_ref().and_then(|p| parks.get(p).cloned()),
            player_id: r.player_id,
            team_id: r.team_id,
            line: r.line,
        })
        .collect();
    let stats = derive_pitching_batch(&inputs, &context, &constants)?;

    let mut out = Vec::with_capacity(stats.len());
    for s in &stats {
        // Raw numbers carry no WAR methodology.
        let war = match context.provider() {
            StatProvider::Unadjusted => None,
            provider => Some(pitcher_war(s, &constants, &config.replacement, provider)?),
        };
        out.push(json!({ "stats": s, "war": war }));
    }
    Ok(Value::Array(out))
}

fn run_splits(
    cli: &Cli,
    input: &Path,
    player: &str,
    by: &str,
    pitching: bool,
    park: Option<&str>,
    args: &ContextArgs,
) -> Result<Value> {
    let dimension =
        SplitDimension::from_name(by).with_context(|| format!("unknown split dimension '{by}'"))?;
    let config = load_config(cli)?;
    let context = args.to_context()?;
    let constants = load_constants(&config, &context, args.constants_season)?;
    let player_id = PlayerId::new(player);

    let park_ids: Vec<ParkId> = park.map(ParkId::new).into_iter().collect();
    let parks = park_factors_for(&config, &context, park_ids.iter())?;
    let pf = park_ids.first().and_then(|p| parks.get(p));

    if pitching {
        let rows: Vec<_> = loader::load_pitching_splits(input)?
            .into_iter()
            .filter(|(id, _)| id == &player_id)
            .map(|(_, row)| row)
            .collect();
        let splits = split_pitching(&player_id, None, &rows, dimension, &context, &constants, pf)?;
        Ok(serde_json::to_value(splits)?)
    } else {
        let rows: Vec<_> = loader::load_batting_splits(input)?
            .into_iter()
            .filter(|(id, _)| id == &player_id)
            .map(|(_, row)| row)
            .collect();
        let splits = split_batting(&player_id, None, &rows, dimension, &context, &constants, pf)?;
        Ok(serde_json::to_value(splits)?)
    }
}
