// Configuration loading and validation (config/engine.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use sabr_engine::derive::war::ReplacementLevel;
use sabr_engine::game::leverage::OutcomeFrequencies;
use sabr_engine::game::win_expectancy::WinExpectancyConfig;
use sabr_engine::park::ParkFactorConfig;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// engine.toml structs
// ---------------------------------------------------------------------------

/// Raw shape of engine.toml. Every engine section is optional and falls back
/// to the engine's defaults.
#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    #[serde(default)]
    win_expectancy: WinExpectancyConfig,
    #[serde(default)]
    park_factors: ParkFactorConfig,
    #[serde(default)]
    leverage: OutcomeFrequencies,
    #[serde(default)]
    replacement: ReplacementLevel,
    data: DataPaths,
}

/// Locations of the externally supplied tables, relative to the base dir.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub constants: String,
    #[serde(default)]
    pub league_constants: Option<String>,
    pub win_expectancy: String,
    #[serde(default)]
    pub park_aggregates: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub win_expectancy: WinExpectancyConfig,
    pub park_factors: ParkFactorConfig,
    pub leverage: OutcomeFrequencies,
    pub replacement: ReplacementLevel,
    pub data: DataPaths,
    /// Directory the data paths are resolved against.
    pub base_dir: PathBuf,
}

impl Config {
    /// Resolve a configured data path against the base directory.
    pub fn data_path(&self, relative: &str) -> PathBuf {
        let p = Path::new(relative);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/engine.toml` under `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_config_file(&base_dir.join("config").join("engine.toml"), base_dir)
}

/// Load and validate an explicit config file; data paths resolve against
/// `base_dir`.
pub fn load_config_file(path: &Path, base_dir: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let file: EngineFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = Config {
        win_expectancy: file.win_expectancy,
        park_factors: file.park_factors,
        leverage: file.leverage,
        replacement: file.replacement,
        data: file.data,
        base_dir: base_dir.to_path_buf(),
    };
    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let we = &config.win_expectancy;
    if we.score_diff_cap < 1 {
        return Err(invalid(
            "win_expectancy.score_diff_cap",
            format!("must be >= 1, got {}", we.score_diff_cap),
        ));
    }
    if !(2..=30).contains(&we.extras_from_inning) {
        return Err(invalid(
            "win_expectancy.extras_from_inning",
            format!("must be between 2 and 30, got {}", we.extras_from_inning),
        ));
    }

    let k = config.park_factors.regression_games;
    if !k.is_finite() || k < 0.0 {
        return Err(invalid(
            "park_factors.regression_games",
            format!("must be a finite value >= 0, got {k}"),
        ));
    }

    let f = &config.leverage;
    let freq_fields: &[(&str, f64)] = &[
        ("leverage.out", f.out),
        ("leverage.walk", f.walk),
        ("leverage.single", f.single),
        ("leverage.double", f.double),
        ("leverage.triple", f.triple),
        ("leverage.home_run", f.home_run),
    ];
    for (name, val) in freq_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }
    if f.total() <= 0.0 {
        return Err(invalid("leverage", "frequencies must not all be zero"));
    }

    let r = &config.replacement;
    let repl_fields: &[(&str, f64)] = &[
        ("replacement.hitter_runs_per_600_pa", r.hitter_runs_per_600_pa),
        ("replacement.pitcher_ra9_margin", r.pitcher_ra9_margin),
    ];
    for (name, val) in repl_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }

    if config.data.constants.trim().is_empty() {
        return Err(invalid("data.constants", "must not be empty"));
    }
    if config.data.win_expectancy.trim().is_empty() {
        return Err(invalid("data.win_expectancy", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = r#"
[data]
constants = "data/woba.csv"
win_expectancy = "data/we.csv"
"#;

    fn write_config(dir: &Path, text: &str) {
        let config_dir = dir.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("engine.toml"), text).unwrap();
    }

    #[test]
    fn minimal_file_uses_engine_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), MINIMAL);
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.win_expectancy, WinExpectancyConfig::default());
        assert_eq!(config.park_factors, ParkFactorConfig::default());
        assert_eq!(config.replacement, ReplacementLevel::default());
        assert!(config.data.park_aggregates.is_none());
        assert_eq!(config.data_path("data/woba.csv"), tmp.path().join("data/woba.csv"));
    }

    #[test]
    fn sections_override_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let text = format!(
            "{MINIMAL}\n[park_factors]\nregression_games = 300.0\n\n[win_expectancy]\nscore_diff_cap = 8\n"
        );
        write_config(tmp.path(), &text);
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.park_factors.regression_games, 300.0);
        assert_eq!(config.park_factors.min_games, 1);
        assert_eq!(config.win_expectancy.score_diff_cap, 8);
        assert_eq!(config.win_expectancy.extras_from_inning, 10);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("engine.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "[data\nconstants = ");
        assert!(matches!(
            load_config_from(tmp.path()).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
    }

    #[test]
    fn rejects_negative_regression() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), &format!("{MINIMAL}\n[park_factors]\nregression_games = -1.0\n"));
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "park_factors.regression_games");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_all_zero_frequencies() {
        let tmp = tempfile::tempdir().unwrap();
        let text = format!(
            "{MINIMAL}\n[leverage]\nout = 0.0\nwalk = 0.0\nsingle = 0.0\ndouble = 0.0\ntriple = 0.0\nhome_run = 0.0\n"
        );
        write_config(tmp.path(), &text);
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "leverage"),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn rejects_zero_score_cap() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), &format!("{MINIMAL}\n[win_expectancy]\nscore_diff_cap = 0\n"));
        match load_config_from(tmp.path()).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "win_expectancy.score_diff_cap");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn shipped_config_is_valid() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let config = load_config_from(root).unwrap();
        assert!(config.data.park_aggregates.is_some());
    }
}
