// WAR aggregation: independently computed run components divided by runs
// per win, with a provider-selected pitcher branch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::SeasonConstants;
use crate::context::StatProvider;
use crate::derive::batting::AdvancedBattingStats;
use crate::derive::pitching::AdvancedPitchingStats;
use crate::error::{EngineError, Result};

/// Innings in a full defensive season; positional adjustments are quoted
/// per this many innings.
pub const FULL_SEASON_INNINGS: f64 = 1458.0;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Defensive positions that carry a positional adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    LeftField,
    CenterField,
    RightField,
    DesignatedHitter,
    Pitcher,
}

impl Position {
    /// Parse scorebook abbreviations ("C", "1B", "SS", "DH", "P", ...).
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" => Some(Position::Catcher),
            "1B" => Some(Position::FirstBase),
            "2B" => Some(Position::SecondBase),
            "3B" => Some(Position::ThirdBase),
            "SS" => Some(Position::ShortStop),
            "LF" => Some(Position::LeftField),
            "CF" => Some(Position::CenterField),
            "RF" => Some(Position::RightField),
            "DH" => Some(Position::DesignatedHitter),
            "P" | "SP" | "RP" => Some(Position::Pitcher),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Catcher => "C",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::ShortStop => "SS",
            Position::LeftField => "LF",
            Position::CenterField => "CF",
            Position::RightField => "RF",
            Position::DesignatedHitter => "DH",
            Position::Pitcher => "P",
        }
    }

    /// Positional adjustment in runs per full season.
    pub fn runs_per_season(&self) -> f64 {
        match self {
            Position::Catcher => 12.5,
            Position::ShortStop => 7.5,
            Position::SecondBase | Position::ThirdBase | Position::CenterField => 2.5,
            Position::LeftField | Position::RightField => -7.5,
            Position::FirstBase => -12.5,
            Position::DesignatedHitter => -17.5,
            Position::Pitcher => 0.0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarComponent {
    Batting,
    Baserunning,
    Fielding,
    Positional,
    LeagueAdjustment,
    Replacement,
    Pitching,
}

/// Run values for each component. `None` means "not computed", which is
/// distinct from a computed zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarComponents {
    pub batting: Option<f64>,
    pub baserunning: Option<f64>,
    pub fielding: Option<f64>,
    pub positional: Option<f64>,
    pub league_adjustment: Option<f64>,
    pub replacement: Option<f64>,
    pub pitching: Option<f64>,
}

impl WarComponents {
    fn entries(&self) -> [(WarComponent, Option<f64>); 7] {
        [
            (WarComponent::Batting, self.batting),
            (WarComponent::Baserunning, self.baserunning),
            (WarComponent::Fielding, self.fielding),
            (WarComponent::Positional, self.positional),
            (WarComponent::LeagueAdjustment, self.league_adjustment),
            (WarComponent::Replacement, self.replacement),
            (WarComponent::Pitching, self.pitching),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerWarSummary {
    pub provider: StatProvider,
    pub components: WarComponents,
    /// Components that were supplied, in fixed order.
    pub present: Vec<WarComponent>,
    pub total_runs: f64,
    pub runs_per_win: f64,
    pub war: f64,
}

impl PlayerWarSummary {
    pub fn has(&self, component: WarComponent) -> bool {
        self.present.contains(&component)
    }
}

/// Replacement-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplacementLevel {
    /// Runs a replacement-level hitter gives up per 600 PA.
    pub hitter_runs_per_600_pa: f64,
    /// How many runs per nine a replacement pitcher allows above average.
    pub pitcher_ra9_margin: f64,
}

impl Default for ReplacementLevel {
    fn default() -> Self {
        Self {
            hitter_runs_per_600_pa: 20.0,
            pitcher_ra9_margin: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// WAR = sum of present components / runs per win. Missing components count
/// as zero and are left out of `present`.
pub fn aggregate(
    components: WarComponents,
    runs_per_win: f64,
    provider: StatProvider,
) -> Result<PlayerWarSummary> {
    if !(runs_per_win > 0.0) || !runs_per_win.is_finite() {
        return Err(EngineError::InvalidContext(format!(
            "runs per win must be positive, got {runs_per_win}"
        )));
    }
    let mut present = Vec::new();
    let mut total_runs = 0.0;
    for (component, value) in components.entries() {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(EngineError::InvalidContext(format!(
                    "{component:?} run value is not finite"
                )));
            }
            present.push(component);
            total_runs += v;
        }
    }
    Ok(PlayerWarSummary {
        provider,
        components,
        present,
        total_runs,
        runs_per_win,
        war: total_runs / runs_per_win,
    })
}

/// Replacement runs credited for `pa` plate appearances.
pub fn replacement_runs(pa: u32, level: &ReplacementLevel) -> f64 {
    level.hitter_runs_per_600_pa * pa as f64 / 600.0
}

/// Positional adjustment pro-rated by innings played.
pub fn positional_runs(position: Position, innings: f64) -> f64 {
    position.runs_per_season() * innings / FULL_SEASON_INNINGS
}

/// Batting runs: wRAA plus the park term when the record was neutralized.
pub fn batting_runs(stats: &AdvancedBattingStats, constants: &SeasonConstants) -> f64 {
    let lg_r_pa = constants.league_r_pa();
    let park_term = (lg_r_pa - stats.park_multiplier * lg_r_pa) * stats.line.pa as f64;
    stats.wraa + park_term
}

/// Non-batting inputs to a position player's WAR.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HitterExtras {
    pub baserunning: Option<f64>,
    pub fielding: Option<f64>,
    /// Primary position and defensive innings there.
    pub position: Option<(Position, f64)>,
    pub league_adjustment: Option<f64>,
}

pub fn hitter_war(
    stats: &AdvancedBattingStats,
    constants: &SeasonConstants,
    extras: HitterExtras,
    level: &ReplacementLevel,
) -> Result<PlayerWarSummary> {
    let components = WarComponents {
        batting: Some(batting_runs(stats, constants)),
        baserunning: extras.baserunning,
        fielding: extras.fielding,
        positional: extras.position.map(|(pos, inn)| positional_runs(pos, inn)),
        league_adjustment: extras.league_adjustment,
        replacement: Some(replacement_runs(stats.line.pa, level)),
        pitching: None,
    };
    aggregate(components, constants.runs_per_win(), stats.context.provider())
}

/// Pitcher WAR. FanGraphs values the pitcher on FIP scaled to RA9;
/// Baseball-Reference on actual runs allowed per nine.
pub fn pitcher_war(
    stats: &AdvancedPitchingStats,
    constants: &SeasonConstants,
    level: &ReplacementLevel,
    provider: StatProvider,
) -> Result<PlayerWarSummary> {
    let lg_ra9 = constants.league_ra9();
    let ra9_equiv = match provider {
        StatProvider::FanGraphs => stats.fip + (lg_ra9 - constants.league_era()),
        StatProvider::BaseballReference => stats.ra9,
        StatProvider::Unadjusted => {
            return Err(EngineError::InvalidContext(
                "pitcher WAR needs a FanGraphs or Baseball-Reference provider".into(),
            ));
        }
    };
    let neutral_ra9 = ra9_equiv / stats.park_multiplier;
    let innings = stats.ip;
    let components = WarComponents {
        pitching: Some((lg_ra9 - neutral_ra9) * innings / 9.0),
        replacement: Some(level.pitcher_ra9_margin * innings / 9.0),
        ..Default::default()
    };
    aggregate(components, constants.runs_per_win(), provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::tests::sample_woba;
    use crate::context::StatContext;
    use crate::counting::{BattingLine, PitchingLine};
    use crate::derive::batting::derive_batting;
    use crate::derive::pitching::derive_pitching;
    use crate::ids::PlayerId;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn constants() -> SeasonConstants {
        SeasonConstants {
            woba: sample_woba(2019),
            league: None,
        }
    }

    #[test]
    fn war_is_sum_over_runs_per_win() {
        let components = WarComponents {
            batting: Some(30.0),
            baserunning: Some(2.0),
            fielding: Some(-4.0),
            positional: Some(7.5),
            league_adjustment: Some(1.5),
            replacement: Some(20.0),
            pitching: None,
        };
        let s = aggregate(components, 10.0, StatProvider::FanGraphs).unwrap();
        assert!(approx_eq(s.total_runs, 57.0, 1e-12));
        assert!(approx_eq(s.war, 5.7, 1e-12));
        assert_eq!(s.present.len(), 6);
        assert!(!s.has(WarComponent::Pitching));
    }

    #[test]
    fn missing_components_count_as_zero_but_are_reported() {
        let components = WarComponents {
            batting: Some(10.0),
            fielding: Some(0.0),
            ..Default::default()
        };
        let s = aggregate(components, 10.0, StatProvider::FanGraphs).unwrap();
        assert!(approx_eq(s.war, 1.0, 1e-12));
        assert!(s.has(WarComponent::Fielding));
        assert!(!s.has(WarComponent::Baserunning));
        assert_eq!(s.present, vec![WarComponent::Batting, WarComponent::Fielding]);
    }

    #[test]
    fn non_positive_runs_per_win_is_invalid() {
        assert!(aggregate(WarComponents::default(), 0.0, StatProvider::FanGraphs).is_err());
        assert!(aggregate(WarComponents::default(), -9.0, StatProvider::FanGraphs).is_err());
        assert!(aggregate(WarComponents::default(), f64::NAN, StatProvider::FanGraphs).is_err());
    }

    #[test]
    fn positional_adjustment_prorates() {
        assert!(approx_eq(positional_runs(Position::Catcher, 1458.0), 12.5, 1e-12));
        assert!(approx_eq(positional_runs(Position::ShortStop, 729.0), 3.75, 1e-12));
        assert!(positional_runs(Position::DesignatedHitter, 100.0) < 0.0);
        assert_eq!(Position::from_str_pos("ss"), Some(Position::ShortStop));
        assert_eq!(Position::from_str_pos("OF"), None);
    }

    #[test]
    fn replacement_runs_scale_with_pa() {
        assert!(approx_eq(replacement_runs(600, &ReplacementLevel::default()), 20.0, 1e-12));
        assert!(approx_eq(replacement_runs(300, &ReplacementLevel::default()), 10.0, 1e-12));
    }

    #[test]
    fn league_average_regular_is_about_two_wins() {
        let line = BattingLine {
            pa: 600,
            ab: 540,
            h: 140,
            doubles: 28,
            triples: 2,
            hr: 18,
            bb: 50,
            ibb: 2,
            hbp: 6,
            sf: 4,
            so: 130,
            ..Default::default()
        };
        let mut c = constants();
        c.woba.woba = crate::derive::batting::woba(&line, &c);
        let stats = derive_batting(PlayerId::new("avg"), None, &line, &StatContext::season(2019), &c, None).unwrap();
        let s = hitter_war(&stats, &c, HitterExtras::default(), &ReplacementLevel::default()).unwrap();
        // 0 batting runs + 20 replacement runs over 10.296 runs per win.
        assert!(approx_eq(s.war, 20.0 / 10.296, 1e-9));
    }

    fn starter() -> PitchingLine {
        PitchingLine {
            outs: 540,
            bf: 760,
            h: 170,
            r: 80,
            er: 72,
            hr: 22,
            bb: 50,
            hbp: 6,
            so: 190,
            ..Default::default()
        }
    }

    #[test]
    fn providers_value_pitchers_differently() {
        let stats = derive_pitching(PlayerId::new("sp"), None, &starter(), &StatContext::season(2019), &constants(), None).unwrap();
        let fg = pitcher_war(&stats, &constants(), &ReplacementLevel::default(), StatProvider::FanGraphs).unwrap();
        let br = pitcher_war(&stats, &constants(), &ReplacementLevel::default(), StatProvider::BaseballReference).unwrap();
        assert_ne!(fg.war, br.war);

        // BBRef: RA9 = 9 * 80 / 180 = 4.0; (4.83 - 4.0) * 20 + 1.0 * 20 = 36.6 runs
        assert!(approx_eq(br.total_runs, 36.6, 1e-9));
        assert!(br.has(WarComponent::Pitching));
        assert!(br.has(WarComponent::Replacement));
        assert!(!br.has(WarComponent::Batting));
    }

    #[test]
    fn unadjusted_provider_cannot_value_pitchers() {
        let stats = derive_pitching(PlayerId::new("sp"), None, &starter(), &StatContext::season(2019), &constants(), None).unwrap();
        assert!(pitcher_war(&stats, &constants(), &ReplacementLevel::default(), StatProvider::Unadjusted).is_err());
    }

    #[test]
    fn war_is_recomputed_identically() {
        let stats = derive_pitching(PlayerId::new("sp"), None, &starter(), &StatContext::season(2019), &constants(), None).unwrap();
        let a = pitcher_war(&stats, &constants(), &ReplacementLevel::default(), StatProvider::FanGraphs).unwrap();
        let b = pitcher_war(&stats, &constants(), &ReplacementLevel::default(), StatProvider::FanGraphs).unwrap();
        assert_eq!(a.war.to_bits(), b.war.to_bits());
    }
}
