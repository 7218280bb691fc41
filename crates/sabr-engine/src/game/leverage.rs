// Sequential game-state reconstruction from play-by-play, producing
// win-probability curves and per-event leverage.
//
// Events are folded forward; each event's "before" state is exactly the
// previous event's "after" state (rolled over at half-inning boundaries).
// Any inconsistency aborts the whole game.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::game::state::{Bases, GameState, Half, Resolved};
use crate::game::win_expectancy::WinExpectancyModel;
use crate::ids::PlayerId;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One play-by-play event, carrying the game state AFTER the play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub event_index: u32,
    pub inning: u8,
    pub half: Half,
    pub home_score: u32,
    pub away_score: u32,
    pub outs: u8,
    pub bases: Bases,
    #[serde(default)]
    pub batter: Option<PlayerId>,
    #[serde(default)]
    pub pitcher: Option<PlayerId>,
    #[serde(default)]
    pub description: String,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinProbabilityPoint {
    pub event_index: u32,
    pub inning: u8,
    pub half: Half,
    pub home_win_prob: f64,
    pub away_win_prob: f64,
    /// WE(after) - WE(before), home perspective.
    pub we_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinProbabilityCurve {
    pub season: u16,
    /// Home-win probability before the first event.
    pub start_home_win_prob: f64,
    pub points: Vec<WinProbabilityPoint>,
}

impl WinProbabilityCurve {
    pub fn final_home_win_prob(&self) -> f64 {
        self.points
            .last()
            .map_or(self.start_home_win_prob, |p| p.home_win_prob)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateAppearanceLeverage {
    pub event_index: u32,
    pub state_before: GameState,
    pub we_before: f64,
    pub we_after: f64,
    pub we_change: f64,
    pub leverage_index: f64,
    pub batter: Option<PlayerId>,
    pub pitcher: Option<PlayerId>,
    pub description: String,
}

/// Mean potential WE swing across a season's state distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSwing {
    pub season: u16,
    pub mean_abs_swing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WpaRole {
    Batter,
    Pitcher,
}

/// Win probability added, summed per player and role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WpaLine {
    pub player: PlayerId,
    pub role: WpaRole,
    pub wpa: f64,
    pub events: u32,
}

// ---------------------------------------------------------------------------
// Plate-appearance outcomes for the potential-swing model
// ---------------------------------------------------------------------------

/// League frequency of each plate-appearance outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeFrequencies {
    pub out: f64,
    pub walk: f64,
    pub single: f64,
    pub double: f64,
    pub triple: f64,
    pub home_run: f64,
}

impl Default for OutcomeFrequencies {
    fn default() -> Self {
        Self {
            out: 0.68,
            walk: 0.09,
            single: 0.15,
            double: 0.045,
            triple: 0.005,
            home_run: 0.03,
        }
    }
}

impl OutcomeFrequencies {
    fn weighted(&self) -> [(PaOutcome, f64); 6] {
        [
            (PaOutcome::Out, self.out),
            (PaOutcome::Walk, self.walk),
            (PaOutcome::Single, self.single),
            (PaOutcome::Double, self.double),
            (PaOutcome::Triple, self.triple),
            (PaOutcome::HomeRun, self.home_run),
        ]
    }

    pub fn total(&self) -> f64 {
        self.weighted().iter().map(|(_, p)| p).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.weighted().iter().any(|(_, p)| !p.is_finite() || *p < 0.0) {
            return Err(EngineError::InvalidContext(
                "outcome frequencies must be finite and non-negative".into(),
            ));
        }
        if self.total() <= 0.0 {
            return Err(EngineError::InvalidContext(
                "outcome frequencies must not all be zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaOutcome {
    Out,
    Walk,
    Single,
    Double,
    Triple,
    HomeRun,
}

/// Deterministic base/out/score transition for an outcome class.
fn apply_outcome(state: &GameState, outcome: PaOutcome) -> GameState {
    let b = state.bases;
    let (bases, outs, runs) = match outcome {
        PaOutcome::Out => (b, state.outs + 1, 0),
        PaOutcome::Walk => (
            Bases {
                first: true,
                second: b.second || b.first,
                third: b.third || (b.first && b.second),
            },
            state.outs,
            (b.first && b.second && b.third) as i32,
        ),
        PaOutcome::Single => (
            Bases {
                first: true,
                second: b.first,
                third: false,
            },
            state.outs,
            b.second as i32 + b.third as i32,
        ),
        PaOutcome::Double => (
            Bases {
                first: false,
                second: true,
                third: b.first,
            },
            state.outs,
            b.second as i32 + b.third as i32,
        ),
        PaOutcome::Triple => (
            Bases {
                first: false,
                second: false,
                third: true,
            },
            state.outs,
            b.runners() as i32,
        ),
        PaOutcome::HomeRun => (Bases::EMPTY, state.outs, b.runners() as i32 + 1),
    };
    let signed = if state.home_batting() { runs } else { -runs };
    GameState {
        bases,
        outs,
        score_diff: state.score_diff + signed,
        ..*state
    }
}

// ---------------------------------------------------------------------------
// Forward walk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Transition {
    before: GameState,
    after: GameState,
}

/// Running state carried through the fold.
#[derive(Debug, Clone, Copy)]
struct GameTracker {
    last: GameState,
    home_score: u32,
    away_score: u32,
    last_index: Option<u32>,
}

impl GameTracker {
    fn new() -> Self {
        Self {
            last: GameState::first_pitch(),
            home_score: 0,
            away_score: 0,
            last_index: None,
        }
    }

    fn advance(&mut self, ev: &PlayEvent) -> Result<Transition> {
        let idx = ev.event_index;
        if let Some(prev) = self.last_index {
            if idx <= prev {
                return Err(EngineError::malformed(
                    idx,
                    format!("event index {idx} does not follow {prev}"),
                ));
            }
        }
        let before = match self.last.resolve() {
            Resolved::Live(s) => s,
            Resolved::Final { .. } => {
                return Err(EngineError::malformed(idx, "event after the game was decided"));
            }
        };
        if ev.inning != before.inning || ev.half != before.half {
            return Err(EngineError::malformed(
                idx,
                format!(
                    "expected {:?} {} but event is {:?} {}",
                    before.half, before.inning, ev.half, ev.inning
                ),
            ));
        }
        if ev.outs > 3 {
            return Err(EngineError::malformed(idx, format!("{} outs", ev.outs)));
        }
        if ev.outs < before.outs {
            return Err(EngineError::malformed(
                idx,
                format!("outs went backward from {} to {}", before.outs, ev.outs),
            ));
        }
        if ev.home_score < self.home_score || ev.away_score < self.away_score {
            return Err(EngineError::malformed(idx, "score decreased"));
        }
        let fielding_scored = match before.half {
            Half::Top => ev.home_score != self.home_score,
            Half::Bottom => ev.away_score != self.away_score,
        };
        if fielding_scored {
            return Err(EngineError::malformed(idx, "fielding team scored"));
        }

        let after = GameState {
            inning: ev.inning,
            half: ev.half,
            outs: ev.outs,
            bases: if ev.outs == 3 { Bases::EMPTY } else { ev.bases },
            score_diff: ev.home_score as i32 - ev.away_score as i32,
        };
        self.last = after;
        self.home_score = ev.home_score;
        self.away_score = ev.away_score;
        self.last_index = Some(idx);
        Ok(Transition { before, after })
    }
}

fn walk(events: &[PlayEvent]) -> Result<Vec<Transition>> {
    events
        .iter()
        .try_fold(
            (GameTracker::new(), Vec::with_capacity(events.len())),
            |(mut tracker, mut out), ev| -> Result<(GameTracker, Vec<Transition>)> {
                out.push(tracker.advance(ev)?);
                Ok((tracker, out))
            },
        )
        .map(|(_, transitions)| transitions)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds curves and leverage for games of one season against a shared,
/// read-only win-expectancy model.
#[derive(Debug, Clone)]
pub struct LeverageCurveBuilder<'a> {
    model: &'a WinExpectancyModel,
    season: u16,
    frequencies: OutcomeFrequencies,
    reference: Option<ReferenceSwing>,
}

impl<'a> LeverageCurveBuilder<'a> {
    pub fn new(model: &'a WinExpectancyModel, season: u16, frequencies: OutcomeFrequencies) -> Result<Self> {
        frequencies.validate()?;
        Ok(Self {
            model,
            season,
            frequencies,
            reference: None,
        })
    }

    /// Attach the season's precomputed reference swing.
    pub fn with_reference(mut self, reference: ReferenceSwing) -> Result<Self> {
        if reference.season != self.season {
            return Err(EngineError::InvalidContext(format!(
                "reference swing for {} used with season {}",
                reference.season, self.season
            )));
        }
        if !(reference.mean_abs_swing > 0.0) {
            return Err(EngineError::InvalidContext(format!(
                "reference swing must be positive, got {}",
                reference.mean_abs_swing
            )));
        }
        self.reference = Some(reference);
        Ok(self)
    }

    pub fn season(&self) -> u16 {
        self.season
    }

    /// Expected magnitude of the WE swing from `state` over one plate
    /// appearance.
    pub fn potential_swing(&self, state: &GameState) -> Result<f64> {
        let here = self.model.home_win_prob(state, self.season)?;
        let total = self.frequencies.total();
        let mut swing = 0.0;
        for (outcome, p) in self.frequencies.weighted() {
            if p == 0.0 {
                continue;
            }
            let next = apply_outcome(state, outcome);
            let there = self.model.home_win_prob(&next, self.season)?;
            swing += p / total * (there - here).abs();
        }
        Ok(swing)
    }

    /// Mean potential swing over a distribution of states. Callers compute
    /// this once per season and attach it with `with_reference`.
    pub fn reference_swing(&self, states: &[GameState]) -> Result<ReferenceSwing> {
        if states.is_empty() {
            return Err(EngineError::insufficient("no states for reference swing"));
        }
        let mut total = 0.0;
        for s in states {
            total += self.potential_swing(s)?;
        }
        let reference = ReferenceSwing {
            season: self.season,
            mean_abs_swing: total / states.len() as f64,
        };
        debug!(season = self.season, states = states.len(), mean = reference.mean_abs_swing, "reference swing computed");
        Ok(reference)
    }

    /// Reference swing over every pre-event state observed in a season's
    /// games.
    pub fn reference_swing_from_games(&self, games: &[Vec<PlayEvent>]) -> Result<ReferenceSwing> {
        let mut states = Vec::new();
        for game in games {
            states.extend(walk(game)?.into_iter().map(|t| t.before));
        }
        self.reference_swing(&states)
    }

    /// LI = potential swing / season reference swing.
    pub fn leverage_index(&self, state: &GameState) -> Result<f64> {
        let reference = self.reference.ok_or_else(|| {
            EngineError::InvalidContext("leverage requires a reference swing".into())
        })?;
        Ok(self.potential_swing(state)? / reference.mean_abs_swing)
    }

    pub fn build_curve(&self, events: &[PlayEvent]) -> Result<WinProbabilityCurve> {
        let transitions = walk(events)?;
        let start = self
            .model
            .home_win_prob(&GameState::first_pitch(), self.season)?;
        let states: Vec<GameState> = transitions.iter().map(|t| t.after).collect();
        let after = self.model.batch_get_for_season(&states, self.season)?;

        let mut prev = start;
        let points = events
            .iter()
            .zip(after)
            .map(|(ev, we)| {
                let point = WinProbabilityPoint {
                    event_index: ev.event_index,
                    inning: ev.inning,
                    half: ev.half,
                    home_win_prob: we.home_win_prob,
                    away_win_prob: we.away_win_prob(),
                    we_change: we.home_win_prob - prev,
                };
                prev = we.home_win_prob;
                point
            })
            .collect();
        Ok(WinProbabilityCurve {
            season: self.season,
            start_home_win_prob: start,
            points,
        })
    }

    pub fn build_leverages(&self, events: &[PlayEvent]) -> Result<Vec<PlateAppearanceLeverage>> {
        if self.reference.is_none() {
            return Err(EngineError::InvalidContext(
                "leverage requires a reference swing".into(),
            ));
        }
        let transitions = walk(events)?;
        events
            .iter()
            .zip(transitions)
            .map(|(ev, t)| {
                let we_before = self.model.home_win_prob(&t.before, self.season)?;
                let we_after = self.model.home_win_prob(&t.after, self.season)?;
                Ok(PlateAppearanceLeverage {
                    event_index: ev.event_index,
                    state_before: t.before,
                    we_before,
                    we_after,
                    we_change: we_after - we_before,
                    leverage_index: self.leverage_index(&t.before)?,
                    batter: ev.batter.clone(),
                    pitcher: ev.pitcher.clone(),
                    description: ev.description.clone(),
                })
            })
            .collect()
    }
}

/// Sum WE change per batter and pitcher from the perspective of each
/// player's own team.
pub fn win_probability_added(leverages: &[PlateAppearanceLeverage]) -> Vec<WpaLine> {
    let mut totals: BTreeMap<(PlayerId, WpaRole), (f64, u32)> = BTreeMap::new();
    for pa in leverages {
        let batting_gain = if pa.state_before.home_batting() {
            pa.we_change
        } else {
            -pa.we_change
        };
        if let Some(batter) = &pa.batter {
            let entry = totals.entry((batter.clone(), WpaRole::Batter)).or_default();
            entry.0 += batting_gain;
            entry.1 += 1;
        }
        if let Some(pitcher) = &pa.pitcher {
            let entry = totals.entry((pitcher.clone(), WpaRole::Pitcher)).or_default();
            entry.0 -= batting_gain;
            entry.1 += 1;
        }
    }
    totals
        .into_iter()
        .map(|((player, role), (wpa, events))| WpaLine {
            player,
            role,
            wpa,
            events,
        })
        .collect()
}
