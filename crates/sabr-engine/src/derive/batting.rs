// Batting derivations: slash line, wOBA, wRAA, wRC and wRC+.

use rayon::prelude::*;
use serde::Serialize;

use crate::constants::SeasonConstants;
use crate::context::StatContext;
use crate::counting::{ratio, BattingLine};
use crate::derive::park_multiplier;
use crate::error::Result;
use crate::ids::{PlayerId, TeamId};
use crate::park::ParkFactor;

/// Derived batting record. Rates are 0.0 when their denominator is zero;
/// `wrc_plus` is `None` without plate appearances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedBattingStats {
    pub player_id: PlayerId,
    pub team_id: Option<TeamId>,
    pub context: StatContext,
    /// The counting line the record was derived from.
    pub line: BattingLine,
    pub avg: f64,
    pub obp: f64,
    pub slg: f64,
    pub ops: f64,
    pub iso: f64,
    pub babip: f64,
    pub k_pct: f64,
    pub bb_pct: f64,
    pub woba: f64,
    pub wraa: f64,
    pub wrc: f64,
    pub wrc_plus: Option<f64>,
    /// Park multiplier applied (1.0 when not neutralized).
    pub park_multiplier: f64,
}

/// One entry of a batch derivation.
#[derive(Debug, Clone)]
pub struct BattingInput {
    pub player_id: PlayerId,
    pub team_id: Option<TeamId>,
    pub line: BattingLine,
    pub park: Option<ParkFactor>,
}

/// wOBA numerator / PA using the season's weights.
pub fn woba(line: &BattingLine, constants: &SeasonConstants) -> f64 {
    let w = &constants.woba;
    let numerator = w.w_bb * line.ubb() as f64
        + w.w_hbp * line.hbp as f64
        + w.w_1b * line.singles() as f64
        + w.w_2b * line.doubles as f64
        + w.w_3b * line.triples as f64
        + w.w_hr * line.hr as f64;
    ratio(numerator, line.pa as f64)
}

/// Runs from stolen bases and caught stealing at the season's run values.
pub fn stolen_base_runs(line: &BattingLine, constants: &SeasonConstants) -> f64 {
    line.sb as f64 * constants.woba.run_sb + line.cs as f64 * constants.woba.run_cs
}

pub fn derive_batting(
    player_id: PlayerId,
    team_id: Option<TeamId>,
    line: &BattingLine,
    context: &StatContext,
    constants: &SeasonConstants,
    park: Option<&ParkFactor>,
) -> Result<AdvancedBattingStats> {
    line.validate()?;
    let pf = park_multiplier(context, constants, park)?;

    let pa = line.pa as f64;
    let ab = line.ab as f64;
    let avg = ratio(line.h as f64, ab);
    let obp = ratio(
        line.h as f64 + line.bb as f64 + line.hbp as f64,
        line.ab as f64 + line.bb as f64 + line.hbp as f64 + line.sf as f64,
    );
    let slg = ratio(line.total_bases() as f64, ab);
    let babip_den = line.ab as i64 - line.so as i64 - line.hr as i64 + line.sf as i64;
    let babip = if babip_den > 0 {
        (line.h - line.hr) as f64 / babip_den as f64
    } else {
        0.0
    };

    let woba = woba(line, constants);
    let lg_woba = constants.league_woba();
    let scale = constants.woba.woba_scale;
    let lg_r_pa = constants.league_r_pa();
    let wraa = ratio(woba - lg_woba, scale) * pa;
    let wrc = (ratio(woba - lg_woba, scale) + lg_r_pa) * pa;
    let wrc_plus = if line.pa == 0 || lg_r_pa == 0.0 {
        None
    } else {
        let park_term = lg_r_pa - pf * lg_r_pa;
        Some(100.0 * ((wraa / pa + lg_r_pa) + park_term) / lg_r_pa)
    };

    Ok(AdvancedBattingStats {
        player_id,
        team_id,
        context: *context,
        line: *line,
        avg,
        obp,
        slg,
        ops: obp + slg,
        iso: slg - avg,
        babip,
        k_pct: ratio(line.so as f64, pa),
        bb_pct: ratio(line.bb as f64, pa),
        woba,
        wraa,
        wrc,
        wrc_plus,
        park_multiplier: pf,
    })
}

/// Derive many players in parallel; output order matches input order and the
/// first failure aborts the batch.
pub fn derive_batting_batch(
    inputs: &[BattingInput],
    context: &StatContext,
    constants: &SeasonConstants,
) -> Result<Vec<AdvancedBattingStats>> {
    inputs
        .par_iter()
        .map(|input| {
            derive_batting(
                input.player_id.clone(),
                input.team_id.clone(),
                &input.line,
                context,
                constants,
                input.park.as_ref(),
            )
        })
        .collect()
}
