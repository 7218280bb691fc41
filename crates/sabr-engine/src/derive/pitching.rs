// Pitching derivations: ERA, WHIP, FIP, xFIP and the league-relative
// indices. ERA+ is "higher is better"; ERA- and FIP- are "lower is better"
// and carry the park term with the opposite sign.

use rayon::prelude::*;
use serde::Serialize;

use crate::constants::SeasonConstants;
use crate::context::StatContext;
use crate::counting::{ratio, PitchingLine};
use crate::derive::park_multiplier;
use crate::error::Result;
use crate::ids::{PlayerId, TeamId};
use crate::park::ParkFactor;

/// Derived pitching record. Rates are 0.0 with zero innings; league-relative
/// indices are `None` when undefined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedPitchingStats {
    pub player_id: PlayerId,
    pub team_id: Option<TeamId>,
    pub context: StatContext,
    pub line: PitchingLine,
    pub ip: f64,
    pub era: f64,
    pub ra9: f64,
    pub whip: f64,
    pub fip: f64,
    /// Requires fly balls on the line.
    pub xfip: Option<f64>,
    pub k_per_9: f64,
    pub bb_per_9: f64,
    pub hr_per_9: f64,
    pub k_pct: f64,
    pub bb_pct: f64,
    pub babip: f64,
    pub era_plus: Option<f64>,
    pub era_minus: Option<f64>,
    pub fip_minus: Option<f64>,
    pub park_multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct PitchingInput {
    pub player_id: PlayerId,
    pub team_id: Option<TeamId>,
    pub line: PitchingLine,
    pub park: Option<ParkFactor>,
}

/// FIP core `(13*HR + 3*(BB+HBP) - 2*SO) / IP`, without the constant.
fn fip_core(hr: f64, bb_hbp: f64, so: f64, ip: f64) -> f64 {
    ratio(13.0 * hr + 3.0 * bb_hbp - 2.0 * so, ip)
}

pub fn derive_pitching(
    player_id: PlayerId,
    team_id: Option<TeamId>,
    line: &PitchingLine,
    context: &StatContext,
    constants: &SeasonConstants,
    park: Option<&ParkFactor>,
) -> Result<AdvancedPitchingStats> {
    line.validate()?;
    let pf = park_multiplier(context, constants, park)?;

    let ip = line.innings();
    let per9 = |n: u32| ratio(9.0 * n as f64, ip);
    let era = per9(line.er);
    let ra9 = per9(line.r);
    let whip = ratio(line.bb as f64 + line.h as f64, ip);
    let bb_hbp = line.bb as f64 + line.hbp as f64;
    let cfip = constants.woba.cfip;

    let (fip, xfip) = if line.outs == 0 {
        (0.0, None)
    } else {
        let fip = fip_core(line.hr as f64, bb_hbp, line.so as f64, ip) + cfip;
        let xfip = line.fb.map(|fb| {
            let expected_hr = fb as f64 * constants.league_hr_fb();
            fip_core(expected_hr, bb_hbp, line.so as f64, ip) + cfip
        });
        (fip, xfip)
    };

    let bip = line.bf as i64 - line.so as i64 - line.bb as i64 - line.hbp as i64 - line.hr as i64;
    let babip = if bip > 0 {
        (line.h - line.hr) as f64 / bip as f64
    } else {
        0.0
    };

    let lg_era = constants.league_era();
    let lg_fip = constants.league_fip();
    let pitched = line.outs > 0;
    let era_plus = (pitched && era > 0.0).then(|| 100.0 * (lg_era * pf) / era);
    let era_minus = (pitched && lg_era > 0.0).then(|| 100.0 * (era + (era - era * pf)) / lg_era);
    let fip_minus = (pitched && lg_fip > 0.0).then(|| 100.0 * (fip + (fip - fip * pf)) / lg_fip);

    Ok(AdvancedPitchingStats {
        player_id,
        team_id,
        context: *context,
        line: *line,
        ip,
        era,
        ra9,
        whip,
        fip,
        xfip,
        k_per_9: per9(line.so),
        bb_per_9: per9(line.bb),
        hr_per_9: per9(line.hr),
        k_pct: ratio(line.so as f64, line.bf as f64),
        bb_pct: ratio(line.bb as f64, line.bf as f64),
        babip,
        era_plus,
        era_minus,
        fip_minus,
        park_multiplier: pf,
    })
}

pub fn derive_pitching_batch(
    inputs: &[PitchingInput],
    context: &StatContext,
    constants: &SeasonConstants,
) -> Result<Vec<AdvancedPitchingStats>> {
    inputs
        .par_iter()
        .map(|input| {
            derive_pitching(
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::tests::sample_woba;
    use crate::ids::ParkId;
    use crate::park::ComponentFactors;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn constants() -> SeasonConstants {
        SeasonConstants {
            woba: sample_woba(2019),
            league: None,
        }
    }

    /// 200 IP ace.
    fn ace() -> PitchingLine {
        PitchingLine {
            outs: 600,
            bf: 800,
            h: 160,
            r: 65,
            er: 60,
            hr: 20,
            bb: 45,
            ibb: 2,
            hbp: 5,
            so: 240,
            fb: Some(150),
        }
    }

    fn park(overall: f64) -> ParkFactor {
        ParkFactor {
            park_id: ParkId::new("SDP"),
            season: 2019,
            from_season: 2019,
            to_season: 2019,
            games_sampled: 81,
            components: ComponentFactors {
                runs: overall,
                ..Default::default()
            },
            one_year: overall,
            three_year: None,
            five_year: None,
        }
    }

    fn derive(line: &PitchingLine, ctx: &StatContext, pf: Option<&ParkFactor>) -> AdvancedPitchingStats {
        derive_pitching(PlayerId::new("p"), None, line, ctx, &constants(), pf).unwrap()
    }

    #[test]
    fn basic_rates() {
        let s = derive(&ace(), &StatContext::season(2019), None);
        assert!(approx_eq(s.ip, 200.0, 1e-12));
        // 9 * 60 / 200
        assert!(approx_eq(s.era, 2.7, 1e-12));
        assert!(approx_eq(s.ra9, 2.925, 1e-12));
        // (45 + 160) / 200
        assert!(approx_eq(s.whip, 1.025, 1e-12));
        assert!(approx_eq(s.k_per_9, 10.8, 1e-12));
        assert!(approx_eq(s.k_pct, 0.3, 1e-12));
    }

    #[test]
    fn fip_and_xfip() {
        let s = derive(&ace(), &StatContext::season(2019), None);
        // (13*20 + 3*50 - 2*240) / 200 + 3.214 = (260 + 150 - 480) / 200 + 3.214
        assert!(approx_eq(s.fip, -70.0 / 200.0 + 3.214, 1e-12));
        // expected HR = 150 * .153 = 22.95
        let xfip = (13.0 * 22.95 + 150.0 - 480.0) / 200.0 + 3.214;
        assert!(approx_eq(s.xfip.unwrap(), xfip, 1e-12));
    }

    #[test]
    fn xfip_absent_without_fly_balls() {
        let line = PitchingLine { fb: None, ..ace() };
        assert_eq!(derive(&line, &StatContext::season(2019), None).xfip, None);
    }

    #[test]
    fn era_plus_and_minus_point_in_opposite_directions() {
        let s = derive(&ace(), &StatContext::season(2019), None);
        // 100 * 4.51 / 2.7
        assert!(approx_eq(s.era_plus.unwrap(), 167.037_037, 1e-5));
        // 100 * 2.7 / 4.51
        assert!(approx_eq(s.era_minus.unwrap(), 59.866_962, 1e-5));
        assert!(s.era_plus.unwrap() > 100.0);
        assert!(s.era_minus.unwrap() < 100.0);
        assert!(s.fip_minus.unwrap() < 100.0);
    }

    #[test]
    fn pitcher_park_penalizes_neutralized_indices() {
        let ctx = StatContext::season(2019).park_neutralized().unwrap();
        let raw = derive(&ace(), &StatContext::season(2019), None);
        let petco = derive(&ace(), &ctx, Some(&park(90.0)));
        // Pitcher's park: ERA+ falls, ERA-/FIP- rise.
        assert!(petco.era_plus.unwrap() < raw.era_plus.unwrap());
        assert!(petco.era_minus.unwrap() > raw.era_minus.unwrap());
        assert!(petco.fip_minus.unwrap() > raw.fip_minus.unwrap());
        // ERA- with PF .90: 100 * (2.7 + 0.27) / 4.51
        assert!(approx_eq(petco.era_minus.unwrap(), 100.0 * 2.97 / 4.51, 1e-9));
    }

    #[test]
    fn zero_innings_yield_sentinels() {
        let line = PitchingLine {
            bf: 3,
            h: 2,
            r: 2,
            er: 2,
            bb: 1,
            ..Default::default()
        };
        let s = derive(&line, &StatContext::season(2019), None);
        assert_eq!(s.era, 0.0);
        assert_eq!(s.whip, 0.0);
        assert_eq!(s.fip, 0.0);
        assert_eq!(s.era_plus, None);
        assert_eq!(s.era_minus, None);
        assert_eq!(s.fip_minus, None);
    }

    #[test]
    fn perfect_era_has_no_era_plus() {
        let line = PitchingLine {
            outs: 27,
            bf: 27,
            so: 10,
            ..Default::default()
        };
        let s = derive(&line, &StatContext::season(2019), None);
        assert_eq!(s.era, 0.0);
        assert_eq!(s.era_plus, None);
        assert_eq!(s.era_minus, Some(0.0));
    }

    #[test]
    fn babip_against() {
        let s = derive(&ace(), &StatContext::season(2019), None);
        // (160 - 20) / (800 - 240 - 45 - 5 - 20) = 140 / 490
        assert!(approx_eq(s.babip, 140.0 / 490.0, 1e-12));
    }

    #[test]
    fn batch_matches_single() {
        let ctx = StatContext::season(2019);
        let inputs: Vec<PitchingInput> = (1..=8u32)
            .map(|i| PitchingInput {
                player_id: PlayerId::new(format!("p{i}")),
                team_id: None,
                line: PitchingLine {
                    outs: 30 * i,
                    bf: 45 * i,
                    h: 9 * i,
                    r: 4 * i,
                    er: 3 * i,
                    hr: i,
                    bb: 3 * i,
                    so: 10 * i,
                    ..Default::default()
                },
                park: None,
            })
            .collect();
        let batch = derive_pitching_batch(&inputs, &ctx, &constants()).unwrap();
        for (input, out) in inputs.iter().zip(&batch) {
            assert_eq!(out, &derive(&input.line, &ctx, None).with_id(&input.player_id));
        }
    }

    impl AdvancedPitchingStats {
        fn with_id(mut self, id: &PlayerId) -> Self {
            self.player_id = id.clone();
            self
        }
    }
}
