// Derivation engines: counting lines + constants (+ park) -> advanced stats,
// and the WAR aggregation built on top of them.

pub mod batting;
pub mod pitching;
pub mod war;

use tracing::debug;

use crate::constants::SeasonConstants;
use crate::context::StatContext;
use crate::error::{EngineError, Result};
use crate::park::ParkFactor;

/// Check that the context, constants and park factor agree, and return the
/// park multiplier to neutralize with (1.0 when not neutralizing).
pub(crate) fn park_multiplier(
    context: &StatContext,
    constants: &SeasonConstants,
    park: Option<&ParkFactor>,
) -> Result<f64> {
    if !context.is_career() && constants.season() != context.season_value() {
        return Err(EngineError::InvalidContext(format!(
            "constants for {} used with a {} context",
            constants.season(),
            context.season_value()
        )));
    }
    if let Some(league) = constants.league.map(|l| l.league) {
        if context.league() != Some(league) {
            return Err(EngineError::InvalidContext(format!(
                "{league} constants used with context league {:?}",
                context.league()
            )));
        }
    }
    match (context.park_neutral(), park) {
        (true, Some(pf)) => {
            let m = pf.multiplier();
            if m <= 0.0 || !m.is_finite() {
                return Err(EngineError::InvalidContext(format!(
                    "park factor {} for {} is not usable",
                    pf.overall(),
                    pf.park_id
                )));
            }
            Ok(m)
        }
        (true, None) => Err(EngineError::InvalidContext(
            "park-neutral context requires a park factor".into(),
        )),
        (false, Some(pf)) => {
            debug!(park = %pf.park_id, "park factor ignored for non-neutral context");
            Ok(1.0)
        }
        (false, None) => Ok(1.0),
    }
}
