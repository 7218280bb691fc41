// Per-game feed consumers: split grouping, streak scanning and rolling run
// differential. Each is a pure pass over caller-ordered rows.

pub mod run_diff;
pub mod splits;
pub mod streaks;

use chrono::NaiveDate;

use crate::error::{EngineError, Result};

/// Reject a feed whose dates go backwards. Same-day entries (doubleheaders)
/// are allowed.
pub(crate) fn check_chronology<'a>(dates: impl IntoIterator<Item = &'a NaiveDate>) -> Result<()> {
    let mut previous: Option<&NaiveDate> = None;
    for (i, date) in dates.into_iter().enumerate() {
        if let Some(prev) = previous {
            if date < prev {
                return Err(EngineError::malformed(
                    i as u32,
                    format!("date {date} comes after {prev} in the feed"),
                ));
            }
        }
        previous = Some(date);
    }
    Ok(())
}
