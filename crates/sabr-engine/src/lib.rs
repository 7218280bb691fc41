// Library root: sabermetric derivation engine. Every entry point is a pure,
// synchronous function of its arguments; lookup tables are immutable and may
// be shared across threads.

pub mod constants;
pub mod context;
pub mod counting;
pub mod derive;
pub mod error;
pub mod game;
pub mod ids;
pub mod park;
pub mod sequence;

pub use constants::{ConstantsProvider, FallbackPolicy, LeagueConstant, SeasonConstants, WobaConstant};
pub use context::{League, StatContext, StatProvider};
pub use counting::{BattingLine, PitchingLine};
pub use error::{EngineError, Result};
pub use ids::{GameId, ParkId, PlayerId, TeamId};
