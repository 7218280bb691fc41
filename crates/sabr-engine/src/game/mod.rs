// Game-state reconstruction, win expectancy and leverage.

pub mod leverage;
pub mod state;
pub mod win_expectancy;
