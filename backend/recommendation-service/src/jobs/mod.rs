pub mod suggestion_sweep;

pub use suggestion_sweep::{
    spawn_suggestion_sweeper, SuggestionSweeper, SweepConfig, SweepHandle, SweepReport,
};
