pub mod history;
pub mod inverse;

pub use history::{DEFAULT_MAX_DEPTH, HistoryEngine, HistoryEntry, HistoryOutcome};
pub use inverse::{InverseError, invert};
