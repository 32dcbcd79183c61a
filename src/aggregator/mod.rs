pub mod reducer;
pub mod tracker;

pub use reducer::{apply, EventOutcome, ReduceContext, Reduction};
pub use tracker::{BalanceRefresh, ProgressionTracker, Recorded};
