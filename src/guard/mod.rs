pub mod achievements;
pub mod gate;

pub use achievements::UnlockedAchievement;
pub use gate::{GateDecision, RecordedRejection, Rejection, SubmissionGate};
