pub mod classifier;

pub use classifier::{TierClassifier, TierStanding};
