use serde::{Deserialize, Serialize};

/// Engagement/spend classification, lowest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Newcomer,
    Engaged,
    TokenHolder,
    PowerUser,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Newcomer => "Newcomer",
            Tier::Engaged => "Engaged",
            Tier::TokenHolder => "Token Holder",
            Tier::PowerUser => "Power User",
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Tier::Newcomer => 1,
            Tier::Engaged => 2,
            Tier::TokenHolder => 3,
            Tier::PowerUser => 4,
        }
    }
}
