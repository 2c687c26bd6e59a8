//! Seed policy for a run.
//!
//! `Random` lets the server pick the seed; `Fixed` sends the caller's
//! literal value. Either way the server is authoritative and echoes the
//! effective seed back as `resolved_seed`.

use serde::{Deserialize, Serialize};

/// Driver-facing seed choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedSelection {
    #[default]
    Random,
    Fixed(i64),
}

impl SeedSelection {
    pub fn mode(&self) -> SeedMode {
        match self {
            Self::Random => SeedMode::Random,
            Self::Fixed(_) => SeedMode::Fixed,
        }
    }

    pub fn fixed_value(&self) -> Option<i64> {
        match self {
            Self::Random => None,
            Self::Fixed(value) => Some(*value),
        }
    }

    /// Wire form carried in the run request.
    pub fn to_control(&self) -> SeedControl {
        SeedControl {
            mode: self.mode(),
            value: self.fixed_value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    Random,
    Fixed,
}

/// `seed_control` object of a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedControl {
    pub mode: SeedMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl From<SeedSelection> for SeedControl {
    fn from(selection: SeedSelection) -> Self {
        selection.to_control()
    }
}
