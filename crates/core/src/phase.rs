//! Build Phase State Machine
//!
//! `idle → planning → coding ⇄ testing ⇄ debugging → complete`, with every
//! non-terminal phase able to fall into `error`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildPhase {
    #[default]
    Idle,
    Planning,
    Coding,
    Testing,
    Debugging,
    Complete,
    Error,
}

impl BuildPhase {
    /// Terminal phases accept no further transitions or backend calls.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildPhase::Complete | BuildPhase::Error)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same phase is not a transition and returns false.
    pub fn can_transition_to(&self, next: BuildPhase) -> bool {
        use BuildPhase::*;
        if self.is_terminal() || *self == next {
            return false;
        }
        if next == Error {
            return true;
        }
        matches!(
            (*self, next),
            (Idle, Planning)
                | (Idle, Coding)
                | (Planning, Coding)
                | (Planning, Complete)
                | (Coding, Testing)
                | (Coding, Debugging)
                | (Coding, Complete)
                | (Testing, Coding)
                | (Testing, Debugging)
                | (Testing, Complete)
                | (Debugging, Coding)
                | (Debugging, Testing)
                | (Debugging, Complete)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Idle => "idle",
            BuildPhase::Planning => "planning",
            BuildPhase::Coding => "coding",
            BuildPhase::Testing => "testing",
            BuildPhase::Debugging => "debugging",
            BuildPhase::Complete => "complete",
            BuildPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Plan, write every planned file, then complete
    #[default]
    Build,
    /// Stop once a plan is accepted
    Plan,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::Build => f.write_str("build"),
            BuildMode::Plan => f.write_str("plan"),
        }
    }
}

impl std::str::FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build" => Ok(BuildMode::Build),
            "plan" => Ok(BuildMode::Plan),
            other => Err(format!("unknown build mode '{}' (expected build or plan)", other)),
        }
    }
}
