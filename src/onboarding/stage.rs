//! Stage machine: coarse phases of the onboarding journey.

use serde::{Deserialize, Serialize};

/// The stages a user moves through.
///
/// Normal flow is linear: Landing → Trial → Signup → Tutorial → Dashboard.
/// Assignment is permissive: any stage may be set from any other, which
/// keeps deep links working. Moves are classified for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Landing,
    Trial,
    Signup,
    Tutorial,
    Dashboard,
}

impl Stage {
    /// All stages in flow order.
    pub const ALL: [Stage; 5] = [
        Stage::Landing,
        Stage::Trial,
        Stage::Signup,
        Stage::Tutorial,
        Stage::Dashboard,
    ];

    /// Position in the linear flow, starting at 0.
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Landing => 0,
            Self::Trial => 1,
            Self::Signup => 2,
            Self::Tutorial => 3,
            Self::Dashboard => 4,
        }
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.ordinal() + 1).copied()
    }

    /// Whether this stage is terminal. After it the user navigates freely.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dashboard)
    }

    /// Whether the view for this stage is only reachable when signed in.
    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Tutorial | Self::Dashboard)
    }

    /// View path for this stage.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Trial => "/trial",
            Self::Signup => "/signup",
            Self::Tutorial => "/tutorial",
            Self::Dashboard => "/dashboard",
        }
    }

    /// Map a view path back to its stage. Unknown paths fall back to
    /// `Landing`, the same place the catch-all route redirects to.
    pub fn from_route(path: &str) -> Stage {
        let trimmed = path.trim_end_matches('/');
        Self::ALL
            .into_iter()
            .find(|s| s.route().trim_end_matches('/') == trimmed)
            .unwrap_or(Stage::Landing)
    }

    /// Resolve where a navigation to `self` actually lands. Protected
    /// stages send unauthenticated users to `Signup`.
    pub fn gate(&self, authenticated: bool) -> Stage {
        if self.requires_auth() && !authenticated {
            Stage::Signup
        } else {
            *self
        }
    }

    /// Classify a move from `self` to `target`.
    pub fn classify(&self, target: Stage) -> TransitionKind {
        let (from, to) = (self.ordinal(), target.ordinal());
        if to == from {
            TransitionKind::Unchanged
        } else if to == from + 1 {
            TransitionKind::Forward
        } else if to > from {
            TransitionKind::Skip
        } else {
            TransitionKind::Backward
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::Landing
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Landing => "landing",
            Self::Trial => "trial",
            Self::Signup => "signup",
            Self::Tutorial => "tutorial",
            Self::Dashboard => "dashboard",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.to_string() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("Unknown stage: {s}"))
    }
}

/// How a stage assignment relates to the linear flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Exactly one step forward.
    Forward,
    /// Forward past one or more stages.
    Skip,
    /// Back to an earlier stage.
    Backward,
    /// Same stage again.
    Unchanged,
}

/// A stage assignment that has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    pub kind: TransitionKind,
}
