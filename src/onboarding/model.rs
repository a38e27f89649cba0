//! Wire models for the backend's onboarding record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

/// The backend's authoritative onboarding record for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub user_id: i64,
    pub stage: Stage,
    /// Current tutorial step (1..=3), absent before the tutorial starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutorial_step: Option<u32>,
    /// Checklist flags. May be partial or empty on a fresh record.
    #[serde(default)]
    pub checklist: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update body for `PATCH onboarding/progress`.
///
/// The backend replaces its whole checklist when `checklist` is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingProgressUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutorial_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<BTreeMap<String, bool>>,
    /// Ask the backend to stamp `completed_at`.
    #[serde(default)]
    pub completed: bool,
}

impl OnboardingProgressUpdate {
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn tutorial_step(step: u32) -> Self {
        Self {
            tutorial_step: Some(step),
            ..Default::default()
        }
    }

    /// Whether the update carries anything at all.
    pub fn is_empty(&self) -> bool {
        self.stage.is_none()
            && self.tutorial_step.is_none()
            && self.checklist.is_none()
            && !self.completed
    }
}

/// Body for `POST onboarding/checklist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItemUpdate {
    pub item_key: String,
    pub completed: bool,
}
