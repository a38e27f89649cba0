//! Persisted onboarding state and its pure transitions.
//!
//! Every mutation the tracker performs is one of the methods below. They
//! touch nothing but `self`, so the manager can apply them under a lock,
//! persist the result, and keep I/O out of the transitions themselves.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::checklist::{Checklist, Credit};
use super::model::OnboardingProgress;
use super::stage::{Stage, Transition};

/// Persisted onboarding snapshot.
///
/// Stored in the `settings` table under key `"onboarding-storage"`. It is the
/// seed value until the first successful fetch from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingState {
    /// Last record received from the backend, patched with local edits.
    pub progress: Option<OnboardingProgress>,
    pub current_stage: Stage,
    /// Current tutorial step; 0 until the tutorial starts.
    pub tutorial_step: u32,
    pub checklist: BTreeMap<String, bool>,
    /// Tutorial steps finished on this client.
    #[serde(default)]
    pub completed_steps: BTreeSet<u32>,
    /// Checklist keys whose reward has been credited. Only ever grows.
    #[serde(default)]
    pub rewarded: BTreeSet<String>,
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self::initial(&Checklist::default())
    }
}

impl OnboardingState {
    /// Fresh state for an unauthenticated session: landing stage, every
    /// catalog item open.
    pub fn initial(checklist: &Checklist) -> Self {
        Self {
            progress: None,
            current_stage: Stage::Landing,
            tutorial_step: 0,
            checklist: seed_checklist(checklist),
            completed_steps: BTreeSet::new(),
            rewarded: BTreeSet::new(),
        }
    }

    /// Replace local state with a backend record.
    ///
    /// Catalog keys missing from the record read as open. Keys the catalog
    /// doesn't know are kept as-is. Items that turn complete are credited.
    ///
    /// `completed_steps` is client-only and left untouched; the record only
    /// carries the current tutorial step. See
    /// `TutorialTracker::restore_finished` for the one case it implies.
    pub fn set_progress(&mut self, progress: OnboardingProgress, checklist: &Checklist) -> Vec<Credit> {
        let mut merged = seed_checklist(checklist);
        merged.extend(progress.checklist.iter().map(|(k, v)| (k.clone(), *v)));

        self.current_stage = progress.stage;
        self.tutorial_step = progress.tutorial_step.unwrap_or(0);
        self.checklist = merged;
        self.progress = Some(progress);

        checklist.credit_completed(self)
    }

    /// Assign the current stage. Any assignment is accepted.
    pub fn update_stage(&mut self, stage: Stage) -> Transition {
        let from = self.current_stage;
        self.current_stage = stage;
        if let Some(progress) = self.progress.as_mut() {
            progress.stage = stage;
        }
        Transition {
            from,
            to: stage,
            kind: from.classify(stage),
        }
    }

    pub fn update_tutorial_step(&mut self, step: u32) {
        self.tutorial_step = step;
        if let Some(progress) = self.progress.as_mut() {
            progress.tutorial_step = Some(step);
        }
    }

    /// Set one checklist flag. Returns the credit if this is the key's first
    /// completion.
    pub fn update_checklist_item(
        &mut self,
        key: &str,
        completed: bool,
        checklist: &Checklist,
    ) -> Option<Credit> {
        self.checklist.insert(key.to_string(), completed);
        if let Some(progress) = self.progress.as_mut() {
            progress.checklist.insert(key.to_string(), completed);
        }

        if !completed {
            return None;
        }
        let entry = checklist.get(key)?;
        if !self.rewarded.insert(key.to_string()) {
            return None;
        }
        Some(Credit {
            key: entry.id.clone(),
            title: entry.title.clone(),
            reward: entry.reward,
        })
    }

    /// Go back to the initial state.
    pub fn reset(&mut self, checklist: &Checklist) {
        *self = Self::initial(checklist);
    }
}

fn seed_checklist(checklist: &Checklist) -> BTreeMap<String, bool> {
    checklist
        .entries()
        .iter()
        .map(|e| (e.id.clone(), false))
        .collect()
}
