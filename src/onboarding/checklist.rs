//! Checklist engine: fixed catalog of onboarding tasks with one-time
//! credit rewards.
//!
//! The engine owns only the catalog. Completion flags and the set of
//! already-credited keys live in [`OnboardingState`] so they persist and
//! reconcile with everything else.

use serde::{Deserialize, Serialize};

use crate::error::ChecklistError;

use super::state::OnboardingState;

/// Credits granted per item in the default catalog.
pub const DEFAULT_REWARD: u32 = 2;

/// A catalog entry: the static part of a checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable key, shared with the backend record.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Credits granted the first time the item completes.
    pub reward: u32,
}

impl CatalogEntry {
    pub fn new(id: &str, title: &str, description: &str, reward: u32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            reward,
        }
    }
}

/// A checklist item as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward: u32,
    pub completed: bool,
}

/// A reward granted by a false→true transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub key: String,
    pub title: String,
    pub reward: u32,
}

/// The checklist engine.
#[derive(Debug, Clone)]
pub struct Checklist {
    entries: Vec<CatalogEntry>,
}

impl Default for Checklist {
    fn default() -> Self {
        Self::new(vec![
            CatalogEntry::new(
                "create_project",
                "Create your first project",
                "Start a project to hold your product shots",
                DEFAULT_REWARD,
            ),
            CatalogEntry::new(
                "upload_image",
                "Upload an image",
                "Upload a product image",
                DEFAULT_REWARD,
            ),
            CatalogEntry::new(
                "generate_background",
                "Generate a background",
                "Let the AI generate a new background",
                DEFAULT_REWARD,
            ),
            CatalogEntry::new(
                "generate_caption",
                "Generate a caption",
                "Let the AI write ad copy for the shot",
                DEFAULT_REWARD,
            ),
            CatalogEntry::new(
                "share_sns",
                "Share to social media",
                "Share a finished image on social media",
                DEFAULT_REWARD,
            ),
        ])
    }
}

impl Checklist {
    /// Build an engine over a custom catalog. Duplicate keys keep the first
    /// entry.
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut unique: Vec<CatalogEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !unique.iter().any(|e| e.id == entry.id) {
                unique.push(entry);
            }
        }
        Self { entries: unique }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate a key against the catalog.
    pub fn check_key(&self, key: &str) -> Result<&CatalogEntry, ChecklistError> {
        self.get(key).ok_or_else(|| ChecklistError::InvalidKey {
            key: key.to_string(),
        })
    }

    /// Mark `key` completed.
    ///
    /// Returns the credit when this call flipped the item, `None` when it
    /// was already complete. Unknown keys leave `state` untouched.
    pub fn complete_item(
        &self,
        state: &mut OnboardingState,
        key: &str,
    ) -> Result<Option<Credit>, ChecklistError> {
        self.check_key(key)?;
        Ok(state.update_checklist_item(key, true, self))
    }

    /// Credit every completed catalog item that has not been credited yet.
    pub fn credit_completed(&self, state: &mut OnboardingState) -> Vec<Credit> {
        let mut credits = Vec::new();
        for entry in &self.entries {
            let completed = state.checklist.get(&entry.id).copied().unwrap_or(false);
            if completed && state.rewarded.insert(entry.id.clone()) {
                credits.push(Credit {
                    key: entry.id.clone(),
                    title: entry.title.clone(),
                    reward: entry.reward,
                });
            }
        }
        credits
    }

    /// Whether a single item is completed in `state`.
    pub fn is_completed(&self, state: &OnboardingState, key: &str) -> bool {
        self.contains(key) && state.checklist.get(key).copied().unwrap_or(false)
    }

    pub fn completed_count(&self, state: &OnboardingState) -> usize {
        self.entries
            .iter()
            .filter(|e| state.checklist.get(&e.id).copied().unwrap_or(false))
            .count()
    }

    /// Completion percentage in [0, 100]. An empty catalog reports 0.
    pub fn progress(&self, state: &OnboardingState) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        (self.completed_count(state) as f64 / self.entries.len() as f64) * 100.0
    }

    pub fn is_fully_complete(&self, state: &OnboardingState) -> bool {
        self.completed_count(state) == self.entries.len()
    }

    /// Total credits granted so far.
    pub fn total_reward(&self, state: &OnboardingState) -> u32 {
        self.entries
            .iter()
            .filter(|e| state.rewarded.contains(&e.id))
            .map(|e| e.reward)
            .sum()
    }

    /// Materialize the catalog with completion flags from `state`.
    pub fn items(&self, state: &OnboardingState) -> Vec<ChecklistItem> {
        self.entries
            .iter()
            .map(|e| ChecklistItem {
                id: e.id.clone(),
                title: e.title.clone(),
                description: e.description.clone(),
                reward: e.reward,
                completed: state.checklist.get(&e.id).copied().unwrap_or(false),
            })
            .collect()
    }
}
