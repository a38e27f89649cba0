//! Onboarding tracker: stage machine, tutorial steps, reward checklist,
//! and optimistic sync with the studio backend.
//!
//! `OnboardingManager` owns the state. Everything else here is either a
//! pure transition on `OnboardingState` or bookkeeping the manager uses to
//! reconcile backend responses.

pub mod checklist;
pub mod manager;
pub mod model;
pub mod notify;
pub mod stage;
pub mod state;
pub mod sync;
pub mod tutorial;

pub use checklist::{CatalogEntry, Checklist, ChecklistItem, Credit};
pub use manager::{OnboardingManager, OnboardingStatus, Queued, SyncHandle};
pub use model::{ChecklistItemUpdate, OnboardingProgress, OnboardingProgressUpdate};
pub use notify::{NoticeEvent, RewardNotice, RewardNotifier};
pub use stage::{Stage, Transition, TransitionKind};
pub use state::OnboardingState;
pub use sync::Reconciled;
pub use tutorial::TutorialTracker;
