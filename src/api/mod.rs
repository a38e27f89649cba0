//! Backend onboarding API: the REST contract and its reqwest client.

pub mod client;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::onboarding::model::{ChecklistItemUpdate, OnboardingProgress, OnboardingProgressUpdate};

pub use client::HttpOnboardingApi;

/// The three onboarding endpoints the tracker consumes.
///
/// Every call answers with the backend's canonical record.
#[async_trait]
pub trait OnboardingApi: Send + Sync {
    /// `GET onboarding/progress`
    async fn get_progress(&self) -> Result<OnboardingProgress, SyncError>;

    /// `PATCH onboarding/progress`
    async fn update_progress(
        &self,
        update: &OnboardingProgressUpdate,
    ) -> Result<OnboardingProgress, SyncError>;

    /// `POST onboarding/checklist`
    async fn update_checklist_item(
        &self,
        item: &ChecklistItemUpdate,
    ) -> Result<OnboardingProgress, SyncError>;
}
