//! `ProgressStore` trait: the persistence seam for the onboarding snapshot.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::onboarding::state::OnboardingState;

/// Fixed storage identifier of the onboarding snapshot.
pub const STORAGE_KEY: &str = "onboarding-storage";

/// Backend-agnostic store for the onboarding snapshot.
///
/// `save` replaces the whole snapshot in one write, so readers never see a
/// partial update.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load the last saved snapshot, if any.
    async fn load(&self) -> Result<Option<OnboardingState>, StoreError>;

    /// Replace the saved snapshot.
    async fn save(&self, state: &OnboardingState) -> Result<(), StoreError>;

    /// Remove the saved snapshot. Returns whether one existed.
    async fn clear(&self) -> Result<bool, StoreError>;
}
