//! In-memory `ProgressStore`, for tests and ephemeral sessions.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::ProgressStore;
use crate::error::StoreError;
use crate::onboarding::state::OnboardingState;

/// Keeps the snapshot as serialized JSON so it goes through the same
/// encoding as the on-disk store.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load(&self) -> Result<Option<OnboardingState>, StoreError> {
        let snapshot = self.snapshot.lock().await;
        snapshot
            .as_deref()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn save(&self, state: &OnboardingState) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(state).map_err(|e| StoreError::Serialization(e.to_string()))?;
        *self.snapshot.lock().await = Some(json);
        *self.saves.lock().await += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<bool, StoreError> {
        Ok(self.snapshot.lock().await.take().is_some())
    }
}
