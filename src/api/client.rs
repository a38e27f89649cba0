//! reqwest implementation of [`OnboardingApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use super::OnboardingApi;
use crate::config::OnboardingConfig;
use crate::error::SyncError;
use crate::onboarding::model::{ChecklistItemUpdate, OnboardingProgress, OnboardingProgressUpdate};

const PROGRESS_PATH: &str = "onboarding/progress";
const CHECKLIST_PATH: &str = "onboarding/checklist";

/// Talks to the studio backend over HTTP.
pub struct HttpOnboardingApi {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<SecretString>,
    timeout: Duration,
}

impl HttpOnboardingApi {
    pub fn new(
        base_url: Url,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Network {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url,
            auth_token,
            timeout,
        })
    }

    pub fn from_config(config: &OnboardingConfig) -> Result<Self, SyncError> {
        Self::new(
            config.api_url.clone(),
            config.auth_token.clone(),
            config.http_timeout,
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base_url.join(path).map_err(|e| SyncError::Network {
            reason: format!("Invalid endpoint {path}: {e}"),
        })
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<OnboardingProgress, SyncError> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "Onboarding request");

        let mut request = self.client.request(method, url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<OnboardingProgress>()
            .await
            .map_err(|e| SyncError::InvalidResponse {
                reason: e.to_string(),
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::Timeout {
                timeout: self.timeout,
            }
        } else {
            SyncError::Network {
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl OnboardingApi for HttpOnboardingApi {
    async fn get_progress(&self) -> Result<OnboardingProgress, SyncError> {
        self.send::<()>(Method::GET, PROGRESS_PATH, None).await
    }

    async fn update_progress(
        &self,
        update: &OnboardingProgressUpdate,
    ) -> Result<OnboardingProgress, SyncError> {
        self.send(Method::PATCH, PROGRESS_PATH, Some(update)).await
    }

    async fn update_checklist_item(
        &self,
        item: &ChecklistItemUpdate,
    ) -> Result<OnboardingProgress, SyncError> {
        self.send(Method::POST, CHECKLIST_PATH, Some(item)).await
    }
}
