//! Studio onboarding: first-run progress tracker for the studio client.

pub mod api;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
