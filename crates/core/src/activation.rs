//! Two-tier subtitle activation.
//!
//! Plex delivers the webhook before the playback session is always visible
//! in `/status/sessions`, so selecting the subtitle on the live session is
//! retried with backoff. When that never succeeds the subtitle is stored as
//! the item's default stream instead, once and without retries.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SubtitlesConfig;
use crate::error::ErrorKind;
use crate::metrics;
use crate::plex::MediaServer;
use crate::retry::{RetryError, RetryPolicy};

/// Where the subtitle ended up selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationResult {
    /// Switched on the live playback session.
    ActiveSession,
    /// Stored as the default for future plays.
    DefaultStream,
    /// Neither worked; the file is still picked up on the next play.
    Failed,
}

impl ActivationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationResult::ActiveSession => "active_session",
            ActivationResult::DefaultStream => "default_stream",
            ActivationResult::Failed => "failed",
        }
    }
}

pub struct SessionActivator {
    server: Arc<dyn MediaServer>,
    session_retry: RetryPolicy,
}

impl SessionActivator {
    pub fn new(
        server: Arc<dyn MediaServer>,
        session_attempts: u32,
        session_base_delay: Duration,
    ) -> Result<Self, RetryError> {
        let session_retry = RetryPolicy::new(session_attempts, session_base_delay)?
            .retry_on(&[ErrorKind::Activation, ErrorKind::MediaServer]);
        Ok(Self {
            server,
            session_retry,
        })
    }

    pub fn from_config(
        server: Arc<dyn MediaServer>,
        config: &SubtitlesConfig,
    ) -> Result<Self, RetryError> {
        Self::new(
            server,
            config.session_attempts,
            Duration::from_millis(config.session_base_delay_ms),
        )
    }

    /// Select `language` for `rating_key`. Never fails; the result says
    /// which tier took effect.
    pub async fn activate(&self, rating_key: &str, language: &str) -> ActivationResult {
        let live = self
            .session_retry
            .execute_with(
                || self.server.set_active_session_subtitle(rating_key, language),
                |attempt, delay, e| {
                    metrics::RETRY_ATTEMPTS
                        .with_label_values(&["session_activation"])
                        .inc();
                    debug!(
                        rating_key,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Active session not ready, retrying"
                    );
                },
            )
            .await;

        let result = match live {
            Ok(()) => {
                info!(rating_key, language, "Subtitle set on active session");
                ActivationResult::ActiveSession
            }
            Err(e) => {
                debug!(rating_key, error = %e, "Could not set subtitle on active session, setting default for future plays");
                match self
                    .server
                    .set_default_subtitle_stream(rating_key, language)
                    .await
                {
                    Ok(()) => {
                        info!(rating_key, language, "Set default subtitle for future plays");
                        ActivationResult::DefaultStream
                    }
                    Err(e) => {
                        warn!(rating_key, error = %e, "Failed to set subtitle stream, will be available on next play");
                        ActivationResult::Failed
                    }
                }
            }
        };

        metrics::ACTIVATIONS
            .with_label_values(&[result.as_str()])
            .inc();
        result
    }
}
