//! Plex webhook handling.
//!
//! [`WebhookService::handle`] turns a raw webhook body into an
//! acknowledgement: parse, filter events, fetch metadata, acquire, then
//! refresh and activate. The HTTP layer only moves bytes in and the
//! [`WebhookResponse`] out.

mod types;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::acquisition::{AcquisitionOutcome, AcquisitionPipeline, AcquisitionRequest};
use crate::activation::SessionActivator;
use crate::metrics;
use crate::plex::MediaServer;
use crate::pool::WorkerPool;

pub use types::*;

pub struct WebhookService {
    server: Arc<dyn MediaServer>,
    pipeline: Arc<AcquisitionPipeline>,
    activator: SessionActivator,
    pool: WorkerPool,
    auto_select: bool,
}

impl WebhookService {
    pub fn new(
        server: Arc<dyn MediaServer>,
        pipeline: Arc<AcquisitionPipeline>,
        activator: SessionActivator,
        pool: WorkerPool,
        auto_select: bool,
    ) -> Self {
        Self {
            server,
            pipeline,
            activator,
            pool,
            auto_select,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Handle one webhook body.
    pub async fn handle(&self, payload: &str) -> WebhookResponse {
        let response = match self.dispatch(payload).await {
            Ok(response) => response,
            Err(e) => {
                if e.status_code() >= 500 {
                    error!(error = %e, kind = ?crate::error::Classify::kind(&e), "Webhook processing failed");
                } else {
                    warn!(error = %e, "Rejected webhook");
                }
                e.into_response()
            }
        };
        metrics::WEBHOOK_EVENTS
            .with_label_values(&[response.body.label()])
            .inc();
        response
    }

    async fn dispatch(&self, payload: &str) -> Result<WebhookResponse, WebhookError> {
        let payload: WebhookPayload = serde_json::from_str(payload)?;
        info!(event = ?payload.event, "Received webhook event");

        if !payload.is_processable() {
            debug!(event = ?payload.event, "Ignoring event");
            return Ok(WebhookResponse::new(
                200,
                WebhookBody::Ignored {
                    event: payload.event,
                },
            ));
        }

        let rating_key = payload
            .rating_key()
            .ok_or(WebhookError::MissingRatingKey)?
            .to_string();
        info!(rating_key = %rating_key, "Processing media");

        self.pool.run(self.process(&rating_key)).await?
    }

    /// Metadata, acquisition, refresh and activation for one item.
    async fn process(&self, rating_key: &str) -> Result<WebhookResponse, WebhookError> {
        let media = self.server.get_media_info(rating_key).await?;
        let media_path = media
            .file_path
            .clone()
            .ok_or_else(|| WebhookError::MissingFilePath(rating_key.to_string()))?;
        info!(path = %media_path.display(), "Media file");

        let request = AcquisitionRequest {
            media_path,
            title: media.title.clone(),
            year: media.year,
            imdb_id: media.imdb_id.clone(),
        };

        let response = match self.pipeline.acquire(&request).await? {
            AcquisitionOutcome::Downloaded(outcome) => {
                if let Err(e) = self.server.refresh_metadata(rating_key).await {
                    warn!(rating_key, error = %e, "Failed to refresh metadata");
                }

                let activation = if self.auto_select {
                    Some(self.activator.activate(rating_key, &outcome.language).await)
                } else {
                    None
                };

                WebhookResponse::new(
                    200,
                    WebhookBody::Success {
                        subtitle: outcome.path,
                        language: outcome.language,
                        language_code: outcome.language_code,
                        provider: outcome.provider,
                        upgraded: outcome.upgraded,
                        activation,
                    },
                )
            }
            // The media already has a subtitle for a configured language, so
            // this is answered as handled rather than as a 404 miss.
            AcquisitionOutcome::KeptExisting { language, path } => WebhookResponse::new(
                200,
                WebhookBody::KeptExisting {
                    language,
                    existing: path,
                },
            ),
            AcquisitionOutcome::NotFound => WebhookResponse::new(
                404,
                WebhookBody::NotFound {
                    message: "No suitable subtitle found".to_string(),
                },
            ),
        };

        Ok(response)
    }
}
