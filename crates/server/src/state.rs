use std::sync::Arc;
use subfetch_core::{Config, MediaServer, SanitizedConfig, WebhookService, WorkerPool};

/// Shared application state
pub struct AppState {
    config: Config,
    webhooks: Arc<WebhookService>,
    media_server: Arc<dyn MediaServer>,
}

impl AppState {
    pub fn new(
        config: Config,
        webhooks: Arc<WebhookService>,
        media_server: Arc<dyn MediaServer>,
    ) -> Self {
        Self {
            config,
            webhooks,
            media_server,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn webhooks(&self) -> &WebhookService {
        self.webhooks.as_ref()
    }

    pub fn media_server(&self) -> &dyn MediaServer {
        self.media_server.as_ref()
    }

    /// Worker pool shared by webhook processing and path validation.
    pub fn pool(&self) -> &WorkerPool {
        self.webhooks.pool()
    }
}
