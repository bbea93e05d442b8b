pub mod acquisition;
pub mod activation;
pub mod config;
pub mod discovery;
pub mod error;
pub mod language;
pub mod metrics;
pub mod plex;
pub mod pool;
pub mod provider;
pub mod ranking;
pub mod release;
pub mod retry;
pub mod testing;
pub mod webhook;

pub use acquisition::{
    AcquisitionError, AcquisitionOutcome, AcquisitionPipeline, AcquisitionRequest,
    AcquisitionSettings, DownloadOutcome, UpgradeReason,
};
pub use activation::{ActivationResult, SessionActivator};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use discovery::{DiscoveryError, LibraryInfo, PathCheck, ValidationReport};
pub use error::{Classify, ErrorKind};
pub use language::{LanguageVerifier, TextLanguageVerifier, Verdict, VerificationError};
pub use plex::{MediaInfo, MediaServer, PlexClient, PlexError};
pub use pool::{PoolError, WorkerPool};
pub use provider::{
    build_providers, OpenSubtitlesProvider, ProviderError, SearchCandidate, SearchQuery,
    SubtitleProvider,
};
pub use release::{FilenameGuesser, ReleaseFingerprint, SceneNameGuesser};
pub use retry::{RetryError, RetryPolicy};
pub use webhook::{WebhookBody, WebhookError, WebhookPayload, WebhookResponse, WebhookService};
