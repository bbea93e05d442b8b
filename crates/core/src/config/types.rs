use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub plex: PlexConfig,
    pub opensubtitles: OpenSubtitlesConfig,
    #[serde(default)]
    pub subtitles: SubtitlesConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Route Plex posts webhooks to.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    9000
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

/// Plex server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlexConfig {
    /// Plex server URL (e.g., "http://localhost:32400")
    #[serde(default = "default_plex_url")]
    pub url: String,
    /// Plex authentication token
    pub token: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u32,
    /// Plex path prefix -> local path prefix.
    /// The longest matching prefix wins.
    #[serde(default = "default_path_mappings")]
    pub path_mappings: BTreeMap<String, String>,
}

fn default_plex_url() -> String {
    "http://localhost:32400".to_string()
}

fn default_request_timeout() -> u32 {
    10
}

fn default_path_mappings() -> BTreeMap<String, String> {
    BTreeMap::from([("/media".to_string(), "/mnt/library".to_string())])
}

/// OpenSubtitles.com configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenSubtitlesConfig {
    pub username: String,
    pub password: String,
    pub api_key: String,
    #[serde(default = "default_opensubtitles_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u32,
    /// How long a login token is trusted before logging in again.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_opensubtitles_url() -> String {
    "https://api.opensubtitles.com/api/v1".to_string()
}

fn default_download_timeout() -> u32 {
    30
}

fn default_token_ttl() -> u64 {
    23 * 3600
}

/// Subtitle selection behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubtitlesConfig {
    /// Ordered language codes; the first one is the primary language.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    /// Select the downloaded subtitle on the media server.
    #[serde(default = "default_true")]
    pub auto_select: bool,
    #[serde(default = "default_true")]
    pub use_release_matching: bool,
    #[serde(default = "default_true")]
    pub upgrade_on_perfect_match: bool,
    /// Replace an existing subtitle with a popular one even without a perfect match.
    #[serde(default = "default_true")]
    pub upgrade_on_popular: bool,
    #[serde(default = "default_popular_threshold")]
    pub popular_download_threshold: u64,
    /// Attempts for one download+verify unit.
    #[serde(default = "default_attempts")]
    pub download_attempts: u32,
    #[serde(default = "default_download_delay")]
    pub download_base_delay_ms: u64,
    /// Attempts to select the subtitle on the active playback session.
    #[serde(default = "default_attempts")]
    pub session_attempts: u32,
    #[serde(default = "default_session_delay")]
    pub session_base_delay_ms: u64,
}

impl Default for SubtitlesConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            auto_select: true,
            use_release_matching: true,
            upgrade_on_perfect_match: true,
            upgrade_on_popular: true,
            popular_download_threshold: default_popular_threshold(),
            download_attempts: default_attempts(),
            download_base_delay_ms: default_download_delay(),
            session_attempts: default_attempts(),
            session_base_delay_ms: default_session_delay(),
        }
    }
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_popular_threshold() -> u64 {
    100
}

fn default_attempts() -> u32 {
    3
}

fn default_download_delay() -> u64 {
    1000
}

fn default_session_delay() -> u64 {
    3000
}

/// Worker pool bounding concurrent network/filesystem work
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    #[serde(default = "default_workers")]
    pub max_concurrent: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    2
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Library discovery / path validation endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Plex path validated when a request carries no paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            test_file: None,
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub plex: SanitizedPlexConfig,
    pub opensubtitles: SanitizedOpenSubtitlesConfig,
    pub subtitles: SubtitlesConfig,
    pub workers: WorkersConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPlexConfig {
    pub url: String,
    pub token_configured: bool,
    pub timeout_secs: u32,
    pub path_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOpenSubtitlesConfig {
    pub base_url: String,
    pub username: String,
    pub password_configured: bool,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            plex: SanitizedPlexConfig {
                url: config.plex.url.clone(),
                token_configured: !config.plex.token.is_empty(),
                timeout_secs: config.plex.timeout_secs,
                path_mappings: config.plex.path_mappings.clone(),
            },
            opensubtitles: SanitizedOpenSubtitlesConfig {
                base_url: config.opensubtitles.base_url.clone(),
                username: config.opensubtitles.username.clone(),
                password_configured: !config.opensubtitles.password.is_empty(),
                api_key_configured: !config.opensubtitles.api_key.is_empty(),
            },
            subtitles: config.subtitles.clone(),
            workers: config.workers.clone(),
            discovery: config.discovery.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[plex]
token = "plex-token"

[opensubtitles]
username = "user"
password = "pass"
api_key = "key"
"#;

    #[test]
    fn test_deserialize_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.webhook_path, "/webhook");
        assert_eq!(config.plex.url, "http://localhost:32400");
        assert_eq!(config.plex.path_mappings.get("/media").unwrap(), "/mnt/library");
        assert_eq!(config.subtitles.languages, vec!["en"]);
        assert!(config.subtitles.auto_select);
        assert_eq!(config.subtitles.popular_download_threshold, 100);
        assert_eq!(config.subtitles.download_attempts, 3);
        assert_eq!(config.workers.max_concurrent, 2);
        assert!(config.discovery.enabled);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_deserialize_missing_plex_fails() {
        let toml = r#"
[opensubtitles]
username = "user"
password = "pass"
api_key = "key"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_subtitles_section() {
        let toml = format!(
            r#"{MINIMAL}
[subtitles]
languages = ["nl", "en"]
upgrade_on_popular = false
popular_download_threshold = 250
"#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.subtitles.languages, vec!["nl", "en"]);
        assert!(!config.subtitles.upgrade_on_popular);
        assert!(config.subtitles.upgrade_on_perfect_match);
        assert_eq!(config.subtitles.popular_download_threshold, 250);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.plex.token_configured);
        assert!(sanitized.opensubtitles.api_key_configured);
        assert!(sanitized.opensubtitles.password_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("plex-token"));
        assert!(!json.contains("\"pass\""));
    }
}
