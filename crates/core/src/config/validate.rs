use super::{types::Config, ConfigError};

/// Validate configuration.
///
/// Rejects settings that would make a request fail in a confusing way later:
/// an unusable language list, zero retry attempts (the wrapped operation
/// would never run) or an empty worker pool.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if !config.server.webhook_path.starts_with('/') {
        return Err(ConfigError::ValidationError(
            "server.webhook_path must start with '/'".to_string(),
        ));
    }

    let url = config.plex.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "plex.url must start with http:// or https://, got '{}'",
            url
        )));
    }

    if config.plex.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "plex.token cannot be empty".to_string(),
        ));
    }

    if config.opensubtitles.api_key.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "opensubtitles.api_key cannot be empty".to_string(),
        ));
    }

    normalize_languages(&config.subtitles.languages)?;

    if config.subtitles.download_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "subtitles.download_attempts must be at least 1".to_string(),
        ));
    }

    if config.subtitles.session_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "subtitles.session_attempts must be at least 1".to_string(),
        ));
    }

    if config.workers.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "workers.max_concurrent must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Trim, lower-case and deduplicate language codes, keeping the first occurrence.
///
/// Codes must be 2 or 3 ASCII letters. An empty result is an error.
pub fn normalize_languages(languages: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut normalized: Vec<String> = Vec::with_capacity(languages.len());

    for raw in languages {
        let code = raw.trim().to_lowercase();
        if code.is_empty() {
            continue;
        }
        if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::ValidationError(format!(
                "invalid language code '{}' (expected 2-3 letters)",
                raw
            )));
        }
        if !normalized.contains(&code) {
            normalized.push(code);
        }
    }

    if normalized.is_empty() {
        return Err(ConfigError::ValidationError(
            "subtitles.languages must contain at least one language".to_string(),
        ));
    }

    Ok(normalized)
}
