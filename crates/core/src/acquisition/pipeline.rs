//! Per-language subtitle acquisition.
//!
//! Languages are tried in configured order. For each one every provider is
//! searched, candidates are ranked, the existing-subtitle gates are applied,
//! and eligible candidates are downloaded and verified until one sticks.
//! The first language that yields a file ends the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::language::{to_plex_code, LanguageVerifier, Verdict, VerificationError};
use crate::metrics;
use crate::provider::{SearchCandidate, SearchQuery, SubtitleProvider};
use crate::ranking::{rank, score_candidates};
use crate::release::{self, FilenameGuesser, ReleaseFingerprint};
use crate::retry::RetryPolicy;

use super::types::{
    AcquisitionError, AcquisitionOutcome, AcquisitionRequest, AcquisitionSettings, AttemptError,
    DownloadOutcome, MediaLocation, UpgradeReason, SUBTITLE_EXTENSIONS,
};

/// Result of working on a single language.
#[derive(Debug)]
enum LanguageResult {
    Downloaded(DownloadOutcome),
    /// An existing subtitle was not worth replacing; the next language is tried.
    Gated(PathBuf),
    /// No provider returned anything.
    NoCandidates,
    /// Every eligible candidate failed to download or verify.
    Exhausted,
}

/// A ranked candidate together with where it came from.
struct Offer {
    candidate: SearchCandidate,
    provider: Arc<dyn SubtitleProvider>,
    auth_token: Option<String>,
}

pub struct AcquisitionPipeline {
    providers: Vec<Arc<dyn SubtitleProvider>>,
    verifier: Arc<dyn LanguageVerifier>,
    guesser: Arc<dyn FilenameGuesser>,
    settings: AcquisitionSettings,
    download_retry: RetryPolicy,
}

impl AcquisitionPipeline {
    pub fn new(
        providers: Vec<Arc<dyn SubtitleProvider>>,
        verifier: Arc<dyn LanguageVerifier>,
        guesser: Arc<dyn FilenameGuesser>,
        settings: AcquisitionSettings,
    ) -> Result<Self, AcquisitionError> {
        let download_retry =
            RetryPolicy::new(settings.download_attempts, settings.download_base_delay)?
                .retry_on(&[ErrorKind::ProviderCommunication, ErrorKind::Verification]);

        Ok(Self {
            providers,
            verifier,
            guesser,
            settings,
            download_retry,
        })
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Run the pipeline for one media file.
    pub async fn acquire(
        &self,
        request: &AcquisitionRequest,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let start = Instant::now();
        let result = self.run(request).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::ACQUISITIONS.with_label_values(&[label]).inc();
        metrics::ACQUISITION_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    async fn run(
        &self,
        request: &AcquisitionRequest,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let location = self.locate(&request.media_path).await?;
        info!(media = %location.base_name, "Processing media");

        let Some(primary) = self.settings.languages.first() else {
            warn!("No languages configured");
            return Err(AcquisitionError::NoLanguages);
        };

        if let Some(existing) = location.existing_for(primary) {
            info!(language = %primary, path = %existing.display(), "Subtitle for primary language already exists");
            if !self.settings.use_release_matching {
                info!("Release matching disabled, keeping existing subtitle");
                return Ok(kept(primary, existing));
            }
        }

        let fingerprint = if self.settings.use_release_matching {
            let fingerprint = release::extract(self.guesser.as_ref(), &location.base_name);
            if !fingerprint.is_empty() {
                info!(tokens = ?fingerprint.tokens(), "Release info detected");
            }
            fingerprint
        } else {
            ReleaseFingerprint::default()
        };

        let mut gated: Option<(&str, PathBuf)> = None;
        for (index, language) in self.settings.languages.iter().enumerate() {
            let is_primary = index == 0;
            let existing = location.existing_for(language);

            if is_primary {
                if let Some(existing) = existing {
                    if !self.settings.use_release_matching || !self.settings.upgrade_on_perfect_match {
                        info!(language = %language, "Upgrades disabled, keeping existing subtitle");
                        return Ok(kept(language, existing));
                    }
                }
            } else {
                info!(language = %language, "Nothing acquired for previous languages, trying next");
            }

            match self
                .acquire_language(request, &location, language, &fingerprint, existing)
                .await
            {
                LanguageResult::Downloaded(outcome) => {
                    return Ok(AcquisitionOutcome::Downloaded(outcome))
                }
                LanguageResult::Gated(path) => {
                    debug!(language = %language, "Existing subtitle kept");
                    if gated.is_none() {
                        gated = Some((language.as_str(), path));
                    }
                }
                LanguageResult::NoCandidates => {
                    debug!(language = %language, "No candidates");
                }
                LanguageResult::Exhausted => {
                    warn!(language = %language, "All download attempts failed");
                }
            }
        }

        if let Some((language, path)) = gated {
            info!(language, "No replacement acquired, keeping existing subtitle");
            return Ok(kept(language, &path));
        }

        warn!("No subtitles found from any provider for any language");
        Ok(AcquisitionOutcome::NotFound)
    }

    /// Split the media path and probe for existing sidecar subtitles.
    async fn locate(&self, media_path: &Path) -> Result<MediaLocation, AcquisitionError> {
        let base_name = media_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AcquisitionError::InvalidMediaPath(media_path.to_path_buf()))?
            .to_string();
        let dir = media_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut existing = HashMap::new();
        for language in &self.settings.languages {
            for ext in SUBTITLE_EXTENSIONS {
                let candidate = dir.join(format!("{}.{}.{}", base_name, language, ext));
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    existing.insert(language.clone(), candidate);
                    break;
                }
            }
        }

        Ok(MediaLocation {
            dir,
            base_name,
            existing,
        })
    }

    async fn acquire_language(
        &self,
        request: &AcquisitionRequest,
        location: &MediaLocation,
        language: &str,
        fingerprint: &ReleaseFingerprint,
        existing: Option<&Path>,
    ) -> LanguageResult {
        let offers = self
            .search_all(request, location, language, fingerprint)
            .await;
        metrics::CANDIDATES_FOUND
            .with_label_values(&[language])
            .observe(offers.len() as f64);

        let Some(best) = offers.first() else {
            info!(language, "No subtitles found");
            return LanguageResult::NoCandidates;
        };
        let has_perfect_match = offers.iter().any(|o| o.candidate.perfect_match);
        let best_popularity = best.candidate.popularity;

        // Gate replacement of an existing subtitle
        let popular_upgrade = match existing {
            None => false,
            Some(path) if !has_perfect_match => {
                let threshold = self.settings.popular_download_threshold;
                if !self.settings.upgrade_on_popular {
                    info!("Existing subtitle found and no perfect match available, skipping download");
                    return LanguageResult::Gated(path.to_path_buf());
                }
                if best_popularity < threshold {
                    info!(
                        downloads = best_popularity,
                        threshold,
                        "No perfect match and best alternative is not popular enough, skipping download"
                    );
                    return LanguageResult::Gated(path.to_path_buf());
                }
                info!(
                    downloads = best_popularity,
                    threshold, "No perfect match, upgrading to popular subtitle"
                );
                true
            }
            Some(path) => {
                if !self.settings.upgrade_on_perfect_match {
                    info!("Perfect match found but upgrade on perfect match is disabled");
                    return LanguageResult::Gated(path.to_path_buf());
                }
                false
            }
        };

        let output = location.output_path(language);
        for (rank_index, offer) in offers.iter().enumerate() {
            let candidate = &offer.candidate;
            if existing.is_some() && !candidate.perfect_match {
                // Popularity upgrades only ever try the top-ranked candidate
                if !popular_upgrade || rank_index != 0 {
                    debug!(provider = %candidate.provider, id = %candidate.id, "Skipping non-perfect match");
                    continue;
                }
            }

            info!(
                provider = %candidate.provider,
                filename = %candidate.filename,
                perfect_match = candidate.perfect_match,
                downloads = candidate.popularity,
                "Attempting download"
            );

            match self.download_with_retry(offer, &output, language).await {
                Ok(()) => {
                    metrics::DOWNLOADS
                        .with_label_values(&[candidate.provider.as_str(), "success"])
                        .inc();
                    let upgrade_reason = existing.map(|_| {
                        if candidate.perfect_match {
                            UpgradeReason::PerfectMatch
                        } else {
                            UpgradeReason::Popular
                        }
                    });
                    if let (Some(old), Some(reason)) = (existing, upgrade_reason) {
                        // A popular replacement leaves other sidecar formats alone
                        if candidate.perfect_match {
                            remove_replaced(old, &output).await;
                        }
                        metrics::UPGRADES.with_label_values(&[reason.as_str()]).inc();
                    }

                    info!(language, provider = %candidate.provider, path = %output.display(), "Subtitle acquired");
                    return LanguageResult::Downloaded(DownloadOutcome {
                        path: output.clone(),
                        language: language.to_string(),
                        language_code: to_plex_code(language),
                        provider: candidate.provider.clone(),
                        release: candidate.release.clone(),
                        perfect_match: candidate.perfect_match,
                        upgraded: upgrade_reason.is_some(),
                        upgrade_reason,
                    });
                }
                Err(e) => {
                    metrics::DOWNLOADS
                        .with_label_values(&[candidate.provider.as_str(), "failed"])
                        .inc();
                    warn!(provider = %candidate.provider, id = %candidate.id, error = %e, "Download failed");
                }
            }
        }

        LanguageResult::Exhausted
    }

    /// Query every provider concurrently; failures are logged and skipped.
    async fn search_all(
        &self,
        request: &AcquisitionRequest,
        location: &MediaLocation,
        language: &str,
        fingerprint: &ReleaseFingerprint,
    ) -> Vec<Offer> {
        let query = SearchQuery {
            title: request.title.clone(),
            year: request.year,
            imdb_id: request.imdb_id.clone(),
            language: language.to_string(),
            fingerprint: fingerprint.clone(),
            filename: Some(location.base_name.clone()),
        };

        let searches = self.providers.iter().map(|provider| {
            let query = &query;
            async move {
                info!(provider = provider.name(), language = %query.language, "Searching provider");
                (provider, provider.search(query).await)
            }
        });

        let mut tokens: HashMap<String, Option<String>> = HashMap::new();
        let mut candidates: Vec<SearchCandidate> = Vec::new();
        let mut sources: HashMap<String, Arc<dyn SubtitleProvider>> = HashMap::new();

        for (provider, result) in join_all(searches).await {
            let name = provider.name().to_string();
            match result {
                Ok(response) => {
                    tokens.insert(name.clone(), response.auth_token);
                    sources.insert(name.clone(), Arc::clone(provider));
                    candidates.extend(response.candidates.into_iter().map(|mut c| {
                        c.provider = name.clone();
                        c
                    }));
                }
                Err(e) => {
                    metrics::PROVIDER_SEARCH_FAILURES
                        .with_label_values(&[name.as_str()])
                        .inc();
                    warn!(provider = %name, error = %e, "Provider search failed");
                }
            }
        }

        score_candidates(&mut candidates, fingerprint);
        rank(candidates)
            .into_iter()
            .filter_map(|candidate| {
                let provider = sources.get(&candidate.provider).cloned()?;
                let auth_token = tokens.get(&candidate.provider).cloned().flatten();
                Some(Offer {
                    candidate,
                    provider,
                    auth_token,
                })
            })
            .collect()
    }

    /// Download and verify as one retried unit.
    async fn download_with_retry(
        &self,
        offer: &Offer,
        output: &Path,
        language: &str,
    ) -> Result<(), AttemptError> {
        self.download_retry
            .execute_with(
                || self.download_and_verify(offer, output, language),
                |attempt, delay, e| {
                    metrics::RETRY_ATTEMPTS.with_label_values(&["download"]).inc();
                    warn!(
                        provider = %offer.candidate.provider,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Download attempt failed, retrying"
                    );
                },
            )
            .await
    }

    async fn download_and_verify(
        &self,
        offer: &Offer,
        output: &Path,
        language: &str,
    ) -> Result<(), AttemptError> {
        offer
            .provider
            .download(&offer.candidate, output, offer.auth_token.as_deref())
            .await?;

        match self.verifier.verify(output, language).await? {
            Verdict::Match | Verdict::Undetermined => Ok(()),
            Verdict::Mismatch { detected } => {
                metrics::VERIFICATION_FAILURES.inc();
                warn!(expected = language, detected = %detected, "Language verification failed, removing file");
                if let Err(e) = tokio::fs::remove_file(output).await {
                    warn!(path = %output.display(), error = %e, "Could not remove rejected subtitle");
                }
                Err(VerificationError::Mismatch {
                    expected: language.to_string(),
                    detected,
                }
                .into())
            }
        }
    }
}

fn kept(language: &str, path: &Path) -> AcquisitionOutcome {
    AcquisitionOutcome::KeptExisting {
        language: language.to_string(),
        path: path.to_path_buf(),
    }
}

/// Remove the subtitle an upgrade replaced, unless it was overwritten in place.
async fn remove_replaced(old: &Path, new: &Path) {
    if old == new {
        return;
    }
    match tokio::fs::remove_file(old).await {
        Ok(()) => info!(path = %old.display(), "Removed old subtitle"),
        Err(e) => warn!(path = %old.display(), error = %e, "Could not remove old subtitle"),
    }
}
