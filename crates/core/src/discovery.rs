//! Library discovery and path-mapping validation.
//!
//! Lets an operator see which folders Plex serves and whether the service
//! can reach them through the configured path mappings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{Classify, ErrorKind};
use crate::plex::{MediaServer, PlexError};
use crate::pool::{PoolError, WorkerPool};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("media server error: {0}")]
    MediaServer(#[from] PlexError),

    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("no paths to validate and no test file configured")]
    NoPaths,
}

impl Classify for DiscoveryError {
    fn kind(&self) -> ErrorKind {
        match self {
            DiscoveryError::MediaServer(e) => e.kind(),
            DiscoveryError::Pool(e) => e.kind(),
            DiscoveryError::NoPaths => ErrorKind::Configuration,
        }
    }
}

/// A library folder as Plex reports it, next to where we expect to find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationInfo {
    pub id: String,
    pub plex_path: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryInfo {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
    pub agent: String,
    pub scanner: String,
    pub language: String,
    pub locations: Vec<LocationInfo>,
}

/// List library sections with every location translated through the path mappings.
pub async fn list_libraries(server: &dyn MediaServer) -> Result<Vec<LibraryInfo>, DiscoveryError> {
    let sections = server.library_sections().await?;
    info!(count = sections.len(), "Discovered library sections");

    Ok(sections
        .into_iter()
        .map(|section| LibraryInfo {
            locations: section
                .locations
                .into_iter()
                .map(|loc| LocationInfo {
                    local_path: server.map_path(&loc.path),
                    id: loc.id,
                    plex_path: loc.path,
                })
                .collect(),
            key: section.key,
            title: section.title,
            section_type: section.section_type,
            agent: section.agent,
            scanner: section.scanner,
            language: section.language,
        })
        .collect())
}

/// Accessibility of one mapped path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCheck {
    pub plex_path: String,
    pub mapped_path: PathBuf,
    pub exists: bool,
    pub is_file: bool,
    pub is_directory: bool,
    pub readable: bool,
    pub writable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PathCheck {
    pub fn passed(&self) -> bool {
        self.exists && self.readable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub writable: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub summary: ValidationSummary,
    pub checks: Vec<PathCheck>,
}

impl ValidationReport {
    fn from_checks(checks: Vec<PathCheck>) -> Self {
        let passed = checks.iter().filter(|c| c.passed()).count();
        let summary = ValidationSummary {
            total: checks.len(),
            passed,
            failed: checks.len() - passed,
            writable: checks.iter().filter(|c| c.writable).count(),
        };
        Self {
            valid: summary.failed == 0 && summary.passed > 0,
            summary,
            checks,
        }
    }
}

/// Map each Plex path and probe it on the blocking pool.
///
/// Falls back to `test_file` when `paths` is empty.
pub async fn validate_paths(
    server: &dyn MediaServer,
    pool: &WorkerPool,
    paths: &[String],
    test_file: Option<&Path>,
) -> Result<ValidationReport, DiscoveryError> {
    let paths: Vec<String> = if paths.is_empty() {
        match test_file {
            Some(file) => vec![file.to_string_lossy().into_owned()],
            None => return Err(DiscoveryError::NoPaths),
        }
    } else {
        paths.to_vec()
    };

    let targets: Vec<(String, PathBuf)> = paths
        .into_iter()
        .map(|p| {
            let mapped = server.map_path(&p);
            (p, mapped)
        })
        .collect();

    let checks = pool
        .run_blocking(move || {
            targets
                .into_iter()
                .map(|(plex_path, mapped)| check_path(plex_path, mapped))
                .collect::<Vec<_>>()
        })
        .await?;

    let report = ValidationReport::from_checks(checks);
    info!(
        total = report.summary.total,
        passed = report.summary.passed,
        "Path validation finished"
    );
    Ok(report)
}

/// Probe a local path on the filesystem.
pub fn check_path(plex_path: String, mapped_path: PathBuf) -> PathCheck {
    let meta = match fs::metadata(&mapped_path) {
        Ok(meta) => meta,
        Err(e) => {
            debug!(path = %mapped_path.display(), error = %e, "Path not accessible");
            return PathCheck {
                error: Some(format!("path does not exist: {}", mapped_path.display())),
                plex_path,
                mapped_path,
                exists: false,
                is_file: false,
                is_directory: false,
                readable: false,
                writable: false,
            };
        }
    };

    let readable = if meta.is_dir() {
        fs::read_dir(&mapped_path).is_ok()
    } else {
        fs::File::open(&mapped_path).is_ok()
    };

    // Subtitles land next to the media file, so a file is writable when its folder is.
    let write_target = if meta.is_dir() {
        Some(mapped_path.as_path())
    } else {
        mapped_path.parent()
    };
    let writable = write_target
        .and_then(|dir| fs::metadata(dir).ok())
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false);

    PathCheck {
        plex_path,
        exists: true,
        is_file: meta.is_file(),
        is_directory: meta.is_dir(),
        readable,
        writable,
        error: None,
        mapped_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockMediaServer};
    use std::collections::BTreeMap;

    fn server_for(dir: &Path) -> MockMediaServer {
        let mut mappings = BTreeMap::new();
        mappings.insert("/plex/movies".to_string(), dir.display().to_string());
        MockMediaServer::with_mappings(&mappings)
    }

    #[tokio::test]
    async fn test_list_libraries_maps_locations() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());
        server.set_libraries(vec![fixtures::library_section(
            "1",
            "Movies",
            &["/plex/movies", "/other"],
        )])
        .await;

        let libraries = list_libraries(&server).await.unwrap();
        assert_eq!(libraries.len(), 1);
        assert_eq!(libraries[0].title, "Movies");
        assert_eq!(libraries[0].locations[0].local_path, dir.path());
        assert_eq!(libraries[0].locations[1].local_path, PathBuf::from("/other"));
    }

    #[tokio::test]
    async fn test_validate_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Heat.mkv"), b"video").unwrap();
        let server = server_for(dir.path());
        let pool = WorkerPool::new(1).unwrap();

        let report = validate_paths(
            &server,
            &pool,
            &["/plex/movies/Heat.mkv".to_string()],
            None,
        )
        .await
        .unwrap();

        assert!(report.valid);
        let check = &report.checks[0];
        assert_eq!(check.mapped_path, dir.path().join("Heat.mkv"));
        assert!(check.exists && check.is_file && check.readable);
        assert!(!check.is_directory);
        assert!(check.error.is_none());
    }

    #[tokio::test]
    async fn test_validate_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());
        let pool = WorkerPool::new(1).unwrap();

        let report = validate_paths(
            &server,
            &pool,
            &["/plex/movies/missing.mkv".to_string()],
            None,
        )
        .await
        .unwrap();

        assert!(!report.valid);
        assert_eq!(report.summary.failed, 1);
        assert!(!report.checks[0].exists);
        assert!(report.checks[0].error.is_some());
    }

    #[tokio::test]
    async fn test_validate_falls_back_to_test_file() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_for(dir.path());
        let pool = WorkerPool::new(1).unwrap();

        let report = validate_paths(&server, &pool, &[], Some(Path::new("/plex/movies")))
            .await
            .unwrap();
        assert_eq!(report.summary.total, 1);
        assert!(report.checks[0].is_directory);
    }

    #[tokio::test]
    async fn test_validate_without_paths_fails() {
        let server = MockMediaServer::new();
        let pool = WorkerPool::new(1).unwrap();
        let result = validate_paths(&server, &pool, &[], None).await;
        assert!(matches!(result, Err(DiscoveryError::NoPaths)));
    }
}
