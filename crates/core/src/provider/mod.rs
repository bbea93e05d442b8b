//! Subtitle providers.
//!
//! The provider set is fixed at startup: a list of [`SubtitleProvider`]
//! trait objects queried in order for every language.

mod opensubtitles;
mod token;
mod types;

use std::sync::Arc;

pub use opensubtitles::OpenSubtitlesProvider;
pub use token::{TokenCache, TokenState};
pub use types::*;

use crate::config::Config;

/// Providers enabled by configuration, in query order.
pub fn build_providers(config: &Config) -> Result<Vec<Arc<dyn SubtitleProvider>>, ProviderError> {
    let opensubtitles = OpenSubtitlesProvider::new(config.opensubtitles.clone())?;
    Ok(vec![Arc::new(opensubtitles)])
}
