//! Bearer token cache with single-flight refresh.
//!
//! Readers take the fast path through an `RwLock` while the cached token is
//! unexpired. On a miss, callers serialize on the refresh mutex and re-check
//! before logging in, so concurrent callers share one login per expiry
//! window.

use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    ValidUntil {
        token: String,
        expires_at: DateTime<Utc>,
    },
    /// A login is in flight.
    Refreshing,
}

#[derive(Debug)]
pub struct TokenCache {
    state: RwLock<TokenState>,
    refresh: Mutex<()>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            state: RwLock::new(TokenState::NoToken),
            refresh: Mutex::new(()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::weeks(52 * 100)),
        }
    }

    pub fn state(&self) -> TokenState {
        self.read().clone()
    }

    /// The cached token if it has not expired.
    pub fn current(&self) -> Option<String> {
        match &*self.read() {
            TokenState::ValidUntil { token, expires_at } if Utc::now() < *expires_at => {
                Some(token.clone())
            }
            _ => None,
        }
    }

    /// Return the cached token, or run `login` to obtain a fresh one.
    ///
    /// `login` runs at most once across all callers racing on the same
    /// expired state. A failed login leaves the cache empty.
    pub async fn get_or_refresh<F, Fut, E>(&self, login: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(token) = self.current() {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.current() {
            debug!("Token refreshed by another caller");
            return Ok(token);
        }

        *self.write() = TokenState::Refreshing;
        match login().await {
            Ok(token) => {
                let expires_at = Utc::now()
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                *self.write() = TokenState::ValidUntil {
                    token: token.clone(),
                    expires_at,
                };
                info!(%expires_at, "Obtained new auth token");
                Ok(token)
            }
            Err(e) => {
                *self.write() = TokenState::NoToken;
                Err(e)
            }
        }
    }

    /// Drop `stale` if it is still the cached token. A token already replaced
    /// by another caller's refresh is left alone.
    pub fn invalidate(&self, stale: &str) {
        let mut state = self.write();
        if matches!(&*state, TokenState::ValidUntil { token, .. } if token == stale) {
            debug!("Invalidating rejected auth token");
            *state = TokenState::NoToken;
        }
    }

    pub fn clear(&self) {
        *self.write() = TokenState::NoToken;
    }

    fn read(&self) -> RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
