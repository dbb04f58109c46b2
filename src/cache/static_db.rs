use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::api;
use crate::error::Error;
use crate::http::VaultHttp;
use crate::util::now;

/// Hard refresh interval (§4.5): static credentials rotate on a
/// service-owned schedule orders of magnitude slower than dynamic ones, so
/// a coarse five-minute floor is enough.
const STALE_INTERVAL_SECS: u64 = 300;

/// One static-database cache entry.
#[derive(Debug, Clone)]
pub struct StaticDbEntry {
    /// The cached `data` subobject (fields include `username`, `password`,
    /// `ttl`), or `None` before the first refresh.
    pub document: Option<Arc<Value>>,
    /// Unix timestamp of the last successful refresh.
    pub last_refresh: u64,
    /// Resolved path this cache reads from, e.g.
    /// `app-database/static-creds/svc`.
    pub path: String,
}

impl StaticDbEntry {
    fn empty(path: String) -> Self {
        Self {
            document: None,
            last_refresh: 0,
            path,
        }
    }
}

/// Interval-refreshed cache for static database credentials (§4.5).
pub struct StaticDbCache {
    entry: ArcSwap<StaticDbEntry>,
}

impl StaticDbCache {
    /// Builds an empty cache bound to the given resolved path.
    pub fn new(path: String) -> Self {
        Self {
            entry: ArcSwap::from_pointee(StaticDbEntry::empty(path)),
        }
    }

    /// Current cache snapshot, for foreground reporting or tests.
    pub fn snapshot(&self) -> Arc<StaticDbEntry> {
        self.entry.load_full()
    }

    /// Stale when nothing is cached yet, or the five-minute interval has
    /// elapsed since the last refresh (boundary: exactly 300s counts as
    /// stale, per §8).
    pub fn is_stale(&self) -> bool {
        let current = self.entry.load_full();
        current.document.is_none()
            || now().saturating_sub(current.last_refresh) >= STALE_INTERVAL_SECS
    }

    /// `refresh_static()` (§4.5): unconditionally re-reads and replaces the
    /// cached `data` subobject.
    pub async fn refresh(&self, http: &VaultHttp, token: &str) -> Result<(), Error> {
        let current = self.entry.load_full();
        let data = api::static_read(http, token, &current.path).await?;

        self.entry.store(Arc::new(StaticDbEntry {
            document: Some(Arc::new(data)),
            last_refresh: now(),
            path: current.path.clone(),
        }));
        tracing::info!(target: "vault_agent::static_db", "static credentials refreshed");

        Ok(())
    }

    /// `get_static()`: refresh if stale, then return the cached document.
    pub async fn get(&self, http: &VaultHttp, token: &str) -> Result<Arc<Value>, Error> {
        if self.is_stale() {
            if let Err(e) = self.refresh(http, token).await {
                let current = self.entry.load_full();
                match &current.document {
                    Some(doc) => {
                        tracing::warn!(target: "vault_agent::static_db", error = %e, "refresh failed, serving stale credentials");
                        return Ok(doc.clone());
                    }
                    None => {
                        tracing::error!(target: "vault_agent::static_db", error = %e, "refresh failed with no cached credentials");
                        return Err(Error::Unavailable("static database credentials"));
                    }
                }
            }
        }

        let current = self.entry.load_full();
        current
            .document
            .clone()
            .ok_or(Error::Unavailable("static database credentials"))
    }
}
