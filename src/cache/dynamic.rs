use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::api;
use crate::error::Error;
use crate::http::VaultHttp;
use crate::util::now;

/// Floor below which a lease is considered too close to expiry to hand out
/// (§4.4): credentials within 10 seconds of expiring are refreshed rather
/// than served, so a consumer doesn't receive something that dies mid-use.
const LEASE_FLOOR_SECS: u64 = 10;

/// One dynamic-database cache entry: the minted credentials (if any), the
/// lease backing them, and when each side was last checked.
#[derive(Debug, Clone)]
pub struct DynamicDbEntry {
    /// The cached credentials document (`data.{username,password}` and
    /// whatever else the mount returns), or `None` before the first mint.
    pub document: Option<Arc<Value>>,
    /// The lease id backing `document`; empty string means "none".
    pub lease_id: String,
    /// Unix timestamp the lease is expected to expire, or 0 if not yet
    /// looked up.
    pub lease_expiry: u64,
    /// Unix timestamp of the last successful refresh attempt (mint or
    /// lease-lookup no-op).
    pub last_refresh: u64,
    /// Resolved path this cache reads from, e.g.
    /// `app-database/creds/readonly`.
    pub path: String,
}

impl DynamicDbEntry {
    fn empty(path: String) -> Self {
        Self {
            document: None,
            lease_id: String::new(),
            lease_expiry: 0,
            last_refresh: 0,
            path,
        }
    }
}

/// Lease-TTL-based cache for dynamic database credentials (§4.4).
pub struct DynamicDbCache {
    entry: ArcSwap<DynamicDbEntry>,
    /// Fallback interval-based staleness check when `lease_lookup` itself
    /// is unreachable (§4.4's third staleness condition). This borrows the
    /// KV refresh interval by design — see DESIGN.md.
    fallback_interval: u64,
}

impl DynamicDbCache {
    /// Builds an empty cache bound to the given resolved path.
    pub fn new(path: String, fallback_interval: u64) -> Self {
        Self {
            entry: ArcSwap::from_pointee(DynamicDbEntry::empty(path)),
            fallback_interval,
        }
    }

    /// Current cache snapshot, for foreground reporting or tests.
    pub fn snapshot(&self) -> Arc<DynamicDbEntry> {
        self.entry.load_full()
    }

    /// `refresh_dyn()` (§4.4): if a lease exists, look up its remaining
    /// TTL; if it still has headroom, just touch `last_refresh` and return.
    /// Otherwise mint fresh credentials and look up the new lease's expiry.
    pub async fn refresh(&self, http: &VaultHttp, token: &str) -> Result<(), Error> {
        let current = self.entry.load_full();
        let now_ts = now();

        if current.document.is_some() && !current.lease_id.is_empty() {
            match api::lease_lookup(http, token, &current.lease_id).await {
                Ok(ttl) if ttl > LEASE_FLOOR_SECS => {
                    self.entry.store(Arc::new(DynamicDbEntry {
                        document: current.document.clone(),
                        lease_id: current.lease_id.clone(),
                        lease_expiry: current.lease_expiry,
                        last_refresh: now_ts,
                        path: current.path.clone(),
                    }));
                    tracing::debug!(target: "vault_agent::dynamic_db", ttl, "lease has headroom, no-op");
                    return Ok(());
                }
                Ok(ttl) => {
                    tracing::info!(target: "vault_agent::dynamic_db", ttl, "lease near expiry, rotating");
                }
                Err(e) => {
                    tracing::warn!(target: "vault_agent::dynamic_db", error = %e, "lease lookup failed, rotating");
                }
            }
        }

        let body = api::dyn_read(http, token, &current.path).await?;
        let lease_id = body
            .get("lease_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Parse {
                operation: "dyn_read",
                reason: "missing field `lease_id`".to_string(),
            })?
            .to_string();
        let data = body
            .get("data")
            .ok_or_else(|| Error::Parse {
                operation: "dyn_read",
                reason: "missing field `data`".to_string(),
            })?
            .clone();

        let now_ts = now();
        let lease_expiry = match api::lease_lookup(http, token, &lease_id).await {
            Ok(ttl) => now_ts + ttl,
            Err(e) => {
                tracing::warn!(
                    target: "vault_agent::dynamic_db",
                    error = %e,
                    "follow-up lease lookup failed; falling back to interval-based staleness"
                );
                0
            }
        };

        self.entry.store(Arc::new(DynamicDbEntry {
            document: Some(Arc::new(data)),
            lease_id,
            lease_expiry,
            last_refresh: now_ts,
            path: current.path.clone(),
        }));
        tracing::info!(target: "vault_agent::dynamic_db", "dynamic credentials rotated");

        Ok(())
    }

    /// Whether a read should trigger a refresh (§4.4): no document yet, or
    /// a fresh lease lookup would find the lease stale/unreachable.
    pub async fn is_stale(&self, http: &VaultHttp, token: &str) -> bool {
        let current = self.entry.load_full();
        if current.document.is_none() {
            return true;
        }
        if current.lease_id.is_empty() {
            return now().saturating_sub(current.last_refresh) >= self.fallback_interval;
        }

        match api::lease_lookup(http, token, &current.lease_id).await {
            Ok(ttl) => ttl <= LEASE_FLOOR_SECS,
            Err(_) => now().saturating_sub(current.last_refresh) >= self.fallback_interval,
        }
    }

    /// `get_dyn()`: refresh if stale, then return the cached document.
    pub async fn get(&self, http: &VaultHttp, token: &str) -> Result<Arc<Value>, Error> {
        if self.is_stale(http, token).await {
            if let Err(e) = self.refresh(http, token).await {
                let current = self.entry.load_full();
                match &current.document {
                    Some(doc) => {
                        tracing::warn!(target: "vault_agent::dynamic_db", error = %e, "refresh failed, serving stale credentials");
                        return Ok(doc.clone());
                    }
                    None => {
                        tracing::error!(target: "vault_agent::dynamic_db", error = %e, "refresh failed with no cached credentials");
                        return Err(Error::Unavailable("dynamic database credentials"));
                    }
                }
            }
        }

        let current = self.entry.load_full();
        current
            .document
            .clone()
            .ok_or(Error::Unavailable("dynamic database credentials"))
    }
}
