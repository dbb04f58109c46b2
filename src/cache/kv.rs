use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::api;
use crate::error::Error;
use crate::http::VaultHttp;
use crate::util::now;

/// −1 sentinel meaning "no version seen yet".
const NO_VERSION: i64 = -1;

/// One KV v2 cache entry: the cached `data.data` payload (if any), its
/// version, and when it was last checked.
#[derive(Debug, Clone)]
pub struct KvEntry {
    /// The cached secret payload (`data.data`), or `None` before the first
    /// successful refresh.
    pub document: Option<Arc<Value>>,
    /// The KV v2 version of `document`, or `-1` if nothing is cached yet.
    pub version: i64,
    /// Unix timestamp of the last successful refresh attempt.
    pub last_refresh: u64,
    /// Resolved path this cache reads from, e.g. `app-kv/data/db/creds`.
    pub path: String,
}

impl KvEntry {
    fn empty(path: String) -> Self {
        Self {
            document: None,
            version: NO_VERSION,
            last_refresh: 0,
            path,
        }
    }
}

/// Version-tracked cache for a single KV v2 path (§4.3).
pub struct KvCache {
    entry: ArcSwap<KvEntry>,
}

impl KvCache {
    /// Builds an empty cache bound to the given resolved path.
    pub fn new(path: String) -> Self {
        Self {
            entry: ArcSwap::from_pointee(KvEntry::empty(path)),
        }
    }

    /// Current cache snapshot, for foreground reporting or tests.
    pub fn snapshot(&self) -> Arc<KvEntry> {
        self.entry.load_full()
    }

    /// The KV cache is always considered stale on read (§4.3): every read
    /// re-checks the version with the service. The version comparison in
    /// [`KvCache::refresh`] is what actually decides whether the document
    /// is replaced, giving read-your-writes promptness without payload
    /// churn when nothing changed. This predicate is intentionally
    /// vacuous — see DESIGN.md.
    pub fn is_stale(&self) -> bool {
        true
    }

    /// Executes `refresh_kv()` (§4.3): fetch, compare version, replace the
    /// document only if the version actually changed (or nothing was
    /// cached yet).
    pub async fn refresh(&self, http: &VaultHttp, token: &str) -> Result<(), Error> {
        let current = self.entry.load_full();
        let body = api::kv_read(http, token, &current.path).await?;

        let version = body
            .pointer("/data/metadata/version")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::Parse {
                operation: "kv_read",
                reason: "missing field `data.metadata.version`".to_string(),
            })?;
        let data = body
            .pointer("/data/data")
            .ok_or_else(|| Error::Parse {
                operation: "kv_read",
                reason: "missing field `data.data`".to_string(),
            })?
            .clone();

        let now = now();
        if version != current.version || current.document.is_none() {
            self.entry.store(Arc::new(KvEntry {
                document: Some(Arc::new(data)),
                version,
                last_refresh: now,
                path: current.path.clone(),
            }));
            tracing::info!(target: "vault_agent::kv", version, "kv document replaced");
        } else {
            self.entry.store(Arc::new(KvEntry {
                document: current.document.clone(),
                version: current.version,
                last_refresh: now,
                path: current.path.clone(),
            }));
            tracing::debug!(target: "vault_agent::kv", version, "kv version unchanged, no-op");
        }

        Ok(())
    }

    /// `get_kv()` (§4.3): refresh (the cache is always stale), then return
    /// the cached document. If refresh failed and nothing was ever cached,
    /// returns `Unavailable`.
    pub async fn get(&self, http: &VaultHttp, token: &str) -> Result<Arc<Value>, Error> {
        if self.is_stale() {
            if let Err(e) = self.refresh(http, token).await {
                let current = self.entry.load_full();
                match &current.document {
                    Some(doc) => {
                        tracing::warn!(target: "vault_agent::kv", error = %e, "refresh failed, serving stale document");
                        return Ok(doc.clone());
                    }
                    None => {
                        tracing::error!(target: "vault_agent::kv", error = %e, "refresh failed with no cached document");
                        return Err(Error::Unavailable("kv document"));
                    }
                }
            }
        }

        let current = self.entry.load_full();
        current
            .document
            .clone()
            .ok_or(Error::Unavailable("kv document"))
    }
}
