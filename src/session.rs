//! The session façade (§4.7): the single entity every worker and the
//! foreground consumer interact with.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{DynamicDbCache, KvCache, StaticDbCache};
use crate::config::Configuration;
use crate::error::Error;
use crate::http::VaultHttp;
use crate::token::{TokenManager, TokenRecord};

/// The process-wide authenticated context: token plus the three caches,
/// all sharing one HTTP client and one configuration. Created once at
/// startup, logged in exactly once, then handed to the scheduler as an
/// `Arc<Session>`.
pub struct Session {
    config: Arc<Configuration>,
    http: VaultHttp,
    token: TokenManager,
    kv: KvCache,
    dynamic_db: DynamicDbCache,
    static_db: StaticDbCache,
}

impl Session {
    /// Builds a session bound to the given configuration. Does not log in;
    /// call [`Session::login`] before any other operation.
    pub fn new(config: Configuration) -> Result<Self, Error> {
        let http = VaultHttp::new(
            &config.vault_url,
            &config.vault_namespace,
            config.http_timeout,
            config.max_response_size,
        )?;

        let token = TokenManager::new(http.clone(), config.role_id.clone(), config.secret_id.clone());
        let kv = KvCache::new(config.kv_path());
        let dynamic_db = DynamicDbCache::new(config.dynamic_db_path(), config.kv.refresh_interval);
        let static_db = StaticDbCache::new(config.static_db_path());

        Ok(Self {
            config: Arc::new(config),
            http,
            token,
            kv,
            dynamic_db,
            static_db,
        })
    }

    /// The resolved configuration this session was built from.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The single, mandatory AppRole login. Must succeed before any other
    /// session operation is attempted.
    pub async fn login(&self) -> Result<(), Error> {
        self.token.login().await
    }

    /// A lock-free snapshot of the current token. Safe to call from any
    /// worker at any time.
    pub fn token_snapshot(&self) -> Arc<TokenRecord> {
        self.token.snapshot()
    }

    /// One tick of the token lifecycle (§4.2). Returns `Err(Error::Auth)`
    /// only on the fatal renew-then-re-login failure path.
    pub async fn tick_token(&self) -> Result<(), Error> {
        self.token.tick().await
    }

    /// `refresh_kv()` (§4.3).
    pub async fn refresh_kv(&self) -> Result<(), Error> {
        let token = self.token.snapshot();
        self.kv.refresh(&self.http, &token.token).await
    }

    /// `get_kv()` (§4.3).
    pub async fn get_kv(&self) -> Result<Arc<Value>, Error> {
        let token = self.token.snapshot();
        self.kv.get(&self.http, &token.token).await
    }

    /// `refresh_dyn()` (§4.4).
    pub async fn refresh_dynamic_db(&self) -> Result<(), Error> {
        let token = self.token.snapshot();
        self.dynamic_db.refresh(&self.http, &token.token).await
    }

    /// `get_dyn()` (§4.4).
    pub async fn get_dynamic_db(&self) -> Result<Arc<Value>, Error> {
        let token = self.token.snapshot();
        self.dynamic_db.get(&self.http, &token.token).await
    }

    /// `refresh_static()` (§4.5).
    pub async fn refresh_static_db(&self) -> Result<(), Error> {
        let token = self.token.snapshot();
        self.static_db.refresh(&self.http, &token.token).await
    }

    /// `get_static()` (§4.5).
    pub async fn get_static_db(&self) -> Result<Arc<Value>, Error> {
        let token = self.token.snapshot();
        self.static_db.get(&self.http, &token.token).await
    }

    /// Snapshot of the KV cache, for the foreground loop.
    pub fn kv_snapshot(&self) -> Arc<crate::cache::KvEntry> {
        self.kv.snapshot()
    }

    /// Snapshot of the dynamic DB cache, for the foreground loop.
    pub fn dynamic_db_snapshot(&self) -> Arc<crate::cache::DynamicDbEntry> {
        self.dynamic_db.snapshot()
    }

    /// Snapshot of the static DB cache, for the foreground loop.
    pub fn static_db_snapshot(&self) -> Arc<crate::cache::StaticDbEntry> {
        self.static_db.snapshot()
    }

    /// Consumes the session, releasing cached documents in the order the
    /// façade contract requires (KV, dynamic, static) before the HTTP
    /// executor. All fields are safe to drop unconditionally at this point
    /// since the scheduler only calls this after every worker has joined.
    pub fn shutdown(self) {
        tracing::info!(target: "vault_agent::session", "releasing session state");
        drop(self.kv);
        drop(self.dynamic_db);
        drop(self.static_db);
        drop(self.token);
        drop(self.http);
    }
}
