//! Token lifecycle: the renewal state machine from §4.2.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::api;
use crate::error::Error;
use crate::http::VaultHttp;
use crate::util::now;

/// An immutable snapshot of the token and its validity window. Readers
/// `load_full()` one of these before composing request headers so that a
/// concurrent renewal can never produce a torn read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// The opaque client token, or empty before the first login.
    pub token: String,
    /// Unix timestamp at which this token was issued/renewed.
    pub issued: u64,
    /// Unix timestamp at which this token expires.
    pub expiry: u64,
}

impl TokenRecord {
    fn empty() -> Self {
        Self {
            token: String::new(),
            issued: 0,
            expiry: 0,
        }
    }

    /// `token_expiry - token_issued`, saturating at zero so an
    /// already-expired token never underflows.
    pub fn total_ttl(&self) -> u64 {
        self.expiry.saturating_sub(self.issued)
    }

    fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.issued)
    }

    fn renewal_point(&self) -> u64 {
        self.total_ttl() * 4 / 5
    }

    fn urgent_point(&self) -> u64 {
        self.total_ttl() * 9 / 10
    }

    /// The coarse health classification from §4.2's state machine.
    pub fn state(&self, now: u64) -> TokenState {
        let elapsed = self.elapsed(now);
        if elapsed >= self.total_ttl() {
            TokenState::Expired
        } else if elapsed >= self.urgent_point() {
            TokenState::Urgent
        } else if elapsed >= self.renewal_point() {
            TokenState::Renewable
        } else {
            TokenState::Healthy
        }
    }

    /// Whether a renewal attempt is due on this tick. `total_ttl() == 0`
    /// (expiry at or before issue) is immediately renewable, matching the
    /// boundary behavior in §8.
    pub fn renewal_due(&self, now: u64) -> bool {
        self.elapsed(now) >= self.renewal_point()
    }
}

/// `Healthy -> Renewable -> Urgent -> Expired`, driven purely by the ratios
/// in §4.2. `Urgent` is advisory (logged, not acted on specially); renewal
/// is attempted from `Renewable` onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Well within its validity window; no action needed.
    Healthy,
    /// Past the 4/5 renewal point; the next tick will attempt `renew-self`.
    Renewable,
    /// Past the 9/10 point; renewal is overdue and should be watched.
    Urgent,
    /// Past its full TTL; the next tick re-logs in from scratch.
    Expired,
}

/// Owns the current token and drives renewal/re-login. Shared across all
/// workers via `Arc`; only the token worker calls [`TokenManager::tick`].
pub struct TokenManager {
    record: ArcSwap<TokenRecord>,
    http: VaultHttp,
    role_id: String,
    secret_id: String,
}

impl TokenManager {
    /// Builds a manager with no token yet. Call [`TokenManager::login`]
    /// before issuing any other request.
    pub fn new(http: VaultHttp, role_id: String, secret_id: String) -> Self {
        Self {
            record: ArcSwap::from_pointee(TokenRecord::empty()),
            http,
            role_id,
            secret_id,
        }
    }

    /// Returns a cheap, lock-free snapshot of the current token record.
    pub fn snapshot(&self) -> Arc<TokenRecord> {
        self.record.load_full()
    }

    /// Performs the initial AppRole login. The session façade enforces that
    /// this happens exactly once, before any other operation.
    pub async fn login(&self) -> Result<(), Error> {
        let result = api::login(&self.http, &self.role_id, &self.secret_id).await?;
        let now = now();
        self.record.store(Arc::new(TokenRecord {
            token: result.client_token,
            issued: now,
            expiry: now + result.lease_duration,
        }));
        Ok(())
    }

    /// One tick of the token worker (§4.2's policy). Returns `Ok(())` when
    /// the token is healthy or was successfully renewed/re-logged-in.
    /// Returns `Err(Error::Auth)` only when both renewal and re-login have
    /// failed — the sole fatal path, which the caller must turn into a
    /// shutdown request.
    pub async fn tick(&self) -> Result<(), Error> {
        let now = now();
        let current = self.snapshot();

        match current.state(now) {
            TokenState::Healthy => return Ok(()),
            TokenState::Urgent => {
                tracing::warn!(target: "vault_agent::token", "token is in the urgent renewal window");
            }
            _ => {}
        }

        if !current.renewal_due(now) {
            return Ok(());
        }

        match api::renew_self(&self.http, &current.token).await {
            Ok(renewed) => {
                let now = now();
                let expiry = match renewed.lease_duration {
                    Some(d) => now + d,
                    None => {
                        tracing::warn!(
                            target: "vault_agent::token",
                            "renew-self response omitted lease_duration; keeping previous expiry"
                        );
                        current.expiry
                    }
                };
                self.record.store(Arc::new(TokenRecord {
                    token: current.token.clone(),
                    issued: now,
                    expiry,
                }));
                tracing::info!(target: "vault_agent::token", "token renewed");
                Ok(())
            }
            Err(renew_err) => {
                tracing::warn!(target: "vault_agent::token", error = %renew_err, "renew-self failed, attempting re-login");
                match api::login(&self.http, &self.role_id, &self.secret_id).await {
                    Ok(login_result) => {
                        let now = now();
                        self.record.store(Arc::new(TokenRecord {
                            token: login_result.client_token,
                            issued: now,
                            expiry: now + login_result.lease_duration,
                        }));
                        tracing::info!(target: "vault_agent::token", "re-login succeeded after failed renewal");
                        Ok(())
                    }
                    Err(login_err) => {
                        let msg = format!("renew-self: {}; re-login: {}", renew_err, login_err);
                        tracing::error!(target: "vault_agent::token", error = %msg, "fatal auth failure");
                        Err(Error::Auth(msg))
                    }
                }
            }
        }
    }
}
