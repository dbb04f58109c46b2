use thiserror::Error;

/// All failure modes the agent can encounter, from loading configuration
/// through the steady-state refresh loops.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration was missing, malformed, or missing a required field.
    /// Always fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP layer itself failed: timeout, DNS, TLS, connection reset.
    /// Non-fatal for a single call; the caller keeps whatever it had cached.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Vault answered with a non-2xx status code.
    #[error("vault returned HTTP {status} for {operation}: {body}")]
    Http {
        /// The HTTP status code returned by vault.
        status: u16,
        /// Which vault operation was being performed.
        operation: &'static str,
        /// The raw response body, truncated to `max_response_size`.
        body: String,
    },

    /// Vault answered 200 but the body carried a top-level `errors` field.
    #[error("vault api error during {operation}: {0:?}", .messages)]
    Api {
        /// Which vault operation was being performed.
        operation: &'static str,
        /// The `errors` array vault returned.
        messages: Vec<String>,
    },

    /// The response body was not valid JSON, or was missing a field the
    /// operation needed.
    #[error("failed to parse vault response for {operation}: {reason}")]
    Parse {
        /// Which vault operation was being performed.
        operation: &'static str,
        /// A human-readable description of what was missing or malformed.
        reason: String,
    },

    /// Token renewal failed *and* the subsequent re-login also failed. The
    /// only error that triggers process shutdown.
    #[error("token renewal and re-login both failed: {0}")]
    Auth(String),

    /// A caller asked for a cached value, none was available, and the
    /// refresh attempted to populate it also failed.
    #[error("no cached {0} available")]
    Unavailable(&'static str),
}

impl Error {
    /// True for the one error kind that should trigger a coordinated
    /// shutdown of the whole agent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}
