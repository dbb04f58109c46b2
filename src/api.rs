//! Typed wrappers for the six vault operations used by the agent (§4.1).
//! Each function issues exactly one request through [`VaultHttp`] and pulls
//! the fields it needs out of the response, turning a missing/mistyped
//! field into [`Error::Parse`].

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Error;
use crate::http::VaultHttp;

fn field<'a>(body: &'a Value, op: &'static str, path: &str) -> Result<&'a Value, Error> {
    let mut cur = body;
    for part in path.split('.') {
        cur = cur.get(part).ok_or_else(|| Error::Parse {
            operation: op,
            reason: format!("missing field `{}`", path),
        })?;
    }
    Ok(cur)
}

fn as_str<'a>(v: &'a Value, op: &'static str, path: &str) -> Result<&'a str, Error> {
    v.as_str().ok_or_else(|| Error::Parse {
        operation: op,
        reason: format!("field `{}` is not a string", path),
    })
}

fn as_u64(v: &Value, op: &'static str, path: &str) -> Result<u64, Error> {
    v.as_u64().ok_or_else(|| Error::Parse {
        operation: op,
        reason: format!("field `{}` is not a non-negative integer", path),
    })
}

fn as_i64(v: &Value, op: &'static str, path: &str) -> Result<i64, Error> {
    v.as_i64().ok_or_else(|| Error::Parse {
        operation: op,
        reason: format!("field `{}` is not an integer", path),
    })
}

/// Result of a successful `login` or `renew-self` whose response carried a
/// fresh token (only `login` does; `renew-self` reuses the existing one).
pub struct LoginResult {
    /// The freshly issued client token.
    pub client_token: String,
    /// Seconds for which the token is valid from now.
    pub lease_duration: u64,
}

/// Authenticates with the AppRole role_id/secret_id pair.
pub async fn login(http: &VaultHttp, role_id: &str, secret_id: &str) -> Result<LoginResult, Error> {
    #[derive(Serialize)]
    struct Body<'a> {
        role_id: &'a str,
        secret_id: &'a str,
    }

    let body = http
        .send(
            "login",
            Method::POST,
            "auth/approle/login",
            None,
            Some(&Body { role_id, secret_id }),
        )
        .await?;

    let client_token = as_str(field(&body, "login", "auth.client_token")?, "login", "auth.client_token")?.to_string();
    let lease_duration = as_u64(field(&body, "login", "auth.lease_duration")?, "login", "auth.lease_duration")?;

    Ok(LoginResult {
        client_token,
        lease_duration,
    })
}

/// Result of a successful `renew-self`. `lease_duration` is optional because
/// the token policy (§4.2) treats an omitted field as "keep the existing
/// expiry" rather than a parse failure.
pub struct RenewResult {
    /// Seconds for which the token is now valid from now, if present.
    pub lease_duration: Option<u64>,
}

/// Renews the currently held token. Requires `token` to already be set.
pub async fn renew_self(http: &VaultHttp, token: &str) -> Result<RenewResult, Error> {
    let body = http
        .send::<()>(
            "renew-self",
            Method::POST,
            "auth/token/renew-self",
            Some(token),
            None,
        )
        .await?;

    let lease_duration = match body.get("auth").and_then(|a| a.get("lease_duration")) {
        Some(v) => Some(as_u64(v, "renew-self", "auth.lease_duration")?),
        None => None,
    };

    Ok(RenewResult { lease_duration })
}

/// Reads a KV v2 secret. Returns the raw body; callers pull out
/// `data.data` and `data.metadata.version` themselves since the former is
/// the cached payload and the latter drives the replace decision.
pub async fn kv_read(http: &VaultHttp, token: &str, path: &str) -> Result<Value, Error> {
    http.send::<()>("kv_read", Method::GET, path, Some(token), None)
        .await
}

/// Reads dynamic database credentials. Returns the raw body; callers pull
/// out top-level `lease_id` and `data.{username,password}`.
pub async fn dyn_read(http: &VaultHttp, token: &str, path: &str) -> Result<Value, Error> {
    http.send::<()>("dyn_read", Method::GET, path, Some(token), None)
        .await
}

/// Reads static database credentials. Unlike KV v2 and dynamic creds, the
/// payload of interest is the `data` subobject directly, not `data.data` —
/// this asymmetry across mount types is intentional and must be preserved.
pub async fn static_read(http: &VaultHttp, token: &str, path: &str) -> Result<Value, Error> {
    let body = http
        .send::<()>("static_read", Method::GET, path, Some(token), None)
        .await?;

    Ok(field(&body, "static_read", "data")?.clone())
}

/// Looks up the remaining TTL of a lease, in seconds.
pub async fn lease_lookup(http: &VaultHttp, token: &str, lease_id: &str) -> Result<u64, Error> {
    let body = http
        .send(
            "lease_lookup",
            Method::POST,
            "sys/leases/lookup",
            Some(token),
            Some(&json!({ "lease_id": lease_id })),
        )
        .await?;

    let ttl = field(&body, "lease_lookup", "data.ttl")?;
    // Vault sometimes renders ttl as a signed integer; accept either.
    match ttl.as_u64() {
        Some(v) => Ok(v),
        None => as_i64(ttl, "lease_lookup", "data.ttl").map(|v| v.max(0) as u64),
    }
}
