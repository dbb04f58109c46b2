use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::Error;

/// Thin wrapper around a shared `reqwest::Client`: the "HTTP executor" from
/// the design (§2). It owns no session state — callers pass the token and
/// namespace to attach per request — so it can be cloned freely across
/// workers without any locking (`reqwest::Client` is `Clone + Send + Sync`
/// and pools connections internally).
#[derive(Clone)]
pub struct VaultHttp {
    client: reqwest::Client,
    base_url: Url,
    namespace: String,
    max_response_size: usize,
}

impl VaultHttp {
    /// Builds the shared client. TLS verification is disabled to match the
    /// upstream service's documented default; redirects follow up to
    /// `reqwest`'s default policy.
    pub fn new(base_url: &str, namespace: &str, timeout_secs: u64, max_response_size: usize) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid vault_url {:?}: {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(Error::Transport)?;

        Ok(Self {
            client,
            base_url,
            namespace: namespace.to_string(),
            max_response_size,
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join("v1/")
            .and_then(|u| u.join(path))
            .map_err(|e| Error::Config(format!("invalid path {:?}: {}", path, e)))
    }

    /// Sends one request and returns the parsed JSON body. Non-2xx statuses
    /// and a top-level `errors` field are both turned into typed errors
    /// rather than returned to the caller as a successful body.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<Value, Error> {
        let url = self.url_for(path)?;

        tracing::debug!(target: "vault_agent::http", %method, %path, "sending vault request");

        let mut req = self.client.request(method, url);
        if let Some(token) = token {
            req = req.header("X-Vault-Token", token);
        }
        if !self.namespace.is_empty() {
            req = req.header("X-Vault-Namespace", &self.namespace);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(Error::Transport)?;

        if !status.is_success() {
            tracing::warn!(target: "vault_agent::http", %operation, %status, "vault returned non-2xx");
            let truncated = if bytes.len() > self.max_response_size {
                &bytes[..self.max_response_size]
            } else {
                &bytes[..]
            };
            return Err(Error::Http {
                status: status.as_u16(),
                operation,
                body: String::from_utf8_lossy(truncated).into_owned(),
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        let parsed: Value = serde_json::from_slice(&bytes).map_err(|e| Error::Parse {
            operation,
            reason: format!("invalid json: {}", e),
        })?;

        if let Some(errors) = parsed.get("errors").and_then(|v| v.as_array()) {
            if !errors.is_empty() {
                let messages = errors
                    .iter()
                    .map(|v| v.as_str().unwrap_or_default().to_string())
                    .collect();
                return Err(Error::Api { operation, messages });
            }
        }

        Ok(parsed)
    }
}
