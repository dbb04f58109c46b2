use std::path::Path;

use ini::Ini;

use crate::error::Error;

/// Per-domain configuration shared by the KV and dynamic-database caches:
/// a toggle, the sub-path to read from, and (for KV) the refresh cadence
/// that the dynamic-database worker also borrows (see §4.6/DESIGN.md).
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Whether the KV cache-refresh worker should run at all.
    pub enabled: bool,
    /// Sub-path under `{entity}-kv/data/`.
    pub path: String,
    /// Refresh cadence in seconds, also reused by the dynamic-database worker.
    pub refresh_interval: u64,
}

/// Configuration for the dynamic database-credentials cache.
#[derive(Debug, Clone)]
pub struct DynamicDbConfig {
    /// Whether the dynamic-database cache-refresh worker should run.
    pub enabled: bool,
    /// Sub-path under `{entity}-database/creds/`.
    pub role_id: String,
}

/// Configuration for the static database-credentials cache.
#[derive(Debug, Clone)]
pub struct StaticDbConfig {
    /// Whether the static-database cache-refresh worker should run.
    pub enabled: bool,
    /// Sub-path under `{entity}-database/static-creds/`.
    pub role_id: String,
}

/// Immutable, fully-resolved agent configuration. Loaded once at startup
/// from an INI file and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Base URL of the vault service, e.g. `http://127.0.0.1:8200`.
    pub vault_url: String,
    /// Optional `X-Vault-Namespace` value; empty string means "unset".
    pub vault_namespace: String,
    /// The entity tag used to derive mount-path prefixes.
    pub entity: String,
    /// HTTP request timeout, in seconds.
    pub http_timeout: u64,
    /// Maximum response body size accepted, in bytes.
    pub max_response_size: usize,

    /// AppRole role_id used for login and re-login.
    pub role_id: String,
    /// AppRole secret_id used for login and re-login.
    pub secret_id: String,

    /// KV v2 cache settings.
    pub kv: KvConfig,
    /// Dynamic database credentials cache settings.
    pub dynamic_db: DynamicDbConfig,
    /// Static database credentials cache settings.
    pub static_db: StaticDbConfig,
}

impl Configuration {
    /// Loads configuration from the given INI file, applying the documented
    /// defaults for any absent key (or the whole file being missing keys in
    /// optional sections). `role_id`/`secret_id` are always required since
    /// the agent always authenticates via AppRole.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;

        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, Error> {
        let vault = ini.section(Some("vault"));
        let approle = ini.section(Some("approle"));
        let secret_kv = ini.section(Some("secret_kv"));
        let secret_database = ini.section(Some("secret_database"));
        let secret_database_static = ini.section(Some("secret_database_static"));

        let vault_url = vault
            .and_then(|s| s.get("vault_url"))
            .unwrap_or("http://127.0.0.1:8200")
            .to_string();
        let vault_namespace = vault
            .and_then(|s| s.get("vault_namespace"))
            .unwrap_or("")
            .to_string();
        let entity = vault
            .and_then(|s| s.get("entity"))
            .unwrap_or("my-vault-app")
            .to_string();
        let http_timeout = parse_or(vault, "http_timeout", 30)?;
        let max_response_size: usize = parse_or(vault, "max_response_size", 4096)?;

        let role_id = approle
            .and_then(|s| s.get("role_id"))
            .ok_or_else(|| Error::Config("missing [approle] role_id".to_string()))?
            .to_string();
        let secret_id = approle
            .and_then(|s| s.get("secret_id"))
            .ok_or_else(|| Error::Config("missing [approle] secret_id".to_string()))?
            .to_string();

        let kv = KvConfig {
            enabled: parse_or(secret_kv, "enabled", false)?,
            path: secret_kv
                .and_then(|s| s.get("kv_path"))
                .unwrap_or("")
                .to_string(),
            refresh_interval: parse_or(secret_kv, "refresh_interval", 300)?,
        };

        let dynamic_db = DynamicDbConfig {
            enabled: parse_or(secret_database, "enabled", false)?,
            role_id: secret_database
                .and_then(|s| s.get("role_id"))
                .unwrap_or("")
                .to_string(),
        };

        let static_db = StaticDbConfig {
            enabled: parse_or(secret_database_static, "enabled", false)?,
            role_id: secret_database_static
                .and_then(|s| s.get("role_id"))
                .unwrap_or("")
                .to_string(),
        };

        Ok(Configuration {
            vault_url,
            vault_namespace,
            entity,
            http_timeout,
            max_response_size,
            role_id,
            secret_id,
            kv,
            dynamic_db,
            static_db,
        })
    }

    /// Resolved absolute path for the KV v2 read: `{entity}-kv/data/{kv_path}`.
    pub fn kv_path(&self) -> String {
        format!("{}-kv/data/{}", self.entity, self.kv.path)
    }

    /// Resolved absolute path for the dynamic DB read:
    /// `{entity}-database/creds/{role_id}`.
    pub fn dynamic_db_path(&self) -> String {
        format!("{}-database/creds/{}", self.entity, self.dynamic_db.role_id)
    }

    /// Resolved absolute path for the static DB read:
    /// `{entity}-database/static-creds/{role_id}`.
    pub fn static_db_path(&self) -> String {
        format!(
            "{}-database/static-creds/{}",
            self.entity, self.static_db.role_id
        )
    }
}

fn parse_or<T>(
    section: Option<&ini::Properties>,
    key: &str,
    default: T,
) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match section.and_then(|s| s.get(key)) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("invalid value for {}: {}", key, e))),
    }
}
