use vault_agent::config::{Configuration, DynamicDbConfig, KvConfig, StaticDbConfig};

/// Builds a `Configuration` pointed at `base_url` with every domain
/// disabled by default; callers flip on the ones they need.
pub fn config(base_url: &str) -> Configuration {
    Configuration {
        vault_url: base_url.to_string(),
        vault_namespace: String::new(),
        entity: "app".to_string(),
        http_timeout: 5,
        max_response_size: 65536,
        role_id: "test-role".to_string(),
        secret_id: "test-secret".to_string(),
        kv: KvConfig {
            enabled: false,
            path: "db/creds".to_string(),
            refresh_interval: 300,
        },
        dynamic_db: DynamicDbConfig {
            enabled: false,
            role_id: "readonly".to_string(),
        },
        static_db: StaticDbConfig {
            enabled: false,
            role_id: "svc".to_string(),
        },
    }
}
