use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    /// `None` keeps every collection in memory and disables uploads on disk.
    pub data_dir: Option<PathBuf>,
    pub bind: SocketAddr,
    pub app_name: String,
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: time::Duration,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            app_name: "CogitoSphere".to_string(),
            cors_origins: Vec::new(),
            auth: AuthConfig {
                key: "Y29naXRvLWRlZmF1bHQtdGVzdC1rZXk".to_string(),
                token_ttl: time::Duration::days(1),
            },
        }
    }
}
