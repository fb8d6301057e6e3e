use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

/// Hard ceiling on images attached to a single review.
pub const MAX_REVIEW_IMAGES: usize = 5;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
            auto_migrate: true,
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_true() -> bool { true }

/// Which object store implementation backs review images.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for MinIO/LocalStack
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// When set, references are `{public_base_url}/{key}`; otherwise `s3://{bucket}/{key}`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: String::new(),
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            public_base_url: None,
            key_prefix: default_key_prefix(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

fn default_region() -> String { "us-east-1".into() }
fn default_key_prefix() -> String { "reviews".into() }
fn default_operation_timeout() -> u64 { 15 }

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            allowed_content_types: default_allowed_content_types(),
        }
    }
}

fn default_max_files() -> usize { MAX_REVIEW_IMAGES }
fn default_max_file_bytes() -> usize { 10 * 1024 * 1024 }
fn default_allowed_content_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Config file if present, otherwise defaults filled from the environment.
    pub fn load_or_env() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "config file unavailable; using environment");
                AppConfig::default()
            }
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        self.storage.normalize_from_env();
        self.storage.validate()?;
        self.uploads.validate()?;
        self.auth.normalize_from_env();
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            if let Ok(p) = port.parse::<u16>() { self.port = p; }
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self) {
        if self.bucket.trim().is_empty() {
            if let Ok(b) = std::env::var("S3_BUCKET") { self.bucket = b; }
        }
        if let Ok(r) = std::env::var("S3_REGION") {
            if !r.trim().is_empty() { self.region = r; }
        }
        if self.endpoint_url.is_none() {
            self.endpoint_url = std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.trim().is_empty());
        }
        if let Some(base) = self.public_base_url.as_mut() {
            while base.ends_with('/') { base.pop(); }
        }
        self.key_prefix = self.key_prefix.trim_matches('/').to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == StorageBackend::S3 && self.bucket.trim().is_empty() {
            return Err(anyhow!("storage.bucket is required for the s3 backend (or S3_BUCKET)"));
        }
        if self.operation_timeout_secs == 0 {
            return Err(anyhow!("storage.operation_timeout_secs must be positive"));
        }
        Ok(())
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 || self.max_files > MAX_REVIEW_IMAGES {
            return Err(anyhow!("uploads.max_files must be within 1..={}", MAX_REVIEW_IMAGES));
        }
        if self.max_file_bytes == 0 {
            return Err(anyhow!("uploads.max_file_bytes must be positive"));
        }
        if self.allowed_content_types.is_empty() {
            return Err(anyhow!("uploads.allowed_content_types must not be empty"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn normalize_from_env(&mut self) {
        if self.jwt_secret.trim().is_empty() {
            self.jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
                tracing::warn!("JWT_SECRET not set; using insecure development secret");
                "dev-secret-change-me".to_string()
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.uploads.max_files, 5);
        assert_eq!(cfg.uploads.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.storage.backend, StorageBackend::S3);
        assert_eq!(cfg.storage.key_prefix, "reviews");
        assert!(cfg.database.auto_migrate);
    }

    #[test]
    fn parses_storage_section() {
        let cfg = parse(
            r#"
            [storage]
            backend = "memory"
            public_base_url = "https://cdn.example.com/"
            operation_timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.storage.operation_timeout_secs, 3);
        let mut storage = cfg.storage;
        storage.normalize_from_env();
        assert_eq!(storage.public_base_url.as_deref(), Some("https://cdn.example.com"));
        assert!(storage.validate().is_ok());
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let storage = StorageConfig { bucket: String::new(), ..StorageConfig::default() };
        assert!(storage.validate().is_err());
        let storage = StorageConfig { bucket: "review-images".into(), ..StorageConfig::default() };
        assert!(storage.validate().is_ok());
    }

    #[test]
    fn upload_limits_cannot_exceed_image_ceiling() {
        let uploads = UploadConfig { max_files: 6, ..UploadConfig::default() };
        assert!(uploads.validate().is_err());
        let uploads = UploadConfig { max_files: 0, ..UploadConfig::default() };
        assert!(uploads.validate().is_err());
        assert!(UploadConfig::default().validate().is_ok());
    }

    #[test]
    fn database_url_scheme_is_checked() {
        let db = DatabaseConfig { url: "mysql://localhost/db".into(), ..DatabaseConfig::default() };
        assert!(db.validate().is_err());
        let db = DatabaseConfig { url: "postgres://localhost/db".into(), ..DatabaseConfig::default() };
        assert!(db.validate().is_ok());
    }
}
