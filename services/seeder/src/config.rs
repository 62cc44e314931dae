use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the seeder
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// S3 configuration
    pub s3: S3Config,
    /// Remote content host configuration
    #[serde(default)]
    pub content: ContentConfig,
    /// Fixture location
    #[serde(default)]
    pub fixtures: FixturesConfig,
    /// Seeding behaviour
    #[serde(default)]
    pub seeding: SeedingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Create the record tables before seeding
    #[serde(default)]
    pub run_migrations: bool,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding thumbnails and content files
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Key prefix for asset pack thumbnails
    #[serde(default = "default_thumbnail_prefix")]
    pub thumbnail_prefix: String,
    /// Multipart upload threshold in bytes (5MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (5MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
}

/// Remote content host configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentConfig {
    /// Fetch from the production host instead of the development one
    #[serde(default)]
    pub production: bool,
    /// Explicit base URL, overrides the production flag
    pub base_url: Option<String>,
    /// Per-request timeout in seconds. Unset means no timeout.
    pub request_timeout_secs: Option<u64>,
}

/// Fixture location
#[derive(Debug, Clone, Deserialize)]
pub struct FixturesConfig {
    /// Directory holding the dated data directories
    #[serde(default = "default_fixtures_dir")]
    pub base_dir: PathBuf,
}

/// Seeding behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct SeedingConfig {
    /// Account that owns every seeded asset pack
    #[serde(default = "default_owner")]
    pub default_owner: String,
    /// Maximum in-flight operations per phase
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

pub const PRODUCTION_CONTENT_HOST: &str = "https://assets.decentraland.org";
pub const DEVELOPMENT_CONTENT_HOST: &str = "https://assets.decentraland.zone";

// Default value functions
fn default_service_name() -> String {
    "asset-seeder".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_thumbnail_prefix() -> String {
    "asset_packs".to_string()
}

fn default_multipart_threshold() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_part_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_owner() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

fn default_concurrency() -> usize {
    10
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "asset-seeder")?
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/seeder").required(false))
            .add_source(config::File::with_name("/etc/seeder/seeder").required(false))
            // SEEDER__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("SEEDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl ContentConfig {
    /// Base URL content ids are resolved against
    pub fn base_url(&self) -> &str {
        match self.base_url.as_deref() {
            Some(url) => url,
            None if self.production => PRODUCTION_CONTENT_HOST,
            None => DEVELOPMENT_CONTENT_HOST,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            base_dir: default_fixtures_dir(),
        }
    }
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            default_owner: default_owner(),
            concurrency: default_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_concurrency(), 10);
        assert_eq!(default_thumbnail_prefix(), "asset_packs");
        assert_eq!(default_multipart_threshold(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_content_host_selection() {
        let mut content = ContentConfig::default();
        assert_eq!(content.base_url(), "https://assets.decentraland.zone");

        content.production = true;
        assert_eq!(content.base_url(), "https://assets.decentraland.org");

        content.base_url = Some("http://localhost:9000".to_string());
        assert_eq!(content.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "database": { "url": "postgres://localhost/builder" },
            "s3": { "bucket": "builder-assets" }
        }))
        .unwrap();

        assert_eq!(config.service.log_format, LogFormat::Json);
        assert_eq!(config.fixtures.base_dir, PathBuf::from("data"));
        assert_eq!(config.seeding.concurrency, 10);
        assert!(!config.database.run_migrations);
        assert!(config.content.request_timeout().is_none());
        assert_eq!(config.database.connect_timeout(), Duration::from_secs(30));
    }
}
