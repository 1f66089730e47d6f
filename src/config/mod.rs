mod file_config;

pub use file_config::{FileConfig, IdentityFileConfig, StorageFileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub identity_base_url: Option<String>,
    pub identity_api_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub storage_key_id: Option<String>,
    pub storage_application_key: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub base_url: String,
    pub api_key: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub key_id: String,
    pub application_key: String,
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub identity: IdentitySettings,
    pub storage: StorageSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let default_page_size = file.default_page_size.unwrap_or(cli.default_page_size);
        let max_page_size = file.max_page_size.unwrap_or(cli.max_page_size);
        if default_page_size == 0 || default_page_size > max_page_size {
            bail!(
                "default_page_size must be between 1 and max_page_size ({})",
                max_page_size
            );
        }

        let identity_file = file.identity.unwrap_or_default();
        let identity = IdentitySettings {
            base_url: identity_file
                .base_url
                .or_else(|| cli.identity_base_url.clone())
                .ok_or_else(|| anyhow::anyhow!("identity base_url must be specified"))?,
            api_key: identity_file
                .api_key
                .or_else(|| cli.identity_api_key.clone())
                .ok_or_else(|| anyhow::anyhow!("identity api_key must be specified"))?,
            jwt_secret: identity_file
                .jwt_secret
                .or_else(|| cli.jwt_secret.clone())
                .ok_or_else(|| anyhow::anyhow!("identity jwt_secret must be specified"))?,
            jwt_issuer: identity_file.jwt_issuer.or_else(|| cli.jwt_issuer.clone()),
        };

        let storage_file = file.storage.unwrap_or_default();
        let storage = StorageSettings {
            key_id: storage_file
                .key_id
                .or_else(|| cli.storage_key_id.clone())
                .ok_or_else(|| anyhow::anyhow!("storage key_id must be specified"))?,
            application_key: storage_file
                .application_key
                .or_else(|| cli.storage_application_key.clone())
                .ok_or_else(|| anyhow::anyhow!("storage application_key must be specified"))?,
            bucket: storage_file
                .bucket
                .or_else(|| cli.storage_bucket.clone())
                .ok_or_else(|| anyhow::anyhow!("storage bucket must be specified"))?,
            endpoint: storage_file
                .endpoint
                .or_else(|| cli.storage_endpoint.clone())
                .ok_or_else(|| anyhow::anyhow!("storage endpoint must be specified"))?,
            region: storage_file
                .region
                .or_else(|| cli.storage_region.clone())
                .unwrap_or_else(|| "us-east-1".to_string()),
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            default_page_size,
            max_page_size,
            identity,
            storage,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn profile_db_path(&self) -> PathBuf {
        self.db_dir.join("profiles.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn full_cli(db_dir: PathBuf) -> CliConfig {
        CliConfig {
            db_dir: Some(db_dir),
            port: 3001,
            logging_level: RequestsLoggingLevel::Headers,
            default_page_size: 20,
            max_page_size: 100,
            identity_base_url: Some("https://auth.example.com".to_string()),
            identity_api_key: Some("api-key".to_string()),
            jwt_secret: Some("jwt-secret".to_string()),
            jwt_issuer: None,
            storage_key_id: Some("key-id".to_string()),
            storage_application_key: Some("app-key".to_string()),
            storage_bucket: Some("bucket".to_string()),
            storage_endpoint: Some("https://s3.example.com".to_string()),
            storage_region: None,
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = full_cli(temp_dir.path().to_path_buf());

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3001);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.identity.base_url, "https://auth.example.com");
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.catalog_db_path(), temp_dir.path().join("catalog.db"));
        assert_eq!(config.profile_db_path(), temp_dir.path().join("profiles.db"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let mut cli = full_cli(PathBuf::from("/should/be/overridden"));
        cli.logging_level = RequestsLoggingLevel::Path;

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            identity: Some(IdentityFileConfig {
                jwt_issuer: Some("https://auth.example.com/auth/v1".to_string()),
                ..Default::default()
            }),
            storage: Some(StorageFileConfig {
                region: Some("eu-central-003".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(
            config.identity.jwt_issuer.as_deref(),
            Some("https://auth.example.com/auth/v1")
        );
        assert_eq!(config.storage.region, "eu-central-003");
        // CLI value used when TOML doesn't specify
        assert_eq!(config.identity.api_key, "api-key");
        assert_eq!(config.storage.bucket, "bucket");
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("db_dir"));
    }

    #[test]
    fn test_resolve_missing_identity_error() {
        let temp_dir = make_temp_db_dir();
        let mut cli = full_cli(temp_dir.path().to_path_buf());
        cli.jwt_secret = None;

        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_resolve_rejects_bad_page_sizes() {
        let temp_dir = make_temp_db_dir();
        let mut cli = full_cli(temp_dir.path().to_path_buf());
        cli.default_page_size = 500;
        cli.max_page_size = 100;

        assert!(AppConfig::resolve(&cli, None).is_err());
    }
}
