use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod catalog_store;
use catalog_store::SqliteCatalogStore;

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod identity;
use identity::HttpIdentityProvider;

mod object_storage;
use object_storage::{S3UrlIssuer, S3UrlIssuerConfig};

mod profile_store;
use profile_store::SqliteProfileStore;

mod server;
use server::{run_server, RequestsLoggingLevel, ServerConfig, TokenVerifier};

mod sqlite_persistence;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in it override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the SQLite database files.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Page size for the public catalogue when the client omits one.
    #[clap(long, default_value_t = 20)]
    pub default_page_size: u32,

    /// Largest page size a client may request.
    #[clap(long, default_value_t = 100)]
    pub max_page_size: u32,

    /// Base URL of the identity provider.
    #[clap(long)]
    pub identity_base_url: Option<String>,

    /// API key for the identity provider.
    #[clap(long)]
    pub identity_api_key: Option<String>,

    /// Secret used to verify provider-issued JWTs.
    #[clap(long)]
    pub jwt_secret: Option<String>,

    /// Expected JWT issuer. Issuer validation is skipped when unset.
    #[clap(long)]
    pub jwt_issuer: Option<String>,

    /// Object storage access key id.
    #[clap(long)]
    pub storage_key_id: Option<String>,

    /// Object storage application key.
    #[clap(long)]
    pub storage_application_key: Option<String>,

    /// Object storage bucket name.
    #[clap(long)]
    pub storage_bucket: Option<String>,

    /// S3-compatible endpoint URL of the object storage.
    #[clap(long)]
    pub storage_endpoint: Option<String>,

    /// Object storage region.
    #[clap(long)]
    pub storage_region: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            identity_base_url: self.identity_base_url.clone(),
            identity_api_key: self.identity_api_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_issuer: self.jwt_issuer.clone(),
            storage_key_id: self.storage_key_id.clone(),
            storage_application_key: self.storage_application_key.clone(),
            storage_bucket: self.storage_bucket.clone(),
            storage_endpoint: self.storage_endpoint.clone(),
            storage_region: self.storage_region.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let profile_store = Arc::new(SqliteProfileStore::new(app_config.profile_db_path())?);
    let catalog_store = Arc::new(SqliteCatalogStore::new(app_config.catalog_db_path())?);

    let identity = Arc::new(HttpIdentityProvider::new(
        app_config.identity.base_url.clone(),
        app_config.identity.api_key.clone(),
    )?);
    let url_issuer = Arc::new(S3UrlIssuer::new(S3UrlIssuerConfig {
        key_id: app_config.storage.key_id.clone(),
        application_key: app_config.storage.application_key.clone(),
        bucket: app_config.storage.bucket.clone(),
        endpoint: app_config.storage.endpoint.clone(),
        region: app_config.storage.region.clone(),
    }));
    let token_verifier = TokenVerifier::new(
        &app_config.identity.jwt_secret,
        app_config.identity.jwt_issuer.as_deref(),
    );

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        default_page_size: app_config.default_page_size,
        max_page_size: app_config.max_page_size,
    };

    info!("Starting server on port {}", server_config.port);
    run_server(
        server_config,
        profile_store,
        catalog_store,
        identity,
        url_issuer,
        token_verifier,
    )
    .await
}
