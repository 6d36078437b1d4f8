use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub uploads: UploadConfig,

    #[command(flatten)]
    pub image_host: ImageHostConfig,

    #[command(flatten)]
    pub websocket: WsConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long = "database-url", env = "AGORA_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "AGORA_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle pooled connections
    #[arg(long, env = "AGORA_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "AGORA_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Seconds before an idle connection is closed
    #[arg(long, env = "AGORA_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Maximum lifetime of a pooled connection in seconds
    #[arg(long, env = "AGORA_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "AGORA_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "AGORA_PORT", default_value_t = 5001)]
    pub port: u16,

    /// Port for the management (health) listener
    #[arg(long, env = "AGORA_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for in-flight work after a shutdown signal
    #[arg(long, env = "AGORA_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "AGORA_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for JWT signing
    #[arg(long, env = "AGORA_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "AGORA_ACCESS_TOKEN_TTL_SECS", default_value_t = 604_800)]
    pub access_token_ttl_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "AGORA_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "AGORA_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for signup/login
    #[arg(long, env = "AGORA_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for signup/login
    #[arg(long, env = "AGORA_AUTH_RATE_LIMIT_BURST", default_value_t = 3)]
    pub auth_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct UploadConfig {
    /// Directory where uploaded files are written and served from
    #[arg(long = "upload-dir", env = "AGORA_UPLOAD_DIR", default_value = "uploads")]
    pub dir: PathBuf,

    /// Public route prefix for locally stored files
    #[arg(long = "upload-public-prefix", env = "AGORA_UPLOAD_PUBLIC_PREFIX", default_value = "/uploads")]
    pub public_prefix: String,

    /// Maximum number of files per message
    #[arg(long, env = "AGORA_UPLOAD_MAX_FILES", default_value_t = 5)]
    pub max_files: usize,

    /// Maximum size of a single file in bytes (Default: 10 MiB)
    #[arg(long, env = "AGORA_UPLOAD_MAX_FILE_SIZE_BYTES", default_value_t = 10_485_760)]
    pub max_file_size_bytes: usize,
}

impl UploadConfig {
    /// Upper bound for a whole message request body: every file at its limit plus form overhead.
    #[must_use]
    pub const fn max_request_bytes(&self) -> usize {
        self.max_files.saturating_mul(self.max_file_size_bytes).saturating_add(1_048_576)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ImageBackend {
    #[default]
    Cloudinary,
    S3,
}

/// Digest used for Cloudinary request signatures. Must match the account's signature setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

#[derive(Clone, Debug, Args)]
pub struct ImageHostConfig {
    /// Which remote host receives image uploads
    #[arg(long = "image-backend", env = "AGORA_IMAGE_BACKEND", value_enum, default_value_t = ImageBackend::Cloudinary)]
    pub backend: ImageBackend,

    /// Timeout for a single remote image upload in seconds
    #[arg(long, env = "AGORA_IMAGE_UPLOAD_TIMEOUT_SECS", default_value_t = 10)]
    pub upload_timeout_secs: u64,

    /// Cloudinary cloud name
    #[arg(long, env = "AGORA_CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary API key
    #[arg(long, env = "AGORA_CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: Option<String>,

    /// Cloudinary API secret
    #[arg(long, env = "AGORA_CLOUDINARY_API_SECRET")]
    pub cloudinary_api_secret: Option<String>,

    /// Cloudinary API base URL
    #[arg(long, env = "AGORA_CLOUDINARY_API_BASE", default_value = "https://api.cloudinary.com")]
    pub cloudinary_api_base: String,

    /// Cloudinary signature digest
    #[arg(
        long = "cloudinary-signature-algorithm",
        env = "AGORA_CLOUDINARY_SIGNATURE_ALGORITHM",
        value_enum,
        default_value_t = SignatureAlgorithm::Sha1
    )]
    pub cloudinary_signature_algorithm: SignatureAlgorithm,

    /// S3 bucket name
    #[arg(long = "s3-bucket", env = "AGORA_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// S3 region
    #[arg(long = "s3-region", env = "AGORA_S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// Custom S3 endpoint (useful for MinIO)
    #[arg(long = "s3-endpoint", env = "AGORA_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// S3 access key
    #[arg(long = "s3-access-key", env = "AGORA_S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,

    /// S3 secret key
    #[arg(long = "s3-secret-key", env = "AGORA_S3_SECRET_KEY")]
    pub s3_secret_key: Option<String>,

    /// Force path style (required for many MinIO setups: http://host/bucket/key)
    #[arg(long = "s3-force-path-style", env = "AGORA_S3_FORCE_PATH_STYLE", default_value_t = false)]
    pub s3_force_path_style: bool,

    /// Public base URL under which uploaded objects are reachable
    #[arg(long = "s3-public-base-url", env = "AGORA_S3_PUBLIC_BASE_URL")]
    pub s3_public_base_url: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct WsConfig {
    /// Size of the per-connection outbound event buffer
    #[arg(long, env = "AGORA_WS_OUTBOUND_BUFFER_SIZE", default_value_t = 32)]
    pub outbound_buffer_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness check in milliseconds
    #[arg(long, env = "AGORA_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,

    /// Timeout for the image host readiness check in milliseconds
    #[arg(long, env = "AGORA_HEALTH_STORAGE_TIMEOUT_MS", default_value_t = 2000)]
    pub storage_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "AGORA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "AGORA_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
