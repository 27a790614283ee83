//! Configuration module
//!
//! All settings come from the environment (optionally seeded from a `.env` file) with
//! defaults suitable for local development. [`Config::validate`] rejects combinations
//! that cannot work before any component is constructed.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 8000;
const RECORD_TTL_SECS: u64 = 7 * 24 * 3600;
const MAX_FILE_SIZE_MB: u64 = 100;
const DEFAULT_ALLOWED_EXTENSIONS: &str =
    "txt,pdf,doc,docx,xls,xlsx,ppt,pptx,jpg,jpeg,png,gif,zip,rar,tar,gz";
const CLAMAV_SOCKET: &str = "/var/run/clamav/clamd.ctl";
const CLAMAV_PORT: u16 = 3310;
const CLAMAV_TIMEOUT_SECS: u64 = 60;
const SCAN_TIME_LIMIT_SECS: u64 = 300;
const DOWNLOAD_LINK_EXPIRY_HOURS: u64 = 24;
const PRESIGNED_URL_EXPIRY_SECS: u64 = 3600;
const TASK_QUEUE_MAX_WORKERS: usize = 4;
const TASK_QUEUE_MAX_RETRIES: u32 = 3;
const MIN_SECRET_LEN: usize = 32;
const SCRATCH_SUBDIR: &str = "scanvault-scratch";

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Expose internal error details in API responses
    pub debug: bool,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    // Record store
    pub redis_url: String,
    pub record_ttl_secs: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: PathBuf,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub azure_storage_account: Option<String>,
    pub azure_container: Option<String>,
    /// Only scanvault's own scratch copies may live here; the sweeper deletes stale ones.
    pub scratch_dir: PathBuf,
    // Upload limits
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    // ClamAV configuration
    pub clamav_socket: Option<String>,
    pub clamav_host: String,
    pub clamav_port: u16,
    pub clamav_timeout_secs: u64,
    pub scan_time_limit_secs: u64,
    // Download links
    pub download_token_secret: String,
    pub download_link_expiry_hours: u64,
    pub presigned_url_expiry_secs: u64,
    // Task queue configuration
    pub task_queue_max_workers: usize,
    pub task_queue_max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: false,
            server_port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            redis_url: "redis://localhost:6379/0".to_string(),
            record_ttl_secs: RECORD_TTL_SECS,
            storage_backend: StorageBackend::Local,
            local_storage_path: PathBuf::from("./uploads"),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            azure_storage_account: None,
            azure_container: None,
            scratch_dir: env::temp_dir().join(SCRATCH_SUBDIR),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: split_list(DEFAULT_ALLOWED_EXTENSIONS),
            clamav_socket: Some(CLAMAV_SOCKET.to_string()),
            clamav_host: "localhost".to_string(),
            clamav_port: CLAMAV_PORT,
            clamav_timeout_secs: CLAMAV_TIMEOUT_SECS,
            scan_time_limit_secs: SCAN_TIME_LIMIT_SECS,
            download_token_secret: String::new(),
            download_link_expiry_hours: DOWNLOAD_LINK_EXPIRY_HOURS,
            presigned_url_expiry_secs: PRESIGNED_URL_EXPIRY_SECS,
            task_queue_max_workers: TASK_QUEUE_MAX_WORKERS,
            task_queue_max_retries: TASK_QUEUE_MAX_RETRIES,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn mb_to_bytes(mb: u64) -> Option<u64> {
    mb.checked_mul(1024 * 1024)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.storage_backend,
        };

        let max_file_size_mb: u64 = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse()
            .unwrap_or(MAX_FILE_SIZE_MB);
        let max_file_size_bytes = mb_to_bytes(max_file_size_mb).ok_or_else(|| {
            anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", max_file_size_mb)
        })?;

        let config = Config {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            debug: env::var("DEBUG").map(|v| parse_bool(&v)).unwrap_or(false),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: split_list(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            record_ttl_secs: env::var("RECORD_TTL_SECS")
                .unwrap_or_else(|_| RECORD_TTL_SECS.to_string())
                .parse()
                .unwrap_or(RECORD_TTL_SECS),
            storage_backend,
            local_storage_path: non_empty("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_storage_path),
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION").or_else(|| non_empty("AWS_REGION")),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            azure_storage_account: non_empty("AZURE_STORAGE_ACCOUNT"),
            azure_container: non_empty("AZURE_CONTAINER"),
            scratch_dir: non_empty("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            max_file_size_bytes,
            allowed_extensions: non_empty("ALLOWED_EXTENSIONS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.allowed_extensions),
            clamav_socket: match env::var("CLAMAV_SOCKET") {
                Ok(raw) if raw.trim().is_empty() => None,
                Ok(raw) => Some(raw),
                Err(_) => defaults.clamav_socket,
            },
            clamav_host: env::var("CLAMAV_HOST").unwrap_or(defaults.clamav_host),
            clamav_port: env::var("CLAMAV_PORT")
                .unwrap_or_else(|_| CLAMAV_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CLAMAV_PORT must be a valid port number"))?,
            clamav_timeout_secs: env::var("CLAMAV_TIMEOUT_SECS")
                .unwrap_or_else(|_| CLAMAV_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CLAMAV_TIMEOUT_SECS),
            scan_time_limit_secs: env::var("SCAN_TIME_LIMIT_SECS")
                .unwrap_or_else(|_| SCAN_TIME_LIMIT_SECS.to_string())
                .parse()
                .unwrap_or(SCAN_TIME_LIMIT_SECS),
            download_token_secret: env::var("DOWNLOAD_TOKEN_SECRET").map_err(|_| {
                anyhow::anyhow!("DOWNLOAD_TOKEN_SECRET must be set for signing download links")
            })?,
            download_link_expiry_hours: env::var("DOWNLOAD_LINK_EXPIRY_HOURS")
                .unwrap_or_else(|_| DOWNLOAD_LINK_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(DOWNLOAD_LINK_EXPIRY_HOURS),
            presigned_url_expiry_secs: env::var("PRESIGNED_URL_EXPIRY_SECS")
                .unwrap_or_else(|_| PRESIGNED_URL_EXPIRY_SECS.to_string())
                .parse()
                .unwrap_or(PRESIGNED_URL_EXPIRY_SECS),
            task_queue_max_workers: env::var("TASK_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_max_retries: env::var("TASK_QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_RETRIES),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.download_token_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "DOWNLOAD_TOKEN_SECRET must be at least {} characters long",
                MIN_SECRET_LEN
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS must not be empty"));
        }

        if self.scan_time_limit_secs == 0 || self.clamav_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "SCAN_TIME_LIMIT_SECS and CLAMAV_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.record_ttl_secs == 0 {
            return Err(anyhow::anyhow!("RECORD_TTL_SECS must be greater than zero"));
        }

        if self.download_link_expiry_hours == 0
            || self.download_link_expiry_hours.checked_mul(3600).is_none()
        {
            return Err(anyhow::anyhow!(
                "DOWNLOAD_LINK_EXPIRY_HOURS must be between 1 and {}",
                u64::MAX / 3600
            ));
        }

        if self.task_queue_max_workers == 0 {
            return Err(anyhow::anyhow!("TASK_QUEUE_MAX_WORKERS must be at least 1"));
        }

        if !self.redis_url.starts_with("redis://")
            && !self.redis_url.starts_with("rediss://")
            && !self.redis_url.starts_with("memory://")
        {
            return Err(anyhow::anyhow!(
                "REDIS_URL must be a redis:// or rediss:// URL (or memory:// for a process-local store)"
            ));
        }

        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_BUCKET must be set when using S3 storage backend"
                ));
            }
            if self.s3_region.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                ));
            }
        }

        if self.storage_backend == StorageBackend::Azure {
            if self.azure_storage_account.is_none() {
                return Err(anyhow::anyhow!(
                    "AZURE_STORAGE_ACCOUNT must be set when using Azure storage backend"
                ));
            }
            if self.azure_container.is_none() {
                return Err(anyhow::anyhow!(
                    "AZURE_CONTAINER must be set when using Azure storage backend"
                ));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn download_link_ttl(&self) -> Duration {
        Duration::from_secs(self.download_link_expiry_hours.saturating_mul(3600))
    }

    pub fn presigned_url_ttl(&self) -> Duration {
        Duration::from_secs(self.presigned_url_expiry_secs)
    }

    pub fn clamav_timeout(&self) -> Duration {
        Duration::from_secs(self.clamav_timeout_secs)
    }

    pub fn scan_time_limit(&self) -> Duration {
        Duration::from_secs(self.scan_time_limit_secs)
    }

    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            download_token_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_validate_with_secret() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.clamav_port, 3310);
        assert_eq!(config.download_link_ttl(), Duration::from_secs(24 * 3600));
        assert!(config.allowed_extensions.contains(&"pdf".to_string()));
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = Config {
            download_token_secret: "short".to_string(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DOWNLOAD_TOKEN_SECRET"));
    }

    #[test]
    fn test_s3_requires_bucket_and_region() {
        let mut config = valid();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());

        config.s3_bucket = Some("quarantine".to_string());
        assert!(config.validate().is_err());

        config.s3_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_azure_requires_account_and_container() {
        let mut config = valid();
        config.storage_backend = StorageBackend::Azure;
        assert!(config.validate().is_err());

        config.azure_storage_account = Some("quarantineacct".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("AZURE_CONTAINER"));

        config.azure_container = Some("uploads".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_record_ttl_rejected() {
        let config = Config {
            record_ttl_secs: 0,
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("RECORD_TTL_SECS"));
    }

    #[test]
    fn test_overflowing_sizes_rejected() {
        assert_eq!(mb_to_bytes(100), Some(100 * 1024 * 1024));
        assert_eq!(mb_to_bytes(u64::MAX), None);

        let config = Config {
            download_link_expiry_hours: u64::MAX,
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DOWNLOAD_LINK_EXPIRY_HOURS"));
        assert_eq!(config.download_link_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_default_scratch_dir_is_dedicated() {
        let config = Config::default();
        assert_ne!(config.scratch_dir, env::temp_dir());
        assert!(config.scratch_dir.starts_with(env::temp_dir()));
        assert!(config.scratch_dir.ends_with(SCRATCH_SUBDIR));
    }

    #[test]
    fn test_split_list_trims_entries() {
        assert_eq!(
            split_list(" txt, pdf ,,zip"),
            vec!["txt".to_string(), "pdf".to_string(), "zip".to_string()]
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("no"));
    }
}
