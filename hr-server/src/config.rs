//! Server configuration
//!
//! Values come from command-line flags and environment variables (parsed by
//! `clap` in `main.rs`), then an optional TOML file, then compiled defaults.

use hr_common::config::{default_database_path, load_toml, resolve_path, split_list};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ACCESS_MINUTES: u64 = 15;
pub const DEFAULT_REFRESH_DAYS: u64 = 30;
pub const DEFAULT_RECOVERY_CODE_COUNT: usize = 10;
pub const DEFAULT_RECOVERY_CODE_BYTES: usize = 9;
pub const DEFAULT_RECOVERY_CODE_DAYS: u64 = 30;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PasswordCost {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordCost {
    fn default() -> Self {
        // OWASP minimum for argon2id: 19 MiB, 2 iterations, 1 lane
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordCost {
    /// Cheapest parameters argon2 accepts; for tests only
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Optional TOML config file (`--config` / `HR_CONFIG`)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub allowed_origins: Option<Vec<String>>,
    pub frontend_dist: Option<PathBuf>,
    pub access_token_expires_minutes: Option<u64>,
    pub refresh_token_expires_days: Option<u64>,
    pub recovery_code_count: Option<usize>,
    pub password_cost: Option<PasswordCost>,
}

impl FileConfig {
    /// Load the file if present; a missing file yields defaults
    pub fn load(path: &Path) -> hr_common::Result<Self> {
        Ok(load_toml::<FileConfig>(path)?.unwrap_or_default())
    }
}

/// Secrets and lifetimes used by the authentication layer
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub refresh_pepper: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub recovery_code_count: usize,
    pub recovery_code_bytes: usize,
    pub recovery_code_ttl: Duration,
    pub password_cost: PasswordCost,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>, refresh_pepper: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            refresh_pepper: refresh_pepper.into(),
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_MINUTES * 60),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_DAYS * 24 * 3600),
            recovery_code_count: DEFAULT_RECOVERY_CODE_COUNT,
            recovery_code_bytes: DEFAULT_RECOVERY_CODE_BYTES,
            recovery_code_ttl: Duration::from_secs(DEFAULT_RECOVERY_CODE_DAYS * 24 * 3600),
            password_cost: PasswordCost::default(),
        }
    }
}

// Secrets never reach the logs
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("refresh_pepper", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("recovery_code_count", &self.recovery_code_count)
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

/// HTTP surface settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub allowed_origins: Vec<String>,
    pub frontend_dist: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origins: split_list(DEFAULT_ALLOWED_ORIGINS),
            frontend_dist: None,
        }
    }
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub auth: AuthConfig,
    pub http: HttpConfig,
}

/// Raw values from flags/environment; `None` means "not given"
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub jwt_secret: Option<String>,
    pub refresh_pepper: Option<String>,
    pub access_token_expires_minutes: Option<u64>,
    pub refresh_token_expires_days: Option<u64>,
    pub recovery_code_count: Option<usize>,
    pub recovery_code_bytes: Option<usize>,
    pub allowed_origins: Option<String>,
    pub frontend_dist: Option<PathBuf>,
}

impl ServerConfig {
    /// Merge flags/environment over the TOML file over defaults
    pub fn resolve(overrides: ConfigOverrides, file: FileConfig) -> hr_common::Result<Self> {
        let jwt_secret = required_secret(overrides.jwt_secret, "APP_JWT_SECRET")?;
        let refresh_pepper = required_secret(overrides.refresh_pepper, "REFRESH_TOKEN_PEPPER")?;

        let mut auth = AuthConfig::new(jwt_secret, refresh_pepper);
        let minutes = overrides
            .access_token_expires_minutes
            .or(file.access_token_expires_minutes)
            .unwrap_or(DEFAULT_ACCESS_MINUTES);
        let days = overrides
            .refresh_token_expires_days
            .or(file.refresh_token_expires_days)
            .unwrap_or(DEFAULT_REFRESH_DAYS);
        if minutes == 0 || days == 0 {
            return Err(hr_common::Error::Config(
                "Token lifetimes must be greater than zero".to_string(),
            ));
        }
        auth.access_ttl = Duration::from_secs(minutes * 60);
        auth.refresh_ttl = Duration::from_secs(days * 24 * 3600);
        auth.recovery_code_count = overrides
            .recovery_code_count
            .or(file.recovery_code_count)
            .unwrap_or(DEFAULT_RECOVERY_CODE_COUNT);
        auth.recovery_code_bytes = overrides
            .recovery_code_bytes
            .unwrap_or(DEFAULT_RECOVERY_CODE_BYTES)
            .max(6);
        auth.password_cost = file.password_cost.unwrap_or_default();

        let allowed_origins = match overrides.allowed_origins {
            Some(list) => split_list(&list),
            None => file
                .allowed_origins
                .unwrap_or_else(|| split_list(DEFAULT_ALLOWED_ORIGINS)),
        };

        let database_path = resolve_path(
            overrides.database.as_deref(),
            "DATABASE_URL",
            file.database.as_deref(),
            default_database_path,
        );

        Ok(Self {
            host: overrides
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            database_path: strip_sqlite_scheme(database_path),
            auth,
            http: HttpConfig {
                allowed_origins,
                frontend_dist: overrides.frontend_dist.or(file.frontend_dist),
            },
        })
    }
}

fn required_secret(value: Option<String>, name: &str) -> hr_common::Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(hr_common::Error::Config(format!("{} must be set", name))),
    }
}

/// Accept `sqlite://path` as well as a bare path
fn strip_sqlite_scheme(path: PathBuf) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_prefix("sqlite://") {
        Some(rest) => PathBuf::from(rest.split('?').next().unwrap_or(rest)),
        None => path,
    }
}
