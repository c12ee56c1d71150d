use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Base URL used in links sent by mail (activation etc.)
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
    pub seed_test_data: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mail {
    /// Empty host means mails are only logged
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jobs {
    pub birthday_interval_secs: u64,
    pub session_cleanup_interval_secs: u64,
    pub verification_code_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub mail: Mail,
    pub storage: Storage,
    pub rate_limit: RateLimit,
    pub jobs: Jobs,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in kozosseg-server directory (for development)
        let dev_path = PathBuf::from("kozosseg-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = Self::with_defaults(builder)?;

        // 2. Override with environment variables (highest priority)
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("PUBLIC_URL", "server.public_url"),
            ("DATABASE_PATH", "database.path"),
            ("SMTP_HOST", "mail.smtp_host"),
            ("SMTP_PORT", "mail.smtp_port"),
            ("SMTP_USER", "mail.smtp_user"),
            ("SMTP_PASS", "mail.smtp_pass"),
            ("SMTP_FROM", "mail.from"),
            ("STORAGE_ROOT", "storage.root"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Settings built from defaults only, ignoring files and environment
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder())?
            .build()?
            .try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.path", "kozosseg.db")?
            .set_default("database.seed_test_data", false)?
            .set_default("mail.smtp_host", "")?
            .set_default("mail.smtp_port", 587)?
            .set_default("mail.smtp_user", "")?
            .set_default("mail.smtp_pass", "")?
            .set_default("mail.from", "Kozosseg <noreply@kozosseg.local>")?
            .set_default("storage.root", "uploads")?
            .set_default("rate_limit.max_requests", 120)?
            .set_default("rate_limit.window_secs", 60)?
            .set_default("jobs.birthday_interval_secs", 3600)?
            .set_default("jobs.session_cleanup_interval_secs", 3600)?
            .set_default("jobs.verification_code_ttl_secs", 900)
    }
}
