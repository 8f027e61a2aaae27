use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, bail};
use tracing::{info, warn};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchBackend {
    Memory,
    Sqlite,
}

impl FromStr for ScratchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown scratch backend '{}'", other)),
        }
    }
}

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub object_dir: PathBuf,
    pub public_url: String,
    pub admin_token: Option<String>,
    pub scratch_backend: ScratchBackend,
    pub cleanup_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("VOUCH_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("VOUCH_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port: u16 = try_load("VOUCH_PORT", "3000")?;
        let admin_token = env::var("VOUCH_ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        if admin_token.is_none() {
            warn!("VOUCH_ADMIN_TOKEN not set, account verification endpoint disabled");
        }

        Ok(Self {
            jwt_secret,
            db_path: try_load::<String>("VOUCH_DB_PATH", "vouch.db")?.into(),
            host: try_load("VOUCH_HOST", "0.0.0.0")?,
            port,
            object_dir: try_load::<String>("VOUCH_OBJECT_DIR", "./objects")?.into(),
            public_url: try_load("VOUCH_PUBLIC_URL", &format!("http://localhost:{}", port))?,
            admin_token,
            scratch_backend: try_load("VOUCH_SCRATCH_BACKEND", "sqlite")?,
            cleanup_interval_secs: try_load("VOUCH_CLEANUP_INTERVAL_SECS", "3600")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value '{raw}'"))
}
