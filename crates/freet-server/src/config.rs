use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

/// Placeholder JWT secrets that must not reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

/// Upper bound on `FREET_SESSION_DAYS`, roughly ten years.
const MAX_SESSION_DAYS: i64 = 3650;

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Prebuilt client bundle, served for any path the API does not claim.
    pub static_dir: Option<PathBuf>,
    pub session_days: i64,
}

impl Config {
    /// Read `FREET_*` variables. Call after `.env` has been loaded.
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("FREET_JWT_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.into());
        if jwt_secret.is_empty() {
            anyhow::bail!("FREET_JWT_SECRET is set but empty");
        }
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("FREET_JWT_SECRET is unset or a placeholder; sessions can be forged");
        }

        let db_path = std::env::var("FREET_DB_PATH").unwrap_or_else(|_| "freets.db".into());
        let host = std::env::var("FREET_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("FREET_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("FREET_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("FREET_HOST must be an IP address")?;

        let static_dir = std::env::var("FREET_STATIC_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        let session_days =
            parse_session_days(&std::env::var("FREET_SESSION_DAYS").unwrap_or_else(|_| "30".into()))?;

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(db_path),
            addr,
            static_dir,
            session_days,
        })
    }
}

fn parse_session_days(raw: &str) -> anyhow::Result<i64> {
    let days: i64 = raw
        .trim()
        .parse()
        .context("FREET_SESSION_DAYS must be a whole number of days")?;
    if !(1..=MAX_SESSION_DAYS).contains(&days) {
        anyhow::bail!("FREET_SESSION_DAYS must be between 1 and {}", MAX_SESSION_DAYS);
    }
    Ok(days)
}
