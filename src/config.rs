use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub bucket: String,
    /// Prefix for catalog retrieval URLs, without the bucket.
    pub public_url: String,
    /// SMTP relay; notifications are only logged when unset.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub mail_from: String,
    pub mail_to: String,
    /// Redis session backend; in-memory sessions when unset.
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
    pub seen_capacity: usize,
    pub seed_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    /// Apply the catalog schema and exit.
    Migrate,
    /// Apply the schema, ingest the seed directory and exit.
    Seed,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Minimal file hosting service")]
pub struct Args {
    /// Host to bind to (overrides FILEDROP_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILEDROP_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides FILEDROP_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides FILEDROP_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory of example files for --seed (overrides FILEDROP_SEED_DIR)
    #[arg(long)]
    pub seed_dir: Option<PathBuf>,

    /// Run migrations and exit (serving applies them too)
    #[arg(long)]
    pub migrate: bool,

    /// Migrate the database, upload the example files and exit
    #[arg(long, conflicts_with = "migrate")]
    pub seed: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge CLI arguments over values from `lookup` over defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<(Self, RunMode)> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let cfg = Self {
            host: args.host.unwrap_or_else(|| var("FILEDROP_HOST", "0.0.0.0")),
            port: match args.port {
                Some(port) => port,
                None => parse_var(&lookup, "FILEDROP_PORT", 8080)?,
            },
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| var("FILEDROP_STORAGE_DIR", "./data/objects")),
            database_url: args
                .database_url
                .unwrap_or_else(|| var("FILEDROP_DATABASE_URL", "sqlite://./data/meta/filedrop.db")),
            bucket: var("FILEDROP_BUCKET", "files"),
            public_url: var("FILEDROP_PUBLIC_URL", "http://localhost:8080/objects"),
            smtp_host: lookup("FILEDROP_SMTP_HOST").filter(|h| !h.is_empty()),
            smtp_port: parse_var(&lookup, "FILEDROP_SMTP_PORT", 25)?,
            mail_from: var("FILEDROP_MAIL_FROM", "uploads@filedrop.local"),
            mail_to: var("FILEDROP_MAIL_TO", "recipient@example.com"),
            redis_url: lookup("FILEDROP_REDIS_URL").filter(|u| !u.is_empty()),
            session_ttl: Duration::from_secs(parse_var(&lookup, "FILEDROP_SESSION_TTL_SECS", 15 * 60)?),
            seen_capacity: parse_var(&lookup, "FILEDROP_SEEN_CAPACITY", 50)?,
            seed_dir: args
                .seed_dir
                .unwrap_or_else(|| PathBuf::from(var("FILEDROP_SEED_DIR", "./seed"))),
            max_upload_bytes: parse_var(&lookup, "FILEDROP_MAX_UPLOAD_BYTES", 64 * 1024 * 1024)?,
        };

        let mode = if args.seed {
            RunMode::Seed
        } else if args.migrate {
            RunMode::Migrate
        } else {
            RunMode::Serve
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let (cfg, mode) = AppConfig::resolve(Args::default(), env_of(&[])).unwrap();
        assert_eq!(mode, RunMode::Serve);
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.bucket, "files");
        assert_eq!(cfg.session_ttl, Duration::from_secs(900));
        assert_eq!(cfg.seen_capacity, 50);
        assert!(cfg.smtp_host.is_none());
        assert!(cfg.redis_url.is_none());
    }

    #[test]
    fn args_override_env() {
        let args = Args {
            port: Some(9000),
            seed: true,
            ..Args::default()
        };
        let env = env_of(&[
            ("FILEDROP_PORT", "7000"),
            ("FILEDROP_HOST", "127.0.0.1"),
            ("FILEDROP_SMTP_HOST", "mail"),
            ("FILEDROP_SMTP_PORT", "1025"),
        ]);
        let (cfg, mode) = AppConfig::resolve(args, env).unwrap();
        assert_eq!(mode, RunMode::Seed);
        assert_eq!(cfg.addr(), "127.0.0.1:9000");
        assert_eq!(cfg.smtp_host.as_deref(), Some("mail"));
        assert_eq!(cfg.smtp_port, 1025);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let err = AppConfig::resolve(Args::default(), env_of(&[("FILEDROP_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("FILEDROP_PORT"));
    }
}
