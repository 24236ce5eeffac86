//! # Service Configuration
//!
//! Environment-backed configuration with command-line overrides. The
//! database URL is the only required value.

use anyhow::{bail, Result};

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection URL.
    pub database_url: String,
    /// HTTP bind address.
    pub bind: String,
    /// Seconds between activation sweeps.
    pub activation_interval_secs: u64,
}

impl Config {
    /// Defaults overridable via environment and flags.
    pub const DEFAULT_BIND: &'static str = "0.0.0.0:8080";
    /// Hourly sweeps by default.
    pub const DEFAULT_ACTIVATION_INTERVAL_SECS: u64 = 3600;

    /// Resolve configuration from flags, falling back to the environment.
    ///
    /// # Errors
    ///
    /// Fails when no database URL is given and neither
    /// `LENDLOOP_DATABASE_URL` nor `DATABASE_URL` is set, or when the
    /// activation interval is zero.
    pub fn resolve(
        database_url: Option<String>,
        bind: Option<String>,
        activation_interval_secs: Option<u64>,
    ) -> Result<Self> {
        let database_url = match database_url
            .or_else(|| std::env::var("LENDLOOP_DATABASE_URL").ok())
            .or_else(|| std::env::var("DATABASE_URL").ok())
        {
            Some(url) if !url.is_empty() => url,
            _ => bail!(
                "no database URL: pass --database-url or set LENDLOOP_DATABASE_URL / DATABASE_URL"
            ),
        };

        let bind = bind
            .or_else(|| std::env::var("LENDLOOP_BIND").ok())
            .unwrap_or_else(|| Self::DEFAULT_BIND.to_string());

        let activation_interval_secs = match activation_interval_secs {
            Some(secs) => secs,
            None => match std::env::var("LENDLOOP_ACTIVATION_INTERVAL_SECS") {
                Ok(raw) => raw.parse()?,
                Err(_) => Self::DEFAULT_ACTIVATION_INTERVAL_SECS,
            },
        };
        if activation_interval_secs == 0 {
            bail!("activation interval must be at least one second");
        }

        Ok(Self {
            database_url,
            bind,
            activation_interval_secs,
        })
    }
}
