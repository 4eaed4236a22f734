//! Configuration loading from `.env` files.

use std::{env, fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};

use crate::broadcast::Broadcaster;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime settings derived from environment variables.
///
/// Not `Debug`: it holds the secret key.
#[derive(Clone)]
pub struct Settings {
    /// Signing key, `nsec1…` or hex.
    pub nsec: String,
    /// Relays every event is sent to.
    pub relays: Vec<String>,
    /// Limit for opening a relay connection.
    pub connect_timeout: Duration,
    /// Limit for a relay to acknowledge an event.
    pub publish_timeout: Duration,
    /// Optional SOCKS5 proxy (host:port), e.g. Tor.
    pub tor_socks: Option<String>,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).with_context(|| format!("reading env file {path}"))?;
        let nsec = env::var("NSEC").context("NSEC is not set")?;
        let relays = csv_strings(env::var("RELAYS").unwrap_or_default());
        let connect_timeout = secs_var("CONNECT_TIMEOUT");
        let publish_timeout = secs_var("PUBLISH_TIMEOUT");
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        Ok(Self {
            nsec,
            relays,
            connect_timeout,
            publish_timeout,
            tor_socks,
        })
    }

    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster {
            connect_timeout: self.connect_timeout,
            publish_timeout: self.publish_timeout,
            socks_proxy: self.tor_socks.clone(),
        }
    }
}

/// Write a template `.env` at `path` holding `nsec`. Refuses to overwrite.
pub fn write_template(path: &str, nsec: &str) -> Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        bail!("{path} already exists");
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut content = String::new();
    content.push_str(&format!("NSEC={nsec}\n"));
    content.push_str("RELAYS=wss://relay.damus.io,wss://nos.lol\n");
    content.push_str(&format!("CONNECT_TIMEOUT={DEFAULT_TIMEOUT_SECS}\n"));
    content.push_str(&format!("PUBLISH_TIMEOUT={DEFAULT_TIMEOUT_SECS}\n"));
    content.push_str("TOR_SOCKS=\n");
    fs::write(env_path, content)?;
    Ok(())
}

fn secs_var(name: &str) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}
