use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use sensorpeek_mqtt::DEFAULT_FETCH_TIMEOUT;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub http_addr: SocketAddr,
    pub fetch_timeout: Duration,
    pub static_dir: PathBuf,
}

impl ServerSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        let raw_addr = env::var("SENSORPEEK_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = raw_addr
            .parse()
            .with_context(|| format!("invalid SENSORPEEK_HTTP_ADDR '{}'", raw_addr))?;

        let mut fetch_timeout = DEFAULT_FETCH_TIMEOUT;
        if let Ok(v) = env::var("SENSORPEEK_FETCH_TIMEOUT_SECS") {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => fetch_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %v, "Ignoring invalid SENSORPEEK_FETCH_TIMEOUT_SECS"),
            }
        }

        let static_dir = env::var("SENSORPEEK_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"));

        Ok(Self { http_addr, fetch_timeout, static_dir })
    }
}
