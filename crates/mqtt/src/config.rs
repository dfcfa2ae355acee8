use std::env;

use sensorpeek_core::{FetchError, DEFAULT_BROKER, DEFAULT_CLIENT_ID, DEFAULT_PORT, DEFAULT_TOPIC};
use serde::{Deserialize, Serialize};

/// Where to fetch from. Built fresh for every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            broker: DEFAULT_BROKER.to_string(),
            port: DEFAULT_PORT,
            topic: DEFAULT_TOPIC.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Defaults for the dashboard form, overridable through the environment.
    pub fn from_env() -> Self {
        let mut cfg = ConnectionConfig::default();

        if let Ok(v) = env::var("MQTT_BROKER_HOST") {
            if !v.is_empty() {
                cfg.broker = v;
            }
        }
        if let Ok(v) = env::var("MQTT_BROKER_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                if p != 0 {
                    cfg.port = p;
                }
            }
        }
        if let Ok(v) = env::var("MQTT_TOPIC") {
            if !v.is_empty() {
                cfg.topic = v;
            }
        }
        if let Ok(v) = env::var("MQTT_CLIENT_ID") {
            if !v.is_empty() {
                cfg.client_id = v;
            }
        }

        cfg
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.broker, self.port)
    }

    /// Rejects parameters the MQTT client cannot work with at all.
    pub(crate) fn validate(&self) -> Result<(), FetchError> {
        if self.broker.trim().is_empty() {
            return Err(FetchError::Connection("broker address is empty".into()));
        }
        if self.port == 0 {
            return Err(FetchError::Connection("port must be between 1 and 65535".into()));
        }
        if self.topic.trim().is_empty() {
            return Err(FetchError::Subscription("topic is empty".into()));
        }
        // rumqttc panics on these
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(FetchError::Connection(
                "client identifier must be non-empty and must not start with a space".into(),
            ));
        }
        Ok(())
    }
}
