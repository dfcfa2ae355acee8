use chrono::{DateTime, Local};
use sensorpeek_core::FetchResult;
use sensorpeek_mqtt::ConnectionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the dashboard remembers for the lifetime of the process.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub last_result: Option<FetchResult>,
    pub last_update: Option<String>,
    // Echoed back into the form so the user does not retype it
    pub last_config: ConnectionConfig,
    pub fetch_count: u64,
}

impl SessionState {
    pub fn new(defaults: ConnectionConfig) -> Self {
        Self {
            last_result: None,
            last_update: None,
            last_config: defaults,
            fetch_count: 0,
        }
    }

    pub fn record(&mut self, config: ConnectionConfig, result: FetchResult, at: DateTime<Local>) {
        self.last_result = Some(result);
        self.last_update = Some(at.format(TIMESTAMP_FORMAT).to_string());
        self.last_config = config;
        self.fetch_count += 1;
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("port must be a whole number, got '{0}'")]
    InvalidPort(String),
    #[error("port must be between 1 and 65535, got {0}")]
    PortOutOfRange(u64),
}

/// Dashboard sidebar form, as posted by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchForm {
    pub broker: String,
    pub port: String,
    pub topic: String,
    pub client_id: String,
}

impl FetchForm {
    pub fn into_config(self) -> Result<ConnectionConfig, FormError> {
        let port = parse_port(&self.port)?;
        Ok(ConnectionConfig {
            broker: self.broker.trim().to_string(),
            port,
            topic: self.topic,
            client_id: self.client_id,
        })
    }
}

/// JSON body for `POST /api/fetch`. Missing fields take the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchRequest {
    pub broker: Option<String>,
    pub port: Option<u64>,
    pub topic: Option<String>,
    pub client_id: Option<String>,
}

impl FetchRequest {
    pub fn into_config(self, defaults: &ConnectionConfig) -> Result<ConnectionConfig, FormError> {
        let port = match self.port {
            Some(p) => check_port_range(p)?,
            None => defaults.port,
        };
        Ok(ConnectionConfig {
            broker: self.broker.unwrap_or_else(|| defaults.broker.clone()),
            port,
            topic: self.topic.unwrap_or_else(|| defaults.topic.clone()),
            client_id: self.client_id.unwrap_or_else(|| defaults.client_id.clone()),
        })
    }
}

fn parse_port(raw: &str) -> Result<u16, FormError> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| FormError::InvalidPort(raw.to_string()))?;
    check_port_range(value)
}

fn check_port_range(value: u64) -> Result<u16, FormError> {
    match u16::try_from(value) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(FormError::PortOutOfRange(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sensorpeek_core::FetchError;

    fn form(port: &str) -> FetchForm {
        FetchForm {
            broker: " test.mosquitto.org ".into(),
            port: port.into(),
            topic: "Sensor/THP2".into(),
            client_id: "c1".into(),
        }
    }

    #[test]
    fn test_form_into_config() {
        let cfg = form("1883").into_config().unwrap();
        assert_eq!(cfg.broker, "test.mosquitto.org");
        assert_eq!(cfg.port, 1883);
        assert_eq!(cfg.topic, "Sensor/THP2");
        assert_eq!(cfg.client_id, "c1");
        assert_eq!(form(" 65535 ").into_config().unwrap().port, 65535);
    }

    #[test]
    fn test_form_rejects_bad_ports() {
        assert_eq!(form("0").into_config(), Err(FormError::PortOutOfRange(0)));
        assert_eq!(form("65536").into_config(), Err(FormError::PortOutOfRange(65536)));
        assert_eq!(form("mqtt").into_config(), Err(FormError::InvalidPort("mqtt".into())));
        assert!(form("-1").into_config().is_err());
    }

    #[test]
    fn test_request_fills_defaults() {
        let defaults = ConnectionConfig::default();
        let req = FetchRequest { topic: Some("lab/bench".into()), ..FetchRequest::default() };
        let cfg = req.into_config(&defaults).unwrap();
        assert_eq!(cfg.topic, "lab/bench");
        assert_eq!(cfg.broker, defaults.broker);
        assert_eq!(cfg.port, defaults.port);

        let req = FetchRequest { port: Some(70000), ..FetchRequest::default() };
        assert_eq!(req.into_config(&defaults), Err(FormError::PortOutOfRange(70000)));
    }

    #[test]
    fn test_record_overwrites_previous_result() {
        let mut state = SessionState::new(ConnectionConfig::default());
        assert!(state.last_result.is_none());
        assert!(state.last_update.is_none());

        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        state.record(ConnectionConfig::default(), FetchResult::Text("ALIVE".into()), at);
        assert_eq!(state.last_update.as_deref(), Some("2024-03-09 14:05:07"));

        let mut cfg = ConnectionConfig::default();
        cfg.topic = "other".into();
        let err = FetchResult::Error(FetchError::Timeout { waited_ms: 5000 });
        state.record(cfg.clone(), err.clone(), at);
        assert_eq!(state.last_result, Some(err));
        assert_eq!(state.last_config, cfg);
        assert_eq!(state.fetch_count, 2);
    }
}
