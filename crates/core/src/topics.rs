// Connection defaults offered by the dashboard form

pub const DEFAULT_BROKER: &str = "broker.mqttdashboard.com";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "Sensor/THP2";
pub const DEFAULT_CLIENT_ID: &str = "sensorpeek_client";

// Public brokers that accept anonymous connections, handy for quick tests
pub const PUBLIC_TEST_BROKERS: [&str; 3] = [
    "broker.mqttdashboard.com",
    "test.mosquitto.org",
    "broker.hivemq.com",
];

/// True when the topic filter uses `+` or `#`, i.e. it may match more than one topic.
pub fn is_wildcard_filter(topic: &str) -> bool {
    topic.split('/').any(|level| level == "+" || level == "#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_detection() {
        assert!(is_wildcard_filter("Sensor/+/temp"));
        assert!(is_wildcard_filter("Sensor/#"));
        assert!(!is_wildcard_filter(DEFAULT_TOPIC));
        assert!(!is_wildcard_filter("Sensor/a+b"));
    }
}
