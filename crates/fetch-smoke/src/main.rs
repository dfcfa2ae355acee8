use sensorpeek_core::{FetchError, FetchResult, DEFAULT_CLIENT_ID, DEFAULT_PORT};
use sensorpeek_mqtt::{fetch_one_message, ConnectionConfig, DEFAULT_FETCH_TIMEOUT};
use url::Url;

#[tokio::main]
async fn main() {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mqtt://broker.mqttdashboard.com:1883/Sensor/THP2".to_string());
    let client_id = std::env::args().nth(2).unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

    let config = match parse_target(&target, client_id) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid target {}: {}", target, e);
            std::process::exit(3);
        }
    };
    eprintln!("Fetching one message from {} topic '{}'", config.address(), config.topic);

    // Wait up to the default timeout for one message, then print and exit
    match fetch_one_message(&config, DEFAULT_FETCH_TIMEOUT).await {
        FetchResult::Structured(fields) => match serde_json::to_string_pretty(&fields) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{:?}", fields),
        },
        FetchResult::Text(text) => println!("{}", text),
        FetchResult::Error(e @ FetchError::Timeout { .. }) => {
            eprintln!("{}", e);
            std::process::exit(4);
        }
        FetchResult::Error(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    }
}

/// `mqtt://host[:port]/topic`. A trailing `#` wildcard arrives as the URL fragment.
fn parse_target(raw: &str, client_id: String) -> Result<ConnectionConfig, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "mqtt" && url.scheme() != "tcp" {
        return Err(format!("unsupported scheme '{}', expected mqtt://", url.scheme()));
    }
    let broker = url.host_str().ok_or("missing broker host")?.to_string();
    let port = url.port().unwrap_or(DEFAULT_PORT);

    let mut topic = url.path().trim_start_matches('/').to_string();
    if let Some(fragment) = url.fragment() {
        topic.push('#');
        topic.push_str(fragment);
    }
    if topic.is_empty() {
        return Err("missing topic in URL path".to_string());
    }

    Ok(ConnectionConfig { broker, port, topic, client_id })
}
