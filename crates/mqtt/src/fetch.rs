use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS,
    SubscribeReasonCode,
};
use sensorpeek_core::{decode_payload, is_wildcard_filter, FetchError, FetchResult};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;

/// How long a fetch waits for its message unless the caller says otherwise.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 10;
// Largest remaining length MQTT 3.1.1 can encode; rumqttc defaults to 10 KiB
const MAX_PACKET_SIZE: usize = 268_435_455;
// Time the receive loop gets to flush DISCONNECT before it is aborted
const TEARDOWN_GRACE: Duration = Duration::from_millis(250);

/// What the receive loop hands back to the waiting caller. Sent at most once.
#[derive(Debug)]
enum Delivery {
    Payload(Vec<u8>),
    Failed(FetchError),
}

/// Connects, subscribes, waits for the first message on `config.topic` and disconnects.
///
/// The whole cycle, connect phase included, is bounded by `timeout`. Every
/// failure is folded into [`FetchResult::Error`]; this function never panics
/// on network trouble and never retries. The connection and the background
/// receive loop are released before it returns, on every path.
pub async fn fetch_one_message(config: &ConnectionConfig, timeout: Duration) -> FetchResult {
    let started = Instant::now();
    let deadline = started + timeout;
    info!(broker = %config.broker, port = config.port, topic = %config.topic, "Fetching one MQTT message");
    if is_wildcard_filter(&config.topic) {
        debug!("Wildcard filter: the first message on any matching topic is used");
    }

    let result = match receive_first(config, timeout, deadline).await {
        Ok(body) => decode_payload(&body),
        Err(err) => FetchResult::Error(err),
    };

    info!(
        outcome = result.outcome(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Fetch finished"
    );
    result
}

async fn receive_first(
    config: &ConnectionConfig,
    timeout: Duration,
    deadline: Instant,
) -> Result<Vec<u8>, FetchError> {
    config.validate()?;

    let (client, mut eventloop) = AsyncClient::new(build_options(config), REQUEST_CAPACITY);
    // Nothing to tear down yet if this fails: dropping the event loop closes the socket.
    await_connack(&mut eventloop, deadline).await?;

    let (tx, rx) = oneshot::channel();
    let session = FetchSession {
        client,
        receiver: tokio::spawn(receive_loop(eventloop, tx)),
    };

    if let Err(e) = session.client.subscribe(config.topic.as_str(), QoS::AtMostOnce).await {
        session.close().await;
        return Err(FetchError::Subscription(format!(
            "could not subscribe to '{}': {}",
            config.topic, e
        )));
    }
    debug!(topic = %config.topic, "Subscribe requested");

    let outcome = match timeout_at(deadline, rx).await {
        Ok(Ok(Delivery::Payload(body))) => Ok(body),
        Ok(Ok(Delivery::Failed(err))) => Err(err),
        Ok(Err(_)) => Err(FetchError::Unexpected(
            "receive loop stopped without delivering a result".into(),
        )),
        Err(_) => Err(FetchError::Timeout {
            waited_ms: timeout.as_millis() as u64,
        }),
    };

    session.close().await;
    outcome
}

fn build_options(config: &ConnectionConfig) -> MqttOptions {
    let mut opts = MqttOptions::new(&config.client_id, &config.broker, config.port);
    opts.set_keep_alive(KEEP_ALIVE);
    opts.set_clean_session(true);
    opts.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
    opts
}

async fn await_connack(eventloop: &mut EventLoop, deadline: Instant) -> Result<(), FetchError> {
    loop {
        match timeout_at(deadline, eventloop.poll()).await {
            Ok(Ok(Event::Incoming(Incoming::ConnAck(ack)))) => {
                debug!(code = ?ack.code, "MQTT connected");
                return Ok(());
            }
            Ok(Ok(other)) => debug!(?other, "MQTT event before CONNACK"),
            Ok(Err(e)) => return Err(connection_error(e)),
            Err(_) => {
                return Err(FetchError::Connection(
                    "broker did not acknowledge the connection before the deadline".into(),
                ))
            }
        }
    }
}

fn connection_error(err: ConnectionError) -> FetchError {
    FetchError::Connection(err.to_string())
}

/// Drives the MQTT event loop until DISCONNECT has gone out or the transport fails.
async fn receive_loop(mut eventloop: EventLoop, tx: oneshot::Sender<Delivery>) {
    let mut tx = Some(tx);
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(p))) => match tx.take() {
                Some(tx) => {
                    debug!(topic = %p.topic, bytes = p.payload.len(), "First message received");
                    let _ = tx.send(Delivery::Payload(p.payload.to_vec()));
                }
                None => debug!(topic = %p.topic, "Ignoring message after the first"),
            },
            Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                let rejected = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                if rejected {
                    warn!(pkid = ack.pkid, "Broker rejected the subscription");
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(Delivery::Failed(FetchError::Subscription(
                            "broker rejected the subscription".into(),
                        )));
                    }
                } else {
                    debug!(pkid = ack.pkid, "Subscription acknowledged");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(other) => {
                debug!(?other, "MQTT event");
            }
            Err(e) => {
                match tx.take() {
                    Some(tx) => {
                        let _ = tx.send(Delivery::Failed(FetchError::Connection(format!(
                            "connection lost: {}",
                            e
                        ))));
                    }
                    None => debug!(error = ?e, "MQTT connection closed after delivery"),
                }
                break;
            }
        }
    }
}

/// Owns the client and the receive loop for the duration of one fetch.
struct FetchSession {
    client: AsyncClient,
    receiver: JoinHandle<()>,
}

impl FetchSession {
    /// Best-effort clean disconnect. Failures are logged, never returned.
    async fn close(mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(?e, "Disconnect not queued; receive loop already stopped");
        }
        match tokio::time::timeout(TEARDOWN_GRACE, &mut self.receiver).await {
            Ok(Ok(())) => debug!("Receive loop finished"),
            Ok(Err(e)) => warn!(?e, "Receive loop ended abnormally during teardown"),
            Err(_) => {
                warn!("Receive loop still running after disconnect; aborting it");
                self.receiver.abort();
            }
        }
    }
}

impl Drop for FetchSession {
    fn drop(&mut self) {
        // No-op when the loop already finished; covers cancelled callers.
        self.receiver.abort();
    }
}
