use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use sensorpeek_core::FetchResult;
use sensorpeek_mqtt::{fetch_one_message, ConnectionConfig};
use tokio::sync::RwLock;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::{InFlight, Metrics};
use crate::models::SessionState;

/// Runs fetches on behalf of the dashboard and is the only writer of the session state.
#[derive(Clone)]
pub struct FetchService {
    session: Arc<RwLock<SessionState>>,
    defaults: ConnectionConfig,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl FetchService {
    pub fn new(defaults: ConnectionConfig, timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            session: Arc::new(RwLock::new(SessionState::new(defaults.clone()))),
            defaults,
            timeout,
            metrics,
        }
    }

    pub fn defaults(&self) -> &ConnectionConfig {
        &self.defaults
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn snapshot(&self) -> SessionState {
        self.session.read().await.clone()
    }

    /// One fetch per call; each call opens and closes its own connection.
    pub async fn fetch(&self, config: ConnectionConfig) -> FetchResult {
        let fetch_id = Uuid::new_v4();
        let span = info_span!(
            "fetch",
            %fetch_id,
            broker = %config.broker,
            port = config.port,
            topic = %config.topic
        );

        async move {
            let in_flight = InFlight::enter(&self.metrics.fetch_in_flight);
            let timer = self.metrics.fetch_duration.start_timer();
            let result = fetch_one_message(&config, self.timeout).await;
            timer.observe_duration();
            drop(in_flight);
            self.metrics
                .fetch_total
                .with_label_values(&[result.outcome()])
                .inc();

            match result.error() {
                Some(e) => warn!(error = %e, "Fetch failed"),
                None => info!(outcome = result.outcome(), "Fetch succeeded"),
            }

            self.session
                .write()
                .await
                .record(config, result.clone(), Local::now());
            result
        }
        .instrument(span)
        .await
    }
}
