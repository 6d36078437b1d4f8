use crate::adapters::database::MessageStore;
use crate::adapters::image_host::ImageHost;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
struct Metrics {
    status: Gauge<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("agora-server");
        Self {
            status: meter
                .i64_gauge("agora_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }

    fn record(&self, component: &'static str, ok: bool) {
        self.status.record(i64::from(ok), &[KeyValue::new("component", component)]);
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    messages: Arc<dyn MessageStore>,
    image_host: Arc<dyn ImageHost>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(messages: Arc<dyn MessageStore>, image_host: Arc<dyn ImageHost>, config: HealthConfig) -> Self {
        Self { messages, image_host, config, metrics: Metrics::new() }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        let result = match timeout(db_timeout, self.messages.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e}")),
            Err(_) => Err("Database connection timed out".to_string()),
        };
        self.metrics.record("database", result.is_ok());
        result
    }

    /// Checks the configured image host.
    ///
    /// # Errors
    /// Returns a string describing the failure if the host is unreachable.
    pub async fn check_storage(&self) -> Result<(), String> {
        let storage_timeout = Duration::from_millis(self.config.storage_timeout_ms);

        let result = match timeout(storage_timeout, self.image_host.check()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Image host check failed: {e}")),
            Err(_) => Err("Image host check timed out".to_string()),
        };
        self.metrics.record("storage", result.is_ok());
        result
    }
}
