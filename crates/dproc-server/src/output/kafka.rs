//! Message broker destination
//!
//! The handler builds an [`OutboundMessage`] and hands it to a
//! [`MessageProducer`]. With the `kafka` feature the producer is backed by
//! rdkafka; otherwise [`InProcessProducer`] keeps messages in memory per
//! topic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dproc_common::types::{DestinationType, OutputDestination};
use tokio::sync::RwLock;
use tracing::debug;

use super::handler::{OutputContent, OutputHandler, WriteError, Written};
use super::template::{expand, TemplateContext};

/// Default broker limit on message size (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Overrides the producer's broker list.
    pub brokers: Option<String>,
    pub topic: String,
    pub key: String,
    pub headers: BTreeMap<String, String>,
    pub partition: Option<i32>,
    pub payload: Vec<u8>,
}

/// Publishes messages to a broker.
///
/// Implementations report broker unavailability as
/// [`WriteError::Retryable`] and oversized messages as
/// [`WriteError::Permanent`].
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), WriteError>;
}

/// Keeps published messages in memory, grouped by topic.
#[derive(Debug)]
pub struct InProcessProducer {
    max_message_bytes: usize,
    topics: RwLock<HashMap<String, Vec<OutboundMessage>>>,
}

impl InProcessProducer {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            max_message_bytes,
            topics: RwLock::new(HashMap::new()),
        }
    }

    pub async fn messages(&self, topic: &str) -> Vec<OutboundMessage> {
        self.topics.read().await.get(topic).cloned().unwrap_or_default()
    }
}

impl Default for InProcessProducer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

#[async_trait]
impl MessageProducer for InProcessProducer {
    async fn send(&self, message: OutboundMessage) -> Result<(), WriteError> {
        if message.payload.len() > self.max_message_bytes {
            return Err(WriteError::Permanent(format!(
                "message of {} bytes exceeds the {} byte limit",
                message.payload.len(),
                self.max_message_bytes
            )));
        }
        self.topics
            .write()
            .await
            .entry(message.topic.clone())
            .or_default()
            .push(message);
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use rd::RdKafkaProducer;

#[cfg(feature = "kafka")]
mod rd {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use rdkafka::error::{KafkaError, RDKafkaErrorCode};
    use rdkafka::message::{Header, OwnedHeaders};
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::ClientConfig;
    use tokio::sync::Mutex;
    use tracing::info;

    use super::{MessageProducer, OutboundMessage};
    use crate::output::handler::WriteError;

    const MESSAGE_TIMEOUT_MS: &str = "5000";
    const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

    /// rdkafka producer, one client per broker list.
    pub struct RdKafkaProducer {
        default_brokers: String,
        clients: Mutex<HashMap<String, FutureProducer>>,
    }

    impl RdKafkaProducer {
        pub fn new(default_brokers: impl Into<String>) -> Self {
            Self {
                default_brokers: default_brokers.into(),
                clients: Mutex::new(HashMap::new()),
            }
        }

        async fn client(&self, brokers: &str) -> Result<FutureProducer, WriteError> {
            let mut clients = self.clients.lock().await;
            if let Some(client) = clients.get(brokers) {
                return Ok(client.clone());
            }
            let client: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", MESSAGE_TIMEOUT_MS)
                .create()
                .map_err(|e| WriteError::Retryable(format!("cannot create producer: {e}")))?;
            info!(brokers, "Kafka producer created");
            clients.insert(brokers.to_string(), client.clone());
            Ok(client)
        }
    }

    fn classify(err: KafkaError) -> WriteError {
        match err {
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge) => {
                WriteError::Permanent(err.to_string())
            },
            other => WriteError::Retryable(other.to_string()),
        }
    }

    #[async_trait]
    impl MessageProducer for RdKafkaProducer {
        async fn send(&self, message: OutboundMessage) -> Result<(), WriteError> {
            let brokers = message.brokers.as_deref().unwrap_or(&self.default_brokers);
            let client = self.client(brokers).await?;

            let headers = message
                .headers
                .iter()
                .fold(OwnedHeaders::new(), |headers, (key, value)| {
                    headers.insert(Header {
                        key,
                        value: Some(value.as_str()),
                    })
                });

            let mut record = FutureRecord::to(&message.topic)
                .key(&message.key)
                .payload(&message.payload)
                .headers(headers);
            if let Some(partition) = message.partition {
                record = record.partition(partition);
            }

            client
                .send(record, QUEUE_TIMEOUT)
                .await
                .map(|_| ())
                .map_err(|(err, _)| classify(err))
        }
    }
}

#[derive(Clone)]
pub struct KafkaOutputHandler {
    producer: Arc<dyn MessageProducer>,
}

impl KafkaOutputHandler {
    pub fn new(producer: Arc<dyn MessageProducer>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl OutputHandler for KafkaOutputHandler {
    fn can_handle(&self, destination_type: DestinationType) -> bool {
        destination_type == DestinationType::Kafka
    }

    async fn write(
        &self,
        destination: &OutputDestination,
        content: &OutputContent,
    ) -> Result<Written, WriteError> {
        let config = destination.kafka_config.as_ref().ok_or_else(|| {
            WriteError::Permanent(format!("destination '{}' has no kafka configuration", destination.id))
        })?;
        if config.topic.trim().is_empty() {
            return Err(WriteError::Permanent(format!(
                "destination '{}' has no topic",
                destination.id
            )));
        }

        let key = match &config.message_key {
            Some(template) if !template.is_empty() => {
                expand(template, &TemplateContext::for_content(content))
            },
            _ => content.output_file_name(),
        };

        let message = OutboundMessage {
            brokers: config.broker_server.clone().filter(|b| !b.is_empty()),
            topic: config.topic.clone(),
            key,
            headers: config.headers.clone(),
            partition: config.partition,
            payload: content.bytes.clone(),
        };
        let location = match message.partition {
            Some(p) => format!("{}[{p}]", message.topic),
            None => message.topic.clone(),
        };
        debug!(topic = %message.topic, key = %message.key, bytes = message.payload.len(), "Publishing output message");

        self.producer.send(message).await?;
        Ok(Written {
            bytes_written: content.bytes.len(),
            location,
        })
    }
}
