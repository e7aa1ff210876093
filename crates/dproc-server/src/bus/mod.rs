//! In-process event bus
//!
//! Each pipeline event kind travels on its own bounded queue, mirroring the
//! dedicated topics of a message broker.

use async_trait::async_trait;
use dproc_common::types::{FileProcessingFailedEvent, ValidationCompletedEvent, ValidationRequestEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ValidationRequested(ValidationRequestEvent),
    ValidationCompleted(ValidationCompletedEvent),
    ProcessingFailed(FileProcessingFailedEvent),
}

impl PipelineEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            PipelineEvent::ValidationRequested(_) => "validation-requests",
            PipelineEvent::ValidationCompleted(_) => "validation-completed",
            PipelineEvent::ProcessingFailed(_) => "file-processing-failed",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            PipelineEvent::ValidationRequested(e) => &e.correlation_id,
            PipelineEvent::ValidationCompleted(e) => &e.correlation_id,
            PipelineEvent::ProcessingFailed(e) => &e.correlation_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no consumer is listening on topic '{0}'")]
    Closed(&'static str),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PipelineEvent) -> Result<(), BusError>;
}

/// Publishing half of the in-process bus.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    requests: mpsc::Sender<ValidationRequestEvent>,
    completed: mpsc::Sender<ValidationCompletedEvent>,
    failed: mpsc::Sender<FileProcessingFailedEvent>,
}

/// Consuming half of the in-process bus, one receiver per topic.
#[derive(Debug)]
pub struct BusReceivers {
    pub requests: mpsc::Receiver<ValidationRequestEvent>,
    pub completed: mpsc::Receiver<ValidationCompletedEvent>,
    pub failed: mpsc::Receiver<FileProcessingFailedEvent>,
}

impl ChannelBus {
    pub fn new(capacity: usize) -> (Self, BusReceivers) {
        let (requests_tx, requests_rx) = mpsc::channel(capacity);
        let (completed_tx, completed_rx) = mpsc::channel(capacity);
        let (failed_tx, failed_rx) = mpsc::channel(capacity);

        (
            Self {
                requests: requests_tx,
                completed: completed_tx,
                failed: failed_tx,
            },
            BusReceivers {
                requests: requests_rx,
                completed: completed_rx,
                failed: failed_rx,
            },
        )
    }
}

#[async_trait]
impl EventPublisher for ChannelBus {
    async fn publish(&self, event: PipelineEvent) -> Result<(), BusError> {
        let topic = event.topic();
        debug!(topic, correlation_id = %event.correlation_id(), "Publishing event");

        let sent = match event {
            PipelineEvent::ValidationRequested(e) => self.requests.send(e).await.is_ok(),
            PipelineEvent::ValidationCompleted(e) => self.completed.send(e).await.is_ok(),
            PipelineEvent::ProcessingFailed(e) => self.failed.send(e).await.is_ok(),
        };

        if sent {
            Ok(())
        } else {
            Err(BusError::Closed(topic))
        }
    }
}
