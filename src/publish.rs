//! Publish seam for committed `Put` prefixes.
//!
//! What a published payload *means* (a transaction broadcast, a ledger
//! append, anything) belongs to the surrounding system. The runtime owns
//! only the commitment point and hands the payload through this trait.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Receives the payload of every committed `Put`.
///
/// Implementations may perform I/O; a returned error fails the evaluation
/// that committed the `Put`.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: &str) -> Result<()>;
}

/// Default publisher: logs the payload and does nothing else.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, payload: &str) -> Result<()> {
        info!(payload = %payload, "published payload");
        Ok(())
    }
}

/// Captures published payloads for inspection. Intended for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    payloads: Arc<Mutex<Vec<String>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in commitment order.
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.payloads.lock().unwrap().clear();
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, payload: &str) -> Result<()> {
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}
