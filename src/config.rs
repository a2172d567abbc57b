//! Configuration for participants.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, RuntimeError};
use crate::participant::Participant;
use crate::publish::{LogPublisher, Publisher};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for one participant.
#[derive(Debug, Clone)]
pub struct ParticipantConfig {
    /// Name of this participant.
    pub name: String,
    /// Port to listen on. 0 lets the platform choose a free port.
    pub port: u16,
    /// How long `stop` waits for workers to drain before aborting them.
    pub shutdown_timeout: Duration,
}

impl ParticipantConfig {
    /// Configuration with a platform-assigned port and default drain
    /// deadline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: 0,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Listen on a fixed port instead of a platform-assigned one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the drain deadline used by `stop`.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Expected variables:
    /// - `PARTICIPANT_NAME`: name of this participant (required)
    /// - `PARTICIPANT_PORT`: listen port (optional, default 0)
    /// - `PARTICIPANT_SHUTDOWN_TIMEOUT_MS`: drain deadline in milliseconds
    ///   (optional)
    pub fn from_env() -> Result<Self> {
        let name = std::env::var("PARTICIPANT_NAME")
            .map_err(|_| RuntimeError::Config("PARTICIPANT_NAME is not set".into()))?;
        let mut config = Self::new(name);

        if let Ok(port) = std::env::var("PARTICIPANT_PORT") {
            config.port = port
                .parse()
                .map_err(|_| RuntimeError::Config(format!("invalid PARTICIPANT_PORT: {port}")))?;
        }
        if let Ok(ms) = std::env::var("PARTICIPANT_SHUTDOWN_TIMEOUT_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                RuntimeError::Config(format!("invalid PARTICIPANT_SHUTDOWN_TIMEOUT_MS: {ms}"))
            })?;
            config.shutdown_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Bind the listener and start the participant with the default
    /// (logging) publisher. Returns once the listener is online.
    pub async fn bind(self) -> Result<Participant> {
        self.bind_with(Arc::new(LogPublisher)).await
    }

    /// Bind the listener and start the participant with a caller-supplied
    /// publisher for committed `Put` payloads.
    pub async fn bind_with(self, publisher: Arc<dyn Publisher>) -> Result<Participant> {
        Participant::start(self, publisher).await
    }
}
