//! Participants: identity, transport, and process execution.
//!
//! A participant ties a name and a listen address to one listener daemon
//! and one worker pool. It is a cheap handle: clones share the same daemon,
//! inbox, and pool, which is what lets parallel branches run against the
//! same identity.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use crate::config::ParticipantConfig;
use crate::daemon::{Daemon, Envelope};
use crate::error::{Result, RuntimeError};
use crate::pool::WorkerPool;
use crate::publish::Publisher;
use crate::term::{Choice, Prefix, Process};

struct Inner {
    name: String,
    daemon: Daemon,
    inbox: Mutex<mpsc::Receiver<Envelope>>,
    pool: WorkerPool,
    publisher: Arc<dyn Publisher>,
    shutdown_timeout: Duration,
}

/// An addressable actor running one protocol script.
///
/// Construction blocks until the listener is online, so [`port`] is valid
/// the moment it returns. Shutdown is explicit: call [`stop`] before
/// dropping the last handle, or the listener task lingers until the runtime
/// itself winds down.
///
/// [`port`]: Participant::port
/// [`stop`]: Participant::stop
#[derive(Clone)]
pub struct Participant {
    inner: Arc<Inner>,
}

impl Participant {
    /// Bind a participant with default configuration: any free port, the
    /// logging publisher.
    pub async fn bind(name: impl Into<String>) -> Result<Self> {
        ParticipantConfig::new(name).bind().await
    }

    pub(crate) async fn start(
        config: ParticipantConfig,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        let (daemon, inbox) = Daemon::start(config.port).await?;
        info!(name = %config.name, port = daemon.port(), "participant online");
        Ok(Self {
            inner: Arc::new(Inner {
                name: config.name,
                daemon,
                inbox: Mutex::new(inbox),
                pool: WorkerPool::new(),
                publisher,
                shutdown_timeout: config.shutdown_timeout,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The bound listen port. Stable for the participant's whole lifetime.
    pub fn port(&self) -> u16 {
        self.inner.daemon.port()
    }

    /// The full listen address (wildcard host, bound port).
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.daemon.local_addr()
    }

    /// Send one message to a peer and block until the peer's rendezvous
    /// completes.
    ///
    /// The payload is rendered to text, trimmed, and written as a single
    /// newline-terminated line. The call returns only once the peer closes
    /// the connection, which it does after a reader there has consumed the
    /// message. Sending the integer `42` delivers the literal text `"42"`.
    ///
    /// The peer must already be online; connection failures surface
    /// immediately, with no retry.
    pub async fn send(
        &self,
        payload: impl fmt::Display,
        peer: impl ToSocketAddrs + fmt::Debug,
    ) -> Result<()> {
        let text = payload.to_string();
        let text = text.trim();
        let peer_label = format!("{peer:?}");
        let transport = |source| RuntimeError::Transport {
            peer: peer_label.clone(),
            source,
        };

        let mut stream = TcpStream::connect(peer).await.map_err(transport)?;
        trace!(name = %self.inner.name, peer = %peer_label, payload = %text, "sending");
        stream.write_all(text.as_bytes()).await.map_err(transport)?;
        stream.write_all(b"\n").await.map_err(transport)?;
        stream.flush().await.map_err(transport)?;

        // The write was the request; the peer closing the connection is the
        // acknowledgment. Block until end-of-input.
        let mut remainder = Vec::new();
        stream.read_to_end(&mut remainder).await.map_err(transport)?;
        debug!(name = %self.inner.name, peer = %peer_label, "rendezvous complete");
        Ok(())
    }

    /// Consume the next inbound message, blocking until one arrives.
    ///
    /// At most one reader proceeds at a time; messages come out in arrival
    /// order, each exactly once. Consuming the message is what releases the
    /// sender blocked in its `send`.
    pub async fn receive(&self) -> Result<String> {
        let mut inbox = self.inner.inbox.lock().await;
        let Envelope { payload, ack } = inbox.recv().await.ok_or(RuntimeError::ChannelClosed)?;
        // Fires the consumption acknowledgment; the daemon then closes the
        // sender's connection.
        let _ = ack.send(());
        trace!(name = %self.inner.name, payload = %payload, "received");
        Ok(payload)
    }

    /// Evaluate one choice: try the alternatives in declaration order and
    /// commit to the first whose guard is satisfied.
    ///
    /// Returns the selected index and the continuation to run next. An
    /// `Ask` guard blocks on the inbound channel for its turn's message; a
    /// message matching none of the expected identifiers is discarded and
    /// the guard fails. A pass where every guard fails starts over, so a
    /// choice with no satisfiable alternative never returns.
    pub async fn evaluate(&self, choice: &Choice) -> Result<(usize, Process)> {
        loop {
            for (index, element) in choice.elements().iter().enumerate() {
                match element.prefix() {
                    Prefix::Ask(expected) => {
                        let payload = self.receive().await?;
                        if expected.iter().any(|id| *id == payload) {
                            debug!(name = %self.inner.name, index, payload = %payload, "ask committed");
                            return Ok((index, element.continuation().clone()));
                        }
                        trace!(name = %self.inner.name, payload = %payload, "discarding unmatched message");
                    }
                    Prefix::Check(condition) => {
                        if (**condition)() {
                            debug!(name = %self.inner.name, index, "check committed");
                            return Ok((index, element.continuation().clone()));
                        }
                    }
                    Prefix::Put(payload) => {
                        self.inner.publisher.publish(payload).await?;
                        debug!(name = %self.inner.name, index, payload = %payload, "put committed");
                        return Ok((index, element.continuation().clone()));
                    }
                }
            }
            // Every guard failed this pass; go around again without
            // monopolizing the worker.
            tokio::task::yield_now().await;
        }
    }

    /// Execute a process term to completion: evaluate each choice and step
    /// into its continuation until the term terminates.
    pub async fn run(&self, process: Process) -> Result<()> {
        let mut current = process;
        loop {
            match current {
                Process::Done => return Ok(()),
                Process::Choice(choice) => {
                    let (_, continuation) = self.evaluate(&choice).await?;
                    current = continuation;
                }
            }
        }
    }

    /// Schedule each process on the worker pool and return without waiting.
    ///
    /// There is no join primitive: branches run to completion on their own,
    /// and a failing branch logs its error and dies alone. Fails only if
    /// shutdown has already begun.
    pub async fn parallel(&self, processes: impl IntoIterator<Item = Process>) -> Result<()> {
        for process in processes {
            let participant = self.clone();
            self.inner
                .pool
                .submit(async move {
                    if let Err(e) = participant.run(process).await {
                        warn!(name = %participant.inner.name, error = %e, "parallel branch failed");
                    }
                })
                .await?;
        }
        Ok(())
    }

    /// Shut down: stop the listener, refuse new work, and drain the worker
    /// pool up to the configured deadline. Workers still running past the
    /// deadline are aborted; exceeding it is tolerated, not an error.
    pub async fn stop(&self) {
        info!(name = %self.inner.name, "stopping participant");
        let timeout = self.inner.shutdown_timeout;
        self.inner.daemon.stop(timeout).await;
        self.inner.pool.shutdown(timeout).await;
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.inner.name)
            .field("port", &self.port())
            .finish()
    }
}
