//! Listener daemon: the inbound half of the rendezvous handshake.
//!
//! One daemon per participant. It binds a single port, accepts inbound
//! connections strictly one at a time, reads one line of payload per
//! connection, and hands the line to the owning participant through a
//! depth-one channel. The peer's connection stays open until a reader has
//! consumed the message; closing it is the acknowledgment the sender
//! blocks on.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Result, RuntimeError};

/// One buffered inbound message. The connection it arrived on is held open
/// until `ack` fires.
pub(crate) struct Envelope {
    pub(crate) payload: String,
    pub(crate) ack: oneshot::Sender<()>,
}

/// Handle to a running listener daemon.
pub(crate) struct Daemon {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Daemon {
    /// Bind `port` (0 = platform-assigned) and start accepting.
    ///
    /// Resolves only once the daemon is online: the returned handle carries
    /// the bound address, and the receiver yields inbound messages in
    /// arrival order.
    pub(crate) async fn start(port: u16) -> Result<(Self, mpsc::Receiver<Envelope>)> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (inbox_tx, inbox_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(serve(port, ready_tx, inbox_tx, shutdown_rx));

        let local_addr = ready_rx
            .await
            .map_err(|_| RuntimeError::Bind {
                port,
                source: io::Error::other("listener exited before signaling readiness"),
            })?
            .map_err(|source| RuntimeError::Bind { port, source })?;

        debug!(addr = %local_addr, "listener online");
        Ok((
            Self {
                local_addr,
                shutdown: shutdown_tx,
                task: Mutex::new(Some(task)),
            },
            inbox_rx,
        ))
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Signal the accept loop to drain and wait up to `timeout` for it to
    /// exit; abort it past the deadline. The bound port is released either
    /// way.
    pub(crate) async fn stop(&self, timeout: Duration) {
        self.shutdown.send_replace(true);
        let handle = self.task.lock().unwrap().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(timeout, &mut handle).await.is_err() {
                warn!(addr = %self.local_addr, "listener ignored drain signal, aborting");
                handle.abort();
            }
        }
    }
}

async fn serve(
    port: u16,
    ready: oneshot::Sender<io::Result<SocketAddr>>,
    inbox: mpsc::Sender<Envelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(local_addr)).is_err() {
        // Constructor gave up; nobody owns this listener.
        return;
    }

    loop {
        let mut shutdown_inner = shutdown.clone();
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(%peer, "accepted connection");
                    tokio::select! {
                        outcome = handshake(stream, peer, &inbox) => {
                            if let Err(e) = outcome {
                                warn!(%peer, error = %e, "handshake failed");
                            }
                        }
                        _ = async { let _ = shutdown_inner.wait_for(|stop| *stop).await; } => {
                            debug!(%peer, "interrupting in-flight handshake");
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
        }
    }
    debug!(addr = %local_addr, "listener stopped");
    // Dropping the listener releases the port.
}

/// Read one line from `stream`, buffer it for the participant, and hold the
/// connection open until the message is consumed. Dropping the stream on
/// return closes the connection, which is the sender's acknowledgment.
async fn handshake(stream: TcpStream, peer: SocketAddr, inbox: &mpsc::Sender<Envelope>) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        debug!(%peer, "connection closed before any payload");
        return Ok(());
    }
    // Strip the line terminator; everything else is payload.
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    trace!(%peer, payload = %line, "buffered inbound message");

    let (ack_tx, ack_rx) = oneshot::channel();
    if inbox
        .send(Envelope {
            payload: line,
            ack: ack_tx,
        })
        .await
        .is_err()
    {
        debug!(%peer, "participant gone, dropping message");
        return Ok(());
    }
    let _ = ack_rx.await;
    trace!(%peer, "message consumed, closing connection");
    Ok(())
}
