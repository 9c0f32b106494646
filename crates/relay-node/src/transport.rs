//! Tokio-backed TCP session.
//!
//! The connection manager is synchronous, so each session runs as a task on
//! a tokio runtime and talks to the manager over unbounded channels:
//! socket events flow in, outbound bytes flow out. The manager drains events
//! with [`SessionTransport::poll_event`] without ever blocking.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use relay_core::{LinkError, SessionEvent, SessionTransport};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 512;

struct Session {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    task: JoinHandle<()>,
}

/// [`SessionTransport`] that spawns each session on a tokio runtime.
pub struct TokioTransport {
    handle: Handle,
    connect_timeout: Duration,
    session: Option<Session>,
}

impl TokioTransport {
    /// Sessions are spawned on `handle`; the caller may live on any thread.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            session: None,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl SessionTransport for TokioTransport {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), LinkError> {
        self.close();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = self
            .handle
            .spawn(run_session(addr, self.connect_timeout, event_tx, out_rx));

        self.session = Some(Session {
            events: event_rx,
            outbound: out_tx,
            task,
        });
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let session = self.session.as_ref().ok_or(LinkError::NotConnected)?;
        session
            .outbound
            .send(bytes.to_vec())
            .map_err(|_| LinkError::Send("session task has stopped".to_string()))
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.session.as_mut()?.events.try_recv().ok()
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.task.abort();
        }
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Own one TCP connection until either side closes it.
async fn run_session(
    addr: SocketAddr,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!("Connection to {} failed: {}", addr, e);
            let _ = events.send(SessionEvent::Disconnected);
            return;
        }
        Err(_) => {
            warn!("Connection to {} timed out", addr);
            let _ = events.send(SessionEvent::Disconnected);
            return;
        }
    };

    let _ = stream.set_nodelay(true);
    info!("Connected to {}", addr);
    if events.send(SessionEvent::Connected).is_err() {
        return;
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    info!("Peer {} closed the session", addr);
                    break;
                }
                Ok(n) => {
                    if events.send(SessionEvent::Data(buf[..n].to_vec())).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Read from {} failed: {}", addr, e);
                    break;
                }
            },
            out = outbound.recv() => match out {
                Some(bytes) => {
                    if let Err(e) = writer.write_all(&bytes).await {
                        warn!("Write to {} failed: {}", addr, e);
                        break;
                    }
                }
                None => {
                    debug!("Session to {} closed locally", addr);
                    return;
                }
            },
        }
    }

    let _ = events.send(SessionEvent::Disconnected);
}
