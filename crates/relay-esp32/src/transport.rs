//! TCP session over `std::net` for ESP-IDF.
//!
//! ESP-IDF provides a BSD socket layer, so a non-blocking `TcpStream` is
//! enough; no async runtime is needed on the device. The connect itself can
//! only block, so it runs on a short-lived thread and its outcome is picked
//! up by [`SessionTransport::poll_event`].

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use relay_core::{LinkError, SessionEvent, SessionTransport};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_STACK_SIZE: usize = 4096;
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
const READ_CHUNK: usize = 256;

type PendingConnect = (SocketAddr, Receiver<io::Result<TcpStream>>);

#[derive(Default)]
pub struct SocketTransport {
    stream: Option<TcpStream>,
    connecting: Option<PendingConnect>,
    pending: VecDeque<SessionEvent>,
}

impl SocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn drop_stream(&mut self) {
        if self.stream.take().is_some() {
            self.pending.push_back(SessionEvent::Disconnected);
        }
    }

    /// Outcome of the connect thread, once it has one.
    fn poll_connect(&mut self) -> Option<SessionEvent> {
        let (addr, outcome) = match &self.connecting {
            Some((addr, rx)) => (*addr, rx.try_recv()),
            None => return None,
        };

        let stream = match outcome {
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.connecting = None;
                warn!("Connect thread for {} exited without a result", addr);
                return Some(SessionEvent::Disconnected);
            }
            Ok(Err(e)) => {
                self.connecting = None;
                warn!("Connection to {} failed: {}", addr, e);
                return Some(SessionEvent::Disconnected);
            }
            Ok(Ok(stream)) => stream,
        };
        self.connecting = None;

        if let Err(e) = stream.set_nonblocking(true) {
            warn!("Cannot make socket to {} non-blocking: {}", addr, e);
            return Some(SessionEvent::Disconnected);
        }
        let _ = stream.set_nodelay(true);
        info!("Connected to {}", addr);
        self.stream = Some(stream);
        Some(SessionEvent::Connected)
    }
}

impl SessionTransport for SocketTransport {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), LinkError> {
        self.close();

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("relay-connect".to_string())
            .stack_size(CONNECT_STACK_SIZE)
            .spawn(move || {
                let _ = tx.send(TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT));
            })
            .map_err(|e| LinkError::Connect {
                addr,
                reason: e.to_string(),
            })?;

        self.connecting = Some((addr, rx));
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        let deadline = Instant::now() + WRITE_TIMEOUT;
        let mut written = 0;

        while written < bytes.len() {
            match stream.write(&bytes[written..]) {
                Ok(0) => return Err(LinkError::Send("socket closed".to_string())),
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(LinkError::Send("write timed out".to_string()));
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::OutOfMemory => {
                    return Err(LinkError::ResourceExhausted(e.to_string()))
                }
                Err(e) => return Err(LinkError::Send(e.to_string())),
            }
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        if self.connecting.is_some() {
            return self.poll_connect();
        }

        let stream = self.stream.as_mut()?;
        let mut buf = [0u8; READ_CHUNK];
        match stream.read(&mut buf) {
            Ok(0) => {
                info!("Peer closed the session");
                self.drop_stream();
                self.pending.pop_front()
            }
            Ok(n) => Some(SessionEvent::Data(buf[..n].to_vec())),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                None
            }
            Err(e) => {
                warn!("Socket read failed: {}", e);
                self.drop_stream();
                self.pending.pop_front()
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Session closed locally");
        }
        // The connect thread finishes on its own; its socket is dropped there.
        self.connecting = None;
        self.pending.clear();
    }
}
