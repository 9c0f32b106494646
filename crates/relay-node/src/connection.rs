//! Connection lifecycle state machine.
//!
//! One [`ConnectionManager::tick`] runs two layers in sequence:
//! - WiFi: `Disconnected → Scanning → Associating → Associated`
//! - Session (only while associated): `Disconnected → Connecting → Connected`
//!
//! Every failure on either layer sends it back to `Disconnected` after a
//! fixed delay; there is no terminal failure state. The only fatal condition
//! is running out of memory, which parks the node in an idle loop.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use relay_core::{
    Delay, DeviceContext, Framer, FramingError, LinkError, NetworkSelector, NodeSettings,
    SessionEvent, SessionTransport, SsidRule, WifiDriver,
};
use relay_protocol::{encode, make_notify, Dispatcher, Message, GREETING};

/// Pause between idle iterations once the node has halted.
const HALT_IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// WiFi layer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Scanning,
    Associating,
    Associated,
}

/// TCP session layer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Combined state of both layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub wifi: WifiState,
    pub session: SessionState,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            wifi: WifiState::Disconnected,
            session: SessionState::Disconnected,
        }
    }
}

/// Conditions the node cannot recover from.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("out of memory: {0}")]
    ResourceExhaustion(String),
}

/// Drives the WiFi link and the control session.
pub struct ConnectionManager<W, T, D>
where
    W: WifiDriver,
    T: SessionTransport,
    D: Delay,
{
    settings: NodeSettings,
    ctx: DeviceContext,
    wifi: W,
    transport: T,
    delay: D,
    selector: NetworkSelector,
    framer: Framer,
    state: ConnectionState,
    associate_polls: u32,
    sessions: u64,
}

impl<W, T, D> ConnectionManager<W, T, D>
where
    W: WifiDriver,
    T: SessionTransport,
    D: Delay,
{
    pub fn new(settings: NodeSettings, ctx: DeviceContext, wifi: W, transport: T, delay: D) -> Self {
        let selector = NetworkSelector::new(&settings.provisioning_ssid);
        let framer = Framer::with_max_buffer_size(settings.max_packet_size);
        Self {
            settings,
            ctx,
            wifi,
            transport,
            delay,
            selector,
            framer,
            state: ConnectionState::default(),
            associate_polls: 0,
            sessions: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    /// Number of sessions established so far.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Tick forever. Only returns control by halting.
    pub fn run(&mut self) -> ! {
        info!("Connection manager started");
        loop {
            if let Err(fatal) = self.tick() {
                self.halt(fatal);
            }
        }
    }

    /// Run one scheduling step: WiFi layer, then session layer, then yield.
    pub fn tick(&mut self) -> Result<(), FatalError> {
        self.wifi_step();
        if self.state.wifi == WifiState::Associated {
            self.session_step()?;
        }
        self.delay.delay(self.settings.tick_interval());
        Ok(())
    }

    fn halt(&mut self, fatal: FatalError) -> ! {
        error!("FATAL: {}", fatal);
        self.ctx.show("out of memory");
        loop {
            self.delay.delay(HALT_IDLE_INTERVAL);
        }
    }

    fn wifi_step(&mut self) {
        match self.state.wifi {
            WifiState::Disconnected => {
                if let Err(e) = self.wifi.enter_station_mode() {
                    warn!("Failed to enter station mode: {}", e);
                    self.delay.delay(self.settings.scan_retry_delay());
                    return;
                }
                self.ctx.show("wifi scan");
                self.state.wifi = WifiState::Scanning;
                self.scan_step();
            }
            WifiState::Scanning => self.scan_step(),
            WifiState::Associating => self.poll_association(),
            WifiState::Associated => {
                if !self.wifi.is_connected() {
                    warn!("WiFi link lost");
                    self.ctx.show("wifi lost");
                    self.state.wifi = WifiState::Disconnected;
                    self.close_session();
                }
            }
        }
    }

    fn scan_step(&mut self) {
        let Some((ssid, password)) = self.pick_network() else {
            self.delay.delay(self.settings.scan_retry_delay());
            return;
        };

        info!("Trying to connect to {}", ssid);
        self.ctx.show(&format!("join {}", ssid));

        match self.wifi.begin(&ssid, &password) {
            Ok(()) => {
                self.state.wifi = WifiState::Associating;
                self.associate_polls = 0;
            }
            Err(e) => {
                warn!("Failed to start association with {}: {}", ssid, e);
                self.delay.delay(self.settings.scan_retry_delay());
            }
        }
    }

    /// SSID and password to join, if anything suitable is in range.
    fn pick_network(&mut self) -> Option<(String, String)> {
        if let Some(target) = &self.settings.fixed_target {
            return Some((target.ssid.clone(), target.password.clone()));
        }

        let candidates = match self.wifi.scan() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("WiFi scan failed: {}", e);
                return None;
            }
        };

        let rule = SsidRule::Suffix(self.ctx.config().network_pattern.clone());
        let Some(picked) = self.selector.select(&candidates, &rule) else {
            debug!(
                "Scan empty: {} networks visible, none ending with '{}'",
                candidates.len(),
                self.ctx.config().network_pattern
            );
            self.ctx.show("scan empty");
            return None;
        };

        let password = if self.selector.is_provisioning(&picked.ssid) {
            self.settings.provisioning_password.clone()
        } else {
            self.ctx.config().password.clone()
        };
        Some((picked.ssid.clone(), password))
    }

    fn poll_association(&mut self) {
        if self.wifi.is_connected() {
            self.state.wifi = WifiState::Associated;
            match self.wifi.gateway() {
                Some(gateway) => {
                    info!("WiFi connected, gateway IP: {}", gateway);
                    self.ctx.show(&format!("gw {}", gateway));
                }
                None => info!("WiFi connected, no gateway yet"),
            }
            return;
        }

        self.associate_polls += 1;
        if let Some(max) = self.settings.max_associate_polls {
            if self.associate_polls >= max {
                warn!("Association not up after {} polls, rescanning", self.associate_polls);
                self.state.wifi = WifiState::Disconnected;
                return;
            }
        }

        debug!("WiFi connecting...");
        self.delay.delay(self.settings.associate_poll_interval());
    }

    fn session_step(&mut self) -> Result<(), FatalError> {
        while let Some(event) = self.transport.poll_event() {
            self.handle_event(event)?;
        }

        if self.state.session == SessionState::Disconnected {
            self.start_connect();
        }
        Ok(())
    }

    fn handle_event(&mut self, event: SessionEvent) -> Result<(), FatalError> {
        match event {
            SessionEvent::Connected => match self.state.session {
                SessionState::Connecting => self.on_connected()?,
                SessionState::Connected => debug!("Ignoring repeated connect notification"),
                SessionState::Disconnected => debug!("Ignoring connect notification for a closed session"),
            },
            SessionEvent::Data(bytes) => {
                if self.state.session == SessionState::Connected {
                    self.receive(&bytes)?;
                } else {
                    debug!("Discarding {} bytes received outside a session", bytes.len());
                }
            }
            SessionEvent::Disconnected => {
                info!("Client disconnect");
                self.ctx.show("disconnected");
                self.close_session();
            }
        }
        Ok(())
    }

    fn on_connected(&mut self) -> Result<(), FatalError> {
        self.state.session = SessionState::Connected;
        self.sessions += 1;
        self.framer.reset();
        info!("Session {} established", self.sessions);
        self.ctx.show("connected");

        if let Err(e) = send_message(&mut self.transport, &make_notify(GREETING)) {
            self.on_send_error("greeting", e)?;
        }
        Ok(())
    }

    /// A failed send ends the session, unless the transport ran out of memory.
    fn on_send_error(&mut self, what: &str, e: LinkError) -> Result<(), FatalError> {
        if let LinkError::ResourceExhausted(reason) = e {
            return Err(FatalError::ResourceExhaustion(reason));
        }
        warn!("Failed to send {}: {}", what, e);
        self.close_session();
        Ok(())
    }

    fn receive(&mut self, bytes: &[u8]) -> Result<(), FatalError> {
        debug!("Received {} bytes", bytes.len());

        let Self {
            framer,
            ctx,
            transport,
            ..
        } = self;
        let mut send_error = None;

        let fed = framer.feed(bytes, |payload| {
            if send_error.is_some() {
                return;
            }
            if let Some(reply) = Dispatcher::handle_packet(ctx, payload) {
                if let Err(e) = send_message(transport, &reply) {
                    send_error = Some(e);
                }
            }
        });

        match fed {
            Ok(report) => {
                if report.rejected > 0 || report.dropped_bytes > 0 {
                    warn!(
                        "Framing: {} corrupt packets, {} bytes skipped",
                        report.rejected, report.dropped_bytes
                    );
                }
            }
            Err(e @ FramingError::Overflow { .. }) => {
                warn!("Framing overflow, buffer discarded: {}", e);
            }
            Err(e @ FramingError::ResourceExhausted(_)) => {
                return Err(FatalError::ResourceExhaustion(e.to_string()));
            }
        }

        if let Some(e) = send_error {
            self.on_send_error("reply", e)?;
        }
        Ok(())
    }

    fn start_connect(&mut self) {
        match self.server_addr() {
            Some(addr) => {
                info!("Connecting to {}", addr);
                match self.transport.connect(addr) {
                    Ok(()) => self.state.session = SessionState::Connecting,
                    Err(e) => warn!("{}", e),
                }
            }
            None => warn!("No gateway address, cannot connect yet"),
        }
        self.delay.delay(self.settings.session_retry_delay());
    }

    fn server_addr(&mut self) -> Option<SocketAddr> {
        if let Some(addr) = self.settings.server_override {
            return Some(addr);
        }
        self.wifi
            .gateway()
            .map(|gateway| SocketAddr::from((gateway, self.settings.tcp_port)))
    }

    fn close_session(&mut self) {
        self.transport.close();
        self.framer.reset();
        self.state.session = SessionState::Disconnected;
    }
}

fn send_message<T: SessionTransport>(transport: &mut T, msg: &Message) -> Result<(), LinkError> {
    let payload = encode(msg).map_err(|e| LinkError::Send(e.to_string()))?;
    transport.send(&Framer::pack(&payload))
}
