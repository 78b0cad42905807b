//! UDP telemetry link for live plotting.
//!
//! Streams samples to a plot server over UDP. The wire protocol is
//! line-oriented text:
//!
//! - handshake: client sends `CONNECT:<ip>:<port>`, server answers
//!   `CONNECTED:<ip>:<port>`
//! - sample: `>name:timestamp_ms:value\n`
//! - teardown: either side sends `DISCONNECT`
//!
//! The link is strictly best-effort: callers log failures and keep
//! polling, a dead plot server must never fault the panel.

use panel_common::config::TelemetryConfig;
use panel_common::error::{PanelError, PanelResult};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Control messages received from the plot server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Handshake acknowledgement carrying the server's view of our address.
    Connected(String),
    /// Server asked us to stop sending.
    Disconnect,
}

/// Connected UDP plot stream.
#[derive(Debug)]
pub struct PlotLink {
    socket: UdpSocket,
    server_addr: SocketAddr,
    var_name: String,
    connected: bool,
    samples_sent: u64,
}

impl PlotLink {
    /// Bind a local socket and perform the connect handshake.
    ///
    /// Blocks for at most `connect_timeout` waiting for the server's
    /// acknowledgement, then switches the socket to non-blocking for use
    /// inside the poll loop.
    pub fn connect(config: &TelemetryConfig) -> PanelResult<Self> {
        let server_addr: SocketAddr = config
            .server_addr
            .parse()
            .map_err(|e| PanelError::Telemetry(format!("bad server address: {e}")))?;

        let socket = UdpSocket::bind(("0.0.0.0", config.bind_port))
            .map_err(|e| PanelError::Telemetry(format!("bind failed: {e}")))?;

        let local = socket
            .local_addr()
            .map_err(|e| PanelError::Telemetry(format!("local_addr failed: {e}")))?;

        let handshake = format!("CONNECT:{}:{}", local.ip(), local.port());
        socket
            .send_to(handshake.as_bytes(), server_addr)
            .map_err(|e| PanelError::Telemetry(format!("handshake send failed: {e}")))?;

        socket
            .set_read_timeout(Some(config.connect_timeout))
            .map_err(|e| PanelError::Telemetry(format!("set_read_timeout failed: {e}")))?;

        let mut buf = [0u8; 256];
        let (len, _) = socket.recv_from(&mut buf).map_err(|e| {
            PanelError::Telemetry(format!("no handshake reply from {server_addr}: {e}"))
        })?;
        let reply = String::from_utf8_lossy(&buf[..len]);

        match parse_control(reply.trim()) {
            Some(ControlMessage::Connected(addr)) => {
                info!(server = %server_addr, local = %addr, "Telemetry link established");
            }
            other => {
                return Err(PanelError::Telemetry(format!(
                    "unexpected handshake reply: {reply:?} ({other:?})"
                )));
            }
        }

        socket
            .set_nonblocking(true)
            .map_err(|e| PanelError::Telemetry(format!("set_nonblocking failed: {e}")))?;

        Ok(Self {
            socket,
            server_addr,
            var_name: config.var_name.clone(),
            connected: true,
            samples_sent: 0,
        })
    }

    /// Whether the link is still accepting samples.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Number of samples successfully handed to the socket.
    #[must_use]
    pub fn samples_sent(&self) -> u64 {
        self.samples_sent
    }

    /// Send one sample stamped with the runtime clock reading.
    pub fn send_sample(&mut self, timestamp: Duration, value: f64) -> PanelResult<()> {
        if !self.connected {
            return Err(PanelError::Telemetry("link is disconnected".into()));
        }

        let line = format_sample(&self.var_name, timestamp.as_millis() as u64, value);
        self.socket
            .send_to(line.as_bytes(), self.server_addr)
            .map_err(|e| PanelError::Telemetry(format!("sample send failed: {e}")))?;
        self.samples_sent += 1;
        Ok(())
    }

    /// Drain pending control messages from the server.
    ///
    /// Returns the last message seen, if any. A `DISCONNECT` marks the
    /// link as closed.
    pub fn poll_control(&mut self) -> PanelResult<Option<ControlMessage>> {
        let mut buf = [0u8; 256];
        let mut last = None;

        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _)) => {
                    let text = String::from_utf8_lossy(&buf[..len]);
                    if let Some(msg) = parse_control(text.trim()) {
                        if msg == ControlMessage::Disconnect {
                            info!("Plot server requested disconnect");
                            self.connected = false;
                        }
                        last = Some(msg);
                    } else {
                        debug!(text = %text.trim(), "Ignoring unknown control message");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(PanelError::Telemetry(format!("control recv failed: {e}")));
                }
            }
        }

        Ok(last)
    }

    /// Tell the server we are going away. Best-effort.
    pub fn disconnect(&mut self) {
        if self.connected {
            if let Err(e) = self.socket.send_to(b"DISCONNECT", self.server_addr) {
                warn!(error = %e, "Failed to send DISCONNECT");
            }
            self.connected = false;
        }
    }
}

impl Drop for PlotLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Format one sample line: `>name:timestamp_ms:value\n`.
fn format_sample(var_name: &str, timestamp_ms: u64, value: f64) -> String {
    format!(">{var_name}:{timestamp_ms}:{value}\n")
}

/// Parse a control message from the server.
///
/// A teardown arrives either bare (`DISCONNECT`) or suffixed with the
/// server's own address (`DISCONNECT:<ip>:<port>`); both mean the same.
fn parse_control(text: &str) -> Option<ControlMessage> {
    if text == "DISCONNECT" || text.starts_with("DISCONNECT:") {
        return Some(ControlMessage::Disconnect);
    }
    text.strip_prefix("CONNECTED:")
        .map(|rest| ControlMessage::Connected(rest.to_string()))
}
