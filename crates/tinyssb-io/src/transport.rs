//! Broadcast-medium transport: every tinyssb datagram is at most 128 bytes
//! and is sent to (and received from) every peer on the medium, the same
//! frame either a want-request (43/63 bytes) or a packet/blob response
//! (128 bytes) depending on its length.

use std::{
    net::{SocketAddr, UdpSocket},
    sync::Mutex,
    time::Duration,
};

use crate::error::IoError;

/// Maximum size of a single tinyssb datagram.
pub const MAX_DATAGRAM_SIZE: usize = 128;

/// A send/receive medium for tinyssb datagrams. Implementations broadcast:
/// every [`Transport::send`] reaches every other node sharing the medium,
/// including (on some backends) the sender itself.
pub trait Transport: Send + Sync {
    /// Broadcast `datagram` (at most [`MAX_DATAGRAM_SIZE`] bytes) to the medium.
    fn send(&self, datagram: &[u8]) -> Result<(), IoError>;

    /// Wait up to `timeout` for the next datagram, or `None` on timeout.
    /// Implementations must silently drop datagrams that are echoes of
    /// this node's own sends.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, IoError>;
}

/// UDP broadcast transport. Every sent datagram is prefixed with an 8-byte
/// session nonce generated at bind time; datagrams whose nonce matches our
/// own are our own broadcast echoing back (common on loopback/broadcast
/// sockets) and are dropped in [`Transport::recv_timeout`] rather than
/// handed to the caller.
pub struct UdpTransport {
    socket: UdpSocket,
    broadcast_addr: SocketAddr,
    nonce: [u8; 8],
}

impl UdpTransport {
    /// Bind a UDP socket at `bind_addr` that broadcasts to `broadcast_addr`.
    pub fn bind(bind_addr: SocketAddr, broadcast_addr: SocketAddr) -> Result<Self, IoError> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_broadcast(true)?;
        let mut nonce = [0u8; 8];
        getrandom::fill(&mut nonce).map_err(|e| IoError::Io(e.to_string()))?;
        tracing::info!(addr = %bind_addr, "UDP transport bound");
        Ok(Self { socket, broadcast_addr, nonce })
    }
}

impl Transport for UdpTransport {
    fn send(&self, datagram: &[u8]) -> Result<(), IoError> {
        let mut out = Vec::with_capacity(8 + datagram.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(datagram);
        self.socket.send_to(&out, self.broadcast_addr)?;
        Ok(())
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, IoError> {
        self.socket.set_read_timeout(Some(timeout))?;
        let mut buf = [0u8; 8 + MAX_DATAGRAM_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((n, _addr)) if n >= 8 => {
                if buf[..8] == self.nonce {
                    return Ok(None);
                }
                Ok(Some(buf[8..n].to_vec()))
            },
            Ok(_) => Ok(None),
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            },
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory loopback transport for tests: an [`std::sync::mpsc`] channel
/// pair wired so that sends on one end arrive as receives on the other,
/// simulating two nodes sharing a medium without touching the network.
pub struct ChannelTransport {
    tx: std::sync::mpsc::Sender<Vec<u8>>,
    rx: Mutex<std::sync::mpsc::Receiver<Vec<u8>>>,
}

impl ChannelTransport {
    /// Build a connected pair of loopback transports.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = std::sync::mpsc::channel();
        let (tx_b, rx_a) = std::sync::mpsc::channel();
        (Self { tx: tx_a, rx: Mutex::new(rx_a) }, Self { tx: tx_b, rx: Mutex::new(rx_b) })
    }
}

impl Transport for ChannelTransport {
    fn send(&self, datagram: &[u8]) -> Result<(), IoError> {
        self.tx.send(datagram.to_vec()).map_err(|_| IoError::Io("peer channel closed".to_string()))
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<u8>>, IoError> {
        match self.rx.lock().expect("channel transport lock poisoned").recv_timeout(timeout) {
            Ok(datagram) => Ok(Some(datagram)),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Err(IoError::Io("peer channel closed".to_string()))
            },
        }
    }
}
