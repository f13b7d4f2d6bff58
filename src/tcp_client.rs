//! TCP client module
//!
//! One embassy-net TCP socket carrying the tally subscription and the state
//! byte feed.

use crate::TallyError;
use crate::acquisition::ServerEndpoint;
use crate::session::TallyTransport;
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::{IpAddress, IpEndpoint, Stack};
use embassy_time::Duration;

/// Transport over a single reusable TCP socket
pub struct TcpTransport<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> TcpTransport<'a> {
    /// `connect_timeout_ms` bounds both the handshake and any stalled I/O
    pub fn new(
        stack: Stack<'a>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        connect_timeout_ms: u32,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_millis(connect_timeout_ms.into())));
        Self { socket }
    }
}

impl TallyTransport for TcpTransport<'_> {
    async fn connect(&mut self, endpoint: ServerEndpoint) -> Result<(), TallyError> {
        if self.socket.state() != State::Closed {
            self.socket.abort();
            // Lets the reset go out so the socket is closed before reuse
            let _ = self.socket.flush().await;
        }

        let remote = IpEndpoint::new(IpAddress::Ipv4(endpoint.address), endpoint.port);
        self.socket
            .connect(remote)
            .await
            .map_err(|_| TallyError::Connect)
    }

    fn is_connected(&mut self) -> bool {
        match self.socket.state() {
            State::Established => true,
            // Peer closed, but what it sent before closing is still readable
            State::CloseWait => self.socket.recv_queue() > 0,
            _ => false,
        }
    }

    fn bytes_available(&mut self) -> usize {
        self.socket.recv_queue()
    }

    async fn read_byte(&mut self) -> Result<u8, TallyError> {
        let mut byte = [0u8; 1];
        match self.socket.read(&mut byte).await {
            Ok(1) => Ok(byte[0]),
            _ => Err(TallyError::Transport),
        }
    }

    async fn write_byte(&mut self, byte: u8) -> Result<(), TallyError> {
        match self.socket.write(&[byte]).await {
            Ok(1) => {}
            _ => return Err(TallyError::Transport),
        }
        self.socket.flush().await.map_err(|_| TallyError::Transport)
    }

    fn close(&mut self) {
        self.socket.abort();
    }
}
