//! TCP transport layer for ISO-on-TCP communication.
//!
//! This module provides the [`TcpTransport`] struct which moves TPKT packets
//! between the poller and a PLC. It knows how to find packet boundaries in
//! the TCP stream and nothing about COTP or S7.
//!
//! # Design
//!
//! - **Packet framed** - Every receive returns exactly one TPKT packet
//! - **Synchronous** - Blocking send/receive with configurable timeout
//! - **Single connection** - One stream per PLC, no pooling
//!
//! # Example
//!
//! ```no_run
//! use s7comm_poller::TcpTransport;
//! use std::time::Duration;
//!
//! let mut transport = TcpTransport::connect(
//!     "192.168.10.57:102".parse().unwrap(),
//!     Duration::from_secs(5),
//!     Duration::from_secs(10),
//! ).unwrap();
//!
//! let request = vec![0x03, 0x00, 0x00, 0x16, /* ... rest of the packet */];
//! let response = transport.send_receive(&request);
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{Result, S7Error};
use crate::frame::{tpkt_length, TPKT_HEADER_SIZE, TPKT_VERSION};

/// Largest packet accepted from the PLC.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Exchanges one request packet for one response packet.
///
/// [`TcpTransport`] implements this over a socket; tests substitute scripted
/// exchanges.
pub trait Exchange {
    /// Sends `packet` and returns the next packet received.
    fn exchange(&mut self, packet: &[u8]) -> Result<Vec<u8>>;
}

/// TCP transport for ISO-on-TCP.
pub struct TcpTransport {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl TcpTransport {
    /// Opens a TCP connection to the PLC.
    ///
    /// # Arguments
    ///
    /// * `plc_addr` - Socket address of the PLC (IP:port)
    /// * `connect_timeout` - Bound on establishing the connection
    /// * `request_timeout` - Read/write timeout of each exchange
    ///
    /// # Errors
    ///
    /// Returns `S7Error::Timeout` if the connection is not established in
    /// time, or an I/O error if it is refused.
    pub fn connect(
        plc_addr: SocketAddr,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&plc_addr, connect_timeout).map_err(map_io)?;
        stream.set_read_timeout(Some(request_timeout))?;
        stream.set_write_timeout(Some(request_timeout))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            remote_addr: plc_addr,
        })
    }

    /// Sends a packet and receives the response packet.
    ///
    /// Blocks until a complete TPKT packet has been read or the request
    /// timeout expires.
    ///
    /// # Errors
    ///
    /// - `S7Error::Timeout` if the PLC does not answer in time
    /// - `S7Error::InvalidResponse` if the stream does not carry TPKT
    /// - `S7Error::Io` for other socket failures
    pub fn send_receive(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.stream.write_all(data).map_err(map_io)?;
        read_packet(&mut self.stream)
    }

    /// Returns the remote PLC address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Shuts down both directions of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(S7Error::Io(e)),
            _ => Ok(()),
        }
    }
}

impl Exchange for TcpTransport {
    fn exchange(&mut self, packet: &[u8]) -> Result<Vec<u8>> {
        self.send_receive(packet)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}

/// Reads one TPKT packet from `reader`.
pub(crate) fn read_packet(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut header = [0u8; TPKT_HEADER_SIZE];
    reader.read_exact(&mut header).map_err(map_io)?;
    if header[0] != TPKT_VERSION {
        return Err(S7Error::invalid_response(format!(
            "unsupported TPKT version 0x{:02X}",
            header[0]
        )));
    }
    let length = tpkt_length(&header);
    if !(TPKT_HEADER_SIZE..=MAX_PACKET_SIZE).contains(&length) {
        return Err(S7Error::invalid_response(format!(
            "TPKT length {} out of range",
            length
        )));
    }

    let mut packet = vec![0u8; length];
    packet[..TPKT_HEADER_SIZE].copy_from_slice(&header);
    reader
        .read_exact(&mut packet[TPKT_HEADER_SIZE..])
        .map_err(map_io)?;
    Ok(packet)
}

fn map_io(e: std::io::Error) -> S7Error {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => S7Error::Timeout,
        _ => S7Error::Io(e),
    }
}
