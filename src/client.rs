//! S7 client for reading variables from Siemens PLCs.
//!
//! This module provides the [`Client`] struct, the session the poller reads
//! through.
//!
//! # Overview
//!
//! Opening a client runs the full session setup:
//! - TCP connect to the ISO-on-TCP port
//! - COTP connection request selecting the CPU by rack and slot
//! - S7 Setup Communication negotiating the PDU size
//!
//! After that, [`Client::read_multi`] reads up to 18 variables per request and
//! correlates each response with its request through the PDU reference.
//!
//! # Example
//!
//! ```no_run
//! use s7comm_poller::{resolve, Client, ClientConfig};
//!
//! let config = ClientConfig::new("192.168.10.57:102".parse().unwrap(), 0, 1);
//! let mut client = Client::connect(&config)?;
//!
//! let points = [resolve("DB1.DBW0", "int")?, resolve("M0.1", "bool")?];
//! let readout = client.read_multi(&points)?;
//! assert_eq!(readout.data.len(), 8);
//!
//! client.close()?;
//! # Ok::<(), s7comm_poller::S7Error>(())
//! ```
//!
//! # Thread Safety
//!
//! The PDU reference counter is atomic, but reads need `&mut self` because a
//! session carries one request at a time.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::address::ResolvedPoint;
use crate::command::{ConnectionRequest, ReadItem, ReadVarRequest, SetupCommunication};
use crate::error::{Result, S7Error};
use crate::frame::unwrap_data;
use crate::poller::{BatchReadout, ReadBatch};
use crate::response::{ConnectionConfirm, ReadVarResponse, SetupCommunicationAck};
use crate::transport::{Exchange, TcpTransport};

/// Default ISO-on-TCP port.
pub const DEFAULT_S7_PORT: u16 = 102;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout of a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for opening an S7 session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// PLC socket address.
    pub plc_addr: SocketAddr,
    /// Rack of the CPU.
    pub rack: u8,
    /// Slot of the CPU.
    pub slot: u8,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout of each request.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a new configuration with default timeouts.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::ClientConfig;
    ///
    /// let config = ClientConfig::new("10.0.0.5:102".parse().unwrap(), 0, 2);
    /// assert_eq!(config.slot, 2);
    /// ```
    pub fn new(plc_addr: SocketAddr, rack: u8, slot: u8) -> Self {
        Self {
            plc_addr,
            rack,
            slot,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-request timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new("10.0.0.5:102".parse().unwrap(), 0, 1)
    ///     .with_request_timeout(Duration::from_secs(2));
    /// assert_eq!(config.request_timeout, Duration::from_secs(2));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// S7 session with one PLC.
#[derive(Debug)]
pub struct Client<T = TcpTransport> {
    transport: T,
    pdu_ref: AtomicU16,
    pdu_size: u16,
}

impl Client<TcpTransport> {
    /// Connects to the PLC and sets up the S7 session.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection fails, the PLC refuses the
    /// rack/slot, or communication setup is rejected.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        debug!(plc = %config.plc_addr, rack = config.rack, slot = config.slot, "connecting");
        let transport = TcpTransport::connect(
            config.plc_addr,
            config.connect_timeout,
            config.request_timeout,
        )?;
        let client = Self::handshake(transport, config.rack, config.slot)?;
        info!(plc = %config.plc_addr, pdu_size = client.pdu_size, "connected");
        Ok(client)
    }

    /// Closes the session.
    pub fn close(self) -> Result<()> {
        debug!(plc = %self.transport.remote_addr(), "closing session");
        self.transport.shutdown()
    }
}

impl<T: Exchange> Client<T> {
    /// Runs connection request and setup communication over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if either step is refused or answered with a
    /// malformed packet.
    pub fn handshake(mut transport: T, rack: u8, slot: u8) -> Result<Self> {
        let confirm = transport.exchange(&ConnectionRequest::new(rack, slot).to_bytes())?;
        ConnectionConfirm::from_bytes(&confirm)?;

        let client = Self {
            transport,
            pdu_ref: AtomicU16::new(1),
            pdu_size: 0,
        };
        client.setup_communication()
    }

    fn setup_communication(mut self) -> Result<Self> {
        let request = SetupCommunication::new(self.next_pdu_ref());
        let packet = self.transport.exchange(&request.to_bytes())?;
        let ack = SetupCommunicationAck::from_bytes(unwrap_data(&packet)?)?;
        if ack.header.pdu_ref != request.pdu_ref() {
            return Err(S7Error::PduRefMismatch {
                expected: request.pdu_ref(),
                received: ack.header.pdu_ref,
            });
        }
        if ack.pdu_size == 0 {
            return Err(S7Error::invalid_response("negotiated PDU size is 0"));
        }
        self.pdu_size = ack.pdu_size.min(request.pdu_size);
        Ok(self)
    }

    /// Returns the next PDU reference (wrapping).
    fn next_pdu_ref(&self) -> u16 {
        self.pdu_ref.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the negotiated PDU size.
    pub fn pdu_size(&self) -> u16 {
        self.pdu_size
    }

    /// Reads several points with one ReadVar request.
    ///
    /// The returned buffer holds one 4-byte slot per point, in order.
    ///
    /// # Errors
    ///
    /// - `S7Error::InvalidParameter` if `points` is empty, holds more than 18
    ///   entries, or the request would not fit the negotiated PDU size
    /// - `S7Error::PlcError` if the PLC rejects the whole request
    /// - `S7Error::PduRefMismatch` if the response answers another request
    /// - `S7Error::Timeout` or `S7Error::Io` on communication failure
    pub fn read_multi(&mut self, points: &[ResolvedPoint]) -> Result<BatchReadout> {
        let items = points.iter().map(ReadItem::from).collect();
        let request = ReadVarRequest::new(self.next_pdu_ref(), items)?;

        let limit = usize::from(self.pdu_size);
        if request.request_pdu_size() > limit || request.response_pdu_size() > limit {
            return Err(S7Error::invalid_parameter(
                "points",
                format!("request exceeds negotiated PDU size {}", limit),
            ));
        }

        let packet = self.transport.exchange(&request.to_bytes())?;
        let response = ReadVarResponse::from_bytes(unwrap_data(&packet)?)?;
        response.check_pdu_ref(request.pdu_ref())?;
        response.into_readout(request.items())
    }

    /// Consumes the client and returns its transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: Exchange> ReadBatch for Client<T> {
    fn read_batch(&mut self, points: &[ResolvedPoint]) -> Result<BatchReadout> {
        self.read_multi(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::resolve;
    use crate::frame::{wrap_data, PduType, S7Header};
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct Script {
        replies: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl Exchange for Script {
        fn exchange(&mut self, packet: &[u8]) -> Result<Vec<u8>> {
            self.sent.push(packet.to_vec());
            self.replies.pop_front().ok_or(S7Error::Timeout)
        }
    }

    fn ack_data(pdu_ref: u16, param: &[u8], data: &[u8]) -> Vec<u8> {
        let header = S7Header {
            pdu_type: PduType::AckData,
            pdu_ref,
            param_len: param.len() as u16,
            data_len: data.len() as u16,
            error_class: 0,
            error_code: 0,
        };
        let mut pdu = header.to_bytes();
        pdu.extend_from_slice(param);
        pdu.extend_from_slice(data);
        wrap_data(&pdu)
    }

    fn connection_confirm() -> Vec<u8> {
        hex::decode("0300001611d00001000100c0010ac1020100c2020101").unwrap()
    }

    fn setup_ack(pdu_ref: u16, pdu_size: u16) -> Vec<u8> {
        let size = pdu_size.to_be_bytes();
        ack_data(pdu_ref, &[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, size[0], size[1]], &[])
    }

    fn connected(pdu_size: u16) -> Client<Script> {
        let script = Script {
            replies: VecDeque::from(vec![connection_confirm(), setup_ack(1, pdu_size)]),
            sent: Vec::new(),
        };
        Client::handshake(script, 0, 1).unwrap()
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("127.0.0.1:102".parse().unwrap(), 0, 1);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        let config = config.with_connect_timeout(Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_handshake() {
        let client = connected(240);
        assert_eq!(client.pdu_size(), 240);

        let script = client.into_transport();
        assert_eq!(script.sent.len(), 2);
        assert_eq!(script.sent[0][5], 0xE0);
        assert_eq!(script.sent[0][21], 0x01); // slot 1
        assert_eq!(script.sent[1][17], 0xF0);
    }

    #[test]
    fn test_handshake_keeps_requested_limit() {
        assert_eq!(connected(960).pdu_size(), 480);
    }

    #[test]
    fn test_handshake_rejected() {
        let script = Script {
            replies: VecDeque::from(vec![hex::decode("0300000b06800001000100").unwrap()]),
            sent: Vec::new(),
        };
        assert!(Client::handshake(script, 0, 9).is_err());
    }

    #[test]
    fn test_read_multi() {
        let mut client = connected(240);
        let data = [
            0xFF, 0x04, 0x00, 0x10, 0x00, 0x01, // DB1.DBW0
            0xFF, 0x03, 0x00, 0x01, 0x01, // DB1.DBX10.0
        ];
        client
            .transport
            .replies
            .push_back(ack_data(2, &[0x04, 0x02], &data));

        let points = [
            resolve("DB1.DBW0", "word").unwrap(),
            resolve("DB1.DBX10.0", "bool").unwrap(),
        ];
        let readout = client.read_multi(&points).unwrap();
        assert_eq!(readout.data, vec![0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert!(readout.item_errors.iter().all(Option::is_none));
    }

    #[test]
    fn test_read_multi_short_item_fails_only_that_item() {
        let mut client = connected(240);
        let data = [
            0xFF, 0x04, 0x00, 0x10, 0x42, 0x28, // DB1.DBD0, only 16 bits
            0xFF, 0x04, 0x00, 0x08, 0x07, // MB3
        ];
        client
            .transport
            .replies
            .push_back(ack_data(2, &[0x04, 0x02], &data));

        let points = [
            resolve("DB1.DBD0", "real").unwrap(),
            resolve("MB3", "byte").unwrap(),
        ];
        let readout = client.read_multi(&points).unwrap();
        assert!(matches!(
            readout.item_errors[0],
            Some(S7Error::InvalidResponse { .. })
        ));
        assert!(readout.item_errors[1].is_none());
        assert_eq!(&readout.data[..4], &[0, 0, 0, 0]);
        assert_eq!(readout.data[4], 0x07);
    }

    #[test]
    fn test_read_multi_pdu_ref_mismatch() {
        let mut client = connected(240);
        client
            .transport
            .replies
            .push_back(ack_data(7, &[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x08, 0x2A]));

        let points = [resolve("MB0", "byte").unwrap()];
        assert!(matches!(
            client.read_multi(&points),
            Err(S7Error::PduRefMismatch {
                expected: 2,
                received: 7
            })
        ));
    }

    #[test]
    fn test_read_multi_exceeds_pdu_size() {
        let mut client = connected(64);
        let points = vec![resolve("MD0", "dint").unwrap(); 10];
        assert!(matches!(
            client.read_multi(&points),
            Err(S7Error::InvalidParameter { .. })
        ));
        // nothing sent beyond the handshake
        assert_eq!(client.into_transport().sent.len(), 2);
    }

    #[test]
    fn test_read_multi_timeout() {
        let mut client = connected(240);
        let points = [resolve("MW0", "word").unwrap()];
        assert!(matches!(client.read_multi(&points), Err(S7Error::Timeout)));
    }
}
