//! S7 request structures and serialization.
//!
//! This module contains the requests the poller sends to a PLC. Each request
//! serializes itself to a complete TPKT packet ready for transmission.
//!
//! # Request Types
//!
//! ## Session Setup
//! - [`ConnectionRequest`] - COTP connection request carrying the TSAPs
//! - [`SetupCommunication`] - S7 PDU size negotiation
//!
//! ## Memory Operations
//! - [`ReadVarRequest`] - Read several variables in one request
//!
//! # Example
//!
//! ```
//! use s7comm_poller::{resolve, ReadItem, ReadVarRequest};
//!
//! let point = resolve("DB1.DBW0", "word").unwrap();
//! let request = ReadVarRequest::new(0x0001, vec![ReadItem::from(&point)]).unwrap();
//! let bytes = request.to_bytes();
//! // TPKT (4) + COTP (3) + header (10) + param (2 + 12)
//! assert_eq!(bytes.len(), 31);
//! ```

use crate::address::ResolvedPoint;
use crate::area::Area;
use crate::error::{Result, S7Error};
use crate::frame::{wrap_data, wrap_tpkt, S7Header, S7_ACK_HEADER_SIZE, S7_JOB_HEADER_SIZE};
use crate::plan::MAX_ITEMS_PER_REQUEST;

/// ReadVar function code.
pub(crate) const FUNC_READ_VAR: u8 = 0x04;
/// Setup Communication function code.
pub(crate) const FUNC_SETUP_COMM: u8 = 0xF0;
/// COTP connection request TPDU code.
pub(crate) const COTP_CR: u8 = 0xE0;
/// Variable specification type of an item.
pub(crate) const VAR_SPEC: u8 = 0x12;
/// S7ANY addressing syntax.
pub(crate) const SYNTAX_S7ANY: u8 = 0x10;
/// Transport size for byte-granular reads.
pub const TRANSPORT_SIZE_BYTE: u8 = 0x02;
/// Size of one encoded read item.
pub const READ_ITEM_SIZE: usize = 12;

/// Local TSAP used by the poller (PG connection, rack 0 slot 0).
pub const LOCAL_TSAP: u16 = 0x0100;
/// TPDU size code for 1024-byte TPDUs.
pub const TPDU_SIZE_1024: u8 = 0x0A;
/// PDU size requested during setup.
pub const REQUESTED_PDU_SIZE: u16 = 480;

/// Returns the remote TSAP selecting the CPU at `rack`/`slot`.
///
/// # Example
///
/// ```
/// use s7comm_poller::remote_tsap;
///
/// assert_eq!(remote_tsap(0, 2), 0x0102);
/// assert_eq!(remote_tsap(1, 3), 0x0123);
/// ```
pub fn remote_tsap(rack: u8, slot: u8) -> u16 {
    0x0100 | (u16::from(rack) * 0x20 + u16::from(slot))
}

/// COTP connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// Calling TSAP.
    pub local_tsap: u16,
    /// Called TSAP.
    pub remote_tsap: u16,
    /// Source reference.
    pub src_ref: u16,
}

impl ConnectionRequest {
    /// Creates a connection request for the CPU at `rack`/`slot`.
    pub fn new(rack: u8, slot: u8) -> Self {
        Self {
            local_tsap: LOCAL_TSAP,
            remote_tsap: remote_tsap(rack, slot),
            src_ref: 0x0001,
        }
    }

    /// Serializes the request to a TPKT packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut tpdu = Vec::with_capacity(18);
        tpdu.push(0x11); // length indicator
        tpdu.push(COTP_CR);
        tpdu.extend_from_slice(&[0x00, 0x00]); // destination reference
        tpdu.extend_from_slice(&self.src_ref.to_be_bytes());
        tpdu.push(0x00); // class 0
        tpdu.extend_from_slice(&[0xC0, 0x01, TPDU_SIZE_1024]);
        tpdu.extend_from_slice(&[0xC1, 0x02]);
        tpdu.extend_from_slice(&self.local_tsap.to_be_bytes());
        tpdu.extend_from_slice(&[0xC2, 0x02]);
        tpdu.extend_from_slice(&self.remote_tsap.to_be_bytes());
        wrap_tpkt(&tpdu)
    }
}

/// S7 Setup Communication job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommunication {
    header: S7Header,
    /// Parallel jobs the client may issue.
    pub max_amq_calling: u16,
    /// Parallel jobs the PLC may issue.
    pub max_amq_called: u16,
    /// Requested PDU size.
    pub pdu_size: u16,
}

impl SetupCommunication {
    /// Creates a setup job requesting [`REQUESTED_PDU_SIZE`] with one job in flight.
    pub fn new(pdu_ref: u16) -> Self {
        Self {
            header: S7Header::new_job(pdu_ref, 8, 0),
            max_amq_calling: 1,
            max_amq_called: 1,
            pdu_size: REQUESTED_PDU_SIZE,
        }
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.header.pdu_ref
    }

    /// Serializes the job to a TPKT packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pdu = self.header.to_bytes();
        pdu.push(FUNC_SETUP_COMM);
        pdu.push(0x00);
        pdu.extend_from_slice(&self.max_amq_calling.to_be_bytes());
        pdu.extend_from_slice(&self.max_amq_called.to_be_bytes());
        pdu.extend_from_slice(&self.pdu_size.to_be_bytes());
        wrap_data(&pdu)
    }
}

/// One variable of a ReadVar request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadItem {
    /// Memory area.
    pub area: Area,
    /// Data block number, 0 outside DB.
    pub db_number: u16,
    /// Starting byte.
    pub start: u16,
    /// Number of bytes.
    pub length: u16,
}

impl From<&ResolvedPoint> for ReadItem {
    fn from(point: &ResolvedPoint) -> Self {
        Self {
            area: point.area,
            db_number: if point.area.uses_block_number() {
                point.db_number
            } else {
                0
            },
            start: point.byte_offset,
            length: point.byte_size as u16,
        }
    }
}

impl ReadItem {
    /// Serializes the item specification (12 bytes).
    ///
    /// The address field is a bit address: `start * 8`.
    pub(crate) fn to_bytes(self) -> [u8; READ_ITEM_SIZE] {
        let length = self.length.to_be_bytes();
        let db = self.db_number.to_be_bytes();
        let address = (u32::from(self.start) << 3).to_be_bytes();
        [
            VAR_SPEC,
            0x0A, // length of the following specification
            SYNTAX_S7ANY,
            TRANSPORT_SIZE_BYTE,
            length[0],
            length[1],
            db[0],
            db[1],
            self.area.code(),
            address[1],
            address[2],
            address[3],
        ]
    }

    /// Returns the bytes this item occupies in the response data section,
    /// including the fill byte that follows odd-length items.
    pub fn response_size(&self) -> usize {
        let length = usize::from(self.length);
        4 + length + length % 2
    }
}

/// ReadVar job reading several variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadVarRequest {
    header: S7Header,
    items: Vec<ReadItem>,
}

impl ReadVarRequest {
    /// Creates a new ReadVar job.
    ///
    /// # Errors
    ///
    /// Returns an error if `items` is empty or holds more than
    /// [`MAX_ITEMS_PER_REQUEST`] entries.
    pub fn new(pdu_ref: u16, items: Vec<ReadItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(S7Error::invalid_parameter("items", "must not be empty"));
        }
        if items.len() > MAX_ITEMS_PER_REQUEST {
            return Err(S7Error::invalid_parameter(
                "items",
                format!("must not exceed {}", MAX_ITEMS_PER_REQUEST),
            ));
        }
        let param_len = (2 + items.len() * READ_ITEM_SIZE) as u16;
        Ok(Self {
            header: S7Header::new_job(pdu_ref, param_len, 0),
            items,
        })
    }

    /// Returns the PDU reference.
    pub fn pdu_ref(&self) -> u16 {
        self.header.pdu_ref
    }

    /// Returns the requested items.
    pub fn items(&self) -> &[ReadItem] {
        &self.items
    }

    /// Returns the S7 PDU size of the request.
    pub fn request_pdu_size(&self) -> usize {
        S7_JOB_HEADER_SIZE + usize::from(self.header.param_len)
    }

    /// Returns the S7 PDU size of a successful response.
    pub fn response_pdu_size(&self) -> usize {
        S7_ACK_HEADER_SIZE + 2 + self.items.iter().map(ReadItem::response_size).sum::<usize>()
    }

    /// Serializes the job to a TPKT packet.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pdu = Vec::with_capacity(self.request_pdu_size());
        pdu.extend_from_slice(&self.header.to_bytes());
        pdu.push(FUNC_READ_VAR);
        pdu.push(self.items.len() as u8);
        for item in &self.items {
            pdu.extend_from_slice(&item.to_bytes());
        }
        wrap_data(&pdu)
    }
}
