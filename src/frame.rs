//! ISO-on-TCP framing and the S7 PDU header.
//!
//! Every S7 message travels inside a COTP data TPDU inside a TPKT packet
//! (RFC 1006):
//!
//! | Layer | Size | Content |
//! |-------|------|---------|
//! | TPKT | 4 bytes | version 0x03, reserved, total length (BE) |
//! | COTP DT | 3 bytes | length indicator 0x02, type 0xF0, EOT 0x80 |
//! | S7 header | 10 / 12 bytes | protocol id 0x32, PDU type, reference, lengths |
//! | S7 parameter | variable | function code and items |
//! | S7 data | variable | payload items |
//!
//! # S7 Header Structure
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | ID | Protocol id, always 0x32 |
//! | 1 | ROSCTR | PDU type (Job 0x01, AckData 0x03) |
//! | 2-3 | RED | Reserved |
//! | 4-5 | PDUREF | Reference echoed by the PLC |
//! | 6-7 | PARLG | Parameter length |
//! | 8-9 | DATLG | Data length |
//! | 10 | ECLASS | Error class (Ack and AckData only) |
//! | 11 | ECODE | Error code (Ack and AckData only) |
//!
//! # Example
//!
//! ```
//! use s7comm_poller::{S7Header, PduType};
//!
//! let header = S7Header::new_job(0x0001, 14, 0);
//! let bytes = header.to_bytes();
//! assert_eq!(bytes, vec![0x32, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x0E, 0x00, 0x00]);
//! assert_eq!(header.pdu_type, PduType::Job);
//! ```

use crate::error::{Result, S7Error};

/// TPKT header size in bytes.
pub const TPKT_HEADER_SIZE: usize = 4;
/// TPKT version for RFC 1006.
pub const TPKT_VERSION: u8 = 0x03;
/// COTP data TPDU header: length indicator, DT code, last data unit.
pub const COTP_DATA_HEADER: [u8; 3] = [0x02, 0xF0, 0x80];
/// COTP TPDU code for data.
pub const COTP_DT: u8 = 0xF0;
/// S7 protocol identifier.
pub const S7_PROTOCOL_ID: u8 = 0x32;
/// Size of a job header (no error fields).
pub const S7_JOB_HEADER_SIZE: usize = 10;
/// Size of an acknowledgement header (with error fields).
pub const S7_ACK_HEADER_SIZE: usize = 12;

/// S7 PDU types (ROSCTR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    /// Request sent by the client.
    Job,
    /// Acknowledgement without data.
    Ack,
    /// Acknowledgement carrying data.
    AckData,
    /// Extended user data.
    UserData,
}

impl PduType {
    /// Returns the wire code.
    pub fn code(self) -> u8 {
        match self {
            PduType::Job => 0x01,
            PduType::Ack => 0x02,
            PduType::AckData => 0x03,
            PduType::UserData => 0x07,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(PduType::Job),
            0x02 => Some(PduType::Ack),
            0x03 => Some(PduType::AckData),
            0x07 => Some(PduType::UserData),
            _ => None,
        }
    }

    /// Returns whether the header of this type carries error class and code.
    pub fn has_error_fields(self) -> bool {
        matches!(self, PduType::Ack | PduType::AckData)
    }
}

/// Prepends a TPKT header to a COTP TPDU.
pub fn wrap_tpkt(tpdu: &[u8]) -> Vec<u8> {
    let total = TPKT_HEADER_SIZE + tpdu.len();
    let mut bytes = Vec::with_capacity(total);
    bytes.push(TPKT_VERSION);
    bytes.push(0x00);
    bytes.extend_from_slice(&(total as u16).to_be_bytes());
    bytes.extend_from_slice(tpdu);
    bytes
}

/// Wraps an S7 PDU into a COTP data TPDU and a TPKT packet.
pub fn wrap_data(pdu: &[u8]) -> Vec<u8> {
    let mut tpdu = Vec::with_capacity(COTP_DATA_HEADER.len() + pdu.len());
    tpdu.extend_from_slice(&COTP_DATA_HEADER);
    tpdu.extend_from_slice(pdu);
    wrap_tpkt(&tpdu)
}

/// Validates the TPKT header of a packet and returns the COTP TPDU.
///
/// # Errors
///
/// Returns `S7Error::InvalidResponse` if the version is wrong or the length
/// field disagrees with the packet size.
pub fn parse_tpkt(packet: &[u8]) -> Result<&[u8]> {
    if packet.len() < TPKT_HEADER_SIZE {
        return Err(S7Error::invalid_response(format!(
            "TPKT too short: expected at least {} bytes, got {}",
            TPKT_HEADER_SIZE,
            packet.len()
        )));
    }
    if packet[0] != TPKT_VERSION {
        return Err(S7Error::invalid_response(format!(
            "unsupported TPKT version 0x{:02X}",
            packet[0]
        )));
    }
    let length = tpkt_length(&[packet[0], packet[1], packet[2], packet[3]]);
    if length != packet.len() {
        return Err(S7Error::invalid_response(format!(
            "TPKT length {} does not match packet size {}",
            length,
            packet.len()
        )));
    }
    Ok(&packet[TPKT_HEADER_SIZE..])
}

/// Returns the total packet length announced by a TPKT header.
pub fn tpkt_length(header: &[u8; TPKT_HEADER_SIZE]) -> usize {
    usize::from(u16::from_be_bytes([header[2], header[3]]))
}

/// Strips TPKT and COTP data headers and returns the S7 PDU.
///
/// # Errors
///
/// Returns `S7Error::InvalidResponse` if the packet is not a COTP data TPDU.
pub fn unwrap_data(packet: &[u8]) -> Result<&[u8]> {
    let tpdu = parse_tpkt(packet)?;
    if tpdu.len() < 2 {
        return Err(S7Error::invalid_response("COTP header missing"));
    }
    let li = usize::from(tpdu[0]);
    if tpdu[1] & 0xF0 != COTP_DT {
        return Err(S7Error::invalid_response(format!(
            "expected COTP data TPDU, got type 0x{:02X}",
            tpdu[1]
        )));
    }
    tpdu.get(1 + li..)
        .ok_or_else(|| S7Error::invalid_response("COTP length indicator exceeds packet"))
}

/// S7 PDU header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S7Header {
    /// PDU type.
    pub pdu_type: PduType,
    /// Reference used to match responses with requests.
    pub pdu_ref: u16,
    /// Length of the parameter section.
    pub param_len: u16,
    /// Length of the data section.
    pub data_len: u16,
    /// Error class (0 = success); only carried by acknowledgements.
    pub error_class: u8,
    /// Error code (0 = success); only carried by acknowledgements.
    pub error_code: u8,
}

impl S7Header {
    /// Creates a job header.
    pub fn new_job(pdu_ref: u16, param_len: u16, data_len: u16) -> Self {
        Self {
            pdu_type: PduType::Job,
            pdu_ref,
            param_len,
            data_len,
            error_class: 0,
            error_code: 0,
        }
    }

    /// Returns the encoded size of this header.
    pub fn size(&self) -> usize {
        if self.pdu_type.has_error_fields() {
            S7_ACK_HEADER_SIZE
        } else {
            S7_JOB_HEADER_SIZE
        }
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(S7_PROTOCOL_ID);
        bytes.push(self.pdu_type.code());
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes.extend_from_slice(&self.pdu_ref.to_be_bytes());
        bytes.extend_from_slice(&self.param_len.to_be_bytes());
        bytes.extend_from_slice(&self.data_len.to_be_bytes());
        if self.pdu_type.has_error_fields() {
            bytes.push(self.error_class);
            bytes.push(self.error_code);
        }
        bytes
    }

    /// Parses a header from the start of an S7 PDU.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidResponse` if the slice is too short, the
    /// protocol id is not 0x32, or the PDU type is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::{S7Header, PduType};
    ///
    /// let bytes = [0x32, 0x03, 0x00, 0x00, 0x00, 0x07, 0x00, 0x02, 0x00, 0x05, 0x00, 0x00];
    /// let header = S7Header::from_bytes(&bytes).unwrap();
    /// assert_eq!(header.pdu_type, PduType::AckData);
    /// assert_eq!(header.pdu_ref, 7);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < S7_JOB_HEADER_SIZE {
            return Err(S7Error::invalid_response(format!(
                "S7 header too short: expected {} bytes, got {}",
                S7_JOB_HEADER_SIZE,
                data.len()
            )));
        }
        if data[0] != S7_PROTOCOL_ID {
            return Err(S7Error::invalid_response(format!(
                "unexpected protocol id 0x{:02X}",
                data[0]
            )));
        }
        let pdu_type = PduType::from_code(data[1]).ok_or_else(|| {
            S7Error::invalid_response(format!("unknown PDU type 0x{:02X}", data[1]))
        })?;

        let (error_class, error_code) = if pdu_type.has_error_fields() {
            if data.len() < S7_ACK_HEADER_SIZE {
                return Err(S7Error::invalid_response(format!(
                    "S7 header too short: expected {} bytes, got {}",
                    S7_ACK_HEADER_SIZE,
                    data.len()
                )));
            }
            (data[10], data[11])
        } else {
            (0, 0)
        };

        Ok(Self {
            pdu_type,
            pdu_ref: u16::from_be_bytes([data[4], data[5]]),
            param_len: u16::from_be_bytes([data[6], data[7]]),
            data_len: u16::from_be_bytes([data[8], data[9]]),
            error_class,
            error_code,
        })
    }

    /// Returns `S7Error::PlcError` if the header reports an error.
    pub fn check_error(&self) -> Result<()> {
        if self.error_class != 0 || self.error_code != 0 {
            return Err(S7Error::plc_error(self.error_class, self.error_code));
        }
        Ok(())
    }
}
