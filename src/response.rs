//! S7 response parsing and validation.
//!
//! Every acknowledgement starts with the 12-byte S7 ack header, followed by
//! the parameter section and the data section.
//!
//! # ReadVar Response Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 12 bytes | Ack-data header with error class/code |
//! | Function | 1 byte | 0x04 |
//! | Item count | 1 byte | Number of data items |
//! | Items | Variable | One data item per requested variable |
//!
//! Each data item is:
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Return code | 1 byte | 0xFF = success |
//! | Transport size | 1 byte | Unit of the length field |
//! | Length | 2 bytes | Data length in bits or bytes |
//! | Data | Variable | Item data |
//! | Fill | 0-1 byte | Pads odd-length items that are not last |
//!
//! # Example
//!
//! ```
//! use s7comm_poller::ReadVarResponse;
//!
//! let pdu = [
//!     0x32, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x06, 0x00, 0x00, // header
//!     0x04, 0x01, // ReadVar, one item
//!     0xFF, 0x04, 0x00, 0x10, 0x12, 0x34, // success, 16 bits
//! ];
//!
//! let response = ReadVarResponse::from_bytes(&pdu).unwrap();
//! assert_eq!(response.items[0].data, vec![0x12, 0x34]);
//! ```

use crate::command::{ReadItem, FUNC_READ_VAR, FUNC_SETUP_COMM};
use crate::decode::SLOT_SIZE;
use crate::error::{Result, S7Error};
use crate::frame::{parse_tpkt, PduType, S7Header};
use crate::poller::BatchReadout;

/// COTP connection confirm TPDU code.
pub const COTP_CC: u8 = 0xD0;

/// Return code of a successful data item.
pub const RETURN_CODE_SUCCESS: u8 = 0xFF;

/// Transport size: single bit, length in bits (always 1).
pub const TS_BIT: u8 = 0x03;
/// Transport size: byte/word/dword, length in bits.
pub const TS_BYTE: u8 = 0x04;
/// Transport size: real, length in bytes.
pub const TS_REAL: u8 = 0x07;
/// Transport size: octet string, length in bytes.
pub const TS_OCTET_STRING: u8 = 0x09;

/// Size of the fixed part of a data item.
const ITEM_HEADER_SIZE: usize = 4;

/// Parsed COTP connection confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfirm {
    /// Destination reference (the caller's source reference).
    pub dst_ref: u16,
    /// Source reference chosen by the PLC.
    pub src_ref: u16,
}

impl ConnectionConfirm {
    /// Parses a connection confirm from a complete TPKT packet.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidResponse` if the packet is not a connection
    /// confirm. A disconnect request from the PLC usually means the rack or
    /// slot is wrong.
    pub fn from_bytes(packet: &[u8]) -> Result<Self> {
        let tpdu = parse_tpkt(packet)?;
        if tpdu.len() < 7 {
            return Err(S7Error::invalid_response(format!(
                "connection confirm too short: {} bytes",
                tpdu.len()
            )));
        }
        if tpdu[1] & 0xF0 != COTP_CC {
            return Err(S7Error::invalid_response(format!(
                "expected COTP connection confirm, got type 0x{:02X}",
                tpdu[1]
            )));
        }
        Ok(Self {
            dst_ref: u16::from_be_bytes([tpdu[2], tpdu[3]]),
            src_ref: u16::from_be_bytes([tpdu[4], tpdu[5]]),
        })
    }
}

/// Parsed acknowledgement of a Setup Communication job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupCommunicationAck {
    /// Response header.
    pub header: S7Header,
    /// Parallel jobs granted to the client.
    pub max_amq_calling: u16,
    /// Parallel jobs granted to the PLC.
    pub max_amq_called: u16,
    /// Negotiated PDU size.
    pub pdu_size: u16,
}

impl SetupCommunicationAck {
    /// Parses the acknowledgement from an S7 PDU.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::PlcError` if the header reports an error, or
    /// `S7Error::InvalidResponse` if the PDU is malformed.
    pub fn from_bytes(pdu: &[u8]) -> Result<Self> {
        let header = parse_ack_header(pdu)?;
        let param = param_section(pdu, &header)?;
        if param.len() < 8 || param[0] != FUNC_SETUP_COMM {
            return Err(S7Error::invalid_response(
                "malformed setup communication parameters",
            ));
        }
        Ok(Self {
            header,
            max_amq_calling: u16::from_be_bytes([param[2], param[3]]),
            max_amq_called: u16::from_be_bytes([param[4], param[5]]),
            pdu_size: u16::from_be_bytes([param[6], param[7]]),
        })
    }
}

/// One data item of a ReadVar response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    /// Return code (0xFF = success).
    pub return_code: u8,
    /// Transport size of the data.
    pub transport_size: u8,
    /// Item data, without fill byte.
    pub data: Vec<u8>,
}

impl DataItem {
    /// Returns whether the PLC delivered this item.
    pub fn is_success(&self) -> bool {
        self.return_code == RETURN_CODE_SUCCESS
    }
}

/// Parsed ReadVar acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadVarResponse {
    /// Response header.
    pub header: S7Header,
    /// Data items in request order.
    pub items: Vec<DataItem>,
}

impl ReadVarResponse {
    /// Parses a ReadVar acknowledgement from an S7 PDU.
    ///
    /// # Errors
    ///
    /// - `S7Error::PlcError` if the header reports an error
    /// - `S7Error::InvalidResponse` if the PDU is truncated or is not a
    ///   ReadVar acknowledgement
    pub fn from_bytes(pdu: &[u8]) -> Result<Self> {
        let header = parse_ack_header(pdu)?;
        let param = param_section(pdu, &header)?;
        if param.len() < 2 || param[0] != FUNC_READ_VAR {
            return Err(S7Error::invalid_response("not a ReadVar acknowledgement"));
        }
        let count = usize::from(param[1]);

        let data_start = header.size() + param.len();
        let data_end = data_start + usize::from(header.data_len);
        let data = pdu.get(data_start..data_end).ok_or_else(|| {
            S7Error::invalid_response(format!(
                "data section of {} bytes exceeds PDU",
                header.data_len
            ))
        })?;

        let mut items = Vec::with_capacity(count);
        let mut pos = 0;
        for index in 0..count {
            let item_header = data.get(pos..pos + ITEM_HEADER_SIZE).ok_or_else(|| {
                S7Error::invalid_response(format!("data item {} truncated", index))
            })?;
            let return_code = item_header[0];
            let transport_size = item_header[1];
            let raw_len = u16::from_be_bytes([item_header[2], item_header[3]]);
            let len = data_length(transport_size, raw_len);
            pos += ITEM_HEADER_SIZE;

            let item_data = data.get(pos..pos + len).ok_or_else(|| {
                S7Error::invalid_response(format!("data item {} truncated", index))
            })?;
            pos += len;
            if len % 2 == 1 && index + 1 < count {
                pos += 1;
            }

            items.push(DataItem {
                return_code,
                transport_size,
                data: item_data.to_vec(),
            });
        }

        Ok(Self { header, items })
    }

    /// Validates that the response belongs to the request with `expected` reference.
    pub fn check_pdu_ref(&self, expected: u16) -> Result<()> {
        if self.header.pdu_ref != expected {
            return Err(S7Error::PduRefMismatch {
                expected,
                received: self.header.pdu_ref,
            });
        }
        Ok(())
    }

    /// Scatters item data into 4-byte slots.
    ///
    /// Successful items are copied to the start of their slot; failed items
    /// leave a zeroed slot and an `S7Error::ItemError` in their position. An
    /// item whose data length differs from the requested length is marked
    /// failed with `S7Error::InvalidResponse`.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidResponse` if the item count differs from
    /// `requested`.
    pub fn into_readout(self, requested: &[ReadItem]) -> Result<BatchReadout> {
        if self.items.len() != requested.len() {
            return Err(S7Error::invalid_response(format!(
                "expected {} data items, got {}",
                requested.len(),
                self.items.len()
            )));
        }

        let mut data = vec![0u8; requested.len() * SLOT_SIZE];
        let mut item_errors = Vec::with_capacity(requested.len());
        for (index, (item, spec)) in self.items.iter().zip(requested).enumerate() {
            if !item.is_success() {
                item_errors.push(Some(S7Error::ItemError {
                    index,
                    return_code: item.return_code,
                }));
                continue;
            }
            let expected = usize::from(spec.length);
            if item.data.len() != expected || expected > SLOT_SIZE {
                item_errors.push(Some(S7Error::invalid_response(format!(
                    "item {}: expected {} bytes, got {} (transport size 0x{:02X})",
                    index,
                    expected,
                    item.data.len(),
                    item.transport_size
                ))));
                continue;
            }
            let start = index * SLOT_SIZE;
            data[start..start + expected].copy_from_slice(&item.data);
            item_errors.push(None);
        }
        Ok(BatchReadout { data, item_errors })
    }
}

/// Converts the length field of a data item to bytes.
fn data_length(transport_size: u8, raw: u16) -> usize {
    let raw = usize::from(raw);
    match transport_size {
        TS_BIT | TS_REAL | TS_OCTET_STRING => raw,
        // TS_BYTE, integer and unknown sizes count bits
        _ => raw.div_ceil(8),
    }
}

/// Parses the header of an acknowledgement and checks its error fields.
fn parse_ack_header(pdu: &[u8]) -> Result<S7Header> {
    let header = S7Header::from_bytes(pdu)?;
    if header.pdu_type != PduType::AckData && header.pdu_type != PduType::Ack {
        return Err(S7Error::invalid_response(format!(
            "expected acknowledgement, got {:?}",
            header.pdu_type
        )));
    }
    header.check_error()?;
    Ok(header)
}

fn param_section<'a>(pdu: &'a [u8], header: &S7Header) -> Result<&'a [u8]> {
    let start = header.size();
    pdu.get(start..start + usize::from(header.param_len))
        .ok_or_else(|| S7Error::invalid_response("parameter section exceeds PDU"))
}
