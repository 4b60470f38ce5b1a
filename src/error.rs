//! Error types for S7 address resolution and communication.

use std::io;
use thiserror::Error;

/// Result type alias for S7 operations.
pub type Result<T> = std::result::Result<T, S7Error>;

/// Errors that can occur while resolving addresses or talking to a PLC.
#[derive(Debug, Error)]
pub enum S7Error {
    /// Address string does not match any supported notation.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The address string as configured.
        address: String,
        /// Description of the parse failure.
        reason: String,
    },

    /// Declared data type is not one of the supported type names.
    #[error("Unknown data type '{0}'")]
    UnknownDataType(String),

    /// The byte size implied by the address does not fit the declared type.
    #[error("Address '{address}' reads {actual} byte(s) but type '{data_type}' needs {expected}")]
    WidthMismatch {
        /// The address string as configured.
        address: String,
        /// The declared data type.
        data_type: String,
        /// Natural width of the declared type in bytes.
        expected: usize,
        /// Byte size selected by the address form.
        actual: usize,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Invalid or unexpected frame received from the PLC.
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// Description of the response error.
        reason: String,
    },

    /// Error class and code reported in the S7 header of an acknowledgement.
    #[error("PLC error: class 0x{error_class:02X}, code 0x{error_code:02X}")]
    PlcError {
        /// Error class from the S7 header.
        error_class: u8,
        /// Error code from the S7 header.
        error_code: u8,
    },

    /// A single item of a multi-item read failed.
    #[error("Item {index} failed with return code 0x{return_code:02X}")]
    ItemError {
        /// Index of the item within its request.
        index: usize,
        /// Return code of the data item.
        return_code: u8,
    },

    /// PDU reference of the acknowledgement does not match the request.
    #[error("PDU reference mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    PduRefMismatch {
        /// Reference sent with the request.
        expected: u16,
        /// Reference carried by the response.
        received: u16,
    },

    /// Communication timeout.
    #[error("Communication timeout")]
    Timeout,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of the problem.
        reason: String,
    },
}

impl S7Error {
    /// Creates a new `InvalidAddress` error.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::S7Error;
    ///
    /// let err = S7Error::invalid_address("DB1", "missing field segment");
    /// assert!(err.is_resolution_error());
    /// ```
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidResponse` error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `PlcError` from the header error class and code.
    pub fn plc_error(error_class: u8, error_code: u8) -> Self {
        Self::PlcError {
            error_class,
            error_code,
        }
    }

    /// Creates a new `Config` error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors raised while resolving a configured point.
    ///
    /// These are reported once per point and never abort a polling cycle.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. } | Self::UnknownDataType(_) | Self::WidthMismatch { .. }
        )
    }
}

/// Returns a human-readable description of an S7 data item return code.
///
/// # Example
///
/// ```
/// use s7comm_poller::item_error_description;
///
/// assert_eq!(item_error_description(0x05), "Address out of range");
/// ```
pub fn item_error_description(return_code: u8) -> &'static str {
    match return_code {
        0x01 => "Hardware fault",
        0x03 => "Accessing the object not allowed",
        0x05 => "Address out of range",
        0x06 => "Data type not supported",
        0x07 => "Data type inconsistent",
        0x0A => "Object does not exist",
        0xFF => "Success",
        _ => "Unknown return code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_display() {
        let err = S7Error::invalid_address("DB1", "missing field segment");
        assert_eq!(
            err.to_string(),
            "Invalid address 'DB1': missing field segment"
        );
    }

    #[test]
    fn test_width_mismatch_display() {
        let err = S7Error::WidthMismatch {
            address: "DB1.DBB0".to_string(),
            data_type: "word".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Address 'DB1.DBB0' reads 1 byte(s) but type 'word' needs 2"
        );
    }

    #[test]
    fn test_item_error_display() {
        let err = S7Error::ItemError {
            index: 3,
            return_code: 0x0A,
        };
        assert_eq!(err.to_string(), "Item 3 failed with return code 0x0A");
    }

    #[test]
    fn test_pdu_ref_mismatch_display() {
        let err = S7Error::PduRefMismatch {
            expected: 0x0001,
            received: 0x0002,
        };
        assert_eq!(
            err.to_string(),
            "PDU reference mismatch: expected 0x0001, received 0x0002"
        );
    }

    #[test]
    fn test_resolution_classification() {
        assert!(S7Error::UnknownDataType("lreal".into()).is_resolution_error());
        assert!(S7Error::invalid_address("X1", "bad").is_resolution_error());
        assert!(!S7Error::Timeout.is_resolution_error());
        assert!(!S7Error::plc_error(0x81, 0x04).is_resolution_error());
    }
}
