//! Decoding of raw read slots into typed values.
//!
//! Every point of a batch occupies a fixed 4-byte slot in the read buffer.
//! Values narrower than 4 bytes sit in the leading bytes of their slot and
//! the remaining bytes are undefined. PLC memory is big-endian.
//!
//! # Example
//!
//! ```
//! use s7comm_poller::decode::{decode, DecodeKind, Value};
//!
//! let slot = [0xBE, 0xEF, 0x00, 0x00];
//! assert_eq!(decode(&slot, DecodeKind::Word, 0), Value::UInt16(0xBEEF));
//!
//! let slot = [0x08, 0x00, 0x00, 0x00];
//! assert_eq!(decode(&slot, DecodeKind::Bool, 3), Value::Bool(true));
//! ```

use serde::Serialize;

/// Size of one item slot in a batch read buffer.
pub const SLOT_SIZE: usize = 4;

/// Masks selecting bit 0 through bit 7 of a byte.
pub const BIT_MASKS: [u8; 8] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];

/// How the bytes of a slot are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeKind {
    /// One bit of the first byte.
    Bool,
    /// Unsigned 8-bit.
    Byte,
    /// Unsigned 16-bit bit string.
    Word,
    /// Unsigned 32-bit bit string.
    DWord,
    /// Signed 16-bit, two's complement.
    Int16,
    /// Signed 32-bit, two's complement.
    Int32,
    /// Unsigned 16-bit.
    UInt16,
    /// Unsigned 32-bit.
    UInt32,
    /// IEEE-754 single precision.
    Float32,
}

impl DecodeKind {
    /// Returns the natural width of the kind in bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::DecodeKind;
    ///
    /// assert_eq!(DecodeKind::Bool.width(), 1);
    /// assert_eq!(DecodeKind::Int16.width(), 2);
    /// assert_eq!(DecodeKind::Float32.width(), 4);
    /// ```
    pub fn width(self) -> usize {
        match self {
            DecodeKind::Bool | DecodeKind::Byte => 1,
            DecodeKind::Word | DecodeKind::Int16 | DecodeKind::UInt16 => 2,
            DecodeKind::DWord | DecodeKind::Int32 | DecodeKind::UInt32 | DecodeKind::Float32 => 4,
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean from a single bit.
    Bool(bool),
    /// Unsigned 8-bit.
    Byte(u8),
    /// Unsigned 16-bit (`word`, `uint`).
    UInt16(u16),
    /// Unsigned 32-bit (`dword`, `udint`).
    UInt32(u32),
    /// Signed 16-bit (`int`).
    Int16(i16),
    /// Signed 32-bit (`dint`, `time`).
    Int32(i32),
    /// Single precision float (`real`).
    Float32(f32),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
        }
    }
}

/// Decodes one slot.
///
/// `bit` is only used for [`DecodeKind::Bool`] and is taken modulo 8.
///
/// # Example
///
/// ```
/// use s7comm_poller::decode::{decode, DecodeKind, Value};
///
/// let slot = (-2147483648i32).to_be_bytes();
/// assert_eq!(decode(&slot, DecodeKind::Int32, 0), Value::Int32(i32::MIN));
/// ```
pub fn decode(slot: &[u8; SLOT_SIZE], kind: DecodeKind, bit: u8) -> Value {
    let word = [slot[0], slot[1]];
    match kind {
        DecodeKind::Bool => Value::Bool(slot[0] & BIT_MASKS[usize::from(bit & 0x07)] != 0),
        DecodeKind::Byte => Value::Byte(slot[0]),
        DecodeKind::Word | DecodeKind::UInt16 => Value::UInt16(u16::from_be_bytes(word)),
        DecodeKind::DWord | DecodeKind::UInt32 => Value::UInt32(u32::from_be_bytes(*slot)),
        DecodeKind::Int16 => Value::Int16(i16::from_be_bytes(word)),
        DecodeKind::Int32 => Value::Int32(i32::from_be_bytes(*slot)),
        DecodeKind::Float32 => Value::Float32(f32::from_be_bytes(*slot)),
    }
}

/// Returns the slot of item `index` in a batch read buffer.
///
/// Returns `None` if the buffer does not hold that many slots.
pub fn slot_at(buffer: &[u8], index: usize) -> Option<&[u8; SLOT_SIZE]> {
    let start = index.checked_mul(SLOT_SIZE)?;
    buffer.get(start..start + SLOT_SIZE)?.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(bytes: &[u8]) -> [u8; SLOT_SIZE] {
        let mut slot = [0xAA; SLOT_SIZE];
        slot[..bytes.len()].copy_from_slice(bytes);
        slot
    }

    #[test]
    fn test_decode_word() {
        let slot = padded(&0xBEEFu16.to_be_bytes());
        assert_eq!(decode(&slot, DecodeKind::Word, 0), Value::UInt16(0xBEEF));
        assert_eq!(decode(&slot, DecodeKind::UInt16, 0), Value::UInt16(0xBEEF));
    }

    #[test]
    fn test_decode_dword() {
        let slot = 0xDEADBEEFu32.to_be_bytes();
        assert_eq!(decode(&slot, DecodeKind::DWord, 0), Value::UInt32(0xDEADBEEF));
        assert_eq!(decode(&slot, DecodeKind::UInt32, 0), Value::UInt32(0xDEADBEEF));
    }

    #[test]
    fn test_decode_signed() {
        let slot = padded(&(-1i16).to_be_bytes());
        assert_eq!(decode(&slot, DecodeKind::Int16, 0), Value::Int16(-1));

        let slot = i32::MIN.to_be_bytes();
        assert_eq!(decode(&slot, DecodeKind::Int32, 0), Value::Int32(-2147483648));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_decode_float() {
        let slot = 3.14f32.to_be_bytes();
        match decode(&slot, DecodeKind::Float32, 0) {
            Value::Float32(v) => assert!((v - 3.14).abs() < f32::EPSILON),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_decode_byte_ignores_padding() {
        let slot = [0x7F, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode(&slot, DecodeKind::Byte, 0), Value::Byte(0x7F));
    }

    #[test]
    fn test_decode_bool() {
        assert_eq!(decode(&padded(&[0x08]), DecodeKind::Bool, 3), Value::Bool(true));
        assert_eq!(decode(&padded(&[0x00]), DecodeKind::Bool, 3), Value::Bool(false));
        assert_eq!(decode(&padded(&[0xF7]), DecodeKind::Bool, 3), Value::Bool(false));
        assert_eq!(decode(&padded(&[0x80]), DecodeKind::Bool, 7), Value::Bool(true));
        assert_eq!(decode(&padded(&[0x01]), DecodeKind::Bool, 0), Value::Bool(true));
    }

    #[test]
    fn test_bit_masks() {
        for (bit, mask) in BIT_MASKS.iter().enumerate() {
            assert_eq!(*mask, 1u8 << bit);
        }
    }

    #[test]
    fn test_kind_widths() {
        assert_eq!(DecodeKind::Byte.width(), 1);
        assert_eq!(DecodeKind::Word.width(), 2);
        assert_eq!(DecodeKind::UInt16.width(), 2);
        assert_eq!(DecodeKind::DWord.width(), 4);
        assert_eq!(DecodeKind::Int32.width(), 4);
        assert_eq!(DecodeKind::UInt32.width(), 4);
    }

    #[test]
    fn test_slot_at() {
        let buffer = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(slot_at(&buffer, 1), Some(&[5, 6, 7, 8]));
        assert_eq!(slot_at(&buffer, 2), None);
    }

    #[test]
    fn test_value_display_and_json() {
        assert_eq!(Value::Float32(1.5).to_string(), "1.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(serde_json::to_string(&Value::Int16(-7)).unwrap(), "-7");
        assert_eq!(serde_json::to_string(&Value::Bool(false)).unwrap(), "false");
    }
}
