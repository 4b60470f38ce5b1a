//! Address notation and declared type resolution.
//!
//! A configured point is an address string plus a declared type name. This
//! module turns the pair into a [`ResolvedPoint`]: the area, block number,
//! byte offset, byte size and optional bit offset sent to the PLC, together
//! with the [`DecodeKind`] used to interpret the returned bytes.
//!
//! # Address Notation
//!
//! Three notations are recognised, tried in this order:
//!
//! | Form | Example | Area | Size | Bit |
//! |------|---------|------|:----:|:---:|
//! | I/O shorthand | `MW16`, `IB0`, `QD4` | first letter | second letter (B/W/D) | - |
//! | Data block | `DB1.DBW0`, `DB1.DBX10.0` | DB | field code | `DBX` only |
//! | Generic bit | `I0.1`, `M10.7` | first letter | 1 | required |
//!
//! German mnemonics are accepted alongside English ones: `E` for inputs and
//! `A` for outputs.
//!
//! # Declared Types
//!
//! | Type | Decodes as | Width |
//! |------|------------|:-----:|
//! | `bool` | [`DecodeKind::Bool`] | 1 |
//! | `byte` | [`DecodeKind::Byte`] | 1 |
//! | `word` / `uint` | [`DecodeKind::Word`] / [`DecodeKind::UInt16`] | 2 |
//! | `int` | [`DecodeKind::Int16`] | 2 |
//! | `dword` / `udint` | [`DecodeKind::DWord`] / [`DecodeKind::UInt32`] | 4 |
//! | `dint` / `time` | [`DecodeKind::Int32`] | 4 |
//! | `real` | [`DecodeKind::Float32`] | 4 |
//!
//! # Example
//!
//! ```
//! use s7comm_poller::{resolve, Area, DecodeKind};
//!
//! let point = resolve("DB1.DBX10.0", "bool").unwrap();
//! assert_eq!(point.area, Area::DataBlock);
//! assert_eq!(point.db_number, 1);
//! assert_eq!(point.byte_offset, 10);
//! assert_eq!(point.bit_offset, Some(0));
//! assert_eq!(point.kind, DecodeKind::Bool);
//!
//! // Width must match the declared type
//! assert!(resolve("DB1.DBB0", "real").is_err());
//! ```

use std::str::FromStr;

use crate::area::Area;
use crate::decode::DecodeKind;
use crate::error::{Result, S7Error};

/// Highest valid bit offset within a byte.
pub const MAX_BIT_OFFSET: u8 = 7;

/// Two-letter prefixes of the I/O shorthand notation.
const IO_SHORTHAND_PREFIXES: [&str; 15] = [
    "EB", "IB", "AB", "QB", "MB", "EW", "IW", "AW", "QW", "MW", "ED", "ID", "AD", "QD", "MD",
];

/// Declared data type of a configured point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Single bit.
    Bool,
    /// Unsigned 8-bit value.
    Byte,
    /// Unsigned 16-bit bit string.
    Word,
    /// Unsigned 32-bit bit string.
    DWord,
    /// Signed 16-bit integer.
    Int,
    /// Signed 32-bit integer.
    DInt,
    /// IEC time in milliseconds, stored as a signed 32-bit integer.
    Time,
    /// Unsigned 16-bit integer.
    UInt,
    /// Unsigned 32-bit integer.
    UDInt,
    /// IEEE-754 single precision float.
    Real,
}

impl DataType {
    /// Returns the decode kind used for values of this type.
    pub fn decode_kind(self) -> DecodeKind {
        match self {
            DataType::Bool => DecodeKind::Bool,
            DataType::Byte => DecodeKind::Byte,
            DataType::Word => DecodeKind::Word,
            DataType::DWord => DecodeKind::DWord,
            DataType::Int => DecodeKind::Int16,
            DataType::DInt | DataType::Time => DecodeKind::Int32,
            DataType::UInt => DecodeKind::UInt16,
            DataType::UDInt => DecodeKind::UInt32,
            DataType::Real => DecodeKind::Float32,
        }
    }

    /// Returns the configuration name of this type.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Byte => "byte",
            DataType::Word => "word",
            DataType::DWord => "dword",
            DataType::Int => "int",
            DataType::DInt => "dint",
            DataType::Time => "time",
            DataType::UInt => "uint",
            DataType::UDInt => "udint",
            DataType::Real => "real",
        }
    }
}

impl FromStr for DataType {
    type Err = S7Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bool" => Ok(DataType::Bool),
            "byte" => Ok(DataType::Byte),
            "word" => Ok(DataType::Word),
            "dword" => Ok(DataType::DWord),
            "int" => Ok(DataType::Int),
            "dint" => Ok(DataType::DInt),
            "time" => Ok(DataType::Time),
            "uint" => Ok(DataType::UInt),
            "udint" => Ok(DataType::UDInt),
            "real" => Ok(DataType::Real),
            other => Err(S7Error::UnknownDataType(other.to_string())),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed address, tagged by the notation it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressForm {
    /// `MW16`, `IB0`, `QD4`: area and width from the prefix, byte offset from the suffix.
    IoShorthand {
        /// Selected area.
        area: Area,
        /// Byte size from the second prefix letter.
        byte_size: usize,
        /// Starting byte.
        byte_offset: u16,
    },
    /// `DB1.DBW0`, `DB1.DBX10.0`.
    DataBlock {
        /// Data block number.
        db_number: u16,
        /// Byte size from the field code.
        byte_size: usize,
        /// Starting byte within the block.
        byte_offset: u16,
        /// Bit offset, present only for `DBX`.
        bit: Option<u8>,
    },
    /// `I0.1`, `M10.7`: a single bit.
    GenericBit {
        /// Selected area.
        area: Area,
        /// Byte holding the bit.
        byte_offset: u16,
        /// Bit offset within the byte.
        bit: u8,
    },
}

impl AddressForm {
    /// Parses an address string.
    ///
    /// # Errors
    ///
    /// Returns `S7Error::InvalidAddress` if the string matches no notation,
    /// has a missing or non-numeric segment, or a bit offset above 7.
    ///
    /// # Example
    ///
    /// ```
    /// use s7comm_poller::{AddressForm, Area};
    ///
    /// let form = AddressForm::parse("MW16").unwrap();
    /// assert_eq!(
    ///     form,
    ///     AddressForm::IoShorthand { area: Area::Memory, byte_size: 2, byte_offset: 16 }
    /// );
    /// ```
    pub fn parse(address: &str) -> Result<Self> {
        if let Some(form) = match_io_shorthand(address) {
            return form;
        }
        if let Some(form) = match_data_block(address) {
            return form;
        }
        match_generic_bit(address)
    }

    /// Returns the memory area.
    pub fn area(&self) -> Area {
        match *self {
            AddressForm::IoShorthand { area, .. } | AddressForm::GenericBit { area, .. } => area,
            AddressForm::DataBlock { .. } => Area::DataBlock,
        }
    }

    /// Returns the data block number, 0 outside the DB area.
    pub fn db_number(&self) -> u16 {
        match *self {
            AddressForm::DataBlock { db_number, .. } => db_number,
            _ => 0,
        }
    }

    /// Returns the starting byte.
    pub fn byte_offset(&self) -> u16 {
        match *self {
            AddressForm::IoShorthand { byte_offset, .. }
            | AddressForm::DataBlock { byte_offset, .. }
            | AddressForm::GenericBit { byte_offset, .. } => byte_offset,
        }
    }

    /// Returns the number of bytes to fetch.
    pub fn byte_size(&self) -> usize {
        match *self {
            AddressForm::IoShorthand { byte_size, .. }
            | AddressForm::DataBlock { byte_size, .. } => byte_size,
            AddressForm::GenericBit { .. } => 1,
        }
    }

    /// Returns the bit offset for bit-addressed forms.
    pub fn bit_offset(&self) -> Option<u8> {
        match *self {
            AddressForm::IoShorthand { .. } => None,
            AddressForm::DataBlock { bit, .. } => bit,
            AddressForm::GenericBit { bit, .. } => Some(bit),
        }
    }
}

fn match_io_shorthand(address: &str) -> Option<Result<AddressForm>> {
    let prefix = address.get(..2)?;
    if !IO_SHORTHAND_PREFIXES.contains(&prefix) {
        return None;
    }
    let area = match prefix.as_bytes()[0] {
        b'E' | b'I' => Area::Input,
        b'A' | b'Q' => Area::Output,
        _ => Area::Memory,
    };
    let byte_size = match prefix.as_bytes()[1] {
        b'B' => 1,
        b'W' => 2,
        _ => 4,
    };
    Some(
        parse_number::<u16>(address, &address[2..], "byte offset").map(|byte_offset| {
            AddressForm::IoShorthand {
                area,
                byte_size,
                byte_offset,
            }
        }),
    )
}

fn match_data_block(address: &str) -> Option<Result<AddressForm>> {
    let rest = address.strip_prefix("DB")?;
    Some(parse_data_block(address, rest))
}

fn parse_data_block(address: &str, rest: &str) -> Result<AddressForm> {
    let mut segments = rest.split('.');
    let db_number = parse_number::<u16>(address, segments.next().unwrap_or(""), "block number")?;
    let field = segments
        .next()
        .ok_or_else(|| S7Error::invalid_address(address, "missing field segment"))?;
    let code = field
        .get(..3)
        .ok_or_else(|| S7Error::invalid_address(address, "field code too short"))?;
    let byte_size = match code {
        "DBB" | "DBX" => 1,
        "DBW" => 2,
        "DBD" => 4,
        other => {
            return Err(S7Error::invalid_address(
                address,
                format!("unknown field code '{}'", other),
            ))
        }
    };
    let byte_offset = parse_number::<u16>(address, &field[3..], "byte offset")?;

    let bit = if code == "DBX" {
        let bit_text = segments
            .next()
            .ok_or_else(|| S7Error::invalid_address(address, "missing bit segment"))?;
        Some(parse_bit(address, bit_text)?)
    } else {
        None
    };

    if segments.next().is_some() {
        return Err(S7Error::invalid_address(address, "unexpected trailing segment"));
    }

    Ok(AddressForm::DataBlock {
        db_number,
        byte_size,
        byte_offset,
        bit,
    })
}

fn match_generic_bit(address: &str) -> Result<AddressForm> {
    let area = match address.as_bytes().first() {
        Some(b'I') | Some(b'E') => Area::Input,
        Some(b'0') | Some(b'A') | Some(b'Q') => Area::Output,
        Some(b'M') => Area::Memory,
        _ => return Err(S7Error::invalid_address(address, "unknown area")),
    };
    let (byte_text, bit_text) = address[1..]
        .split_once('.')
        .ok_or_else(|| S7Error::invalid_address(address, "missing bit segment"))?;
    let byte_offset = parse_number::<u16>(address, byte_text, "byte offset")?;
    let bit = parse_bit(address, bit_text)?;
    Ok(AddressForm::GenericBit {
        area,
        byte_offset,
        bit,
    })
}

fn parse_bit(address: &str, text: &str) -> Result<u8> {
    let bit = parse_number::<u8>(address, text, "bit offset")?;
    if bit > MAX_BIT_OFFSET {
        return Err(S7Error::invalid_address(
            address,
            format!("bit offset {} must be 0-{}", bit, MAX_BIT_OFFSET),
        ));
    }
    Ok(bit)
}

fn parse_number<T: FromStr>(address: &str, text: &str, what: &str) -> Result<T> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(S7Error::invalid_address(
            address,
            format!("{} '{}' is not a decimal number", what, text),
        ));
    }
    text.parse::<T>()
        .map_err(|_| S7Error::invalid_address(address, format!("{} '{}' out of range", what, text)))
}

/// A configured point resolved to protocol coordinates and a decode kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPoint {
    /// Memory area.
    pub area: Area,
    /// Data block number, 0 outside the DB area.
    pub db_number: u16,
    /// Starting byte within the area or block.
    pub byte_offset: u16,
    /// Bytes to fetch (1, 2 or 4).
    pub byte_size: usize,
    /// Bit offset for bit-addressed forms.
    pub bit_offset: Option<u8>,
    /// How the fetched bytes are interpreted.
    pub kind: DecodeKind,
}

impl ResolvedPoint {
    /// Returns the bit used when decoding a boolean, 0 if none was addressed.
    pub fn decode_bit(&self) -> u8 {
        self.bit_offset.unwrap_or(0)
    }
}

impl std::fmt::Display for ResolvedPoint {
    /// Formats the point in canonical English notation.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = match self.byte_size {
            1 => 'B',
            2 => 'W',
            _ => 'D',
        };
        match (self.area, self.bit_offset) {
            (Area::DataBlock, Some(bit)) => {
                write!(f, "DB{}.DBX{}.{}", self.db_number, self.byte_offset, bit)
            }
            (Area::DataBlock, None) => {
                write!(f, "DB{}.DB{}{}", self.db_number, width, self.byte_offset)
            }
            (area, Some(bit)) => write!(f, "{}{}.{}", area, self.byte_offset, bit),
            (area, None) => write!(f, "{}{}{}", area, width, self.byte_offset),
        }
    }
}

/// Resolves an address string and declared type name into a [`ResolvedPoint`].
///
/// # Errors
///
/// - `S7Error::UnknownDataType` if the type name is not recognised
/// - `S7Error::InvalidAddress` if the address cannot be parsed, or a `bool`
///   is declared on an address without a bit offset
/// - `S7Error::WidthMismatch` if the address byte size differs from the
///   natural width of the declared type
///
/// # Example
///
/// ```
/// use s7comm_poller::{resolve, Area, DecodeKind};
///
/// let point = resolve("MW16", "int").unwrap();
/// assert_eq!(point.area, Area::Memory);
/// assert_eq!(point.byte_size, 2);
/// assert_eq!(point.kind, DecodeKind::Int16);
/// ```
pub fn resolve(address: &str, data_type: &str) -> Result<ResolvedPoint> {
    let data_type: DataType = data_type.parse()?;
    let form = AddressForm::parse(address)?;
    let kind = data_type.decode_kind();

    if form.byte_size() != kind.width() {
        return Err(S7Error::WidthMismatch {
            address: address.to_string(),
            data_type: data_type.to_string(),
            expected: kind.width(),
            actual: form.byte_size(),
        });
    }
    if kind == DecodeKind::Bool && form.bit_offset().is_none() {
        return Err(S7Error::invalid_address(
            address,
            "type 'bool' needs a bit address",
        ));
    }

    Ok(ResolvedPoint {
        area: form.area(),
        db_number: form.db_number(),
        byte_offset: form.byte_offset(),
        byte_size: form.byte_size(),
        bit_offset: form.bit_offset(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_reason(result: Result<ResolvedPoint>) -> String {
        match result {
            Err(S7Error::InvalidAddress { reason, .. }) => reason,
            other => panic!("expected InvalidAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_io_shorthand_areas() {
        let cases = [
            ("EB3", Area::Input, 1),
            ("IB3", Area::Input, 1),
            ("AW3", Area::Output, 2),
            ("QW3", Area::Output, 2),
            ("MD3", Area::Memory, 4),
            ("ID3", Area::Input, 4),
        ];
        for (address, area, size) in cases {
            let form = AddressForm::parse(address).unwrap();
            assert_eq!(form.area(), area, "{}", address);
            assert_eq!(form.byte_size(), size, "{}", address);
            assert_eq!(form.byte_offset(), 3);
            assert_eq!(form.db_number(), 0);
            assert_eq!(form.bit_offset(), None);
        }
    }

    #[test]
    fn test_memory_shorthand_resolves_to_memory_area() {
        let point = resolve("MW16", "word").unwrap();
        assert_eq!(point.area, Area::Memory);
        assert_eq!(point.area.code(), 0x83);
        assert_eq!(point.byte_offset, 16);
    }

    #[test]
    fn test_io_shorthand_rejects_bad_offset() {
        assert!(AddressForm::parse("MW").is_err());
        assert!(AddressForm::parse("IB0.1").is_err());
        assert!(AddressForm::parse("QWx").is_err());
    }

    #[test]
    fn test_data_block_bit_roundtrip() {
        for (db, byte, bit) in [(1u16, 10u16, 0u8), (42, 0, 7), (65535, 1234, 3)] {
            let address = format!("DB{}.DBX{}.{}", db, byte, bit);
            let point = resolve(&address, "bool").unwrap();
            assert_eq!(point.db_number, db);
            assert_eq!(point.byte_offset, byte);
            assert_eq!(point.bit_offset, Some(bit));
            assert_eq!(point.to_string(), address);
        }
    }

    #[test]
    fn test_data_block_bit_out_of_range() {
        let reason = invalid_reason(resolve("DB1.DBX10.8", "bool"));
        assert!(reason.contains("bit offset 8"));
        assert!(resolve("DB1.DBX10.-1", "bool").is_err());
    }

    #[test]
    fn test_data_block_sizes() {
        assert_eq!(resolve("DB1.DBB4", "byte").unwrap().byte_size, 1);
        assert_eq!(resolve("DB1.DBW4", "word").unwrap().byte_size, 2);
        assert_eq!(resolve("DB1.DBD4", "real").unwrap().byte_size, 4);
    }

    #[test]
    fn test_data_block_width_mismatch() {
        let result = resolve("DB1.DBB4", "word");
        assert!(matches!(
            result,
            Err(S7Error::WidthMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        assert!(resolve("DB1.DBW4", "dint").is_err());
        assert!(resolve("DB1.DBD4", "int").is_err());
    }

    #[test]
    fn test_data_block_missing_field_segment() {
        for data_type in ["bool", "byte", "word", "real"] {
            let reason = invalid_reason(resolve("DB1", data_type));
            assert_eq!(reason, "missing field segment");
        }
    }

    #[test]
    fn test_data_block_missing_bit_segment() {
        let reason = invalid_reason(resolve("DB1.DBX10", "bool"));
        assert_eq!(reason, "missing bit segment");
    }

    #[test]
    fn test_data_block_unknown_field_code() {
        let reason = invalid_reason(resolve("DB1.DBQ2", "byte"));
        assert!(reason.contains("unknown field code"));
        assert!(resolve("DB1.DB", "byte").is_err());
    }

    #[test]
    fn test_data_block_trailing_segment() {
        assert!(resolve("DB1.DBW0.1", "word").is_err());
    }

    #[test]
    fn test_generic_bit_forms() {
        let point = resolve("I0.1", "bool").unwrap();
        assert_eq!(point.area, Area::Input);
        assert_eq!(point.byte_offset, 0);
        assert_eq!(point.bit_offset, Some(1));

        assert_eq!(resolve("E2.0", "bool").unwrap().area, Area::Input);
        assert_eq!(resolve("A2.0", "bool").unwrap().area, Area::Output);
        assert_eq!(resolve("Q2.0", "bool").unwrap().area, Area::Output);
        assert_eq!(resolve("02.0", "bool").unwrap().area, Area::Output);
        assert_eq!(resolve("M10.7", "bool").unwrap().area, Area::Memory);
    }

    #[test]
    fn test_generic_bit_errors() {
        assert_eq!(invalid_reason(resolve("X1.0", "bool")), "unknown area");
        assert_eq!(invalid_reason(resolve("M10", "bool")), "missing bit segment");
        assert!(resolve("M10.9", "bool").is_err());
        assert!(resolve("", "bool").is_err());
    }

    #[test]
    fn test_generic_bit_with_byte_type_ignores_bit() {
        let point = resolve("I3.5", "byte").unwrap();
        assert_eq!(point.kind, DecodeKind::Byte);
        assert_eq!(point.byte_offset, 3);
        assert_eq!(point.byte_size, 1);
    }

    #[test]
    fn test_bool_requires_bit_address() {
        assert!(resolve("DB1.DBB0", "bool").is_err());
        assert!(resolve("MB0", "bool").is_err());
    }

    #[test]
    fn test_declared_type_mapping() {
        let cases = [
            ("byte", DecodeKind::Byte),
            ("word", DecodeKind::Word),
            ("dword", DecodeKind::DWord),
            ("int", DecodeKind::Int16),
            ("dint", DecodeKind::Int32),
            ("time", DecodeKind::Int32),
            ("uint", DecodeKind::UInt16),
            ("udint", DecodeKind::UInt32),
            ("real", DecodeKind::Float32),
            ("bool", DecodeKind::Bool),
        ];
        for (name, kind) in cases {
            let data_type: DataType = name.parse().unwrap();
            assert_eq!(data_type.decode_kind(), kind);
            assert_eq!(data_type.to_string(), name);
        }
        assert_eq!("time".parse::<DataType>().unwrap(), DataType::Time);
    }

    #[test]
    fn test_unknown_data_type() {
        let result = resolve("DB1.DBD0", "lreal");
        assert!(matches!(result, Err(S7Error::UnknownDataType(ref t)) if t == "lreal"));
        assert!(resolve("DB1.DBD0", "REAL").is_err());
    }

    #[test]
    fn test_area_letters_are_case_sensitive() {
        assert!(resolve("mw16", "word").is_err());
        assert!(resolve("db1.dbw0", "word").is_err());
    }

    #[test]
    fn test_display_canonical_notation() {
        assert_eq!(resolve("EW4", "word").unwrap().to_string(), "IW4");
        assert_eq!(resolve("AD8", "real").unwrap().to_string(), "QD8");
        assert_eq!(resolve("DB3.DBD12", "dint").unwrap().to_string(), "DB3.DBD12");
        assert_eq!(resolve("E1.2", "bool").unwrap().to_string(), "I1.2");
    }
}
