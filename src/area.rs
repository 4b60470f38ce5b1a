//! Memory area definitions for the S7 protocol.
//!
//! This module defines the [`Area`] enum which represents the memory areas
//! that can be read through an S7 `ReadVar` job.
//!
//! # Areas Overview
//!
//! | Area | Mnemonic | Description | Code |
//! |------|----------|-------------|:----:|
//! | Input | I / E | Process image of inputs | 0x81 |
//! | Output | Q / A | Process image of outputs | 0x82 |
//! | Memory | M | Flags (Merker) | 0x83 |
//! | DataBlock | DB | Data blocks | 0x84 |
//!
//! # Example
//!
//! ```
//! use s7comm_poller::Area;
//!
//! assert_eq!(Area::DataBlock.code(), 0x84);
//! assert_eq!(Area::from_code(0x83), Some(Area::Memory));
//! assert_eq!(Area::Input.to_string(), "I");
//! ```

/// Memory areas addressable by the poller.
///
/// Only [`Area::DataBlock`] uses a block number; all other areas are flat
/// and always addressed with block number 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Process image of inputs (`I`, German `E`).
    Input,
    /// Process image of outputs (`Q`, German `A`).
    Output,
    /// Flag memory (`M`).
    Memory,
    /// Data block memory (`DB`).
    DataBlock,
}

impl Area {
    /// Returns the S7 area code sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            Area::Input => 0x81,
            Area::Output => 0x82,
            Area::Memory => 0x83,
            Area::DataBlock => 0x84,
        }
    }

    /// Maps a wire area code back to an [`Area`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x81 => Some(Area::Input),
            0x82 => Some(Area::Output),
            0x83 => Some(Area::Memory),
            0x84 => Some(Area::DataBlock),
            _ => None,
        }
    }

    /// Returns whether reads in this area carry a block number.
    pub fn uses_block_number(self) -> bool {
        matches!(self, Area::DataBlock)
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Area::Input => write!(f, "I"),
            Area::Output => write!(f, "Q"),
            Area::Memory => write!(f, "M"),
            Area::DataBlock => write!(f, "DB"),
        }
    }
}
