//! # S7comm Poller
//!
//! A Rust library and daemon that reads typed values from Siemens S7 PLCs over
//! S7comm (ISO-on-TCP, port 102) and republishes them as metric records.
//!
//! The core turns human-written addresses such as `DB1.DBX10.0` or `MW16`
//! into protocol coordinates, batches them into multi-item read requests,
//! decodes the returned bytes into typed values and hands one field map per
//! metric to a sink.
//!
//! ## Features
//!
//! - **Address resolution** - I/O shorthand, data block and bit notations,
//!   English and German mnemonics
//! - **Batched reads** - up to 18 items per ReadVar request
//! - **Isolated failures** - a bad address, a failed batch or a failed item
//!   never aborts a cycle
//! - **No panics** - all errors returned as `Result<T, S7Error>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use s7comm_poller::{Client, Config, JsonLinesSink, Poller};
//!
//! fn main() -> s7comm_poller::Result<()> {
//!     let config = Config::from_toml_str(r#"
//!         plc_ip = "192.168.10.57"
//!         plc_slot = 2
//!
//!         [[nodes]]
//!         metric = "press"
//!         name = "pressure"
//!         address = "DB1.DBD2"
//!         type = "real"
//!     "#)?;
//!
//!     let poller = Poller::new(&config.nodes, config.max_items_per_request)?;
//!     let mut client = Client::connect(&config.client_config()?)?;
//!     let mut sink = JsonLinesSink::new(std::io::stdout());
//!
//!     let report = poller.run_cycle(&mut client, &mut sink);
//!     println!("{} records", report.groups_emitted);
//!     client.close()
//! }
//! ```
//!
//! ## Memory Areas
//!
//! | Area | Notation | Code |
//! |------|----------|:----:|
//! | [`Area::Input`] | `IB0`, `EW2`, `I0.1` | 0x81 |
//! | [`Area::Output`] | `QB0`, `AW2`, `Q0.1` | 0x82 |
//! | [`Area::Memory`] | `MB0`, `MD4`, `M10.7` | 0x83 |
//! | [`Area::DataBlock`] | `DB1.DBW0`, `DB1.DBX10.0` | 0x84 |
//!
//! ## Resolving Addresses
//!
//! ```
//! use s7comm_poller::{resolve, Area, DecodeKind};
//!
//! let point = resolve("DB5.DBD8", "real")?;
//! assert_eq!(point.area, Area::DataBlock);
//! assert_eq!(point.db_number, 5);
//! assert_eq!(point.kind, DecodeKind::Float32);
//! # Ok::<(), s7comm_poller::S7Error>(())
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use s7comm_poller::{resolve, Client, ClientConfig, S7Error};
//!
//! let config = ClientConfig::new("192.168.10.57:102".parse().unwrap(), 0, 1);
//! let mut client = Client::connect(&config)?;
//!
//! match client.read_multi(&[resolve("DB1.DBW0", "int")?]) {
//!     Ok(readout) => println!("{:?}", readout.data),
//!     Err(S7Error::Timeout) => println!("Communication timeout"),
//!     Err(S7Error::PlcError { error_class, error_code }) => {
//!         println!("PLC error: class=0x{:02X}, code=0x{:02X}", error_class, error_code);
//!     }
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), S7Error>(())
//! ```
//!
//! ## Design Philosophy
//!
//! Addresses are resolved once, when the poller is built. Each cycle runs to
//! completion on one session before the next starts; reconnection and cadence
//! belong to the host loop.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod address;
mod area;
mod client;
mod command;
mod config;
pub mod decode;
mod error;
mod frame;
pub mod plan;
mod poller;
mod response;
mod schedule;
mod sink;
mod transport;

// Public re-exports
pub use address::{resolve, AddressForm, DataType, ResolvedPoint, MAX_BIT_OFFSET};
pub use area::Area;
pub use client::{
    Client, ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_S7_PORT,
};
pub use command::{
    remote_tsap, ConnectionRequest, ReadItem, ReadVarRequest, SetupCommunication, LOCAL_TSAP,
    REQUESTED_PDU_SIZE,
};
pub use config::{Config, NodeSpec, MAX_RACK, MAX_SLOT};
pub use decode::{DecodeKind, Value};
pub use error::{item_error_description, Result, S7Error};
pub use frame::{PduType, S7Header};
pub use plan::MAX_ITEMS_PER_REQUEST;
pub use poller::{BatchReadout, CycleReport, FieldMap, Poller, ReadBatch, ResolvedGroup};
pub use response::{ConnectionConfirm, DataItem, ReadVarResponse, SetupCommunicationAck};
pub use schedule::TickSchedule;
pub use sink::{JsonLinesSink, MetricSink};
pub use transport::{Exchange, TcpTransport, MAX_PACKET_SIZE};
