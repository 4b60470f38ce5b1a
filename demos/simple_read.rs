//! Example: Reading a handful of points from a PLC
//!
//! Run with: cargo run --example simple_read -- 192.168.10.57:102
//!
//! This example demonstrates:
//! - Resolving addresses in S7 notation
//! - Reading several points with one request
//! - Decoding the returned slots

use s7comm_poller::decode::{decode, slot_at};
use s7comm_poller::{resolve, Client, ClientConfig};

fn main() -> s7comm_poller::Result<()> {
    // =========================================================================
    // Connect to PLC
    // =========================================================================

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.10.57:102".to_string());
    let addr = addr
        .parse()
        .map_err(|e| s7comm_poller::S7Error::invalid_parameter("address", format!("{}", e)))?;
    let config = ClientConfig::new(addr, 0, 1);
    let mut client = Client::connect(&config)?;
    println!("Connected, PDU size {}", client.pdu_size());

    // =========================================================================
    // Read points of different areas and types
    // =========================================================================

    let specs = [
        ("DB1.DBW0", "int"),
        ("DB1.DBX10.0", "bool"),
        ("DB1.DBD2", "real"),
        ("MW16", "word"),
        ("I0.1", "bool"),
    ];
    let points = specs
        .iter()
        .map(|(address, data_type)| resolve(address, data_type))
        .collect::<s7comm_poller::Result<Vec<_>>>()?;

    let readout = client.read_multi(&points)?;
    for (i, point) in points.iter().enumerate() {
        match (&readout.item_errors[i], slot_at(&readout.data, i)) {
            (Some(e), _) => println!("{:<12} error: {}", point.to_string(), e),
            (None, Some(slot)) => {
                println!("{:<12} = {}", point.to_string(), decode(slot, point.kind, point.decode_bit()))
            }
            (None, None) => println!("{:<12} missing", point.to_string()),
        }
    }

    client.close()
}
