//! Text codecs for composite rule attributes.
//!
//! # Responsibility
//! - Convert structured port, address, message-type and interface sets to the
//!   flat text the native store keeps, and back.
//! - Provide canonical encodings that double as identity key components.
//!
//! # Invariants
//! - Every codec is total: malformed tokens are dropped, never raised.
//! - Encoders are deterministic for equal input sets.

pub mod addresses;
pub mod icmp;
pub mod interfaces;
pub mod ports;

pub use addresses::{decode_addresses, encode_addresses, Address, AddressSet};
pub use icmp::{decode_icmp_types, encode_icmp_types, IcmpTypeCode};
pub use interfaces::{
    decode_interface_kinds, decode_interface_names, encode_interface_kinds,
    encode_interface_names, HostInterfaces, InterfaceCatalog, InterfaceKinds, StaticInterfaces,
};
pub use ports::{decode_ports, encode_ports};
