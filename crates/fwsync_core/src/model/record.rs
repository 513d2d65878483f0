//! Rule fragment records as seen by core.
//!
//! # Responsibility
//! - Define one record shape per fragment kind (application, port, service).
//! - Provide the canonical identity and merge key extractors for each kind.
//!
//! # Invariants
//! - Records never carry their profile; the owning collection implies it.
//! - `identity_key` matches what the native store is unique on per profile.
//! - `merge_key` covers every attribute, using codec canonical text for
//!   composite attributes so equal sets always produce equal keys.

use crate::codec::addresses::{encode_addresses, AddressSet};
use crate::codec::ports::encode_ports;
use crate::model::key::{CompositeKey, Keyed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Remote scope selector stored next to the address list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    LocalSubnet,
    Custom,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::LocalSubnet => "local_subnet",
            Self::Custom => "custom",
        }
    }
}

/// IP family a fragment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpVersion {
    V4,
    V6,
    #[default]
    Any,
}

impl IpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V4 => "v4",
            Self::V6 => "v6",
            Self::Any => "any",
        }
    }
}

/// Transport protocol of a port fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// IANA protocol number used by the native store.
    pub fn number(self) -> i32 {
        match self {
            Self::Tcp => 6,
            Self::Udp => 17,
        }
    }

    pub fn from_number(value: i32) -> Option<Self> {
        match value {
            6 => Some(Self::Tcp),
            17 => Some(Self::Udp),
            _ => None,
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        })
    }
}

/// Built-in service groups the native store manages itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    FileAndPrint,
    Upnp,
    RemoteDesktop,
}

impl ServiceType {
    pub fn code(self) -> i32 {
        match self {
            Self::FileAndPrint => 0,
            Self::Upnp => 1,
            Self::RemoteDesktop => 2,
        }
    }

    pub fn from_code(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::FileAndPrint),
            1 => Some(Self::Upnp),
            2 => Some(Self::RemoteDesktop),
            _ => None,
        }
    }
}

/// Program-scoped exception: traffic allowed for one executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRule {
    pub name: String,
    /// Executable path; compared case-insensitively.
    pub image_path: String,
    pub enabled: bool,
    pub scope: Scope,
    pub ip_version: IpVersion,
    pub remote_addresses: AddressSet,
}

impl ApplicationRule {
    pub fn new(name: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_path: image_path.into(),
            enabled: true,
            scope: Scope::All,
            ip_version: IpVersion::Any,
            remote_addresses: AddressSet::new(),
        }
    }
}

impl Keyed for ApplicationRule {
    fn identity_key(&self) -> CompositeKey {
        CompositeKey::new().folded(&self.image_path)
    }

    fn merge_key(&self) -> CompositeKey {
        CompositeKey::new()
            .folded(&self.image_path)
            .text(self.name.as_str())
            .flag(self.enabled)
            .text(self.scope.as_str())
            .text(self.ip_version.as_str())
            .text(encode_addresses(&self.remote_addresses))
    }
}

/// Port-scoped exception: traffic allowed on one port/protocol pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRule {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub enabled: bool,
    /// Set by the native store for ports it ships with.
    pub built_in: bool,
    pub scope: Scope,
    pub ip_version: IpVersion,
    pub remote_addresses: AddressSet,
}

impl PortRule {
    pub fn new(name: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            port,
            protocol,
            enabled: true,
            built_in: false,
            scope: Scope::All,
            ip_version: IpVersion::Any,
            remote_addresses: AddressSet::new(),
        }
    }
}

impl Keyed for PortRule {
    fn identity_key(&self) -> CompositeKey {
        CompositeKey::new()
            .int(self.port)
            .int(self.protocol.number())
    }

    fn merge_key(&self) -> CompositeKey {
        CompositeKey::new()
            .int(self.port)
            .int(self.protocol.number())
            .text(self.name.as_str())
            .flag(self.enabled)
            .flag(self.built_in)
            .text(self.scope.as_str())
            .text(self.ip_version.as_str())
            .text(encode_addresses(&self.remote_addresses))
    }
}

/// Built-in service exception with its globally opened ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRule {
    pub name: String,
    pub service_type: ServiceType,
    pub enabled: bool,
    /// Set when the user changed the store's defaults.
    pub customized: bool,
    pub scope: Scope,
    pub ip_version: IpVersion,
    pub remote_addresses: AddressSet,
    pub tcp_ports: BTreeSet<u16>,
    pub udp_ports: BTreeSet<u16>,
}

impl Keyed for ServiceRule {
    fn identity_key(&self) -> CompositeKey {
        CompositeKey::new().int(self.service_type.code())
    }

    fn merge_key(&self) -> CompositeKey {
        CompositeKey::new()
            .int(self.service_type.code())
            .text(self.name.as_str())
            .flag(self.enabled)
            .flag(self.customized)
            .text(self.scope.as_str())
            .text(self.ip_version.as_str())
            .text(encode_addresses(&self.remote_addresses))
            .text(encode_ports(self.tcp_ports.iter().copied()))
            .text(encode_ports(self.udp_ports.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationRule, PortRule, Protocol, ServiceType};
    use crate::codec::addresses::decode_addresses;
    use crate::model::key::Keyed;

    #[test]
    fn application_identity_ignores_path_case() {
        let a = ApplicationRule::new("Editor", r"C:\Apps\Editor.exe");
        let mut b = ApplicationRule::new("Editor (copy)", r"c:\apps\editor.exe");
        b.enabled = false;
        assert_eq!(a.identity_key(), b.identity_key());
        assert_ne!(a.merge_key(), b.merge_key());
    }

    #[test]
    fn port_merge_key_uses_canonical_addresses() {
        let mut a = PortRule::new("web", 443, Protocol::Tcp);
        a.remote_addresses = decode_addresses("10.0.0.1,LocalSubnet");
        let mut b = PortRule::new("web", 443, Protocol::Tcp);
        b.remote_addresses = decode_addresses(" localsubnet ,10.0.0.1,bogus");
        assert_eq!(a.merge_key(), b.merge_key());
    }

    #[test]
    fn protocol_and_service_codes_roundtrip() {
        for protocol in [Protocol::Tcp, Protocol::Udp] {
            assert_eq!(Protocol::from_number(protocol.number()), Some(protocol));
        }
        assert_eq!(Protocol::from_number(47), None);
        for service in [
            ServiceType::FileAndPrint,
            ServiceType::Upnp,
            ServiceType::RemoteDesktop,
        ] {
            assert_eq!(ServiceType::from_code(service.code()), Some(service));
        }
    }
}
