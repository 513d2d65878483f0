//! Remote address set text codec.
//!
//! # Responsibility
//! - Render address elements to their canonical native tokens.
//! - Parse comma-separated native address text back into elements.
//!
//! # Invariants
//! - The wildcard `*` is absorbing: any set containing it encodes to `*`.
//! - Decoding tries, per token: special name, single address, explicit range,
//!   network with mask or prefix. Tokens matching none are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};

/// Token used by the native store for "any address".
pub const WILDCARD_TOKEN: &str = "*";

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<start>[0-9A-Fa-f:.]+)\s*-\s*(?P<end>[0-9A-Fa-f:.]+)$")
        .expect("valid address range regex")
});
static NETWORK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<network>[0-9A-Fa-f:.]+)\s*/\s*(?P<mask>[0-9A-Fa-f:.]+)$")
        .expect("valid address network regex")
});

/// One element of a remote address restriction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    /// Unrestricted (`*`).
    Any,
    LocalSubnet,
    DnsServers,
    DhcpServers,
    WinsServers,
    DefaultGateway,
    /// One host address.
    Host(IpAddr),
    /// Inclusive address range; both ends share a family.
    Range { start: IpAddr, end: IpAddr },
    /// Network in prefix notation, e.g. `10.0.0.0/8`.
    Subnet { network: IpAddr, prefix_len: u8 },
    /// IPv4 network with dotted mask, e.g. `10.0.0.0/255.0.0.0`.
    Netmask { network: Ipv4Addr, mask: Ipv4Addr },
}

/// Canonically ordered, de-duplicated address restriction.
///
/// An empty set carries no restriction and is equivalent to `{Any}`.
pub type AddressSet = BTreeSet<Address>;

impl Address {
    /// Parses one token using the priority order documented on this module.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        if let Some(special) = parse_special(token) {
            return Some(special);
        }
        if let Ok(host) = token.parse::<IpAddr>() {
            return Some(Self::Host(host));
        }
        if let Some(range) = parse_range(token) {
            return Some(range);
        }
        parse_network(token)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

fn parse_special(token: &str) -> Option<Address> {
    let address = match token.to_ascii_lowercase().as_str() {
        WILDCARD_TOKEN | "any" => Address::Any,
        "localsubnet" | "local subnet" => Address::LocalSubnet,
        "dns" => Address::DnsServers,
        "dhcp" => Address::DhcpServers,
        "wins" => Address::WinsServers,
        "defaultgateway" | "default gateway" => Address::DefaultGateway,
        _ => return None,
    };
    Some(address)
}

fn parse_range(token: &str) -> Option<Address> {
    let captures = RANGE_RE.captures(token)?;
    let start = captures["start"].parse::<IpAddr>().ok()?;
    let end = captures["end"].parse::<IpAddr>().ok()?;
    if start.is_ipv4() != end.is_ipv4() || start > end {
        return None;
    }
    Some(Address::Range { start, end })
}

fn parse_network(token: &str) -> Option<Address> {
    let captures = NETWORK_RE.captures(token)?;
    let network = captures["network"].parse::<IpAddr>().ok()?;
    let mask = &captures["mask"];

    if let Ok(prefix_len) = mask.parse::<u8>() {
        let max = if network.is_ipv4() { 32 } else { 128 };
        return (prefix_len <= max).then_some(Address::Subnet {
            network,
            prefix_len,
        });
    }

    match (network, mask.parse::<Ipv4Addr>()) {
        (IpAddr::V4(network), Ok(mask)) => Some(Address::Netmask { network, mask }),
        _ => None,
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD_TOKEN),
            Self::LocalSubnet => f.write_str("LocalSubnet"),
            Self::DnsServers => f.write_str("DNS"),
            Self::DhcpServers => f.write_str("DHCP"),
            Self::WinsServers => f.write_str("WINS"),
            Self::DefaultGateway => f.write_str("DefaultGateway"),
            Self::Host(address) => write!(f, "{address}"),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
            Self::Subnet {
                network,
                prefix_len,
            } => write!(f, "{network}/{prefix_len}"),
            Self::Netmask { network, mask } => write!(f, "{network}/{mask}"),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Address::parse(&token)
            .ok_or_else(|| D::Error::custom(format!("unrecognized address token `{token}`")))
    }
}

/// Encodes an address set into native text.
///
/// Empty sets and sets containing the wildcard both encode to `*`.
pub fn encode_addresses(addresses: &AddressSet) -> String {
    if addresses.is_empty() || addresses.iter().any(Address::is_wildcard) {
        return WILDCARD_TOKEN.to_string();
    }
    addresses
        .iter()
        .map(Address::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes native address text. Unparseable tokens are dropped.
pub fn decode_addresses(value: &str) -> AddressSet {
    value.split(',').filter_map(Address::parse).collect()
}

/// Returns whether the set places no restriction on remote addresses.
pub fn is_unrestricted(addresses: &AddressSet) -> bool {
    addresses.is_empty() || addresses.contains(&Address::Any)
}

#[cfg(test)]
mod tests {
    use super::{decode_addresses, encode_addresses, is_unrestricted, Address, AddressSet};
    use std::net::{IpAddr, Ipv4Addr};

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn wildcard_absorbs_other_elements() {
        let set: AddressSet = [
            Address::Host(v4(10, 0, 0, 1)),
            Address::Any,
            Address::LocalSubnet,
        ]
        .into_iter()
        .collect();
        assert_eq!(encode_addresses(&set), "*");
    }

    #[test]
    fn renders_each_element_canonically() {
        let set: AddressSet = [
            Address::LocalSubnet,
            Address::Host(v4(192, 168, 1, 5)),
            Address::Range {
                start: v4(10, 0, 0, 1),
                end: v4(10, 0, 0, 9),
            },
            Address::Subnet {
                network: v4(172, 16, 0, 0),
                prefix_len: 12,
            },
            Address::Netmask {
                network: Ipv4Addr::new(10, 1, 0, 0),
                mask: Ipv4Addr::new(255, 255, 0, 0),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(
            encode_addresses(&set),
            "LocalSubnet,192.168.1.5,10.0.0.1-10.0.0.9,172.16.0.0/12,10.1.0.0/255.255.0.0"
        );
    }

    #[test]
    fn decode_uses_grammar_priority() {
        let decoded = decode_addresses("localsubnet, 10.0.0.1 ,10.0.0.1-10.0.0.3,10.0.0.0/8,10.0.0.0/255.0.0.0,::1");
        assert!(decoded.contains(&Address::LocalSubnet));
        assert!(decoded.contains(&Address::Host(v4(10, 0, 0, 1))));
        assert!(decoded.contains(&Address::Range {
            start: v4(10, 0, 0, 1),
            end: v4(10, 0, 0, 3),
        }));
        assert!(decoded.contains(&Address::Subnet {
            network: v4(10, 0, 0, 0),
            prefix_len: 8,
        }));
        assert!(decoded.contains(&Address::Netmask {
            network: Ipv4Addr::new(10, 0, 0, 0),
            mask: Ipv4Addr::new(255, 0, 0, 0),
        }));
        assert!(decoded.contains(&Address::Host("::1".parse().unwrap())));
        assert_eq!(decoded.len(), 6);
    }

    #[test]
    fn decode_drops_unparseable_tokens() {
        let decoded = decode_addresses("intranet,10.0.0.300,10.0.0.9-10.0.0.1,10.0.0.0/33,,DNS");
        assert_eq!(decoded.into_iter().collect::<Vec<_>>(), vec![Address::DnsServers]);
    }

    #[test]
    fn decode_rejects_mixed_family_range() {
        assert!(decode_addresses("10.0.0.1-::5").is_empty());
    }

    #[test]
    fn empty_set_is_unrestricted() {
        assert!(is_unrestricted(&AddressSet::new()));
        assert_eq!(encode_addresses(&AddressSet::new()), "*");
        assert!(is_unrestricted(&decode_addresses("*")));
        assert!(!is_unrestricted(&decode_addresses("DHCP")));
    }

    #[test]
    fn serde_uses_canonical_tokens() {
        let json = serde_json::to_string(&Address::Subnet {
            network: v4(10, 0, 0, 0),
            prefix_len: 8,
        })
        .unwrap();
        assert_eq!(json, "\"10.0.0.0/8\"");

        let parsed: Address = serde_json::from_str("\"defaultgateway\"").unwrap();
        assert_eq!(parsed, Address::DefaultGateway);
        assert!(serde_json::from_str::<Address>("\"nowhere\"").is_err());
    }
}
