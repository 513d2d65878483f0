//! Interface restriction codecs.
//!
//! # Responsibility
//! - Convert the interface-kind bitmask to and from its native text.
//! - Resolve named interface lists against the interfaces present on the host.
//!
//! # Invariants
//! - All three kinds set encodes to the literal `All`.
//! - Empty or wholly unrecognized kind text decodes to all kinds.
//! - An empty named list is absent (`None`), meaning every interface.

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const ALL_TOKEN: &str = "All";
const LAN_TOKEN: &str = "Lan";
const WIRELESS_TOKEN: &str = "Wireless";
const REMOTE_ACCESS_TOKEN: &str = "RemoteAccess";

/// Bitmask of interface kinds a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterfaceKinds(u8);

impl InterfaceKinds {
    pub const NONE: Self = Self(0);
    pub const LAN: Self = Self(0b001);
    pub const WIRELESS: Self = Self(0b010);
    pub const REMOTE_ACCESS: Self = Self(0b100);
    pub const ALL: Self = Self(0b111);

    /// Canonical encoding order.
    const NAMED: [(InterfaceKinds, &'static str); 3] = [
        (Self::LAN, LAN_TOKEN),
        (Self::WIRELESS, WIRELESS_TOKEN),
        (Self::REMOTE_ACCESS, REMOTE_ACCESS_TOKEN),
    ];

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Builds a mask, ignoring bits outside the three known kinds.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for InterfaceKinds {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Display for InterfaceKinds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&encode_interface_kinds(*self))
    }
}

/// Encodes a kind mask; all kinds yields `All`.
pub fn encode_interface_kinds(kinds: InterfaceKinds) -> String {
    if kinds.contains(InterfaceKinds::ALL) {
        return ALL_TOKEN.to_string();
    }
    InterfaceKinds::NAMED
        .iter()
        .filter(|(flag, _)| kinds.contains(*flag))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes native kind text, case-insensitively.
///
/// Unspecified means unrestricted: empty or entirely unrecognized input yields
/// `InterfaceKinds::ALL`, never an empty mask.
pub fn decode_interface_kinds(value: &str) -> InterfaceKinds {
    let mut kinds = InterfaceKinds::NONE;
    for token in value.split(',').map(str::trim) {
        if token.eq_ignore_ascii_case(ALL_TOKEN) {
            return InterfaceKinds::ALL;
        }
        if let Some((flag, _)) = InterfaceKinds::NAMED
            .iter()
            .find(|(_, name)| token.eq_ignore_ascii_case(name))
        {
            kinds.insert(*flag);
        }
    }

    if kinds.is_empty() {
        InterfaceKinds::ALL
    } else {
        kinds
    }
}

/// Source of interface names currently present on the host.
pub trait InterfaceCatalog {
    fn interface_names(&self) -> Vec<String>;
}

/// Interface catalog backed by `/sys/class/net` (empty where unavailable).
#[derive(Debug, Clone)]
pub struct HostInterfaces {
    root: PathBuf,
}

impl HostInterfaces {
    pub fn new() -> Self {
        Self::with_root("/sys/class/net")
    }

    /// Reads interface names from a custom directory with one entry per
    /// interface.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl Default for HostInterfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceCatalog for HostInterfaces {
    fn interface_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            log::debug!(
                "event=interface_catalog module=codec status=unavailable root={}",
                self.root.display()
            );
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

/// Fixed interface list, for callers that already know the host inventory.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<String>);

impl InterfaceCatalog for StaticInterfaces {
    fn interface_names(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Encodes a named interface list; empty means "all interfaces" (`None`).
pub fn encode_interface_names(names: &[String]) -> Option<Vec<String>> {
    if names.is_empty() {
        None
    } else {
        Some(names.to_vec())
    }
}

/// Resolves native interface names against the host catalog.
///
/// Matching is trimmed and case-insensitive; the host's spelling is returned.
/// Names with no current match are dropped.
pub fn decode_interface_names(
    names: Option<&[String]>,
    catalog: &dyn InterfaceCatalog,
) -> Vec<String> {
    let Some(names) = names else {
        return Vec::new();
    };
    let live = catalog.interface_names();
    let mut resolved: Vec<String> = Vec::new();
    for name in names {
        let wanted = name.trim();
        let Some(found) = live.iter().find(|live| live.trim().eq_ignore_ascii_case(wanted)) else {
            continue;
        };
        if !resolved.contains(found) {
            resolved.push(found.clone());
        }
    }
    resolved
}
