//! Record <-> native projections and removal sentinels, one per kind.
//!
//! # Responsibility
//! - Convert records to flat native attributes and back.
//! - Read and overwrite the native identity fields used by keyed removal.
//! - Choose a temporary identity that collides with no live item.
//!
//! # Invariants
//! - `from_native` rejects values it cannot represent instead of guessing.
//! - A sentinel never equals the identity of any live item in the collection.

use super::error::{StoreError, StoreResult};
use crate::codec::addresses::{decode_addresses, encode_addresses, is_unrestricted, AddressSet};
use crate::config::SentinelConfig;
use crate::model::key::Keyed;
use crate::model::record::{
    ApplicationRule, IpVersion, PortRule, Protocol, Scope, ServiceRule, ServiceType,
};
use crate::model::rule::RuleKind;
use crate::native::{NativeApplication, NativePort, NativeService};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Debug;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Temporary identity plus whatever resource backs it.
///
/// `scratch` is released only after the original identity is restored.
#[derive(Debug)]
pub struct Sentinel<I, S> {
    pub identity: I,
    pub scratch: S,
}

/// Projection pair, identity access and sentinel policy for one record kind.
pub trait RecordBinding: Send + Sync {
    type Native: Clone + Send + 'static;
    type Record: Keyed + Clone;
    /// Native fields removal is keyed on.
    type Identity: Clone + Debug;
    type Scratch;

    const KIND: RuleKind;

    fn to_native(&self, record: &Self::Record) -> Self::Native;
    fn from_native(&self, native: &Self::Native) -> StoreResult<Self::Record>;
    fn identity(&self, native: &Self::Native) -> Self::Identity;
    fn set_identity(&self, native: &mut Self::Native, identity: &Self::Identity);
    fn sentinel(
        &self,
        target: &Self::Native,
        live: &[Self::Native],
    ) -> StoreResult<Sentinel<Self::Identity, Self::Scratch>>;
}

fn scope_to_native(scope: Scope) -> i32 {
    match scope {
        Scope::All => 0,
        Scope::LocalSubnet => 1,
        Scope::Custom => 2,
    }
}

fn scope_from_native(value: i32) -> StoreResult<Scope> {
    match value {
        0 => Ok(Scope::All),
        1 => Ok(Scope::LocalSubnet),
        2 => Ok(Scope::Custom),
        other => Err(StoreError::Projection(format!("unknown scope value {other}"))),
    }
}

fn ip_version_to_native(version: IpVersion) -> i32 {
    match version {
        IpVersion::V4 => 0,
        IpVersion::V6 => 1,
        IpVersion::Any => 2,
    }
}

fn ip_version_from_native(value: i32) -> StoreResult<IpVersion> {
    match value {
        0 => Ok(IpVersion::V4),
        1 => Ok(IpVersion::V6),
        2 => Ok(IpVersion::Any),
        other => Err(StoreError::Projection(format!(
            "unknown ip version value {other}"
        ))),
    }
}

/// Unrestricted text projects to the empty set, the canonical "any".
fn remote_from_native(value: &str) -> AddressSet {
    let addresses = decode_addresses(value);
    if is_unrestricted(&addresses) {
        AddressSet::new()
    } else {
        addresses
    }
}

fn protocol_from_native(value: i32) -> StoreResult<Protocol> {
    Protocol::from_number(value)
        .ok_or_else(|| StoreError::Projection(format!("unsupported protocol number {value}")))
}

/// Authorized applications; removal is keyed on the image file name.
///
/// The sentinel is a freshly created scratch file, since the native store may
/// require the named image to exist.
#[derive(Debug, Clone)]
pub struct ApplicationBinding {
    scratch_dir: PathBuf,
}

impl ApplicationBinding {
    pub fn new(config: &SentinelConfig) -> Self {
        Self {
            scratch_dir: config.scratch_dir(),
        }
    }
}

impl RecordBinding for ApplicationBinding {
    type Native = NativeApplication;
    type Record = ApplicationRule;
    type Identity = String;
    type Scratch = NamedTempFile;

    const KIND: RuleKind = RuleKind::Application;

    fn to_native(&self, record: &ApplicationRule) -> NativeApplication {
        NativeApplication {
            name: record.name.clone(),
            process_image_file_name: record.image_path.clone(),
            enabled: record.enabled,
            scope: scope_to_native(record.scope),
            ip_version: ip_version_to_native(record.ip_version),
            remote_addresses: encode_addresses(&record.remote_addresses),
        }
    }

    fn from_native(&self, native: &NativeApplication) -> StoreResult<ApplicationRule> {
        if native.process_image_file_name.trim().is_empty() {
            return Err(StoreError::Projection(
                "application without image file name".to_string(),
            ));
        }
        Ok(ApplicationRule {
            name: native.name.clone(),
            image_path: native.process_image_file_name.clone(),
            enabled: native.enabled,
            scope: scope_from_native(native.scope)?,
            ip_version: ip_version_from_native(native.ip_version)?,
            remote_addresses: remote_from_native(&native.remote_addresses),
        })
    }

    fn identity(&self, native: &NativeApplication) -> String {
        native.process_image_file_name.clone()
    }

    fn set_identity(&self, native: &mut NativeApplication, identity: &String) {
        native.process_image_file_name.clone_from(identity);
    }

    fn sentinel(
        &self,
        _target: &NativeApplication,
        live: &[NativeApplication],
    ) -> StoreResult<Sentinel<String, NamedTempFile>> {
        let prefix = format!("fwsync-sentinel-{}-", Uuid::new_v4().simple());
        let scratch = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".exe")
            .tempfile_in(&self.scratch_dir)
            .map_err(|err| {
                StoreError::SentinelUnavailable(format!(
                    "cannot create scratch file in `{}`: {err}",
                    self.scratch_dir.display()
                ))
            })?;
        let identity = scratch
            .path()
            .to_str()
            .ok_or_else(|| {
                StoreError::SentinelUnavailable("scratch path is not valid UTF-8".to_string())
            })?
            .to_string();

        let folded = identity.to_lowercase();
        if live
            .iter()
            .any(|item| item.process_image_file_name.to_lowercase() == folded)
        {
            return Err(StoreError::SentinelUnavailable(
                "scratch path collides with a live application".to_string(),
            ));
        }
        Ok(Sentinel { identity, scratch })
    }
}

/// Opened ports; removal is keyed on (port, protocol).
///
/// The sentinel moves the port to the highest free port of the configured
/// range, keeping the protocol.
#[derive(Debug, Clone)]
pub struct PortBinding {
    floor: u16,
    ceiling: u16,
}

impl PortBinding {
    pub fn new(config: &SentinelConfig) -> Self {
        Self {
            floor: config.port_floor.max(1),
            ceiling: config.port_ceiling,
        }
    }
}

impl RecordBinding for PortBinding {
    type Native = NativePort;
    type Record = PortRule;
    type Identity = (u16, i32);
    type Scratch = ();

    const KIND: RuleKind = RuleKind::Port;

    fn to_native(&self, record: &PortRule) -> NativePort {
        NativePort {
            name: record.name.clone(),
            port: record.port,
            protocol: record.protocol.number(),
            enabled: record.enabled,
            built_in: record.built_in,
            scope: scope_to_native(record.scope),
            ip_version: ip_version_to_native(record.ip_version),
            remote_addresses: encode_addresses(&record.remote_addresses),
        }
    }

    fn from_native(&self, native: &NativePort) -> StoreResult<PortRule> {
        Ok(PortRule {
            name: native.name.clone(),
            port: native.port,
            protocol: protocol_from_native(native.protocol)?,
            enabled: native.enabled,
            built_in: native.built_in,
            scope: scope_from_native(native.scope)?,
            ip_version: ip_version_from_native(native.ip_version)?,
            remote_addresses: remote_from_native(&native.remote_addresses),
        })
    }

    fn identity(&self, native: &NativePort) -> (u16, i32) {
        (native.port, native.protocol)
    }

    fn set_identity(&self, native: &mut NativePort, identity: &(u16, i32)) {
        (native.port, native.protocol) = *identity;
    }

    fn sentinel(
        &self,
        target: &NativePort,
        live: &[NativePort],
    ) -> StoreResult<Sentinel<(u16, i32), ()>> {
        let taken: HashSet<u16> = live
            .iter()
            .filter(|item| item.protocol == target.protocol)
            .map(|item| item.port)
            .collect();
        let port = (self.floor..=self.ceiling)
            .rev()
            .find(|port| !taken.contains(port))
            .ok_or_else(|| {
                StoreError::SentinelUnavailable(format!(
                    "every port in {}..={} is in use",
                    self.floor, self.ceiling
                ))
            })?;
        Ok(Sentinel {
            identity: (port, target.protocol),
            scratch: (),
        })
    }
}

/// Built-in services; the store provisions them and never removes them.
#[derive(Debug, Clone, Default)]
pub struct ServiceBinding;

impl RecordBinding for ServiceBinding {
    type Native = NativeService;
    type Record = ServiceRule;
    type Identity = i32;
    type Scratch = ();

    const KIND: RuleKind = RuleKind::Service;

    fn to_native(&self, record: &ServiceRule) -> NativeService {
        let ports = |ports: &BTreeSet<u16>, protocol: Protocol| {
            ports
                .iter()
                .map(move |port| NativePort {
                    name: format!("{} {protocol} {port}", record.name),
                    port: *port,
                    protocol: protocol.number(),
                    enabled: record.enabled,
                    built_in: true,
                    scope: scope_to_native(record.scope),
                    ip_version: ip_version_to_native(record.ip_version),
                    remote_addresses: encode_addresses(&record.remote_addresses),
                })
                .collect::<Vec<_>>()
        };
        let mut globally_open_ports = ports(&record.tcp_ports, Protocol::Tcp);
        globally_open_ports.extend(ports(&record.udp_ports, Protocol::Udp));

        NativeService {
            name: record.name.clone(),
            service_type: record.service_type.code(),
            enabled: record.enabled,
            customized: record.customized,
            scope: scope_to_native(record.scope),
            ip_version: ip_version_to_native(record.ip_version),
            remote_addresses: encode_addresses(&record.remote_addresses),
            globally_open_ports,
        }
    }

    fn from_native(&self, native: &NativeService) -> StoreResult<ServiceRule> {
        let service_type = ServiceType::from_code(native.service_type).ok_or_else(|| {
            StoreError::Projection(format!("unknown service type {}", native.service_type))
        })?;
        let mut tcp_ports = BTreeSet::new();
        let mut udp_ports = BTreeSet::new();
        for port in &native.globally_open_ports {
            match protocol_from_native(port.protocol)? {
                Protocol::Tcp => tcp_ports.insert(port.port),
                Protocol::Udp => udp_ports.insert(port.port),
            };
        }
        Ok(ServiceRule {
            name: native.name.clone(),
            service_type,
            enabled: native.enabled,
            customized: native.customized,
            scope: scope_from_native(native.scope)?,
            ip_version: ip_version_from_native(native.ip_version)?,
            remote_addresses: remote_from_native(&native.remote_addresses),
            tcp_ports,
            udp_ports,
        })
    }

    fn identity(&self, native: &NativeService) -> i32 {
        native.service_type
    }

    fn set_identity(&self, native: &mut NativeService, identity: &i32) {
        native.service_type = *identity;
    }

    fn sentinel(
        &self,
        _target: &NativeService,
        _live: &[NativeService],
    ) -> StoreResult<Sentinel<i32, ()>> {
        Err(StoreError::Unsupported("service removal"))
    }
}
