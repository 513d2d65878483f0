use fwsync_core::native::memory::MemoryCollection;
use fwsync_core::native::{NativeApplication, NativeError, NativePort, SharedCollection};
use fwsync_core::repo::{ApplicationBinding, CollectionProxy, PortBinding};
use fwsync_core::{ApplicationRule, PortRule, Profile, Protocol, SentinelConfig, StoreError};
use std::sync::Arc;

fn app_proxy(
    collection: &Arc<MemoryCollection<NativeApplication>>,
    scratch_dir: &std::path::Path,
) -> CollectionProxy<ApplicationBinding> {
    let shared: SharedCollection<NativeApplication> = collection.clone();
    let config = SentinelConfig {
        scratch_dir: Some(scratch_dir.to_path_buf()),
        ..SentinelConfig::default()
    };
    CollectionProxy::new(Profile::Domain, shared, ApplicationBinding::new(&config))
}

fn port_proxy(collection: &Arc<MemoryCollection<NativePort>>) -> CollectionProxy<PortBinding> {
    let shared: SharedCollection<NativePort> = collection.clone();
    CollectionProxy::new(
        Profile::Private,
        shared,
        PortBinding::new(&SentinelConfig::default()),
    )
}

fn scratch_entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).expect("read scratch dir").count()
}

#[test]
fn add_then_enumerate_projects_records_back() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let collection = Arc::new(MemoryCollection::new());
    let proxy = app_proxy(&collection, scratch.path());

    let mut record = ApplicationRule::new("Editor", "/usr/bin/editor");
    record.enabled = false;
    proxy.add(&record).expect("add application");

    assert_eq!(proxy.records().expect("records"), vec![record.clone()]);
    assert!(proxy.contains(&record).expect("contains"));
    let other_case = ApplicationRule::new("Editor", "/USR/BIN/EDITOR");
    assert!(proxy.contains(&other_case).expect("case-folded identity"));
}

#[test]
fn guarded_removal_deletes_item_and_scratch_file() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let collection = Arc::new(MemoryCollection::new());
    let proxy = app_proxy(&collection, scratch.path());
    proxy
        .add(&ApplicationRule::new("tool", "/opt/tool"))
        .expect("add application");
    proxy
        .add(&ApplicationRule::new("other", "/opt/other"))
        .expect("add application");

    let removed = proxy
        .remove(&ApplicationRule::new("tool", "/opt/tool"))
        .expect("remove application");
    assert!(removed);
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.remove_calls(), 1);
    assert_eq!(scratch_entries(scratch.path()), 0);

    let remaining = proxy.records().expect("records");
    assert_eq!(remaining[0].image_path, "/opt/other");
}

#[test]
fn failed_native_removal_restores_identity_and_propagates() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let collection = Arc::new(MemoryCollection::new());
    let handle = collection.seed(NativeApplication {
        name: "agent".to_string(),
        process_image_file_name: "/srv/agent".to_string(),
        enabled: true,
        scope: 0,
        ip_version: 2,
        remote_addresses: "*".to_string(),
    });
    collection.fail_next_remove();
    let proxy = app_proxy(&collection, scratch.path());

    let err = proxy
        .remove(&ApplicationRule::new("agent", "/srv/agent"))
        .expect_err("injected native failure");
    assert!(matches!(err, StoreError::Native(NativeError::Rejected { .. })));
    assert_eq!(handle.snapshot().process_image_file_name, "/srv/agent");
    assert_eq!(collection.len(), 1);
    assert_eq!(scratch_entries(scratch.path()), 0);

    assert!(proxy
        .remove(&ApplicationRule::new("agent", "/srv/agent"))
        .expect("second attempt succeeds"));
    assert!(collection.is_empty());
}

#[test]
fn port_removal_leaves_other_protocol_untouched() {
    let collection = Arc::new(MemoryCollection::new());
    let proxy = port_proxy(&collection);
    proxy
        .add(&PortRule::new("dns tcp", 53, Protocol::Tcp))
        .expect("add tcp");
    proxy
        .add(&PortRule::new("dns udp", 53, Protocol::Udp))
        .expect("add udp");

    assert!(proxy
        .remove(&PortRule::new("dns", 53, Protocol::Udp))
        .expect("remove udp"));
    let records = proxy.records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].protocol, Protocol::Tcp);
    assert_eq!(records[0].port, 53);
}

#[test]
fn unknown_protocol_is_a_projection_error() {
    let collection = Arc::new(MemoryCollection::new());
    collection.seed(NativePort {
        name: "gre".to_string(),
        port: 0,
        protocol: 47,
        ..NativePort::default()
    });
    let proxy = port_proxy(&collection);
    assert!(matches!(proxy.records(), Err(StoreError::Projection(_))));
}
