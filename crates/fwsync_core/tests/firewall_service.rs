use fwsync_core::codec::IcmpTypeCode;
use fwsync_core::native::memory::MemoryFirewall;
use fwsync_core::native::{FirewallRoot, NativeError};
use fwsync_core::{
    Affinity, ApplicationRule, ContextCache, CoreConfig, ExecutionContext, FirewallService,
    FirewallServiceError, LogicalRule, PortRule, Profile, Protocol, StoreError,
};
use std::sync::Arc;

fn config_with_scratch(dir: &std::path::Path) -> CoreConfig {
    let document = serde_json::json!({
        "sentinel": {
            "scratch_dir": dir,
            "port_floor": 60000,
            "port_ceiling": 60010
        }
    });
    CoreConfig::from_json_str(&document.to_string()).expect("valid config")
}

#[test]
fn rule_lifecycle_through_the_service() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let config = config_with_scratch(scratch.path());
    let root = Arc::new(MemoryFirewall::with_all_profiles());
    let service = FirewallService::new(root.clone(), &config.sentinel).expect("open service");

    let app = LogicalRule::application(
        ApplicationRule::new("sync agent", "/opt/sync/agent"),
        [Profile::Domain, Profile::Private],
    );
    let port = LogicalRule::port(PortRule::new("sync", 60005, Protocol::Tcp), [Profile::Public]);
    service.add_rule(&app).expect("add application rule");
    service.add_rule(&port).expect("add port rule");

    let rules = service.rules().expect("list rules");
    assert_eq!(rules.len(), 2);
    assert!(service.contains_rule(&app).expect("contains application"));

    assert!(service.remove_rule(&app).expect("remove application"));
    assert!(service.remove_rule(&port).expect("remove port"));
    assert!(service.rules().expect("list rules").is_empty());
    assert!(root
        .application_store(Profile::Domain)
        .expect("domain")
        .is_empty());
    assert_eq!(std::fs::read_dir(scratch.path()).expect("scratch").count(), 0);
}

#[test]
fn unknown_profile_surfaces_as_store_error() {
    let root: Arc<dyn FirewallRoot> = Arc::new(MemoryFirewall::new(&[Profile::Domain]));
    let service =
        FirewallService::new(root, &CoreConfig::default().sentinel).expect("open service");
    let rule = LogicalRule::port(PortRule::new("x", 1, Protocol::Udp), [Profile::Private]);

    let err = service.add_rule(&rule).expect_err("private is not provisioned");
    assert!(matches!(
        err,
        FirewallServiceError::Store(StoreError::UnknownProfile {
            profile: Profile::Private,
            ..
        })
    ));
}

#[test]
fn profile_settings_roundtrip_through_native_flags() {
    let root = Arc::new(MemoryFirewall::with_all_profiles());
    let service =
        FirewallService::new(root.clone(), &CoreConfig::default().sentinel).expect("open service");

    let mut settings = service
        .profile_settings(Profile::Public)
        .expect("read settings");
    assert!(settings.firewall_enabled);
    assert!(settings.allowed_icmp_types.is_empty());

    settings.exceptions_not_allowed = true;
    settings.allowed_icmp_types.insert(IcmpTypeCode::any_code(8));
    service
        .set_profile_settings(Profile::Public, &settings)
        .expect("write settings");

    let native = root.profile_settings(Profile::Public).expect("native flags");
    assert!(native.exceptions_not_allowed);
    assert_eq!(native.allowed_icmp_types.as_deref(), Some("8:*"));
    assert_eq!(
        service.profile_settings(Profile::Public).expect("reread"),
        settings
    );
    assert!(
        !service
            .profile_settings(Profile::Domain)
            .expect("domain untouched")
            .exceptions_not_allowed
    );
}

#[test]
fn free_threaded_services_share_the_cached_root() {
    let cache = ContextCache::new();
    let sentinel = CoreConfig::default().sentinel;
    let connect = || -> Result<Arc<dyn FirewallRoot>, NativeError> {
        Ok(Arc::new(MemoryFirewall::with_all_profiles()))
    };

    let first_context = ExecutionContext::new(Affinity::FreeThreaded);
    let second_context = ExecutionContext::new(Affinity::FreeThreaded);
    let pinned_context = ExecutionContext::new(Affinity::SingleAffinity);

    let first = FirewallService::for_context(&cache, &first_context, &sentinel, connect)
        .expect("first service");
    let second = FirewallService::for_context(&cache, &second_context, &sentinel, connect)
        .expect("second service");
    let pinned = FirewallService::for_context(&cache, &pinned_context, &sentinel, connect)
        .expect("pinned service");

    assert!(Arc::ptr_eq(first.root(), second.root()));
    assert!(!Arc::ptr_eq(first.root(), pinned.root()));
}
