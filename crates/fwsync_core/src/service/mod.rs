//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate rule-set and native root calls into use-case level APIs.
//! - Keep presentation layers decoupled from native store details.

pub mod firewall_service;

pub use firewall_service::{
    FirewallService, FirewallServiceError, FirewallServiceResult, RootHandle,
};
