//! Domain model for firewall rule fragments and logical rules.
//!
//! # Responsibility
//! - Define record kinds, profiles and identity keys shared by every layer.
//! - Keep identity semantics in one place so proxies and aggregation agree.
//!
//! # Invariants
//! - Each record kind has exactly one identity extractor and one merge
//!   extractor (`Keyed`).

pub mod key;
pub mod profile;
pub mod record;
pub mod rule;
pub mod settings;
