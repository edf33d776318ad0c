//! Core types for the Nexus travel assistant: layered configuration, the
//! response cache, intent domain types and the error taxonomy shared by the
//! agent, CLI and server crates.

pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;

pub use cache::{CacheEntry, CacheStats, Fingerprint, ResponseCache};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::intent::{Confidence, DetectedIntent, IntentCategory};
pub use errors::{ApplicationError, DomainError, InterfaceError};
