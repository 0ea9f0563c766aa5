//! FieldLens Core - Foundation crate for the FieldLens impact scanner.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the cache storage contracts that all other FieldLens crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Error taxonomy (`FieldLensError`, `ErrorCode`) and diagnostics
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Requests, results and the category vocabulary
//! - [`store`] - Cache store and clock traits, versioned cache keys
//!
//! # Example
//!
//! ```rust
//! use fieldlens_core::{AppConfig, ScanMode, ScanRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let request = ScanRequest::new(
//!     "https://acme.lightning.force.com",
//!     "Account",
//!     "Custom_Status__c",
//!     ScanMode::Quick,
//! )?;
//! assert_eq!(config.cache.ttl_secs, 600);
//! assert_eq!(request.qualified_field(), "Account.Custom_Status__c");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AppConfig, BrowserConfig, CacheConfig, LoggingConfig, ScanningConfig,
};
pub use error::{
    CandidateFailure, ConfigError, ConfigResult, ErrorCode, ErrorDebug, FieldLensError, Result,
    TransportStage, TransportTrace,
};
pub use store::{
    field_list_cache_key, scan_cache_key, CacheEntry, CacheStore, CachedPayload, Clock,
    ManualClock, MemoryCacheStore, SystemClock, CACHE_SCHEMA_VERSION,
};
pub use types::{
    AccessType, Category, FieldListPayload, FieldListRequest, FieldSummary, ImpactItem, OrgUrl,
    PermissionType, ScanMode, ScanRequest, ScanResult,
};
