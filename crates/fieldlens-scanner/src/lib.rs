//! FieldLens Scanner - Impact scan orchestration.
//!
//! Turns an `(object, field, mode)` request into one consolidated result by
//! fanning out best-effort queries across an API whose schema varies per org.
//!
//! # Features
//!
//! - Concurrent scanning of every enabled category, settled together
//! - Ordered fallback query shapes per category, first success wins
//! - Partial failure reported as warnings instead of aborting the scan
//! - TTL cache plus collapse of identical in-flight requests
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldlens_core::{ScanMode, ScanRequest, SystemClock};
//! use fieldlens_scanner::ScanOrchestrator;
//! use std::sync::Arc;
//!
//! let orchestrator = ScanOrchestrator::from_config(
//!     client,
//!     Arc::new(database.cache_store()),
//!     Arc::new(SystemClock),
//!     &config,
//! );
//!
//! let request = ScanRequest::new(
//!     "https://acme.lightning.force.com",
//!     "Account",
//!     "Custom_Status__c",
//!     ScanMode::Quick,
//! )?;
//! let result = orchestrator.scan_impact(request).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod categories;
pub mod coalesce;
pub mod fields;
pub mod matching;
pub mod orchestrator;
pub mod strategy;

// Re-export commonly used types
pub use aggregator::ImpactScanner;
pub use categories::ScanContext;
pub use coalesce::RequestCoalescer;
pub use fields::load_field_list;
pub use matching::{looks_like_salesforce_id, FieldMatcher};
pub use orchestrator::ScanOrchestrator;
pub use strategy::{first_success, is_schema_variance, shape, Strategy, StrategyOutcome};
