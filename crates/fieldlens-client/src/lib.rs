//! FieldLens Client - Salesforce API access for the impact scanner.
//!
//! Resolves which origins can serve an org's API, borrows the browser's
//! session through a staged transport pipeline, and runs paginated SOQL
//! against the Tooling and Data surfaces.
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldlens_client::{QuerySurface, ReqwestFetcher, SalesforceClient, TransportPipeline};
//! use std::sync::Arc;
//!
//! let pipeline = TransportPipeline::new(Arc::new(ReqwestFetcher::new(&config.api)?))
//!     .with_cookies(relay.clone())
//!     .with_tabs(relay);
//! let client = SalesforceClient::new(pipeline, "v60.0");
//! let classes = client
//!     .query(&org, QuerySurface::Tooling, "SELECT Id, Name, Body FROM ApexClass", None)
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod candidates;
pub mod http;
pub mod query;
pub mod soql;
pub mod transport;

pub use candidates::{api_base_candidates, candidate_hosts};
pub use http::{HttpFetcher, HttpResponse, ReqwestFetcher};
pub use query::{QuerySurface, SalesforceClient};
pub use soql::{encode_query, escape_soql, in_list};
pub use transport::{JsonResponse, TransportPipeline};
