//! Access to the user's logged-in Salesforce browser session.
//!
//! Tab-side fetches and cookie lookups go either through the browser
//! extension (`relay`) or a DevTools attachment (`engine`).

pub mod bridge;
pub mod engine;
pub mod error;
pub mod relay;

pub use bridge::{
    extract_host, is_trusted_salesforce_pair, CookieSource, FetchWorld, TabBridge,
    TabFetchResponse,
};
pub use engine::CdpSession;
pub use error::{BrowserError, Result};
pub use relay::{ExtensionRelay, PendingRequests, RelayAction, RelayReply, RelayRequest};
