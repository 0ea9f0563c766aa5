//! API base resolution.
//!
//! The page a user is on (`*.lightning.force.com`) is usually not the host
//! that serves the REST API with their session (`*.my.salesforce.com`), so
//! every call is tried against an ordered list of origins.

use fieldlens_core::OrgUrl;

const LIGHTNING_SUFFIX: &str = ".lightning.force.com";
const MY_DOMAIN_SUFFIX: &str = ".my.salesforce.com";
const FORCE_SUFFIX: &str = ".force.com";

/// Ordered, deduplicated API origins for an org.
#[must_use]
pub fn api_base_candidates(org: &OrgUrl) -> Vec<String> {
    let url = org.as_url();
    let host = org.host();
    let mut candidates = Vec::with_capacity(2);

    if host.contains(LIGHTNING_SUFFIX) {
        candidates.push(with_host(url, &host.replacen(LIGHTNING_SUFFIX, MY_DOMAIN_SUFFIX, 1)));
        candidates.push(org.origin());
    } else {
        candidates.push(org.origin());
        if host.ends_with(FORCE_SUFFIX) && !host.contains(MY_DOMAIN_SUFFIX) {
            let alias = host.replacen(FORCE_SUFFIX, MY_DOMAIN_SUFFIX, 1);
            if alias != host {
                candidates.push(with_host(url, &alias));
            }
        }
    }

    let mut unique = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// Hosts (no scheme) of [`api_base_candidates`], in the same order.
#[must_use]
pub fn candidate_hosts(org: &OrgUrl) -> Vec<String> {
    api_base_candidates(org)
        .iter()
        .filter_map(|origin| url::Url::parse(origin).ok())
        .filter_map(|url| url.host_str().map(str::to_string))
        .collect()
}

fn with_host(url: &url::Url, host: &str) -> String {
    match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    }
}
