//! Field-level security rows for the field.
//!
//! `FieldPermissions` rows only carry their parent `PermissionSet` through a
//! relationship that is frequently blank for profile-owned sets, so display
//! names are resolved with one batched `PermissionSet` lookup afterwards. The
//! lookup is cosmetic and degrades to whatever the row itself carries.

use super::{flag, record_id, text, text_at, ScanContext};
use crate::matching::looks_like_salesforce_id;
use crate::strategy::StrategyOutcome;
use fieldlens_client::{escape_soql, in_list};
use fieldlens_core::{
    AccessType, Category, ErrorCode, FieldLensError, ImpactItem, PermissionType, Result,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Reported in place of the underlying failure.
pub const UNAVAILABLE: &str = "FLS scan unavailable for this user/org permissions.";

/// Display fields of a permission set, from the batched lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ParentDetail {
    label: Option<String>,
    name: Option<String>,
    is_owned_by_profile: bool,
    profile_name: Option<String>,
    profile_id: Option<String>,
}

/// Scan field permissions.
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let request = ctx.request();
    let soql = format!(
        "SELECT Id, ParentId, PermissionsRead, PermissionsEdit, SobjectType, Field, Parent.Label, Parent.Name, Parent.IsOwnedByProfile, Parent.ProfileId, Parent.Profile.Name FROM FieldPermissions WHERE SobjectType = '{}' AND Field = '{}' ORDER BY Parent.Label",
        escape_soql(&request.object_api_name),
        escape_soql(&request.qualified_field())
    );

    let rows = ctx.data(&soql).await.map_err(|err| {
        tracing::warn!(code = %err.code, "FieldPermissions query failed: {}", err.message);
        let unavailable =
            FieldLensError::new(ErrorCode::ScanUnavailable(Category::FieldPermissions), UNAVAILABLE);
        match err.debug {
            Some(debug) => unavailable.with_debug(debug),
            None => unavailable,
        }
    })?;

    let parents = load_parent_details(ctx, &rows).await;
    let items = rows
        .iter()
        .map(|row| permission_item(ctx, row, &parents))
        .collect();
    Ok(StrategyOutcome::records(items))
}

/// Batched `PermissionSet` lookup; any failure yields an empty map.
async fn load_parent_details(ctx: &ScanContext<'_>, rows: &[Value]) -> HashMap<String, ParentDetail> {
    let ids: BTreeSet<&str> = rows
        .iter()
        .filter_map(|row| text(row, "ParentId"))
        .filter(|id| id.len() >= 15)
        .collect();
    if ids.is_empty() {
        return HashMap::new();
    }

    let soql = format!(
        "SELECT Id, Label, Name, IsOwnedByProfile, ProfileId, Profile.Name FROM PermissionSet WHERE Id IN ({})",
        in_list(ids.iter().copied())
    );
    match ctx.data(&soql).await {
        Ok(records) => records
            .iter()
            .map(|record| {
                let detail = ParentDetail {
                    label: text(record, "Label").map(str::to_string),
                    name: text(record, "Name").map(str::to_string),
                    is_owned_by_profile: flag(record, "IsOwnedByProfile"),
                    profile_name: text_at(record, &["Profile", "Name"]).map(str::to_string),
                    profile_id: text(record, "ProfileId").map(str::to_string),
                };
                (record_id(record), detail)
            })
            .collect(),
        Err(err) => {
            tracing::debug!(code = %err.code, "Permission set lookup skipped: {}", err.message);
            HashMap::new()
        }
    }
}

fn permission_item(
    ctx: &ScanContext<'_>,
    row: &Value,
    parents: &HashMap<String, ParentDetail>,
) -> ImpactItem {
    let parent_id = text(row, "ParentId")
        .map_or_else(|| record_id(row), str::to_string);
    let detail = parents.get(&parent_id);

    let is_profile = detail.map_or_else(
        || {
            row.get("Parent")
                .is_some_and(|parent| flag(parent, "IsOwnedByProfile"))
        },
        |detail| detail.is_owned_by_profile,
    );
    let profile_name = detail
        .and_then(|d| d.profile_name.as_deref())
        .or_else(|| text_at(row, &["Parent", "Profile", "Name"]));
    let profile_id = detail
        .and_then(|d| d.profile_id.as_deref())
        .or_else(|| text_at(row, &["Parent", "ProfileId"]));

    let name = profile_name
        .or_else(|| detail.and_then(|d| d.label.as_deref()))
        .or_else(|| text_at(row, &["Parent", "Label"]))
        .or_else(|| detail.and_then(|d| d.name.as_deref()))
        .or_else(|| text_at(row, &["Parent", "Name"]))
        .map_or_else(
            || {
                if looks_like_salesforce_id(&parent_id) {
                    "Unknown Permission Container".to_string()
                } else {
                    parent_id.clone()
                }
            },
            str::to_string,
        );

    let access = AccessType::from_flags(flag(row, "PermissionsRead"), flag(row, "PermissionsEdit"));
    let (permission_type, container) = if is_profile {
        (PermissionType::Profile, "Profile")
    } else {
        (PermissionType::PermissionSet, "Permission Set")
    };
    let url = match (is_profile, profile_id) {
        (true, Some(profile_id)) => ctx.org_link(&format!(
            "/lightning/setup/EnhancedProfiles/page?address=%2F{profile_id}"
        )),
        (true, None) => ctx.org_link("/lightning/setup/EnhancedProfiles/home"),
        (false, _) => ctx.org_link(&format!("/lightning/setup/PermSets/page?address=%2F{parent_id}")),
    };

    let mut item = ImpactItem::new(
        record_id(row),
        name,
        format!("{container} - {}", access.label()),
        url,
    );
    item.permission_type = Some(permission_type);
    item.access_type = Some(access);
    item
}
