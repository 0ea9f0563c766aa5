//! Flows referencing the field.
//!
//! The Flow Tooling schema varies across orgs and API versions, so three
//! shapes are tried: a `LIKE` filter on the flow definition, a `LIKE` filter
//! on `FlowDefinitionView` metadata, and finally a walk over active flow
//! versions matching each version's metadata.

use super::{record_id, text, ScanContext};
use crate::strategy::{first_success, shape, Strategy, StrategyOutcome};
use fieldlens_client::escape_soql;
use fieldlens_core::{Category, ImpactItem, Result};
use serde_json::Value;

/// Reported when every shape failed.
pub const EXHAUSTED: &str = "Flow scan is unavailable in this org/API shape.";

const ACTIVE_VERSIONS_SOQL: &str =
    "SELECT Id, MasterLabel, Status, ProcessType FROM Flow WHERE Status = 'Active' ORDER BY MasterLabel";

/// Scan flows (deep mode only).
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let like = escape_soql(&ctx.request().field_api_name);
    let by_definition = format!(
        "SELECT Id, MasterLabel, Status FROM Flow WHERE Definition LIKE '%{like}%' ORDER BY LastModifiedDate DESC"
    );
    let by_view = format!(
        "SELECT Id, ApiName, Label, ProcessType FROM FlowDefinitionView WHERE Metadata LIKE '%{like}%' ORDER BY LastModifiedDate DESC"
    );

    let strategies: Vec<Strategy<'_, Value>> = vec![
        shape(move || async move { Ok(StrategyOutcome::records(ctx.tooling(&by_definition).await?)) }),
        shape(move || async move { Ok(StrategyOutcome::records(ctx.tooling(&by_view).await?)) }),
        shape(move || active_versions(ctx)),
    ];

    let outcome = first_success(Category::Flows, strategies, EXHAUSTED).await?;
    Ok(outcome.map(|record| flow_item(ctx, &record)))
}

/// Match each active version's metadata, up to the detail limit.
async fn active_versions(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<Value>> {
    let versions = ctx.tooling(ACTIVE_VERSIONS_SOQL).await?;
    let outcome = ctx
        .inspect_details(
            Category::Flows,
            versions,
            |record| text(record, "Id").map(|id| format!("/tooling/sobjects/Flow/{id}")),
            |detail| {
                detail
                    .get("Metadata")
                    .is_some_and(|metadata| ctx.matcher().matches_json(metadata))
            },
        )
        .await?;
    Ok(outcome.map(|(record, _)| record))
}

fn flow_item(ctx: &ScanContext<'_>, record: &Value) -> ImpactItem {
    let id = record_id(record);
    let name = ["MasterLabel", "Label", "DeveloperName", "ApiName"]
        .iter()
        .find_map(|key| text(record, key))
        .unwrap_or(&id)
        .to_string();
    let subtitle = if let Some(status) = text(record, "Status") {
        format!("Status: {status}")
    } else if let Some(process_type) = text(record, "ProcessType") {
        format!("Type: {process_type}")
    } else {
        "Flow".to_string()
    };
    let url = ctx.org_link(&format!("/lightning/setup/Flows/page?address=%2F{id}"));
    ImpactItem::new(id, name, subtitle, url)
}
