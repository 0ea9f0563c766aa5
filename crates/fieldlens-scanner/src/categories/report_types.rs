//! Report types exposing the field.
//!
//! The Analytics API lists standard and custom report types together but
//! only by label and type name, so types mentioning the object are described
//! one by one. When the catalog endpoint is missing or has a different shape
//! (for example a 404 `NOT_FOUND`), the scan falls back to the Tooling
//! `ReportType` entity, which only covers custom report types. A permission
//! denial on the Analytics API ends the scan with that denial instead.

use super::{record_id, text, ScanContext};
use crate::strategy::{first_success, shape, Strategy, StrategyOutcome};
use fieldlens_core::{Category, ImpactItem, Result};
use serde_json::{json, Value};

/// Reported when every shape failed.
pub const EXHAUSTED: &str = "Report type scan is unavailable in this org/API shape.";

/// Scan report types (deep mode only).
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let strategies: Vec<Strategy<'_, ImpactItem>> = vec![
        shape(move || from_analytics(ctx)),
        shape(move || from_custom_report_types(ctx)),
    ];
    first_success(Category::ReportTypes, strategies, EXHAUSTED).await
}

/// Shape 1: Analytics report type catalog plus per-type describe.
async fn from_analytics(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let catalog = ctx.resource("/analytics/reportTypes").await?;
    let candidates = types_mentioning(&catalog, &ctx.request().object_api_name);

    let outcome = ctx
        .inspect_details(
            Category::ReportTypes,
            candidates,
            |entry| {
                text(entry, "Id").map(|report_type| {
                    format!("/analytics/reportTypes/{}", urlencoding::encode(report_type))
                })
            },
            |describe| ctx.matcher().matches_json(describe),
        )
        .await?;

    let home = ctx.org_link("/lightning/setup/CustomReportTypes/home");
    Ok(outcome.map(|(entry, _)| {
        let id = record_id(&entry);
        let name = text(&entry, "Name").unwrap_or(&id).to_string();
        ImpactItem::new(id, name, "Report Type", home.clone())
    }))
}

/// Shape 2: Tooling custom report types based on the object.
async fn from_custom_report_types(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let soql = format!(
        "SELECT Id, DeveloperName, MasterLabel FROM ReportType WHERE BaseObject = '{}' ORDER BY MasterLabel",
        ctx.object_literal()
    );
    let records = ctx.tooling(&soql).await?;
    let outcome = ctx
        .inspect_details(
            Category::ReportTypes,
            records,
            |record| text(record, "Id").map(|id| format!("/tooling/sobjects/ReportType/{id}")),
            |detail| {
                detail
                    .get("Metadata")
                    .is_some_and(|metadata| ctx.matcher().matches_json(metadata))
            },
        )
        .await?;

    Ok(outcome.map(|(record, _)| {
        let id = record_id(&record);
        let name = text(&record, "MasterLabel")
            .or_else(|| text(&record, "DeveloperName"))
            .unwrap_or(&id)
            .to_string();
        let url = ctx.org_link(&format!(
            "/lightning/setup/CustomReportTypes/page?address=%2F{id}"
        ));
        ImpactItem::new(id, name, "Report Type", url)
    }))
}

/// Flatten the catalog and keep types whose name or label mentions the object.
fn types_mentioning(catalog: &Value, object_api_name: &str) -> Vec<Value> {
    let needle = object_api_name.to_lowercase();
    let mentions = |value: Option<&str>| value.is_some_and(|v| v.to_lowercase().contains(&needle));

    catalog
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|section| section.get("reportTypes").and_then(Value::as_array))
        .flatten()
        .filter(|entry| mentions(text(entry, "type")) || mentions(text(entry, "label")))
        .map(|entry| {
            json!({
                "Id": entry.get("type").cloned().unwrap_or(Value::Null),
                "Name": entry.get("label").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_mentioning_object() {
        let catalog = json!([
            {
                "label": "Accounts & Contacts",
                "reportTypes": [
                    { "type": "AccountList", "label": "Accounts", "isHidden": false },
                    { "type": "ContactList", "label": "Contacts & Accounts" },
                    { "type": "LeadList", "label": "Leads" }
                ]
            },
            { "label": "Other", "reportTypes": [{ "type": "Opportunity", "label": "Opportunities" }] }
        ]);

        let found = types_mentioning(&catalog, "Account");
        let ids: Vec<_> = found.iter().filter_map(|entry| text(entry, "Id")).collect();
        assert_eq!(ids, vec!["AccountList", "ContactList"]);
    }

    #[test]
    fn test_types_mentioning_tolerates_odd_shapes() {
        assert!(types_mentioning(&json!({ "unexpected": true }), "Account").is_empty());
        assert!(types_mentioning(&json!([{ "label": "No types" }]), "Account").is_empty());
    }
}
