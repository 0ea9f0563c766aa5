//! List views that show or filter on the field.

use super::{record_id, text, ScanContext};
use crate::matching::FieldMatcher;
use crate::strategy::{first_success, shape, Strategy, StrategyOutcome};
use fieldlens_core::{Category, ImpactItem, Result};
use serde_json::{json, Value};

/// Reported when no list view listing shape worked.
pub const EXHAUSTED: &str = "List view scan is unavailable in this org/API shape.";

/// Scan list views (deep mode only).
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let soql = format!(
        "SELECT Id, Name, DeveloperName FROM ListView WHERE SobjectType = '{}' ORDER BY Name",
        ctx.object_literal()
    );
    let listings: Vec<Strategy<'_, Value>> = vec![
        shape(move || async move { Ok(StrategyOutcome::records(ctx.data(&soql).await?)) }),
        shape(move || from_listviews_endpoint(ctx)),
    ];
    let views = first_success(Category::ListViews, listings, EXHAUSTED).await?;

    let object_segment = ctx.object_segment();
    let outcome = ctx
        .inspect_details(
            Category::ListViews,
            views.records,
            |record| {
                text(record, "Id")
                    .map(|id| format!("/sobjects/{object_segment}/listviews/{id}/describe"))
            },
            |describe| describe_mentions(ctx.matcher(), describe),
        )
        .await?;

    Ok(outcome.map(|(record, _)| {
        let id = record_id(&record);
        let name = text(&record, "Name")
            .or_else(|| text(&record, "DeveloperName"))
            .unwrap_or(&id)
            .to_string();
        let url = ctx.org_link(&format!("/lightning/o/{object_segment}/list?filterName={id}"));
        ImpactItem::new(id, name, "List View", url)
    }))
}

/// Shape 2: the object's `listviews` resource, normalized to record form.
async fn from_listviews_endpoint(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<Value>> {
    let body = ctx
        .resource(&format!("/sobjects/{}/listviews", ctx.object_segment()))
        .await?;
    let records = body
        .get("listviews")
        .and_then(Value::as_array)
        .map(|views| {
            views
                .iter()
                .map(|view| {
                    json!({
                        "Id": view.get("id").cloned().unwrap_or(Value::Null),
                        "Name": view.get("label").cloned().unwrap_or(Value::Null),
                        "DeveloperName": view.get("developerName").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(StrategyOutcome::records(records))
}

/// Whether a list view describe shows the field as a column or uses it in
/// its query.
fn describe_mentions(matcher: &FieldMatcher, describe: &Value) -> bool {
    let in_columns = describe
        .get("columns")
        .and_then(Value::as_array)
        .is_some_and(|columns| {
            columns
                .iter()
                .any(|column| matcher.matches_attr(column, "fieldNameOrPath"))
        });
    in_columns || matcher.matches_attr(describe, "query")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_mentions_columns_and_query() {
        let matcher = FieldMatcher::new("Custom_Status__c");
        let by_column = json!({
            "columns": [{ "fieldNameOrPath": "Name" }, { "fieldNameOrPath": "Custom_Status__c" }],
            "query": "SELECT Name FROM Account"
        });
        let by_filter = json!({
            "columns": [{ "fieldNameOrPath": "Name" }],
            "query": "SELECT Name FROM Account WHERE Custom_Status__c = 'Open'"
        });
        let unrelated = json!({ "columns": [{ "fieldNameOrPath": "Name" }] });

        assert!(describe_mentions(&matcher, &by_column));
        assert!(describe_mentions(&matcher, &by_filter));
        assert!(!describe_mentions(&matcher, &unrelated));
    }
}
