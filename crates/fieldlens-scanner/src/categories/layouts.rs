//! Page layouts that place the field.

use super::{record_id, text, ScanContext};
use crate::strategy::{first_success, shape, Strategy, StrategyOutcome};
use fieldlens_core::{Category, ImpactItem, Result};
use serde_json::Value;

/// Reported when no layout listing shape worked.
pub const EXHAUSTED: &str = "Page layout scan is unavailable in this org/API shape.";

/// Scan page layouts (deep mode only).
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let object = ctx.object_literal();
    let by_table = format!(
        "SELECT Id, Name, TableEnumOrId FROM Layout WHERE TableEnumOrId = '{object}' ORDER BY Name"
    );
    let by_entity = format!(
        "SELECT Id, Name FROM Layout WHERE EntityDefinition.QualifiedApiName = '{object}' ORDER BY Name"
    );
    let listings: Vec<Strategy<'_, Value>> = vec![
        shape(move || async move { Ok(StrategyOutcome::records(ctx.tooling(&by_table).await?)) }),
        shape(move || async move { Ok(StrategyOutcome::records(ctx.tooling(&by_entity).await?)) }),
    ];
    let layouts = first_success(Category::PageLayouts, listings, EXHAUSTED).await?;

    let outcome = ctx
        .inspect_details(
            Category::PageLayouts,
            layouts.records,
            |record| text(record, "Id").map(|id| format!("/tooling/sobjects/Layout/{id}")),
            |detail| {
                detail
                    .get("Metadata")
                    .is_some_and(|metadata| ctx.matcher().matches_json(metadata))
            },
        )
        .await?;

    let object_segment = ctx.object_segment();
    Ok(outcome.map(|(record, _)| {
        let id = record_id(&record);
        let name = text(&record, "Name").unwrap_or(&id).to_string();
        let url = ctx.org_link(&format!(
            "/lightning/setup/ObjectManager/{object_segment}/PageLayouts/{id}/view"
        ));
        ImpactItem::new(id, name, "Page Layout", url)
    }))
}
