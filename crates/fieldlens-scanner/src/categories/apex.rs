//! Apex classes and triggers whose source mentions the field.

use super::{record_id, text, ScanContext};
use crate::strategy::StrategyOutcome;
use fieldlens_core::{ImpactItem, Result};

const APEX_CLASS_SOQL: &str = "SELECT Id, Name, Body FROM ApexClass ORDER BY Name";
const APEX_TRIGGER_SOQL: &str =
    "SELECT Id, Name, TableEnumOrId, Body FROM ApexTrigger ORDER BY Name";

/// Scan every Apex class body.
pub async fn scan_classes(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let records = ctx.tooling(APEX_CLASS_SOQL).await?;
    let items = records
        .iter()
        .filter(|record| ctx.matcher().matches_attr(record, "Body"))
        .map(|record| {
            let id = record_id(record);
            let url = ctx.org_link(&format!("/lightning/setup/ApexClasses/page?address=%2F{id}"));
            let name = text(record, "Name").unwrap_or(&id).to_string();
            ImpactItem::new(id, name, "Apex Class", url)
        })
        .collect();
    Ok(StrategyOutcome::records(items))
}

/// Scan every Apex trigger body.
pub async fn scan_triggers(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let records = ctx.tooling(APEX_TRIGGER_SOQL).await?;
    let items = records
        .iter()
        .filter(|record| ctx.matcher().matches_attr(record, "Body"))
        .map(|record| {
            let id = record_id(record);
            let url =
                ctx.org_link(&format!("/lightning/setup/ApexTriggers/page?address=%2F{id}"));
            let name = text(record, "Name").unwrap_or(&id).to_string();
            let subtitle = text(record, "TableEnumOrId")
                .map_or_else(|| "Apex Trigger".to_string(), |object| format!("Object: {object}"));
            ImpactItem::new(id, name, subtitle, url)
        })
        .collect();
    Ok(StrategyOutcome::records(items))
}
