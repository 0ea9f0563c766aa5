//! Formula fields on the scanned object whose formula mentions the field.

use super::{join_warnings, record_id, text, text_at, ScanContext};
use crate::strategy::{first_success, shape, Strategy, StrategyOutcome};
use fieldlens_core::{Category, ErrorCode, FieldLensError, ImpactItem, Result};
use serde_json::Value;

/// Reported when every shape failed.
pub const EXHAUSTED: &str = "Formula field scan is unavailable in this org/API shape.";
/// Added when the describe shape could not be used.
pub const METADATA_MATCHING: &str = "Formula text unavailable from describe; used metadata matching.";

/// Scan formula fields (deep mode only).
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let strategies: Vec<Strategy<'_, ImpactItem>> = vec![
        shape(move || from_describe(ctx)),
        shape(move || from_custom_field_metadata(ctx)),
    ];
    first_success(Category::FormulaFields, strategies, EXHAUSTED).await
}

/// Shape 1: `calculatedFormula` from the object describe.
async fn from_describe(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let describe = ctx
        .resource(&format!("/sobjects/{}/describe", ctx.object_segment()))
        .await?;
    let fields = describe
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| FieldLensError::new(ErrorCode::ApiError, "Describe response has no fields."))?;

    let hides_formulas = fields.iter().any(|field| {
        field.get("calculated").and_then(Value::as_bool) == Some(true)
            && text(field, "calculatedFormula").is_none()
    });
    if hides_formulas {
        return Err(FieldLensError::new(
            ErrorCode::ApiError,
            "Describe does not expose formula text.",
        ));
    }

    let scanned = &ctx.request().field_api_name;
    let items = fields
        .iter()
        .filter(|field| {
            text(field, "name").is_some_and(|name| !name.eq_ignore_ascii_case(scanned))
                && ctx.matcher().matches_attr(field, "calculatedFormula")
        })
        .map(|field| {
            let name = text(field, "name").unwrap_or_default();
            let label = text(field, "label").unwrap_or(name);
            let data_type = text(field, "type").unwrap_or("formula");
            formula_item(ctx, format!("{}.{name}", ctx.request().object_api_name), name, label, data_type)
        })
        .collect();
    Ok(StrategyOutcome::records(items))
}

/// Shape 2: Tooling `CustomField` records and their `Metadata.formula`.
async fn from_custom_field_metadata(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let soql = format!(
        "SELECT Id, DeveloperName, NamespacePrefix FROM CustomField WHERE TableEnumOrId = '{}' ORDER BY DeveloperName",
        ctx.object_literal()
    );
    let records = ctx.tooling(&soql).await?;
    let outcome = ctx
        .inspect_details(
            Category::FormulaFields,
            records,
            |record| text(record, "Id").map(|id| format!("/tooling/sobjects/CustomField/{id}")),
            |detail| {
                text_at(detail, &["Metadata", "formula"])
                    .is_some_and(|formula| ctx.matcher().matches_text(formula))
            },
        )
        .await?;

    let warning = join_warnings(Some(METADATA_MATCHING.to_string()), outcome.warning);
    let items = outcome
        .records
        .iter()
        .map(|(record, detail)| {
            let api_name = text(detail, "FullName")
                .and_then(|full| full.rsplit_once('.').map(|(_, field)| field.to_string()))
                .or_else(|| text(record, "DeveloperName").map(|name| format!("{name}__c")))
                .unwrap_or_else(|| record_id(record));
            let label = text_at(detail, &["Metadata", "label"]).unwrap_or(&api_name).to_string();
            let data_type = text_at(detail, &["Metadata", "type"]).unwrap_or("Formula");
            formula_item(ctx, record_id(record), &api_name, &label, data_type)
        })
        .collect();
    Ok(StrategyOutcome { records: items, warning })
}

fn formula_item(ctx: &ScanContext<'_>, id: String, api_name: &str, label: &str, data_type: &str) -> ImpactItem {
    let url = ctx.org_link(&format!(
        "/lightning/setup/ObjectManager/{}/FieldsAndRelationships/{}/view",
        ctx.object_segment(),
        urlencoding::encode(api_name)
    ));
    ImpactItem::new(id, label, format!("Formula ({data_type})"), url)
}
