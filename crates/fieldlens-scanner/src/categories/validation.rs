//! Validation rules whose condition formula mentions the field.
//!
//! Not every org exposes `ErrorConditionFormula` on the Tooling
//! `ValidationRule` entity. When it is missing, quick scans stop with an
//! advisory warning and deep scans fall back to matching the serialized
//! `Metadata` blob.

use super::{flag, record_id, text, ScanContext};
use crate::strategy::StrategyOutcome;
use fieldlens_core::{ImpactItem, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const FORMULA_SOQL: &str = "SELECT Id, ValidationName, Active, EntityDefinitionId, ErrorConditionFormula FROM ValidationRule ORDER BY ValidationName";
const METADATA_SOQL: &str = "SELECT Id, ValidationName, Active, EntityDefinitionId, Metadata FROM ValidationRule ORDER BY ValidationName";

/// Quick mode does not pay for the metadata fallback.
pub const QUICK_MODE_SKIPPED: &str = "Validation Rule deep scan is skipped in Quick mode.";
/// Deep mode matched against serialized metadata instead of the formula.
pub const METADATA_MATCHING: &str =
    "Validation Rule formula field is unavailable in this org; using metadata best-effort matching.";
/// Neither shape could be queried.
pub const UNAVAILABLE: &str = "Validation Rule scanning is unavailable in this org/API shape.";

static FORMULA_COLUMN_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)No such column 'ErrorConditionFormula'")
        .expect("formula column regex is hardcoded and valid")
});

/// Scan validation rules.
///
/// Failures other than the missing formula column propagate unchanged.
pub async fn scan(ctx: &ScanContext<'_>) -> Result<StrategyOutcome<ImpactItem>> {
    let matcher = ctx.matcher();

    let rules = match ctx.tooling(FORMULA_SOQL).await {
        Ok(records) => StrategyOutcome::records(
            records
                .into_iter()
                .filter(|record| matcher.matches_attr(record, "ErrorConditionFormula"))
                .collect(),
        ),
        Err(err) if FORMULA_COLUMN_MISSING.is_match(&err.message) => {
            if ctx.request().scan_mode.is_deep() {
                tracing::warn!("ErrorConditionFormula unavailable, matching validation metadata");
                metadata_fallback(ctx).await
            } else {
                StrategyOutcome::with_warning(Vec::new(), QUICK_MODE_SKIPPED)
            }
        }
        Err(err) => return Err(err),
    };

    let url = ctx.org_link(&format!(
        "/lightning/setup/ObjectManager/{}/ValidationRules/view",
        ctx.object_segment()
    ));
    Ok(rules.map(|record| {
        let id = record_id(&record);
        let name = text(&record, "ValidationName").unwrap_or(&id).to_string();
        let subtitle = if flag(&record, "Active") { "Active" } else { "Inactive" };
        ImpactItem::new(id, name, subtitle, url.clone())
    }))
}

async fn metadata_fallback(ctx: &ScanContext<'_>) -> StrategyOutcome<Value> {
    match ctx.tooling(METADATA_SOQL).await {
        Ok(records) => StrategyOutcome::with_warning(
            records
                .into_iter()
                .filter(|record| {
                    record
                        .get("Metadata")
                        .is_some_and(|metadata| ctx.matcher().matches_json(metadata))
                })
                .collect(),
            METADATA_MATCHING,
        ),
        Err(err) => {
            tracing::warn!(code = %err.code, "Validation metadata fallback failed: {}", err.message);
            StrategyOutcome::with_warning(Vec::new(), UNAVAILABLE)
        }
    }
}
