//! Field picker source: every field of an object.

use fieldlens_client::{escape_soql, QuerySurface, SalesforceClient};
use fieldlens_core::{Clock, FieldListPayload, FieldListRequest, FieldSummary, Result};
use serde_json::Value;

/// Load the fields of `request.object_api_name`, ordered by label.
pub async fn load_field_list(
    client: &SalesforceClient,
    clock: &dyn Clock,
    request: &FieldListRequest,
) -> Result<FieldListPayload> {
    let soql = format!(
        "SELECT DurableId, QualifiedApiName, Label, DataType FROM FieldDefinition WHERE EntityDefinition.QualifiedApiName = '{}' ORDER BY Label",
        escape_soql(&request.object_api_name)
    );
    let records = client
        .query(&request.org, QuerySurface::Tooling, &soql, request.tab_id)
        .await?;

    let fields: Vec<FieldSummary> = records.iter().map(field_summary).collect();
    tracing::info!(object = %request.object_api_name, fields = fields.len(), "Loaded field list");

    Ok(FieldListPayload {
        object_api_name: request.object_api_name.clone(),
        fields,
        generated_at: clock.now_ms(),
        from_cache: false,
    })
}

fn field_summary(record: &Value) -> FieldSummary {
    let attr = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let api_name = attr("QualifiedApiName").unwrap_or_default();
    FieldSummary {
        durable_id: attr("DurableId").unwrap_or_default(),
        label: attr("Label").unwrap_or_else(|| api_name.clone()),
        data_type: attr("DataType").unwrap_or_else(|| "Unknown".to_string()),
        api_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_summary_fallbacks() {
        let full = field_summary(&json!({
            "DurableId": "Account.Custom_Status__c",
            "QualifiedApiName": "Custom_Status__c",
            "Label": "Custom Status",
            "DataType": "Picklist"
        }));
        assert_eq!(full.label, "Custom Status");
        assert_eq!(full.data_type, "Picklist");

        let sparse = field_summary(&json!({ "QualifiedApiName": "Region__c", "Label": "" }));
        assert_eq!(sparse.label, "Region__c");
        assert_eq!(sparse.data_type, "Unknown");
        assert_eq!(sparse.durable_id, "");
    }
}
