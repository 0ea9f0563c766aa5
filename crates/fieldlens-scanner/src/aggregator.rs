//! Concurrent fan-out over categories and the merge of their outcomes.

use crate::categories::{
    apex, flows, formulas, layouts, list_views, permissions, report_types, validation,
    ScanContext,
};
use crate::strategy::StrategyOutcome;
use fieldlens_client::SalesforceClient;
use fieldlens_core::{
    Category, Clock, ErrorDebug, FieldLensError, ImpactItem, Result, ScanRequest, ScanResult,
};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runs one impact scan against an org.
///
/// Every category enabled for the request's mode is issued at once and the
/// scan waits for all of them to settle. Category failures become warnings;
/// only the loss of all of Apex classes, Apex triggers and validation rules
/// fails the scan.
pub struct ImpactScanner {
    client: SalesforceClient,
    clock: Arc<dyn Clock>,
    detail_limit: usize,
}

impl ImpactScanner {
    /// Create a scanner.
    #[must_use]
    pub fn new(client: SalesforceClient, clock: Arc<dyn Clock>, detail_limit: usize) -> Self {
        Self {
            client,
            clock,
            detail_limit,
        }
    }

    /// The API client categories query through.
    #[must_use]
    pub fn client(&self) -> &SalesforceClient {
        &self.client
    }

    /// Clock used for `generatedAt`.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Scan every enabled category and merge the results.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResult> {
        let ctx = ScanContext::new(&self.client, request, self.detail_limit);
        let enabled: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|category| category.enabled_in(request.scan_mode))
            .collect();

        tracing::info!(
            org = %request.org,
            object = %request.object_api_name,
            field = %request.field_api_name,
            mode = %request.scan_mode,
            categories = enabled.len(),
            "Starting impact scan"
        );

        let settled = join_all(enabled.iter().map(|&category| run_category(&ctx, category))).await;

        let mut counts = BTreeMap::new();
        let mut groups = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut core_failures: Vec<FieldLensError> = Vec::new();

        for (category, outcome) in enabled.into_iter().zip(settled) {
            let items = match outcome {
                Ok(outcome) => {
                    warnings.extend(outcome.warning);
                    outcome.records
                }
                Err(err) => {
                    tracing::warn!(%category, code = %err.code, "Category failed: {}", err.message);
                    warnings.push(err.message.clone());
                    if Category::CORE.contains(&category) {
                        core_failures.push(err);
                    }
                    Vec::new()
                }
            };
            counts.insert(category, items.len());
            groups.insert(category, items);
        }

        if core_failures.len() == Category::CORE.len() {
            let first = core_failures.swap_remove(0);
            tracing::warn!(code = %first.code, "Every core category failed");
            return Err(FieldLensError {
                code: first.code,
                message: first.message,
                debug: ErrorDebug::nesting(first.debug),
            });
        }

        tracing::info!(
            object = %request.object_api_name,
            field = %request.field_api_name,
            references = counts.values().sum::<usize>(),
            warnings = warnings.len(),
            "Impact scan complete"
        );

        Ok(ScanResult {
            object_api_name: request.object_api_name.clone(),
            field_api_name: request.field_api_name.clone(),
            scan_mode: request.scan_mode,
            counts,
            groups,
            warnings,
            generated_at: self.clock.now_ms(),
            from_cache: false,
        })
    }
}

fn run_category<'a>(
    ctx: &'a ScanContext<'a>,
    category: Category,
) -> BoxFuture<'a, Result<StrategyOutcome<ImpactItem>>> {
    match category {
        Category::ApexClasses => apex::scan_classes(ctx).boxed(),
        Category::ApexTriggers => apex::scan_triggers(ctx).boxed(),
        Category::ValidationRules => validation::scan(ctx).boxed(),
        Category::Flows => flows::scan(ctx).boxed(),
        Category::FormulaFields => formulas::scan(ctx).boxed(),
        Category::PageLayouts => layouts::scan(ctx).boxed(),
        Category::ListViews => list_views::scan(ctx).boxed(),
        Category::ReportTypes => report_types::scan(ctx).boxed(),
        Category::FieldPermissions => permissions::scan(ctx).boxed(),
    }
}
