//! Ordered fallback shapes with first-success-wins semantics.
//!
//! Several entity types are queryable in more than one shape depending on the
//! org's edition and API version. A category lists its shapes in preference
//! order and [`first_success`] runs them one at a time until one answers.

use fieldlens_core::{Category, ErrorCode, FieldLensError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;

static SCHEMA_VARIANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)No such column|is not supported|INVALID_TYPE|INVALID_FIELD|NOT_FOUND")
        .expect("schema variance regex is hardcoded and valid")
});

/// Records produced by a category, plus an optional advisory warning.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome<T> {
    /// Matching records or items
    pub records: Vec<T>,
    /// Non-fatal note about reduced capability
    pub warning: Option<String>,
}

impl<T> StrategyOutcome<T> {
    /// Outcome without a warning.
    #[must_use]
    pub fn records(records: Vec<T>) -> Self {
        Self {
            records,
            warning: None,
        }
    }

    /// Outcome carrying an advisory warning.
    #[must_use]
    pub fn with_warning(records: Vec<T>, warning: impl Into<String>) -> Self {
        Self {
            records,
            warning: Some(warning.into()),
        }
    }

    /// Transform the records, keeping the warning.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> StrategyOutcome<U> {
        StrategyOutcome {
            records: self.records.into_iter().map(f).collect(),
            warning: self.warning,
        }
    }
}

impl<T> Default for StrategyOutcome<T> {
    fn default() -> Self {
        Self::records(Vec::new())
    }
}

/// One lazily started query shape.
pub type Strategy<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<StrategyOutcome<T>>> + Send + 'a>;

/// Box a closure producing a future as a [`Strategy`].
pub fn shape<'a, T, F, Fut>(run: F) -> Strategy<'a, T>
where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: Future<Output = Result<StrategyOutcome<T>>> + Send + 'a,
{
    Box::new(move || run().boxed())
}

/// Whether a failure means "this shape does not exist here" rather than a
/// real outage.
#[must_use]
pub fn is_schema_variance(error: &FieldLensError) -> bool {
    SCHEMA_VARIANCE.is_match(&error.message)
}

/// Run `strategies` in order and return the first success.
///
/// A permission-classified failure aborts the chain immediately. Any other
/// failure falls through to the next shape. When every shape fails the
/// result is `<CATEGORY>_BEST_EFFORT_FAILED` with `exhausted_message`.
pub async fn first_success<'a, T>(
    category: Category,
    strategies: Vec<Strategy<'a, T>>,
    exhausted_message: &str,
) -> Result<StrategyOutcome<T>> {
    let total = strategies.len();

    for (index, strategy) in strategies.into_iter().enumerate() {
        match strategy().await {
            Ok(outcome) => {
                if index > 0 {
                    tracing::debug!(%category, shape = index + 1, "Fallback shape answered");
                }
                return Ok(outcome);
            }
            Err(err) if err.is_permission_denied() => {
                tracing::warn!(%category, code = %err.code, "Permission denied, abandoning fallbacks");
                return Err(err);
            }
            Err(err) => {
                if is_schema_variance(&err) {
                    tracing::debug!(%category, shape = index + 1, total, "Shape unavailable: {}", err.message);
                } else {
                    tracing::warn!(%category, shape = index + 1, total, code = %err.code, "Shape failed: {}", err.message);
                }
            }
        }
    }

    Err(FieldLensError::new(
        ErrorCode::BestEffortFailed(category),
        exhausted_message,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted(
        calls: &Arc<AtomicUsize>,
        result: Result<StrategyOutcome<u32>>,
    ) -> Strategy<'static, u32> {
        let calls = Arc::clone(calls);
        shape(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            result
        })
    }

    fn api_error(message: &str) -> FieldLensError {
        FieldLensError::new(ErrorCode::ApiError, message)
    }

    #[tokio::test]
    async fn test_first_shape_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = first_success(
            Category::Flows,
            vec![
                counted(&calls, Ok(StrategyOutcome::records(vec![1]))),
                counted(&calls, Ok(StrategyOutcome::records(vec![2]))),
            ],
            "exhausted",
        )
        .await
        .unwrap();

        assert_eq!(outcome.records, vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_falls_through_on_schema_variance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = first_success(
            Category::Flows,
            vec![
                counted(&calls, Err(api_error("No such column 'Definition' on entity 'Flow'"))),
                counted(&calls, Ok(StrategyOutcome::with_warning(vec![7], "best effort"))),
            ],
            "exhausted",
        )
        .await
        .unwrap();

        assert_eq!(outcome.records, vec![7]);
        assert_eq!(outcome.warning.as_deref(), Some("best effort"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permission_aborts_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = first_success(
            Category::PageLayouts,
            vec![
                counted(
                    &calls,
                    Err(FieldLensError::new(ErrorCode::InsufficientPermissions, "denied")),
                ),
                counted(&calls, Ok(StrategyOutcome::records(vec![1]))),
            ],
            "exhausted",
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::InsufficientPermissions);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_is_best_effort_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = first_success(
            Category::Flows,
            vec![
                counted(&calls, Err(api_error("INVALID_TYPE: sObject type 'Flow' is not supported"))),
                counted(&calls, Err(api_error("Salesforce API error (500)"))),
            ],
            "Flow scan is unavailable in this org/API shape.",
        )
        .await
        .unwrap_err();

        assert_eq!(err.code.to_string(), "FLOW_BEST_EFFORT_FAILED");
        assert_eq!(err.message, "Flow scan is unavailable in this org/API shape.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_schema_variance_detection() {
        assert!(is_schema_variance(&api_error(
            "No such column 'ErrorConditionFormula' on entity 'ValidationRule'"
        )));
        assert!(is_schema_variance(&api_error(
            "sObject type 'FlowDefinitionView' is not supported."
        )));
        assert!(!is_schema_variance(&api_error("Salesforce API error (503)")));
    }
}
