//! Expected-response predicate.

use crate::errors::EngineError;
use crate::models::HttpResponse;
use crate::query::QueryEngine;

use super::context::response_context;

/// Decide whether `response` is the one `expected_query` asks for.
///
/// An empty query accepts anything; a missing response is never expected.
/// A query that fails or does not yield a boolean is a configuration error.
pub fn is_expected(
    engine: &QueryEngine,
    expected_query: &str,
    response: Option<&HttpResponse>,
) -> Result<bool, EngineError> {
    if expected_query.trim().is_empty() {
        return Ok(true);
    }
    let Some(response) = response else {
        return Ok(false);
    };

    let context = response_context(response);
    engine
        .parse_bool(expected_query, &context)
        .map_err(EngineError::Expectation)
}
