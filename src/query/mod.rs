//! Query evaluator adapter.
//!
//! Wraps jq (via the `jaq` crates) behind a small typed API: first-result
//! evaluation, existence checks, typed extraction and "is this a query at
//! all" detection. Evaluation is serialized through a lock handed in at
//! construction, so one engine can be shared by every reconcile task in
//! the process.

use std::sync::{Arc, Mutex};

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Filter, Native, RcIter};
use jaq_json::Val;
use serde_json::Value;
use thiserror::Error;

/// Failure channels of a query. `NoResult` means "nothing there";
/// `TypeMismatch` means "something there, but not what the caller asked for".
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("invalid query '{query}': {reason}")]
    Syntax { query: String, reason: String },

    #[error("query '{query}' failed: {reason}")]
    Evaluation { query: String, reason: String },

    #[error("query '{query}' produced no result")]
    NoResult { query: String },

    #[error("query '{query}' returned {found}, expected {expected}")]
    TypeMismatch {
        query: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Shared, lock-protected query evaluator.
#[derive(Clone)]
pub struct QueryEngine {
    lock: Arc<Mutex<()>>,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(Arc::new(Mutex::new(())))
    }
}

impl QueryEngine {
    pub fn new(lock: Arc<Mutex<()>>) -> Self {
        Self { lock }
    }

    /// First output of `query`, or `None` when it produces nothing.
    fn first(&self, query: &str, context: &Value) -> Result<Option<Value>, QueryError> {
        let filter = compile(query).map_err(|reason| QueryError::Syntax {
            query: query.to_string(),
            reason,
        })?;

        // a poisoned lock only means another evaluation panicked; the guard protects no data
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let inputs = RcIter::new(core::iter::empty());
        let mut out = filter.run((Ctx::new([], &inputs), Val::from(context.clone())));

        match out.next() {
            None => Ok(None),
            Some(Ok(val)) => to_json(&val).map(Some).map_err(|reason| QueryError::Evaluation {
                query: query.to_string(),
                reason,
            }),
            Some(Err(e)) => Err(QueryError::Evaluation {
                query: query.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// First output of `query`. Zero outputs is `NoResult`; an explicit
    /// `null` output is returned as `Value::Null`.
    pub fn evaluate(&self, query: &str, context: &Value) -> Result<Value, QueryError> {
        self.first(query, context)?.ok_or_else(|| QueryError::NoResult {
            query: query.to_string(),
        })
    }

    /// True when the query yields a non-null first output.
    pub fn exists(&self, query: &str, context: &Value) -> Result<bool, QueryError> {
        match self.evaluate(query, context) {
            Ok(Value::Null) => Ok(false),
            Ok(_) => Ok(true),
            Err(QueryError::NoResult { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// True when `candidate` parses and every filter it calls is defined.
    /// Nothing is evaluated.
    pub fn looks_like_query(&self, candidate: &str) -> bool {
        !candidate.trim().is_empty() && compile(candidate).is_ok()
    }

    pub fn parse_string(&self, query: &str, context: &Value) -> Result<String, QueryError> {
        match self.evaluate(query, context)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(query, "string", &other)),
        }
    }

    pub fn parse_bool(&self, query: &str, context: &Value) -> Result<bool, QueryError> {
        match self.evaluate(query, context)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(query, "boolean", &other)),
        }
    }

    /// Number output rendered in its shortest decimal form.
    pub fn parse_number(&self, query: &str, context: &Value) -> Result<String, QueryError> {
        match self.evaluate(query, context)? {
            Value::Number(n) => Ok(format_number(&n)),
            other => Err(mismatch(query, "number", &other)),
        }
    }

    /// Typed extraction with the string → boolean → number fallback chain.
    ///
    /// `Ok(None)` means the query produced nothing (or `null`). A value of
    /// any other type is reported as `TypeMismatch`.
    pub fn extract(&self, query: &str, context: &Value) -> Result<Option<String>, QueryError> {
        if !self.exists(query, context)? {
            return Ok(None);
        }
        if let Ok(s) = self.parse_string(query, context) {
            return Ok(Some(s));
        }
        if let Ok(b) = self.parse_bool(query, context) {
            return Ok(Some(b.to_string()));
        }
        match self.parse_number(query, context) {
            Ok(n) => Ok(Some(n)),
            Err(QueryError::TypeMismatch { found, .. }) => Err(QueryError::TypeMismatch {
                query: query.to_string(),
                expected: "string, boolean or number",
                found,
            }),
            Err(e) => Err(e),
        }
    }
}

/// Parse and compile `query` against the jq standard library.
fn compile(query: &str) -> Result<Filter<Native<Val>>, String> {
    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();
    let modules = loader
        .load(&arena, File { code: query, path: () })
        .map_err(|errs| format!("parse error: {:?}", errs))?;

    Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| format!("undefined filter: {:?}", errs))
}

fn to_json(val: &Val) -> Result<Value, String> {
    serde_json::from_str(&val.to_string()).map_err(|e| format!("unrepresentable output: {}", e))
}

/// jq's name for the type of `v`.
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(query: &str, expected: &'static str, found: &Value) -> QueryError {
    QueryError::TypeMismatch {
        query: query.to_string(),
        expected,
        found: type_name(found),
    }
}

/// Shortest decimal rendering, never in exponent form.
pub fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(0.0);
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    format!("{}", f)
}
