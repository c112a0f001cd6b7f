//! Side channel for failures the engine logs and moves past.
//!
//! Extraction and metadata sync never abort on a single bad mapping or
//! label; they report a [`Diagnostic`] to the injected sink and continue.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A key mapping's query failed; the key was handled as absent.
    ExtractionFailed,
    /// Writing a secret failed; the remaining mappings still ran.
    SecretWriteFailed,
    /// A label/annotation query failed; the literal value was kept.
    MetadataQueryFailed,
    /// A label/annotation value is not storable; the key was skipped.
    InvalidMetadataValue,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ExtractionFailed => "extraction_failed",
            DiagnosticKind::SecretWriteFailed => "secret_write_failed",
            DiagnosticKind::MetadataQueryFailed => "metadata_query_failed",
            DiagnosticKind::InvalidMetadataValue => "invalid_metadata_value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// `namespace/name` of the secret involved.
    pub secret: String,
    /// Secret key, label or annotation name.
    pub key: String,
    pub query: Option<String>,
    pub reason: String,
}

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, d: Diagnostic) {
        tracing::warn!(
            kind = d.kind.as_str(),
            secret = %d.secret,
            key = %d.key,
            query = d.query.as_deref().unwrap_or(""),
            "{}", d.reason
        );
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.events().into_iter().map(|d| d.kind).collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, d: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(d);
    }
}
