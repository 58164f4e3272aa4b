//! Per-run conversion context.
//!
//! Each extraction or pack run owns one [`ConversionContext`]. It carries the
//! tracing span every stage logs under, the timestamp written into the
//! project record, and the diagnostics collected along the way.

use chrono::{DateTime, Utc};
use tracing::Span;

/// Severity of a collected diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// A note raised during a run that did not stop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Part or tree path the note refers to.
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug)]
pub struct ConversionContext {
    span: Span,
    run_at: DateTime<Utc>,
    diagnostics: Vec<Diagnostic>,
}

impl ConversionContext {
    /// Context for an operation named `operation`, timestamped now.
    pub fn new(operation: &'static str) -> Self {
        Self {
            span: tracing::info_span!("conversion", operation),
            run_at: Utc::now(),
            diagnostics: Vec::new(),
        }
    }

    /// Fix the run timestamp, for reproducible records.
    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn run_at(&self) -> DateTime<Utc> {
        self.run_at
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, subject: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(subject = subject.unwrap_or("-"), "{message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            subject: subject.map(str::to_string),
            message,
        });
    }

    /// Record an informational note and log it.
    pub fn note(&mut self, subject: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(subject = subject.unwrap_or("-"), "{message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Info,
            subject: subject.map(str::to_string),
            message,
        });
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}
