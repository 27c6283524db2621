pub mod codes;

use std::io;
use std::mem;

use ariadne::{Color, Label as AriadneLabel, Report, ReportKind, Source};
use log::warn;
use thiserror::Error;

use crate::utils::Span;
use crate::value::Value;
pub use codes::ErrorCode;

// --- DiagnosticLevel and Label ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

// --- CompileError: the structured fatal-error record ---

/// A fatal compilation error: `{code, offending value, file, line}` plus the
/// byte span used for rendering.
#[derive(Debug, Clone, Error)]
#[error("{file}:{line}: error {}: {message}", .code.number)]
pub struct CompileError {
    pub code: &'static ErrorCode,
    pub value: Option<Value>,
    pub file: String,
    pub line: u32,
    pub span: Span,
    pub message: String,
}

impl CompileError {
    pub fn new(code: &'static ErrorCode, file: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            value: None,
            file: file.into(),
            line: span.line,
            span,
            message: code.message.to_string(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn number(&self) -> u16 {
        self.code.number
    }

    /// Converts the error into a renderable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let label = match &self.value {
            Some(v) => Label::new(self.span, format!("offending value: {}", v)),
            None => Label::new(self.span, self.code.message),
        };
        Diagnostic::new(self.code, label)
            .with_dynamic_message(self.message.clone())
            .with_note(self.code.explanation)
    }
}

// --- Diagnostic ---

#[derive(Debug, Clone)]
pub struct Diagnostic {
    code: &'static ErrorCode,
    message: String,
    labels: Vec<Label>,
    notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(error_code: &'static ErrorCode, primary_label: Label) -> Self {
        Self {
            code: error_code,
            message: error_code.message.to_string(),
            labels: vec![primary_label],
            notes: Vec::new(),
        }
    }

    pub fn warning(error_code: &'static ErrorCode, primary_label: Label) -> Self {
        debug_assert!(
            matches!(error_code.level, DiagnosticLevel::Warning),
            "Tried to create a warning diagnostic with a non-warning code."
        );
        Self::new(error_code, primary_label)
    }

    /// Replaces the default message with one carrying dynamic detail.
    pub fn with_dynamic_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn code(&self) -> &'static ErrorCode {
        self.code
    }

    pub fn level(&self) -> DiagnosticLevel {
        self.code.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> u32 {
        self.labels.first().map_or(0, |l| l.span.line)
    }
}

// --- DiagnosticBag: the warning sink ---

#[derive(Debug)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
    enabled: bool,
}

impl Default for DiagnosticBag {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            enabled: true,
        }
    }

    /// A bag that drops every warning it is given.
    pub fn silent() -> Self {
        Self {
            diagnostics: Vec::new(),
            enabled: false,
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.level() == DiagnosticLevel::Warning {
            if !self.enabled {
                return;
            }
            warn!("line {}: {}", diagnostic.line(), diagnostic.message);
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn report_error(&mut self, error: &CompileError) {
        self.diagnostics.push(error.to_diagnostic());
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level() == DiagnosticLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level() == DiagnosticLevel::Warning)
            .count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.diagnostics)
    }

    /// Renders and clears everything collected so far.
    pub fn print(&mut self, file_name: &str, source: &str) -> io::Result<()> {
        let diags_to_print = mem::take(&mut self.diagnostics);
        if diags_to_print.is_empty() {
            return Ok(());
        }
        print_all(file_name, source, diags_to_print)
    }
}

// --- Printer ---

fn print_all(file_name: &str, source_code: &str, diagnostics: Vec<Diagnostic>) -> io::Result<()> {
    let cache = (file_name, Source::from(source_code));

    for diag in diagnostics {
        let Some(primary) = diag.labels.first() else { continue };

        let (kind, color) = match diag.level() {
            DiagnosticLevel::Error => (ReportKind::Error, Color::Red),
            DiagnosticLevel::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let mut report = Report::build(kind, (file_name, primary.span.range()))
            .with_message(&diag.message)
            .with_code(diag.code.code);

        for (i, label_info) in diag.labels.iter().enumerate() {
            let label = AriadneLabel::new((file_name, label_info.span.range()))
                .with_message(&label_info.message)
                .with_color(if i == 0 { color } else { Color::Blue });
            report.add_label(label);
        }

        for note in &diag.notes {
            report = report.with_note(note);
        }

        report.finish().eprint(cache.clone())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_code_file_and_line() {
        let err = CompileError::new(&codes::E4003_BREAK_OUTSIDE_LOOP, "t.ns", Span::new(0, 5, 3));
        assert_eq!(err.to_string(), "t.ns:3: error 4003: `break` outside of a loop");
        assert_eq!(err.number(), 4003);
    }

    #[test]
    fn silent_bag_drops_warnings_but_keeps_errors() {
        let mut bag = DiagnosticBag::silent();
        bag.report(Diagnostic::warning(&codes::W5002_UNUSED_VALUE, Label::new(Span::default(), "")));
        assert!(bag.is_empty());
        let err = CompileError::new(&codes::E2001_SYNTAX_ERROR, "t.ns", Span::default());
        bag.report_error(&err);
        assert!(bag.has_errors());
        assert_eq!(bag.warning_count(), 0);
    }
}
