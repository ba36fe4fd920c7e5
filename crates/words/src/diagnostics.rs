use std::collections::HashMap;
use std::fmt;
use std::io::IsTerminal;
use std::ops::Range;
use std::path::Path;

use ariadne::{sources, Config, Label, Report, ReportKind};

use crate::interpreter::RuntimeError;
use crate::m0_backend::CompileError;
use crate::parser::ParseError;
use crate::token::DebugData;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticStage {
    Parse,
    Runtime,
    Compile,
    Io,
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticStage::Parse => "parse",
            DiagnosticStage::Runtime => "runtime",
            DiagnosticStage::Compile => "compile",
            DiagnosticStage::Io => "io",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLabel {
    pub file_id: String,
    pub span: Range<usize>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub code: String,
    pub stage: DiagnosticStage,
    pub message: String,
    pub labels: Vec<SourceLabel>,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub sources: HashMap<String, String>,
}

impl Diagnostic {
    pub fn new(
        code: impl Into<String>,
        stage: DiagnosticStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            stage,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            help: None,
            sources: HashMap::new(),
        }
    }

    pub fn with_source(mut self, file_id: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(file_id.into(), source.into());
        self
    }

    pub fn with_label(
        mut self,
        file_id: impl Into<String>,
        span: Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        self.labels.push(SourceLabel {
            file_id: file_id.into(),
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn render_plain(&self) -> String {
        self.render_with_color(false)
    }

    pub fn render_terminal_auto(&self) -> String {
        self.render_with_color(std::io::stderr().is_terminal())
    }

    fn render_with_color(&self, use_color: bool) -> String {
        let (primary_file_id, primary_span) = if let Some(label) = self.labels.first() {
            (label.file_id.clone(), sanitize_span(&label.span))
        } else if let Some((file_id, source)) = self.sources.iter().next() {
            let end = next_char_boundary(source, 0);
            (file_id.clone(), 0..end)
        } else {
            ("<unknown>".to_string(), 0..1)
        };

        let mut report = Report::build(
            ReportKind::Error,
            (primary_file_id.clone(), primary_span.clone()),
        )
        .with_code(self.code.clone())
        .with_message(format!("error[{}:{}]: {}", self.stage, self.code, self.message))
        .with_config(Config::default().with_color(use_color));

        for label in &self.labels {
            report = report.with_label(
                Label::new((label.file_id.clone(), sanitize_span(&label.span)))
                    .with_message(label.message.clone()),
            );
        }

        for note in &self.notes {
            report = report.with_note(note.clone());
        }

        if let Some(help) = &self.help {
            report = report.with_help(help.clone());
        }

        let mut source_entries = self
            .sources
            .iter()
            .map(|(id, src)| (id.clone(), src.clone()))
            .collect::<Vec<_>>();
        if !source_entries.iter().any(|(id, _)| id == &primary_file_id) {
            source_entries.push((primary_file_id.clone(), String::new()));
        }

        let mut output = Vec::new();
        match report.finish().write(sources(source_entries), &mut output) {
            Ok(()) => String::from_utf8_lossy(&output).trim_end().to_string(),
            Err(_) => self.fallback_render(),
        }
    }

    fn fallback_render(&self) -> String {
        let mut out = format!("error[{}:{}]: {}", self.stage, self.code, self.message);
        for note in &self.notes {
            out.push_str("\nnote: ");
            out.push_str(note);
        }
        if let Some(help) = &self.help {
            out.push_str("\nhelp: ");
            out.push_str(help);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_plain())
    }
}

pub fn diagnostic_from_parse_error(
    source: &str,
    source_path: Option<&Path>,
    error: &ParseError,
) -> Diagnostic {
    let diagnostic = located(
        Diagnostic::new(error.code(), DiagnosticStage::Parse, "parsing failed"),
        source,
        source_path,
        Some(error.debug_data()),
        error.to_string(),
    );
    match error {
        ParseError::InvalidParameter { .. } => {
            diagnostic.with_help("declare each parameter as `VALUE NAME` between `(` and `)`")
        }
        ParseError::NoReturnToken { .. } => {
            diagnostic.with_help("end the function body with `RETURN 0`, `RETURN 1`, `RETURN 2` or `RETURN 3`")
        }
        _ => diagnostic,
    }
}

pub fn diagnostic_from_runtime_error(
    source: &str,
    source_path: Option<&Path>,
    error: &RuntimeError,
) -> Diagnostic {
    located(
        Diagnostic::new(error.code(), DiagnosticStage::Runtime, "execution failed"),
        source,
        source_path,
        error.debug_data(),
        error.to_string(),
    )
}

pub fn diagnostic_from_compile_error(
    source: &str,
    source_path: Option<&Path>,
    error: &CompileError,
) -> Diagnostic {
    located(
        Diagnostic::new(error.code(), DiagnosticStage::Compile, "compilation failed"),
        source,
        source_path,
        error.debug_data(),
        error.to_string(),
    )
}

pub fn diagnostic_from_anyhow(
    stage: DiagnosticStage,
    code: impl Into<String>,
    message: impl Into<String>,
    error: &anyhow::Error,
) -> Diagnostic {
    let mut diagnostic = Diagnostic::new(code, stage, message);
    let mut causes = error.chain();
    if let Some(primary) = causes.next() {
        diagnostic.message = format!("{}: {}", diagnostic.message, primary);
    }
    for cause in causes {
        diagnostic = diagnostic.with_note(format!("caused by: {cause}"));
    }
    diagnostic
}

/// Attaches the source and, when the error has a position, a label on the
/// offending word. Errors without a position carry their message as a note.
fn located(
    diagnostic: Diagnostic,
    source: &str,
    source_path: Option<&Path>,
    debug: Option<DebugData>,
    message: String,
) -> Diagnostic {
    let file_id = file_id_from_path(source_path);
    let diagnostic = diagnostic.with_source(file_id.clone(), source.to_string());
    match debug {
        Some(debug) => diagnostic
            .with_label(file_id, span_from_debug(source, debug), message)
            .with_note(format!("at {debug}, column {}", debug.column + 1)),
        None => diagnostic.with_note(message),
    }
}

pub fn file_id_from_path(path: Option<&Path>) -> String {
    path.map(|value| value.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string())
}

/// Byte range of the word starting at `debug`.
pub fn span_from_debug(source: &str, debug: DebugData) -> Range<usize> {
    let line_start = source
        .split_inclusive('\n')
        .take(debug.line)
        .map(str::len)
        .sum::<usize>();
    let start = (line_start + debug.column).min(source.len());
    let word_len = source[start..]
        .find(char::is_whitespace)
        .unwrap_or(source.len() - start);
    let end = if word_len == 0 {
        next_char_boundary(source, start)
    } else {
        start + word_len
    };
    sanitize_span(&(start..end))
}

pub fn sanitize_span(span: &Range<usize>) -> Range<usize> {
    if span.end <= span.start {
        span.start..span.start.saturating_add(1)
    } else {
        span.clone()
    }
}

pub fn next_char_boundary(source: &str, start: usize) -> usize {
    if start >= source.len() {
        return start.saturating_add(1);
    }
    let mut iter = source[start..].char_indices();
    let _ = iter.next();
    if let Some((delta, _)) = iter.next() {
        start + delta
    } else {
        source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Interpreter, Stack};
    use crate::m0_backend::Target;
    use crate::parser::parse_source;

    #[test]
    fn span_covers_the_offending_word() {
        let source = "1 2\n  True IF\n";
        let span = span_from_debug(source, DebugData::new(1, 7));
        assert_eq!(&source[span], "IF");
        let span = span_from_debug(source, DebugData::new(0, 2));
        assert_eq!(&source[span], "2");
    }

    #[test]
    fn span_at_end_of_input_is_not_empty() {
        let source = "1";
        let span = span_from_debug(source, DebugData::new(3, 0));
        assert_eq!(span, 1..2);
    }

    #[test]
    fn parse_error_conversion_labels_the_word() {
        let source = "VARIABLE X\n1 THEN\n";
        let err = parse_source(source).unwrap_err();
        let diagnostic = diagnostic_from_parse_error(source, None, &err);
        assert_eq!(diagnostic.code, "WORDS-PARSE-004");
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(&source[diagnostic.labels[0].span.clone()], "THEN");

        let text = diagnostic.render_plain();
        assert!(text.contains("error[parse:WORDS-PARSE-004]"));
        assert!(text.contains("<memory>"));
    }

    #[test]
    fn runtime_error_conversion() {
        let source = "1 +";
        let program = parse_source(source).unwrap();
        let err = Interpreter::with_output(Vec::new())
            .execute_program(&program, Stack::new())
            .unwrap_err();
        let diagnostic =
            diagnostic_from_runtime_error(source, Some(Path::new("add.word")), &err);
        assert_eq!(diagnostic.stage, DiagnosticStage::Runtime);
        assert_eq!(&source[diagnostic.labels[0].span.clone()], "+");
        assert!(diagnostic.render_plain().contains("add.word"));
    }

    #[test]
    fn errors_without_position_become_notes() {
        let err = "avr".parse::<Target>().unwrap_err();
        let diagnostic = diagnostic_from_compile_error("", None, &err);
        assert!(diagnostic.labels.is_empty());
        assert_eq!(diagnostic.notes.len(), 1);
        assert!(diagnostic.render_plain().contains("WORDS-COMPILE-002"));
    }

    #[test]
    fn plain_rendering_does_not_contain_ansi_sequences() {
        let source = "| F ( X ) RETURN 0 |";
        let err = parse_source(source).unwrap_err();
        let diagnostic = diagnostic_from_parse_error(source, None, &err);
        assert!(diagnostic.help.is_some());
        let text = diagnostic.render_plain();
        assert!(!text.contains("\u{1b}["));
    }

    #[test]
    fn anyhow_chain_becomes_notes() {
        let error = anyhow::anyhow!("no such file").context("reading program.word");
        let diagnostic =
            diagnostic_from_anyhow(DiagnosticStage::Io, "WORDS-IO-001", "failed to load", &error);
        assert_eq!(diagnostic.message, "failed to load: reading program.word");
        assert_eq!(diagnostic.notes, vec!["caused by: no such file".to_string()]);
    }
}
