use std::fmt;

use crate::span::Span;

/// Negative error codes handed back across the public API, matching
/// the codes a caller embedding this crate from C or another host
/// language would switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    NoError = 0,
    NoMem = -1,
    BadFile = -2,
    Unspecified = -3,
    BadXml = -4,
    BadLex = -5,
    Eof = -6,
    Circular = -7,
}

/// A note attached to a diagnostic: a location plus an optional hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub span: Span,
    pub hint: Option<String>,
}

impl Note {
    pub fn new(span: Span) -> Note {
        Note { span, hint: None }
    }

    pub fn with_hint(span: Span, hint: impl Into<String>) -> Note {
        Note {
            span,
            hint: Some(hint.into()),
        }
    }
}

/// A single compile-time failure: a reason plus the notes pointing
/// at where it happened. Parser and annotation errors both collect
/// these rather than failing on the first one, so a caller sees every
/// problem with a variable's equation at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub reason: String,
    pub code: ErrorCode,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, reason: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic {
            reason: reason.into(),
            code,
            notes: vec![Note::new(span)],
        }
    }

    pub fn with_hint(
        code: ErrorCode,
        reason: impl Into<String>,
        span: Span,
        hint: impl Into<String>,
    ) -> Diagnostic {
        Diagnostic {
            reason: reason.into(),
            code,
            notes: vec![Note::with_hint(span, hint)],
        }
    }

    pub fn add_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for note in &self.notes {
            writeln!(f, "{}", note.span)?;
            if let Some(hint) = &note.hint {
                writeln!(f, "  = note: {}", hint)?;
            }
        }
        write!(f, "error: {}", self.reason)
    }
}

impl std::error::Error for Diagnostic {}
