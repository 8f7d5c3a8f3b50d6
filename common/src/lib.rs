//! Source representation, spans, and diagnostics shared by the
//! lexer, parser, and simulation core.

pub mod diagnostics;
pub mod source;
pub mod span;

pub use diagnostics::{Diagnostic, ErrorCode, Note};
pub use source::Source;
pub use span::{Span, Spanned};
