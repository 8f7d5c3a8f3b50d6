use std::rc::Rc;

/// Some literal source text: the equation string of a single
/// variable, or (for diagnostics) a whole model file.
///
/// `Source` is always handed out behind an `Rc` since a single
/// equation may be lexed, parsed, and re-parsed on `reset` without
/// ever mutating the text it came from.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: String,
    pub name: String,
}

impl Source {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Rc<Source> {
        Rc::new(Source {
            contents: contents.into(),
            name: name.into(),
        })
    }

    /// A source with no meaningful name, e.g. a standalone equation
    /// under test.
    pub fn anonymous(contents: impl Into<String>) -> Rc<Source> {
        Source::new("<equation>", contents)
    }
}
