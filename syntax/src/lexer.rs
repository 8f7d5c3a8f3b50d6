use std::rc::Rc;

use sdsim_common::{Source, Span};

use crate::token::{word_operator, Token, TokenKind, RESERVED_WORDS};

/// Turns an equation string into a forward-only stream of [`Token`]s
/// with one-token lookahead.
///
/// The entire source is lower-cased once, up front (Unicode-aware),
/// so every subsequent comparison - reserved words, word operators,
/// identifier lookup - is case-insensitive for free.
pub struct Lexer {
    source: Rc<Source>,
    chars: Vec<char>,
    pos: usize,
    line: u16,
    col: u16,
    peeked: Option<Token>,
}

const OP_CHARS: &str = "+-*/^<>=!&|%(),";

impl Lexer {
    pub fn new(source: Rc<Source>) -> Lexer {
        let lowered = source.contents.to_lowercase();
        Lexer {
            source,
            chars: lowered.chars().collect(),
            pos: 0,
            line: 0,
            col: 0,
            peeked: None,
        }
    }

    pub fn from_str(equation: &str) -> Lexer {
        Lexer::new(Source::anonymous(equation))
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan());
        }
        self.peeked.clone().unwrap()
    }

    /// Consumes and returns the next token.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.scan()
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    /// Skips Unicode whitespace and `{ ... }` comments. An
    /// unterminated comment silently consumes the remainder of the
    /// input rather than raising an error - the caller only ever
    /// finds out via a subsequent failed parse.
    fn skip_trivia(&mut self) {
        loop {
            match self.current() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('{') => {
                    while let Some(c) = self.advance() {
                        if c == '}' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_trivia();
        let (line, col) = (self.line, self.col);

        let Some(c) = self.current() else {
            return Token::eof(line, col);
        };

        if c.is_ascii_digit() || c == '.' {
            return self.scan_number(line, col);
        }
        if c.is_alphabetic() || c == '_' || c == '"' {
            return self.scan_ident(line, col);
        }

        self.scan_punct(line, col)
    }

    /// Numbers match `\d*(\.\d*)?(e\d*(\.\d*)?)?`, greedily; a second
    /// `.` or `e` ends the token.
    fn scan_number(&mut self, line: u16, col: u16) -> Token {
        let mut text = String::new();

        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        if self.current() == Some('.') {
            text.push(self.advance().unwrap());
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        if self.current() == Some('e') {
            text.push(self.advance().unwrap());
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
            if self.current() == Some('.') {
                text.push(self.advance().unwrap());
                while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                    text.push(self.advance().unwrap());
                }
            }
        }

        Token::new(TokenKind::Number, text, line, col)
    }

    /// Identifiers start with an alphabetic rune, `_`, or a `"`; a
    /// quoted identifier may contain internal whitespace up to the
    /// closing quote.
    fn scan_ident(&mut self, line: u16, col: u16) -> Token {
        let mut text = String::new();

        if self.current() == Some('"') {
            self.advance();
            while let Some(c) = self.current() {
                if c == '"' {
                    self.advance();
                    break;
                }
                text.push(self.advance().unwrap());
            }
            return Token::new(TokenKind::Ident, text, line, col);
        }

        while matches!(self.current(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap());
        }

        if RESERVED_WORDS.contains(&text.as_str()) {
            return Token::new(TokenKind::Reserved, text, line, col);
        }
        if let Some(rewritten) = word_operator(&text) {
            return Token::new(TokenKind::Punct, rewritten, line, col);
        }
        Token::new(TokenKind::Ident, text, line, col)
    }

    /// Handles `>=`, `<=`, `<>` rewrites and single-rune punctuation.
    /// `==` is kept as-is.
    fn scan_punct(&mut self, line: u16, col: u16) -> Token {
        let c = self.advance().unwrap();

        let rewritten = match (c, self.current()) {
            ('>', Some('=')) => Some("\u{2265}"), // ≥
            ('<', Some('=')) => Some("\u{2264}"), // ≤
            ('<', Some('>')) => Some("\u{2260}"), // ≠
            _ => None,
        };
        if let Some(text) = rewritten {
            self.advance();
            return Token::new(TokenKind::Punct, text, line, col);
        }

        let _ = OP_CHARS; // documents the expected punctuation alphabet
        Token::new(TokenKind::Punct, c.to_string(), line, col)
    }
}

/// Convenience span for a just-produced token.
pub fn token_span(lexer: &Lexer, tok: &Token) -> Span {
    Span::new(lexer.source(), tok.line, tok.col, tok.text.chars().count().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::from_str(src);
        let mut out = vec![];
        loop {
            let tok = lexer.next_token();
            if tok.is_eof() {
                break;
            }
            out.push((tok.kind, tok.text));
        }
        out
    }

    #[test]
    fn reserved_and_call() {
        let toks = kinds("IF value THEN MAX(flow, 1) ELSE flow");
        assert_eq!(toks[0], (TokenKind::Reserved, "if".to_string()));
        assert_eq!(toks[1], (TokenKind::Ident, "value".to_string()));
        assert_eq!(toks[2], (TokenKind::Reserved, "then".to_string()));
        assert_eq!(toks[3], (TokenKind::Ident, "max".to_string()));
        assert_eq!(toks[4], (TokenKind::Punct, "(".to_string()));
        assert_eq!(toks[9], (TokenKind::Reserved, "else".to_string()));
    }

    #[test]
    fn comparison_rewrites() {
        assert_eq!(
            kinds("3 <= 4"),
            vec![
                (TokenKind::Number, "3".to_string()),
                (TokenKind::Punct, "\u{2264}".to_string()),
                (TokenKind::Number, "4".to_string()),
            ]
        );
        assert_eq!(
            kinds("3 <> 4"),
            vec![
                (TokenKind::Number, "3".to_string()),
                (TokenKind::Punct, "\u{2260}".to_string()),
                (TokenKind::Number, "4".to_string()),
            ]
        );
    }

    #[test]
    fn word_operators_become_single_rune() {
        assert_eq!(
            kinds("a and b or not c"),
            vec![
                (TokenKind::Ident, "a".to_string()),
                (TokenKind::Punct, "&".to_string()),
                (TokenKind::Ident, "b".to_string()),
                (TokenKind::Punct, "|".to_string()),
                (TokenKind::Punct, "!".to_string()),
                (TokenKind::Ident, "c".to_string()),
            ]
        );
    }

    #[test]
    fn unterminated_comment_consumes_rest() {
        assert_eq!(kinds("1 + {comment never closes"), vec![
            (TokenKind::Number, "1".to_string()),
            (TokenKind::Punct, "+".to_string()),
        ]);
    }

    #[test]
    fn quoted_identifier_with_whitespace() {
        let toks = kinds("\"my variable\" + 1");
        assert_eq!(toks[0], (TokenKind::Ident, "my variable".to_string()));
    }
}
