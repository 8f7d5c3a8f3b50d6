use sdsim_common::{Diagnostic, ErrorCode, Spanned};

use crate::ast::AstNode;
use crate::lexer::{token_span, Lexer};
use crate::token::TokenKind;

/// Binary operator levels, loosest to tightest. `^` (the last level)
/// is right-associative; every other level is left-associative. This
/// mirrors the grammar directly: `expr(k) := expr(k+1) (BINARY[k]
/// expr(k+1))*`, bottoming out in `fact` once every level is spent.
const LEVELS: &[&[char]] = &[
    &['|'],
    &['&'],
    &['=', '\u{2260}'],
    &['>', '<', '\u{2265}', '\u{2264}'],
    &['+', '-'],
    &['*', '/', '%'],
    &['!'],
    &['^'],
];

/// Parses a single equation string into an [`AstNode`] tree.
///
/// On failure, every error encountered is collected and returned;
/// there is no error recovery, so the caller should discard whatever
/// partial tree state this parse touched.
pub fn parse_equation(equation: &str) -> Result<Spanned<AstNode>, Vec<Diagnostic>> {
    let mut parser = Parser {
        lexer: Lexer::from_str(equation),
        errors: vec![],
    };
    match parser.expr(0) {
        Some(ast) if parser.errors.is_empty() => Ok(ast),
        _ => Err(parser.errors),
    }
}

struct Parser {
    lexer: Lexer,
    errors: Vec<Diagnostic>,
}

impl Parser {
    fn error(&mut self, reason: impl Into<String>) {
        let tok = self.lexer.peek();
        let span = token_span(&self.lexer, &tok);
        self.errors.push(Diagnostic::new(ErrorCode::Unspecified, reason, span));
    }

    /// `expr(k) := expr(k+1) (BINARY[k] expr(k+1))*`
    fn expr(&mut self, level: usize) -> Option<Spanned<AstNode>> {
        if level == LEVELS.len() {
            return self.fact();
        }

        let mut left = self.expr(level + 1)?;
        let ops = LEVELS[level];
        let right_assoc = level + 1 == LEVELS.len();

        loop {
            let tok = self.lexer.peek();
            if tok.kind != TokenKind::Punct || tok.text.chars().count() != 1 {
                break;
            }
            let op = tok.text.chars().next().unwrap();
            if !ops.contains(&op) {
                break;
            }
            self.lexer.next_token();

            let right = if right_assoc {
                self.expr(level)?
            } else {
                self.expr(level + 1)?
            };

            let span = sdsim_common::Span::combine(&left.span, &right.span);
            left = Spanned::new(
                AstNode::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Some(left)
    }

    /// ```text
    /// fact := "(" expr(0) ")"
    ///       | UNARY fact
    ///       | NUMBER
    ///       | "if" expr "then" expr ("else" expr)?
    ///       | IDENT ("(" args ")")?
    /// ```
    fn fact(&mut self) -> Option<Spanned<AstNode>> {
        let tok = self.lexer.peek();
        let span = token_span(&self.lexer, &tok);

        match tok.kind {
            TokenKind::Punct if tok.text == "(" => {
                self.lexer.next_token();
                let inner = self.expr(0)?;
                self.expect_punct(")")?;
                let peeked = self.lexer.peek();
                let end = token_span(&self.lexer, &peeked);
                Some(Spanned::new(
                    AstNode::Paren {
                        inner: Box::new(inner),
                    },
                    sdsim_common::Span::combine(&span, &end),
                ))
            }
            TokenKind::Punct if matches!(tok.text.as_str(), "+" | "-" | "!") => {
                self.lexer.next_token();
                let op = tok.text.chars().next().unwrap();
                let operand = self.fact()?;
                let combined = sdsim_common::Span::combine(&span, &operand.span);
                Some(Spanned::new(
                    AstNode::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    combined,
                ))
            }
            TokenKind::Number => {
                self.lexer.next_token();
                let value: f64 = tok.text.parse().unwrap_or(f64::NAN);
                Some(Spanned::new(
                    AstNode::FloatLit {
                        value,
                        literal: tok.text,
                    },
                    span,
                ))
            }
            TokenKind::Reserved if tok.text == "if" => self.if_expr(),
            TokenKind::Ident => self.ident_or_call(),
            TokenKind::Eof => {
                self.error("expected an expression but reached the end of the equation");
                None
            }
            _ => {
                self.error(format!("unexpected token {}", tok));
                None
            }
        }
    }

    fn if_expr(&mut self) -> Option<Spanned<AstNode>> {
        let peeked = self.lexer.peek();
        let start = token_span(&self.lexer, &peeked);
        self.lexer.next_token(); // "if"
        let cond = self.expr(0)?;
        self.expect_reserved("then")?;
        let then_branch = self.expr(0)?;

        let (else_branch, end_span) = if self.peek_reserved("else") {
            self.lexer.next_token();
            let branch = self.expr(0)?;
            let span = branch.span.clone();
            (Some(Box::new(branch)), span)
        } else {
            (None, then_branch.span.clone())
        };

        let span = sdsim_common::Span::combine(&start, &end_span);
        Some(Spanned::new(
            AstNode::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        ))
    }

    fn ident_or_call(&mut self) -> Option<Spanned<AstNode>> {
        let tok = self.lexer.next_token();
        let span = token_span(&self.lexer, &tok);

        if self.peek_punct("(") {
            self.lexer.next_token();
            let mut args = vec![];
            if !self.peek_punct(")") {
                loop {
                    args.push(self.expr(0)?);
                    if self.peek_punct(",") {
                        self.lexer.next_token();
                        continue;
                    }
                    break;
                }
            }
            let peeked = self.lexer.peek();
            let close = token_span(&self.lexer, &peeked);
            self.expect_punct(")")?;
            return Some(Spanned::new(
                AstNode::call(tok.text, args),
                sdsim_common::Span::combine(&span, &close),
            ));
        }

        Some(Spanned::new(AstNode::ident(tok.text), span))
    }

    fn peek_punct(&mut self, text: &str) -> bool {
        let tok = self.lexer.peek();
        tok.kind == TokenKind::Punct && tok.text == text
    }

    fn peek_reserved(&mut self, text: &str) -> bool {
        let tok = self.lexer.peek();
        tok.kind == TokenKind::Reserved && tok.text == text
    }

    fn expect_punct(&mut self, text: &str) -> Option<()> {
        if self.peek_punct(text) {
            self.lexer.next_token();
            Some(())
        } else {
            let tok = self.lexer.peek();
            self.error(format!("expected `{}`, found {}", text, tok));
            None
        }
    }

    fn expect_reserved(&mut self, text: &str) -> Option<()> {
        if self.peek_reserved(text) {
            self.lexer.next_token();
            Some(())
        } else {
            let tok = self.lexer.peek();
            self.error(format!("expected `{}`, found {}", text, tok));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_plus_ident() {
        let ast = parse_equation("3.2 + \u{e5}bc").unwrap();
        match ast.item {
            AstNode::Binary { op, left, right } => {
                assert_eq!(op, '+');
                assert!(matches!(left.item, AstNode::FloatLit { .. }));
                assert!(matches!(right.item, AstNode::Ident { .. }));
            }
            other => panic!("expected Binary, got {other:?}"),
        }
    }

    #[test]
    fn power_is_right_associative() {
        // a^b^c should parse as a^(b^c)
        let ast = parse_equation("a^b^c").unwrap();
        match ast.item {
            AstNode::Binary { op: '^', left, right } => {
                assert!(matches!(left.item, AstNode::Ident { .. }));
                assert!(matches!(right.item, AstNode::Binary { op: '^', .. }));
            }
            other => panic!("expected right-associative ^, got {other:?}"),
        }
    }

    #[test]
    fn comparison_chain_is_left_associative() {
        // a < b < c should parse as (a<b)<c
        let ast = parse_equation("a < b < c").unwrap();
        match ast.item {
            AstNode::Binary { op, left, .. } => {
                assert_eq!(op, '<');
                assert!(matches!(left.item, AstNode::Binary { op: '<', .. }));
            }
            other => panic!("expected left-associative <, got {other:?}"),
        }
    }

    #[test]
    fn if_then_without_else_defaults_later_to_nan() {
        let ast = parse_equation("if value then 1").unwrap();
        match ast.item {
            AstNode::If { else_branch, .. } => assert!(else_branch.is_none()),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn call_with_arguments() {
        let ast = parse_equation("max(flow, 1)").unwrap();
        match ast.item {
            AstNode::Call { callee_name, args, .. } => {
                assert_eq!(callee_name, "max");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_paren_is_an_error() {
        assert!(parse_equation("(1 + 2").is_err());
    }

    #[test]
    fn empty_equation_is_an_error() {
        assert!(parse_equation("").is_err());
    }
}
