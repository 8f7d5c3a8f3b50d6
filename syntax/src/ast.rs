use std::cell::Cell;

use sdsim_common::Spanned;

/// A lightweight index into the annotation layer's variable arena.
/// `AstNode::Ident` carries one of these instead of a direct
/// reference to an `AVar`, since the AST lives in this crate and the
/// annotated variable tree lives in `sdsim-engine` - back-references
/// are resolved as indices rather than borrows, the way the design
/// notes suggest arena storage plus integer indices stand in for a
/// cyclic reference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AVarId(pub u32);

/// Index of a resolved built-in runtime function (`pulse`, `min`,
/// `max`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuiltinId(pub u32);

/// A unary operator: `+`, `-`, or `!` (logical not).
pub type UnaryOp = char;
/// A binary operator, already normalized to a single rune by the
/// lexer: `+ - * / ^ < > \u{2264} \u{2265} = \u{2260} & |`.
pub type BinaryOp = char;

/// One node of a parsed equation. Every non-leaf owns its children
/// exclusively; nothing here is shared. `Ident::bound` and
/// `Call::builtin` are back-references populated exactly once, during
/// annotation, via interior mutability so the annotator can fill them
/// in while only holding a shared reference to the tree.
#[derive(Debug)]
pub enum AstNode {
    FloatLit {
        value: f64,
        literal: String,
    },
    Ident {
        name: String,
        bound: Cell<Option<AVarId>>,
    },
    Paren {
        inner: Box<Spanned<AstNode>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<AstNode>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Spanned<AstNode>>,
        right: Box<Spanned<AstNode>>,
    },
    If {
        cond: Box<Spanned<AstNode>>,
        then_branch: Box<Spanned<AstNode>>,
        else_branch: Option<Box<Spanned<AstNode>>>,
    },
    Call {
        callee_name: String,
        args: Vec<Spanned<AstNode>>,
        builtin: Cell<Option<BuiltinId>>,
    },
}

impl AstNode {
    pub fn ident(name: impl Into<String>) -> AstNode {
        AstNode::Ident {
            name: name.into(),
            bound: Cell::new(None),
        }
    }

    pub fn call(callee_name: impl Into<String>, args: Vec<Spanned<AstNode>>) -> AstNode {
        AstNode::Call {
            callee_name: callee_name.into(),
            args,
            builtin: Cell::new(None),
        }
    }

    /// A pre-order walk over this node and every descendant,
    /// shallowest first. Used by the annotation pass to bind
    /// identifiers and calls, and directly by tests that assert on
    /// tree shape.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a AstNode)) {
        visit(self);
        match self {
            AstNode::FloatLit { .. } | AstNode::Ident { .. } => {}
            AstNode::Paren { inner } => inner.item.walk(visit),
            AstNode::Unary { operand, .. } => operand.item.walk(visit),
            AstNode::Binary { left, right, .. } => {
                left.item.walk(visit);
                right.item.walk(visit);
            }
            AstNode::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.item.walk(visit);
                then_branch.item.walk(visit);
                if let Some(else_branch) = else_branch {
                    else_branch.item.walk(visit);
                }
            }
            AstNode::Call { args, .. } => {
                for arg in args {
                    arg.item.walk(visit);
                }
            }
        }
    }
}
