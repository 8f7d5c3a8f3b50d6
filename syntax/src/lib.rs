//! Lexing and parsing of XMILE variable equations into an [`AstNode`]
//! tree. Owns nothing outside the tree it returns: name resolution
//! and built-in binding happen later, in the annotation pass.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{AVarId, AstNode, BuiltinId};
pub use lexer::Lexer;
pub use parser::parse_equation;
pub use token::{Token, TokenKind};
