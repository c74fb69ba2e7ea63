pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, Node, UnaryOp};
pub use diagnostic::CompileError;
pub use lexer::{Span, Token};

use chumsky::Parser;

/// Splits `src` into tokens, each with the byte range it was read from.
pub fn tokenize(src: &str) -> Result<Vec<(Token<'_>, Span)>, CompileError> {
	lexer::lexer().parse(src).into_result().map_err(diagnostic::make_compile_error)
}

pub fn parse(src: &str) -> Result<Expr, CompileError> {
	Expr::try_parse_from_str(src)
}
