use crate::lexer::Span;
use chumsky::span::Span as _;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
	Add,
	Sub,
	Mul,
	Div,
	Pow,
	Lt,
	Le,
	Gt,
	Ge,
	Eq,
	Ne,
	Shl,
	Shr,
}

impl BinaryOp {
	pub fn symbol(&self) -> &'static str {
		match self {
			Self::Add => "+",
			Self::Sub => "-",
			Self::Mul => "*",
			Self::Div => "/",
			Self::Pow => "**",
			Self::Lt => "<",
			Self::Le => "<=",
			Self::Gt => ">",
			Self::Ge => ">=",
			Self::Eq => "==",
			Self::Ne => "!=",
			Self::Shl => "<<",
			Self::Shr => ">>",
		}
	}
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum UnaryOp {
	Neg,
	Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Int(i32),
	Float(f64),
	Str(String),
	Var(String),
	Call { name: String, args: Vec<Expr> },
	Binary { lhs: Box<Expr>, op: BinaryOp, rhs: Box<Expr> },
	Unary { op: UnaryOp, expr: Box<Expr> },
}

/// A node of the syntax tree together with the source range it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
	pub node: Node,
	pub span: Span,
}

impl Expr {
	pub fn new(node: Node, span: Span) -> Self {
		Self { node, span }
	}

	pub(crate) fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Self {
		let span = (lhs.span.start()..rhs.span.end()).into();
		Self::new(
			Node::Binary {
				lhs: Box::new(lhs),
				op,
				rhs: Box::new(rhs),
			},
			span,
		)
	}
}

/// Prints the tree as an s-expression, e.g. `(+ 2 (* 3 4))`.
impl fmt::Display for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.node {
			Node::Int(value) => write!(f, "{value}"),
			Node::Float(value) => write!(f, "{value:?}"),
			Node::Str(value) => write!(f, "{value:?}"),
			Node::Var(name) => f.write_str(name),
			Node::Call { name, args } => {
				write!(f, "({name}")?;
				for arg in args {
					write!(f, " {arg}")?;
				}
				f.write_str(")")
			}
			Node::Binary { lhs, op, rhs } => write!(f, "({} {lhs} {rhs})", op.symbol()),
			Node::Unary { op: UnaryOp::Neg, expr } => write!(f, "(- {expr})"),
			Node::Unary { op: UnaryOp::Pos, expr } => write!(f, "(+ {expr})"),
		}
	}
}
