use crate::ast::{BinaryOp, Expr, Node, UnaryOp};
use crate::diagnostic::{CompileError, make_compile_error};
use crate::lexer::{INT_LITERAL_LIMIT, Span, Token, lexer};
use chumsky::input::ValueInput;
use chumsky::prelude::*;
use chumsky::span::Span as _;

impl Expr {
	pub fn try_parse_from_str(src: &str) -> Result<Expr, CompileError> {
		let tokens = lexer().parse(src).into_result().map_err(make_compile_error)?;
		let eoi: Span = (src.len()..src.len()).into();
		parser().parse(tokens.as_slice().map(eoi, |(token, span)| (token, span))).into_result().map_err(make_compile_error)
	}
}

/// Loosest to tightest: comparison, shift, sum, product, power (right associative), unary sign.
pub fn parser<'tokens, 'src: 'tokens, I>() -> impl Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token<'src>, Span>>> + Clone
where
	I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
	recursive(|expr| {
		let int = select! { Token::Int(value) => value }
			.try_map(|value: i64, span| i32::try_from(value).map(Node::Int).map_err(|_| Rich::custom(span, format!("integer `{value}` does not fit into 32 bits"))));
		let literal = select! {
			Token::Float(value) => Node::Float(value),
			Token::Str(value) => Node::Str(value),
		};
		// `-2147483648` is only representable with its sign
		let smallest_int = just(Token::Minus).ignore_then(select! { Token::Int(value) => value }).try_map(|value: i64, span| {
			if value == INT_LITERAL_LIMIT {
				Ok(Expr::new(Node::Int(i32::MIN), span))
			} else {
				Err(Rich::custom(span, "expected the smallest integer"))
			}
		});

		let ident = select! { Token::Ident(name) => name }.labelled("identifier");

		let args = expr
			.clone()
			.separated_by(just(Token::Comma))
			.allow_trailing()
			.collect::<Vec<_>>()
			.delimited_by(just(Token::LParen), just(Token::RParen));

		let call = ident.clone().then(args).map(|(name, args): (&str, Vec<Expr>)| Node::Call { name: name.to_string(), args });
		let var = ident.map(|name: &str| Node::Var(name.to_string()));

		let parens = expr.clone().delimited_by(just(Token::LParen), just(Token::RParen));
		let atom = choice((int, literal, call, var)).map_with(|node, e| Expr::new(node, e.span())).or(parens).labelled("atom").boxed();

		let unary_op = select! {
			Token::Minus => UnaryOp::Neg,
			Token::Plus => UnaryOp::Pos,
		}
		.map_with(|op, e| (op, e.span()));
		let unary = smallest_int
			.or(unary_op.repeated().foldr(atom, |(op, span): (UnaryOp, Span), expr: Expr| {
				let span = (span.start()..expr.span.end()).into();
				Expr::new(Node::Unary { op, expr: Box::new(expr) }, span)
			}))
			.boxed();

		let power = recursive(|power| {
			unary.clone().then(just(Token::Power).ignore_then(power).or_not()).map(|(lhs, rhs): (Expr, Option<Expr>)| match rhs {
				Some(rhs) => Expr::binary(lhs, BinaryOp::Pow, rhs),
				None => lhs,
			})
		})
		.boxed();

		let product_op = select! {
			Token::Star => BinaryOp::Mul,
			Token::Slash => BinaryOp::Div,
		};
		let product = power.clone().foldl(product_op.then(power).repeated(), |lhs, (op, rhs)| Expr::binary(lhs, op, rhs)).boxed();

		let sum_op = select! {
			Token::Plus => BinaryOp::Add,
			Token::Minus => BinaryOp::Sub,
		};
		let sum = product.clone().foldl(sum_op.then(product).repeated(), |lhs, (op, rhs)| Expr::binary(lhs, op, rhs)).boxed();

		let shift_op = select! {
			Token::ShiftLeft => BinaryOp::Shl,
			Token::ShiftRight => BinaryOp::Shr,
		};
		let shift = sum.clone().foldl(shift_op.then(sum).repeated(), |lhs, (op, rhs)| Expr::binary(lhs, op, rhs)).boxed();

		let comparison_op = select! {
			Token::Less => BinaryOp::Lt,
			Token::LessEqual => BinaryOp::Le,
			Token::Greater => BinaryOp::Gt,
			Token::GreaterEqual => BinaryOp::Ge,
			Token::Equal => BinaryOp::Eq,
			Token::NotEqual => BinaryOp::Ne,
		};
		shift.clone().foldl(comparison_op.then(shift).repeated(), |lhs, (op, rhs)| Expr::binary(lhs, op, rhs))
	})
}
