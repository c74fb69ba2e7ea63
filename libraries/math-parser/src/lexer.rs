use chumsky::prelude::*;
use chumsky::span::SimpleSpan;
use chumsky::text;
use std::fmt;

pub type Span = SimpleSpan;

/// Magnitude of `i32::MIN`. Integer literals may reach it so that a leading minus can produce the smallest integer.
pub const INT_LITERAL_LIMIT: i64 = 1 << 31;

#[derive(Clone, Debug, PartialEq)]
pub enum Token<'src> {
	// literals
	Int(i64),
	Float(f64),
	Str(String),
	Ident(&'src str),
	// punctuation
	LParen,
	RParen,
	Comma,
	Plus,
	Minus,
	Star,
	Slash,
	Power,
	ShiftLeft,
	ShiftRight,
	// comparison
	Less,
	LessEqual,
	Greater,
	GreaterEqual,
	Equal,
	NotEqual,
}

impl fmt::Display for Token<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(value) => write!(f, "{value}"),
			Self::Float(value) => write!(f, "{value:?}"),
			Self::Str(value) => write!(f, "{value:?}"),
			Self::Ident(name) => f.write_str(name),
			Self::LParen => f.write_str("("),
			Self::RParen => f.write_str(")"),
			Self::Comma => f.write_str(","),
			Self::Plus => f.write_str("+"),
			Self::Minus => f.write_str("-"),
			Self::Star => f.write_str("*"),
			Self::Slash => f.write_str("/"),
			Self::Power => f.write_str("**"),
			Self::ShiftLeft => f.write_str("<<"),
			Self::ShiftRight => f.write_str(">>"),
			Self::Less => f.write_str("<"),
			Self::LessEqual => f.write_str("<="),
			Self::Greater => f.write_str(">"),
			Self::GreaterEqual => f.write_str(">="),
			Self::Equal => f.write_str("=="),
			Self::NotEqual => f.write_str("!="),
		}
	}
}

pub fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<(Token<'src>, Span)>, extra::Err<Rich<'src, char, Span>>> {
	// A literal with a fraction or an exponent is a float, everything else an integer
	let digits = text::digits(10);
	let number = text::int(10)
		.then(just('.').then(digits.clone()).or_not())
		.then(one_of("eE").then(one_of("+-").or_not()).then(digits).or_not())
		.to_slice()
		.try_map(|literal: &str, span| {
			if literal.contains(['.', 'e', 'E']) {
				literal.parse().map(Token::Float).map_err(|_| Rich::custom(span, format!("invalid number `{literal}`")))
			} else {
				match literal.parse::<i64>() {
					Ok(value) if value <= INT_LITERAL_LIMIT => Ok(Token::Int(value)),
					_ => Err(Rich::custom(span, format!("integer `{literal}` does not fit into 32 bits"))),
				}
			}
		});

	let escape = just('\\').ignore_then(choice((just('\\'), just('"'), just('n').to('\n'), just('t').to('\t'))));
	let string = none_of("\\\"").or(escape).repeated().collect::<String>().delimited_by(just('"'), just('"')).map(Token::Str);

	// Two character operators have to be tried first
	let operator = choice((
		just("**").to(Token::Power),
		just("<<").to(Token::ShiftLeft),
		just(">>").to(Token::ShiftRight),
		just("<=").to(Token::LessEqual),
		just(">=").to(Token::GreaterEqual),
		just("==").to(Token::Equal),
		just("!=").to(Token::NotEqual),
		just('<').to(Token::Less),
		just('>').to(Token::Greater),
		just('(').to(Token::LParen),
		just(')').to(Token::RParen),
		just(',').to(Token::Comma),
		just('+').to(Token::Plus),
		just('-').to(Token::Minus),
		just('*').to(Token::Star),
		just('/').to(Token::Slash),
	));

	let ident = text::ident().map(Token::Ident);

	choice((number, string, operator, ident)).map_with(|token, e| (token, e.span())).padded().repeated().collect().padded()
}

#[cfg(test)]
mod test {
	use super::*;
	use chumsky::span::Span as _;
	use pretty_assertions::assert_eq;

	fn tokens(src: &str) -> Vec<Token<'_>> {
		lexer().parse(src).into_result().unwrap().into_iter().map(|(token, _)| token).collect()
	}

	#[test]
	fn longest_operator_wins() {
		assert_eq!(tokens("a**b<=c<<1"), vec![
			Token::Ident("a"),
			Token::Power,
			Token::Ident("b"),
			Token::LessEqual,
			Token::Ident("c"),
			Token::ShiftLeft,
			Token::Int(1)
		]);
		assert_eq!(tokens("1 < 2 > 3 != 4"), vec![
			Token::Int(1),
			Token::Less,
			Token::Int(2),
			Token::Greater,
			Token::Int(3),
			Token::NotEqual,
			Token::Int(4)
		]);
	}

	#[test]
	fn numbers() {
		assert_eq!(tokens("12 2.5 1e3 4E-1"), vec![Token::Int(12), Token::Float(2.5), Token::Float(1000.), Token::Float(0.4)]);
		assert!(lexer().parse("99999999999").into_result().is_err());
		assert_eq!(tokens("-2147483648"), vec![Token::Minus, Token::Int(2147483648)]);
		assert!(lexer().parse("2147483649").into_result().is_err());
	}

	#[test]
	fn strings_with_escapes() {
		assert_eq!(tokens(r#""a\"b" + "\\n""#), vec![Token::Str("a\"b".into()), Token::Plus, Token::Str("\\n".into())]);
		assert_eq!(tokens(r#""line\n""#), vec![Token::Str("line\n".into())]);
	}

	#[test]
	fn spans_are_byte_ranges() {
		let tokens = lexer().parse("  foo + 1").into_result().unwrap();
		let spans: Vec<_> = tokens.iter().map(|(_, span)| span.start()..span.end()).collect();
		assert_eq!(spans, vec![2..5, 6..7, 8..9]);
	}

	#[test]
	fn unknown_characters_fail() {
		assert!(lexer().parse("1 $ 2").into_result().is_err());
	}
}
