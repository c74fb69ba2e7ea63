use crate::lexer::Span;
use chumsky::error::Rich;
use chumsky::span::Span as _;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{
	self,
	termcolor::{Buffer, ColorChoice, StandardStream},
};
use std::fmt;
use std::ops::Range;

/// An error in an expression, located by byte ranges into its source.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
	pub message: String,
	pub span: Range<usize>,
	/// Further locations related to the error.
	pub labels: Vec<(String, Range<usize>)>,
}

impl CompileError {
	pub fn new(message: impl Into<String>, span: Span) -> Self {
		Self {
			message: message.into(),
			span: span.start()..span.end(),
			labels: Vec::new(),
		}
	}

	pub fn with_label(mut self, message: impl Into<String>, span: Span) -> Self {
		self.labels.push((message.into(), span.start()..span.end()));
		self
	}

	pub fn diagnostic(&self) -> Diagnostic<()> {
		let mut labels = vec![Label::primary((), self.span.clone()).with_message(self.message.clone())];
		for (message, span) in &self.labels {
			labels.push(Label::secondary((), span.clone()).with_message(message.clone()));
		}
		Diagnostic::error().with_message(self.message.clone()).with_labels(labels)
	}

	/// Renders the error with the offending part of `src` underlined.
	pub fn render(&self, src: &str) -> String {
		let file = SimpleFile::new("expression", src);
		let mut buffer = Buffer::no_color();
		if let Err(error) = term::emit(&mut buffer, &term::Config::default(), &file, &self.diagnostic()) {
			log::warn!("Failed to render expression error: {error}");
			return self.message.clone();
		}
		String::from_utf8_lossy(buffer.as_slice()).into_owned()
	}

	pub fn print(&self, src: &str) {
		let file = SimpleFile::new("expression", src);
		let writer = StandardStream::stderr(ColorChoice::Auto);
		if let Err(error) = term::emit(&mut writer.lock(), &term::Config::default(), &file, &self.diagnostic()) {
			log::warn!("Failed to print expression error: {error}");
		}
	}
}

/// The first error becomes the primary message, the remaining ones are attached as labels.
pub(crate) fn make_compile_error<T: fmt::Display>(errors: Vec<Rich<'_, T, Span>>) -> CompileError {
	let mut errors = errors.into_iter();
	let Some(first) = errors.next() else {
		return CompileError::new("invalid expression", (0..0).into());
	};
	errors.fold(CompileError::new(first.to_string(), *first.span()), |error, other| error.with_label(other.to_string(), *other.span()))
}
