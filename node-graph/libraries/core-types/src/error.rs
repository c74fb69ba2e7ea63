use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MFError {
	#[error("parameter {index} of `{function}` expects {expected}, but {found} was provided")]
	SignatureMismatch { function: String, index: usize, expected: String, found: String },
	#[error("`{function}` only takes {expected} parameters")]
	TooManyParams { function: String, expected: usize },
	#[error("`{function}` expects {expected} parameters, but only {found} were provided")]
	MissingParams { function: String, expected: usize, found: usize },
	#[error("parameter `{name}` of size {size} is smaller than the required array size {min_array_size}")]
	ArrayTooSmall { name: String, size: usize, min_array_size: usize },
	#[error("index mask is not strictly increasing at position {position}")]
	MaskNotStrictlyIncreasing { position: usize },
}
