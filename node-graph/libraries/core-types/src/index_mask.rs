use crate::error::MFError;
use std::ops::Range;

/// A contiguous range of element indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexRange {
	pub start: usize,
	pub size: usize,
}

impl IndexRange {
	pub fn new(start: usize, size: usize) -> Self {
		Self { start, size }
	}

	pub fn end(&self) -> usize {
		self.start + self.size
	}

	pub fn as_range(&self) -> Range<usize> {
		self.start..self.end()
	}
}

impl From<Range<usize>> for IndexRange {
	fn from(range: Range<usize>) -> Self {
		Self::new(range.start, range.end.saturating_sub(range.start))
	}
}

/// Selects the element indices of a batched call that are semantically meaningful.
///
/// Indices are always strictly increasing. A multi-function receives arrays of at least [`IndexMask::min_array_size`] elements
/// and must only read or write at the selected indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexMask<'a> {
	Range(IndexRange),
	Indices(&'a [usize]),
}

impl<'a> IndexMask<'a> {
	/// The mask `0..size`.
	pub fn from_size(size: usize) -> Self {
		Self::Range(IndexRange::new(0, size))
	}

	pub fn from_range(range: Range<usize>) -> Self {
		Self::Range(range.into())
	}

	/// Callers must pass strictly increasing indices, use [`IndexMask::try_from_indices`] to validate untrusted input.
	pub fn from_indices(indices: &'a [usize]) -> Self {
		debug_assert!(Self::check_strictly_increasing(indices).is_ok(), "mask indices must be strictly increasing: {indices:?}");
		Self::Indices(indices)
	}

	pub fn try_from_indices(indices: &'a [usize]) -> Result<Self, MFError> {
		Self::check_strictly_increasing(indices)?;
		Ok(Self::Indices(indices))
	}

	fn check_strictly_increasing(indices: &[usize]) -> Result<(), MFError> {
		match indices.windows(2).position(|pair| pair[0] >= pair[1]) {
			Some(position) => Err(MFError::MaskNotStrictlyIncreasing { position: position + 1 }),
			None => Ok(()),
		}
	}

	pub fn indices_amount(&self) -> usize {
		match self {
			Self::Range(range) => range.size,
			Self::Indices(indices) => indices.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.indices_amount() == 0
	}

	/// Smallest array size that can be indexed by every index in the mask.
	pub fn min_array_size(&self) -> usize {
		self.last().map_or(0, |last| last + 1)
	}

	pub fn last(&self) -> Option<usize> {
		match self {
			Self::Range(range) if range.size == 0 => None,
			Self::Range(range) => Some(range.end() - 1),
			Self::Indices(indices) => indices.last().copied(),
		}
	}

	pub fn is_range(&self) -> bool {
		match self {
			Self::Range(_) => true,
			Self::Indices(indices) => indices.last().is_none_or(|&last| last + 1 - indices[0] == indices.len()),
		}
	}

	/// Returns the contiguous range covered by this mask, if there is one.
	pub fn as_range(&self) -> Option<IndexRange> {
		match self {
			Self::Range(range) => Some(*range),
			Self::Indices([]) => Some(IndexRange::default()),
			Self::Indices(indices) if self.is_range() => Some(IndexRange::new(indices[0], indices.len())),
			Self::Indices(_) => None,
		}
	}

	pub fn iter(&self) -> Iter<'a> {
		match *self {
			Self::Range(range) => Iter::Range(range.as_range()),
			Self::Indices(indices) => Iter::Indices(indices.iter()),
		}
	}

	pub fn foreach_index(&self, mut f: impl FnMut(usize)) {
		match self.as_range() {
			Some(range) => range.as_range().for_each(f),
			None => self.iter().for_each(&mut f),
		}
	}

	pub fn contains(&self, index: usize) -> bool {
		match self {
			Self::Range(range) => range.as_range().contains(&index),
			Self::Indices(indices) => indices.binary_search(&index).is_ok(),
		}
	}
}

impl<'a> From<&'a [usize]> for IndexMask<'a> {
	fn from(indices: &'a [usize]) -> Self {
		Self::from_indices(indices)
	}
}

impl From<Range<usize>> for IndexMask<'_> {
	fn from(range: Range<usize>) -> Self {
		Self::from_range(range)
	}
}

impl<'a> IntoIterator for IndexMask<'a> {
	type Item = usize;
	type IntoIter = Iter<'a>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

pub enum Iter<'a> {
	Range(Range<usize>),
	Indices(std::slice::Iter<'a, usize>),
}

impl Iterator for Iter<'_> {
	type Item = usize;

	fn next(&mut self) -> Option<usize> {
		match self {
			Self::Range(range) => range.next(),
			Self::Indices(indices) => indices.next().copied(),
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		match self {
			Self::Range(range) => range.size_hint(),
			Self::Indices(indices) => indices.size_hint(),
		}
	}
}

impl ExactSizeIterator for Iter<'_> {}
