use super::{GenericArrayRef, GenericVirtualListRef};
use crate::cpp_type::{CppType, CppTypeInfo};
use std::marker::PhantomData;

/// Read-only ragged view: one list of values per element index.
pub enum VirtualListListRef<'a, T> {
	/// The same list for every index.
	SingleArray { array: &'a [T], virtual_list_size: usize },
	/// One `(start, length)` pair per index.
	FullArrayList { starts: &'a [*mut u8], lengths: &'a [usize], _type: PhantomData<&'a T> },
}

impl<T> Clone for VirtualListListRef<'_, T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for VirtualListListRef<'_, T> {}

impl<'a, T> VirtualListListRef<'a, T> {
	pub fn from_single_array(array: &'a [T], virtual_list_size: usize) -> Self {
		Self::SingleArray { array, virtual_list_size }
	}

	pub fn size(&self) -> usize {
		match self {
			Self::SingleArray { virtual_list_size, .. } => *virtual_list_size,
			Self::FullArrayList { lengths, .. } => lengths.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.size() == 0
	}

	pub fn sublist_size(&self, index: usize) -> usize {
		match self {
			Self::SingleArray { array, .. } => array.len(),
			Self::FullArrayList { lengths, .. } => lengths[index],
		}
	}

	pub fn sublist(&self, index: usize) -> &'a [T] {
		debug_assert!(index < self.size());
		match *self {
			Self::SingleArray { array, .. } => array,
			// SAFETY: the pairs come from a vector array that holds `lengths[index]` initialized values at `starts[index]`
			Self::FullArrayList { starts, lengths, .. } => unsafe { std::slice::from_raw_parts(starts[index].cast::<T>(), lengths[index]) },
		}
	}
}

impl<T> std::ops::Index<usize> for VirtualListListRef<'_, T> {
	type Output = [T];

	fn index(&self, index: usize) -> &[T] {
		self.sublist(index)
	}
}

#[derive(Clone, Copy)]
enum Category<'a> {
	SingleArray { data: *const u8, real_array_size: usize },
	FullArrayList { starts: &'a [*mut u8], lengths: &'a [usize] },
}

/// Type-erased [`VirtualListListRef`], the input view of vector sockets.
#[derive(Clone, Copy)]
pub struct GenericVirtualListListRef<'a> {
	ty: &'static CppType,
	virtual_list_size: usize,
	category: Category<'a>,
	_lifetime: PhantomData<&'a ()>,
}

impl<'a> GenericVirtualListListRef<'a> {
	pub fn from_single_array(array: GenericArrayRef<'a>, virtual_list_size: usize) -> Self {
		Self {
			ty: array.ty(),
			virtual_list_size,
			category: Category::SingleArray {
				data: array.buffer(),
				real_array_size: array.size(),
			},
			_lifetime: PhantomData,
		}
	}

	pub fn from_single_slice<T: CppTypeInfo>(array: &'a [T], virtual_list_size: usize) -> Self {
		Self::from_single_array(GenericArrayRef::from_slice(array), virtual_list_size)
	}

	/// # Safety
	/// `starts[i]` must point to `lengths[i]` initialized instances of `ty`, valid for `'a`.
	pub unsafe fn from_full_array_list(ty: &'static CppType, starts: &'a [*mut u8], lengths: &'a [usize]) -> Self {
		debug_assert_eq!(starts.len(), lengths.len());
		Self {
			ty,
			virtual_list_size: lengths.len(),
			category: Category::FullArrayList { starts, lengths },
			_lifetime: PhantomData,
		}
	}

	pub fn ty(&self) -> &'static CppType {
		self.ty
	}

	pub fn size(&self) -> usize {
		self.virtual_list_size
	}

	pub fn is_empty(&self) -> bool {
		self.virtual_list_size == 0
	}

	pub fn sublist_size(&self, index: usize) -> usize {
		match self.category {
			Category::SingleArray { real_array_size, .. } => real_array_size,
			Category::FullArrayList { lengths, .. } => lengths[index],
		}
	}

	pub fn sublist(&self, index: usize) -> GenericArrayRef<'a> {
		debug_assert!(index < self.virtual_list_size);
		// SAFETY: guaranteed by the constructors
		unsafe {
			match self.category {
				Category::SingleArray { data, real_array_size } => GenericArrayRef::from_raw(self.ty, data, real_array_size),
				Category::FullArrayList { starts, lengths } => GenericArrayRef::from_raw(self.ty, starts[index], lengths[index]),
			}
		}
	}

	/// The list at `index` viewed as a virtual list of its own.
	pub fn virtual_sublist(&self, index: usize) -> GenericVirtualListRef<'a> {
		GenericVirtualListRef::from_full_array(self.sublist(index))
	}

	/// The list at `index` repeated to `virtual_size` elements.
	pub fn repeated_sublist(&self, index: usize, virtual_size: usize) -> GenericVirtualListRef<'a> {
		GenericVirtualListRef::from_repeated_array(self.sublist(index), virtual_size)
	}

	pub fn as_typed_ref<T: CppTypeInfo>(&self) -> VirtualListListRef<'a, T> {
		assert!(
			CppType::get::<T>().is_same_or_generalization(self.ty),
			"cannot view lists of type {} as {}",
			self.ty.name(),
			std::any::type_name::<T>()
		);
		match self.category {
			Category::SingleArray { data, real_array_size } => VirtualListListRef::SingleArray {
				// SAFETY: the buffer holds `real_array_size` initialized values of a compatible layout
				array: unsafe { std::slice::from_raw_parts(data.cast::<T>(), real_array_size) },
				virtual_list_size: self.virtual_list_size,
			},
			Category::FullArrayList { starts, lengths } => VirtualListListRef::FullArrayList { starts, lengths, _type: PhantomData },
		}
	}
}

impl std::fmt::Debug for GenericVirtualListListRef<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries((0..self.size()).map(|i| self.sublist(i))).finish()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn single_array_is_shared() {
		let values = [1.0f32, 2.0];
		let list_list = GenericVirtualListListRef::from_single_slice(&values, 3);
		assert_eq!(list_list.size(), 3);
		assert_eq!(list_list.sublist_size(2), 2);
		let typed = list_list.as_typed_ref::<f32>();
		assert_eq!(&typed[1], &values);
		assert_eq!(list_list.repeated_sublist(0, 5).as_typed_ref::<f32>().iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 1.0, 2.0, 1.0]);
	}
}
