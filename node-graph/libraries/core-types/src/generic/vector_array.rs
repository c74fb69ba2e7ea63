use super::{GenericArrayRef, GenericVirtualListListRef, GenericVirtualListRef, MonotonicAllocator};
use crate::cpp_type::{CppType, CppTypeInfo};
use crate::index_mask::IndexMask;
use std::alloc::Layout;
use std::marker::PhantomData;

/// `array_size` independent growable lists sharing one element type.
///
/// Growing a list moves its elements into a new allocation from the monotonic allocator, the old space is only reclaimed when
/// the whole array is dropped.
pub struct GenericVectorArray {
	ty: &'static CppType,
	starts: Vec<*mut u8>,
	lengths: Vec<usize>,
	capacities: Vec<usize>,
	allocator: MonotonicAllocator,
}

impl GenericVectorArray {
	pub fn new(ty: &'static CppType, array_size: usize) -> Self {
		Self {
			ty,
			starts: vec![ty.dangling(); array_size],
			lengths: vec![0; array_size],
			capacities: vec![0; array_size],
			allocator: MonotonicAllocator::new(),
		}
	}

	pub fn ty(&self) -> &'static CppType {
		self.ty
	}

	pub fn size(&self) -> usize {
		self.lengths.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lengths.is_empty()
	}

	pub fn lengths(&self) -> &[usize] {
		&self.lengths
	}

	pub fn capacity(&self, index: usize) -> usize {
		self.capacities[index]
	}

	fn element_ptr(&self, index: usize, element: usize) -> *mut u8 {
		// SAFETY: callers only address elements within the capacity of the list
		unsafe { self.starts[index].add(element * self.ty.size()) }
	}

	fn reserve(&mut self, index: usize, min_capacity: usize) {
		let capacity = self.capacities[index];
		if min_capacity <= capacity {
			return;
		}
		let new_capacity = min_capacity.max(capacity * 2);
		let layout = match Layout::from_size_align(self.ty.size() * new_capacity, self.ty.alignment()) {
			Ok(layout) => layout,
			Err(_) => panic!("list of {new_capacity} values of {} exceeds the address space", self.ty.name()),
		};
		let new_start = self.allocator.allocate(layout);
		// SAFETY: the old and new allocations are distinct and the first `length` elements are initialized
		unsafe { self.ty.relocate_to_uninitialized_n(self.starts[index], new_start, self.lengths[index]) };
		self.starts[index] = new_start;
		self.capacities[index] = new_capacity;
	}

	/// Copies `value` to the end of the list at `index`.
	///
	/// # Safety
	/// `value` must point to an initialized instance of the array's type.
	pub unsafe fn append_single(&mut self, index: usize, value: *const u8) {
		let length = self.lengths[index];
		self.reserve(index, length + 1);
		unsafe { self.ty.copy_to_uninitialized(value, self.element_ptr(index, length)) };
		self.lengths[index] += 1;
	}

	/// Appends every element of `values` to the list at `index`.
	pub fn extend_single(&mut self, index: usize, values: GenericVirtualListRef) {
		assert!(self.ty.is_same_or_generalization(values.ty()), "cannot extend a list of {} with {}", self.ty.name(), values.ty().name());
		let length = self.lengths[index];
		self.reserve(index, length + values.size());
		for i in 0..values.size() {
			// SAFETY: reserved above, the source is initialized
			unsafe { self.ty.copy_to_uninitialized(values.get(i), self.element_ptr(index, length + i)) };
		}
		self.lengths[index] += values.size();
	}

	/// For every masked index, appends the matching list of `values`.
	pub fn extend_multiple(&mut self, mask: IndexMask, values: GenericVirtualListListRef) {
		for index in mask {
			self.extend_single(index, values.virtual_sublist(index));
		}
	}

	pub fn get(&self, index: usize) -> GenericArrayRef<'_> {
		// SAFETY: the first `length` elements of each list are initialized
		unsafe { GenericArrayRef::from_raw(self.ty, self.starts[index], self.lengths[index]) }
	}

	pub fn as_list_list(&self) -> GenericVirtualListListRef<'_> {
		// SAFETY: every `(start, length)` pair describes initialized values owned by `self`
		unsafe { GenericVirtualListListRef::from_full_array_list(self.ty, &self.starts, &self.lengths) }
	}

	pub fn as_typed_ref<T: CppTypeInfo>(&self) -> VectorArrayRef<'_, T> {
		assert!(CppType::get::<T>().is_same_or_generalization(self.ty));
		VectorArrayRef { array: self, _type: PhantomData }
	}

	pub fn as_mutable_typed_ref<T: CppTypeInfo>(&mut self) -> MutableVectorArrayRef<'_, T> {
		assert!(CppType::get::<T>().is_same_or_generalization(self.ty));
		MutableVectorArrayRef { array: self, _type: PhantomData }
	}

	/// Copies the lists at the masked indices into a new array of `array_size` lists.
	pub fn copy_from(values: GenericVirtualListListRef, mask: IndexMask, array_size: usize) -> Self {
		let mut array = Self::new(values.ty(), array_size);
		array.extend_multiple(mask, values);
		array
	}

	/// Destructs all elements of the masked lists, leaving them empty.
	pub fn clear_indices(&mut self, mask: IndexMask) {
		for index in mask {
			// SAFETY: the first `length` elements are initialized and forgotten right after
			unsafe { self.ty.destruct_n(self.starts[index], self.lengths[index]) };
			self.lengths[index] = 0;
		}
	}
}

impl Drop for GenericVectorArray {
	fn drop(&mut self) {
		if self.ty.trivially_destructible() {
			return;
		}
		for (&start, &length) in self.starts.iter().zip(&self.lengths) {
			// SAFETY: the first `length` elements are initialized
			unsafe { self.ty.destruct_n(start, length) };
		}
	}
}

impl std::fmt::Debug for GenericVectorArray {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries((0..self.size()).map(|i| self.get(i))).finish()
	}
}

// SAFETY: registered types are `Send + Sync` and all memory is owned by the array
unsafe impl Send for GenericVectorArray {}
unsafe impl Sync for GenericVectorArray {}

pub struct VectorArrayRef<'a, T> {
	array: &'a GenericVectorArray,
	_type: PhantomData<&'a T>,
}

impl<'a, T: CppTypeInfo> VectorArrayRef<'a, T> {
	pub fn size(&self) -> usize {
		self.array.size()
	}

	pub fn get(&self, index: usize) -> &'a [T] {
		self.array.get(index).as_typed_ref()
	}
}

/// Typed access to a [`GenericVectorArray`] used by vector outputs and mutable vectors.
pub struct MutableVectorArrayRef<'a, T> {
	array: &'a mut GenericVectorArray,
	_type: PhantomData<&'a mut T>,
}

impl<'a, T: CppTypeInfo> MutableVectorArrayRef<'a, T> {
	pub fn size(&self) -> usize {
		self.array.size()
	}

	pub fn get(&self, index: usize) -> &[T] {
		self.array.get(index).as_typed_ref()
	}

	pub fn get_mut(&mut self, index: usize) -> &mut [T] {
		let length = self.array.lengths[index];
		// SAFETY: the list holds `length` initialized values and the array is borrowed mutably
		unsafe { std::slice::from_raw_parts_mut(self.array.starts[index].cast::<T>(), length) }
	}

	pub fn append(&mut self, index: usize, value: T) {
		let length = self.array.lengths[index];
		self.array.reserve(index, length + 1);
		// SAFETY: reserved above
		unsafe { self.array.element_ptr(index, length).cast::<T>().write(value) };
		self.array.lengths[index] += 1;
	}

	pub fn extend(&mut self, index: usize, values: &[T]) {
		self.array.reserve(index, self.array.lengths[index] + values.len());
		for value in values {
			self.append(index, value.clone());
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn lists_grow_independently() {
		let mut array = GenericVectorArray::new(CppType::get::<String>(), 3);
		{
			let mut typed = array.as_mutable_typed_ref::<String>();
			for i in 0..10 {
				typed.append(0, i.to_string());
			}
			typed.append(2, "last".to_string());
		}
		assert_eq!(array.lengths(), &[10, 0, 1]);
		assert!(array.lengths().iter().enumerate().all(|(i, &length)| length <= array.capacity(i)));
		let typed = array.as_typed_ref::<String>();
		assert_eq!(typed.get(0)[7], "7");
		assert!(typed.get(1).is_empty());
		assert_eq!(typed.get(2), &["last".to_string()]);
	}

	#[test]
	fn extend_from_list_list() {
		let source = [1, 2, 3];
		let values = GenericVirtualListListRef::from_single_slice(&source, 4);
		let indices = [1, 3];
		let array = GenericVectorArray::copy_from(values, IndexMask::from_indices(&indices), 4);
		assert_eq!(array.lengths(), &[0, 3, 0, 3]);

		let list_list = array.as_list_list();
		assert_eq!(list_list.as_typed_ref::<i32>().sublist(3), &source);
	}

	#[test]
	fn clear_drops_elements() {
		let mut array = GenericVectorArray::new(CppType::get::<Vec<i32>>(), 2);
		array.as_mutable_typed_ref::<Vec<i32>>().append(1, vec![1, 2]);
		array.clear_indices(IndexMask::from_size(2));
		assert_eq!(array.lengths(), &[0, 0]);
	}
}
