use super::GenericArrayRef;
use crate::cpp_type::{CppType, CppTypeInfo};
use std::marker::PhantomData;

/// Read-only view of the values of one socket across all element indices.
///
/// The backing storage can be smaller than the virtual size, indexing never allocates.
pub enum VirtualListRef<'a, T> {
	/// One value shared by every index.
	Single { value: &'a T, virtual_size: usize },
	FullArray(&'a [T]),
	FullPointerArray(&'a [&'a T]),
	/// Indices wrap around the real array.
	RepeatedArray { array: &'a [T], virtual_size: usize },
}

impl<T> Clone for VirtualListRef<'_, T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for VirtualListRef<'_, T> {}

impl<'a, T> VirtualListRef<'a, T> {
	pub fn from_single(value: &'a T, virtual_size: usize) -> Self {
		Self::Single { value, virtual_size }
	}

	pub fn from_full_array(array: &'a [T]) -> Self {
		Self::FullArray(array)
	}

	pub fn from_full_pointer_array(array: &'a [&'a T]) -> Self {
		Self::FullPointerArray(array)
	}

	pub fn from_repeated_array(array: &'a [T], virtual_size: usize) -> Self {
		debug_assert!(!array.is_empty() || virtual_size == 0, "cannot repeat an empty array");
		Self::RepeatedArray { array, virtual_size }
	}

	pub fn size(&self) -> usize {
		match self {
			Self::Single { virtual_size, .. } | Self::RepeatedArray { virtual_size, .. } => *virtual_size,
			Self::FullArray(array) => array.len(),
			Self::FullPointerArray(array) => array.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.size() == 0
	}

	pub fn get(&self, index: usize) -> &'a T {
		debug_assert!(index < self.size(), "index {index} out of bounds for virtual list of size {}", self.size());
		match *self {
			Self::Single { value, .. } => value,
			Self::FullArray(array) => &array[index],
			Self::FullPointerArray(array) => array[index],
			Self::RepeatedArray { array, .. } => &array[index % array.len()],
		}
	}

	pub fn is_single_element(&self) -> bool {
		match self {
			Self::Single { .. } => true,
			Self::RepeatedArray { array, .. } => array.len() == 1,
			_ => false,
		}
	}

	pub fn as_single_element(&self) -> Option<&'a T> {
		match *self {
			Self::Single { value, .. } => Some(value),
			Self::RepeatedArray { array: [value], .. } => Some(value),
			_ => None,
		}
	}

	pub fn as_full_array(&self) -> Option<&'a [T]> {
		match *self {
			Self::FullArray(array) => Some(array),
			_ => None,
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
		(0..self.size()).map(|i| self.get(i))
	}
}

impl<T> std::ops::Index<usize> for VirtualListRef<'_, T> {
	type Output = T;

	fn index(&self, index: usize) -> &T {
		self.get(index)
	}
}

impl<T: std::fmt::Debug> std::fmt::Debug for VirtualListRef<'_, T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

#[derive(Clone, Copy)]
enum Category {
	Single { data: *const u8 },
	FullArray { data: *const u8 },
	FullPointerArray { data: *const *const u8 },
	RepeatedArray { data: *const u8, real_size: usize },
}

/// Type-erased [`VirtualListRef`].
#[derive(Clone, Copy)]
pub struct GenericVirtualListRef<'a> {
	ty: &'static CppType,
	virtual_size: usize,
	category: Category,
	_lifetime: PhantomData<&'a ()>,
}

impl<'a> GenericVirtualListRef<'a> {
	/// An empty list of the given type.
	pub fn empty(ty: &'static CppType) -> Self {
		Self {
			ty,
			virtual_size: 0,
			category: Category::FullArray { data: ty.dangling() },
			_lifetime: PhantomData,
		}
	}

	/// # Safety
	/// `value` must point to an initialized instance of `ty` that is valid for `'a`.
	pub unsafe fn from_single_raw(ty: &'static CppType, value: *const u8, virtual_size: usize) -> Self {
		debug_assert!(ty.pointer_can_point_to_instance(value));
		Self {
			ty,
			virtual_size,
			category: Category::Single { data: value },
			_lifetime: PhantomData,
		}
	}

	pub fn from_single<T: CppTypeInfo>(value: &'a T, virtual_size: usize) -> Self {
		// SAFETY: the reference guarantees validity for `'a`
		unsafe { Self::from_single_raw(CppType::get::<T>(), (value as *const T).cast(), virtual_size) }
	}

	pub fn from_full_array(array: GenericArrayRef<'a>) -> Self {
		Self {
			ty: array.ty(),
			virtual_size: array.size(),
			category: Category::FullArray { data: array.buffer() },
			_lifetime: PhantomData,
		}
	}

	pub fn from_slice<T: CppTypeInfo>(slice: &'a [T]) -> Self {
		Self::from_full_array(GenericArrayRef::from_slice(slice))
	}

	/// # Safety
	/// Every pointer must point to an initialized instance of `ty` that is valid for `'a`.
	pub unsafe fn from_full_pointer_array(ty: &'static CppType, pointers: &'a [*const u8]) -> Self {
		Self {
			ty,
			virtual_size: pointers.len(),
			category: Category::FullPointerArray { data: pointers.as_ptr() },
			_lifetime: PhantomData,
		}
	}

	pub fn from_repeated_array(array: GenericArrayRef<'a>, virtual_size: usize) -> Self {
		debug_assert!(!array.is_empty() || virtual_size == 0, "cannot repeat an empty array");
		Self {
			ty: array.ty(),
			virtual_size,
			category: Category::RepeatedArray {
				data: array.buffer(),
				real_size: array.size(),
			},
			_lifetime: PhantomData,
		}
	}

	pub fn ty(&self) -> &'static CppType {
		self.ty
	}

	pub fn size(&self) -> usize {
		self.virtual_size
	}

	pub fn is_empty(&self) -> bool {
		self.virtual_size == 0
	}

	/// Pointer to the value at `index`.
	pub fn get(&self, index: usize) -> *const u8 {
		debug_assert!(index < self.virtual_size, "index {index} out of bounds for virtual list of size {}", self.virtual_size);
		let element_size = self.ty.size();
		// SAFETY: the constructors guarantee the backing storage covers every virtual index
		unsafe {
			match self.category {
				Category::Single { data } => data,
				Category::FullArray { data } => data.add(index * element_size),
				Category::FullPointerArray { data } => *data.add(index),
				Category::RepeatedArray { data, real_size } => data.add((index % real_size) * element_size),
			}
		}
	}

	pub fn is_single_element(&self) -> bool {
		match self.category {
			Category::Single { .. } => true,
			Category::RepeatedArray { real_size, .. } => real_size == 1,
			_ => false,
		}
	}

	pub fn as_single_element(&self) -> Option<*const u8> {
		match self.category {
			Category::Single { data } => Some(data),
			Category::RepeatedArray { data, real_size: 1 } => Some(data),
			_ => None,
		}
	}

	pub fn as_full_array(&self) -> Option<GenericArrayRef<'a>> {
		match self.category {
			// SAFETY: the data was borrowed for `'a` on construction
			Category::FullArray { data } => Some(unsafe { GenericArrayRef::from_raw(self.ty, data, self.virtual_size) }),
			_ => None,
		}
	}

	/// Broadcasts the value at `index` to a list of `new_virtual_size` elements.
	pub fn repeated_element(&self, index: usize, new_virtual_size: usize) -> Self {
		// SAFETY: the element lives as long as this list
		unsafe { Self::from_single_raw(self.ty, self.get(index), new_virtual_size) }
	}

	pub fn as_typed_ref<T: CppTypeInfo>(&self) -> VirtualListRef<'a, T> {
		assert!(
			CppType::get::<T>().is_same_or_generalization(self.ty),
			"cannot view values of type {} as {}",
			self.ty.name(),
			std::any::type_name::<T>()
		);
		// SAFETY: layouts match and the data is valid for `'a`
		unsafe {
			match self.category {
				Category::Single { data } => VirtualListRef::Single {
					value: &*data.cast::<T>(),
					virtual_size: self.virtual_size,
				},
				Category::FullArray { data } => VirtualListRef::FullArray(std::slice::from_raw_parts(data.cast::<T>(), self.virtual_size)),
				Category::FullPointerArray { data } => VirtualListRef::FullPointerArray(std::slice::from_raw_parts(data.cast::<&'a T>(), self.virtual_size)),
				Category::RepeatedArray { data, real_size } => VirtualListRef::RepeatedArray {
					array: std::slice::from_raw_parts(data.cast::<T>(), real_size),
					virtual_size: self.virtual_size,
				},
			}
		}
	}
}

impl std::fmt::Debug for GenericVirtualListRef<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let category = match self.category {
			Category::Single { .. } => "Single",
			Category::FullArray { .. } => "FullArray",
			Category::FullPointerArray { .. } => "FullPointerArray",
			Category::RepeatedArray { .. } => "RepeatedArray",
		};
		f.debug_struct("GenericVirtualListRef")
			.field("ty", &self.ty)
			.field("category", &category)
			.field("virtual_size", &self.virtual_size)
			.finish()
	}
}
