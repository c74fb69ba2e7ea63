use crate::cpp_type::{CppType, CppTypeInfo};
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

fn assert_viewable_as<T: CppTypeInfo>(ty: &CppType) {
	assert!(
		CppType::get::<T>().is_same_or_generalization(ty),
		"cannot view values of type {} as {}",
		ty.name(),
		std::any::type_name::<T>()
	);
}

/// Non-owning view of a contiguous buffer of a runtime type.
#[derive(Clone, Copy)]
pub struct GenericArrayRef<'a> {
	ty: &'static CppType,
	buffer: *const u8,
	size: usize,
	_lifetime: PhantomData<&'a ()>,
}

impl<'a> GenericArrayRef<'a> {
	pub fn from_slice<T: CppTypeInfo>(slice: &'a [T]) -> Self {
		Self {
			ty: CppType::get::<T>(),
			buffer: slice.as_ptr().cast(),
			size: slice.len(),
			_lifetime: PhantomData,
		}
	}

	/// # Safety
	/// `buffer` must point to `size` initialized instances of `ty` that stay valid and unmodified for `'a`.
	pub unsafe fn from_raw(ty: &'static CppType, buffer: *const u8, size: usize) -> Self {
		debug_assert!(ty.pointer_can_point_to_instance(buffer));
		Self {
			ty,
			buffer,
			size,
			_lifetime: PhantomData,
		}
	}

	pub fn ty(&self) -> &'static CppType {
		self.ty
	}
	pub fn size(&self) -> usize {
		self.size
	}
	pub fn is_empty(&self) -> bool {
		self.size == 0
	}
	pub fn buffer(&self) -> *const u8 {
		self.buffer
	}

	/// Pointer to the element at `index`.
	pub fn get(&self, index: usize) -> *const u8 {
		assert!(index < self.size, "index {index} out of bounds for array of size {}", self.size);
		// SAFETY: the index is within the buffer
		unsafe { self.buffer.add(index * self.ty.size()) }
	}

	pub fn as_typed_ref<T: CppTypeInfo>(&self) -> &'a [T] {
		assert_viewable_as::<T>(self.ty);
		// SAFETY: the buffer holds `size` initialized values whose layout matches `T`
		unsafe { std::slice::from_raw_parts(self.buffer.cast::<T>(), self.size) }
	}
}

impl fmt::Debug for GenericArrayRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		struct Element<'b>(&'static CppType, *const u8, PhantomData<&'b ()>);
		impl fmt::Debug for Element<'_> {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				// SAFETY: elements of an array ref are initialized
				unsafe { self.0.debug_fmt(self.1, f) }
			}
		}
		f.debug_list().entries((0..self.size).map(|i| Element(self.ty, self.get(i), PhantomData))).finish()
	}
}

/// Non-owning, mutable view of a contiguous buffer of a runtime type.
///
/// The buffer may be uninitialized, in which case it must only be accessed through [`GenericMutableArrayRef::into_uninit_typed`].
pub struct GenericMutableArrayRef<'a> {
	ty: &'static CppType,
	buffer: *mut u8,
	size: usize,
	_lifetime: PhantomData<&'a mut ()>,
}

impl<'a> GenericMutableArrayRef<'a> {
	pub fn from_slice<T: CppTypeInfo>(slice: &'a mut [T]) -> Self {
		Self {
			ty: CppType::get::<T>(),
			buffer: slice.as_mut_ptr().cast(),
			size: slice.len(),
			_lifetime: PhantomData,
		}
	}

	pub fn from_uninit_slice<T: CppTypeInfo>(slice: &'a mut [MaybeUninit<T>]) -> Self {
		Self {
			ty: CppType::get::<T>(),
			buffer: slice.as_mut_ptr().cast(),
			size: slice.len(),
			_lifetime: PhantomData,
		}
	}

	/// # Safety
	/// `buffer` must be valid for reads and writes of `size` instances of `ty` for `'a` and must not be aliased.
	pub unsafe fn from_raw(ty: &'static CppType, buffer: *mut u8, size: usize) -> Self {
		debug_assert!(ty.pointer_can_point_to_instance(buffer));
		Self {
			ty,
			buffer,
			size,
			_lifetime: PhantomData,
		}
	}

	pub fn ty(&self) -> &'static CppType {
		self.ty
	}
	pub fn size(&self) -> usize {
		self.size
	}
	pub fn is_empty(&self) -> bool {
		self.size == 0
	}
	pub fn buffer(&self) -> *mut u8 {
		self.buffer
	}

	pub fn get(&self, index: usize) -> *mut u8 {
		assert!(index < self.size, "index {index} out of bounds for array of size {}", self.size);
		// SAFETY: the index is within the buffer
		unsafe { self.buffer.add(index * self.ty.size()) }
	}

	/// # Safety
	/// Every element must be initialized.
	pub unsafe fn as_array_ref(&self) -> GenericArrayRef<'_> {
		unsafe { GenericArrayRef::from_raw(self.ty, self.buffer, self.size) }
	}

	/// # Safety
	/// Every element must be initialized.
	pub unsafe fn into_typed<T: CppTypeInfo>(self) -> &'a mut [T] {
		assert_viewable_as::<T>(self.ty);
		unsafe { std::slice::from_raw_parts_mut(self.buffer.cast::<T>(), self.size) }
	}

	pub fn into_uninit_typed<T: CppTypeInfo>(self) -> &'a mut [MaybeUninit<T>] {
		assert_viewable_as::<T>(self.ty);
		// SAFETY: `MaybeUninit` makes no assumption about the contents of the buffer
		unsafe { std::slice::from_raw_parts_mut(self.buffer.cast::<MaybeUninit<T>>(), self.size) }
	}

	pub fn reborrow(&mut self) -> GenericMutableArrayRef<'_> {
		GenericMutableArrayRef {
			ty: self.ty,
			buffer: self.buffer,
			size: self.size,
			_lifetime: PhantomData,
		}
	}
}

impl fmt::Debug for GenericMutableArrayRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GenericMutableArrayRef").field("ty", &self.ty).field("size", &self.size).finish()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn typed_views() {
		let values = [1.5f32, 2.5, 3.5];
		let array = GenericArrayRef::from_slice(&values);
		assert_eq!(array.size(), 3);
		assert_eq!(array.as_typed_ref::<f32>(), &values);
		assert_eq!(format!("{array:?}"), "[1.5, 2.5, 3.5]");
	}

	#[test]
	fn specialized_values_viewed_through_generalization() {
		let values = [glam::Vec3::new(1., 2., 3.)];
		let array = GenericArrayRef::from_slice(&values);
		assert_eq!(array.as_typed_ref::<[f32; 3]>(), &[[1., 2., 3.]]);
	}

	#[test]
	#[should_panic]
	fn rejects_unrelated_type() {
		let values = [1i32];
		GenericArrayRef::from_slice(&values).as_typed_ref::<f32>();
	}

	#[test]
	fn write_through_uninit_view() {
		let mut values = vec![0i32; 4];
		let array = GenericMutableArrayRef::from_slice(&mut values);
		let typed = array.into_uninit_typed::<i32>();
		typed[2].write(7);
		assert_eq!(values, vec![0, 0, 7, 0]);
	}
}
