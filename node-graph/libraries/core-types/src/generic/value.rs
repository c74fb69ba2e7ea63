use super::{GenericBuffer, GenericVirtualListRef};
use crate::cpp_type::{CppType, CppTypeInfo};
use std::fmt;

/// One owned value of a runtime type.
pub struct GenericValue {
	buffer: GenericBuffer,
}

impl GenericValue {
	pub fn new<T: CppTypeInfo>(value: T) -> Self {
		let buffer = GenericBuffer::new(CppType::get::<T>(), 1);
		// SAFETY: the buffer has room for one `T`
		unsafe { buffer.as_ptr().cast::<T>().write(value) };
		Self { buffer }
	}

	pub fn default_of(ty: &'static CppType) -> Self {
		let buffer = GenericBuffer::new(ty, 1);
		// SAFETY: the buffer has room for one uninitialized value
		unsafe { ty.construct_default(buffer.as_ptr()) };
		Self { buffer }
	}

	/// # Safety
	/// `value` must point to an initialized instance of `ty`.
	pub unsafe fn copy_from_ptr(ty: &'static CppType, value: *const u8) -> Self {
		let buffer = GenericBuffer::new(ty, 1);
		unsafe { ty.copy_to_uninitialized(value, buffer.as_ptr()) };
		Self { buffer }
	}

	pub fn ty(&self) -> &'static CppType {
		self.buffer.ty()
	}

	pub fn as_ptr(&self) -> *const u8 {
		self.buffer.as_ptr()
	}

	/// The value repeated `virtual_size` times.
	pub fn as_virtual_list(&self, virtual_size: usize) -> GenericVirtualListRef<'_> {
		// SAFETY: the value is initialized and lives as long as the borrow
		unsafe { GenericVirtualListRef::from_single_raw(self.ty(), self.as_ptr(), virtual_size) }
	}

	pub fn get<T: CppTypeInfo>(&self) -> Option<&T> {
		// SAFETY: the layout matches when the types are compatible and the value is initialized
		CppType::get::<T>().is_same_or_generalization(self.ty()).then(|| unsafe { &*self.as_ptr().cast::<T>() })
	}
}

impl Drop for GenericValue {
	fn drop(&mut self) {
		// SAFETY: the value is always initialized
		unsafe { self.ty().destruct(self.buffer.as_ptr()) }
	}
}

impl Clone for GenericValue {
	fn clone(&self) -> Self {
		// SAFETY: the value is always initialized
		unsafe { Self::copy_from_ptr(self.ty(), self.as_ptr()) }
	}
}

impl PartialEq for GenericValue {
	fn eq(&self, other: &Self) -> bool {
		// SAFETY: both values are initialized and of the same type
		self.ty() == other.ty() && unsafe { self.ty().is_equal(self.as_ptr(), other.as_ptr()) }
	}
}

impl fmt::Debug for GenericValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// SAFETY: the value is always initialized
		unsafe { self.ty().debug_fmt(self.as_ptr(), f) }
	}
}
