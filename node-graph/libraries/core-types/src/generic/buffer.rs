use super::{GenericArrayRef, GenericMutableArrayRef};
use crate::cpp_type::CppType;
use crate::index_mask::IndexMask;
use std::alloc::Layout;

fn array_layout(ty: &CppType, size: usize) -> Layout {
	match ty.size().checked_mul(size).and_then(|bytes| Layout::from_size_align(bytes, ty.alignment()).ok()) {
		Some(layout) => layout,
		None => panic!("buffer of {size} values of {} exceeds the address space", ty.name()),
	}
}

/// Owned, uninitialized storage for `size` values of a runtime type.
///
/// The buffer does not track which elements are initialized. Whoever writes values into it is responsible for destructing them
/// (for example through [`GenericBuffer::destruct_indices`]) before it is dropped.
pub struct GenericBuffer {
	ty: &'static CppType,
	buffer: *mut u8,
	size: usize,
}

impl GenericBuffer {
	pub fn new(ty: &'static CppType, size: usize) -> Self {
		let layout = array_layout(ty, size);
		let buffer = if layout.size() == 0 {
			ty.dangling()
		} else {
			// SAFETY: the layout has a non-zero size
			let buffer = unsafe { std::alloc::alloc(layout) };
			if buffer.is_null() {
				std::alloc::handle_alloc_error(layout);
			}
			buffer
		};
		Self { ty, buffer, size }
	}

	pub fn ty(&self) -> &'static CppType {
		self.ty
	}
	pub fn size(&self) -> usize {
		self.size
	}
	pub fn as_ptr(&self) -> *mut u8 {
		self.buffer
	}

	pub fn get(&self, index: usize) -> *mut u8 {
		assert!(index < self.size, "index {index} out of bounds for buffer of size {}", self.size);
		// SAFETY: the index is within the allocation
		unsafe { self.buffer.add(index * self.ty.size()) }
	}

	/// # Safety
	/// All elements that are read through the returned view must be initialized.
	pub unsafe fn as_array_ref(&self) -> GenericArrayRef<'_> {
		unsafe { GenericArrayRef::from_raw(self.ty, self.buffer, self.size) }
	}

	pub fn as_mutable_array_ref(&mut self) -> GenericMutableArrayRef<'_> {
		// SAFETY: the buffer is exclusively borrowed
		unsafe { GenericMutableArrayRef::from_raw(self.ty, self.buffer, self.size) }
	}

	/// Default-constructs every element that is not selected by `mask`, leaving the whole buffer initialized
	/// once the masked elements have been written.
	///
	/// # Safety
	/// The unmasked elements must be uninitialized.
	pub unsafe fn construct_default_outside(&mut self, mask: IndexMask) {
		let mut masked = mask.iter().peekable();
		for index in 0..self.size {
			if masked.next_if_eq(&index).is_some() {
				continue;
			}
			unsafe { self.ty.construct_default(self.get(index)) }
		}
	}

	/// # Safety
	/// Every index in `mask` must hold an initialized value.
	pub unsafe fn destruct_indices(&mut self, mask: IndexMask) {
		if self.ty.trivially_destructible() {
			return;
		}
		match mask.as_range() {
			Some(range) if range.size > 0 => unsafe { self.ty.destruct_n(self.get(range.start), range.size) },
			Some(_) => {}
			None => mask.foreach_index(|index| unsafe { self.ty.destruct(self.get(index)) }),
		}
	}
}

impl Drop for GenericBuffer {
	fn drop(&mut self) {
		let layout = array_layout(self.ty, self.size);
		if layout.size() != 0 {
			// SAFETY: allocated in `new` with the same layout
			unsafe { std::alloc::dealloc(self.buffer, layout) }
		}
	}
}

// SAFETY: registered types are `Send + Sync` and the buffer is uniquely owned
unsafe impl Send for GenericBuffer {}
unsafe impl Sync for GenericBuffer {}

const MIN_CHUNK_SIZE: usize = 64;
const MAX_CHUNK_SIZE: usize = 1 << 20;

/// Bump allocator that hands out memory until it is dropped. Individual allocations are never freed.
#[derive(Default)]
pub struct MonotonicAllocator {
	chunks: Vec<(*mut u8, Layout)>,
	current: usize,
	remaining: usize,
	next_chunk_size: usize,
}

impl MonotonicAllocator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn allocate(&mut self, layout: Layout) -> *mut u8 {
		if layout.size() == 0 {
			return std::ptr::without_provenance_mut(layout.align());
		}
		if let Some(ptr) = self.try_allocate_in_current(layout) {
			return ptr;
		}

		self.next_chunk_size = (self.next_chunk_size * 2).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
		let chunk_size = self.next_chunk_size.max(layout.size() + layout.align());
		let chunk_layout = match Layout::from_size_align(chunk_size, layout.align().max(align_of::<usize>())) {
			Ok(chunk_layout) => chunk_layout,
			Err(_) => panic!("invalid allocation of {} bytes", layout.size()),
		};
		// SAFETY: the chunk layout has a non-zero size
		let chunk = unsafe { std::alloc::alloc(chunk_layout) };
		if chunk.is_null() {
			std::alloc::handle_alloc_error(chunk_layout);
		}
		self.chunks.push((chunk, chunk_layout));
		self.current = 0;
		self.remaining = chunk_size;

		match self.try_allocate_in_current(layout) {
			Some(ptr) => ptr,
			None => unreachable!("fresh chunk is large enough"),
		}
	}

	fn try_allocate_in_current(&mut self, layout: Layout) -> Option<*mut u8> {
		let &(chunk, _) = self.chunks.last()?;
		// SAFETY: `current` never exceeds the chunk size
		let ptr = unsafe { chunk.add(self.current) };
		let padding = ptr.align_offset(layout.align());
		let needed = padding.checked_add(layout.size())?;
		if needed > self.remaining {
			return None;
		}
		self.current += needed;
		self.remaining -= needed;
		// SAFETY: checked against the remaining space above
		Some(unsafe { ptr.add(padding) })
	}
}

impl Drop for MonotonicAllocator {
	fn drop(&mut self) {
		for &(chunk, layout) in &self.chunks {
			// SAFETY: every chunk was allocated with its stored layout
			unsafe { std::alloc::dealloc(chunk, layout) }
		}
	}
}

// SAFETY: the allocator owns its chunks exclusively
unsafe impl Send for MonotonicAllocator {}
unsafe impl Sync for MonotonicAllocator {}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn allocations_are_aligned_and_disjoint() {
		let mut allocator = MonotonicAllocator::new();
		let a = allocator.allocate(Layout::new::<u8>());
		let b = allocator.allocate(Layout::new::<u64>());
		let c = allocator.allocate(Layout::array::<u64>(100).unwrap());
		assert_eq!(b as usize % align_of::<u64>(), 0);
		assert_eq!(c as usize % align_of::<u64>(), 0);
		assert_ne!(a, b);
		assert_ne!(b, c);
	}

	#[test]
	fn buffer_default_outside_mask() {
		let ty = CppType::get::<String>();
		let mut buffer = GenericBuffer::new(ty, 4);
		let indices = [1, 3];
		let mask = IndexMask::from_indices(&indices);
		let value = String::from("x");
		unsafe {
			for index in mask {
				ty.copy_to_uninitialized((&value as *const String).cast(), buffer.get(index));
			}
			buffer.construct_default_outside(mask);
			assert_eq!(buffer.as_array_ref().as_typed_ref::<String>(), &["", "x", "", "x"]);
			buffer.destruct_indices(IndexMask::from_size(4));
		}
	}

	#[test]
	fn empty_buffer() {
		let buffer = GenericBuffer::new(CppType::get::<f64>(), 0);
		assert!(!buffer.as_ptr().is_null());
		assert_eq!(unsafe { buffer.as_array_ref() }.size(), 0);
	}
}
