use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

/// Runtime descriptor of a concrete type that generic code handles through raw pointers.
///
/// Every registered Rust type gets exactly one `CppType`, created on first use and never freed.
/// Two descriptors are equal iff they are the same object.
pub struct CppType {
	name: &'static str,
	type_id: TypeId,
	size: usize,
	alignment: usize,
	trivially_destructible: bool,
	generalization: Option<&'static CppType>,

	construct_default_fn: unsafe fn(*mut u8),
	destruct_fn: unsafe fn(*mut u8),
	destruct_n_fn: unsafe fn(*mut u8, usize),
	copy_to_initialized_fn: unsafe fn(*const u8, *mut u8),
	copy_to_uninitialized_fn: unsafe fn(*const u8, *mut u8),
	relocate_to_initialized_fn: unsafe fn(*mut u8, *mut u8),
	relocate_to_uninitialized_fn: unsafe fn(*mut u8, *mut u8),
	relocate_to_uninitialized_n_fn: unsafe fn(*mut u8, *mut u8, usize),
	debug_fmt_fn: unsafe fn(*const u8, &mut fmt::Formatter<'_>) -> fmt::Result,
	is_equal_fn: unsafe fn(*const u8, *const u8) -> bool,
}

/// Implemented by every type that can flow through a multi-function network.
pub trait CppTypeInfo: Clone + Default + fmt::Debug + PartialEq + Send + Sync + 'static {
	/// A coarser type with identical layout that values of this type may be viewed as.
	fn generalization() -> Option<&'static CppType> {
		None
	}
}

static REGISTRY: Lazy<RwLock<FxHashMap<TypeId, &'static CppType>>> = Lazy::new(Default::default);

unsafe fn construct_default_cb<T: Default>(ptr: *mut u8) {
	unsafe { ptr.cast::<T>().write(T::default()) }
}
unsafe fn destruct_cb<T>(ptr: *mut u8) {
	unsafe { ptr.cast::<T>().drop_in_place() }
}
unsafe fn destruct_n_cb<T>(ptr: *mut u8, n: usize) {
	unsafe { std::ptr::slice_from_raw_parts_mut(ptr.cast::<T>(), n).drop_in_place() }
}
unsafe fn copy_to_initialized_cb<T: Clone>(src: *const u8, dst: *mut u8) {
	unsafe { (*dst.cast::<T>()).clone_from(&*src.cast::<T>()) }
}
unsafe fn copy_to_uninitialized_cb<T: Clone>(src: *const u8, dst: *mut u8) {
	unsafe { dst.cast::<T>().write((*src.cast::<T>()).clone()) }
}
unsafe fn relocate_to_initialized_cb<T>(src: *mut u8, dst: *mut u8) {
	unsafe { *dst.cast::<T>() = src.cast::<T>().read() }
}
unsafe fn relocate_to_uninitialized_cb<T>(src: *mut u8, dst: *mut u8) {
	unsafe { std::ptr::copy_nonoverlapping(src.cast::<T>(), dst.cast::<T>(), 1) }
}
unsafe fn relocate_to_uninitialized_n_cb<T>(src: *mut u8, dst: *mut u8, n: usize) {
	unsafe { std::ptr::copy_nonoverlapping(src.cast::<T>(), dst.cast::<T>(), n) }
}
unsafe fn debug_fmt_cb<T: fmt::Debug>(ptr: *const u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	unsafe { fmt::Debug::fmt(&*ptr.cast::<T>(), f) }
}
unsafe fn is_equal_cb<T: PartialEq>(a: *const u8, b: *const u8) -> bool {
	unsafe { *a.cast::<T>() == *b.cast::<T>() }
}

impl CppType {
	fn new<T: CppTypeInfo>(generalization: Option<&'static CppType>) -> Self {
		if let Some(generalization) = generalization {
			debug_assert_eq!(generalization.size, size_of::<T>(), "generalization of {} must have the same size", std::any::type_name::<T>());
			debug_assert!(generalization.alignment <= align_of::<T>());
		}
		Self {
			name: std::any::type_name::<T>(),
			type_id: TypeId::of::<T>(),
			size: size_of::<T>(),
			alignment: align_of::<T>(),
			trivially_destructible: !std::mem::needs_drop::<T>(),
			generalization,
			construct_default_fn: construct_default_cb::<T>,
			destruct_fn: destruct_cb::<T>,
			destruct_n_fn: destruct_n_cb::<T>,
			copy_to_initialized_fn: copy_to_initialized_cb::<T>,
			copy_to_uninitialized_fn: copy_to_uninitialized_cb::<T>,
			relocate_to_initialized_fn: relocate_to_initialized_cb::<T>,
			relocate_to_uninitialized_fn: relocate_to_uninitialized_cb::<T>,
			relocate_to_uninitialized_n_fn: relocate_to_uninitialized_n_cb::<T>,
			debug_fmt_fn: debug_fmt_cb::<T>,
			is_equal_fn: is_equal_cb::<T>,
		}
	}

	/// Returns the process-wide descriptor of `T`, creating it on first use.
	pub fn get<T: CppTypeInfo>() -> &'static CppType {
		let type_id = TypeId::of::<T>();
		if let Some(&ty) = REGISTRY.read().unwrap_or_else(PoisonError::into_inner).get(&type_id) {
			return ty;
		}

		// Resolved before taking the write lock since it registers another type
		let generalization = T::generalization();

		let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
		*registry.entry(type_id).or_insert_with(|| {
			log::trace!("Registering runtime type {}", std::any::type_name::<T>());
			&*Box::leak(Box::new(CppType::new::<T>(generalization)))
		})
	}

	pub fn name(&self) -> &'static str {
		self.name
	}
	pub fn type_id(&self) -> TypeId {
		self.type_id
	}
	pub fn size(&self) -> usize {
		self.size
	}
	pub fn alignment(&self) -> usize {
		self.alignment
	}
	pub fn trivially_destructible(&self) -> bool {
		self.trivially_destructible
	}
	pub fn generalization(&self) -> Option<&'static CppType> {
		self.generalization
	}

	/// True if `other` is this type, or if this type appears in `other`'s generalization chain.
	pub fn is_same_or_generalization(&self, other: &CppType) -> bool {
		let mut current = Some(other);
		while let Some(ty) = current {
			if ty == self {
				return true;
			}
			current = ty.generalization;
		}
		false
	}

	pub fn is<T: 'static>(&self) -> bool {
		self.type_id == TypeId::of::<T>()
	}

	pub fn pointer_has_valid_alignment(&self, ptr: *const u8) -> bool {
		(ptr as usize) % self.alignment == 0
	}

	pub fn pointer_can_point_to_instance(&self, ptr: *const u8) -> bool {
		!ptr.is_null() && self.pointer_has_valid_alignment(ptr)
	}

	/// A non-null, well aligned pointer that must never be dereferenced. Used for empty buffers.
	pub fn dangling(&self) -> *mut u8 {
		std::ptr::without_provenance_mut(self.alignment)
	}

	/// # Safety
	/// `ptr` must point to uninitialized memory that can hold one instance of this type.
	pub unsafe fn construct_default(&self, ptr: *mut u8) {
		debug_assert!(self.pointer_can_point_to_instance(ptr));
		unsafe { (self.construct_default_fn)(ptr) }
	}

	/// # Safety
	/// `ptr` must point to `n` uninitialized, contiguous instances of this type.
	pub unsafe fn construct_default_n(&self, ptr: *mut u8, n: usize) {
		for i in 0..n {
			unsafe { self.construct_default(ptr.add(i * self.size)) }
		}
	}

	/// # Safety
	/// `ptr` must point to an initialized instance. It is uninitialized afterwards.
	pub unsafe fn destruct(&self, ptr: *mut u8) {
		debug_assert!(self.pointer_can_point_to_instance(ptr));
		unsafe { (self.destruct_fn)(ptr) }
	}

	/// # Safety
	/// `ptr` must point to `n` initialized, contiguous instances.
	pub unsafe fn destruct_n(&self, ptr: *mut u8, n: usize) {
		debug_assert!(n == 0 || self.pointer_can_point_to_instance(ptr));
		unsafe { (self.destruct_n_fn)(ptr, n) }
	}

	/// # Safety
	/// `src` and `dst` must both point to initialized instances and must not overlap.
	pub unsafe fn copy_to_initialized(&self, src: *const u8, dst: *mut u8) {
		debug_assert!(self.pointer_can_point_to_instance(src));
		debug_assert!(self.pointer_can_point_to_instance(dst));
		unsafe { (self.copy_to_initialized_fn)(src, dst) }
	}

	/// # Safety
	/// `src` must point to an initialized instance, `dst` to uninitialized memory for one instance.
	pub unsafe fn copy_to_uninitialized(&self, src: *const u8, dst: *mut u8) {
		debug_assert!(self.pointer_can_point_to_instance(src));
		debug_assert!(self.pointer_can_point_to_instance(dst));
		unsafe { (self.copy_to_uninitialized_fn)(src, dst) }
	}

	/// Moves the value at `src` over the initialized value at `dst`. `src` is uninitialized afterwards.
	///
	/// # Safety
	/// Both pointers must point to initialized instances and must not overlap.
	pub unsafe fn relocate_to_initialized(&self, src: *mut u8, dst: *mut u8) {
		debug_assert!(self.pointer_can_point_to_instance(src));
		debug_assert!(self.pointer_can_point_to_instance(dst));
		unsafe { (self.relocate_to_initialized_fn)(src, dst) }
	}

	/// Moves the value at `src` into uninitialized memory at `dst`. `src` is uninitialized afterwards.
	///
	/// # Safety
	/// `src` must point to an initialized instance, `dst` to non-overlapping uninitialized memory.
	pub unsafe fn relocate_to_uninitialized(&self, src: *mut u8, dst: *mut u8) {
		debug_assert!(self.pointer_can_point_to_instance(src));
		debug_assert!(self.pointer_can_point_to_instance(dst));
		unsafe { (self.relocate_to_uninitialized_fn)(src, dst) }
	}

	/// # Safety
	/// Same as [`CppType::relocate_to_uninitialized`] for `n` contiguous instances.
	pub unsafe fn relocate_to_uninitialized_n(&self, src: *mut u8, dst: *mut u8, n: usize) {
		debug_assert!(n == 0 || self.pointer_can_point_to_instance(src));
		debug_assert!(n == 0 || self.pointer_can_point_to_instance(dst));
		unsafe { (self.relocate_to_uninitialized_n_fn)(src, dst, n) }
	}

	/// # Safety
	/// `ptr` must point to an initialized instance.
	pub unsafe fn debug_fmt(&self, ptr: *const u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		unsafe { (self.debug_fmt_fn)(ptr, f) }
	}

	/// # Safety
	/// Both pointers must point to initialized instances.
	pub unsafe fn is_equal(&self, a: *const u8, b: *const u8) -> bool {
		unsafe { (self.is_equal_fn)(a, b) }
	}
}

impl PartialEq for CppType {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(self, other)
	}
}

impl Eq for CppType {}

impl Hash for CppType {
	fn hash<H: Hasher>(&self, state: &mut H) {
		std::ptr::hash(self, state)
	}
}

impl fmt::Debug for CppType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

impl fmt::Display for CppType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name.rsplit("::").next().unwrap_or(self.name))
	}
}

macro_rules! impl_cpp_type {
	($($ty:ty),* $(,)?) => {
		$(
			impl CppTypeInfo for $ty {}
		)*
	};
}

impl_cpp_type!(bool, i32, u32, i64, u64, usize, f32, f64, String, [f32; 3], Vec<f32>, Vec<i32>);

impl CppTypeInfo for glam::Vec3 {
	fn generalization() -> Option<&'static CppType> {
		Some(CppType::get::<[f32; 3]>())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::mem::MaybeUninit;

	#[test]
	fn types_are_unique() {
		assert!(std::ptr::eq(CppType::get::<f32>(), CppType::get::<f32>()));
		assert_ne!(CppType::get::<f32>(), CppType::get::<i32>());
		assert_eq!(CppType::get::<String>().size(), size_of::<String>());
		assert!(CppType::get::<i32>().trivially_destructible());
		assert!(!CppType::get::<String>().trivially_destructible());
	}

	#[test]
	fn generalization_chain() {
		let vec3 = CppType::get::<glam::Vec3>();
		let array = CppType::get::<[f32; 3]>();
		assert_eq!(vec3.generalization(), Some(array));
		assert!(array.is_same_or_generalization(vec3));
		assert!(vec3.is_same_or_generalization(vec3));
		assert!(!vec3.is_same_or_generalization(array));
		assert!(!CppType::get::<f32>().is_same_or_generalization(vec3));
	}

	#[test]
	fn copy_destruct_copy_again() {
		let ty = CppType::get::<String>();
		let source = String::from("value");
		let mut first = MaybeUninit::<String>::uninit();
		let mut second = MaybeUninit::<String>::uninit();
		unsafe {
			ty.copy_to_uninitialized((&source as *const String).cast(), first.as_mut_ptr().cast());
			ty.destruct(first.as_mut_ptr().cast());
			ty.copy_to_uninitialized((&source as *const String).cast(), second.as_mut_ptr().cast());
			assert_eq!(second.assume_init_ref(), &source);
			ty.destruct(second.as_mut_ptr().cast());
		}
		assert_eq!(source, "value");
	}

	#[test]
	fn relocate_moves_ownership() {
		let ty = CppType::get::<Vec<i32>>();
		let mut source = MaybeUninit::new(vec![1, 2, 3]);
		let mut destination = MaybeUninit::<Vec<i32>>::uninit();
		unsafe {
			ty.relocate_to_uninitialized(source.as_mut_ptr().cast(), destination.as_mut_ptr().cast());
			let destination = destination.assume_init();
			assert_eq!(destination, vec![1, 2, 3]);
		}
	}

	#[test]
	fn relocate_to_initialized_drops_previous() {
		let ty = CppType::get::<String>();
		let mut source = MaybeUninit::new(String::from("new"));
		let mut destination = String::from("old");
		unsafe { ty.relocate_to_initialized(source.as_mut_ptr().cast(), (&mut destination as *mut String).cast()) };
		assert_eq!(destination, "new");
	}

	#[test]
	fn construct_and_compare() {
		let ty = CppType::get::<f64>();
		let mut a = MaybeUninit::<f64>::uninit();
		let b = 0.;
		unsafe {
			ty.construct_default(a.as_mut_ptr().cast());
			assert!(ty.is_equal(a.as_ptr().cast(), (&b as *const f64).cast()));
		}
	}
}
