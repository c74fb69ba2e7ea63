use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};

/// Ambient data a function may look up by type instead of receiving it as a parameter.
#[derive(Clone, Copy, Debug)]
pub struct MFElementContext<'a, T> {
	pub data: &'a T,
	/// Maps element indices to indices into the context data, `None` when the data is shared by all elements.
	pub indices: Option<&'a [usize]>,
}

#[derive(Clone, Copy)]
struct ContextEntry<'a> {
	data: &'a (dyn Any + Send + Sync),
	indices: Option<&'a [usize]>,
}

/// Read-only, keyed side channel passed to every [`MultiFunction::call`](super::MultiFunction::call).
#[derive(Clone, Default)]
pub struct MFContext<'a> {
	elements: FxHashMap<TypeId, ContextEntry<'a>>,
}

impl<'a> MFContext<'a> {
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn try_find_context<T: Any>(&self) -> Option<MFElementContext<'a, T>> {
		let entry = *self.elements.get(&TypeId::of::<T>())?;
		let data = entry.data.downcast_ref::<T>()?;
		Some(MFElementContext { data, indices: entry.indices })
	}

	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}
}

impl std::fmt::Debug for MFContext<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MFContext").field("elements", &self.elements.len()).finish()
	}
}

#[derive(Default)]
pub struct MFContextBuilder<'a> {
	context: MFContext<'a>,
}

impl<'a> MFContextBuilder<'a> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds data shared by every element. A second element of the same type replaces the first.
	pub fn add_global_context<T: Any + Send + Sync>(&mut self, data: &'a T) -> &mut Self {
		self.context.elements.insert(TypeId::of::<T>(), ContextEntry { data, indices: None });
		self
	}

	/// Adds data that is looked up per element through `indices`.
	pub fn add_element_context<T: Any + Send + Sync>(&mut self, data: &'a T, indices: &'a [usize]) -> &mut Self {
		self.context.elements.insert(TypeId::of::<T>(), ContextEntry { data, indices: Some(indices) });
		self
	}

	pub fn build(self) -> MFContext<'a> {
		self.context
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct Frame(u32);

	#[test]
	fn lookup_by_type() {
		let frame = Frame(12);
		let weights = vec![0.5f32, 1.];
		let indices = [1, 0, 1];
		let mut builder = MFContextBuilder::new();
		builder.add_global_context(&frame).add_element_context(&weights, &indices);
		let context = builder.build();

		let found = context.try_find_context::<Frame>().map(|element| element.data);
		assert_eq!(found, Some(&Frame(12)));
		let weights_context = context.try_find_context::<Vec<f32>>();
		assert_eq!(weights_context.and_then(|element| element.indices), Some(&indices[..]));
		assert!(context.try_find_context::<String>().is_none());
		assert!(MFContext::empty().is_empty());
	}
}
