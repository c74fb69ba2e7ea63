use core_types::{CppTypeInfo, IndexMask, MFContext, MFParams, MFSignature, MFSignatureBuilder, MultiFunction};
use std::marker::PhantomData;

/// Outputs ambient data of type `T` from the call context, or the default value when the caller provided none.
///
/// Element contexts (data with per-element indices) are expected to hold a `Vec<T>`.
pub struct ContextValueFn<T> {
	signature: MFSignature,
	_type: PhantomData<fn() -> T>,
}

impl<T: CppTypeInfo> ContextValueFn<T> {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			signature: MFSignatureBuilder::new(name).single_output::<T>("Value").depends_on_context().build(),
			_type: PhantomData,
		}
	}
}

impl<T: CppTypeInfo> MultiFunction for ContextValueFn<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, context: &MFContext) {
		let values = params.uninitialized_single_output::<T>(0, "Value");

		if let Some(global) = context.try_find_context::<T>() {
			mask.foreach_index(|i| {
				values[i].write(global.data.clone());
			});
			return;
		}
		if let Some(element) = context.try_find_context::<Vec<T>>() {
			mask.foreach_index(|i| {
				let data_index = element.indices.map_or(i, |indices| indices[i]);
				values[i].write(element.data.get(data_index).cloned().unwrap_or_default());
			});
			return;
		}

		log::debug!("`{}` found no context of type {}", self.name(), std::any::type_name::<T>());
		mask.foreach_index(|i| {
			values[i].write(T::default());
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core_types::MFParamsBuilder;
	use core_types::generic::GenericMutableArrayRef;
	use core_types::multi_function::MFContextBuilder;

	fn evaluate(context: &MFContext, size: usize) -> Vec<f32> {
		let function = ContextValueFn::<f32>::new("Time");
		assert!(function.depends_on_context());
		let mut values = vec![0f32; size];
		{
			let mut params = MFParamsBuilder::for_function(&function, size);
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut values)).unwrap();
			function.call(IndexMask::from_size(size), params.finish().unwrap(), context);
		}
		values
	}

	#[test]
	fn reads_global_and_element_context() {
		let time = 1.5f32;
		let mut builder = MFContextBuilder::new();
		builder.add_global_context(&time);
		assert_eq!(evaluate(&builder.build(), 2), vec![1.5, 1.5]);

		let per_element = vec![10f32, 20.];
		let indices = [1, 0, 1];
		let mut builder = MFContextBuilder::new();
		builder.add_element_context(&per_element, &indices);
		assert_eq!(evaluate(&builder.build(), 3), vec![20., 10., 20.]);

		assert_eq!(evaluate(&MFContext::empty(), 1), vec![0.]);
	}
}
