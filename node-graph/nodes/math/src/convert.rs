use core_types::{CppTypeInfo, IndexMask, MFContext, MFParams, MFSignature, MFSignatureBuilder, MultiFunction};
use num_traits::AsPrimitive;
use std::marker::PhantomData;

/// Numeric conversion with `as` semantics.
pub struct ConvertFn<In, Out> {
	signature: MFSignature,
	_types: PhantomData<fn(In) -> Out>,
}

impl<In: CppTypeInfo + AsPrimitive<Out>, Out: CppTypeInfo + Copy> ConvertFn<In, Out> {
	pub fn new() -> Self {
		let name = format!("{} to {}", core_types::CppType::get::<In>(), core_types::CppType::get::<Out>());
		Self {
			signature: MFSignatureBuilder::new(name).single_input::<In>("From").single_output::<Out>("To").build(),
			_types: PhantomData,
		}
	}
}

impl<In: CppTypeInfo + AsPrimitive<Out>, Out: CppTypeInfo + Copy> Default for ConvertFn<In, Out> {
	fn default() -> Self {
		Self::new()
	}
}

impl<In: CppTypeInfo + AsPrimitive<Out>, Out: CppTypeInfo + Copy> MultiFunction for ConvertFn<In, Out> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let inputs = params.readonly_single_input::<In>(0, "From");
		let outputs = params.uninitialized_single_output::<Out>(1, "To");
		mask.foreach_index(|i| {
			outputs[i].write(inputs[i].as_());
		});
	}
}
