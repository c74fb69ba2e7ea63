use core_types::generic::{GenericValue, GenericVectorArray, GenericVirtualListRef};
use core_types::{CppType, CppTypeInfo, IndexMask, MFContext, MFParams, MFSignature, MFSignatureBuilder, MultiFunction};

/// Outputs the same value for every element.
pub struct ConstantValue<T> {
	value: T,
	signature: MFSignature,
}

impl<T: CppTypeInfo> ConstantValue<T> {
	pub fn new(value: T) -> Self {
		let signature = MFSignatureBuilder::new(format!("{value:?}")).single_output::<T>("Value").build();
		Self { value, signature }
	}

	pub fn value(&self) -> &T {
		&self.value
	}
}

impl<T: CppTypeInfo> MultiFunction for ConstantValue<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let output = params.uninitialized_single_output::<T>(0, "Value");
		mask.foreach_index(|i| {
			output[i].write(self.value.clone());
		});
	}
}

/// [`ConstantValue`] for a value whose type is only known at runtime.
pub struct GenericConstantValue {
	value: GenericValue,
	signature: MFSignature,
}

impl GenericConstantValue {
	pub fn new(value: GenericValue) -> Self {
		let signature = MFSignatureBuilder::new(format!("{value:?}")).single_output_generic("Value", value.ty()).build();
		Self { value, signature }
	}

	pub fn value(&self) -> &GenericValue {
		&self.value
	}
}

impl MultiFunction for GenericConstantValue {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let output = params.uninitialized_single_output_generic(0, "Value");
		let ty = self.value.ty();
		mask.foreach_index(|i| {
			// SAFETY: the constant is initialized and the output slot is uninitialized
			unsafe { ty.copy_to_uninitialized(self.value.as_ptr(), output.get(i)) }
		});
	}
}

/// Outputs the same list for every element.
pub struct GenericConstantVector {
	values: GenericVectorArray,
	signature: MFSignature,
}

impl GenericConstantVector {
	/// Copies `values` into the function.
	pub fn new(values: GenericVirtualListRef) -> Self {
		let mut array = GenericVectorArray::new(values.ty(), 1);
		array.extend_single(0, values);
		let signature = MFSignatureBuilder::new(format!("{:?}", array.get(0))).vector_output_generic("Value", values.ty()).build();
		Self { values: array, signature }
	}

	pub fn from_vec<T: CppTypeInfo>(values: &[T]) -> Self {
		Self::new(GenericVirtualListRef::from_slice(values))
	}

	pub fn ty(&self) -> &'static CppType {
		self.values.ty()
	}

	pub fn len(&self) -> usize {
		self.values.lengths()[0]
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl MultiFunction for GenericConstantVector {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let output = params.vector_output_generic(0, "Value");
		let values = GenericVirtualListRef::from_full_array(self.values.get(0));
		for i in mask {
			output.extend_single(i, values);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core_types::MFParamsBuilder;
	use core_types::generic::GenericMutableArrayRef;
	use pretty_assertions::assert_eq;

	#[test]
	fn constant_fills_masked_indices() {
		let function = ConstantValue::new(String::from("x"));
		let mut output = vec![String::new(); 3];
		{
			let mut params = MFParamsBuilder::for_function(&function, 3);
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output)).unwrap();
			function.call(IndexMask::from_indices(&[0, 2]), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(output, vec!["x", "", "x"]);
		assert_eq!(function.name(), "\"x\"");
	}

	#[test]
	fn generic_constant() {
		let function = GenericConstantValue::new(GenericValue::new(2.5f32));
		let mut output = [0f32; 2];
		{
			let mut params = MFParamsBuilder::for_function(&function, 2);
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output)).unwrap();
			function.call(IndexMask::from_size(2), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(output, [2.5, 2.5]);
	}

	#[test]
	fn constant_vector() {
		let function = GenericConstantVector::from_vec(&[1i32, 2]);
		assert_eq!(function.len(), 2);
		let mut output = GenericVectorArray::new(CppType::get::<i32>(), 2);
		{
			let mut params = MFParamsBuilder::for_function(&function, 2);
			params.add_vector_output(&mut output).unwrap();
			function.call(IndexMask::from_indices(&[1]), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(output.as_typed_ref::<i32>().get(0), &[] as &[i32]);
		assert_eq!(output.as_typed_ref::<i32>().get(1), &[1, 2]);
	}
}
