use core_types::{CppTypeInfo, IndexMask, MFContext, MFParams, MFSignature, MFSignatureBuilder, MultiFunction};

/// Applies a closure to one input per element.
pub struct UnaryFn<I, O> {
	signature: MFSignature,
	function: Box<dyn Fn(&I) -> O + Send + Sync>,
}

impl<I: CppTypeInfo, O: CppTypeInfo> UnaryFn<I, O> {
	pub fn new(name: impl Into<String>, function: impl Fn(&I) -> O + Send + Sync + 'static) -> Self {
		Self {
			signature: MFSignatureBuilder::new(name).single_input::<I>("A").single_output::<O>("Result").build(),
			function: Box::new(function),
		}
	}
}

impl<I: CppTypeInfo, O: CppTypeInfo> MultiFunction for UnaryFn<I, O> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let a = params.readonly_single_input::<I>(0, "A");
		let result = params.uninitialized_single_output::<O>(1, "Result");

		if let Some(value) = a.as_single_element() {
			let value = (self.function)(value);
			mask.foreach_index(|i| {
				result[i].write(value.clone());
			});
			return;
		}
		mask.foreach_index(|i| {
			result[i].write((self.function)(&a[i]));
		});
	}
}

/// Applies a closure to two inputs per element.
pub struct BinaryFn<A, B, O> {
	signature: MFSignature,
	function: Box<dyn Fn(&A, &B) -> O + Send + Sync>,
}

impl<A: CppTypeInfo, B: CppTypeInfo, O: CppTypeInfo> BinaryFn<A, B, O> {
	pub fn new(name: impl Into<String>, function: impl Fn(&A, &B) -> O + Send + Sync + 'static) -> Self {
		Self {
			signature: MFSignatureBuilder::new(name).single_input::<A>("A").single_input::<B>("B").single_output::<O>("Result").build(),
			function: Box::new(function),
		}
	}
}

impl<A: CppTypeInfo, B: CppTypeInfo, O: CppTypeInfo> MultiFunction for BinaryFn<A, B, O> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let a = params.readonly_single_input::<A>(0, "A");
		let b = params.readonly_single_input::<B>(1, "B");
		let result = params.uninitialized_single_output::<O>(2, "Result");

		mask.foreach_index(|i| {
			result[i].write((self.function)(&a[i], &b[i]));
		});
	}
}

/// Modifies one mutable value per element in place.
pub struct InPlaceFn<T> {
	signature: MFSignature,
	function: Box<dyn Fn(&mut T) + Send + Sync>,
}

impl<T: CppTypeInfo> InPlaceFn<T> {
	pub fn new(name: impl Into<String>, function: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
		Self {
			signature: MFSignatureBuilder::new(name).mutable_single::<T>("Value").build(),
			function: Box::new(function),
		}
	}
}

impl<T: CppTypeInfo> MultiFunction for InPlaceFn<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let values = params.single_mutable::<T>(0, "Value");
		mask.foreach_index(|i| (self.function)(&mut values[i]));
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core_types::MFParamsBuilder;
	use core_types::generic::{GenericMutableArrayRef, GenericVirtualListRef};
	use pretty_assertions::assert_eq;

	#[test]
	fn binary_only_writes_masked_indices() {
		let function = BinaryFn::new("Multiply", |a: &i32, b: &i32| a * b);
		let a = [1, 2, 3, 4];
		let b = 10;
		let mut result = [-1; 4];
		let indices = [1, 3];
		{
			let mut params = MFParamsBuilder::for_function(&function, 4);
			params.add_readonly_single_input(GenericVirtualListRef::from_slice(&a)).unwrap();
			params.add_readonly_single_input_value(&b).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut result)).unwrap();
			function.call(IndexMask::from_indices(&indices), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(result, [-1, 20, -1, 40]);
	}

	#[test]
	fn unary_with_single_input() {
		let function = UnaryFn::new("Length", |s: &String| s.len() as i32);
		let input = String::from("four");
		let mut result = [0; 3];
		{
			let mut params = MFParamsBuilder::for_function(&function, 3);
			params.add_readonly_single_input_value(&input).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut result)).unwrap();
			function.call(IndexMask::from_size(3), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(result, [4; 3]);
	}

	#[test]
	fn in_place() {
		let function = InPlaceFn::new("Double", |v: &mut f32| *v *= 2.);
		let mut values: [f32; 3] = [1., 2., 3.];
		{
			let mut params = MFParamsBuilder::for_function(&function, 3);
			params.add_single_mutable(GenericMutableArrayRef::from_slice(&mut values)).unwrap();
			function.call(IndexMask::from_range(1..3), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(values, [1., 4., 6.]);
	}
}
