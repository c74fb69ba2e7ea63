use super::MultiFunction;
use super::data_type::MFParamCategory;
use super::signature::{MFSignature, StorageKind};
use crate::cpp_type::{CppType, CppTypeInfo};
use crate::error::MFError;
use crate::generic::{GenericMutableArrayRef, GenericVectorArray, GenericVirtualListListRef, GenericVirtualListRef, MutableVectorArrayRef, VirtualListListRef, VirtualListRef};
use std::mem::MaybeUninit;

/// Collects the arguments of one call, checking each against the signature as it is added.
///
/// Arguments must be added in signature order.
pub struct MFParamsBuilder<'a> {
	signature: &'a MFSignature,
	min_array_size: usize,
	virtual_lists: Vec<GenericVirtualListRef<'a>>,
	mutable_arrays: Vec<Option<GenericMutableArrayRef<'a>>>,
	virtual_list_lists: Vec<GenericVirtualListListRef<'a>>,
	vector_arrays: Vec<Option<&'a mut GenericVectorArray>>,
}

impl<'a> MFParamsBuilder<'a> {
	pub fn new(signature: &'a MFSignature, min_array_size: usize) -> Self {
		Self {
			signature,
			min_array_size,
			virtual_lists: Vec::new(),
			mutable_arrays: Vec::new(),
			virtual_list_lists: Vec::new(),
			vector_arrays: Vec::new(),
		}
	}

	pub fn for_function(function: &'a dyn MultiFunction, min_array_size: usize) -> Self {
		Self::new(function.signature(), min_array_size)
	}

	pub fn signature(&self) -> &'a MFSignature {
		self.signature
	}

	pub fn min_array_size(&self) -> usize {
		self.min_array_size
	}

	fn added_amount(&self) -> usize {
		self.virtual_lists.len() + self.mutable_arrays.len() + self.virtual_list_lists.len() + self.vector_arrays.len()
	}

	pub fn is_complete(&self) -> bool {
		self.added_amount() == self.signature.param_amount()
	}

	fn check_next(&self, category: MFParamCategory, ty: &CppType, size: usize) -> Result<(), MFError> {
		let index = self.added_amount();
		let Some(param_type) = self.signature.param_types.get(index) else {
			return Err(MFError::TooManyParams {
				function: self.signature.function_name.clone(),
				expected: self.signature.param_amount(),
			});
		};

		if param_type.category() != category || !param_type.data_type.base_type().is_same_or_generalization(ty) {
			return Err(MFError::SignatureMismatch {
				function: self.signature.function_name.clone(),
				index,
				expected: param_type.to_string(),
				found: format!("{ty} ({category})"),
			});
		}
		if size < self.min_array_size {
			return Err(MFError::ArrayTooSmall {
				name: self.signature.param_names[index].clone(),
				size,
				min_array_size: self.min_array_size,
			});
		}
		Ok(())
	}

	pub fn add_readonly_single_input(&mut self, list: GenericVirtualListRef<'a>) -> Result<(), MFError> {
		self.check_next(MFParamCategory::SingleInput, list.ty(), list.size())?;
		self.virtual_lists.push(list);
		Ok(())
	}

	/// Passes the same value for every element index.
	pub fn add_readonly_single_input_value<T: CppTypeInfo>(&mut self, value: &'a T) -> Result<(), MFError> {
		self.add_readonly_single_input(GenericVirtualListRef::from_single(value, self.min_array_size))
	}

	pub fn add_readonly_vector_input(&mut self, list_list: GenericVirtualListListRef<'a>) -> Result<(), MFError> {
		self.check_next(MFParamCategory::VectorInput, list_list.ty(), list_list.size())?;
		self.virtual_list_lists.push(list_list);
		Ok(())
	}

	/// The function initializes the masked elements of `array`, other elements are left untouched.
	pub fn add_uninitialized_single_output(&mut self, array: GenericMutableArrayRef<'a>) -> Result<(), MFError> {
		self.check_next(MFParamCategory::SingleOutput, array.ty(), array.size())?;
		self.mutable_arrays.push(Some(array));
		Ok(())
	}

	/// Every element of `array` must be initialized.
	pub fn add_single_mutable(&mut self, array: GenericMutableArrayRef<'a>) -> Result<(), MFError> {
		self.check_next(MFParamCategory::SingleMutable, array.ty(), array.size())?;
		self.mutable_arrays.push(Some(array));
		Ok(())
	}

	pub fn add_vector_output(&mut self, vector_array: &'a mut GenericVectorArray) -> Result<(), MFError> {
		self.check_next(MFParamCategory::VectorOutput, vector_array.ty(), vector_array.size())?;
		self.vector_arrays.push(Some(vector_array));
		Ok(())
	}

	pub fn add_vector_mutable(&mut self, vector_array: &'a mut GenericVectorArray) -> Result<(), MFError> {
		self.check_next(MFParamCategory::VectorMutable, vector_array.ty(), vector_array.size())?;
		self.vector_arrays.push(Some(vector_array));
		Ok(())
	}

	/// Checks that every parameter was provided.
	pub fn finish(&mut self) -> Result<MFParams<'_, 'a>, MFError> {
		if !self.is_complete() {
			return Err(MFError::MissingParams {
				function: self.signature.function_name.clone(),
				expected: self.signature.param_amount(),
				found: self.added_amount(),
			});
		}
		Ok(MFParams { builder: self })
	}
}

/// The arguments of one call as seen from inside [`MultiFunction::call`].
///
/// Accessors panic when the requested parameter does not have the requested shape. Each output can only be taken once.
pub struct MFParams<'b, 'a> {
	builder: &'b mut MFParamsBuilder<'a>,
}

impl<'b, 'a> MFParams<'b, 'a> {
	pub fn new(builder: &'b mut MFParamsBuilder<'a>) -> Self {
		debug_assert!(builder.is_complete(), "`{}` called with missing parameters", builder.signature.function_name);
		Self { builder }
	}

	pub fn signature(&self) -> &'a MFSignature {
		self.builder.signature
	}

	fn data_index(&self, index: usize, name: &str, category: MFParamCategory) -> usize {
		let signature = self.builder.signature;
		debug_assert_eq!(signature.param_names[index], name, "wrong name for parameter {index} of `{}`", signature.function_name);
		let actual = signature.param_types[index].category();
		assert_eq!(actual, category, "parameter `{name}` of `{}` is a {actual}, not a {category}", signature.function_name);
		debug_assert_eq!(
			MFSignature::storage_kind(actual),
			MFSignature::storage_kind(category),
			"storage kind mismatch for parameter `{name}`"
		);
		signature.param_data_indices[index]
	}

	pub fn readonly_single_input<T: CppTypeInfo>(&self, index: usize, name: &str) -> VirtualListRef<'a, T> {
		self.readonly_single_input_generic(index, name).as_typed_ref()
	}

	pub fn readonly_single_input_generic(&self, index: usize, name: &str) -> GenericVirtualListRef<'a> {
		let data_index = self.data_index(index, name, MFParamCategory::SingleInput);
		self.builder.virtual_lists[data_index]
	}

	pub fn readonly_vector_input<T: CppTypeInfo>(&self, index: usize, name: &str) -> VirtualListListRef<'a, T> {
		self.readonly_vector_input_generic(index, name).as_typed_ref()
	}

	pub fn readonly_vector_input_generic(&self, index: usize, name: &str) -> GenericVirtualListListRef<'a> {
		let data_index = self.data_index(index, name, MFParamCategory::VectorInput);
		self.builder.virtual_list_lists[data_index]
	}

	fn take_mutable_array(&mut self, index: usize, name: &str, category: MFParamCategory) -> GenericMutableArrayRef<'a> {
		let data_index = self.data_index(index, name, category);
		match self.builder.mutable_arrays[data_index].take() {
			Some(array) => array,
			None => panic!("parameter `{name}` of `{}` was already taken", self.builder.signature.function_name),
		}
	}

	fn take_vector_array(&mut self, index: usize, name: &str, category: MFParamCategory) -> &'a mut GenericVectorArray {
		let data_index = self.data_index(index, name, category);
		match self.builder.vector_arrays[data_index].take() {
			Some(array) => array,
			None => panic!("parameter `{name}` of `{}` was already taken", self.builder.signature.function_name),
		}
	}

	pub fn uninitialized_single_output<T: CppTypeInfo>(&mut self, index: usize, name: &str) -> &'a mut [MaybeUninit<T>] {
		self.uninitialized_single_output_generic(index, name).into_uninit_typed()
	}

	pub fn uninitialized_single_output_generic(&mut self, index: usize, name: &str) -> GenericMutableArrayRef<'a> {
		self.take_mutable_array(index, name, MFParamCategory::SingleOutput)
	}

	/// Values can only be meaningfully changed at the masked indices.
	pub fn single_mutable<T: CppTypeInfo>(&mut self, index: usize, name: &str) -> &'a mut [T] {
		let array = self.single_mutable_generic(index, name);
		// SAFETY: mutable arrays are fully initialized when added to the builder
		unsafe { array.into_typed() }
	}

	pub fn single_mutable_generic(&mut self, index: usize, name: &str) -> GenericMutableArrayRef<'a> {
		self.take_mutable_array(index, name, MFParamCategory::SingleMutable)
	}

	pub fn vector_output<T: CppTypeInfo>(&mut self, index: usize, name: &str) -> MutableVectorArrayRef<'a, T> {
		self.vector_output_generic(index, name).as_mutable_typed_ref()
	}

	pub fn vector_output_generic(&mut self, index: usize, name: &str) -> &'a mut GenericVectorArray {
		self.take_vector_array(index, name, MFParamCategory::VectorOutput)
	}

	pub fn vector_mutable<T: CppTypeInfo>(&mut self, index: usize, name: &str) -> MutableVectorArrayRef<'a, T> {
		self.vector_mutable_generic(index, name).as_mutable_typed_ref()
	}

	pub fn vector_mutable_generic(&mut self, index: usize, name: &str) -> &'a mut GenericVectorArray {
		self.take_vector_array(index, name, MFParamCategory::VectorMutable)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::multi_function::MFSignatureBuilder;
	use pretty_assertions::assert_eq;

	fn signature() -> MFSignature {
		MFSignatureBuilder::new("Scale").single_input::<f32>("Value").single_input::<f32>("Factor").single_output::<f32>("Result").build()
	}

	#[test]
	fn rejects_wrong_type() {
		let signature = signature();
		let mut builder = MFParamsBuilder::new(&signature, 2);
		let value = 1i32;
		let result = builder.add_readonly_single_input_value(&value);
		assert!(matches!(result, Err(MFError::SignatureMismatch { index: 0, .. })));
	}

	#[test]
	fn rejects_wrong_category() {
		let signature = signature();
		let mut builder = MFParamsBuilder::new(&signature, 1);
		let mut output = [0f32];
		let result = builder.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output));
		assert!(matches!(result, Err(MFError::SignatureMismatch { .. })));
	}

	#[test]
	fn rejects_small_arrays_and_missing_params() {
		let signature = signature();
		let mut builder = MFParamsBuilder::new(&signature, 3);
		let values = [1f32, 2.];
		assert!(matches!(
			builder.add_readonly_single_input(GenericVirtualListRef::from_slice(&values)),
			Err(MFError::ArrayTooSmall { size: 2, min_array_size: 3, .. })
		));
		let value = 2f32;
		builder.add_readonly_single_input_value(&value).unwrap();
		assert!(matches!(builder.finish(), Err(MFError::MissingParams { expected: 3, found: 1, .. })));
	}

	#[test]
	fn accessors_see_added_values() {
		let signature = signature();
		let values = [1f32, 2., 3.];
		let factor = 2f32;
		let mut output = [0f32; 3];
		{
			let mut builder = MFParamsBuilder::new(&signature, 3);
			builder.add_readonly_single_input(GenericVirtualListRef::from_slice(&values)).unwrap();
			builder.add_readonly_single_input_value(&factor).unwrap();
			builder.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output)).unwrap();
			let mut params = builder.finish().unwrap();
			let value = params.readonly_single_input::<f32>(0, "Value");
			let factor = params.readonly_single_input::<f32>(1, "Factor");
			let result = params.uninitialized_single_output::<f32>(2, "Result");
			for i in 0..3 {
				result[i].write(value[i] * factor[i]);
			}
		}
		assert_eq!(output, [2., 4., 6.]);
	}

	#[test]
	#[should_panic(expected = "already taken")]
	fn output_taken_twice() {
		let signature = signature();
		let value = 1f32;
		let mut output = [0f32];
		let mut builder = MFParamsBuilder::new(&signature, 1);
		builder.add_readonly_single_input_value(&value).unwrap();
		builder.add_readonly_single_input_value(&value).unwrap();
		builder.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output)).unwrap();
		let mut params = builder.finish().unwrap();
		params.uninitialized_single_output::<f32>(2, "Result");
		params.uninitialized_single_output::<f32>(2, "Result");
	}
}
