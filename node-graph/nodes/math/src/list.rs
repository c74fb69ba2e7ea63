use core_types::{CppTypeInfo, IndexMask, MFContext, MFParams, MFSignature, MFSignatureBuilder, MultiFunction};
use std::marker::PhantomData;

/// Packs a fixed number of single values into one list per element.
pub struct PackListFn<T> {
	input_amount: usize,
	signature: MFSignature,
	_type: PhantomData<fn() -> T>,
}

impl<T: CppTypeInfo> PackListFn<T> {
	pub fn new(input_amount: usize) -> Self {
		let mut builder = MFSignatureBuilder::new("Pack List");
		for i in 0..input_amount {
			builder = builder.single_input::<T>(format!("Value {i}"));
		}
		Self {
			input_amount,
			signature: builder.vector_output::<T>("List").build(),
			_type: PhantomData,
		}
	}
}

impl<T: CppTypeInfo> MultiFunction for PackListFn<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let inputs: Vec<_> = (0..self.input_amount).map(|i| params.readonly_single_input::<T>(i, &format!("Value {i}"))).collect();
		let mut list = params.vector_output::<T>(self.input_amount, "List");
		for i in mask {
			for input in &inputs {
				list.append(i, input[i].clone());
			}
		}
	}
}

pub struct ListLengthFn<T> {
	signature: MFSignature,
	_type: PhantomData<fn() -> T>,
}

impl<T: CppTypeInfo> ListLengthFn<T> {
	pub fn new() -> Self {
		Self {
			signature: MFSignatureBuilder::new("List Length").vector_input::<T>("List").single_output::<i32>("Length").build(),
			_type: PhantomData,
		}
	}
}

impl<T: CppTypeInfo> Default for ListLengthFn<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: CppTypeInfo> MultiFunction for ListLengthFn<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let lists = params.readonly_vector_input::<T>(0, "List");
		let lengths = params.uninitialized_single_output::<i32>(1, "Length");
		mask.foreach_index(|i| {
			lengths[i].write(lists.sublist_size(i) as i32);
		});
	}
}

/// Appends a value to a list in place.
pub struct AppendToListFn<T> {
	signature: MFSignature,
	_type: PhantomData<fn() -> T>,
}

impl<T: CppTypeInfo> AppendToListFn<T> {
	pub fn new() -> Self {
		Self {
			signature: MFSignatureBuilder::new("Append to List").mutable_vector::<T>("List").single_input::<T>("Value").build(),
			_type: PhantomData,
		}
	}
}

impl<T: CppTypeInfo> Default for AppendToListFn<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: CppTypeInfo> MultiFunction for AppendToListFn<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let values = params.readonly_single_input::<T>(1, "Value");
		let mut lists = params.vector_mutable::<T>(0, "List");
		for i in mask {
			lists.append(i, values[i].clone());
		}
	}
}

/// Reads one list element, out of range indices produce the fallback.
pub struct GetListElementFn<T> {
	signature: MFSignature,
	_type: PhantomData<fn() -> T>,
}

impl<T: CppTypeInfo> GetListElementFn<T> {
	pub fn new() -> Self {
		Self {
			signature: MFSignatureBuilder::new("Get List Element")
				.vector_input::<T>("List")
				.single_input::<i32>("Index")
				.single_input::<T>("Fallback")
				.single_output::<T>("Value")
				.build(),
			_type: PhantomData,
		}
	}
}

impl<T: CppTypeInfo> Default for GetListElementFn<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: CppTypeInfo> MultiFunction for GetListElementFn<T> {
	fn signature(&self) -> &MFSignature {
		&self.signature
	}

	fn call(&self, mask: IndexMask, mut params: MFParams, _context: &MFContext) {
		let lists = params.readonly_vector_input::<T>(0, "List");
		let indices = params.readonly_single_input::<i32>(1, "Index");
		let fallbacks = params.readonly_single_input::<T>(2, "Fallback");
		let values = params.uninitialized_single_output::<T>(3, "Value");

		mask.foreach_index(|i| {
			let list = lists.sublist(i);
			let value = usize::try_from(indices[i]).ok().and_then(|index| list.get(index)).unwrap_or(&fallbacks[i]);
			values[i].write(value.clone());
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core_types::generic::{GenericMutableArrayRef, GenericVectorArray, GenericVirtualListListRef, GenericVirtualListRef};
	use core_types::{CppType, MFParamsBuilder};
	use pretty_assertions::assert_eq;

	#[test]
	fn pack_then_measure() {
		let pack = PackListFn::<f32>::new(3);
		let a = [1f32, 2.];
		let b = 3f32;
		let c = [4f32, 5.];
		let mut lists = GenericVectorArray::new(CppType::get::<f32>(), 2);
		{
			let mut params = MFParamsBuilder::for_function(&pack, 2);
			params.add_readonly_single_input(GenericVirtualListRef::from_slice(&a)).unwrap();
			params.add_readonly_single_input_value(&b).unwrap();
			params.add_readonly_single_input(GenericVirtualListRef::from_slice(&c)).unwrap();
			params.add_vector_output(&mut lists).unwrap();
			pack.call(IndexMask::from_size(2), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(lists.as_typed_ref::<f32>().get(1), &[2., 3., 5.]);

		let length = ListLengthFn::<f32>::new();
		let mut lengths = [0i32; 2];
		{
			let mut params = MFParamsBuilder::for_function(&length, 2);
			params.add_readonly_vector_input(lists.as_list_list()).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut lengths)).unwrap();
			length.call(IndexMask::from_size(2), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(lengths, [3, 3]);
	}

	#[test]
	fn append_in_place() {
		let append = AppendToListFn::<i32>::new();
		let mut lists = GenericVectorArray::new(CppType::get::<i32>(), 2);
		lists.as_mutable_typed_ref::<i32>().append(0, 1);
		let value = 9;
		{
			let mut params = MFParamsBuilder::for_function(&append, 2);
			params.add_vector_mutable(&mut lists).unwrap();
			params.add_readonly_single_input_value(&value).unwrap();
			append.call(IndexMask::from_size(2), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(lists.as_typed_ref::<i32>().get(0), &[1, 9]);
		assert_eq!(lists.as_typed_ref::<i32>().get(1), &[9]);
	}

	#[test]
	fn element_or_fallback() {
		let get = GetListElementFn::<i32>::new();
		let list = [10, 20, 30];
		let indices = [1, 5, -1];
		let fallback = -1;
		let mut values = [0; 3];
		{
			let mut params = MFParamsBuilder::for_function(&get, 3);
			params.add_readonly_vector_input(GenericVirtualListListRef::from_single_slice(&list, 3)).unwrap();
			params.add_readonly_single_input(GenericVirtualListRef::from_slice(&indices)).unwrap();
			params.add_readonly_single_input_value(&fallback).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut values)).unwrap();
			get.call(IndexMask::from_size(3), params.finish().unwrap(), &MFContext::empty());
		}
		assert_eq!(values, [20, -1, -1]);
	}
}
