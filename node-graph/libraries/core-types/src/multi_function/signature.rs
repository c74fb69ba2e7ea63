use super::data_type::{MFDataType, MFParamCategory, MFParamInterface, MFParamType};
use crate::cpp_type::{CppType, CppTypeInfo};

/// The calling contract of a multi-function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MFSignature {
	pub function_name: String,
	pub param_names: Vec<String>,
	pub param_types: Vec<MFParamType>,
	/// Position of each parameter within the parameter storage of its kind, see [`MFSignature::storage_kind`].
	pub param_data_indices: Vec<usize>,
	/// Set when the function reads values from the [`MFContext`](super::MFContext).
	pub depends_on_context: bool,
}

/// Parameters are stored in four separate arrays by the params builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StorageKind {
	VirtualList,
	MutableArray,
	VirtualListList,
	VectorArray,
}

impl MFSignature {
	pub fn param_amount(&self) -> usize {
		self.param_types.len()
	}

	pub(crate) fn storage_kind(category: MFParamCategory) -> StorageKind {
		match category {
			MFParamCategory::SingleInput => StorageKind::VirtualList,
			MFParamCategory::SingleOutput | MFParamCategory::SingleMutable => StorageKind::MutableArray,
			MFParamCategory::VectorInput => StorageKind::VirtualListList,
			MFParamCategory::VectorOutput | MFParamCategory::VectorMutable => StorageKind::VectorArray,
		}
	}

	pub fn input_indices(&self) -> impl Iterator<Item = usize> + '_ {
		self.param_types.iter().enumerate().filter(|(_, ty)| ty.is_input_or_mutable()).map(|(i, _)| i)
	}

	pub fn output_indices(&self) -> impl Iterator<Item = usize> + '_ {
		self.param_types.iter().enumerate().filter(|(_, ty)| ty.is_output_or_mutable()).map(|(i, _)| i)
	}
}

#[derive(Debug, Default)]
pub struct MFSignatureBuilder {
	function_name: String,
	param_names: Vec<String>,
	param_types: Vec<MFParamType>,
	depends_on_context: bool,
}

impl MFSignatureBuilder {
	pub fn new(function_name: impl Into<String>) -> Self {
		Self {
			function_name: function_name.into(),
			..Default::default()
		}
	}

	pub fn param(mut self, name: impl Into<String>, param_type: MFParamType) -> Self {
		self.param_names.push(name.into());
		self.param_types.push(param_type);
		self
	}

	pub fn input(self, name: impl Into<String>, data_type: MFDataType) -> Self {
		self.param(name, MFParamType::new(MFParamInterface::Input, data_type))
	}

	pub fn output(self, name: impl Into<String>, data_type: MFDataType) -> Self {
		self.param(name, MFParamType::new(MFParamInterface::Output, data_type))
	}

	pub fn mutable(self, name: impl Into<String>, data_type: MFDataType) -> Self {
		self.param(name, MFParamType::new(MFParamInterface::Mutable, data_type))
	}

	pub fn single_input<T: CppTypeInfo>(self, name: impl Into<String>) -> Self {
		self.input(name, MFDataType::for_single::<T>())
	}

	pub fn single_input_generic(self, name: impl Into<String>, ty: &'static CppType) -> Self {
		self.input(name, MFDataType::Single(ty))
	}

	pub fn vector_input<T: CppTypeInfo>(self, name: impl Into<String>) -> Self {
		self.input(name, MFDataType::for_vector::<T>())
	}

	pub fn single_output<T: CppTypeInfo>(self, name: impl Into<String>) -> Self {
		self.output(name, MFDataType::for_single::<T>())
	}

	pub fn single_output_generic(self, name: impl Into<String>, ty: &'static CppType) -> Self {
		self.output(name, MFDataType::Single(ty))
	}

	pub fn vector_output<T: CppTypeInfo>(self, name: impl Into<String>) -> Self {
		self.output(name, MFDataType::for_vector::<T>())
	}

	pub fn vector_output_generic(self, name: impl Into<String>, ty: &'static CppType) -> Self {
		self.output(name, MFDataType::Vector(ty))
	}

	pub fn mutable_single<T: CppTypeInfo>(self, name: impl Into<String>) -> Self {
		self.mutable(name, MFDataType::for_single::<T>())
	}

	pub fn mutable_vector<T: CppTypeInfo>(self, name: impl Into<String>) -> Self {
		self.mutable(name, MFDataType::for_vector::<T>())
	}

	pub fn depends_on_context(mut self) -> Self {
		self.depends_on_context = true;
		self
	}

	pub fn build(self) -> MFSignature {
		let mut counters = [0; 4];
		let param_data_indices = self
			.param_types
			.iter()
			.map(|param_type| {
				let counter = &mut counters[MFSignature::storage_kind(param_type.category()) as usize];
				let index = *counter;
				*counter += 1;
				index
			})
			.collect();

		MFSignature {
			function_name: self.function_name,
			param_names: self.param_names,
			param_types: self.param_types,
			param_data_indices,
			depends_on_context: self.depends_on_context,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn data_indices_count_per_storage_kind() {
		let signature = MFSignatureBuilder::new("Mixed")
			.single_input::<f32>("A")
			.vector_input::<i32>("List")
			.single_input::<f32>("B")
			.single_output::<f32>("Result")
			.mutable_single::<i32>("Counter")
			.vector_output::<i32>("Out")
			.build();
		assert_eq!(signature.param_data_indices, vec![0, 0, 1, 0, 1, 0]);
		assert_eq!(signature.input_indices().collect::<Vec<_>>(), vec![0, 1, 2, 4]);
		assert_eq!(signature.output_indices().collect::<Vec<_>>(), vec![3, 4, 5]);
		assert!(!signature.depends_on_context);
	}
}
