use crate::cpp_type::{CppType, CppTypeInfo};
use std::fmt;

/// The type of values flowing through one socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MFDataType {
	/// One value per element index.
	Single(&'static CppType),
	/// A list of values per element index.
	Vector(&'static CppType),
}

impl MFDataType {
	pub fn for_single<T: CppTypeInfo>() -> Self {
		Self::Single(CppType::get::<T>())
	}

	pub fn for_vector<T: CppTypeInfo>() -> Self {
		Self::Vector(CppType::get::<T>())
	}

	pub fn is_single(&self) -> bool {
		matches!(self, Self::Single(_))
	}

	pub fn is_vector(&self) -> bool {
		matches!(self, Self::Vector(_))
	}

	/// The element type, for vectors the type of the list items.
	pub fn base_type(&self) -> &'static CppType {
		match self {
			Self::Single(ty) | Self::Vector(ty) => ty,
		}
	}

	/// Whether a socket of this type accepts values of `other`.
	pub fn accepts(&self, other: &MFDataType) -> bool {
		match (self, other) {
			(Self::Single(expected), Self::Single(found)) | (Self::Vector(expected), Self::Vector(found)) => expected.is_same_or_generalization(found),
			_ => false,
		}
	}
}

impl fmt::Display for MFDataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Single(ty) => write!(f, "{ty}"),
			Self::Vector(ty) => write!(f, "Vector<{ty}>"),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MFParamInterface {
	Input,
	Output,
	Mutable,
}

/// The six shapes a parameter can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MFParamCategory {
	SingleInput,
	VectorInput,
	SingleOutput,
	VectorOutput,
	SingleMutable,
	VectorMutable,
}

impl fmt::Display for MFParamCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::SingleInput => "single input",
			Self::VectorInput => "vector input",
			Self::SingleOutput => "single output",
			Self::VectorOutput => "vector output",
			Self::SingleMutable => "mutable single",
			Self::VectorMutable => "mutable vector",
		};
		f.write_str(name)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MFParamType {
	pub interface: MFParamInterface,
	pub data_type: MFDataType,
}

impl MFParamType {
	pub fn new(interface: MFParamInterface, data_type: MFDataType) -> Self {
		Self { interface, data_type }
	}

	pub fn category(&self) -> MFParamCategory {
		match (self.interface, self.data_type) {
			(MFParamInterface::Input, MFDataType::Single(_)) => MFParamCategory::SingleInput,
			(MFParamInterface::Input, MFDataType::Vector(_)) => MFParamCategory::VectorInput,
			(MFParamInterface::Output, MFDataType::Single(_)) => MFParamCategory::SingleOutput,
			(MFParamInterface::Output, MFDataType::Vector(_)) => MFParamCategory::VectorOutput,
			(MFParamInterface::Mutable, MFDataType::Single(_)) => MFParamCategory::SingleMutable,
			(MFParamInterface::Mutable, MFDataType::Vector(_)) => MFParamCategory::VectorMutable,
		}
	}

	/// Input and mutable parameters read a value.
	pub fn is_input_or_mutable(&self) -> bool {
		matches!(self.interface, MFParamInterface::Input | MFParamInterface::Mutable)
	}

	/// Output and mutable parameters produce a value.
	pub fn is_output_or_mutable(&self) -> bool {
		matches!(self.interface, MFParamInterface::Output | MFParamInterface::Mutable)
	}

	pub fn is_mutable(&self) -> bool {
		self.interface == MFParamInterface::Mutable
	}
}

impl fmt::Display for MFParamType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.data_type, self.category())
	}
}
