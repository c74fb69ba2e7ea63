use core_types::CppType;
use core_types::generic::GenericValue;
use glam::Vec3;
use std::fmt;

/// A socket default or node property whose type is known to the document, allowing serialization.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaggedValue {
	#[default]
	None,
	Int(i32),
	Float(f32),
	Bool(bool),
	String(String),
	Vector(Vec3),
	IntList(Vec<i32>),
	FloatList(Vec<f32>),
}

impl TaggedValue {
	pub fn as_int(&self) -> Option<i32> {
		match self {
			Self::Int(value) => Some(*value),
			Self::Float(value) => Some(*value as i32),
			Self::Bool(value) => Some(*value as i32),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f32> {
		match self {
			Self::Float(value) => Some(*value),
			Self::Int(value) => Some(*value as f32),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value),
			_ => None,
		}
	}

	/// Converts the value to an owned generic value of type `ty`, used to create constants for unlinked sockets.
	///
	/// Numbers convert between each other, `None` produces the default of `ty`. Returns `None` for any other combination.
	pub fn to_generic(&self, ty: &'static CppType) -> Option<GenericValue> {
		let value = match self {
			Self::None => GenericValue::default_of(ty),
			_ if ty.is::<i32>() => GenericValue::new(self.as_int()?),
			_ if ty.is::<f32>() => GenericValue::new(self.as_float()?),
			Self::Bool(value) if ty.is::<bool>() => GenericValue::new(*value),
			Self::String(value) if ty.is::<String>() => GenericValue::new(value.clone()),
			Self::Vector(value) if ty.is::<Vec3>() => GenericValue::new(*value),
			Self::Vector(value) if ty.is::<[f32; 3]>() => GenericValue::new(value.to_array()),
			Self::IntList(values) if ty.is::<Vec<i32>>() => GenericValue::new(values.clone()),
			Self::FloatList(values) if ty.is::<Vec<f32>>() => GenericValue::new(values.clone()),
			_ => return None,
		};
		Some(value)
	}
}

impl fmt::Display for TaggedValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::None => write!(f, "None"),
			Self::Int(value) => write!(f, "{value}"),
			Self::Float(value) => write!(f, "{value}"),
			Self::Bool(value) => write!(f, "{value}"),
			Self::String(value) => write!(f, "{value:?}"),
			Self::Vector(value) => write!(f, "({}, {}, {})", value.x, value.y, value.z),
			Self::IntList(values) => write!(f, "{values:?}"),
			Self::FloatList(values) => write!(f, "{values:?}"),
		}
	}
}

impl From<i32> for TaggedValue {
	fn from(value: i32) -> Self {
		Self::Int(value)
	}
}

impl From<f32> for TaggedValue {
	fn from(value: f32) -> Self {
		Self::Float(value)
	}
}

impl From<bool> for TaggedValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<&str> for TaggedValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<Vec3> for TaggedValue {
	fn from(value: Vec3) -> Self {
		Self::Vector(value)
	}
}
