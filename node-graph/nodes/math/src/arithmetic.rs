use crate::custom::{BinaryFn, UnaryFn};
use core_types::MultiFunction;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
	Add,
	Subtract,
	Multiply,
	Divide,
	Power,
	Minimum,
	Maximum,
	Less,
	LessEqual,
	Greater,
	GreaterEqual,
	Equal,
	NotEqual,
	ShiftLeft,
	ShiftRight,
}

impl BinaryOperation {
	pub fn symbol(&self) -> &'static str {
		match self {
			Self::Add => "+",
			Self::Subtract => "-",
			Self::Multiply => "*",
			Self::Divide => "/",
			Self::Power => "**",
			Self::Minimum => "min",
			Self::Maximum => "max",
			Self::Less => "<",
			Self::LessEqual => "<=",
			Self::Greater => ">",
			Self::GreaterEqual => ">=",
			Self::Equal => "==",
			Self::NotEqual => "!=",
			Self::ShiftLeft => "<<",
			Self::ShiftRight => ">>",
		}
	}

	pub fn is_comparison(&self) -> bool {
		matches!(self, Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual | Self::Equal | Self::NotEqual)
	}
}

impl fmt::Display for BinaryOperation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.symbol())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperation {
	Negate,
	Absolute,
	SquareRoot,
	Sine,
	Cosine,
}

impl UnaryOperation {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Negate => "-",
			Self::Absolute => "abs",
			Self::SquareRoot => "sqrt",
			Self::Sine => "sin",
			Self::Cosine => "cos",
		}
	}
}

fn binary<A: core_types::CppTypeInfo, B: core_types::CppTypeInfo, O: core_types::CppTypeInfo>(name: &str, f: impl Fn(&A, &B) -> O + Send + Sync + 'static) -> Option<Arc<dyn MultiFunction>> {
	Some(Arc::new(BinaryFn::new(name, f)))
}

fn unary<I: core_types::CppTypeInfo, O: core_types::CppTypeInfo>(name: &str, f: impl Fn(&I) -> O + Send + Sync + 'static) -> Option<Arc<dyn MultiFunction>> {
	Some(Arc::new(UnaryFn::new(name, f)))
}

/// Integer overloads. Arithmetic wraps on overflow, division by zero yields zero.
pub fn int_binary(operation: BinaryOperation) -> Option<Arc<dyn MultiFunction>> {
	use BinaryOperation::*;
	match operation {
		Add => binary("Add i32", |a: &i32, b: &i32| a.wrapping_add(*b)),
		Subtract => binary("Subtract i32", |a: &i32, b: &i32| a.wrapping_sub(*b)),
		Multiply => binary("Multiply i32", |a: &i32, b: &i32| a.wrapping_mul(*b)),
		Divide => binary("Divide i32", |a: &i32, b: &i32| if *b == 0 { 0 } else { a.wrapping_div(*b) }),
		Power => binary("Power i32", |a: &i32, b: &i32| match u32::try_from(*b) {
			Ok(exponent) => a.wrapping_pow(exponent),
			Err(_) => 0,
		}),
		Minimum => binary("Minimum i32", |a: &i32, b: &i32| *a.min(b)),
		Maximum => binary("Maximum i32", |a: &i32, b: &i32| *a.max(b)),
		Less => binary("Less i32", |a: &i32, b: &i32| a < b),
		LessEqual => binary("Less Equal i32", |a: &i32, b: &i32| a <= b),
		Greater => binary("Greater i32", |a: &i32, b: &i32| a > b),
		GreaterEqual => binary("Greater Equal i32", |a: &i32, b: &i32| a >= b),
		Equal => binary("Equal i32", |a: &i32, b: &i32| a == b),
		NotEqual => binary("Not Equal i32", |a: &i32, b: &i32| a != b),
		ShiftLeft => binary("Shift Left i32", |a: &i32, b: &i32| a.wrapping_shl(*b as u32)),
		ShiftRight => binary("Shift Right i32", |a: &i32, b: &i32| a.wrapping_shr(*b as u32)),
	}
}

/// Float overloads. Shifts are not defined for floats.
pub fn float_binary(operation: BinaryOperation) -> Option<Arc<dyn MultiFunction>> {
	use BinaryOperation::*;
	match operation {
		Add => binary("Add f32", |a: &f32, b: &f32| a + b),
		Subtract => binary("Subtract f32", |a: &f32, b: &f32| a - b),
		Multiply => binary("Multiply f32", |a: &f32, b: &f32| a * b),
		Divide => binary("Divide f32", |a: &f32, b: &f32| a / b),
		Power => binary("Power f32", |a: &f32, b: &f32| a.powf(*b)),
		Minimum => binary("Minimum f32", |a: &f32, b: &f32| a.min(*b)),
		Maximum => binary("Maximum f32", |a: &f32, b: &f32| a.max(*b)),
		Less => binary("Less f32", |a: &f32, b: &f32| a < b),
		LessEqual => binary("Less Equal f32", |a: &f32, b: &f32| a <= b),
		Greater => binary("Greater f32", |a: &f32, b: &f32| a > b),
		GreaterEqual => binary("Greater Equal f32", |a: &f32, b: &f32| a >= b),
		Equal => binary("Equal f32", |a: &f32, b: &f32| a == b),
		NotEqual => binary("Not Equal f32", |a: &f32, b: &f32| a != b),
		ShiftLeft | ShiftRight => None,
	}
}

/// String overloads: `+` concatenates, equality compares.
pub fn string_binary(operation: BinaryOperation) -> Option<Arc<dyn MultiFunction>> {
	match operation {
		BinaryOperation::Add => binary("Concatenate", |a: &String, b: &String| format!("{a}{b}")),
		BinaryOperation::Equal => binary("Equal String", |a: &String, b: &String| a == b),
		BinaryOperation::NotEqual => binary("Not Equal String", |a: &String, b: &String| a != b),
		_ => None,
	}
}

pub fn bool_binary(operation: BinaryOperation) -> Option<Arc<dyn MultiFunction>> {
	match operation {
		BinaryOperation::Equal => binary("Equal bool", |a: &bool, b: &bool| a == b),
		BinaryOperation::NotEqual => binary("Not Equal bool", |a: &bool, b: &bool| a != b),
		_ => None,
	}
}

pub fn int_unary(operation: UnaryOperation) -> Option<Arc<dyn MultiFunction>> {
	match operation {
		UnaryOperation::Negate => unary("Negate i32", |a: &i32| a.wrapping_neg()),
		UnaryOperation::Absolute => unary("Absolute i32", |a: &i32| a.wrapping_abs()),
		_ => None,
	}
}

pub fn float_unary(operation: UnaryOperation) -> Option<Arc<dyn MultiFunction>> {
	match operation {
		UnaryOperation::Negate => unary("Negate f32", |a: &f32| -a),
		UnaryOperation::Absolute => unary("Absolute f32", |a: &f32| a.abs()),
		UnaryOperation::SquareRoot => unary("Square Root f32", |a: &f32| a.sqrt()),
		UnaryOperation::Sine => unary("Sine f32", |a: &f32| a.sin()),
		UnaryOperation::Cosine => unary("Cosine f32", |a: &f32| a.cos()),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use core_types::generic::GenericMutableArrayRef;
	use core_types::{IndexMask, MFContext, MFParamsBuilder};

	fn call_binary<T: core_types::CppTypeInfo, O: core_types::CppTypeInfo>(function: &dyn MultiFunction, a: T, b: T) -> O {
		let mut output = [O::default()];
		{
			let mut params = MFParamsBuilder::for_function(function, 1);
			params.add_readonly_single_input_value(&a).unwrap();
			params.add_readonly_single_input_value(&b).unwrap();
			params.add_uninitialized_single_output(GenericMutableArrayRef::from_slice(&mut output)).unwrap();
			function.call(IndexMask::from_size(1), params.finish().unwrap(), &MFContext::empty());
		}
		output[0].clone()
	}

	#[test]
	fn integer_edge_cases() {
		let divide = int_binary(BinaryOperation::Divide).unwrap();
		assert_eq!(call_binary::<i32, i32>(divide.as_ref(), 7, 0), 0);
		assert_eq!(call_binary::<i32, i32>(divide.as_ref(), 7, 2), 3);
		let add = int_binary(BinaryOperation::Add).unwrap();
		assert_eq!(call_binary::<i32, i32>(add.as_ref(), i32::MAX, 1), i32::MIN);
		let power = int_binary(BinaryOperation::Power).unwrap();
		assert_eq!(call_binary::<i32, i32>(power.as_ref(), 2, 10), 1024);
		assert_eq!(call_binary::<i32, i32>(power.as_ref(), 2, -1), 0);
	}

	#[test]
	fn comparisons_return_bool() {
		let less = float_binary(BinaryOperation::Less).unwrap();
		assert!(call_binary::<f32, bool>(less.as_ref(), 1., 2.));
		assert!(less.signature().param_types[2].data_type == core_types::MFDataType::for_single::<bool>());
	}

	#[test]
	fn missing_overloads() {
		assert!(float_binary(BinaryOperation::ShiftLeft).is_none());
		assert!(string_binary(BinaryOperation::Multiply).is_none());
		assert!(int_unary(UnaryOperation::SquareRoot).is_none());
		let concat = string_binary(BinaryOperation::Add).unwrap();
		assert_eq!(call_binary::<String, String>(concat.as_ref(), "ab".into(), "cd".into()), "abcd");
	}
}
