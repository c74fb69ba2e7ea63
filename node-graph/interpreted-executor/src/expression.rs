use crate::evaluate_network::MFEvaluateNetwork;
use crate::optimization::{OptimizationSettings, optimize_network};
use crate::storage::InitializedBuffer;
use core_types::generic::{GenericBuffer, GenericValue};
use core_types::{CppType, CppTypeInfo, IndexMask, MFContext, MFDataType, MFError, MFParams, MFParamsBuilder, MFSignature, MultiFunction};
use graph_craft::network::{MFNetwork, MFNetworkBuilder, MFSocketId};
use math_nodes::{BinaryOperation, ConstantValue, ConvertFn, UnaryOperation, bool_binary, float_binary, float_unary, int_binary, int_unary, string_binary};
use math_parser::{BinaryOp, CompileError, Expr, Node, Span, UnaryOp};
use std::sync::Arc;

/// The named inputs of an expression in the order of the compiled function's parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExpressionVariables {
	variables: Vec<(String, &'static CppType)>,
}

impl ExpressionVariables {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with<T: CppTypeInfo>(mut self, name: impl Into<String>) -> Self {
		self.add(name, CppType::get::<T>());
		self
	}

	pub fn add(&mut self, name: impl Into<String>, ty: &'static CppType) {
		self.variables.push((name.into(), ty));
	}

	pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &'static CppType)> + '_ {
		self.variables.iter().map(|(name, ty)| (name.as_str(), *ty))
	}

	pub fn len(&self) -> usize {
		self.variables.len()
	}

	pub fn is_empty(&self) -> bool {
		self.variables.is_empty()
	}
}

/// An expression compiled to a multi-function with one input per variable and a single `Result` output.
pub struct CompiledExpression {
	source: String,
	ast: Expr,
	result_type: &'static CppType,
	function: MFEvaluateNetwork,
}

impl CompiledExpression {
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn ast(&self) -> &Expr {
		&self.ast
	}

	pub fn result_type(&self) -> &'static CppType {
		self.result_type
	}

	pub fn network(&self) -> &MFNetwork {
		self.function.network()
	}

	/// Computes the expression once, `inputs` holding one value per variable.
	pub fn evaluate(&self, inputs: &[GenericValue]) -> Result<GenericValue, MFError> {
		let mut output = GenericBuffer::new(self.result_type, 1);
		{
			let mut params = MFParamsBuilder::for_function(self, 1);
			for input in inputs {
				params.add_readonly_single_input(input.as_virtual_list(1))?;
			}
			params.add_uninitialized_single_output(output.as_mutable_array_ref())?;
			self.call(IndexMask::from_size(1), params.finish()?, &MFContext::empty());
		}
		// SAFETY: the call initialized the only element
		let output = unsafe { InitializedBuffer::from_initialized(output) };
		// SAFETY: the element is initialized and of the result type
		Ok(unsafe { GenericValue::copy_from_ptr(self.result_type, output.as_array_ref().get(0)) })
	}
}

impl MultiFunction for CompiledExpression {
	fn signature(&self) -> &MFSignature {
		self.function.signature()
	}

	fn call(&self, mask: IndexMask, params: MFParams, context: &MFContext) {
		self.function.call(mask, params, context);
	}
}

impl std::fmt::Debug for CompiledExpression {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompiledExpression").field("source", &self.source).field("result_type", &self.result_type.name()).finish()
	}
}

pub fn compile_expression(src: &str, variables: &ExpressionVariables) -> Result<CompiledExpression, CompileError> {
	compile_expression_with(src, variables, &OptimizationSettings::default())
}

pub fn compile_expression_with(src: &str, variables: &ExpressionVariables, settings: &OptimizationSettings) -> Result<CompiledExpression, CompileError> {
	let ast = math_parser::parse(src)?;
	let mut compiler = ExpressionCompiler::new(variables);
	let result = compiler.compile(&ast)?;

	let mut builder = compiler.builder;
	let output = builder.add_output_dummy("Result", MFDataType::Single(result.ty));
	builder.add_link(result.socket, output).map_err(|error| CompileError::new(error.to_string(), ast.span))?;
	optimize_network(&mut builder, settings).map_err(|error| CompileError::new(error.to_string(), ast.span))?;

	let network = MFNetwork::new(&builder).map_err(|error| CompileError::new(error.to_string(), ast.span))?;
	let function = MFEvaluateNetwork::with_name(format!("Expression {src}"), network, compiler.inputs, vec![output]).map_err(|error| CompileError::new(error.to_string(), ast.span))?;
	log::debug!("Compiled expression `{src}` to {}", result.ty);

	Ok(CompiledExpression {
		source: src.to_string(),
		ast,
		result_type: result.ty,
		function,
	})
}

#[derive(Clone, Copy)]
struct Value {
	socket: MFSocketId,
	ty: &'static CppType,
}

struct ExpressionCompiler<'a> {
	builder: MFNetworkBuilder,
	variables: &'a ExpressionVariables,
	/// Output sockets of the input dummies, one per variable.
	inputs: Vec<MFSocketId>,
}

impl<'a> ExpressionCompiler<'a> {
	fn new(variables: &'a ExpressionVariables) -> Self {
		let mut builder = MFNetworkBuilder::new();
		let inputs = variables.iter().map(|(name, ty)| builder.add_input_dummy(name, MFDataType::Single(ty))).collect();
		Self { builder, variables, inputs }
	}

	fn compile(&mut self, expr: &Expr) -> Result<Value, CompileError> {
		match &expr.node {
			Node::Int(value) => self.constant(*value, expr.span),
			Node::Float(value) => self.constant(*value as f32, expr.span),
			Node::Str(value) => self.constant(value.clone(), expr.span),
			Node::Var(name) => self.variable(name, expr.span),
			Node::Unary { op, expr: operand } => {
				let value = self.compile(operand)?;
				if !is_number(value.ty) {
					return Err(CompileError::new(format!("unary `{}` is not defined for {}", unary_symbol(*op), value.ty), expr.span).with_label(value.ty.to_string(), operand.span));
				}
				match op {
					UnaryOp::Pos => Ok(value),
					UnaryOp::Neg => self.unary(UnaryOperation::Negate, value, expr.span),
				}
			}
			Node::Binary { lhs, op, rhs } => {
				let operands = [(self.compile(lhs)?, lhs.span), (self.compile(rhs)?, rhs.span)];
				self.binary(binary_operation(*op), operands, expr.span)
			}
			Node::Call { name, args } => self.call(name, args, expr.span),
		}
	}

	fn constant<T: CppTypeInfo + std::fmt::Debug>(&mut self, value: T, span: Span) -> Result<Value, CompileError> {
		self.add_node(Arc::new(ConstantValue::new(value)), &[], span)
	}

	fn variable(&mut self, name: &str, span: Span) -> Result<Value, CompileError> {
		if let Some((index, (_, ty))) = self.variables.iter().enumerate().find(|(_, (variable, _))| *variable == name) {
			return Ok(Value { socket: self.inputs[index], ty });
		}
		let constant = match name {
			"pi" => std::f32::consts::PI,
			"tau" => std::f32::consts::TAU,
			"e" => std::f32::consts::E,
			"phi" => 1.618_034,
			"inf" => f32::INFINITY,
			_ => return Err(CompileError::new(format!("unknown variable `{name}`"), span)),
		};
		self.constant(constant, span)
	}

	fn call(&mut self, name: &str, args: &[Expr], span: Span) -> Result<Value, CompileError> {
		let expected = match name {
			"sqrt" | "abs" | "sin" | "cos" => 1,
			"min" | "max" => 2,
			_ => return Err(CompileError::new(format!("unknown function `{name}`"), span)),
		};
		if args.len() != expected {
			let plural = if expected == 1 { "" } else { "s" };
			return Err(CompileError::new(format!("`{name}` expects {expected} argument{plural}, found {}", args.len()), span));
		}

		let values = args.iter().map(|arg| Ok((self.compile(arg)?, arg.span))).collect::<Result<Vec<_>, CompileError>>()?;
		match (name, values.as_slice()) {
			("min", &[lhs, rhs]) => self.binary(BinaryOperation::Minimum, [lhs, rhs], span),
			("max", &[lhs, rhs]) => self.binary(BinaryOperation::Maximum, [lhs, rhs], span),
			(_, &[(value, value_span)]) => {
				if !is_number(value.ty) {
					return Err(CompileError::new(format!("`{name}` expects a number, found {}", value.ty), value_span));
				}
				let operation = match name {
					"abs" => return self.unary(UnaryOperation::Absolute, value, span),
					"sqrt" => UnaryOperation::SquareRoot,
					"sin" => UnaryOperation::Sine,
					_ => UnaryOperation::Cosine,
				};
				let value = self.to_float(value, span)?;
				self.unary(operation, value, span)
			}
			_ => Err(CompileError::new(format!("`{name}` expects {expected} arguments"), span)),
		}
	}

	fn unary(&mut self, operation: UnaryOperation, value: Value, span: Span) -> Result<Value, CompileError> {
		let function = if value.ty.is::<i32>() { int_unary(operation) } else { float_unary(operation) };
		let Some(function) = function else {
			return Err(CompileError::new(format!("`{}` is not defined for {}", operation.name(), value.ty), span));
		};
		self.add_node(function, &[value.socket], span)
	}

	/// Mixed integer and float operands are computed as floats.
	fn binary(&mut self, operation: BinaryOperation, [(lhs, lhs_span), (rhs, rhs_span)]: [(Value, Span); 2], span: Span) -> Result<Value, CompileError> {
		let operand_type = if lhs.ty == rhs.ty {
			Some(lhs.ty)
		} else if is_number(lhs.ty) && is_number(rhs.ty) {
			Some(CppType::get::<f32>())
		} else {
			None
		};
		let function = operand_type.and_then(|ty| {
			if ty.is::<i32>() {
				int_binary(operation)
			} else if ty.is::<f32>() {
				float_binary(operation)
			} else if ty.is::<String>() {
				string_binary(operation)
			} else if ty.is::<bool>() {
				bool_binary(operation)
			} else {
				None
			}
		});
		let Some(function) = function else {
			return Err(CompileError::new(format!("`{}` is not defined for {} and {}", operation.symbol(), lhs.ty, rhs.ty), span)
				.with_label(lhs.ty.to_string(), lhs_span)
				.with_label(rhs.ty.to_string(), rhs_span));
		};

		let (lhs, rhs) = if lhs.ty == rhs.ty { (lhs, rhs) } else { (self.to_float(lhs, lhs_span)?, self.to_float(rhs, rhs_span)?) };
		self.add_node(function, &[lhs.socket, rhs.socket], span)
	}

	fn to_float(&mut self, value: Value, span: Span) -> Result<Value, CompileError> {
		if !value.ty.is::<i32>() {
			return Ok(value);
		}
		self.add_node(Arc::new(ConvertFn::<i32, f32>::new()), &[value.socket], span)
	}

	/// Adds `function`, links `inputs` to its parameters and returns its first output.
	fn add_node(&mut self, function: Arc<dyn MultiFunction>, inputs: &[MFSocketId], span: Span) -> Result<Value, CompileError> {
		let internal_error = || CompileError::new("failed to build the expression network", span);
		let id = self.builder.add_function(function);
		let node = self.builder.node(id).cloned().ok_or_else(internal_error)?;
		for (&from, &to) in inputs.iter().zip(&node.inputs) {
			self.builder.add_link(from, to).map_err(|error| CompileError::new(error.to_string(), span))?;
		}
		let socket = node.outputs.first().copied().ok_or_else(internal_error)?;
		let ty = self.builder.socket(socket).ok_or_else(internal_error)?.data_type.base_type();
		Ok(Value { socket, ty })
	}
}

fn is_number(ty: &CppType) -> bool {
	ty.is::<i32>() || ty.is::<f32>()
}

fn unary_symbol(op: UnaryOp) -> &'static str {
	match op {
		UnaryOp::Neg => "-",
		UnaryOp::Pos => "+",
	}
}

fn binary_operation(op: BinaryOp) -> BinaryOperation {
	match op {
		BinaryOp::Add => BinaryOperation::Add,
		BinaryOp::Sub => BinaryOperation::Subtract,
		BinaryOp::Mul => BinaryOperation::Multiply,
		BinaryOp::Div => BinaryOperation::Divide,
		BinaryOp::Pow => BinaryOperation::Power,
		BinaryOp::Lt => BinaryOperation::Less,
		BinaryOp::Le => BinaryOperation::LessEqual,
		BinaryOp::Gt => BinaryOperation::Greater,
		BinaryOp::Ge => BinaryOperation::GreaterEqual,
		BinaryOp::Eq => BinaryOperation::Equal,
		BinaryOp::Ne => BinaryOperation::NotEqual,
		BinaryOp::Shl => BinaryOperation::ShiftLeft,
		BinaryOp::Shr => BinaryOperation::ShiftRight,
	}
}
