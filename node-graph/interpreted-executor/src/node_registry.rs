use crate::cache::ExpressionCache;
use crate::expression::ExpressionVariables;
use crate::generator::GeneratorError;
use core_types::{CppTypeInfo, MFDataType, MultiFunction};
use glam::Vec3;
use graph_craft::inlined_tree::{XNodeRef, XSocketId};
use graph_craft::network::{MFBuilderNode, MFNetworkBuilder, MFSocketId};
use math_nodes::{
	AppendToListFn, BinaryFn, BinaryOperation, CombineVectorFn, ContextValueFn, ConvertFn, GetListElementFn, ListLengthFn, PackListFn, SeparateVectorFn, UnaryFn, UnaryOperation, float_binary, float_unary, int_binary,
	int_unary,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Adds the function nodes for one tree node and maps its sockets.
pub type NodeBuildFn = Box<dyn Fn(&mut NodeBuilder) -> Result<(), GeneratorError> + Send + Sync>;
pub type ConversionFn = fn() -> Arc<dyn MultiFunction>;

/// Everything the generator needs to know about the nodes and sockets a tree may contain.
pub struct NodeRegistry {
	sockets: FxHashMap<String, MFDataType>,
	nodes: FxHashMap<String, NodeBuildFn>,
	conversions: FxHashMap<(MFDataType, MFDataType), ConversionFn>,
	expressions: ExpressionCache,
}

impl Default for NodeRegistry {
	fn default() -> Self {
		let mut registry = Self::empty();
		register_socket_types(&mut registry);
		register_conversions(&mut registry);
		register_math_nodes(&mut registry);
		register_list_nodes(&mut registry);
		registry
	}
}

impl NodeRegistry {
	/// A registry without any nodes, sockets or conversions.
	pub fn empty() -> Self {
		Self {
			sockets: FxHashMap::default(),
			nodes: FxHashMap::default(),
			conversions: FxHashMap::default(),
			expressions: ExpressionCache::default(),
		}
	}

	pub fn register_socket(&mut self, idname: impl Into<String>, data_type: MFDataType) {
		self.sockets.insert(idname.into(), data_type);
	}

	pub fn register_node(&mut self, idname: impl Into<String>, build: impl Fn(&mut NodeBuilder) -> Result<(), GeneratorError> + Send + Sync + 'static) {
		let idname = idname.into();
		if self.nodes.insert(idname.clone(), Box::new(build)).is_some() {
			log::debug!("Replaced the builder of node `{idname}`");
		}
	}

	pub fn register_conversion(&mut self, from: MFDataType, to: MFDataType, conversion: ConversionFn) {
		self.conversions.insert((from, to), conversion);
	}

	pub fn socket_type(&self, idname: &str) -> Option<MFDataType> {
		self.sockets.get(idname).copied()
	}

	pub fn node(&self, idname: &str) -> Option<&NodeBuildFn> {
		self.nodes.get(idname)
	}

	pub fn conversion(&self, from: MFDataType, to: MFDataType) -> Option<Arc<dyn MultiFunction>> {
		self.conversions.get(&(from, to)).map(|conversion| conversion())
	}

	pub fn expressions(&self) -> &ExpressionCache {
		&self.expressions
	}
}

impl std::fmt::Debug for NodeRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut nodes: Vec<_> = self.nodes.keys().collect();
		nodes.sort();
		f.debug_struct("NodeRegistry").field("nodes", &nodes).field("sockets", &self.sockets.len()).field("conversions", &self.conversions.len()).finish()
	}
}

/// Handed to a [`NodeBuildFn`] while the network for one tree node is generated.
pub struct NodeBuilder<'a, 'b> {
	pub(crate) builder: &'b mut MFNetworkBuilder,
	pub(crate) registry: &'b NodeRegistry,
	pub(crate) xnode: XNodeRef<'a>,
	pub(crate) socket_map: &'b mut FxHashMap<XSocketId, MFSocketId>,
}

impl<'a> NodeBuilder<'a, '_> {
	pub fn xnode(&self) -> XNodeRef<'a> {
		self.xnode
	}

	pub fn registry(&self) -> &NodeRegistry {
		self.registry
	}

	pub fn network(&mut self) -> &mut MFNetworkBuilder {
		self.builder
	}

	pub fn add_function(&mut self, function: Arc<dyn MultiFunction>) -> Result<MFBuilderNode, GeneratorError> {
		let id = self.builder.add_function(function);
		self.builder.node(id).cloned().ok_or_else(|| GeneratorError::Network(graph_craft::NetworkError::NodeNotFound(id)))
	}

	/// Makes `socket` receive the values of the tree node's input at `index`.
	pub fn map_input(&mut self, index: usize, socket: MFSocketId) -> Result<(), GeneratorError> {
		let input = self.xnode.get_input(index).ok_or_else(|| GeneratorError::MissingInput {
			node: self.xnode.name().to_string(),
			index,
		})?;
		self.socket_map.insert(input.id(), socket);
		Ok(())
	}

	/// Makes `socket` provide the values of the tree node's output at `index`.
	pub fn map_output(&mut self, index: usize, socket: MFSocketId) -> Result<(), GeneratorError> {
		let output = self.xnode.get_output(index).ok_or_else(|| GeneratorError::MissingOutput {
			node: self.xnode.name().to_string(),
			index,
		})?;
		self.socket_map.insert(output.id(), socket);
		Ok(())
	}

	pub fn property_str(&self, name: &str) -> Result<&'a str, GeneratorError> {
		self.xnode.property(name).and_then(|value| value.as_str()).ok_or_else(|| self.invalid_property(name))
	}

	pub fn invalid_property(&self, name: &str) -> GeneratorError {
		GeneratorError::InvalidProperty {
			node: self.xnode.name().to_string(),
			property: name.to_string(),
			value: self.xnode.property(name).map(ToString::to_string).unwrap_or_default(),
		}
	}

	/// Adds `function` and maps the available sockets of the tree node to its inputs and outputs in order.
	pub fn add_matching_function(&mut self, function: Arc<dyn MultiFunction>) -> Result<MFBuilderNode, GeneratorError> {
		let inputs: Vec<_> = self.xnode.inputs().filter(|socket| socket.vsocket().is_available()).map(|socket| socket.index()).collect();
		let outputs: Vec<_> = self.xnode.outputs().filter(|socket| socket.vsocket().is_available()).map(|socket| socket.index()).collect();
		let name = function.name().to_string();
		let node = self.add_function(function)?;
		if inputs.len() != node.inputs.len() || outputs.len() != node.outputs.len() {
			return Err(GeneratorError::SignatureMismatch {
				node: self.xnode.name().to_string(),
				function: name,
				expected: (node.inputs.len(), node.outputs.len()),
				found: (inputs.len(), outputs.len()),
			});
		}
		for (&index, &socket) in inputs.iter().zip(&node.inputs) {
			self.map_input(index, socket)?;
		}
		for (&index, &socket) in outputs.iter().zip(&node.outputs) {
			self.map_output(index, socket)?;
		}
		Ok(node)
	}

	/// Adds `function` and maps its inputs and outputs to the leading sockets of the tree node.
	///
	/// Extra sockets of the tree node stay unused, like the second input of a math node set to a unary operation.
	pub fn add_leading_function(&mut self, function: Arc<dyn MultiFunction>) -> Result<MFBuilderNode, GeneratorError> {
		let name = function.name().to_string();
		let node = self.add_function(function)?;
		let expected = (node.inputs.len(), node.outputs.len());
		let found = (self.xnode.inputs().len(), self.xnode.outputs().len());
		if found.0 < expected.0 || found.1 < expected.1 {
			return Err(GeneratorError::SignatureMismatch {
				node: self.xnode.name().to_string(),
				function: name,
				expected,
				found,
			});
		}
		for (index, &socket) in node.inputs.iter().enumerate() {
			self.map_input(index, socket)?;
		}
		for (index, &socket) in node.outputs.iter().enumerate() {
			self.map_output(index, socket)?;
		}
		Ok(node)
	}
}

fn register_socket_types(registry: &mut NodeRegistry) {
	registry.register_socket("fn_FloatSocket", MFDataType::for_single::<f32>());
	registry.register_socket("fn_IntegerSocket", MFDataType::for_single::<i32>());
	registry.register_socket("fn_BooleanSocket", MFDataType::for_single::<bool>());
	registry.register_socket("fn_TextSocket", MFDataType::for_single::<String>());
	registry.register_socket("fn_VectorSocket", MFDataType::for_single::<Vec3>());
	registry.register_socket("fn_FloatListSocket", MFDataType::for_vector::<f32>());
	registry.register_socket("fn_IntegerListSocket", MFDataType::for_vector::<i32>());
}

fn register_conversions(registry: &mut NodeRegistry) {
	registry.register_conversion(MFDataType::for_single::<i32>(), MFDataType::for_single::<f32>(), || Arc::new(ConvertFn::<i32, f32>::new()));
	registry.register_conversion(MFDataType::for_single::<f32>(), MFDataType::for_single::<i32>(), || Arc::new(ConvertFn::<f32, i32>::new()));
	registry.register_conversion(MFDataType::for_single::<bool>(), MFDataType::for_single::<f32>(), || Arc::new(UnaryFn::new("bool to f32", |value: &bool| *value as i32 as f32)));
	registry.register_conversion(MFDataType::for_single::<bool>(), MFDataType::for_single::<i32>(), || Arc::new(UnaryFn::new("bool to i32", |value: &bool| *value as i32)));
}

enum MathOperation {
	Binary(BinaryOperation),
	Unary(UnaryOperation),
}

fn math_operation(name: &str) -> Option<MathOperation> {
	use BinaryOperation::*;
	let operation = match name {
		"add" => Add,
		"subtract" => Subtract,
		"multiply" => Multiply,
		"divide" => Divide,
		"power" => Power,
		"minimum" => Minimum,
		"maximum" => Maximum,
		"less" => Less,
		"less_equal" => LessEqual,
		"greater" => Greater,
		"greater_equal" => GreaterEqual,
		"equal" => Equal,
		"not_equal" => NotEqual,
		"shift_left" => ShiftLeft,
		"shift_right" => ShiftRight,
		"negate" => return Some(MathOperation::Unary(UnaryOperation::Negate)),
		"absolute" => return Some(MathOperation::Unary(UnaryOperation::Absolute)),
		"sqrt" => return Some(MathOperation::Unary(UnaryOperation::SquareRoot)),
		"sine" => return Some(MathOperation::Unary(UnaryOperation::Sine)),
		"cosine" => return Some(MathOperation::Unary(UnaryOperation::Cosine)),
		_ => return None,
	};
	Some(MathOperation::Binary(operation))
}

/// Binary operations use the first two inputs, unary ones only the first.
fn build_math_node(
	builder: &mut NodeBuilder,
	binary: fn(BinaryOperation) -> Option<Arc<dyn MultiFunction>>,
	unary: fn(UnaryOperation) -> Option<Arc<dyn MultiFunction>>,
) -> Result<(), GeneratorError> {
	let function = match math_operation(builder.property_str("operation")?) {
		Some(MathOperation::Binary(operation)) => binary(operation),
		Some(MathOperation::Unary(operation)) => unary(operation),
		None => None,
	};
	let function = function.ok_or_else(|| builder.invalid_property("operation"))?;
	builder.add_leading_function(function).map(drop)
}

fn register_math_nodes(registry: &mut NodeRegistry) {
	registry.register_node("fn_FloatMathNode", |builder| build_math_node(builder, float_binary, float_unary));
	registry.register_node("fn_IntegerMathNode", |builder| build_math_node(builder, int_binary, int_unary));
	registry.register_node("fn_BooleanMathNode", |builder| {
		let function: Arc<dyn MultiFunction> = match builder.property_str("operation")? {
			"and" => Arc::new(BinaryFn::new("And", |a: &bool, b: &bool| *a && *b)),
			"or" => Arc::new(BinaryFn::new("Or", |a: &bool, b: &bool| *a || *b)),
			"not" => Arc::new(UnaryFn::new("Not", |a: &bool| !a)),
			_ => return Err(builder.invalid_property("operation")),
		};
		builder.add_leading_function(function).map(drop)
	});
	registry.register_node("fn_CombineVectorNode", |builder| builder.add_matching_function(Arc::new(CombineVectorFn::new())).map(drop));
	registry.register_node("fn_SeparateVectorNode", |builder| builder.add_matching_function(Arc::new(SeparateVectorFn::new())).map(drop));
	registry.register_node("fn_TimeNode", |builder| builder.add_matching_function(Arc::new(ContextValueFn::<f32>::new("Time"))).map(drop));
	registry.register_node("fn_ExpressionNode", build_expression_node);
}

/// Every available input becomes a variable named like the socket.
fn build_expression_node(builder: &mut NodeBuilder) -> Result<(), GeneratorError> {
	let source = builder.property_str("expression")?;
	let mut variables = ExpressionVariables::new();
	for socket in builder.xnode().inputs().filter(|socket| socket.vsocket().is_available()) {
		match builder.registry().socket_type(socket.idname()) {
			Some(MFDataType::Single(ty)) => variables.add(socket.name(), ty),
			_ => {
				return Err(GeneratorError::UnknownSocketType {
					socket: format!("{}.{}", socket.node().name(), socket.name()),
					idname: socket.idname().to_string(),
				});
			}
		}
	}
	let compiled = builder.registry().expressions().get_or_compile(source, &variables).map_err(|source| GeneratorError::Expression {
		node: builder.xnode().name().to_string(),
		source,
	})?;
	builder.add_matching_function(compiled).map(drop)
}

/// Which list element type a list node operates on.
fn list_type(builder: &NodeBuilder) -> Result<ListType, GeneratorError> {
	match builder.xnode().property("data_type").and_then(|value| value.as_str()).unwrap_or("float") {
		"float" => Ok(ListType::Float),
		"integer" => Ok(ListType::Integer),
		_ => Err(builder.invalid_property("data_type")),
	}
}

enum ListType {
	Float,
	Integer,
}

macro_rules! list_node {
	($registry:expr, $idname:literal, |$builder:ident| $function:ident) => {
		$registry.register_node($idname, |$builder| {
			let function: Arc<dyn MultiFunction> = match list_type($builder)? {
				ListType::Float => $function::<f32>($builder),
				ListType::Integer => $function::<i32>($builder),
			};
			$builder.add_matching_function(function).map(drop)
		});
	};
}

fn pack_list<T: CppTypeInfo>(builder: &NodeBuilder) -> Arc<dyn MultiFunction> {
	let input_amount = builder.xnode().inputs().filter(|socket| socket.vsocket().is_available()).count();
	Arc::new(PackListFn::<T>::new(input_amount))
}

fn list_length<T: CppTypeInfo>(_: &NodeBuilder) -> Arc<dyn MultiFunction> {
	Arc::new(ListLengthFn::<T>::new())
}

fn get_list_element<T: CppTypeInfo>(_: &NodeBuilder) -> Arc<dyn MultiFunction> {
	Arc::new(GetListElementFn::<T>::new())
}

fn append_to_list<T: CppTypeInfo>(_: &NodeBuilder) -> Arc<dyn MultiFunction> {
	Arc::new(AppendToListFn::<T>::new())
}

fn register_list_nodes(registry: &mut NodeRegistry) {
	list_node!(registry, "fn_PackListNode", |builder| pack_list);
	list_node!(registry, "fn_ListLengthNode", |builder| list_length);
	list_node!(registry, "fn_GetListElementNode", |builder| get_list_element);
	list_node!(registry, "fn_AppendToListNode", |builder| append_to_list);
}

#[cfg(test)]
mod test {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn default_registry_knows_builtin_nodes() {
		let registry = NodeRegistry::default();
		for idname in ["fn_FloatMathNode", "fn_IntegerMathNode", "fn_BooleanMathNode", "fn_CombineVectorNode", "fn_ExpressionNode", "fn_PackListNode", "fn_TimeNode"] {
			assert!(registry.node(idname).is_some(), "{idname} is not registered");
		}
		assert!(registry.node("fn_GroupNode").is_none());
		assert_eq!(registry.socket_type("fn_FloatListSocket"), Some(MFDataType::for_vector::<f32>()));
		assert_eq!(registry.socket_type("fn_UnknownSocket"), None);
	}

	#[test]
	fn conversions_are_directional() {
		let registry = NodeRegistry::default();
		let int = MFDataType::for_single::<i32>();
		let float = MFDataType::for_single::<f32>();
		let string = MFDataType::for_single::<String>();
		assert_eq!(registry.conversion(int, float).map(|function| function.name().to_string()), Some("i32 to f32".to_string()));
		assert!(registry.conversion(MFDataType::for_single::<bool>(), int).is_some());
		assert!(registry.conversion(float, MFDataType::for_single::<bool>()).is_none());
		assert!(registry.conversion(string, float).is_none());
	}

	#[test]
	fn math_operations_by_name() {
		assert!(matches!(math_operation("multiply"), Some(MathOperation::Binary(BinaryOperation::Multiply))));
		assert!(matches!(math_operation("sine"), Some(MathOperation::Unary(UnaryOperation::Sine))));
		assert!(math_operation("modulo").is_none());
	}
}
