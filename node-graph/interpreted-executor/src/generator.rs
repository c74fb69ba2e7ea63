use crate::evaluate_network::MFEvaluateNetwork;
use crate::node_registry::{NodeBuilder, NodeRegistry};
use crate::optimization::{OptimizationError, OptimizationSettings, optimize_network};
use core_types::generic::GenericVirtualListRef;
use core_types::{MFDataType, MultiFunction};
use graph_craft::TaggedValue;
use graph_craft::document::{GROUP_IDNAME, GROUP_INPUT_IDNAME, GROUP_OUTPUT_IDNAME};
use graph_craft::inlined_tree::{InlinedNodeTree, XInputSocket, XNodeRef, XSocketId, interface_sort_key};
use graph_craft::network::{LinkError, MFNetwork, MFNetworkBuilder, MFSocketId, NetworkError};
use math_nodes::{GenericConstantValue, GenericConstantVector};
use math_parser::CompileError;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum GeneratorError {
	#[error("node `{node}` has the unknown type `{idname}`")]
	UnknownNode { node: String, idname: String },
	#[error("socket `{socket}` has the unknown type `{idname}`")]
	UnknownSocketType { socket: String, idname: String },
	#[error("input `{socket}` is linked to more than one output")]
	MultipleOrigins { socket: String },
	#[error("input `{socket}` is linked to an output that does not produce a value")]
	UnmappedOrigin { socket: String },
	#[error("cannot convert {from} to {to} for input `{socket}`")]
	NoConversion { socket: String, from: MFDataType, to: MFDataType },
	#[error("the default value {value} of input `{socket}` cannot be used as {data_type}")]
	InvalidDefault { socket: String, value: TaggedValue, data_type: MFDataType },
	#[error("node `{node}` has the invalid {property} `{value}`")]
	InvalidProperty { node: String, property: String, value: String },
	#[error("node `{node}` has {found:?} (inputs, outputs) but its function `{function}` expects {expected:?}")]
	SignatureMismatch {
		node: String,
		function: String,
		expected: (usize, usize),
		found: (usize, usize),
	},
	#[error("node `{node}` has no input at index {index}")]
	MissingInput { node: String, index: usize },
	#[error("node `{node}` has no output at index {index}")]
	MissingOutput { node: String, index: usize },
	#[error("expression of node `{node}` does not compile: {source}")]
	Expression { node: String, source: CompileError },
	#[error(transparent)]
	Link(#[from] LinkError),
	#[error(transparent)]
	Network(#[from] NetworkError),
	#[error(transparent)]
	Optimization(#[from] OptimizationError),
}

/// The network generated from an inlined tree, with the dummies standing in for the root tree's interface.
#[derive(Debug)]
pub struct GeneratedNetwork {
	pub builder: MFNetworkBuilder,
	/// Outputs of the input dummies, in interface order.
	pub inputs: Vec<MFSocketId>,
	/// Inputs of the output dummies, in interface order.
	pub outputs: Vec<MFSocketId>,
	/// The network socket of every tree socket that takes part in the network.
	pub socket_map: FxHashMap<XSocketId, MFSocketId>,
}

impl GeneratedNetwork {
	pub fn into_evaluate_network(mut self, settings: &OptimizationSettings) -> Result<MFEvaluateNetwork, GeneratorError> {
		optimize_network(&mut self.builder, settings)?;
		let network = MFNetwork::new(&self.builder)?;
		Ok(MFEvaluateNetwork::new(network, self.inputs, self.outputs)?)
	}
}

/// Generates a network with one function node per tree node.
///
/// The group input and output nodes of the root tree become dummy nodes. Inputs without a link, and inputs linked to an
/// unlinked group input, are fed by constants made from their default values. Links between differently typed sockets go
/// through a conversion function from the registry.
pub fn generate_network(tree: &InlinedNodeTree, registry: &NodeRegistry) -> Result<GeneratedNetwork, GeneratorError> {
	let mut generator = Generator {
		tree,
		registry,
		builder: MFNetworkBuilder::new(),
		socket_map: FxHashMap::default(),
	};
	let inputs = generator.insert_interface(GROUP_INPUT_IDNAME)?;
	let outputs = generator.insert_interface(GROUP_OUTPUT_IDNAME)?;
	for xnode in tree.nodes() {
		generator.insert_node(xnode)?;
	}
	for xnode in tree.nodes() {
		for xsocket in xnode.inputs() {
			generator.link_input(xsocket)?;
		}
	}
	log::debug!("Generated a network with {} nodes from tree {}", generator.builder.node_amount(), tree.root());

	Ok(GeneratedNetwork {
		builder: generator.builder,
		inputs,
		outputs,
		socket_map: generator.socket_map,
	})
}

struct Generator<'a> {
	tree: &'a InlinedNodeTree,
	registry: &'a NodeRegistry,
	builder: MFNetworkBuilder,
	socket_map: FxHashMap<XSocketId, MFSocketId>,
}

impl<'a> Generator<'a> {
	/// Adds one dummy per available socket of the root tree's interface nodes of kind `idname`.
	fn insert_interface(&mut self, idname: &str) -> Result<Vec<MFSocketId>, GeneratorError> {
		let mut nodes: Vec<_> = self.tree.nodes_with_idname(idname).filter(|xnode| xnode.depth() == 0).collect();
		nodes.sort_by_cached_key(|xnode| interface_sort_key(xnode.vnode().properties(), xnode.name()));

		let is_input = idname == GROUP_INPUT_IDNAME;
		let mut dummies = Vec::new();
		for xnode in nodes {
			let sockets: Vec<_> = if is_input { xnode.outputs().map(|socket| *socket).collect() } else { xnode.inputs().map(|socket| *socket).collect() };
			for xsocket in sockets.into_iter().filter(|socket| socket.vsocket().is_available()) {
				let data_type = self.registry.socket_type(xsocket.idname()).ok_or_else(|| GeneratorError::UnknownSocketType {
					socket: socket_name(xsocket.node(), xsocket.name()),
					idname: xsocket.idname().to_string(),
				})?;
				let name = if xsocket.name().is_empty() { xnode.name() } else { xsocket.name() };
				let dummy = if is_input { self.builder.add_input_dummy(name, data_type) } else { self.builder.add_output_dummy(name, data_type) };
				self.socket_map.insert(xsocket.id(), dummy);
				dummies.push(dummy);
			}
		}
		Ok(dummies)
	}

	fn insert_node(&mut self, xnode: XNodeRef<'a>) -> Result<(), GeneratorError> {
		match xnode.idname() {
			GROUP_INPUT_IDNAME | GROUP_OUTPUT_IDNAME => return Ok(()),
			GROUP_IDNAME => return self.insert_opaque_group(xnode),
			_ => {}
		}
		let Some(build) = self.registry.node(xnode.idname()) else {
			return Err(GeneratorError::UnknownNode {
				node: xnode.name().to_string(),
				idname: xnode.idname().to_string(),
			});
		};
		let mut node_builder = NodeBuilder {
			builder: &mut self.builder,
			registry: self.registry,
			xnode,
			socket_map: &mut self.socket_map,
		};
		build(&mut node_builder)
	}

	/// A group node that was kept because its tree is missing outputs the defaults of its output sockets.
	fn insert_opaque_group(&mut self, xnode: XNodeRef<'a>) -> Result<(), GeneratorError> {
		log::warn!("Group node `{}` was not expanded, its outputs use their default values", xnode.name());
		for xsocket in xnode.outputs().filter(|socket| socket.vsocket().is_available()) {
			let name = socket_name(xnode, xsocket.name());
			let data_type = self.registry.socket_type(xsocket.idname()).ok_or_else(|| GeneratorError::UnknownSocketType {
				socket: name.clone(),
				idname: xsocket.idname().to_string(),
			})?;
			let constant = self.insert_constant(&name, xsocket.default_value(), data_type)?;
			self.socket_map.insert(xsocket.id(), constant);
		}
		Ok(())
	}

	fn link_input(&mut self, xsocket: XInputSocket<'a>) -> Result<(), GeneratorError> {
		let Some(&target) = self.socket_map.get(&xsocket.id()) else {
			// The node does not use this input
			return Ok(());
		};
		let name = socket_name(xsocket.node(), xsocket.name());
		let to_type = self.data_type(target)?;

		let origins = xsocket.linked_sockets().len() + xsocket.linked_group_inputs().len();
		if origins > 1 {
			return Err(GeneratorError::MultipleOrigins { socket: name });
		}

		if let Some(origin) = xsocket.linked_sockets().next() {
			let origin = *self.socket_map.get(&origin.id()).ok_or_else(|| GeneratorError::UnmappedOrigin { socket: name.clone() })?;
			let from_type = self.data_type(origin)?;
			if to_type.accepts(&from_type) {
				self.builder.add_link(origin, target)?;
			} else {
				let conversion = self.registry.conversion(from_type, to_type).ok_or_else(|| GeneratorError::NoConversion {
					socket: name.clone(),
					from: from_type,
					to: to_type,
				})?;
				let (input, output) = self.add_single_io_function(conversion)?;
				self.builder.add_link(origin, input)?;
				self.builder.add_link(output, target)?;
			}
			return Ok(());
		}

		let default_value = match xsocket.linked_group_inputs().next() {
			Some(group_input) => group_input.default_value(),
			None => xsocket.default_value(),
		};
		let constant = self.insert_constant(&name, default_value, to_type)?;
		self.builder.add_link(constant, target)?;
		Ok(())
	}

	/// Adds a constant function producing `value`, returning its output.
	fn insert_constant(&mut self, socket: &str, value: &TaggedValue, data_type: MFDataType) -> Result<MFSocketId, GeneratorError> {
		let invalid = || GeneratorError::InvalidDefault {
			socket: socket.to_string(),
			value: value.clone(),
			data_type,
		};
		let function: Arc<dyn MultiFunction> = match data_type {
			MFDataType::Single(ty) => Arc::new(GenericConstantValue::new(value.to_generic(ty).ok_or_else(invalid)?)),
			MFDataType::Vector(ty) => match value {
				TaggedValue::None => Arc::new(GenericConstantVector::new(GenericVirtualListRef::empty(ty))),
				TaggedValue::IntList(values) if ty.is::<i32>() => Arc::new(GenericConstantVector::from_vec(values)),
				TaggedValue::FloatList(values) if ty.is::<f32>() => Arc::new(GenericConstantVector::from_vec(values)),
				_ => return Err(invalid()),
			},
		};
		let id = self.builder.add_function(function);
		let node = self.builder.node(id).ok_or(NetworkError::NodeNotFound(id))?;
		Ok(node.outputs[0])
	}

	fn add_single_io_function(&mut self, function: Arc<dyn MultiFunction>) -> Result<(MFSocketId, MFSocketId), GeneratorError> {
		let id = self.builder.add_function(function);
		let node = self.builder.node(id).ok_or(NetworkError::NodeNotFound(id))?;
		match (node.inputs.as_slice(), node.outputs.as_slice()) {
			(&[input], &[output]) => Ok((input, output)),
			_ => Err(NetworkError::NodeNotFound(id).into()),
		}
	}

	fn data_type(&self, socket: MFSocketId) -> Result<MFDataType, GeneratorError> {
		Ok(self.builder.socket(socket).ok_or(NetworkError::SocketNotFound(socket))?.data_type)
	}
}

fn socket_name(xnode: XNodeRef, socket: &str) -> String {
	format!("{}.{socket}", xnode.name())
}
