pub mod builder;

pub use builder::{LinkError, MFBuilderNode, MFBuilderSocket, MFNetworkBuilder, MFNodeId, MFNodeKind, MFSocketId};

use core_types::{MFDataType, MultiFunction};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
	#[error("input `{name}` of node `{node}` is not linked")]
	UnlinkedInput { node: String, name: String },
	#[error("the network contains a cycle through node `{0}`")]
	Cycle(String),
	#[error("node {0} does not exist")]
	NodeNotFound(MFNodeId),
	#[error("socket {0} does not exist")]
	SocketNotFound(MFSocketId),
	#[error("socket {0} is not an input socket")]
	NotAnInputSocket(MFSocketId),
	#[error("socket {0} is not an output socket")]
	NotAnOutputSocket(MFSocketId),
	#[error("the requested outputs depend on dummy socket {0}, which is not a network input")]
	MissingNetworkInput(MFSocketId),
}

#[derive(Clone, Debug)]
pub struct MFNode {
	pub name: String,
	pub function: Option<Arc<dyn MultiFunction>>,
	pub input_param_indices: Vec<usize>,
	pub output_param_indices: Vec<usize>,
	pub inputs: Vec<MFSocketId>,
	pub outputs: Vec<MFSocketId>,
}

impl MFNode {
	pub fn is_dummy(&self) -> bool {
		self.function.is_none()
	}

	pub fn is_function(&self) -> bool {
		self.function.is_some()
	}
}

#[derive(Clone, Debug)]
pub struct MFInputSocket {
	pub node: MFNodeId,
	pub index: usize,
	pub data_type: MFDataType,
	pub name: String,
	pub origin: MFSocketId,
}

#[derive(Clone, Debug)]
pub struct MFOutputSocket {
	pub node: MFNodeId,
	pub index: usize,
	pub data_type: MFDataType,
	pub name: String,
	pub targets: Vec<MFSocketId>,
}

#[derive(Clone, Debug)]
pub enum MFSocket {
	Input(MFInputSocket),
	Output(MFOutputSocket),
}

impl MFSocket {
	pub fn node(&self) -> MFNodeId {
		match self {
			Self::Input(socket) => socket.node,
			Self::Output(socket) => socket.node,
		}
	}

	pub fn data_type(&self) -> MFDataType {
		match self {
			Self::Input(socket) => socket.data_type,
			Self::Output(socket) => socket.data_type,
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Input(socket) => &socket.name,
			Self::Output(socket) => &socket.name,
		}
	}
}

/// Immutable, validated copy of a [`MFNetworkBuilder`]. Node and socket ids are the same as in the builder.
///
/// Every input is linked to exactly one output and the network is acyclic.
#[derive(Clone, Debug)]
pub struct MFNetwork {
	nodes: Vec<Option<MFNode>>,
	sockets: Vec<Option<MFSocket>>,
	topological_order: Vec<MFNodeId>,
}

impl MFNetwork {
	pub fn new(builder: &MFNetworkBuilder) -> Result<Self, NetworkError> {
		let mut nodes = vec![None; builder.node_id_amount()];
		let mut sockets = vec![None; builder.socket_id_amount()];
		let mut graph = DiGraphMap::<MFNodeId, ()>::new();

		for (id, node) in builder.nodes() {
			graph.add_node(id);
			let (function, input_param_indices, output_param_indices) = match &node.kind {
				MFNodeKind::Function {
					function,
					input_param_indices,
					output_param_indices,
				} => (Some(function.clone()), input_param_indices.clone(), output_param_indices.clone()),
				MFNodeKind::Dummy => (None, Vec::new(), Vec::new()),
			};
			nodes[id.index()] = Some(MFNode {
				name: node.name.clone(),
				function,
				input_param_indices,
				output_param_indices,
				inputs: node.inputs.clone(),
				outputs: node.outputs.clone(),
			});
		}

		for (id, socket) in builder.sockets() {
			let copied = if socket.is_output {
				MFSocket::Output(MFOutputSocket {
					node: socket.node,
					index: socket.index,
					data_type: socket.data_type,
					name: socket.name.clone(),
					targets: socket.targets.clone(),
				})
			} else {
				let Some(origin) = socket.origin else {
					let node = builder.node(socket.node).map(|node| node.name.clone()).unwrap_or_default();
					return Err(NetworkError::UnlinkedInput { node, name: socket.name.clone() });
				};
				let origin_node = builder.socket(origin).ok_or(NetworkError::SocketNotFound(origin))?.node;
				graph.add_edge(origin_node, socket.node, ());
				MFSocket::Input(MFInputSocket {
					node: socket.node,
					index: socket.index,
					data_type: socket.data_type,
					name: socket.name.clone(),
					origin,
				})
			};
			sockets[id.index()] = Some(copied);
		}

		let topological_order = toposort(&graph, None).map_err(|cycle| {
			let node = cycle.node_id();
			NetworkError::Cycle(builder.node(node).map(|node| node.name.clone()).unwrap_or_else(|| node.to_string()))
		})?;

		log::trace!("Compiled network with {} nodes", topological_order.len());
		Ok(Self { nodes, sockets, topological_order })
	}

	pub fn node(&self, id: MFNodeId) -> Result<&MFNode, NetworkError> {
		self.nodes.get(id.index()).and_then(Option::as_ref).ok_or(NetworkError::NodeNotFound(id))
	}

	pub fn socket(&self, id: MFSocketId) -> Result<&MFSocket, NetworkError> {
		self.sockets.get(id.index()).and_then(Option::as_ref).ok_or(NetworkError::SocketNotFound(id))
	}

	pub fn input_socket(&self, id: MFSocketId) -> Result<&MFInputSocket, NetworkError> {
		match self.socket(id)? {
			MFSocket::Input(socket) => Ok(socket),
			MFSocket::Output(_) => Err(NetworkError::NotAnInputSocket(id)),
		}
	}

	pub fn output_socket(&self, id: MFSocketId) -> Result<&MFOutputSocket, NetworkError> {
		match self.socket(id)? {
			MFSocket::Output(socket) => Ok(socket),
			MFSocket::Input(_) => Err(NetworkError::NotAnOutputSocket(id)),
		}
	}

	pub fn socket_id_amount(&self) -> usize {
		self.sockets.len()
	}

	pub fn nodes(&self) -> impl Iterator<Item = (MFNodeId, &MFNode)> {
		self.nodes.iter().enumerate().filter_map(|(index, node)| Some((MFNodeId(index as u32), node.as_ref()?)))
	}

	/// Every node comes after all nodes it depends on.
	pub fn topological_order(&self) -> &[MFNodeId] {
		&self.topological_order
	}

	/// Outputs of dummy nodes the given sockets depend on.
	pub fn find_dummy_dependencies(&self, sockets: impl IntoIterator<Item = MFSocketId>) -> Vec<MFSocketId> {
		let mut visited = FxHashSet::default();
		let mut stack: Vec<_> = sockets.into_iter().collect();
		let mut dummies = Vec::new();

		while let Some(id) = stack.pop() {
			if !visited.insert(id) {
				continue;
			}
			match self.socket(id) {
				Ok(MFSocket::Input(socket)) => stack.push(socket.origin),
				Ok(MFSocket::Output(socket)) => match self.node(socket.node) {
					Ok(node) if node.is_dummy() => dummies.push(id),
					Ok(node) => stack.extend(node.inputs.iter().copied()),
					Err(_) => {}
				},
				Err(_) => {}
			}
		}
		dummies.sort();
		dummies
	}

	pub fn to_dot(&self) -> String {
		let mut dot = String::from("digraph MFNetwork {\n  rankdir=LR;\n");
		for (id, node) in self.nodes() {
			let style = if node.is_dummy() { " style=dashed" } else { "" };
			dot += &format!("  n{id} [label=\"{}\"{style}];\n", builder::escape_record(&node.name));
		}
		for socket in self.sockets.iter().flatten() {
			if let MFSocket::Input(input) = socket {
				if let Ok(origin) = self.output_socket(input.origin) {
					dot += &format!("  n{} -> n{} [label=\"{} -> {}\"];\n", origin.node, input.node, origin.name, input.name);
				}
			}
		}
		dot.push('}');
		dot
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use math_nodes::UnaryFn;
	use pretty_assertions::assert_eq;

	fn add_one() -> Arc<dyn MultiFunction> {
		Arc::new(UnaryFn::new("Add One", |value: &f32| value + 1.))
	}

	fn chain() -> (MFNetworkBuilder, MFSocketId, MFSocketId, MFNodeId) {
		let mut builder = MFNetworkBuilder::new();
		let input = builder.add_input_dummy("In", MFDataType::for_single::<f32>());
		let node = builder.add_function(add_one());
		let output = builder.add_output_dummy("Out", MFDataType::for_single::<f32>());
		let (node_in, node_out) = (builder.node(node).unwrap().inputs[0], builder.node(node).unwrap().outputs[0]);
		builder.add_link(input, node_in).unwrap();
		builder.add_link(node_out, output).unwrap();
		(builder, input, output, node)
	}

	#[test]
	fn ids_are_preserved() {
		let (mut builder, input, output, node) = chain();
		let removed = builder.add_function(add_one());
		let removed_in = builder.node(removed).unwrap().inputs[0];
		builder.add_link(input, removed_in).unwrap();
		builder.remove_node(removed);

		let network = MFNetwork::new(&builder).unwrap();
		assert_eq!(network.node(node).unwrap().name, "Add One");
		assert_eq!(network.node(removed).err(), Some(NetworkError::NodeNotFound(removed)));
		assert_eq!(network.output_socket(input).unwrap().targets.len(), 1);
		assert_eq!(network.input_socket(output).unwrap().origin, network.node(node).unwrap().outputs[0]);
		assert_eq!(network.input_socket(input).err(), Some(NetworkError::NotAnInputSocket(input)));

		let order = network.topological_order();
		let position = |id| order.iter().position(|&node| node == id).unwrap();
		assert!(position(network.output_socket(input).unwrap().node) < position(node));
		assert_eq!(network.find_dummy_dependencies([output]), vec![input]);
		assert!(network.to_dot().contains(" -> "));
	}

	#[test]
	fn unlinked_inputs_are_rejected() {
		let mut builder = MFNetworkBuilder::new();
		builder.add_function(add_one());
		assert_eq!(
			MFNetwork::new(&builder).err(),
			Some(NetworkError::UnlinkedInput {
				node: "Add One".into(),
				name: "A".into()
			})
		);
	}

	#[test]
	fn cycles_are_rejected() {
		let mut builder = MFNetworkBuilder::new();
		let a = builder.add_function(add_one());
		let b = builder.add_function(add_one());
		let [a_in, a_out] = [builder.node(a).unwrap().inputs[0], builder.node(a).unwrap().outputs[0]];
		let [b_in, b_out] = [builder.node(b).unwrap().inputs[0], builder.node(b).unwrap().outputs[0]];
		builder.add_link(a_out, b_in).unwrap();
		builder.add_link(b_out, a_in).unwrap();
		assert_eq!(MFNetwork::new(&builder).err(), Some(NetworkError::Cycle("Add One".into())));
	}
}
