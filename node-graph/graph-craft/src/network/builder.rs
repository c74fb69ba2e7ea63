use core_types::{MFDataType, MultiFunction};
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MFNodeId(pub u32);

/// Input and output sockets share one id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MFSocketId(pub u32);

impl MFNodeId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl MFSocketId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for MFNodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl fmt::Display for MFSocketId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
	#[error("socket {0} does not exist")]
	SocketNotFound(MFSocketId),
	#[error("socket {0} is not an output")]
	NotAnOutput(MFSocketId),
	#[error("socket {0} is not an input")]
	NotAnInput(MFSocketId),
	#[error("input {input} is already linked to {origin}")]
	InputAlreadyLinked { input: MFSocketId, origin: MFSocketId },
	#[error("cannot link {from} of type {from_type} to {to} of type {to_type}")]
	TypeMismatch {
		from: MFSocketId,
		to: MFSocketId,
		from_type: MFDataType,
		to_type: MFDataType,
	},
	#[error("{from} is not linked to {to}")]
	NotLinked { from: MFSocketId, to: MFSocketId },
}

#[derive(Clone, Debug)]
pub enum MFNodeKind {
	Function {
		function: Arc<dyn MultiFunction>,
		/// Parameter index of every input socket.
		input_param_indices: Vec<usize>,
		/// Parameter index of every output socket.
		output_param_indices: Vec<usize>,
	},
	/// Marks the boundary of the network without computing anything.
	Dummy,
}

#[derive(Clone, Debug)]
pub struct MFBuilderNode {
	pub name: String,
	pub kind: MFNodeKind,
	pub inputs: Vec<MFSocketId>,
	pub outputs: Vec<MFSocketId>,
}

impl MFBuilderNode {
	pub fn is_function(&self) -> bool {
		matches!(self.kind, MFNodeKind::Function { .. })
	}

	pub fn is_dummy(&self) -> bool {
		matches!(self.kind, MFNodeKind::Dummy)
	}

	pub fn function(&self) -> Option<&Arc<dyn MultiFunction>> {
		match &self.kind {
			MFNodeKind::Function { function, .. } => Some(function),
			MFNodeKind::Dummy => None,
		}
	}
}

#[derive(Clone, Debug)]
pub struct MFBuilderSocket {
	pub node: MFNodeId,
	/// Position within the inputs or outputs of the node.
	pub index: usize,
	pub is_output: bool,
	pub data_type: MFDataType,
	pub name: String,
	/// Only used by inputs.
	pub origin: Option<MFSocketId>,
	/// Only used by outputs.
	pub targets: Vec<MFSocketId>,
}

/// Editable graph of multi-function nodes.
///
/// Every input has at most one origin, outputs can have any number of targets. Removing nodes leaves holes, so ids stay
/// stable while optimization passes edit the network.
#[derive(Clone, Debug, Default)]
pub struct MFNetworkBuilder {
	nodes: Vec<Option<MFBuilderNode>>,
	sockets: Vec<Option<MFBuilderSocket>>,
}

impl MFNetworkBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	fn add_node(&mut self, name: String, kind: MFNodeKind, inputs: &[(String, MFDataType)], outputs: &[(String, MFDataType)]) -> MFNodeId {
		let id = MFNodeId(self.nodes.len() as u32);
		let mut add_sockets = |sockets: &[(String, MFDataType)], is_output: bool| {
			sockets
				.iter()
				.enumerate()
				.map(|(index, (name, data_type))| {
					let socket = MFSocketId(self.sockets.len() as u32);
					self.sockets.push(Some(MFBuilderSocket {
						node: id,
						index,
						is_output,
						data_type: *data_type,
						name: name.clone(),
						origin: None,
						targets: Vec::new(),
					}));
					socket
				})
				.collect::<Vec<_>>()
		};
		let inputs = add_sockets(inputs, false);
		let outputs = add_sockets(outputs, true);
		self.nodes.push(Some(MFBuilderNode { name, kind, inputs, outputs }));
		id
	}

	/// Adds a node calling `function`. A mutable parameter gets an input and an output socket.
	pub fn add_function(&mut self, function: Arc<dyn MultiFunction>) -> MFNodeId {
		let signature = function.signature();
		let input_param_indices: Vec<_> = signature.input_indices().collect();
		let output_param_indices: Vec<_> = signature.output_indices().collect();
		let socket = |index: &usize| (signature.param_names[*index].clone(), signature.param_types[*index].data_type);
		let inputs: Vec<_> = input_param_indices.iter().map(socket).collect();
		let outputs: Vec<_> = output_param_indices.iter().map(socket).collect();

		let name = function.name().to_string();
		let kind = MFNodeKind::Function {
			function: function.clone(),
			input_param_indices,
			output_param_indices,
		};
		self.add_node(name, kind, &inputs, &outputs)
	}

	pub fn add_dummy(&mut self, name: impl Into<String>, input_types: &[MFDataType], output_types: &[MFDataType], input_names: &[&str], output_names: &[&str]) -> MFNodeId {
		debug_assert_eq!(input_types.len(), input_names.len());
		debug_assert_eq!(output_types.len(), output_names.len());
		let zip = |names: &[&str], types: &[MFDataType]| names.iter().zip(types).map(|(name, ty)| (name.to_string(), *ty)).collect::<Vec<_>>();
		self.add_node(name.into(), MFNodeKind::Dummy, &zip(input_names, input_types), &zip(output_names, output_types))
	}

	/// Adds a network input, returning the output socket that provides its value.
	pub fn add_input_dummy(&mut self, name: &str, data_type: MFDataType) -> MFSocketId {
		self.add_dummy(name, &[], &[data_type], &[], &[name]);
		MFSocketId(self.sockets.len() as u32 - 1)
	}

	/// Adds a network output, returning the input socket that receives its value.
	pub fn add_output_dummy(&mut self, name: &str, data_type: MFDataType) -> MFSocketId {
		self.add_dummy(name, &[data_type], &[], &[name], &[]);
		MFSocketId(self.sockets.len() as u32 - 1)
	}

	pub fn add_link(&mut self, from: MFSocketId, to: MFSocketId) -> Result<(), LinkError> {
		let from_socket = self.socket(from).ok_or(LinkError::SocketNotFound(from))?;
		let to_socket = self.socket(to).ok_or(LinkError::SocketNotFound(to))?;
		if !from_socket.is_output {
			return Err(LinkError::NotAnOutput(from));
		}
		if to_socket.is_output {
			return Err(LinkError::NotAnInput(to));
		}
		if let Some(origin) = to_socket.origin {
			return Err(LinkError::InputAlreadyLinked { input: to, origin });
		}
		if !to_socket.data_type.accepts(&from_socket.data_type) {
			return Err(LinkError::TypeMismatch {
				from,
				to,
				from_type: from_socket.data_type,
				to_type: to_socket.data_type,
			});
		}

		if let Some(socket) = self.socket_mut(from) {
			socket.targets.push(to);
		}
		if let Some(socket) = self.socket_mut(to) {
			socket.origin = Some(from);
		}
		Ok(())
	}

	pub fn remove_link(&mut self, from: MFSocketId, to: MFSocketId) -> Result<(), LinkError> {
		let to_socket = self.socket(to).ok_or(LinkError::SocketNotFound(to))?;
		if to_socket.origin != Some(from) {
			return Err(LinkError::NotLinked { from, to });
		}
		if let Some(socket) = self.socket_mut(to) {
			socket.origin = None;
		}
		if let Some(socket) = self.socket_mut(from) {
			socket.targets.retain(|&target| target != to);
		}
		Ok(())
	}

	/// Removes the node together with all links to and from it.
	pub fn remove_node(&mut self, id: MFNodeId) {
		let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else { return };
		for input in node.inputs {
			if let Some(origin) = self.sockets[input.index()].take().and_then(|socket| socket.origin) {
				if let Some(origin) = self.socket_mut(origin) {
					origin.targets.retain(|&target| target != input);
				}
			}
		}
		for output in node.outputs {
			let targets = self.sockets[output.index()].take().map(|socket| socket.targets).unwrap_or_default();
			for target in targets {
				if let Some(target) = self.socket_mut(target) {
					target.origin = None;
				}
			}
		}
	}

	pub fn remove_nodes(&mut self, ids: impl IntoIterator<Item = MFNodeId>) {
		for id in ids {
			self.remove_node(id);
		}
	}

	/// Moves all targets of `old_output` over to `new_output`.
	pub fn relink_origin(&mut self, old_output: MFSocketId, new_output: MFSocketId) -> Result<(), LinkError> {
		let old = self.socket(old_output).ok_or(LinkError::SocketNotFound(old_output))?;
		if !old.is_output {
			return Err(LinkError::NotAnOutput(old_output));
		}
		for target in old.targets.clone() {
			self.remove_link(old_output, target)?;
			self.add_link(new_output, target)?;
		}
		Ok(())
	}

	/// Links `input` to `new_output`, replacing its current origin.
	pub fn replace_origin(&mut self, input: MFSocketId, new_output: MFSocketId) -> Result<(), LinkError> {
		let socket = self.socket(input).ok_or(LinkError::SocketNotFound(input))?;
		if let Some(origin) = socket.origin {
			self.remove_link(origin, input)?;
		}
		self.add_link(new_output, input)
	}

	pub fn node(&self, id: MFNodeId) -> Option<&MFBuilderNode> {
		self.nodes.get(id.index())?.as_ref()
	}

	pub fn socket(&self, id: MFSocketId) -> Option<&MFBuilderSocket> {
		self.sockets.get(id.index())?.as_ref()
	}

	fn socket_mut(&mut self, id: MFSocketId) -> Option<&mut MFBuilderSocket> {
		self.sockets.get_mut(id.index())?.as_mut()
	}

	/// One past the largest node id ever handed out.
	pub fn node_id_amount(&self) -> usize {
		self.nodes.len()
	}

	pub fn socket_id_amount(&self) -> usize {
		self.sockets.len()
	}

	pub fn nodes(&self) -> impl Iterator<Item = (MFNodeId, &MFBuilderNode)> {
		self.nodes.iter().enumerate().filter_map(|(index, node)| Some((MFNodeId(index as u32), node.as_ref()?)))
	}

	pub fn sockets(&self) -> impl Iterator<Item = (MFSocketId, &MFBuilderSocket)> {
		self.sockets.iter().enumerate().filter_map(|(index, socket)| Some((MFSocketId(index as u32), socket.as_ref()?)))
	}

	pub fn function_nodes(&self) -> impl Iterator<Item = (MFNodeId, &MFBuilderNode)> {
		self.nodes().filter(|(_, node)| node.is_function())
	}

	pub fn dummy_nodes(&self) -> impl Iterator<Item = (MFNodeId, &MFBuilderNode)> {
		self.nodes().filter(|(_, node)| node.is_dummy())
	}

	pub fn node_amount(&self) -> usize {
		self.nodes().count()
	}

	/// All nodes the given sockets depend on, including their own nodes.
	pub fn nodes_upstream_of(&self, sockets: impl IntoIterator<Item = MFSocketId>) -> FxHashSet<MFNodeId> {
		let mut found = FxHashSet::default();
		let mut stack: Vec<MFSocketId> = sockets.into_iter().collect();
		while let Some(id) = stack.pop() {
			let Some(socket) = self.socket(id) else { continue };
			if socket.is_output {
				if found.insert(socket.node) {
					stack.extend(self.node(socket.node).into_iter().flat_map(|node| node.inputs.iter().copied()));
				}
			} else {
				found.insert(socket.node);
				stack.extend(socket.origin);
			}
		}
		found
	}

	/// Nodes that have a path to an input of some dummy node.
	pub fn nodes_reachable_from_outputs(&self) -> FxHashSet<MFNodeId> {
		let dummy_inputs: Vec<_> = self.dummy_nodes().flat_map(|(_, node)| node.inputs.iter().copied()).collect();
		let mut found = self.nodes_upstream_of(dummy_inputs);
		found.extend(self.dummy_nodes().map(|(id, _)| id));
		found
	}

	/// Checks that both directions of every link agree.
	pub fn is_valid(&self) -> bool {
		self.sockets().all(|(id, socket)| {
			let node_matches = self.node(socket.node).is_some_and(|node| {
				let sockets = if socket.is_output { &node.outputs } else { &node.inputs };
				sockets.get(socket.index) == Some(&id)
			});
			let links_match = if socket.is_output {
				socket.targets.iter().all(|&target| self.socket(target).is_some_and(|target| target.origin == Some(id)))
			} else {
				socket.origin.is_none_or(|origin| self.socket(origin).is_some_and(|origin| origin.targets.contains(&id)))
			};
			node_matches && links_match
		})
	}

	pub fn to_dot(&self) -> String {
		let mut dot = String::from("digraph MFNetwork {\n  rankdir=LR;\n  node [shape=record];\n");
		for (id, node) in self.nodes() {
			let ports = |sockets: &[MFSocketId]| {
				sockets
					.iter()
					.filter_map(|&socket| Some(format!("<s{socket}>{}", escape_record(&self.socket(socket)?.name))))
					.collect::<Vec<_>>()
					.join("|")
			};
			let style = if node.is_dummy() { ", style=dashed" } else { "" };
			dot += &format!("  n{id} [label=\"{{{{{}}}|{}|{{{}}}}}\"{style}];\n", ports(&node.inputs), escape_record(&node.name), ports(&node.outputs));
		}
		for (id, socket) in self.sockets().filter(|(_, socket)| socket.is_output) {
			for target in socket.targets.iter().filter_map(|&target| Some((target, self.socket(target)?))) {
				dot += &format!("  n{}:s{id} -> n{}:s{};\n", socket.node, target.1.node, target.0);
			}
		}
		dot.push('}');
		dot
	}
}

pub(crate) fn escape_record(name: &str) -> String {
	let mut escaped = String::with_capacity(name.len());
	for c in name.chars() {
		if matches!(c, '"' | '{' | '}' | '|' | '<' | '>' | '\\') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped
}

#[cfg(test)]
mod test {
	use super::*;
	use math_nodes::{BinaryFn, InPlaceFn, UnaryFn};
	use pretty_assertions::assert_eq;

	fn add_one() -> Arc<dyn MultiFunction> {
		Arc::new(UnaryFn::new("Add One", |value: &f32| value + 1.))
	}

	#[test]
	fn sockets_follow_the_signature() {
		let mut builder = MFNetworkBuilder::new();
		let node = builder.add_function(Arc::new(InPlaceFn::new("Increment", |value: &mut i32| *value += 1)));
		let node = builder.node(node).unwrap();
		assert_eq!(node.inputs.len(), 1);
		assert_eq!(node.outputs.len(), 1);
		let MFNodeKind::Function {
			input_param_indices, output_param_indices, ..
		} = &node.kind
		else {
			panic!("expected a function node");
		};
		assert_eq!(input_param_indices, &vec![0]);
		assert_eq!(output_param_indices, &vec![0]);
		assert_eq!(builder.socket(node.inputs[0]).unwrap().name, "Value");
		assert_eq!(builder.socket(node.outputs[0]).unwrap().name, "Value");

		let node = builder.add_function(Arc::new(BinaryFn::new("Multiply", |a: &f32, b: &f32| a * b)));
		let node = builder.node(node).unwrap();
		let names: Vec<_> = node.inputs.iter().chain(&node.outputs).map(|&socket| builder.socket(socket).unwrap().name.as_str()).collect();
		assert_eq!(names, vec!["A", "B", "Result"]);
	}

	#[test]
	fn inputs_have_a_single_origin() {
		let mut builder = MFNetworkBuilder::new();
		let a = builder.add_input_dummy("A", MFDataType::for_single::<f32>());
		let b = builder.add_input_dummy("B", MFDataType::for_single::<f32>());
		let node = builder.add_function(add_one());
		let input = builder.node(node).unwrap().inputs[0];
		let output = builder.node(node).unwrap().outputs[0];

		builder.add_link(a, input).unwrap();
		assert_eq!(builder.add_link(b, input), Err(LinkError::InputAlreadyLinked { input, origin: a }));
		assert_eq!(builder.add_link(input, a), Err(LinkError::NotAnOutput(input)));
		assert_eq!(builder.add_link(a, b), Err(LinkError::NotAnInput(b)));
		let int_output = builder.add_output_dummy("Int", MFDataType::for_single::<i32>());
		assert!(matches!(builder.add_link(output, int_output), Err(LinkError::TypeMismatch { .. })));

		builder.replace_origin(input, b).unwrap();
		assert_eq!(builder.socket(input).unwrap().origin, Some(b));
		assert!(builder.socket(a).unwrap().targets.is_empty());
		assert!(builder.is_valid());
	}

	#[test]
	fn removing_nodes_keeps_links_consistent() {
		let mut builder = MFNetworkBuilder::new();
		let input = builder.add_input_dummy("In", MFDataType::for_single::<f32>());
		let first = builder.add_function(add_one());
		let second = builder.add_function(add_one());
		let output = builder.add_output_dummy("Out", MFDataType::for_single::<f32>());
		let [first_in, first_out] = [builder.node(first).unwrap().inputs[0], builder.node(first).unwrap().outputs[0]];
		let [second_in, second_out] = [builder.node(second).unwrap().inputs[0], builder.node(second).unwrap().outputs[0]];
		builder.add_link(input, first_in).unwrap();
		builder.add_link(first_out, second_in).unwrap();
		builder.add_link(second_out, output).unwrap();

		builder.relink_origin(second_out, first_out).unwrap();
		assert_eq!(builder.socket(output).unwrap().origin, Some(first_out));
		assert!(!builder.nodes_reachable_from_outputs().contains(&second));

		builder.remove_node(second);
		assert!(builder.node(second).is_none());
		assert!(builder.socket(second_in).is_none());
		assert_eq!(builder.socket(first_out).unwrap().targets, vec![output]);
		assert_eq!(builder.node_amount(), 3);
		assert_eq!(builder.node_id_amount(), 4);
		assert!(builder.is_valid());

		let dot = builder.to_dot();
		assert!(dot.starts_with("digraph MFNetwork {"));
		assert!(dot.contains(&format!("n{first}:s{first_out} -> n3:s{output};")));
	}
}
