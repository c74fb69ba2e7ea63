use crate::document::{DocumentNode, DocumentSocket, GROUP_IDNAME, NodeTree, REROUTE_IDNAME, TaggedValue, TreeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VNodeId(pub u32);

/// Input and output sockets share one id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VSocketId(pub u32);

impl VNodeId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl VSocketId {
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for VNodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl fmt::Display for VSocketId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VirtualTreeError {
	#[error("link {link} of tree `{tree}` refers to a missing node or socket")]
	InvalidLink { tree: String, link: usize },
}

#[derive(Clone, Debug)]
struct VNode {
	name: String,
	idname: String,
	inputs: Vec<VSocketId>,
	outputs: Vec<VSocketId>,
	properties: BTreeMap<String, TaggedValue>,
	group: Option<TreeId>,
}

#[derive(Clone, Debug)]
struct VSocket {
	node: VNodeId,
	index: usize,
	is_input: bool,
	name: String,
	idname: String,
	default_value: TaggedValue,
	is_available: bool,
	directly_linked: Vec<VSocketId>,
	linked: Vec<VSocketId>,
}

/// An immutable, id-indexed view of one node tree.
///
/// Besides the links as authored, every socket knows its logically linked sockets: the first non-reroute sockets on the
/// other end of a chain of reroute nodes.
#[derive(Clone, Debug)]
pub struct VirtualNodeTree {
	name: String,
	nodes: Vec<VNode>,
	sockets: Vec<VSocket>,
	nodes_by_idname: FxHashMap<String, Vec<VNodeId>>,
}

#[derive(Debug, Default)]
struct RerouteWalk {
	targets: Vec<VSocketId>,
	/// Reroutes that link back into the path leading to them.
	cycles: Vec<VNodeId>,
}

impl VirtualNodeTree {
	pub fn new(tree: &NodeTree) -> Result<Self, VirtualTreeError> {
		let mut virtual_tree = Self {
			name: tree.name.clone(),
			nodes: Vec::with_capacity(tree.nodes.len()),
			sockets: Vec::new(),
			nodes_by_idname: FxHashMap::default(),
		};
		for node in &tree.nodes {
			virtual_tree.add_node(node);
		}

		for (link_index, link) in tree.links.iter().enumerate() {
			let invalid = || VirtualTreeError::InvalidLink {
				tree: tree.name.clone(),
				link: link_index,
			};
			let from = virtual_tree.nodes.get(link.from_node).and_then(|node| node.outputs.get(link.from_socket)).copied().ok_or_else(invalid)?;
			let to = virtual_tree.nodes.get(link.to_node).and_then(|node| node.inputs.get(link.to_socket)).copied().ok_or_else(invalid)?;
			if link.is_muted || !virtual_tree.sockets[from.index()].is_available || !virtual_tree.sockets[to.index()].is_available {
				continue;
			}
			virtual_tree.sockets[from.index()].directly_linked.push(to);
			virtual_tree.sockets[to.index()].directly_linked.push(from);
		}

		virtual_tree.link_skipping_reroutes();
		Ok(virtual_tree)
	}

	fn add_node(&mut self, node: &DocumentNode) {
		let id = VNodeId(self.nodes.len() as u32);
		let mut add_socket = |socket: &DocumentSocket, index: usize, is_input: bool| {
			let socket_id = VSocketId(self.sockets.len() as u32);
			self.sockets.push(VSocket {
				node: id,
				index,
				is_input,
				name: socket.name.clone(),
				idname: socket.idname.clone(),
				default_value: socket.default_value.clone(),
				is_available: socket.is_available,
				directly_linked: Vec::new(),
				linked: Vec::new(),
			});
			socket_id
		};
		let inputs = node.inputs.iter().enumerate().map(|(index, socket)| add_socket(socket, index, true)).collect();
		let outputs = node.outputs.iter().enumerate().map(|(index, socket)| add_socket(socket, index, false)).collect();

		self.nodes_by_idname.entry(node.idname.clone()).or_default().push(id);
		self.nodes.push(VNode {
			name: node.name.clone(),
			idname: node.idname.clone(),
			inputs,
			outputs,
			properties: node.properties.clone(),
			group: node.group,
		});
	}

	fn link_skipping_reroutes(&mut self) {
		for node_index in 0..self.nodes.len() {
			if self.nodes[node_index].idname == REROUTE_IDNAME {
				continue;
			}
			for output in self.nodes[node_index].outputs.clone() {
				let walk = self.find_targets_skipping_reroutes(output);
				for node in walk.cycles {
					log::warn!("Reroute cycle through `{}` in tree `{}`", self.nodes[node.index()].name, self.name);
				}
				for &target in &walk.targets {
					self.sockets[target.index()].linked.push(output);
				}
				self.sockets[output.index()].linked = walk.targets;
			}
		}
	}

	/// Depth first walk through the reroutes behind `output`. A reroute reached again on the current path closes a cycle, one
	/// reached again through another branch was already walked.
	fn find_targets_skipping_reroutes(&self, output: VSocketId) -> RerouteWalk {
		let mut walk = RerouteWalk::default();
		let mut visited_reroutes = FxHashSet::default();
		let mut path: Vec<VNodeId> = Vec::new();
		let mut stack: Vec<(VSocketId, usize)> = self.sockets[output.index()].directly_linked.iter().rev().map(|&socket| (socket, 0)).collect();

		while let Some((socket, depth)) = stack.pop() {
			path.truncate(depth);
			let node = self.sockets[socket.index()].node;
			if !self.node(node).is_reroute() {
				if !walk.targets.contains(&socket) {
					walk.targets.push(socket);
				}
				continue;
			}
			if path.contains(&node) {
				if !walk.cycles.contains(&node) {
					walk.cycles.push(node);
				}
				continue;
			}
			if !visited_reroutes.insert(node) {
				continue;
			}
			path.push(node);
			for &reroute_output in &self.nodes[node.index()].outputs {
				stack.extend(self.sockets[reroute_output.index()].directly_linked.iter().rev().map(|&socket| (socket, depth + 1)));
			}
		}
		walk
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn node_amount(&self) -> usize {
		self.nodes.len()
	}

	pub fn socket_amount(&self) -> usize {
		self.sockets.len()
	}

	pub fn node(&self, id: VNodeId) -> VNodeRef<'_> {
		debug_assert!(id.index() < self.nodes.len());
		VNodeRef { tree: self, id }
	}

	pub fn nodes(&self) -> impl ExactSizeIterator<Item = VNodeRef<'_>> + '_ {
		(0..self.nodes.len() as u32).map(move |id| VNodeRef { tree: self, id: VNodeId(id) })
	}

	pub fn socket(&self, id: VSocketId) -> VSocketRef<'_> {
		debug_assert!(id.index() < self.sockets.len());
		VSocketRef { tree: self, id }
	}

	pub fn input_socket(&self, id: VSocketId) -> VInputSocket<'_> {
		debug_assert!(self.sockets[id.index()].is_input, "socket {id} is an output");
		VInputSocket(self.socket(id))
	}

	pub fn output_socket(&self, id: VSocketId) -> VOutputSocket<'_> {
		debug_assert!(!self.sockets[id.index()].is_input, "socket {id} is an input");
		VOutputSocket(self.socket(id))
	}

	pub fn nodes_with_idname<'a>(&'a self, idname: &str) -> impl Iterator<Item = VNodeRef<'a>> + use<'a> {
		self.nodes_by_idname.get(idname).into_iter().flatten().map(move |&id| self.node(id))
	}

	pub fn node_by_name(&self, name: &str) -> Option<VNodeRef<'_>> {
		self.nodes().find(|node| node.name() == name)
	}
}

#[derive(Clone, Copy)]
pub struct VNodeRef<'a> {
	tree: &'a VirtualNodeTree,
	id: VNodeId,
}

impl<'a> VNodeRef<'a> {
	fn data(&self) -> &'a VNode {
		&self.tree.nodes[self.id.index()]
	}

	pub fn id(&self) -> VNodeId {
		self.id
	}
	pub fn tree(&self) -> &'a VirtualNodeTree {
		self.tree
	}
	pub fn name(&self) -> &'a str {
		&self.data().name
	}
	pub fn idname(&self) -> &'a str {
		&self.data().idname
	}
	pub fn group(&self) -> Option<TreeId> {
		self.data().group
	}
	pub fn properties(&self) -> &'a BTreeMap<String, TaggedValue> {
		&self.data().properties
	}
	pub fn property(&self, name: &str) -> Option<&'a TaggedValue> {
		self.data().properties.get(name)
	}

	pub fn is_reroute(&self) -> bool {
		self.idname() == REROUTE_IDNAME
	}

	pub fn is_group(&self) -> bool {
		self.idname() == GROUP_IDNAME
	}

	pub fn inputs(&self) -> impl ExactSizeIterator<Item = VInputSocket<'a>> + 'a {
		let tree = self.tree;
		self.data().inputs.iter().map(move |&id| tree.input_socket(id))
	}

	pub fn outputs(&self) -> impl ExactSizeIterator<Item = VOutputSocket<'a>> + 'a {
		let tree = self.tree;
		self.data().outputs.iter().map(move |&id| tree.output_socket(id))
	}

	pub fn input(&self, index: usize) -> VInputSocket<'a> {
		self.tree.input_socket(self.data().inputs[index])
	}

	pub fn output(&self, index: usize) -> VOutputSocket<'a> {
		self.tree.output_socket(self.data().outputs[index])
	}
}

impl fmt::Debug for VNodeRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VNode").field("id", &self.id).field("name", &self.name()).field("idname", &self.idname()).finish()
	}
}

impl PartialEq for VNodeRef<'_> {
	fn eq(&self, other: &Self) -> bool {
		std::ptr::eq(self.tree, other.tree) && self.id == other.id
	}
}

/// Either kind of socket. Use [`VSocketRef::as_input`] or [`VSocketRef::as_output`] to reach the linked sockets.
#[derive(Clone, Copy)]
pub struct VSocketRef<'a> {
	tree: &'a VirtualNodeTree,
	id: VSocketId,
}

impl<'a> VSocketRef<'a> {
	fn data(&self) -> &'a VSocket {
		&self.tree.sockets[self.id.index()]
	}

	pub fn id(&self) -> VSocketId {
		self.id
	}
	pub fn is_input(&self) -> bool {
		self.data().is_input
	}
	pub fn is_output(&self) -> bool {
		!self.data().is_input
	}
	pub fn node(&self) -> VNodeRef<'a> {
		self.tree.node(self.data().node)
	}
	/// Position within the inputs or outputs of the node.
	pub fn index(&self) -> usize {
		self.data().index
	}
	pub fn name(&self) -> &'a str {
		&self.data().name
	}
	pub fn idname(&self) -> &'a str {
		&self.data().idname
	}
	pub fn default_value(&self) -> &'a TaggedValue {
		&self.data().default_value
	}
	pub fn is_available(&self) -> bool {
		self.data().is_available
	}

	pub fn as_input(&self) -> Option<VInputSocket<'a>> {
		self.is_input().then_some(VInputSocket(*self))
	}

	pub fn as_output(&self) -> Option<VOutputSocket<'a>> {
		self.is_output().then_some(VOutputSocket(*self))
	}
}

impl fmt::Debug for VSocketRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let direction = if self.is_input() { "in" } else { "out" };
		write!(f, "{}.{}[{direction}]", self.node().name(), self.name())
	}
}

#[derive(Clone, Copy, Debug)]
pub struct VInputSocket<'a>(VSocketRef<'a>);

#[derive(Clone, Copy, Debug)]
pub struct VOutputSocket<'a>(VSocketRef<'a>);

impl<'a> std::ops::Deref for VInputSocket<'a> {
	type Target = VSocketRef<'a>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a> std::ops::Deref for VOutputSocket<'a> {
	type Target = VSocketRef<'a>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a> VInputSocket<'a> {
	pub fn directly_linked_sockets(&self) -> impl ExactSizeIterator<Item = VOutputSocket<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().directly_linked.iter().map(move |&id| tree.output_socket(id))
	}

	/// The origins of this socket with reroute nodes skipped.
	pub fn linked_sockets(&self) -> impl ExactSizeIterator<Item = VOutputSocket<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().linked.iter().map(move |&id| tree.output_socket(id))
	}

	pub fn is_linked(&self) -> bool {
		!self.0.data().linked.is_empty()
	}
}

impl<'a> VOutputSocket<'a> {
	pub fn directly_linked_sockets(&self) -> impl ExactSizeIterator<Item = VInputSocket<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().directly_linked.iter().map(move |&id| tree.input_socket(id))
	}

	/// The targets of this socket with reroute nodes skipped.
	pub fn linked_sockets(&self) -> impl ExactSizeIterator<Item = VInputSocket<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().linked.iter().map(move |&id| tree.input_socket(id))
	}

	pub fn is_linked(&self) -> bool {
		!self.0.data().linked.is_empty()
	}
}
