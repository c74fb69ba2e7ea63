use crate::document::{GROUP_IDNAME, GROUP_INPUT_IDNAME, GROUP_OUTPUT_IDNAME, NodeTreeLibrary, SORT_INDEX_PROPERTY, TaggedValue, TreeId};
use crate::virtual_tree::{VNodeId, VNodeRef, VSocketId, VSocketRef, VirtualNodeTree, VirtualTreeError};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

macro_rules! id_type {
	($($(#[$attr:meta])* $name:ident),* $(,)?) => {
		$(
			$(#[$attr])*
			#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
			pub struct $name(pub u32);

			impl $name {
				pub fn index(self) -> usize {
					self.0 as usize
				}
			}

			impl fmt::Display for $name {
				fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
					write!(f, "{}", self.0)
				}
			}
		)*
	};
}

id_type! {
	XNodeId,
	/// Input and output sockets share one id space.
	XSocketId,
	XGroupInputId,
	XParentNodeId,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FlattenError {
	#[error("group node `{node}` refers to a node tree that does not exist")]
	DanglingGroupReference { node: String },
	#[error("node tree {0} does not exist")]
	UnknownTree(TreeId),
	#[error("group node `{node}` has {found} {kind} sockets, but its tree `{tree}` declares {expected}")]
	InterfaceMismatch {
		node: String,
		tree: String,
		kind: &'static str,
		expected: usize,
		found: usize,
	},
	#[error("group node `{node}` instances tree `{tree}` inside of itself")]
	RecursiveGroup { node: String, tree: String },
	#[error(transparent)]
	VirtualTree(#[from] VirtualTreeError),
}

/// What to do with a group node whose tree is not part of the library.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MissingGroupPolicy {
	#[default]
	Error,
	/// Keep the group node as an opaque leaf.
	Skip,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlattenSettings {
	pub missing_group: MissingGroupPolicy,
}

/// Virtual trees by the id of the node tree they were built from, shared between flattening passes.
#[derive(Debug, Default)]
pub struct VTreeCache {
	trees: FxHashMap<TreeId, Arc<VirtualNodeTree>>,
}

impl VTreeCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `None` when the library has no tree with the given id.
	pub fn get_or_build(&mut self, library: &NodeTreeLibrary, id: TreeId) -> Result<Option<Arc<VirtualNodeTree>>, VirtualTreeError> {
		if let Some(vtree) = self.trees.get(&id) {
			return Ok(Some(vtree.clone()));
		}
		let Some(tree) = library.tree(id) else { return Ok(None) };
		let vtree = Arc::new(VirtualNodeTree::new(tree)?);
		self.trees.insert(id, vtree.clone());
		Ok(Some(vtree))
	}

	pub fn get(&self, id: TreeId) -> Option<&Arc<VirtualNodeTree>> {
		self.trees.get(&id)
	}

	/// Has to be called whenever the tree changes.
	pub fn invalidate(&mut self, id: TreeId) {
		self.trees.remove(&id);
	}

	pub fn clear(&mut self) {
		self.trees.clear();
	}

	pub fn len(&self) -> usize {
		self.trees.len()
	}

	pub fn is_empty(&self) -> bool {
		self.trees.is_empty()
	}
}

/// Group interface nodes are ordered by their sort index, ties are broken by their name ignoring case.
pub fn interface_sort_key(properties: &BTreeMap<String, TaggedValue>, name: &str) -> (i32, String) {
	let sort_index = properties.get(SORT_INDEX_PROPERTY).and_then(TaggedValue::as_int).unwrap_or_default();
	(sort_index, name.to_lowercase())
}

fn sorted_interface_nodes<'a>(vtree: &'a VirtualNodeTree, idname: &str) -> Vec<VNodeRef<'a>> {
	let mut nodes: Vec<_> = vtree.nodes_with_idname(idname).collect();
	nodes.sort_by_cached_key(|node| interface_sort_key(node.properties(), node.name()));
	nodes
}

#[derive(Clone, Debug)]
struct XNode {
	vtree: Arc<VirtualNodeTree>,
	vnode: VNodeId,
	parent: Option<XParentNodeId>,
	inputs: Vec<XSocketId>,
	outputs: Vec<XSocketId>,
}

#[derive(Clone, Debug)]
struct XSocket {
	node: XNodeId,
	vsocket: VSocketId,
	is_input: bool,
	linked: Vec<XSocketId>,
	/// Only used by input sockets.
	linked_group_inputs: Vec<XGroupInputId>,
}

#[derive(Clone, Debug)]
struct XGroupInput {
	vtree: Arc<VirtualNodeTree>,
	/// The unlinked input socket of the expanded group node.
	vsocket: VSocketId,
	parent: Option<XParentNodeId>,
	linked: Vec<XSocketId>,
}

#[derive(Clone, Debug)]
struct XParentNode {
	vtree: Arc<VirtualNodeTree>,
	/// The expanded group node.
	vnode: VNodeId,
	tree: TreeId,
	parent: Option<XParentNodeId>,
}

/// A node tree with all group nodes recursively replaced by the contents of the trees they instance.
///
/// Every node remembers the chain of group nodes it was inlined from. Inputs of expanded group nodes that were not linked
/// are represented by [`XGroupInputRef`]s, which carry the default value of the group node socket.
#[derive(Clone, Debug)]
pub struct InlinedNodeTree {
	root: TreeId,
	nodes: Vec<XNode>,
	sockets: Vec<XSocket>,
	group_inputs: Vec<XGroupInput>,
	parent_nodes: Vec<XParentNode>,
	nodes_by_idname: FxHashMap<String, Vec<XNodeId>>,
}

impl InlinedNodeTree {
	pub fn new(library: &NodeTreeLibrary, root: TreeId, cache: &mut VTreeCache, settings: &FlattenSettings) -> Result<Self, FlattenError> {
		let root_vtree = cache.get_or_build(library, root)?.ok_or(FlattenError::UnknownTree(root))?;

		let mut tree = Self {
			root,
			nodes: Vec::new(),
			sockets: Vec::new(),
			group_inputs: Vec::new(),
			parent_nodes: Vec::new(),
			nodes_by_idname: FxHashMap::default(),
		};
		let inserted = tree.insert_tree(&root_vtree, None);
		let mut unexpanded: VecDeque<XNodeId> = inserted.into_iter().flatten().filter(|&id| tree.is_group(id)).collect();
		let mut removed = FxHashSet::default();

		while let Some(group) = unexpanded.pop_front() {
			let Some(inserted) = tree.expand_group(group, library, cache, settings, &mut removed)? else { continue };
			unexpanded.extend(inserted.into_iter().flatten().filter(|&id| tree.is_group(id)));
		}

		tree.remove_nodes(&removed);
		log::debug!(
			"Inlined node tree {root} into {} nodes with {} group inputs from {} group instances",
			tree.nodes.len(),
			tree.group_inputs.len(),
			tree.parent_nodes.len()
		);
		Ok(tree)
	}

	fn is_group(&self, id: XNodeId) -> bool {
		let node = &self.nodes[id.index()];
		node.vtree.node(node.vnode).idname() == GROUP_IDNAME
	}

	/// Inserts all nodes of `vtree` except reroutes, together with the links between them.
	fn insert_tree(&mut self, vtree: &Arc<VirtualNodeTree>, parent: Option<XParentNodeId>) -> Vec<Option<XNodeId>> {
		let mut node_map = vec![None; vtree.node_amount()];
		let mut socket_map = vec![None; vtree.socket_amount()];

		for vnode in vtree.nodes().filter(|vnode| !vnode.is_reroute()) {
			let id = XNodeId(self.nodes.len() as u32);
			let mut add_socket = |vsocket: VSocketRef, is_input: bool| {
				let socket_id = XSocketId(self.sockets.len() as u32);
				self.sockets.push(XSocket {
					node: id,
					vsocket: vsocket.id(),
					is_input,
					linked: Vec::new(),
					linked_group_inputs: Vec::new(),
				});
				socket_map[vsocket.id().index()] = Some(socket_id);
				socket_id
			};
			let inputs = vnode.inputs().map(|vsocket| add_socket(*vsocket, true)).collect();
			let outputs = vnode.outputs().map(|vsocket| add_socket(*vsocket, false)).collect();

			self.nodes.push(XNode {
				vtree: vtree.clone(),
				vnode: vnode.id(),
				parent,
				inputs,
				outputs,
			});
			node_map[vnode.id().index()] = Some(id);
		}

		for vnode in vtree.nodes().filter(|vnode| !vnode.is_reroute()) {
			for vinput in vnode.inputs() {
				let Some(to) = socket_map[vinput.id().index()] else { continue };
				for origin in vinput.linked_sockets() {
					if let Some(from) = socket_map[origin.id().index()] {
						self.link(from, to);
					}
				}
			}
		}
		node_map
	}

	fn link(&mut self, from: XSocketId, to: XSocketId) {
		debug_assert!(!self.sockets[from.index()].is_input && self.sockets[to.index()].is_input);
		if !self.sockets[from.index()].linked.contains(&to) {
			self.sockets[from.index()].linked.push(to);
			self.sockets[to.index()].linked.push(from);
		}
	}

	fn link_group_input(&mut self, group_input: XGroupInputId, to: XSocketId) {
		if !self.group_inputs[group_input.index()].linked.contains(&to) {
			self.group_inputs[group_input.index()].linked.push(to);
			self.sockets[to.index()].linked_group_inputs.push(group_input);
		}
	}

	/// Removes all links of the socket, returning the linked sockets and group inputs.
	fn disconnect(&mut self, socket: XSocketId) -> (Vec<XSocketId>, Vec<XGroupInputId>) {
		let linked = std::mem::take(&mut self.sockets[socket.index()].linked);
		for &other in &linked {
			self.sockets[other.index()].linked.retain(|&id| id != socket);
		}
		let group_inputs = std::mem::take(&mut self.sockets[socket.index()].linked_group_inputs);
		for &group_input in &group_inputs {
			self.group_inputs[group_input.index()].linked.retain(|&id| id != socket);
		}
		(linked, group_inputs)
	}

	/// Splices the contents of the tree instanced by `group` into this tree. Returns the newly inserted nodes, or `None` when the
	/// group was skipped.
	fn expand_group(
		&mut self,
		group: XNodeId,
		library: &NodeTreeLibrary,
		cache: &mut VTreeCache,
		settings: &FlattenSettings,
		removed: &mut FxHashSet<XNodeId>,
	) -> Result<Option<Vec<Option<XNodeId>>>, FlattenError> {
		let group_node = self.nodes[group.index()].clone();
		let vnode = group_node.vtree.node(group_node.vnode);

		let subtree = match vnode.group() {
			Some(tree_id) => cache.get_or_build(library, tree_id)?.map(|vtree| (tree_id, vtree)),
			None => None,
		};
		let Some((tree_id, subtree)) = subtree else {
			return match settings.missing_group {
				MissingGroupPolicy::Error => Err(FlattenError::DanglingGroupReference { node: vnode.name().to_string() }),
				MissingGroupPolicy::Skip => {
					log::warn!("Skipping group node `{}` because its node tree does not exist", vnode.name());
					Ok(None)
				}
			};
		};

		let mut ancestor = group_node.parent;
		let mut recursive = tree_id == self.root;
		while let Some(parent) = ancestor {
			recursive |= self.parent_nodes[parent.index()].tree == tree_id;
			ancestor = self.parent_nodes[parent.index()].parent;
		}
		if recursive {
			return Err(FlattenError::RecursiveGroup {
				node: vnode.name().to_string(),
				tree: subtree.name().to_string(),
			});
		}

		let interface_inputs = sorted_interface_nodes(&subtree, GROUP_INPUT_IDNAME);
		let interface_outputs = sorted_interface_nodes(&subtree, GROUP_OUTPUT_IDNAME);
		for (kind, expected, found) in [("input", interface_inputs.len(), group_node.inputs.len()), ("output", interface_outputs.len(), group_node.outputs.len())] {
			if expected != found {
				return Err(FlattenError::InterfaceMismatch {
					node: vnode.name().to_string(),
					tree: subtree.name().to_string(),
					kind,
					expected,
					found,
				});
			}
		}

		let parent = XParentNodeId(self.parent_nodes.len() as u32);
		self.parent_nodes.push(XParentNode {
			vtree: group_node.vtree.clone(),
			vnode: group_node.vnode,
			tree: tree_id,
			parent: group_node.parent,
		});
		let inserted = self.insert_tree(&subtree, Some(parent));
		let interface_node = |vnode: &VNodeRef| inserted[vnode.id().index()];

		for (&outer_input, interface) in group_node.inputs.iter().zip(&interface_inputs) {
			let Some(interface) = interface_node(interface) else { continue };
			removed.insert(interface);
			let mut consumers = Vec::new();
			for output in self.nodes[interface.index()].outputs.clone() {
				consumers.extend(self.disconnect(output).0);
			}
			self.relink_group_input(outer_input, &consumers, group_node.parent);
		}

		for (&outer_output, interface) in group_node.outputs.iter().zip(&interface_outputs) {
			let Some(interface) = interface_node(interface) else { continue };
			removed.insert(interface);
			let (targets, _) = self.disconnect(outer_output);
			let inside_inputs = self.nodes[interface.index()].inputs.clone();
			for inside_input in inside_inputs {
				let (origins, group_inputs) = self.disconnect(inside_input);
				for &target in &targets {
					for &origin in &origins {
						self.link(origin, target);
					}
					for &group_input in &group_inputs {
						self.link_group_input(group_input, target);
					}
				}
			}
		}

		for socket in group_node.inputs.iter().chain(&group_node.outputs) {
			self.disconnect(*socket);
		}
		removed.insert(group);
		Ok(Some(inserted))
	}

	/// Connects whatever feeds `outer_input` to all `consumers`, or a new group input if nothing does.
	fn relink_group_input(&mut self, outer_input: XSocketId, consumers: &[XSocketId], outer_parent: Option<XParentNodeId>) {
		let (origins, group_inputs) = self.disconnect(outer_input);

		if origins.is_empty() && group_inputs.is_empty() {
			let node = &self.nodes[self.sockets[outer_input.index()].node.index()];
			let group_input = XGroupInputId(self.group_inputs.len() as u32);
			self.group_inputs.push(XGroupInput {
				vtree: node.vtree.clone(),
				vsocket: self.sockets[outer_input.index()].vsocket,
				parent: outer_parent,
				linked: Vec::new(),
			});
			for &consumer in consumers {
				self.link_group_input(group_input, consumer);
			}
			return;
		}

		for &consumer in consumers {
			for &origin in &origins {
				self.link(origin, consumer);
			}
			for &group_input in &group_inputs {
				self.link_group_input(group_input, consumer);
			}
		}
	}

	/// Drops the given nodes and assigns sequential ids to everything that remains.
	fn remove_nodes(&mut self, removed: &FxHashSet<XNodeId>) {
		let old_nodes = std::mem::take(&mut self.nodes);
		let old_sockets = std::mem::take(&mut self.sockets);
		let mut socket_map = vec![None; old_sockets.len()];

		for (old_id, mut node) in old_nodes.into_iter().enumerate() {
			if removed.contains(&XNodeId(old_id as u32)) {
				continue;
			}
			let id = XNodeId(self.nodes.len() as u32);
			for socket in node.inputs.iter_mut().chain(node.outputs.iter_mut()) {
				let new_socket = XSocketId(self.sockets.len() as u32);
				self.sockets.push(XSocket { node: id, ..old_sockets[socket.index()].clone() });
				socket_map[socket.index()] = Some(new_socket);
				*socket = new_socket;
			}
			self.nodes.push(node);
		}

		let remap = |sockets: &mut Vec<XSocketId>| *sockets = sockets.iter().filter_map(|socket| socket_map[socket.index()]).collect();
		for socket in &mut self.sockets {
			remap(&mut socket.linked);
		}
		for group_input in &mut self.group_inputs {
			remap(&mut group_input.linked);
		}

		self.nodes_by_idname.clear();
		for (index, node) in self.nodes.iter().enumerate() {
			let idname = node.vtree.node(node.vnode).idname().to_string();
			self.nodes_by_idname.entry(idname).or_default().push(XNodeId(index as u32));
		}
	}

	pub fn root(&self) -> TreeId {
		self.root
	}

	pub fn node_amount(&self) -> usize {
		self.nodes.len()
	}

	pub fn socket_amount(&self) -> usize {
		self.sockets.len()
	}

	pub fn node(&self, id: XNodeId) -> XNodeRef<'_> {
		debug_assert!(id.index() < self.nodes.len());
		XNodeRef { tree: self, id }
	}

	pub fn nodes(&self) -> impl ExactSizeIterator<Item = XNodeRef<'_>> + '_ {
		(0..self.nodes.len() as u32).map(move |id| XNodeRef { tree: self, id: XNodeId(id) })
	}

	pub fn nodes_with_idname<'a>(&'a self, idname: &str) -> impl Iterator<Item = XNodeRef<'a>> + use<'a> {
		self.nodes_by_idname.get(idname).into_iter().flatten().map(move |&id| self.node(id))
	}

	pub fn input_socket(&self, id: XSocketId) -> XInputSocket<'_> {
		debug_assert!(self.sockets[id.index()].is_input, "socket {id} is an output");
		XInputSocket(XSocketRef { tree: self, id })
	}

	pub fn output_socket(&self, id: XSocketId) -> XOutputSocket<'_> {
		debug_assert!(!self.sockets[id.index()].is_input, "socket {id} is an input");
		XOutputSocket(XSocketRef { tree: self, id })
	}

	pub fn group_input(&self, id: XGroupInputId) -> XGroupInputRef<'_> {
		XGroupInputRef { tree: self, id }
	}

	pub fn group_inputs(&self) -> impl ExactSizeIterator<Item = XGroupInputRef<'_>> + '_ {
		(0..self.group_inputs.len() as u32).map(move |id| XGroupInputRef { tree: self, id: XGroupInputId(id) })
	}

	pub fn parent_node(&self, id: XParentNodeId) -> XParentNodeRef<'_> {
		XParentNodeRef { tree: self, id }
	}

	pub fn parent_nodes(&self) -> impl ExactSizeIterator<Item = XParentNodeRef<'_>> + '_ {
		(0..self.parent_nodes.len() as u32).map(move |id| XParentNodeRef { tree: self, id: XParentNodeId(id) })
	}

	/// Renders the tree in the graphviz format with one cluster per expanded group node.
	pub fn to_dot(&self) -> String {
		DotGraph(self).to_string()
	}
}

#[derive(Clone, Copy)]
pub struct XNodeRef<'a> {
	tree: &'a InlinedNodeTree,
	id: XNodeId,
}

impl<'a> XNodeRef<'a> {
	fn data(&self) -> &'a XNode {
		&self.tree.nodes[self.id.index()]
	}

	pub fn id(&self) -> XNodeId {
		self.id
	}

	/// The node as it appears in the tree it was inlined from.
	pub fn vnode(&self) -> VNodeRef<'a> {
		let data = self.data();
		data.vtree.node(data.vnode)
	}

	pub fn name(&self) -> &'a str {
		self.vnode().name()
	}
	pub fn idname(&self) -> &'a str {
		self.vnode().idname()
	}
	pub fn property(&self, name: &str) -> Option<&'a TaggedValue> {
		self.vnode().property(name)
	}

	/// The innermost group node this node was inlined from, `None` for nodes of the root tree.
	pub fn parent(&self) -> Option<XParentNodeRef<'a>> {
		self.data().parent.map(|id| self.tree.parent_node(id))
	}

	/// All group nodes this node was inlined from, innermost first.
	pub fn parent_chain(&self) -> Vec<XParentNodeRef<'a>> {
		std::iter::successors(self.parent(), |parent| parent.parent()).collect()
	}

	pub fn depth(&self) -> usize {
		std::iter::successors(self.parent(), |parent| parent.parent()).count()
	}

	pub fn inputs(&self) -> impl ExactSizeIterator<Item = XInputSocket<'a>> + 'a {
		let tree = self.tree;
		self.data().inputs.iter().map(move |&id| tree.input_socket(id))
	}

	pub fn outputs(&self) -> impl ExactSizeIterator<Item = XOutputSocket<'a>> + 'a {
		let tree = self.tree;
		self.data().outputs.iter().map(move |&id| tree.output_socket(id))
	}

	pub fn input(&self, index: usize) -> XInputSocket<'a> {
		self.tree.input_socket(self.data().inputs[index])
	}

	pub fn output(&self, index: usize) -> XOutputSocket<'a> {
		self.tree.output_socket(self.data().outputs[index])
	}

	pub fn get_input(&self, index: usize) -> Option<XInputSocket<'a>> {
		self.data().inputs.get(index).map(|&id| self.tree.input_socket(id))
	}

	pub fn get_output(&self, index: usize) -> Option<XOutputSocket<'a>> {
		self.data().outputs.get(index).map(|&id| self.tree.output_socket(id))
	}
}

impl fmt::Debug for XNodeRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("XNode").field("id", &self.id).field("name", &self.name()).field("depth", &self.depth()).finish()
	}
}

#[derive(Clone, Copy)]
pub struct XSocketRef<'a> {
	tree: &'a InlinedNodeTree,
	id: XSocketId,
}

impl<'a> XSocketRef<'a> {
	fn data(&self) -> &'a XSocket {
		&self.tree.sockets[self.id.index()]
	}

	pub fn id(&self) -> XSocketId {
		self.id
	}
	pub fn is_input(&self) -> bool {
		self.data().is_input
	}
	pub fn node(&self) -> XNodeRef<'a> {
		self.tree.node(self.data().node)
	}

	pub fn vsocket(&self) -> VSocketRef<'a> {
		let node = &self.tree.nodes[self.data().node.index()];
		node.vtree.socket(self.data().vsocket)
	}

	pub fn index(&self) -> usize {
		self.vsocket().index()
	}
	pub fn name(&self) -> &'a str {
		self.vsocket().name()
	}
	pub fn idname(&self) -> &'a str {
		self.vsocket().idname()
	}
	pub fn default_value(&self) -> &'a TaggedValue {
		self.vsocket().default_value()
	}
}

impl fmt::Debug for XSocketRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.node().name(), self.name())
	}
}

#[derive(Clone, Copy, Debug)]
pub struct XInputSocket<'a>(XSocketRef<'a>);

#[derive(Clone, Copy, Debug)]
pub struct XOutputSocket<'a>(XSocketRef<'a>);

impl<'a> std::ops::Deref for XInputSocket<'a> {
	type Target = XSocketRef<'a>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a> std::ops::Deref for XOutputSocket<'a> {
	type Target = XSocketRef<'a>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a> XInputSocket<'a> {
	pub fn linked_sockets(&self) -> impl ExactSizeIterator<Item = XOutputSocket<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().linked.iter().map(move |&id| tree.output_socket(id))
	}

	pub fn linked_group_inputs(&self) -> impl ExactSizeIterator<Item = XGroupInputRef<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().linked_group_inputs.iter().map(move |&id| tree.group_input(id))
	}

	pub fn is_linked(&self) -> bool {
		let data = self.0.data();
		!data.linked.is_empty() || !data.linked_group_inputs.is_empty()
	}
}

impl<'a> XOutputSocket<'a> {
	pub fn linked_sockets(&self) -> impl ExactSizeIterator<Item = XInputSocket<'a>> + 'a {
		let tree = self.0.tree;
		self.0.data().linked.iter().map(move |&id| tree.input_socket(id))
	}
}

/// Stands in for the value of a group node input that had no link.
#[derive(Clone, Copy)]
pub struct XGroupInputRef<'a> {
	tree: &'a InlinedNodeTree,
	id: XGroupInputId,
}

impl<'a> XGroupInputRef<'a> {
	fn data(&self) -> &'a XGroupInput {
		&self.tree.group_inputs[self.id.index()]
	}

	pub fn id(&self) -> XGroupInputId {
		self.id
	}

	/// The unlinked input socket of the group node.
	pub fn vsocket(&self) -> VSocketRef<'a> {
		let data = self.data();
		data.vtree.socket(data.vsocket)
	}

	pub fn name(&self) -> &'a str {
		self.vsocket().name()
	}
	pub fn idname(&self) -> &'a str {
		self.vsocket().idname()
	}
	pub fn default_value(&self) -> &'a TaggedValue {
		self.vsocket().default_value()
	}

	pub fn parent(&self) -> Option<XParentNodeRef<'a>> {
		self.data().parent.map(|id| self.tree.parent_node(id))
	}

	pub fn linked_sockets(&self) -> impl ExactSizeIterator<Item = XInputSocket<'a>> + 'a {
		let tree = self.tree;
		self.data().linked.iter().map(move |&id| tree.input_socket(id))
	}
}

impl fmt::Debug for XGroupInputRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("XGroupInput").field("id", &self.id).field("name", &self.name()).finish()
	}
}

/// An expanded group node.
#[derive(Clone, Copy)]
pub struct XParentNodeRef<'a> {
	tree: &'a InlinedNodeTree,
	id: XParentNodeId,
}

impl<'a> XParentNodeRef<'a> {
	fn data(&self) -> &'a XParentNode {
		&self.tree.parent_nodes[self.id.index()]
	}

	pub fn id(&self) -> XParentNodeId {
		self.id
	}

	pub fn vnode(&self) -> VNodeRef<'a> {
		let data = self.data();
		data.vtree.node(data.vnode)
	}

	pub fn name(&self) -> &'a str {
		self.vnode().name()
	}

	/// The tree that was instanced by the group node.
	pub fn tree_id(&self) -> TreeId {
		self.data().tree
	}

	pub fn parent(&self) -> Option<XParentNodeRef<'a>> {
		self.data().parent.map(|id| self.tree.parent_node(id))
	}
}

impl fmt::Debug for XParentNodeRef<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("XParentNode").field("id", &self.id).field("name", &self.name()).finish()
	}
}

struct DotGraph<'a>(&'a InlinedNodeTree);

impl DotGraph<'_> {
	fn write_cluster(&self, f: &mut fmt::Formatter<'_>, parent: Option<XParentNodeId>, children: &FxHashMap<Option<XParentNodeId>, Vec<XParentNodeId>>) -> fmt::Result {
		let tree = self.0;
		for node in tree.nodes().filter(|node| node.data().parent == parent) {
			writeln!(f, "  n{} [label=\"{}\"];", node.id(), escape(node.name()))?;
		}
		for group_input in tree.group_inputs().filter(|group_input| group_input.data().parent == parent) {
			writeln!(f, "  g{} [label=\"{}\", shape=ellipse, style=dashed];", group_input.id(), escape(group_input.name()))?;
		}
		for &child in children.get(&parent).into_iter().flatten() {
			writeln!(f, "  subgraph cluster_{child} {{")?;
			writeln!(f, "  label=\"{}\";", escape(tree.parent_node(child).name()))?;
			self.write_cluster(f, Some(child), children)?;
			writeln!(f, "  }}")?;
		}
		Ok(())
	}
}

fn escape(name: &str) -> String {
	name.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for DotGraph<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tree = self.0;
		let mut children: FxHashMap<Option<XParentNodeId>, Vec<XParentNodeId>> = FxHashMap::default();
		for parent in tree.parent_nodes() {
			children.entry(parent.data().parent).or_default().push(parent.id());
		}

		writeln!(f, "digraph InlinedNodeTree {{")?;
		writeln!(f, "  rankdir=LR;")?;
		self.write_cluster(f, None, &children)?;
		for node in tree.nodes() {
			for output in node.outputs() {
				for target in output.linked_sockets() {
					writeln!(f, "  n{} -> n{} [label=\"{} -> {}\"];", node.id(), target.node().id(), escape(output.name()), escape(target.name()))?;
				}
			}
		}
		for group_input in tree.group_inputs() {
			for target in group_input.linked_sockets() {
				writeln!(f, "  g{} -> n{};", group_input.id(), target.node().id())?;
			}
		}
		writeln!(f, "}}")
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::document::{DocumentNode, DocumentSocket, NodeTree};
	use pretty_assertions::assert_eq;

	const FLOAT: &str = "fn_FloatSocket";

	fn math_node(name: &str) -> DocumentNode {
		DocumentNode::new(name, "fn_FloatMathNode")
			.with_input(DocumentSocket::new("A", FLOAT).with_default(1.))
			.with_input(DocumentSocket::new("B", FLOAT).with_default(2.))
			.with_output(DocumentSocket::new("Result", FLOAT))
			.with_property("operation", "add")
	}

	fn value_node(name: &str) -> DocumentNode {
		DocumentNode::new(name, "fn_FloatValueNode").with_output(DocumentSocket::new("Value", FLOAT))
	}

	fn group_node(name: &str, tree: TreeId, inputs: usize, outputs: usize) -> DocumentNode {
		let mut node = DocumentNode::group(name, tree);
		for i in 0..inputs {
			node = node.with_input(DocumentSocket::new(format!("In {i}"), FLOAT).with_default(i as f32 + 10.));
		}
		for i in 0..outputs {
			node = node.with_output(DocumentSocket::new(format!("Out {i}"), FLOAT));
		}
		node
	}

	/// `In -> Math(A, A) -> Out`
	fn doubling_tree(name: &str) -> NodeTree {
		let mut tree = NodeTree::new(name);
		let input = tree.add_node(DocumentNode::group_input("In", FLOAT, 0));
		let math = tree.add_node(math_node("Math"));
		let output = tree.add_node(DocumentNode::group_output("Out", FLOAT, 0));
		tree.add_link(input, 0, math, 0).unwrap();
		tree.add_link(input, 0, math, 1).unwrap();
		tree.add_link(math, 0, output, 0).unwrap();
		tree
	}

	fn flatten(library: &NodeTreeLibrary, root: TreeId) -> Result<InlinedNodeTree, FlattenError> {
		InlinedNodeTree::new(library, root, &mut VTreeCache::new(), &FlattenSettings::default())
	}

	fn link_pairs(tree: &InlinedNodeTree) -> Vec<(String, String)> {
		let mut pairs = Vec::new();
		for node in tree.nodes() {
			for input in node.inputs() {
				for origin in input.linked_sockets() {
					pairs.push((format!("{:?}", *origin), format!("{:?}", *input)));
				}
			}
		}
		pairs.sort();
		pairs
	}

	#[test]
	fn leaf_tree_is_unchanged() {
		let mut tree = NodeTree::new("Leaf");
		let a = tree.add_node(value_node("A"));
		let b = tree.add_node(value_node("B"));
		let math = tree.add_node(math_node("Math"));
		let other = tree.add_node(math_node("Other"));
		tree.add_link(a, 0, math, 0).unwrap();
		tree.add_link(b, 0, math, 1).unwrap();
		tree.add_link(math, 0, other, 0).unwrap();
		let mut library = NodeTreeLibrary::new();
		let root = library.add_tree(tree.clone());

		let inlined = flatten(&library, root).unwrap();
		let names: Vec<_> = inlined.nodes().map(|node| node.name()).collect();
		assert_eq!(names, vec!["A", "B", "Math", "Other"]);
		assert_eq!(inlined.socket_amount(), VirtualNodeTree::new(&tree).unwrap().socket_amount());
		assert_eq!(
			link_pairs(&inlined),
			vec![
				("A.Value".to_string(), "Math.A".to_string()),
				("B.Value".to_string(), "Math.B".to_string()),
				("Math.Result".to_string(), "Other.A".to_string()),
			]
		);
		assert_eq!(inlined.group_inputs().len(), 0);
		assert!(inlined.nodes().all(|node| node.depth() == 0));
	}

	#[test]
	fn linked_group_inputs_connect_to_inside_consumers() {
		let mut library = NodeTreeLibrary::new();
		let inner = library.add_tree(doubling_tree("Double"));
		let mut root = NodeTree::new("Root");
		let value = root.add_node(value_node("Value"));
		let group = root.add_node(group_node("Group", inner, 1, 1));
		let after = root.add_node(math_node("After"));
		root.add_link(value, 0, group, 0).unwrap();
		root.add_link(group, 0, after, 1).unwrap();
		let root = library.add_tree(root);

		let inlined = flatten(&library, root).unwrap();
		let names: Vec<_> = inlined.nodes().map(|node| node.name()).collect();
		assert_eq!(names, vec!["Value", "After", "Math"]);
		assert_eq!(
			link_pairs(&inlined),
			vec![
				("Math.Result".to_string(), "After.B".to_string()),
				("Value.Value".to_string(), "Math.A".to_string()),
				("Value.Value".to_string(), "Math.B".to_string()),
			]
		);
		assert_eq!(inlined.nodes_with_idname(GROUP_IDNAME).count(), 0);
		assert_eq!(inlined.nodes_with_idname(GROUP_INPUT_IDNAME).count(), 0);
		let math = inlined.nodes_with_idname("fn_FloatMathNode").find(|node| node.name() == "Math").unwrap();
		assert_eq!(math.parent().map(|parent| parent.name()), Some("Group"));
	}

	#[test]
	fn unlinked_group_inputs_are_synthesized() {
		let mut library = NodeTreeLibrary::new();
		let inner = library.add_tree(doubling_tree("Double"));
		let mut root = NodeTree::new("Root");
		root.add_node(group_node("Group", inner, 1, 1));
		let root = library.add_tree(root);

		let inlined = flatten(&library, root).unwrap();
		assert_eq!(inlined.group_inputs().len(), 1);
		let group_input = inlined.group_input(XGroupInputId(0));
		assert_eq!(group_input.name(), "In 0");
		assert_eq!(group_input.default_value(), &TaggedValue::Float(10.));
		assert!(group_input.parent().is_none());
		let consumers: Vec<_> = group_input.linked_sockets().map(|socket| format!("{:?}", *socket)).collect();
		assert_eq!(consumers, vec!["Math.A", "Math.B"]);

		let math = inlined.node(XNodeId(0));
		assert_eq!(math.input(0).linked_group_inputs().map(|group_input| group_input.id()).collect::<Vec<_>>(), vec![XGroupInputId(0)]);
		assert!(math.input(0).is_linked());
		assert_eq!(math.input(0).linked_sockets().len(), 0);
	}

	#[test]
	fn nested_groups_record_their_parents() {
		let mut library = NodeTreeLibrary::new();
		let b = library.add_tree(doubling_tree("B"));
		let mut a = NodeTree::new("A");
		let input = a.add_node(DocumentNode::group_input("In", FLOAT, 0));
		let group_b = a.add_node(group_node("Group B", b, 1, 1));
		let output = a.add_node(DocumentNode::group_output("Out", FLOAT, 0));
		a.add_link(input, 0, group_b, 0).unwrap();
		a.add_link(group_b, 0, output, 0).unwrap();
		let a = library.add_tree(a);

		let mut root = NodeTree::new("Root");
		let value = root.add_node(value_node("Value"));
		let group_a = root.add_node(group_node("Group A", a, 1, 1));
		let after = root.add_node(math_node("After"));
		root.add_link(value, 0, group_a, 0).unwrap();
		root.add_link(group_a, 0, after, 0).unwrap();
		let root = library.add_tree(root);

		let mut cache = VTreeCache::new();
		let inlined = InlinedNodeTree::new(&library, root, &mut cache, &FlattenSettings::default()).unwrap();
		assert_eq!(cache.len(), 3);
		assert_eq!(inlined.nodes_with_idname(GROUP_IDNAME).count(), 0);
		assert_eq!(inlined.nodes_with_idname(GROUP_OUTPUT_IDNAME).count(), 0);
		assert_eq!(inlined.parent_nodes().len(), 2);

		let math = inlined.nodes().find(|node| node.name() == "Math").unwrap();
		assert_eq!(math.depth(), 2);
		let chain: Vec<_> = math.parent_chain().iter().map(|parent| parent.name()).collect();
		assert_eq!(chain, vec!["Group B", "Group A"]);
		assert_eq!(
			link_pairs(&inlined),
			vec![
				("Math.Result".to_string(), "After.A".to_string()),
				("Value.Value".to_string(), "Math.A".to_string()),
				("Value.Value".to_string(), "Math.B".to_string()),
			]
		);

		let dot = inlined.to_dot();
		assert!(dot.contains("subgraph cluster_0"));
		assert!(dot.contains("label=\"Group B\""));
	}

	#[test]
	fn pass_through_groups_forward_values() {
		let mut pass = NodeTree::new("Pass");
		let input = pass.add_node(DocumentNode::group_input("In", FLOAT, 0));
		let output = pass.add_node(DocumentNode::group_output("Out", FLOAT, 0));
		pass.add_link(input, 0, output, 0).unwrap();
		let mut library = NodeTreeLibrary::new();
		let pass = library.add_tree(pass);

		let mut root = NodeTree::new("Root");
		let value = root.add_node(value_node("Value"));
		let group = root.add_node(group_node("Group", pass, 1, 1));
		let first = root.add_node(math_node("First"));
		let second = root.add_node(math_node("Second"));
		root.add_link(value, 0, group, 0).unwrap();
		root.add_link(group, 0, first, 0).unwrap();
		root.add_link(group, 0, second, 1).unwrap();
		let root = library.add_tree(root);

		let inlined = flatten(&library, root).unwrap();
		assert_eq!(
			link_pairs(&inlined),
			vec![("Value.Value".to_string(), "First.A".to_string()), ("Value.Value".to_string(), "Second.B".to_string()),]
		);
	}

	#[test]
	fn interface_is_matched_by_sort_index() {
		let mut inner = NodeTree::new("Subtract");
		let second = inner.add_node(DocumentNode::group_input("b", FLOAT, 1));
		let first = inner.add_node(DocumentNode::group_input("Z", FLOAT, 0));
		let tied = inner.add_node(DocumentNode::group_input("a", FLOAT, 1));
		let math = inner.add_node(math_node("Math").with_input(DocumentSocket::new("C", FLOAT)));
		let output = inner.add_node(DocumentNode::group_output("Out", FLOAT, 0));
		inner.add_link(first, 0, math, 0).unwrap();
		inner.add_link(second, 0, math, 1).unwrap();
		inner.add_link(tied, 0, math, 2).unwrap();
		inner.add_link(math, 0, output, 0).unwrap();
		let mut library = NodeTreeLibrary::new();
		let inner = library.add_tree(inner);

		let mut root = NodeTree::new("Root");
		let values: Vec<_> = (0..3).map(|i| root.add_node(value_node(&format!("V{i}")))).collect();
		let group = root.add_node(group_node("Group", inner, 3, 1));
		for (i, value) in values.into_iter().enumerate() {
			root.add_link(value, 0, group, i).unwrap();
		}
		let root = library.add_tree(root);

		let inlined = flatten(&library, root).unwrap();
		// Sorted interface: Z (0), a (1), b (1)
		assert_eq!(
			link_pairs(&inlined),
			vec![
				("V0.Value".to_string(), "Math.A".to_string()),
				("V1.Value".to_string(), "Math.C".to_string()),
				("V2.Value".to_string(), "Math.B".to_string()),
			]
		);
	}

	#[test]
	fn missing_trees() {
		let mut library = NodeTreeLibrary::new();
		let mut root = NodeTree::new("Root");
		root.add_node(group_node("Missing", 42, 0, 0));
		root.add_node(value_node("Value"));
		let root = library.add_tree(root);

		assert_eq!(flatten(&library, root).unwrap_err(), FlattenError::DanglingGroupReference { node: "Missing".into() });
		assert_eq!(flatten(&library, 7).unwrap_err(), FlattenError::UnknownTree(7));

		let settings = FlattenSettings {
			missing_group: MissingGroupPolicy::Skip,
		};
		let inlined = InlinedNodeTree::new(&library, root, &mut VTreeCache::new(), &settings).unwrap();
		assert_eq!(inlined.nodes_with_idname(GROUP_IDNAME).count(), 1);
		assert_eq!(inlined.node_amount(), 2);
	}

	#[test]
	fn interface_mismatch() {
		let mut library = NodeTreeLibrary::new();
		let inner = library.add_tree(doubling_tree("Double"));
		let mut root = NodeTree::new("Root");
		root.add_node(group_node("Group", inner, 2, 1));
		let root = library.add_tree(root);

		assert_eq!(
			flatten(&library, root).unwrap_err(),
			FlattenError::InterfaceMismatch {
				node: "Group".into(),
				tree: "Double".into(),
				kind: "input",
				expected: 1,
				found: 2,
			}
		);
	}

	#[test]
	fn recursive_groups() {
		let mut library = NodeTreeLibrary::new();
		let mut tree = NodeTree::new("Self");
		tree.add_node(group_node("Again", 0, 0, 0));
		library.insert_tree(0, tree);

		assert_eq!(
			flatten(&library, 0).unwrap_err(),
			FlattenError::RecursiveGroup {
				node: "Again".into(),
				tree: "Self".into()
			}
		);
	}
}
