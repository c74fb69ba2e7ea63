pub mod value;

use std::collections::BTreeMap;
pub use value::TaggedValue;

pub type TreeId = u64;

pub const REROUTE_IDNAME: &str = "NodeReroute";
pub const GROUP_IDNAME: &str = "fn_GroupNode";
pub const GROUP_INPUT_IDNAME: &str = "fn_GroupInputNode";
pub const GROUP_OUTPUT_IDNAME: &str = "fn_GroupOutputNode";
/// Integer property ordering the interface nodes of a group.
pub const SORT_INDEX_PROPERTY: &str = "sort_index";

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DocumentError {
	#[error("node {0} does not exist")]
	NodeNotFound(usize),
	#[error("node `{node}` has no {kind} socket {socket}", kind = socket_kind(.is_input))]
	SocketNotFound { node: String, socket: usize, is_input: bool },
	#[cfg(feature = "loading")]
	#[error("failed to read node tree library: {0}")]
	Json(String),
}

fn socket_kind(is_input: &bool) -> &'static str {
	if *is_input { "input" } else { "output" }
}

/// One named socket of a node as authored by the user.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentSocket {
	pub name: String,
	/// Identifies the data type of the socket.
	pub idname: String,
	#[cfg_attr(feature = "serde", serde(default))]
	pub default_value: TaggedValue,
	/// Unavailable sockets are hidden in the editor and never carry links.
	#[cfg_attr(feature = "serde", serde(default = "return_true"))]
	pub is_available: bool,
}

#[cfg(feature = "serde")]
fn return_true() -> bool {
	true
}

impl DocumentSocket {
	pub fn new(name: impl Into<String>, idname: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			idname: idname.into(),
			default_value: TaggedValue::None,
			is_available: true,
		}
	}

	pub fn with_default(mut self, value: impl Into<TaggedValue>) -> Self {
		self.default_value = value.into();
		self
	}

	pub fn unavailable(mut self) -> Self {
		self.is_available = false;
		self
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentNode {
	/// Unique within its tree.
	pub name: String,
	/// Selects the behavior of the node.
	pub idname: String,
	pub inputs: Vec<DocumentSocket>,
	pub outputs: Vec<DocumentSocket>,
	#[cfg_attr(feature = "serde", serde(default))]
	pub properties: BTreeMap<String, TaggedValue>,
	/// The tree instanced by a group node.
	#[cfg_attr(feature = "serde", serde(default))]
	pub group: Option<TreeId>,
}

impl DocumentNode {
	pub fn new(name: impl Into<String>, idname: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			idname: idname.into(),
			..Default::default()
		}
	}

	pub fn reroute(name: impl Into<String>, socket_idname: &str) -> Self {
		Self::new(name, REROUTE_IDNAME).with_input(DocumentSocket::new("Input", socket_idname)).with_output(DocumentSocket::new("Output", socket_idname))
	}

	/// A group node instancing `tree`. Its sockets have to match the interface nodes of the tree.
	pub fn group(name: impl Into<String>, tree: TreeId) -> Self {
		Self {
			group: Some(tree),
			..Self::new(name, GROUP_IDNAME)
		}
	}

	/// One input of the tree's interface, exposed as a single output socket.
	pub fn group_input(name: impl Into<String>, socket_idname: &str, sort_index: i32) -> Self {
		let name = name.into();
		Self::new(name.clone(), GROUP_INPUT_IDNAME)
			.with_output(DocumentSocket::new(name, socket_idname))
			.with_property(SORT_INDEX_PROPERTY, sort_index)
	}

	/// One output of the tree's interface, exposed as a single input socket.
	pub fn group_output(name: impl Into<String>, socket_idname: &str, sort_index: i32) -> Self {
		let name = name.into();
		Self::new(name.clone(), GROUP_OUTPUT_IDNAME)
			.with_input(DocumentSocket::new(name, socket_idname))
			.with_property(SORT_INDEX_PROPERTY, sort_index)
	}

	pub fn with_input(mut self, socket: DocumentSocket) -> Self {
		self.inputs.push(socket);
		self
	}

	pub fn with_output(mut self, socket: DocumentSocket) -> Self {
		self.outputs.push(socket);
		self
	}

	pub fn with_property(mut self, name: impl Into<String>, value: impl Into<TaggedValue>) -> Self {
		self.properties.insert(name.into(), value.into());
		self
	}

	pub fn is_reroute(&self) -> bool {
		self.idname == REROUTE_IDNAME
	}

	pub fn is_group(&self) -> bool {
		self.idname == GROUP_IDNAME
	}
}

/// Connects an output socket to an input socket, both addressed by node and socket position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeLink {
	pub from_node: usize,
	pub from_socket: usize,
	pub to_node: usize,
	pub to_socket: usize,
	#[cfg_attr(feature = "serde", serde(default))]
	pub is_muted: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeTree {
	pub name: String,
	pub nodes: Vec<DocumentNode>,
	pub links: Vec<NodeLink>,
}

impl NodeTree {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), ..Default::default() }
	}

	/// Returns the index of the new node.
	pub fn add_node(&mut self, node: DocumentNode) -> usize {
		self.nodes.push(node);
		self.nodes.len() - 1
	}

	pub fn add_link(&mut self, from_node: usize, from_socket: usize, to_node: usize, to_socket: usize) -> Result<(), DocumentError> {
		self.add_link_with_mute(from_node, from_socket, to_node, to_socket, false)
	}

	pub fn add_link_with_mute(&mut self, from_node: usize, from_socket: usize, to_node: usize, to_socket: usize, is_muted: bool) -> Result<(), DocumentError> {
		let from = self.nodes.get(from_node).ok_or(DocumentError::NodeNotFound(from_node))?;
		if from_socket >= from.outputs.len() {
			return Err(DocumentError::SocketNotFound {
				node: from.name.clone(),
				socket: from_socket,
				is_input: false,
			});
		}
		let to = self.nodes.get(to_node).ok_or(DocumentError::NodeNotFound(to_node))?;
		if to_socket >= to.inputs.len() {
			return Err(DocumentError::SocketNotFound {
				node: to.name.clone(),
				socket: to_socket,
				is_input: true,
			});
		}
		self.links.push(NodeLink {
			from_node,
			from_socket,
			to_node,
			to_socket,
			is_muted,
		});
		Ok(())
	}

	pub fn node_index(&self, name: &str) -> Option<usize> {
		self.nodes.iter().position(|node| node.name == name)
	}
}

/// All node trees of a document. Group nodes refer to other trees of the same library.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeTreeLibrary {
	trees: BTreeMap<TreeId, NodeTree>,
	next_id: TreeId,
}

impl NodeTreeLibrary {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_tree(&mut self, tree: NodeTree) -> TreeId {
		let id = self.next_id;
		self.next_id += 1;
		self.trees.insert(id, tree);
		id
	}

	/// Inserts or replaces the tree stored under `id`.
	pub fn insert_tree(&mut self, id: TreeId, tree: NodeTree) -> Option<NodeTree> {
		self.next_id = self.next_id.max(id + 1);
		self.trees.insert(id, tree)
	}

	pub fn tree(&self, id: TreeId) -> Option<&NodeTree> {
		self.trees.get(&id)
	}

	pub fn tree_mut(&mut self, id: TreeId) -> Option<&mut NodeTree> {
		self.trees.get_mut(&id)
	}

	pub fn remove_tree(&mut self, id: TreeId) -> Option<NodeTree> {
		self.trees.remove(&id)
	}

	pub fn trees(&self) -> impl Iterator<Item = (TreeId, &NodeTree)> {
		self.trees.iter().map(|(&id, tree)| (id, tree))
	}

	pub fn len(&self) -> usize {
		self.trees.len()
	}

	pub fn is_empty(&self) -> bool {
		self.trees.is_empty()
	}

	#[cfg(feature = "loading")]
	pub fn from_json(json: &str) -> Result<Self, DocumentError> {
		serde_json::from_str(json).map_err(|error| DocumentError::Json(error.to_string()))
	}

	#[cfg(feature = "loading")]
	pub fn to_json(&self) -> Result<String, DocumentError> {
		serde_json::to_string_pretty(self).map_err(|error| DocumentError::Json(error.to_string()))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use pretty_assertions::assert_eq;

	fn add_tree() -> NodeTree {
		let mut tree = NodeTree::new("Add");
		let a = tree.add_node(DocumentNode::group_input("A", "fn_FloatSocket", 0));
		let b = tree.add_node(DocumentNode::group_input("B", "fn_FloatSocket", 1));
		let add = tree.add_node(
			DocumentNode::new("Math", "fn_FloatMathNode")
				.with_input(DocumentSocket::new("A", "fn_FloatSocket"))
				.with_input(DocumentSocket::new("B", "fn_FloatSocket"))
				.with_output(DocumentSocket::new("Result", "fn_FloatSocket"))
				.with_property("operation", "add"),
		);
		let result = tree.add_node(DocumentNode::group_output("Result", "fn_FloatSocket", 0));
		tree.add_link(a, 0, add, 0).unwrap();
		tree.add_link(b, 0, add, 1).unwrap();
		tree.add_link(add, 0, result, 0).unwrap();
		tree
	}

	#[test]
	fn links_are_validated() {
		let mut tree = add_tree();
		assert_eq!(tree.add_link(9, 0, 0, 0), Err(DocumentError::NodeNotFound(9)));
		assert_eq!(
			tree.add_link(0, 1, 2, 0),
			Err(DocumentError::SocketNotFound {
				node: "A".into(),
				socket: 1,
				is_input: false
			})
		);
		assert_eq!(tree.links.len(), 3);
		assert_eq!(tree.node_index("Math"), Some(2));
	}

	#[test]
	fn library_ids_are_unique() {
		let mut library = NodeTreeLibrary::new();
		library.insert_tree(4, add_tree());
		let id = library.add_tree(NodeTree::new("Empty"));
		assert_eq!(id, 5);
		assert_eq!(library.len(), 2);
		assert_eq!(library.tree(4).map(|tree| tree.name.as_str()), Some("Add"));
	}

	#[cfg(feature = "loading")]
	#[test]
	fn json_round_trip() {
		let mut library = NodeTreeLibrary::new();
		let inner = library.add_tree(add_tree());
		let mut root = NodeTree::new("Root");
		root.add_node(DocumentNode::group("Group", inner));
		library.add_tree(root);

		let json = library.to_json().unwrap();
		assert_eq!(NodeTreeLibrary::from_json(&json).unwrap(), library);

		let minimal = r#"{"trees":{"0":{"name":"T","nodes":[{"name":"N","idname":"X","inputs":[{"name":"I","idname":"fn_IntegerSocket"}],"outputs":[]}],"links":[]}},"next_id":1}"#;
		let library = NodeTreeLibrary::from_json(minimal).unwrap();
		let socket = &library.tree(0).unwrap().nodes[0].inputs[0];
		assert!(socket.is_available);
		assert_eq!(socket.default_value, TaggedValue::None);
	}
}
