//! Node trees as authored by the user, their group-inlined form and the multi-function networks generated from them.

pub mod document;
pub mod inlined_tree;
pub mod network;
pub mod virtual_tree;

pub use document::{DocumentNode, DocumentSocket, NodeLink, NodeTree, NodeTreeLibrary, TaggedValue, TreeId};
pub use inlined_tree::{FlattenError, FlattenSettings, InlinedNodeTree, MissingGroupPolicy, VTreeCache};
pub use network::{MFNetwork, MFNetworkBuilder, MFNodeId, MFSocketId, NetworkError};
pub use virtual_tree::VirtualNodeTree;
