pub mod builder;
pub mod factory;
pub mod filter;
pub mod node;

pub use builder::{EditorMode, TreeBuilder};
pub use factory::node_kind_for_component;
pub use filter::{FilterTerms, RefreshScope};
pub use node::{FilterFlags, NodeArena, NodeId, NodeKind, TreeNode};
