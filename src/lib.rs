pub mod config;
pub mod dragdrop;
pub mod editor;
pub mod events;
pub mod registry;
pub mod selection;
pub mod transaction;
pub mod tree;

pub use config::InspectorConfig;
pub use dragdrop::{DropAction, DropVerdict};
pub use editor::{EditorMode, RenameError, RuntimeTreeEditor};
pub use events::{EventBus, InspectorEvent};
pub use registry::{ActorId, ComponentId, Mobility, ObjectRegistry};
pub use selection::{EditorSelectionService, RuntimeDetailsPanel, WorldSelection};
pub use transaction::{ScopedTransaction, TransactionLog};
pub use tree::{FilterFlags, NodeArena, NodeId, NodeKind, TreeBuilder};
