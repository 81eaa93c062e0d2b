use std::fmt;

use crate::registry::{ActorId, ComponentId};
use crate::tree::node::NodeId;

/// Notifications the inspector emits for the host UI: what to re-draw,
/// what to scroll to, which row wants an inline edit box.
#[derive(Debug, Clone)]
pub enum InspectorEvent {
    TreeRefreshRequested,
    TreeRebuilt { actor: Option<ActorId> },
    ScrollIntoView { node: NodeId },
    RenameRequested { node: NodeId },
    SelectionChanged { nodes: Vec<NodeId> },
    DetailsObjectsChanged { actor: Option<ActorId>, components: Vec<ComponentId> },
    DropFeedback { message: String },
}

impl fmt::Display for InspectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectorEvent::TreeRefreshRequested => write!(f, "TreeRefreshRequested"),
            InspectorEvent::TreeRebuilt { actor } => {
                write!(f, "TreeRebuilt actor={}", actor.map(|_| "set").unwrap_or("none"))
            }
            InspectorEvent::ScrollIntoView { node } => write!(f, "ScrollIntoView node={node:?}"),
            InspectorEvent::RenameRequested { node } => write!(f, "RenameRequested node={node:?}"),
            InspectorEvent::SelectionChanged { nodes } => {
                write!(f, "SelectionChanged count={}", nodes.len())
            }
            InspectorEvent::DetailsObjectsChanged { actor, components } => write!(
                f,
                "DetailsObjectsChanged actor={} components={}",
                actor.map(|_| "set").unwrap_or("none"),
                components.len()
            ),
            InspectorEvent::DropFeedback { message } => write!(f, "DropFeedback {message}"),
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<InspectorEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: InspectorEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<InspectorEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
