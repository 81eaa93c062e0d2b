use crate::editor::RuntimeTreeEditor;
use crate::events::InspectorEvent;
use crate::registry::{ActorId, ComponentId, ObjectRegistry};
use crate::tree::node::NodeId;

/// The editor-wide selection the inspector reconciles against. Injected so
/// the panel never reaches for globals and tests can observe every call.
pub trait EditorSelectionService {
    fn selected_actors(&self) -> Vec<ActorId>;
    fn selected_components(&self) -> Vec<ComponentId>;
    fn is_actor_selected(&self, actor: ActorId) -> bool;
    fn is_component_selected(&self, component: ComponentId) -> bool;
    fn select_none(&mut self);
    fn select_actor(&mut self, actor: ActorId);
    fn set_component_selected(&mut self, component: ComponentId, selected: bool);
}

/// Plain in-memory selection, the default service outside the editor shell.
#[derive(Default)]
pub struct WorldSelection {
    actors: Vec<ActorId>,
    components: Vec<ComponentId>,
}

impl WorldSelection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EditorSelectionService for WorldSelection {
    fn selected_actors(&self) -> Vec<ActorId> {
        self.actors.clone()
    }

    fn selected_components(&self) -> Vec<ComponentId> {
        self.components.clone()
    }

    fn is_actor_selected(&self, actor: ActorId) -> bool {
        self.actors.contains(&actor)
    }

    fn is_component_selected(&self, component: ComponentId) -> bool {
        self.components.contains(&component)
    }

    fn select_none(&mut self) {
        self.actors.clear();
        self.components.clear();
    }

    fn select_actor(&mut self, actor: ActorId) {
        if !self.actors.contains(&actor) {
            self.actors.push(actor);
        }
    }

    fn set_component_selected(&mut self, component: ComponentId, selected: bool) {
        if selected {
            if !self.components.contains(&component) {
                self.components.push(component);
            }
        } else {
            self.components.retain(|&c| c != component);
        }
    }
}

/// Ties one tree editor to the editor-wide selection and a details view.
/// Selection flows both ways; a guard flag breaks the feedback loop so a
/// push in one direction never echoes back as a second push.
pub struct RuntimeDetailsPanel {
    pub editor: RuntimeTreeEditor,
    selection: Box<dyn EditorSelectionService>,
    selection_guard: bool,
    locked: bool,
    locked_actor: Option<ActorId>,
    details_actor: Option<ActorId>,
    details_components: Vec<ComponentId>,
}

impl RuntimeDetailsPanel {
    pub fn new(editor: RuntimeTreeEditor, selection: Box<dyn EditorSelectionService>) -> Self {
        Self {
            editor,
            selection,
            selection_guard: false,
            locked: false,
            locked_actor: None,
            details_actor: None,
            details_components: Vec::new(),
        }
    }

    pub fn selection(&self) -> &dyn EditorSelectionService {
        self.selection.as_ref()
    }

    pub fn selection_mut(&mut self) -> &mut dyn EditorSelectionService {
        self.selection.as_mut()
    }

    pub fn details_actor(&self) -> Option<ActorId> {
        self.details_actor
    }

    pub fn details_components(&self) -> &[ComponentId] {
        &self.details_components
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The actor the panel is inspecting: the pinned one while locked, the
    /// editor selection otherwise.
    pub fn actor_context(&self, registry: &ObjectRegistry) -> Option<ActorId> {
        if self.locked {
            if let Some(actor) = self.locked_actor.filter(|&a| registry.actor(a).is_some()) {
                return Some(actor);
            }
        }
        self.selection
            .selected_actors()
            .into_iter()
            .find(|&a| registry.actor(a).is_some())
    }

    /// Locking pins the current actor; unlocking snaps back to whatever the
    /// editor selection says.
    pub fn set_locked(&mut self, registry: &mut ObjectRegistry, locked: bool) {
        if self.locked == locked {
            return;
        }
        if locked {
            self.locked_actor = self.actor_context(registry);
            self.locked = true;
        } else {
            self.locked = false;
            self.locked_actor = None;
            self.on_editor_selection_changed(registry);
        }
    }

    /// Editor-wide selection moved. Ignored while this panel is the one
    /// moving it; otherwise the tree re-targets and mirrors the component
    /// selection.
    pub fn on_editor_selection_changed(&mut self, registry: &mut ObjectRegistry) {
        if self.selection_guard {
            return;
        }
        let context = self.actor_context(registry);
        self.editor.set_actor(registry, context);

        let mut nodes: Vec<NodeId> = Vec::new();
        for component in self.selection.selected_components() {
            if let Some(node) = self.editor.node_from_component(registry, component, false) {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        if !nodes.is_empty() {
            self.selection_guard = true;
            self.editor.set_selection(nodes);
            self.selection_guard = false;
        }
        self.refresh_details(registry);
    }

    /// Tree rows were clicked. While locked only the details view follows;
    /// unlocked, the editor-wide selection is reconciled to match the rows.
    pub fn on_tree_selection_changed(&mut self, registry: &mut ObjectRegistry) {
        if !self.locked {
            self.selection_guard = true;
            if let Some(actor) = self.editor.actor() {
                if !self.selection.is_actor_selected(actor) {
                    self.selection.select_none();
                    self.selection.select_actor(actor);
                }
            }
            let tree_components = self.editor.selected_components(registry);
            for component in self.selection.selected_components() {
                if !tree_components.contains(&component) {
                    self.selection.set_component_selected(component, false);
                }
            }
            for &component in &tree_components {
                if !self.selection.is_component_selected(component) {
                    self.selection.set_component_selected(component, true);
                }
            }
            self.selection_guard = false;
        }
        self.refresh_details(registry);
    }

    fn refresh_details(&mut self, registry: &ObjectRegistry) {
        if self.editor.is_root_selected() || self.editor.selected().is_empty() {
            self.details_actor = self.editor.actor();
            self.details_components = Vec::new();
        } else {
            self.details_actor = None;
            self.details_components = self.editor.selected_components(registry);
        }
        self.editor.events.push(InspectorEvent::DetailsObjectsChanged {
            actor: self.details_actor,
            components: self.details_components.clone(),
        });
    }
}
