use anyhow::Result;
use std::collections::HashSet;

use crate::config::InspectorConfig;
use crate::dragdrop::{self, DropAction, DropVerdict};
use crate::events::{EventBus, InspectorEvent};
use crate::registry::{ActorId, ComponentId, NameCollision, ObjectRegistry};
use crate::transaction::{ScopedTransaction, TransactionLog};
use crate::tree::builder::{node_for_component_or_archetype, BuildOptions, TreeBuilder};
use crate::tree::filter::{self, FilterTerms, RefreshScope};
use crate::tree::node::{NodeArena, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenameError {
    #[error("component names cannot be empty")]
    EmptyName,
    #[error(transparent)]
    NameTaken(#[from] NameCollision),
    #[error("this row cannot be renamed")]
    NotRenamable,
    #[error("the component no longer exists")]
    Unresolved,
}

pub use crate::tree::builder::EditorMode;

/// Drives one component tree: builds it from the registry, keeps expansion,
/// selection and filter state across rebuilds, and funnels every edit
/// through an undo transaction.
pub struct RuntimeTreeEditor {
    mode: EditorMode,
    config: InspectorConfig,
    transactions: TransactionLog,
    pub events: EventBus,

    arena: NodeArena,
    root: Option<NodeId>,
    actor: Option<ActorId>,

    filter_text: String,
    filter_terms: FilterTerms,
    collapsed: HashSet<NodeId>,
    selected: Vec<NodeId>,

    /// Structural edits triggered from inside a drop handler must not
    /// trigger a rebuild mid-action.
    allow_tree_updates: bool,

    deferred_rename: Option<NodeId>,
    pending_create_transaction: Option<ScopedTransaction>,
}

impl RuntimeTreeEditor {
    pub fn new(mode: EditorMode, config: InspectorConfig, transactions: TransactionLog) -> Self {
        Self {
            mode,
            config,
            transactions,
            events: EventBus::default(),
            arena: NodeArena::new(),
            root: None,
            actor: None,
            filter_text: String::new(),
            filter_terms: FilterTerms::default(),
            collapsed: HashSet::new(),
            selected: Vec::new(),
            allow_tree_updates: true,
            deferred_rename: None,
            pending_create_transaction: None,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn actor(&self) -> Option<ActorId> {
        self.actor
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn is_expanded(&self, node: NodeId) -> bool {
        !self.collapsed.contains(&node)
    }

    pub fn set_expanded(&mut self, node: NodeId, expanded: bool) {
        if expanded {
            self.collapsed.remove(&node);
        } else {
            self.collapsed.insert(node);
        }
    }

    pub fn set_allow_tree_updates(&mut self, allow: bool) {
        self.allow_tree_updates = allow;
    }

    pub fn set_actor(&mut self, registry: &mut ObjectRegistry, actor: Option<ActorId>) {
        if self.actor == actor {
            return;
        }
        self.actor = actor;
        self.collapsed.clear();
        self.selected.clear();
        self.update_tree(registry, true);
    }

    // ---------- Rebuild ----------

    /// Regenerates the tree from the registry, carrying expansion, selection
    /// and any pending rename across by component identity. With
    /// `regenerate` false only a redraw is requested.
    pub fn update_tree(&mut self, registry: &mut ObjectRegistry, regenerate: bool) {
        if !self.allow_tree_updates {
            return;
        }
        if regenerate {
            let collapsed_components: Vec<ComponentId> = self
                .collapsed
                .iter()
                .filter_map(|&n| self.arena.get(n).and_then(|n| n.component_id()))
                .collect();
            let selected_components: Vec<ComponentId> = self
                .selected
                .iter()
                .filter_map(|&n| self.arena.get(n).and_then(|n| n.component_id()))
                .collect();
            let root_was_selected = self
                .selected
                .iter()
                .any(|&n| self.arena.get(n).map(|n| n.is_root_actor()).unwrap_or(false));
            let rename_component: Option<ComponentId> = self
                .deferred_rename
                .and_then(|n| self.arena.get(n).and_then(|n| n.component_id()));

            self.arena.clear();
            self.root = None;
            self.collapsed.clear();
            self.selected.clear();
            self.deferred_rename = None;

            if let Some(actor) = self.actor {
                let builder = TreeBuilder {
                    mode: self.mode,
                    options: BuildOptions {
                        hide_construction_script_components: self
                            .config
                            .tree
                            .hide_construction_script_components,
                    },
                };
                match builder.build(&mut self.arena, registry, actor) {
                    Ok(root) => self.root = Some(root),
                    Err(err) => {
                        eprintln!("Component tree rebuild failed: {err:?}");
                        self.arena.clear();
                    }
                }
            }

            if let Some(root) = self.root {
                filter::refresh_filtered_state(
                    &mut self.arena,
                    registry,
                    root,
                    &self.filter_terms,
                    RefreshScope::Recursive,
                );
                for component in collapsed_components {
                    if let Some(node) =
                        node_for_component_or_archetype(&self.arena, registry, root, component)
                    {
                        self.collapsed.insert(node);
                    }
                }
                let mut restored: Vec<NodeId> = Vec::new();
                for component in selected_components {
                    if let Some(node) =
                        node_for_component_or_archetype(&self.arena, registry, root, component)
                    {
                        if !restored.contains(&node) {
                            restored.push(node);
                        }
                    }
                }
                if root_was_selected {
                    restored.push(root);
                }
                if restored.is_empty() && self.mode == EditorMode::ActorInstance {
                    restored.push(root);
                }
                self.selected = restored;

                if let Some(component) = rename_component {
                    self.deferred_rename =
                        node_for_component_or_archetype(&self.arena, registry, root, component);
                    if let Some(node) = self.deferred_rename {
                        self.events.push(InspectorEvent::ScrollIntoView { node });
                    }
                }
            } else {
                // The pending transaction has nothing left to hand off to.
                self.pending_create_transaction = None;
            }
            self.events.push(InspectorEvent::TreeRebuilt { actor: self.actor });
        }
        self.events.push(InspectorEvent::TreeRefreshRequested);
    }

    // ---------- Filtering ----------

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Re-evaluates the whole tree against new filter text, expands
    /// ancestors of matches and selects the topmost filtered-in row.
    pub fn on_filter_text_changed(&mut self, registry: &mut ObjectRegistry, text: &str) {
        self.filter_text = text.to_string();
        self.filter_terms = FilterTerms::parse(text, self.config.filter.case_sensitive);
        if let Some(root) = self.root {
            filter::refresh_filtered_state(
                &mut self.arena,
                registry,
                root,
                &self.filter_terms,
                RefreshScope::Recursive,
            );
            if !self.filter_terms.is_empty() {
                if self.config.filter.expand_to_matches {
                    self.expand_to_filtered_matches(root);
                }
                if let Some(first) = self.first_matching(root) {
                    self.set_selection(vec![first]);
                }
            }
        }
        self.update_tree(registry, false);
    }

    fn expand_to_filtered_matches(&mut self, node: NodeId) {
        let Some(data) = self.arena.get(node) else { return };
        let children: Vec<NodeId> = data.children().to_vec();
        let shelters_match = data.filter_flags().contains(crate::tree::node::FilterFlags::CHILD_MATCHES);
        if shelters_match {
            self.collapsed.remove(&node);
        }
        for child in children {
            self.expand_to_filtered_matches(child);
        }
    }

    /// Topmost row whose own text matches the filter, in draw order.
    fn first_matching(&self, node: NodeId) -> Option<NodeId> {
        let data = self.arena.get(node)?;
        if data.filter_flags().contains(crate::tree::node::FilterFlags::MATCHES_FILTER)
            && !data.is_root_actor()
            && !data.is_separator()
        {
            return Some(node);
        }
        for &child in data.children() {
            if let Some(found) = self.first_matching(child) {
                return Some(found);
            }
        }
        None
    }

    // ---------- Selection ----------

    pub fn set_selection(&mut self, nodes: Vec<NodeId>) {
        if self.selected == nodes {
            return;
        }
        self.selected = nodes;
        self.events
            .push(InspectorEvent::SelectionChanged { nodes: self.selected.clone() });
    }

    /// Components the current selection resolves to, for the details view.
    pub fn selected_components(&self, registry: &ObjectRegistry) -> Vec<ComponentId> {
        self.selected
            .iter()
            .filter_map(|&n| self.arena.get(n).and_then(|n| n.component_id()))
            .filter(|&c| registry.component(c).is_some())
            .collect()
    }

    pub fn is_root_selected(&self) -> bool {
        self.selected
            .iter()
            .any(|&n| self.arena.get(n).map(|n| n.is_root_actor()).unwrap_or(false))
    }

    /// Finds the row for a component, trying the component itself, then its
    /// archetype, then (optionally) whatever it is attached to.
    pub fn node_from_component(
        &self,
        registry: &ObjectRegistry,
        component: ComponentId,
        include_attached: bool,
    ) -> Option<NodeId> {
        let root = self.root?;
        if let Some(node) = node_for_component_or_archetype(&self.arena, registry, root, component) {
            return Some(node);
        }
        if include_attached {
            let mut cursor = registry
                .component(component)
                .and_then(|c| c.scene.as_ref())
                .and_then(|s| s.attach_parent);
            while let Some(parent) = cursor {
                if let Some(node) =
                    node_for_component_or_archetype(&self.arena, registry, root, parent)
                {
                    return Some(node);
                }
                cursor = registry
                    .component(parent)
                    .and_then(|c| c.scene.as_ref())
                    .and_then(|s| s.attach_parent);
            }
        }
        None
    }

    // ---------- Reinstancing ----------

    /// Repoints every row at replacement components after a reinstancing
    /// pass. The tree shape is untouched; only the references move.
    pub fn on_objects_replaced(
        &mut self,
        replacements: &std::collections::HashMap<ComponentId, ComponentId>,
    ) {
        let ids: Vec<NodeId> = self.arena.iter_ids().collect();
        for id in ids {
            let Some(node) = self.arena.get_mut(id) else { continue };
            match &mut node.kind {
                NodeKind::Component { component, .. }
                | NodeKind::InstancedInherited { component, .. }
                | NodeKind::InstanceAdded { component } => {
                    if let Some(&new) = replacements.get(component) {
                        *component = new;
                    }
                }
                NodeKind::RootActor { .. } | NodeKind::Separator { .. } => {}
            }
        }
        self.events.push(InspectorEvent::TreeRefreshRequested);
    }

    // ---------- Rename ----------

    /// Queues an inline rename for the single selected row. When the row was
    /// just created, the creation transaction rides along and stays open
    /// until the rename commits.
    pub fn on_rename_component(&mut self, create_transaction: Option<ScopedTransaction>) -> bool {
        let node = match self.selected.as_slice() {
            [node] => *node,
            _ => {
                // Dropping the transaction closes it.
                drop(create_transaction);
                return false;
            }
        };
        self.deferred_rename = Some(node);
        self.pending_create_transaction = create_transaction;
        self.events.push(InspectorEvent::ScrollIntoView { node });
        true
    }

    /// Host request to rename the row editing `component`, e.g. from a
    /// details-panel shortcut. Honored only when that row is the sole
    /// selection and renamable; otherwise nothing happens.
    pub fn on_component_request_rename(
        &mut self,
        registry: &ObjectRegistry,
        component: ComponentId,
    ) -> bool {
        let Some(node) = self.node_from_component(registry, component, false) else {
            return false;
        };
        if self.selected != [node] || !self.arena.can_rename(node, registry) {
            return false;
        }
        self.on_rename_component(None)
    }

    /// Called when the host has scrolled the row into view; hands the
    /// pending transaction to the row and asks for the edit box.
    pub fn on_item_scrolled_into_view(&mut self, node: NodeId) {
        if self.deferred_rename != Some(node) {
            return;
        }
        self.deferred_rename = None;
        if let Some(transaction) = self.pending_create_transaction.take() {
            self.arena.store_create_transaction(node, transaction);
        }
        self.events.push(InspectorEvent::RenameRequested { node });
    }

    /// End-of-frame housekeeping: a rename request that never reached its
    /// row this frame abandons the creation transaction instead of leaking
    /// it. The rename request itself survives until the row scrolls in.
    pub fn post_tick(&mut self) {
        self.pending_create_transaction = None;
    }

    /// Commits an inline rename. Renaming a row to its current name is a
    /// no-op that still closes the creation transaction.
    pub fn complete_rename(
        &mut self,
        registry: &mut ObjectRegistry,
        node: NodeId,
        new_name: &str,
    ) -> Result<(), RenameError> {
        // Any creation transaction ends here, whatever the outcome.
        drop(self.arena.take_create_transaction(node));

        if !self.arena.can_rename(node, registry) {
            return Err(RenameError::NotRenamable);
        }
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(RenameError::EmptyName);
        }
        if self.arena.display_string(node, registry) == new_name {
            return Ok(());
        }
        let component = self
            .arena
            .get(node)
            .and_then(|n| n.component_id())
            .ok_or(RenameError::Unresolved)?;

        let _transaction = self.transactions.begin("Rename Component Variable");
        if let Some(script_node) = self.arena.get(node).and_then(|n| n.script_node_id()) {
            // Variable rename: the script node, its template and every live
            // instance follow together.
            let instances = registry.archetype_instances(
                registry.script_node(script_node).map(|n| n.template).unwrap_or(component),
            );
            if let Some(data) = registry.script_node_mut(script_node) {
                data.variable_name = new_name.to_string();
            }
            let template = registry.script_node(script_node).map(|n| n.template);
            if let Some(template) = template {
                let _ = registry.rename_component(template, new_name);
            }
            for instance in instances {
                let _ = registry.rename_component(instance, new_name);
            }
        } else {
            registry.rename_component(component, new_name)?;
        }
        self.events.push(InspectorEvent::TreeRefreshRequested);
        Ok(())
    }

    // ---------- Drag and drop ----------

    pub fn validate_drop(
        &self,
        registry: &ObjectRegistry,
        dragged: &[NodeId],
        target: NodeId,
    ) -> DropVerdict {
        let Some(root) = self.root else {
            return DropVerdict { action: DropAction::None, message: String::new() };
        };
        dragdrop::validate_drop(&self.arena, registry, root, dragged, target)
    }

    /// Executes a resolved drop and rebuilds. The dropped rows stay selected
    /// afterwards, located again by component identity.
    pub fn perform_drop(
        &mut self,
        registry: &mut ObjectRegistry,
        dragged: &[NodeId],
        target: NodeId,
        action: DropAction,
    ) -> Result<()> {
        let Some(root) = self.root else { return Ok(()) };
        let dropped_components: Vec<ComponentId> = dragged
            .iter()
            .filter_map(|&n| self.arena.get(n).and_then(|n| n.component_id()))
            .collect();
        self.allow_tree_updates = false;
        let result = dragdrop::execute_drop(
            &mut self.arena,
            registry,
            &self.transactions,
            root,
            dragged,
            target,
            action,
        );
        self.allow_tree_updates = true;
        if let Err(err) = result {
            self.events.push(InspectorEvent::DropFeedback { message: err.to_string() });
            return Err(err);
        }
        self.update_tree(registry, true);
        if let Some(root) = self.root {
            let selection: Vec<NodeId> = dropped_components
                .iter()
                .filter_map(|&c| node_for_component_or_archetype(&self.arena, registry, root, c))
                .collect();
            if !selection.is_empty() {
                self.set_selection(selection);
            }
        }
        Ok(())
    }

    // ---------- Structure edits ----------

    /// Deletes every deletable row in the list, re-homing attached children
    /// to the deleted row's parent. The nearest surviving parent ends up
    /// selected.
    pub fn delete_nodes(&mut self, registry: &mut ObjectRegistry, nodes: &[NodeId]) {
        let deletable: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|&n| self.arena.can_delete(n, registry))
            .collect();
        if deletable.is_empty() {
            return;
        }
        let _transaction = self.transactions.begin("Delete Component(s)");
        let mut parent_component = None;
        for node in deletable {
            let parent = self.arena.get(node).and_then(|n| n.parent());
            if let Some(parent) = parent {
                parent_component = self.arena.get(parent).and_then(|n| n.component_id());
                self.arena.remove_child(parent, node, registry);
            }
            if let Some(script_node) = self.arena.get(node).and_then(|n| n.script_node_id()) {
                if let Some(template) = registry.script_node(script_node).map(|n| n.template) {
                    for instance in registry.archetype_instances(template) {
                        registry.destroy_component(instance);
                    }
                }
                registry.remove_script_node_from_script(script_node);
            }
            if let Some(component) = self.arena.get(node).and_then(|n| n.component_id()) {
                if registry.component(component).map(|c| c.owner.is_some()).unwrap_or(false) {
                    registry.destroy_component(component);
                }
            }
        }
        self.update_tree(registry, true);
        if let (Some(root), Some(component)) = (self.root, parent_component) {
            if let Some(node) = node_for_component_or_archetype(&self.arena, registry, root, component)
            {
                self.set_selection(vec![node]);
            }
        }
    }

    /// Clones the component behind a row into the same actor, attaches the
    /// copy next to the original and immediately offers an inline rename.
    /// The creation transaction stays open until that rename resolves.
    pub fn duplicate_node(
        &mut self,
        registry: &mut ObjectRegistry,
        node: NodeId,
    ) -> Option<NodeId> {
        let component = self.arena.get(node).and_then(|n| n.component_id())?;
        let owner = registry.component(component).and_then(|c| c.owner)?;
        let parent = registry
            .component(component)
            .and_then(|c| c.scene.as_ref())
            .and_then(|s| s.attach_parent);
        let transaction = self.transactions.begin("Duplicate Component");
        let snapshot = registry.export_component(component)?;
        let clone = registry.import_component(owner, &snapshot)?;
        if let Some(parent) = parent {
            if registry.attach_component(clone, parent, false).is_err() {
                println!("[inspector] duplicated component could not be attached next to its source");
            }
        }
        self.update_tree(registry, true);
        let root = self.root?;
        let new_node = node_for_component_or_archetype(&self.arena, registry, root, clone)?;
        self.set_selection(vec![new_node]);
        self.on_rename_component(Some(transaction));
        Some(new_node)
    }

    // ---------- Clipboard ----------

    /// Serializes the selected components for the clipboard.
    pub fn copy_selected(&self, registry: &ObjectRegistry) -> Result<String> {
        let snapshots: Vec<_> = self
            .selected_components(registry)
            .into_iter()
            .filter_map(|c| registry.export_component(c))
            .collect();
        Ok(serde_json::to_string_pretty(&snapshots)?)
    }

    /// Materializes clipboard contents as instance components under the
    /// selected scene component, or the scene root when nothing suitable is
    /// selected.
    pub fn paste(&mut self, registry: &mut ObjectRegistry, clipboard: &str) -> Result<()> {
        let snapshots: Vec<crate::registry::ComponentSnapshot> =
            serde_json::from_str(clipboard)?;
        if snapshots.is_empty() {
            return Ok(());
        }
        let actor = match self.actor {
            Some(actor) => actor,
            None => return Ok(()),
        };
        let _transaction = self.transactions.begin("Paste Component(s)");
        let parent = self
            .selected
            .iter()
            .copied()
            .find(|&n| self.arena.is_scene_component(n, registry))
            .and_then(|n| self.arena.get(n).and_then(|n| n.component_id()))
            .or_else(|| {
                self.root
                    .and_then(|r| self.arena.scene_root(r))
                    .and_then(|n| self.arena.get(n).and_then(|n| n.component_id()))
            });
        let mut pasted = Vec::new();
        for snapshot in &snapshots {
            if let Some(clone) = registry.import_component(actor, snapshot) {
                let is_scene =
                    registry.component(clone).map(|c| c.is_scene_component()).unwrap_or(false);
                if let (true, Some(parent)) = (is_scene, parent) {
                    registry.attach_component(clone, parent, false)?;
                }
                pasted.push(clone);
            }
        }
        self.update_tree(registry, true);
        if let Some(root) = self.root {
            let selection: Vec<NodeId> = pasted
                .iter()
                .filter_map(|&c| node_for_component_or_archetype(&self.arena, registry, root, c))
                .collect();
            if !selection.is_empty() {
                self.set_selection(selection);
            }
        }
        Ok(())
    }
}
