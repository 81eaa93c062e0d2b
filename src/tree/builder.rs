use anyhow::{anyhow, Result};
use std::collections::HashMap;

use crate::registry::{Archetype, ActorId, ComponentId, CreationMethod, ObjectRegistry, ScriptNodeId};
use crate::tree::factory::node_kind_for_component;
use crate::tree::node::{NodeArena, NodeId, NodeKind};

/// What the tree edits: a class through its default objects and construction
/// scripts, or one live actor instance.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EditorMode {
    ClassBlueprint,
    ActorInstance,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BuildOptions {
    /// Leaves construction-script products out of an instance tree.
    pub hide_construction_script_components: bool,
}

pub struct TreeBuilder {
    pub mode: EditorMode,
    pub options: BuildOptions,
}

impl TreeBuilder {
    pub fn new(mode: EditorMode) -> Self {
        Self { mode, options: BuildOptions::default() }
    }

    /// Builds a fresh tree for the actor into an already-cleared arena and
    /// returns the root actor row. Structural inconsistencies in a
    /// construction script abort the build with an error rather than
    /// producing a half-wired tree.
    pub fn build(
        &self,
        arena: &mut NodeArena,
        registry: &mut ObjectRegistry,
        actor: ActorId,
    ) -> Result<NodeId> {
        match self.mode {
            EditorMode::ActorInstance => self.build_instance(arena, registry, actor),
            EditorMode::ClassBlueprint => self.build_blueprint(arena, registry, actor),
        }
    }

    // ---------- Instance mode ----------

    fn build_instance(
        &self,
        arena: &mut NodeArena,
        registry: &mut ObjectRegistry,
        actor: ActorId,
    ) -> Result<NodeId> {
        let root = arena.insert(NodeKind::RootActor {
            actor,
            scene_root: None,
            scene_separator: None,
            non_scene_separator: None,
        });
        let Some(actor_data) = registry.actor(actor) else {
            return Err(anyhow!("cannot build a component tree for a destroyed actor"));
        };
        let components: Vec<ComponentId> = actor_data.components.clone();
        let root_component = actor_data.root_component;
        let mut added: HashMap<ComponentId, NodeId> = HashMap::new();

        // The scene root goes in first, then its attachment subtree in
        // attachment order.
        if let Some(root_component) = root_component {
            if self.includes(registry, root_component) {
                let node = arena.insert(node_kind_for_component(registry, root_component));
                arena.add_child(root, node, registry);
                added.insert(root_component, node);
                self.add_attached_children(arena, registry, actor, root_component, node, &mut added);
            }
        }

        // Whatever is left gets a parent materialized on demand; scene
        // components first so their parents exist before non-scene rows pad
        // the tail of the list.
        let mut remaining: Vec<ComponentId> = components
            .into_iter()
            .filter(|&c| !added.contains_key(&c))
            .filter(|&c| registry.component(c).is_some())
            .filter(|&c| self.includes(registry, c))
            .collect();
        remaining.sort_by_key(|&c| {
            registry.component(c).map(|c| !c.is_scene_component()).unwrap_or(true)
        });
        for component in remaining {
            if added.contains_key(&component) {
                continue;
            }
            self.ensure_instance_node(arena, registry, actor, root, component, &mut added);
        }
        Ok(root)
    }

    fn includes(&self, registry: &ObjectRegistry, component: ComponentId) -> bool {
        if !self.options.hide_construction_script_components {
            return true;
        }
        !matches!(
            registry.component(component).map(|c| c.creation_method),
            Some(CreationMethod::ConstructionScript)
                | Some(CreationMethod::UserConstructionScript)
        )
    }

    fn add_attached_children(
        &self,
        arena: &mut NodeArena,
        registry: &mut ObjectRegistry,
        actor: ActorId,
        parent_component: ComponentId,
        parent_node: NodeId,
        added: &mut HashMap<ComponentId, NodeId>,
    ) {
        for child in registry.attach_children(parent_component) {
            if added.contains_key(&child) || !self.includes(registry, child) {
                continue;
            }
            // Attachments from other actors do not belong in this tree.
            let same_owner = registry
                .component(child)
                .map(|c| c.owner == Some(actor))
                .unwrap_or(false);
            if !same_owner {
                continue;
            }
            let node = arena.insert(node_kind_for_component(registry, child));
            arena.add_child(parent_node, node, registry);
            added.insert(child, node);
            self.add_attached_children(arena, registry, actor, child, node, added);
        }
    }

    /// Returns the row for an instance component, materializing its attach
    /// ancestry first. Non-scene components hang off the actor row; scene
    /// components without a resolvable parent fall back to the scene root.
    fn ensure_instance_node(
        &self,
        arena: &mut NodeArena,
        registry: &mut ObjectRegistry,
        actor: ActorId,
        root: NodeId,
        component: ComponentId,
        added: &mut HashMap<ComponentId, NodeId>,
    ) -> NodeId {
        if let Some(&node) = added.get(&component) {
            return node;
        }
        let node = arena.insert(node_kind_for_component(registry, component));
        added.insert(component, node);
        let is_scene = registry
            .component(component)
            .map(|c| c.is_scene_component())
            .unwrap_or(false);
        let parent_node = if !is_scene {
            root
        } else {
            let attach_parent = registry
                .component(component)
                .and_then(|c| c.scene.as_ref())
                .and_then(|s| s.attach_parent)
                .filter(|&p| registry.component(p).map(|c| c.owner == Some(actor)).unwrap_or(false));
            match attach_parent {
                Some(parent) if self.includes(registry, parent) => {
                    let existing = added
                        .get(&parent)
                        .copied()
                        .or_else(|| node_for_component_or_archetype(arena, registry, root, parent));
                    match existing {
                        Some(n) => n,
                        None => {
                            self.ensure_instance_node(arena, registry, actor, root, parent, added)
                        }
                    }
                }
                _ => arena.scene_root(root).unwrap_or(root),
            }
        };
        arena.add_child(parent_node, node, registry);
        node
    }

    // ---------- Class blueprint mode ----------

    fn build_blueprint(
        &self,
        arena: &mut NodeArena,
        registry: &mut ObjectRegistry,
        actor: ActorId,
    ) -> Result<NodeId> {
        let Some(class) = registry.actor(actor).map(|a| a.class) else {
            return Err(anyhow!("cannot build a component tree for a destroyed actor"));
        };
        let root = arena.insert(NodeKind::RootActor {
            actor,
            scene_root: None,
            scene_separator: None,
            non_scene_separator: None,
        });
        let mut chain = registry.class_chain(class);
        chain.reverse();

        // Native class-default components, outermost ancestor first, root
        // template before the rest so it claims the scene-root slot.
        let mut added: HashMap<ComponentId, NodeId> = HashMap::new();
        let mut natives: Vec<ComponentId> = Vec::new();
        let mut root_template = None;
        for &level in &chain {
            let Some(cdo) = registry.class(level).and_then(|c| c.default_object) else {
                continue;
            };
            if let Some(r) = registry.actor(cdo).and_then(|a| a.root_component) {
                root_template = Some(r);
            }
            natives.extend(registry.actor(cdo).map(|a| a.components.clone()).unwrap_or_default());
        }
        if let Some(template) = root_template {
            let node = arena.insert(node_kind_for_component(registry, template));
            arena.add_child(root, node, registry);
            added.insert(template, node);
        }
        natives.sort_by_key(|&c| {
            registry.component(c).map(|c| !c.is_scene_component()).unwrap_or(true)
        });
        for template in natives {
            if added.contains_key(&template) {
                continue;
            }
            let node = arena.insert(node_kind_for_component(registry, template));
            let attach_parent = registry
                .component(template)
                .and_then(|c| c.scene.as_ref())
                .and_then(|s| s.attach_parent);
            let parent_node = attach_parent
                .and_then(|p| added.get(&p).copied())
                .or_else(|| {
                    if registry.component(template).map(|c| c.is_scene_component()).unwrap_or(false) {
                        arena.scene_root(root)
                    } else {
                        None
                    }
                })
                .unwrap_or(root);
            arena.add_child(parent_node, node, registry);
            added.insert(template, node);
        }

        // Construction-script nodes, ancestors before the edited class.
        let mut script_rows: HashMap<ScriptNodeId, NodeId> = HashMap::new();
        for &level in &chain {
            let roots: Vec<ScriptNodeId> = registry
                .class(level)
                .and_then(|c| c.script.as_ref())
                .map(|s| s.root_nodes.clone())
                .unwrap_or_default();
            for script_root in roots {
                self.add_script_tree_node(
                    arena,
                    registry,
                    root,
                    class,
                    script_root,
                    None,
                    &added,
                    &mut script_rows,
                )?;
            }
        }

        // Components the preview instance gained after construction.
        let preview_components: Vec<ComponentId> = registry
            .actor(actor)
            .filter(|a| !a.is_template)
            .map(|a| a.components.clone())
            .unwrap_or_default();
        let mut added_instances = added;
        for component in preview_components {
            let late = matches!(
                registry.component(component).map(|c| c.creation_method),
                Some(CreationMethod::UserConstructionScript) | Some(CreationMethod::Instance)
            );
            if late && !added_instances.contains_key(&component) {
                self.ensure_instance_node(arena, registry, actor, root, component, &mut added_instances);
            }
        }
        Ok(root)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_script_tree_node(
        &self,
        arena: &mut NodeArena,
        registry: &mut ObjectRegistry,
        root: NodeId,
        edited_class: crate::registry::ClassId,
        script_node: ScriptNodeId,
        parent_row: Option<NodeId>,
        natives: &HashMap<ComponentId, NodeId>,
        script_rows: &mut HashMap<ScriptNodeId, NodeId>,
    ) -> Result<()> {
        let Some(data) = registry.script_node(script_node) else {
            return Err(anyhow!("construction script references a destroyed node"));
        };
        let template = data.template;
        let owning_class = data.owning_class;
        let native_parent_name = data.native_parent_name.clone();
        let children = data.children.clone();
        let variable_name = data.variable_name.clone();

        let node = arena.insert(NodeKind::Component {
            component: template,
            script_node: Some(script_node),
            inherited_scs: owning_class != edited_class,
        });
        script_rows.insert(script_node, node);

        let parent = match parent_row {
            Some(parent) => parent,
            None => match native_parent_name.as_deref() {
                Some(name) => {
                    // A declared native parent that no longer exists means
                    // the script and the class have diverged; stop rather
                    // than guess at a shape.
                    natives
                        .iter()
                        .find(|(&c, _)| {
                            registry.component(c).map(|c| c.name == name).unwrap_or(false)
                        })
                        .map(|(_, &n)| n)
                        .ok_or_else(|| {
                            anyhow!(
                                "construction script node `{variable_name}` declares parent `{name}`, which is not a component of the class"
                            )
                        })?
                }
                None => {
                    let is_scene = registry
                        .component(template)
                        .map(|c| c.is_scene_component())
                        .unwrap_or(false);
                    if is_scene {
                        arena.scene_root(root).unwrap_or(root)
                    } else {
                        root
                    }
                }
            },
        };

        // Editor-only parents may not shelter game components. When the
        // declared shape would do that and the parent is movable, the pair
        // swaps: the game component takes the parent's slot and the
        // editor-only one becomes its child.
        let child_editor_only = registry.component(template).map(|c| c.editor_only).unwrap_or(false);
        let parent_editor_only = arena
            .get(parent)
            .and_then(|n| n.component_id())
            .and_then(|c| registry.component(c))
            .map(|c| c.editor_only)
            .unwrap_or(false);
        if parent_editor_only && !child_editor_only && arena.can_reparent(parent, registry) {
            let grandparent = arena.get(parent).and_then(|n| n.parent());
            if arena.scene_root(root) == Some(parent) {
                arena.set_scene_root(root, node);
            } else if let Some(grandparent) = grandparent {
                arena.add_child(grandparent, node, registry);
            } else {
                arena.add_child(root, node, registry);
            }
            arena.add_child(node, parent, registry);
        } else {
            arena.add_child(parent, node, registry);
        }

        for child in children {
            self.add_script_tree_node(
                arena,
                registry,
                root,
                edited_class,
                child,
                Some(node),
                natives,
                script_rows,
            )?;
        }
        Ok(())
    }
}

/// Finds the row editing a component, falling back to the row of its
/// archetype when the component itself has none (an instance shown through
/// its template, or a stale reference after reinstancing).
pub fn node_for_component_or_archetype(
    arena: &NodeArena,
    registry: &ObjectRegistry,
    root: NodeId,
    component: ComponentId,
) -> Option<NodeId> {
    if let Some((node, _)) = arena.find_child_by_component(root, component, true) {
        return Some(node);
    }
    match registry.component_even_if_pending_kill(component).map(|c| c.archetype) {
        Some(Archetype::ScriptNode(script_node)) => {
            arena.find_child_by_script_node(root, script_node, true).map(|(n, _)| n)
        }
        Some(Archetype::Template(template)) => {
            arena.find_child_by_component(root, template, true).map(|(n, _)| n)
        }
        _ => None,
    }
}
