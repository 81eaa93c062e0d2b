use anyhow::{anyhow, Result};

use crate::registry::{ActorId, Archetype, ComponentId, CreationMethod, Mobility, ObjectRegistry};
use crate::transaction::TransactionLog;
use crate::tree::factory::node_kind_for_component;
use crate::tree::node::{NodeArena, NodeId};

/// What a completed drop will do. `AttachToOrMakeNewRoot` is only produced
/// while hovering the scene root with both choices open; the host resolves
/// it from the drop modifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DropAction {
    None,
    AttachTo,
    DetachFrom,
    MakeNewRoot,
    AttachToOrMakeNewRoot,
}

/// Validation result surfaced while hovering: the action a drop would take
/// and the feedback line shown next to the cursor.
#[derive(Clone, Debug)]
pub struct DropVerdict {
    pub action: DropAction,
    pub message: String,
}

impl DropVerdict {
    fn none(message: String) -> Self {
        Self { action: DropAction::None, message }
    }
}

/// Evaluates a hover of `dragged` rows over `target`. Gates run in a fixed
/// order and the first failing gate decides the feedback message.
pub fn validate_drop(
    arena: &NodeArena,
    registry: &ObjectRegistry,
    root: NodeId,
    dragged: &[NodeId],
    target: NodeId,
) -> DropVerdict {
    if dragged.is_empty() {
        return DropVerdict::none(String::new());
    }

    // Gate 1: everything dragged must be movable at all.
    for &d in dragged {
        if !arena.can_reparent(d, registry) {
            let message = if dragged.len() > 1 {
                "One or more of the selected components cannot be attached.".to_string()
            } else if !arena.is_scene_component(d, registry) {
                format!(
                    "{} is not a scene component and cannot be attached to other components.",
                    arena.display_string(d, registry)
                )
            } else if arena.is_inherited(d, registry) {
                format!(
                    "{} is inherited and cannot be moved.",
                    arena.display_string(d, registry)
                )
            } else {
                format!("{} cannot be moved.", arena.display_string(d, registry))
            };
            return DropVerdict::none(message);
        }
    }

    let Some(target_node) = arena.get(target) else {
        return DropVerdict::none(String::new());
    };
    if target_node.is_separator() || target_node.is_root_actor() {
        return DropVerdict::none(
            "Drag the selection onto another component to attach it.".to_string(),
        );
    }

    let scene_root = arena.scene_root(root);
    let mut verdict = DropVerdict::none(String::new());
    for &d in dragged {
        verdict = validate_single(arena, registry, dragged, d, target, scene_root);
        if verdict.action == DropAction::None {
            return verdict;
        }
    }
    verdict
}

fn validate_single(
    arena: &NodeArena,
    registry: &ObjectRegistry,
    dragged: &[NodeId],
    d: NodeId,
    target: NodeId,
    scene_root: Option<NodeId>,
) -> DropVerdict {
    let d_name = arena.display_string(d, registry);
    let t_name = arena.display_string(target, registry);

    if d == target {
        return DropVerdict::none(format!("Cannot attach {d_name} to itself."));
    }
    if arena.is_attached_to(target, d) {
        return DropVerdict::none(format!(
            "Cannot attach {d_name} to {t_name} because {t_name} is already attached to {d_name}."
        ));
    }
    if !arena.is_scene_component(d, registry) || !arena.is_scene_component(target, registry) {
        return DropVerdict::none(format!(
            "Cannot attach {d_name} to {t_name} because they are not both scene components."
        ));
    }

    let cross_actor = is_cross_actor(arena, registry, d, target);
    let d_mobility = mobility_of(arena, registry, d);
    let t_mobility = mobility_of(arena, registry, target);
    let d_editor_only = editor_only_of(arena, registry, d);
    let t_editor_only = editor_only_of(arena, registry, target);
    let directly_attached = arena.get(d).and_then(|n| n.parent()) == Some(target);

    if scene_root == Some(target) {
        return validate_against_root(
            arena, registry, dragged, d, target, cross_actor, directly_attached,
        );
    }
    if directly_attached {
        return DropVerdict {
            action: DropAction::DetachFrom,
            message: format!("Detach {d_name} from {t_name}."),
        };
    }
    if !d_editor_only && t_editor_only {
        return DropVerdict::none(
            "Cannot re-parent game components under editor-only ones.".to_string(),
        );
    }
    if d_mobility == Mobility::Static
        && matches!(t_mobility, Mobility::Movable | Mobility::Stationary)
    {
        return DropVerdict::none("Cannot attach Static components to movable ones.".to_string());
    }
    if d_mobility == Mobility::Stationary && t_mobility == Mobility::Movable {
        return DropVerdict::none(
            "Cannot attach Stationary components to Movable ones.".to_string(),
        );
    }
    let target_instanced = arena.get(target).map(|n| n.is_instanced()).unwrap_or(false);
    if target_instanced {
        let target_component = arena
            .get(target)
            .and_then(|n| n.component_id())
            .and_then(|c| registry.component(c));
        let creation = target_component.map(|c| c.creation_method);
        let default_subobject = target_component
            .map(|c| !matches!(c.archetype, Archetype::None))
            .unwrap_or(false);
        if creation == Some(CreationMethod::Native) && !default_subobject {
            return DropVerdict::none(
                "Cannot attach to native components that were created after construction."
                    .to_string(),
            );
        }
        if creation == Some(CreationMethod::UserConstructionScript) {
            return DropVerdict::none(
                "Cannot attach to components created by a user construction script.".to_string(),
            );
        }
    }
    if arena.can_attach_as_child(target, registry) {
        let message = if cross_actor {
            format!("Attach a copy of {d_name} to {t_name}.")
        } else {
            format!("Attach {d_name} to {t_name}.")
        };
        return DropVerdict { action: DropAction::AttachTo, message };
    }
    DropVerdict::none(format!("Unable to attach {d_name} to {t_name}."))
}

fn validate_against_root(
    arena: &NodeArena,
    registry: &ObjectRegistry,
    dragged: &[NodeId],
    d: NodeId,
    target: NodeId,
    cross_actor: bool,
    directly_attached: bool,
) -> DropVerdict {
    let d_name = arena.display_string(d, registry);
    let t_name = arena.display_string(target, registry);
    let d_mobility = mobility_of(arena, registry, d);
    let t_mobility = mobility_of(arena, registry, target);
    let d_editor_only = editor_only_of(arena, registry, d);
    let t_editor_only = editor_only_of(arena, registry, target);

    let can_attach_to_root = !directly_attached
        && arena.can_attach_as_child(target, registry)
        && d_mobility >= t_mobility
        && (!t_editor_only || d_editor_only);

    let mut root_error = None;
    let mut can_make_new_root = false;
    if !arena.can_reparent(target, registry)
        && (!arena.is_default_scene_root(target, registry) || arena.is_inherited(target, registry))
    {
        root_error = Some(format!(
            "The root component of this actor is inherited and cannot be replaced by {d_name}."
        ));
    } else if d_editor_only && !t_editor_only {
        root_error =
            Some(format!("Cannot make {d_name} the scene root because it is editor-only."));
    } else if d_mobility > t_mobility {
        root_error = Some(
            "Cannot replace a non-movable scene root with a movable component.".to_string(),
        );
    } else if dragged.len() > 1 {
        root_error = Some("Cannot replace the scene root with multiple components.".to_string());
    } else {
        can_make_new_root = true;
    }

    if can_attach_to_root && can_make_new_root {
        let message = if cross_actor {
            format!("Attach a copy of {d_name} to {t_name}, or make it the new scene root.")
        } else {
            format!("Attach {d_name} to {t_name}, or make it the new scene root.")
        };
        return DropVerdict { action: DropAction::AttachToOrMakeNewRoot, message };
    }
    if can_make_new_root {
        let message = if cross_actor {
            format!("Make a copy of {d_name} the new scene root.")
        } else {
            format!("Make {d_name} the new scene root.")
        };
        return DropVerdict { action: DropAction::MakeNewRoot, message };
    }
    if can_attach_to_root {
        let message = if cross_actor {
            format!("Attach a copy of {d_name} to {t_name}.")
        } else {
            format!("Attach {d_name} to {t_name}.")
        };
        return DropVerdict { action: DropAction::AttachTo, message };
    }
    DropVerdict::none(
        root_error.unwrap_or_else(|| format!("Unable to attach {d_name} to {t_name}.")),
    )
}

// ---------- Execution ----------

/// Carries out a validated drop. The caller regenerates the tree afterwards;
/// this only has to leave the backing objects correct.
pub fn execute_drop(
    arena: &mut NodeArena,
    registry: &mut ObjectRegistry,
    transactions: &TransactionLog,
    root: NodeId,
    dragged: &[NodeId],
    target: NodeId,
    action: DropAction,
) -> Result<()> {
    match action {
        DropAction::AttachTo => attach_to(arena, registry, transactions, target, dragged),
        DropAction::DetachFrom => {
            let scene_root = arena
                .scene_root(root)
                .ok_or_else(|| anyhow!("cannot detach: the actor has no scene root"))?;
            attach_to(arena, registry, transactions, scene_root, dragged)
        }
        DropAction::MakeNewRoot => {
            let &dropped = dragged
                .first()
                .ok_or_else(|| anyhow!("cannot make a new scene root from an empty drag"))?;
            make_new_root(arena, registry, transactions, root, dropped)
        }
        DropAction::None | DropAction::AttachToOrMakeNewRoot => {
            Err(anyhow!("drop action was not resolved before execution"))
        }
    }
}

fn attach_to(
    arena: &mut NodeArena,
    registry: &mut ObjectRegistry,
    transactions: &TransactionLog,
    target: NodeId,
    dragged: &[NodeId],
) -> Result<()> {
    let _transaction = transactions.begin("Attach Component(s)");
    let target_component = arena
        .get(target)
        .and_then(|n| n.component_id())
        .ok_or_else(|| anyhow!("attach target is not a component row"))?;
    for &node in dragged {
        let node = resolve_cross_actor(arena, registry, node, target)?;
        let dragged_component = arena
            .get(node)
            .and_then(|n| n.component_id())
            .ok_or_else(|| anyhow!("dragged row is not a component row"))?;
        if let Some(parent) = arena.get(node).and_then(|n| n.parent()) {
            arena.remove_child(parent, node, registry);
        }
        arena.add_child(target, node, registry);
        propagate_template_attachment(registry, dragged_component, target_component);
    }
    Ok(())
}

fn make_new_root(
    arena: &mut NodeArena,
    registry: &mut ObjectRegistry,
    transactions: &TransactionLog,
    root: NodeId,
    dropped: NodeId,
) -> Result<()> {
    let _transaction = transactions.begin("Make New Scene Root");
    let old_root = arena
        .scene_root(root)
        .ok_or_else(|| anyhow!("cannot replace a scene root that does not exist"))?;
    let was_default = arena.is_default_scene_root(old_root, registry);
    let old_root_component = arena.get(old_root).and_then(|n| n.component_id());

    let dropped = resolve_cross_actor(arena, registry, dropped, old_root)?;
    let dropped_component = arena
        .get(dropped)
        .and_then(|n| n.component_id())
        .ok_or_else(|| anyhow!("dropped row is not a component row"))?;

    if let Some(parent) = arena.get(dropped).and_then(|n| n.parent()) {
        arena.remove_child(parent, dropped, registry);
    }

    // The new root loses its offset: location and rotation reset, scale
    // stays whatever it was.
    for instance in live_instances_of(registry, dropped_component) {
        detach_as_root(registry, instance);
        if let Some(owner) = registry.component(instance).and_then(|c| c.owner) {
            if let Some(actor) = registry.actor_mut(owner) {
                actor.root_component = Some(instance);
            }
        }
    }

    arena.set_scene_root(root, dropped);

    if let Some(old_component) = old_root_component {
        if was_default {
            registry.destroy_component(old_component);
        } else {
            arena.add_child(dropped, old_root, registry);
        }
    }
    Ok(())
}

fn detach_as_root(registry: &mut ObjectRegistry, component: ComponentId) {
    let world = registry.world_transform(component);
    let Some(scene) = registry.component_mut(component).and_then(|c| c.scene.as_mut()) else {
        return;
    };
    scene.attach_parent = None;
    if let Some((translation, rotation, _)) = world {
        if !scene.absolute_location {
            scene.translation = translation;
        }
        if !scene.absolute_rotation {
            scene.rotation = rotation;
        }
    }
}

/// A drop that crosses actors attaches a copy, leaving the original where it
/// was. Returns the row to keep working with.
fn resolve_cross_actor(
    arena: &mut NodeArena,
    registry: &mut ObjectRegistry,
    dragged: NodeId,
    target: NodeId,
) -> Result<NodeId> {
    if !is_cross_actor(arena, registry, dragged, target) {
        return Ok(dragged);
    }
    let target_owner = owner_of(arena, registry, target)
        .ok_or_else(|| anyhow!("attach target has no owning actor"))?;
    let source = arena
        .get(dragged)
        .and_then(|n| n.component_id())
        .ok_or_else(|| anyhow!("dragged row is not a component row"))?;
    let snapshot = registry
        .export_component(source)
        .ok_or_else(|| anyhow!("dragged component no longer exists"))?;
    let clone = registry
        .import_component(target_owner, &snapshot)
        .ok_or_else(|| anyhow!("failed to copy the dragged component"))?;
    Ok(arena.insert(node_kind_for_component(registry, clone)))
}

/// When a template was re-parented, its live instances follow: each one
/// re-attaches under the matching instance of the new parent template,
/// keeping its world transform.
fn propagate_template_attachment(
    registry: &mut ObjectRegistry,
    dragged_template: ComponentId,
    parent_template: ComponentId,
) {
    let is_template = registry
        .component(dragged_template)
        .map(|c| {
            c.owner
                .and_then(|a| registry.actor(a))
                .map(|a| a.is_template)
                .unwrap_or(true)
        })
        .unwrap_or(false);
    if !is_template {
        return;
    }
    let parent_instances = registry.archetype_instances(parent_template);
    for instance in registry.archetype_instances(dragged_template) {
        let owner = registry.component(instance).and_then(|c| c.owner);
        let parent = parent_instances
            .iter()
            .copied()
            .find(|&p| registry.component(p).and_then(|c| c.owner) == owner);
        if let Some(parent) = parent {
            if registry.attach_component(instance, parent, true).is_err() {
                println!("[inspector] failed to propagate a template re-parent to an instance");
            }
        }
    }
}

fn live_instances_of(registry: &ObjectRegistry, component: ComponentId) -> Vec<ComponentId> {
    let live = registry
        .component(component)
        .and_then(|c| c.owner)
        .and_then(|a| registry.actor(a))
        .map(|a| !a.is_template)
        .unwrap_or(false);
    if live {
        vec![component]
    } else {
        registry.archetype_instances(component)
    }
}

fn is_cross_actor(
    arena: &NodeArena,
    registry: &ObjectRegistry,
    a: NodeId,
    b: NodeId,
) -> bool {
    match (owner_of(arena, registry, a), owner_of(arena, registry, b)) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

fn owner_of(arena: &NodeArena, registry: &ObjectRegistry, node: NodeId) -> Option<ActorId> {
    arena
        .get(node)
        .and_then(|n| n.component_id())
        .and_then(|c| registry.component(c))
        .and_then(|c| c.owner)
}

fn mobility_of(arena: &NodeArena, registry: &ObjectRegistry, node: NodeId) -> Mobility {
    arena
        .get(node)
        .and_then(|n| n.component_id())
        .and_then(|c| registry.component(c))
        .and_then(|c| c.mobility())
        .unwrap_or(Mobility::Movable)
}

fn editor_only_of(arena: &NodeArena, registry: &ObjectRegistry, node: NodeId) -> bool {
    arena
        .get(node)
        .and_then(|n| n.component_id())
        .and_then(|c| registry.component(c))
        .map(|c| c.editor_only)
        .unwrap_or(false)
}
