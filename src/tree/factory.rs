use crate::registry::{Archetype, ComponentId, CreationMethod, ObjectRegistry, ScriptNodeId};
use crate::tree::node::NodeKind;

/// Picks the node variant for a component.
///
/// Components owned by a live actor become instanced rows: instance-added
/// ones get their own variant, everything else produced by the class (native
/// declarations and construction scripts) becomes an inherited-instance row.
/// Components without a live owner are templates and are edited directly.
pub fn node_kind_for_component(registry: &ObjectRegistry, component: ComponentId) -> NodeKind {
    let live_instance = registry
        .component(component)
        .and_then(|c| c.owner)
        .and_then(|a| registry.actor(a))
        .map(|a| !a.is_template)
        .unwrap_or(false);
    if live_instance {
        let creation = registry
            .component(component)
            .map(|c| c.creation_method)
            .unwrap_or(CreationMethod::Instance);
        if creation == CreationMethod::Instance {
            NodeKind::InstanceAdded { component }
        } else {
            NodeKind::InstancedInherited {
                component,
                script_node: find_script_node_for_instance(registry, component),
            }
        }
    } else {
        NodeKind::Component {
            component,
            script_node: script_node_for_template(registry, component),
            inherited_scs: false,
        }
    }
}

/// Maps a script-constructed instance back to the script node that produced
/// it. The archetype link is authoritative; when it is missing the owner's
/// class chain is searched for a node matching the instance's name.
pub fn find_script_node_for_instance(
    registry: &ObjectRegistry,
    component: ComponentId,
) -> Option<ScriptNodeId> {
    let c = registry.component(component)?;
    if c.creation_method != CreationMethod::ConstructionScript {
        return None;
    }
    if let Archetype::ScriptNode(node) = c.archetype {
        if registry.script_node(node).is_some() {
            return Some(node);
        }
    }
    let owner_class = c.owner.and_then(|a| registry.actor(a)).map(|a| a.class)?;
    let name = c.name.clone();
    for class in registry.class_chain(owner_class) {
        let Some(script) = registry.class(class).and_then(|c| c.script.as_ref()) else {
            continue;
        };
        for &node in &script.all_nodes {
            if registry.script_node(node).map(|n| n.variable_name == name).unwrap_or(false) {
                return Some(node);
            }
        }
    }
    None
}

fn script_node_for_template(
    registry: &ObjectRegistry,
    component: ComponentId,
) -> Option<ScriptNodeId> {
    let c = registry.component(component)?;
    let class = c.owner.and_then(|a| registry.actor(a)).map(|a| a.class);
    let classes = match class {
        Some(class) => registry.class_chain(class),
        None => registry.all_classes(),
    };
    for class in classes {
        let Some(script) = registry.class(class).and_then(|c| c.script.as_ref()) else {
            continue;
        };
        for &node in &script.all_nodes {
            if registry.script_node(node).map(|n| n.template == component).unwrap_or(false) {
                return Some(node);
            }
        }
    }
    None
}
