use anyhow::{anyhow, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Name given to the synthetic root component created for actors whose class
/// declares no scene root of its own. Such a root is always replaceable.
pub const DEFAULT_SCENE_ROOT_NAME: &str = "DefaultSceneRoot";

// ---------- Handles ----------

// Engine objects can be destroyed or reinstanced outside the inspector's
// control, so everything refers to them through generational handles and
// resolves on every access. A stale handle resolves to None.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ActorId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComponentId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClassId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScriptNodeId {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self { entries: Vec::new(), free: Vec::new() }
    }
}

impl<T> Slots<T> {
    fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.entries[index as usize];
            slot.value = Some(value);
            (index, slot.generation)
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Slot { generation: 0, value: Some(value) });
            (index, 0)
        }
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.entries.get_mut(index as usize)?;
        if slot.generation != generation || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        slot.value.take()
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        let slot = self.entries.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        let slot = self.entries.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i as u32, slot.generation, v)))
    }
}

// ---------- Component data ----------

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Mobility {
    Static,
    Stationary,
    Movable,
}

impl Default for Mobility {
    fn default() -> Self {
        Mobility::Movable
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CreationMethod {
    /// Declared on the native class and instantiated for every instance.
    Native,
    /// Produced by a class construction script.
    ConstructionScript,
    /// Produced by user construction logic that runs after the scripted set.
    UserConstructionScript,
    /// Added directly to one live actor instance.
    Instance,
}

/// Where an instance component came from. Tree lookups match instances back to
/// their archetype rather than comparing handles directly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Archetype {
    ScriptNode(ScriptNodeId),
    Template(ComponentId),
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneData {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub absolute_location: bool,
    pub absolute_rotation: bool,
    pub absolute_scale: bool,
    pub mobility: Mobility,
    #[serde(skip)]
    pub attach_parent: Option<ComponentId>,
    /// Unregistered components have no presence in the world; transform
    /// preservation is skipped for them.
    #[serde(skip, default = "default_registered")]
    pub registered: bool,
}

fn default_registered() -> bool {
    true
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            absolute_location: false,
            absolute_rotation: false,
            absolute_scale: false,
            mobility: Mobility::Movable,
            attach_parent: None,
            registered: true,
        }
    }
}

/// Editable property bag, serialized wholesale for duplication and clipboard
/// transfer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyBag(pub BTreeMap<String, serde_json::Value>);

pub struct Component {
    pub name: String,
    pub class_name: String,
    pub owner: Option<ActorId>,
    pub creation_method: CreationMethod,
    pub scene: Option<SceneData>,
    pub editor_only: bool,
    pub editable_when_inherited: bool,
    /// Scene components refuse children when this is cleared.
    pub allows_child_attachment: bool,
    pub archetype: Archetype,
    pub pending_kill: bool,
    pub properties: PropertyBag,
}

impl Component {
    pub fn is_scene_component(&self) -> bool {
        self.scene.is_some()
    }

    pub fn mobility(&self) -> Option<Mobility> {
        self.scene.as_ref().map(|s| s.mobility)
    }
}

/// Snapshot used by the serde-based property clone (cross-actor duplication
/// and clipboard paste).
#[derive(Clone, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub name: String,
    pub class_name: String,
    pub scene: Option<SceneData>,
    pub editor_only: bool,
    pub properties: PropertyBag,
}

pub struct Actor {
    pub name: String,
    pub class: ClassId,
    pub components: Vec<ComponentId>,
    pub root_component: Option<ComponentId>,
    /// Class default objects are templates; everything else is a live
    /// instance in the running world.
    pub is_template: bool,
}

// ---------- Classes and construction scripts ----------

pub struct NativeDecl {
    pub name: String,
    pub class_name: String,
    pub scene: Option<SceneData>,
    pub editor_only: bool,
    /// Name of another native declaration this one attaches under, if any.
    pub attach_parent: Option<String>,
    pub is_root: bool,
}

pub struct ScriptNode {
    pub variable_name: String,
    pub component_class: String,
    pub owning_class: ClassId,
    /// Template component carrying the node's default values.
    pub template: ComponentId,
    pub parent: Option<ScriptNodeId>,
    /// Set when the declared parent is a native component, matched by name.
    pub native_parent_name: Option<String>,
    pub children: Vec<ScriptNodeId>,
}

#[derive(Default)]
pub struct ConstructionScript {
    pub root_nodes: Vec<ScriptNodeId>,
    pub all_nodes: Vec<ScriptNodeId>,
    pub default_scene_root: Option<ScriptNodeId>,
    /// Bumped by mark_modified; the host watches it to schedule rebuilds.
    pub revision: u64,
}

pub struct ClassDef {
    pub name: String,
    pub parent: Option<ClassId>,
    pub native_decls: Vec<NativeDecl>,
    pub script: Option<ConstructionScript>,
    pub default_object: Option<ActorId>,
}

// ---------- Registry ----------

#[derive(Default)]
pub struct ObjectRegistry {
    actors: Slots<Actor>,
    components: Slots<Component>,
    classes: Slots<ClassDef>,
    script_nodes: Slots<ScriptNode>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id.index, id.generation)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id.index, id.generation)
    }

    /// Resolves a component, treating pending-kill as unresolved.
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.index, id.generation).filter(|c| !c.pending_kill)
    }

    /// Resolves a component even if it is pending kill; used by the
    /// reinstancing fixup which must match stale references.
    pub fn component_even_if_pending_kill(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.index, id.generation)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(id.index, id.generation).filter(|c| !c.pending_kill)
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.index, id.generation)
    }

    pub fn class_mut(&mut self, id: ClassId) -> Option<&mut ClassDef> {
        self.classes.get_mut(id.index, id.generation)
    }

    pub fn script_node(&self, id: ScriptNodeId) -> Option<&ScriptNode> {
        self.script_nodes.get(id.index, id.generation)
    }

    pub fn script_node_mut(&mut self, id: ScriptNodeId) -> Option<&mut ScriptNode> {
        self.script_nodes.get_mut(id.index, id.generation)
    }

    pub fn all_classes(&self) -> Vec<ClassId> {
        self.classes
            .iter()
            .map(|(index, generation, _)| ClassId { index, generation })
            .collect()
    }

    /// Class inheritance chain, most-derived first.
    pub fn class_chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut cursor = Some(class);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.class(id).and_then(|c| c.parent);
        }
        chain
    }

    pub fn is_ancestor_class(&self, ancestor: ClassId, class: ClassId) -> bool {
        self.class_chain(class).iter().skip(1).any(|&c| c == ancestor)
    }

    // ---------- Class registration ----------

    pub fn register_class(&mut self, name: &str, parent: Option<ClassId>) -> ClassId {
        let (index, generation) = self.classes.insert(ClassDef {
            name: name.to_string(),
            parent,
            native_decls: Vec::new(),
            script: None,
            default_object: None,
        });
        let id = ClassId { index, generation };
        let cdo = self.spawn_actor_internal(id, &format!("Default__{name}"), true);
        if let Some(class) = self.class_mut(id) {
            class.default_object = Some(cdo);
        }
        id
    }

    pub fn add_native_component(&mut self, class: ClassId, decl: NativeDecl) -> Option<ComponentId> {
        let cdo = self.class(class)?.default_object?;
        let mut scene = decl.scene.clone();
        if let (Some(scene), Some(parent_name)) = (scene.as_mut(), decl.attach_parent.as_deref()) {
            scene.attach_parent = self.component_by_name(cdo, parent_name);
        }
        let component = Component {
            name: decl.name.clone(),
            class_name: decl.class_name.clone(),
            owner: Some(cdo),
            creation_method: CreationMethod::Native,
            scene,
            editor_only: decl.editor_only,
            editable_when_inherited: true,
            allows_child_attachment: true,
            archetype: Archetype::None,
            pending_kill: false,
            properties: PropertyBag::default(),
        };
        let id = self.insert_component(component);
        let is_root = decl.is_root;
        if let Some(actor) = self.actor_mut(cdo) {
            actor.components.push(id);
            if is_root {
                actor.root_component = Some(id);
            }
        }
        if let Some(def) = self.class_mut(class) {
            def.native_decls.push(decl);
        }
        Some(id)
    }

    /// Adds a construction-script node to the class. The template component
    /// has no owner; instances spawned from the class clone it.
    pub fn add_script_node(
        &mut self,
        class: ClassId,
        variable_name: &str,
        component_class: &str,
        scene: Option<SceneData>,
        parent: ScriptParent,
    ) -> Option<ScriptNodeId> {
        self.class(class)?;
        let template = self.insert_component(Component {
            name: variable_name.to_string(),
            class_name: component_class.to_string(),
            owner: None,
            creation_method: CreationMethod::ConstructionScript,
            scene,
            editor_only: false,
            editable_when_inherited: true,
            allows_child_attachment: true,
            archetype: Archetype::None,
            pending_kill: false,
            properties: PropertyBag::default(),
        });
        let (parent_node, native_parent_name) = match parent {
            ScriptParent::Root => (None, None),
            ScriptParent::Node(id) => (Some(id), None),
            ScriptParent::NativeComponent(name) => (None, Some(name)),
        };
        let (index, generation) = self.script_nodes.insert(ScriptNode {
            variable_name: variable_name.to_string(),
            component_class: component_class.to_string(),
            owning_class: class,
            template,
            parent: parent_node,
            native_parent_name,
            children: Vec::new(),
        });
        let id = ScriptNodeId { index, generation };
        if let Some(parent_id) = parent_node {
            if let Some(parent) = self.script_node_mut(parent_id) {
                parent.children.push(id);
            }
        }
        let script = self.class_mut(class)?.script.get_or_insert_with(ConstructionScript::default);
        if parent_node.is_none() {
            script.root_nodes.push(id);
        }
        script.all_nodes.push(id);
        Some(id)
    }

    /// Flags the class's construction script as structurally changed. The
    /// host reacts by regenerating affected instances and rebuilding trees.
    pub fn mark_script_modified(&mut self, class: ClassId) {
        if let Some(script) = self.class_mut(class).and_then(|c| c.script.as_mut()) {
            script.revision += 1;
        }
    }

    pub fn script_revision(&self, class: ClassId) -> u64 {
        self.class(class).and_then(|c| c.script.as_ref()).map(|s| s.revision).unwrap_or(0)
    }

    /// Removes a script node from its script, keeping its children parented
    /// where they were (callers re-home them first when needed).
    pub fn remove_script_node_from_script(&mut self, node_id: ScriptNodeId) {
        let Some((owning_class, parent)) = self
            .script_node(node_id)
            .map(|n| (n.owning_class, n.parent))
        else {
            return;
        };
        if let Some(parent_id) = parent {
            if let Some(parent) = self.script_node_mut(parent_id) {
                parent.children.retain(|&c| c != node_id);
            }
        }
        if let Some(node) = self.script_node_mut(node_id) {
            node.parent = None;
            node.native_parent_name = None;
        }
        if let Some(script) = self.class_mut(owning_class).and_then(|c| c.script.as_mut()) {
            script.root_nodes.retain(|&n| n != node_id);
        }
    }

    /// Re-homes a script node under a new parent node, moving it across
    /// scripts when the owning classes differ.
    pub fn reparent_script_node(&mut self, node_id: ScriptNodeId, new_parent: ScriptNodeId) {
        self.remove_script_node_from_script(node_id);
        let Some(parent_class) = self.script_node(new_parent).map(|n| n.owning_class) else {
            return;
        };
        let same_script = self
            .script_node(node_id)
            .map(|n| n.owning_class == parent_class)
            .unwrap_or(false);
        if let Some(parent) = self.script_node_mut(new_parent) {
            parent.children.push(node_id);
        }
        if let Some(node) = self.script_node_mut(node_id) {
            node.parent = Some(new_parent);
        }
        if !same_script {
            // Crossing scripts: the node now rides along with the parent's
            // class, entering through its root set.
            if let Some(node) = self.script_node_mut(node_id) {
                node.owning_class = parent_class;
            }
            if let Some(script) =
                self.class_mut(parent_class).and_then(|c| c.script.as_mut())
            {
                if !script.all_nodes.contains(&node_id) {
                    script.all_nodes.push(node_id);
                }
            }
        }
    }

    /// Re-homes a script node under a native component, matched by name at
    /// construction time.
    pub fn attach_script_node_to_native(&mut self, node_id: ScriptNodeId, native_name: &str) {
        self.remove_script_node_from_script(node_id);
        let Some(owning_class) = self.script_node(node_id).map(|n| n.owning_class) else {
            return;
        };
        if let Some(node) = self.script_node_mut(node_id) {
            node.native_parent_name = Some(native_name.to_string());
        }
        if let Some(script) = self.class_mut(owning_class).and_then(|c| c.script.as_mut()) {
            if !script.root_nodes.contains(&node_id) {
                script.root_nodes.push(node_id);
            }
        }
    }

    // ---------- Spawning ----------

    fn spawn_actor_internal(&mut self, class: ClassId, name: &str, is_template: bool) -> ActorId {
        let (index, generation) = self.actors.insert(Actor {
            name: name.to_string(),
            class,
            components: Vec::new(),
            root_component: None,
            is_template,
        });
        ActorId { index, generation }
    }

    fn insert_component(&mut self, component: Component) -> ComponentId {
        let (index, generation) = self.components.insert(component);
        ComponentId { index, generation }
    }

    /// Spawns a live instance of the class: native components first (cloned
    /// from each class default object in the chain, outermost ancestor
    /// first), then every ancestor construction script, then a synthetic
    /// default root if the class produced no scene root at all.
    pub fn spawn_actor(&mut self, class: ClassId, name: &str) -> Result<ActorId> {
        self.class(class).ok_or_else(|| anyhow!("spawn_actor: unknown class"))?;
        let actor = self.spawn_actor_internal(class, name, false);
        let mut chain = self.class_chain(class);
        chain.reverse();

        // Native components, mirrored from each level's default object.
        for &level in &chain {
            let Some(cdo) = self.class(level).and_then(|c| c.default_object) else {
                continue;
            };
            let cdo_components: Vec<ComponentId> =
                self.actor(cdo).map(|a| a.components.clone()).unwrap_or_default();
            let cdo_root = self.actor(cdo).and_then(|a| a.root_component);
            for template_id in cdo_components {
                let Some(template) = self.component(template_id) else { continue };
                let mut scene = template.scene.clone();
                let parent_name = scene
                    .as_ref()
                    .and_then(|s| s.attach_parent)
                    .and_then(|p| self.component(p))
                    .map(|p| p.name.clone());
                if let Some(scene) = scene.as_mut() {
                    scene.attach_parent = None;
                }
                let instance = Component {
                    name: template.name.clone(),
                    class_name: template.class_name.clone(),
                    owner: Some(actor),
                    creation_method: CreationMethod::Native,
                    scene,
                    editor_only: template.editor_only,
                    editable_when_inherited: template.editable_when_inherited,
                    allows_child_attachment: template.allows_child_attachment,
                    archetype: Archetype::Template(template_id),
                    pending_kill: false,
                    properties: template.properties.clone(),
                };
                let id = self.insert_component(instance);
                if let Some(parent_name) = parent_name {
                    let parent = self.component_by_name(actor, &parent_name);
                    if let Some(scene) = self.component_mut(id).and_then(|c| c.scene.as_mut()) {
                        scene.attach_parent = parent;
                    }
                }
                if let Some(a) = self.actor_mut(actor) {
                    a.components.push(id);
                    if cdo_root == Some(template_id) {
                        a.root_component = Some(id);
                    }
                }
            }
        }

        // Construction scripts, outermost ancestor first so shadowing
        // resolves toward the most-derived class.
        for &level in &chain {
            let roots: Vec<ScriptNodeId> = self
                .class(level)
                .and_then(|c| c.script.as_ref())
                .map(|s| s.root_nodes.clone())
                .unwrap_or_default();
            for root in roots {
                self.run_script_node(actor, root, None)?;
            }
        }

        // An actor whose class produced no root gets a synthetic,
        // always-replaceable default root.
        let needs_default_root =
            self.actor(actor).map(|a| a.root_component.is_none()).unwrap_or(false);
        if needs_default_root {
            // Synthetic, so never inherited and always replaceable.
            let root = self.insert_component(Component {
                name: DEFAULT_SCENE_ROOT_NAME.to_string(),
                class_name: "SceneComponent".to_string(),
                owner: Some(actor),
                creation_method: CreationMethod::Instance,
                scene: Some(SceneData::default()),
                editor_only: false,
                editable_when_inherited: true,
                allows_child_attachment: true,
                archetype: Archetype::None,
                pending_kill: false,
                properties: PropertyBag::default(),
            });
            let orphans: Vec<ComponentId> = self
                .actor(actor)
                .map(|a| a.components.clone())
                .unwrap_or_default()
                .into_iter()
                .filter(|&c| {
                    self.component(c)
                        .and_then(|c| c.scene.as_ref())
                        .map(|s| s.attach_parent.is_none())
                        .unwrap_or(false)
                })
                .collect();
            for orphan in orphans {
                if let Some(scene) = self.component_mut(orphan).and_then(|c| c.scene.as_mut()) {
                    scene.attach_parent = Some(root);
                }
            }
            if let Some(a) = self.actor_mut(actor) {
                a.components.push(root);
                a.root_component = Some(root);
            }
        }
        Ok(actor)
    }

    fn run_script_node(
        &mut self,
        actor: ActorId,
        node_id: ScriptNodeId,
        parent_instance: Option<ComponentId>,
    ) -> Result<()> {
        let node = self
            .script_node(node_id)
            .ok_or_else(|| anyhow!("construction script references a destroyed node"))?;
        let template_id = node.template;
        let native_parent_name = node.native_parent_name.clone();
        let children = node.children.clone();
        let variable_name = node.variable_name.clone();
        let template = self
            .component(template_id)
            .ok_or_else(|| anyhow!("script node {variable_name} lost its template"))?;

        let mut scene = template.scene.clone();
        if let Some(scene) = scene.as_mut() {
            scene.attach_parent = None;
        }
        let instance = Component {
            name: self.unique_component_name(actor, &variable_name),
            class_name: template.class_name.clone(),
            owner: Some(actor),
            creation_method: CreationMethod::ConstructionScript,
            scene,
            editor_only: template.editor_only,
            editable_when_inherited: template.editable_when_inherited,
            allows_child_attachment: template.allows_child_attachment,
            archetype: Archetype::ScriptNode(node_id),
            pending_kill: false,
            properties: template.properties.clone(),
        };
        let id = self.insert_component(instance);

        let parent = parent_instance
            .or_else(|| {
                native_parent_name
                    .as_deref()
                    .and_then(|name| self.component_by_name(actor, name))
            })
            .or_else(|| self.actor(actor).and_then(|a| a.root_component));
        if let Some(scene) = self.component_mut(id).and_then(|c| c.scene.as_mut()) {
            scene.attach_parent = parent;
        }
        let is_scene = self.component(id).map(|c| c.is_scene_component()).unwrap_or(false);
        if let Some(a) = self.actor_mut(actor) {
            a.components.push(id);
            if a.root_component.is_none() && is_scene {
                a.root_component = Some(id);
            }
        }
        for child in children {
            self.run_script_node(actor, child, Some(id))?;
        }
        Ok(())
    }

    /// Adds a brand-new instance component to a live actor.
    pub fn add_instance_component(
        &mut self,
        actor: ActorId,
        name: &str,
        class_name: &str,
        scene: Option<SceneData>,
    ) -> Option<ComponentId> {
        self.actor(actor)?;
        let unique = self.unique_component_name(actor, name);
        let id = self.insert_component(Component {
            name: unique,
            class_name: class_name.to_string(),
            owner: Some(actor),
            creation_method: CreationMethod::Instance,
            scene,
            editor_only: false,
            editable_when_inherited: true,
            allows_child_attachment: true,
            archetype: Archetype::None,
            pending_kill: false,
            properties: PropertyBag::default(),
        });
        let is_scene = self.component(id).map(|c| c.is_scene_component()).unwrap_or(false);
        let root = self.actor(actor).and_then(|a| a.root_component);
        if is_scene {
            if let Some(scene) = self.component_mut(id).and_then(|c| c.scene.as_mut()) {
                if scene.attach_parent.is_none() {
                    scene.attach_parent = root;
                }
            }
        }
        if let Some(a) = self.actor_mut(actor) {
            a.components.push(id);
            if a.root_component.is_none() && is_scene {
                a.root_component = Some(id);
            }
        }
        Some(id)
    }

    /// Destroys a component. Attached children are re-homed to the destroyed
    /// component's own attach parent, keeping their world transforms.
    pub fn destroy_component(&mut self, id: ComponentId) {
        let Some(component) = self.component(id) else { return };
        let owner = component.owner;
        let parent = component.scene.as_ref().and_then(|s| s.attach_parent);
        let children = self.attach_children(id);
        for child in children {
            if let Some(parent) = parent {
                let _ = self.attach_component(child, parent, true);
            } else {
                self.detach_component(child, true);
            }
        }
        if let Some(owner) = owner {
            if let Some(actor) = self.actor_mut(owner) {
                actor.components.retain(|&c| c != id);
                if actor.root_component == Some(id) {
                    actor.root_component = None;
                }
            }
        }
        self.components.remove(id.index, id.generation);
    }

    // ---------- Lookup ----------

    pub fn component_by_name(&self, actor: ActorId, name: &str) -> Option<ComponentId> {
        let actor = self.actor(actor)?;
        actor
            .components
            .iter()
            .copied()
            .find(|&c| self.component(c).map(|c| c.name == name).unwrap_or(false))
    }

    pub fn attach_children(&self, parent: ComponentId) -> Vec<ComponentId> {
        let Some(owner) = self.component(parent).and_then(|c| c.owner) else {
            return Vec::new();
        };
        let Some(actor) = self.actor(owner) else { return Vec::new() };
        actor
            .components
            .iter()
            .copied()
            .filter(|&c| {
                self.component(c)
                    .and_then(|c| c.scene.as_ref())
                    .map(|s| s.attach_parent == Some(parent))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Every live instance whose archetype matches the given template
    /// component (a script-node template or a class-default template).
    pub fn archetype_instances(&self, template: ComponentId) -> Vec<ComponentId> {
        let key = match self.component(template).map(|c| c.archetype) {
            Some(Archetype::ScriptNode(node)) => Archetype::ScriptNode(node),
            _ => {
                // The template itself may be the archetype anchor.
                if let Some(node) = self.script_node_for_template(template) {
                    Archetype::ScriptNode(node)
                } else {
                    Archetype::Template(template)
                }
            }
        };
        self.components
            .iter()
            .filter(|(_, _, c)| !c.pending_kill && c.owner.is_some())
            .filter(|(_, _, c)| {
                c.owner
                    .and_then(|o| self.actor(o))
                    .map(|a| !a.is_template)
                    .unwrap_or(false)
            })
            .filter(|(_, _, c)| c.archetype == key)
            .map(|(index, generation, _)| ComponentId { index, generation })
            .collect()
    }

    fn script_node_for_template(&self, template: ComponentId) -> Option<ScriptNodeId> {
        self.script_nodes
            .iter()
            .find(|(_, _, n)| n.template == template)
            .map(|(index, generation, _)| ScriptNodeId { index, generation })
    }

    // ---------- Transforms ----------

    /// Resolved world-space translation/rotation/scale, honoring the
    /// per-channel absolute flags up the attach chain.
    pub fn world_transform(&self, id: ComponentId) -> Option<(Vec3, Quat, Vec3)> {
        let scene = self.component(id)?.scene.as_ref()?;
        let local = (scene.translation, scene.rotation, scene.scale);
        let Some(parent) = scene.attach_parent else {
            return Some(local);
        };
        let Some((pt, pr, ps)) = self.world_transform(parent) else {
            return Some(local);
        };
        let translation = if scene.absolute_location {
            scene.translation
        } else {
            pt + pr * (ps * scene.translation)
        };
        let rotation = if scene.absolute_rotation { scene.rotation } else { pr * scene.rotation };
        let scale = if scene.absolute_scale { scene.scale } else { ps * scene.scale };
        Some((translation, rotation, scale))
    }

    /// Rewrites a component's relative transform so its resolved world
    /// transform equals the given one, leaving absolute channels untouched
    /// (they are world-anchored already).
    pub fn set_world_transform_preserving_channels(
        &mut self,
        id: ComponentId,
        world: (Vec3, Quat, Vec3),
    ) {
        let parent_world = self
            .component(id)
            .and_then(|c| c.scene.as_ref())
            .and_then(|s| s.attach_parent)
            .and_then(|p| self.world_transform(p));
        let Some(scene) = self.component_mut(id).and_then(|c| c.scene.as_mut()) else {
            return;
        };
        let (wt, wr, ws) = world;
        let (pt, pr, ps) = parent_world.unwrap_or((Vec3::ZERO, Quat::IDENTITY, Vec3::ONE));
        if !scene.absolute_location {
            let offset = pr.inverse() * (wt - pt);
            scene.translation = Vec3::new(
                safe_div(offset.x, ps.x),
                safe_div(offset.y, ps.y),
                safe_div(offset.z, ps.z),
            );
        }
        if !scene.absolute_rotation {
            scene.rotation = pr.inverse() * wr;
        }
        if !scene.absolute_scale {
            scene.scale = Vec3::new(safe_div(ws.x, ps.x), safe_div(ws.y, ps.y), safe_div(ws.z, ps.z));
        }
    }

    /// Attaches a scene component under a new parent. With keep_world the
    /// world transform is captured first and written back through the
    /// absolute-channel-preserving path.
    pub fn attach_component(&mut self, child: ComponentId, parent: ComponentId, keep_world: bool) -> Result<()> {
        if child == parent {
            return Err(anyhow!("cannot attach a component to itself"));
        }
        let world = if keep_world { self.world_transform(child) } else { None };
        {
            let scene = self
                .component_mut(child)
                .and_then(|c| c.scene.as_mut())
                .ok_or_else(|| anyhow!("attach_component: child is not a scene component"))?;
            scene.attach_parent = Some(parent);
        }
        if let Some(world) = world {
            self.set_world_transform_preserving_channels(child, world);
        }
        Ok(())
    }

    pub fn detach_component(&mut self, child: ComponentId, keep_world: bool) {
        let world = if keep_world { self.world_transform(child) } else { None };
        if let Some(scene) = self.component_mut(child).and_then(|c| c.scene.as_mut()) {
            scene.attach_parent = None;
            if let Some((wt, wr, ws)) = world {
                if !scene.absolute_location {
                    scene.translation = wt;
                }
                if !scene.absolute_rotation {
                    scene.rotation = wr;
                }
                if !scene.absolute_scale {
                    scene.scale = ws;
                }
            }
        }
    }

    // ---------- Naming ----------

    pub fn unique_component_name(&self, actor: ActorId, base: &str) -> String {
        if self.component_by_name(actor, base).is_none() {
            return base.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{base}_{counter}");
            if self.component_by_name(actor, &candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Renames a component, failing on a sibling collision under the same
    /// owner. Renaming to the current name succeeds without touching state.
    pub fn rename_component(&mut self, id: ComponentId, new_name: &str) -> Result<(), NameCollision> {
        let Some(component) = self.component(id) else {
            return Err(NameCollision { name: new_name.to_string() });
        };
        if component.name == new_name {
            return Ok(());
        }
        if let Some(owner) = component.owner {
            if let Some(existing) = self.component_by_name(owner, new_name) {
                if existing != id {
                    return Err(NameCollision { name: new_name.to_string() });
                }
            }
        }
        if let Some(component) = self.component_mut(id) {
            component.name = new_name.to_string();
        }
        Ok(())
    }

    // ---------- Property clone ----------

    pub fn export_component(&self, id: ComponentId) -> Option<ComponentSnapshot> {
        let component = self.component(id)?;
        Some(ComponentSnapshot {
            name: component.name.clone(),
            class_name: component.class_name.clone(),
            scene: component.scene.clone(),
            editor_only: component.editor_only,
            properties: component.properties.clone(),
        })
    }

    /// Materializes a snapshot as a new instance-added component on the
    /// given actor. Attachment is left to the caller.
    pub fn import_component(&mut self, actor: ActorId, snapshot: &ComponentSnapshot) -> Option<ComponentId> {
        let mut scene = snapshot.scene.clone();
        if let Some(scene) = scene.as_mut() {
            scene.attach_parent = None;
        }
        let id = self.add_instance_component(actor, &snapshot.name, &snapshot.class_name, scene)?;
        if let Some(component) = self.component_mut(id) {
            component.editor_only = snapshot.editor_only;
            component.properties = snapshot.properties.clone();
        }
        Some(id)
    }

    // ---------- Reinstancing ----------

    /// Replaces every component of the actor with a freshly constructed
    /// copy, as class recompilation does. Old components are marked pending
    /// kill; the returned map drives on_objects_replaced fixups.
    pub fn reinstance_actor(&mut self, actor: ActorId) -> HashMap<ComponentId, ComponentId> {
        let mut map = HashMap::new();
        let old_components: Vec<ComponentId> =
            self.actor(actor).map(|a| a.components.clone()).unwrap_or_default();
        for &old in &old_components {
            let Some(component) = self.component(old) else { continue };
            let clone = Component {
                name: component.name.clone(),
                class_name: component.class_name.clone(),
                owner: component.owner,
                creation_method: component.creation_method,
                scene: component.scene.clone(),
                editor_only: component.editor_only,
                editable_when_inherited: component.editable_when_inherited,
                allows_child_attachment: component.allows_child_attachment,
                archetype: component.archetype,
                pending_kill: false,
                properties: component.properties.clone(),
            };
            let new = self.insert_component(clone);
            map.insert(old, new);
        }
        // Repoint attach parents and actor bookkeeping at the replacements.
        for (&old, &new) in &map {
            if let Some(scene) = self.component_mut(new).and_then(|c| c.scene.as_mut()) {
                if let Some(parent) = scene.attach_parent {
                    if let Some(&replacement) = map.get(&parent) {
                        scene.attach_parent = Some(replacement);
                    }
                }
            }
            if let Some(component) = self.components.get_mut(old.index, old.generation) {
                component.pending_kill = true;
            }
        }
        if let Some(a) = self.actor_mut(actor) {
            a.components = a.components.iter().map(|c| *map.get(c).unwrap_or(c)).collect();
            if let Some(root) = a.root_component {
                if let Some(&replacement) = map.get(&root) {
                    a.root_component = Some(replacement);
                }
            }
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("a component named `{name}` already exists on this actor")]
pub struct NameCollision {
    pub name: String,
}

fn safe_div(a: f32, b: f32) -> f32 {
    if b.abs() < f32::EPSILON {
        a
    } else {
        a / b
    }
}

#[derive(Clone)]
pub enum ScriptParent {
    Root,
    Node(ScriptNodeId),
    NativeComponent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_at(translation: Vec3) -> SceneData {
        SceneData { translation, ..SceneData::default() }
    }

    #[test]
    fn spawn_runs_ancestor_scripts_before_derived() {
        let mut registry = ObjectRegistry::new();
        let base = registry.register_class("BaseActor", None);
        registry.add_native_component(
            base,
            NativeDecl {
                name: "Body".into(),
                class_name: "StaticMeshComponent".into(),
                scene: Some(SceneData::default()),
                editor_only: false,
                attach_parent: None,
                is_root: true,
            },
        );
        registry
            .add_script_node(base, "Lamp", "PointLightComponent", Some(SceneData::default()), ScriptParent::Root)
            .expect("script node");
        let derived = registry.register_class("DerivedActor", Some(base));
        registry
            .add_script_node(derived, "Antenna", "SceneComponent", Some(SceneData::default()), ScriptParent::Root)
            .expect("script node");

        let actor = registry.spawn_actor(derived, "Mule").expect("spawn");
        let names: Vec<String> = registry
            .actor(actor)
            .expect("actor")
            .components
            .iter()
            .map(|&c| registry.component(c).expect("component").name.clone())
            .collect();
        assert_eq!(names, vec!["Body", "Lamp", "Antenna"]);
        let root = registry.actor(actor).and_then(|a| a.root_component).expect("root");
        assert_eq!(registry.component(root).expect("root component").name, "Body");
    }

    #[test]
    fn attach_keep_world_rewrites_relative_channels() {
        let mut registry = ObjectRegistry::new();
        let class = registry.register_class("Prop", None);
        let actor = registry.spawn_actor(class, "Prop0").expect("spawn");
        let root = registry
            .add_instance_component(actor, "Root", "SceneComponent", Some(scene_at(Vec3::new(5.0, 0.0, 0.0))))
            .expect("root");
        let child = registry
            .add_instance_component(actor, "Child", "SceneComponent", Some(scene_at(Vec3::new(1.0, 2.0, 3.0))))
            .expect("child");
        registry.detach_component(child, false);

        let before = registry.world_transform(child).expect("world before");
        registry.attach_component(child, root, true).expect("attach");
        let after = registry.world_transform(child).expect("world after");
        assert!((before.0 - after.0).length() < 1e-4);
        let relative = registry
            .component(child)
            .and_then(|c| c.scene.as_ref())
            .expect("scene")
            .translation;
        assert!((relative - Vec3::new(-4.0, 2.0, 3.0)).length() < 1e-4);
    }

    #[test]
    fn absolute_location_survives_reattachment() {
        let mut registry = ObjectRegistry::new();
        let class = registry.register_class("Prop", None);
        let actor = registry.spawn_actor(class, "Prop0").expect("spawn");
        let root = registry
            .add_instance_component(actor, "Root", "SceneComponent", Some(scene_at(Vec3::new(10.0, 0.0, 0.0))))
            .expect("root");
        let mut pinned = scene_at(Vec3::new(7.0, 7.0, 7.0));
        pinned.absolute_location = true;
        let child = registry
            .add_instance_component(actor, "Pinned", "SceneComponent", Some(pinned))
            .expect("child");
        registry.detach_component(child, false);

        registry.attach_component(child, root, true).expect("attach");
        let scene = registry.component(child).and_then(|c| c.scene.as_ref()).expect("scene");
        assert_eq!(scene.translation, Vec3::new(7.0, 7.0, 7.0));
        let world = registry.world_transform(child).expect("world");
        assert_eq!(world.0, Vec3::new(7.0, 7.0, 7.0));
    }

    #[test]
    fn spawning_a_rootless_class_synthesizes_a_default_root() {
        let mut registry = ObjectRegistry::new();
        let class = registry.register_class("EmptyActor", None);
        let actor = registry.spawn_actor(class, "Empty0").expect("spawn");
        let root = registry.actor(actor).and_then(|a| a.root_component).expect("root");
        assert_eq!(registry.component(root).expect("root").name, DEFAULT_SCENE_ROOT_NAME);

        // Later scene components attach under the synthetic root instead of
        // being promoted in its place.
        let lamp = registry
            .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
            .expect("lamp");
        assert_eq!(registry.actor(actor).and_then(|a| a.root_component), Some(root));
        let parent = registry
            .component(lamp)
            .and_then(|c| c.scene.as_ref())
            .and_then(|s| s.attach_parent);
        assert_eq!(parent, Some(root));
    }

    #[test]
    fn rename_collision_is_rejected_and_idempotent_rename_accepted() {
        let mut registry = ObjectRegistry::new();
        let class = registry.register_class("Prop", None);
        let actor = registry.spawn_actor(class, "Prop0").expect("spawn");
        let a = registry
            .add_instance_component(actor, "Alpha", "SceneComponent", Some(SceneData::default()))
            .expect("a");
        registry
            .add_instance_component(actor, "Beta", "SceneComponent", Some(SceneData::default()))
            .expect("b");
        assert!(registry.rename_component(a, "Alpha").is_ok());
        assert!(registry.rename_component(a, "Beta").is_err());
        assert_eq!(registry.component(a).expect("a").name, "Alpha");
        assert!(registry.rename_component(a, "Gamma").is_ok());
        assert_eq!(registry.component(a).expect("a").name, "Gamma");
    }
}
