use bitflags::bitflags;
use smallvec::SmallVec;

use crate::registry::{
    ActorId, Archetype, ComponentId, CreationMethod, ObjectRegistry, ScriptNodeId,
    DEFAULT_SCENE_ROOT_NAME,
};
use crate::transaction::ScopedTransaction;

pub const SCENE_SEPARATOR_LABEL: &str = "Scene Components";
pub const NON_SCENE_SEPARATOR_LABEL: &str = "Non-Scene Components";

bitflags! {
    /// Cached filter state for one tree row. UNKNOWN means the row has not
    /// been evaluated against the current filter text yet.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct FilterFlags: u8 {
        const MATCHES_FILTER = 1 << 0;
        const CHILD_MATCHES = 1 << 1;
        const UNKNOWN = 1 << 2;
    }
}

impl FilterFlags {
    pub const FILTERED_IN_MASK: FilterFlags =
        FilterFlags::MATCHES_FILTER.union(FilterFlags::CHILD_MATCHES);
}

impl Default for FilterFlags {
    fn default() -> Self {
        FilterFlags::UNKNOWN
    }
}

/// Generational handle into a [`NodeArena`]. Handles from before a rebuild
/// resolve to None afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// A component edited through its template: a native class-default
    /// component or a construction-script node.
    Component {
        component: ComponentId,
        script_node: Option<ScriptNodeId>,
        /// Set when the script node belongs to an ancestor class.
        inherited_scs: bool,
    },
    /// A live instance produced by the class (native declaration or
    /// construction script).
    InstancedInherited {
        component: ComponentId,
        script_node: Option<ScriptNodeId>,
    },
    /// A live instance added directly to this actor.
    InstanceAdded { component: ComponentId },
    RootActor {
        actor: ActorId,
        scene_root: Option<NodeId>,
        scene_separator: Option<NodeId>,
        non_scene_separator: Option<NodeId>,
    },
    Separator { scene: bool },
}

pub struct TreeNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 8]>,
    pub(crate) filter: FilterFlags,
    pub kind: NodeKind,
    /// Transaction handed over by a deferred rename request. Closed when the
    /// rename completes or the row is rebuilt.
    pub(crate) ongoing_create_transaction: Option<ScopedTransaction>,
}

impl TreeNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: SmallVec::new(),
            filter: FilterFlags::UNKNOWN,
            kind,
            ongoing_create_transaction: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn filter_flags(&self) -> FilterFlags {
        self.filter
    }

    /// A row is filtered in when it matches the filter itself or shelters a
    /// descendant that does.
    pub fn is_filtered_in(&self) -> bool {
        self.filter.intersects(FilterFlags::FILTERED_IN_MASK)
    }

    /// True only once the row has been evaluated and found not filtered in.
    pub fn is_flagged_for_filtration(&self) -> bool {
        !self.filter.contains(FilterFlags::UNKNOWN) && !self.is_filtered_in()
    }

    pub fn component_id(&self) -> Option<ComponentId> {
        match self.kind {
            NodeKind::Component { component, .. }
            | NodeKind::InstancedInherited { component, .. }
            | NodeKind::InstanceAdded { component } => Some(component),
            NodeKind::RootActor { .. } | NodeKind::Separator { .. } => None,
        }
    }

    pub fn script_node_id(&self) -> Option<ScriptNodeId> {
        match self.kind {
            NodeKind::Component { script_node, .. }
            | NodeKind::InstancedInherited { script_node, .. } => script_node,
            _ => None,
        }
    }

    pub fn is_root_actor(&self) -> bool {
        matches!(self.kind, NodeKind::RootActor { .. })
    }

    pub fn is_separator(&self) -> bool {
        matches!(self.kind, NodeKind::Separator { .. })
    }

    pub fn is_instanced(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::InstancedInherited { .. } | NodeKind::InstanceAdded { .. }
        )
    }
}

struct NodeSlot {
    generation: u32,
    node: Option<TreeNode>,
}

/// Owns every row of one component tree. Rebuilt wholesale by the tree
/// builder; detached subtrees stay alive in the arena until then.
#[derive(Default)]
pub struct NodeArena {
    slots: Vec<NodeSlot>,
    free: Vec<u32>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }

    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = TreeNode::new(kind);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(NodeSlot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.node
                .as_ref()
                .map(|_| NodeId { index: i as u32, generation: slot.generation })
        })
    }

    // ---------- Presentation ----------

    /// The text a row shows and the filter matches against.
    pub fn display_string(&self, id: NodeId, registry: &ObjectRegistry) -> String {
        let Some(node) = self.get(id) else { return String::new() };
        match &node.kind {
            NodeKind::RootActor { actor, .. } => registry
                .actor(*actor)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "(deleted actor)".to_string()),
            NodeKind::Separator { scene: true } => SCENE_SEPARATOR_LABEL.to_string(),
            NodeKind::Separator { scene: false } => NON_SCENE_SEPARATOR_LABEL.to_string(),
            NodeKind::Component { component, script_node, .. }
            | NodeKind::InstancedInherited { component, script_node } => {
                if let Some(name) = script_node.and_then(|n| registry.script_node(n)).map(|n| n.variable_name.clone()) {
                    return name;
                }
                registry
                    .component(*component)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "(deleted component)".to_string())
            }
            NodeKind::InstanceAdded { component } => registry
                .component(*component)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "(deleted component)".to_string()),
        }
    }

    // ---------- Capability queries ----------

    pub fn is_native(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        let Some(node) = self.get(id) else { return false };
        node.component_id()
            .and_then(|c| registry.component(c))
            .map(|c| c.creation_method == CreationMethod::Native)
            .unwrap_or(false)
    }

    /// True for rows the inspected actor cannot claim as its own: native
    /// declarations, and script rows inherited from an ancestor class.
    pub fn is_inherited(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        self.is_native(id, registry) || self.is_inherited_scs(id, registry)
    }

    pub fn is_inherited_scs(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        let Some(node) = self.get(id) else { return false };
        match &node.kind {
            NodeKind::Component { inherited_scs, .. } => *inherited_scs,
            NodeKind::InstancedInherited { component, script_node } => {
                let Some(script_node) = script_node.and_then(|n| registry.script_node(n)) else {
                    return false;
                };
                let Some(actor_class) = registry
                    .component(*component)
                    .and_then(|c| c.owner)
                    .and_then(|a| registry.actor(a))
                    .map(|a| a.class)
                else {
                    return false;
                };
                script_node.owning_class != actor_class
            }
            _ => false,
        }
    }

    pub fn is_default_scene_root(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        let Some(node) = self.get(id) else { return false };
        node.component_id()
            .and_then(|c| registry.component(c))
            .map(|c| c.name == DEFAULT_SCENE_ROOT_NAME || matches!(c.archetype, Archetype::ScriptNode(n) if self.is_script_default_root(n, registry)))
            .unwrap_or(false)
            || node
                .script_node_id()
                .map(|n| self.is_script_default_root(n, registry))
                .unwrap_or(false)
    }

    fn is_script_default_root(&self, node: ScriptNodeId, registry: &ObjectRegistry) -> bool {
        registry
            .script_node(node)
            .and_then(|n| registry.class(n.owning_class))
            .and_then(|c| c.script.as_ref())
            .map(|s| s.default_scene_root == Some(node))
            .unwrap_or(false)
    }

    pub fn is_scene_component(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        self.get(id)
            .and_then(|n| n.component_id())
            .and_then(|c| registry.component(c))
            .map(|c| c.is_scene_component())
            .unwrap_or(false)
    }

    pub fn can_reparent(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        let Some(node) = self.get(id) else { return false };
        if node.is_root_actor() || node.is_separator() {
            return false;
        }
        !self.is_inherited(id, registry)
            && !self.is_default_scene_root(id, registry)
            && self.is_scene_component(id, registry)
    }

    pub fn can_rename(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        let Some(node) = self.get(id) else { return false };
        !node.is_root_actor() && !node.is_separator() && !self.is_inherited(id, registry)
    }

    pub fn can_delete(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        self.can_rename(id, registry)
    }

    /// Whether the given component may gain children through drag and drop.
    pub fn can_attach_as_child(&self, id: NodeId, registry: &ObjectRegistry) -> bool {
        self.get(id)
            .and_then(|n| n.component_id())
            .and_then(|c| registry.component(c))
            .map(|c| c.is_scene_component() && c.allows_child_attachment)
            .unwrap_or(false)
    }

    /// True when `id` sits somewhere below `ancestor`.
    pub fn is_attached_to(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.get(id).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).and_then(|n| n.parent);
        }
        false
    }

    pub fn scene_root(&self, root_actor: NodeId) -> Option<NodeId> {
        match self.get(root_actor)?.kind {
            NodeKind::RootActor { scene_root, .. } => scene_root,
            _ => None,
        }
    }

    // ---------- Structure edits ----------

    /// Links `child` under `parent`, mirroring the edit into the backing
    /// objects: script nodes are re-homed inside their construction script,
    /// live instances are attached keeping their world transform (promoting
    /// the parent to actor root first when the child was the root).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, registry: &mut ObjectRegistry) {
        self.unlink(child);
        if self.get(parent).map(|n| n.is_root_actor()).unwrap_or(false) {
            self.add_child_of_root_actor(parent, child, registry);
        } else {
            if let Some(node) = self.get_mut(parent) {
                node.children.push(child);
            }
            if let Some(node) = self.get_mut(child) {
                node.parent = Some(parent);
            }
            self.mirror_attach(parent, child, registry);
        }
        // A filtered-in child must keep every ancestor visible.
        if self
            .get(child)
            .map(|n| !n.filter.contains(FilterFlags::UNKNOWN) && n.is_filtered_in())
            .unwrap_or(false)
        {
            self.apply_filtered_state_to_parent(child);
        }
    }

    fn mirror_attach(&mut self, parent: NodeId, child: NodeId, registry: &mut ObjectRegistry) {
        let (Some(parent_node), Some(child_node)) = (self.get(parent), self.get(child)) else {
            return;
        };
        match (&parent_node.kind, &child_node.kind) {
            // Template editing: the construction script is the backing store.
            (
                NodeKind::Component { script_node: parent_script, component: parent_component, .. },
                NodeKind::Component { script_node: Some(child_script), .. },
            ) => {
                let child_script = *child_script;
                if let Some(parent_script) = *parent_script {
                    let already = registry
                        .script_node(child_script)
                        .map(|n| n.parent == Some(parent_script))
                        .unwrap_or(false);
                    if !already {
                        registry.reparent_script_node(child_script, parent_script);
                    }
                } else if let Some(name) =
                    registry.component(*parent_component).map(|c| c.name.clone())
                {
                    let already = registry
                        .script_node(child_script)
                        .map(|n| n.native_parent_name.as_deref() == Some(name.as_str()))
                        .unwrap_or(false);
                    if !already {
                        registry.attach_script_node_to_native(child_script, &name);
                    }
                }
            }
            _ => {
                // Live instances mirror straight into the world.
                let (Some(parent_component), Some(child_component)) =
                    (parent_node.component_id(), child_node.component_id())
                else {
                    return;
                };
                let child_is_live = registry
                    .component(child_component)
                    .and_then(|c| c.owner)
                    .and_then(|a| registry.actor(a))
                    .map(|a| !a.is_template)
                    .unwrap_or(false);
                if !child_is_live {
                    return;
                }
                let already_attached = registry
                    .component(child_component)
                    .and_then(|c| c.scene.as_ref())
                    .map(|s| s.attach_parent == Some(parent_component))
                    .unwrap_or(false);
                if already_attached {
                    return;
                }
                let owner = registry.component(child_component).and_then(|c| c.owner);
                if let Some(owner) = owner {
                    let child_is_root = registry
                        .actor(owner)
                        .map(|a| a.root_component == Some(child_component))
                        .unwrap_or(false);
                    if child_is_root {
                        if let Some(actor) = registry.actor_mut(owner) {
                            actor.root_component = Some(parent_component);
                        }
                    }
                }
                if registry.attach_component(child_component, parent_component, true).is_err() {
                    println!(
                        "[inspector] failed to attach component while mirroring a tree edit"
                    );
                }
            }
        }
    }

    fn add_child_of_root_actor(&mut self, root: NodeId, child: NodeId, registry: &ObjectRegistry) {
        let child_is_scene = self.is_scene_component(child, registry);
        let (scene_separator, non_scene_separator) = match self.get(root).map(|n| &n.kind) {
            Some(NodeKind::RootActor { scene_separator, non_scene_separator, .. }) => {
                (*scene_separator, *non_scene_separator)
            }
            _ => return,
        };
        if child_is_scene {
            let separator = match scene_separator {
                Some(s) => s,
                None => {
                    let s = self.insert(NodeKind::Separator { scene: true });
                    if let Some(node) = self.get_mut(s) {
                        node.parent = Some(root);
                    }
                    if let Some(node) = self.get_mut(root) {
                        node.children.insert(0, s);
                        if let NodeKind::RootActor { scene_separator, .. } = &mut node.kind {
                            *scene_separator = Some(s);
                        }
                    }
                    s
                }
            };
            let insert_at = self
                .get(root)
                .and_then(|n| n.children.iter().position(|&c| c == separator))
                .map(|p| p + 1)
                .unwrap_or(0);
            if let Some(node) = self.get_mut(root) {
                node.children.insert(insert_at, child);
                if let NodeKind::RootActor { scene_root, .. } = &mut node.kind {
                    if scene_root.is_none() {
                        *scene_root = Some(child);
                    }
                }
            }
        } else {
            if non_scene_separator.is_none() {
                let s = self.insert(NodeKind::Separator { scene: false });
                if let Some(node) = self.get_mut(s) {
                    node.parent = Some(root);
                }
                if let Some(node) = self.get_mut(root) {
                    node.children.push(s);
                    if let NodeKind::RootActor { non_scene_separator, .. } = &mut node.kind {
                        *non_scene_separator = Some(s);
                    }
                }
            }
            if let Some(node) = self.get_mut(root) {
                node.children.push(child);
            }
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(root);
        }
    }

    /// Unlinks `child` from `parent` and mirrors the removal: script nodes
    /// leave their construction script, live instances detach keeping their
    /// world transform. Separator headers are dropped when their group
    /// empties.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId, registry: &mut ObjectRegistry) {
        let was_filtered_in = self
            .get(child)
            .map(|n| !n.filter.contains(FilterFlags::UNKNOWN) && n.is_filtered_in())
            .unwrap_or(false);
        self.unlink(child);
        let Some(child_node) = self.get(child) else { return };
        match &child_node.kind {
            NodeKind::Component { script_node: Some(script), .. } => {
                registry.remove_script_node_from_script(*script);
            }
            NodeKind::InstancedInherited { component, .. } | NodeKind::InstanceAdded { component } => {
                registry.detach_component(*component, true);
            }
            _ => {}
        }
        self.prune_empty_separators(parent, registry);
        if was_filtered_in {
            // The parent may no longer shelter a match.
            self.refresh_child_matches(parent);
            self.apply_filtered_state_to_parent(parent);
        }
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(parent) = self.get(child).and_then(|n| n.parent) else { return };
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.retain(|c| *c != child);
            if let NodeKind::RootActor { scene_root, .. } = &mut parent_node.kind {
                if *scene_root == Some(child) {
                    *scene_root = None;
                }
            }
        }
        if let Some(node) = self.get_mut(child) {
            node.parent = None;
        }
    }

    fn prune_empty_separators(&mut self, root: NodeId, registry: &ObjectRegistry) {
        let Some(NodeKind::RootActor { scene_separator, non_scene_separator, .. }) =
            self.get(root).map(|n| n.kind.clone())
        else {
            return;
        };
        let children: Vec<NodeId> = self.get(root).map(|n| n.children.to_vec()).unwrap_or_default();
        for (separator, scene) in [(scene_separator, true), (non_scene_separator, false)] {
            let Some(separator) = separator else { continue };
            let group_empty = !children.iter().any(|&c| {
                c != separator
                    && !self.get(c).map(|n| n.is_separator()).unwrap_or(true)
                    && self.is_scene_component(c, registry) == scene
            });
            if group_empty {
                self.unlink(separator);
                self.remove_node(separator);
                if let Some(NodeKind::RootActor { scene_separator, non_scene_separator, .. }) =
                    self.get_mut(root).map(|n| &mut n.kind)
                {
                    if scene {
                        *scene_separator = None;
                    } else {
                        *non_scene_separator = None;
                    }
                }
            }
        }
    }

    fn remove_node(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    /// Swaps which child of the root actor row acts as the scene root. The
    /// previous root is unlinked; the caller decides where it goes next.
    pub fn set_scene_root(&mut self, root_actor: NodeId, new_root: NodeId) {
        let old_root = self.scene_root(root_actor);
        if old_root == Some(new_root) {
            return;
        }
        if let Some(old) = old_root {
            self.unlink(old);
        }
        self.unlink(new_root);
        // Re-enter through the grouping path so the separator exists.
        let position = self
            .get(root_actor)
            .and_then(|n| {
                let sep = match n.kind {
                    NodeKind::RootActor { scene_separator, .. } => scene_separator,
                    _ => None,
                };
                sep.and_then(|s| n.children.iter().position(|&c| c == s)).map(|p| p + 1)
            })
            .unwrap_or(0);
        if let Some(node) = self.get_mut(root_actor) {
            node.children.insert(position.min(node.children.len()), new_root);
            if let NodeKind::RootActor { scene_root, .. } = &mut node.kind {
                *scene_root = Some(new_root);
            }
        }
        if let Some(node) = self.get_mut(new_root) {
            node.parent = Some(root_actor);
        }
    }

    // ---------- Lookup ----------

    /// Depth-first search below `parent` for the row editing `component`.
    /// Returns the row and its depth below `parent`.
    pub fn find_child_by_component(
        &self,
        parent: NodeId,
        component: ComponentId,
        recursive: bool,
    ) -> Option<(NodeId, usize)> {
        self.find_child_impl(parent, recursive, &|node| node.component_id() == Some(component))
    }

    pub fn find_child_by_script_node(
        &self,
        parent: NodeId,
        script_node: ScriptNodeId,
        recursive: bool,
    ) -> Option<(NodeId, usize)> {
        self.find_child_impl(parent, recursive, &|node| node.script_node_id() == Some(script_node))
    }

    /// Matches by variable name or instance name.
    pub fn find_child_by_name(
        &self,
        parent: NodeId,
        name: &str,
        recursive: bool,
        registry: &ObjectRegistry,
    ) -> Option<(NodeId, usize)> {
        let children: Vec<NodeId> = self.get(parent)?.children.to_vec();
        for child in &children {
            if self.display_string(*child, registry) == name {
                return Some((*child, 1));
            }
        }
        if recursive {
            for child in children {
                if let Some((found, depth)) = self.find_child_by_name(child, name, true, registry) {
                    return Some((found, depth + 1));
                }
            }
        }
        None
    }

    fn find_child_impl(
        &self,
        parent: NodeId,
        recursive: bool,
        predicate: &dyn Fn(&TreeNode) -> bool,
    ) -> Option<(NodeId, usize)> {
        let children: Vec<NodeId> = self.get(parent)?.children.to_vec();
        for child in &children {
            if self.get(*child).map(predicate).unwrap_or(false) {
                return Some((*child, 1));
            }
        }
        if recursive {
            for child in children {
                if let Some((found, depth)) = self.find_child_impl(child, true, predicate) {
                    return Some((found, depth + 1));
                }
            }
        }
        None
    }

    // ---------- Filter-state plumbing ----------

    pub(crate) fn set_filter_flags(&mut self, id: NodeId, flags: FilterFlags) {
        if let Some(node) = self.get_mut(id) {
            node.filter = flags;
        }
    }

    /// Recomputes CHILD_MATCHES for one row from its direct children.
    pub(crate) fn refresh_child_matches(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.get(id) {
            Some(node) => node.children.to_vec(),
            None => return,
        };
        let any = children
            .iter()
            .any(|&c| self.get(c).map(|n| n.is_filtered_in()).unwrap_or(false));
        if let Some(node) = self.get_mut(id) {
            if any {
                node.filter |= FilterFlags::CHILD_MATCHES;
            } else {
                node.filter &= !FilterFlags::CHILD_MATCHES;
            }
        }
    }

    /// Pushes a child's filter result up the ancestor chain. A filtered-in
    /// child marks ancestors until one already carries the flag; a
    /// filtered-out child forces a sibling rescan at each level and stops as
    /// soon as another child keeps the ancestor visible.
    pub(crate) fn apply_filtered_state_to_parent(&mut self, child: NodeId) {
        let mut filtered_in = self.get(child).map(|n| n.is_filtered_in()).unwrap_or(false);
        let mut cursor = self.get(child).and_then(|n| n.parent);
        while let Some(parent) = cursor {
            if filtered_in {
                let already = self
                    .get(parent)
                    .map(|n| n.filter.contains(FilterFlags::CHILD_MATCHES))
                    .unwrap_or(true);
                if already {
                    break;
                }
                if let Some(node) = self.get_mut(parent) {
                    node.filter |= FilterFlags::CHILD_MATCHES;
                }
            } else {
                self.refresh_child_matches(parent);
                if self
                    .get(parent)
                    .map(|n| n.filter.contains(FilterFlags::CHILD_MATCHES))
                    .unwrap_or(false)
                {
                    break;
                }
            }
            filtered_in = self.get(parent).map(|n| n.is_filtered_in()).unwrap_or(false);
            cursor = self.get(parent).and_then(|n| n.parent);
        }
    }

    // ---------- Rename lifecycle ----------

    pub(crate) fn take_create_transaction(&mut self, id: NodeId) -> Option<ScopedTransaction> {
        self.get_mut(id).and_then(|n| n.ongoing_create_transaction.take())
    }

    pub(crate) fn store_create_transaction(&mut self, id: NodeId, transaction: ScopedTransaction) {
        if let Some(node) = self.get_mut(id) {
            node.ongoing_create_transaction = Some(transaction);
        }
    }
}
