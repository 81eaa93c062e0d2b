use runtime_inspector::config::InspectorConfig;
use runtime_inspector::dragdrop::DropAction;
use runtime_inspector::editor::{EditorMode, RuntimeTreeEditor};
use runtime_inspector::registry::{
    ActorId, ComponentId, CreationMethod, Mobility, NativeDecl, ObjectRegistry, SceneData,
};
use runtime_inspector::transaction::TransactionLog;
use runtime_inspector::tree::node::NodeId;

use glam::Vec3;

fn prop_actor(registry: &mut ObjectRegistry) -> ActorId {
    let class = registry.register_class("PropActor", None);
    registry.spawn_actor(class, "Prop0").expect("spawn")
}

fn scene_component(
    registry: &mut ObjectRegistry,
    actor: ActorId,
    name: &str,
    mobility: Mobility,
) -> ComponentId {
    let id = registry
        .add_instance_component(actor, name, "StaticMeshComponent", Some(SceneData::default()))
        .expect("scene component");
    if let Some(scene) = registry.component_mut(id).and_then(|c| c.scene.as_mut()) {
        scene.mobility = mobility;
    }
    id
}

fn instance_editor(registry: &mut ObjectRegistry, actor: ActorId) -> RuntimeTreeEditor {
    let mut editor = RuntimeTreeEditor::new(
        EditorMode::ActorInstance,
        InspectorConfig::default(),
        TransactionLog::new(),
    );
    editor.set_actor(registry, Some(actor));
    editor
}

fn row(editor: &RuntimeTreeEditor, registry: &ObjectRegistry, name: &str) -> NodeId {
    let root = editor.root().expect("root row");
    editor
        .arena()
        .find_child_by_name(root, name, true, registry)
        .map(|(node, _)| node)
        .unwrap_or_else(|| panic!("no row named {name}"))
}

#[test]
fn inherited_components_cannot_be_dragged() {
    let mut registry = ObjectRegistry::new();
    let class = registry.register_class("TurretActor", None);
    registry
        .add_native_component(
            class,
            NativeDecl {
                name: "Base".into(),
                class_name: "StaticMeshComponent".into(),
                scene: Some(SceneData::default()),
                editor_only: false,
                attach_parent: None,
                is_root: true,
            },
        )
        .expect("native root");
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let base = row(&editor, &registry, "Base");
    let lamp = row(&editor, &registry, "Lamp");
    let verdict = editor.validate_drop(&registry, &[base], lamp);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Base is inherited and cannot be moved.");
}

#[test]
fn non_scene_rows_report_why_they_cannot_move() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    registry
        .add_instance_component(actor, "Beeper", "AudioComponent", None)
        .expect("non-scene");
    let editor = instance_editor(&mut registry, actor);

    let beeper = row(&editor, &registry, "Beeper");
    let lamp = row(&editor, &registry, "Lamp");
    let verdict = editor.validate_drop(&registry, &[beeper], lamp);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(
        verdict.message,
        "Beeper is not a scene component and cannot be attached to other components."
    );
}

#[test]
fn actor_and_separator_rows_are_not_drop_targets() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let root = editor.root().expect("root row");
    let verdict = editor.validate_drop(&registry, &[lamp], root);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Drag the selection onto another component to attach it.");

    let separator = editor.arena().get(root).expect("root node").children()[0];
    assert!(editor.arena().get(separator).expect("separator").is_separator());
    let verdict = editor.validate_drop(&registry, &[lamp], separator);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Drag the selection onto another component to attach it.");
}

#[test]
fn self_and_cycle_drops_are_rejected() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let arm = scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    let lamp = scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    registry.attach_component(lamp, arm, false).expect("attach lamp");
    let editor = instance_editor(&mut registry, actor);

    let arm = row(&editor, &registry, "Arm");
    let lamp = row(&editor, &registry, "Lamp");

    let verdict = editor.validate_drop(&registry, &[arm], arm);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Cannot attach Arm to itself.");

    let verdict = editor.validate_drop(&registry, &[arm], lamp);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(
        verdict.message,
        "Cannot attach Arm to Lamp because Lamp is already attached to Arm."
    );
}

#[test]
fn static_components_cannot_go_under_movable_ones() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let arm = scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    scene_component(&mut registry, actor, "Anchor", Mobility::Static);
    // The mobility gate must fire before the child-attachment gate.
    registry.component_mut(arm).expect("arm").allows_child_attachment = false;
    let editor = instance_editor(&mut registry, actor);

    let anchor = row(&editor, &registry, "Anchor");
    let arm = row(&editor, &registry, "Arm");
    let verdict = editor.validate_drop(&registry, &[anchor], arm);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Cannot attach Static components to movable ones.");
}

#[test]
fn stationary_components_cannot_go_under_movable_ones() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    scene_component(&mut registry, actor, "Beacon", Mobility::Stationary);
    let editor = instance_editor(&mut registry, actor);

    let beacon = row(&editor, &registry, "Beacon");
    let arm = row(&editor, &registry, "Arm");
    let verdict = editor.validate_drop(&registry, &[beacon], arm);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Cannot attach Stationary components to Movable ones.");
}

#[test]
fn movable_components_attach_under_static_ones() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Anchor", Mobility::Static);
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let anchor = row(&editor, &registry, "Anchor");
    let verdict = editor.validate_drop(&registry, &[lamp], anchor);
    assert_eq!(verdict.action, DropAction::AttachTo);
    assert_eq!(verdict.message, "Attach Lamp to Anchor.");
}

#[test]
fn static_drop_on_a_movable_default_root_offers_only_root_replacement() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Anchor", Mobility::Static);
    let editor = instance_editor(&mut registry, actor);

    let anchor = row(&editor, &registry, "Anchor");
    let root = row(&editor, &registry, "DefaultSceneRoot");
    let verdict = editor.validate_drop(&registry, &[anchor], root);
    assert_eq!(verdict.action, DropAction::MakeNewRoot);
    assert_eq!(verdict.message, "Make Anchor the new scene root.");
}

#[test]
fn movable_drop_on_the_default_root_offers_both_choices() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let arm = scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    let lamp = scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    registry.attach_component(lamp, arm, false).expect("attach lamp");
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let root = row(&editor, &registry, "DefaultSceneRoot");
    let verdict = editor.validate_drop(&registry, &[lamp], root);
    assert_eq!(verdict.action, DropAction::AttachToOrMakeNewRoot);
    assert_eq!(
        verdict.message,
        "Attach Lamp to DefaultSceneRoot, or make it the new scene root."
    );
}

#[test]
fn multiple_rows_cannot_replace_the_root() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let arm = row(&editor, &registry, "Arm");
    let lamp = row(&editor, &registry, "Lamp");
    let root = row(&editor, &registry, "DefaultSceneRoot");
    let verdict = editor.validate_drop(&registry, &[arm, lamp], root);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Cannot replace the scene root with multiple components.");
}

#[test]
fn direct_children_offer_detach_on_their_parent() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let arm = scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    let lamp = scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    registry.attach_component(lamp, arm, false).expect("attach lamp");
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let arm = row(&editor, &registry, "Arm");
    let verdict = editor.validate_drop(&registry, &[lamp], arm);
    assert_eq!(verdict.action, DropAction::DetachFrom);
    assert_eq!(verdict.message, "Detach Lamp from Arm.");
}

#[test]
fn editor_only_targets_refuse_game_components() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let gizmo = scene_component(&mut registry, actor, "Gizmo", Mobility::Movable);
    registry.component_mut(gizmo).expect("gizmo").editor_only = true;
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let gizmo = row(&editor, &registry, "Gizmo");
    let verdict = editor.validate_drop(&registry, &[lamp], gizmo);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(verdict.message, "Cannot re-parent game components under editor-only ones.");
}

#[test]
fn user_construction_script_products_refuse_children() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let widget = scene_component(&mut registry, actor, "Widget", Mobility::Movable);
    registry.component_mut(widget).expect("widget").creation_method =
        CreationMethod::UserConstructionScript;
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let widget = row(&editor, &registry, "Widget");
    let verdict = editor.validate_drop(&registry, &[lamp], widget);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(
        verdict.message,
        "Cannot attach to components created by a user construction script."
    );
}

#[test]
fn post_construction_native_components_refuse_children() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let probe = scene_component(&mut registry, actor, "Probe", Mobility::Movable);
    registry.component_mut(probe).expect("probe").creation_method = CreationMethod::Native;
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let editor = instance_editor(&mut registry, actor);

    let lamp = row(&editor, &registry, "Lamp");
    let probe = row(&editor, &registry, "Probe");
    let verdict = editor.validate_drop(&registry, &[lamp], probe);
    assert_eq!(verdict.action, DropAction::None);
    assert_eq!(
        verdict.message,
        "Cannot attach to native components that were created after construction."
    );
}

#[test]
fn attach_drop_keeps_the_world_transform() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let arm = scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    if let Some(scene) = registry.component_mut(arm).and_then(|c| c.scene.as_mut()) {
        scene.translation = Vec3::new(1.0, 0.0, 0.0);
    }
    let lamp = scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    if let Some(scene) = registry.component_mut(lamp).and_then(|c| c.scene.as_mut()) {
        scene.translation = Vec3::new(3.0, 4.0, 5.0);
    }
    let mut editor = instance_editor(&mut registry, actor);

    let lamp_row = row(&editor, &registry, "Lamp");
    let arm_row = row(&editor, &registry, "Arm");
    editor
        .perform_drop(&mut registry, &[lamp_row], arm_row, DropAction::AttachTo)
        .expect("drop");

    let scene = registry.component(lamp).and_then(|c| c.scene.as_ref()).expect("scene");
    assert_eq!(scene.attach_parent, Some(arm));
    assert_eq!(scene.translation, Vec3::new(2.0, 4.0, 5.0));
    let (world, _, _) = registry.world_transform(lamp).expect("world");
    assert_eq!(world, Vec3::new(3.0, 4.0, 5.0));

    // The dropped component stays selected in the rebuilt tree.
    let lamp_row = row(&editor, &registry, "Lamp");
    assert_eq!(editor.selected(), &[lamp_row]);
}

#[test]
fn replacing_the_default_root_destroys_it() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    let pillar = scene_component(&mut registry, actor, "Pillar", Mobility::Movable);
    if let Some(scene) = registry.component_mut(pillar).and_then(|c| c.scene.as_mut()) {
        scene.translation = Vec3::new(7.0, 0.0, 0.0);
    }
    let mut editor = instance_editor(&mut registry, actor);

    let pillar_row = row(&editor, &registry, "Pillar");
    let root_row = row(&editor, &registry, "DefaultSceneRoot");
    editor
        .perform_drop(&mut registry, &[pillar_row], root_row, DropAction::MakeNewRoot)
        .expect("drop");

    assert!(registry.component_by_name(actor, "DefaultSceneRoot").is_none());
    assert_eq!(registry.actor(actor).expect("actor").root_component, Some(pillar));
    let scene = registry.component(pillar).and_then(|c| c.scene.as_ref()).expect("scene");
    assert_eq!(scene.attach_parent, None);
    assert_eq!(scene.translation, Vec3::new(7.0, 0.0, 0.0));

    let root = editor.root().expect("root row");
    let new_root_row = editor.arena().scene_root(root).expect("scene root row");
    assert_eq!(editor.arena().display_string(new_root_row, &registry), "Pillar");
}

#[test]
fn drops_open_and_close_named_transactions() {
    let mut registry = ObjectRegistry::new();
    let actor = prop_actor(&mut registry);
    scene_component(&mut registry, actor, "Arm", Mobility::Movable);
    scene_component(&mut registry, actor, "Lamp", Mobility::Movable);
    let log = TransactionLog::new();
    let mut editor = RuntimeTreeEditor::new(
        EditorMode::ActorInstance,
        InspectorConfig::default(),
        log.clone(),
    );
    editor.set_actor(&mut registry, Some(actor));

    let lamp = row(&editor, &registry, "Lamp");
    let arm = row(&editor, &registry, "Arm");
    editor.perform_drop(&mut registry, &[lamp], arm, DropAction::AttachTo).expect("attach");

    let pillar = row(&editor, &registry, "Arm");
    let root = row(&editor, &registry, "DefaultSceneRoot");
    editor
        .perform_drop(&mut registry, &[pillar], root, DropAction::MakeNewRoot)
        .expect("new root");

    assert!(log.opened().contains(&"Attach Component(s)".to_string()));
    assert!(log.opened().contains(&"Make New Scene Root".to_string()));
    assert_eq!(log.open_count(), 0);
    assert_eq!(log.opened().len(), log.closed().len());
}
