use runtime_inspector::config::InspectorConfig;
use runtime_inspector::editor::{EditorMode, RenameError, RuntimeTreeEditor};
use runtime_inspector::events::InspectorEvent;
use runtime_inspector::registry::{ActorId, ClassId, ObjectRegistry, SceneData, ScriptParent};
use runtime_inspector::transaction::TransactionLog;

fn turret_class(registry: &mut ObjectRegistry) -> ClassId {
    let class = registry.register_class("TurretActor", None);
    registry
        .add_script_node(
            class,
            "Barrel",
            "StaticMeshComponent",
            Some(SceneData::default()),
            ScriptParent::Root,
        )
        .expect("script node");
    class
}

fn editor_for(
    registry: &mut ObjectRegistry,
    actor: ActorId,
    log: &TransactionLog,
) -> RuntimeTreeEditor {
    let mut editor = RuntimeTreeEditor::new(
        EditorMode::ActorInstance,
        InspectorConfig::default(),
        log.clone(),
    );
    editor.set_actor(registry, Some(actor));
    editor
}

#[test]
fn renaming_to_the_current_name_is_a_quiet_no_op() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let log = TransactionLog::new();
    let mut editor = editor_for(&mut registry, actor, &log);

    let lamp = registry
        .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
        .expect("lamp");
    editor.update_tree(&mut registry, true);
    let lamp_row = editor.node_from_component(&registry, lamp, false).expect("lamp row");

    editor.complete_rename(&mut registry, lamp_row, "Lamp").expect("no-op rename");
    assert_eq!(registry.component(lamp).expect("lamp").name, "Lamp");
    assert!(!log.opened().contains(&"Rename Component Variable".to_string()));
}

#[test]
fn rename_collisions_keep_the_old_name() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let mut editor = editor_for(&mut registry, actor, &TransactionLog::new());

    let lamp = registry
        .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
        .expect("lamp");
    registry
        .add_instance_component(actor, "Horn", "AudioComponent", None)
        .expect("horn");
    editor.update_tree(&mut registry, true);
    let lamp_row = editor.node_from_component(&registry, lamp, false).expect("lamp row");

    let result = editor.complete_rename(&mut registry, lamp_row, "Horn");
    assert!(matches!(result, Err(RenameError::NameTaken(_))));
    assert_eq!(registry.component(lamp).expect("lamp").name, "Lamp");

    let result = editor.complete_rename(&mut registry, lamp_row, "   ");
    assert_eq!(result, Err(RenameError::EmptyName));
    assert_eq!(registry.component(lamp).expect("lamp").name, "Lamp");
}

#[test]
fn variable_rename_follows_script_node_template_and_instances() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let mut editor = editor_for(&mut registry, actor, &TransactionLog::new());

    let barrel = registry.component_by_name(actor, "Barrel").expect("barrel instance");
    let barrel_row = editor.node_from_component(&registry, barrel, false).expect("barrel row");
    editor.complete_rename(&mut registry, barrel_row, "Cannon").expect("rename");

    assert_eq!(registry.component(barrel).expect("instance").name, "Cannon");
    assert!(registry.component_by_name(actor, "Barrel").is_none());
    assert_eq!(editor.arena().display_string(barrel_row, &registry), "Cannon");

    // The script itself carries the new variable name for future spawns.
    let fresh = registry.spawn_actor(class, "Turret1").expect("spawn fresh");
    assert!(registry.component_by_name(fresh, "Cannon").is_some());
}

#[test]
fn duplicate_hands_its_transaction_to_the_inline_rename() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let log = TransactionLog::new();
    let mut editor = editor_for(&mut registry, actor, &log);

    let lamp = registry
        .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
        .expect("lamp");
    editor.update_tree(&mut registry, true);
    let lamp_row = editor.node_from_component(&registry, lamp, false).expect("lamp row");
    editor.set_selection(vec![lamp_row]);

    let new_row = editor.duplicate_node(&mut registry, lamp_row).expect("duplicate");
    assert_eq!(editor.arena().display_string(new_row, &registry), "Lamp_1");
    assert_eq!(log.open_count(), 1);

    editor.events.drain();
    editor.on_item_scrolled_into_view(new_row);
    let rename_requested = editor
        .events
        .drain()
        .iter()
        .any(|e| matches!(e, InspectorEvent::RenameRequested { node } if *node == new_row));
    assert!(rename_requested);
    // The creation transaction now lives on the row.
    assert_eq!(log.open_count(), 1);

    editor.complete_rename(&mut registry, new_row, "HeadLamp").expect("rename");
    assert_eq!(log.open_count(), 0);
    assert!(log.closed().contains(&"Duplicate Component".to_string()));
    let clone = registry.component_by_name(actor, "HeadLamp").expect("clone");
    let parent = registry
        .component(clone)
        .and_then(|c| c.scene.as_ref())
        .and_then(|s| s.attach_parent);
    let original_parent = registry
        .component(lamp)
        .and_then(|c| c.scene.as_ref())
        .and_then(|s| s.attach_parent);
    assert_eq!(parent, original_parent);
}

#[test]
fn an_unscrolled_rename_request_abandons_its_transaction_at_frame_end() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let log = TransactionLog::new();
    let mut editor = editor_for(&mut registry, actor, &log);

    let lamp = registry
        .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
        .expect("lamp");
    editor.update_tree(&mut registry, true);
    let lamp_row = editor.node_from_component(&registry, lamp, false).expect("lamp row");
    editor.set_selection(vec![lamp_row]);

    editor.duplicate_node(&mut registry, lamp_row).expect("duplicate");
    assert_eq!(log.open_count(), 1);
    editor.post_tick();
    assert_eq!(log.open_count(), 0);
}

#[test]
fn component_rename_requests_target_the_selected_row() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let mut editor = editor_for(&mut registry, actor, &TransactionLog::new());

    let lamp = registry
        .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
        .expect("lamp");
    let horn = registry
        .add_instance_component(actor, "Horn", "PointLightComponent", Some(SceneData::default()))
        .expect("horn");
    editor.update_tree(&mut registry, true);
    let lamp_row = editor.node_from_component(&registry, lamp, false).expect("lamp row");

    // A request for a component that is not the selection is ignored.
    editor.set_selection(vec![lamp_row]);
    assert!(!editor.on_component_request_rename(&registry, horn));
    editor.events.drain();

    assert!(editor.on_component_request_rename(&registry, lamp));
    let scrolled = editor
        .events
        .drain()
        .iter()
        .any(|e| matches!(e, InspectorEvent::ScrollIntoView { node } if *node == lamp_row));
    assert!(scrolled);
    editor.on_item_scrolled_into_view(lamp_row);
    let rename_requested = editor
        .events
        .drain()
        .iter()
        .any(|e| matches!(e, InspectorEvent::RenameRequested { node } if *node == lamp_row));
    assert!(rename_requested);
}

#[test]
fn rename_requests_need_exactly_one_selected_row() {
    let mut registry = ObjectRegistry::new();
    let class = turret_class(&mut registry);
    let actor = registry.spawn_actor(class, "Turret0").expect("spawn");
    let log = TransactionLog::new();
    let mut editor = editor_for(&mut registry, actor, &log);

    let lamp = registry
        .add_instance_component(actor, "Lamp", "PointLightComponent", Some(SceneData::default()))
        .expect("lamp");
    let horn = registry
        .add_instance_component(actor, "Horn", "PointLightComponent", Some(SceneData::default()))
        .expect("horn");
    editor.update_tree(&mut registry, true);
    let lamp_row = editor.node_from_component(&registry, lamp, false).expect("lamp row");
    let horn_row = editor.node_from_component(&registry, horn, false).expect("horn row");
    editor.set_selection(vec![lamp_row, horn_row]);

    let transaction = log.begin("Add Component");
    assert!(!editor.on_rename_component(Some(transaction)));
    // The handed-over transaction was dropped, not leaked.
    assert_eq!(log.open_count(), 0);
}
