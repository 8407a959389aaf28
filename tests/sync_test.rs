// Reconciliation of live trees against fresh renderings.

use markup_core::error::RegistryError;
use markup_core::{ChangeKind, Component, ComponentHandle, Engine, MarkupError, NodeKey, NodeKind, Schema};

#[derive(Default)]
struct Badge {
    count: i64,
    clicks: u32,
}

impl Component for Badge {
    fn render(&self) -> &str {
        "<b>{{.Count}}</b>"
    }

    fn schema() -> Schema<Self> {
        Schema::new().field("Count", |b: &Badge| &b.count, |b: &mut Badge| &mut b.count)
    }
}

#[derive(Default)]
struct Pill {
    count: i64,
}

impl Component for Pill {
    fn render(&self) -> &str {
        "<em>{{.Count}}</em>"
    }

    fn schema() -> Schema<Self> {
        Schema::new().field("Count", |p: &Pill| &p.count, |p: &mut Pill| &mut p.count)
    }
}

struct Counter {
    count: i64,
    active: bool,
    kind: String,
}

impl Component for Counter {
    fn render(&self) -> &str {
        r#"<div class="{{if .Active}}on{{else}}off{{end}}">
             <p>{{.Count}}</p>
             {{if eq .Kind "input"}}<input type="text" />{{else}}<Badge Count="{{.Count}}" />{{end}}
           </div>"#
    }

    fn schema() -> Schema<Self> {
        Schema::new()
            .field("Count", |c: &Counter| &c.count, |c: &mut Counter| &mut c.count)
            .field("Active", |c: &Counter| &c.active, |c: &mut Counter| &mut c.active)
            .field("Kind", |c: &Counter| &c.kind, |c: &mut Counter| &mut c.kind)
    }
}

struct List {
    items: Vec<String>,
}

impl Component for List {
    fn render(&self) -> &str {
        "<ul>{{range .Items}}<li>{{.}}</li>{{end}}</ul>"
    }

    fn schema() -> Schema<Self> {
        Schema::new().field("Items", |l: &List| &l.items, |l: &mut List| &mut l.items)
    }
}

struct Dynamic {
    markup: String,
    bold: bool,
}

impl Component for Dynamic {
    fn render(&self) -> &str {
        &self.markup
    }

    fn schema() -> Schema<Self> {
        Schema::new().field("Bold", |d: &Dynamic| &d.bold, |d: &mut Dynamic| &mut d.bold)
    }
}

fn mounted_counter(kind: &str) -> (Engine, ComponentHandle, NodeKey) {
    let mut engine = Engine::new();
    engine.register("Badge", Badge::default);
    let counter = engine.add(Counter {
        count: 1,
        active: false,
        kind: kind.to_string(),
    });
    let context = engine.new_context();
    let root = engine.mount(counter, context).unwrap();
    (engine, counter, root)
}

fn child(engine: &Engine, key: NodeKey, index: usize) -> NodeKey {
    engine.node(key).unwrap().children()[index]
}

#[test]
fn test_unchanged_render_yields_no_change() {
    let (mut engine, counter, root) = mounted_counter("input");
    let ids_before: Vec<_> = engine.node(root).unwrap().children().to_vec();
    let changes = engine.synchronize(counter).unwrap();
    assert!(changes.is_empty());
    assert_eq!(engine.node(root).unwrap().children(), ids_before.as_slice());
}

#[test]
fn test_attribute_only_change() {
    let (mut engine, counter, root) = mounted_counter("input");
    let root_id = engine.node(root).unwrap().id();
    engine.component_mut::<Counter>(counter).unwrap().active = true;

    let changes = engine.synchronize(counter).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, root);
    assert_eq!(changes[0].kind, ChangeKind::Attributes);
    assert_eq!(changes[0].id, root_id);
    assert_eq!(engine.node(root).unwrap().attributes().get("class"), Some("on"));
}

#[test]
fn test_text_change() {
    let (mut engine, counter, root) = mounted_counter("input");
    let text = child(&engine, child(&engine, root, 0), 0);
    let id = engine.node(text).unwrap().id();
    engine.component_mut::<Counter>(counter).unwrap().count = 2;

    let changes = engine.synchronize(counter).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, text);
    assert_eq!(changes[0].kind, ChangeKind::Text);
    assert!(changes[0].kind.is_lightweight());
    assert_eq!(engine.node(text).unwrap().text(), Some("2"));
    assert_eq!(engine.node(text).unwrap().id(), id);
}

#[test]
fn test_element_to_component_transition() {
    let (mut engine, counter, root) = mounted_counter("input");
    let slot = child(&engine, root, 1);
    let old_id = engine.node(slot).unwrap().id().unwrap();
    assert_eq!(engine.mounted_count(), 1);

    engine.component_mut::<Counter>(counter).unwrap().kind = "badge".to_string();
    let changes = engine.synchronize(counter).unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, slot);
    assert_eq!(changes[0].kind, ChangeKind::Replaced);
    let node = engine.node(slot).unwrap();
    assert_eq!(node.kind(), NodeKind::Component);
    assert_eq!(node.tag(), "Badge");
    assert_eq!(node.parent(), Some(root));
    assert_eq!(node.owner(), counter);
    let new_id = node.id().unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(changes[0].id, Some(new_id));
    assert_eq!(engine.node_by_id(old_id), None);
    assert_eq!(engine.node_by_id(new_id), Some(slot));

    let badge = node.bound_component().unwrap();
    assert!(engine.is_mounted(badge));
    assert_eq!(engine.component::<Badge>(badge).unwrap().count, 1);
    assert_eq!(engine.mounted_count(), 2);
}

#[test]
fn test_component_to_element_transition() {
    let (mut engine, counter, root) = mounted_counter("badge");
    let slot = child(&engine, root, 1);
    let badge = engine.node(slot).unwrap().bound_component().unwrap();
    let nodes_before = engine.node_count();

    engine.component_mut::<Counter>(counter).unwrap().kind = "input".to_string();
    let changes = engine.synchronize(counter).unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Replaced);
    let node = engine.node(slot).unwrap();
    assert_eq!(node.kind(), NodeKind::Html);
    assert_eq!(node.tag(), "input");
    assert_eq!(node.bound_component(), None);
    assert!(!engine.is_mounted(badge));
    assert!(engine.component::<Badge>(badge).is_none());
    // The badge's <b> and its text are gone.
    assert_eq!(engine.node_count(), nodes_before - 2);
}

#[test]
fn test_child_component_is_rebound_and_keeps_state() {
    let (mut engine, counter, root) = mounted_counter("badge");
    let slot = child(&engine, root, 1);
    let badge = engine.node(slot).unwrap().bound_component().unwrap();
    engine.component_mut::<Badge>(badge).unwrap().clicks = 7;

    engine.component_mut::<Counter>(counter).unwrap().count = 5;
    let changes = engine.synchronize(counter).unwrap();

    // The counter's own <p> text and the badge's <b> text.
    assert_eq!(changes.len(), 2);
    assert!(changes.iter().all(|c| c.kind == ChangeKind::Text));
    let badge_root = engine.root_of(badge).unwrap();
    assert_eq!(changes[1].node, child(&engine, badge_root, 0));

    assert_eq!(engine.node(slot).unwrap().bound_component(), Some(badge));
    let state = engine.component::<Badge>(badge).unwrap();
    assert_eq!(state.count, 5);
    assert_eq!(state.clicks, 7);
    assert_eq!(engine.node(slot).unwrap().attributes().get("Count"), Some("5"));
}

#[test]
fn test_child_count_change_rebuilds_children() {
    let mut engine = Engine::new();
    let list = engine.add(List {
        items: vec!["a".to_string()],
    });
    let context = engine.new_context();
    let root = engine.mount(list, context).unwrap();
    let root_id = engine.node(root).unwrap().id();
    let old_item = child(&engine, root, 0);

    engine
        .component_mut::<List>(list)
        .unwrap()
        .items
        .push("b".to_string());
    let changes = engine.synchronize(list).unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, root);
    assert_eq!(changes[0].kind, ChangeKind::Children);
    assert_eq!(engine.node(root).unwrap().id(), root_id);
    assert_eq!(engine.node(root).unwrap().children().len(), 2);
    assert!(engine.node(old_item).is_none());
    // ul, 2 x (li, text)
    assert_eq!(engine.node_count(), 5);
}

#[test]
fn test_text_to_element_transition() {
    let mut engine = Engine::new();
    let dynamic = engine.add(Dynamic {
        markup: "<p>{{if .Bold}}<b>x</b>{{else}}x{{end}}</p>".to_string(),
        bold: false,
    });
    let context = engine.new_context();
    let root = engine.mount(dynamic, context).unwrap();
    let leaf = child(&engine, root, 0);
    assert_eq!(engine.node(leaf).unwrap().kind(), NodeKind::Text);

    engine.component_mut::<Dynamic>(dynamic).unwrap().bold = true;
    let changes = engine.synchronize(dynamic).unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, leaf);
    assert_eq!(changes[0].kind, ChangeKind::Replaced);
    let node = engine.node(leaf).unwrap();
    assert_eq!(node.kind(), NodeKind::Html);
    assert_eq!(node.tag(), "b");
    assert_eq!(node.children().len(), 1);
    assert_eq!(node.context(), context);
}

#[test]
fn test_failed_synchronize_propagates() {
    let mut engine = Engine::new();
    let dynamic = engine.add(Dynamic {
        markup: "<p>ok</p>".to_string(),
        bold: false,
    });
    let context = engine.new_context();
    engine.mount(dynamic, context).unwrap();

    engine.component_mut::<Dynamic>(dynamic).unwrap().markup = "<p>{{.Nope}}</p>".to_string();
    assert!(matches!(
        engine.synchronize(dynamic),
        Err(MarkupError::Template(_))
    ));

    engine.component_mut::<Dynamic>(dynamic).unwrap().markup = "<p><i></p>".to_string();
    assert!(matches!(
        engine.synchronize(dynamic),
        Err(MarkupError::Decode(_))
    ));

    engine.component_mut::<Dynamic>(dynamic).unwrap().markup = "<div><Missing /></div>".to_string();
    assert!(matches!(
        engine.synchronize(dynamic),
        Err(MarkupError::Registry(RegistryError::Unregistered { .. }))
    ));

    engine.component_mut::<Dynamic>(dynamic).unwrap().markup = "<Badge />".to_string();
    assert!(matches!(
        engine.synchronize(dynamic),
        Err(MarkupError::Registry(RegistryError::RootNotStandard { .. }))
    ));
}

#[test]
fn test_synchronize_requires_mount() {
    let mut engine = Engine::new();
    let list = engine.add(List { items: Vec::new() });
    assert!(matches!(
        engine.synchronize(list),
        Err(MarkupError::Registry(RegistryError::NotMounted { .. }))
    ));
}

fn mounted_dynamic(markup: &str) -> (Engine, ComponentHandle, NodeKey) {
    let mut engine = Engine::new();
    engine.register("Badge", Badge::default);
    engine.register("Pill", Pill::default);
    let dynamic = engine.add(Dynamic {
        markup: markup.to_string(),
        bold: false,
    });
    let context = engine.new_context();
    let root = engine.mount(dynamic, context).unwrap();
    (engine, dynamic, root)
}

#[test]
fn test_component_tag_switch_mounts_a_new_component() {
    let (mut engine, dynamic, root) = mounted_dynamic(r#"<div><Badge Count="3" /></div>"#);
    let slot = child(&engine, root, 0);
    let badge = engine.node(slot).unwrap().bound_component().unwrap();
    // div, anchor, <b> and its text
    assert_eq!(engine.node_count(), 4);

    engine.component_mut::<Dynamic>(dynamic).unwrap().markup = r#"<div><Pill Count="3" /></div>"#.to_string();
    let changes = engine.synchronize(dynamic).unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, slot);
    assert_eq!(changes[0].kind, ChangeKind::Replaced);
    let node = engine.node(slot).unwrap();
    assert_eq!(node.kind(), NodeKind::Component);
    assert_eq!(node.tag(), "Pill");
    let pill = node.bound_component().unwrap();
    assert_ne!(pill, badge);
    assert!(engine.component::<Badge>(badge).is_none());
    assert_eq!(engine.component::<Pill>(pill).unwrap().count, 3);
    assert_eq!(engine.mounted_count(), 2);
    assert_eq!(engine.node_count(), 4);
}

#[test]
fn test_element_tag_switch_keeps_identity() {
    let (mut engine, dynamic, root) = mounted_dynamic("<div><section><p>a</p></section></div>");
    let slot = child(&engine, root, 0);
    let id = engine.node(slot).unwrap().id();
    let old_p = child(&engine, slot, 0);

    engine.component_mut::<Dynamic>(dynamic).unwrap().markup =
        "<div><article><p>a</p></article></div>".to_string();
    let changes = engine.synchronize(dynamic).unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].node, slot);
    assert_eq!(changes[0].kind, ChangeKind::Children);
    assert_eq!(changes[0].id, id);
    let node = engine.node(slot).unwrap();
    assert_eq!(node.tag(), "article");
    assert_eq!(node.id(), id);
    assert_eq!(node.children().len(), 1);
    assert!(engine.node(old_p).is_none());
    let p = child(&engine, slot, 0);
    assert_eq!(engine.node(child(&engine, p, 0)).unwrap().text(), Some("a"));
    assert_eq!(engine.node_count(), 4);
}
