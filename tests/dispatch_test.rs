use markup_core::error::DispatchError;
use markup_core::{
    ChangeKind, Component, ComponentHandle, Dispatched, Engine, FieldKind, MarkupError, Schema, Uid,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Address {
    city: String,
    street: String,
    zip: Option<u32>,
}

#[derive(Default)]
struct Form {
    name: String,
    age: u32,
    address: Address,
    home: Option<Address>,
    tags: HashMap<String, String>,
    scores: BTreeMap<String, i64>,
    clicks: u32,
}

impl Component for Form {
    fn render(&self) -> &str {
        r#"<form><button _onclick="Click">{{.Name}}</button><Stepper /></form>"#
    }

    fn schema() -> Schema<Self> {
        Schema::new()
            .field("Name", |f: &Form| &f.name, |f: &mut Form| &mut f.name)
            .field("Age", |f: &Form| &f.age, |f: &mut Form| &mut f.age)
            .field_as("Address", FieldKind::Struct, |f: &Form| &f.address, |f: &mut Form| &mut f.address)
            .optional_record("Home", |f: &Form| &f.home, |f: &mut Form| &mut f.home)
            .field("Tags", |f: &Form| &f.tags, |f: &mut Form| &mut f.tags)
            .field("Scores", |f: &Form| &f.scores, |f: &mut Form| &mut f.scores)
            .method0("Click", |f: &mut Form| f.clicks += 1)
            .method1("Add", |f: &mut Form, n: u32| f.clicks += n)
            .method1("Rename", |f: &mut Form, name: String| f.name = name)
            .method_raw("Move", 2, |_: &mut Form, _| Ok(()))
    }
}

#[derive(Default)]
struct Stepper {
    step: i32,
}

impl Component for Stepper {
    fn render(&self) -> &str {
        r#"<span _onclick="Step">{{.Step}}</span>"#
    }

    fn schema() -> Schema<Self> {
        Schema::new()
            .field("Step", |s: &Stepper| &s.step, |s: &mut Stepper| &mut s.step)
            .method0("Step", |s: &mut Stepper| s.step += 1)
    }
}

struct Fixture {
    engine: Engine,
    form: ComponentHandle,
    button: Uid,
}

impl Fixture {
    fn new() -> Self {
        let mut engine = Engine::new();
        engine.register("Stepper", Stepper::default);
        let form = engine.add(Form {
            name: "Ann".to_string(),
            ..Form::default()
        });
        let context = engine.new_context();
        let root = engine.mount(form, context).unwrap();
        let button = engine.node(root).unwrap().children()[0];
        let button = engine.node(button).unwrap().id().unwrap();
        Self {
            engine,
            form,
            button,
        }
    }

    fn dispatch(&mut self, target: &str, payload: &str) -> Result<Dispatched, MarkupError> {
        self.engine.dispatch(self.button, target, payload)
    }

    fn set(&mut self, target: &str, text: &str) -> Result<Dispatched, MarkupError> {
        let payload = serde_json::json!({ "Value": text }).to_string();
        self.dispatch(target, &payload)
    }

    fn state(&self) -> &Form {
        self.engine.component::<Form>(self.form).unwrap()
    }
}

#[test]
fn test_methods() {
    let mut fx = Fixture::new();
    assert_eq!(fx.dispatch("Click", "").unwrap(), Dispatched::Method);
    assert_eq!(fx.dispatch("Add", "5").unwrap(), Dispatched::Method);
    assert_eq!(fx.state().clicks, 6);
    fx.dispatch("Rename", r#""Bob""#).unwrap();
    assert_eq!(fx.state().name, "Bob");
}

#[test]
fn test_method_payload_errors() {
    let mut fx = Fixture::new();
    assert!(matches!(
        fx.dispatch("Add", r#""five""#),
        Err(MarkupError::Dispatch(DispatchError::Payload { .. }))
    ));
    match fx.dispatch("Move", "[1, 2]") {
        Err(MarkupError::Dispatch(DispatchError::TooManyParameters { method, arity, .. })) => {
            assert_eq!(method, "Move");
            assert_eq!(arity, 2);
        }
        other => panic!("expected too many parameters, got {other:?}"),
    }
}

#[test]
fn test_scalar_fields() {
    let mut fx = Fixture::new();
    assert_eq!(fx.set("Name", "Alice").unwrap(), Dispatched::Field);
    assert_eq!(fx.state().name, "Alice");
    // String fields take the text verbatim, even if it looks like JSON.
    fx.set("Name", "42").unwrap();
    assert_eq!(fx.state().name, "42");

    fx.set("Age", "42").unwrap();
    assert_eq!(fx.state().age, 42);
    assert!(matches!(
        fx.set("Age", "old"),
        Err(MarkupError::Dispatch(DispatchError::Payload { .. }))
    ));
    assert!(matches!(
        fx.set("Age", "-1"),
        Err(MarkupError::Dispatch(DispatchError::Payload { .. }))
    ));
    assert_eq!(fx.state().age, 42);
}

#[test]
fn test_field_payload_must_be_an_object() {
    let mut fx = Fixture::new();
    assert!(matches!(
        fx.dispatch("Name", "\"Alice\""),
        Err(MarkupError::Dispatch(DispatchError::Payload { .. }))
    ));
}

#[test]
fn test_nested_struct_paths() {
    let mut fx = Fixture::new();
    fx.set("Address.city", "Paris").unwrap();
    fx.set("Address.zip", "75001").unwrap();
    assert_eq!(
        fx.state().address,
        Address {
            city: "Paris".to_string(),
            street: String::new(),
            zip: Some(75001)
        }
    );

    match fx.set("Address.country", "FR") {
        Err(MarkupError::Dispatch(DispatchError::Path { message, .. })) => {
            assert_eq!(message, "no field named country");
        }
        other => panic!("expected path error, got {other:?}"),
    }
    assert!(matches!(
        fx.set("Age.years", "3"),
        Err(MarkupError::Dispatch(DispatchError::Path { .. }))
    ));
}

#[test]
fn test_absent_record_is_created() {
    let mut fx = Fixture::new();
    assert_eq!(fx.state().home, None);
    fx.set("Home.city", "Rome").unwrap();
    assert_eq!(
        fx.state().home,
        Some(Address {
            city: "Rome".to_string(),
            street: String::new(),
            zip: None
        })
    );
    fx.set("Home.street", "Via Appia").unwrap();
    assert_eq!(fx.state().home.as_ref().unwrap().city, "Rome");
    assert_eq!(fx.state().home.as_ref().unwrap().street, "Via Appia");
}

#[test]
fn test_map_entries_are_created() {
    let mut fx = Fixture::new();
    fx.set("Tags.color", "red").unwrap();
    fx.set("Tags.size", "10").unwrap();
    fx.set("Scores.ann", "10").unwrap();
    assert_eq!(fx.state().tags["color"], "red");
    assert_eq!(fx.state().tags["size"], "10");
    assert_eq!(fx.state().scores["ann"], 10);
    assert!(matches!(
        fx.set("Scores.bob", "lots"),
        Err(MarkupError::Dispatch(DispatchError::Payload { .. }))
    ));
}

#[test]
fn test_unknown_target_is_not_an_error() {
    let mut fx = Fixture::new();
    assert_eq!(fx.dispatch("Nothing", "{}").unwrap(), Dispatched::Unhandled);
    assert_eq!(fx.dispatch("Nothing.deep", "{}").unwrap(), Dispatched::Unhandled);
    assert_eq!(fx.dispatch("", "garbage").unwrap(), Dispatched::Ignored);
}

#[test]
fn test_unmounted_node_is_an_error() {
    let mut fx = Fixture::new();
    assert!(matches!(
        fx.engine.dispatch(Uid::from_raw(9_999), "Click", ""),
        Err(MarkupError::Dispatch(DispatchError::NotMounted { .. }))
    ));

    fx.engine.dismount(fx.form).unwrap();
    assert!(matches!(
        fx.dispatch("Click", ""),
        Err(MarkupError::Dispatch(DispatchError::NotMounted { .. }))
    ));
    assert_eq!(fx.state().clicks, 0);
}

#[test]
fn test_nodes_dispatch_to_the_component_that_rendered_them() {
    let mut fx = Fixture::new();
    let root = fx.engine.root_of(fx.form).unwrap();
    let anchor = fx.engine.node(root).unwrap().children()[1];
    let stepper = fx.engine.node(anchor).unwrap().bound_component().unwrap();
    let span = fx.engine.root_of(stepper).unwrap();
    let span_id = fx.engine.node(span).unwrap().id().unwrap();

    fx.engine.dispatch(span_id, "Step", "").unwrap();
    assert_eq!(fx.engine.component::<Stepper>(stepper).unwrap().step, 1);
    assert_eq!(fx.state().clicks, 0);
    assert_eq!(
        fx.engine.dispatch(span_id, "Click", "").unwrap(),
        Dispatched::Unhandled
    );
}

#[test]
fn test_dispatch_then_synchronize() {
    let mut fx = Fixture::new();
    fx.set("Name", "Zed").unwrap();
    let changes = fx.engine.synchronize(fx.form).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Text);
    let text = fx.engine.node(changes[0].node).unwrap();
    assert_eq!(text.text(), Some("Zed"));
}
