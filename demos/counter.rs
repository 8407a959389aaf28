use markup_core::{Component, Engine, Schema};

#[derive(Default)]
struct Display {
    value: i64,
}

impl Component for Display {
    fn render(&self) -> &str {
        r#"<span class="{{if lt .Value 0}}negative{{end}}">{{.Value}}</span>"#
    }

    fn schema() -> Schema<Self> {
        Schema::new().field("Value", |d: &Display| &d.value, |d: &mut Display| &mut d.value)
    }
}

#[derive(Default)]
struct Counter {
    count: i64,
}

impl Component for Counter {
    fn render(&self) -> &str {
        r#"<div class="counter">
            <button _onclick="Decrement">-</button>
            <Display Value="{{.Count}}" />
            <button _onclick="Increment">+</button>
        </div>"#
    }

    fn schema() -> Schema<Self> {
        Schema::new()
            .field("Count", |c: &Counter| &c.count, |c: &mut Counter| &mut c.count)
            .method0("Increment", |c: &mut Counter| c.count += 1)
            .method0("Decrement", |c: &mut Counter| c.count -= 1)
    }
}

fn main() -> miette::Result<()> {
    let mut engine = Engine::new();
    engine.register("Display", Display::default);

    let counter = engine.add(Counter::default());
    let window = engine.new_context();
    let root = engine.mount(counter, window)?;
    println!("{}\n", engine.component_to_text(counter)?);

    // A driver would get this id back from the serialized `CallEvent(...)`.
    let minus = engine.node(root).and_then(|div| div.children().first().copied());
    let Some(minus) = minus.and_then(|key| engine.node(key)).and_then(|node| node.id()) else {
        return Ok(());
    };

    for _ in 0..2 {
        engine.dispatch(minus, "Decrement", "")?;
        for change in engine.synchronize(counter)? {
            println!("{:?} -> {}", change.kind, engine.to_text(change.node)?);
        }
    }
    Ok(())
}
