//! Per-type capability tables.
//!
//! A [`Schema`] lists what the outside world may touch on a component: its
//! bindable fields (read by templates, written by attribute binding and
//! dispatch), read-only computed values for templates, and methods that a
//! driver may invoke. Schemas are built once per type and stored by the
//! engine; no runtime introspection is involved.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Semantic type of a field, driving attribute coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Bool,
    Int,
    Uint,
    Float,
    /// A nested record. Reachable from dispatch through dotted paths.
    Struct,
    /// A string-keyed map. Dispatch creates missing entries.
    Map,
    /// Anything else (sequences, enums...). Not bindable from attributes.
    Other,
}

/// Types usable with [`Schema::field`]. The kind is inferred from the Rust type.
pub trait FieldValue: Serialize + DeserializeOwned {
    const KIND: FieldKind;
}

macro_rules! field_kind {
    ($kind:ident: $($t:ty),*) => {
        $(impl FieldValue for $t {
            const KIND: FieldKind = FieldKind::$kind;
        })*
    };
}

field_kind!(String: String);
field_kind!(Bool: bool);
field_kind!(Int: i8, i16, i32, i64, isize);
field_kind!(Uint: u8, u16, u32, u64, usize);
field_kind!(Float: f32, f64);

/// Timestamps travel as RFC 3339 strings.
impl FieldValue for chrono::DateTime<chrono::Utc> {
    const KIND: FieldKind = FieldKind::Other;
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;
}

impl<T: Serialize + DeserializeOwned> FieldValue for Vec<T> {
    const KIND: FieldKind = FieldKind::Other;
}

impl<V: Serialize + DeserializeOwned> FieldValue for HashMap<String, V> {
    const KIND: FieldKind = FieldKind::Map;
}

impl<V: Serialize + DeserializeOwned> FieldValue for BTreeMap<String, V> {
    const KIND: FieldKind = FieldKind::Map;
}

type Getter<C> = Box<dyn Fn(&C) -> serde_json::Result<Value>>;
type Setter<C> = Box<dyn Fn(&mut C, Value) -> serde_json::Result<()>>;
type Invoker<C> = Box<dyn Fn(&mut C, &str) -> serde_json::Result<()>>;
type Blank = Box<dyn Fn() -> serde_json::Result<Value>>;

struct Field<C> {
    name: String,
    kind: FieldKind,
    get: Getter<C>,
    set: Setter<C>,
    /// Value of a freshly created record, for optional records.
    blank: Option<Blank>,
}

struct Computed<C> {
    name: String,
    get: Box<dyn Fn(&C) -> Value>,
}

struct Method<C> {
    name: String,
    arity: usize,
    invoke: Invoker<C>,
}

/// Capability table of component type `C`.
pub struct Schema<C> {
    type_name: String,
    fields: Vec<Field<C>>,
    computed: Vec<Computed<C>>,
    methods: Vec<Method<C>>,
}

impl<C> fmt::Debug for Schema<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.iter().map(|x| &x.name).collect::<Vec<_>>())
            .field("computed", &self.computed.iter().map(|x| &x.name).collect::<Vec<_>>())
            .field("methods", &self.methods.iter().map(|x| &x.name).collect::<Vec<_>>())
            .finish()
    }
}

impl<C: 'static> Default for Schema<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> Schema<C> {
    pub fn new() -> Self {
        Self {
            type_name: short_type_name::<C>().to_string(),
            fields: Vec::new(),
            computed: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Declares a bindable field whose kind follows from its Rust type.
    pub fn field<T>(
        self,
        name: &str,
        get: impl Fn(&C) -> &T + 'static,
        get_mut: impl Fn(&mut C) -> &mut T + 'static,
    ) -> Self
    where
        T: FieldValue + 'static,
    {
        self.field_as(name, T::KIND, get, get_mut)
    }

    /// Declares a field with an explicit kind, typically [`FieldKind::Struct`]
    /// for nested records.
    pub fn field_as<T>(
        mut self,
        name: &str,
        kind: FieldKind,
        get: impl Fn(&C) -> &T + 'static,
        get_mut: impl Fn(&mut C) -> &mut T + 'static,
    ) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            get: Box::new(move |c: &C| serde_json::to_value(get(c))),
            set: Box::new(move |c: &mut C, value: Value| {
                *get_mut(c) = serde_json::from_value(value)?;
                Ok(())
            }),
            blank: None,
        });
        self
    }

    /// Declares an optional nested record. Dispatching to a dotted path
    /// below an absent record creates it from `T::default()` first.
    pub fn optional_record<T>(
        mut self,
        name: &str,
        get: impl Fn(&C) -> &Option<T> + 'static,
        get_mut: impl Fn(&mut C) -> &mut Option<T> + 'static,
    ) -> Self
    where
        T: Default + Serialize + DeserializeOwned + 'static,
    {
        self = self.field_as(name, FieldKind::Struct, get, get_mut);
        if let Some(field) = self.fields.last_mut() {
            field.blank = Some(Box::new(|| serde_json::to_value(T::default())));
        }
        self
    }

    /// Exposes a read-only value to templates under `name`.
    pub fn computed(mut self, name: &str, get: impl Fn(&C) -> Value + 'static) -> Self {
        self.computed.push(Computed {
            name: name.to_string(),
            get: Box::new(get),
        });
        self
    }

    /// Declares a method taking no argument. The dispatch payload is ignored.
    pub fn method0(mut self, name: &str, method: impl Fn(&mut C) + 'static) -> Self {
        self.methods.push(Method {
            name: name.to_string(),
            arity: 0,
            invoke: Box::new(move |c: &mut C, _: &str| {
                method(c);
                Ok(())
            }),
        });
        self
    }

    /// Declares a method taking one argument decoded from the JSON payload.
    pub fn method1<A>(mut self, name: &str, method: impl Fn(&mut C, A) + 'static) -> Self
    where
        A: DeserializeOwned + 'static,
    {
        self.methods.push(Method {
            name: name.to_string(),
            arity: 1,
            invoke: Box::new(move |c: &mut C, payload: &str| {
                let arg: A = serde_json::from_str(payload)?;
                method(c, arg);
                Ok(())
            }),
        });
        self
    }

    /// Declares a method with an arbitrary parameter count and a raw payload
    /// decoder. Only arities 0 and 1 can be dispatched.
    pub fn method_raw(
        mut self,
        name: &str,
        arity: usize,
        invoke: impl Fn(&mut C, &str) -> serde_json::Result<()> + 'static,
    ) -> Self {
        self.methods.push(Method {
            name: name.to_string(),
            arity,
            invoke: Box::new(invoke),
        });
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.find_field(name).map(|f| f.kind)
    }

    pub fn get(&self, component: &C, name: &str) -> Option<serde_json::Result<Value>> {
        self.find_field(name).map(|f| (f.get)(component))
    }

    pub fn set(&self, component: &mut C, name: &str, value: Value) -> Option<serde_json::Result<()>> {
        self.find_field(name).map(|f| (f.set)(component, value))
    }

    /// Default record behind an optional record field, see
    /// [`Schema::optional_record`].
    pub fn blank(&self, name: &str) -> Option<serde_json::Result<Value>> {
        self.find_field(name)?.blank.as_ref().map(|blank| blank())
    }

    /// Template data: every field and computed value, keyed by name.
    /// Fields that fail to serialize are left out and logged.
    pub fn data(&self, component: &C) -> Value {
        let mut map = Map::new();
        for field in &self.fields {
            match (field.get)(component) {
                Ok(value) => {
                    map.insert(field.name.clone(), value);
                }
                Err(err) => log::warn!(
                    "in {}: field {} can't be exposed to templates: {}",
                    self.type_name,
                    field.name,
                    err
                ),
            }
        }
        for computed in &self.computed {
            map.insert(computed.name.clone(), (computed.get)(component));
        }
        Value::Object(map)
    }

    pub fn method_arity(&self, name: &str) -> Option<usize> {
        self.find_method(name).map(|m| m.arity)
    }

    pub fn invoke(&self, component: &mut C, name: &str, payload: &str) -> Option<serde_json::Result<()>> {
        self.find_method(name).map(|m| (m.invoke)(component, payload))
    }

    fn find_field(&self, name: &str) -> Option<&Field<C>> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn find_method(&self, name: &str) -> Option<&Method<C>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Object-safe view of a [`Schema`], operating on type-erased components.
pub(crate) trait ErasedSchema {
    fn type_name(&self) -> &str;
    fn field_count(&self) -> usize;
    fn field_kind(&self, name: &str) -> Option<FieldKind>;
    fn data(&self, component: &dyn Any) -> Value;
    fn get(&self, component: &dyn Any, name: &str) -> Option<serde_json::Result<Value>>;
    fn set(&self, component: &mut dyn Any, name: &str, value: Value) -> Option<serde_json::Result<()>>;
    fn blank(&self, name: &str) -> Option<serde_json::Result<Value>>;
    fn method_arity(&self, name: &str) -> Option<usize>;
    fn invoke(&self, component: &mut dyn Any, name: &str, payload: &str) -> Option<serde_json::Result<()>>;
}

impl<C: 'static> ErasedSchema for Schema<C> {
    fn type_name(&self) -> &str {
        Schema::type_name(self)
    }

    fn field_count(&self) -> usize {
        Schema::field_count(self)
    }

    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        Schema::field_kind(self, name)
    }

    fn data(&self, component: &dyn Any) -> Value {
        component
            .downcast_ref::<C>()
            .map_or(Value::Null, |c| Schema::data(self, c))
    }

    fn get(&self, component: &dyn Any, name: &str) -> Option<serde_json::Result<Value>> {
        Schema::get(self, component.downcast_ref::<C>()?, name)
    }

    fn set(&self, component: &mut dyn Any, name: &str, value: Value) -> Option<serde_json::Result<()>> {
        Schema::set(self, component.downcast_mut::<C>()?, name, value)
    }

    fn blank(&self, name: &str) -> Option<serde_json::Result<Value>> {
        Schema::blank(self, name)
    }

    fn method_arity(&self, name: &str) -> Option<usize> {
        Schema::method_arity(self, name)
    }

    fn invoke(&self, component: &mut dyn Any, name: &str, payload: &str) -> Option<serde_json::Result<()>> {
        Schema::invoke(self, component.downcast_mut::<C>()?, name, payload)
    }
}

fn short_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    let start = base.rfind("::").map_or(0, |i| i + 2);
    &full[start..]
}
