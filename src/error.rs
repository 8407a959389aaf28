use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum MarkupError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum DecodeError {
    #[error("empty markup")]
    #[diagnostic(
        code(decode::empty_markup),
        help("A component must render at least one element.")
    )]
    EmptyMarkup,

    #[error("text must be surrounded by tags: {text:?}")]
    #[diagnostic(
        code(decode::text_outside_tags),
        help("Wrap free text in an element such as <span> or <p>.")
    )]
    TextOutsideTags {
        #[source_code]
        src: NamedSource<String>,
        #[label("this text is not inside any element")]
        span: SourceSpan,
        text: String,
    },

    #[error("element <{expected}> closed by </{found}>")]
    #[diagnostic(
        code(decode::mismatched_close),
        help("Every start tag must be closed by an end tag with the same name.")
    )]
    MismatchedClose {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected </{expected}> here")]
        span: SourceSpan,
        expected: String,
        found: String,
    },

    #[error("unexpected end tag </{found}>")]
    #[diagnostic(
        code(decode::unexpected_close),
        help("This end tag has no matching start tag.")
    )]
    UnexpectedClose {
        #[source_code]
        src: NamedSource<String>,
        #[label("nothing to close here")]
        span: SourceSpan,
        found: String,
    },

    #[error("element <{name}> is never closed")]
    #[diagnostic(code(decode::unclosed_tag))]
    UnclosedTag {
        #[source_code]
        src: NamedSource<String>,
        #[label("opened here")]
        span: SourceSpan,
        name: String,
    },

    #[error("markup must have a single root element")]
    #[diagnostic(
        code(decode::multiple_roots),
        help("Wrap sibling elements in a common parent.")
    )]
    MultipleRoots {
        #[source_code]
        src: NamedSource<String>,
        #[label("second root element starts here")]
        span: SourceSpan,
    },

    #[error("Unexpected token")]
    #[diagnostic(
        code(decode::unexpected_token),
        help("The decoder found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
    },

    #[error("invalid character reference {entity:?}")]
    #[diagnostic(code(decode::invalid_entity))]
    InvalidEntity {
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown or malformed reference")]
        span: SourceSpan,
        entity: String,
    },

    #[error("Unexpected end of markup")]
    #[diagnostic(
        code(decode::unexpected_eof),
        help("The markup ended in the middle of a tag, comment or attribute value.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("markup ended unexpectedly here")]
        span: SourceSpan,
    },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum TemplateError {
    #[error("template syntax error: {message}")]
    #[diagnostic(code(template::syntax))]
    Syntax {
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
    },

    #[error("unclosed action")]
    #[diagnostic(
        code(template::unclosed_action),
        help("Every `{{{{` must be matched by `}}}}`.")
    )]
    UnclosedAction {
        #[source_code]
        src: NamedSource<String>,
        #[label("action starts here")]
        span: SourceSpan,
    },

    #[error("can't evaluate field {field} in {context}")]
    #[diagnostic(code(template::undefined_field))]
    UndefinedField {
        #[source_code]
        src: NamedSource<String>,
        #[label("undefined field")]
        span: SourceSpan,
        field: String,
        context: String,
    },

    #[error("function {name:?} not defined")]
    #[diagnostic(
        code(template::undefined_function),
        help("Available helpers: eq ne lt le gt ge and or not len index print json html.")
    )]
    UndefinedFunction {
        #[source_code]
        src: NamedSource<String>,
        #[label("unknown function")]
        span: SourceSpan,
        name: String,
    },

    #[error("{message}")]
    #[diagnostic(code(template::type_mismatch))]
    TypeMismatch {
        #[source_code]
        src: NamedSource<String>,
        #[label("while evaluating this")]
        span: SourceSpan,
        message: String,
    },

    #[error("wrong number of args for {name}: want {expected}, got {found}")]
    #[diagnostic(code(template::wrong_arg_count))]
    WrongArgCount {
        #[source_code]
        src: NamedSource<String>,
        #[label("called here")]
        span: SourceSpan,
        name: String,
        expected: String,
        found: usize,
    },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum BindError {
    #[error("no field named {field} in {component}")]
    #[diagnostic(
        code(bind::no_field),
        help("Attributes on a component tag must name one of its declared fields.")
    )]
    NoField { component: String, field: String },

    #[error("boolean attributes in a component must be set to true or false: {field}={value:?}")]
    #[diagnostic(code(bind::invalid_bool))]
    InvalidBool { field: String, value: String },

    #[error("invalid integer for {field}: {value:?}")]
    #[diagnostic(code(bind::invalid_int))]
    InvalidInt { field: String, value: String },

    #[error("invalid unsigned integer for {field}: {value:?}")]
    #[diagnostic(code(bind::invalid_uint))]
    InvalidUint { field: String, value: String },

    #[error("invalid float for {field}: {value:?}")]
    #[diagnostic(code(bind::invalid_float))]
    InvalidFloat { field: String, value: String },

    #[error("field {field} rejected {value:?}: {reason}")]
    #[diagnostic(
        code(bind::rejected),
        help("The value parsed but does not fit the field's type, e.g. an out-of-range integer.")
    )]
    Rejected {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum RegistryError {
    #[error("component {tag} is not registered")]
    #[diagnostic(
        code(registry::unregistered),
        help("Call `Engine::register` for every component tag before mounting markup that uses it.")
    )]
    Unregistered { tag: String },

    #[error("{component} is not mounted")]
    #[diagnostic(code(registry::not_mounted))]
    NotMounted { component: String },

    #[error("component already mounted: {component}")]
    #[diagnostic(code(registry::already_mounted))]
    AlreadyMounted { component: String },

    #[error("{component} must have at least 1 field")]
    #[diagnostic(code(registry::no_fields))]
    NoFields { component: String },

    #[error("component root must be a standard tag: {component} renders <{tag}>")]
    #[diagnostic(
        code(registry::root_not_standard),
        help("The outermost element of a component's markup must be a lower-case HTML tag.")
    )]
    RootNotStandard { component: String, tag: String },

    #[error("no component behind this handle")]
    #[diagnostic(code(registry::unknown_component))]
    UnknownComponent,

    #[error("no live node behind this key")]
    #[diagnostic(code(registry::unknown_node))]
    UnknownNode,
}

/// Failure reported by a component's `on_mount` or `on_dismount` hook.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("{component} hook failed: {message}")]
#[diagnostic(code(component::hook))]
pub struct HookError {
    pub component: String,
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            component: String::new(),
            message: message.into(),
        }
    }

    pub(crate) fn in_component(mut self, component: &str) -> Self {
        if self.component.is_empty() {
            self.component = component.to_string();
        }
        self
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum DispatchError {
    #[error("node with id {id} is not mounted")]
    #[diagnostic(code(dispatch::not_mounted))]
    NotMounted { id: String },

    #[error("{component}.{method} must have 1 parameter max, has {arity}")]
    #[diagnostic(code(dispatch::too_many_parameters))]
    TooManyParameters {
        component: String,
        method: String,
        arity: usize,
    },

    #[error("unable to decode payload for {target}: {source}")]
    #[diagnostic(code(dispatch::payload))]
    Payload {
        target: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to map {target}: {message}")]
    #[diagnostic(code(dispatch::path))]
    Path { target: String, message: String },
}

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("unable to read config file {path}")]
    #[diagnostic(code(config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config")]
    #[diagnostic(code(config::json))]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML config")]
    #[diagnostic(code(config::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown config format for {path}")]
    #[diagnostic(
        code(config::unknown_format),
        help("Use a .json, .yaml or .yml file.")
    )]
    UnknownFormat { path: String },
}
