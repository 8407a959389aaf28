pub mod ast;
pub mod binder;
pub mod component;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod schema;
pub mod template;
pub mod tree;
pub mod value;
mod arena;
mod dispatch;
mod engine;
mod serialization;
mod sync;

pub use ast::{Attr, AttrList, Node, NodeKind};
pub use component::Component;
pub use config::Config;
pub use dispatch::Dispatched;
pub use engine::Engine;
pub use error::MarkupError;
pub use parser::decode;
pub use schema::{FieldKind, Schema};
pub use template::render;
pub use tree::{Change, ChangeKind, ComponentHandle, LiveNode, NodeKey, Uid, UidGenerator};
