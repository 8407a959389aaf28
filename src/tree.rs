//! The live tree: mounted nodes, their identities and change reports.

use crate::arena::Key;
use crate::ast::{AttrList, NodeKind, TEXT_ATTR};
use std::fmt;
use std::str::FromStr;

/// Opaque identity of a mounted node or of a mount context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u64);

impl Uid {
    pub const fn from_raw(raw: u64) -> Self {
        Uid(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Uid)
    }
}

/// Source of fresh identities. Every call must return a value never returned
/// before by the same generator.
pub trait UidGenerator {
    fn next_uid(&mut self) -> Uid;
}

/// Default generator: 1, 2, 3...
#[derive(Debug, Default)]
pub struct SequentialUids {
    last: u64,
}

impl UidGenerator for SequentialUids {
    fn next_uid(&mut self) -> Uid {
        self.last += 1;
        Uid(self.last)
    }
}

/// Handle to a node of the live tree. Stale once the node is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) Key);

/// Handle to a component instance owned by an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentHandle(pub(crate) Key);

/// A mounted node.
#[derive(Debug, Clone)]
pub struct LiveNode {
    pub(crate) tag: String,
    pub(crate) kind: NodeKind,
    pub(crate) id: Option<Uid>,
    pub(crate) context: Uid,
    pub(crate) attributes: AttrList,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) parent: Option<NodeKey>,
    /// Component whose markup produced this node.
    pub(crate) owner: ComponentHandle,
    /// Component mounted behind a component anchor.
    pub(crate) bound: Option<ComponentHandle>,
}

impl LiveNode {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn id(&self) -> Option<Uid> {
        self.id
    }

    pub fn context(&self) -> Uid {
        self.context
    }

    pub fn attributes(&self) -> &AttrList {
        &self.attributes
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn owner(&self) -> ComponentHandle {
        self.owner
    }

    pub fn bound_component(&self) -> Option<ComponentHandle> {
        self.bound
    }

    pub fn text(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Text => self.attributes.get(TEXT_ATTR),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Only the node's attributes changed.
    Attributes,
    /// A text leaf changed its content.
    Text,
    /// The node kept its identity but its children were rebuilt.
    Children,
    /// The node was rebuilt in place with a new identity.
    Replaced,
}

impl ChangeKind {
    /// Whether a driver can patch the existing rendering instead of
    /// re-serializing the whole node.
    pub fn is_lightweight(self) -> bool {
        matches!(self, ChangeKind::Attributes | ChangeKind::Text)
    }
}

/// A node that needs re-rendering after a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub node: NodeKey,
    /// Identity of the node after the change.
    pub id: Option<Uid>,
    pub kind: ChangeKind,
}
