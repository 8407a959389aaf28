/// Name of the synthetic attribute holding the content of a text leaf.
pub const TEXT_ATTR: &str = "value";
/// Tag given to every text leaf.
pub const TEXT_TAG: &str = "text";

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum NodeKind {
    /// A lower-case, HTML-like element.
    Html,
    /// A reference to a registered component (tag starts with an upper-case letter).
    Component,
    /// Character data between tags.
    Text,
}

impl NodeKind {
    pub fn of_tag(tag: &str) -> Self {
        if is_component_name(tag) {
            NodeKind::Component
        } else {
            NodeKind::Html
        }
    }
}

/// Returns whether `name` is a valid component tag: non-empty and starting with
/// an ASCII upper-case letter.
pub fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the hook target name when the attribute name carries the event prefix.
    pub fn event_name<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        if prefix.is_empty() {
            return None;
        }
        self.name.strip_prefix(prefix)
    }
}

/// Attributes in document order. Equality is order-sensitive, lookup is not.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct AttrList(pub Vec<Attr>);

impl AttrList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn push(&mut self, attr: Attr) {
        self.0.push(attr);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attr> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a AttrList {
    type Item = &'a Attr;
    type IntoIter = std::slice::Iter<'a, Attr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Attr> for AttrList {
    fn from_iter<I: IntoIterator<Item = Attr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A decoded, not yet mounted node. Children are owned in document order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Node {
    pub tag: String,
    pub kind: NodeKind,
    pub attributes: AttrList,
    pub children: Vec<Node>,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Node {
    pub fn element(tag: impl Into<String>, attributes: AttrList) -> Self {
        let tag = tag.into();
        Node {
            kind: NodeKind::of_tag(&tag),
            tag,
            attributes,
            children: Vec::new(),
            pos_start: 0,
            pos_end: 0,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node {
            tag: TEXT_TAG.to_string(),
            kind: NodeKind::Text,
            attributes: AttrList(vec![Attr::new(TEXT_ATTR, text)]),
            children: Vec::new(),
            pos_start: 0,
            pos_end: 0,
        }
    }

    /// Text content of a text leaf.
    pub fn text_value(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Text => self.attributes.get(TEXT_ATTR),
            _ => None,
        }
    }

    /// Compares tag, kind, attributes and child count, ignoring source positions.
    pub fn shallow_eq(&self, other: &Node) -> bool {
        self.kind == other.kind
            && self.tag == other.tag
            && self.attributes == other.attributes
            && self.children.len() == other.children.len()
    }

    /// Structural equality over the whole subtree, ignoring source positions.
    pub fn same_structure(&self, other: &Node) -> bool {
        self.shallow_eq(other)
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.same_structure(b))
    }
}
