use crate::ast::{is_component_name, NodeKind};
use crate::engine::Engine;
use crate::error::RegistryError;
use crate::tree::{ComponentHandle, LiveNode, NodeKey};
use crate::value::escape_html;

/// Elements that never have content and are written as `<tag />`.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

impl Engine {
    /// Writes the live subtree at `key` as indented markup.
    ///
    /// Elements carry their identity in the configured id attribute. Event
    /// attributes such as `_onclick="Increment"` become
    /// `onclick="CallEvent('<id>', 'Increment', this, event)"`. Component
    /// anchors are replaced by the root of the component they hold.
    ///
    /// # Errors
    /// Returns [`RegistryError::UnknownNode`] if `key` is stale.
    pub fn to_text(&self, key: NodeKey) -> Result<String, RegistryError> {
        let node = self.live(key)?;
        let mut out = String::new();
        self.write_node(node, 0, &mut out);
        Ok(out)
    }

    /// Writes the live tree of a mounted component.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotMounted`] if the component has no live tree.
    pub fn component_to_text(&self, handle: ComponentHandle) -> Result<String, RegistryError> {
        let instance = self.instance(handle)?;
        let root = self.root_of(handle).ok_or_else(|| RegistryError::NotMounted {
            component: instance.name().to_string(),
        })?;
        self.to_text(root)
    }

    fn write_node(&self, node: &LiveNode, level: usize, out: &mut String) {
        let indent = self.config.indent.repeat(level);
        match node.kind {
            NodeKind::Text => {
                out.push_str(&indent);
                out.push_str(&escape_html(node.text().unwrap_or_default()));
            }
            NodeKind::Component => {
                let root = node
                    .bound
                    .and_then(|bound| self.root_of(bound))
                    .and_then(|root| self.nodes.get(root.0));
                match root {
                    Some(root) => self.write_node(root, level, out),
                    None => out.push_str(&format!("{indent}<!-- {} -->", node.tag)),
                }
            }
            NodeKind::Html => self.write_element(node, &indent, level, out),
        }
    }

    fn write_element(&self, node: &LiveNode, indent: &str, level: usize, out: &mut String) {
        out.push_str(indent);
        out.push('<');
        out.push_str(&node.tag);

        for attr in &node.attributes {
            match (attr.event_name(&self.config.event_prefix), node.id) {
                (Some(event), Some(id)) => out.push_str(&format!(
                    " {}=\"{}('{}', '{}', this, event)\"",
                    event,
                    self.config.event_call,
                    id,
                    escape_html(&attr.value)
                )),
                _ => out.push_str(&format!(" {}=\"{}\"", attr.name, escape_html(&attr.value))),
            }
        }
        if let Some(id) = node.id {
            out.push_str(&format!(" {}=\"{}\"", self.config.id_attribute, id));
        }

        if node.children.is_empty() {
            if VOID_ELEMENTS.contains(&node.tag.as_str()) || is_component_name(&node.tag) {
                out.push_str(" />");
            } else {
                out.push_str(&format!("></{}>", node.tag));
            }
            return;
        }

        out.push('>');
        for child in node.children.iter().filter_map(|child| self.nodes.get(child.0)) {
            out.push('\n');
            self.write_node(child, level + 1, out);
        }
        out.push('\n');
        out.push_str(indent);
        out.push_str(&format!("</{}>", node.tag));
    }
}
