//! Reconciliation of a mounted component against a fresh rendering.

use crate::ast::{Node, NodeKind};
use crate::engine::Engine;
use crate::error::{MarkupError, RegistryError};
use crate::tree::{Change, ChangeKind, ComponentHandle, NodeKey};
use log::{debug, trace};

impl Engine {
    /// Re-renders `handle` and patches its live tree in place.
    ///
    /// Nodes whose tag, kind, attributes and child count are unchanged keep
    /// their identity and are only descended into. The returned changes list
    /// the nodes a renderer has to refresh; descendants of a `Children` or
    /// `Replaced` node are never listed separately. Child components whose
    /// attributes changed are rebound and synchronized in turn, keeping their
    /// state.
    ///
    /// # Errors
    /// Any template, decode, bind, registry or hook error aborts the call.
    /// The live tree is left as far as patching went and should be treated
    /// as stale until the next successful synchronization.
    pub fn synchronize(&mut self, handle: ComponentHandle) -> Result<Vec<Change>, MarkupError> {
        let name = self.instance(handle)?.name().to_string();
        let root = self
            .root_of(handle)
            .ok_or(RegistryError::NotMounted { component: name.clone() })?;
        debug!("synchronizing {}", name);
        let decoded = self.render_tree(handle)?;
        let mut changes = Vec::new();
        self.sync_node(root, &decoded, &mut changes)?;
        Ok(changes)
    }

    fn sync_node(&mut self, key: NodeKey, new: &Node, changes: &mut Vec<Change>) -> Result<(), MarkupError> {
        let node = self.live(key)?;
        match (node.kind, new.kind) {
            (NodeKind::Html, NodeKind::Html)
                if node.tag == new.tag && node.children.len() == new.children.len() =>
            {
                let children = node.children.clone();
                if node.attributes != new.attributes {
                    trace!("<{}> attributes changed", new.tag);
                    let node = self.live_mut(key)?;
                    node.attributes = new.attributes.clone();
                    changes.push(Change {
                        node: key,
                        id: node.id,
                        kind: ChangeKind::Attributes,
                    });
                }
                for (child, new_child) in children.into_iter().zip(&new.children) {
                    self.sync_node(child, new_child, changes)?;
                }
                Ok(())
            }
            (NodeKind::Html, NodeKind::Html) => self.replace_children(key, new, changes),
            (NodeKind::Component, NodeKind::Component) if node.tag == new.tag => {
                if node.attributes == new.attributes {
                    return Ok(());
                }
                let bound = node.bound.filter(|&bound| self.is_mounted(bound));
                self.live_mut(key)?.attributes = new.attributes.clone();
                match bound {
                    Some(bound) => {
                        trace!("<{}> rebound", new.tag);
                        self.bind(bound, &new.attributes)?;
                        let nested = self.synchronize(bound)?;
                        changes.extend(nested);
                        Ok(())
                    }
                    None => self.replace(key, new, changes),
                }
            }
            (NodeKind::Text, NodeKind::Text) => {
                if node.attributes != new.attributes {
                    trace!("text changed");
                    let node = self.live_mut(key)?;
                    node.attributes = new.attributes.clone();
                    changes.push(Change {
                        node: key,
                        id: node.id,
                        kind: ChangeKind::Text,
                    });
                }
                Ok(())
            }
            _ => self.replace(key, new, changes),
        }
    }

    /// Same element, different tag or child count: the node keeps its
    /// identity and its children are rebuilt.
    fn replace_children(&mut self, key: NodeKey, new: &Node, changes: &mut Vec<Change>) -> Result<(), MarkupError> {
        trace!("<{}> children replaced", new.tag);
        self.release_contents(key)?;
        let node = self.live_mut(key)?;
        node.tag = new.tag.clone();
        node.attributes = new.attributes.clone();
        let id = node.id;
        self.populate(key, new)?;
        changes.push(Change {
            node: key,
            id,
            kind: ChangeKind::Children,
        });
        Ok(())
    }

    /// Kind transition: the node is rebuilt in place under a new identity,
    /// keeping its parent, owner and context.
    fn replace(&mut self, key: NodeKey, new: &Node, changes: &mut Vec<Change>) -> Result<(), MarkupError> {
        trace!("node replaced by <{}>", new.tag);
        self.release_contents(key)?;
        self.unregister(key);
        let node = self.live_mut(key)?;
        node.kind = new.kind;
        node.tag = new.tag.clone();
        node.attributes = new.attributes.clone();
        let id = self.assign_id(key);
        self.populate(key, new)?;
        changes.push(Change {
            node: key,
            id,
            kind: ChangeKind::Replaced,
        });
        Ok(())
    }
}
