//! The engine owns every registry of a UI tree: registered factories, live
//! nodes by identity and mounted components with their roots.
//!
//! Several engines can coexist; nothing is process-wide.

use crate::arena::Arena;
use crate::ast::{is_component_name, AttrList, Node, NodeKind};
use crate::binder::bind_erased;
use crate::component::Component;
use crate::config::Config;
use crate::error::{MarkupError, RegistryError};
use crate::parser::decode_named;
use crate::schema::ErasedSchema;
use crate::template;
use crate::tree::{ComponentHandle, LiveNode, NodeKey, SequentialUids, Uid, UidGenerator};
use log::{debug, info, warn};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type Factory = Box<dyn Fn() -> Box<dyn Component>>;

struct Registration {
    factory: Factory,
    schema: Rc<dyn ErasedSchema>,
}

pub(crate) struct Instance {
    pub(crate) component: Box<dyn Component>,
    pub(crate) schema: Rc<dyn ErasedSchema>,
    /// Factory tag for engine-created instances, `None` when the host added it.
    tag: Option<String>,
}

impl Instance {
    pub(crate) fn name(&self) -> &str {
        self.schema.type_name()
    }

    pub(crate) fn as_any(&self) -> &dyn Any {
        let component: &dyn Component = &*self.component;
        component.as_any()
    }

    pub(crate) fn as_any_mut(&mut self) -> &mut dyn Any {
        let component: &mut dyn Component = &mut *self.component;
        component.as_any_mut()
    }
}

pub(crate) struct Mounted {
    pub(crate) root: NodeKey,
    retain: usize,
}

pub struct Engine {
    pub(crate) config: Config,
    uids: Box<dyn UidGenerator>,
    pub(crate) nodes: Arena<LiveNode>,
    pub(crate) components: Arena<Instance>,
    pub(crate) nodes_by_id: HashMap<Uid, NodeKey>,
    pub(crate) roots: HashMap<ComponentHandle, Mounted>,
    factories: HashMap<String, Registration>,
    schemas: HashMap<TypeId, Rc<dyn ErasedSchema>>,
    shared: HashMap<String, ComponentHandle>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.factories.keys().collect();
        tags.sort();
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registered", &tags)
            .field("components", &self.components.len())
            .field("mounted", &self.roots.len())
            .field("nodes", &self.nodes_by_id.len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_config_and_uids(config, SequentialUids::default())
    }

    #[must_use]
    pub fn with_config_and_uids(config: Config, uids: impl UidGenerator + 'static) -> Self {
        Self {
            config,
            uids: Box::new(uids),
            nodes: Arena::new(),
            components: Arena::new(),
            nodes_by_id: HashMap::new(),
            roots: HashMap::new(),
            factories: HashMap::new(),
            schemas: HashMap::new(),
            shared: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh context identifier, e.g. one per window.
    pub fn new_context(&mut self) -> Uid {
        self.uids.next_uid()
    }

    /// Registers the factory used for `tag` anchors found in markup.
    /// Registering the same tag again replaces the previous factory.
    ///
    /// # Panics
    /// Panics if `tag` does not start with an ASCII upper-case letter.
    pub fn register<C, F>(&mut self, tag: &str, factory: F)
    where
        C: Component,
        F: Fn() -> C + 'static,
    {
        assert!(
            is_component_name(tag),
            "component name must start with an upper-case letter: {tag:?}"
        );
        let registration = Registration {
            factory: Box::new(move || -> Box<dyn Component> { Box::new(factory()) }),
            schema: self.schema_of::<C>(),
        };
        if self.factories.insert(tag.to_string(), registration).is_some() {
            info!("{} component is overloaded", tag);
        }
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Hands a host-created component to the engine. The instance lives until
    /// [`Engine::remove`], across any number of mount/dismount cycles.
    pub fn add<C: Component>(&mut self, component: C) -> ComponentHandle {
        let schema = self.schema_of::<C>();
        ComponentHandle(self.components.insert(Instance {
            component: Box::new(component),
            schema,
            tag: None,
        }))
    }

    /// Takes a component back from the engine, dismounting it first.
    ///
    /// # Errors
    /// Fails with [`RegistryError::UnknownComponent`] for stale handles, which
    /// includes engine-created components already dropped by their dismount,
    /// and with any error raised while dismounting.
    pub fn remove(&mut self, handle: ComponentHandle) -> Result<Box<dyn Component>, MarkupError> {
        while self.roots.contains_key(&handle) {
            self.dismount(handle)?;
        }
        let instance = self
            .components
            .remove(handle.0)
            .ok_or(RegistryError::UnknownComponent)?;
        if let Some(tag) = &instance.tag {
            if self.shared.get(tag) == Some(&handle) {
                self.shared.remove(tag);
            }
        }
        Ok(instance.component)
    }

    pub fn component<C: Component>(&self, handle: ComponentHandle) -> Option<&C> {
        self.components.get(handle.0)?.as_any().downcast_ref::<C>()
    }

    /// Mutable access to a component's state. Call [`Engine::synchronize`]
    /// afterwards to bring its live tree up to date.
    pub fn component_mut<C: Component>(&mut self, handle: ComponentHandle) -> Option<&mut C> {
        self.components.get_mut(handle.0)?.as_any_mut().downcast_mut::<C>()
    }

    /// Binds markup attributes onto a component's fields.
    ///
    /// # Errors
    /// See [`crate::binder::bind`].
    pub fn bind(&mut self, handle: ComponentHandle, attributes: &AttrList) -> Result<(), MarkupError> {
        let instance = self.instance_mut(handle)?;
        let schema = Rc::clone(&instance.schema);
        bind_erased(&*schema, instance.as_any_mut(), attributes)?;
        Ok(())
    }

    /// Expands a component's template against its current state.
    ///
    /// # Errors
    /// Returns a [`crate::error::TemplateError`] when the template is invalid
    /// or fails to execute.
    pub fn render(&self, handle: ComponentHandle) -> Result<String, MarkupError> {
        let instance = self.instance(handle)?;
        let data = instance.schema.data(instance.as_any());
        Ok(template::render_named(
            instance.component.render(),
            &data,
            instance.name(),
        )?)
    }

    /// Builds the live tree of `handle` under `context` and returns its root.
    ///
    /// Child components referenced by the markup are created through their
    /// factories, bound and mounted recursively. On any failure, including a
    /// failing `on_mount`, everything built by this call is torn down before
    /// the error is returned.
    ///
    /// # Errors
    /// - [`RegistryError::NoFields`] when fields are required and the type has none.
    /// - [`RegistryError::AlreadyMounted`] for a second mount of the same instance.
    /// - [`RegistryError::RootNotStandard`] when the markup root is a component tag.
    /// - Template, decode, bind, registry and hook errors from the subtree.
    pub fn mount(&mut self, handle: ComponentHandle, context: Uid) -> Result<NodeKey, MarkupError> {
        let instance = self.instance(handle)?;
        let name = instance.name().to_string();
        let empty = instance.schema.field_count() == 0;
        if empty && self.config.require_fields {
            return Err(RegistryError::NoFields { component: name }.into());
        }
        if let Some(mounted) = self.roots.get_mut(&handle) {
            if empty {
                mounted.retain += 1;
                return Ok(mounted.root);
            }
            return Err(RegistryError::AlreadyMounted { component: name }.into());
        }
        debug!("mounting {} in context {}", name, context);

        let decoded = self.render_tree(handle)?;
        let root = self.create_node(&decoded, None, handle, context);
        if let Err(err) = self.populate(root, &decoded) {
            self.rollback(root);
            return Err(err);
        }

        self.roots.insert(handle, Mounted { root, retain: 1 });
        let hook = match self.components.get_mut(handle.0) {
            Some(instance) => instance.component.on_mount(),
            None => Ok(()),
        };
        if let Err(err) = hook {
            self.roots.remove(&handle);
            self.rollback(root);
            return Err(err.in_component(&name).into());
        }
        Ok(root)
    }

    /// Tears down the live tree of `handle` once its last reference is gone.
    ///
    /// Dismounting a component that is not mounted only logs a warning.
    /// Engine-created components are dropped once torn down; host-added ones
    /// stay available for another mount.
    ///
    /// # Errors
    /// Returns the first hook error raised in the subtree or by the
    /// component itself. The teardown completes regardless.
    pub fn dismount(&mut self, handle: ComponentHandle) -> Result<(), MarkupError> {
        let name = self.instance(handle)?.name().to_string();
        let Some(mounted) = self.roots.get_mut(&handle) else {
            warn!("{} is already dismounted", name);
            return Ok(());
        };
        mounted.retain = mounted.retain.saturating_sub(1);
        if mounted.retain > 0 {
            return Ok(());
        }
        let root = mounted.root;
        self.roots.remove(&handle);
        debug!("dismounting {}", name);

        let mut result = self.release(root);
        if let Some(instance) = self.components.get_mut(handle.0) {
            let hook: Result<(), MarkupError> = instance
                .component
                .on_dismount()
                .map_err(|err| err.in_component(&name).into());
            keep_first(&mut result, hook);
        }
        self.discard(handle);
        result
    }

    pub fn is_mounted(&self, handle: ComponentHandle) -> bool {
        self.roots.contains_key(&handle)
    }

    pub fn root_of(&self, handle: ComponentHandle) -> Option<NodeKey> {
        self.roots.get(&handle).map(|mounted| mounted.root)
    }

    pub fn node(&self, key: NodeKey) -> Option<&LiveNode> {
        self.nodes.get(key.0)
    }

    pub fn node_by_id(&self, id: Uid) -> Option<NodeKey> {
        self.nodes_by_id.get(&id).copied()
    }

    /// Number of nodes currently registered by identity.
    pub fn node_count(&self) -> usize {
        self.nodes_by_id.len()
    }

    /// Number of components with a live tree.
    pub fn mounted_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of component instances held by the engine, mounted or not.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn instance(&self, handle: ComponentHandle) -> Result<&Instance, RegistryError> {
        self.components
            .get(handle.0)
            .ok_or(RegistryError::UnknownComponent)
    }

    pub(crate) fn instance_mut(&mut self, handle: ComponentHandle) -> Result<&mut Instance, RegistryError> {
        self.components
            .get_mut(handle.0)
            .ok_or(RegistryError::UnknownComponent)
    }

    pub(crate) fn live(&self, key: NodeKey) -> Result<&LiveNode, RegistryError> {
        self.nodes.get(key.0).ok_or(RegistryError::UnknownNode)
    }

    pub(crate) fn live_mut(&mut self, key: NodeKey) -> Result<&mut LiveNode, RegistryError> {
        self.nodes.get_mut(key.0).ok_or(RegistryError::UnknownNode)
    }

    /// Renders and decodes a component, checking that its root is an HTML element.
    pub(crate) fn render_tree(&self, handle: ComponentHandle) -> Result<Node, MarkupError> {
        let text = self.render(handle)?;
        let name = self.instance(handle)?.name();
        let decoded = decode_named(&text, name)?;
        if decoded.kind != NodeKind::Html {
            return Err(RegistryError::RootNotStandard {
                component: name.to_string(),
                tag: decoded.tag,
            }
            .into());
        }
        Ok(decoded)
    }

    /// Allocates a live node for `decoded` with a fresh identity and links it
    /// under `parent`. Children are not created.
    pub(crate) fn create_node(
        &mut self,
        decoded: &Node,
        parent: Option<NodeKey>,
        owner: ComponentHandle,
        context: Uid,
    ) -> NodeKey {
        let id = self.uids.next_uid();
        let key = NodeKey(self.nodes.insert(LiveNode {
            tag: decoded.tag.clone(),
            kind: decoded.kind,
            id: Some(id),
            context,
            attributes: decoded.attributes.clone(),
            children: Vec::new(),
            parent,
            owner,
            bound: None,
        }));
        self.nodes_by_id.insert(id, key);
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(parent.0)) {
            parent.children.push(key);
        }
        key
    }

    /// Builds what hangs below `key`: child nodes for elements, a mounted
    /// component for anchors.
    pub(crate) fn populate(&mut self, key: NodeKey, decoded: &Node) -> Result<(), MarkupError> {
        match decoded.kind {
            NodeKind::Html => {
                let node = self.live(key)?;
                let (owner, context) = (node.owner, node.context);
                for child in &decoded.children {
                    let child_key = self.create_node(child, Some(key), owner, context);
                    self.populate(child_key, child)?;
                }
            }
            NodeKind::Component => self.instantiate(key, decoded)?,
            NodeKind::Text => {}
        }
        Ok(())
    }

    /// Creates, binds and mounts the component behind an anchor node.
    fn instantiate(&mut self, anchor: NodeKey, decoded: &Node) -> Result<(), MarkupError> {
        let context = self.live(anchor)?.context;
        let child = self.create_component(&decoded.tag)?;
        let mounted = self
            .bind(child, &decoded.attributes)
            .and_then(|()| self.mount(child, context));
        if let Err(err) = mounted {
            self.discard(child);
            return Err(err);
        }
        self.live_mut(anchor)?.bound = Some(child);
        Ok(())
    }

    fn create_component(&mut self, tag: &str) -> Result<ComponentHandle, MarkupError> {
        let registration = self
            .factories
            .get(tag)
            .ok_or_else(|| RegistryError::Unregistered {
                tag: tag.to_string(),
            })?;
        let shareable = registration.schema.field_count() == 0
            && !self.config.require_fields
            && self.config.share_empty_components;
        if shareable {
            if let Some(&handle) = self.shared.get(tag) {
                if self.components.contains(handle.0) {
                    return Ok(handle);
                }
            }
        }
        let handle = ComponentHandle(self.components.insert(Instance {
            component: (registration.factory)(),
            schema: Rc::clone(&registration.schema),
            tag: Some(tag.to_string()),
        }));
        if shareable {
            self.shared.insert(tag.to_string(), handle);
        }
        Ok(handle)
    }

    /// Drops an engine-created component that is no longer mounted.
    fn discard(&mut self, handle: ComponentHandle) {
        if self.roots.contains_key(&handle) {
            return;
        }
        let Some(tag) = self.components.get(handle.0).and_then(|i| i.tag.clone()) else {
            return;
        };
        if self.shared.get(&tag) == Some(&handle) {
            self.shared.remove(&tag);
        }
        self.components.remove(handle.0);
    }

    /// Releases a node and its whole subtree: identities are unregistered,
    /// bound components dismounted and the nodes freed.
    pub(crate) fn release(&mut self, key: NodeKey) -> Result<(), MarkupError> {
        let result = self.release_contents(key);
        self.unregister(key);
        self.nodes.remove(key.0);
        result
    }

    /// Releases what hangs below `key` but keeps the node itself.
    pub(crate) fn release_contents(&mut self, key: NodeKey) -> Result<(), MarkupError> {
        let Some(node) = self.nodes.get_mut(key.0) else {
            return Ok(());
        };
        let children = std::mem::take(&mut node.children);
        let bound = node.bound.take();
        let tag = node.tag.clone();
        let mut result = Ok(());
        for child in children {
            let released = self.release(child);
            keep_first(&mut result, released);
        }
        match bound {
            // Already dismounted on its own and dropped.
            Some(bound) if !self.components.contains(bound.0) => {
                warn!("{} is already dismounted", tag);
            }
            Some(bound) => {
                let dismounted = self.dismount(bound);
                keep_first(&mut result, dismounted);
            }
            None => {}
        }
        result
    }

    pub(crate) fn unregister(&mut self, key: NodeKey) {
        if let Some(id) = self.nodes.get_mut(key.0).and_then(|node| node.id.take()) {
            self.nodes_by_id.remove(&id);
        }
    }

    pub(crate) fn assign_id(&mut self, key: NodeKey) -> Option<Uid> {
        let id = self.uids.next_uid();
        let node = self.nodes.get_mut(key.0)?;
        node.id = Some(id);
        self.nodes_by_id.insert(id, key);
        Some(id)
    }

    fn rollback(&mut self, root: NodeKey) {
        if let Err(err) = self.release(root) {
            warn!("error while rolling back a failed mount: {}", err);
        }
    }

    fn schema_of<C: Component>(&mut self) -> Rc<dyn ErasedSchema> {
        let schema = self
            .schemas
            .entry(TypeId::of::<C>())
            .or_insert_with(|| -> Rc<dyn ErasedSchema> { Rc::new(C::schema()) });
        Rc::clone(schema)
    }
}

/// Keeps the first error of a teardown and logs the following ones.
pub(crate) fn keep_first(first: &mut Result<(), MarkupError>, next: Result<(), MarkupError>) {
    if let Err(err) = next {
        if first.is_ok() {
            *first = Err(err);
        } else {
            warn!("{}", err);
        }
    }
}
