// vellum-runtime/src/tree_renderer.rs

//! An in-memory renderer that builds a plain tree of nodes. Used by the
//! runtime's own tests and anywhere a headless render target is useful.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use vellum_core::Value;

use crate::renderer::{EventHandler, EventLoopType, NodeHandle, Renderer};

/// A node in the in-memory tree. Text nodes carry `tag == "TEXT"` and a
/// `text` payload; element nodes carry attributes, handlers and children.
pub struct TreeNode {
    tag: String,
    text: RefCell<Option<String>>,
    attributes: RefCell<IndexMap<String, Value>>,
    handlers: RefCell<IndexMap<String, Vec<EventHandler>>>,
    children: RefCell<Vec<Rc<TreeNode>>>,
}

impl TreeNode {
    fn new(tag: &str) -> Rc<TreeNode> {
        Rc::new(TreeNode {
            tag: tag.to_string(),
            text: RefCell::new(None),
            attributes: RefCell::new(IndexMap::new()),
            handlers: RefCell::new(IndexMap::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text(&self) -> Option<String> {
        self.text.borrow().clone()
    }

    pub fn attr(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn children(&self) -> Vec<Rc<TreeNode>> {
        self.children.borrow().clone()
    }

    pub fn child(&self, index: usize) -> Rc<TreeNode> {
        self.children.borrow()[index].clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// Invoke every handler registered for `event`, as a host would.
    pub fn fire(&self, event: &str, args: &[Value]) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(args);
        }
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.borrow().get(event).map_or(0, Vec::len)
    }
}

/// Unwrap a `NodeHandle` produced by a [`TreeRenderer`].
pub fn tree_node(handle: &NodeHandle) -> Rc<TreeNode> {
    match handle.clone().downcast::<TreeNode>() {
        Ok(node) => node,
        Err(_) => panic!("node handle was not created by a TreeRenderer"),
    }
}

#[derive(Default)]
pub struct TreeRenderer;

impl TreeRenderer {
    pub fn new() -> TreeRenderer {
        TreeRenderer
    }
}

impl Renderer for TreeRenderer {
    fn create_element(&self, tag: &str) -> NodeHandle {
        TreeNode::new(tag)
    }

    fn create_text_element(&self) -> NodeHandle {
        let node = TreeNode::new("TEXT");
        *node.text.borrow_mut() = Some(String::new());
        node
    }

    fn insert(&self, child: &NodeHandle, parent: &NodeHandle, anchor: Option<&NodeHandle>) {
        let parent = tree_node(parent);
        let child = tree_node(child);
        let mut children = parent.children.borrow_mut();
        let index = anchor
            .map(tree_node)
            .and_then(|anchor| children.iter().position(|c| Rc::ptr_eq(c, &anchor)))
            .unwrap_or(children.len());
        children.insert(index, child);
    }

    fn remove(&self, child: &NodeHandle, parent: &NodeHandle) {
        let parent = tree_node(parent);
        let child = tree_node(child);
        parent
            .children
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, &child));
    }

    fn set_element_text(&self, element: &NodeHandle, text: &str) {
        *tree_node(element).text.borrow_mut() = Some(text.to_string());
    }

    fn set_attribute(&self, element: &NodeHandle, name: &str, value: &Value) {
        tree_node(element)
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.clone());
    }

    fn remove_attribute(&self, element: &NodeHandle, name: &str) {
        tree_node(element).attributes.borrow_mut().shift_remove(name);
    }

    fn add_event_listener(&self, element: &NodeHandle, event: &str, handler: EventHandler) {
        tree_node(element)
            .handlers
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn remove_event_listener(&self, element: &NodeHandle, event: &str, handler: &EventHandler) {
        if let Some(handlers) = tree_node(element).handlers.borrow_mut().get_mut(event) {
            handlers.retain(|h| !Rc::ptr_eq(h, handler));
        }
    }

    fn preferred_event_loop_type(&self) -> EventLoopType {
        EventLoopType::Sync
    }
}
