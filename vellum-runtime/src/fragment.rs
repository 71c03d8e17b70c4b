// vellum-runtime/src/fragment.rs

//! Fragments are the runtime half of compiled templates: one fragment per
//! template node, owning the renderer node it created, its dynamic binds,
//! and the structural state of control flow, lists, child components and
//! slots.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use vellum_core::{Reactive, Value, WatchOptions, watch};

use crate::component::{Component, ComponentDef};
use crate::context::Context;
use crate::renderer::{EventHandler, NodeHandle, Renderer};

pub type Expr = Rc<dyn Fn() -> Value>;
pub type Cond = Rc<dyn Fn() -> bool>;

/// Reads the current loop item for one list entry. Item fragments capture
/// this instead of a snapshot so their binds always see fresh data.
pub type ItemAccessor = Rc<dyn Fn() -> Value>;
pub type CreateItemFn = Rc<dyn Fn(ItemAccessor) -> Rc<Fragment>>;
pub type KeyFn = Rc<dyn Fn(&Value) -> Value>;

#[derive(Clone)]
pub enum Tag {
    Host(String),
    Text,
    Virtual,
    Component(ComponentDef),
}

struct BindEntry {
    key: String,
    deps: Vec<String>,
    expr: Expr,
}

struct DictBind {
    deps: Vec<String>,
    expr: Expr,
    applied: RefCell<Vec<String>>,
}

enum TextContent {
    Static(String),
    Bind { deps: Vec<String>, expr: Expr },
}

struct ListState {
    expression: RefCell<Option<Expr>>,
    create_item: RefCell<Option<CreateItemFn>>,
    key_fn: RefCell<Option<KeyFn>>,
    keys: RefCell<Vec<Value>>,
}

struct ComponentState {
    component: RefCell<Option<Rc<Component>>>,
    // Slot content handed to the child. It mounts inside the child's
    // slots but its binds read the parent's state, so the parent keeps
    // updating it.
    slot_content: RefCell<Vec<Rc<Fragment>>>,
}

struct SlotState {
    name: String,
    ctx: Context,
    projected: Cell<bool>,
}

enum FragmentKind {
    Element,
    ControlFlow,
    List(ListState),
    Component(ComponentState),
    Slot(SlotState),
}

pub struct Fragment {
    renderer: Rc<dyn Renderer>,
    kind: FragmentKind,
    tag: RefCell<Tag>,
    parent: RefCell<Weak<Fragment>>,
    children: RefCell<Vec<Rc<Fragment>>>,
    element: RefCell<Option<NodeHandle>>,
    target: RefCell<Option<NodeHandle>>,
    attributes: RefCell<Vec<(String, Value)>>,
    binds: RefCell<Vec<BindEntry>>,
    dict_binds: RefCell<Vec<DictBind>>,
    text: RefCell<Option<TextContent>>,
    events: RefCell<Vec<(String, EventHandler)>>,
    condition: RefCell<Option<Cond>>,
    type_expr: RefCell<Option<Expr>>,
    slot_target: RefCell<Option<String>>,
    // Watchers driving structural changes (control flow branch, list
    // reconciliation, dynamic tag). Dropped on unmount, re-registered on
    // the next mount.
    structure_watcher: RefCell<Option<Box<dyn std::any::Any>>>,
    type_watcher: RefCell<Option<Box<dyn std::any::Any>>>,
}

impl Fragment {
    fn with_kind(renderer: &Rc<dyn Renderer>, tag: Tag, kind: FragmentKind) -> Rc<Fragment> {
        Rc::new(Fragment {
            renderer: renderer.clone(),
            kind,
            tag: RefCell::new(tag),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            element: RefCell::new(None),
            target: RefCell::new(None),
            attributes: RefCell::new(Vec::new()),
            binds: RefCell::new(Vec::new()),
            dict_binds: RefCell::new(Vec::new()),
            text: RefCell::new(None),
            events: RefCell::new(Vec::new()),
            condition: RefCell::new(None),
            type_expr: RefCell::new(None),
            slot_target: RefCell::new(None),
            structure_watcher: RefCell::new(None),
            type_watcher: RefCell::new(None),
        })
    }

    pub fn element_node(renderer: &Rc<dyn Renderer>, tag: &str) -> Rc<Fragment> {
        Fragment::with_kind(renderer, Tag::Host(tag.to_string()), FragmentKind::Element)
    }

    pub fn text_node(renderer: &Rc<dyn Renderer>) -> Rc<Fragment> {
        Fragment::with_kind(renderer, Tag::Text, FragmentKind::Element)
    }

    /// A fragment with no renderer node of its own; its children mount
    /// straight into the enclosing target. Compiled components use one of
    /// these as the template root.
    pub fn virtual_node(renderer: &Rc<dyn Renderer>) -> Rc<Fragment> {
        Fragment::with_kind(renderer, Tag::Virtual, FragmentKind::Element)
    }

    pub fn control_flow(renderer: &Rc<dyn Renderer>) -> Rc<Fragment> {
        Fragment::with_kind(renderer, Tag::Virtual, FragmentKind::ControlFlow)
    }

    pub fn list(renderer: &Rc<dyn Renderer>) -> Rc<Fragment> {
        Fragment::with_kind(
            renderer,
            Tag::Virtual,
            FragmentKind::List(ListState {
                expression: RefCell::new(None),
                create_item: RefCell::new(None),
                key_fn: RefCell::new(None),
                keys: RefCell::new(Vec::new()),
            }),
        )
    }

    pub fn component(renderer: &Rc<dyn Renderer>, def: ComponentDef) -> Rc<Fragment> {
        Fragment::with_kind(
            renderer,
            Tag::Component(def),
            FragmentKind::Component(ComponentState {
                component: RefCell::new(None),
                slot_content: RefCell::new(Vec::new()),
            }),
        )
    }

    pub fn slot(renderer: &Rc<dyn Renderer>, name: &str, ctx: &Context) -> Rc<Fragment> {
        Fragment::with_kind(
            renderer,
            Tag::Virtual,
            FragmentKind::Slot(SlotState {
                name: name.to_string(),
                ctx: ctx.clone(),
                projected: Cell::new(false),
            }),
        )
    }

    pub fn add_child(self: &Rc<Self>, child: &Rc<Fragment>) {
        child.set_parent(self);
        self.children.borrow_mut().push(child.clone());
    }

    fn set_parent(&self, parent: &Rc<Fragment>) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
    }

    // Setters used by compiled fragment factories.

    pub fn set_attribute(&self, name: &str, value: Value) {
        self.attributes
            .borrow_mut()
            .push((name.to_string(), value));
    }

    /// A dynamic attribute. `deps` names the state variables whose
    /// invalidation should re-evaluate the expression.
    pub fn set_bind(&self, name: &str, deps: &[&str], expr: impl Fn() -> Value + 'static) {
        self.binds.borrow_mut().push(BindEntry {
            key: name.to_string(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            expr: Rc::new(expr),
        });
    }

    /// A dynamic attribute map. Every entry of the evaluated map becomes
    /// an attribute; entries that disappear are removed again.
    pub fn set_bind_dict(&self, deps: &[&str], expr: impl Fn() -> Value + 'static) {
        self.dict_binds.borrow_mut().push(DictBind {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            expr: Rc::new(expr),
            applied: RefCell::new(Vec::new()),
        });
    }

    pub fn set_text(&self, content: &str) {
        *self.text.borrow_mut() = Some(TextContent::Static(content.to_string()));
    }

    pub fn set_bind_text(&self, deps: &[&str], expr: impl Fn() -> Value + 'static) {
        *self.text.borrow_mut() = Some(TextContent::Bind {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            expr: Rc::new(expr),
        });
    }

    pub fn set_event(&self, name: &str, handler: EventHandler) {
        self.events.borrow_mut().push((name.to_string(), handler));
    }

    /// Condition for a control flow branch. A branch without one is the
    /// unconditional else arm.
    pub fn set_condition(&self, condition: impl Fn() -> bool + 'static) {
        *self.condition.borrow_mut() = Some(Rc::new(condition));
    }

    /// Dynamic tag name. The element is torn down and recreated in place
    /// whenever the expression's value changes.
    pub fn set_type(&self, expr: impl Fn() -> Value + 'static) {
        *self.type_expr.borrow_mut() = Some(Rc::new(expr));
    }

    /// Which slot of a child component this fragment is projected into.
    pub fn set_slot_target(&self, name: &str) {
        *self.slot_target.borrow_mut() = Some(name.to_string());
    }

    pub fn set_expression(&self, deps: &[&str], expr: impl Fn() -> Value + 'static) {
        let FragmentKind::List(state) = &self.kind else {
            panic!("set_expression called on a non-list fragment");
        };
        let _ = deps;
        *state.expression.borrow_mut() = Some(Rc::new(expr));
    }

    pub fn set_create_item(&self, create: impl Fn(ItemAccessor) -> Rc<Fragment> + 'static) {
        let FragmentKind::List(state) = &self.kind else {
            panic!("set_create_item called on a non-list fragment");
        };
        *state.create_item.borrow_mut() = Some(Rc::new(create));
    }

    /// Key extractor enabling identity-preserving reconciliation.
    pub fn set_key(&self, key: impl Fn(&Value) -> Value + 'static) {
        let FragmentKind::List(state) = &self.kind else {
            panic!("set_key called on a non-list fragment");
        };
        *state.key_fn.borrow_mut() = Some(Rc::new(key));
    }

    // Anchors.

    /// The first live renderer node of this fragment, descending through
    /// virtual fragments and child components.
    pub fn first(&self) -> Option<NodeHandle> {
        if let Some(element) = self.element.borrow().clone() {
            return Some(element);
        }
        if let FragmentKind::Component(state) = &self.kind {
            if let Some(component) = state.component.borrow().as_ref() {
                return component.first();
            }
        }
        self.children.borrow().iter().find_map(|child| child.first())
    }

    /// The node that content belonging to `child` must be inserted before:
    /// the first live node of any later sibling, escalating past virtual
    /// parents when the siblings run out.
    pub fn anchor_for(self: &Rc<Self>, child: &Rc<Fragment>) -> Option<NodeHandle> {
        let found = {
            let children = self.children.borrow();
            let index = match children.iter().position(|c| Rc::ptr_eq(c, child)) {
                Some(index) => index,
                None => panic!("anchor_for: fragment is not a child of this parent"),
            };
            children[index + 1..].iter().find_map(|sibling| sibling.first())
        };
        if found.is_some() {
            return found;
        }
        if self.element.borrow().is_some() {
            return None;
        }
        self.parent
            .borrow()
            .upgrade()
            .and_then(|parent| parent.anchor_for(self))
    }

    fn anchor_in_parent(self: &Rc<Self>) -> Option<NodeHandle> {
        self.parent
            .borrow()
            .upgrade()
            .and_then(|parent| parent.anchor_for(self))
    }

    // Lifecycle.

    /// Create renderer state and insert it into `target`, before `anchor`
    /// when given. Mounting an unmounted fragment again recreates its
    /// element, binds and listeners from scratch.
    pub fn mount(self: &Rc<Self>, target: &NodeHandle, anchor: Option<&NodeHandle>) {
        *self.target.borrow_mut() = Some(target.clone());
        match &self.kind {
            FragmentKind::ControlFlow => self.mount_control_flow(),
            FragmentKind::List(_) => self.mount_list(),
            FragmentKind::Component(_) => self.mount_component(anchor),
            FragmentKind::Slot(_) => self.mount_slot(anchor),
            FragmentKind::Element => self.mount_element(target, anchor),
        }
    }

    fn mount_element(self: &Rc<Self>, target: &NodeHandle, anchor: Option<&NodeHandle>) {
        self.create();
        let element = self.element.borrow().clone();
        match element {
            Some(element) => {
                self.renderer.insert(&element, target, anchor);
                for child in self.children.borrow().clone() {
                    child.mount(&element, None);
                }
            }
            None => {
                for child in self.children.borrow().clone() {
                    child.mount(target, anchor);
                }
            }
        }
        if self.type_expr.borrow().is_some() {
            self.watch_type();
        }
    }

    /// Instantiate the renderer node and apply static attributes, current
    /// bind values, text content and event listeners.
    fn create(self: &Rc<Self>) {
        if let Some(type_expr) = self.type_expr.borrow().clone() {
            *self.tag.borrow_mut() = Tag::Host(type_expr().to_string());
        }
        let tag = self.tag.borrow().clone();
        match tag {
            Tag::Virtual | Tag::Component(_) => {}
            Tag::Text => {
                let element = self.renderer.create_text_element();
                self.apply_text(&element);
                *self.element.borrow_mut() = Some(element);
            }
            Tag::Host(name) => {
                let element = self.renderer.create_element(&name);
                for (attr, value) in self.attributes.borrow().iter() {
                    self.renderer.set_attribute(&element, attr, value);
                }
                for bind in self.binds.borrow().iter() {
                    self.renderer
                        .set_attribute(&element, &bind.key, &(bind.expr)());
                }
                for dict in self.dict_binds.borrow().iter() {
                    self.apply_dict_bind(&element, dict);
                }
                self.apply_text(&element);
                for (event, handler) in self.events.borrow().iter() {
                    self.renderer
                        .add_event_listener(&element, event, handler.clone());
                }
                *self.element.borrow_mut() = Some(element);
            }
        }
    }

    fn apply_text(&self, element: &NodeHandle) {
        match &*self.text.borrow() {
            Some(TextContent::Static(content)) => {
                self.renderer.set_element_text(element, content);
            }
            Some(TextContent::Bind { expr, .. }) => {
                self.renderer.set_element_text(element, &expr().to_string());
            }
            None => {}
        }
    }

    fn apply_dict_bind(&self, element: &NodeHandle, dict: &DictBind) {
        let value = (dict.expr)();
        let mut next_keys = Vec::new();
        if let Value::Map(entries) = &value {
            for (name, entry) in entries {
                self.renderer.set_attribute(element, name, entry);
                next_keys.push(name.clone());
            }
        }
        for stale in dict.applied.borrow().iter() {
            if !next_keys.contains(stale) {
                self.renderer.remove_attribute(element, stale);
            }
        }
        *dict.applied.borrow_mut() = next_keys;
    }

    fn mount_control_flow(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let getter = {
            let weak = weak.clone();
            move || -> i64 {
                let Some(this) = weak.upgrade() else { return -1 };
                let children = this.children.borrow().clone();
                for (index, branch) in children.iter().enumerate() {
                    let condition = branch.condition.borrow().clone();
                    match condition {
                        Some(condition) => {
                            if condition() {
                                return index as i64;
                            }
                        }
                        // The else arm always matches.
                        None => return index as i64,
                    }
                }
                -1
            }
        };
        let callback = move |new: &i64, old: Option<&i64>| {
            let Some(this) = weak.upgrade() else { return };
            if let Some(&old) = old {
                if old >= 0 {
                    let branch = this.children.borrow()[old as usize].clone();
                    branch.unmount();
                }
            }
            if *new >= 0 {
                let Some(target) = this.target.borrow().clone() else {
                    return;
                };
                let anchor = this.anchor_in_parent();
                let branch = this.children.borrow()[*new as usize].clone();
                branch.mount(&target, anchor.as_ref());
            }
        };
        let watcher = watch(
            getter,
            callback,
            WatchOptions {
                immediate: true,
                deep: true,
            },
        );
        *self.structure_watcher.borrow_mut() = Some(Box::new(watcher));
    }

    fn mount_list(self: &Rc<Self>) {
        let FragmentKind::List(state) = &self.kind else {
            return;
        };
        let Some(expression) = state.expression.borrow().clone() else {
            panic!("list fragment mounted without an expression");
        };
        let Some(create_item) = state.create_item.borrow().clone() else {
            panic!("list fragment mounted without a create_item factory");
        };
        let keyed = state.key_fn.borrow().clone();
        match keyed {
            Some(key_fn) => self.watch_keyed_list(expression, create_item, key_fn),
            None => self.watch_unkeyed_list(expression, create_item),
        }
    }

    /// Unkeyed lists reconcile by length: extra items are appended, excess
    /// items are truncated from the end. Surviving item fragments keep
    /// their positional accessor and pick up new data on the next update.
    fn watch_unkeyed_list(self: &Rc<Self>, expression: Expr, create_item: CreateItemFn) {
        let weak = Rc::downgrade(self);
        let getter = {
            let expression = expression.clone();
            move || expression().len()
        };
        let callback = move |new: &usize, _old: Option<&usize>| {
            let Some(this) = weak.upgrade() else { return };
            let Some(target) = this.target.borrow().clone() else {
                return;
            };
            let current = this.children.borrow().len();
            if *new > current {
                let anchor = this.anchor_in_parent();
                for index in current..*new {
                    let accessor: ItemAccessor = {
                        let expression = expression.clone();
                        Rc::new(move || expression().index(index))
                    };
                    let item = create_item(accessor);
                    this.add_child(&item);
                    item.mount(&target, anchor.as_ref());
                }
            } else if *new < current {
                let excess: Vec<Rc<Fragment>> =
                    this.children.borrow_mut().split_off(*new);
                for item in excess {
                    item.unmount();
                }
            }
        };
        let watcher = watch(
            getter,
            callback,
            WatchOptions {
                immediate: true,
                deep: true,
            },
        );
        *self.structure_watcher.borrow_mut() = Some(Box::new(watcher));
    }

    /// Keyed lists reconcile by item identity: removed keys unmount,
    /// fresh keys mount, and surviving items are moved with the minimum
    /// number of node moves (longest stable subsequence stays put).
    fn watch_keyed_list(self: &Rc<Self>, expression: Expr, create_item: CreateItemFn, key_fn: KeyFn) {
        let weak = Rc::downgrade(self);
        let getter = {
            let expression = expression.clone();
            let key_fn = key_fn.clone();
            move || -> Vec<Value> {
                match expression() {
                    Value::List(items) => items.iter().map(|item| key_fn(item)).collect(),
                    _ => Vec::new(),
                }
            }
        };
        let callback = move |new_keys: &Vec<Value>, _old: Option<&Vec<Value>>| {
            let Some(this) = weak.upgrade() else { return };
            let Some(target) = this.target.borrow().clone() else {
                return;
            };
            let FragmentKind::List(state) = &this.kind else {
                return;
            };
            let old_keys = state.keys.borrow().clone();
            let old_children = this.children.borrow().clone();

            // Unmount items whose key disappeared.
            for (key, item) in old_keys.iter().zip(old_children.iter()) {
                if !new_keys.contains(key) {
                    item.unmount();
                }
            }

            // Pair every new key with a reused or freshly created fragment.
            let mut new_children: Vec<Rc<Fragment>> = Vec::with_capacity(new_keys.len());
            let mut old_positions: Vec<Option<usize>> = Vec::with_capacity(new_keys.len());
            for key in new_keys {
                let position = old_keys.iter().position(|k| k == key);
                match position {
                    Some(position) => new_children.push(old_children[position].clone()),
                    None => {
                        let accessor: ItemAccessor = {
                            let expression = expression.clone();
                            let key_fn = key_fn.clone();
                            let key = key.clone();
                            Rc::new(move || {
                                if let Value::List(items) = expression() {
                                    for item in items {
                                        if key_fn(&item) == key {
                                            return item;
                                        }
                                    }
                                }
                                Value::Null
                            })
                        };
                        let item = create_item(accessor);
                        item.set_parent(&this);
                        new_children.push(item);
                    }
                }
                old_positions.push(position);
            }

            // Walk back to front so each item's anchor is already final.
            let stable = longest_stable_run(&old_positions);
            let mut anchor = this.anchor_in_parent();
            for index in (0..new_children.len()).rev() {
                let item = &new_children[index];
                if old_positions[index].is_none() {
                    item.mount(&target, anchor.as_ref());
                } else if !stable[index] {
                    item.move_before(&target, anchor.as_ref());
                }
                anchor = item.first().or(anchor);
            }

            *this.children.borrow_mut() = new_children;
            *state.keys.borrow_mut() = new_keys.clone();
        };
        let watcher = watch(
            getter,
            callback,
            WatchOptions {
                immediate: true,
                deep: true,
            },
        );
        *self.structure_watcher.borrow_mut() = Some(Box::new(watcher));
    }

    fn move_before(self: &Rc<Self>, target: &NodeHandle, anchor: Option<&NodeHandle>) {
        match self.element.borrow().clone() {
            Some(element) => {
                self.renderer.remove(&element, target);
                self.renderer.insert(&element, target, anchor);
            }
            None => {
                // No single node to move; remount the whole subtree.
                self.unmount();
                self.mount(target, anchor);
            }
        }
    }

    fn mount_component(self: &Rc<Self>, anchor: Option<&NodeHandle>) {
        let FragmentKind::Component(state) = &self.kind else {
            return;
        };
        let Some(target) = self.target.borrow().clone() else {
            return;
        };
        let existing = state.component.borrow().clone();
        let component = match existing {
            Some(component) => component,
            None => {
                // Children attached to a component fragment are the slot
                // content the parent template passes down.
                let content: Vec<Rc<Fragment>> =
                    self.children.borrow_mut().drain(..).collect();
                *state.slot_content.borrow_mut() = content.clone();
                let mut slots: BTreeMap<String, Vec<Rc<Fragment>>> = BTreeMap::new();
                for fragment in content {
                    let name = fragment
                        .slot_target
                        .borrow()
                        .clone()
                        .unwrap_or_else(|| "default".to_string());
                    slots.entry(name).or_default().push(fragment);
                }

                let props = Reactive::new();
                for (name, value) in self.attributes.borrow().iter() {
                    props.set(name, value.clone());
                }
                for bind in self.binds.borrow().iter() {
                    props.set(&bind.key, (bind.expr)());
                }

                let Tag::Component(def) = self.tag.borrow().clone() else {
                    panic!("component fragment without a component tag");
                };
                let component = Component::new(&self.renderer, def, props, slots);
                for (event, handler) in self.events.borrow().iter() {
                    component.on(event, handler.clone());
                }
                *state.component.borrow_mut() = Some(component.clone());
                component
            }
        };
        component.mount(&target, anchor);
    }

    fn mount_slot(self: &Rc<Self>, anchor: Option<&NodeHandle>) {
        let FragmentKind::Slot(state) = &self.kind else {
            return;
        };
        let Some(target) = self.target.borrow().clone() else {
            return;
        };
        if !state.projected.get() {
            state.projected.set(true);
            if let Some(content) = state.ctx.slot_content(&state.name) {
                // Projected content replaces the fallback children.
                for fragment in &content {
                    fragment.set_parent(self);
                }
                *self.children.borrow_mut() = content;
            }
        }
        for child in self.children.borrow().clone() {
            child.mount(&target, anchor);
        }
    }

    fn watch_type(self: &Rc<Self>) {
        let Some(type_expr) = self.type_expr.borrow().clone() else {
            return;
        };
        let weak = Rc::downgrade(self);
        let getter = move || type_expr().to_string();
        let callback = move |new: &String, old: Option<&String>| {
            if old.is_none() {
                return;
            }
            let Some(this) = weak.upgrade() else { return };
            this.remount_as(new);
        };
        let watcher = watch(
            getter,
            callback,
            WatchOptions {
                immediate: true,
                deep: true,
            },
        );
        *self.type_watcher.borrow_mut() = Some(Box::new(watcher));
    }

    /// Swap the host element for one with a different tag, in place. The
    /// new element gets the same attributes, binds, listeners and children.
    fn remount_as(self: &Rc<Self>, tag: &str) {
        let Some(target) = self.target.borrow().clone() else {
            return;
        };
        let anchor = self.anchor_in_parent();
        for child in self.children.borrow().clone() {
            child.unmount();
        }
        if let Some(element) = self.element.borrow_mut().take() {
            self.renderer.remove(&element, &target);
        }
        *self.tag.borrow_mut() = Tag::Host(tag.to_string());
        self.create();
        if let Some(element) = self.element.borrow().clone() {
            self.renderer.insert(&element, &target, anchor.as_ref());
            for child in self.children.borrow().clone() {
                child.mount(&element, None);
            }
        }
    }

    /// Re-apply every dynamic bind whose dependency set intersects
    /// `dirty`, then recurse. Component fragments forward the changed
    /// props to their child component instead.
    pub fn update(&self, dirty: &BTreeSet<String>) {
        if dirty.is_empty() {
            return;
        }
        if let FragmentKind::Component(state) = &self.kind {
            let mut changes: Vec<(String, Value)> = Vec::new();
            for bind in self.binds.borrow().iter() {
                if bind.deps.iter().any(|dep| dirty.contains(dep)) {
                    changes.push((bind.key.clone(), (bind.expr)()));
                }
            }
            if !changes.is_empty() {
                if let Some(component) = state.component.borrow().clone() {
                    component.set(changes);
                }
            }
            for fragment in state.slot_content.borrow().clone() {
                fragment.update(dirty);
            }
            return;
        }
        if let Some(element) = self.element.borrow().clone() {
            for bind in self.binds.borrow().iter() {
                if bind.deps.iter().any(|dep| dirty.contains(dep)) {
                    self.renderer
                        .set_attribute(&element, &bind.key, &(bind.expr)());
                }
            }
            for dict in self.dict_binds.borrow().iter() {
                if dict.deps.iter().any(|dep| dirty.contains(dep)) {
                    self.apply_dict_bind(&element, dict);
                }
            }
            if let Some(TextContent::Bind { deps, expr }) = &*self.text.borrow() {
                if deps.iter().any(|dep| dirty.contains(dep)) {
                    self.renderer
                        .set_element_text(&element, &expr().to_string());
                }
            }
        }
        for child in self.children.borrow().clone() {
            child.update(dirty);
        }
    }

    /// Remove this fragment's renderer state. The fragment itself stays
    /// intact and can be mounted again.
    pub fn unmount(self: &Rc<Self>) {
        match &self.kind {
            FragmentKind::Component(state) => {
                if let Some(component) = state.component.borrow().clone() {
                    component.unmount();
                }
            }
            FragmentKind::List(state) => {
                let items: Vec<Rc<Fragment>> =
                    self.children.borrow_mut().drain(..).collect();
                for item in items {
                    item.unmount();
                }
                state.keys.borrow_mut().clear();
            }
            _ => {
                for child in self.children.borrow().clone() {
                    child.unmount();
                }
                let element = self.element.borrow_mut().take();
                if let (Some(element), Some(target)) = (element, self.target.borrow().clone()) {
                    self.renderer.remove(&element, &target);
                }
            }
        }
        *self.structure_watcher.borrow_mut() = None;
        *self.type_watcher.borrow_mut() = None;
    }

    /// Tear down for good: unregister listeners, drop renderer nodes and
    /// watchers, recurse into children.
    pub fn destroy(self: &Rc<Self>) {
        if let FragmentKind::Component(state) = &self.kind {
            if let Some(component) = state.component.borrow_mut().take() {
                component.destroy();
            }
        }
        for child in self.children.borrow().clone() {
            child.destroy();
        }
        let element = self.element.borrow_mut().take();
        if let Some(element) = element {
            for (event, handler) in self.events.borrow().iter() {
                self.renderer.remove_event_listener(&element, event, handler);
            }
            if let Some(target) = self.target.borrow().clone() {
                self.renderer.remove(&element, &target);
            }
        }
        self.children.borrow_mut().clear();
        *self.structure_watcher.borrow_mut() = None;
        *self.type_watcher.borrow_mut() = None;
    }
}

/// Mark the longest run of items that are already in relative order, so
/// reconciliation only moves the rest. `old_positions[i]` is where the
/// i-th new item sat in the old list, `None` for fresh items.
fn longest_stable_run(old_positions: &[Option<usize>]) -> Vec<bool> {
    let mut stable = vec![false; old_positions.len()];
    // (position in old_positions, old index) tails of increasing runs.
    let mut tails: Vec<(usize, usize)> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; old_positions.len()];
    for (position, entry) in old_positions.iter().enumerate() {
        let Some(value) = *entry else { continue };
        let insert_at = tails.partition_point(|&(_, tail)| tail < value);
        if insert_at > 0 {
            prev[position] = Some(tails[insert_at - 1].0);
        }
        if insert_at == tails.len() {
            tails.push((position, value));
        } else {
            tails[insert_at] = (position, value);
        }
    }
    let mut cursor = tails.last().map(|&(position, _)| position);
    while let Some(position) = cursor {
        stable[position] = true;
        cursor = prev[position];
    }
    stable
}
