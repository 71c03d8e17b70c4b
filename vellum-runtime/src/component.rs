// vellum-runtime/src/component.rs

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use vellum_core::{Reactive, Value, WatchOptions, Watcher, watch};

use crate::context::Context;
use crate::fragment::Fragment;
use crate::renderer::{EventHandler, NodeHandle, Renderer};
use crate::scheduler;

type InstanceFn = Rc<dyn Fn(&Reactive, &Invalidate) -> Context>;
type CreateFragmentFn = Rc<dyn Fn(&Context, &Rc<dyn Renderer>) -> Rc<Fragment>>;

/// A compiled component: its script translated to an instance function and
/// its template translated to a fragment factory. Compiled modules expose
/// one of these per component.
#[derive(Clone)]
pub struct ComponentDef {
    name: &'static str,
    instance: InstanceFn,
    create_fragment: CreateFragmentFn,
}

impl ComponentDef {
    pub fn new(
        name: &'static str,
        instance: impl Fn(&Reactive, &Invalidate) -> Context + 'static,
        create_fragment: impl Fn(&Context, &Rc<dyn Renderer>) -> Rc<Fragment> + 'static,
    ) -> ComponentDef {
        ComponentDef {
            name,
            instance: Rc::new(instance),
            create_fragment: Rc::new(create_fragment),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Routes reactive writes back into the owning component: the context is
/// updated, the variable is marked dirty and the component is queued for
/// the next flush. Compiled handlers call this for every write to a
/// variable the analysis marked as changing.
#[derive(Clone)]
pub struct Invalidate {
    inner: Rc<dyn Fn(&str, Value)>,
}

impl Invalidate {
    fn from_weak(weak: Weak<Component>) -> Invalidate {
        Invalidate {
            inner: Rc::new(move |name, value| {
                if let Some(component) = weak.upgrade() {
                    component.invalidate(name, value);
                }
            }),
        }
    }

    /// An invalidate channel that drops writes. Useful when running an
    /// instance function without a live component.
    pub fn noop() -> Invalidate {
        Invalidate {
            inner: Rc::new(|_, _| {}),
        }
    }

    pub fn call(&self, name: &str, value: Value) {
        (self.inner)(name, value);
    }
}

/// One live instance of a component definition.
pub struct Component {
    def: ComponentDef,
    ctx: Context,
    fragment: Rc<Fragment>,
    props: Reactive,
    dirty: RefCell<BTreeSet<String>>,
    listeners: RefCell<IndexMap<String, Vec<EventHandler>>>,
    mounted: Cell<bool>,
    _props_watcher: Watcher<BTreeMap<String, Value>>,
}

impl Component {
    pub fn new(
        renderer: &Rc<dyn Renderer>,
        def: ComponentDef,
        props: Reactive,
        slots: BTreeMap<String, Vec<Rc<Fragment>>>,
    ) -> Rc<Component> {
        Rc::new_cyclic(|weak: &Weak<Component>| {
            let invalidate = Invalidate::from_weak(weak.clone());
            let ctx = (def.instance)(&props, &invalidate);
            ctx.set_slots(slots);
            {
                let weak = weak.clone();
                ctx.set_emitter(Rc::new(move |event, args| {
                    if let Some(component) = weak.upgrade() {
                        component.emit(event, args);
                    }
                }));
            }
            let fragment = (def.create_fragment)(&ctx, renderer);

            // Props flow into state through invalidation, so a parent
            // writing a prop updates the child without a remount.
            let props_watcher = {
                let props = props.clone();
                let weak = weak.clone();
                watch(
                    move || props.snapshot(),
                    move |new: &BTreeMap<String, Value>, old: Option<&BTreeMap<String, Value>>| {
                        let Some(component) = weak.upgrade() else { return };
                        for (name, value) in new {
                            let changed = old.is_none_or(|old| old.get(name) != Some(value));
                            if changed {
                                component.invalidate(name, value.clone());
                            }
                        }
                    },
                    WatchOptions {
                        deep: true,
                        ..Default::default()
                    },
                )
            };

            Component {
                def,
                ctx,
                fragment,
                props,
                dirty: RefCell::new(BTreeSet::new()),
                listeners: RefCell::new(IndexMap::new()),
                mounted: Cell::new(false),
                _props_watcher: props_watcher,
            }
        })
    }

    pub fn name(&self) -> &'static str {
        self.def.name()
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn fragment(&self) -> &Rc<Fragment> {
        &self.fragment
    }

    pub fn first(&self) -> Option<NodeHandle> {
        self.fragment.first()
    }

    /// Record a state change and queue this component for an update pass.
    pub fn invalidate(self: &Rc<Self>, name: &str, value: Value) {
        self.ctx.set(name, value);
        self.dirty.borrow_mut().insert(name.to_string());
        scheduler::enqueue(self.clone());
    }

    /// Write a batch of prop changes coming from the parent.
    pub fn set(&self, changes: Vec<(String, Value)>) {
        for (name, value) in changes {
            self.props.set(&name, value);
        }
    }

    /// Drain the dirty set and re-apply the affected binds. A flush with
    /// nothing dirty is a no-op.
    pub fn flush_update(&self) {
        let dirty = std::mem::take(&mut *self.dirty.borrow_mut());
        if dirty.is_empty() {
            return;
        }
        log::trace!("updating `{}`: {:?}", self.def.name(), dirty);
        self.fragment.update(&dirty);
        self.emit("updated", &[]);
    }

    pub fn mount(self: &Rc<Self>, target: &NodeHandle, anchor: Option<&NodeHandle>) {
        self.fragment.mount(target, anchor);
        if !self.mounted.replace(true) {
            self.emit("mounted", &[]);
        }
    }

    pub fn unmount(self: &Rc<Self>) {
        self.fragment.unmount();
        self.mounted.set(false);
    }

    pub fn destroy(self: &Rc<Self>) {
        self.fragment.destroy();
        self.mounted.set(false);
        self.emit("destroyed", &[]);
        self.listeners.borrow_mut().clear();
    }

    /// Subscribe to a component event (emitted by the child's script, or
    /// one of the lifecycle events).
    pub fn on(&self, event: &str, handler: EventHandler) {
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    pub fn emit(&self, event: &str, args: &[Value]) {
        let handlers: Vec<EventHandler> = self
            .listeners
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(args);
        }
    }
}
