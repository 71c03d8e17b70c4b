// vellum-runtime/src/context.rs

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;
use vellum_core::{Reactive, Value};

use crate::fragment::Fragment;
use crate::renderer::EventHandler;

type Emitter = Rc<dyn Fn(&str, &[Value])>;

/// The render context of one component instance: its reactive state, the
/// event handlers its script declared, any slot content passed in by the
/// parent, and a channel for emitting component events upward.
///
/// Cloning a `Context` shares the underlying state; generated fragment
/// factories capture clones of it in their bind closures.
#[derive(Clone, Default)]
pub struct Context {
    state: Reactive,
    handlers: Rc<RefCell<IndexMap<String, EventHandler>>>,
    slots: Rc<RefCell<BTreeMap<String, Vec<Rc<Fragment>>>>>,
    emitter: Rc<RefCell<Option<Emitter>>>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    pub fn state(&self) -> &Reactive {
        &self.state
    }

    /// Tracked read of one state variable. Absent names read as `Null`.
    pub fn get(&self, name: &str) -> Value {
        self.state.get(name)
    }

    pub fn set(&self, name: &str, value: Value) {
        self.state.set(name, value);
    }

    pub fn set_handler(&self, name: &str, handler: EventHandler) {
        self.handlers
            .borrow_mut()
            .insert(name.to_string(), handler);
    }

    /// Look up a handler declared by the script. A missing name is a fault
    /// in the generated code, not a recoverable condition.
    pub fn handler(&self, name: &str) -> EventHandler {
        match self.handlers.borrow().get(name) {
            Some(handler) => handler.clone(),
            None => panic!("no handler named `{name}` in context"),
        }
    }

    pub fn call(&self, name: &str, args: &[Value]) {
        (self.handler(name))(args);
    }

    pub fn set_slots(&self, slots: BTreeMap<String, Vec<Rc<Fragment>>>) {
        *self.slots.borrow_mut() = slots;
    }

    pub fn slot_content(&self, name: &str) -> Option<Vec<Rc<Fragment>>> {
        self.slots
            .borrow()
            .get(name)
            .filter(|content| !content.is_empty())
            .cloned()
    }

    pub(crate) fn set_emitter(&self, emitter: Emitter) {
        *self.emitter.borrow_mut() = Some(emitter);
    }

    /// Emit a component event toward the parent, if anyone is listening.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let emitter = self.emitter.borrow().clone();
        if let Some(emitter) = emitter {
            emitter(event, args);
        }
    }
}
