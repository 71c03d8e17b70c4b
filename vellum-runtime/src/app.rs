// vellum-runtime/src/app.rs

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use vellum_core::Reactive;

use crate::component::{Component, ComponentDef};
use crate::renderer::{EventLoopType, NodeHandle, Renderer};
use crate::scheduler::{self, FlushMode};

/// The application driver: owns the renderer and every mounted root
/// component, and wires the scheduler to the renderer's preferred event
/// loop. Roots must stay owned somewhere; the invalidation and emitter
/// channels only hold weak references back to their component.
pub struct Vellum {
    renderer: Rc<dyn Renderer>,
    roots: RefCell<Vec<Rc<Component>>>,
}

impl Vellum {
    pub fn new(renderer: Rc<dyn Renderer>) -> Vellum {
        let mode = match renderer.preferred_event_loop_type() {
            EventLoopType::Sync | EventLoopType::Default => FlushMode::Immediate,
            EventLoopType::Async | EventLoopType::HostToolkit => FlushMode::Deferred,
        };
        scheduler::set_flush_mode(mode);
        Vellum {
            renderer,
            roots: RefCell::new(Vec::new()),
        }
    }

    pub fn renderer(&self) -> &Rc<dyn Renderer> {
        &self.renderer
    }

    /// Instantiate `def` with `state` as its props and mount it into
    /// `target`. Writes to `state` afterwards flow into the component.
    pub fn render(
        &self,
        def: &ComponentDef,
        target: &NodeHandle,
        state: Option<Reactive>,
    ) -> Rc<Component> {
        let props = state.unwrap_or_default();
        let component = Component::new(&self.renderer, def.clone(), props, BTreeMap::new());
        component.mount(target, None);
        self.roots.borrow_mut().push(component.clone());
        log::debug!("mounted root component `{}`", def.name());
        component
    }

    /// Destroy and release every root mounted through [`render`].
    ///
    /// [`render`]: Vellum::render
    pub fn teardown(&self) {
        for component in self.roots.borrow_mut().drain(..) {
            component.destroy();
        }
    }
}
