// vellum-runtime/src/scheduler.rs

//! Per-thread update queue. Invalidated components are queued in first
//! invalidation order and deduplicated; a flush drains the queue fully,
//! including components invalidated while flushing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::component::Component;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushMode {
    /// Flush as soon as a component is queued. The default; what a
    /// synchronous event loop wants.
    Immediate,
    /// Only queue; the host calls [`flush`] from its own loop.
    Deferred,
}

thread_local! {
    static QUEUE: RefCell<Vec<Rc<Component>>> = const { RefCell::new(Vec::new()) };
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
    static MODE: Cell<FlushMode> = const { Cell::new(FlushMode::Immediate) };
}

pub fn set_flush_mode(mode: FlushMode) {
    MODE.with(|m| m.set(mode));
}

pub fn enqueue(component: Rc<Component>) {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if !queue.iter().any(|queued| Rc::ptr_eq(queued, &component)) {
            queue.push(component);
        }
    });
    if MODE.with(Cell::get) == FlushMode::Immediate {
        flush();
    }
}

/// Drain the queue in FIFO order. Re-entrant calls return immediately;
/// the outer flush picks up whatever they queued.
pub fn flush() {
    if FLUSHING.with(|flag| flag.replace(true)) {
        return;
    }
    loop {
        let next = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        });
        let Some(component) = next else { break };
        component.flush_update();
    }
    FLUSHING.with(|flag| flag.set(false));
}

pub fn pending() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Drop all queued work. Tests call this between cases so one scenario's
/// leftovers never leak into the next.
pub fn clear() {
    QUEUE.with(|queue| queue.borrow_mut().clear());
    FLUSHING.with(|flag| flag.set(false));
}
