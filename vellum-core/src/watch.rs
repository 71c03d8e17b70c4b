// vellum-core/src/watch.rs

use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::{WatchCell, run_cell, with_tracking};

#[derive(Clone, Copy, Default)]
pub struct WatchOptions {
    /// Fire the callback once, synchronously, at registration with
    /// `old == None`.
    pub immediate: bool,
    /// Also re-run on structural/nested mutations of any reactive map the
    /// getter touched, not just on tracked key changes.
    pub deep: bool,
}

/// Handle for a registered watcher. Dropping it unsubscribes the watcher
/// from every dependency it collected.
pub struct Watcher<T> {
    _cell: Rc<WatchCell>,
    value: Rc<RefCell<Option<T>>>,
}

impl<T: Clone> Watcher<T> {
    /// The most recently computed getter value.
    pub fn value(&self) -> Option<T> {
        self.value.borrow().clone()
    }
}

/// Watch a reactive source and call `callback(new, old)` when it changes.
///
/// The getter runs once at registration to collect dependencies. Changes
/// are detected by `PartialEq` comparison against the previous value, so
/// writes that produce an equal value do not call back.
pub fn watch<T, G, C>(getter: G, callback: C, options: WatchOptions) -> Watcher<T>
where
    T: Clone + PartialEq + 'static,
    G: Fn() -> T + 'static,
    C: FnMut(&T, Option<&T>) + 'static,
{
    let value: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let cell: Rc<WatchCell> = Rc::new(RefCell::new(Box::new(|| {})));

    let run = {
        let value = value.clone();
        // Weak, so the cell is owned by the Watcher alone and dropping the
        // handle really disposes the subscription.
        let cell = Rc::downgrade(&cell);
        let callback = RefCell::new(callback);
        move || {
            let Some(cell) = cell.upgrade() else { return };
            let next = with_tracking(&cell, options.deep, &getter);
            let previous = value.borrow_mut().replace(next.clone());
            match previous {
                Some(old) => {
                    if old != next {
                        (callback.borrow_mut())(&next, Some(&old));
                    }
                }
                None => {
                    if options.immediate {
                        (callback.borrow_mut())(&next, None);
                    }
                }
            }
        }
    };
    *cell.borrow_mut() = Box::new(run);

    // Initial evaluation collects dependencies (and fires the callback when
    // immediate was requested).
    run_cell(&cell);

    Watcher { _cell: cell, value }
}
