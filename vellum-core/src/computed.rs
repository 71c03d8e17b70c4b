// vellum-core/src/computed.rs

use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::{Dep, WatchCell, with_tracking};

struct ComputedInner<T> {
    cache: Rc<RefCell<Option<T>>>,
    dep: Rc<Dep>,
    cell: Rc<WatchCell>,
    getter: Box<dyn Fn() -> T>,
}

/// A cached derived value. The getter re-runs lazily after any tracked
/// dependency changed; reads of the computed value are themselves
/// trackable by outer watchers.
#[derive(Clone)]
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

pub fn computed<T, G>(getter: G) -> Computed<T>
where
    T: Clone + 'static,
    G: Fn() -> T + 'static,
{
    let cache: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let dep = Rc::new(Dep::default());
    let cell: Rc<WatchCell> = Rc::new(RefCell::new(Box::new(|| {})));

    // Invalidate the cache and notify dependents when a dependency fires.
    {
        let cache = cache.clone();
        let dep = dep.clone();
        *cell.borrow_mut() = Box::new(move || {
            cache.borrow_mut().take();
            dep.trigger();
        });
    }

    Computed {
        inner: Rc::new(ComputedInner {
            cache,
            dep,
            cell,
            getter: Box::new(getter),
        }),
    }
}

impl<T: Clone + 'static> Computed<T> {
    pub fn get(&self) -> T {
        self.inner.dep.track();
        if let Some(value) = self.inner.cache.borrow().as_ref() {
            return value.clone();
        }
        let value = with_tracking(&self.inner.cell, false, || (self.inner.getter)());
        *self.inner.cache.borrow_mut() = Some(value.clone());
        value
    }
}
