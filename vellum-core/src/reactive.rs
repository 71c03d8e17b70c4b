// vellum-core/src/reactive.rs

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::value::Value;

/// A watcher's re-run closure. Dependencies hold weak references so that
/// dropping the `Watcher` handle is enough to unsubscribe it everywhere.
pub(crate) type WatchCell = RefCell<Box<dyn FnMut()>>;

struct ActiveFrame {
    cell: Rc<WatchCell>,
    deep: bool,
}

// Holds the currently running/collecting watcher during dependency tracking,
// plus a run queue so that writes made from inside a running watcher are not
// lost while its closure is checked out.
thread_local! {
    static ACTIVE: RefCell<Vec<ActiveFrame>> = RefCell::new(Vec::new());
    static RUN_QUEUE: RefCell<Vec<Rc<WatchCell>>> = RefCell::new(Vec::new());
    static QUEUED: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    static DRAINING: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

fn cell_id(cell: &Rc<WatchCell>) -> usize {
    Rc::as_ptr(cell) as *const () as usize
}

fn enqueue(cell: Rc<WatchCell>) {
    let id = cell_id(&cell);
    let fresh = QUEUED.with(|queued| {
        let mut queued = queued.borrow_mut();
        if queued.contains(&id) {
            false
        } else {
            queued.push(id);
            true
        }
    });
    if fresh {
        RUN_QUEUE.with(|queue| queue.borrow_mut().push(cell));
    }
}

/// Drain the run queue. Watchers enqueued while draining (a callback that
/// writes reactive state) are picked up by the same drain, so the whole
/// cascade completes before the triggering write returns.
fn drain_queue() {
    if DRAINING.with(|flag| flag.replace(true)) {
        return;
    }
    loop {
        let next = RUN_QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            if queue.is_empty() {
                None
            } else {
                Some(queue.remove(0))
            }
        });
        let Some(cell) = next else { break };
        QUEUED.with(|queued| queued.borrow_mut().retain(|id| *id != cell_id(&cell)));
        run_cell(&cell);
    }
    DRAINING.with(|flag| flag.set(false));
}

/// One dependency slot: a set of subscribed watchers.
#[derive(Default)]
pub(crate) struct Dep {
    subs: RefCell<Vec<Weak<WatchCell>>>,
}

impl Dep {
    /// Register the currently collecting watcher (if any) as a subscriber.
    pub(crate) fn track(&self) {
        ACTIVE.with(|active| {
            if let Some(frame) = active.borrow().last() {
                let mut subs = self.subs.borrow_mut();
                let already = subs
                    .iter()
                    .any(|w| w.upgrade().is_some_and(|s| Rc::ptr_eq(&s, &frame.cell)));
                if !already {
                    subs.push(Rc::downgrade(&frame.cell));
                }
            }
        });
    }

    /// Like `track`, but only subscribes watchers that asked for deep
    /// tracking. Used for the structural dependency of a reactive map.
    pub(crate) fn track_deep(&self) {
        ACTIVE.with(|active| {
            if let Some(frame) = active.borrow().last() {
                if !frame.deep {
                    return;
                }
                let mut subs = self.subs.borrow_mut();
                let already = subs
                    .iter()
                    .any(|w| w.upgrade().is_some_and(|s| Rc::ptr_eq(&s, &frame.cell)));
                if !already {
                    subs.push(Rc::downgrade(&frame.cell));
                }
            }
        });
    }

    /// Re-run every live subscriber, synchronously, via the run queue.
    /// Dead weak refs are pruned in passing.
    pub(crate) fn trigger(&self) {
        let subscribers: Vec<Rc<WatchCell>> = {
            let mut subs = self.subs.borrow_mut();
            subs.retain(|w| w.upgrade().is_some());
            subs.iter().filter_map(Weak::upgrade).collect()
        };

        for cell in subscribers {
            enqueue(cell);
        }
        drain_queue();
    }
}

/// Extract the closure out of the cell before running it, so the body may
/// freely read reactive state and re-trigger without a double borrow.
pub(crate) fn run_cell(cell: &Rc<WatchCell>) {
    let mut func: Box<dyn FnMut()> = {
        let mut slot = cell.borrow_mut();
        std::mem::replace(&mut *slot, Box::new(|| {}))
    };
    func();
    *cell.borrow_mut() = func;
}

/// Run `f` while collecting dependencies for `cell`.
pub(crate) fn with_tracking<T>(cell: &Rc<WatchCell>, deep: bool, f: impl FnOnce() -> T) -> T {
    ACTIVE.with(|active| {
        active.borrow_mut().push(ActiveFrame {
            cell: cell.clone(),
            deep,
        });
    });
    let result = f();
    ACTIVE.with(|active| {
        active.borrow_mut().pop();
    });
    result
}

struct ReactiveInner {
    values: RefCell<BTreeMap<String, Value>>,
    key_deps: RefCell<BTreeMap<String, Rc<Dep>>>,
    // Triggered on every write; deep watchers and key-set observers
    // subscribe here.
    structure: Rc<Dep>,
}

/// An observable mapping of `String -> Value`. Reads inside a `watch`
/// getter are tracked per key; writes trigger the subscribed watchers
/// synchronously.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

impl Default for Reactive {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactive {
    pub fn new() -> Self {
        Reactive {
            inner: Rc::new(ReactiveInner {
                values: RefCell::new(BTreeMap::new()),
                key_deps: RefCell::new(BTreeMap::new()),
                structure: Rc::new(Dep::default()),
            }),
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        let reactive = Reactive::new();
        {
            let mut values = reactive.inner.values.borrow_mut();
            for (key, value) in entries {
                values.insert(key, value);
            }
        }
        reactive
    }

    fn dep_for(&self, key: &str) -> Rc<Dep> {
        let mut deps = self.inner.key_deps.borrow_mut();
        deps.entry(key.to_string()).or_default().clone()
    }

    /// Tracked read. Returns `Null` for absent keys.
    pub fn get(&self, key: &str) -> Value {
        self.dep_for(key).track();
        self.inner.structure.track_deep();
        self.inner
            .values
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Tracked read with a fallback used when the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.dep_for(key).track();
        self.inner.structure.track_deep();
        match self.inner.values.borrow().get(key) {
            Some(value) => value.clone(),
            None => default,
        }
    }

    /// Write a value; triggers the key's watchers when the value changed
    /// and the structural/deep watchers on every write.
    pub fn set(&self, key: &str, value: Value) {
        let changed = {
            let mut values = self.inner.values.borrow_mut();
            let changed = values.get(key) != Some(&value);
            values.insert(key.to_string(), value);
            changed
        };
        if changed {
            self.dep_for(key).trigger();
        }
        self.inner.structure.trigger();
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.values.borrow_mut().remove(key);
        if removed.is_some() {
            self.dep_for(key).trigger();
            self.inner.structure.trigger();
        }
        removed
    }

    /// Mutate a container value in place. Triggers like `set`.
    pub fn update(&self, key: &str, f: impl FnOnce(&mut Value)) {
        {
            let mut values = self.inner.values.borrow_mut();
            let slot = values.entry(key.to_string()).or_default();
            f(slot);
        }
        self.dep_for(key).trigger();
        self.inner.structure.trigger();
    }

    /// Tracked key-set read (structural dependency).
    pub fn keys(&self) -> Vec<String> {
        self.inner.structure.track();
        self.inner.values.borrow().keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.structure.track();
        self.inner.values.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.structure.track();
        self.inner.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untracked copy of the current contents. Deep watchers use this as
    /// their getter so that any write re-runs the comparison.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.inner.structure.track();
        self.inner.values.borrow().clone()
    }

    pub fn ptr_eq(a: &Reactive, b: &Reactive) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}
