use std::cell::RefCell;
use std::rc::Rc;

use vellum_core::{Reactive, Value, WatchOptions, computed, watch};

#[test]
fn computed_caches_until_dependency_changes() {
    let state = Reactive::new();
    state.set("n", Value::from(2));

    let runs: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));
    let doubled = {
        let source = state.clone();
        let runs = runs.clone();
        computed(move || {
            *runs.borrow_mut() += 1;
            source.get("n") * Value::from(2)
        })
    };

    assert_eq!(doubled.get(), Value::from(4));
    assert_eq!(doubled.get(), Value::from(4));
    assert_eq!(*runs.borrow(), 1);

    state.set("n", Value::from(5));
    assert_eq!(doubled.get(), Value::from(10));
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn computed_is_trackable_by_watchers() {
    let state = Reactive::new();
    state.set("n", Value::from(1));

    let squared = {
        let source = state.clone();
        computed(move || {
            let n = source.get("n");
            n.clone() * n
        })
    };

    let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(vec![]));
    let _watcher = {
        let squared = squared.clone();
        let seen = seen.clone();
        watch(
            move || squared.get(),
            move |new, _old| seen.borrow_mut().push(new.clone()),
            WatchOptions::default(),
        )
    };

    state.set("n", Value::from(3));
    assert_eq!(&*seen.borrow(), &vec![Value::from(9)]);
}
