use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use vellum_core::{Reactive, Value};
use vellum_runtime::{
    Component, ComponentDef, Context, Fragment, Renderer, TreeRenderer, scheduler,
};
use vellum_runtime::scheduler::FlushMode;

fn probe_def(name: &'static str) -> ComponentDef {
    ComponentDef::new(
        name,
        |_props, _invalidate| Context::new(),
        |_ctx, renderer| Fragment::virtual_node(renderer),
    )
}

fn probe(renderer: &Rc<dyn Renderer>, name: &'static str) -> Rc<Component> {
    Component::new(renderer, probe_def(name), Reactive::new(), BTreeMap::new())
}

fn record_updates(component: &Rc<Component>, log: &Rc<RefCell<Vec<&'static str>>>) {
    let log = log.clone();
    let name = component.name();
    component.on("updated", Rc::new(move |_args| log.borrow_mut().push(name)));
}

#[test]
fn deferred_flush_runs_components_in_invalidation_order() {
    scheduler::clear();
    scheduler::set_flush_mode(FlushMode::Deferred);
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());

    let first = probe(&renderer, "first");
    let second = probe(&renderer, "second");
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));
    record_updates(&first, &log);
    record_updates(&second, &log);

    second.invalidate("x", Value::from(1));
    first.invalidate("x", Value::from(1));
    assert_eq!(scheduler::pending(), 2);
    assert!(log.borrow().is_empty());

    scheduler::flush();
    assert_eq!(&*log.borrow(), &vec!["second", "first"]);
    assert_eq!(scheduler::pending(), 0);
}

#[test]
fn repeated_invalidation_queues_a_component_once() {
    scheduler::clear();
    scheduler::set_flush_mode(FlushMode::Deferred);
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());

    let only = probe(&renderer, "only");
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));
    record_updates(&only, &log);

    only.invalidate("a", Value::from(1));
    only.invalidate("b", Value::from(2));
    only.invalidate("a", Value::from(3));
    assert_eq!(scheduler::pending(), 1);

    scheduler::flush();
    assert_eq!(&*log.borrow(), &vec!["only"]);
}

#[test]
fn clear_drops_queued_work() {
    scheduler::clear();
    scheduler::set_flush_mode(FlushMode::Deferred);
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());

    let stale = probe(&renderer, "stale");
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));
    record_updates(&stale, &log);

    stale.invalidate("x", Value::from(1));
    assert_eq!(scheduler::pending(), 1);

    scheduler::clear();
    scheduler::flush();
    assert!(log.borrow().is_empty());
}

#[test]
fn flush_with_nothing_dirty_does_not_report_an_update() {
    scheduler::clear();
    scheduler::set_flush_mode(FlushMode::Deferred);
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());

    let idle = probe(&renderer, "idle");
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));
    record_updates(&idle, &log);

    idle.flush_update();
    scheduler::flush();
    assert!(log.borrow().is_empty());
}
