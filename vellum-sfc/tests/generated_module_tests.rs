//! Runs a module shaped exactly like the compiler's output against the
//! fragment runtime, pinning the ABI between the two crates.

use std::rc::Rc;

use vellum_core::{Reactive, Value};
use vellum_runtime::{
    ComponentDef, Context, Fragment, Invalidate, Renderer, TreeRenderer, Vellum, tree_node,
};

pub struct Counter;

impl Counter {
    pub fn definition() -> ComponentDef {
        ComponentDef::new("Counter", Counter::instance, Counter::create_fragment)
    }

    fn instance(props: &Reactive, invalidate: &Invalidate) -> Context {
        let ctx = Context::new();
        ctx.set("count", props.get_or("count", Value::from(0i64)));
        ctx.set_handler("bump", {
            let ctx = ctx.clone();
            let invalidate = invalidate.clone();
            Rc::new(move |_args: &[Value]| {
                invalidate.call("count", ctx.get("count") + (Value::from(1i64)));
            })
        });
        ctx
    }

    fn create_fragment(ctx: &Context, renderer: &Rc<dyn Renderer>) -> Rc<Fragment> {
        let root = Fragment::virtual_node(renderer);
        let button_0 = Fragment::element_node(renderer, "button");
        button_0.set_event("click", ctx.handler("bump"));
        let text_1 = Fragment::text_node(renderer);
        text_1.set_bind_text(&["count"], {
            let ctx = ctx.clone();
            move || ctx.get("count")
        });
        button_0.add_child(&text_1);
        root.add_child(&button_0);
        root
    }
}

#[test]
fn counter_module_runs_end_to_end() {
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());
    let target = renderer.create_element("window");
    let app = Vellum::new(renderer.clone());
    app.render(&Counter::definition(), &target, None);

    let window = tree_node(&target);
    let button = window.child(0);
    assert_eq!(button.tag(), "button");
    assert_eq!(button.child(0).text().as_deref(), Some("0"));

    button.fire("click", &[]);
    assert_eq!(button.child(0).text().as_deref(), Some("1"));
    button.fire("click", &[]);
    assert_eq!(button.child(0).text().as_deref(), Some("2"));
}

#[test]
fn props_seed_generated_state() {
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());
    let target = renderer.create_element("window");
    let app = Vellum::new(renderer.clone());
    let props = Reactive::new();
    props.set("count", Value::from(40i64));
    app.render(&Counter::definition(), &target, Some(props));

    let button = tree_node(&target).child(0);
    assert_eq!(button.child(0).text().as_deref(), Some("40"));
    button.fire("click", &[]);
    assert_eq!(button.child(0).text().as_deref(), Some("41"));
}
