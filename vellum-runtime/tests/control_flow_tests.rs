use std::rc::Rc;

use vellum_core::Value;
use vellum_runtime::{Context, Fragment, Renderer, TreeRenderer, tree_node};

fn setup() -> (Rc<dyn Renderer>, vellum_runtime::NodeHandle) {
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());
    let target = renderer.create_element("root");
    (renderer, target)
}

/// `v-if foo` / `v-else-if bar` / `v-else`, wired the way compiled
/// templates wire it.
fn conditional_chain(
    renderer: &Rc<dyn Renderer>,
    ctx: &Context,
) -> (Rc<Fragment>, Rc<Fragment>) {
    let root = Fragment::virtual_node(renderer);
    let control = Fragment::control_flow(renderer);

    let foo_branch = Fragment::element_node(renderer, "foo_pane");
    foo_branch.set_condition({
        let ctx = ctx.clone();
        move || ctx.get("foo").is_truthy()
    });
    let bar_branch = Fragment::element_node(renderer, "bar_pane");
    bar_branch.set_condition({
        let ctx = ctx.clone();
        move || ctx.get("bar").is_truthy()
    });
    let else_branch = Fragment::element_node(renderer, "fallback_pane");

    control.add_child(&foo_branch);
    control.add_child(&bar_branch);
    control.add_child(&else_branch);
    root.add_child(&control);
    (root, control)
}

#[test]
fn first_true_condition_wins() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("foo", Value::from(false));
    ctx.set("bar", Value::from(true));

    let (root, _control) = conditional_chain(&renderer, &ctx);
    root.mount(&target, None);

    let container = tree_node(&target);
    assert_eq!(container.child_count(), 1);
    assert_eq!(container.child(0).tag(), "bar_pane");

    // foo becoming true shadows bar even though bar still holds.
    ctx.set("foo", Value::from(true));
    assert_eq!(container.child_count(), 1);
    assert_eq!(container.child(0).tag(), "foo_pane");

    ctx.set("foo", Value::from(false));
    assert_eq!(container.child(0).tag(), "bar_pane");
}

#[test]
fn else_branch_shows_when_no_condition_holds() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("foo", Value::from(false));
    ctx.set("bar", Value::from(false));

    let (root, _control) = conditional_chain(&renderer, &ctx);
    root.mount(&target, None);

    let container = tree_node(&target);
    assert_eq!(container.child_count(), 1);
    assert_eq!(container.child(0).tag(), "fallback_pane");
}

#[test]
fn chain_without_else_can_show_nothing() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("visible", Value::from(true));

    let root = Fragment::virtual_node(&renderer);
    let control = Fragment::control_flow(&renderer);
    let only = Fragment::element_node(&renderer, "only_pane");
    only.set_condition({
        let ctx = ctx.clone();
        move || ctx.get("visible").is_truthy()
    });
    control.add_child(&only);
    root.add_child(&control);
    root.mount(&target, None);

    let container = tree_node(&target);
    assert_eq!(container.child_count(), 1);

    ctx.set("visible", Value::from(false));
    assert_eq!(container.child_count(), 0);

    ctx.set("visible", Value::from(true));
    assert_eq!(container.child_count(), 1);
}

#[test]
fn branch_mounts_before_following_sibling() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("show", Value::from(false));

    let root = Fragment::virtual_node(&renderer);
    let control = Fragment::control_flow(&renderer);
    let pane = Fragment::element_node(&renderer, "pane");
    pane.set_condition({
        let ctx = ctx.clone();
        move || ctx.get("show").is_truthy()
    });
    control.add_child(&pane);
    let footer = Fragment::element_node(&renderer, "footer");
    root.add_child(&control);
    root.add_child(&footer);
    root.mount(&target, None);

    let container = tree_node(&target);
    assert_eq!(container.child(0).tag(), "footer");

    // A late-mounting branch lands before the footer, not after it.
    ctx.set("show", Value::from(true));
    let tags: Vec<String> = container
        .children()
        .iter()
        .map(|c| c.tag().to_string())
        .collect();
    assert_eq!(tags, vec!["pane", "footer"]);
}

#[test]
fn remounted_branch_reapplies_binds_fresh() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("show", Value::from(true));
    ctx.set("label", Value::from("before"));

    let root = Fragment::virtual_node(&renderer);
    let control = Fragment::control_flow(&renderer);
    let pane = Fragment::element_node(&renderer, "pane");
    pane.set_condition({
        let ctx = ctx.clone();
        move || ctx.get("show").is_truthy()
    });
    pane.set_bind("title", &["label"], {
        let ctx = ctx.clone();
        move || ctx.get("label")
    });
    control.add_child(&pane);
    root.add_child(&control);
    root.mount(&target, None);

    ctx.set("show", Value::from(false));
    // The bind's variable changes while the branch is unmounted.
    ctx.set("label", Value::from("after"));
    ctx.set("show", Value::from(true));

    let node = tree_node(&target).child(0);
    assert_eq!(node.attr("title"), Some(Value::from("after")));
}
