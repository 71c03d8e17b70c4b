use std::rc::Rc;

use vellum_core::Value;
use vellum_runtime::{Context, Fragment, ItemAccessor, Renderer, TreeRenderer, tree_node};

fn setup() -> (Rc<dyn Renderer>, vellum_runtime::NodeHandle) {
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());
    let target = renderer.create_element("root");
    (renderer, target)
}

/// A list fragment rendering one `item` element per entry, with the text
/// bound to the entry itself.
fn item_list(renderer: &Rc<dyn Renderer>, ctx: &Context) -> Rc<Fragment> {
    let list = Fragment::list(renderer);
    list.set_expression(&["items"], {
        let ctx = ctx.clone();
        move || ctx.get("items")
    });
    list.set_create_item({
        let renderer = renderer.clone();
        move |item: ItemAccessor| {
            let fragment = Fragment::element_node(&renderer, "item");
            fragment.set_bind_text(&["items"], {
                let item = item.clone();
                move || item()
            });
            fragment
        }
    });
    list
}

fn texts(target: &vellum_runtime::NodeHandle) -> Vec<String> {
    tree_node(target)
        .children()
        .iter()
        .map(|c| c.text().unwrap_or_default())
        .collect()
}

#[test]
fn list_renders_one_fragment_per_item() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set(
        "items",
        Value::List(vec![Value::from("a"), Value::from("b")]),
    );

    let root = Fragment::virtual_node(&renderer);
    let list = item_list(&renderer, &ctx);
    root.add_child(&list);
    root.mount(&target, None);

    assert_eq!(texts(&target), vec!["a", "b"]);
}

#[test]
fn growing_and_truncating_preserves_leading_fragments() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("items", Value::range(Value::from(0), Value::from(2)));

    let root = Fragment::virtual_node(&renderer);
    let list = item_list(&renderer, &ctx);
    root.add_child(&list);
    root.mount(&target, None);

    let container = tree_node(&target);
    let kept = container.child(0);

    ctx.set("items", Value::range(Value::from(0), Value::from(4)));
    assert_eq!(container.child_count(), 4);
    // Leading item fragment survives a grow.
    assert!(Rc::ptr_eq(&kept, &container.child(0)));

    ctx.set("items", Value::range(Value::from(0), Value::from(1)));
    assert_eq!(container.child_count(), 1);
    assert!(Rc::ptr_eq(&kept, &container.child(0)));
}

#[test]
fn list_between_siblings_keeps_its_place() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("items", Value::List(vec![]));

    let root = Fragment::virtual_node(&renderer);
    let header = Fragment::element_node(&renderer, "header");
    let list = item_list(&renderer, &ctx);
    let footer = Fragment::element_node(&renderer, "footer");
    root.add_child(&header);
    root.add_child(&list);
    root.add_child(&footer);
    root.mount(&target, None);

    ctx.set(
        "items",
        Value::List(vec![Value::from("x"), Value::from("y")]),
    );
    let tags: Vec<String> = tree_node(&target)
        .children()
        .iter()
        .map(|c| c.tag().to_string())
        .collect();
    assert_eq!(tags, vec!["header", "item", "item", "footer"]);
}

#[test]
fn large_list_mounts_and_truncates() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set("items", Value::range(Value::from(0), Value::from(1000)));

    let root = Fragment::virtual_node(&renderer);
    let list = item_list(&renderer, &ctx);
    root.add_child(&list);
    root.mount(&target, None);

    let container = tree_node(&target);
    assert_eq!(container.child_count(), 1000);
    assert_eq!(container.child(999).text(), Some("999".to_string()));

    ctx.set("items", Value::range(Value::from(0), Value::from(10)));
    assert_eq!(container.child_count(), 10);
}

#[test]
fn positional_accessors_read_fresh_data_on_update() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set(
        "items",
        Value::List(vec![Value::from("old"), Value::from("kept")]),
    );

    let root = Fragment::virtual_node(&renderer);
    let list = item_list(&renderer, &ctx);
    root.add_child(&list);
    root.mount(&target, None);

    // Same length, different contents: structure stays, binds re-read.
    ctx.set(
        "items",
        Value::List(vec![Value::from("new"), Value::from("kept")]),
    );
    root.update(&["items".to_string()].into_iter().collect());
    assert_eq!(texts(&target), vec!["new", "kept"]);
}

#[test]
fn keyed_list_moves_fragments_instead_of_rebuilding() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    let entry = |id: &str| {
        Value::from_iter([
            ("id".to_string(), Value::from(id)),
            ("label".to_string(), Value::from(id.to_uppercase())),
        ])
    };
    ctx.set(
        "items",
        Value::List(vec![entry("a"), entry("b"), entry("c")]),
    );

    let root = Fragment::virtual_node(&renderer);
    let list = Fragment::list(&renderer);
    list.set_expression(&["items"], {
        let ctx = ctx.clone();
        move || ctx.get("items")
    });
    list.set_key(|item| item.get("id"));
    list.set_create_item({
        let renderer = renderer.clone();
        move |item: ItemAccessor| {
            let fragment = Fragment::element_node(&renderer, "entry");
            fragment.set_bind_text(&["items"], {
                let item = item.clone();
                move || item().get("label")
            });
            fragment
        }
    });
    root.add_child(&list);
    root.mount(&target, None);

    let container = tree_node(&target);
    assert_eq!(
        texts(&target),
        vec!["A".to_string(), "B".to_string(), "C".to_string()]
    );
    let node_a = container.child(0);
    let node_c = container.child(2);

    // Move c to the front; a and b keep their nodes.
    ctx.set(
        "items",
        Value::List(vec![entry("c"), entry("a"), entry("b")]),
    );
    assert_eq!(
        texts(&target),
        vec!["C".to_string(), "A".to_string(), "B".to_string()]
    );
    assert!(Rc::ptr_eq(&container.child(0), &node_c));
    assert!(Rc::ptr_eq(&container.child(1), &node_a));
}

#[test]
fn keyed_list_unmounts_removed_keys() {
    let (renderer, target) = setup();
    let ctx = Context::new();
    ctx.set(
        "items",
        Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")]),
    );

    let root = Fragment::virtual_node(&renderer);
    let list = Fragment::list(&renderer);
    list.set_expression(&["items"], {
        let ctx = ctx.clone();
        move || ctx.get("items")
    });
    list.set_key(|item| item.clone());
    list.set_create_item({
        let renderer = renderer.clone();
        move |item: ItemAccessor| {
            let fragment = Fragment::element_node(&renderer, "entry");
            fragment.set_bind_text(&["items"], {
                let item = item.clone();
                move || item()
            });
            fragment
        }
    });
    root.add_child(&list);
    root.mount(&target, None);

    ctx.set("items", Value::List(vec![Value::from("c"), Value::from("a")]));
    assert_eq!(texts(&target), vec!["c", "a"]);
}
