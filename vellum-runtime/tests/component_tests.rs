use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use vellum_core::{Reactive, Value};
use vellum_runtime::{
    Component, ComponentDef, Context, Fragment, Renderer, TreeRenderer, Vellum, scheduler,
    tree_node,
};

fn setup() -> (Rc<dyn Renderer>, vellum_runtime::NodeHandle) {
    scheduler::clear();
    let renderer: Rc<dyn Renderer> = Rc::new(TreeRenderer::new());
    let target = renderer.create_element("root");
    (renderer, target)
}

/// A counter component the way the compiler would emit it: state seeded
/// from props, a handler routing its write through invalidate, and a
/// button whose text tracks the count.
fn counter_def() -> ComponentDef {
    ComponentDef::new(
        "Counter",
        |props, invalidate| {
            let ctx = Context::new();
            ctx.set("count", props.get_or("count", Value::from(0)));
            ctx.set_handler("bump", {
                let ctx = ctx.clone();
                let invalidate = invalidate.clone();
                Rc::new(move |_args| {
                    invalidate.call("count", ctx.get("count") + Value::from(1));
                })
            });
            ctx
        },
        |ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let button = Fragment::element_node(renderer, "button");
            button.set_bind_text(&["count"], {
                let ctx = ctx.clone();
                move || ctx.get("count")
            });
            button.set_event("click", ctx.handler("bump"));
            root.add_child(&button);
            root
        },
    )
}

#[test]
fn event_handler_updates_synchronously() {
    let (renderer, target) = setup();
    let app = Vellum::new(renderer);
    app.render(&counter_def(), &target, None);

    let button = tree_node(&target).child(0);
    assert_eq!(button.text(), Some("0".to_string()));

    button.fire("click", &[]);
    assert_eq!(button.text(), Some("1".to_string()));
    button.fire("click", &[]);
    assert_eq!(button.text(), Some("2".to_string()));
}

#[test]
fn root_component_stays_live_when_the_render_handle_is_dropped() {
    let (renderer, target) = setup();
    let app = Vellum::new(renderer);
    drop(app.render(&counter_def(), &target, None));

    // The app keeps the root alive; events still reach its handlers.
    let button = tree_node(&target).child(0);
    button.fire("click", &[]);
    assert_eq!(button.text(), Some("1".to_string()));

    app.teardown();
    assert_eq!(tree_node(&target).child_count(), 0);
}

#[test]
fn outside_state_writes_flow_into_the_root_component() {
    let (renderer, target) = setup();
    let app = Vellum::new(renderer);
    let state = Reactive::from_entries([("count".to_string(), Value::from(41))]);
    app.render(&counter_def(), &target, Some(state.clone()));

    let button = tree_node(&target).child(0);
    assert_eq!(button.text(), Some("41".to_string()));

    state.set("count", Value::from(42));
    assert_eq!(button.text(), Some("42".to_string()));
}

fn badge_def() -> ComponentDef {
    ComponentDef::new(
        "Badge",
        |props, _invalidate| {
            let ctx = Context::new();
            ctx.set("value", props.get_or("value", Value::from(0)));
            ctx
        },
        |ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let badge = Fragment::element_node(renderer, "badge");
            badge.set_bind_text(&["value"], {
                let ctx = ctx.clone();
                move || ctx.get("value")
            });
            root.add_child(&badge);
            root
        },
    )
}

#[test]
fn prop_changes_update_the_child_without_remounting() {
    let (renderer, target) = setup();
    let app = Vellum::new(renderer);
    let panel = ComponentDef::new(
        "Panel",
        |props, _invalidate| {
            let ctx = Context::new();
            ctx.set("n", props.get_or("n", Value::from(0)));
            ctx
        },
        |ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let child = Fragment::component(renderer, badge_def());
            child.set_bind("value", &["n"], {
                let ctx = ctx.clone();
                move || ctx.get("n")
            });
            root.add_child(&child);
            root
        },
    );

    let state = Reactive::from_entries([("n".to_string(), Value::from(1))]);
    app.render(&panel, &target, Some(state.clone()));

    let badge = tree_node(&target).child(0);
    assert_eq!(badge.tag(), "badge");
    assert_eq!(badge.text(), Some("1".to_string()));

    state.set("n", Value::from(5));
    assert_eq!(badge.text(), Some("5".to_string()));
    // Same renderer node: the child updated in place.
    assert!(Rc::ptr_eq(&badge, &tree_node(&target).child(0)));
}

#[test]
fn child_components_emit_events_to_the_parent() {
    let (renderer, target) = setup();

    let child = ComponentDef::new(
        "Dialog",
        |_props, _invalidate| {
            let ctx = Context::new();
            ctx.set_handler("close", {
                let ctx = ctx.clone();
                Rc::new(move |args| ctx.emit("closed", args))
            });
            ctx
        },
        |ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let button = Fragment::element_node(renderer, "close_button");
            button.set_event("click", ctx.handler("close"));
            root.add_child(&button);
            root
        },
    );

    let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(vec![]));
    let parent = {
        let seen = seen.clone();
        ComponentDef::new(
            "Host",
            |_props, _invalidate| Context::new(),
            move |_ctx, renderer| {
                let root = Fragment::virtual_node(renderer);
                let dialog = Fragment::component(renderer, child.clone());
                dialog.set_event("closed", {
                    let seen = seen.clone();
                    Rc::new(move |args| {
                        seen.borrow_mut().push(args.first().cloned().unwrap_or_default());
                    })
                });
                root.add_child(&dialog);
                root
            },
        )
    };

    let app = Vellum::new(renderer);
    app.render(&parent, &target, None);

    tree_node(&target)
        .child(0)
        .fire("click", &[Value::from("escape")]);
    assert_eq!(&*seen.borrow(), &vec![Value::from("escape")]);
}

fn card_def() -> ComponentDef {
    ComponentDef::new(
        "Card",
        |_props, _invalidate| Context::new(),
        |ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let card = Fragment::element_node(renderer, "card");
            let slot = Fragment::slot(renderer, "default", ctx);
            let fallback = Fragment::element_node(renderer, "placeholder");
            fallback.set_text("nothing here");
            slot.add_child(&fallback);
            card.add_child(&slot);
            root.add_child(&card);
            root
        },
    )
}

#[test]
fn slot_content_is_projected_and_keeps_updating() {
    let (renderer, target) = setup();
    let parent = ComponentDef::new(
        "Page",
        |props, _invalidate| {
            let ctx = Context::new();
            ctx.set("message", props.get_or("message", Value::from("")));
            ctx
        },
        |ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let card = Fragment::component(renderer, card_def());
            let content = Fragment::element_node(renderer, "content");
            content.set_bind_text(&["message"], {
                let ctx = ctx.clone();
                move || ctx.get("message")
            });
            card.add_child(&content);
            root.add_child(&card);
            root
        },
    );

    let app = Vellum::new(renderer);
    let state = Reactive::from_entries([("message".to_string(), Value::from("hi"))]);
    app.render(&parent, &target, Some(state.clone()));

    let card = tree_node(&target).child(0);
    assert_eq!(card.tag(), "card");
    assert_eq!(card.child(0).tag(), "content");
    assert_eq!(card.child(0).text(), Some("hi".to_string()));

    // The projected content still reads the parent's state.
    state.set("message", Value::from("bye"));
    assert_eq!(card.child(0).text(), Some("bye".to_string()));
}

#[test]
fn empty_slot_shows_fallback_content() {
    let (renderer, target) = setup();
    let parent = ComponentDef::new(
        "Page",
        |_props, _invalidate| Context::new(),
        |_ctx, renderer| {
            let root = Fragment::virtual_node(renderer);
            let card = Fragment::component(renderer, card_def());
            root.add_child(&card);
            root
        },
    );

    let app = Vellum::new(renderer);
    app.render(&parent, &target, None);

    let card = tree_node(&target).child(0);
    assert_eq!(card.child(0).tag(), "placeholder");
    assert_eq!(card.child(0).text(), Some("nothing here".to_string()));
}

#[test]
fn mounted_and_destroyed_lifecycle_events_fire() {
    let (renderer, target) = setup();
    let events: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(vec![]));

    let component = Component::new(
        &renderer,
        counter_def(),
        Reactive::new(),
        BTreeMap::new(),
    );
    for name in ["mounted", "destroyed"] {
        let events = events.clone();
        component.on(
            name,
            Rc::new(move |_args| events.borrow_mut().push(name.to_string())),
        );
    }

    component.mount(&target, None);
    assert_eq!(&*events.borrow(), &vec!["mounted".to_string()]);

    component.destroy();
    assert_eq!(
        &*events.borrow(),
        &vec!["mounted".to_string(), "destroyed".to_string()]
    );
    assert_eq!(tree_node(&target).child_count(), 0);
}
