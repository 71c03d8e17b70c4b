use vellum_sfc::CompileError;
use vellum_sfc::analysis::{analyse_script, parse_expression, parse_for};

#[test]
fn finds_variables_and_functions() {
    let scope = analyse_script(
        "let count = 0;\nlet label = \"items\";\nfn bump() { count += 1; }",
    )
    .unwrap();
    assert!(scope.variables.contains("count"));
    assert!(scope.variables.contains("label"));
    assert!(scope.functions.contains("bump"));
    assert_eq!(scope.lets.len(), 2);
}

#[test]
fn variables_assigned_in_handlers_will_change() {
    let scope = analyse_script(
        "let a = 0;\nlet b = 0;\nfn go() { a = a + 1; }\nfn reset() { b -= 1; }",
    )
    .unwrap();
    assert!(scope.will_change.contains("a"));
    assert!(scope.will_change.contains("b"));
}

#[test]
fn untouched_variables_do_not_change() {
    let scope = analyse_script("let fixed = 10;\nfn noop() {}").unwrap();
    assert!(scope.will_change.is_empty());
}

#[test]
fn nested_assignment_inside_if_is_found() {
    let scope = analyse_script(
        "let open = false;\nfn toggle() { if open { open = false; } else { open = true; } }",
    )
    .unwrap();
    assert!(scope.will_change.contains("open"));
}

#[test]
fn shadowing_locals_do_not_mark_top_scope_names() {
    let scope = analyse_script(
        "let count = 0;\nfn go() { let count = 1; count = 2; }",
    )
    .unwrap();
    assert!(scope.will_change.is_empty());
}

#[test]
fn assignment_before_a_shadowing_let_still_counts() {
    let scope = analyse_script(
        "let count = 0;\nfn go() { count = 9; let count = 1; count = 2; }",
    )
    .unwrap();
    assert!(scope.will_change.contains("count"));
}

#[test]
fn use_items_pass_through() {
    let scope = analyse_script("use crate::badge::Badge;\nlet n = 0;").unwrap();
    assert_eq!(scope.passthrough.len(), 1);
    assert!(scope.passthrough[0].contains("Badge"));
}

#[test]
fn rejects_non_item_statements_at_top_scope() {
    let err = analyse_script("let x = 0;\nx = 1;").unwrap_err();
    assert!(matches!(err, CompileError::InvalidScript { .. }));
}

#[test]
fn parses_for_loop_headers() {
    let (pat, _iter) = parse_for("item in items").unwrap();
    assert!(matches!(pat, syn::Pat::Ident(_)));

    let (pat, _iter) = parse_for("(key, value) in entries").unwrap();
    assert!(matches!(pat, syn::Pat::Tuple(_) | syn::Pat::Paren(_)));

    assert!(matches!(
        parse_for("not a loop"),
        Err(CompileError::InvalidForLoop { .. })
    ));
}

#[test]
fn rejects_malformed_expressions() {
    assert!(matches!(
        parse_expression("count +"),
        Err(CompileError::InvalidExpression { .. })
    ));
}
