//! Translates the parsed component into a Rust module: an `instance`
//! function seeding the context from props and installing handlers, and a
//! `create_fragment` function building the fragment tree.

use std::collections::BTreeSet;

use quote::ToTokens;
use syn::{BinOp, Expr, FnArg, Lit, Member, Pat, RangeLimits, Stmt, UnOp};

use crate::analysis::{
    self, ScriptScope, expr_ident, expression_names, is_assign_op, parse_expression, pat_ident,
};
use crate::error::CompileError;
use crate::template_ast::{AttrKind, Element, Node, Text};

pub fn generate_module(nodes: &[Node], component_name: &str) -> Result<String, CompileError> {
    let mut script = None;
    let mut markup: Vec<&Node> = Vec::new();
    for node in nodes {
        match node {
            Node::Script(s) => {
                if script.is_some() {
                    return Err(CompileError::MultipleScripts);
                }
                script = Some(s);
            }
            other => markup.push(other),
        }
    }
    let script = script.ok_or(CompileError::MissingScript)?;
    if !markup.iter().any(|n| matches!(n, Node::Element(_))) {
        return Err(CompileError::MissingMarkup);
    }

    let scope = analysis::analyse_script(&script.content)?;

    let mut out = String::new();
    out.push_str(&format!(
        "//! Generated by vellum-sfc for component `{component_name}`. Do not edit.\n"
    ));
    out.push_str("#![allow(unused_variables, unused_mut, unused_imports)]\n\n");
    out.push_str("use std::rc::Rc;\n\n");
    out.push_str("use vellum_core::{Reactive, Value};\n");
    out.push_str(
        "use vellum_runtime::{ComponentDef, Context, Fragment, Invalidate, ItemAccessor, Renderer};\n",
    );
    for item in &scope.passthrough {
        out.push_str(item);
        out.push('\n');
    }
    out.push('\n');

    out.push_str(&format!("pub struct {component_name};\n\n"));
    out.push_str(&format!("impl {component_name} {{\n"));
    out.push_str("    pub fn definition() -> ComponentDef {\n");
    out.push_str(&format!(
        "        ComponentDef::new({component_name:?}, {component_name}::instance, {component_name}::create_fragment)\n"
    ));
    out.push_str("    }\n\n");
    out.push_str(&generate_instance(&scope)?);
    out.push('\n');
    out.push_str(&generate_create_fragment(&markup, &scope)?);
    out.push_str("}\n");
    Ok(out)
}

// Script translation.

fn generate_instance(scope: &ScriptScope) -> Result<String, CompileError> {
    let mut out = String::new();
    out.push_str("    fn instance(props: &Reactive, invalidate: &Invalidate) -> Context {\n");
    out.push_str("        let ctx = Context::new();\n");

    let rs = RewriteScope::top(&scope.variables);
    for (name, init) in &scope.lets {
        let default = match init {
            Some(expr) => rewrite_value_expr(expr, &rs)?,
            None => "Value::Null".to_string(),
        };
        out.push_str(&format!(
            "        ctx.set({name:?}, props.get_or({name:?}, {default}));\n"
        ));
    }
    for handler in &scope.handlers {
        out.push_str(&generate_handler(handler, scope)?);
    }
    out.push_str("        ctx\n");
    out.push_str("    }\n");
    Ok(out)
}

fn generate_handler(handler: &syn::ItemFn, scope: &ScriptScope) -> Result<String, CompileError> {
    let name = handler.sig.ident.to_string();
    let mut rs = RewriteScope::top(&scope.variables);
    let mut params: Vec<String> = Vec::new();
    for input in &handler.sig.inputs {
        let FnArg::Typed(typed) = input else {
            return Err(CompileError::InvalidScript {
                message: format!("handler `{name}` cannot take a receiver"),
            });
        };
        let Some(param) = pat_ident(&typed.pat) else {
            return Err(CompileError::InvalidScript {
                message: format!("unsupported parameter pattern in handler `{name}`"),
            });
        };
        rs.locals.insert(param.clone());
        params.push(param);
    }

    let mut out = String::new();
    out.push_str(&format!("        ctx.set_handler({name:?}, {{\n"));
    out.push_str("            let ctx = ctx.clone();\n");
    out.push_str("            let invalidate = invalidate.clone();\n");
    out.push_str("            Rc::new(move |args: &[Value]| {\n");
    for (index, param) in params.iter().enumerate() {
        out.push_str(&format!(
            "                let mut {param} = args.get({index}).cloned().unwrap_or_default();\n"
        ));
    }
    out.push_str(&generate_handler_stmts(&handler.block.stmts, scope, &mut rs, 16)?);
    out.push_str("            })\n");
    out.push_str("        });\n");
    Ok(out)
}

fn generate_handler_stmts(
    stmts: &[Stmt],
    scope: &ScriptScope,
    rs: &mut RewriteScope,
    indent: usize,
) -> Result<String, CompileError> {
    let pad = " ".repeat(indent);
    let mut out = String::new();
    for stmt in stmts {
        match stmt {
            Stmt::Local(local) => {
                let Some(name) = pat_ident(&local.pat) else {
                    return Err(CompileError::InvalidScript {
                        message: format!(
                            "unsupported pattern in handler let: `{}`",
                            local.pat.to_token_stream()
                        ),
                    });
                };
                let init = match &local.init {
                    Some(init) => rewrite_value_expr(&init.expr, rs)?,
                    None => "Value::Null".to_string(),
                };
                out.push_str(&format!("{pad}let mut {name} = {init};\n"));
                rs.locals.insert(name);
            }
            Stmt::Expr(expr, _) => {
                out.push_str(&generate_handler_expr(expr, scope, rs, indent)?);
            }
            other => {
                return Err(CompileError::InvalidScript {
                    message: format!("unsupported handler statement `{}`", other.to_token_stream()),
                });
            }
        }
    }
    Ok(out)
}

fn generate_handler_expr(
    expr: &Expr,
    scope: &ScriptScope,
    rs: &mut RewriteScope,
    indent: usize,
) -> Result<String, CompileError> {
    let pad = " ".repeat(indent);
    match expr {
        // `name = value`: reactive writes route through invalidation.
        Expr::Assign(assign) => {
            let Some(target) = expr_ident(&assign.left) else {
                return Err(CompileError::InvalidScript {
                    message: format!(
                        "unsupported assignment target `{}`",
                        assign.left.to_token_stream()
                    ),
                });
            };
            let rhs = rewrite_value_expr(&assign.right, rs)?;
            if rs.locals.contains(&target) {
                Ok(format!("{pad}{target} = {rhs};\n"))
            } else if rs.ctx_vars.contains(&target) {
                Ok(format!("{pad}invalidate.call({target:?}, {rhs});\n"))
            } else {
                Err(CompileError::InvalidScript {
                    message: format!("assignment to unknown name `{target}`"),
                })
            }
        }
        // `name += value` and friends.
        Expr::Binary(binary) if is_assign_op(&binary.op) => {
            let Some(target) = expr_ident(&binary.left) else {
                return Err(CompileError::InvalidScript {
                    message: format!(
                        "unsupported assignment target `{}`",
                        binary.left.to_token_stream()
                    ),
                });
            };
            let op = strip_assign_op(&binary.op);
            let rhs = rewrite_value_expr(&binary.right, rs)?;
            if rs.locals.contains(&target) {
                Ok(format!("{pad}{target} = {target}.clone() {op} ({rhs});\n"))
            } else if rs.ctx_vars.contains(&target) {
                Ok(format!(
                    "{pad}invalidate.call({target:?}, ctx.get({target:?}) {op} ({rhs}));\n"
                ))
            } else {
                Err(CompileError::InvalidScript {
                    message: format!("assignment to unknown name `{target}`"),
                })
            }
        }
        Expr::Call(call) => {
            let Some(callee) = expr_ident(&call.func) else {
                return Err(CompileError::InvalidScript {
                    message: format!("unsupported call `{}`", call.func.to_token_stream()),
                });
            };
            let mut call_args: Vec<String> = Vec::new();
            for arg in &call.args {
                call_args.push(rewrite_value_expr(arg, rs)?);
            }
            if callee == "emit" {
                // The first argument names the component event.
                let Some(Expr::Lit(lit)) = call.args.first() else {
                    return Err(CompileError::InvalidScript {
                        message: "emit expects a string literal event name".to_string(),
                    });
                };
                let Lit::Str(event) = &lit.lit else {
                    return Err(CompileError::InvalidScript {
                        message: "emit expects a string literal event name".to_string(),
                    });
                };
                let rest = call_args[1..].join(", ");
                Ok(format!("{pad}ctx.emit({:?}, &[{rest}]);\n", event.value()))
            } else if scope.functions.contains(&callee) {
                let joined = call_args.join(", ");
                Ok(format!("{pad}ctx.call({callee:?}, &[{joined}]);\n"))
            } else {
                Err(CompileError::InvalidScript {
                    message: format!("call to unknown function `{callee}`"),
                })
            }
        }
        Expr::If(expr_if) => {
            let cond = rewrite_value_expr(&expr_if.cond, rs)?;
            let mut out = format!("{pad}if ({cond}).is_truthy() {{\n");
            out.push_str(&generate_handler_stmts(
                &expr_if.then_branch.stmts,
                scope,
                &mut rs.clone(),
                indent + 4,
            )?);
            match &expr_if.else_branch {
                Some((_, else_expr)) => {
                    out.push_str(&format!("{pad}}} else {{\n"));
                    match else_expr.as_ref() {
                        Expr::Block(block) => out.push_str(&generate_handler_stmts(
                            &block.block.stmts,
                            scope,
                            &mut rs.clone(),
                            indent + 4,
                        )?),
                        nested => out.push_str(&generate_handler_expr(
                            nested,
                            scope,
                            &mut rs.clone(),
                            indent + 4,
                        )?),
                    }
                    out.push_str(&format!("{pad}}}\n"));
                }
                None => out.push_str(&format!("{pad}}}\n")),
            }
            Ok(out)
        }
        other => Err(CompileError::InvalidScript {
            message: format!("unsupported handler statement `{}`", other.to_token_stream()),
        }),
    }
}

fn strip_assign_op(op: &BinOp) -> &'static str {
    match op {
        BinOp::AddAssign(_) => "+",
        BinOp::SubAssign(_) => "-",
        BinOp::MulAssign(_) => "*",
        BinOp::DivAssign(_) => "/",
        BinOp::RemAssign(_) => "%",
        // Guarded by is_assign_op at both call sites.
        _ => "+",
    }
}

// Expression rewriting.

/// Where a name in an embedded expression resolves to.
#[derive(Clone)]
pub(crate) struct RewriteScope<'a> {
    ctx_vars: &'a BTreeSet<String>,
    locals: BTreeSet<String>,
    /// Loop variable to accessor expression, innermost last.
    loop_vars: Vec<(String, String)>,
    /// Accessor closure parameters currently in scope, for clone preludes.
    accessors: Vec<String>,
    /// Dependencies inherited from enclosing loops: an expression reading
    /// a loop variable changes whenever the loop's iterable does.
    extra_deps: Vec<String>,
}

impl<'a> RewriteScope<'a> {
    fn top(ctx_vars: &'a BTreeSet<String>) -> RewriteScope<'a> {
        RewriteScope {
            ctx_vars,
            locals: BTreeSet::new(),
            loop_vars: Vec::new(),
            accessors: Vec::new(),
            extra_deps: Vec::new(),
        }
    }
}

/// Rewrite a restricted expression into Rust code evaluating to a
/// `Value`. Names resolve to loop accessors, handler locals or tracked
/// context reads; literals and operators are lifted into `Value` space.
fn rewrite_value_expr(expr: &Expr, rs: &RewriteScope) -> Result<String, CompileError> {
    let unsupported = |expr: &Expr, what: &str| {
        CompileError::expression(expr.to_token_stream().to_string(), what.to_string())
    };
    match expr {
        Expr::Path(_) => {
            let Some(name) = expr_ident(expr) else {
                return Err(unsupported(expr, "only plain names are supported"));
            };
            if let Some((_, accessor)) = rs.loop_vars.iter().rev().find(|(n, _)| *n == name) {
                return Ok(accessor.clone());
            }
            if rs.locals.contains(&name) {
                return Ok(format!("{name}.clone()"));
            }
            if rs.ctx_vars.contains(&name) {
                return Ok(format!("ctx.get({name:?})"));
            }
            Err(CompileError::expression(
                name.clone(),
                "unknown name; expressions may only use component state and loop variables",
            ))
        }
        Expr::Lit(lit) => match &lit.lit {
            Lit::Int(int) => Ok(format!("Value::from({}i64)", int.base10_digits())),
            Lit::Float(float) => Ok(format!("Value::from({}f64)", float.base10_digits())),
            Lit::Str(s) => Ok(format!("Value::from({})", string_lit(&s.value()))),
            Lit::Bool(b) => Ok(format!("Value::from({})", b.value)),
            _ => Err(unsupported(expr, "unsupported literal")),
        },
        Expr::Binary(binary) => {
            let left = rewrite_value_expr(&binary.left, rs)?;
            let right = rewrite_value_expr(&binary.right, rs)?;
            match binary.op {
                BinOp::Add(_) => Ok(format!("({left} + {right})")),
                BinOp::Sub(_) => Ok(format!("({left} - {right})")),
                BinOp::Mul(_) => Ok(format!("({left} * {right})")),
                BinOp::Div(_) => Ok(format!("({left} / {right})")),
                BinOp::Rem(_) => Ok(format!("({left} % {right})")),
                BinOp::Eq(_) => Ok(format!("Value::from({left} == {right})")),
                BinOp::Ne(_) => Ok(format!("Value::from({left} != {right})")),
                BinOp::Lt(_) => Ok(format!("Value::from({left} < {right})")),
                BinOp::Le(_) => Ok(format!("Value::from({left} <= {right})")),
                BinOp::Gt(_) => Ok(format!("Value::from({left} > {right})")),
                BinOp::Ge(_) => Ok(format!("Value::from({left} >= {right})")),
                BinOp::And(_) => Ok(format!(
                    "Value::from(({left}).is_truthy() && ({right}).is_truthy())"
                )),
                BinOp::Or(_) => Ok(format!(
                    "Value::from(({left}).is_truthy() || ({right}).is_truthy())"
                )),
                _ => Err(unsupported(expr, "unsupported operator")),
            }
        }
        Expr::Unary(unary) => {
            let operand = rewrite_value_expr(&unary.expr, rs)?;
            match unary.op {
                UnOp::Not(_) => Ok(format!("(!{operand})")),
                UnOp::Neg(_) => Ok(format!("(-{operand})")),
                _ => Err(unsupported(expr, "unsupported unary operator")),
            }
        }
        Expr::Paren(paren) => rewrite_value_expr(&paren.expr, rs),
        Expr::Group(group) => rewrite_value_expr(&group.expr, rs),
        Expr::Field(field) => {
            let base = rewrite_value_expr(&field.base, rs)?;
            match &field.member {
                Member::Named(name) => Ok(format!("{base}.get({:?})", name.to_string())),
                Member::Unnamed(index) => Ok(format!("{base}.index({})", index.index)),
            }
        }
        Expr::MethodCall(call) if call.args.is_empty() => {
            let receiver = rewrite_value_expr(&call.receiver, rs)?;
            match call.method.to_string().as_str() {
                "len" => Ok(format!("Value::from({receiver}.len())")),
                "is_empty" => Ok(format!("Value::from({receiver}.is_empty())")),
                other => Err(unsupported(expr, &format!("unsupported method `{other}`"))),
            }
        }
        Expr::Range(range) => {
            let (Some(start), Some(end)) = (&range.start, &range.end) else {
                return Err(unsupported(expr, "ranges need both bounds"));
            };
            let start = rewrite_value_expr(start, rs)?;
            let end = rewrite_value_expr(end, rs)?;
            match range.limits {
                RangeLimits::HalfOpen(_) => Ok(format!("Value::range({start}, {end})")),
                RangeLimits::Closed(_) => {
                    Ok(format!("Value::range({start}, ({end} + Value::from(1i64)))"))
                }
            }
        }
        other => Err(unsupported(
            other,
            "unsupported in embedded expressions",
        )),
    }
}

/// The state variables an expression depends on.
fn dep_names(expr: &Expr, rs: &RewriteScope) -> Vec<String> {
    let mut deps: Vec<String> = expression_names(expr)
        .into_iter()
        .filter(|name| {
            rs.ctx_vars.contains(name)
                && !rs.locals.contains(name)
                && !rs.loop_vars.iter().any(|(n, _)| n == name)
        })
        .collect();
    if expression_names(expr)
        .iter()
        .any(|name| rs.loop_vars.iter().any(|(n, _)| n == name))
    {
        deps.extend(rs.extra_deps.iter().cloned());
    }
    deps.sort();
    deps.dedup();
    deps
}

/// Dependency names as a dep-list literal.
fn deps_list(expr: &Expr, rs: &RewriteScope) -> String {
    let quoted: Vec<String> = dep_names(expr, rs)
        .iter()
        .map(|d| format!("{d:?}"))
        .collect();
    format!("&[{}]", quoted.join(", "))
}

/// A `move` closure over the rewritten expression body, cloning the
/// context and any loop accessors it captures.
fn value_closure(rs: &RewriteScope, body: &str) -> String {
    let mut prelude = String::from("let ctx = ctx.clone(); ");
    for accessor in &rs.accessors {
        prelude.push_str(&format!("let {accessor} = {accessor}.clone(); "));
    }
    format!("{{ {prelude}move || {body} }}")
}

fn string_lit(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn static_value(value: Option<&str>) -> String {
    let Some(value) = value else {
        return "Value::from(true)".to_string();
    };
    if value.parse::<i64>().is_ok() {
        return format!("Value::from({value}i64)");
    }
    if value.parse::<f64>().is_ok() {
        return format!("Value::from({value}f64)");
    }
    match value {
        "true" => "Value::from(true)".to_string(),
        "false" => "Value::from(false)".to_string(),
        _ => format!("Value::from({})", string_lit(value)),
    }
}

fn sanitize(tag: &str) -> String {
    let mut out: String = tag
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

// Template translation.

struct TemplateWriter<'a> {
    scope: &'a ScriptScope,
    counter: usize,
    out: String,
}

fn generate_create_fragment(
    markup: &[&Node],
    scope: &ScriptScope,
) -> Result<String, CompileError> {
    let mut writer = TemplateWriter {
        scope,
        counter: 0,
        out: String::new(),
    };
    writer.push(8, "let root = Fragment::virtual_node(renderer);");
    let rs = RewriteScope::top(&scope.variables);
    let nodes: Vec<Node> = markup.iter().map(|n| (*n).clone()).collect();
    writer.emit_children(&nodes, "root", &rs, "renderer", "ctx", 8)?;
    writer.push(8, "root");

    let mut out = String::new();
    out.push_str("    fn create_fragment(ctx: &Context, renderer: &Rc<dyn Renderer>) -> Rc<Fragment> {\n");
    out.push_str(&writer.out);
    out.push_str("    }\n");
    Ok(out)
}

impl TemplateWriter<'_> {
    fn push(&mut self, indent: usize, line: &str) {
        self.out.push_str(&" ".repeat(indent));
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn fresh(&mut self, base: &str) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("{}_{n}", sanitize(base))
    }

    fn emit_children(
        &mut self,
        nodes: &[Node],
        parent: &str,
        rs: &RewriteScope,
        rref: &str,
        cref: &str,
        indent: usize,
    ) -> Result<(), CompileError> {
        let mut i = 0;
        while i < nodes.len() {
            match &nodes[i] {
                Node::Script(_) => {
                    i += 1;
                }
                Node::Text(text) => {
                    let var = self.emit_text(text, rs, rref, indent)?;
                    self.push(indent, &format!("{parent}.add_child(&{var});"));
                    i += 1;
                }
                Node::Element(element) => {
                    if element.directive(&AttrKind::If).is_some() {
                        i = self.emit_control_flow(nodes, i, parent, rs, rref, cref, indent)?;
                    } else if element.directive(&AttrKind::ElseIf).is_some() {
                        return Err(CompileError::DanglingElse {
                            directive: "v-else-if".to_string(),
                        });
                    } else if element.directive(&AttrKind::Else).is_some() {
                        return Err(CompileError::DanglingElse {
                            directive: "v-else".to_string(),
                        });
                    } else if element.directive(&AttrKind::For).is_some() {
                        let var = self.emit_list(element, rs, rref, indent)?;
                        self.push(indent, &format!("{parent}.add_child(&{var});"));
                        i += 1;
                    } else {
                        let var = self.emit_element(element, rs, rref, cref, indent)?;
                        self.push(indent, &format!("{parent}.add_child(&{var});"));
                        i += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_text(
        &mut self,
        text: &Text,
        rs: &RewriteScope,
        rref: &str,
        indent: usize,
    ) -> Result<String, CompileError> {
        let var = self.fresh("text");
        self.push(indent, &format!("let {var} = Fragment::text_node({rref});"));
        if text.interpolated {
            let expr = parse_expression(&text.content)?;
            let body = rewrite_value_expr(&expr, rs)?;
            self.push(
                indent,
                &format!(
                    "{var}.set_bind_text({}, {});",
                    deps_list(&expr, rs),
                    value_closure(rs, &body)
                ),
            );
        } else {
            self.push(
                indent,
                &format!("{var}.set_text({});", string_lit(&text.content)),
            );
        }
        Ok(var)
    }

    /// One `v-if`/`v-else-if`/`v-else` sibling group becomes a control
    /// flow fragment; returns the index past the last branch.
    fn emit_control_flow(
        &mut self,
        nodes: &[Node],
        start: usize,
        parent: &str,
        rs: &RewriteScope,
        rref: &str,
        cref: &str,
        indent: usize,
    ) -> Result<usize, CompileError> {
        let control = self.fresh("control");
        self.push(
            indent,
            &format!("let {control} = Fragment::control_flow({rref});"),
        );

        let mut i = start;
        let mut open = true;
        while i < nodes.len() && open {
            let Node::Element(element) = &nodes[i] else { break };
            let directive = if i == start {
                element.directive(&AttrKind::If)
            } else if let Some(attr) = element.directive(&AttrKind::ElseIf) {
                Some(attr)
            } else if let Some(attr) = element.directive(&AttrKind::Else) {
                open = false;
                Some(attr)
            } else {
                break;
            };
            let Some(directive) = directive else { break };

            let condition = match directive.kind {
                AttrKind::Else => None,
                _ => {
                    let raw = directive.value.as_ref().ok_or_else(|| {
                        CompileError::MissingDirectiveValue {
                            name: directive.name.clone(),
                        }
                    })?;
                    Some(parse_expression(raw)?)
                }
            };

            let mut branch = element.clone();
            branch
                .attrs
                .retain(|a| !matches!(a.kind, AttrKind::If | AttrKind::ElseIf | AttrKind::Else));
            // A branch carrying v-for is a whole list, gated as one unit.
            let var = if branch.directive(&AttrKind::For).is_some() {
                self.emit_list(&branch, rs, rref, indent)?
            } else {
                self.emit_element(&branch, rs, rref, cref, indent)?
            };
            if let Some(condition) = &condition {
                let body = rewrite_value_expr(condition, rs)?;
                let closure = value_closure(rs, &format!("({body}).is_truthy()"));
                self.push(indent, &format!("{var}.set_condition({closure});"));
            }
            self.push(indent, &format!("{control}.add_child(&{var});"));
            i += 1;
        }

        self.push(indent, &format!("{parent}.add_child(&{control});"));
        Ok(i)
    }

    fn emit_list(
        &mut self,
        element: &Element,
        rs: &RewriteScope,
        rref: &str,
        indent: usize,
    ) -> Result<String, CompileError> {
        let directive = element
            .directive(&AttrKind::For)
            .cloned()
            .ok_or_else(|| CompileError::MissingDirectiveValue {
                name: "v-for".to_string(),
            })?;
        let raw = directive
            .value
            .as_ref()
            .ok_or_else(|| CompileError::MissingDirectiveValue {
                name: "v-for".to_string(),
            })?;
        let (pat, iterable) = analysis::parse_for(raw)?;
        let iter_body = rewrite_value_expr(&iterable, rs)?;
        let deps = deps_list(&iterable, rs);

        let list = self.fresh("list");
        self.push(indent, &format!("let {list} = Fragment::list({rref});"));
        self.push(
            indent,
            &format!(
                "{list}.set_expression({deps}, {});",
                value_closure(rs, &iter_body)
            ),
        );

        // Key extraction, when a `:key` bind is present.
        let key_attr = element.attrs.iter().find(
            |a| matches!(&a.kind, AttrKind::Bind { name } if name == "key"),
        );
        if let Some(key_attr) = key_attr {
            let raw_key = key_attr.value.as_ref().ok_or_else(|| {
                CompileError::MissingDirectiveValue {
                    name: "key".to_string(),
                }
            })?;
            let key_expr = parse_expression(raw_key)?;
            let mut key_rs = rs.clone();
            bind_loop_pattern(&pat, "key_item.clone()", &mut key_rs, raw_key)?;
            let key_body = rewrite_value_expr(&key_expr, &key_rs)?;
            self.push(
                indent,
                &format!(
                    "{list}.set_key({{ let ctx = ctx.clone(); move |key_item: &Value| {key_body} }});"
                ),
            );
        }

        let accessor = self.fresh("item");
        let mut inner = rs.clone();
        bind_loop_pattern(&pat, &format!("{accessor}()"), &mut inner, raw)?;
        inner.accessors.push(accessor.clone());
        inner.extra_deps.extend(dep_names(&iterable, rs));

        self.push(indent, &format!("{list}.set_create_item({{"));
        self.push(indent + 4, "let renderer = renderer.clone();");
        self.push(indent + 4, "let ctx = ctx.clone();");
        for outer in &rs.accessors {
            self.push(indent + 4, &format!("let {outer} = {outer}.clone();"));
        }
        self.push(
            indent + 4,
            &format!("move |{accessor}: ItemAccessor| {{"),
        );

        let mut item = element.clone();
        item.attrs.retain(|a| {
            !matches!(a.kind, AttrKind::For)
                && !matches!(&a.kind, AttrKind::Bind { name } if name == "key")
        });
        let var = self.emit_element(&item, &inner, "&renderer", "&ctx", indent + 8)?;
        self.push(indent + 8, &var);
        self.push(indent + 4, "}");
        self.push(indent, "});");
        Ok(list)
    }

    fn emit_element(
        &mut self,
        element: &Element,
        rs: &RewriteScope,
        rref: &str,
        cref: &str,
        indent: usize,
    ) -> Result<String, CompileError> {
        let var = self.fresh(&element.tag);
        if element.tag == "slot" {
            let name = element
                .attr("name")
                .and_then(|a| a.value.as_deref())
                .unwrap_or("default");
            self.push(
                indent,
                &format!("let {var} = Fragment::slot({rref}, {name:?}, {cref});"),
            );
        } else if element.is_component() {
            self.push(
                indent,
                &format!(
                    "let {var} = Fragment::component({rref}, {}::definition());",
                    element.tag
                ),
            );
        } else {
            self.push(
                indent,
                &format!(
                    "let {var} = Fragment::element_node({rref}, {:?});",
                    element.tag
                ),
            );
        }

        for attr in &element.attrs {
            match &attr.kind {
                AttrKind::Static => {
                    if element.tag == "slot" && attr.name == "name" {
                        continue;
                    }
                    if attr.name == "slot" {
                        let target = attr.value.as_deref().unwrap_or("default");
                        self.push(indent, &format!("{var}.set_slot_target({target:?});"));
                        continue;
                    }
                    self.push(
                        indent,
                        &format!(
                            "{var}.set_attribute({:?}, {});",
                            attr.name,
                            static_value(attr.value.as_deref())
                        ),
                    );
                }
                AttrKind::Bind { name } => {
                    let raw = attr.value.as_ref().ok_or_else(|| {
                        CompileError::MissingDirectiveValue {
                            name: name.clone(),
                        }
                    })?;
                    let expr = parse_expression(raw)?;
                    let body = rewrite_value_expr(&expr, rs)?;
                    let closure = value_closure(rs, &body);
                    if name == "is" {
                        self.push(indent, &format!("{var}.set_type({closure});"));
                    } else {
                        self.push(
                            indent,
                            &format!(
                                "{var}.set_bind({name:?}, {}, {closure});",
                                deps_list(&expr, rs)
                            ),
                        );
                    }
                }
                AttrKind::BindDict => {
                    let raw = attr.value.as_ref().ok_or_else(|| {
                        CompileError::MissingDirectiveValue {
                            name: "v-bind".to_string(),
                        }
                    })?;
                    let expr = parse_expression(raw)?;
                    let body = rewrite_value_expr(&expr, rs)?;
                    self.push(
                        indent,
                        &format!(
                            "{var}.set_bind_dict({}, {});",
                            deps_list(&expr, rs),
                            value_closure(rs, &body)
                        ),
                    );
                }
                AttrKind::Event { name } => {
                    let raw = attr.value.as_ref().ok_or_else(|| {
                        CompileError::MissingDirectiveValue {
                            name: name.clone(),
                        }
                    })?;
                    if !self.scope.functions.contains(raw) {
                        return Err(CompileError::expression(
                            raw.clone(),
                            "event handlers must name a script function",
                        ));
                    }
                    self.push(
                        indent,
                        &format!("{var}.set_event({name:?}, ctx.handler({raw:?}));"),
                    );
                }
                AttrKind::Slot => {
                    self.push(indent, &format!("{var}.set_slot_target({:?});", attr.name));
                }
                AttrKind::If | AttrKind::ElseIf | AttrKind::Else | AttrKind::For => {}
            }
        }

        self.emit_children(&element.children, &var, rs, rref, cref, indent)?;
        Ok(var)
    }
}

/// Bind a loop pattern's names to accessor expressions: a single ident
/// reads the whole item, tuple patterns unpack by position.
fn bind_loop_pattern(
    pat: &Pat,
    item_expr: &str,
    rs: &mut RewriteScope,
    raw: &str,
) -> Result<(), CompileError> {
    match pat {
        Pat::Ident(ident) => {
            rs.loop_vars
                .push((ident.ident.to_string(), item_expr.to_string()));
            Ok(())
        }
        Pat::Tuple(tuple) => {
            for (index, elem) in tuple.elems.iter().enumerate() {
                let Pat::Ident(ident) = elem else {
                    return Err(CompileError::InvalidForLoop {
                        expression: raw.to_string(),
                    });
                };
                rs.loop_vars.push((
                    ident.ident.to_string(),
                    format!("{item_expr}.index({index})"),
                ));
            }
            Ok(())
        }
        Pat::Paren(paren) => bind_loop_pattern(&paren.pat, item_expr, rs, raw),
        _ => Err(CompileError::InvalidForLoop {
            expression: raw.to_string(),
        }),
    }
}
