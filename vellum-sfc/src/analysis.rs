//! Scope analysis of the script element. Finds the component's state
//! variables, its handlers, and which variables those handlers write to,
//! so the generator can route exactly those writes through invalidation.

use std::collections::BTreeSet;

use quote::ToTokens;
use syn::visit::Visit;
use syn::{BinOp, Expr, Item, Pat, Stmt};

use crate::error::CompileError;

#[derive(Debug)]
pub struct ScriptScope {
    /// Top-scope `let` bindings, in declaration order, with their
    /// initializers.
    pub lets: Vec<(String, Option<Expr>)>,
    /// Top-scope `fn` items; these become event handlers.
    pub handlers: Vec<syn::ItemFn>,
    /// Items passed through verbatim (`use`, type definitions).
    pub passthrough: Vec<String>,
    /// Names of all top-scope variables.
    pub variables: BTreeSet<String>,
    /// Names of all top-scope functions.
    pub functions: BTreeSet<String>,
    /// Top-scope variables assigned somewhere inside a handler body. Only
    /// these need invalidation plumbing.
    pub will_change: BTreeSet<String>,
}

/// Parse and analyse a script. The script is a restricted Rust block:
/// top-scope `let` bindings declare state, top-scope `fn` items declare
/// handlers, `use` items are forwarded to the generated module.
pub fn analyse_script(script: &str) -> Result<ScriptScope, CompileError> {
    let block: syn::Block =
        syn::parse_str(&format!("{{ {script} }}")).map_err(|e| CompileError::InvalidScript {
            message: e.to_string(),
        })?;

    let mut scope = ScriptScope {
        lets: Vec::new(),
        handlers: Vec::new(),
        passthrough: Vec::new(),
        variables: BTreeSet::new(),
        functions: BTreeSet::new(),
        will_change: BTreeSet::new(),
    };

    for stmt in &block.stmts {
        match stmt {
            Stmt::Local(local) => {
                let Some(name) = pat_ident(&local.pat) else {
                    return Err(CompileError::InvalidScript {
                        message: format!(
                            "unsupported pattern in top-scope let: `{}`",
                            local.pat.to_token_stream()
                        ),
                    });
                };
                let init = local.init.as_ref().map(|init| (*init.expr).clone());
                scope.variables.insert(name.clone());
                scope.lets.push((name, init));
            }
            Stmt::Item(Item::Fn(item_fn)) => {
                scope.functions.insert(item_fn.sig.ident.to_string());
                scope.handlers.push(item_fn.clone());
            }
            Stmt::Item(item) => {
                scope.passthrough.push(item.to_token_stream().to_string());
            }
            other => {
                return Err(CompileError::InvalidScript {
                    message: format!(
                        "only let bindings and items are allowed at the top scope, found `{}`",
                        other.to_token_stream()
                    ),
                });
            }
        }
    }

    // A top-scope variable assigned inside a handler body is reactive.
    for handler in &scope.handlers {
        let mut collector = AssignCollector {
            top: &scope.variables,
            locals: BTreeSet::new(),
            found: BTreeSet::new(),
        };
        collector.visit_block(&handler.block);
        scope.will_change.extend(collector.found);
    }

    Ok(scope)
}

struct AssignCollector<'a> {
    top: &'a BTreeSet<String>,
    /// Handler-local `let` bindings seen so far; a local shadows the
    /// top-scope name for the rest of the body.
    locals: BTreeSet<String>,
    found: BTreeSet<String>,
}

impl AssignCollector<'_> {
    fn record(&mut self, target: &Expr) {
        if let Some(name) = expr_ident(target) {
            if self.top.contains(&name) && !self.locals.contains(&name) {
                self.found.insert(name);
            }
        }
    }
}

impl<'ast, 'top> Visit<'ast> for AssignCollector<'top> {
    fn visit_local(&mut self, node: &'ast syn::Local) {
        syn::visit::visit_local(self, node);
        if let Some(name) = pat_ident(&node.pat) {
            self.locals.insert(name);
        }
    }

    fn visit_expr_assign(&mut self, node: &'ast syn::ExprAssign) {
        self.record(&node.left);
        syn::visit::visit_expr_assign(self, node);
    }

    fn visit_expr_binary(&mut self, node: &'ast syn::ExprBinary) {
        if is_assign_op(&node.op) {
            self.record(&node.left);
        }
        syn::visit::visit_expr_binary(self, node);
    }
}

pub(crate) fn is_assign_op(op: &BinOp) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_)
            | BinOp::SubAssign(_)
            | BinOp::MulAssign(_)
            | BinOp::DivAssign(_)
            | BinOp::RemAssign(_)
    )
}

/// The plain-identifier name of a pattern, if it is one.
pub(crate) fn pat_ident(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        _ => None,
    }
}

/// The plain-identifier name of an expression, if it is one.
pub(crate) fn expr_ident(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(path) if path.qself.is_none() && path.path.segments.len() == 1 => {
            Some(path.path.segments[0].ident.to_string())
        }
        _ => None,
    }
}

/// Every free identifier mentioned in an expression. The generator
/// intersects this with the component's variables to build dependency
/// lists for binds.
pub fn expression_names(expr: &Expr) -> BTreeSet<String> {
    struct NameCollector {
        found: BTreeSet<String>,
    }
    impl<'a> Visit<'a> for NameCollector {
        fn visit_expr_path(&mut self, node: &'a syn::ExprPath) {
            if node.qself.is_none() && node.path.segments.len() == 1 {
                self.found.insert(node.path.segments[0].ident.to_string());
            }
        }
    }
    let mut collector = NameCollector {
        found: BTreeSet::new(),
    };
    collector.visit_expr(expr);
    collector.found
}

pub fn parse_expression(raw: &str) -> Result<Expr, CompileError> {
    syn::parse_str(raw).map_err(|e| CompileError::expression(raw, e.to_string()))
}

/// Parse a `v-for` value of the form `pattern in iterable`.
pub fn parse_for(raw: &str) -> Result<(Pat, Expr), CompileError> {
    let wrapped = format!("for {raw} {{}}");
    let parsed: syn::ExprForLoop =
        syn::parse_str(&wrapped).map_err(|_| CompileError::InvalidForLoop {
            expression: raw.to_string(),
        })?;
    Ok((*parsed.pat, *parsed.expr))
}
