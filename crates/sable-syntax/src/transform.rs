//! Fold over the immutable tree, returning a new tree.
//!
//! Each callback states explicitly whether the walker should rebuild the
//! node's children afterwards (`Recurse::Children`) or take the returned node
//! as final (`Recurse::Stop`). Scope-sensitive rewrites use `Stop` to refuse
//! descent across a scope boundary instead of relying on dispatch order.

use crate::ast::{Argument, ClassDef, Define, DictEntry, Expr, Parameter, Stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurse {
    Children,
    Stop,
}

pub struct Transformed<T> {
    pub node: T,
    pub recurse: Recurse,
}

impl<T> Transformed<T> {
    pub fn children(node: T) -> Self {
        Transformed {
            node,
            recurse: Recurse::Children,
        }
    }

    pub fn stop(node: T) -> Self {
        Transformed {
            node,
            recurse: Recurse::Stop,
        }
    }
}

pub trait Fold {
    fn fold_expr(&mut self, expr: Expr) -> Transformed<Expr> {
        Transformed::children(expr)
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Transformed<Stmt> {
        Transformed::children(stmt)
    }
}

pub fn transform_expr<F: Fold>(folder: &mut F, expr: Expr) -> Expr {
    let Transformed { node, recurse } = folder.fold_expr(expr);
    match recurse {
        Recurse::Stop => node,
        Recurse::Children => descend_expr(folder, node),
    }
}

fn descend_expr<F: Fold>(folder: &mut F, expr: Expr) -> Expr {
    match expr {
        Expr::Name { .. } | Expr::Literal { .. } => expr,
        Expr::Attribute { base, attr, span } => Expr::Attribute {
            base: Box::new(transform_expr(folder, *base)),
            attr,
            span,
        },
        Expr::Call {
            callee,
            arguments,
            span,
        } => Expr::Call {
            callee: Box::new(transform_expr(folder, *callee)),
            arguments: arguments
                .into_iter()
                .map(|argument| Argument {
                    value: transform_expr(folder, argument.value),
                    kind: argument.kind,
                })
                .collect(),
            span,
        },
        Expr::Tuple { items, span } => Expr::Tuple {
            items: items
                .into_iter()
                .map(|item| transform_expr(folder, item))
                .collect(),
            span,
        },
        Expr::Dict { entries, span } => Expr::Dict {
            entries: entries
                .into_iter()
                .map(|entry| DictEntry {
                    key: entry.key.map(|key| transform_expr(folder, key)),
                    value: transform_expr(folder, entry.value),
                })
                .collect(),
            span,
        },
        Expr::Starred { value, span } => Expr::Starred {
            value: Box::new(transform_expr(folder, *value)),
            span,
        },
    }
}

pub fn transform_stmt<F: Fold>(folder: &mut F, stmt: Stmt) -> Stmt {
    let Transformed { node, recurse } = folder.fold_stmt(stmt);
    match recurse {
        Recurse::Stop => node,
        Recurse::Children => descend_stmt(folder, node),
    }
}

fn descend_stmt<F: Fold>(folder: &mut F, stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Define(define) => Stmt::Define(transform_define(folder, define)),
        Stmt::Class(class) => Stmt::Class(transform_class(folder, class)),
        Stmt::Return { value, span } => Stmt::Return {
            value: value.map(|value| transform_expr(folder, value)),
            span,
        },
        Stmt::Assign {
            target,
            annotation,
            value,
            span,
        } => Stmt::Assign {
            target: transform_expr(folder, target),
            annotation: annotation.map(|annotation| transform_expr(folder, annotation)),
            value: transform_expr(folder, value),
            span,
        },
        Stmt::Expression(expr) => Stmt::Expression(transform_expr(folder, expr)),
        Stmt::If {
            test,
            body,
            orelse,
            span,
        } => Stmt::If {
            test: transform_expr(folder, test),
            body: transform_statements(folder, body),
            orelse: transform_statements(folder, orelse),
            span,
        },
        Stmt::Pass { span } => Stmt::Pass { span },
    }
}

pub fn transform_statements<F: Fold>(folder: &mut F, statements: Vec<Stmt>) -> Vec<Stmt> {
    statements
        .into_iter()
        .map(|stmt| transform_stmt(folder, stmt))
        .collect()
}

/// Rebuilds a define's own components (parameters, decorators, annotation,
/// body) without passing the define itself through `fold_stmt`.
pub fn transform_define<F: Fold>(folder: &mut F, define: Define) -> Define {
    Define {
        parameters: define
            .parameters
            .into_iter()
            .map(|parameter| Parameter {
                annotation: parameter
                    .annotation
                    .map(|annotation| transform_expr(folder, annotation)),
                default: parameter.default.map(|default| transform_expr(folder, default)),
                ..parameter
            })
            .collect(),
        decorators: define
            .decorators
            .into_iter()
            .map(|decorator| transform_expr(folder, decorator))
            .collect(),
        return_annotation: define
            .return_annotation
            .map(|annotation| transform_expr(folder, annotation)),
        body: transform_statements(folder, define.body),
        ..define
    }
}

fn transform_class<F: Fold>(folder: &mut F, class: ClassDef) -> ClassDef {
    ClassDef {
        bases: class
            .bases
            .into_iter()
            .map(|base| transform_expr(folder, base))
            .collect(),
        decorators: class
            .decorators
            .into_iter()
            .map(|decorator| transform_expr(folder, decorator))
            .collect(),
        body: transform_statements(folder, class.body),
        ..class
    }
}

// ---------------------------------------------------------------------------
// Read-only walkers
// ---------------------------------------------------------------------------

/// Visits every expression under `statements` in pre-order, including
/// expressions inside nested function and class definitions.
pub fn visit_exprs<'a>(statements: &'a [Stmt], visit: &mut impl FnMut(&'a Expr)) {
    for stmt in statements {
        match stmt {
            Stmt::Define(define) => visit_define_exprs(define, visit),
            Stmt::Class(class) => {
                for base in &class.bases {
                    visit_expr(base, visit);
                }
                for decorator in &class.decorators {
                    visit_expr(decorator, visit);
                }
                visit_exprs(&class.body, visit);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    visit_expr(value, visit);
                }
            }
            Stmt::Assign {
                target,
                annotation,
                value,
                ..
            } => {
                visit_expr(target, visit);
                if let Some(annotation) = annotation {
                    visit_expr(annotation, visit);
                }
                visit_expr(value, visit);
            }
            Stmt::Expression(expr) => visit_expr(expr, visit),
            Stmt::If {
                test, body, orelse, ..
            } => {
                visit_expr(test, visit);
                visit_exprs(body, visit);
                visit_exprs(orelse, visit);
            }
            Stmt::Pass { .. } => {}
        }
    }
}

pub fn visit_define_exprs<'a>(define: &'a Define, visit: &mut impl FnMut(&'a Expr)) {
    for parameter in &define.parameters {
        if let Some(annotation) = &parameter.annotation {
            visit_expr(annotation, visit);
        }
        if let Some(default) = &parameter.default {
            visit_expr(default, visit);
        }
    }
    for decorator in &define.decorators {
        visit_expr(decorator, visit);
    }
    if let Some(annotation) = &define.return_annotation {
        visit_expr(annotation, visit);
    }
    visit_exprs(&define.body, visit);
}

pub fn visit_expr<'a>(expr: &'a Expr, visit: &mut impl FnMut(&'a Expr)) {
    visit(expr);
    match expr {
        Expr::Name { .. } | Expr::Literal { .. } => {}
        Expr::Attribute { base, .. } => visit_expr(base, visit),
        Expr::Call {
            callee, arguments, ..
        } => {
            visit_expr(callee, visit);
            for argument in arguments {
                visit_expr(&argument.value, visit);
            }
        }
        Expr::Tuple { items, .. } => {
            for item in items {
                visit_expr(item, visit);
            }
        }
        Expr::Dict { entries, .. } => {
            for entry in entries {
                if let Some(key) = &entry.key {
                    visit_expr(key, visit);
                }
                visit_expr(&entry.value, visit);
            }
        }
        Expr::Starred { value, .. } => visit_expr(value, visit),
    }
}
