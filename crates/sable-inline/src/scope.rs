//! Renaming, reparenting, and requalification of function definitions.
//!
//! Requalification rewrites every scope-bound local reference whose qualifier
//! begins with `old` to begin with `new` instead, recursing into nested
//! function definitions. Nested class bodies are left untouched: decorators
//! defined inside class bodies are not reparented (known limitation).

use rustc_hash::{FxHashMap, FxHashSet};

use sable_syntax::{
    transform_expr, Define, Expr, Fold, Identifier, Parameter, Reference, Stmt, Transformed,
};

/// Rewrites local references under `old` to sit under `new`, renaming and
/// recursively requalifying nested function definitions along the way.
pub fn requalify_define(define: Define, old: &Reference, new: &Reference) -> Define {
    let name = define.name.requalify(old, new);
    let nesting_define = define
        .nesting_define
        .map(|nesting| nesting.requalify(old, new));
    let parameters = define
        .parameters
        .into_iter()
        .map(|parameter| requalify_parameter(parameter, old, new))
        .collect();
    let body = requalify_statements(define.body, old, new);
    Define {
        name,
        nesting_define,
        parameters,
        body,
        ..define
    }
}

fn requalify_parameter(parameter: Parameter, old: &Reference, new: &Reference) -> Parameter {
    let name = match parameter.name {
        Identifier::Local { scope, name } if scope.starts_with(old) => Identifier::Local {
            scope: scope.requalify(old, new),
            name,
        },
        other => other,
    };
    Parameter {
        name,
        annotation: parameter
            .annotation
            .map(|annotation| requalify_expr(annotation, old, new)),
        default: parameter
            .default
            .map(|default| requalify_expr(default, old, new)),
        ..parameter
    }
}

fn requalify_statements(statements: Vec<Stmt>, old: &Reference, new: &Reference) -> Vec<Stmt> {
    statements
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::Define(define) => Stmt::Define(requalify_define(define, old, new)),
            // Class bodies are a scope this rewriter does not reach into.
            Stmt::Class(class) => Stmt::Class(class),
            Stmt::Return { value, span } => Stmt::Return {
                value: value.map(|value| requalify_expr(value, old, new)),
                span,
            },
            Stmt::Assign {
                target,
                annotation,
                value,
                span,
            } => Stmt::Assign {
                target: requalify_expr(target, old, new),
                annotation: annotation.map(|annotation| requalify_expr(annotation, old, new)),
                value: requalify_expr(value, old, new),
                span,
            },
            Stmt::Expression(expr) => Stmt::Expression(requalify_expr(expr, old, new)),
            Stmt::If {
                test,
                body,
                orelse,
                span,
            } => Stmt::If {
                test: requalify_expr(test, old, new),
                body: requalify_statements(body, old, new),
                orelse: requalify_statements(orelse, old, new),
                span,
            },
            Stmt::Pass { span } => Stmt::Pass { span },
        })
        .collect()
}

struct RequalifyExprs<'a> {
    old: &'a Reference,
    new: &'a Reference,
}

impl Fold for RequalifyExprs<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Transformed<Expr> {
        match expr {
            Expr::Name {
                id: Identifier::Local { scope, name },
                span,
            } if scope.starts_with(self.old) => Transformed::stop(Expr::Name {
                id: Identifier::Local {
                    scope: scope.requalify(self.old, self.new),
                    name,
                },
                span,
            }),
            other => Transformed::children(other),
        }
    }
}

fn requalify_expr(expr: Expr, old: &Reference, new: &Reference) -> Expr {
    transform_expr(&mut RequalifyExprs { old, new }, expr)
}

/// Renames a definition, keeping its body's local qualifiers consistent with
/// the new name.
pub fn rename_define(define: Define, new_name: Reference) -> Define {
    let old_name = define.name.clone();
    let mut renamed = requalify_define(define, &old_name, &new_name);
    renamed.name = new_name;
    renamed
}

/// Rewrites the lexical parent pointer of `define` and, recursively, of every
/// nested function inside it. Nested functions point at their actual
/// enclosing define, re-established from the tree shape. Nested classes are
/// not entered.
pub fn set_parent(define: Define, new_parent: Option<Reference>) -> Define {
    let mut define = define;
    define.nesting_define = new_parent;
    let own_name = define.name.clone();
    define.body = define
        .body
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::Define(nested) => Stmt::Define(set_parent(nested, Some(own_name.clone()))),
            other => other,
        })
        .collect();
    define
}

/// Strips transformation-invalidated metadata from a definition: the cached
/// unbound-name list always, plus optionally the decorator list and the
/// origin-class link.
pub fn sanitize_define(define: Define, strip_decorators: bool, strip_parent: bool) -> Define {
    let mut define = define;
    define.unbound_names = None;
    if strip_decorators {
        define.decorators.clear();
    }
    if strip_parent {
        define.parent = None;
    }
    define
}

/// Appends a numeric suffix to the 2nd, 3rd, ... occurrence of any repeated
/// name, leaving first occurrences and relative order untouched:
/// `[a, a, b, a]` becomes `[a, a2, b, a3]`. A generated suffix that collides
/// with a name already in the list is bumped until it is fresh, so
/// `[a, a2, a]` becomes `[a, a2, a3]`.
pub fn uniquify_names<T>(
    items: Vec<T>,
    get_name: impl Fn(&T) -> String,
    set_name: impl Fn(T, String) -> T,
) -> Vec<T> {
    let mut taken: FxHashSet<String> = items.iter().map(&get_name).collect();
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    items
        .into_iter()
        .map(|item| {
            let name = get_name(&item);
            let count = counts.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                item
            } else {
                let mut fresh = format!("{name}{count}", count = *count);
                while !taken.insert(fresh.clone()) {
                    *count += 1;
                    fresh = format!("{name}{count}", count = *count);
                }
                set_name(item, fresh)
            }
        })
        .collect()
}

/// Renames identifiers in a define's body by unqualified name. The define's
/// own parameters never shadow: callers rename exactly those (collector
/// parameters, prefix parameters), so the root body is rewritten in full.
///
/// A rename map with duplicate target identifiers would conflate distinct
/// names, so such a map makes the whole rename a no-op. Nested defines are
/// entered unless they rebind one of the source names as a parameter, in
/// which case that shadowed name stops being renamed below the binder.
pub fn rename_identifiers(define: Define, renames: &FxHashMap<String, String>) -> Define {
    let targets: FxHashSet<&String> = renames.values().collect();
    if targets.len() != renames.len() {
        return define;
    }
    rename_body(define, renames)
}

fn rename_body(define: Define, renames: &FxHashMap<String, String>) -> Define {
    let body = define
        .body
        .into_iter()
        .map(|stmt| rename_in_stmt(stmt, renames))
        .collect();
    Define { body, ..define }
}

fn rename_in_define(define: Define, renames: &FxHashMap<String, String>) -> Define {
    let shadowed: FxHashSet<String> = define
        .parameters
        .iter()
        .map(|parameter| parameter.name.name().to_string())
        .filter(|name| renames.contains_key(name))
        .collect();
    let effective: FxHashMap<String, String> = renames
        .iter()
        .filter(|(source, _)| !shadowed.contains(*source))
        .map(|(source, target)| (source.clone(), target.clone()))
        .collect();
    if effective.is_empty() {
        return define;
    }
    rename_body(define, &effective)
}

fn rename_in_stmt(stmt: Stmt, renames: &FxHashMap<String, String>) -> Stmt {
    match stmt {
        Stmt::Define(nested) => Stmt::Define(rename_in_define(nested, renames)),
        Stmt::Class(class) => Stmt::Class(class),
        other => {
            let mut folder = RenameNames { renames };
            sable_syntax::transform_stmt(&mut folder, other)
        }
    }
}

struct RenameNames<'a> {
    renames: &'a FxHashMap<String, String>,
}

impl Fold for RenameNames<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Transformed<Expr> {
        match expr {
            Expr::Name { id, span } => {
                let renamed = match self.renames.get(id.name()) {
                    Some(target) => match id {
                        Identifier::Plain(_) => Identifier::Plain(target.clone()),
                        Identifier::Local { scope, .. } => Identifier::Local {
                            scope,
                            name: target.clone(),
                        },
                    },
                    None => id,
                };
                Transformed::stop(Expr::Name { id: renamed, span })
            }
            other => Transformed::children(other),
        }
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Transformed<Stmt> {
        match stmt {
            // Handled by rename_in_stmt so shadowing can be honored.
            Stmt::Define(_) | Stmt::Class(_) => Transformed::stop(stmt),
            other => Transformed::children(other),
        }
    }
}
