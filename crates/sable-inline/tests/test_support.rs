//! Shared fixtures for integration tests: tree builders plus a deterministic
//! in-memory environment standing in for the engine's module store,
//! qualification pass, and capture-population pass.

use rustc_hash::{FxHashMap, FxHashSet};

use sable_inline::Environment;
use sable_syntax::{
    transform_statements, Capture, ClassDef, Define, Expr, Fold, Identifier, Parameter, Reference,
    SourceUnit, Span, Stmt, Transformed,
};

pub fn span() -> Span {
    Span::synthetic()
}

pub fn name(id: &str) -> Expr {
    Expr::plain_name(id, span())
}

pub fn dotted(path: &str) -> Expr {
    Expr::from_reference(&Reference::parse(path), span())
}

/// `def deco(f): def wrapper(*args, **kwargs): return f(*args, **kwargs); return wrapper`
pub fn forwarding_decorator(decorator_name: &str) -> Define {
    let wrapper = Define::new(
        Reference::single("wrapper"),
        vec![Parameter::star("args"), Parameter::double_star("kwargs")],
        vec![Stmt::ret(
            Expr::call(
                name("f"),
                vec![
                    sable_syntax::Argument::star(name("args")),
                    sable_syntax::Argument::double_star(name("kwargs")),
                ],
                span(),
            ),
            span(),
        )],
    );
    Define::new(
        Reference::single(decorator_name),
        vec![Parameter::named("f")],
        vec![
            Stmt::Define(wrapper),
            Stmt::ret(name("wrapper"), span()),
        ],
    )
}

/// In-memory module table implementing the collaborator contract.
#[derive(Default)]
pub struct TestEnvironment {
    modules: FxHashMap<Reference, SourceUnit>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        TestEnvironment::default()
    }

    pub fn with_module(mut self, unit: SourceUnit) -> Self {
        self.modules.insert(unit.module.clone(), unit);
        self
    }
}

impl Environment for TestEnvironment {
    fn get_source(&self, module: &Reference) -> Option<SourceUnit> {
        self.modules.get(module).cloned()
    }

    fn qualify(&self, unit: SourceUnit) -> SourceUnit {
        qualify_unit(unit)
    }

    fn populate_captures(&self, unit: SourceUnit) -> SourceUnit {
        let statements = unit
            .statements
            .into_iter()
            .map(populate_captures_stmt)
            .collect();
        SourceUnit {
            statements,
            ..unit
        }
    }
}

// ---------------------------------------------------------------------------
// Minimal qualification pass
// ---------------------------------------------------------------------------

/// Binds plain names that resolve to function-local variables into their
/// defining scope. Already-qualified (`Local`) names are left untouched, so
/// the pass is idempotent over synthesized units.
pub fn qualify_unit(unit: SourceUnit) -> SourceUnit {
    let module = unit.module.clone();
    let mut scopes: Vec<(Reference, FxHashSet<String>)> = Vec::new();
    let statements = unit
        .statements
        .into_iter()
        .map(|stmt| qualify_stmt(stmt, &module, &mut scopes))
        .collect();
    SourceUnit { module, statements }
}

fn qualify_stmt(
    stmt: Stmt,
    namespace: &Reference,
    scopes: &mut Vec<(Reference, FxHashSet<String>)>,
) -> Stmt {
    match stmt {
        Stmt::Define(define) => Stmt::Define(qualify_define(define, namespace, scopes)),
        Stmt::Class(class) => {
            let qualified_name = if class.name.len() > 1 {
                class.name.clone()
            } else {
                namespace.extend(class.name.last().unwrap_or_default())
            };
            let body = class
                .body
                .into_iter()
                .map(|stmt| qualify_stmt(stmt, &qualified_name, scopes))
                .collect();
            Stmt::Class(ClassDef {
                name: qualified_name,
                body,
                ..class
            })
        }
        other => {
            let mut folder = BindNames {
                scopes: scopes.as_slice(),
            };
            transform_statements(&mut folder, vec![other])
                .into_iter()
                .next()
                .expect("one statement in, one statement out")
        }
    }
}

fn qualify_define(
    define: Define,
    namespace: &Reference,
    scopes: &mut Vec<(Reference, FxHashSet<String>)>,
) -> Define {
    let qualified_name = if define.name.len() > 1 {
        define.name.clone()
    } else {
        namespace.extend(define.name.last().unwrap_or_default())
    };

    let mut locals: FxHashSet<String> = define
        .parameters
        .iter()
        .map(|parameter| parameter.name.name().to_string())
        .collect();
    collect_shallow_bindings(&define.body, &mut locals);

    let parameters = define
        .parameters
        .into_iter()
        .map(|parameter| Parameter {
            name: parameter.name.qualify_local(&qualified_name),
            ..parameter
        })
        .collect();

    scopes.push((qualified_name.clone(), locals));
    let body = define
        .body
        .into_iter()
        .map(|stmt| qualify_stmt(stmt, &qualified_name, scopes))
        .collect();
    scopes.pop();

    Define {
        name: qualified_name,
        parameters,
        body,
        ..define
    }
}

fn collect_shallow_bindings(statements: &[Stmt], out: &mut FxHashSet<String>) {
    for stmt in statements {
        match stmt {
            Stmt::Assign {
                target: Expr::Name { id, .. },
                ..
            } => {
                out.insert(id.name().to_string());
            }
            Stmt::Define(define) => {
                if let Some(last) = define.name.last() {
                    out.insert(last.to_string());
                }
            }
            Stmt::Class(class) => {
                if let Some(last) = class.name.last() {
                    out.insert(last.to_string());
                }
            }
            Stmt::If { body, orelse, .. } => {
                collect_shallow_bindings(body, out);
                collect_shallow_bindings(orelse, out);
            }
            _ => {}
        }
    }
}

struct BindNames<'a> {
    scopes: &'a [(Reference, FxHashSet<String>)],
}

impl Fold for BindNames<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Transformed<Expr> {
        match expr {
            Expr::Name {
                id: Identifier::Plain(name),
                span,
            } => {
                let binder = self
                    .scopes
                    .iter()
                    .rev()
                    .find(|(_, locals)| locals.contains(&name));
                let id = match binder {
                    Some((scope, _)) => Identifier::Local {
                        scope: scope.clone(),
                        name,
                    },
                    None => Identifier::Plain(name),
                };
                Transformed::stop(Expr::Name { id, span })
            }
            other => Transformed::children(other),
        }
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Transformed<Stmt> {
        match stmt {
            // Nested scopes are handled by qualify_stmt.
            Stmt::Define(_) | Stmt::Class(_) => Transformed::stop(stmt),
            other => Transformed::children(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Minimal capture-population pass
// ---------------------------------------------------------------------------

fn populate_captures_stmt(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Define(define) => Stmt::Define(populate_captures_define(define)),
        Stmt::Class(class) => Stmt::Class(ClassDef {
            body: class.body.into_iter().map(populate_captures_stmt).collect(),
            ..class
        }),
        other => other,
    }
}

fn populate_captures_define(define: Define) -> Define {
    let mut captures: Vec<Capture> = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    sable_syntax::visit_exprs(&define.body, &mut |expr| {
        if let Expr::Name {
            id: Identifier::Local { scope, name },
            ..
        } = expr
        {
            let from_enclosing_function =
                *scope != define.name && define.name.starts_with(scope) && scope.len() > 1;
            if from_enclosing_function && seen.insert(name.clone()) {
                captures.push(Capture {
                    name: name.clone(),
                    origin: scope.clone(),
                });
            }
        }
    });
    let body = define
        .body
        .into_iter()
        .map(populate_captures_stmt)
        .collect();
    Define {
        captures,
        body,
        ..define
    }
}
