//! Per-unit preprocessing driver: discard no-op decorators, then inline the
//! ones whose defining function matches the simple-wrapper shape.
//!
//! Every failure mode downgrades to "leave this function alone"; nothing
//! here is fatal to the run. Set `SABLE_TRACE_INLINE=1` to see why
//! individual decorators were skipped.

use std::sync::Arc;

use sable_syntax::{ClassDef, Define, Expr, Reference, SourceUnit, Stmt};

use crate::compose::inline_decorators_for_define;
use crate::context::{decorator_reference, Action, Configuration, InlineContext};
use crate::environment::Environment;
use crate::matcher::{extract_decorator_data, DecoratorData};

fn trace_enabled() -> bool {
    std::env::var("SABLE_TRACE_INLINE").is_ok_and(|value| value == "1")
}

fn trace(message: impl FnOnce() -> String) {
    if trace_enabled() {
        eprintln!("[SABLE_INLINE] {}", message());
    }
}

/// Applies discarding then inlining across every function definition in the
/// unit, per the run's configuration. Definitions that are undecorated, carry
/// a `DoNotInline` action, or fail to match are returned untouched.
pub fn preprocess_source(
    context: &InlineContext,
    environment: &dyn Environment,
    unit: SourceUnit,
) -> SourceUnit {
    let Some(configuration) = context.configuration() else {
        return unit;
    };
    if !configuration.enable_inlining && !configuration.enable_discarding {
        return unit;
    }
    let module = unit.module.clone();
    let statements =
        preprocess_statements(context, environment, &module, unit.statements, &configuration);
    SourceUnit { module, statements }
}

fn preprocess_statements(
    context: &InlineContext,
    environment: &dyn Environment,
    module: &Reference,
    statements: Vec<Stmt>,
    configuration: &Arc<Configuration>,
) -> Vec<Stmt> {
    statements
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::Define(define) => Stmt::Define(preprocess_define(
                context,
                environment,
                module,
                define,
                configuration,
            )),
            Stmt::Class(class) => Stmt::Class(ClassDef {
                body: preprocess_statements(
                    context,
                    environment,
                    module,
                    class.body,
                    configuration,
                ),
                ..class
            }),
            Stmt::If {
                test,
                body,
                orelse,
                span,
            } => Stmt::If {
                test,
                body: preprocess_statements(context, environment, module, body, configuration),
                orelse: preprocess_statements(context, environment, module, orelse, configuration),
                span,
            },
            other => other,
        })
        .collect()
}

fn preprocess_define(
    context: &InlineContext,
    environment: &dyn Environment,
    module: &Reference,
    define: Define,
    configuration: &Arc<Configuration>,
) -> Define {
    // Inner decorated functions first, so a transformed outer body wraps
    // already-processed nested definitions.
    let mut define = Define {
        body: preprocess_statements(context, environment, module, define.body, configuration),
        ..define
    };

    let pristine_decorators = define.decorators.clone();
    if configuration.enable_discarding {
        define = context.discard(define);
    }

    if configuration.enable_inlining && !define.decorators.is_empty() {
        let blocked = define
            .decorators
            .iter()
            .any(|decorator| context.has_any_action(decorator, &[Action::DoNotInline]));
        if blocked {
            trace(|| format!("{}: do-not-inline action, skipping", define.name));
        } else {
            define = try_inline(context, environment, module, define);
        }
    }

    if define.decorators.len() != pristine_decorators.len() {
        context.record_original_decorators(&define.name, pristine_decorators);
    }
    define
}

fn try_inline(
    context: &InlineContext,
    environment: &dyn Environment,
    module: &Reference,
    define: Define,
) -> Define {
    let mut matched: Vec<DecoratorData> = Vec::new();
    let mut remaining: Vec<Expr> = Vec::new();
    for decorator in &define.decorators {
        match resolve_decorator(context, environment, module, decorator) {
            Some(data) => matched.push(data),
            None => {
                trace(|| format!("{}: decorator {decorator} left un-inlined", define.name));
                remaining.push(decorator.clone());
            }
        }
    }
    if matched.is_empty() {
        return define;
    }
    match inline_decorators_for_define(context, environment, module, &define, &matched, remaining)
    {
        Some(new_define) => new_define,
        None => {
            trace(|| format!("{}: composition fell back to the original", define.name));
            define
        }
    }
}

/// Locates and shape-matches the decorator a decorator expression refers to.
/// Any miss (unresolvable expression, unfetchable module, unknown function,
/// shape mismatch) yields `None`.
fn resolve_decorator(
    context: &InlineContext,
    environment: &dyn Environment,
    module: &Reference,
    decorator: &Expr,
) -> Option<DecoratorData> {
    let outer = decorator_reference(decorator)?;
    let is_factory = matches!(decorator, Expr::Call { .. });
    let definition = find_decorator_define(context, environment, module, &outer)?;
    extract_decorator_data(&definition, is_factory, outer, decorator.span())
}

fn find_decorator_define(
    context: &InlineContext,
    environment: &dyn Environment,
    current_module: &Reference,
    reference: &Reference,
) -> Option<Define> {
    let name = reference.last()?;
    let mut candidates = Vec::new();
    if reference.len() > 1 {
        candidates.push(reference.prefix());
    }
    candidates.push(current_module.clone());
    for module in candidates {
        let Some(defines) = context.cache_module_decorators(&module, environment) else {
            continue;
        };
        if let Some(found) = defines
            .iter()
            .find(|define| define.name.last() == Some(name))
        {
            return Some(found.clone());
        }
    }
    None
}
