//! Builds one composed replacement body for a decorated function.
//!
//! Decorators arrive in source application order (outermost written first).
//! Composition walks them innermost-first, turning each wrapper into a
//! nested synthetic function whose higher-order parameter is rewired to call
//! the previously synthesized function, bottoming out at a clone of the
//! original body. The final body defines the clone, then each synthetic
//! wrapper, then returns a call into the outermost one, so the runtime call
//! chain is original -> innermost wrapper -> ... -> outermost wrapper.

use rustc_hash::FxHashMap;

use sable_syntax::{
    transform_define, Argument, Define, Expr, Fold, Identifier, Parameter, ParameterKind,
    Reference, SourceUnit, Span, Stmt, Transformed,
};

use crate::context::InlineContext;
use crate::environment::Environment;
use crate::matcher::DecoratorData;
use crate::scope::{
    rename_define, rename_identifiers, requalify_define, sanitize_define, set_parent,
    uniquify_names,
};
use crate::signature::replace_signature_if_always_passing_on_arguments;

const ORIGINAL_NAME: &str = "__original_function";
const INLINED_PREFIX: &str = "__inlined_";

/// Synthesizes the inlined replacement for `target`. `decorators` is the
/// matched subset in source application order; `remaining_decorators` are the
/// expressions that stay applied (unmatched decorators and method markers).
///
/// `None` means composition could not be completed soundly and the caller
/// must keep the original definition.
pub fn inline_decorators_for_define(
    context: &InlineContext,
    environment: &dyn Environment,
    module: &Reference,
    target: &Define,
    decorators: &[DecoratorData],
    remaining_decorators: Vec<Expr>,
) -> Option<Define> {
    if decorators.is_empty() {
        return None;
    }

    let names = SyntheticNames::plan(decorators);

    let original = make_original_clone(target, &names.original);
    let mut previous_local = names.original.clone();
    let mut previous_parameters = original.parameters.clone();

    // Innermost decorator (written closest to the def) composes first.
    // Wrapper-to-decorator mappings are held back until finalization
    // succeeds: a fallback must leave the context without entries for
    // wrappers that never materialized.
    let mut inlined_names: Vec<(Reference, Reference)> = Vec::new();
    let mut synthesized: Vec<Option<SyntheticWrapper>> =
        (0..decorators.len()).map(|_| None).collect();
    for (index, data) in decorators.iter().enumerate().rev() {
        let plan = &names.wrappers[index];
        let wrapper = build_wrapper(
            target,
            data,
            plan,
            &previous_local,
            &previous_parameters,
        );
        inlined_names.push((wrapper.define.name.clone(), data.outer_name.clone()));
        previous_local = plan.wrapper_local.clone();
        previous_parameters = wrapper.define.parameters.clone();
        synthesized[index] = Some(wrapper);
    }

    let outermost_parameters = rebase_parameters(&previous_parameters, &target.name);
    let return_stmt = Stmt::Return {
        value: Some(Expr::call(
            Expr::Name {
                id: Identifier::local(target.name.clone(), &previous_local),
                span: decorators[0].applied_at,
            },
            forwarding_arguments(&outermost_parameters),
            decorators[0].applied_at,
        )),
        span: decorators[0].applied_at,
    };

    let mut body = vec![Stmt::Define(original)];
    // Outer-to-inner order in the synthesized body, helpers beside their
    // wrapper.
    for wrapper in synthesized.into_iter().flatten() {
        for helper in wrapper.helpers {
            body.push(Stmt::Define(helper));
        }
        body.push(Stmt::Define(wrapper.define));
    }
    body.push(return_stmt);

    let new_define = Define {
        name: target.name.clone(),
        parameters: outermost_parameters,
        decorators: remaining_decorators,
        return_annotation: target.return_annotation.clone(),
        body,
        parent: target.parent.clone(),
        nesting_define: target.nesting_define.clone(),
        captures: Vec::new(),
        unbound_names: None,
        span: target.span,
    };

    let finalized = finalize(environment, module, new_define)?;
    for (wrapper_name, decorator_name) in &inlined_names {
        context.record_inlined_original(wrapper_name, decorator_name);
    }
    Some(finalized)
}

/// Runs the external qualification and capture passes over the synthesized
/// single-definition unit and re-extracts the result. Anything other than
/// exactly one definition is an internal inconsistency: fall back.
fn finalize(
    environment: &dyn Environment,
    module: &Reference,
    define: Define,
) -> Option<Define> {
    let unit = SourceUnit::new(module.clone(), vec![Stmt::Define(define)]);
    let unit = environment.qualify(unit);
    let unit = environment.populate_captures(unit);
    let mut defines = unit.statements.into_iter().filter_map(|stmt| match stmt {
        Stmt::Define(define) => Some(define),
        _ => None,
    });
    let first = defines.next()?;
    if defines.next().is_some() {
        return None;
    }
    Some(first)
}

/// Deterministic local names for everything the composition introduces,
/// uniquified together so stacked decorators sharing a name cannot collide.
struct SyntheticNames {
    original: String,
    wrappers: Vec<WrapperNames>,
}

struct WrapperNames {
    wrapper_local: String,
    helper_locals: Vec<String>,
}

impl SyntheticNames {
    fn plan(decorators: &[DecoratorData]) -> SyntheticNames {
        let mut flat: Vec<String> = vec![ORIGINAL_NAME.to_string()];
        for data in decorators {
            for helper in &data.helpers {
                flat.push(helper.name.last().unwrap_or("helper").to_string());
            }
            let base = data.outer_name.last().unwrap_or("decorator");
            flat.push(format!("{INLINED_PREFIX}{base}"));
        }
        let unique = uniquify_names(flat, |name| name.clone(), |_, fresh| fresh);

        let mut iter = unique.into_iter();
        let original = iter.next().unwrap_or_else(|| ORIGINAL_NAME.to_string());
        let wrappers = decorators
            .iter()
            .map(|data| {
                let helper_locals = data
                    .helpers
                    .iter()
                    .map(|_| iter.next().unwrap_or_default())
                    .collect();
                WrapperNames {
                    wrapper_local: iter.next().unwrap_or_default(),
                    helper_locals,
                }
            })
            .collect();
        SyntheticNames { original, wrappers }
    }
}

/// Clones the target body into a nested helper holding the un-decorated
/// behavior.
fn make_original_clone(target: &Define, local_name: &str) -> Define {
    let mut original = target.clone();
    // A method's implicit self annotation is recoverable from the class the
    // un-decorated original sat in; back-fill it before the clone loses its
    // parent link.
    if let Some(class) = &target.parent {
        if !target.is_static_method() && !target.is_class_method() {
            if let Some(first) = original.parameters.first_mut() {
                if first.kind == ParameterKind::Named
                    && first.name.name() == "self"
                    && first.annotation.is_none()
                {
                    first.annotation = Some(Expr::from_reference(class, Span::synthetic()));
                }
            }
        }
    }
    let qualified = target.name.extend(local_name);
    let original = rename_define(original, qualified);
    let original = set_parent(original, Some(target.name.clone()));
    sanitize_define(original, true, true)
}

struct SyntheticWrapper {
    define: Define,
    helpers: Vec<Define>,
}

fn build_wrapper(
    target: &Define,
    data: &DecoratorData,
    names: &WrapperNames,
    previous_local: &str,
    previous_parameters: &[Parameter],
) -> SyntheticWrapper {
    let wrapper_qualified = target.name.extend(&names.wrapper_local);

    // Uniquification may have renamed helper locals; references inside the
    // decorator body must follow.
    let mut helper_renames: FxHashMap<String, String> = FxHashMap::default();
    for (helper, unique) in data.helpers.iter().zip(&names.helper_locals) {
        let old = helper.name.last().unwrap_or_default().to_string();
        if old != *unique {
            helper_renames.insert(old, unique.clone());
        }
    }

    let mut wrapper = rename_define(data.wrapper.clone(), wrapper_qualified);
    wrapper = requalify_define(wrapper, &data.decorator_name, &target.name);
    if !helper_renames.is_empty() {
        wrapper = rename_identifiers(wrapper, &helper_renames);
    }

    if let Some((refined, _trailing)) = replace_signature_if_always_passing_on_arguments(
        wrapper.clone(),
        &data.higher_order_parameter,
        previous_parameters,
    ) {
        wrapper = refined;
    }

    let replacement = Identifier::local(target.name.clone(), previous_local);
    wrapper = rewire_higher_order_calls(wrapper, &data.higher_order_parameter, &replacement);
    wrapper = set_parent(wrapper, Some(target.name.clone()));
    wrapper = sanitize_define(wrapper, true, true);

    let helpers = data
        .helpers
        .iter()
        .zip(&names.helper_locals)
        .map(|(helper, unique)| {
            let qualified = target.name.extend(unique);
            let mut helper = rename_define(helper.clone(), qualified);
            helper = requalify_define(helper, &data.decorator_name, &target.name);
            if !helper_renames.is_empty() {
                helper = rename_identifiers(helper, &helper_renames);
            }
            helper =
                rewire_higher_order_calls(helper, &data.higher_order_parameter, &replacement);
            helper = set_parent(helper, Some(target.name.clone()));
            sanitize_define(helper, true, true)
        })
        .collect();

    SyntheticWrapper {
        define: wrapper,
        helpers,
    }
}

/// Redirects every call through the higher-order parameter to the previously
/// synthesized function. If the parameter still occurs as a bare name after
/// that (passed around rather than called), a binding assignment keeps it
/// from escaping as a free name.
fn rewire_higher_order_calls(
    define: Define,
    parameter: &str,
    replacement: &Identifier,
) -> Define {
    let mut folder = RewireCalls {
        parameter,
        replacement,
    };
    let mut define = transform_define(&mut folder, define);

    let mut residual: Option<Identifier> = None;
    sable_syntax::visit_define_exprs(&define, &mut |expr| {
        if let Expr::Name { id, .. } = expr {
            if id.name() == parameter && residual.is_none() {
                residual = Some(id.clone());
            }
        }
    });
    if let Some(id) = residual {
        define.body.insert(
            0,
            Stmt::assign(
                Expr::Name {
                    id,
                    span: Span::synthetic(),
                },
                Expr::Name {
                    id: replacement.clone(),
                    span: Span::synthetic(),
                },
                Span::synthetic(),
            ),
        );
    }
    define
}

struct RewireCalls<'a> {
    parameter: &'a str,
    replacement: &'a Identifier,
}

impl Fold for RewireCalls<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Transformed<Expr> {
        match expr {
            Expr::Call {
                callee,
                arguments,
                span,
            } if callee
                .as_identifier()
                .is_some_and(|id| id.name() == self.parameter) =>
            {
                Transformed::children(Expr::Call {
                    callee: Box::new(Expr::Name {
                        id: self.replacement.clone(),
                        span: callee.span(),
                    }),
                    arguments,
                    span,
                })
            }
            other => Transformed::children(other),
        }
    }
}

/// Parameters of the outermost wrapper, re-scoped onto the target define.
fn rebase_parameters(parameters: &[Parameter], scope: &Reference) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|parameter| Parameter {
            name: if parameter.name.is_local() {
                Identifier::local(scope.clone(), parameter.name.name())
            } else {
                parameter.name.clone()
            },
            ..parameter.clone()
        })
        .collect()
}

/// `f(x, y, *rest, **options)` mirroring a parameter list.
fn forwarding_arguments(parameters: &[Parameter]) -> Vec<Argument> {
    parameters
        .iter()
        .map(|parameter| {
            let value = Expr::Name {
                id: parameter.name.clone(),
                span: Span::synthetic(),
            };
            match parameter.kind {
                ParameterKind::Named => Argument::positional(value),
                ParameterKind::Star => Argument::star(value),
                ParameterKind::DoubleStar => Argument::double_star(value),
            }
        })
        .collect()
}
