//! Replaces a wrapper's broad `(*args, **kwargs)` signature with the wrapped
//! function's precise parameter list.
//!
//! Applies only when the wrapper provably forwards everything unchanged:
//! its final two parameters are the variadic collectors and every call to the
//! wrapped callable has the exact `callee(<prefix>, *args, **kwargs)` shape.
//! Residual direct uses of the collectors keep working through synthesized
//! tuple/dict reconstruction assignments at the top of the body.

use rustc_hash::{FxHashMap, FxHashSet};

use sable_syntax::{
    transform_statements, Argument, Define, DictEntry, Expr, Fold, Identifier, Literal, Parameter,
    ParameterKind, Reference, Span, Stmt, Transformed,
};

use crate::scope::rename_identifiers;

/// Result of a successful refinement: the rewritten wrapper plus the target
/// parameters past the matched prefix (the ones the forwarding call now
/// passes explicitly).
pub fn replace_signature_if_always_passing_on_arguments(
    wrapper: Define,
    callee_name: &str,
    target_parameters: &[Parameter],
) -> Option<(Define, Vec<Parameter>)> {
    let (prefix, star_name, double_star_name) = split_forwarding_parameters(&wrapper.parameters)?;
    if prefix.len() > target_parameters.len() {
        return None;
    }
    if target_parameters[..prefix.len()]
        .iter()
        .any(|parameter| parameter.kind != ParameterKind::Named)
    {
        return None;
    }

    let pass_through = has_identity_preserving_marker(&wrapper);

    let used: FxHashSet<String> = target_parameters
        .iter()
        .map(|parameter| parameter.name.name().to_string())
        .collect();
    let fresh_args = fresh_name("__args", &used);
    let fresh_kwargs = fresh_name("__kwargs", &used);

    let collectors_were_local = wrapper
        .parameters
        .iter()
        .rev()
        .take(2)
        .any(|parameter| parameter.name.is_local());

    let mut renames: FxHashMap<String, String> = FxHashMap::default();
    renames.insert(star_name.clone(), fresh_args.clone());
    renames.insert(double_star_name.clone(), fresh_kwargs.clone());
    let mut renamed_prefix = Vec::new();
    for (parameter, target) in prefix.iter().zip(target_parameters) {
        let source = parameter.name.name().to_string();
        let target_name = target.name.name().to_string();
        if source != target_name {
            renames.insert(source, target_name.clone());
        }
        renamed_prefix.push(target_name);
    }

    let prefix_len = prefix.len();

    // A malformed map (duplicate targets) makes the rename a no-op; the call
    // scan below then fails to find the fresh collector names and the whole
    // refinement degrades to no-match.
    let wrapper = rename_identifiers(wrapper, &renames);
    let wrapper_scope = wrapper.name.clone();

    let rebound: Vec<Parameter> = target_parameters
        .iter()
        .map(|parameter| rebind_parameter(parameter, &wrapper_scope))
        .collect();
    let trailing: Vec<Parameter> = rebound[prefix_len..].to_vec();

    let shape = ForwardingShape {
        callee_name: callee_name.to_string(),
        prefix: renamed_prefix,
        fresh_args: fresh_args.clone(),
        fresh_kwargs: fresh_kwargs.clone(),
        skip_prefix_check: pass_through,
    };
    if !all_callee_calls_match(&wrapper.body, &shape) {
        return None;
    }

    let mut rewriter = RewriteForwardingCalls {
        shape: &shape,
        trailing: &trailing,
        rewrote: false,
    };
    let body = transform_statements(&mut rewriter, wrapper.body);
    if !rewriter.rewrote {
        return None;
    }

    let make_identifier = |name: &str| {
        if collectors_were_local {
            Identifier::local(wrapper_scope.clone(), name)
        } else {
            Identifier::plain(name)
        }
    };
    let reconstruction = vec![
        Stmt::assign(
            Expr::Name {
                id: make_identifier(&fresh_args),
                span: Span::synthetic(),
            },
            args_tuple(&rebound),
            Span::synthetic(),
        ),
        Stmt::assign(
            Expr::Name {
                id: make_identifier(&fresh_kwargs),
                span: Span::synthetic(),
            },
            kwargs_dict(&rebound),
            Span::synthetic(),
        ),
    ];

    let mut body_with_preamble = reconstruction;
    body_with_preamble.extend(body);

    let refined = Define {
        parameters: rebound,
        body: body_with_preamble,
        unbound_names: None,
        ..wrapper
    };
    Some((refined, trailing))
}

/// Splits `[named..., *args, **kwargs]`; anything else refuses refinement.
fn split_forwarding_parameters(
    parameters: &[Parameter],
) -> Option<(Vec<&Parameter>, String, String)> {
    if parameters.len() < 2 {
        return None;
    }
    let named = &parameters[..parameters.len() - 2];
    let star = &parameters[parameters.len() - 2];
    let double_star = &parameters[parameters.len() - 1];
    if star.kind != ParameterKind::Star || double_star.kind != ParameterKind::DoubleStar {
        return None;
    }
    if named
        .iter()
        .any(|parameter| parameter.kind != ParameterKind::Named)
    {
        return None;
    }
    Some((
        named.iter().collect(),
        star.name.name().to_string(),
        double_star.name.name().to_string(),
    ))
}

/// Wrappers decorated with the identity-preserving marker
/// (`functools.wraps(...)`) forward prefix arguments they renamed; skip the
/// positional prefix check for those.
fn has_identity_preserving_marker(wrapper: &Define) -> bool {
    wrapper.decorators.iter().any(|decorator| match decorator {
        Expr::Call { callee, .. } => callee
            .as_reference()
            .is_some_and(|reference| reference == Reference::parse("functools.wraps")),
        _ => false,
    })
}

fn fresh_name(base: &str, used: &FxHashSet<String>) -> String {
    let mut candidate = base.to_string();
    while used.contains(&candidate) {
        candidate.push('_');
    }
    candidate
}

fn rebind_parameter(parameter: &Parameter, scope: &Reference) -> Parameter {
    let name = if parameter.name.is_local() {
        Identifier::local(scope.clone(), parameter.name.name())
    } else {
        Identifier::plain(parameter.name.name())
    };
    Parameter {
        name,
        ..parameter.clone()
    }
}

struct ForwardingShape {
    callee_name: String,
    prefix: Vec<String>,
    fresh_args: String,
    fresh_kwargs: String,
    skip_prefix_check: bool,
}

impl ForwardingShape {
    fn matches(&self, arguments: &[Argument]) -> bool {
        if arguments.len() != self.prefix.len() + 2 {
            return false;
        }
        let star = &arguments[arguments.len() - 2];
        let double_star = &arguments[arguments.len() - 1];
        let star_ok = matches!(star.kind, sable_syntax::ArgKind::Star)
            && star
                .value
                .as_identifier()
                .is_some_and(|id| id.name() == self.fresh_args);
        let double_star_ok = matches!(double_star.kind, sable_syntax::ArgKind::DoubleStar)
            && double_star
                .value
                .as_identifier()
                .is_some_and(|id| id.name() == self.fresh_kwargs);
        if !star_ok || !double_star_ok {
            return false;
        }
        arguments[..self.prefix.len()]
            .iter()
            .zip(&self.prefix)
            .all(|(argument, expected)| {
                matches!(argument.kind, sable_syntax::ArgKind::Positional)
                    && (self.skip_prefix_check
                        || argument
                            .value
                            .as_identifier()
                            .is_some_and(|id| id.name() == expected.as_str()))
            })
    }
}

/// Every call to the forwarded callee must have the exact trailing-variadic
/// forwarding shape, and there must be at least one such call.
fn all_callee_calls_match(statements: &[Stmt], shape: &ForwardingShape) -> bool {
    let mut found = false;
    let mut all_match = true;
    sable_syntax::visit_exprs(statements, &mut |expr| {
        let Expr::Call {
            callee, arguments, ..
        } = expr
        else {
            return;
        };
        if !callee
            .as_identifier()
            .is_some_and(|id| id.name() == shape.callee_name)
        {
            return;
        }
        found = true;
        if !shape.matches(arguments) {
            all_match = false;
        }
    });
    found && all_match
}

struct RewriteForwardingCalls<'a> {
    shape: &'a ForwardingShape,
    trailing: &'a [Parameter],
    rewrote: bool,
}

impl Fold for RewriteForwardingCalls<'_> {
    fn fold_expr(&mut self, expr: Expr) -> Transformed<Expr> {
        let Expr::Call {
            callee,
            arguments,
            span,
        } = expr
        else {
            return Transformed::children(expr);
        };
        let is_target = callee
            .as_identifier()
            .is_some_and(|id| id.name() == self.shape.callee_name)
            && self.shape.matches(&arguments);
        if !is_target {
            return Transformed::children(Expr::Call {
                callee,
                arguments,
                span,
            });
        }
        let mut rewritten: Vec<Argument> =
            arguments[..self.shape.prefix.len()].to_vec();
        for parameter in self.trailing {
            let value = Expr::Name {
                id: parameter.name.clone(),
                span: Span::synthetic(),
            };
            let argument = match parameter.kind {
                ParameterKind::Named => Argument::positional(value),
                ParameterKind::Star => Argument::star(value),
                ParameterKind::DoubleStar => Argument::double_star(value),
            };
            rewritten.push(argument);
        }
        self.rewrote = true;
        Transformed::children(Expr::Call {
            callee,
            arguments: rewritten,
            span,
        })
    }
}

/// `(p1, p2, *rest)` over the refined parameter list.
fn args_tuple(parameters: &[Parameter]) -> Expr {
    let items = parameters
        .iter()
        .filter_map(|parameter| {
            let name = Expr::Name {
                id: parameter.name.clone(),
                span: Span::synthetic(),
            };
            match parameter.kind {
                ParameterKind::Named => Some(name),
                ParameterKind::Star => Some(Expr::Starred {
                    value: Box::new(name),
                    span: Span::synthetic(),
                }),
                ParameterKind::DoubleStar => None,
            }
        })
        .collect();
    Expr::Tuple {
        items,
        span: Span::synthetic(),
    }
}

/// `{"p1": p1, "p2": p2, **kw}` over the refined parameter list.
fn kwargs_dict(parameters: &[Parameter]) -> Expr {
    let entries = parameters
        .iter()
        .filter_map(|parameter| {
            let name = Expr::Name {
                id: parameter.name.clone(),
                span: Span::synthetic(),
            };
            match parameter.kind {
                ParameterKind::Named => Some(DictEntry {
                    key: Some(Expr::Literal {
                        value: Literal::Str(parameter.name.name().to_string()),
                        span: Span::synthetic(),
                    }),
                    value: name,
                }),
                ParameterKind::Star => None,
                ParameterKind::DoubleStar => Some(DictEntry {
                    key: None,
                    value: name,
                }),
            }
        })
        .collect();
    Expr::Dict {
        entries,
        span: Span::synthetic(),
    }
}
