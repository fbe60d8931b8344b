//! Recognizes the "simple single wrapper" decorator shape.
//!
//! A decorator matches when it (or the single function nested inside a
//! factory body) takes exactly one parameter, ends by returning one of its
//! nested functions by name, and calls the wrapped parameter identically at
//! every call site. Anything else is left un-inlined; there is no error path.

use sable_syntax::{
    arguments_equal, visit_define_exprs, Argument, Define, Expr, ParameterKind, Reference, Span,
    Stmt,
};

/// One matched decorator occurrence, consumed immediately by composition.
#[derive(Debug, Clone)]
pub struct DecoratorData {
    /// The nested function the decorator returns.
    pub wrapper: Define,
    /// Other functions nested beside the wrapper.
    pub helpers: Vec<Define>,
    /// Name of the parameter bound to the wrapped callable.
    pub higher_order_parameter: String,
    /// Fully-qualified name of the decorator function itself.
    pub decorator_name: Reference,
    /// Fully-qualified name of the applied (possibly factory) decorator.
    pub outer_name: Reference,
    /// Location of the decorator application.
    pub applied_at: Span,
}

/// Matches `decorator` against the simple-wrapper shape. For a factory,
/// the factory body must contain exactly one nested definition, which is the
/// decorator to match.
pub fn extract_decorator_data(
    decorator: &Define,
    is_factory: bool,
    outer_name: Reference,
    applied_at: Span,
) -> Option<DecoratorData> {
    let decorator = if is_factory {
        let nested = decorator.nested_defines();
        match nested.as_slice() {
            [single] => *single,
            _ => return None,
        }
    } else {
        decorator
    };

    let higher_order_parameter = match decorator.parameters.as_slice() {
        [only] if only.kind == ParameterKind::Named => only.name.name().to_string(),
        _ => return None,
    };

    let wrapper_name = returned_local_name(decorator)?;

    let mut wrapper = None;
    let mut helpers = Vec::new();
    for nested in decorator.nested_defines() {
        if nested.name.last() == Some(wrapper_name.as_str()) {
            if wrapper.is_some() {
                // Two candidates for the returned name: ambiguous.
                return None;
            }
            wrapper = Some(nested.clone());
        } else {
            helpers.push(nested.clone());
        }
    }
    let wrapper = wrapper?;

    if !calls_to_parameter_are_identical(decorator, &higher_order_parameter) {
        return None;
    }

    Some(DecoratorData {
        wrapper,
        helpers,
        higher_order_parameter,
        decorator_name: decorator.name.clone(),
        outer_name,
        applied_at,
    })
}

/// The decorator body's final statement must return a plain local name.
fn returned_local_name(decorator: &Define) -> Option<String> {
    match decorator.body.last()? {
        Stmt::Return {
            value: Some(Expr::Name { id, .. }),
            ..
        } => Some(id.name().to_string()),
        _ => None,
    }
}

/// Every call whose callee is the higher-order parameter must pass a
/// structurally identical argument list; this is the invariant that licenses
/// substituting one concrete callee later. Vacuously true with no calls.
fn calls_to_parameter_are_identical(decorator: &Define, parameter: &str) -> bool {
    let mut first: Option<&[Argument]> = None;
    let mut identical = true;
    visit_define_exprs(decorator, &mut |expr| {
        let Expr::Call {
            callee, arguments, ..
        } = expr
        else {
            return;
        };
        let is_parameter_call = callee
            .as_identifier()
            .is_some_and(|id| id.name() == parameter);
        if !is_parameter_call {
            return;
        }
        match first {
            None => first = Some(arguments),
            Some(reference_arguments) => {
                if !arguments_equal(reference_arguments, arguments) {
                    identical = false;
                }
            }
        }
    });
    identical
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_syntax::{Identifier, Parameter};

    fn span() -> Span {
        Span::synthetic()
    }

    fn forwarding_call(callee: &str) -> Expr {
        Expr::call(
            Expr::plain_name(callee, span()),
            vec![
                Argument::star(Expr::plain_name("args", span())),
                Argument::double_star(Expr::plain_name("kwargs", span())),
            ],
            span(),
        )
    }

    fn simple_decorator() -> Define {
        let wrapper = Define::new(
            Reference::parse("m.deco.wrapper"),
            vec![Parameter::star("args"), Parameter::double_star("kwargs")],
            vec![Stmt::ret(forwarding_call("f"), span())],
        );
        Define::new(
            Reference::parse("m.deco"),
            vec![Parameter::named("f")],
            vec![
                Stmt::Define(wrapper),
                Stmt::ret(Expr::plain_name("wrapper", span()), span()),
            ],
        )
    }

    #[test]
    fn matches_simple_wrapper() {
        let decorator = simple_decorator();
        let data = extract_decorator_data(
            &decorator,
            false,
            Reference::parse("m.deco"),
            span(),
        )
        .expect("decorator should match");
        assert_eq!(data.higher_order_parameter, "f");
        assert_eq!(data.wrapper.name, Reference::parse("m.deco.wrapper"));
        assert!(data.helpers.is_empty());
    }

    #[test]
    fn rejects_divergent_calls_to_wrapped_parameter() {
        let wrapper = Define::new(
            Reference::parse("m.deco.wrapper"),
            vec![Parameter::star("args"), Parameter::double_star("kwargs")],
            vec![
                // f(*args, **kwargs) on one path, f() on another.
                Stmt::Expression(forwarding_call("f")),
                Stmt::ret(
                    Expr::call(Expr::plain_name("f", span()), Vec::new(), span()),
                    span(),
                ),
            ],
        );
        let decorator = Define::new(
            Reference::parse("m.deco"),
            vec![Parameter::named("f")],
            vec![
                Stmt::Define(wrapper),
                Stmt::ret(Expr::plain_name("wrapper", span()), span()),
            ],
        );
        assert!(extract_decorator_data(
            &decorator,
            false,
            Reference::parse("m.deco"),
            span()
        )
        .is_none());
    }

    #[test]
    fn rejects_decorator_with_extra_parameters() {
        let mut decorator = simple_decorator();
        decorator.parameters.push(Parameter::named("extra"));
        assert!(extract_decorator_data(
            &decorator,
            false,
            Reference::parse("m.deco"),
            span()
        )
        .is_none());
    }

    #[test]
    fn rejects_body_not_returning_wrapper_name() {
        let mut decorator = simple_decorator();
        decorator.body.pop();
        decorator
            .body
            .push(Stmt::ret(Expr::plain_name("other", span()), span()));
        assert!(extract_decorator_data(
            &decorator,
            false,
            Reference::parse("m.deco"),
            span()
        )
        .is_none());
    }

    #[test]
    fn factory_requires_exactly_one_nested_define() {
        let decorator = simple_decorator();
        let factory = Define::new(
            Reference::parse("m.factory"),
            vec![Parameter::named("label")],
            vec![
                Stmt::Define(decorator),
                Stmt::ret(Expr::plain_name("deco", span()), span()),
            ],
        );
        let data = extract_decorator_data(
            &factory,
            true,
            Reference::parse("m.factory"),
            span(),
        );
        assert!(data.is_some());

        let mut two_nested = factory.clone();
        two_nested.body.insert(
            1,
            Stmt::Define(Define::new(
                Reference::parse("m.factory.second"),
                Vec::new(),
                Vec::new(),
            )),
        );
        assert!(extract_decorator_data(
            &two_nested,
            true,
            Reference::parse("m.factory"),
            span()
        )
        .is_none());
    }

    #[test]
    fn partitions_helpers_from_wrapper() {
        let helper = Define::new(Reference::parse("m.deco.validate"), Vec::new(), Vec::new());
        let mut decorator = simple_decorator();
        decorator.body.insert(0, Stmt::Define(helper));
        let data = extract_decorator_data(
            &decorator,
            false,
            Reference::parse("m.deco"),
            span(),
        )
        .expect("decorator should match");
        assert_eq!(data.helpers.len(), 1);
        assert_eq!(
            data.helpers[0].name,
            Reference::parse("m.deco.validate")
        );
    }

    #[test]
    fn local_parameter_names_still_match() {
        // After qualification the parameter and its uses are Local.
        let scope = Reference::parse("m.deco");
        let wrapper_scope = Reference::parse("m.deco.wrapper");
        let call = Expr::call(
            Expr::local_name(scope.clone(), "f", span()),
            vec![
                Argument::star(Expr::local_name(wrapper_scope.clone(), "args", span())),
                Argument::double_star(Expr::local_name(wrapper_scope.clone(), "kwargs", span())),
            ],
            span(),
        );
        let wrapper = Define::new(
            Reference::parse("m.deco.wrapper"),
            vec![Parameter::star("args"), Parameter::double_star("kwargs")],
            vec![Stmt::ret(call, span())],
        );
        let decorator = Define::new(
            Reference::parse("m.deco"),
            vec![Parameter {
                name: Identifier::local(scope.clone(), "f"),
                ..Parameter::named("f")
            }],
            vec![
                Stmt::Define(wrapper),
                Stmt::ret(Expr::local_name(scope, "wrapper", span()), span()),
            ],
        );
        assert!(extract_decorator_data(
            &decorator,
            false,
            Reference::parse("m.deco"),
            span()
        )
        .is_some());
    }
}
