//! End-to-end inlining over whole source units, using the in-memory
//! environment from `test_support`.

#[path = "test_support.rs"]
mod test_support;

use sable_inline::{preprocess_source, Configuration, InlineContext};
use sable_syntax::{
    visit_define_exprs, Argument, ClassDef, Define, Expr, Identifier, Literal, Parameter,
    Reference, SourceUnit, Stmt,
};
use test_support::{dotted, forwarding_decorator, name, qualify_unit, span, TestEnvironment};

fn helpers_unit(decorators: Vec<Define>) -> SourceUnit {
    SourceUnit::new(
        Reference::single("helpers"),
        decorators.into_iter().map(Stmt::Define).collect(),
    )
}

fn target_define(decorators: Vec<Expr>) -> Define {
    Define {
        decorators,
        return_annotation: Some(name("int")),
        ..Define::new(
            Reference::single("target"),
            vec![Parameter::named("x").with_annotation(name("int"))],
            vec![Stmt::ret(name("x"), span())],
        )
    }
}

fn app_unit(decorators: Vec<Expr>) -> SourceUnit {
    qualify_unit(SourceUnit::new(
        Reference::single("app"),
        vec![Stmt::Define(target_define(decorators))],
    ))
}

fn inlining_context() -> InlineContext {
    let context = InlineContext::new();
    context
        .set_configuration(Configuration::new(true, false))
        .expect("fresh context");
    context
}

fn only_define(unit: &SourceUnit) -> &Define {
    match unit.statements.as_slice() {
        [Stmt::Define(define)] => define,
        other => panic!("expected a single definition, got {} statements", other.len()),
    }
}

fn nested_local_names(define: &Define) -> Vec<&str> {
    define
        .nested_defines()
        .into_iter()
        .filter_map(|nested| nested.name.last())
        .collect()
}

fn nested_by_local_name<'a>(define: &'a Define, local: &str) -> &'a Define {
    define
        .nested_defines()
        .into_iter()
        .find(|nested| nested.name.last() == Some(local))
        .unwrap_or_else(|| panic!("no nested definition named {local}"))
}

fn returned_callee_name(define: &Define) -> &str {
    match define.body.last() {
        Some(Stmt::Return {
            value: Some(Expr::Call { callee, .. }),
            ..
        }) => match callee.as_identifier() {
            Some(id) => id.name(),
            None => panic!("return callee is not a name"),
        },
        other => panic!("body does not end in a returned call: {other:?}"),
    }
}

fn references_name(define: &Define, target: &str) -> bool {
    let mut found = false;
    visit_define_exprs(define, &mut |expr| {
        if let Expr::Name { id, .. } = expr {
            if id.name() == target {
                found = true;
            }
        }
    });
    found
}

#[test]
fn inlines_a_single_forwarding_decorator() {
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("deco")]));

    let result = preprocess_source(&context, &environment, app_unit(vec![dotted("helpers.deco")]));
    let define = only_define(&result);

    assert_eq!(define.name, Reference::parse("app.target"));
    assert!(define.decorators.is_empty());
    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "__inlined_deco"]
    );

    // Signature refinement propagated the target's precise parameters.
    let wrapper = nested_by_local_name(define, "__inlined_deco");
    assert_eq!(wrapper.parameters.len(), 1);
    assert_eq!(wrapper.parameters[0].name.name(), "x");
    assert!(wrapper.parameters[0].annotation.is_some());
    assert_eq!(define.parameters.len(), 1);
    assert_eq!(define.parameters[0].name.name(), "x");

    // Call chain: target returns __inlined_deco(x), which calls the clone.
    assert_eq!(returned_callee_name(define), "__inlined_deco");
    assert!(references_name(wrapper, "__original_function"));

    // No residue of the decorator's own scope survives.
    assert!(!references_name(define, "f"));
    assert!(!references_name(define, "wrapper"));

    assert_eq!(
        context.original_for_inlined(&Reference::parse("app.target.__inlined_deco")),
        Some(Reference::parse("helpers.deco"))
    );
    let originals = context
        .original_decorators(&Reference::parse("app.target"))
        .expect("pristine decorators recorded");
    assert_eq!(originals.len(), 1);
}

#[test]
fn stacked_decorators_compose_outer_to_inner() {
    let context = inlining_context();
    let environment = TestEnvironment::new().with_module(helpers_unit(vec![
        forwarding_decorator("outer"),
        forwarding_decorator("inner"),
    ]));

    let unit = app_unit(vec![dotted("helpers.outer"), dotted("helpers.inner")]);
    let result = preprocess_source(&context, &environment, unit);
    let define = only_define(&result);

    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "__inlined_outer", "__inlined_inner"]
    );

    // Entry point is the outermost wrapper; each wrapper calls the next one
    // in, bottoming out at the clone of the original body.
    assert_eq!(returned_callee_name(define), "__inlined_outer");
    assert!(references_name(
        nested_by_local_name(define, "__inlined_outer"),
        "__inlined_inner"
    ));
    assert!(references_name(
        nested_by_local_name(define, "__inlined_inner"),
        "__original_function"
    ));

    assert_eq!(
        context.original_for_inlined(&Reference::parse("app.target.__inlined_inner")),
        Some(Reference::parse("helpers.inner"))
    );
    assert_eq!(
        context.original_for_inlined(&Reference::parse("app.target.__inlined_outer")),
        Some(Reference::parse("helpers.outer"))
    );
}

#[test]
fn repeated_decorator_gets_distinct_wrapper_names() {
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("dup")]));

    let unit = app_unit(vec![dotted("helpers.dup"), dotted("helpers.dup")]);
    let result = preprocess_source(&context, &environment, unit);
    let define = only_define(&result);

    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "__inlined_dup", "__inlined_dup2"]
    );
    assert_eq!(returned_callee_name(define), "__inlined_dup");
    assert!(references_name(
        nested_by_local_name(define, "__inlined_dup"),
        "__inlined_dup2"
    ));
}

#[test]
fn factory_decorator_inlines_through_its_nested_decorator() {
    let factory = Define::new(
        Reference::single("repeat"),
        vec![Parameter::named("times")],
        vec![
            Stmt::Define(forwarding_decorator("deco")),
            Stmt::ret(name("deco"), span()),
        ],
    );
    let context = inlining_context();
    let environment = TestEnvironment::new().with_module(helpers_unit(vec![factory]));

    let applied = Expr::call(
        dotted("helpers.repeat"),
        vec![Argument::positional(Expr::Literal {
            value: Literal::Int(3),
            span: span(),
        })],
        span(),
    );
    let result = preprocess_source(&context, &environment, app_unit(vec![applied]));
    let define = only_define(&result);

    assert!(define.decorators.is_empty());
    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "__inlined_repeat"]
    );
    assert_eq!(
        context.original_for_inlined(&Reference::parse("app.target.__inlined_repeat")),
        Some(Reference::parse("helpers.repeat"))
    );
}

#[test]
fn helper_functions_are_carried_beside_the_wrapper() {
    let helper = Define::new(
        Reference::single("validate"),
        Vec::new(),
        vec![Stmt::Pass { span: span() }],
    );
    let mut decorator = forwarding_decorator("deco");
    decorator.body.insert(0, Stmt::Define(helper));
    // wrapper calls validate() before forwarding.
    if let Some(Stmt::Define(wrapper)) = decorator
        .body
        .iter_mut()
        .find(|stmt| matches!(stmt, Stmt::Define(nested) if nested.name.last() == Some("wrapper")))
    {
        wrapper.body.insert(
            0,
            Stmt::Expression(Expr::call(name("validate"), Vec::new(), span())),
        );
    }

    let context = inlining_context();
    let environment = TestEnvironment::new().with_module(helpers_unit(vec![decorator]));
    let result = preprocess_source(&context, &environment, app_unit(vec![dotted("helpers.deco")]));
    let define = only_define(&result);

    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "validate", "__inlined_deco"]
    );
    let wrapper = nested_by_local_name(define, "__inlined_deco");
    assert!(references_name(wrapper, "validate"));
    // The helper lives in the target's scope, so the wrapper captures it.
    assert!(wrapper
        .captures
        .iter()
        .any(|capture| capture.name == "validate"));
}

#[test]
fn rendered_output_reads_as_the_expanded_body() {
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("deco")]));
    let result = preprocess_source(&context, &environment, app_unit(vec![dotted("helpers.deco")]));
    let define = only_define(&result);

    // Locals print in their delocalized dotted spelling.
    let rendered = define.to_string();
    assert!(
        rendered.contains("return app.target.__inlined_deco(app.target.x)"),
        "{rendered}"
    );
    assert!(
        rendered.contains("app.target.__original_function("),
        "{rendered}"
    );
    assert!(
        rendered.starts_with("def app.target(x: int) -> int:"),
        "{rendered}"
    );
}

fn class_unit(method: Define) -> SourceUnit {
    let class = ClassDef {
        name: Reference::single("C"),
        bases: Vec::new(),
        decorators: Vec::new(),
        body: vec![Stmt::Define(method)],
        span: span(),
    };
    qualify_unit(SourceUnit::new(
        Reference::single("app"),
        vec![Stmt::Class(class)],
    ))
}

fn method_in_class(unit: &SourceUnit) -> &Define {
    match unit.statements.as_slice() {
        [Stmt::Class(class)] => match class.body.as_slice() {
            [Stmt::Define(define)] => define,
            _ => panic!("expected a single method"),
        },
        _ => panic!("expected a single class"),
    }
}

#[test]
fn implicit_self_is_annotated_with_the_enclosing_class() {
    let method = Define {
        decorators: vec![dotted("helpers.deco")],
        parent: Some(Reference::parse("app.C")),
        ..Define::new(
            Reference::single("area"),
            vec![
                Parameter::named("self"),
                Parameter::named("scale").with_annotation(name("int")),
            ],
            vec![Stmt::ret(name("scale"), span())],
        )
    };
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("deco")]));

    let result = preprocess_source(&context, &environment, class_unit(method));
    let define = method_in_class(&result);

    assert_eq!(define.name, Reference::parse("app.C.area"));
    assert!(define.decorators.is_empty());
    assert_eq!(define.parent, Some(Reference::parse("app.C")));

    // The clone of the original body recovers self's type from the class.
    let original = nested_by_local_name(define, "__original_function");
    assert_eq!(original.parameters[0].name.name(), "self");
    assert_eq!(
        original.parameters[0]
            .annotation
            .as_ref()
            .and_then(|annotation| annotation.as_reference()),
        Some(Reference::parse("app.C"))
    );

    // Refinement carries the annotated self into the wrapper signature.
    let wrapper = nested_by_local_name(define, "__inlined_deco");
    assert_eq!(wrapper.parameters.len(), 2);
    assert_eq!(wrapper.parameters[0].name.name(), "self");
    assert_eq!(
        wrapper.parameters[0]
            .annotation
            .as_ref()
            .and_then(|annotation| annotation.as_reference()),
        Some(Reference::parse("app.C"))
    );
}

#[test]
fn static_method_marker_is_kept_and_self_is_left_unannotated() {
    let method = Define {
        decorators: vec![name("staticmethod"), dotted("helpers.deco")],
        parent: Some(Reference::parse("app.C")),
        ..Define::new(
            Reference::single("make"),
            vec![Parameter::named("self")],
            vec![Stmt::ret(name("self"), span())],
        )
    };
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("deco")]));

    let result = preprocess_source(&context, &environment, class_unit(method));
    let define = method_in_class(&result);

    // The unresolvable marker stays applied while the known decorator is
    // inlined away.
    assert_eq!(define.decorators.len(), 1);
    assert_eq!(
        define.decorators[0].as_reference(),
        Some(Reference::single("staticmethod"))
    );
    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "__inlined_deco"]
    );

    // No implicit receiver on a static method, so no annotation is invented.
    let original = nested_by_local_name(define, "__original_function");
    assert!(original.parameters[0].annotation.is_none());
}

#[test]
fn class_method_marker_is_kept_through_inlining() {
    let method = Define {
        decorators: vec![name("classmethod"), dotted("helpers.deco")],
        parent: Some(Reference::parse("app.C")),
        ..Define::new(
            Reference::single("build"),
            vec![Parameter::named("cls"), Parameter::named("x")],
            vec![Stmt::ret(name("x"), span())],
        )
    };
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("deco")]));

    let result = preprocess_source(&context, &environment, class_unit(method));
    let define = method_in_class(&result);

    assert_eq!(define.decorators.len(), 1);
    assert_eq!(
        define.decorators[0].as_reference(),
        Some(Reference::single("classmethod"))
    );
    let original = nested_by_local_name(define, "__original_function");
    assert!(original.parameters[0].annotation.is_none());
    assert_eq!(
        nested_local_names(define),
        vec!["__original_function", "__inlined_deco"]
    );
}

#[test]
fn wrapper_identifiers_are_scoped_to_the_target() {
    let context = inlining_context();
    let environment =
        TestEnvironment::new().with_module(helpers_unit(vec![forwarding_decorator("deco")]));
    let result = preprocess_source(&context, &environment, app_unit(vec![dotted("helpers.deco")]));
    let define = only_define(&result);

    let target = Reference::parse("app.target");
    let wrapper = nested_by_local_name(define, "__inlined_deco");
    assert_eq!(wrapper.nesting_define.as_ref(), Some(&target));
    for nested in define.nested_defines() {
        assert!(nested.name.starts_with(&target), "{}", nested.name);
    }
    match define.body.last() {
        Some(Stmt::Return {
            value: Some(Expr::Call { callee, .. }),
            ..
        }) => match callee.as_identifier() {
            Some(Identifier::Local { scope, .. }) => assert_eq!(scope, &target),
            other => panic!("unqualified return callee: {other:?}"),
        },
        other => panic!("unexpected final statement: {other:?}"),
    }
}
