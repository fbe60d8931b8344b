use crate::reference::{Identifier, Reference};
use crate::span::Span;

/// One parsed module: the unit the preprocessing driver operates on.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub module: Reference,
    pub statements: Vec<Stmt>,
}

impl SourceUnit {
    pub fn new(module: Reference, statements: Vec<Stmt>) -> Self {
        SourceUnit { module, statements }
    }

    /// All function definitions appearing directly in the unit or inside
    /// class bodies (methods). Does not descend into function bodies.
    pub fn top_level_defines(&self) -> Vec<&Define> {
        let mut defines = Vec::new();
        collect_unit_defines(&self.statements, &mut defines);
        defines
    }
}

fn collect_unit_defines<'a>(statements: &'a [Stmt], out: &mut Vec<&'a Define>) {
    for stmt in statements {
        match stmt {
            Stmt::Define(define) => out.push(define),
            Stmt::Class(class) => collect_unit_defines(&class.body, out),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Bool(bool),
    None,
}

/// Keyword/positional/variadic role of one call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    Positional,
    Keyword(String),
    /// `*expr`
    Star,
    /// `**expr`
    DoubleStar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub value: Expr,
    pub kind: ArgKind,
}

impl Argument {
    pub fn positional(value: Expr) -> Self {
        Argument {
            value,
            kind: ArgKind::Positional,
        }
    }

    pub fn keyword(name: &str, value: Expr) -> Self {
        Argument {
            value,
            kind: ArgKind::Keyword(name.to_string()),
        }
    }

    pub fn star(value: Expr) -> Self {
        Argument {
            value,
            kind: ArgKind::Star,
        }
    }

    pub fn double_star(value: Expr) -> Self {
        Argument {
            value,
            kind: ArgKind::DoubleStar,
        }
    }
}

/// One `key: value` entry of a dict display; `key: None` is a `**` splat.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name {
        id: Identifier,
        span: Span,
    },
    Attribute {
        base: Box<Expr>,
        attr: String,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Argument>,
        span: Span,
    },
    Tuple {
        items: Vec<Expr>,
        span: Span,
    },
    Dict {
        entries: Vec<DictEntry>,
        span: Span,
    },
    /// `*expr` inside a tuple or list display.
    Starred {
        value: Box<Expr>,
        span: Span,
    },
    Literal {
        value: Literal,
        span: Span,
    },
}

impl Expr {
    pub fn plain_name(name: &str, span: Span) -> Expr {
        Expr::Name {
            id: Identifier::plain(name),
            span,
        }
    }

    pub fn local_name(scope: Reference, name: &str, span: Span) -> Expr {
        Expr::Name {
            id: Identifier::local(scope, name),
            span,
        }
    }

    pub fn call(callee: Expr, arguments: Vec<Argument>, span: Span) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            arguments,
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Name { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Call { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Dict { span, .. }
            | Expr::Starred { span, .. }
            | Expr::Literal { span, .. } => *span,
        }
    }

    /// The identifier of a plain or local name expression.
    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expr::Name { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Resolves a name or dotted-attribute chain to a dotted reference.
    /// `a.b.c` -> `a.b.c`; anything else (calls, literals) yields `None`.
    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Expr::Name { id, .. } => Some(id.delocalize()),
            Expr::Attribute { base, attr, .. } => {
                Some(base.as_reference()?.extend(attr))
            }
            _ => None,
        }
    }

    /// Builds a name or attribute chain spelling out `reference`.
    pub fn from_reference(reference: &Reference, span: Span) -> Expr {
        let mut segments = reference.segments().iter();
        let first = segments.next().map(String::as_str).unwrap_or_default();
        let mut expr = Expr::plain_name(first, span);
        for attr in segments {
            expr = Expr::Attribute {
                base: Box::new(expr),
                attr: attr.clone(),
                span,
            };
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Named,
    /// `*args`
    Star,
    /// `**kwargs`
    DoubleStar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Identifier,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
    pub kind: ParameterKind,
    pub span: Span,
}

impl Parameter {
    pub fn named(name: &str) -> Self {
        Parameter {
            name: Identifier::plain(name),
            annotation: None,
            default: None,
            kind: ParameterKind::Named,
            span: Span::synthetic(),
        }
    }

    pub fn star(name: &str) -> Self {
        Parameter {
            name: Identifier::plain(name),
            annotation: None,
            default: None,
            kind: ParameterKind::Star,
            span: Span::synthetic(),
        }
    }

    pub fn double_star(name: &str) -> Self {
        Parameter {
            name: Identifier::plain(name),
            annotation: None,
            default: None,
            kind: ParameterKind::DoubleStar,
            span: Span::synthetic(),
        }
    }

    pub fn with_annotation(mut self, annotation: Expr) -> Self {
        self.annotation = Some(annotation);
        self
    }
}

/// A closure capture recorded on a define by the capture-population pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub name: String,
    /// Scope the captured name is bound in.
    pub origin: Reference,
}

/// A function definition.
///
/// `name` is fully qualified once the qualification pass has run; before that
/// it is the single-segment source name. `parent` is the enclosing class (if
/// the define is a method), `nesting_define` the enclosing function (if the
/// define is nested). `unbound_names` is cached analysis metadata and must be
/// cleared whenever the body is rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub name: Reference,
    pub parameters: Vec<Parameter>,
    pub decorators: Vec<Expr>,
    pub return_annotation: Option<Expr>,
    pub body: Vec<Stmt>,
    pub parent: Option<Reference>,
    pub nesting_define: Option<Reference>,
    pub captures: Vec<Capture>,
    pub unbound_names: Option<Vec<String>>,
    pub span: Span,
}

impl Define {
    pub fn new(name: Reference, parameters: Vec<Parameter>, body: Vec<Stmt>) -> Self {
        Define {
            name,
            parameters,
            decorators: Vec::new(),
            return_annotation: None,
            body,
            parent: None,
            nesting_define: None,
            captures: Vec::new(),
            unbound_names: None,
            span: Span::synthetic(),
        }
    }

    /// Function definitions nested directly in this define's body.
    pub fn nested_defines(&self) -> Vec<&Define> {
        self.body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Define(define) => Some(define),
                _ => None,
            })
            .collect()
    }

    /// Whether the define has any nested function definition, at any depth
    /// below it (but not inside nested class bodies).
    pub fn contains_nested_defines(&self) -> bool {
        fn any_define(statements: &[Stmt]) -> bool {
            statements.iter().any(|stmt| match stmt {
                Stmt::Define(_) => true,
                Stmt::If { body, orelse, .. } => any_define(body) || any_define(orelse),
                _ => false,
            })
        }
        any_define(&self.body)
    }

    fn has_marker_decorator(&self, marker: &str) -> bool {
        self.decorators.iter().any(|decorator| {
            decorator
                .as_reference()
                .is_some_and(|reference| reference.last() == Some(marker))
        })
    }

    pub fn is_static_method(&self) -> bool {
        self.has_marker_decorator("staticmethod")
    }

    pub fn is_class_method(&self) -> bool {
        self.has_marker_decorator("classmethod")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: Reference,
    pub bases: Vec<Expr>,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Define(Define),
    Class(ClassDef),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Assign {
        target: Expr,
        annotation: Option<Expr>,
        value: Expr,
        span: Span,
    },
    Expression(Expr),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        span: Span,
    },
    Pass {
        span: Span,
    },
}

impl Stmt {
    pub fn ret(value: Expr, span: Span) -> Stmt {
        Stmt::Return {
            value: Some(value),
            span,
        }
    }

    pub fn assign(target: Expr, value: Expr, span: Span) -> Stmt {
        Stmt::Assign {
            target,
            annotation: None,
            value,
            span,
        }
    }
}
