#![deny(clippy::unwrap_used)]

//! Tree representation and name utilities for the sable analysis engine.
//!
//! The decorator-inlining subsystem (`sable-inline`) operates over these
//! trees; the parser producing them lives outside this workspace.

pub mod ast;
pub mod compare;
pub mod reference;
pub mod render;
pub mod span;
pub mod transform;

pub use ast::{
    ArgKind, Argument, Capture, ClassDef, Define, DictEntry, Expr, Literal, Parameter,
    ParameterKind, SourceUnit, Stmt,
};
pub use compare::{arguments_equal, exprs_equal};
pub use reference::{Identifier, Reference};
pub use render::{render_define, render_expr, render_unit};
pub use span::{Position, Span};
pub use transform::{
    transform_define, transform_expr, transform_statements, transform_stmt, visit_define_exprs,
    visit_expr, visit_exprs, Fold, Recurse, Transformed,
};

impl std::fmt::Display for ast::Define {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", render::render_define(self))
    }
}

impl std::fmt::Display for ast::Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", render::render_expr(self))
    }
}

impl std::fmt::Display for ast::SourceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", render::render_unit(self))
    }
}
