//! Location-insensitive structural comparison.
//!
//! Derived `PartialEq` on the tree compares spans too, which is wrong for
//! "does the wrapper call the wrapped function identically everywhere":
//! two occurrences of the same call necessarily sit at different locations.

use crate::ast::{ArgKind, Argument, DictEntry, Expr, Literal};

/// Structural equality over expressions, ignoring source locations.
pub fn exprs_equal(left: &Expr, right: &Expr) -> bool {
    match (left, right) {
        (Expr::Name { id: a, .. }, Expr::Name { id: b, .. }) => a == b,
        (
            Expr::Attribute {
                base: base_a,
                attr: attr_a,
                ..
            },
            Expr::Attribute {
                base: base_b,
                attr: attr_b,
                ..
            },
        ) => attr_a == attr_b && exprs_equal(base_a, base_b),
        (
            Expr::Call {
                callee: callee_a,
                arguments: args_a,
                ..
            },
            Expr::Call {
                callee: callee_b,
                arguments: args_b,
                ..
            },
        ) => exprs_equal(callee_a, callee_b) && arguments_equal(args_a, args_b),
        (Expr::Tuple { items: a, .. }, Expr::Tuple { items: b, .. }) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| exprs_equal(x, y))
        }
        (Expr::Dict { entries: a, .. }, Expr::Dict { entries: b, .. }) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| dict_entries_equal(x, y))
        }
        (Expr::Starred { value: a, .. }, Expr::Starred { value: b, .. }) => exprs_equal(a, b),
        (Expr::Literal { value: a, .. }, Expr::Literal { value: b, .. }) => literals_equal(a, b),
        _ => false,
    }
}

pub fn arguments_equal(left: &[Argument], right: &[Argument]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(a, b)| arg_kinds_equal(&a.kind, &b.kind) && exprs_equal(&a.value, &b.value))
}

fn arg_kinds_equal(left: &ArgKind, right: &ArgKind) -> bool {
    match (left, right) {
        (ArgKind::Positional, ArgKind::Positional)
        | (ArgKind::Star, ArgKind::Star)
        | (ArgKind::DoubleStar, ArgKind::DoubleStar) => true,
        (ArgKind::Keyword(a), ArgKind::Keyword(b)) => a == b,
        _ => false,
    }
}

fn dict_entries_equal(left: &DictEntry, right: &DictEntry) -> bool {
    let keys_equal = match (&left.key, &right.key) {
        (Some(a), Some(b)) => exprs_equal(a, b),
        (None, None) => true,
        _ => false,
    };
    keys_equal && exprs_equal(&left.value, &right.value)
}

fn literals_equal(left: &Literal, right: &Literal) -> bool {
    left == right
}
