use std::fmt;

use serde::{Deserialize, Serialize};

/// A dotted path uniquely identifying a definition within a module namespace,
/// e.g. `logging.utils.timer`.
///
/// Qualifier manipulation goes through the explicit operations below
/// (`combine`, `drop_prefix`, `last`) instead of string slicing, so qualifier
/// boundaries can never be split mid-segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Reference {
    segments: Vec<String>,
}

impl From<String> for Reference {
    fn from(dotted: String) -> Self {
        Reference::parse(&dotted)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> String {
        reference.to_string()
    }
}

impl Reference {
    pub fn new(segments: Vec<String>) -> Self {
        Reference { segments }
    }

    pub fn empty() -> Self {
        Reference { segments: Vec::new() }
    }

    /// Parses a dotted name. `Reference::parse("a.b.c")` has three segments.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Reference::empty();
        }
        Reference {
            segments: dotted.split('.').map(|s| s.to_string()).collect(),
        }
    }

    pub fn single(name: &str) -> Self {
        Reference {
            segments: vec![name.to_string()],
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Final segment, if any: `a.b.c` -> `c`.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Everything but the final segment: `a.b.c` -> `a.b`.
    pub fn prefix(&self) -> Reference {
        let mut segments = self.segments.clone();
        segments.pop();
        Reference { segments }
    }

    /// Appends `other`'s segments after `self`'s.
    pub fn combine(&self, other: &Reference) -> Reference {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Reference { segments }
    }

    /// Appends one segment.
    pub fn extend(&self, name: &str) -> Reference {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Reference { segments }
    }

    pub fn starts_with(&self, prefix: &Reference) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Strips `prefix` from the front; `None` when `self` does not start with
    /// it. `a.b.c`.drop_prefix(`a.b`) -> `c`.
    pub fn drop_prefix(&self, prefix: &Reference) -> Option<Reference> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Reference {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }

    /// Replaces a leading `old` qualifier with `new`, leaving other
    /// references untouched.
    pub fn requalify(&self, old: &Reference, new: &Reference) -> Reference {
        match self.drop_prefix(old) {
            Some(rest) => new.combine(&rest),
            None => self.clone(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A name occurrence in the tree.
///
/// Before the external qualification pass runs, every identifier is `Plain`.
/// Qualification rebinds names that resolve to function-local variables as
/// `Local`, recording the scope (the fully-qualified name of the function
/// that binds them). Module-level and builtin names stay `Plain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Plain(String),
    Local { scope: Reference, name: String },
}

impl Identifier {
    pub fn plain(name: &str) -> Self {
        Identifier::Plain(name.to_string())
    }

    pub fn local(scope: Reference, name: &str) -> Self {
        Identifier::Local {
            scope,
            name: name.to_string(),
        }
    }

    /// The unqualified name: `Local { scope: a.f, name: x }` -> `x`.
    pub fn name(&self) -> &str {
        match self {
            Identifier::Plain(name) => name,
            Identifier::Local { name, .. } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Identifier::Local { .. })
    }

    /// Turns a scope-bound local back into its dotted global spelling:
    /// `Local { scope: a.f, name: x }` -> `a.f.x`; plain names become
    /// single-segment references.
    pub fn delocalize(&self) -> Reference {
        match self {
            Identifier::Plain(name) => Reference::single(name),
            Identifier::Local { scope, name } => scope.extend(name),
        }
    }

    /// Binds a plain name into `scope`; already-local identifiers are
    /// re-scoped.
    pub fn qualify_local(&self, scope: &Reference) -> Identifier {
        Identifier::Local {
            scope: scope.clone(),
            name: self.name().to_string(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Plain(name) => write!(f, "{name}"),
            Identifier::Local { scope, name } => write!(f, "{scope}.{name}"),
        }
    }
}
