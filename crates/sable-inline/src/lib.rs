#![deny(clippy::unwrap_used)]

//! Decorator inlining for the sable analysis engine.
//!
//! Given a decorated function and access to the source of each decorator's
//! defining module, synthesizes a semantically equivalent body with the
//! decorators' wrapping logic inlined, so call-graph-sensitive analyses can
//! see through the wrapper indirection. Decorators that do not match the
//! recognized simple-wrapper shape are left untouched.

mod compose;
mod context;
mod environment;
mod matcher;
mod preprocess;
mod scope;
mod signature;

pub use compose::inline_decorators_for_define;
pub use context::{decorator_reference, Action, ConfigError, Configuration, InlineContext};
pub use environment::Environment;
pub use matcher::{extract_decorator_data, DecoratorData};
pub use preprocess::preprocess_source;
pub use scope::{
    rename_define, rename_identifiers, requalify_define, sanitize_define, set_parent,
    uniquify_names,
};
pub use signature::replace_signature_if_always_passing_on_arguments;
