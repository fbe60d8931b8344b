use sable_syntax::{Reference, SourceUnit};

/// Services the inlining subsystem consumes from the surrounding engine.
///
/// `get_source` must be deterministic within a run; a `None` is treated as a
/// lookup miss, never retried. `qualify` and `populate_captures` run over
/// every synthesized single-definition unit after composition.
pub trait Environment {
    /// Fetches the parsed source of a module, used to locate decorator bodies
    /// defined outside the unit currently being processed.
    fn get_source(&self, module: &Reference) -> Option<SourceUnit>;

    /// Name-resolution pass: assigns fully-qualified names to local
    /// variables.
    fn qualify(&self, unit: SourceUnit) -> SourceUnit;

    /// Computes closure-capture metadata; runs right after `qualify`.
    fn populate_captures(&self, unit: SourceUnit) -> SourceUnit;
}
