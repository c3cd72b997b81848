//! Semantic analysis for Tarn.
//!
//! The pipeline runs in four stages over a parsed [`SourceFile`]:
//!
//! 1. Scopes are built lazily per scope-bearing node (file, module, let)
//!    and memoized in a side-table.
//! 2. A reference graph over the let declarations is ordered into
//!    mutually-recursive groups by Tarjan's algorithm, leaves first.
//! 3. Each group is walked twice: once to allocate arrow types and bind
//!    patterns, once to infer bodies, emitting equality constraints into
//!    a context stack that attaches every constraint to the frame owning
//!    its variables.
//! 4. The accumulated root constraint set is solved by unification with
//!    an occurs check; failures surface as diagnostics, never aborts.

mod checker;
mod constraint;
mod error;
mod graph;
mod result;
mod scope;
mod solver;
mod types;

#[cfg(test)]
mod tests;

pub use constraint::Constraint;
pub use error::Diagnostic;
pub use graph::{collect_let_decls, compute_reference_graph, ReferenceGraph};
pub use result::TypeCheckResult;
pub use scope::{DefId, NameKind, Scope, ScopeTable};
pub use types::{ConId, Subst, Ty, TyVarSet, TypeVarId};

use tarn_ast::SourceFile;

/// Type-check a source file. Always completes; failures are reported in
/// the result's diagnostics.
pub fn check(file: &SourceFile) -> TypeCheckResult {
    checker::check(file)
}
