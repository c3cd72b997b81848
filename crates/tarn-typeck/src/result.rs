use la_arena::ArenaMap;

use tarn_ast::{DeclId, ExprId};

use crate::error::Diagnostic;
use crate::types::{Subst, Ty};

/// Everything one check produces: diagnostics in emission order, resolved
/// types for expressions and let declarations, and the final substitution
/// for downstream tooling.
#[derive(Debug)]
pub struct TypeCheckResult {
    pub diagnostics: Vec<Diagnostic>,
    /// Type of every inferred expression, after substitution.
    pub expr_types: ArenaMap<ExprId, Ty>,
    /// Arrow type of every let declaration, after substitution.
    pub decl_types: ArenaMap<DeclId, Ty>,
    /// The solver's final substitution.
    pub subst: Subst,
}

impl TypeCheckResult {
    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
