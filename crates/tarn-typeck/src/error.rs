use smol_str::SmolStr;
use tarn_ast::Span;
use thiserror::Error;

use crate::types::{Ty, TypeVarId};

/// A type-checking diagnostic. Types embedded here are fully substituted
/// at emission time, so the user sees resolved forms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error("cannot find `{name}` in this scope")]
    BindingNotFound { name: SmolStr, span: Span },

    #[error("type mismatch: `{left}` vs `{right}`")]
    UnificationFailed { left: Ty, right: Ty, span: Span },

    #[error("arity mismatch: `{left}` vs `{right}`")]
    ArityMismatch { left: Ty, right: Ty, span: Span },

    #[error("cannot construct the infinite type `?{var} = {ty}`")]
    InfiniteType {
        var: TypeVarId,
        ty: Ty,
        span: Span,
    },
}

impl Diagnostic {
    pub fn span(&self) -> Span {
        match self {
            Diagnostic::BindingNotFound { span, .. }
            | Diagnostic::UnificationFailed { span, .. }
            | Diagnostic::ArityMismatch { span, .. }
            | Diagnostic::InfiniteType { span, .. } => *span,
        }
    }
}
