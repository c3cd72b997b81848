use std::collections::HashMap;

use tarn_ast::Span;

use crate::types::{rename_vars, Ty, TypeVarId};

/// A unification demand produced while walking the tree, solved later by
/// the worklist unifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The two types must be equal; the span points at the syntax that
    /// required it.
    Equal(Ty, Ty, Span),
    /// A grouped batch, traversed recursively.
    Many(Vec<Constraint>),
}

impl Constraint {
    pub fn equal(left: Ty, right: Ty, span: Span) -> Constraint {
        Constraint::Equal(left, right, span)
    }

    /// Rename variables on both sides, keeping the origin span. Used when
    /// a scheme's deferred constraints are re-emitted at instantiation.
    pub(crate) fn rename(&self, mapping: &HashMap<TypeVarId, Ty>) -> Constraint {
        match self {
            Constraint::Equal(left, right, span) => Constraint::Equal(
                rename_vars(left, mapping),
                rename_vars(right, mapping),
                *span,
            ),
            Constraint::Many(elems) => {
                Constraint::Many(elems.iter().map(|c| c.rename(mapping)).collect())
            }
        }
    }
}
