use tarn_ast::Span;
use tracing::trace;

use crate::constraint::Constraint;
use crate::error::Diagnostic;
use crate::types::{Subst, Ty, TypeVarId};

/// Solve the accumulated constraint set by unification, binding variables
/// into `subst` and reporting failures as diagnostics. A failure only
/// abandons the offending pair; sibling subterms keep unifying so one
/// check pass can surface several diagnostics.
pub fn solve(root: Constraint, subst: &mut Subst, diagnostics: &mut Vec<Diagnostic>) {
    let mut work = vec![root];
    while let Some(constraint) = work.pop() {
        match constraint {
            Constraint::Many(elems) => {
                // LIFO worklist; reversing keeps generation order.
                work.extend(elems.into_iter().rev());
            }
            Constraint::Equal(left, right, span) => {
                unify(left, right, span, subst, diagnostics, &mut work);
            }
        }
    }
}

fn unify(
    left: Ty,
    right: Ty,
    span: Span,
    subst: &mut Subst,
    diagnostics: &mut Vec<Diagnostic>,
    work: &mut Vec<Constraint>,
) {
    // Single-step path compression: bound variables are replaced by their
    // image before the cases are examined.
    let left = subst.resolve(&left);
    let right = subst.resolve(&right);
    trace!(%left, %right, "unify");

    match (left, right) {
        (Ty::Var(a), Ty::Var(b)) if a == b => {}

        (Ty::Var(var), other) | (other, Ty::Var(var)) => {
            bind_var(var, other, span, subst, diagnostics);
        }

        (Ty::Any, _) | (_, Ty::Any) => {}

        (Ty::Arrow(params_l, result_l), Ty::Arrow(params_r, result_r)) => {
            if params_l.len() == params_r.len() {
                // Push the result first so parameters unify left to right.
                work.push(Constraint::Equal(*result_l, *result_r, span));
                for (l, r) in params_l.into_iter().zip(params_r).rev() {
                    work.push(Constraint::Equal(l, r, span));
                }
            } else if params_l.is_empty() {
                // Value/thunk coercion: a zero-argument arrow stands for
                // its result.
                work.push(Constraint::Equal(
                    *result_l,
                    Ty::Arrow(params_r, result_r),
                    span,
                ));
            } else if params_r.is_empty() {
                work.push(Constraint::Equal(
                    Ty::Arrow(params_l, result_l),
                    *result_r,
                    span,
                ));
            } else {
                diagnostics.push(Diagnostic::ArityMismatch {
                    left: subst.apply(&Ty::Arrow(params_l, result_l)),
                    right: subst.apply(&Ty::Arrow(params_r, result_r)),
                    span,
                });
            }
        }

        (Ty::Arrow(params, result), other) | (other, Ty::Arrow(params, result))
            if params.is_empty() =>
        {
            work.push(Constraint::Equal(*result, other, span));
        }

        (
            Ty::Con {
                id: id_l,
                args: args_l,
                name: name_l,
            },
            Ty::Con {
                id: id_r,
                args: args_r,
                name: name_r,
            },
        ) => {
            if id_l == id_r {
                // Arity per constructor id is a session invariant.
                debug_assert_eq!(args_l.len(), args_r.len());
                for (l, r) in args_l.into_iter().zip(args_r).rev() {
                    work.push(Constraint::Equal(l, r, span));
                }
            } else {
                diagnostics.push(Diagnostic::UnificationFailed {
                    left: subst.apply(&Ty::Con {
                        id: id_l,
                        args: args_l,
                        name: name_l,
                    }),
                    right: subst.apply(&Ty::Con {
                        id: id_r,
                        args: args_r,
                        name: name_r,
                    }),
                    span,
                });
            }
        }

        (Ty::Tuple(elems_l), Ty::Tuple(elems_r)) => {
            if elems_l.len() == elems_r.len() {
                for (l, r) in elems_l.into_iter().zip(elems_r).rev() {
                    work.push(Constraint::Equal(l, r, span));
                }
            } else {
                diagnostics.push(Diagnostic::UnificationFailed {
                    left: subst.apply(&Ty::Tuple(elems_l)),
                    right: subst.apply(&Ty::Tuple(elems_r)),
                    span,
                });
            }
        }

        (left, right) => {
            diagnostics.push(Diagnostic::UnificationFailed {
                left: subst.apply(&left),
                right: subst.apply(&right),
                span,
            });
        }
    }
}

fn bind_var(
    var: TypeVarId,
    ty: Ty,
    span: Span,
    subst: &mut Subst,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if occurs(var, &ty, subst) {
        diagnostics.push(Diagnostic::InfiniteType {
            var,
            ty: subst.apply(&ty),
            span,
        });
        return;
    }
    subst.set(var, ty);
}

/// Occurs check, resolving through the substitution so chains cannot hide
/// a cycle.
fn occurs(var: TypeVarId, ty: &Ty, subst: &Subst) -> bool {
    match subst.resolve(ty) {
        Ty::Var(other) => other == var,
        Ty::Con { args, .. } | Ty::Tuple(args) => {
            args.iter().any(|arg| occurs(var, arg, subst))
        }
        Ty::Arrow(params, result) => {
            params.iter().any(|p| occurs(var, p, subst)) || occurs(var, &result, subst)
        }
        Ty::Any => false,
    }
}
