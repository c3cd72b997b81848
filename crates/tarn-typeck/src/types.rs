use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Unique, monotonically assigned type variable identifier.
pub type TypeVarId = u32;

/// Nominal identity of a type constructor. `Int`, `String` and `Bool` are
/// pre-assigned at checker startup; user structs and enums get fresh ids
/// during forward declaration.
pub type ConId = u32;

pub const CON_INT: ConId = 0;
pub const CON_STRING: ConId = 1;
pub const CON_BOOL: ConId = 2;

#[derive(Debug, Clone)]
pub enum Ty {
    Var(TypeVarId),
    /// Nominal type head with applied arguments. The argument count per
    /// `id` is uniform across the whole check session.
    Con {
        id: ConId,
        args: Vec<Ty>,
        name: SmolStr,
    },
    Arrow(Vec<Ty>, Box<Ty>),
    Tuple(Vec<Ty>),
    /// Top/error sentinel. Unifies with everything, so one resolution
    /// failure does not cascade.
    Any,
}

impl PartialEq for Ty {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Ty::Var(a), Ty::Var(b)) => a == b,
            // Constructor equality is by id; the display name is ignored.
            (Ty::Con { id: a, args: x, .. }, Ty::Con { id: b, args: y, .. }) => {
                a == b && x == y
            }
            (Ty::Arrow(p1, r1), Ty::Arrow(p2, r2)) => p1 == p2 && r1 == r2,
            (Ty::Tuple(a), Ty::Tuple(b)) => a == b,
            (Ty::Any, Ty::Any) => true,
            _ => false,
        }
    }
}

impl Eq for Ty {}

impl Ty {
    pub fn int() -> Ty {
        Ty::Con {
            id: CON_INT,
            args: Vec::new(),
            name: SmolStr::new_static("Int"),
        }
    }

    pub fn string() -> Ty {
        Ty::Con {
            id: CON_STRING,
            args: Vec::new(),
            name: SmolStr::new_static("String"),
        }
    }

    pub fn boolean() -> Ty {
        Ty::Con {
            id: CON_BOOL,
            args: Vec::new(),
            name: SmolStr::new_static("Bool"),
        }
    }

    /// Unit, the type of a `return` with no value.
    pub fn unit() -> Ty {
        Ty::Tuple(Vec::new())
    }

    /// Lazy preorder traversal of the variables occurring in this type.
    /// Duplicates are yielded as often as they occur.
    pub fn free_vars(&self) -> FreeVars<'_> {
        FreeVars { stack: vec![self] }
    }

    pub fn has_var(&self, var: TypeVarId) -> bool {
        self.free_vars().any(|v| v == var)
    }

    fn is_atom(&self) -> bool {
        matches!(self, Ty::Var(_) | Ty::Any | Ty::Tuple(_))
            || matches!(self, Ty::Con { args, .. } if args.is_empty())
    }
}

pub struct FreeVars<'a> {
    stack: Vec<&'a Ty>,
}

impl<'a> Iterator for FreeVars<'a> {
    type Item = TypeVarId;

    fn next(&mut self) -> Option<TypeVarId> {
        while let Some(ty) = self.stack.pop() {
            match ty {
                Ty::Var(v) => return Some(*v),
                Ty::Con { args, .. } | Ty::Tuple(args) => {
                    self.stack.extend(args.iter().rev());
                }
                Ty::Arrow(params, result) => {
                    self.stack.push(result);
                    self.stack.extend(params.iter().rev());
                }
                Ty::Any => {}
            }
        }
        None
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(id) => write!(f, "?{}", id),
            Ty::Con { name, args, .. } => {
                write!(f, "{}", name)?;
                for arg in args {
                    if arg.is_atom() {
                        write!(f, " {}", arg)?;
                    } else {
                        write!(f, " ({})", arg)?;
                    }
                }
                Ok(())
            }
            Ty::Arrow(params, result) => {
                match params.as_slice() {
                    [single] if single.is_atom() => write!(f, "{}", single)?,
                    [single] => write!(f, "({})", single)?,
                    many => {
                        write!(f, "(")?;
                        for (i, p) in many.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", p)?;
                        }
                        write!(f, ")")?;
                    }
                }
                write!(f, " -> {}", result)
            }
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Ty::Any => write!(f, "<any>"),
        }
    }
}

/// Replace variables by their image under `mapping`, leaving unmapped
/// variables alone. Used by scheme instantiation.
pub(crate) fn rename_vars(ty: &Ty, mapping: &HashMap<TypeVarId, Ty>) -> Ty {
    match ty {
        Ty::Var(v) => mapping.get(v).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Con { id, args, name } => Ty::Con {
            id: *id,
            args: args.iter().map(|a| rename_vars(a, mapping)).collect(),
            name: name.clone(),
        },
        Ty::Arrow(params, result) => Ty::Arrow(
            params.iter().map(|p| rename_vars(p, mapping)).collect(),
            Box::new(rename_vars(result, mapping)),
        ),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| rename_vars(e, mapping)).collect()),
        Ty::Any => Ty::Any,
    }
}

// ── Type variable set ─────────────────────────────────────────────

/// The set of variables owned by one inference context, used to decide
/// which frame a constraint belongs to.
#[derive(Debug, Clone, Default)]
pub struct TyVarSet {
    vars: HashSet<TypeVarId>,
}

impl TyVarSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, var: TypeVarId) {
        self.vars.insert(var);
    }

    pub fn remove(&mut self, var: TypeVarId) {
        self.vars.remove(&var);
    }

    pub fn contains(&self, var: TypeVarId) -> bool {
        self.vars.contains(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn extend(&mut self, other: &TyVarSet) {
        self.vars.extend(other.vars.iter().copied());
    }

    /// True if any free variable of `ty` is in the set.
    pub fn intersects(&self, ty: &Ty) -> bool {
        ty.free_vars().any(|v| self.contains(v))
    }

    /// Members in ascending id order. Ids are assigned monotonically, so
    /// this is also insertion order.
    pub fn sorted(&self) -> Vec<TypeVarId> {
        let mut vars: Vec<TypeVarId> = self.vars.iter().copied().collect();
        vars.sort_unstable();
        vars
    }
}

// ── Substitution ──────────────────────────────────────────────────

/// The unifier's accumulating solution. Insertion-only: binding the same
/// variable twice is a programmer error.
#[derive(Debug, Clone, Default)]
pub struct Subst {
    map: HashMap<TypeVarId, Ty>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, var: TypeVarId, ty: Ty) {
        let previous = self.map.insert(var, ty);
        assert!(previous.is_none(), "type variable ?{} bound twice", var);
    }

    pub fn get(&self, var: TypeVarId) -> Option<&Ty> {
        self.map.get(&var)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Follow variable bindings until reaching a non-variable type or an
    /// unbound variable. Shallow: does not descend into subterms.
    pub fn resolve(&self, ty: &Ty) -> Ty {
        let mut current = ty.clone();
        while let Ty::Var(v) = current {
            match self.map.get(&v) {
                Some(next) => current = next.clone(),
                None => return Ty::Var(v),
            }
        }
        current
    }

    /// Apply the substitution throughout `ty`. Subterms are rebuilt only
    /// when something underneath actually changed; once solving has
    /// finished this is idempotent.
    pub fn apply(&self, ty: &Ty) -> Ty {
        self.apply_inner(ty).unwrap_or_else(|| ty.clone())
    }

    fn apply_inner(&self, ty: &Ty) -> Option<Ty> {
        match ty {
            Ty::Var(v) => self.map.get(v).map(|t| self.apply(t)),
            Ty::Con { id, args, name } => {
                self.apply_vec(args).map(|args| Ty::Con {
                    id: *id,
                    args,
                    name: name.clone(),
                })
            }
            Ty::Arrow(params, result) => {
                let new_params = self.apply_vec(params);
                let new_result = self.apply_inner(result);
                if new_params.is_none() && new_result.is_none() {
                    return None;
                }
                let params = new_params.unwrap_or_else(|| params.clone());
                let result = new_result.unwrap_or_else(|| (**result).clone());
                Some(Ty::Arrow(params, Box::new(result)))
            }
            Ty::Tuple(elems) => self.apply_vec(elems).map(Ty::Tuple),
            Ty::Any => None,
        }
    }

    fn apply_vec(&self, tys: &[Ty]) -> Option<Vec<Ty>> {
        let mut changed = false;
        let applied: Vec<Option<Ty>> = tys.iter().map(|t| self.apply_inner(t)).collect();
        for entry in &applied {
            if entry.is_some() {
                changed = true;
            }
        }
        if !changed {
            return None;
        }
        Some(
            applied
                .into_iter()
                .zip(tys.iter())
                .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
                .collect(),
        )
    }
}
