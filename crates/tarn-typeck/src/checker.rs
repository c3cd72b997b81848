use std::collections::{HashMap, HashSet};

use la_arena::ArenaMap;
use smol_str::SmolStr;
use tracing::debug;

use tarn_ast::*;

use crate::constraint::Constraint;
use crate::error::Diagnostic;
use crate::graph;
use crate::result::TypeCheckResult;
use crate::scope::{self, DefId, NameKind, ScopeTable};
use crate::solver;
use crate::types::{rename_vars, ConId, Subst, Ty, TyVarSet, TypeVarId};

/// Constructor ids 0..=2 belong to the built-ins.
const FIRST_USER_CON: ConId = 3;

/// A polymorphic type: generalized variables, constraints deferred past
/// the generalization boundary, and the body type. Deferred constraints
/// are re-emitted under fresh variables at every instantiation.
#[derive(Debug, Clone)]
pub(crate) struct Scheme {
    pub(crate) vars: Vec<TypeVarId>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) ty: Ty,
}

impl Scheme {
    fn mono(ty: Ty) -> Scheme {
        Scheme {
            vars: Vec::new(),
            constraints: Vec::new(),
            ty,
        }
    }
}

/// One frame of the inference context stack. Group frames own the
/// variable set and constraint list; per-declaration child frames share
/// their group's collections and own only an environment frame and the
/// enclosing return type.
#[derive(Debug, Default)]
struct InferCtx {
    type_vars: TyVarSet,
    constraints: Vec<Constraint>,
    env: HashMap<SmolStr, Scheme>,
    return_type: Option<Ty>,
    owns_collections: bool,
}

impl InferCtx {
    fn owning() -> InferCtx {
        InferCtx {
            owns_collections: true,
            ..InferCtx::default()
        }
    }

    fn child() -> InferCtx {
        InferCtx::default()
    }
}

/// A forward-declared constructor: a struct, an enum, or a built-in.
#[derive(Debug, Clone)]
struct ConInfo {
    id: ConId,
    name: SmolStr,
    arity: usize,
}

pub(crate) fn check(file: &SourceFile) -> TypeCheckResult {
    let mut checker = Checker::new(file);
    checker.run();
    checker.into_result()
}

pub(crate) struct Checker<'a> {
    file: &'a SourceFile,
    parents: ParentMap,
    scopes: ScopeTable,
    next_var: TypeVarId,
    next_con: ConId,
    ctxs: Vec<InferCtx>,
    subst: Subst,
    diagnostics: Vec<Diagnostic>,
    /// Arrow type of each let declaration, used directly by references
    /// inside the declaration's own group so mutual recursion unifies.
    decl_types: ArenaMap<DeclId, Ty>,
    /// Declarations whose group is currently being inferred.
    in_flight: HashSet<DeclId>,
    /// Type of every inferred expression, pre-substitution.
    expr_types: ArenaMap<ExprId, Ty>,
    /// Constructor registry for forward-declared structs and enums.
    cons: HashMap<DeclId, ConInfo>,
}

impl<'a> Checker<'a> {
    fn new(file: &'a SourceFile) -> Checker<'a> {
        Checker {
            file,
            parents: ParentMap::compute(file),
            scopes: ScopeTable::new(),
            next_var: 0,
            next_con: FIRST_USER_CON,
            ctxs: Vec::new(),
            subst: Subst::new(),
            diagnostics: Vec::new(),
            decl_types: ArenaMap::default(),
            in_flight: HashSet::new(),
            expr_types: ArenaMap::default(),
            cons: HashMap::new(),
        }
    }

    fn run(&mut self) {
        self.ctxs.push(InferCtx::owning());
        self.install_builtins();
        self.declare_items(&self.file.items.clone());

        let graph = graph::compute_reference_graph(self.file, &self.parents, &mut self.scopes);
        let groups = graph.scc_groups();
        debug!(groups = groups.len(), "checking declaration groups");
        for group in &groups {
            self.check_group(group);
        }

        let file = self.file;
        self.stmt_pass(&file.items);

        let root = self.ctxs.pop().expect("root context");
        assert!(self.ctxs.is_empty(), "context stack out of balance");
        debug!(constraints = root.constraints.len(), "solving");
        solver::solve(
            Constraint::Many(root.constraints),
            &mut self.subst,
            &mut self.diagnostics,
        );
    }

    fn into_result(self) -> TypeCheckResult {
        let mut expr_types = ArenaMap::default();
        for (id, ty) in self.expr_types.iter() {
            expr_types.insert(id, self.subst.apply(ty));
        }
        let mut decl_types = ArenaMap::default();
        for (id, ty) in self.decl_types.iter() {
            decl_types.insert(id, self.subst.apply(ty));
        }
        TypeCheckResult {
            diagnostics: self.diagnostics,
            expr_types,
            decl_types,
            subst: self.subst,
        }
    }

    // ── Built-ins and forward declaration ─────────────────────────

    fn install_builtins(&mut self) {
        let int_binop = Scheme::mono(Ty::Arrow(
            vec![Ty::int(), Ty::int()],
            Box::new(Ty::int()),
        ));
        for op in ["+", "-", "*", "/"] {
            self.bind(SmolStr::new(op), int_binop.clone());
        }

        // `==` is polymorphic: both sides must agree, the result is Bool.
        let a = self.fresh_var_id();
        self.bind(
            SmolStr::new("=="),
            Scheme {
                vars: vec![a],
                constraints: Vec::new(),
                ty: Ty::Arrow(vec![Ty::Var(a), Ty::Var(a)], Box::new(Ty::boolean())),
            },
        );

        self.bind(
            SmolStr::new("not"),
            Scheme::mono(Ty::Arrow(vec![Ty::boolean()], Box::new(Ty::boolean()))),
        );

        for (name, ty) in [
            ("True", Ty::boolean()),
            ("False", Ty::boolean()),
            ("Int", Ty::int()),
            ("String", Ty::string()),
        ] {
            self.bind(SmolStr::new(name), Scheme::mono(ty));
        }
    }

    /// Assign a constructor id to every struct and enum, recursing into
    /// modules. Their bodies are not type-checked beyond this.
    fn declare_items(&mut self, items: &[Item]) {
        for &item in items {
            let Item::Decl(id) = item else { continue };
            let file = self.file;
            match &file.decls[id].kind {
                DeclKind::Module { items, .. } => self.declare_items(items),
                DeclKind::Struct { name, fields, .. } => {
                    let info = ConInfo {
                        id: self.next_con,
                        name: name.clone(),
                        arity: fields.len(),
                    };
                    self.next_con += 1;
                    self.cons.insert(id, info);
                }
                DeclKind::Enum { name, .. } => {
                    let info = ConInfo {
                        id: self.next_con,
                        name: name.clone(),
                        arity: 0,
                    };
                    self.next_con += 1;
                    self.cons.insert(id, info);
                }
                DeclKind::TypeAlias { .. } | DeclKind::Let(_) => {}
            }
        }
    }

    // ── Context stack ─────────────────────────────────────────────

    fn fresh_var_id(&mut self) -> TypeVarId {
        let id = self.next_var;
        self.next_var += 1;
        for ctx in self.ctxs.iter_mut().rev() {
            if ctx.owns_collections {
                ctx.type_vars.insert(id);
                break;
            }
        }
        id
    }

    fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.fresh_var_id())
    }

    /// Attach a constraint to the innermost owning frame whose variables
    /// intersect either side; the root collects everything else.
    fn add_constraint(&mut self, constraint: Constraint) {
        match constraint {
            Constraint::Many(elems) => {
                for elem in elems {
                    self.add_constraint(elem);
                }
            }
            Constraint::Equal(left, right, span) => {
                let mut target = 0;
                for (index, ctx) in self.ctxs.iter().enumerate().rev() {
                    if index == 0 || !ctx.owns_collections {
                        continue;
                    }
                    if ctx.type_vars.intersects(&left) || ctx.type_vars.intersects(&right) {
                        target = index;
                        break;
                    }
                }
                self.ctxs[target]
                    .constraints
                    .push(Constraint::Equal(left, right, span));
            }
        }
    }

    fn bind(&mut self, name: SmolStr, scheme: Scheme) {
        self.ctxs
            .last_mut()
            .expect("context stack is never empty")
            .env
            .insert(name, scheme);
    }

    fn lookup_scheme(&self, name: &str) -> Option<Scheme> {
        self.ctxs
            .iter()
            .rev()
            .find_map(|ctx| ctx.env.get(name).cloned())
    }

    fn current_return_type(&self) -> Option<Ty> {
        self.ctxs
            .iter()
            .rev()
            .find_map(|ctx| ctx.return_type.clone())
    }

    fn instantiate(&mut self, scheme: &Scheme) -> Ty {
        if scheme.vars.is_empty() && scheme.constraints.is_empty() {
            return scheme.ty.clone();
        }
        let mapping: HashMap<TypeVarId, Ty> = scheme
            .vars
            .iter()
            .map(|&var| (var, self.fresh_var()))
            .collect();
        for constraint in &scheme.constraints {
            let constraint = constraint.rename(&mapping);
            self.add_constraint(constraint);
        }
        rename_vars(&scheme.ty, &mapping)
    }

    // ── Declaration groups ────────────────────────────────────────

    fn check_group(&mut self, group: &[DeclId]) {
        self.ctxs.push(InferCtx::owning());
        for &decl in group {
            self.in_flight.insert(decl);
        }

        // First pass: allocate each declaration's arrow type and bind its
        // pattern in the group frame.
        let mut frames: Vec<(DeclId, InferCtx)> = Vec::new();
        let mut bound: Vec<(SmolStr, Ty)> = Vec::new();
        for &decl in group {
            self.ctxs.push(InferCtx::child());
            let ret = self.fresh_var();
            self.ctxs.last_mut().expect("child frame").return_type = Some(ret.clone());

            let file = self.file;
            let let_decl = expect_let(file, decl);
            let mut param_tys = Vec::with_capacity(let_decl.params.len());
            for &param in &let_decl.params {
                let ty = self.fresh_var();
                self.bind(file.params[param].name.clone(), Scheme::mono(ty.clone()));
                param_tys.push(ty);
            }
            let ty = Ty::Arrow(param_tys, Box::new(ret));

            if let Some(assert) = let_decl.type_assert {
                let mut tv_scope = HashMap::new();
                let assert_ty = self.resolve_type_expr(assert, &mut tv_scope);
                let span = file.type_exprs[assert].span;
                self.add_constraint(Constraint::Equal(assert_ty, ty.clone(), span));
            }

            let child = self.ctxs.pop().expect("child frame");
            frames.push((decl, child));

            self.decl_types.insert(decl, ty.clone());
            let names = self.bind_decl_pattern(decl, &ty);
            bound.extend(names);
        }

        // Second pass: infer the bodies against the allocated types.
        for (decl, child) in frames {
            self.ctxs.push(child);
            let file = self.file;
            let let_decl = expect_let(file, decl);
            match &let_decl.body {
                Some(LetBody::Expr(expr)) => {
                    let ty = self.infer_expr(*expr);
                    let ret = self
                        .current_return_type()
                        .expect("declaration frame has a return type");
                    self.add_constraint(Constraint::Equal(ty, ret, file.exprs[*expr].span));
                }
                Some(LetBody::Block(stmts)) => {
                    for &stmt in stmts {
                        self.infer_stmt(stmt);
                    }
                }
                None => {}
            }
            self.ctxs.pop();
        }

        for &decl in group {
            self.in_flight.remove(&decl);
        }

        // Generalize: the group's variables and constraints become the
        // scheme of every name the group binds. The constraints then drain
        // into the parent frame so the final solve still sees them once.
        let group_ctx = self.ctxs.pop().expect("group context");
        let vars = group_ctx.type_vars.sorted();
        for (name, ty) in bound {
            self.bind(
                name,
                Scheme {
                    vars: vars.clone(),
                    constraints: group_ctx.constraints.clone(),
                    ty,
                },
            );
        }
        let parent = self.ctxs.last_mut().expect("parent context");
        parent.constraints.extend(group_ctx.constraints);
        parent.type_vars.extend(&group_ctx.type_vars);
    }

    /// Bind the names of a declaration's pattern monomorphically in the
    /// current frame, returning them with their types for later
    /// generalization.
    fn bind_decl_pattern(&mut self, decl: DeclId, ty: &Ty) -> Vec<(SmolStr, Ty)> {
        let file = self.file;
        let let_decl = expect_let(file, decl);
        match &file.patterns[let_decl.pattern].kind {
            PatternKind::Bind(name) | PatternKind::WrappedOperator(name) => {
                self.bind(name.clone(), Scheme::mono(ty.clone()));
                vec![(name.clone(), ty.clone())]
            }
            PatternKind::Struct { .. } => {
                // Struct layouts are not typed; each bound member gets its
                // own fresh variable.
                let names = scope::pattern_bound_names(file, let_decl.pattern);
                names
                    .into_iter()
                    .map(|name| {
                        let member_ty = self.fresh_var();
                        self.bind(name.clone(), Scheme::mono(member_ty.clone()));
                        (name, member_ty)
                    })
                    .collect()
            }
        }
    }

    /// A let statement inside a block: inferred in place, bound
    /// monomorphically. Only top-level groups generalize.
    fn infer_nested_let(&mut self, decl: DeclId) {
        let file = self.file;
        let let_decl = expect_let(file, decl);

        self.ctxs.push(InferCtx::child());
        let ret = self.fresh_var();
        self.ctxs.last_mut().expect("child frame").return_type = Some(ret.clone());
        let mut param_tys = Vec::with_capacity(let_decl.params.len());
        for &param in &let_decl.params {
            let ty = self.fresh_var();
            self.bind(file.params[param].name.clone(), Scheme::mono(ty.clone()));
            param_tys.push(ty);
        }
        let ty = Ty::Arrow(param_tys, Box::new(ret.clone()));

        if let Some(assert) = let_decl.type_assert {
            let mut tv_scope = HashMap::new();
            let assert_ty = self.resolve_type_expr(assert, &mut tv_scope);
            let span = file.type_exprs[assert].span;
            self.add_constraint(Constraint::Equal(assert_ty, ty.clone(), span));
        }

        self.decl_types.insert(decl, ty.clone());
        self.in_flight.insert(decl);
        match &let_decl.body {
            Some(LetBody::Expr(expr)) => {
                let body_ty = self.infer_expr(*expr);
                self.add_constraint(Constraint::Equal(body_ty, ret, file.exprs[*expr].span));
            }
            Some(LetBody::Block(stmts)) => {
                for &stmt in stmts {
                    self.infer_stmt(stmt);
                }
            }
            None => {}
        }
        self.in_flight.remove(&decl);
        self.ctxs.pop();

        self.bind_decl_pattern(decl, &ty);
    }

    // ── Statements ────────────────────────────────────────────────

    fn infer_stmt(&mut self, stmt: StmtId) {
        let file = self.file;
        match &file.stmts[stmt].kind {
            StmtKind::Expr(expr) => {
                self.infer_expr(*expr);
            }
            StmtKind::Return(expr) => {
                let ty = match expr {
                    Some(expr) => self.infer_expr(*expr),
                    None => Ty::unit(),
                };
                // A return outside any declaration has nothing to
                // constrain.
                if let Some(ret) = self.current_return_type() {
                    self.add_constraint(Constraint::Equal(ret, ty, file.stmts[stmt].span));
                }
            }
            StmtKind::If { cases } => {
                for case in cases {
                    if let Some(test) = case.test {
                        let test_ty = self.infer_expr(test);
                        self.add_constraint(Constraint::Equal(
                            test_ty,
                            Ty::boolean(),
                            file.exprs[test].span,
                        ));
                    }
                    for &stmt in &case.body {
                        self.infer_stmt(stmt);
                    }
                }
            }
            StmtKind::Let(decl) => self.infer_nested_let(*decl),
        }
    }

    /// Top-level statements run after every declaration group, in file
    /// order, in the root context.
    fn stmt_pass(&mut self, items: &[Item]) {
        for &item in items {
            match item {
                Item::Stmt(stmt) => self.infer_stmt(stmt),
                Item::Decl(decl) => {
                    let file = self.file;
                    if let DeclKind::Module { items, .. } = &file.decls[decl].kind {
                        self.stmt_pass(items);
                    }
                }
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────

    fn infer_expr(&mut self, expr: ExprId) -> Ty {
        let ty = self.infer_expr_kind(expr);
        self.expr_types.insert(expr, ty.clone());
        ty
    }

    fn infer_expr_kind(&mut self, expr: ExprId) -> Ty {
        let file = self.file;
        let span = file.exprs[expr].span;
        match &file.exprs[expr].kind {
            ExprKind::Int(_) => Ty::int(),
            ExprKind::Str(_) => Ty::string(),
            ExprKind::Nested(inner) => self.infer_expr(*inner),
            ExprKind::Reference(name) => self.infer_name(name, NodeId::Expr(expr), span),
            ExprKind::NamedTuple {
                name,
                name_span,
                args,
            } => self.infer_named_tuple(expr, name, *name_span, args),
            ExprKind::Call { callee, args } => {
                let callee_ty = self.infer_expr(*callee);
                let arg_tys: Vec<Ty> = args.iter().map(|&arg| self.infer_expr(arg)).collect();
                let ret = self.fresh_var();
                self.add_constraint(Constraint::Equal(
                    callee_ty,
                    Ty::Arrow(arg_tys, Box::new(ret.clone())),
                    span,
                ));
                ret
            }
            ExprKind::Infix {
                lhs,
                op,
                op_span,
                rhs,
            } => {
                let lhs_ty = self.infer_expr(*lhs);
                let rhs_ty = self.infer_expr(*rhs);
                let op_ty = self.infer_name(op, NodeId::Expr(expr), *op_span);
                let ret = self.fresh_var();
                self.add_constraint(Constraint::Equal(
                    Ty::Arrow(vec![lhs_ty, rhs_ty], Box::new(ret.clone())),
                    op_ty,
                    span,
                ));
                ret
            }
        }
    }

    /// Resolve a value name: scope first, then the environment stack.
    /// Mid-group references use the declaration's cached arrow type
    /// directly so mutual recursion unifies.
    fn infer_name(&mut self, name: &SmolStr, node: NodeId, span: Span) -> Ty {
        let resolved = self
            .scopes
            .resolve(self.file, &self.parents, node, name, NameKind::VAR);
        match resolved {
            Some(DefId::Let(decl)) => {
                if self.in_flight.contains(&decl) && self.has_direct_type(decl) {
                    return self
                        .decl_types
                        .get(decl)
                        .expect("in-flight declarations have a cached type")
                        .clone();
                }
                match self.lookup_scheme(name) {
                    Some(scheme) => self.instantiate(&scheme),
                    None => self.unknown_name(name.clone(), span),
                }
            }
            Some(DefId::Param(_)) | None => match self.lookup_scheme(name) {
                Some(scheme) => self.instantiate(&scheme),
                None => self.unknown_name(name.clone(), span),
            },
            // Constructors are uppercase and parse as NamedTuple heads, so
            // a reference can never resolve to one.
            Some(DefId::Struct(_))
            | Some(DefId::Enum(_))
            | Some(DefId::EnumMember(..))
            | Some(DefId::TypeAlias(_))
            | Some(DefId::Module(_)) => {
                unreachable!("value reference resolved to a constructor")
            }
        }
    }

    /// True when the declaration's cached arrow type stands for the whole
    /// pattern (a single bound name).
    fn has_direct_type(&self, decl: DeclId) -> bool {
        let let_decl = expect_let(self.file, decl);
        matches!(
            self.file.patterns[let_decl.pattern].kind,
            PatternKind::Bind(_) | PatternKind::WrappedOperator(_)
        )
    }

    fn unknown_name(&mut self, name: SmolStr, span: Span) -> Ty {
        self.diagnostics.push(Diagnostic::BindingNotFound { name, span });
        Ty::Any
    }

    /// Data-constructor application: resolve the head to a constructor,
    /// infer the arguments, and rebuild the constructor type around them.
    fn infer_named_tuple(
        &mut self,
        expr: ExprId,
        name: &SmolStr,
        name_span: Span,
        args: &[ExprId],
    ) -> Ty {
        let resolved =
            self.scopes
                .resolve(self.file, &self.parents, NodeId::Expr(expr), name, NameKind::VAR);
        let con = match resolved {
            Some(DefId::Struct(decl)) => Some(
                self.cons
                    .get(&decl)
                    .expect("structs are forward declared")
                    .clone(),
            ),
            Some(DefId::EnumMember(enum_decl, _)) => Some(
                self.cons
                    .get(&enum_decl)
                    .expect("enums are forward declared")
                    .clone(),
            ),
            Some(_) => unreachable!("constructor head resolved to a value declaration"),
            None => match self.lookup_scheme(name) {
                // Built-in constructors: True, False, Int, String.
                Some(scheme) => match self.instantiate(&scheme) {
                    Ty::Con { id, args, name } => Some(ConInfo {
                        id,
                        arity: args.len(),
                        name,
                    }),
                    other => unreachable!("constructor scheme produced {}", other),
                },
                None => None,
            },
        };

        let arg_tys: Vec<Ty> = args.iter().map(|&arg| self.infer_expr(arg)).collect();

        let Some(con) = con else {
            return self.unknown_name(name.clone(), name_span);
        };
        if arg_tys.len() != con.arity {
            let declared = Ty::Con {
                id: con.id,
                args: vec![Ty::Any; con.arity],
                name: con.name.clone(),
            };
            let applied = Ty::Con {
                id: con.id,
                args: arg_tys,
                name: con.name,
            };
            self.diagnostics.push(Diagnostic::ArityMismatch {
                left: declared,
                right: applied,
                span: name_span,
            });
            return Ty::Any;
        }
        Ty::Con {
            id: con.id,
            args: arg_tys,
            name: con.name,
        }
    }

    // ── Type expressions ──────────────────────────────────────────

    fn resolve_type_expr(
        &mut self,
        ty_expr: TypeExprId,
        tv_scope: &mut HashMap<SmolStr, Ty>,
    ) -> Ty {
        self.resolve_type_expr_guarded(ty_expr, tv_scope, &mut HashSet::new())
    }

    fn resolve_type_expr_guarded(
        &mut self,
        ty_expr: TypeExprId,
        tv_scope: &mut HashMap<SmolStr, Ty>,
        visiting: &mut HashSet<DeclId>,
    ) -> Ty {
        let file = self.file;
        let span = file.type_exprs[ty_expr].span;
        match &file.type_exprs[ty_expr].kind {
            TypeExprKind::Var(name) => {
                if let Some(ty) = tv_scope.get(name.as_str()) {
                    return ty.clone();
                }
                let ty = self.fresh_var();
                tv_scope.insert(name.clone(), ty.clone());
                ty
            }
            TypeExprKind::Arrow { params, result } => {
                let params = params
                    .iter()
                    .map(|&p| self.resolve_type_expr_guarded(p, tv_scope, visiting))
                    .collect();
                let result = self.resolve_type_expr_guarded(*result, tv_scope, visiting);
                Ty::Arrow(params, Box::new(result))
            }
            TypeExprKind::Tuple(elems) => Ty::Tuple(
                elems
                    .iter()
                    .map(|&e| self.resolve_type_expr_guarded(e, tv_scope, visiting))
                    .collect(),
            ),
            TypeExprKind::Named { name, args } => {
                match name.as_str() {
                    "Int" => return self.builtin_type(Ty::int(), args, span),
                    "String" => return self.builtin_type(Ty::string(), args, span),
                    "Bool" => return self.builtin_type(Ty::boolean(), args, span),
                    _ => {}
                }
                let resolved = self.scopes.resolve(
                    file,
                    &self.parents,
                    NodeId::TypeExpr(ty_expr),
                    name,
                    NameKind::TYPE,
                );
                match resolved {
                    Some(DefId::Struct(decl)) => {
                        let info = self
                            .cons
                            .get(&decl)
                            .expect("structs are forward declared")
                            .clone();
                        if args.is_empty() {
                            // A bare struct name stands for the struct with
                            // unknown member types.
                            let args = (0..info.arity).map(|_| self.fresh_var()).collect();
                            Ty::Con {
                                id: info.id,
                                args,
                                name: info.name,
                            }
                        } else if args.len() == info.arity {
                            let args = args
                                .iter()
                                .map(|&a| self.resolve_type_expr_guarded(a, tv_scope, visiting))
                                .collect();
                            Ty::Con {
                                id: info.id,
                                args,
                                name: info.name,
                            }
                        } else {
                            self.type_arity_mismatch(&info, args.len(), span)
                        }
                    }
                    Some(DefId::Enum(decl)) => {
                        let info = self
                            .cons
                            .get(&decl)
                            .expect("enums are forward declared")
                            .clone();
                        if args.is_empty() {
                            Ty::Con {
                                id: info.id,
                                args: Vec::new(),
                                name: info.name,
                            }
                        } else {
                            self.type_arity_mismatch(&info, args.len(), span)
                        }
                    }
                    Some(DefId::TypeAlias(decl)) => {
                        if !visiting.insert(decl) {
                            // Alias cycle; the alias layer is scope
                            // introduction only.
                            return Ty::Any;
                        }
                        let DeclKind::TypeAlias { aliased, .. } = &file.decls[decl].kind else {
                            unreachable!("alias DefId points at a non-alias declaration")
                        };
                        let ty = self.resolve_type_expr_guarded(*aliased, tv_scope, visiting);
                        visiting.remove(&decl);
                        if !args.is_empty() {
                            self.diagnostics.push(Diagnostic::ArityMismatch {
                                left: ty.clone(),
                                right: Ty::Any,
                                span,
                            });
                        }
                        ty
                    }
                    Some(_) => unreachable!("type reference resolved to a value declaration"),
                    None => {
                        self.diagnostics.push(Diagnostic::BindingNotFound {
                            name: name.clone(),
                            span,
                        });
                        Ty::Any
                    }
                }
            }
        }
    }

    fn builtin_type(&mut self, ty: Ty, args: &[TypeExprId], span: Span) -> Ty {
        if !args.is_empty() {
            self.diagnostics.push(Diagnostic::ArityMismatch {
                left: ty.clone(),
                right: Ty::Any,
                span,
            });
        }
        ty
    }

    fn type_arity_mismatch(&mut self, info: &ConInfo, applied: usize, span: Span) -> Ty {
        let declared = Ty::Con {
            id: info.id,
            args: vec![Ty::Any; info.arity],
            name: info.name.clone(),
        };
        let applied = Ty::Con {
            id: info.id,
            args: vec![Ty::Any; applied],
            name: info.name.clone(),
        };
        self.diagnostics.push(Diagnostic::ArityMismatch {
            left: declared,
            right: applied,
            span,
        });
        Ty::Any
    }
}

fn expect_let(file: &SourceFile, decl: DeclId) -> &LetDecl {
    match &file.decls[decl].kind {
        DeclKind::Let(let_decl) => let_decl,
        other => unreachable!("expected a let declaration, found {:?}", other),
    }
}
