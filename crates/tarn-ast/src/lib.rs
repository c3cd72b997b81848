use la_arena::{Arena, ArenaMap, Idx};
use smol_str::SmolStr;
pub use tarn_lexer::Span;

// ── ID types ──────────────────────────────────────────────────────

pub type DeclId = Idx<Decl>;
pub type StmtId = Idx<Stmt>;
pub type ExprId = Idx<Expr>;
pub type PatternId = Idx<Pattern>;
pub type TypeExprId = Idx<TypeExpr>;
pub type ParamId = Idx<Param>;

/// Identity of any syntax node, usable as a side-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    File,
    Decl(DeclId),
    Stmt(StmtId),
    Expr(ExprId),
    Pattern(PatternId),
    TypeExpr(TypeExprId),
    Param(ParamId),
}

// ── Source file ───────────────────────────────────────────────────

/// A parsed source file. Every syntactic category lives in its own arena;
/// the tree refers to children by index.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub items: Vec<Item>,
    pub decls: Arena<Decl>,
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
    pub patterns: Arena<Pattern>,
    pub type_exprs: Arena<TypeExpr>,
    pub params: Arena<Param>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Decl(DeclId),
    Stmt(StmtId),
}

impl SourceFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn span_of(&self, node: NodeId) -> Span {
        match node {
            NodeId::File => Span::new(0, 0),
            NodeId::Decl(id) => self.decls[id].span,
            NodeId::Stmt(id) => self.stmts[id].span,
            NodeId::Expr(id) => self.exprs[id].span,
            NodeId::Pattern(id) => self.patterns[id].span,
            NodeId::TypeExpr(id) => self.type_exprs[id].span,
            NodeId::Param(id) => self.params[id].span,
        }
    }
}

// ── Declarations ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    /// `module Name` followed by an indented block of items.
    Module {
        name: SmolStr,
        name_span: Span,
        items: Vec<Item>,
    },
    /// `struct Name = { a, b }`
    Struct {
        name: SmolStr,
        name_span: Span,
        fields: Vec<StructField>,
    },
    /// `enum Name = A | B | C`
    Enum {
        name: SmolStr,
        name_span: Span,
        members: Vec<EnumMember>,
    },
    /// `type Name = ty`
    TypeAlias {
        name: SmolStr,
        name_span: Span,
        aliased: TypeExprId,
    },
    Let(LetDecl),
}

/// `let pattern params [: ty] [= expr | block]`
#[derive(Debug, Clone)]
pub struct LetDecl {
    pub pattern: PatternId,
    pub params: Vec<ParamId>,
    pub type_assert: Option<TypeExprId>,
    pub body: Option<LetBody>,
}

#[derive(Debug, Clone)]
pub enum LetBody {
    Expr(ExprId),
    Block(Vec<StmtId>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: SmolStr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: SmolStr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: SmolStr,
    pub span: Span,
}

// ── Statements ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(ExprId),
    Return(Option<ExprId>),
    /// `if`/`elif`/`else` chain. The final case has `test: None` when an
    /// `else` arm is present.
    If { cases: Vec<IfCase> },
    /// A nested let declaration used as a statement.
    Let(DeclId),
}

#[derive(Debug, Clone)]
pub struct IfCase {
    pub test: Option<ExprId>,
    pub body: Vec<StmtId>,
    pub span: Span,
}

// ── Expressions ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    /// A name use. Qualified references do not exist in the surface
    /// syntax, so there is no module path here.
    Reference(SmolStr),
    /// Parenthesized expression.
    Nested(ExprId),
    /// Data-constructor application: `Point 1 2`, `True`.
    NamedTuple {
        name: SmolStr,
        name_span: Span,
        args: Vec<ExprId>,
    },
    /// Function application by juxtaposition: `f x y`.
    Call { callee: ExprId, args: Vec<ExprId> },
    /// `a <op> b`
    Infix {
        lhs: ExprId,
        op: SmolStr,
        op_span: Span,
        rhs: ExprId,
    },
}

// ── Patterns ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    /// Plain name binding.
    Bind(SmolStr),
    /// `(<+>)`: binds the operator's text.
    WrappedOperator(SmolStr),
    /// `{ a, b: p, .. }`
    Struct { elems: Vec<StructPatternElem> },
}

#[derive(Debug, Clone)]
pub enum StructPatternElem {
    /// `{ x }` binds `x`.
    Punned { name: SmolStr, span: Span },
    /// `{ x: p }` binds whatever `p` binds.
    Field {
        name: SmolStr,
        name_span: Span,
        pattern: PatternId,
    },
    /// `{ .. }` or `{ ..p }`.
    Variadic {
        pattern: Option<PatternId>,
        span: Span,
    },
}

// ── Type expressions ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `Int`, `List Int`
    Named {
        name: SmolStr,
        args: Vec<TypeExprId>,
    },
    /// Lowercase type variable: `a`
    Var(SmolStr),
    /// `(Int, Int) -> Bool` or `Int -> Int`
    Arrow {
        params: Vec<TypeExprId>,
        result: TypeExprId,
    },
    /// `(Int, String)`; `()` is the empty tuple.
    Tuple(Vec<TypeExprId>),
}

// ── Parent side-table ─────────────────────────────────────────────

/// Parent links for every node, kept out of the tree itself. Building the
/// table is a pure walk, so rebuilding it for the same tree is idempotent.
#[derive(Debug, Default)]
pub struct ParentMap {
    decls: ArenaMap<DeclId, NodeId>,
    stmts: ArenaMap<StmtId, NodeId>,
    exprs: ArenaMap<ExprId, NodeId>,
    patterns: ArenaMap<PatternId, NodeId>,
    type_exprs: ArenaMap<TypeExprId, NodeId>,
    params: ArenaMap<ParamId, NodeId>,
}

impl ParentMap {
    pub fn compute(file: &SourceFile) -> ParentMap {
        let mut map = ParentMap::default();
        for &item in &file.items {
            map.walk_item(file, item, NodeId::File);
        }
        map
    }

    pub fn get(&self, node: NodeId) -> Option<NodeId> {
        match node {
            NodeId::File => None,
            NodeId::Decl(id) => self.decls.get(id).copied(),
            NodeId::Stmt(id) => self.stmts.get(id).copied(),
            NodeId::Expr(id) => self.exprs.get(id).copied(),
            NodeId::Pattern(id) => self.patterns.get(id).copied(),
            NodeId::TypeExpr(id) => self.type_exprs.get(id).copied(),
            NodeId::Param(id) => self.params.get(id).copied(),
        }
    }

    fn walk_item(&mut self, file: &SourceFile, item: Item, parent: NodeId) {
        match item {
            Item::Decl(id) => self.walk_decl(file, id, parent),
            Item::Stmt(id) => self.walk_stmt(file, id, parent),
        }
    }

    fn walk_decl(&mut self, file: &SourceFile, id: DeclId, parent: NodeId) {
        self.decls.insert(id, parent);
        let me = NodeId::Decl(id);
        match &file.decls[id].kind {
            DeclKind::Module { items, .. } => {
                for &item in items {
                    self.walk_item(file, item, me);
                }
            }
            DeclKind::Struct { .. } | DeclKind::Enum { .. } => {}
            DeclKind::TypeAlias { aliased, .. } => self.walk_type(file, *aliased, me),
            DeclKind::Let(decl) => {
                self.walk_pattern(file, decl.pattern, me);
                for &param in &decl.params {
                    self.params.insert(param, me);
                }
                if let Some(assert) = decl.type_assert {
                    self.walk_type(file, assert, me);
                }
                match &decl.body {
                    Some(LetBody::Expr(expr)) => self.walk_expr(file, *expr, me),
                    Some(LetBody::Block(stmts)) => {
                        for &stmt in stmts {
                            self.walk_stmt(file, stmt, me);
                        }
                    }
                    None => {}
                }
            }
        }
    }

    fn walk_stmt(&mut self, file: &SourceFile, id: StmtId, parent: NodeId) {
        self.stmts.insert(id, parent);
        let me = NodeId::Stmt(id);
        match &file.stmts[id].kind {
            StmtKind::Expr(expr) => self.walk_expr(file, *expr, me),
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.walk_expr(file, *expr, me);
                }
            }
            StmtKind::If { cases } => {
                for case in cases {
                    if let Some(test) = case.test {
                        self.walk_expr(file, test, me);
                    }
                    for &stmt in &case.body {
                        self.walk_stmt(file, stmt, me);
                    }
                }
            }
            StmtKind::Let(decl) => self.walk_decl(file, *decl, me),
        }
    }

    fn walk_expr(&mut self, file: &SourceFile, id: ExprId, parent: NodeId) {
        self.exprs.insert(id, parent);
        let me = NodeId::Expr(id);
        match &file.exprs[id].kind {
            ExprKind::Int(_) | ExprKind::Str(_) | ExprKind::Reference(_) => {}
            ExprKind::Nested(inner) => self.walk_expr(file, *inner, me),
            ExprKind::NamedTuple { args, .. } => {
                for &arg in args {
                    self.walk_expr(file, arg, me);
                }
            }
            ExprKind::Call { callee, args } => {
                self.walk_expr(file, *callee, me);
                for &arg in args {
                    self.walk_expr(file, arg, me);
                }
            }
            ExprKind::Infix { lhs, rhs, .. } => {
                self.walk_expr(file, *lhs, me);
                self.walk_expr(file, *rhs, me);
            }
        }
    }

    fn walk_pattern(&mut self, file: &SourceFile, id: PatternId, parent: NodeId) {
        self.patterns.insert(id, parent);
        let me = NodeId::Pattern(id);
        match &file.patterns[id].kind {
            PatternKind::Bind(_) | PatternKind::WrappedOperator(_) => {}
            PatternKind::Struct { elems } => {
                for elem in elems {
                    match elem {
                        StructPatternElem::Punned { .. } => {}
                        StructPatternElem::Field { pattern, .. } => {
                            self.walk_pattern(file, *pattern, me)
                        }
                        StructPatternElem::Variadic { pattern, .. } => {
                            if let Some(pattern) = pattern {
                                self.walk_pattern(file, *pattern, me);
                            }
                        }
                    }
                }
            }
        }
    }

    fn walk_type(&mut self, file: &SourceFile, id: TypeExprId, parent: NodeId) {
        self.type_exprs.insert(id, parent);
        let me = NodeId::TypeExpr(id);
        match &file.type_exprs[id].kind {
            TypeExprKind::Named { args, .. } => {
                for &arg in args {
                    self.walk_type(file, arg, me);
                }
            }
            TypeExprKind::Var(_) => {}
            TypeExprKind::Arrow { params, result } => {
                for &param in params {
                    self.walk_type(file, param, me);
                }
                self.walk_type(file, *result, me);
            }
            TypeExprKind::Tuple(elems) => {
                for &elem in elems {
                    self.walk_type(file, elem, me);
                }
            }
        }
    }
}

// ── Pretty printer ────────────────────────────────────────────────

pub fn pretty_print(file: &SourceFile) -> String {
    let mut printer = PrettyPrinter {
        file,
        buf: String::new(),
        indent: 0,
    };
    for &item in &file.items {
        printer.item(item);
    }
    printer.buf
}

struct PrettyPrinter<'a> {
    file: &'a SourceFile,
    buf: String,
    indent: usize,
}

impl PrettyPrinter<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    fn item(&mut self, item: Item) {
        match item {
            Item::Decl(id) => self.decl(id),
            Item::Stmt(id) => self.stmt(id),
        }
    }

    fn decl(&mut self, id: DeclId) {
        match &self.file.decls[id].kind {
            DeclKind::Module { name, items, .. } => {
                self.line(&format!("module {}", name));
                self.indent += 1;
                for &item in &items.clone() {
                    self.item(item);
                }
                self.indent -= 1;
            }
            DeclKind::Struct { name, fields, .. } => {
                let fields: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
                self.line(&format!("struct {} {{ {} }}", name, fields.join(", ")));
            }
            DeclKind::Enum { name, members, .. } => {
                let members: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
                self.line(&format!("enum {} = {}", name, members.join(" | ")));
            }
            DeclKind::TypeAlias { name, aliased, .. } => {
                let ty = self.type_expr(*aliased);
                self.line(&format!("type {} = {}", name, ty));
            }
            DeclKind::Let(decl) => {
                let mut head = format!("let {}", self.pattern(decl.pattern));
                for &param in &decl.params {
                    head.push(' ');
                    head.push_str(&self.file.params[param].name);
                }
                if let Some(assert) = decl.type_assert {
                    head.push_str(" : ");
                    head.push_str(&self.type_expr(assert));
                }
                match decl.body.clone() {
                    Some(LetBody::Expr(expr)) => {
                        head.push_str(" = ");
                        head.push_str(&self.expr(expr));
                        self.line(&head);
                    }
                    Some(LetBody::Block(stmts)) => {
                        head.push_str(" =");
                        self.line(&head);
                        self.indent += 1;
                        for stmt in stmts {
                            self.stmt(stmt);
                        }
                        self.indent -= 1;
                    }
                    None => self.line(&head),
                }
            }
        }
    }

    fn stmt(&mut self, id: StmtId) {
        match self.file.stmts[id].kind.clone() {
            StmtKind::Expr(expr) => {
                let text = self.expr(expr);
                self.line(&text);
            }
            StmtKind::Return(expr) => {
                let text = match expr {
                    Some(expr) => format!("return {}", self.expr(expr)),
                    None => "return".to_string(),
                };
                self.line(&text);
            }
            StmtKind::If { cases } => {
                for (i, case) in cases.iter().enumerate() {
                    let head = match (&case.test, i) {
                        (Some(test), 0) => format!("if {}", self.expr(*test)),
                        (Some(test), _) => format!("elif {}", self.expr(*test)),
                        (None, _) => "else".to_string(),
                    };
                    self.line(&head);
                    self.indent += 1;
                    for &stmt in &case.body {
                        self.stmt(stmt);
                    }
                    self.indent -= 1;
                }
            }
            StmtKind::Let(decl) => self.decl(decl),
        }
    }

    fn expr(&self, id: ExprId) -> String {
        match &self.file.exprs[id].kind {
            ExprKind::Int(value) => value.to_string(),
            ExprKind::Str(value) => format!("{:?}", value),
            ExprKind::Reference(name) => name.to_string(),
            ExprKind::Nested(inner) => format!("({})", self.expr(*inner)),
            ExprKind::NamedTuple { name, args, .. } => {
                let mut out = name.to_string();
                for &arg in args {
                    out.push(' ');
                    out.push_str(&self.expr(arg));
                }
                out
            }
            ExprKind::Call { callee, args } => {
                let mut out = self.expr(*callee);
                for &arg in args {
                    out.push(' ');
                    out.push_str(&self.expr(arg));
                }
                out
            }
            ExprKind::Infix { lhs, op, rhs, .. } => {
                format!("{} {} {}", self.expr(*lhs), op, self.expr(*rhs))
            }
        }
    }

    fn pattern(&self, id: PatternId) -> String {
        match &self.file.patterns[id].kind {
            PatternKind::Bind(name) => name.to_string(),
            PatternKind::WrappedOperator(op) => format!("({})", op),
            PatternKind::Struct { elems } => {
                let elems: Vec<String> = elems
                    .iter()
                    .map(|elem| match elem {
                        StructPatternElem::Punned { name, .. } => name.to_string(),
                        StructPatternElem::Field { name, pattern, .. } => {
                            format!("{}: {}", name, self.pattern(*pattern))
                        }
                        StructPatternElem::Variadic { pattern, .. } => match pattern {
                            Some(pattern) => format!("..{}", self.pattern(*pattern)),
                            None => "..".to_string(),
                        },
                    })
                    .collect();
                format!("{{ {} }}", elems.join(", "))
            }
        }
    }

    fn type_expr(&self, id: TypeExprId) -> String {
        match &self.file.type_exprs[id].kind {
            TypeExprKind::Named { name, args } => {
                let mut out = name.to_string();
                for &arg in args {
                    out.push(' ');
                    out.push_str(&self.type_expr(arg));
                }
                out
            }
            TypeExprKind::Var(name) => name.to_string(),
            TypeExprKind::Arrow { params, result } => {
                let params: Vec<String> = params.iter().map(|&p| self.type_expr(p)).collect();
                if params.len() == 1 {
                    format!("{} -> {}", params[0], self.type_expr(*result))
                } else {
                    format!("({}) -> {}", params.join(", "), self.type_expr(*result))
                }
            }
            TypeExprKind::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|&e| self.type_expr(e)).collect();
                format!("({})", elems.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_map_links_let_body() {
        let mut file = SourceFile::new();
        let span = Span::new(0, 0);
        let pattern = file.patterns.alloc(Pattern {
            kind: PatternKind::Bind("a".into()),
            span,
        });
        let value = file.exprs.alloc(Expr {
            kind: ExprKind::Int(1),
            span,
        });
        let decl = file.decls.alloc(Decl {
            kind: DeclKind::Let(LetDecl {
                pattern,
                params: vec![],
                type_assert: None,
                body: Some(LetBody::Expr(value)),
            }),
            span,
        });
        file.items.push(Item::Decl(decl));

        let parents = ParentMap::compute(&file);
        assert_eq!(parents.get(NodeId::Decl(decl)), Some(NodeId::File));
        assert_eq!(parents.get(NodeId::Expr(value)), Some(NodeId::Decl(decl)));
        assert_eq!(
            parents.get(NodeId::Pattern(pattern)),
            Some(NodeId::Decl(decl))
        );
        assert_eq!(parents.get(NodeId::File), None);
    }

    #[test]
    fn parent_map_is_idempotent() {
        let mut file = SourceFile::new();
        let span = Span::new(0, 0);
        let pattern = file.patterns.alloc(Pattern {
            kind: PatternKind::Bind("x".into()),
            span,
        });
        let decl = file.decls.alloc(Decl {
            kind: DeclKind::Let(LetDecl {
                pattern,
                params: vec![],
                type_assert: None,
                body: None,
            }),
            span,
        });
        file.items.push(Item::Decl(decl));

        let first = ParentMap::compute(&file);
        let second = ParentMap::compute(&file);
        assert_eq!(
            first.get(NodeId::Pattern(pattern)),
            second.get(NodeId::Pattern(pattern))
        );
    }
}
