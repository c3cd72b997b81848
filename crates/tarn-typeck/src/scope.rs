use std::collections::HashMap;
use std::ops::BitOr;

use smol_str::SmolStr;
use tarn_ast::*;

/// Kind of a scope entry, representable as a bitmask so a lookup can ask
/// for several kinds at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameKind(u8);

impl NameKind {
    pub const VAR: NameKind = NameKind(1);
    pub const TYPE: NameKind = NameKind(1 << 1);
    pub const MODULE: NameKind = NameKind(1 << 2);

    pub fn intersects(self, other: NameKind) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for NameKind {
    type Output = NameKind;

    fn bitor(self, rhs: NameKind) -> NameKind {
        NameKind(self.0 | rhs.0)
    }
}

/// What a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefId {
    Let(DeclId),
    Param(ParamId),
    Struct(DeclId),
    Enum(DeclId),
    /// Member `index` of the given enum declaration.
    EnumMember(DeclId, u32),
    TypeAlias(DeclId),
    Module(DeclId),
}

/// Declarations visible from one scope-bearing node, indexed by name.
#[derive(Debug, Default)]
pub struct Scope {
    entries: HashMap<SmolStr, Vec<(NameKind, DefId)>>,
}

impl Scope {
    fn add(&mut self, name: SmolStr, kind: NameKind, def: DefId) {
        self.entries.entry(name).or_default().push((kind, def));
    }

    /// First entry for `name` whose kind intersects the requested mask.
    pub fn lookup(&self, name: &str, mask: NameKind) -> Option<DefId> {
        self.entries
            .get(name)?
            .iter()
            .find(|(kind, _)| kind.intersects(mask))
            .map(|(_, def)| *def)
    }
}

/// Lazily built scopes, memoized per anchor node. One table lives for one
/// check; re-checking a tree starts from a fresh table.
#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: HashMap<NodeId, Scope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` starting from `from`, walking ancestor scope-bearing
    /// nodes outward.
    pub fn resolve(
        &mut self,
        file: &SourceFile,
        parents: &ParentMap,
        from: NodeId,
        name: &str,
        mask: NameKind,
    ) -> Option<DefId> {
        let mut current = Some(from);
        while let Some(node) = current {
            if is_anchor(file, node) {
                if let Some(def) = self.scope_for(file, node).lookup(name, mask) {
                    return Some(def);
                }
            }
            current = parents.get(node);
        }
        None
    }

    /// The scope anchored at `node`, built on first access.
    pub fn scope_for(&mut self, file: &SourceFile, anchor: NodeId) -> &Scope {
        self.scopes
            .entry(anchor)
            .or_insert_with(|| build_scope(file, anchor))
    }
}

fn is_anchor(file: &SourceFile, node: NodeId) -> bool {
    match node {
        NodeId::File => true,
        NodeId::Decl(id) => matches!(
            file.decls[id].kind,
            DeclKind::Module { .. } | DeclKind::Let(_)
        ),
        _ => false,
    }
}

fn build_scope(file: &SourceFile, anchor: NodeId) -> Scope {
    let mut scope = Scope::default();
    match anchor {
        NodeId::File => {
            for &item in &file.items {
                contribute_item(&mut scope, file, item);
            }
        }
        NodeId::Decl(id) => match &file.decls[id].kind {
            DeclKind::Module { name, items, .. } => {
                scope.add(name.clone(), NameKind::MODULE, DefId::Module(id));
                for &item in items {
                    contribute_item(&mut scope, file, item);
                }
            }
            DeclKind::Let(decl) => {
                // The anchor's own scope holds the bindings collected from
                // its body: the nested let declarations.
                match &decl.body {
                    Some(LetBody::Block(stmts)) => {
                        collect_nested_lets(&mut scope, file, stmts)
                    }
                    Some(LetBody::Expr(_)) | None => {}
                }
            }
            other => unreachable!("not a scope anchor: {:?}", other),
        },
        other => unreachable!("not a scope anchor: {:?}", other),
    }
    scope
}

fn contribute_item(scope: &mut Scope, file: &SourceFile, item: Item) {
    match item {
        Item::Decl(id) => contribute_decl(scope, file, id),
        // Statements do not contribute bindings.
        Item::Stmt(_) => {}
    }
}

fn contribute_decl(scope: &mut Scope, file: &SourceFile, id: DeclId) {
    match &file.decls[id].kind {
        DeclKind::Module { name, items, .. } => {
            scope.add(name.clone(), NameKind::MODULE, DefId::Module(id));
            // Modules are transparent groupings; their members are visible
            // from the enclosing scope.
            for &item in items {
                contribute_item(scope, file, item);
            }
        }
        DeclKind::Struct { name, .. } => {
            // The struct name doubles as its constructor.
            scope.add(
                name.clone(),
                NameKind::TYPE | NameKind::VAR,
                DefId::Struct(id),
            );
        }
        DeclKind::Enum { name, members, .. } => {
            scope.add(name.clone(), NameKind::TYPE, DefId::Enum(id));
            for (index, member) in members.iter().enumerate() {
                scope.add(
                    member.name.clone(),
                    NameKind::VAR,
                    DefId::EnumMember(id, index as u32),
                );
            }
        }
        DeclKind::TypeAlias { name, .. } => {
            scope.add(name.clone(), NameKind::TYPE, DefId::TypeAlias(id));
        }
        DeclKind::Let(decl) => {
            add_pattern_names(scope, file, decl.pattern, DefId::Let(id));
            for &param in &decl.params {
                scope.add(
                    file.params[param].name.clone(),
                    NameKind::VAR,
                    DefId::Param(param),
                );
            }
        }
    }
}

/// Walk a let body's statements (through if-arms, not into nested let
/// bodies) and contribute each nested let declaration.
fn collect_nested_lets(scope: &mut Scope, file: &SourceFile, stmts: &[StmtId]) {
    for &stmt in stmts {
        match &file.stmts[stmt].kind {
            StmtKind::Let(decl) => contribute_decl(scope, file, *decl),
            StmtKind::If { cases } => {
                for case in cases {
                    collect_nested_lets(scope, file, &case.body);
                }
            }
            StmtKind::Expr(_) | StmtKind::Return(_) => {}
        }
    }
}

fn add_pattern_names(scope: &mut Scope, file: &SourceFile, pattern: PatternId, def: DefId) {
    match &file.patterns[pattern].kind {
        PatternKind::Bind(name) => scope.add(name.clone(), NameKind::VAR, def),
        PatternKind::WrappedOperator(op) => scope.add(op.clone(), NameKind::VAR, def),
        PatternKind::Struct { elems } => {
            for elem in elems {
                match elem {
                    StructPatternElem::Punned { name, .. } => {
                        scope.add(name.clone(), NameKind::VAR, def)
                    }
                    StructPatternElem::Field { pattern, .. } => {
                        add_pattern_names(scope, file, *pattern, def)
                    }
                    StructPatternElem::Variadic { pattern, .. } => {
                        if let Some(pattern) = pattern {
                            add_pattern_names(scope, file, *pattern, def);
                        }
                    }
                }
            }
        }
    }
}

/// Every name a pattern binds, in source order, for environment binding.
pub(crate) fn pattern_bound_names(file: &SourceFile, pattern: PatternId) -> Vec<SmolStr> {
    let mut names = Vec::new();
    collect_pattern_names(file, pattern, &mut names);
    names
}

fn collect_pattern_names(file: &SourceFile, pattern: PatternId, out: &mut Vec<SmolStr>) {
    match &file.patterns[pattern].kind {
        PatternKind::Bind(name) => out.push(name.clone()),
        PatternKind::WrappedOperator(op) => out.push(op.clone()),
        PatternKind::Struct { elems } => {
            for elem in elems {
                match elem {
                    StructPatternElem::Punned { name, .. } => out.push(name.clone()),
                    StructPatternElem::Field { pattern, .. } => {
                        collect_pattern_names(file, *pattern, out)
                    }
                    StructPatternElem::Variadic { pattern, .. } => {
                        if let Some(pattern) = pattern {
                            collect_pattern_names(file, *pattern, out);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_parser::parse;

    fn parsed(source: &str) -> SourceFile {
        let (file, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        file
    }

    #[test]
    fn file_scope_indexes_top_level_lets() {
        let file = parsed("let a = 1\nlet f x = x\n");
        let mut table = ScopeTable::new();
        let scope = table.scope_for(&file, NodeId::File);
        assert!(matches!(
            scope.lookup("a", NameKind::VAR),
            Some(DefId::Let(_))
        ));
        assert!(matches!(
            scope.lookup("f", NameKind::VAR),
            Some(DefId::Let(_))
        ));
        // Parameters are also contributed, per the construction pattern.
        assert!(matches!(
            scope.lookup("x", NameKind::VAR),
            Some(DefId::Param(_))
        ));
        assert_eq!(scope.lookup("missing", NameKind::VAR), None);
    }

    #[test]
    fn kind_masks_filter_entries() {
        let file = parsed("struct Point = { x, y }\nenum Axis = X | Y\ntype Id = Int\n");
        let mut table = ScopeTable::new();
        let scope = table.scope_for(&file, NodeId::File);
        // Struct names are both a type and a constructor.
        assert!(matches!(
            scope.lookup("Point", NameKind::TYPE),
            Some(DefId::Struct(_))
        ));
        assert!(matches!(
            scope.lookup("Point", NameKind::VAR),
            Some(DefId::Struct(_))
        ));
        // Enum names are types only; members are values.
        assert!(matches!(
            scope.lookup("Axis", NameKind::TYPE),
            Some(DefId::Enum(_))
        ));
        assert_eq!(scope.lookup("Axis", NameKind::VAR), None);
        assert!(matches!(
            scope.lookup("X", NameKind::VAR),
            Some(DefId::EnumMember(_, 0))
        ));
        assert!(matches!(
            scope.lookup("Y", NameKind::VAR),
            Some(DefId::EnumMember(_, 1))
        ));
        assert!(matches!(
            scope.lookup("Id", NameKind::TYPE),
            Some(DefId::TypeAlias(_))
        ));
    }

    #[test]
    fn module_members_visible_from_file_scope() {
        let file = parsed("module Geo\n  struct Point = { x, y }\nlet p = Point 1 2\n");
        let mut table = ScopeTable::new();
        let scope = table.scope_for(&file, NodeId::File);
        assert!(matches!(
            scope.lookup("Geo", NameKind::MODULE),
            Some(DefId::Module(_))
        ));
        assert!(matches!(
            scope.lookup("Point", NameKind::VAR),
            Some(DefId::Struct(_))
        ));
    }

    #[test]
    fn let_scope_collects_nested_lets() {
        let file = parsed("let f x =\n  let y = x\n  return y\n");
        let Item::Decl(f) = file.items[0] else {
            panic!()
        };
        let mut table = ScopeTable::new();
        let scope = table.scope_for(&file, NodeId::Decl(f));
        assert!(matches!(
            scope.lookup("y", NameKind::VAR),
            Some(DefId::Let(_))
        ));
        // The anchor's own pattern name lives in the parent scope.
        assert_eq!(scope.lookup("f", NameKind::VAR), None);
    }

    #[test]
    fn resolve_walks_ancestor_anchors() {
        let file = parsed("let f x =\n  return g x\nlet g y = y\n");
        let parents = ParentMap::compute(&file);
        let mut table = ScopeTable::new();
        // Find the reference to `g` inside f's body.
        let g_ref = file
            .exprs
            .iter()
            .find(|(_, e)| matches!(&e.kind, ExprKind::Reference(name) if name == "g"))
            .map(|(id, _)| id)
            .expect("reference to g");
        let resolved = table.resolve(&file, &parents, NodeId::Expr(g_ref), "g", NameKind::VAR);
        assert!(matches!(resolved, Some(DefId::Let(_))));
        // Parameters resolve through the parent chain too.
        let resolved_x =
            table.resolve(&file, &parents, NodeId::Expr(g_ref), "x", NameKind::VAR);
        assert!(matches!(resolved_x, Some(DefId::Param(_))));
    }

    #[test]
    fn wrapped_operator_binds_its_text() {
        let file = parsed("let (<+>) a b = a\n");
        let mut table = ScopeTable::new();
        let scope = table.scope_for(&file, NodeId::File);
        assert!(matches!(
            scope.lookup("<+>", NameKind::VAR),
            Some(DefId::Let(_))
        ));
    }

    #[test]
    fn struct_pattern_binds_members() {
        let file = parsed("let { x, y: inner, ..rest } = p\n");
        let mut table = ScopeTable::new();
        let scope = table.scope_for(&file, NodeId::File);
        for name in ["x", "inner", "rest"] {
            assert!(
                matches!(scope.lookup(name, NameKind::VAR), Some(DefId::Let(_))),
                "{} not bound",
                name
            );
        }
        assert_eq!(scope.lookup("y", NameKind::VAR), None);
    }
}
