use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use tarn_ast::*;

use crate::scope::{DefId, NameKind, ScopeTable};

/// Directed references among let declarations: an edge `u -> v` means
/// *u references v*, so `v` must be generalized before `u`.
pub struct ReferenceGraph {
    graph: DiGraph<DeclId, ()>,
    indices: HashMap<DeclId, NodeIndex>,
}

impl ReferenceGraph {
    /// Mutually recursive groups in reverse topological order: every group
    /// comes after the groups it references.
    pub fn scc_groups(&self) -> Vec<Vec<DeclId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|component| {
                let mut decls: Vec<DeclId> =
                    component.into_iter().map(|ix| self.graph[ix]).collect();
                decls.sort_by_key(|d| u32::from(d.into_raw()));
                decls
            })
            .collect()
    }

    #[cfg(test)]
    fn has_edge(&self, from: DeclId, to: DeclId) -> bool {
        match (self.indices.get(&from), self.indices.get(&to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }
}

/// Let declarations reachable from the file's items, recursing into
/// modules, in source order.
pub fn collect_let_decls(file: &SourceFile) -> Vec<DeclId> {
    let mut out = Vec::new();
    collect_from_items(file, &file.items, &mut out);
    out
}

fn collect_from_items(file: &SourceFile, items: &[Item], out: &mut Vec<DeclId>) {
    for &item in items {
        if let Item::Decl(id) = item {
            match &file.decls[id].kind {
                DeclKind::Let(_) => out.push(id),
                DeclKind::Module { items, .. } => collect_from_items(file, items, out),
                _ => {}
            }
        }
    }
}

/// Build the reference graph over the collected let declarations by
/// resolving every name use under each declaration's body.
pub fn compute_reference_graph(
    file: &SourceFile,
    parents: &ParentMap,
    scopes: &mut ScopeTable,
) -> ReferenceGraph {
    let mut graph = DiGraph::new();
    let mut indices = HashMap::new();
    let decls = collect_let_decls(file);
    for &decl in &decls {
        indices.insert(decl, graph.add_node(decl));
    }

    let mut builder = GraphBuilder {
        file,
        parents,
        scopes,
        graph,
        indices,
    };
    for &decl in &decls {
        builder.walk_decl(decl, decl);
    }
    debug!(
        vertices = builder.graph.node_count(),
        edges = builder.graph.edge_count(),
        "computed reference graph"
    );

    ReferenceGraph {
        graph: builder.graph,
        indices: builder.indices,
    }
}

struct GraphBuilder<'a> {
    file: &'a SourceFile,
    parents: &'a ParentMap,
    scopes: &'a mut ScopeTable,
    graph: DiGraph<DeclId, ()>,
    indices: HashMap<DeclId, NodeIndex>,
}

impl GraphBuilder<'_> {
    fn walk_decl(&mut self, from: DeclId, decl: DeclId) {
        let DeclKind::Let(let_decl) = &self.file.decls[decl].kind else {
            unreachable!("reference graph vertices are let declarations")
        };
        match &let_decl.body {
            Some(LetBody::Expr(expr)) => self.walk_expr(from, *expr),
            Some(LetBody::Block(stmts)) => {
                for &stmt in stmts.clone().iter() {
                    self.walk_stmt(from, stmt);
                }
            }
            None => {}
        }
    }

    fn walk_stmt(&mut self, from: DeclId, stmt: StmtId) {
        match self.file.stmts[stmt].kind.clone() {
            StmtKind::Expr(expr) => self.walk_expr(from, expr),
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.walk_expr(from, expr);
                }
            }
            StmtKind::If { cases } => {
                for case in cases {
                    if let Some(test) = case.test {
                        self.walk_expr(from, test);
                    }
                    for &stmt in &case.body {
                        self.walk_stmt(from, stmt);
                    }
                }
            }
            // References under a nested let still belong to `from`.
            StmtKind::Let(decl) => self.walk_decl(from, decl),
        }
    }

    fn walk_expr(&mut self, from: DeclId, expr: ExprId) {
        match self.file.exprs[expr].kind.clone() {
            ExprKind::Int(_) | ExprKind::Str(_) => {}
            ExprKind::Reference(name) => self.reference(from, &name, expr),
            ExprKind::Nested(inner) => self.walk_expr(from, inner),
            ExprKind::NamedTuple { args, .. } => {
                // Constructor heads resolve to structs or enum members,
                // never to let declarations.
                for &arg in &args {
                    self.walk_expr(from, arg);
                }
            }
            ExprKind::Call { callee, args } => {
                self.walk_expr(from, callee);
                for &arg in &args {
                    self.walk_expr(from, arg);
                }
            }
            ExprKind::Infix { lhs, op, rhs, .. } => {
                // Operator uses are references too; a user-defined operator
                // can be part of a recursion group.
                self.reference(from, &op, expr);
                self.walk_expr(from, lhs);
                self.walk_expr(from, rhs);
            }
        }
    }

    fn reference(&mut self, from: DeclId, name: &str, at: ExprId) {
        let resolved =
            self.scopes
                .resolve(self.file, self.parents, NodeId::Expr(at), name, NameKind::VAR);
        let target = match resolved {
            // A reference to a parameter points at the declaration that
            // owns it.
            Some(DefId::Param(param)) => self.enclosing_let(NodeId::Param(param)),
            Some(DefId::Let(decl)) => Some(self.top_level_let(decl)),
            _ => None,
        };
        if let Some(target) = target {
            if let (Some(&a), Some(&b)) = (self.indices.get(&from), self.indices.get(&target)) {
                if self.graph.find_edge(a, b).is_none() {
                    self.graph.add_edge(a, b, ());
                }
            }
        }
    }

    fn enclosing_let(&self, node: NodeId) -> Option<DeclId> {
        let mut current = self.parents.get(node);
        while let Some(node) = current {
            if let NodeId::Decl(decl) = node {
                if matches!(self.file.decls[decl].kind, DeclKind::Let(_)) {
                    return Some(self.top_level_let(decl));
                }
            }
            current = self.parents.get(node);
        }
        None
    }

    /// The outermost let declaration enclosing `decl` (itself, when it is
    /// already top level).
    fn top_level_let(&self, decl: DeclId) -> DeclId {
        let mut result = decl;
        let mut current = self.parents.get(NodeId::Decl(decl));
        while let Some(node) = current {
            if let NodeId::Decl(outer) = node {
                if matches!(self.file.decls[outer].kind, DeclKind::Let(_)) {
                    result = outer;
                }
            }
            current = self.parents.get(node);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeTable;
    use tarn_parser::parse;

    fn graph_for(source: &str) -> (SourceFile, ReferenceGraph, Vec<DeclId>) {
        let (file, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let parents = ParentMap::compute(&file);
        let mut scopes = ScopeTable::new();
        let graph = compute_reference_graph(&file, &parents, &mut scopes);
        let decls = collect_let_decls(&file);
        (file, graph, decls)
    }

    #[test]
    fn simple_reference_creates_edge() {
        let (_, graph, decls) = graph_for("let f x = g x\nlet g y = y\n");
        assert!(graph.has_edge(decls[0], decls[1]));
        assert!(!graph.has_edge(decls[1], decls[0]));
    }

    #[test]
    fn parameter_reference_points_at_declaration() {
        let (_, graph, decls) = graph_for("let f x = x\n");
        // `x` resolves to f's parameter, rewritten to f itself.
        assert!(graph.has_edge(decls[0], decls[0]));
    }

    #[test]
    fn mutual_recursion_is_one_group() {
        let (_, graph, decls) = graph_for(
            "let even n =\n  return odd (n - 1)\nlet odd n =\n  return even (n - 1)\n",
        );
        let groups = graph.scc_groups();
        let group = groups
            .iter()
            .find(|g| g.contains(&decls[0]))
            .expect("group for even");
        assert_eq!(group.len(), 2);
        assert!(group.contains(&decls[1]));
    }

    #[test]
    fn groups_come_leaves_first() {
        let (_, graph, decls) = graph_for("let f x = g x\nlet g y = y\n");
        let groups = graph.scc_groups();
        let pos_f = groups.iter().position(|g| g.contains(&decls[0])).unwrap();
        let pos_g = groups.iter().position(|g| g.contains(&decls[1])).unwrap();
        assert!(pos_g < pos_f, "referenced group must come first");
    }

    #[test]
    fn operator_use_creates_edge() {
        let (_, graph, decls) = graph_for("let (<+>) a b = a\nlet f x = x <+> x\n");
        assert!(graph.has_edge(decls[1], decls[0]));
    }

    #[test]
    fn module_lets_are_vertices() {
        let (_, _, decls) = graph_for("module M\n  let inner = 1\nlet outer = inner\n");
        assert_eq!(decls.len(), 2);
    }

    #[test]
    fn unknown_names_create_no_edges() {
        let (_, graph, decls) = graph_for("let f x = frobnicate x\n");
        // Only the parameter self-edge exists.
        assert!(graph.has_edge(decls[0], decls[0]));
        assert_eq!(graph.graph.edge_count(), 1);
    }
}
