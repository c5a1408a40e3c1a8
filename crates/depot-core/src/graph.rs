//! Arena-backed dependency graph
//!
//! Nodes are owned by a [`DependencyGraph`] and addressed by [`NodeId`].
//! Children are stored as id lists; the parent link exists for diagnostics and
//! path rendering, never for traversal. Resolution writes back only the
//! resolved artifact slot of a node, at most once.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::artifact::Artifact;
use crate::repository::RemoteRepository;

pub const SCOPE_COMPILE: &str = "compile";
pub const SCOPE_RUNTIME: &str = "runtime";
pub const SCOPE_PROVIDED: &str = "provided";
pub const SCOPE_TEST: &str = "test";
pub const SCOPE_SYSTEM: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A declared dependency: an artifact plus scope and optionality
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    artifact: Artifact,
    scope: String,
    optional: bool,
}

impl Dependency {
    pub fn new(artifact: Artifact, scope: impl Into<String>) -> Self {
        Self {
            artifact,
            scope: scope.into(),
            optional: false,
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.artifact, self.scope)?;
        if self.optional {
            f.write_str("?")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyNode {
    dependency: Option<Dependency>,
    artifact: Option<Artifact>,
    resolved: Option<Artifact>,
    repositories: Vec<RemoteRepository>,
    request_context: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl DependencyNode {
    pub fn from_dependency(dependency: Dependency) -> Self {
        Self {
            artifact: Some(dependency.artifact().clone()),
            dependency: Some(dependency),
            ..Self::default()
        }
    }

    /// Root node for a bare artifact, e.g. the project being built
    pub fn from_artifact(artifact: Artifact) -> Self {
        Self {
            artifact: Some(artifact),
            ..Self::default()
        }
    }

    pub fn with_repositories(mut self, repositories: Vec<RemoteRepository>) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_request_context(mut self, context: impl Into<String>) -> Self {
        self.request_context = context.into();
        self
    }

    pub fn dependency(&self) -> Option<&Dependency> {
        self.dependency.as_ref()
    }

    /// The resolved artifact if set, otherwise the declared one
    pub fn artifact(&self) -> Option<&Artifact> {
        self.resolved.as_ref().or(self.artifact.as_ref())
    }

    pub fn resolved(&self) -> Option<&Artifact> {
        self.resolved.as_ref()
    }

    pub fn repositories(&self) -> &[RemoteRepository] {
        &self.repositories
    }

    pub fn request_context(&self) -> &str {
        &self.request_context
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.dependency, self.artifact()) {
            (Some(dependency), _) => write!(f, "{dependency}"),
            (None, Some(artifact)) => write!(f, "{artifact}"),
            (None, None) => f.write_str("(empty)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
}

impl DependencyGraph {
    pub fn new(root: DependencyNode) -> Self {
        let mut root = root;
        root.parent = None;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn add_child(&mut self, parent: NodeId, node: DependencyNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    /// Panics if `id` belongs to another graph
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&DependencyNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record the resolved artifact for a node; returns false if already set or unknown
    pub fn set_resolved(&mut self, id: NodeId, artifact: Artifact) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) if node.resolved.is_none() => {
                node.resolved = Some(artifact);
                true
            }
            _ => false,
        }
    }

    /// Ids from the root down to `id`, inclusive
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> =
            std::iter::successors(self.get(id).map(|_| id), |n| self.node(*n).parent).collect();
        path.reverse();
        path
    }

    /// Visit every node in preorder with its ancestor chain (outermost first)
    ///
    /// Each node is visited once even if reachable twice.
    pub fn walk(&self, mut visit: impl FnMut(NodeId, &[NodeId])) {
        let mut visited = HashSet::new();
        let mut ancestors = Vec::new();
        self.walk_from(self.root(), &mut ancestors, &mut visited, &mut visit);
    }

    fn walk_from(
        &self,
        id: NodeId,
        ancestors: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
        visit: &mut impl FnMut(NodeId, &[NodeId]),
    ) {
        if !visited.insert(id) {
            return;
        }
        visit(id, ancestors);
        ancestors.push(id);
        for child in self.node(id).children.iter().copied() {
            self.walk_from(child, ancestors, visited, visit);
        }
        ancestors.pop();
    }

    /// Indented tree rendering, one node per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.walk(|id, ancestors| {
            let node = self.node(id);
            out.push_str(&"   ".repeat(ancestors.len()));
            out.push_str(&node.to_string());
            if node.resolved().is_some_and(|a| a.file().is_some()) {
                out.push_str(" [resolved]");
            }
            out.push('\n');
        });
        out
    }
}

/// A dependency that leads back to one of its own ancestors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycle {
    preceding: Vec<Dependency>,
    cycle: Vec<Dependency>,
}

impl DependencyCycle {
    /// `preceding` is the path from the root to the cycle entry, `cycle` the looping part
    pub fn new(preceding: Vec<Dependency>, cycle: Vec<Dependency>) -> Self {
        Self { preceding, cycle }
    }

    pub fn preceding(&self) -> &[Dependency] {
        &self.preceding
    }

    pub fn cycle(&self) -> &[Dependency] {
        &self.cycle
    }
}

impl fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self
            .preceding
            .iter()
            .chain(&self.cycle)
            .map(|d| d.artifact().versionless_key())
            .collect();
        f.write_str(&path.join(" -> "))
    }
}

/// Decide whether a node takes part in artifact resolution
pub trait DependencyFilter: Send + Sync {
    /// `parents` lists the node's ancestors, outermost first
    fn accept(&self, graph: &DependencyGraph, node: NodeId, parents: &[NodeId]) -> bool;
}

impl<F> DependencyFilter for F
where
    F: Fn(&DependencyGraph, NodeId, &[NodeId]) -> bool + Send + Sync,
{
    fn accept(&self, graph: &DependencyGraph, node: NodeId, parents: &[NodeId]) -> bool {
        self(graph, node, parents)
    }
}

/// Accept nodes by dependency scope; nodes without a dependency always pass
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    included: HashSet<String>,
    excluded: HashSet<String>,
}

impl ScopeFilter {
    pub fn new<I, E, S>(included: I, excluded: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included: included.into_iter().map(Into::into).collect(),
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Only the given scopes
    pub fn including<S: Into<String>>(scopes: impl IntoIterator<Item = S>) -> Self {
        Self {
            included: scopes.into_iter().map(Into::into).collect(),
            excluded: HashSet::new(),
        }
    }

    pub fn excluding<S: Into<String>>(scopes: impl IntoIterator<Item = S>) -> Self {
        Self {
            included: HashSet::new(),
            excluded: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

impl DependencyFilter for ScopeFilter {
    fn accept(&self, graph: &DependencyGraph, node: NodeId, _parents: &[NodeId]) -> bool {
        let Some(dependency) = graph.node(node).dependency() else {
            return true;
        };
        let scope = dependency.scope();
        if self.excluded.contains(scope) {
            return false;
        }
        self.included.is_empty() || self.included.contains(scope)
    }
}

/// Accept a node only if every inner filter does
#[derive(Clone, Default)]
pub struct AndFilter {
    filters: Vec<Arc<dyn DependencyFilter>>,
}

impl AndFilter {
    pub fn new(filters: Vec<Arc<dyn DependencyFilter>>) -> Self {
        Self { filters }
    }

    pub fn and(mut self, filter: Arc<dyn DependencyFilter>) -> Self {
        self.filters.push(filter);
        self
    }
}

impl fmt::Debug for AndFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndFilter")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl DependencyFilter for AndFilter {
    fn accept(&self, graph: &DependencyGraph, node: NodeId, parents: &[NodeId]) -> bool {
        self.filters.iter().all(|f| f.accept(graph, node, parents))
    }
}
