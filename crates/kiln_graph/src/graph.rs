//! The dependency DAG over an expanded plan.
//!
//! Nodes are targets, identified by a [`TargetId`] equal to their position in
//! the expanded plan. An edge `A -> B` means `B` needs `A` first: `B`
//! references `A`, lists it explicitly, or reads a file `A` declares as output.

use crate::error::GraphError;
use crate::scan::scan;
use kiln_plan::{ExpandedPlan, MissingDependencyError, PlanError};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

/// Opaque, copyable ID of a target in a [`DependencyGraph`].
///
/// IDs follow plan order, so comparing two IDs compares plan positions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct TargetId(u32);

impl TargetId {
    /// Creates an ID from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns the index as `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Why an edge exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Listed in the target's explicit dependencies.
    Explicit,
    /// A `${name}` interpolation.
    Required,
    /// A bare identifier naming the target.
    Reference,
    /// The downstream target reads a file the upstream one produces.
    File,
}

/// A directed edge from an upstream to a downstream target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Upstream target.
    pub from: TargetId,
    /// Downstream target.
    pub to: TargetId,
    /// Why the edge exists (first reason found).
    pub kind: EdgeKind,
}

/// A target as seen by the graph, with its merged file declarations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Node {
    /// The target's ID.
    pub id: TargetId,
    /// The target's name.
    pub name: String,
    /// Declared plus scanned input files.
    pub file_inputs: Vec<PathBuf>,
    /// Declared plus scanned output files.
    pub file_outputs: Vec<PathBuf>,
}

/// An acyclic dependency graph with a fixed topological order.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    upstream: Vec<Vec<TargetId>>,
    downstream: Vec<Vec<TargetId>>,
    order: Vec<TargetId>,
    index: HashMap<String, TargetId>,
    producers: HashMap<PathBuf, TargetId>,
}

impl DependencyGraph {
    /// Builds the graph, resolving relative file paths against the current
    /// directory.
    pub fn build(plan: &ExpandedPlan) -> Result<Self, GraphError> {
        Self::build_in(plan, Path::new("."))
    }

    /// Builds the graph, resolving relative file paths against `root`.
    ///
    /// # Errors
    ///
    /// - [`PlanError::DuplicateOutput`] if two targets produce the same file.
    /// - [`PlanError::Cycle`] if the references form a cycle.
    /// - [`MissingDependencyError`] for undefined required or explicit
    ///   references and for input files that neither exist nor are produced.
    pub fn build_in(plan: &ExpandedPlan, root: &Path) -> Result<Self, GraphError> {
        let targets = plan.targets();
        let mut nodes = Vec::with_capacity(targets.len());
        let mut scans = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            let found = scan(target.text());
            let file_inputs = merge_paths(target.file_inputs(), &found.file_inputs);
            let file_outputs = merge_paths(target.file_outputs(), &found.file_outputs);
            nodes.push(Node {
                id: TargetId(i as u32),
                name: target.name().to_string(),
                file_inputs,
                file_outputs,
            });
            scans.push(found);
        }

        let index: HashMap<String, TargetId> =
            nodes.iter().map(|n| (n.name.clone(), n.id)).collect();

        let mut producers: HashMap<PathBuf, TargetId> = HashMap::new();
        for node in &nodes {
            for path in &node.file_outputs {
                if let Some(&first) = producers.get(path) {
                    if first != node.id {
                        return Err(PlanError::DuplicateOutput {
                            path: path.clone(),
                            first: nodes[first.index()].name.clone(),
                            second: node.name.clone(),
                        }
                        .into());
                    }
                } else {
                    producers.insert(path.clone(), node.id);
                }
            }
        }

        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        let mut add_edge = |from: TargetId, to: TargetId, kind: EdgeKind| {
            if from != to && seen.insert((from, to)) {
                edges.push(Edge { from, to, kind });
            }
        };

        for (i, target) in targets.iter().enumerate() {
            let to = TargetId(i as u32);
            let unknown = |reference: &str| MissingDependencyError::UnknownTarget {
                target: target.name().to_string(),
                reference: reference.to_string(),
            };

            for dep in target.deps() {
                let from = *index.get(dep).ok_or_else(|| unknown(dep))?;
                add_edge(from, to, EdgeKind::Explicit);
            }
            for name in &scans[i].required {
                let from = *index.get(name).ok_or_else(|| unknown(name))?;
                add_edge(from, to, EdgeKind::Required);
            }
            for ident in &scans[i].identifiers {
                if let Some(&from) = index.get(ident) {
                    add_edge(from, to, EdgeKind::Reference);
                }
            }
            for path in &nodes[i].file_inputs {
                match producers.get(path) {
                    Some(&from) => add_edge(from, to, EdgeKind::File),
                    None if root.join(path).exists() => {}
                    None => {
                        return Err(MissingDependencyError::MissingFile {
                            target: target.name().to_string(),
                            path: path.clone(),
                        }
                        .into())
                    }
                }
            }
        }

        let mut upstream = vec![Vec::new(); nodes.len()];
        let mut downstream = vec![Vec::new(); nodes.len()];
        for edge in &edges {
            upstream[edge.to.index()].push(edge.from);
            downstream[edge.from.index()].push(edge.to);
        }
        for list in upstream.iter_mut().chain(downstream.iter_mut()) {
            list.sort();
        }

        if let Some(cycle) = find_cycle(nodes.len(), &edges, &downstream) {
            let targets = cycle
                .into_iter()
                .map(|id| nodes[id.index()].name.clone())
                .collect();
            return Err(PlanError::Cycle { targets }.into());
        }

        let order = topological_order(&upstream, &downstream);
        tracing::debug!(
            targets = nodes.len(),
            edges = edges.len(),
            "built dependency graph"
        );

        Ok(Self {
            nodes,
            edges,
            upstream,
            downstream,
            order,
            index,
            producers,
        })
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no targets.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in plan order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: TargetId) -> &Node {
        &self.nodes[id.index()]
    }

    /// All edges, in discovery order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Looks up a target ID by name.
    pub fn id(&self, name: &str) -> Option<TargetId> {
        self.index.get(name).copied()
    }

    /// Returns a target's name.
    pub fn name(&self, id: TargetId) -> &str {
        &self.nodes[id.index()].name
    }

    /// Direct upstream targets, in plan order.
    pub fn upstream(&self, id: TargetId) -> &[TargetId] {
        &self.upstream[id.index()]
    }

    /// Direct downstream targets, in plan order.
    pub fn downstream(&self, id: TargetId) -> &[TargetId] {
        &self.downstream[id.index()]
    }

    /// All ancestors of `id`, in plan order.
    pub fn transitive_upstream(&self, id: TargetId) -> Vec<TargetId> {
        reachable(id, &self.upstream)
    }

    /// All descendants of `id`, in plan order.
    pub fn transitive_downstream(&self, id: TargetId) -> Vec<TargetId> {
        reachable(id, &self.downstream)
    }

    /// Targets with no upstream dependencies.
    pub fn roots(&self) -> Vec<TargetId> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| self.upstream[id.index()].is_empty())
            .collect()
    }

    /// Targets nothing depends on.
    pub fn leaves(&self) -> Vec<TargetId> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| self.downstream[id.index()].is_empty())
            .collect()
    }

    /// Deterministic topological order; plan order breaks ties.
    pub fn topo_order(&self) -> &[TargetId] {
        &self.order
    }

    /// The target declaring `path` as output, if any.
    pub fn producer(&self, path: &Path) -> Option<TargetId> {
        self.producers.get(&normalize(path)).copied()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn merge_paths(declared: &[PathBuf], scanned: &[PathBuf]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(declared.len() + scanned.len());
    for path in declared.iter().chain(scanned) {
        let path = normalize(path);
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

/// Returns the shortest cycle through the lowest-positioned target of the
/// first cyclic component, closed by repeating its start.
fn find_cycle(len: usize, edges: &[Edge], downstream: &[Vec<TargetId>]) -> Option<Vec<TargetId>> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(len, edges.len());
    for _ in 0..len {
        graph.add_node(());
    }
    for edge in edges {
        graph.add_edge(
            NodeIndex::new(edge.from.index()),
            NodeIndex::new(edge.to.index()),
            (),
        );
    }

    let component = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            scc.into_iter()
                .map(|n| TargetId(n.index() as u32))
                .collect::<HashSet<_>>()
        })
        .min_by_key(|scc| scc.iter().min().copied())?;
    let start = *component.iter().min()?;

    let mut parent: HashMap<TargetId, TargetId> = HashMap::new();
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for &next in &downstream[current.index()] {
            if !component.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = vec![current];
                let mut cursor = current;
                while cursor != start {
                    cursor = parent[&cursor];
                    path.push(cursor);
                }
                path.reverse();
                path.push(start);
                return Some(path);
            }
            if visited.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    Some(vec![start])
}

fn topological_order(upstream: &[Vec<TargetId>], downstream: &[Vec<TargetId>]) -> Vec<TargetId> {
    let mut indegree: Vec<usize> = upstream.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<TargetId>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(TargetId(i as u32)))
        .collect();

    let mut order = Vec::with_capacity(upstream.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &next in &downstream[id.index()] {
            indegree[next.index()] -= 1;
            if indegree[next.index()] == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    order
}

fn reachable(start: TargetId, adjacency: &[Vec<TargetId>]) -> Vec<TargetId> {
    let mut seen = vec![false; adjacency.len()];
    let mut stack = adjacency[start.index()].clone();
    let mut out = Vec::new();
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut seen[id.index()], true) {
            continue;
        }
        out.push(id);
        stack.extend(adjacency[id.index()].iter().copied());
    }
    out.sort();
    out
}
