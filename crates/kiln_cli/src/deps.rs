//! `kiln deps`: the dependency graph in build order.

use kiln_graph::DependencyGraph;

use crate::project::Project;
use crate::{DepsArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln deps` command.
pub fn run(args: &DepsArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = Project::load(global)?;
    let expanded = project.plan()?.expand()?;
    let graph = DependencyGraph::build_in(&expanded, &project.root)?;
    match args.format {
        ReportFormat::Text => {
            for line in text_lines(&graph) {
                println!("{line}");
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&to_json(&graph)?)?);
        }
    }
    Ok(0)
}

/// `name <- up1, up2`, one line per target in topological order.
fn text_lines(graph: &DependencyGraph) -> Vec<String> {
    graph
        .topo_order()
        .iter()
        .map(|&id| {
            let upstream: Vec<&str> = graph.upstream(id).iter().map(|&u| graph.name(u)).collect();
            if upstream.is_empty() {
                graph.name(id).to_string()
            } else {
                format!("{} <- {}", graph.name(id), upstream.join(", "))
            }
        })
        .collect()
}

/// `{"targets": [...], "edges": [...]}`: every node in topological order with
/// its upstream names, then the raw edge list keyed by node id.
fn to_json(graph: &DependencyGraph) -> Result<serde_json::Value, serde_json::Error> {
    let mut targets = Vec::with_capacity(graph.len());
    for &id in graph.topo_order() {
        let mut node = serde_json::to_value(graph.node(id))?;
        let upstream: Vec<&str> = graph.upstream(id).iter().map(|&u| graph.name(u)).collect();
        node["upstream"] = serde_json::json!(upstream);
        targets.push(node);
    }
    Ok(serde_json::json!({
        "targets": targets,
        "edges": serde_json::to_value(graph.edges())?,
    }))
}
