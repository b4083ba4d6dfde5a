//! Resolve a set of modules and print the reads graph

use anyhow::Result;
use colored::*;
use modgate_core::ModuleLayer;
use serde_json::json;
use tracing::warn;

/// Print every resolved module with its loader and the modules it reads
pub fn resolve(layer: &ModuleLayer, as_json: bool) -> Result<()> {
    let graph = layer.graph();

    if as_json {
        let modules: Vec<_> = graph
            .module_names()
            .into_iter()
            .map(|name| {
                json!({
                    "name": name,
                    "loader": layer.loaders().loader_of(name),
                    "reads": graph.reads_of(name).collect::<Vec<_>>(),
                })
            })
            .collect();
        let report = json!({
            "modules": modules,
            "edges": graph.edge_count(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let order = match graph.topological_order() {
        Ok(order) => order,
        Err(e) => {
            warn!("{}; listing modules by name", e);
            graph.module_names().into_iter().map(str::to_string).collect()
        }
    };

    println!(
        "{} Resolved {} modules with {} reads edges",
        "✓".green().bold(),
        graph.len(),
        graph.edge_count()
    );
    for name in &order {
        let reads: Vec<_> = graph.reads_of(name).collect();
        let loader = layer.loaders().loader_of(name);
        if reads.is_empty() {
            println!("  {} {}", name.bold(), format!("[loader {}]", loader).dimmed());
        } else {
            println!(
                "  {} {} reads {}",
                name.bold(),
                format!("[loader {}]", loader).dimmed(),
                reads.join(", ")
            );
        }
    }

    Ok(())
}
