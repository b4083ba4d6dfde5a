//! Print a module descriptor

use anyhow::{anyhow, Result};
use modgate_core::ModuleLayer;

/// Print the descriptor of `module` in its JSON declaration form, followed by
/// the loader it is assigned to and the modules that read it
pub fn describe(layer: &ModuleLayer, module: &str) -> Result<()> {
    let graph = layer.graph();
    let descriptor = graph
        .descriptor(module)
        .ok_or_else(|| anyhow!("Module {} is not in the graph", module))?;

    println!("{}", serde_json::to_string_pretty(descriptor.as_ref())?);
    println!("loader: {}", layer.loaders().loader_of(module));

    let readers: Vec<_> = graph.readers_of(module).collect();
    if !readers.is_empty() {
        println!("read by: {}", readers.join(", "));
    }

    let concealed = descriptor.concealed_packages();
    if !concealed.is_empty() {
        let concealed: Vec<_> = concealed.into_iter().collect();
        println!("concealed: {}", concealed.join(", "));
    }

    Ok(())
}
