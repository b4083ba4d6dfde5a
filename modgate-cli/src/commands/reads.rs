//! Query the reads relation

use colored::*;
use modgate_core::ModuleLayer;

/// Report whether module `a` reads module `b`
pub fn reads(layer: &ModuleLayer, a: &str, b: &str) -> bool {
    let graph = layer.graph();
    for name in [a, b] {
        if !graph.contains(name) {
            println!("  {} module {} is not in the graph", "↳".yellow(), name);
        }
    }

    let reads = graph.reads(a, b);
    if reads {
        println!("{} module {} reads module {}", "✓".green(), a, b);
    } else {
        println!("{} module {} does not read module {}", "✗".red(), a, b);
    }
    reads
}
