//! Module graph resolution
//!
//! Starting from a set of root module names, the resolver walks `requires`
//! edges breadth-first, asking a [`ModuleFinder`] for every module it meets.
//! Reads edges are recorded exactly as declared; a module does not read the
//! dependencies of its dependencies.

use crate::error::ResolutionError;
use crate::graph::ModuleGraph;
use crate::{ModuleConfig, ModuleDescriptor, ModuleFinder};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolve `roots` against `finder` with the default configuration
pub fn resolve<I, S>(roots: I, finder: &dyn ModuleFinder) -> Result<ModuleGraph, ResolutionError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ModuleResolver::new(finder, &ModuleConfig::default()).resolve(roots)
}

/// Builds a [`ModuleGraph`] from root names and a finder
pub struct ModuleResolver<'a> {
    finder: &'a dyn ModuleFinder,
    base_module: Option<String>,
    allow_circular: bool,
}

impl<'a> ModuleResolver<'a> {
    /// Create a resolver using the resolution settings of `config`
    pub fn new(finder: &'a dyn ModuleFinder, config: &ModuleConfig) -> Self {
        Self {
            finder,
            base_module: config.base_module.clone(),
            allow_circular: config.allow_circular,
        }
    }

    /// Resolve the root modules and everything they require.
    ///
    /// Any failure aborts the whole resolution; no partial graph is returned.
    pub fn resolve<I, S>(&self, roots: I) -> Result<ModuleGraph, ResolutionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut found: FxHashMap<String, Arc<ModuleDescriptor>> = FxHashMap::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<(String, Option<String>)> =
            roots.into_iter().map(|r| (r.into(), None)).collect();

        while let Some((name, required_by)) = queue.pop_front() {
            if found.contains_key(&name) {
                continue;
            }

            let descriptor = self
                .finder
                .find(&name)?
                .ok_or_else(|| ResolutionError::ModuleNotFound {
                    name: name.clone(),
                    required_by: required_by.clone(),
                })?;

            if descriptor.name() != name {
                return Err(ResolutionError::NameMismatch {
                    requested: name,
                    found: descriptor.name().to_string(),
                });
            }

            debug!(
                "Resolved module: {}{}",
                name,
                required_by
                    .as_deref()
                    .map(|m| format!(" (required by {})", m))
                    .unwrap_or_default()
            );

            for dep in self.effective_requires(&descriptor) {
                if !found.contains_key(dep) {
                    queue.push_back((dep.to_string(), Some(name.clone())));
                }
            }

            order.push(name.clone());
            found.insert(name, descriptor);
        }

        let mut graph = ModuleGraph::new();
        for name in &order {
            let descriptor = &found[name];
            for dep in self.effective_requires(descriptor) {
                graph.add_read_edge(name, dep);
            }
            graph.add_module(descriptor.clone());
        }

        self.check_targets(&graph)?;

        if !self.allow_circular {
            graph.topological_order()?;
        }

        info!(
            "Resolved {} modules with {} reads edges",
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Declared requirements plus the implicit base module, minus self-requires
    fn effective_requires<'d>(
        &'d self,
        descriptor: &'d ModuleDescriptor,
    ) -> impl Iterator<Item = &'d str> {
        let name = descriptor.name();
        let base = self
            .base_module
            .as_deref()
            .filter(|base| *base != name && !descriptor.requires().contains(*base));
        descriptor
            .requires()
            .iter()
            .map(String::as_str)
            .chain(base)
            .filter(move |dep| *dep != name)
    }

    /// Every qualified export or opens target must be a module of the graph
    fn check_targets(&self, graph: &ModuleGraph) -> Result<(), ResolutionError> {
        for name in graph.module_names() {
            let Some(descriptor) = graph.descriptor(name) else {
                continue;
            };
            for table in [descriptor.exports(), descriptor.opens()] {
                for package in table.packages() {
                    let Some(rule) = table.rule_for(package) else {
                        continue;
                    };
                    if let Some(target) = rule.targets().iter().find(|t| !graph.contains(t)) {
                        return Err(ResolutionError::UnresolvedTarget {
                            module: name.to_string(),
                            package: package.to_string(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
