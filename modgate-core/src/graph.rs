//! The resolved module graph
//!
//! A [`ModuleGraph`] is produced only by the resolver and is frozen from then
//! on. It owns the descriptors of every resolved module and the direct
//! "reads" relation derived from their `requires` declarations.

use crate::error::ResolutionError;
use crate::ModuleDescriptor;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resolved modules and the reads relation between them
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    /// All modules in the graph
    nodes: FxHashMap<String, Arc<ModuleDescriptor>>,

    /// module -> modules it reads
    reads: FxHashMap<String, BTreeSet<String>>,

    /// module -> modules that read it
    readers: FxHashMap<String, BTreeSet<String>>,
}

impl ModuleGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_module(&mut self, descriptor: Arc<ModuleDescriptor>) {
        self.nodes.insert(descriptor.name().to_string(), descriptor);
    }

    pub(crate) fn add_read_edge(&mut self, from: &str, to: &str) {
        self.reads
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.readers
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    /// Whether `name` is a module of the graph
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Descriptor of `name`
    pub fn descriptor(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.nodes.get(name)
    }

    /// Every module name, sorted
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no modules
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether module `a` reads module `b`. A module in the graph always reads itself.
    pub fn reads(&self, a: &str, b: &str) -> bool {
        if a == b {
            return self.contains(a);
        }
        self.reads.get(a).is_some_and(|targets| targets.contains(b))
    }

    /// Modules read by `a`, sorted (not including `a` itself)
    pub fn reads_of(&self, a: &str) -> impl Iterator<Item = &str> {
        self.reads
            .get(a)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Modules that read `b`, sorted (not including `b` itself)
    pub fn readers_of(&self, b: &str) -> impl Iterator<Item = &str> {
        self.readers
            .get(b)
            .into_iter()
            .flat_map(|sources| sources.iter().map(String::as_str))
    }

    /// The whole reads relation as sorted `(reader, read)` pairs
    pub fn reads_relation(&self) -> Vec<(String, String)> {
        let mut edges: Vec<_> = self
            .reads
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (from.clone(), to.clone())))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Number of reads edges
    pub fn edge_count(&self) -> usize {
        self.reads.values().map(BTreeSet::len).sum()
    }

    /// Modules ordered so that every module comes after the modules it reads.
    ///
    /// Depth-first with an explicit stack of `(module, remaining reads)`
    /// frames, so arbitrarily long requires chains are fine.
    pub fn topological_order(&self) -> Result<Vec<String>, ResolutionError> {
        let mut sorted = Vec::with_capacity(self.nodes.len());
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut on_path: FxHashSet<&str> = FxHashSet::default();
        let mut path = Vec::new();

        for root in self.module_names() {
            if !visited.insert(root) {
                continue;
            }
            on_path.insert(root);
            path.push((root, self.reads_of(root)));

            loop {
                let next = match path.last_mut() {
                    Some((_, reads)) => reads.next(),
                    None => break,
                };
                match next {
                    Some(dep) if on_path.contains(dep) => {
                        let start = path.iter().position(|(m, _)| *m == dep).unwrap_or(0);
                        let mut cycle: Vec<&str> = path[start..].iter().map(|(m, _)| *m).collect();
                        cycle.push(dep);
                        return Err(ResolutionError::CycleDetected {
                            cycle: cycle.join(" -> "),
                        });
                    }
                    Some(dep) => {
                        if visited.insert(dep) {
                            on_path.insert(dep);
                            path.push((dep, self.reads_of(dep)));
                        }
                    }
                    None => {
                        if let Some((done, _)) = path.pop() {
                            on_path.remove(done);
                            sorted.push(done.to_string());
                        }
                    }
                }
            }
        }

        Ok(sorted)
    }
}
