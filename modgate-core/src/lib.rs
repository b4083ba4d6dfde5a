//! Modgate Module Access Engine
//!
//! This crate decides which packages of which modules are visible to which
//! other modules, including:
//! - Module descriptors with export and opens rules
//! - Resolution of a module graph from root names and a descriptor finder
//! - Loader domains and unnamed-module identities
//! - Access checks producing structured denials
//! - Post-resolution widening of packages to all unnamed modules

pub mod cache;
pub mod checker;
pub mod descriptor;
pub mod error;
pub mod exports;
pub mod finder;
pub mod graph;
pub mod layer;
pub mod loader;
pub mod resolver;

pub use cache::DescriptorCache;
pub use checker::{Access, AccessChecker, AccessQuery, Denial, DenialKind};
pub use descriptor::{DescriptorDecl, ModuleDescriptor, ModuleDescriptorBuilder, RuleDecl};
pub use error::{DescriptorError, FindError, ModuleError, ResolutionError, Result};
pub use exports::{ExportKind, ExportRule, ExportTable, ALL_UNNAMED};
pub use finder::{ChainFinder, DirectoryFinder, InMemoryFinder, ModuleFinder};
pub use graph::ModuleGraph;
pub use layer::{package_of, ClassRef, ModuleLayer, ModuleLayout};
pub use loader::{LoaderAssignment, LoaderId, ModuleIdentity};
pub use resolver::{resolve, ModuleResolver};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Module system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Search paths for descriptor files
    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,

    /// Whether to cache descriptors read from disk
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Maximum cache size (in number of descriptors)
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Whether to allow cycles in the requires relation
    #[serde(default)]
    pub allow_circular: bool,

    /// Module every other module implicitly requires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_module: Option<String>,
}

fn default_search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("."), PathBuf::from("./modules")]
}

fn default_true() -> bool {
    true
}

fn default_max_cache_size() -> usize {
    1000
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            search_paths: default_search_paths(),
            enable_cache: true,
            max_cache_size: default_max_cache_size(),
            allow_circular: false,
            base_module: None,
        }
    }
}
