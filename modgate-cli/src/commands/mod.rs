//! Command implementations

pub mod check;
pub mod describe;
pub mod reads;
pub mod resolve;

use anyhow::{bail, Context, Result};
use modgate_core::{
    DirectoryFinder, LoaderAssignment, LoaderId, ModuleConfig, ModuleIdentity, ModuleLayer,
    ModuleLayout,
};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Where the modules of a command come from
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// A JSON layout file, with roots replacing the layout's own when given
    Layout { path: PathBuf, roots: Vec<String> },

    /// Directories of descriptor files plus the root modules to resolve.
    /// No roots means every module found.
    Directories {
        module_path: Vec<PathBuf>,
        roots: Vec<String>,
    },
}

/// Resolve `source` into a layer
pub fn load_layer(source: &ModuleSource, config: &ModuleConfig) -> Result<ModuleLayer> {
    match source {
        ModuleSource::Layout { path, roots } => {
            let mut layout = ModuleLayout::load(path)
                .with_context(|| format!("Failed to load layout {}", path.display()))?;
            if !roots.is_empty() {
                debug!("Overriding layout roots with {:?}", roots);
                layout.roots = roots.clone();
            }
            ModuleLayer::from_layout(&layout, config)
                .with_context(|| format!("Failed to resolve layout {}", path.display()))
        }
        ModuleSource::Directories { module_path, roots } => {
            let mut config = config.clone();
            if !module_path.is_empty() {
                config.search_paths = module_path.clone();
            }
            let finder = DirectoryFinder::new(&config);

            let roots: Vec<String> = if roots.is_empty() {
                finder
                    .module_names()
                    .context("Failed to list the module path")?
                    .into_iter()
                    .collect()
            } else {
                roots.clone()
            };
            if roots.is_empty() {
                bail!("No modules found on the module path");
            }
            debug!("Resolving roots {:?}", roots);

            ModuleLayer::resolve(roots, &finder, &config, LoaderAssignment::new())
                .context("Failed to resolve the module path")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperandError {
    #[error("'{0}' must have the form module/package or unnamed:<loader>/package")]
    Malformed(String),

    #[error("Invalid loader id '{0}'")]
    InvalidLoader(String),
}

/// A package in a module, written `module/package` or `unnamed:<loader>/package`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub identity: ModuleIdentity,
    pub package: String,
}

impl FromStr for Operand {
    type Err = OperandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (module, package) = s
            .split_once('/')
            .filter(|(module, package)| !module.is_empty() && !package.is_empty())
            .ok_or_else(|| OperandError::Malformed(s.to_string()))?;

        let identity = match module.strip_prefix("unnamed:") {
            Some(loader) => {
                let id = loader
                    .parse::<u32>()
                    .map_err(|_| OperandError::InvalidLoader(loader.to_string()))?;
                ModuleIdentity::unnamed(LoaderId(id))
            }
            None => ModuleIdentity::named(module),
        };

        Ok(Operand {
            identity,
            package: package.to_string(),
        })
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "package {} in {}", self.package, self.identity)
    }
}
