//! Module layers
//!
//! A [`ModuleLayer`] is the application-facing bundle of a resolved graph, the
//! loader assignment of its modules and an access checker. It also plays the
//! part of the class-identity resolver: given a class by binary name, defining
//! loader and reported module, it derives the module identity and package the
//! checker needs.

use crate::checker::{Access, AccessChecker};
use crate::error::ResolutionError;
use crate::graph::ModuleGraph;
use crate::loader::{LoaderAssignment, LoaderId, ModuleIdentity};
use crate::resolver::ModuleResolver;
use crate::{InMemoryFinder, ModuleConfig, ModuleDescriptor, ModuleError, ModuleFinder, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A self-contained description of a set of modules, read from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleLayout {
    /// Module every other module implicitly requires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_module: Option<String>,

    /// Root modules; empty means every module of the layout
    #[serde(default)]
    pub roots: Vec<String>,

    /// Module declarations
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,

    /// Loader domain of each module
    #[serde(default)]
    pub loaders: LoaderAssignment,
}

impl ModuleLayout {
    /// Parse a layout from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Read a layout file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;
        Self::from_json(&text).map_err(|e| ModuleError::Parse {
            path: path.to_path_buf(),
            error: e,
        })
    }

    /// A finder over the layout's modules.
    ///
    /// The same module declared twice is accepted only if both declarations
    /// are identical.
    pub fn finder(&self) -> std::result::Result<InMemoryFinder, ResolutionError> {
        InMemoryFinder::try_from_iter(self.modules.iter().cloned())
    }

    /// The configured roots, or every declared module when none are given
    pub fn roots(&self) -> Vec<String> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        let mut names: Vec<_> = self.modules.iter().map(|m| m.name().to_string()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// A class as seen by the access checker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassRef {
    /// Binary name, e.g. `p1.c1`
    pub binary_name: String,
    /// Named module the class reports, `None` for classpath classes
    pub module: Option<String>,
    /// Defining loader domain
    pub loader: LoaderId,
}

impl ClassRef {
    /// A class in a named module
    pub fn in_module(
        binary_name: impl Into<String>,
        module: impl Into<String>,
        loader: LoaderId,
    ) -> Self {
        Self {
            binary_name: binary_name.into(),
            module: Some(module.into()),
            loader,
        }
    }

    /// A class in the unnamed module of `loader`
    pub fn unnamed(binary_name: impl Into<String>, loader: LoaderId) -> Self {
        Self {
            binary_name: binary_name.into(),
            module: None,
            loader,
        }
    }

    /// The class's package; empty for the unnamed package
    pub fn package(&self) -> &str {
        package_of(&self.binary_name)
    }
}

/// Package part of a binary class name; empty for the unnamed package
pub fn package_of(binary_name: &str) -> &str {
    binary_name
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or("")
}

/// A resolved graph with its loaders and checker
#[derive(Debug)]
pub struct ModuleLayer {
    checker: AccessChecker,
    loaders: LoaderAssignment,
}

impl ModuleLayer {
    /// Wrap an already resolved graph
    pub fn new(graph: ModuleGraph, loaders: LoaderAssignment) -> Self {
        for loader in loaders.loaders() {
            for module in loaders.modules_in(loader) {
                if !graph.contains(module) {
                    warn!("Loader {} assigned to module {} which is not in the graph", loader, module);
                }
            }
        }
        Self {
            checker: AccessChecker::new(Arc::new(graph)),
            loaders,
        }
    }

    /// Resolve `roots` with `finder` and wrap the result
    pub fn resolve<I, S>(
        roots: I,
        finder: &dyn ModuleFinder,
        config: &ModuleConfig,
        loaders: LoaderAssignment,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let graph = ModuleResolver::new(finder, config).resolve(roots)?;
        Ok(Self::new(graph, loaders))
    }

    /// Resolve a layout. The layout's `base_module` takes precedence over the
    /// one in `config`.
    pub fn from_layout(layout: &ModuleLayout, config: &ModuleConfig) -> Result<Self> {
        let finder = layout.finder()?;
        let mut config = config.clone();
        if layout.base_module.is_some() {
            config.base_module = layout.base_module.clone();
        }
        debug!("Resolving layout with {} declared modules", layout.modules.len());
        Self::resolve(layout.roots(), &finder, &config, layout.loaders.clone())
    }

    /// The resolved graph
    pub fn graph(&self) -> &ModuleGraph {
        self.checker.graph()
    }

    /// The access checker
    pub fn checker(&self) -> &AccessChecker {
        &self.checker
    }

    /// The loader assignment
    pub fn loaders(&self) -> &LoaderAssignment {
        &self.loaders
    }

    /// Module identity of `class`
    pub fn identify(&self, class: &ClassRef) -> ModuleIdentity {
        self.loaders.classify(class.module.as_deref(), class.loader)
    }

    /// Check that `accessor` may link against `accessee`, as a class loader
    /// would at link time
    pub fn check_class_access(&self, accessor: &ClassRef, accessee: &ClassRef) -> Result<()> {
        let from = self.identify(accessor);
        let to = self.identify(accessee);
        let access = self
            .checker
            .can_access(&from, accessor.package(), &to, accessee.package());
        explain(access, accessor, &from, accessee, &to, "access")
    }

    /// Check that `accessor` may reflect into every member of `accessee`
    pub fn check_reflective_access(&self, accessor: &ClassRef, accessee: &ClassRef) -> Result<()> {
        let from = self.identify(accessor);
        let to = self.identify(accessee);
        let access = self.checker.can_reflect(&from, &to, accessee.package());
        explain(access, accessor, &from, accessee, &to, "reflectively access")
    }

    /// Export `package` of `module` to every unnamed module
    pub fn widen_to_all_unnamed(&self, module: &str, package: &str) -> Result<bool> {
        self.checker.widen_to_all_unnamed(module, package)
    }
}

fn explain(
    access: Access,
    accessor: &ClassRef,
    from: &ModuleIdentity,
    accessee: &ClassRef,
    to: &ModuleIdentity,
    verb: &str,
) -> Result<()> {
    match access {
        Access::Allowed => Ok(()),
        Access::Denied(denial) => Err(ModuleError::IllegalAccess {
            message: format!(
                "class {} (in {}) cannot {} class {} (in {}) because {}",
                accessor.binary_name, from, verb, accessee.binary_name, to, denial.message
            ),
        }),
    }
}
