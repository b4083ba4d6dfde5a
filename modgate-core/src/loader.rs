//! Loader domains and module identities
//!
//! Every class belongs either to a named module or to the unnamed module of
//! the loader domain that defined it. Loader domains never change an access
//! decision; they only tell unnamed modules apart.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Opaque identifier of a class-loading domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderId(pub u32);

impl LoaderId {
    /// The bootstrap domain; modules without an explicit assignment live here
    pub const BOOT: LoaderId = LoaderId(0);
}

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::BOOT {
            write!(f, "boot")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The module a class belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleIdentity {
    /// A named module in the module graph
    Named(String),

    /// The unnamed module of a loader domain
    Unnamed(LoaderId),
}

impl ModuleIdentity {
    /// Identity of the named module `name`
    pub fn named(name: impl Into<String>) -> Self {
        ModuleIdentity::Named(name.into())
    }

    /// Identity of the unnamed module of `loader`
    pub fn unnamed(loader: LoaderId) -> Self {
        ModuleIdentity::Unnamed(loader)
    }

    /// Module name, `None` for unnamed modules
    pub fn name(&self) -> Option<&str> {
        match self {
            ModuleIdentity::Named(name) => Some(name),
            ModuleIdentity::Unnamed(_) => None,
        }
    }

    /// Whether this is a named module
    pub fn is_named(&self) -> bool {
        matches!(self, ModuleIdentity::Named(_))
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleIdentity::Named(name) => write!(f, "module {}", name),
            ModuleIdentity::Unnamed(loader) => write!(f, "unnamed module of loader {}", loader),
        }
    }
}

/// Mapping from module name to loader domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderAssignment {
    loaders: FxHashMap<String, LoaderId>,
}

impl LoaderAssignment {
    /// Create an empty assignment; every module reports the boot loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `module` to `loader`, returning the previous assignment
    pub fn assign(&mut self, module: impl Into<String>, loader: LoaderId) -> Option<LoaderId> {
        self.loaders.insert(module.into(), loader)
    }

    /// Builder-style [`assign`](Self::assign)
    pub fn with(mut self, module: impl Into<String>, loader: LoaderId) -> Self {
        self.assign(module, loader);
        self
    }

    /// Loader of `module`; unassigned modules report [`LoaderId::BOOT`]
    pub fn loader_of(&self, module: &str) -> LoaderId {
        self.loaders.get(module).copied().unwrap_or(LoaderId::BOOT)
    }

    /// Modules explicitly assigned to `loader`, sorted
    pub fn modules_in(&self, loader: LoaderId) -> Vec<&str> {
        let mut modules: Vec<_> = self
            .loaders
            .iter()
            .filter(|(_, l)| **l == loader)
            .map(|(m, _)| m.as_str())
            .collect();
        modules.sort_unstable();
        modules
    }

    /// Every loader with at least one assigned module, plus the boot loader
    pub fn loaders(&self) -> BTreeSet<LoaderId> {
        let mut loaders: BTreeSet<_> = self.loaders.values().copied().collect();
        loaders.insert(LoaderId::BOOT);
        loaders
    }

    /// Classify a class defined by `loader` that reports membership in `module`.
    ///
    /// A class with no module belongs to the unnamed module of its loader; the
    /// same loader always yields an equal identity.
    pub fn classify(&self, module: Option<&str>, loader: LoaderId) -> ModuleIdentity {
        match module {
            Some(name) => {
                let assigned = self.loader_of(name);
                if assigned != loader {
                    warn!(
                        "Class in module {} defined by loader {} but module is assigned to loader {}",
                        name, loader, assigned
                    );
                }
                ModuleIdentity::Named(name.to_string())
            }
            None => ModuleIdentity::Unnamed(loader),
        }
    }
}
