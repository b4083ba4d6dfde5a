//! Access decisions
//!
//! [`AccessChecker`] answers whether code in one module may link against (or
//! reflect into) a package of another module. Decisions are pure lookups over
//! the frozen [`ModuleGraph`] plus a small overlay of packages widened to all
//! unnamed modules after resolution.
//!
//! The overlay is copy-on-write: readers take a snapshot `Arc` and never hold
//! the lock while deciding, writers install a new snapshot under the lock.
//! A check racing a widening call sees either the old or the new snapshot.

use crate::graph::ModuleGraph;
use crate::loader::ModuleIdentity;
use crate::{ExportRule, ModuleError, Result};
use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Why an access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenialKind {
    /// The package is concealed, or exported only to modules other than the accessor
    PackageNotExported,

    /// The package is not opened to the accessor for deep reflection
    PackageNotOpen,

    /// The package is visible in principle but the accessor does not read its module
    NotReadable,
}

/// A denied access with a diagnostic naming the package and both modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// Cause of the denial
    pub kind: DenialKind,
    /// Human-readable diagnostic
    pub message: String,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Access is permitted
    Allowed,
    /// Access is refused
    Denied(Denial),
}

impl Access {
    /// Whether access is permitted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }

    /// The denial, if any
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Access::Allowed => None,
            Access::Denied(denial) => Some(denial),
        }
    }

    /// Kind of the denial, if any
    pub fn denial_kind(&self) -> Option<DenialKind> {
        self.denial().map(|d| d.kind)
    }

    /// Turn a denial into [`ModuleError::IllegalAccess`]
    pub fn into_result(self) -> Result<()> {
        match self {
            Access::Allowed => Ok(()),
            Access::Denied(denial) => Err(ModuleError::IllegalAccess {
                message: denial.message,
            }),
        }
    }
}

/// One access attempt: code in `accessor_package` of `accessor` touching
/// `accessee_package` of `accessee`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessQuery {
    /// Module of the accessing class
    pub accessor: ModuleIdentity,
    /// Package of the accessing class
    pub accessor_package: String,
    /// Module of the accessed class
    pub accessee: ModuleIdentity,
    /// Package of the accessed class
    pub accessee_package: String,
}

impl AccessQuery {
    /// Create a query
    pub fn new(
        accessor: ModuleIdentity,
        accessor_package: impl Into<String>,
        accessee: ModuleIdentity,
        accessee_package: impl Into<String>,
    ) -> Self {
        Self {
            accessor,
            accessor_package: accessor_package.into(),
            accessee,
            accessee_package: accessee_package.into(),
        }
    }
}

/// Packages widened to every unnamed module after resolution, per module
#[derive(Debug, Clone, Default)]
struct Widening {
    exports: FxHashMap<String, FxHashSet<String>>,
    opens: FxHashMap<String, FxHashSet<String>>,
}

impl Widening {
    fn exports_contains(&self, module: &str, package: &str) -> bool {
        self.exports
            .get(module)
            .is_some_and(|packages| packages.contains(package))
    }

    fn opens_contains(&self, module: &str, package: &str) -> bool {
        self.opens
            .get(module)
            .is_some_and(|packages| packages.contains(package))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WideningTable {
    Exports,
    Opens,
}

/// Decides access between modules of one resolved graph
#[derive(Debug)]
pub struct AccessChecker {
    graph: Arc<ModuleGraph>,
    widened: RwLock<Arc<Widening>>,
}

impl AccessChecker {
    /// Create a checker over `graph`
    pub fn new(graph: Arc<ModuleGraph>) -> Self {
        Self {
            graph,
            widened: RwLock::new(Arc::new(Widening::default())),
        }
    }

    /// The module graph this checker consults
    pub fn graph(&self) -> &Arc<ModuleGraph> {
        &self.graph
    }

    fn snapshot(&self) -> Arc<Widening> {
        self.widened.read().clone()
    }

    /// Whether code in `accessor` may link against `accessee_package` of `accessee`.
    ///
    /// `accessor_package` identifies the accessing class but does not affect
    /// the decision.
    pub fn can_access(
        &self,
        accessor: &ModuleIdentity,
        accessor_package: &str,
        accessee: &ModuleIdentity,
        accessee_package: &str,
    ) -> Access {
        let access = self.decide_export(accessor, accessee, accessee_package);
        trace!(
            "Access from {} ({}) to {} ({}): {:?}",
            accessor,
            accessor_package,
            accessee,
            accessee_package,
            access
        );
        access
    }

    /// [`can_access`](Self::can_access) over a query value
    pub fn check(&self, query: &AccessQuery) -> Access {
        self.can_access(
            &query.accessor,
            &query.accessor_package,
            &query.accessee,
            &query.accessee_package,
        )
    }

    /// Check many queries in parallel; results are in query order
    pub fn check_batch(&self, queries: &[AccessQuery]) -> Vec<Access> {
        queries.par_iter().map(|query| self.check(query)).collect()
    }

    fn decide_export(
        &self,
        accessor: &ModuleIdentity,
        accessee: &ModuleIdentity,
        package: &str,
    ) -> Access {
        // A module always sees its own packages
        if accessor == accessee {
            return Access::Allowed;
        }

        let module = match accessee {
            ModuleIdentity::Named(module) => module.as_str(),
            ModuleIdentity::Unnamed(_) => return unnamed_accessee(accessor, accessee),
        };

        let rule = self
            .graph
            .descriptor(module)
            .and_then(|d| d.export_rule_for(package));
        let widened = self.snapshot().exports_contains(module, package);

        match accessor {
            ModuleIdentity::Unnamed(_) => {
                // Unnamed modules read every named module
                if widened || rule.is_some_and(ExportRule::permits_unnamed) {
                    Access::Allowed
                } else {
                    not_exported(accessor, module, package)
                }
            }
            ModuleIdentity::Named(name) => {
                if !rule.is_some_and(|r| r.permits_named(name)) {
                    not_exported(accessor, module, package)
                } else if self.graph.reads(name, module) {
                    Access::Allowed
                } else {
                    not_readable(accessor, accessee)
                }
            }
        }
    }

    /// Whether code in `accessor` may reflect into every member of the types
    /// in `accessee_package` of `accessee`, as granted by `opens` rules or an
    /// open module
    pub fn can_reflect(
        &self,
        accessor: &ModuleIdentity,
        accessee: &ModuleIdentity,
        accessee_package: &str,
    ) -> Access {
        if accessor == accessee {
            return Access::Allowed;
        }

        let module = match accessee {
            ModuleIdentity::Named(module) => module.as_str(),
            ModuleIdentity::Unnamed(_) => return unnamed_accessee(accessor, accessee),
        };

        let descriptor = self.graph.descriptor(module);
        let open_module = descriptor
            .is_some_and(|d| d.is_open() && d.contains_package(accessee_package));
        let rule = descriptor.and_then(|d| d.opens_rule_for(accessee_package));
        let widened = self.snapshot().opens_contains(module, accessee_package);

        let access = match accessor {
            ModuleIdentity::Unnamed(_) => {
                if open_module || widened || rule.is_some_and(ExportRule::permits_unnamed) {
                    Access::Allowed
                } else {
                    not_open(accessor, module, accessee_package)
                }
            }
            ModuleIdentity::Named(name) => {
                if !(open_module || rule.is_some_and(|r| r.permits_named(name))) {
                    not_open(accessor, module, accessee_package)
                } else if self.graph.reads(name, module) {
                    Access::Allowed
                } else {
                    not_readable(accessor, accessee)
                }
            }
        };
        trace!(
            "Reflective access from {} to {} ({}): {:?}",
            accessor,
            accessee,
            accessee_package,
            access
        );
        access
    }

    /// Export `package` of `module` to every unnamed module.
    ///
    /// Monotonic and idempotent: returns `true` only when the call changed
    /// what unnamed modules can see. Every check started after this returns
    /// observes the widened state.
    pub fn widen_to_all_unnamed(&self, module: &str, package: &str) -> Result<bool> {
        let already = self
            .graph
            .descriptor(module)
            .and_then(|d| d.export_rule_for(package))
            .is_some_and(ExportRule::permits_unnamed);
        self.widen(WideningTable::Exports, module, package, already)
    }

    /// Open `package` of `module` to every unnamed module for deep reflection
    pub fn widen_opens_to_all_unnamed(&self, module: &str, package: &str) -> Result<bool> {
        let already = self.graph.descriptor(module).is_some_and(|d| {
            d.is_open()
                || d.opens_rule_for(package)
                    .is_some_and(ExportRule::permits_unnamed)
        });
        self.widen(WideningTable::Opens, module, package, already)
    }

    fn widen(
        &self,
        table: WideningTable,
        module: &str,
        package: &str,
        already_visible: bool,
    ) -> Result<bool> {
        let descriptor = self
            .graph
            .descriptor(module)
            .ok_or_else(|| ModuleError::UnknownModule {
                name: module.to_string(),
            })?;
        if !descriptor.contains_package(package) {
            return Err(ModuleError::UnknownPackage {
                module: module.to_string(),
                package: package.to_string(),
            });
        }
        if already_visible {
            return Ok(false);
        }

        let mut guard = self.widened.write();
        let present = match table {
            WideningTable::Exports => guard.exports_contains(module, package),
            WideningTable::Opens => guard.opens_contains(module, package),
        };
        if present {
            return Ok(false);
        }

        let mut next = (**guard).clone();
        let packages = match table {
            WideningTable::Exports => &mut next.exports,
            WideningTable::Opens => &mut next.opens,
        };
        packages
            .entry(module.to_string())
            .or_default()
            .insert(package.to_string());
        *guard = Arc::new(next);

        debug!(
            "Widened {} of package {} in module {} to all unnamed modules",
            match table {
                WideningTable::Exports => "exports",
                WideningTable::Opens => "opens",
            },
            package,
            module
        );
        Ok(true)
    }

    /// Whether `package` of `module` has been widened to all unnamed modules
    /// through [`widen_to_all_unnamed`](Self::widen_to_all_unnamed)
    pub fn is_widened(&self, module: &str, package: &str) -> bool {
        self.snapshot().exports_contains(module, package)
    }

    /// Packages of `module` widened after resolution, sorted
    pub fn widened_packages(&self, module: &str) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut packages: Vec<_> = snapshot
            .exports
            .get(module)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default();
        packages.sort_unstable();
        packages
    }
}

/// Every package of an unnamed module is exported and open, but only
/// unnamed modules read it
fn unnamed_accessee(accessor: &ModuleIdentity, accessee: &ModuleIdentity) -> Access {
    match accessor {
        ModuleIdentity::Unnamed(_) => Access::Allowed,
        ModuleIdentity::Named(_) => not_readable(accessor, accessee),
    }
}

fn not_exported(accessor: &ModuleIdentity, module: &str, package: &str) -> Access {
    Access::Denied(Denial {
        kind: DenialKind::PackageNotExported,
        message: format!(
            "package {} in module {} does not export to {}",
            package, module, accessor
        ),
    })
}

fn not_open(accessor: &ModuleIdentity, module: &str, package: &str) -> Access {
    Access::Denied(Denial {
        kind: DenialKind::PackageNotOpen,
        message: format!(
            "package {} in module {} does not open to {}",
            package, module, accessor
        ),
    })
}

fn not_readable(accessor: &ModuleIdentity, accessee: &ModuleIdentity) -> Access {
    Access::Denied(Denial {
        kind: DenialKind::NotReadable,
        message: format!("{} does not read {}", accessor, accessee),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderId;
    use crate::{resolve, InMemoryFinder, ModuleDescriptor};

    fn named(name: &str) -> ModuleIdentity {
        ModuleIdentity::named(name)
    }

    fn checker(modules: Vec<ModuleDescriptor>, roots: &[&str]) -> AccessChecker {
        let finder = InMemoryFinder::try_from_iter(modules).unwrap();
        let graph = resolve(roots.iter().copied(), &finder).unwrap();
        AccessChecker::new(Arc::new(graph))
    }

    #[test]
    fn test_self_access_ignores_exports() {
        let checker = checker(
            vec![ModuleDescriptor::builder("m1").conceals("p1").build().unwrap()],
            &["m1"],
        );
        assert!(checker
            .can_access(&named("m1"), "p1", &named("m1"), "p1")
            .is_allowed());
    }

    #[test]
    fn test_unqualified_export_needs_readability() {
        let checker = checker(
            vec![
                ModuleDescriptor::builder("m1").build().unwrap(),
                ModuleDescriptor::builder("m2").exports("p2").build().unwrap(),
            ],
            &["m1", "m2"],
        );

        let access = checker.can_access(&named("m1"), "p1", &named("m2"), "p2");
        assert_eq!(access.denial_kind(), Some(DenialKind::NotReadable));
        assert_eq!(
            access.denial().unwrap().message,
            "module m1 does not read module m2"
        );
    }

    #[test]
    fn test_not_exported_message() {
        let checker = checker(
            vec![
                ModuleDescriptor::builder("m1").requires("m2").build().unwrap(),
                ModuleDescriptor::builder("m2").conceals("p6").build().unwrap(),
            ],
            &["m1"],
        );

        let access = checker.can_access(&named("m1"), "p1", &named("m2"), "p6");
        assert_eq!(
            access.denial().unwrap().message,
            "package p6 in module m2 does not export to module m1"
        );
    }

    #[test]
    fn test_unnamed_accessee_read_only_by_unnamed() {
        let checker = checker(vec![ModuleDescriptor::builder("m1").build().unwrap()], &["m1"]);
        let unnamed = ModuleIdentity::unnamed(LoaderId(1));
        let other_unnamed = ModuleIdentity::unnamed(LoaderId(2));

        assert!(checker
            .can_access(&other_unnamed, "q", &unnamed, "p")
            .is_allowed());
        assert_eq!(
            checker
                .can_access(&named("m1"), "p1", &unnamed, "p")
                .denial_kind(),
            Some(DenialKind::NotReadable)
        );
    }

    #[test]
    fn test_widen_unknown_module_or_package() {
        let checker = checker(
            vec![ModuleDescriptor::builder("m2").conceals("p2").build().unwrap()],
            &["m2"],
        );

        assert!(matches!(
            checker.widen_to_all_unnamed("nope", "p2"),
            Err(ModuleError::UnknownModule { .. })
        ));
        assert!(matches!(
            checker.widen_to_all_unnamed("m2", "nope"),
            Err(ModuleError::UnknownPackage { .. })
        ));
        assert!(checker.widen_to_all_unnamed("m2", "p2").unwrap());
        assert_eq!(checker.widened_packages("m2"), vec!["p2"]);
    }

    #[test]
    fn test_widening_already_visible_package_is_a_no_op() {
        let checker = checker(
            vec![ModuleDescriptor::builder("m2").exports("p2").build().unwrap()],
            &["m2"],
        );
        assert!(!checker.widen_to_all_unnamed("m2", "p2").unwrap());
        assert!(!checker.is_widened("m2", "p2"));
    }

    #[test]
    fn test_into_result() {
        let checker = checker(
            vec![ModuleDescriptor::builder("m2").conceals("p2").build().unwrap()],
            &["m2"],
        );
        let err = checker
            .can_access(&ModuleIdentity::unnamed(LoaderId(1)), "q", &named("m2"), "p2")
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("does not export"));
    }
}
