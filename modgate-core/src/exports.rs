//! Per-package export and opens rules
//!
//! A module declares rules one at a time as [`ExportKind`] values. Rules for
//! the same package are additive: a package may be exported to a set of named
//! targets and, separately, to every unnamed module. The table folds those
//! declarations into one [`ExportRule`] record per package.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reserved target name standing for every unnamed module
pub const ALL_UNNAMED: &str = "ALL-UNNAMED";

/// A single declared export (or opens) rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    /// Visible to every module that reads the declaring module
    Unqualified,

    /// Visible only to the named modules, which must also read the declaring module
    QualifiedTo(BTreeSet<String>),

    /// Visible to every unnamed module regardless of loader
    ToAllUnnamed,
}

/// The effective rule for one package after folding its declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRule {
    unqualified: bool,
    targets: BTreeSet<String>,
    all_unnamed: bool,
}

impl ExportRule {
    /// Whether the package is visible to every reader
    pub fn is_unqualified(&self) -> bool {
        self.unqualified
    }

    /// Named targets of a qualified rule (empty when unqualified or unnamed-only)
    pub fn targets(&self) -> &BTreeSet<String> {
        &self.targets
    }

    /// Whether every unnamed module has been granted visibility
    pub fn is_to_all_unnamed(&self) -> bool {
        self.all_unnamed
    }

    /// Whether the rule lets the named module `name` see the package, ignoring readability
    pub fn permits_named(&self, name: &str) -> bool {
        self.unqualified || self.targets.contains(name)
    }

    /// Whether the rule lets unnamed modules see the package
    pub fn permits_unnamed(&self) -> bool {
        self.unqualified || self.all_unnamed
    }

    /// The declarations this rule was folded from, in canonical order
    pub fn kinds(&self) -> Vec<ExportKind> {
        let mut kinds = Vec::new();
        if self.unqualified {
            kinds.push(ExportKind::Unqualified);
        }
        if !self.targets.is_empty() {
            kinds.push(ExportKind::QualifiedTo(self.targets.clone()));
        }
        if self.all_unnamed {
            kinds.push(ExportKind::ToAllUnnamed);
        }
        kinds
    }

    fn has_primary(&self) -> bool {
        self.unqualified || !self.targets.is_empty()
    }
}

/// Map from package name to its effective rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    rules: FxHashMap<String, ExportRule>,
}

impl ExportTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration for `package`.
    ///
    /// Returns `false` when the declaration repeats one already made: a second
    /// unqualified or qualified rule, or a second to-all-unnamed rule. The
    /// table is left unchanged in that case.
    pub fn declare(&mut self, package: &str, kind: ExportKind) -> bool {
        let rule = self.rules.entry(package.to_string()).or_default();
        match kind {
            ExportKind::Unqualified => {
                if rule.has_primary() {
                    return false;
                }
                rule.unqualified = true;
            }
            ExportKind::QualifiedTo(targets) => {
                if rule.has_primary() {
                    return false;
                }
                rule.targets = targets;
            }
            ExportKind::ToAllUnnamed => {
                if rule.all_unnamed {
                    return false;
                }
                rule.all_unnamed = true;
            }
        }
        true
    }

    /// Mark `package` visible to all unnamed modules.
    ///
    /// Idempotent; returns whether the table changed.
    pub fn widen_to_all_unnamed(&mut self, package: &str) -> bool {
        let rule = self.rules.entry(package.to_string()).or_default();
        let changed = !rule.all_unnamed;
        rule.all_unnamed = true;
        changed
    }

    /// Rule for `package`, or `None` when the package is concealed
    pub fn rule_for(&self, package: &str) -> Option<&ExportRule> {
        self.rules.get(package)
    }

    /// Whether `package` has any rule
    pub fn contains(&self, package: &str) -> bool {
        self.rules.contains_key(package)
    }

    /// Packages with a rule, sorted
    pub fn packages(&self) -> Vec<&str> {
        let mut packages: Vec<_> = self.rules.keys().map(String::as_str).collect();
        packages.sort_unstable();
        packages
    }

    /// Iterate over `(package, rule)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of packages with a rule
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concealed_by_default() {
        let table = ExportTable::new();
        assert!(table.rule_for("p1").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_qualified_and_unnamed_are_additive() {
        let mut table = ExportTable::new();
        assert!(table.declare("p2", ExportKind::QualifiedTo(targets(&["m3"]))));
        assert!(table.declare("p2", ExportKind::ToAllUnnamed));

        let rule = table.rule_for("p2").unwrap();
        assert!(rule.permits_named("m3"));
        assert!(!rule.permits_named("m1"));
        assert!(rule.permits_unnamed());
        assert_eq!(rule.kinds().len(), 2);
    }

    #[test]
    fn test_duplicate_primary_rejected() {
        let mut table = ExportTable::new();
        assert!(table.declare("p", ExportKind::Unqualified));
        assert!(!table.declare("p", ExportKind::QualifiedTo(targets(&["m"]))));
        assert!(!table.declare("p", ExportKind::Unqualified));

        // The rejected declaration left the rule alone
        let rule = table.rule_for("p").unwrap();
        assert!(rule.is_unqualified());
        assert!(rule.targets().is_empty());
    }

    #[test]
    fn test_widening_is_idempotent() {
        let mut table = ExportTable::new();
        table.declare("p", ExportKind::QualifiedTo(targets(&["m3"])));

        assert!(table.widen_to_all_unnamed("p"));
        assert!(!table.widen_to_all_unnamed("p"));
        assert!(table.rule_for("p").unwrap().is_to_all_unnamed());
    }
}
