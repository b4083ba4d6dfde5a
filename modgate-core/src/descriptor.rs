//! Module descriptors
//!
//! A [`ModuleDescriptor`] is the static contract of one module: its name, the
//! modules it requires, and the export and opens rules of its packages.
//! Descriptors are validated once by [`ModuleDescriptorBuilder::build`] and are
//! immutable afterwards. They serialize to and from the JSON declaration form
//! read by the directory finder and module layouts.

use crate::error::DescriptorError;
use crate::exports::{ExportKind, ExportRule, ExportTable, ALL_UNNAMED};
use crate::{ModuleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Immutable description of one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DescriptorDecl", into = "DescriptorDecl")]
pub struct ModuleDescriptor {
    name: String,
    open: bool,
    requires: BTreeSet<String>,
    exports: ExportTable,
    opens: ExportTable,
    packages: BTreeSet<String>,
}

impl ModuleDescriptor {
    /// Start building a descriptor for the module `name`
    pub fn builder(name: impl Into<String>) -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder::new(name)
    }

    /// The module's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is an open module (every package open for deep reflection)
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Names of the modules this module requires, as declared
    pub fn requires(&self) -> &BTreeSet<String> {
        &self.requires
    }

    /// The export table
    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    /// The opens table
    pub fn opens(&self) -> &ExportTable {
        &self.opens
    }

    /// Every package contained in the module
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    /// Whether the module contains `package`
    pub fn contains_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    /// Export rule for `package`; `None` means the package is concealed
    /// (or not in the module at all, which is treated the same way)
    pub fn export_rule_for(&self, package: &str) -> Option<&ExportRule> {
        self.exports.rule_for(package)
    }

    /// Opens rule for `package`; `None` means no explicit opens declaration
    pub fn opens_rule_for(&self, package: &str) -> Option<&ExportRule> {
        self.opens.rule_for(package)
    }

    /// Packages in the module that are neither exported nor opened
    pub fn concealed_packages(&self) -> BTreeSet<&str> {
        self.packages
            .iter()
            .map(String::as_str)
            .filter(|p| !self.exports.contains(p) && !(self.open || self.opens.contains(p)))
            .collect()
    }

    /// A copy of this descriptor whose `package` is additionally exported to
    /// all unnamed modules. The receiver is left untouched.
    pub fn with_exports_to_all_unnamed(&self, package: &str) -> Result<ModuleDescriptor> {
        if !self.contains_package(package) {
            return Err(ModuleError::UnknownPackage {
                module: self.name.clone(),
                package: package.to_string(),
            });
        }
        let mut widened = self.clone();
        widened.exports.widen_to_all_unnamed(package);
        Ok(widened)
    }

    /// The declaration form of this descriptor, with entries in sorted order
    pub fn to_decl(&self) -> DescriptorDecl {
        DescriptorDecl {
            name: self.name.clone(),
            open: self.open,
            requires: self.requires.iter().cloned().collect(),
            exports: rule_decls(&self.exports),
            opens: rule_decls(&self.opens),
            packages: self.packages.iter().cloned().collect(),
            concealed: Vec::new(),
        }
    }
}

fn rule_decls(table: &ExportTable) -> Vec<RuleDecl> {
    let mut decls = Vec::new();
    for package in table.packages() {
        let Some(rule) = table.rule_for(package) else {
            continue;
        };
        for kind in rule.kinds() {
            let to = match kind {
                ExportKind::Unqualified => None,
                ExportKind::QualifiedTo(targets) => Some(targets.into_iter().collect()),
                ExportKind::ToAllUnnamed => Some(vec![ALL_UNNAMED.to_string()]),
            };
            decls.push(RuleDecl {
                package: package.to_string(),
                to,
            });
        }
    }
    decls
}

/// JSON declaration of a module, as found in descriptor files and layouts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorDecl {
    /// Module name
    pub name: String,

    /// Whether the module is open
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub open: bool,

    /// Required module names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    /// Export declarations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<RuleDecl>,

    /// Opens declarations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opens: Vec<RuleDecl>,

    /// Additional packages contained in the module
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,

    /// Packages explicitly declared concealed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concealed: Vec<String>,
}

/// One `exports` or `opens` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
    /// Package the rule applies to
    pub package: String,

    /// Target modules; absent means unqualified, `ALL-UNNAMED` means every unnamed module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<String>>,
}

impl TryFrom<DescriptorDecl> for ModuleDescriptor {
    type Error = DescriptorError;

    fn try_from(decl: DescriptorDecl) -> std::result::Result<Self, Self::Error> {
        let mut builder = ModuleDescriptor::builder(decl.name);
        if decl.open {
            builder = builder.open_module();
        }
        for required in decl.requires {
            builder = builder.requires(required);
        }
        for export in decl.exports {
            builder = match export.to {
                None => builder.exports(export.package),
                Some(targets) => builder.exports_to(export.package, targets),
            };
        }
        for opens in decl.opens {
            builder = match opens.to {
                None => builder.opens(opens.package),
                Some(targets) => builder.opens_to(opens.package, targets),
            };
        }
        for package in decl.packages {
            builder = builder.package(package);
        }
        for package in decl.concealed {
            builder = builder.conceals(package);
        }
        builder.build()
    }
}

impl From<ModuleDescriptor> for DescriptorDecl {
    fn from(descriptor: ModuleDescriptor) -> Self {
        descriptor.to_decl()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleTable {
    Exports,
    Opens,
}

#[derive(Debug, Clone)]
enum Target {
    All,
    Some(Vec<String>),
}

/// Builder for [`ModuleDescriptor`]; all validation happens in [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct ModuleDescriptorBuilder {
    name: String,
    open: bool,
    requires: Vec<String>,
    rules: Vec<(RuleTable, String, Target)>,
    packages: Vec<String>,
    concealed: Vec<String>,
}

impl ModuleDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: false,
            requires: Vec::new(),
            rules: Vec::new(),
            packages: Vec::new(),
            concealed: Vec::new(),
        }
    }

    /// Declare the module open
    pub fn open_module(mut self) -> Self {
        self.open = true;
        self
    }

    /// Require (read) another module
    pub fn requires(mut self, module: impl Into<String>) -> Self {
        self.requires.push(module.into());
        self
    }

    /// Export `package` to every reader
    pub fn exports(mut self, package: impl Into<String>) -> Self {
        self.rules.push((RuleTable::Exports, package.into(), Target::All));
        self
    }

    /// Export `package` to the listed modules. `ALL-UNNAMED` among the targets
    /// adds a to-all-unnamed rule.
    pub fn exports_to<I, S>(mut self, package: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = targets.into_iter().map(Into::into).collect();
        self.rules
            .push((RuleTable::Exports, package.into(), Target::Some(targets)));
        self
    }

    /// Export `package` to every unnamed module
    pub fn exports_to_all_unnamed(self, package: impl Into<String>) -> Self {
        self.exports_to(package, [ALL_UNNAMED])
    }

    /// Open `package` for deep reflection by every reader
    pub fn opens(mut self, package: impl Into<String>) -> Self {
        self.rules.push((RuleTable::Opens, package.into(), Target::All));
        self
    }

    /// Open `package` for deep reflection by the listed modules
    pub fn opens_to<I, S>(mut self, package: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = targets.into_iter().map(Into::into).collect();
        self.rules
            .push((RuleTable::Opens, package.into(), Target::Some(targets)));
        self
    }

    /// Declare a package contained in the module without any rule
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.packages.push(package.into());
        self
    }

    /// Declare a package contained in the module that must stay concealed
    pub fn conceals(mut self, package: impl Into<String>) -> Self {
        self.concealed.push(package.into());
        self
    }

    /// Validate the declarations and produce the descriptor
    pub fn build(self) -> std::result::Result<ModuleDescriptor, DescriptorError> {
        if !is_valid_name(&self.name) {
            return Err(DescriptorError::InvalidModuleName { name: self.name });
        }
        let module = self.name;

        let mut requires = BTreeSet::new();
        for target in self.requires {
            if !is_valid_name(&target) {
                return Err(DescriptorError::InvalidModuleName { name: target });
            }
            if !requires.insert(target.clone()) {
                return Err(DescriptorError::DuplicateRequires { module, target });
            }
        }

        let mut packages = BTreeSet::new();
        let mut exports = ExportTable::new();
        let mut opens = ExportTable::new();

        for (table, package, target) in self.rules {
            if !is_valid_name(&package) {
                return Err(DescriptorError::InvalidPackageName { module, package });
            }
            if table == RuleTable::Opens && self.open {
                return Err(DescriptorError::OpensInOpenModule { module, package });
            }

            let kinds = match target {
                Target::All => vec![ExportKind::Unqualified],
                Target::Some(targets) => split_targets(&module, &package, targets)?,
            };

            let rules = match table {
                RuleTable::Exports => &mut exports,
                RuleTable::Opens => &mut opens,
            };
            for kind in kinds {
                if !rules.declare(&package, kind) {
                    return Err(match table {
                        RuleTable::Exports => DescriptorError::DuplicateExport { module, package },
                        RuleTable::Opens => DescriptorError::DuplicateOpens { module, package },
                    });
                }
            }
            packages.insert(package);
        }

        for package in self.packages {
            if !is_valid_name(&package) {
                return Err(DescriptorError::InvalidPackageName { module, package });
            }
            packages.insert(package);
        }

        for package in self.concealed {
            if !is_valid_name(&package) {
                return Err(DescriptorError::InvalidPackageName { module, package });
            }
            if exports.contains(&package) {
                return Err(DescriptorError::ConcealedAndExported { module, package });
            }
            if opens.contains(&package) {
                return Err(DescriptorError::ConcealedAndOpened { module, package });
            }
            packages.insert(package);
        }

        Ok(ModuleDescriptor {
            name: module,
            open: self.open,
            requires,
            exports,
            opens,
            packages,
        })
    }
}

/// Turn a qualified target list into rule kinds, pulling out `ALL-UNNAMED`
fn split_targets(
    module: &str,
    package: &str,
    targets: Vec<String>,
) -> std::result::Result<Vec<ExportKind>, DescriptorError> {
    if targets.is_empty() {
        return Err(DescriptorError::EmptyTargets {
            module: module.to_string(),
            package: package.to_string(),
        });
    }

    let mut all_unnamed = false;
    let mut named = BTreeSet::new();
    for target in targets {
        if target == ALL_UNNAMED {
            all_unnamed = true;
        } else if is_valid_name(&target) {
            named.insert(target);
        } else {
            return Err(DescriptorError::InvalidModuleName { name: target });
        }
    }

    let mut kinds = Vec::with_capacity(2);
    if !named.is_empty() {
        kinds.push(ExportKind::QualifiedTo(named));
    }
    if all_unnamed {
        kinds.push(ExportKind::ToAllUnnamed);
    }
    Ok(kinds)
}

/// Whether `name` is a legal module or package name: one or more
/// dot-separated identifiers
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_identifier)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
