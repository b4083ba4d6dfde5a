//! Module system error types

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for module system results
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors raised while assembling a [`ModuleDescriptor`](crate::ModuleDescriptor).
///
/// These are programmer errors in descriptor assembly and are reported as soon
/// as `build()` runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Module name is empty or not a dot-separated identifier sequence
    #[error("Invalid module name: {name:?}")]
    InvalidModuleName {
        /// The rejected name
        name: String,
    },

    /// Package name is empty or not a dot-separated identifier sequence
    #[error("Invalid package name {package:?} in module {module}")]
    InvalidPackageName {
        /// Module being built
        module: String,
        /// The rejected package name
        package: String,
    },

    /// The same package was exported twice
    #[error("Duplicate export of package {package} in module {module}")]
    DuplicateExport {
        /// Module being built
        module: String,
        /// Package exported more than once
        package: String,
    },

    /// The same package was opened twice
    #[error("Duplicate opens of package {package} in module {module}")]
    DuplicateOpens {
        /// Module being built
        module: String,
        /// Package opened more than once
        package: String,
    },

    /// The same module was required twice
    #[error("Module {module} requires {target} more than once")]
    DuplicateRequires {
        /// Module being built
        module: String,
        /// Repeated requirement
        target: String,
    },

    /// A qualified export or opens was declared with no targets
    #[error("Qualified export of package {package} in module {module} has no targets")]
    EmptyTargets {
        /// Module being built
        module: String,
        /// Package with the empty target list
        package: String,
    },

    /// A package was declared concealed and exported at the same time
    #[error("Package {package} in module {module} is both concealed and exported")]
    ConcealedAndExported {
        /// Module being built
        module: String,
        /// Conflicting package
        package: String,
    },

    /// A package was declared concealed and opened at the same time
    #[error("Package {package} in module {module} is both concealed and opened")]
    ConcealedAndOpened {
        /// Module being built
        module: String,
        /// Conflicting package
        package: String,
    },

    /// `opens` declarations are not permitted in an open module
    #[error("Open module {module} cannot declare opens for package {package}")]
    OpensInOpenModule {
        /// Module being built
        module: String,
        /// Package named by the opens declaration
        package: String,
    },
}

/// Errors reported by a [`ModuleFinder`](crate::ModuleFinder)
#[derive(Error, Debug)]
pub enum FindError {
    /// I/O error while reading a descriptor file
    #[error("IO error reading descriptor {path}: {error}")]
    Io {
        /// Descriptor file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        error: std::io::Error,
    },

    /// Descriptor file is not valid JSON for a descriptor declaration
    #[error("Parse error in descriptor {path}: {error}")]
    Parse {
        /// Descriptor file
        path: PathBuf,
        /// The underlying JSON error
        #[source]
        error: serde_json::Error,
    },

    /// Descriptor file parsed but failed validation
    #[error("Invalid descriptor {path}: {error}")]
    Descriptor {
        /// Descriptor file
        path: PathBuf,
        /// The validation error
        #[source]
        error: DescriptorError,
    },

    /// Module reference or resolved path escapes the search paths
    #[error("Invalid module path: {path}")]
    InvalidPath {
        /// The rejected path
        path: PathBuf,
    },

    /// Two search-path entries define the same module differently
    #[error("Module {name} is defined differently in {first} and {second}")]
    Ambiguous {
        /// Module name
        name: String,
        /// First definition found
        first: PathBuf,
        /// Conflicting definition
        second: PathBuf,
    },
}

/// Fatal errors from [`resolve`](crate::resolve). No partial graph is ever
/// returned alongside one of these.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// A root or required module could not be found
    #[error("Module {name} not found{}", required_by_suffix(.required_by))]
    ModuleNotFound {
        /// Missing module
        name: String,
        /// Module whose `requires` named it, `None` for roots
        required_by: Option<String>,
    },

    /// Two different descriptors claim the same module name
    #[error("Two different definitions of module {name}")]
    DuplicateModule {
        /// Conflicting module name
        name: String,
    },

    /// The finder answered a lookup with a descriptor of another name
    #[error("Finder returned module {found} when asked for {requested}")]
    NameMismatch {
        /// Name looked up
        requested: String,
        /// Name of the descriptor returned
        found: String,
    },

    /// A qualified export or opens names a module absent from the graph
    #[error("Module {module} exports or opens package {package} to unknown module {target}")]
    UnresolvedTarget {
        /// Declaring module
        module: String,
        /// Package of the qualified rule
        package: String,
        /// Target that did not resolve
        target: String,
    },

    /// The requires relation contains a cycle
    #[error("Cycle detected: {cycle}")]
    CycleDetected {
        /// The cycle, rendered as `a -> b -> a`
        cycle: String,
    },

    /// The finder failed
    #[error(transparent)]
    Find(#[from] FindError),
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(module) => format!(", required by {}", module),
        None => String::new(),
    }
}

/// Errors that can occur in the module system
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Descriptor construction failed
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Module graph resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Module is not part of the resolved graph
    #[error("Module {name} is not in the module graph")]
    UnknownModule {
        /// Name looked up
        name: String,
    },

    /// Package is not contained in the module
    #[error("Package {package} is not in module {module}")]
    UnknownPackage {
        /// Module looked up
        module: String,
        /// Package looked up
        package: String,
    },

    /// An access check was denied and the caller asked for it as an error
    #[error("Illegal access: {message}")]
    IllegalAccess {
        /// Diagnostic naming the package and both modules
        message: String,
    },

    /// A module layout file could not be read
    #[error("IO error reading layout {path}: {error}")]
    Io {
        /// Layout file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        error: std::io::Error,
    },

    /// A module layout file is not valid JSON
    #[error("Parse error in layout {path}: {error}")]
    Parse {
        /// Layout file
        path: PathBuf,
        /// The underlying JSON error
        #[source]
        error: serde_json::Error,
    },
}
