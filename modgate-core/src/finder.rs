//! Descriptor finders
//!
//! The resolver asks a [`ModuleFinder`] for each module name it encounters.
//! [`InMemoryFinder`] serves descriptors assembled in code, [`DirectoryFinder`]
//! reads JSON descriptor files from search paths and [`ChainFinder`] consults
//! several finders in order.

use crate::cache::DescriptorCache;
use crate::descriptor::{is_valid_name, DescriptorDecl};
use crate::error::{FindError, ResolutionError};
use crate::{ModuleConfig, ModuleDescriptor};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{info, trace, warn};

/// Supplies module descriptors by name during resolution
pub trait ModuleFinder: Send + Sync {
    /// Find the descriptor of `name`; `Ok(None)` when the module is unknown
    fn find(&self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>, FindError>;
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for Arc<F> {
    fn find(&self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>, FindError> {
        (**self).find(name)
    }
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for Box<F> {
    fn find(&self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>, FindError> {
        (**self).find(name)
    }
}

/// Finder over descriptors held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryFinder {
    modules: FxHashMap<String, Arc<ModuleDescriptor>>,
}

impl InMemoryFinder {
    /// Create an empty finder
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a finder from `descriptors`, rejecting conflicting definitions
    /// of the same module
    pub fn try_from_iter<I>(descriptors: I) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        let mut finder = Self::new();
        for descriptor in descriptors {
            finder.add(descriptor)?;
        }
        Ok(finder)
    }

    /// Add a descriptor.
    ///
    /// A second declaration of the same module is accepted only if it is
    /// identical to the first; returns whether the module was new.
    pub fn add(&mut self, descriptor: ModuleDescriptor) -> Result<bool, ResolutionError> {
        match self.modules.get(descriptor.name()) {
            Some(existing) if **existing != descriptor => Err(ResolutionError::DuplicateModule {
                name: descriptor.name().to_string(),
            }),
            Some(_) => {
                warn!("Module {} declared twice with identical content", descriptor.name());
                Ok(false)
            }
            None => {
                self.modules
                    .insert(descriptor.name().to_string(), Arc::new(descriptor));
                Ok(true)
            }
        }
    }

    /// Builder-style [`add`](Self::add)
    pub fn with(mut self, descriptor: ModuleDescriptor) -> Result<Self, ResolutionError> {
        self.add(descriptor)?;
        Ok(self)
    }

    /// Names of every descriptor held, sorted
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ModuleFinder for InMemoryFinder {
    fn find(&self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>, FindError> {
        Ok(self.modules.get(name).cloned())
    }
}

/// Finder reading `<name>.json` or `<name>/module.json` from search paths
pub struct DirectoryFinder {
    search_paths: Vec<PathBuf>,
    cache: Option<DescriptorCache>,
}

impl DirectoryFinder {
    /// Create a finder using the search paths and cache settings of `config`
    pub fn new(config: &ModuleConfig) -> Self {
        let cache = config
            .enable_cache
            .then(|| DescriptorCache::new(config.max_cache_size));
        Self {
            search_paths: config.search_paths.clone(),
            cache,
        }
    }

    /// The descriptor cache, if caching is enabled
    pub fn cache(&self) -> Option<&DescriptorCache> {
        self.cache.as_ref()
    }

    /// Names of every module with a descriptor file directly under a search path
    pub fn module_names(&self) -> Result<BTreeSet<String>, FindError> {
        let mut names = BTreeSet::new();
        for search_path in &self.search_paths {
            let entries = match fs::read_dir(search_path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(error) => {
                    return Err(FindError::Io {
                        path: search_path.clone(),
                        error,
                    })
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let candidate = if path.is_dir() {
                    path.join("module.json")
                        .exists()
                        .then(|| path.file_name().map(|n| n.to_string_lossy().to_string()))
                        .flatten()
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().map(|n| n.to_string_lossy().to_string())
                } else {
                    None
                };
                if let Some(name) = candidate.filter(|n| is_valid_name(n)) {
                    names.insert(name);
                }
            }
        }
        Ok(names)
    }

    /// Reject module references that could escape the search paths
    fn validate_module_ref(&self, name: &str) -> Result<(), FindError> {
        if name.contains('\0') || name.contains('/') || name.contains('\\') {
            warn!("Rejected module reference with path characters: {:?}", name);
            return Err(FindError::InvalidPath {
                path: PathBuf::from(name),
            });
        }
        if !is_valid_name(name) {
            warn!("Rejected malformed module reference: {:?}", name);
            return Err(FindError::InvalidPath {
                path: PathBuf::from(name),
            });
        }
        Ok(())
    }

    /// Candidate descriptor files for `name`, in search-path order
    fn candidate_paths(&self, name: &str) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for search_path in &self.search_paths {
            let file_path = search_path.join(format!("{}.json", name));
            if file_path.is_file() {
                trace!("Found descriptor at: {:?}", file_path);
                found.push(file_path);
                continue;
            }

            let dir_path = search_path.join(name).join("module.json");
            if dir_path.is_file() {
                trace!("Found descriptor at: {:?}", dir_path);
                found.push(dir_path);
            }
        }
        found
    }

    /// Validate that a resolved path is within the search paths
    fn validate_resolved_path(&self, path: &Path) -> Result<PathBuf, FindError> {
        let canonical_path = path.canonicalize().map_err(|e| FindError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        let within_search_path = self.search_paths.iter().any(|search_path| {
            search_path
                .canonicalize()
                .map(|canonical| canonical_path.starts_with(canonical))
                .unwrap_or(false)
        });
        if !within_search_path {
            warn!("Descriptor path {:?} is outside allowed search paths", canonical_path);
            return Err(FindError::InvalidPath {
                path: canonical_path,
            });
        }

        if canonical_path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            warn!("Path contains parent directory component: {:?}", canonical_path);
            return Err(FindError::InvalidPath {
                path: canonical_path,
            });
        }

        Ok(canonical_path)
    }

    fn read_descriptor(&self, path: &Path) -> Result<ModuleDescriptor, FindError> {
        let contents = fs::read_to_string(path).map_err(|e| FindError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;
        let decl: DescriptorDecl =
            serde_json::from_str(&contents).map_err(|e| FindError::Parse {
                path: path.to_path_buf(),
                error: e,
            })?;
        ModuleDescriptor::try_from(decl).map_err(|e| FindError::Descriptor {
            path: path.to_path_buf(),
            error: e,
        })
    }

    /// Parsed descriptor at the canonical `path`, reusing the cache while the
    /// file is unchanged
    fn load(&self, path: &Path) -> Result<Arc<ModuleDescriptor>, FindError> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        if let Some(descriptor) = self.cache.as_ref().and_then(|c| c.get(path, modified)) {
            return Ok(descriptor);
        }

        let descriptor = Arc::new(self.read_descriptor(path)?);
        info!("Loaded module descriptor: {} ({})", descriptor.name(), path.display());
        if let Some(cache) = &self.cache {
            cache.insert(path.to_path_buf(), modified, descriptor.clone());
        }
        Ok(descriptor)
    }
}

impl ModuleFinder for DirectoryFinder {
    fn find(&self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>, FindError> {
        self.validate_module_ref(name)?;

        let mut found: Option<(PathBuf, Arc<ModuleDescriptor>)> = None;
        for candidate in self.candidate_paths(name) {
            let path = self.validate_resolved_path(&candidate)?;
            let descriptor = self.load(&path)?;
            match &found {
                None => found = Some((path, descriptor)),
                Some((first, existing)) => {
                    if **existing != *descriptor {
                        return Err(FindError::Ambiguous {
                            name: name.to_string(),
                            first: first.clone(),
                            second: path,
                        });
                    }
                    trace!("Identical descriptor for {} also at {:?}", name, path);
                }
            }
        }

        Ok(found.map(|(_, descriptor)| descriptor))
    }
}

/// Consults several finders in order; the first that knows a name wins
#[derive(Default)]
pub struct ChainFinder {
    finders: Vec<Box<dyn ModuleFinder>>,
}

impl ChainFinder {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finder to the chain
    pub fn then(mut self, finder: impl ModuleFinder + 'static) -> Self {
        self.finders.push(Box::new(finder));
        self
    }
}

impl ModuleFinder for ChainFinder {
    fn find(&self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>, FindError> {
        for finder in &self.finders {
            if let Some(descriptor) = finder.find(name)? {
                return Ok(Some(descriptor));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_descriptor(dir: &Path, file: &str, content: &str) -> PathBuf {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn finder_for(paths: Vec<PathBuf>) -> DirectoryFinder {
        DirectoryFinder::new(&ModuleConfig {
            search_paths: paths,
            ..Default::default()
        })
    }

    #[test]
    fn test_in_memory_finder() {
        let finder = InMemoryFinder::try_from_iter(vec![
            ModuleDescriptor::builder("m1").build().unwrap(),
            ModuleDescriptor::builder("m2").build().unwrap(),
        ])
        .unwrap();

        assert!(finder.find("m1").unwrap().is_some());
        assert!(finder.find("m3").unwrap().is_none());
        assert_eq!(finder.module_names(), vec!["m1", "m2"]);
    }

    #[test]
    fn test_in_memory_finder_rejects_conflicting_duplicates() {
        let exported = ModuleDescriptor::builder("m2").exports("p2").build().unwrap();
        let concealed = ModuleDescriptor::builder("m2").conceals("p2").build().unwrap();

        let result = InMemoryFinder::try_from_iter(vec![exported.clone(), concealed]);
        assert!(matches!(
            result,
            Err(ResolutionError::DuplicateModule { ref name }) if name == "m2"
        ));

        let mut finder = InMemoryFinder::new();
        assert!(finder.add(exported.clone()).unwrap());
        assert!(!finder.add(exported).unwrap());
        assert!(finder.find("m2").unwrap().unwrap().export_rule_for("p2").is_some());
    }

    #[test]
    fn test_directory_finder_loads_file_and_dir_layouts() {
        let temp_dir = TempDir::new().unwrap();
        write_descriptor(
            temp_dir.path(),
            "m1.json",
            r#"{ "name": "m1", "requires": ["m2"] }"#,
        );
        write_descriptor(
            temp_dir.path(),
            "m2/module.json",
            r#"{ "name": "m2", "exports": [{ "package": "p2" }] }"#,
        );

        let finder = finder_for(vec![temp_dir.path().to_path_buf()]);
        let m1 = finder.find("m1").unwrap().unwrap();
        assert!(m1.requires().contains("m2"));
        let m2 = finder.find("m2").unwrap().unwrap();
        assert!(m2.export_rule_for("p2").is_some());
        assert!(finder.find("m3").unwrap().is_none());

        let names: Vec<_> = finder.module_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["m1", "m2"]);
    }

    #[test]
    fn test_directory_finder_caches() {
        let temp_dir = TempDir::new().unwrap();
        write_descriptor(temp_dir.path(), "m1.json", r#"{ "name": "m1" }"#);

        let finder = finder_for(vec![temp_dir.path().to_path_buf()]);
        let first = finder.find("m1").unwrap().unwrap();
        let second = finder.find("m1").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(finder.cache().unwrap().len(), 1);
    }

    #[test]
    fn test_cached_descriptor_still_checked_for_ambiguity() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_descriptor(first.path(), "m1.json", r#"{ "name": "m1" }"#);

        let finder = finder_for(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert!(finder.find("m1").unwrap().is_some());

        write_descriptor(
            second.path(),
            "m1.json",
            r#"{ "name": "m1", "exports": [{ "package": "p" }] }"#,
        );
        assert!(matches!(finder.find("m1"), Err(FindError::Ambiguous { .. })));
    }

    #[test]
    fn test_conflicting_definitions_are_ambiguous() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_descriptor(first.path(), "m1.json", r#"{ "name": "m1" }"#);
        write_descriptor(
            second.path(),
            "m1.json",
            r#"{ "name": "m1", "exports": [{ "package": "p1" }] }"#,
        );

        let finder = finder_for(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert!(matches!(finder.find("m1"), Err(FindError::Ambiguous { .. })));
    }

    #[test]
    fn test_identical_definitions_are_accepted() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_descriptor(first.path(), "m1.json", r#"{ "name": "m1" }"#);
        write_descriptor(second.path(), "m1.json", r#"{"name":"m1"}"#);

        let finder = finder_for(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert!(finder.find("m1").unwrap().is_some());
    }

    #[test]
    fn test_reject_path_like_references() {
        let temp_dir = TempDir::new().unwrap();
        let finder = finder_for(vec![temp_dir.path().to_path_buf()]);

        for module_ref in ["../etc/passwd", "a/b", "/abs", "..\\win", "evil\0mod", ""] {
            assert!(
                matches!(finder.find(module_ref), Err(FindError::InvalidPath { .. })),
                "Should reject module ref: {:?}",
                module_ref
            );
        }
    }

    #[test]
    fn test_invalid_descriptor_reported_with_path() {
        let temp_dir = TempDir::new().unwrap();
        write_descriptor(
            temp_dir.path(),
            "m1.json",
            r#"{ "name": "m1", "exports": [{ "package": "p", "to": [] }] }"#,
        );
        write_descriptor(temp_dir.path(), "m2.json", "not json");

        let finder = finder_for(vec![temp_dir.path().to_path_buf()]);
        assert!(matches!(finder.find("m1"), Err(FindError::Descriptor { .. })));
        assert!(matches!(finder.find("m2"), Err(FindError::Parse { .. })));
    }

    #[test]
    fn test_chain_finder_first_wins() {
        let primary = InMemoryFinder::new()
            .with(ModuleDescriptor::builder("m1").exports("a").build().unwrap())
            .unwrap();
        let fallback = InMemoryFinder::try_from_iter(vec![
            ModuleDescriptor::builder("m1").build().unwrap(),
            ModuleDescriptor::builder("m2").build().unwrap(),
        ])
        .unwrap();

        let chain = ChainFinder::new().then(primary).then(fallback);
        assert!(chain.find("m1").unwrap().unwrap().export_rule_for("a").is_some());
        assert!(chain.find("m2").unwrap().is_some());
        assert!(chain.find("m3").unwrap().is_none());
    }
}
