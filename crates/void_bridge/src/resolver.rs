//! Module and native library path resolution
//!
//! Module code and the native libraries a module depends on are found with
//! the same rules: the module's own directory first, then configured
//! search paths. Native lookups use the native search paths instead of the
//! module search paths.

use crate::config::ModuleConfig;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolves module files and native dependencies to paths on disk
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    /// Directory of the module being loaded
    module_dir: Option<PathBuf>,
    /// Directories searched for module files
    search_paths: Vec<PathBuf>,
    /// Directories searched for native libraries
    native_search_paths: Vec<PathBuf>,
}

impl DependencyResolver {
    pub fn new(config: &ModuleConfig) -> Self {
        Self {
            module_dir: None,
            search_paths: config.search_paths.clone(),
            native_search_paths: config.native_search_paths.clone(),
        }
    }

    /// Resolver anchored at the directory of `module_path`
    pub fn for_module(&self, module_path: &Path) -> Self {
        Self {
            module_dir: module_path.parent().map(Path::to_path_buf),
            ..self.clone()
        }
    }

    pub fn module_dir(&self) -> Option<&Path> {
        self.module_dir.as_deref()
    }

    /// Resolve a module request: an existing path, or a name searched in
    /// the module search paths (with and without the platform library
    /// prefix/suffix).
    pub fn resolve_module(&self, request: &Path) -> Option<PathBuf> {
        if request.is_file() {
            return Some(request.to_path_buf());
        }
        if request.is_absolute() {
            return None;
        }

        let dirs = self.module_dir.iter().chain(self.search_paths.iter());
        find_in(dirs, request.as_os_str())
    }

    /// Resolve a native library by name
    pub fn resolve_native(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() {
            return direct.is_file().then(|| direct.to_path_buf());
        }

        let native_dir = self.module_dir.as_ref().map(|dir| dir.join("native"));
        let dirs = self
            .module_dir
            .iter()
            .chain(native_dir.iter())
            .chain(self.native_search_paths.iter());
        find_in(dirs, OsStr::new(name))
    }
}

fn find_in<'a>(dirs: impl Iterator<Item = &'a PathBuf>, name: &OsStr) -> Option<PathBuf> {
    let platform_name = libloading::library_filename(name);
    for dir in dirs {
        for candidate in [dir.join(name), dir.join(&platform_name)] {
            if candidate.is_file() {
                log::trace!("Resolved '{}' to {}", name.to_string_lossy(), candidate.display());
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_existing_path_resolves_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("scripts.module");
        touch(&module);

        let resolver = DependencyResolver::default();
        assert_eq!(resolver.resolve_module(&module), Some(module));
    }

    #[test]
    fn test_bare_name_uses_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(libloading::library_filename("game_scripts"));
        touch(&file);

        let config = ModuleConfig {
            search_paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let resolver = DependencyResolver::new(&config);
        assert_eq!(resolver.resolve_module(Path::new("game_scripts")), Some(file));
        assert_eq!(resolver.resolve_module(Path::new("missing")), None);
    }

    #[test]
    fn test_native_lookup_prefers_module_dir() {
        let module_dir = tempfile::tempdir().unwrap();
        let extra_dir = tempfile::tempdir().unwrap();
        let module = module_dir.path().join("scripts.module");
        touch(&module);
        let local = module_dir.path().join("native").join(libloading::library_filename("physics"));
        touch(&local);
        let fallback = extra_dir.path().join(libloading::library_filename("audio"));
        touch(&fallback);

        let config = ModuleConfig {
            native_search_paths: vec![extra_dir.path().to_path_buf()],
            ..Default::default()
        };
        let resolver = DependencyResolver::new(&config).for_module(&module);

        assert_eq!(resolver.resolve_native("physics"), Some(local));
        assert_eq!(resolver.resolve_native("audio"), Some(fallback));
        assert_eq!(resolver.resolve_native("nothing"), None);
    }
}
