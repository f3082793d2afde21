//! Script module loading and unloading
//!
//! A [`ModuleContext`] is the arena that owns everything a module brought
//! in: its code, its type catalog and any native libraries it needed. The
//! loader holds one pin on the active context; every script instance
//! created from the module holds another through a [`ModuleRef`]. Unloading
//! drops the loader's pin and reports whether the arena was reclaimed.

use crate::catalog::{ResolvedType, TypeCatalog, TypeResolver};
use crate::config::ModuleConfig;
use crate::error::{BridgeError, Result};
use crate::ffi::{
    GetModuleInfoFn, RegisterModuleFn, MODULE_INFO_SYMBOL, MODULE_REGISTER_SYMBOL,
    VOID_BRIDGE_API_VERSION, VOID_BRIDGE_BUILD_VERSION,
};
use crate::guard::catch_panic;
use crate::resolver::DependencyResolver;
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::ffi::{c_char, CStr};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Information about a loaded module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Path the module code was loaded from
    pub path: PathBuf,
    /// Module name
    pub name: String,
    /// Version string
    pub version: String,
    /// API version
    pub api_version: u32,
    /// Native libraries the module depends on
    pub native_dependencies: Vec<String>,
    /// Full names of the types the module registered
    pub types: Vec<String>,
}

/// Module code opened by a backend
pub trait ModuleCode: Send + Sync {
    fn info(&self) -> &ModuleInfo;

    /// Run the module's type registration
    fn register_types(&self, catalog: &mut TypeCatalog) -> Result<()>;
}

/// Strategy for turning a module path into code
pub trait ModuleBackend: Send {
    fn open(&mut self, path: &Path, resolver: &DependencyResolver) -> Result<Box<dyn ModuleCode>>;
}

/// The arena owning one loaded module
pub struct ModuleContext {
    info: ModuleInfo,
    // Drop order matters: the catalog's factories live in the module code,
    // and the module code may call into the native libraries.
    catalog: TypeCatalog,
    _code: Box<dyn ModuleCode>,
    natives: Vec<Library>,
}

impl ModuleContext {
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }
}

impl Drop for ModuleContext {
    fn drop(&mut self) {
        log::debug!(
            "Releasing module context '{}' ({} native libraries)",
            self.info.name,
            self.natives.len()
        );
    }
}

/// Pin on a module context; the context stays loaded while any pin exists
#[derive(Clone)]
pub struct ModuleRef(Arc<ModuleContext>);

impl ModuleRef {
    pub fn info(&self) -> &ModuleInfo {
        self.0.info()
    }

    pub fn catalog(&self) -> &TypeCatalog {
        self.0.catalog()
    }

    pub fn ptr_eq(&self, other: &ModuleRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn downgrade(&self) -> Weak<ModuleContext> {
        Arc::downgrade(&self.0)
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleRef").field(&self.0.info.name).finish()
    }
}

/// Result of [`ModuleLoader::unload_module`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadOutcome {
    /// Nothing was loaded
    NotLoaded,
    /// The context and all of its code were released
    Reclaimed,
    /// Other holders still pin the context; it is released with the last pin
    Pinned { live_references: usize },
}

/// Loads one script module at a time into its own context
pub struct ModuleLoader {
    backend: Box<dyn ModuleBackend>,
    resolver: DependencyResolver,
    /// Types shared by every module
    core: TypeCatalog,
    active: Option<ModuleRef>,
    /// Unloaded contexts that were still pinned
    retired: Vec<Weak<ModuleContext>>,
}

impl ModuleLoader {
    /// Loader for dynamic libraries
    pub fn new(config: &ModuleConfig) -> Self {
        Self::with_backend(config, Box::new(DylibBackend::new(config)))
    }

    /// Loader with a custom backend
    pub fn with_backend(config: &ModuleConfig, backend: Box<dyn ModuleBackend>) -> Self {
        Self {
            backend,
            resolver: DependencyResolver::new(config),
            core: TypeCatalog::with_core_types(),
            active: None,
            retired: Vec::new(),
        }
    }

    /// Load a module into a fresh context.
    ///
    /// Nothing is kept if any step fails.
    pub fn load_module(&mut self, path: impl AsRef<Path>) -> Result<ModuleInfo> {
        let requested = path.as_ref();

        if let Some(active) = &self.active {
            return Err(BridgeError::ModuleAlreadyLoaded(active.info().name.clone()));
        }
        self.collect_retired();

        let path = self
            .resolver
            .resolve_module(requested)
            .ok_or_else(|| BridgeError::load_failed(requested, "module file not found"))?;

        log::info!("Loading script module from: {}", path.display());

        let resolver = self.resolver.for_module(&path);
        let code = self.backend.open(&path, &resolver)?;

        let mut natives = Vec::new();
        for name in &code.info().native_dependencies {
            let native_path = resolver.resolve_native(name).ok_or_else(|| {
                BridgeError::NativeDependencyNotFound {
                    module: code.info().name.clone(),
                    name: name.clone(),
                }
            })?;
            let library = unsafe {
                Library::new(&native_path)
                    .map_err(|e| BridgeError::load_failed(&native_path, e.to_string()))?
            };
            log::debug!("Loaded native dependency '{}' from {}", name, native_path.display());
            natives.push(library);
        }

        let mut catalog = TypeCatalog::new();
        code.register_types(&mut catalog)?;

        let mut info = code.info().clone();
        info.types = catalog.names();

        log::info!(
            "Successfully loaded module '{}' v{} with {} types",
            info.name,
            info.version,
            info.types.len()
        );

        self.active = Some(ModuleRef(Arc::new(ModuleContext {
            info: info.clone(),
            catalog,
            _code: code,
            natives,
        })));

        Ok(info)
    }

    /// Unload the active module.
    ///
    /// Every registry entry created from the module must be removed first,
    /// otherwise the context stays pinned and the outcome says so.
    pub fn unload_module(&mut self) -> UnloadOutcome {
        let Some(module) = self.active.take() else {
            return UnloadOutcome::NotLoaded;
        };

        let name = module.info().name.clone();
        log::info!("Unloading script module '{}'...", name);

        let weak = module.downgrade();
        drop(module);

        match weak.strong_count() {
            0 => {
                log::info!("Script module '{}' unloaded", name);
                UnloadOutcome::Reclaimed
            }
            live_references => {
                log::warn!(
                    "Script module '{}' is still pinned by {} live reference(s); its code stays \
                     resident until they are released. Clear the entity registry before unloading.",
                    name,
                    live_references
                );
                self.retired.push(weak);
                UnloadOutcome::Pinned { live_references }
            }
        }
    }

    /// Forget retired contexts that have since been released; returns how
    /// many are still pinned.
    pub fn collect_retired(&mut self) -> usize {
        self.retired.retain(|weak| weak.strong_count() > 0);
        self.retired.len()
    }

    /// Contexts still alive, active or retired
    pub fn live_contexts(&self) -> usize {
        let retired = self.retired.iter().filter(|weak| weak.strong_count() > 0).count();
        retired + usize::from(self.active.is_some())
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ModuleInfo> {
        self.active.as_ref().map(ModuleRef::info)
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active().map(|info| info.path.as_path())
    }

    pub fn core_catalog(&self) -> &TypeCatalog {
        &self.core
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }
}

impl TypeResolver for ModuleLoader {
    /// Active module first, then the shared core types
    fn resolve(&self, type_name: &str) -> Option<ResolvedType> {
        if let Some(module) = &self.active {
            if let Some(entry) = module.catalog().get(type_name) {
                return Some(ResolvedType {
                    entry: entry.clone(),
                    module: Some(module.clone()),
                });
            }
        }
        self.core.resolve(type_name)
    }

    fn type_names(&self) -> Vec<String> {
        let mut names = self.core.names();
        if let Some(module) = &self.active {
            names.extend(module.catalog().names());
        }
        names
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("active", &self.active)
            .field("retired", &self.retired.len())
            .finish()
    }
}

// ========== Dynamic Library Backend ==========

/// Opens modules as dynamic libraries exporting the `export_script_module!` symbols
pub struct DylibBackend {
    /// Directory for shadow copies, when enabled
    shadow_dir: Option<PathBuf>,
    next_shadow: u64,
}

impl DylibBackend {
    pub fn new(config: &ModuleConfig) -> Self {
        let shadow_dir = config.shadow_copy.then(|| {
            config
                .shadow_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("void_bridge_shadow"))
        });
        Self { shadow_dir, next_shadow: 0 }
    }

    /// Copy the module so the original file can be rebuilt while loaded
    fn shadow_copy(&mut self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.shadow_dir else {
            return Ok(None);
        };

        std::fs::create_dir_all(dir)?;
        self.next_shadow += 1;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
        let mut file_name = format!("{}-{}-{}", stem, std::process::id(), self.next_shadow);
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            file_name.push('.');
            file_name.push_str(ext);
        }

        let shadow = dir.join(file_name);
        std::fs::copy(path, &shadow)?;
        log::debug!("Shadow-copied {} to {}", path.display(), shadow.display());
        Ok(Some(shadow))
    }
}

impl ModuleBackend for DylibBackend {
    fn open(&mut self, path: &Path, _resolver: &DependencyResolver) -> Result<Box<dyn ModuleCode>> {
        let shadow = self.shadow_copy(path)?;
        let load_path = shadow.as_deref().unwrap_or(path);

        match DylibCode::open(path, load_path) {
            Ok(mut code) => {
                code.shadow = shadow;
                Ok(Box::new(code))
            }
            Err(e) => {
                if let Some(shadow) = &shadow {
                    let _ = std::fs::remove_file(shadow);
                }
                Err(e)
            }
        }
    }
}

/// A module opened from a dynamic library
struct DylibCode {
    library: Option<Library>,
    info: ModuleInfo,
    register: RegisterModuleFn,
    shadow: Option<PathBuf>,
}

impl DylibCode {
    fn open(path: &Path, load_path: &Path) -> Result<Self> {
        let library = unsafe {
            Library::new(load_path).map_err(|e| BridgeError::load_failed(path, e.to_string()))?
        };
        let module = path.display().to_string();

        let ffi_info = {
            let get_info: Symbol<GetModuleInfoFn> = unsafe {
                library
                    .get(MODULE_INFO_SYMBOL)
                    .map_err(|_| BridgeError::symbol_not_found(&module, "void_script_module_info"))?
            };
            get_info()
        };

        if ffi_info.api_version != VOID_BRIDGE_API_VERSION {
            return Err(BridgeError::VersionMismatch {
                module_version: ffi_info.api_version.to_string(),
                expected_version: VOID_BRIDGE_API_VERSION.to_string(),
            });
        }

        let expected_build = VOID_BRIDGE_BUILD_VERSION.trim_end_matches('\0');
        let module_build = unsafe { owned_string(ffi_info.bridge_version) }.unwrap_or_default();
        if module_build != expected_build {
            return Err(BridgeError::VersionMismatch {
                module_version: module_build,
                expected_version: expected_build.to_string(),
            });
        }

        let register: RegisterModuleFn = unsafe {
            *library
                .get::<RegisterModuleFn>(MODULE_REGISTER_SYMBOL)
                .map_err(|_| BridgeError::symbol_not_found(&module, "void_script_module_register"))?
        };

        let name = unsafe { owned_string(ffi_info.name) }.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string()
        });
        let version = unsafe { owned_string(ffi_info.version) }.unwrap_or_else(|| "0.0.0".to_string());
        let native_dependencies = unsafe { owned_string(ffi_info.native_dependencies) }
            .map(|list| {
                list.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            library: Some(library),
            info: ModuleInfo {
                path: path.to_path_buf(),
                name,
                version,
                api_version: ffi_info.api_version,
                native_dependencies,
                types: Vec::new(),
            },
            register,
            shadow: None,
        })
    }
}

impl ModuleCode for DylibCode {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn register_types(&self, catalog: &mut TypeCatalog) -> Result<()> {
        let registered = unsafe { (self.register)(catalog as *mut TypeCatalog) };
        if registered {
            Ok(())
        } else {
            Err(BridgeError::load_failed(
                &self.info.path,
                "type registration panicked inside the module",
            ))
        }
    }
}

impl Drop for DylibCode {
    fn drop(&mut self) {
        log::debug!("Closing module library '{}'", self.info.name);
        drop(self.library.take());
        if let Some(shadow) = self.shadow.take() {
            if let Err(e) = std::fs::remove_file(&shadow) {
                log::debug!("Could not remove shadow copy {}: {}", shadow.display(), e);
            }
        }
    }
}

unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

// ========== Static Backend ==========

/// A module compiled into the host
#[derive(Clone)]
pub struct StaticModule {
    pub name: String,
    pub version: String,
    pub native_dependencies: Vec<String>,
    pub register: fn(&mut TypeCatalog),
}

impl StaticModule {
    pub fn new(name: impl Into<String>, register: fn(&mut TypeCatalog)) -> Self {
        Self {
            name: name.into(),
            version: "0.0.0".to_string(),
            native_dependencies: Vec::new(),
            register,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_native_dependency(mut self, name: impl Into<String>) -> Self {
        self.native_dependencies.push(name.into());
        self
    }
}

/// Serves in-process modules keyed by path.
///
/// The path must still exist on disk; it stands in for the module file.
#[derive(Clone, Default)]
pub struct StaticBackend {
    modules: HashMap<PathBuf, StaticModule>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: impl Into<PathBuf>, module: StaticModule) -> Self {
        self.insert(path, module);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, module: StaticModule) {
        self.modules.insert(path.into(), module);
    }
}

impl ModuleBackend for StaticBackend {
    fn open(&mut self, path: &Path, _resolver: &DependencyResolver) -> Result<Box<dyn ModuleCode>> {
        let module = self
            .modules
            .get(path)
            .ok_or_else(|| BridgeError::load_failed(path, "no static module registered for this path"))?;

        Ok(Box::new(StaticCode {
            info: ModuleInfo {
                path: path.to_path_buf(),
                name: module.name.clone(),
                version: module.version.clone(),
                api_version: VOID_BRIDGE_API_VERSION,
                native_dependencies: module.native_dependencies.clone(),
                types: Vec::new(),
            },
            register: module.register,
        }))
    }
}

struct StaticCode {
    info: ModuleInfo,
    register: fn(&mut TypeCatalog),
}

impl ModuleCode for StaticCode {
    fn info(&self) -> &ModuleInfo {
        &self.info
    }

    fn register_types(&self, catalog: &mut TypeCatalog) -> Result<()> {
        catch_panic(|| (self.register)(catalog)).map_err(|message| {
            BridgeError::load_failed(&self.info.path, format!("type registration panicked: {}", message))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::BaseEntity;

    fn register_doors(catalog: &mut TypeCatalog) {
        catalog.entity("Game.Door").default_of::<BaseEntity>().register();
    }

    fn register_panics(_: &mut TypeCatalog) {
        panic!("bad registration");
    }

    fn loader_with(path: &Path, module: StaticModule) -> ModuleLoader {
        let backend = StaticBackend::new().with_module(path, module);
        ModuleLoader::with_backend(&ModuleConfig::default(), Box::new(backend))
    }

    #[test]
    fn test_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.module");
        std::fs::write(&path, b"").unwrap();

        let mut loader = loader_with(&path, StaticModule::new("doors", register_doors));
        let info = loader.load_module(&path).unwrap();

        assert_eq!(info.name, "doors");
        assert_eq!(info.types, vec!["Game.Door"]);
        assert!(loader.is_loaded());

        let resolved = loader.resolve("Door").unwrap();
        assert!(resolved.module.is_some());
        let core = loader.resolve(BaseEntity::TYPE_NAME).unwrap();
        assert!(core.module.is_none());
    }

    #[test]
    fn test_missing_file_leaves_nothing() {
        let mut loader = loader_with(Path::new("/nope"), StaticModule::new("x", register_doors));
        let err = loader.load_module("/definitely/not/here.module").unwrap_err();

        assert!(matches!(err, BridgeError::LoadFailed { .. }));
        assert!(!loader.is_loaded());
        assert_eq!(loader.live_contexts(), 0);
    }

    #[test]
    fn test_second_load_requires_unload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.module");
        std::fs::write(&path, b"").unwrap();

        let mut loader = loader_with(&path, StaticModule::new("doors", register_doors));
        loader.load_module(&path).unwrap();
        assert!(matches!(
            loader.load_module(&path),
            Err(BridgeError::ModuleAlreadyLoaded(_))
        ));

        assert_eq!(loader.unload_module(), UnloadOutcome::Reclaimed);
        assert!(loader.load_module(&path).is_ok());
    }

    #[test]
    fn test_unload_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.module");
        std::fs::write(&path, b"").unwrap();

        let mut loader = loader_with(&path, StaticModule::new("doors", register_doors));
        loader.load_module(&path).unwrap();

        assert_eq!(loader.unload_module(), UnloadOutcome::Reclaimed);
        assert_eq!(loader.unload_module(), UnloadOutcome::NotLoaded);
        assert_eq!(loader.live_contexts(), 0);
    }

    #[test]
    fn test_pinned_context_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.module");
        std::fs::write(&path, b"").unwrap();

        let mut loader = loader_with(&path, StaticModule::new("doors", register_doors));
        loader.load_module(&path).unwrap();
        let pin = loader.resolve("Game.Door").unwrap();

        assert_eq!(
            loader.unload_module(),
            UnloadOutcome::Pinned { live_references: 1 }
        );
        assert_eq!(loader.collect_retired(), 1);

        drop(pin);
        assert_eq!(loader.collect_retired(), 0);
        assert_eq!(loader.live_contexts(), 0);
    }

    #[test]
    fn test_registration_panic_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.module");
        std::fs::write(&path, b"").unwrap();

        let mut loader = loader_with(&path, StaticModule::new("broken", register_panics));
        assert!(loader.load_module(&path).is_err());
        assert!(!loader.is_loaded());
    }

    #[test]
    fn test_missing_native_dependency_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("physics.module");
        std::fs::write(&path, b"").unwrap();

        let module = StaticModule::new("physics", register_doors).with_native_dependency("fancy_solver");
        let mut loader = loader_with(&path, module);

        assert!(matches!(
            loader.load_module(&path),
            Err(BridgeError::NativeDependencyNotFound { .. })
        ));
        assert_eq!(loader.live_contexts(), 0);
    }

    #[test]
    fn test_dylib_backend_rejects_non_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_library.so");
        std::fs::write(&path, b"plain text").unwrap();

        let config = ModuleConfig {
            shadow_dir: Some(dir.path().join("shadow")),
            ..Default::default()
        };
        let mut loader = ModuleLoader::new(&config);

        assert!(matches!(
            loader.load_module(&path),
            Err(BridgeError::LoadFailed { .. })
        ));
        assert!(!loader.is_loaded());
        let leftovers = std::fs::read_dir(dir.path().join("shadow")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
