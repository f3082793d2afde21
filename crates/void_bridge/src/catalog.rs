//! Type catalog
//!
//! Maps script type names to factories and declared metadata. A module
//! fills its own catalog when loaded; the bridge keeps a shared core
//! catalog for types every module sees (the base entity).

use crate::entity::{BaseEntity, Entity, EntityId, ScriptError};
use crate::module::ModuleRef;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Result of running a constructor
pub type ConstructResult = Result<Box<dyn Entity>, ScriptError>;

/// Identity-accepting constructor
pub type WithIdConstructor = Box<dyn Fn(EntityId) -> ConstructResult + Send + Sync>;

/// No-argument constructor
pub type DefaultConstructor = Box<dyn Fn() -> ConstructResult + Send + Sync>;

/// Parameter metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
}

/// Field metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
    pub is_public: bool,
    pub is_static: bool,
}

/// Method metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MethodDescriptor {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<ParameterDescriptor>,
}

/// Declared metadata of a catalog type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeDescriptor {
    pub name: String,
    pub full_name: String,
    pub base_type: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    /// Descriptor with only the name filled in
    pub fn named(full_name: &str) -> Self {
        Self {
            name: short_name(full_name).to_string(),
            full_name: full_name.to_string(),
            base_type: None,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }
}

/// Constructors of an entity script type
#[derive(Default)]
pub struct EntityFactory {
    with_id: Option<WithIdConstructor>,
    without_id: Option<DefaultConstructor>,
}

impl EntityFactory {
    pub(crate) fn with_id(&self) -> Option<&WithIdConstructor> {
        self.with_id.as_ref()
    }

    pub(crate) fn without_id(&self) -> Option<&DefaultConstructor> {
        self.without_id.as_ref()
    }
}

/// What kind of type a catalog entry is
pub enum TypeKind {
    /// Script type implementing the entity capability set
    Entity(EntityFactory),
    /// Any other type; visible to diagnostics only
    Plain,
}

/// A registered type
pub struct TypeEntry {
    pub descriptor: TypeDescriptor,
    pub kind: TypeKind,
}

impl TypeEntry {
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, TypeKind::Entity(_))
    }

    /// Constructors run only through the registry, which keeps the
    /// module pinned while their instances live
    pub(crate) fn factory(&self) -> Option<&EntityFactory> {
        match &self.kind {
            TypeKind::Entity(factory) => Some(factory),
            TypeKind::Plain => None,
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("full_name", &self.descriptor.full_name)
            .field("is_entity", &self.is_entity())
            .finish()
    }
}

/// A type found by a resolver, together with the module pin it came from
#[derive(Clone)]
pub struct ResolvedType {
    pub entry: Arc<TypeEntry>,
    pub module: Option<ModuleRef>,
}

impl ResolvedType {
    pub fn full_name(&self) -> &str {
        &self.entry.descriptor.full_name
    }
}

/// Anything that can turn a type name into a catalog entry
pub trait TypeResolver {
    fn resolve(&self, type_name: &str) -> Option<ResolvedType>;

    /// Full names of every resolvable type
    fn type_names(&self) -> Vec<String>;
}

/// Name-indexed table of script types
#[derive(Default)]
pub struct TypeCatalog {
    /// Entries by full name
    entries: HashMap<String, Arc<TypeEntry>>,
    /// Short name to full names
    short_names: HashMap<String, Vec<String>>,
}

impl TypeCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the types shared by every module
    pub fn with_core_types() -> Self {
        let mut catalog = Self::new();
        catalog
            .entity(BaseEntity::TYPE_NAME)
            .with_id(|id| Ok(Box::new(BaseEntity::new(id))))
            .without_id(|| Ok(Box::new(BaseEntity::default())))
            .register();
        catalog
    }

    /// Start declaring an entity script type
    pub fn entity(&mut self, full_name: &str) -> TypeBuilder<'_> {
        let mut descriptor = TypeDescriptor::named(full_name);
        if full_name != BaseEntity::TYPE_NAME {
            descriptor.base_type = Some(BaseEntity::TYPE_NAME.to_string());
        }
        descriptor.methods = lifecycle_methods();
        TypeBuilder {
            catalog: self,
            descriptor,
            factory: Some(EntityFactory::default()),
        }
    }

    /// Start declaring a non-entity type (diagnostics only)
    pub fn plain(&mut self, full_name: &str) -> TypeBuilder<'_> {
        TypeBuilder {
            catalog: self,
            descriptor: TypeDescriptor::named(full_name),
            factory: None,
        }
    }

    /// Insert an entry, replacing any previous entry with the same full name
    pub fn insert(&mut self, entry: TypeEntry) {
        let full_name = entry.descriptor.full_name.clone();
        if self.entries.contains_key(&full_name) {
            log::warn!("Type '{}' registered twice; replacing previous entry", full_name);
        } else {
            self.short_names
                .entry(short_name(&full_name).to_string())
                .or_default()
                .push(full_name.clone());
        }
        self.entries.insert(full_name, Arc::new(entry));
    }

    /// Look up by full name, or by short name when it is unambiguous
    pub fn get(&self, type_name: &str) -> Option<&Arc<TypeEntry>> {
        if let Some(entry) = self.entries.get(type_name) {
            return Some(entry);
        }

        match self.short_names.get(type_name).map(Vec::as_slice) {
            Some([full_name]) => self.entries.get(full_name),
            Some(candidates) if candidates.len() > 1 => {
                log::warn!(
                    "Type name '{}' is ambiguous ({}); use the full name",
                    type_name,
                    candidates.join(", ")
                );
                None
            }
            _ => None,
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.get(type_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted full names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl TypeResolver for TypeCatalog {
    fn resolve(&self, type_name: &str) -> Option<ResolvedType> {
        self.get(type_name).map(|entry| ResolvedType {
            entry: entry.clone(),
            module: None,
        })
    }

    fn type_names(&self) -> Vec<String> {
        self.names()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.entries.len())
            .finish()
    }
}

/// Builder returned by [`TypeCatalog::entity`] and [`TypeCatalog::plain`]
pub struct TypeBuilder<'a> {
    catalog: &'a mut TypeCatalog,
    descriptor: TypeDescriptor,
    factory: Option<EntityFactory>,
}

impl<'a> TypeBuilder<'a> {
    /// Identity-accepting constructor
    pub fn with_id(mut self, f: impl Fn(EntityId) -> ConstructResult + Send + Sync + 'static) -> Self {
        if let Some(factory) = self.factory.as_mut() {
            factory.with_id = Some(Box::new(f));
        }
        self
    }

    /// No-argument constructor; the registry binds the identity afterwards
    pub fn without_id(mut self, f: impl Fn() -> ConstructResult + Send + Sync + 'static) -> Self {
        if let Some(factory) = self.factory.as_mut() {
            factory.without_id = Some(Box::new(f));
        }
        self
    }

    /// No-argument constructor from `Default`
    pub fn default_of<T: Entity + Default>(self) -> Self {
        self.without_id(|| Ok(Box::new(T::default())))
    }

    pub fn base_type(mut self, name: &str) -> Self {
        self.descriptor.base_type = Some(name.to_string());
        self
    }

    pub fn field(mut self, name: &str, ty: &str, is_public: bool) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty: ty.to_string(),
            is_public,
            is_static: false,
        });
        self
    }

    pub fn static_field(mut self, name: &str, ty: &str, is_public: bool) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty: ty.to_string(),
            is_public,
            is_static: true,
        });
        self
    }

    pub fn method(mut self, name: &str, return_type: &str, parameters: &[(&str, &str)]) -> Self {
        self.descriptor.methods.push(MethodDescriptor {
            name: name.to_string(),
            return_type: return_type.to_string(),
            parameters: parameters
                .iter()
                .map(|(name, ty)| ParameterDescriptor {
                    name: name.to_string(),
                    ty: ty.to_string(),
                })
                .collect(),
        });
        self
    }

    /// Finish and insert into the catalog
    pub fn register(self) {
        let kind = match self.factory {
            Some(factory) => TypeKind::Entity(factory),
            None => TypeKind::Plain,
        };
        self.catalog.insert(TypeEntry {
            descriptor: self.descriptor,
            kind,
        });
    }
}

/// Last segment of a `.`- or `::`-separated type path
pub fn short_name(full_name: &str) -> &str {
    let after_colons = full_name.rsplit("::").next().unwrap_or(full_name);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

fn lifecycle_methods() -> Vec<MethodDescriptor> {
    let hook = |name: &str, parameters: Vec<ParameterDescriptor>| MethodDescriptor {
        name: name.to_string(),
        return_type: "HookResult".to_string(),
        parameters,
    };
    vec![
        hook("start", Vec::new()),
        hook(
            "update",
            vec![ParameterDescriptor {
                name: "delta_time".to_string(),
                ty: "f32".to_string(),
            }],
        ),
        hook("stop", Vec::new()),
    ]
}
