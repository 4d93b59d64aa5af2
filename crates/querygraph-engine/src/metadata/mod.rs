//! Mapping metadata consumed by the query graph.
//!
//! The engine never inspects domain values; it only needs to know, for a
//! type and a property name, what the property lands on. That contract is
//! the [`Metadata`] trait. [`MetadataRegistry`] is the in-memory
//! implementation: a lookup cache of [`EntityMeta`] descriptors populated
//! once and shared by every query built against it.

pub mod types;

use std::collections::HashMap;

pub use types::{EntityMeta, PropertyDef, PropertyType, TypeKind};

/// A mapped domain type.
///
/// # Examples
///
/// ```
/// use querygraph_engine::metadata::{Entity, EntityMeta, PropertyDef};
///
/// struct Town;
///
/// impl Entity for Town {
///     fn meta() -> &'static EntityMeta {
///         use std::sync::LazyLock;
///         static META: LazyLock<EntityMeta> = LazyLock::new(|| {
///             EntityMeta::entity("Town")
///                 .identifier("id")
///                 .property(PropertyDef::scalar("id", "i64"))
///                 .property(PropertyDef::scalar("name", "String"))
///         });
///         &META
///     }
/// }
///
/// assert_eq!(Town::type_name(), "Town");
/// ```
pub trait Entity: 'static {
    /// Returns the static descriptor for this type.
    fn meta() -> &'static EntityMeta;

    /// Returns the type key of this entity.
    fn type_name() -> &'static str {
        &Self::meta().type_name
    }
}

/// What a property path segment resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProperty {
    /// The target type, with collections unwrapped to their element type.
    pub target_type: String,
    /// Whether the property is collection-valued.
    pub collection: bool,
}

/// The metadata provider contract.
pub trait Metadata {
    /// Returns `true` if `type_name` is a mapped entity.
    fn is_known_entity_type(&self, type_name: &str) -> bool;

    /// Returns `true` if `type_name` is an embeddable composite.
    fn is_composite_type(&self, type_name: &str) -> bool;

    /// Resolves `owner.property` to its target type.
    fn resolve_target_type(&self, owner: &str, property: &str) -> Option<ResolvedProperty>;

    /// The name written literally in `from`/`join` text for an entity type.
    fn entity_name(&self, type_name: &str) -> Option<&str>;

    /// The identifier property of an entity type.
    fn identifier_property(&self, type_name: &str) -> Option<&str>;
}

#[derive(Debug, Clone)]
struct RegisteredType {
    meta: EntityMeta,
    by_name: HashMap<String, usize>,
}

/// An in-memory [`Metadata`] provider.
///
/// # Examples
///
/// ```
/// use querygraph_engine::metadata::{EntityMeta, Metadata, MetadataRegistry, PropertyDef};
///
/// let mut registry = MetadataRegistry::new();
/// registry.register_meta(
///     EntityMeta::entity("Person")
///         .identifier("id")
///         .property(PropertyDef::collection("cars", "Car")),
/// );
///
/// let cars = registry.resolve_target_type("Person", "cars").unwrap();
/// assert_eq!(cars.target_type, "Car");
/// assert!(cars.collection);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    types: HashMap<String, RegisteredType>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the descriptor of an [`Entity`] type.
    pub fn register<E: Entity>(&mut self) -> &mut Self {
        self.register_meta(E::meta().clone())
    }

    /// Registers a descriptor. A later registration of the same type name
    /// replaces the earlier one.
    pub fn register_meta(&mut self, meta: EntityMeta) -> &mut Self {
        let by_name = meta
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        if self.types.contains_key(&meta.type_name) {
            tracing::debug!("Replacing metadata for '{}'", meta.type_name);
        }
        self.types
            .insert(meta.type_name.clone(), RegisteredType { meta, by_name });
        self
    }

    /// Returns the descriptor registered for `type_name`.
    pub fn get(&self, type_name: &str) -> Option<&EntityMeta> {
        self.types.get(type_name).map(|t| &t.meta)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn property(&self, owner: &str, property: &str) -> Option<&PropertyDef> {
        let registered = self.types.get(owner)?;
        let idx = registered.by_name.get(property)?;
        registered.meta.properties.get(*idx)
    }
}

impl Metadata for MetadataRegistry {
    fn is_known_entity_type(&self, type_name: &str) -> bool {
        self.get(type_name)
            .is_some_and(|m| m.kind == TypeKind::Entity)
    }

    fn is_composite_type(&self, type_name: &str) -> bool {
        self.get(type_name)
            .is_some_and(|m| m.kind == TypeKind::Embeddable)
    }

    fn resolve_target_type(&self, owner: &str, property: &str) -> Option<ResolvedProperty> {
        self.property(owner, property).map(|p| ResolvedProperty {
            target_type: p.target_type().to_string(),
            collection: p.is_collection(),
        })
    }

    fn entity_name(&self, type_name: &str) -> Option<&str> {
        self.get(type_name)
            .filter(|m| m.kind == TypeKind::Entity)
            .map(|m| m.entity_name.as_str())
    }

    fn identifier_property(&self, type_name: &str) -> Option<&str> {
        self.get(type_name).and_then(|m| m.identifier.as_deref())
    }
}
