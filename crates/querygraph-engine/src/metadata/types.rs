//! Entity and property descriptors.
//!
//! [`EntityMeta`] describes one mapped type (an entity or an embeddable
//! composite) and its [`PropertyDef`]s. Descriptors are built once, usually
//! inside a `LazyLock` behind [`Entity::meta`](super::Entity::meta).

/// Whether a mapped type is an entity (has its own identity and entity name)
/// or an embeddable composite stored inline in its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    /// A root-able, joinable entity.
    Entity,
    /// An embedded composite value; never joined.
    Embeddable,
}

/// The type of a mapped property.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum PropertyType {
    /// A plain value column.
    Scalar {
        /// Informational type name (e.g. "String", "i64").
        type_name: String,
    },
    /// A single-valued association to another entity.
    Reference {
        /// The target entity type.
        target: String,
    },
    /// A collection-valued association.
    Collection {
        /// The element type of the collection.
        element: String,
    },
    /// An embedded composite value.
    Embedded {
        /// The embeddable type.
        target: String,
    },
}

/// A single mapped property of an entity or embeddable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PropertyDef {
    /// The property name, used as path segment in compiled text.
    pub name: String,
    /// The property type.
    pub property_type: PropertyType,
}

impl PropertyDef {
    /// A plain value property.
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Scalar {
                type_name: type_name.into(),
            },
        }
    }

    /// A many-to-one or one-to-one association.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Reference {
                target: target.into(),
            },
        }
    }

    /// A collection association; `element` is the element type.
    pub fn collection(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Collection {
                element: element.into(),
            },
        }
    }

    /// An embedded composite.
    pub fn embedded(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Embedded {
                target: target.into(),
            },
        }
    }

    /// The type a path through this property lands on; collections are
    /// unwrapped to their element type.
    pub fn target_type(&self) -> &str {
        match &self.property_type {
            PropertyType::Scalar { type_name } => type_name,
            PropertyType::Reference { target } | PropertyType::Embedded { target } => target,
            PropertyType::Collection { element } => element,
        }
    }

    /// Returns `true` for collection-valued properties.
    pub const fn is_collection(&self) -> bool {
        matches!(self.property_type, PropertyType::Collection { .. })
    }
}

/// Metadata about a mapped type.
///
/// # Examples
///
/// ```
/// use querygraph_engine::metadata::{EntityMeta, PropertyDef};
///
/// let town = EntityMeta::entity("Town")
///     .identifier("id")
///     .property(PropertyDef::scalar("id", "i64"))
///     .property(PropertyDef::scalar("name", "String"));
/// assert_eq!(town.entity_name, "Town");
/// assert!(town.find_property("name").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityMeta {
    /// The type key used by the metadata provider.
    pub type_name: String,
    /// The name written literally in `from` clauses.
    pub entity_name: String,
    /// Entity or embeddable.
    pub kind: TypeKind,
    /// Name of the identifier property, if the type has one.
    pub identifier: Option<String>,
    /// Mapped properties in declaration order.
    pub properties: Vec<PropertyDef>,
}

impl EntityMeta {
    /// Starts an entity descriptor whose entity name equals its type name.
    pub fn entity(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            entity_name: type_name.clone(),
            type_name,
            kind: TypeKind::Entity,
            identifier: None,
            properties: Vec::new(),
        }
    }

    /// Starts an embeddable (composite) descriptor.
    pub fn embeddable(type_name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Embeddable,
            ..Self::entity(type_name)
        }
    }

    /// Overrides the entity name used in compiled text.
    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = name.into();
        self
    }

    /// Sets the identifier property name.
    pub fn identifier(mut self, name: impl Into<String>) -> Self {
        self.identifier = Some(name.into());
        self
    }

    /// Appends a property.
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Looks up a property by name.
    pub fn find_property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}
