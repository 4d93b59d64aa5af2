//! A small mapped domain for tests.
//!
//! ```text
//! Person ──town──▶ Town ──country──▶ Country
//!   │  └──cars──▶ [Car] ──owner──▶ Person
//!   └──address (embedded)──country──▶ Country
//! ```

use std::sync::LazyLock;

use querygraph_engine::metadata::{Entity, EntityMeta, MetadataRegistry, PropertyDef};

/// A person.
#[derive(Debug)]
pub struct Person;

/// A town.
#[derive(Debug)]
pub struct Town;

/// A car owned by a person.
#[derive(Debug)]
pub struct Car;

/// A country, identified by its code and mapped as `CountryEntity`.
#[derive(Debug)]
pub struct Country;

/// An embedded postal address.
#[derive(Debug)]
pub struct Address;

impl Entity for Person {
    fn meta() -> &'static EntityMeta {
        static META: LazyLock<EntityMeta> = LazyLock::new(|| {
            EntityMeta::entity("Person")
                .identifier("id")
                .property(PropertyDef::scalar("id", "i64"))
                .property(PropertyDef::scalar("name", "String"))
                .property(PropertyDef::scalar("age", "i32"))
                .property(PropertyDef::reference("town", "Town"))
                .property(PropertyDef::collection("cars", "Car"))
                .property(PropertyDef::embedded("address", "Address"))
        });
        &META
    }
}

impl Entity for Town {
    fn meta() -> &'static EntityMeta {
        static META: LazyLock<EntityMeta> = LazyLock::new(|| {
            EntityMeta::entity("Town")
                .identifier("id")
                .property(PropertyDef::scalar("id", "i64"))
                .property(PropertyDef::scalar("name", "String"))
                .property(PropertyDef::reference("country", "Country"))
                .property(PropertyDef::reference("mayor", "Person"))
        });
        &META
    }
}

impl Entity for Car {
    fn meta() -> &'static EntityMeta {
        static META: LazyLock<EntityMeta> = LazyLock::new(|| {
            EntityMeta::entity("Car")
                .identifier("id")
                .property(PropertyDef::scalar("id", "i64"))
                .property(PropertyDef::scalar("model", "String"))
                .property(PropertyDef::scalar("price", "f64"))
                .property(PropertyDef::reference("owner", "Person"))
        });
        &META
    }
}

impl Entity for Country {
    fn meta() -> &'static EntityMeta {
        static META: LazyLock<EntityMeta> = LazyLock::new(|| {
            EntityMeta::entity("Country")
                .entity_name("CountryEntity")
                .identifier("code")
                .property(PropertyDef::scalar("code", "String"))
                .property(PropertyDef::scalar("name", "String"))
        });
        &META
    }
}

impl Entity for Address {
    fn meta() -> &'static EntityMeta {
        static META: LazyLock<EntityMeta> = LazyLock::new(|| {
            EntityMeta::embeddable("Address")
                .property(PropertyDef::scalar("street", "String"))
                .property(PropertyDef::scalar("city", "String"))
                .property(PropertyDef::reference("country", "Country"))
        });
        &META
    }
}

/// A registry holding every fixture type.
pub fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    registry
        .register::<Person>()
        .register::<Town>()
        .register::<Car>()
        .register::<Country>()
        .register::<Address>();
    registry
}
