//! Entity-type registry.
//!
//! The `Model` is built once at startup from every entity type the
//! application declares. It answers a single question for the audit
//! interceptor: does this entity type participate in audit tracking?
//! A built model is immutable and shared through `Arc`.

pub mod audit_fields;
pub mod schema;

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub use audit_fields::{AuditFields, RemovalState, AUDIT_FIELDS};
pub use schema::{ColumnSpec, ColumnType, StorageShape};

/// A persisted entity type.
///
/// `AUDITABLE` is the compile-time audit marker: types that set it to `true`
/// get the four audit columns and are stamped on every commit.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table / schema name the entity is stored under
    const NAME: &'static str;

    const AUDITABLE: bool = false;

    fn id(&self) -> Uuid;
}

/// Registered metadata for one entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub name: String,
    pub auditable: bool,
    pub shape: StorageShape,
}

impl EntityType {
    pub fn is_auditable(&self) -> bool {
        self.auditable
    }
}

/// Collects entity declarations and builds the immutable `Model`
#[derive(Debug, Default)]
pub struct ModelBuilder {
    declared: Vec<(String, bool)>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type through its `Entity` implementation
    pub fn entity<T: Entity>(mut self) -> Self {
        self.declared.push((T::NAME.to_string(), T::AUDITABLE));
        self
    }

    /// Declare an entity type by name with an explicit audit marker
    pub fn entity_named(mut self, name: impl Into<String>, auditable: bool) -> Self {
        self.declared.push((name.into(), auditable));
        self
    }

    /// Run the registration pass. Each declared type is checked for the
    /// marker once; auditable types get the audit columns added to their
    /// storage shape. A later declaration of the same name replaces an
    /// earlier one.
    pub fn build(self) -> Model {
        let mut entity_types = HashMap::with_capacity(self.declared.len());

        for (name, auditable) in self.declared {
            let shape = if auditable {
                StorageShape::with_audit_columns()
            } else {
                StorageShape::default()
            };

            tracing::debug!("Registered entity type '{}' (auditable={})", name, auditable);

            entity_types.insert(
                name.clone(),
                EntityType {
                    name,
                    auditable,
                    shape,
                },
            );
        }

        let auditable_count = entity_types.values().filter(|t| t.auditable).count();
        tracing::info!(
            "Model built: {} entity types, {} auditable",
            entity_types.len(),
            auditable_count
        );

        Model { entity_types }
    }

    pub fn build_shared(self) -> Arc<Model> {
        Arc::new(self.build())
    }
}

/// Immutable entity-type registry
#[derive(Debug, Clone, Default)]
pub struct Model {
    entity_types: HashMap<String, EntityType>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    pub fn find_entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    /// Whether mutations on `name` are audited. Unknown types are not.
    pub fn is_auditable(&self, name: &str) -> bool {
        self.find_entity_type(name)
            .map(EntityType::is_auditable)
            .unwrap_or(false)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    pub fn auditable_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values().filter(|t| t.auditable)
    }

    pub fn len(&self) -> usize {
        self.entity_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty()
    }
}
