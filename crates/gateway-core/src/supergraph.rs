//! # Supergraph View (core-facing slice)
//!
//! Schema composition itself is out of scope (spec §1); this module defines
//! only the narrow read interface the core needs from a composed
//! supergraph, plus an in-memory implementation suitable for tests and for
//! gateways that materialize the composed view ahead of time.
//!
//! Grounded in the teacher's `registry::agent_registry::AgentRegistry`
//! shape — a trait over simple lookups backed, in the default
//! implementation, by a `HashMap` guarded for interior mutability the same
//! way `MockAgentRegistryImpl` guards its `Vec<Agent>` — but made
//! synchronous: the supergraph view is local, already-composed data, not a
//! network-backed registry.

use std::collections::HashMap;

use crate::plan::SubgraphRef;

/// A declared `@key(fields: ...)` field set, already split on whitespace.
/// Composite keys have more than one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKey {
    pub field_set: Vec<String>,
}

impl EntityKey {
    pub fn new(field_set: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            field_set: field_set.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a raw `@key(fields: "...")` argument, splitting on whitespace.
    pub fn parse(fields: &str) -> Self {
        Self {
            field_set: fields.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// An entity type declared in one or more subgraphs. Only resolvable keys
/// are retained here — callers filter out `resolvable: false` keys before
/// constructing this (spec §3: "Non-resolvable keys... must be filtered
/// out").
#[derive(Debug, Clone)]
pub struct Entity {
    pub type_name: String,
    pub keys: Vec<EntityKey>,
}

impl Entity {
    /// The first declared key set — the one the Representation Extractor
    /// uses (spec §4.3: "Use the *first* declared `@key` field set").
    pub fn primary_key(&self) -> Option<&EntityKey> {
        self.keys.first()
    }
}

/// The read-only interface the core needs from a composed supergraph.
pub trait SupergraphView: Send + Sync {
    /// The subgraph that owns (can resolve) the given entity type.
    fn entity_owner_subgraph(&self, type_name: &str) -> Option<SubgraphRef>;

    /// The entity declaration for a type name, if it is an entity at all.
    fn entity(&self, type_name: &str) -> Option<&Entity>;

    /// Best-effort lookup of the GraphQL type bound to `argument` on
    /// `field` of `parent_type` in `subgraph`'s schema. Used by the Query
    /// Builder's variable-type inference (spec §4.2, step (i)); returning
    /// `None` falls through to runtime-value inference.
    fn field_argument_type(
        &self,
        _subgraph: &str,
        _parent_type: &str,
        _field: &str,
        _argument: &str,
    ) -> Option<String> {
        None
    }
}

/// In-memory `SupergraphView`, populated ahead of time from composed schema
/// metadata. Suitable for tests and for deployments that precompute the
/// composed view rather than querying it live.
#[derive(Debug, Default, Clone)]
pub struct InMemorySupergraphView {
    entities: HashMap<String, (SubgraphRef, Entity)>,
    argument_types: HashMap<(String, String, String, String), String>,
}

impl InMemorySupergraphView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type and its owning subgraph.
    pub fn with_entity(mut self, owner: SubgraphRef, entity: Entity) -> Self {
        self.entities.insert(entity.type_name.clone(), (owner, entity));
        self
    }

    /// Register a field-argument type binding for variable inference.
    pub fn with_argument_type(
        mut self,
        subgraph: impl Into<String>,
        parent_type: impl Into<String>,
        field: impl Into<String>,
        argument: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.argument_types.insert(
            (
                subgraph.into(),
                parent_type.into(),
                field.into(),
                argument.into(),
            ),
            type_name.into(),
        );
        self
    }
}

impl SupergraphView for InMemorySupergraphView {
    fn entity_owner_subgraph(&self, type_name: &str) -> Option<SubgraphRef> {
        self.entities.get(type_name).map(|(owner, _)| owner.clone())
    }

    fn entity(&self, type_name: &str) -> Option<&Entity> {
        self.entities.get(type_name).map(|(_, entity)| entity)
    }

    fn field_argument_type(
        &self,
        subgraph: &str,
        parent_type: &str,
        field: &str,
        argument: &str,
    ) -> Option<String> {
        self.argument_types
            .get(&(
                subgraph.to_string(),
                parent_type.to_string(),
                field.to_string(),
                argument.to_string(),
            ))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_is_first_declared() {
        let entity = Entity {
            type_name: "Flight".to_string(),
            keys: vec![
                EntityKey::parse("number departureDate"),
                EntityKey::parse("id"),
            ],
        };
        assert_eq!(
            entity.primary_key().unwrap().field_set,
            vec!["number".to_string(), "departureDate".to_string()]
        );
    }

    #[test]
    fn in_memory_view_roundtrips_registration() {
        let view = InMemorySupergraphView::new().with_entity(
            SubgraphRef {
                name: "products".to_string(),
                endpoint: "http://products".to_string(),
            },
            Entity {
                type_name: "Product".to_string(),
                keys: vec![EntityKey::parse("upc")],
            },
        );
        assert_eq!(
            view.entity_owner_subgraph("Product").unwrap().name,
            "products"
        );
        assert!(view.entity("Review").is_none());
    }
}
