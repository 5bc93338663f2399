//! # Error Types
//!
//! Errors for structural operations: registration, attachment, reparenting
//! and configuration. Hot query paths never return these; they answer with
//! `None` or `false` for invalid handles instead.

use thiserror::Error;

use crate::ecs::{ComponentTypeId, EntityId};

/// Errors that can occur in the runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Registration attempted after `Manager::init`.
    #[error("registration is closed: {0} must be registered before init")]
    RegistrationClosed(String),

    /// The same component type was registered twice.
    #[error("component type already registered: {0}")]
    DuplicateComponentType(String),

    /// The same system type was registered twice.
    #[error("system already registered: {0}")]
    DuplicateSystem(String),

    /// A name or Rust type has no assigned id.
    #[error("unregistered type: {0}")]
    UnregisteredType(String),

    /// No live entity has this id.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Handle is null, stale, or refers to a free slot.
    #[error("invalid or stale handle")]
    InvalidHandle,

    /// Reparenting would make an entity its own ancestor.
    #[error("hierarchy cycle: {child} is an ancestor of {parent}")]
    HierarchyCycle {
        /// The requested parent.
        parent: EntityId,
        /// The requested child.
        child: EntityId,
    },

    /// An entity cannot be its own child.
    #[error("entity {0} cannot be its own child")]
    SelfParent(EntityId),

    /// The entity already holds a component of this type.
    #[error("entity {entity} already has a component of type {component_type}")]
    DuplicateComponent {
        /// The entity.
        entity: EntityId,
        /// The component type attached twice.
        component_type: ComponentTypeId,
    },

    /// A components tuple needs at least one component type.
    #[error("a components tuple needs at least one component type")]
    EmptyTuple,

    /// The component is attached to another entity.
    #[error("component is already attached to entity {0}")]
    ComponentAlreadyAttached(EntityId),

    /// Operation requires `Manager::init` to have run.
    #[error("manager is not initialized")]
    NotInitialized,

    /// Operation attempted after `Manager::destroy`.
    #[error("manager has been destroyed")]
    Destroyed,

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(String),
}

/// Result type for runtime operations.
pub type EcsResult<T> = Result<T, EcsError>;
