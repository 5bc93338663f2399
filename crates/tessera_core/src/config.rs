//! # Manager Configuration
//!
//! Storage sizing and default policies, loaded once at startup.
//!
//! ```toml
//! component_chunk_size = 1024
//! entity_chunk_size = 1024
//! node_chunk_size = 256
//! destroy_policy = "reparent_children"
//! ```
//!
//! Every key is optional; missing keys take their default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::{DestroyPolicy, DEFAULT_NODE_CHUNK_SIZE};
use crate::error::{EcsError, EcsResult};
use crate::memory::DEFAULT_CHUNK_SIZE;

/// Configuration of a [`Manager`](crate::Manager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Slots per chunk in each component pool.
    pub component_chunk_size: usize,
    /// Slots per chunk in the entity pool.
    pub entity_chunk_size: usize,
    /// Slots per chunk in the hierarchy and component-map node pools.
    pub node_chunk_size: usize,
    /// Policy used by `Manager::destroy_entity`.
    pub destroy_policy: DestroyPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            component_chunk_size: DEFAULT_CHUNK_SIZE,
            entity_chunk_size: DEFAULT_CHUNK_SIZE,
            node_chunk_size: DEFAULT_NODE_CHUNK_SIZE,
            destroy_policy: DestroyPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on malformed TOML or out-of-range
    /// values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| EcsError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ConfigIo`] if the file cannot be read, otherwise
    /// as [`from_toml_str`](Self::from_toml_str).
    pub fn load<P: AsRef<Path>>(path: P) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|err| EcsError::ConfigIo(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string(self).map_err(|err| EcsError::InvalidConfig(err.to_string()))
    }

    /// Checks that every chunk size is non-zero and addressable by a `u32`
    /// slot index.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> EcsResult<()> {
        for (field, value) in [
            ("component_chunk_size", self.component_chunk_size),
            ("entity_chunk_size", self.entity_chunk_size),
            ("node_chunk_size", self.node_chunk_size),
        ] {
            if value == 0 {
                return Err(EcsError::InvalidConfig(format!("{field} must be non-zero")));
            }
            if u32::try_from(value).is_err() {
                return Err(EcsError::InvalidConfig(format!(
                    "{field} must fit in u32, got {value}"
                )));
            }
        }
        Ok(())
    }
}
