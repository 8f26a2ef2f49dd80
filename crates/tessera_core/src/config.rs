//! # Engine Configuration
//!
//! Sizing knobs for global memory, entity chunks and the scheduler, loaded
//! from TOML.
//!
//! ```toml
//! [memory]
//! global_capacity_bytes = 134217728
//! system_arena_bytes = 8192
//!
//! [entities]
//! chunk_capacity = 512
//!
//! [[entities.chunk_capacity_overrides]]
//! type_id = 3
//! chunk_capacity = 64
//!
//! [systems]
//! cycle_policy = "reject"
//! ```
//!
//! Every section and field is optional; missing values take the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::EntityTypeId;
use crate::error::{EcsError, EcsResult};

/// Default global memory capacity (128 MiB).
pub const DEFAULT_GLOBAL_CAPACITY_BYTES: usize = 128 * 1024 * 1024;

/// Default size of the system arena (8 KiB).
pub const DEFAULT_SYSTEM_ARENA_BYTES: usize = 8 * 1024;

/// Default number of entities per chunk.
pub const DEFAULT_CHUNK_CAPACITY: usize = 512;

/// Top-level configuration of one engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Global memory sizing.
    pub memory: MemoryConfig,
    /// Entity chunk sizing.
    pub entities: EntityConfig,
    /// Scheduler behaviour.
    pub systems: SystemConfig,
}

/// `[memory]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Total bytes available to chunks and the system arena.
    pub global_capacity_bytes: usize,
    /// Bytes reserved for system instances.
    pub system_arena_bytes: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            global_capacity_bytes: DEFAULT_GLOBAL_CAPACITY_BYTES,
            system_arena_bytes: DEFAULT_SYSTEM_ARENA_BYTES,
        }
    }
}

/// `[entities]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    /// Entities per chunk for types without an override.
    pub chunk_capacity: usize,
    /// Per-type chunk capacities.
    pub chunk_capacity_overrides: Vec<ChunkCapacityOverride>,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            chunk_capacity_overrides: Vec::new(),
        }
    }
}

impl EntityConfig {
    /// Chunk capacity used for the entity type `type_id`.
    #[must_use]
    pub fn chunk_capacity_for(&self, type_id: EntityTypeId) -> usize {
        self.chunk_capacity_overrides
            .iter()
            .find(|o| o.type_id == type_id)
            .map_or(self.chunk_capacity, |o| o.chunk_capacity)
    }
}

/// Chunk capacity for one entity type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkCapacityOverride {
    /// Entity type the override applies to.
    pub type_id: EntityTypeId,
    /// Entities per chunk for that type.
    pub chunk_capacity: usize,
}

/// `[systems]` section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    /// What to do with dependency cycles.
    pub cycle_policy: CyclePolicy,
}

/// Handling of cycles in the system dependency matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Produce an order anyway and log a warning.
    #[default]
    Ignore,
    /// Fail the work order update and keep the previous order.
    Reject,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the document does not parse or fails validation.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string(self).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Checks the values for consistency.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> EcsResult<()> {
        let invalid = |message: String| Err(EcsError::InvalidConfig(message));

        if self.memory.global_capacity_bytes == 0 {
            return invalid("memory.global_capacity_bytes must be greater than zero".into());
        }
        if self.memory.system_arena_bytes > self.memory.global_capacity_bytes {
            return invalid(format!(
                "memory.system_arena_bytes ({}) exceeds memory.global_capacity_bytes ({})",
                self.memory.system_arena_bytes, self.memory.global_capacity_bytes
            ));
        }
        if self.entities.chunk_capacity == 0 {
            return invalid("entities.chunk_capacity must be greater than zero".into());
        }

        let overrides = &self.entities.chunk_capacity_overrides;
        for (i, entry) in overrides.iter().enumerate() {
            if entry.chunk_capacity == 0 {
                return invalid(format!(
                    "chunk capacity override for type {} must be greater than zero",
                    entry.type_id
                ));
            }
            if overrides[..i].iter().any(|o| o.type_id == entry.type_id) {
                return invalid(format!(
                    "duplicate chunk capacity override for type {}",
                    entry.type_id
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.memory.global_capacity_bytes, 128 * 1024 * 1024);
        assert_eq!(config.memory.system_arena_bytes, 8 * 1024);
        assert_eq!(config.entities.chunk_capacity, 512);
        assert_eq!(config.systems.cycle_policy, CyclePolicy::Ignore);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_parse_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [memory]
            global_capacity_bytes = 65536

            [entities]
            chunk_capacity = 32

            [[entities.chunk_capacity_overrides]]
            type_id = 3
            chunk_capacity = 4

            [systems]
            cycle_policy = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.memory.global_capacity_bytes, 65536);
        assert_eq!(config.memory.system_arena_bytes, DEFAULT_SYSTEM_ARENA_BYTES);
        assert_eq!(config.entities.chunk_capacity_for(3), 4);
        assert_eq!(config.entities.chunk_capacity_for(9), 32);
        assert_eq!(config.systems.cycle_policy, CyclePolicy::Reject);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.entities.chunk_capacity_overrides.push(ChunkCapacityOverride {
            type_id: 1,
            chunk_capacity: 16,
        });
        config.systems.cycle_policy = CyclePolicy::Reject;

        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("[entities]\nchunk_capacity = 0"),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str(
                "[memory]\nglobal_capacity_bytes = 1024\nsystem_arena_bytes = 2048"
            ),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[systems]\ncycle_policy = \"sometimes\""),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[memory]\nunknown = 1"),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_override_rejected() {
        let mut config = EngineConfig::default();
        for _ in 0..2 {
            config.entities.chunk_capacity_overrides.push(ChunkCapacityOverride {
                type_id: 5,
                chunk_capacity: 8,
            });
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            EngineConfig::load("/nonexistent/tessera.toml"),
            Err(EcsError::InvalidConfig(_))
        ));
    }
}
