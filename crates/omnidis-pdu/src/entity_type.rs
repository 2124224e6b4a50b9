//! Entity type codes and the name lookup table.
//!
//! Telemetry sources name their entity class with free text
//! (`generic_ship_container_class_small`). The registry resolves such names
//! into the structured 8-byte DIS code, and also accepts a raw
//! `kind:domain:country:category:subcategory:specific:extra` string.

use bytes::{Buf, BufMut};
use omnidis_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Structured DIS entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntityType {
    pub kind: u8,
    pub domain: u8,
    pub country: u16,
    pub category: u8,
    pub subcategory: u8,
    pub specific: u8,
    pub extra: u8,
}

impl EntityType {
    /// Wire size in bytes
    pub const LENGTH: usize = 8;

    pub const fn new(
        kind: u8,
        domain: u8,
        country: u16,
        category: u8,
        subcategory: u8,
        specific: u8,
        extra: u8,
    ) -> Self {
        Self {
            kind,
            domain,
            country,
            category,
            subcategory,
            specific,
            extra,
        }
    }

    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.kind);
        buf.put_u8(self.domain);
        buf.put_u16(self.country);
        buf.put_u8(self.category);
        buf.put_u8(self.subcategory);
        buf.put_u8(self.specific);
        buf.put_u8(self.extra);
    }

    /// Reads 8 bytes; the caller checks the length.
    pub(crate) fn read<B: Buf>(buf: &mut B) -> Self {
        Self {
            kind: buf.get_u8(),
            domain: buf.get_u8(),
            country: buf.get_u16(),
            category: buf.get_u8(),
            subcategory: buf.get_u8(),
            specific: buf.get_u8(),
            extra: buf.get_u8(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.kind,
            self.domain,
            self.country,
            self.category,
            self.subcategory,
            self.specific,
            self.extra
        )
    }
}

impl FromStr for EntityType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::UnknownEntityType {
            name: s.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 7 {
            return Err(invalid());
        }

        let byte = |i: usize| parts[i].trim().parse::<u8>().map_err(|_| invalid());

        Ok(Self {
            kind: byte(0)?,
            domain: byte(1)?,
            country: parts[2].trim().parse::<u16>().map_err(|_| invalid())?,
            category: byte(3)?,
            subcategory: byte(4)?,
            specific: byte(5)?,
            extra: byte(6)?,
        })
    }
}

/// Generic container ship, medium (3,000 to 10,000 TEU)
pub const GENERIC_SHIP_CONTAINER_CLASS_MEDIUM: EntityType = EntityType::new(1, 3, 0, 61, 2, 1, 0);

/// Generic container ship, small
pub const GENERIC_SHIP_CONTAINER_CLASS_SMALL: EntityType = EntityType::new(1, 3, 0, 61, 1, 3, 0);

/// Name to entity type lookup.
#[derive(Debug, Clone)]
pub struct EntityTypeRegistry {
    entries: HashMap<String, EntityType>,
}

impl Default for EntityTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTypeRegistry {
    /// Registry holding the built-in maritime entity types.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "generic_ship_container_class_medium".to_string(),
            GENERIC_SHIP_CONTAINER_CLASS_MEDIUM,
        );
        entries.insert(
            "generic_ship_container_class_small".to_string(),
            GENERIC_SHIP_CONTAINER_CLASS_SMALL,
        );
        Self { entries }
    }

    /// Registry with the built-ins plus `name → raw code` entries from
    /// configuration. Configured entries override built-ins of the same name.
    pub fn with_table(table: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (name, code) in table {
            let entity_type = code.parse::<EntityType>().map_err(|_| {
                ConfigError::invalid_value(
                    format!("entity.type_table.{name}"),
                    format!("Invalid entity type code: {code}"),
                )
            })?;
            registry.register(name.clone(), entity_type);
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, entity_type: EntityType) {
        let name = name.into();
        debug!(%name, %entity_type, "Registered entity type");
        self.entries.insert(name, entity_type);
    }

    pub fn get(&self, name: &str) -> Option<EntityType> {
        self.entries.get(name).copied()
    }

    /// Resolves a name, falling back to parsing a raw code.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownEntityType`] if `name` is neither a
    /// registered name nor a valid raw code.
    pub fn resolve(&self, name: &str) -> Result<EntityType, ConfigError> {
        if let Some(entity_type) = self.get(name.trim()) {
            return Ok(entity_type);
        }

        name.parse::<EntityType>()
            .map_err(|_| ConfigError::UnknownEntityType {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
