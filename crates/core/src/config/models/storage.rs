use serde::{Deserialize, Serialize};

use crate::config::validation::{ConfigValidator, ValidationUtils};
use crate::Result;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub url: String,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Sqlite,
            url: "sqlite://relay-events.db".to_string(),
            max_connections: 5,
        }
    }
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            kind: StorageKind::Memory,
            ..Default::default()
        }
    }
}

impl ConfigValidator for StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.kind == StorageKind::Sqlite {
            ValidationUtils::validate_url(&self.url, "storage.url")?;
            ValidationUtils::validate_count(
                self.max_connections as usize,
                "storage.max_connections",
                100,
            )?;
        }
        Ok(())
    }
}
