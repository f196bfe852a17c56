//! Object type catalog and annotation numbering

use crate::error::{AnnotateError, Result};
use std::collections::HashMap;
use tracing::info;
use vidmark_core::CatalogConfig;

const FALLBACK_COLOR: &str = "#808080";

/// A selectable object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub id: usize,
    pub name: String,
    pub color: String,
}

/// Numbers reserved for a new annotation of some type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub object_type: String,
    pub overall_index: usize,
    pub type_index: usize,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct TypeCatalog {
    types: Vec<ObjectType>,
    palette: Vec<String>,
    counters: HashMap<String, usize>,
    overall: usize,
}

impl TypeCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        let mut catalog = Self {
            types: Vec::with_capacity(config.default_types.len()),
            palette: config.palette.clone(),
            counters: HashMap::new(),
            overall: 0,
        };
        for name in &config.default_types {
            // Defaults come from config; a duplicate there is simply ignored.
            let _ = catalog.add_type(name);
        }
        catalog
    }

    pub fn types(&self) -> &[ObjectType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&ObjectType> {
        let needle = name.trim().to_lowercase();
        self.types.iter().find(|t| t.name.to_lowercase() == needle)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn color_for(&self, id: usize) -> String {
        if self.palette.is_empty() {
            return FALLBACK_COLOR.to_string();
        }
        self.palette[(id - 1) % self.palette.len()].clone()
    }

    /// Register a user-defined type. Names are trimmed and must be unique
    /// ignoring case.
    pub fn add_type(&mut self, name: &str) -> Result<&ObjectType> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AnnotateError::InvalidAnnotation(
                "Object type name cannot be empty".to_string(),
            ));
        }
        if self.contains(name) {
            return Err(AnnotateError::DuplicateObjectType(name.to_string()));
        }

        let id = self.types.len() + 1;
        let color = self.color_for(id);
        self.types.push(ObjectType {
            id,
            name: name.to_string(),
            color,
        });
        info!("Registered object type '{}' (id {})", name, id);
        Ok(&self.types[id - 1])
    }

    /// Reserve the next per-type and overall numbers for a new draft.
    pub fn allocate(&mut self, name: &str) -> Result<Allocation> {
        let object_type = self
            .get(name)
            .cloned()
            .ok_or_else(|| AnnotateError::UnknownObjectType(name.to_string()))?;

        let counter = self.counters.entry(object_type.name.clone()).or_insert(0);
        *counter += 1;
        let type_index = *counter;
        let overall_index = self.overall;
        self.overall += 1;

        Ok(Allocation {
            object_type: object_type.name,
            overall_index,
            type_index,
            color: object_type.color,
        })
    }

    /// How many drafts have been numbered for `name`.
    pub fn count_for(&self, name: &str) -> usize {
        self.get(name)
            .and_then(|t| self.counters.get(&t.name))
            .copied()
            .unwrap_or(0)
    }

    pub fn overall_count(&self) -> usize {
        self.overall
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new(&CatalogConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_types() {
        let catalog = TypeCatalog::default();
        assert_eq!(catalog.len(), 7);
        assert_eq!(catalog.types()[0].name, "Door");
        assert_eq!(catalog.types()[0].id, 1);
        assert_eq!(catalog.get("front desk").unwrap().id, 6);
    }

    #[test]
    fn test_add_custom_type() {
        let mut catalog = TypeCatalog::default();
        let added = catalog.add_type("  Vending Machine ").unwrap().clone();
        assert_eq!(added.name, "Vending Machine");
        assert_eq!(added.id, 8);
        assert!(!added.color.is_empty());
    }

    #[test]
    fn test_add_type_rejects_duplicates_and_blank() {
        let mut catalog = TypeCatalog::default();
        assert!(matches!(
            catalog.add_type("DOOR"),
            Err(AnnotateError::DuplicateObjectType(_))
        ));
        assert!(catalog.add_type("   ").is_err());
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn test_allocate_counters() {
        let mut catalog = TypeCatalog::default();
        let a = catalog.allocate("Door").unwrap();
        let b = catalog.allocate("door").unwrap();
        let c = catalog.allocate("Ramp").unwrap();

        assert_eq!((a.type_index, a.overall_index), (1, 0));
        assert_eq!((b.type_index, b.overall_index), (2, 1));
        assert_eq!((c.type_index, c.overall_index), (1, 2));
        assert_eq!(b.object_type, "Door");
        assert_eq!(catalog.count_for("Door"), 2);
        assert_eq!(catalog.overall_count(), 3);
    }

    #[test]
    fn test_allocate_unknown_type() {
        let mut catalog = TypeCatalog::default();
        assert!(matches!(
            catalog.allocate("Spaceship"),
            Err(AnnotateError::UnknownObjectType(_))
        ));
        assert_eq!(catalog.overall_count(), 0);
    }

    #[test]
    fn test_empty_palette_falls_back() {
        let config = CatalogConfig {
            default_types: vec!["Door".to_string()],
            palette: Vec::new(),
        };
        let catalog = TypeCatalog::new(&config);
        assert_eq!(catalog.types()[0].color, FALLBACK_COLOR);
    }
}
