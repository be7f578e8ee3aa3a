//! Entity registry
//!
//! Tracks registered entities with unique_id deduplication, device linking,
//! and indexes for the lookups the platforms perform.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur in the entity registry
#[derive(Debug, Error, Clone)]
pub enum EntityRegistryError {
    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// Reason an entity was disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledBy {
    /// Disabled by the integration (e.g., new devices opt-out)
    Integration,
    /// Disabled by the user
    User,
}

/// A registered entity entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Internal id
    pub id: String,
    /// Full entity ID (domain.object_id)
    pub entity_id: String,
    /// Platform-specific unique identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    /// Parent device ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Integration that provides this entity
    pub platform: String,
    /// Disable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_by: Option<DisabledBy>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl EntityEntry {
    pub fn new(
        entity_id: impl Into<String>,
        platform: impl Into<String>,
        unique_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            entity_id: entity_id.into(),
            unique_id,
            device_id: None,
            platform: platform.into(),
            disabled_by: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Get the domain from entity_id
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or(&self.entity_id)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_by.is_some()
    }
}

/// Entity registry with unique_id and device indexes
///
/// Entries are stored as `Arc<EntityEntry>` to avoid cloning on reads.
pub struct EntityRegistry {
    /// Primary index: entity_id -> entry
    by_entity_id: DashMap<String, Arc<EntityEntry>>,
    /// Index: unique_id -> entity_id
    by_unique_id: DashMap<String, String>,
    /// Index: device_id -> set of entity_ids
    by_device_id: DashMap<String, HashSet<String>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            by_entity_id: DashMap::new(),
            by_unique_id: DashMap::new(),
            by_device_id: DashMap::new(),
        }
    }

    fn index_entry(&self, entry: Arc<EntityEntry>) {
        let entity_id = entry.entity_id.clone();
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert(unique_id.clone(), entity_id.clone());
        }
        if let Some(ref device_id) = entry.device_id {
            self.by_device_id
                .entry(device_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }
        self.by_entity_id.insert(entity_id, entry);
    }

    fn unindex_entry(&self, entry: &EntityEntry) {
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id.remove(unique_id);
        }
        if let Some(ref device_id) = entry.device_id {
            if let Some(mut ids) = self.by_device_id.get_mut(device_id) {
                ids.remove(&entry.entity_id);
            }
        }
        self.by_entity_id.remove(&entry.entity_id);
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id.get(entity_id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_unique_id
            .get(unique_id)
            .and_then(|entity_id| self.get(&entity_id))
    }

    /// All entities linked to a device, disabled ones included
    pub fn entries_for_device(&self, device_id: &str) -> Vec<Arc<EntityEntry>> {
        self.by_device_id
            .get(device_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn is_registered(&self, entity_id: &str) -> bool {
        self.by_entity_id.contains_key(entity_id)
    }

    /// Get or create an entity entry
    ///
    /// Registration is idempotent per unique_id: re-registering a known
    /// unique_id returns the existing entry untouched.
    pub fn get_or_create(
        &self,
        platform: &str,
        entity_id: &str,
        unique_id: Option<&str>,
        device_id: Option<&str>,
        disabled_by: Option<DisabledBy>,
    ) -> Arc<EntityEntry> {
        if let Some(uid) = unique_id {
            if let Some(existing) = self.get_by_unique_id(uid) {
                debug!("Found existing entity by unique_id: {}", existing.entity_id);
                return existing;
            }
        }
        if let Some(existing) = self.get(entity_id) {
            return existing;
        }

        let mut entry = EntityEntry::new(entity_id, platform, unique_id.map(String::from));
        entry.device_id = device_id.map(String::from);
        entry.disabled_by = disabled_by;

        let arc_entry = Arc::new(entry);
        self.index_entry(Arc::clone(&arc_entry));

        info!("Registered new entity: {}", entity_id);
        arc_entry
    }

    /// Update an entity entry
    pub fn update<F>(&self, entity_id: &str, f: F) -> Result<Arc<EntityEntry>, EntityRegistryError>
    where
        F: FnOnce(&mut EntityEntry),
    {
        if let Some((_, arc_entry)) = self.by_entity_id.remove(entity_id) {
            let mut entry = (*arc_entry).clone();
            self.unindex_entry(&entry);

            f(&mut entry);
            entry.modified_at = Utc::now();

            let new_arc = Arc::new(entry);
            self.index_entry(Arc::clone(&new_arc));
            Ok(new_arc)
        } else {
            Err(EntityRegistryError::NotFound(entity_id.to_string()))
        }
    }

    /// Remove an entity, returning the removed entry
    pub fn remove(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        let entry = self.get(entity_id)?;
        self.unindex_entry(&entry);
        info!("Removed entity: {}", entity_id);
        Some(entry)
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.by_entity_id.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_entity_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity_id.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_dedups_by_unique_id() {
        let registry = EntityRegistry::new();
        let first = registry.get_or_create(
            "google_home",
            "device_tracker.phone",
            Some("aabbccddeeff"),
            None,
            None,
        );
        let second = registry.get_or_create(
            "google_home",
            "device_tracker.phone_2",
            Some("aabbccddeeff"),
            None,
            None,
        );
        assert_eq!(first.entity_id, second.entity_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entries_for_device_includes_disabled() {
        let registry = EntityRegistry::new();
        registry.get_or_create(
            "google_home",
            "device_tracker.phone",
            Some("u1"),
            Some("dev-1"),
            None,
        );
        registry.get_or_create(
            "google_home",
            "device_tracker.watch",
            Some("u2"),
            Some("dev-1"),
            Some(DisabledBy::Integration),
        );

        let entries = registry.entries_for_device("dev-1");
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.is_disabled()));
    }

    #[test]
    fn test_remove_clears_indexes() {
        let registry = EntityRegistry::new();
        registry.get_or_create(
            "google_home",
            "device_tracker.phone",
            Some("u1"),
            Some("dev-1"),
            None,
        );

        assert!(registry.remove("device_tracker.phone").is_some());
        assert!(!registry.is_registered("device_tracker.phone"));
        assert!(registry.get_by_unique_id("u1").is_none());
        assert!(registry.entries_for_device("dev-1").is_empty());
        assert!(registry.remove("device_tracker.phone").is_none());
    }

    #[test]
    fn test_update_reindexes() {
        let registry = EntityRegistry::new();
        registry.get_or_create("google_home", "sensor.alarms", Some("u1"), None, None);

        let updated = registry
            .update("sensor.alarms", |e| {
                e.device_id = Some("dev-9".to_string());
            })
            .unwrap();
        assert_eq!(updated.device_id.as_deref(), Some("dev-9"));
        assert_eq!(registry.entries_for_device("dev-9").len(), 1);

        assert!(registry.update("sensor.missing", |_| {}).is_err());
    }
}
