//! Device registry
//!
//! Tracks registered devices with identifier and connection indexes, and
//! accepts the `DeviceInfo` description entities expose to link themselves
//! to a parent device.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Connection type for network MAC addresses
pub const CONNECTION_NETWORK_MAC: &str = "mac";

/// A device identifier (domain, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// A device connection (type, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceConnection(pub String, pub String);

impl DeviceConnection {
    pub fn new(conn_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self(conn_type.into(), id.into())
    }

    pub fn connection_type(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }

    /// Create a normalized connection (MAC addresses lowercased)
    pub fn normalized(conn_type: impl Into<String>, id: impl Into<String>) -> Self {
        let ct = conn_type.into();
        let raw_id = id.into();
        let id = if ct == CONNECTION_NETWORK_MAC {
            format_mac(&raw_id)
        } else {
            raw_id
        };
        Self(ct, id)
    }
}

/// Normalize a MAC address to lowercase colon-separated form
///
/// Accepts colon-, dash-, dot-separated, and bare-hex spellings; anything
/// else is returned unchanged.
pub fn format_mac(mac: &str) -> String {
    if mac.len() == 17 && mac.chars().filter(|c| *c == ':').count() == 5 {
        return mac.to_lowercase();
    }

    let stripped = if mac.len() == 17 && mac.chars().filter(|c| *c == '-').count() == 5 {
        mac.replace('-', "")
    } else if mac.len() == 14 && mac.chars().filter(|c| *c == '.').count() == 2 {
        mac.replace('.', "")
    } else if mac.len() == 12 && mac.chars().all(|c| c.is_ascii_hexdigit()) {
        mac.to_string()
    } else {
        return mac.to_string();
    };

    stripped
        .to_lowercase()
        .as_bytes()
        .chunks(2)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(":")
}

/// The device description an entity exposes to link itself to a device
///
/// This is the shape the `device_info` accessor produces; the registry
/// resolves it into a `DeviceEntry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: HashSet<(String, String)>,
    pub name: String,
    #[serde(default)]
    pub connections: HashSet<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Identifier of the parent device, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_device: Option<(String, String)>,
}

/// A registered device entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal UUID
    pub id: String,
    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,
    #[serde(default)]
    pub connections: Vec<DeviceConnection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Parent device (for nested devices)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_device_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn new(name: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            identifiers: Vec::new(),
            connections: Vec::new(),
            name: name.map(|s| s.to_string()),
            manufacturer: None,
            model: None,
            via_device_id: None,
            created_at: now,
            modified_at: now,
        }
    }
}

/// Device registry with identifier and connection indexes
///
/// Entries are stored as `Arc<DeviceEntry>` to avoid cloning on reads.
pub struct DeviceRegistry {
    /// Primary index: device_id -> entry
    by_id: DashMap<String, Arc<DeviceEntry>>,
    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,
    /// Index: connection key -> device_id
    by_connection: DashMap<String, String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_identifier: DashMap::new(),
            by_connection: DashMap::new(),
        }
    }

    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();
        for identifier in &entry.identifiers {
            self.by_identifier
                .insert(identifier.key(), device_id.clone());
        }
        for connection in &entry.connections {
            self.by_connection
                .insert(connection.key(), device_id.clone());
        }
        self.by_id.insert(device_id, entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }
        for connection in &entry.connections {
            self.by_connection.remove(&connection.key());
        }
        self.by_id.remove(&entry.id);
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    pub fn get_by_identifier(&self, domain: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        let key = format!("{}:{}", domain, id);
        self.by_identifier
            .get(&key)
            .and_then(|device_id| self.get(&device_id))
    }

    pub fn get_by_connection(&self, conn_type: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        let key = DeviceConnection::normalized(conn_type, id).key();
        self.by_connection
            .get(&key)
            .and_then(|device_id| self.get(&device_id))
    }

    /// Get or create a device from an entity's `DeviceInfo`
    ///
    /// Looks up by identifiers first, then connections; creates a new entry
    /// when neither matches. The parent reference resolves only if the
    /// parent device is already registered.
    pub fn get_or_create(&self, info: &DeviceInfo) -> Arc<DeviceEntry> {
        for (domain, id) in &info.identifiers {
            if let Some(existing) = self.get_by_identifier(domain, id) {
                debug!("Found existing device by identifier: {}", existing.id);
                return existing;
            }
        }
        for (conn_type, id) in &info.connections {
            if let Some(existing) = self.get_by_connection(conn_type, id) {
                debug!("Found existing device by connection: {}", existing.id);
                return existing;
            }
        }

        let mut entry = DeviceEntry::new(Some(&info.name));
        entry.identifiers = info
            .identifiers
            .iter()
            .map(|(domain, id)| DeviceIdentifier::new(domain, id))
            .collect();
        entry.connections = info
            .connections
            .iter()
            .map(|(conn_type, id)| DeviceConnection::normalized(conn_type, id))
            .collect();
        entry.manufacturer = info.manufacturer.clone();
        entry.model = info.model.clone();
        entry.via_device_id = info
            .via_device
            .as_ref()
            .and_then(|(domain, id)| self.get_by_identifier(domain, id))
            .map(|parent| parent.id.clone());

        let arc_entry = Arc::new(entry);
        self.index_entry(Arc::clone(&arc_entry));

        info!("Registered new device: {} ({})", info.name, arc_entry.id);
        arc_entry
    }

    /// Remove a device, returning the removed entry
    pub fn remove(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        let entry = self.get(device_id)?;
        self.unindex_entry(&entry);
        info!("Removed device: {}", device_id);
        Some(entry)
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.by_id.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
