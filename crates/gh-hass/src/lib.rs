//! Minimal host-platform surface for the Google Home integration
//!
//! The integration was designed to be loaded into a home-automation host
//! that provides entity/device registries, a dispatcher signal bus, a state
//! store, and a polling update coordinator. This crate carries the slice of
//! that host the integration actually consumes, so the workspace is a
//! self-contained library. It is intentionally small: no persistence, no
//! areas or labels, no lifecycle machinery beyond what the platforms use.

pub mod coordinator;
pub mod device_registry;
pub mod dispatcher;
pub mod entity_registry;
pub mod state;

pub use coordinator::{DataUpdateCoordinator, UpdateError, UpdateSource};
pub use device_registry::{
    format_mac, DeviceConnection, DeviceEntry, DeviceIdentifier, DeviceInfo, DeviceRegistry,
    CONNECTION_NETWORK_MAC,
};
pub use dispatcher::{Dispatcher, TypedSignalReceiver};
pub use entity_registry::{DisabledBy, EntityEntry, EntityRegistry, EntityRegistryError};
pub use state::{State, StateStore};

use std::sync::Arc;

/// The host handle shared across one integration instance
///
/// Bundles the state store, dispatcher, and registries the way the host
/// hands them to a loaded integration.
pub struct Hass {
    pub states: StateStore,
    pub dispatcher: Dispatcher,
    pub entities: EntityRegistry,
    pub devices: DeviceRegistry,
}

impl Hass {
    pub fn new() -> Self {
        Self {
            states: StateStore::new(),
            dispatcher: Dispatcher::new(),
            entities: EntityRegistry::new(),
            devices: DeviceRegistry::new(),
        }
    }

    /// Shared handle, the shape platform setup functions expect
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for Hass {
    fn default() -> Self {
        Self::new()
    }
}
