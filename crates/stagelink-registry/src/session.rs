//! One live session: immutable configuration plus a mutable device roster.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use stagelink_core::config::{DeviceRole, SessionConfig, TargetScope};
use tokio::sync::RwLock;

use crate::ids;
use crate::link::DeviceLink;
use crate::registry::RegistryError;

/// A connected participant, exclusively owned by its session. The link is a
/// non-owning reference to the connection; closing the socket does not
/// destroy this record, the dispatcher's close handler removes it.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub role: DeviceRole,
    /// Current content location. Starts at the role's configured starting
    /// location; possibly stale, never empty; not validated against content.
    pub frame_id: String,
    pub joined_at: DateTime<Utc>,
    pub link: DeviceLink,
}

/// Link-free copy of a device record, handed across the registry boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub id: String,
    pub role: DeviceRole,
    pub frame_id: String,
    pub joined_at: DateTime<Utc>,
}

impl From<&Device> for DeviceSnapshot {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            role: device.role,
            frame_id: device.frame_id.clone(),
            joined_at: device.joined_at,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    devices: HashMap<String, Device>,
    last_activity: DateTime<Utc>,
}

/// A live, addressable instance of a published configuration.
///
/// Device-state mutations all go through the methods here and hold the
/// session's own write lock for the whole check-then-mutate step, so the
/// capacity and exclusivity invariants cannot be raced past by concurrent
/// joins.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub config: Arc<SessionConfig>,
    pub created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
}

impl Session {
    pub(crate) fn new(id: String, config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            config: Arc::new(config),
            created_at: now,
            state: RwLock::new(SessionState {
                devices: HashMap::new(),
                last_activity: now,
            }),
        }
    }

    /// Record an activity signal (lookups count as activity).
    pub async fn touch(&self) {
        self.state.write().await.last_activity = Utc::now();
    }

    pub async fn last_activity(&self) -> DateTime<Utc> {
        self.state.read().await.last_activity
    }

    #[cfg(test)]
    pub(crate) async fn backdate_last_activity(&self, ts: DateTime<Utc>) {
        self.state.write().await.last_activity = ts;
    }

    pub async fn device_count(&self) -> usize {
        self.state.read().await.devices.len()
    }

    pub async fn list_devices(&self) -> Vec<DeviceSnapshot> {
        let state = self.state.read().await;
        state.devices.values().map(DeviceSnapshot::from).collect()
    }

    pub async fn get_device(&self, device_id: &str) -> Option<DeviceSnapshot> {
        let state = self.state.read().await;
        state.devices.get(device_id).map(DeviceSnapshot::from)
    }

    /// Allocate a device for `role`, enforcing role exclusivity and capacity
    /// as one atomic step with the insertion.
    pub async fn try_add_device(
        &self,
        role: DeviceRole,
        link: DeviceLink,
    ) -> Result<DeviceSnapshot, RegistryError> {
        let mut state = self.state.write().await;

        match role {
            DeviceRole::Driver => {
                if state.devices.values().any(|d| d.role == DeviceRole::Driver) {
                    return Err(RegistryError::DriverSlotTaken);
                }
            }
            DeviceRole::Controller => {
                let controllers = state
                    .devices
                    .values()
                    .filter(|d| d.role == DeviceRole::Controller)
                    .count();
                if controllers as u32 >= self.config.max_controllers {
                    return Err(RegistryError::SessionFull {
                        capacity: self.config.max_controllers,
                    });
                }
            }
        }

        let device = Device {
            id: ids::device_id(),
            role,
            frame_id: self.config.devices.for_role(role).starting_frame_id.clone(),
            joined_at: Utc::now(),
            link,
        };
        let snapshot = DeviceSnapshot::from(&device);
        state.devices.insert(device.id.clone(), device);
        state.last_activity = Utc::now();
        Ok(snapshot)
    }

    /// Remove a device if present. Returns the removed record's snapshot and
    /// the remaining device count; removing an absent device is a no-op.
    pub async fn remove_device(&self, device_id: &str) -> (Option<DeviceSnapshot>, usize) {
        let mut state = self.state.write().await;
        let removed = state
            .devices
            .remove(device_id)
            .map(|d| DeviceSnapshot::from(&d));
        if removed.is_some() {
            state.last_activity = Utc::now();
        }
        (removed, state.devices.len())
    }

    /// Set a device's current location. Unknown locations are accepted; the
    /// orchestrator is location-agnostic.
    pub async fn update_device_frame(&self, device_id: &str, frame_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.devices.get_mut(device_id) {
            Some(device) => {
                device.frame_id = frame_id.to_owned();
                true
            }
            None => false,
        }
    }

    /// Every device link except the excluded id. Links are cloned out so the
    /// caller sends without holding the session lock.
    pub async fn links_except(&self, exclude: Option<&str>) -> Vec<(String, DeviceLink)> {
        let state = self.state.read().await;
        state
            .devices
            .values()
            .filter(|d| exclude != Some(d.id.as_str()))
            .map(|d| (d.id.clone(), d.link.clone()))
            .collect()
    }

    /// Resolve an addressing scope to concrete device links.
    ///
    /// `this-controller` resolves to the triggering device only when that
    /// device's role is controller. A driver-originated event against this
    /// scope yields no targets.
    pub async fn resolve_targets(
        &self,
        scope: TargetScope,
        triggering_device_id: &str,
    ) -> Vec<(String, DeviceLink)> {
        let state = self.state.read().await;
        state
            .devices
            .values()
            .filter(|d| match scope {
                TargetScope::Driver => d.role == DeviceRole::Driver,
                TargetScope::AllControllers => d.role == DeviceRole::Controller,
                TargetScope::ThisController => {
                    d.role == DeviceRole::Controller && d.id == triggering_device_id
                }
            })
            .map(|d| (d.id.clone(), d.link.clone()))
            .collect()
    }

    /// Fire every device's close token. Used by the session-delete boundary.
    pub async fn close_all_links(&self) {
        let state = self.state.read().await;
        for device in state.devices.values() {
            device.link.close();
        }
    }
}
