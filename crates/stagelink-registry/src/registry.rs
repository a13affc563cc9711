//! Session map, lifecycle, and message fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use stagelink_core::config::{DeviceRole, SessionConfig, TargetScope};
use stagelink_core::protocol::ServerMessage;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ids;
use crate::link::DeviceLink;
use crate::session::{DeviceSnapshot, Session};

/// Empty sessions older than this are reaped on the next create.
const DEFAULT_IDLE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session not found")]
    SessionNotFound,
    #[error("A TV is already connected to this session")]
    DriverSlotTaken,
    #[error("Session is full (max {capacity} players)")]
    SessionFull { capacity: u32 },
}

/// Per-session view used by the observability endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: String,
    pub file_name: String,
    pub device_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub session_count: usize,
    pub sessions: Vec<SessionStats>,
}

/// Owner of all live sessions.
///
/// The map lock is held only long enough to look up or change an entry;
/// device-level work happens under the individual session's lock. See the
/// crate docs for the lock order.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    idle_window: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_idle_window(Duration::hours(DEFAULT_IDLE_WINDOW_HOURS))
    }

    /// Registry with a custom reap window. Tests shrink it to exercise the
    /// reap path without waiting a day.
    pub fn with_idle_window(idle_window: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_window,
        }
    }

    /// Publish a configuration as a new live session and return its handle.
    ///
    /// Creation doubles as the passive cleanup point: empty sessions idle
    /// past the window are reaped first.
    pub async fn create_session(&self, config: SessionConfig) -> Arc<Session> {
        self.reap_idle_sessions().await;

        let id = ids::session_id();
        let session = Arc::new(Session::new(id.clone(), config));
        self.sessions.write().await.insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, file = %session.config.file_name, "session created");
        session
    }

    /// Look up a live session and mark it active.
    pub async fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        };
        if let Some(session) = &session {
            session.touch().await;
        }
        session
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Admit a device into a session. The whole check-then-insert step is
    /// atomic under the session lock, so two racing joins for the driver
    /// slot (or the last controller slot) cannot both succeed.
    ///
    /// Returns the session handle alongside the new device so the caller can
    /// answer the join from the same session the device was admitted to; a
    /// second lookup could miss if the session is deleted concurrently.
    pub async fn add_device(
        &self,
        session_id: &str,
        role: DeviceRole,
        link: DeviceLink,
    ) -> Result<(Arc<Session>, DeviceSnapshot), RegistryError> {
        let session = self
            .get_session(session_id)
            .await
            .ok_or(RegistryError::SessionNotFound)?;
        let snapshot = session.try_add_device(role, link).await?;
        info!(
            session_id = %session_id,
            device_id = %snapshot.id,
            role = %snapshot.role,
            "device joined"
        );
        Ok((session, snapshot))
    }

    /// Drop a device from its session; deletes the session once the last
    /// device leaves. Removing an unknown device or session is a no-op.
    pub async fn remove_device(
        &self,
        session_id: &str,
        device_id: &str,
    ) -> Option<DeviceSnapshot> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        }?;

        let (removed, remaining) = session.remove_device(device_id).await;
        if let Some(snapshot) = &removed {
            info!(
                session_id = %session_id,
                device_id = %snapshot.id,
                role = %snapshot.role,
                remaining,
                "device left"
            );
            if remaining == 0 {
                // Re-check under the write lock; a join may have landed in
                // the meantime.
                let mut sessions = self.sessions.write().await;
                if let Some(candidate) = sessions.get(session_id) {
                    if candidate.device_count().await == 0 {
                        sessions.remove(session_id);
                        info!(session_id = %session_id, "session deleted (empty)");
                    }
                }
            }
        }
        removed
    }

    /// Record a device's new location. Returns `false` when the session or
    /// device is unknown.
    pub async fn update_device_frame(
        &self,
        session_id: &str,
        device_id: &str,
        frame_id: &str,
    ) -> bool {
        match self.get_session(session_id).await {
            Some(session) => session.update_device_frame(device_id, frame_id).await,
            None => {
                warn!(session_id = %session_id, "frame update for unknown session");
                false
            }
        }
    }

    pub async fn get_device(
        &self,
        session_id: &str,
        device_id: &str,
    ) -> Option<DeviceSnapshot> {
        self.get_session(session_id).await?.get_device(device_id).await
    }

    pub async fn list_devices(&self, session_id: &str) -> Vec<DeviceSnapshot> {
        match self.get_session(session_id).await {
            Some(session) => session.list_devices().await,
            None => Vec::new(),
        }
    }

    /// Send a message to every device in a session, optionally excluding one
    /// (usually the originator). Serializes once, resolves recipients under
    /// the session lock, then sends with no lock held. Returns the delivered
    /// count; unreachable connections are skipped.
    pub async fn broadcast_to_session(
        &self,
        session_id: &str,
        message: &ServerMessage,
        exclude: Option<&str>,
    ) -> usize {
        let Some(session) = self.get_session(session_id).await else {
            return 0;
        };
        let links = session.links_except(exclude).await;
        self.deliver(session_id, links, message)
    }

    /// Send a message to every device an addressing scope resolves to.
    pub async fn send_to_targets(
        &self,
        session_id: &str,
        scope: TargetScope,
        triggering_device_id: &str,
        message: &ServerMessage,
    ) -> usize {
        let Some(session) = self.get_session(session_id).await else {
            return 0;
        };
        let links = session.resolve_targets(scope, triggering_device_id).await;
        self.deliver(session_id, links, message)
    }

    fn deliver(
        &self,
        session_id: &str,
        links: Vec<(String, DeviceLink)>,
        message: &ServerMessage,
    ) -> usize {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast message");
                return 0;
            }
        };
        let mut delivered = 0;
        for (device_id, link) in links {
            if link.send_raw(text.clone()) {
                delivered += 1;
            } else {
                debug!(session_id = %session_id, device_id = %device_id, "skipped unreachable device");
            }
        }
        delivered
    }

    /// Tear a session down: force-close every device connection and remove
    /// the entry. Returns `false` for an unknown session.
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id)
        };
        match session {
            Some(session) => {
                session.close_all_links().await;
                info!(session_id = %session_id, "session deleted");
                true
            }
            None => false,
        }
    }

    pub async fn stats(&self) -> RegistryStats {
        let sessions: Vec<Arc<Session>> = {
            let map = self.sessions.read().await;
            map.values().cloned().collect()
        };
        let mut stats = Vec::with_capacity(sessions.len());
        for session in sessions {
            stats.push(SessionStats {
                session_id: session.id.clone(),
                file_name: session.config.file_name.clone(),
                device_count: session.device_count().await,
                created_at: session.created_at,
                last_activity: session.last_activity().await,
            });
        }
        stats.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        RegistryStats {
            session_count: stats.len(),
            sessions: stats,
        }
    }

    async fn reap_idle_sessions(&self) {
        let cutoff = Utc::now() - self.idle_window;
        let candidates: Vec<String> = {
            let sessions = self.sessions.read().await;
            let mut ids = Vec::new();
            for (id, session) in sessions.iter() {
                if session.device_count().await == 0
                    && session.last_activity().await < cutoff
                {
                    ids.push(id.clone());
                }
            }
            ids
        };
        if candidates.is_empty() {
            return;
        }
        let mut sessions = self.sessions.write().await;
        for id in candidates {
            // Re-check: a device may have joined since the scan.
            if let Some(session) = sessions.get(&id) {
                if session.device_count().await == 0 && session.last_activity().await < cutoff {
                    sessions.remove(&id);
                    info!(session_id = %id, "reaped idle session");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn backdate_session(&self, session_id: &str, ts: DateTime<Utc>) {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            session.backdate_last_activity(ts).await;
        }
    }
}
