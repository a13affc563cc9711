//! Live session registry and broadcast router for the stagelink orchestrator.
//!
//! The registry is the single source of truth for "who is in this session".
//! It owns the map of live sessions and, within each, the connected device
//! roster; it enforces the capacity and role-exclusivity invariants
//! atomically, and it resolves addressing scopes to concrete connections for
//! fan-out.
//!
//! Locking is per-session: the session map sits behind one `RwLock`, each
//! session's device state behind its own. Lock order is always map before
//! session, and no lock is held across a network write: fan-out resolves
//! links under the lock, releases it, then sends.

mod ids;
pub mod link;
pub mod registry;
pub mod session;

pub use link::DeviceLink;
pub use registry::{RegistryError, RegistryStats, SessionRegistry, SessionStats};
pub use session::{DeviceSnapshot, Session};
