//! Core data model and pure logic for the stagelink orchestrator.
//!
//! Everything in this crate is I/O-free: configuration and rule types as
//! published by the authoring tool, interaction events, the rule matcher,
//! author-time validation, and the tagged wire-protocol message types shared
//! by the dispatcher and its clients.

pub mod config;
pub mod event;
pub mod matcher;
pub mod protocol;
pub mod validate;

pub use config::{DeviceRole, Rule, SessionConfig, TargetScope};
pub use event::{InteractionEvent, InteractionKind};
