//! Interaction events as the dispatcher hands them to the rule matcher.

use crate::config::DeviceRole;
use std::fmt;

/// Kind of interaction reported by a device. Parsed from the inbound
/// `interactionType` wire string; unrecognized kinds are carried as
/// [`InteractionKind::Other`] and never match a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Tap,
    LocationVisible,
    VariantChange,
    Other,
}

impl InteractionKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "TAP" => Self::Tap,
            "FRAME_VISIBLE" => Self::LocationVisible,
            "VARIANT_CHANGE" => Self::VariantChange,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tap => "TAP",
            Self::LocationVisible => "FRAME_VISIBLE",
            Self::VariantChange => "VARIANT_CHANGE",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single interaction on one device, resolved against the rule set.
///
/// `frame_id` is the location the event happened at: the explicit wire value
/// when present, otherwise the device's current location as recorded by the
/// registry.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEvent {
    pub device: DeviceRole,
    pub kind: InteractionKind,
    pub node_id: Option<String>,
    pub frame_id: Option<String>,
}
