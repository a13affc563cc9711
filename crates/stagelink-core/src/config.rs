//! Session configuration document as handed over by the authoring tool.
//!
//! The document arrives as JSON with camelCase keys and SCREAMING_SNAKE_CASE
//! type tags; unknown fields are ignored so older orchestrators tolerate
//! newer authoring tools. Kind-specific identifying fields are optional at
//! the type level; [`crate::validate`] enforces their presence at author
//! time, and the live dispatch path skips what is missing.

use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Roles ────────────────────────────────────────────────────────

/// The two device classes a session hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// The single display-class device per session.
    Driver,
    /// A participant-class device, multiple allowed up to capacity.
    Controller,
}

impl DeviceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Controller => "controller",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Target scope ─────────────────────────────────────────────────

/// Addressing mode for a rule's actions, resolved against the live device
/// set at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetScope {
    /// The single driver device, if present.
    Driver,
    /// Every controller device.
    AllControllers,
    /// The controller device that caused the triggering event.
    ThisController,
}

// ─── Triggers ─────────────────────────────────────────────────────

/// Predicate that activates a rule: originating role plus a kind-specific
/// identity check.
///
/// Role and kind are optional at the type level so a half-authored trigger
/// still parses as part of the document; [`crate::validate`] reports what is
/// missing, and the matcher treats an incomplete trigger as never matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TriggerWire")]
pub struct Trigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceRole>,
    #[serde(flatten)]
    pub kind: Option<TriggerKind>,
}

/// Lenient deserialization shape for [`Trigger`]. A flattened tagged enum
/// refuses documents whose tag is absent, so the kind is reassembled from
/// loose fields instead.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerWire {
    #[serde(default)]
    device: Option<DeviceRole>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    node_id: Option<String>,
    #[serde(default)]
    frame_id: Option<String>,
}

impl From<TriggerWire> for Trigger {
    fn from(wire: TriggerWire) -> Self {
        let kind = match wire.kind.as_deref() {
            Some("TAP_ELEMENT") => Some(TriggerKind::ElementTap {
                node_id: wire.node_id,
            }),
            Some("FRAME_VISIBLE") => Some(TriggerKind::LocationVisible {
                frame_id: wire.frame_id,
            }),
            Some("VARIANT_CHANGE") => Some(TriggerKind::VariantChange {
                node_id: wire.node_id,
            }),
            _ => None,
        };
        Self {
            device: wire.device,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TriggerKind {
    /// An element was tapped on the originating device.
    #[serde(rename = "TAP_ELEMENT", rename_all = "camelCase")]
    ElementTap {
        #[serde(default)]
        node_id: Option<String>,
    },
    /// A content location became visible on the originating device.
    #[serde(rename = "FRAME_VISIBLE", rename_all = "camelCase")]
    LocationVisible {
        #[serde(default)]
        frame_id: Option<String>,
    },
    /// An element's variant changed on the originating device.
    #[serde(rename = "VARIANT_CHANGE", rename_all = "camelCase")]
    VariantChange {
        #[serde(default)]
        node_id: Option<String>,
    },
}

// ─── Actions ──────────────────────────────────────────────────────

/// A directive executed against every device in the rule's resolved target
/// set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleAction {
    #[serde(rename = "NAVIGATE_TO_FRAME", rename_all = "camelCase")]
    NavigateToFrame {
        #[serde(default)]
        frame_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_name: Option<String>,
    },
    /// Restart the target devices back to their starting location.
    #[serde(rename = "RESTART")]
    Restart,
    #[serde(rename = "CHANGE_VARIANT", rename_all = "camelCase")]
    ChangeVariant {
        #[serde(default)]
        node_id: Option<String>,
        #[serde(default)]
        variant_id: Option<String>,
    },
}

// ─── Rules ────────────────────────────────────────────────────────

/// One authored rule. Rules are evaluated as a flat ordered scan in
/// configuration order; all matching enabled rules fire, each executing its
/// full action list independently.
///
/// `trigger` and `target` are optional so that author-time validation can
/// report their absence instead of refusing to parse the document; the
/// matcher treats a rule missing either as never matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub target: Option<TargetScope>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}

// ─── Session configuration ────────────────────────────────────────

/// Per-role starting point in the underlying content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    pub starting_frame_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_frame_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfigs {
    pub driver: RoleConfig,
    pub controller: RoleConfig,
}

impl RoleConfigs {
    pub fn for_role(&self, role: DeviceRole) -> &RoleConfig {
        match role {
            DeviceRole::Driver => &self.driver,
            DeviceRole::Controller => &self.controller,
        }
    }
}

/// The validated configuration document a session is created from.
/// Immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub config_version: String,
    #[serde(default)]
    pub file_name: String,
    pub devices: RoleConfigs,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Capacity limit for controller devices (1..=10).
    pub max_controllers: u32,
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config_json() -> &'static str {
        r#"{
            "configVersion": "1.0",
            "fileName": "demo.proto",
            "devices": {
                "driver": { "startingFrameId": "F1", "startingFrameName": "Lobby" },
                "controller": { "startingFrameId": "F9" }
            },
            "rules": [
                {
                    "id": "r1",
                    "name": "tap to advance",
                    "enabled": true,
                    "trigger": { "device": "controller", "type": "TAP_ELEMENT", "nodeId": "btn1" },
                    "target": "driver",
                    "actions": [ { "type": "NAVIGATE_TO_FRAME", "frameId": "F2" } ]
                }
            ],
            "maxControllers": 4
        }"#
    }

    #[test]
    fn config_parses_from_authoring_document() {
        let config: SessionConfig = serde_json::from_str(sample_config_json()).expect("parse");
        assert_eq!(config.file_name, "demo.proto");
        assert_eq!(config.max_controllers, 4);
        assert_eq!(config.devices.driver.starting_frame_id, "F1");
        assert_eq!(config.devices.controller.starting_frame_id, "F9");
        assert_eq!(config.rules.len(), 1);

        let rule = &config.rules[0];
        assert!(rule.enabled);
        let trigger = rule.trigger.as_ref().expect("trigger");
        assert_eq!(trigger.device, Some(DeviceRole::Controller));
        assert_eq!(
            trigger.kind,
            Some(TriggerKind::ElementTap {
                node_id: Some("btn1".into())
            })
        );
        assert_eq!(rule.target, Some(TargetScope::Driver));
        assert_eq!(
            rule.actions[0],
            RuleAction::NavigateToFrame {
                frame_id: Some("F2".into()),
                frame_name: None,
            }
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "devices": {
                "driver": { "startingFrameId": "F1", "pageId": "p1" },
                "controller": { "startingFrameId": "F2" }
            },
            "maxControllers": 1,
            "futureField": { "anything": true }
        }"#;
        let config: SessionConfig = serde_json::from_str(json).expect("parse");
        assert!(config.rules.is_empty());
    }

    #[test]
    fn target_scope_wire_names() {
        assert_eq!(
            serde_json::to_string(&TargetScope::AllControllers).expect("serialize"),
            "\"all-controllers\""
        );
        assert_eq!(
            serde_json::from_str::<TargetScope>("\"this-controller\"").expect("parse"),
            TargetScope::ThisController
        );
        assert_eq!(
            serde_json::from_str::<TargetScope>("\"driver\"").expect("parse"),
            TargetScope::Driver
        );
    }

    #[test]
    fn rule_without_trigger_or_target_still_parses() {
        let json = r#"{ "id": "r9", "name": "incomplete" }"#;
        let rule: Rule = serde_json::from_str(json).expect("parse");
        assert!(rule.trigger.is_none());
        assert!(rule.target.is_none());
        assert!(rule.actions.is_empty());
        // enabled defaults to true like the authoring tool emits
        assert!(rule.enabled);
    }

    #[test]
    fn trigger_serde_roundtrip() {
        let trigger = Trigger {
            device: Some(DeviceRole::Driver),
            kind: Some(TriggerKind::LocationVisible {
                frame_id: Some("F3".into()),
            }),
        };
        let json = serde_json::to_value(&trigger).expect("serialize");
        assert_eq!(json["type"], "FRAME_VISIBLE");
        assert_eq!(json["device"], "driver");
        assert_eq!(json["frameId"], "F3");
        let back: Trigger = serde_json::from_value(json).expect("deserialize");
        assert_eq!(trigger, back);
    }

    #[test]
    fn trigger_without_device_still_parses() {
        let json = r#"{ "type": "TAP_ELEMENT", "nodeId": "btn1" }"#;
        let trigger: Trigger = serde_json::from_str(json).expect("parse");
        assert!(trigger.device.is_none());
        assert_eq!(
            trigger.kind,
            Some(TriggerKind::ElementTap {
                node_id: Some("btn1".into())
            })
        );
    }

    #[test]
    fn trigger_without_type_parses_with_no_kind() {
        let json = r#"{ "device": "controller", "nodeId": "btn1" }"#;
        let trigger: Trigger = serde_json::from_str(json).expect("parse");
        assert_eq!(trigger.device, Some(DeviceRole::Controller));
        assert!(trigger.kind.is_none());

        // Unrecognized kinds degrade the same way instead of failing the
        // whole document.
        let json = r#"{ "device": "controller", "type": "HOVER" }"#;
        let trigger: Trigger = serde_json::from_str(json).expect("parse");
        assert!(trigger.kind.is_none());
    }
}
