//! Wire protocol between device connections and the orchestrator.
//!
//! Messages are JSON objects tagged by a `type` field. Each direction is a
//! closed tagged union so unknown-kind and malformed-payload handling are
//! explicit: an unrecognized inbound `type` deserializes to
//! [`ClientMessage::Unknown`] (logged and ignored), while a body that cannot
//! be parsed at all is answered with [`ServerMessage::Error`]. Unknown fields
//! inside a recognized message are ignored.

use crate::config::{DeviceRole, SessionConfig};
use serde::{Deserialize, Serialize};

// ─── Inbound ──────────────────────────────────────────────────────

/// Messages a device connection may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Bind this connection to a session as the given role.
    #[serde(rename = "JOIN_SESSION", rename_all = "camelCase")]
    JoinSession {
        session_id: String,
        device_type: DeviceRole,
    },
    /// The device moved to a new content location on its own.
    #[serde(rename = "NAVIGATE", rename_all = "camelCase")]
    Navigate {
        #[serde(default)]
        location_id: Option<String>,
    },
    /// An interaction happened on the device; runs rule match + dispatch.
    /// `interaction_type` is kept as the raw wire string so unrecognized
    /// kinds flow through the matcher (and match nothing) instead of
    /// failing the parse.
    #[serde(rename = "INTERACTION", rename_all = "camelCase")]
    Interaction {
        interaction_type: String,
        #[serde(default)]
        node_id: Option<String>,
        #[serde(default)]
        frame_id: Option<String>,
    },
    /// Liveness probe; answered with `PONG` in any state.
    #[serde(rename = "PING")]
    Ping,
    /// Any message kind this build does not recognize.
    #[serde(other)]
    Unknown,
}

// ─── Outbound ─────────────────────────────────────────────────────

/// Command verb carried by `EXECUTE_ACTION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Navigate,
    Restart,
    ChangeVariant,
}

/// Messages the orchestrator sends to a device connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "JOIN_SUCCESS", rename_all = "camelCase")]
    JoinSuccess {
        device_id: String,
        device_type: DeviceRole,
        config: SessionConfig,
        starting_frame_id: String,
    },
    /// Join/command rejected or malformed input.
    #[serde(rename = "ERROR")]
    Error { error: String },
    #[serde(rename = "DEVICE_JOINED", rename_all = "camelCase")]
    DeviceJoined {
        device_id: String,
        device_type: DeviceRole,
    },
    #[serde(rename = "DEVICE_LEFT", rename_all = "camelCase")]
    DeviceLeft { device_id: String },
    #[serde(rename = "DEVICE_NAVIGATED", rename_all = "camelCase")]
    DeviceNavigated { device_id: String, frame_id: String },
    /// Directed command produced by a triggered rule.
    #[serde(rename = "EXECUTE_ACTION", rename_all = "camelCase")]
    ExecuteAction {
        action: CommandKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant_id: Option<String>,
        triggered_by: String,
        rule_id: String,
        rule_name: String,
    },
    #[serde(rename = "PONG")]
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_session_parses() {
        let json = r#"{"type": "JOIN_SESSION", "sessionId": "abc123", "deviceType": "controller"}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(
            msg,
            ClientMessage::JoinSession {
                session_id: "abc123".into(),
                device_type: DeviceRole::Controller,
            }
        );
    }

    #[test]
    fn navigate_field_is_location_id() {
        let json = r#"{"type": "NAVIGATE", "locationId": "F4"}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(
            msg,
            ClientMessage::Navigate {
                location_id: Some("F4".into())
            }
        );
    }

    #[test]
    fn navigate_without_location_still_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "NAVIGATE"}"#).expect("parse");
        assert_eq!(msg, ClientMessage::Navigate { location_id: None });
    }

    #[test]
    fn interaction_parses_with_optional_fields() {
        let json = r#"{"type": "INTERACTION", "interactionType": "TAP", "nodeId": "btn1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(
            msg,
            ClientMessage::Interaction {
                interaction_type: "TAP".into(),
                node_id: Some("btn1".into()),
                frame_id: None,
            }
        );
    }

    #[test]
    fn unknown_type_becomes_unknown_variant() {
        let json = r#"{"type": "TELEPORT", "somewhere": "else"}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn unknown_extra_fields_ignored() {
        let json = r#"{"type": "PING", "extra": 42}"#;
        let msg: ClientMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn malformed_body_fails_to_parse() {
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"kind": "PING"}"#).is_err());
    }

    #[test]
    fn execute_action_omits_absent_fields() {
        let msg = ServerMessage::ExecuteAction {
            action: CommandKind::Restart,
            frame_id: None,
            frame_name: None,
            node_id: None,
            variant_id: None,
            triggered_by: "dev1".into(),
            rule_id: "r1".into(),
            rule_name: "restart all".into(),
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "EXECUTE_ACTION");
        assert_eq!(json["action"], "RESTART");
        assert_eq!(json["triggeredBy"], "dev1");
        assert_eq!(json["ruleId"], "r1");
        assert!(json.get("frameId").is_none());
        assert!(json.get("variantId").is_none());
    }

    #[test]
    fn execute_action_navigate_carries_frame() {
        let msg = ServerMessage::ExecuteAction {
            action: CommandKind::Navigate,
            frame_id: Some("F2".into()),
            frame_name: Some("Results".into()),
            node_id: None,
            variant_id: None,
            triggered_by: "dev1".into(),
            rule_id: "r1".into(),
            rule_name: "advance".into(),
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["action"], "NAVIGATE");
        assert_eq!(json["frameId"], "F2");
        assert_eq!(json["frameName"], "Results");
    }

    #[test]
    fn device_navigated_wire_shape() {
        let msg = ServerMessage::DeviceNavigated {
            device_id: "dev1".into(),
            frame_id: "F3".into(),
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["type"], "DEVICE_NAVIGATED");
        assert_eq!(json["deviceId"], "dev1");
        assert_eq!(json["frameId"], "F3");
    }

    #[test]
    fn pong_is_bare() {
        let json = serde_json::to_string(&ServerMessage::Pong).expect("serialize");
        assert_eq!(json, r#"{"type":"PONG"}"#);
    }
}
