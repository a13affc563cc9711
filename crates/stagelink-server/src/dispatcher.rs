//! Per-connection protocol loop.
//!
//! Each WebSocket connection gets one task running [`handle_connection`]. The
//! task owns the socket; everything the rest of the system wants to send to
//! this device goes through the connection's [`DeviceLink`] queue and is
//! drained here. A connection is anonymous until its first successful
//! `JOIN_SESSION`, after which it is bound to exactly one device in exactly
//! one session for its lifetime.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use stagelink_core::config::{Rule, RuleAction};
use stagelink_core::event::{InteractionEvent, InteractionKind};
use stagelink_core::matcher::find_matching_rules;
use stagelink_core::protocol::{ClientMessage, CommandKind, ServerMessage};
use stagelink_registry::link::{DeviceLink, SEND_QUEUE_DEPTH};
use stagelink_registry::SessionRegistry;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// Which device this connection speaks for, set by a successful join.
struct Binding {
    session_id: String,
    device_id: String,
}

/// Drive one client connection to completion, then clean up its device
/// registration. Cleanup runs on every exit path, including read errors and
/// server shutdown, so a vanished device always produces a `DEVICE_LEFT`.
pub async fn handle_connection(
    ws_stream: WsStream,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
) {
    let (out_tx, out_rx) = mpsc::channel(SEND_QUEUE_DEPTH);
    let conn_cancel = cancel.child_token();
    let link = DeviceLink::new(out_tx, conn_cancel.clone());

    let mut binding: Option<Binding> = None;
    if let Err(e) = drive_client(
        ws_stream,
        &registry,
        &link,
        out_rx,
        &conn_cancel,
        &mut binding,
    )
    .await
    {
        debug!(error = %e, "client handler finished with error");
    }

    if let Some(binding) = binding {
        if let Some(removed) = registry
            .remove_device(&binding.session_id, &binding.device_id)
            .await
        {
            registry
                .broadcast_to_session(
                    &binding.session_id,
                    &ServerMessage::DeviceLeft {
                        device_id: removed.id,
                    },
                    None,
                )
                .await;
        }
    }
}

async fn drive_client(
    ws_stream: WsStream,
    registry: &SessionRegistry,
    link: &DeviceLink,
    mut out_rx: mpsc::Receiver<String>,
    conn_cancel: &CancellationToken,
    binding: &mut Option<Binding>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            // --- inbound frame from the device ---
            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        debug!(error = %e, "read error, dropping client");
                        return Err(e);
                    }
                    None => {
                        debug!("client disconnected (stream ended)");
                        return Ok(());
                    }
                };

                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => {
                        debug!("client sent close frame");
                        return Ok(());
                    }
                    Message::Ping(data) => {
                        ws_tx.send(Message::Pong(data)).await?;
                        continue;
                    }
                    _ => continue,
                };

                let parsed: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(error = %e, "malformed client message");
                        link.send(&ServerMessage::error("Invalid message format"));
                        continue;
                    }
                };

                if let Some(reply) = handle_message(parsed, registry, link, binding).await {
                    // Replies go through the connection's own queue, behind
                    // any fan-out already enqueued for this device, so the
                    // device sees one total outbound order.
                    link.send(&reply);
                }
            }

            // --- queued outbound message for this device ---
            queued = out_rx.recv() => {
                match queued {
                    Some(text) => ws_tx.send(Message::Text(text)).await?,
                    None => return Ok(()),
                }
            }

            // --- force-close from session delete or server shutdown ---
            _ = conn_cancel.cancelled() => {
                debug!("connection cancelled, closing");
                let _ = ws_tx.send(Message::Close(None)).await;
                return Ok(());
            }
        }
    }
}

/// Apply one parsed client message. Returns the direct reply for this
/// device, if any; fan-out to other devices goes through the registry.
async fn handle_message(
    msg: ClientMessage,
    registry: &SessionRegistry,
    link: &DeviceLink,
    binding: &mut Option<Binding>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::JoinSession {
            session_id,
            device_type,
        } => {
            if binding.is_some() {
                return Some(ServerMessage::error("Already joined a session"));
            }
            // Admission hands back the session it admitted into; building
            // the reply from that handle means a concurrent session delete
            // cannot leave the join unanswered.
            let (session, device) = match registry
                .add_device(&session_id, device_type, link.clone())
                .await
            {
                Ok(admitted) => admitted,
                Err(e) => return Some(ServerMessage::error(e.to_string())),
            };

            registry
                .broadcast_to_session(
                    &session_id,
                    &ServerMessage::DeviceJoined {
                        device_id: device.id.clone(),
                        device_type: device.role,
                    },
                    Some(&device.id),
                )
                .await;

            let reply = ServerMessage::JoinSuccess {
                device_id: device.id.clone(),
                device_type: device.role,
                config: (*session.config).clone(),
                starting_frame_id: device.frame_id.clone(),
            };
            *binding = Some(Binding {
                session_id,
                device_id: device.id,
            });
            Some(reply)
        }

        ClientMessage::Navigate { location_id } => {
            let Some(binding) = binding.as_ref() else {
                warn!("navigate from unjoined connection, ignoring");
                return None;
            };
            let Some(location_id) = location_id else {
                warn!(device_id = %binding.device_id, "navigate without location, ignoring");
                return None;
            };
            if registry
                .update_device_frame(&binding.session_id, &binding.device_id, &location_id)
                .await
            {
                registry
                    .broadcast_to_session(
                        &binding.session_id,
                        &ServerMessage::DeviceNavigated {
                            device_id: binding.device_id.clone(),
                            frame_id: location_id,
                        },
                        Some(&binding.device_id),
                    )
                    .await;
            } else {
                warn!(device_id = %binding.device_id, "navigate for unknown device, ignoring");
            }
            None
        }

        ClientMessage::Interaction {
            interaction_type,
            node_id,
            frame_id,
        } => {
            let Some(binding) = binding.as_ref() else {
                warn!("interaction from unjoined connection, ignoring");
                return None;
            };
            let Some(session) = registry.get_session(&binding.session_id).await else {
                return None;
            };
            let Some(device) = session.get_device(&binding.device_id).await else {
                return None;
            };

            let event = InteractionEvent {
                device: device.role,
                kind: InteractionKind::from_wire(&interaction_type),
                node_id,
                // An event without an explicit location happened wherever
                // the device currently is.
                frame_id: frame_id.or_else(|| Some(device.frame_id.clone())),
            };

            let matched = find_matching_rules(&event, &session.config.rules);
            debug!(
                session_id = %binding.session_id,
                device_id = %device.id,
                kind = %event.kind,
                matched = matched.len(),
                "interaction received"
            );

            for rule in matched {
                let Some(scope) = rule.target else {
                    warn!(rule_id = %rule.id, "matched rule has no target, skipping");
                    continue;
                };
                for action in &rule.actions {
                    let Some(command) = action_to_command(action, rule, &device.id) else {
                        continue;
                    };
                    let delivered = registry
                        .send_to_targets(&binding.session_id, scope, &device.id, &command)
                        .await;
                    debug!(rule_id = %rule.id, delivered, "rule action dispatched");
                }
            }
            None
        }

        ClientMessage::Ping => Some(ServerMessage::Pong),

        ClientMessage::Unknown => {
            debug!("unknown message type, ignoring");
            None
        }
    }
}

/// Translate an authored action into the command sent to target devices.
/// Actions missing their required identifiers are skipped with a warning
/// rather than dispatched half-formed.
fn action_to_command(
    action: &RuleAction,
    rule: &Rule,
    triggered_by: &str,
) -> Option<ServerMessage> {
    let (kind, frame_id, frame_name, node_id, variant_id) = match action {
        RuleAction::NavigateToFrame {
            frame_id,
            frame_name,
        } => {
            let frame_id = match frame_id.as_deref() {
                Some(f) if !f.is_empty() => f.to_owned(),
                _ => {
                    warn!(rule_id = %rule.id, "navigate action without frame id, skipping");
                    return None;
                }
            };
            (
                CommandKind::Navigate,
                Some(frame_id),
                frame_name.clone(),
                None,
                None,
            )
        }
        RuleAction::Restart => (CommandKind::Restart, None, None, None, None),
        RuleAction::ChangeVariant {
            node_id,
            variant_id,
        } => {
            let (Some(node_id), Some(variant_id)) = (node_id.clone(), variant_id.clone()) else {
                warn!(rule_id = %rule.id, "variant action missing identifiers, skipping");
                return None;
            };
            (
                CommandKind::ChangeVariant,
                None,
                None,
                Some(node_id),
                Some(variant_id),
            )
        }
    };

    Some(ServerMessage::ExecuteAction {
        action: kind,
        frame_id,
        frame_name,
        node_id,
        variant_id,
        triggered_by: triggered_by.to_owned(),
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
    })
}
