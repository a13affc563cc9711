//! Author-time validation of rules and configuration documents.
//!
//! This path is only exercised by the publish boundary; the live event path
//! never consults it. Each violated constraint produces its own message so
//! the authoring tool can surface all problems at once.

use crate::config::{Rule, RuleAction, SessionConfig, TriggerKind};

/// Controller capacity bounds accepted by the publish boundary.
pub const MIN_CONTROLLERS: u32 = 1;
pub const MAX_CONTROLLERS: u32 = 10;

/// Outcome of validating a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check one rule against the authoring constraints.
pub fn validate_rule(rule: &Rule) -> RuleValidation {
    let mut errors = Vec::new();

    if rule.name.trim().is_empty() {
        errors.push("Rule name is required".to_owned());
    }

    match &rule.trigger {
        None => errors.push("Trigger configuration is required".to_owned()),
        Some(trigger) => {
            if trigger.device.is_none() {
                errors.push("Trigger device is required".to_owned());
            }
            match &trigger.kind {
                None => errors.push("Trigger type is required".to_owned()),
                Some(TriggerKind::ElementTap { node_id })
                | Some(TriggerKind::VariantChange { node_id }) => {
                    if node_id.as_deref().is_none_or(str::is_empty) {
                        errors.push("Node ID is required for this trigger type".to_owned());
                    }
                }
                Some(TriggerKind::LocationVisible { frame_id }) => {
                    if frame_id.as_deref().is_none_or(str::is_empty) {
                        errors.push("Frame ID is required for this trigger type".to_owned());
                    }
                }
            }
        }
    }

    if rule.actions.is_empty() {
        errors.push("At least one action is required".to_owned());
    } else {
        for (index, action) in rule.actions.iter().enumerate() {
            let n = index + 1;
            match action {
                RuleAction::NavigateToFrame { frame_id, .. } => {
                    if frame_id.as_deref().is_none_or(str::is_empty) {
                        errors.push(format!("Action {n}: Frame ID is required for navigation"));
                    }
                }
                RuleAction::ChangeVariant {
                    node_id,
                    variant_id,
                } => {
                    if node_id.as_deref().is_none_or(str::is_empty) {
                        errors.push(format!("Action {n}: Node ID is required for variant change"));
                    }
                    if variant_id.as_deref().is_none_or(str::is_empty) {
                        errors.push(format!(
                            "Action {n}: Variant ID is required for variant change"
                        ));
                    }
                }
                RuleAction::Restart => {}
            }
        }
    }

    if rule.target.is_none() {
        errors.push("Target scope is required".to_owned());
    }

    RuleValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Check a whole configuration document. Returns an empty list when the
/// document is publishable.
pub fn validate_config(config: &SessionConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if !(MIN_CONTROLLERS..=MAX_CONTROLLERS).contains(&config.max_controllers) {
        errors.push(format!(
            "maxControllers must be between {MIN_CONTROLLERS} and {MAX_CONTROLLERS}, got {}",
            config.max_controllers
        ));
    }

    for rule in &config.rules {
        let result = validate_rule(rule);
        for error in result.errors {
            errors.push(format!("Rule \"{}\": {error}", rule.id));
        }
    }

    errors
}
