//! Rule matching: map an interaction event to the rules it triggers.

use crate::config::{Rule, TriggerKind};
use crate::event::{InteractionEvent, InteractionKind};

/// Return every enabled rule whose trigger matches `event`, preserving
/// configuration order.
///
/// This is deliberately not first-match-wins: a single event may trigger
/// multiple rules, and each later executes its full action list
/// independently.
pub fn find_matching_rules<'a>(event: &InteractionEvent, rules: &'a [Rule]) -> Vec<&'a Rule> {
    rules
        .iter()
        .filter(|rule| rule_matches(event, rule))
        .collect()
}

fn rule_matches(event: &InteractionEvent, rule: &Rule) -> bool {
    if !rule.enabled {
        return false;
    }
    let Some(trigger) = &rule.trigger else {
        return false;
    };
    if trigger.device != Some(event.device) {
        return false;
    }
    // An incomplete trigger (no kind) never matches; validation flags it.
    let Some(kind) = &trigger.kind else {
        return false;
    };
    match kind {
        TriggerKind::ElementTap { node_id } => {
            event.kind == InteractionKind::Tap && node_id.as_deref() == event.node_id.as_deref()
        }
        TriggerKind::LocationVisible { frame_id } => {
            event.kind == InteractionKind::LocationVisible
                && frame_id.as_deref() == event.frame_id.as_deref()
        }
        TriggerKind::VariantChange { node_id } => {
            event.kind == InteractionKind::VariantChange
                && node_id.as_deref() == event.node_id.as_deref()
        }
    }
}
