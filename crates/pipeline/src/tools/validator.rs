//! Read-only tool pairing diagnostics.

use ctxweave_core::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPairingReport {
    pub valid: bool,
    /// Invocation ids no tool response answers
    pub orphaned_calls: Vec<String>,
    /// Back-reference ids no assistant turn declares
    pub orphaned_responses: Vec<String>,
    /// Ids of tool messages without a back-reference
    pub unreferenced_responses: Vec<String>,
    /// Back-reference ids answered more than once
    pub duplicate_responses: Vec<String>,
    pub issues: Vec<String>,
}

/// Check tool-call/tool-response pairing without modifying anything.
pub fn validate_tool_pairing(messages: &[Message]) -> ToolPairingReport {
    let mut declared: Vec<&str> = Vec::new();
    let mut declared_set: HashSet<&str> = HashSet::new();
    for call in messages.iter().flat_map(Message::tool_calls) {
        if let Some(id) = call.valid_id()
            && declared_set.insert(id)
        {
            declared.push(id);
        }
    }

    let mut report = ToolPairingReport::default();
    let mut answered: HashSet<&str> = HashSet::new();

    for message in messages {
        let Message::Tool(_) = message else {
            continue;
        };
        let Some(call_id) = message.tool_call_id() else {
            report.unreferenced_responses.push(message.id().to_string());
            report.issues.push(format!(
                "Tool message '{}' has no tool_call_id",
                message.id()
            ));
            continue;
        };

        if !declared_set.contains(call_id) {
            report.orphaned_responses.push(call_id.to_string());
            report.issues.push(format!(
                "Tool response '{call_id}' has no matching tool call"
            ));
        } else if !answered.insert(call_id) {
            report.duplicate_responses.push(call_id.to_string());
            report
                .issues
                .push(format!("Tool call '{call_id}' has more than one response"));
        }
    }

    for id in declared {
        if !answered.contains(id) {
            report.orphaned_calls.push(id.to_string());
            report
                .issues
                .push(format!("Tool call '{id}' has no response"));
        }
    }

    report.valid = report.issues.is_empty();
    report
}
