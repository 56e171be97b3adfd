//! `ctxweave check`: tool pairing diagnostics.

use ctxweave_pipeline::{ToolMessageReorder, validate_tool_pairing};
use std::path::Path;

use super::input::load_state;

pub async fn run(input: &Path, reorder: bool) -> Result<(), Box<dyn std::error::Error>> {
    let state = load_state(input)?;
    let report = validate_tool_pairing(&state.messages);

    println!("🔍 Checking {} message(s)...", state.messages.len());
    if report.valid {
        println!("   ✅ Tool calls and responses are paired");
    } else {
        for issue in &report.issues {
            println!("   ⚠️  {issue}");
        }
    }

    if reorder {
        let (messages, removed) = ToolMessageReorder::reorder(&state.messages);
        println!();
        println!("   Reordered: {} message(s), {removed} removed", messages.len());
        println!("{}", serde_json::to_string_pretty(&messages)?);
    }

    if !report.valid && !reorder {
        return Err(format!("{} tool pairing issue(s) found", report.issues.len()).into());
    }
    Ok(())
}
